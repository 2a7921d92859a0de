//! Console host over a spawned server process.
//!
//! Commands are written to the child's stdin, one per line. A background
//! task reads the child's stdout line by line and publishes each line to the
//! shared `LogStream`.

use std::process::{ExitStatus, Stdio};

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::console::Console;
use crate::error::{Result, TransferError};
use crate::log_stream::LogStream;

/// A running server whose stdin is its console.
#[derive(Debug)]
pub struct ServerProcess {
    child: Child,
    stdin: Mutex<ChildStdin>,
    stream: LogStream,
    reader: JoinHandle<()>,
}

impl ServerProcess {
    /// Spawn `command` with piped stdin/stdout and start publishing its output.
    ///
    /// Must be called from inside a tokio runtime. The child is killed when
    /// the `ServerProcess` is dropped.
    pub fn spawn(mut command: Command) -> Result<Self> {
        command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command.spawn()?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| TransferError::ProcessExited("stdin was not captured".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| TransferError::ProcessExited("stdout was not captured".to_string()))?;

        let stream = LogStream::new();
        let publisher = stream.clone();
        let reader = tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => publisher.publish(&line),
                    Ok(None) => break,
                    Err(e) => {
                        warn!(error = %e, "failed to read server output");
                        break;
                    }
                }
            }
            debug!("server output closed");
        });

        info!(pid = ?child.id(), "server process started");

        Ok(Self {
            child,
            stdin: Mutex::new(stdin),
            stream,
            reader,
        })
    }

    /// OS process id, if the child is still running.
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Kill the child and wait for it to exit.
    pub async fn shutdown(mut self) -> Result<ExitStatus> {
        // Ignore "already exited"; wait() below reports the real status
        let _ = self.child.start_kill();
        let status = self.child.wait().await?;
        self.reader.abort();
        info!(%status, "server process stopped");
        Ok(status)
    }
}

#[async_trait]
impl Console for ServerProcess {
    async fn execute(&self, command: &str) -> Result<()> {
        let mut stdin = self.stdin.lock().await;
        let line = format!("{command}\n");

        let written = match stdin.write_all(line.as_bytes()).await {
            Ok(()) => stdin.flush().await,
            Err(e) => Err(e),
        };
        written.map_err(|e| TransferError::ProcessExited(e.to_string()))?;

        debug!(command, "console command sent");
        Ok(())
    }

    fn log_stream(&self) -> &LogStream {
        &self.stream
    }
}
