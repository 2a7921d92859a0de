//! Console seam between the orchestrator and the simulation server.
//!
//! A console executes fire-and-forget text commands and exposes the log
//! stream the server writes to. `watch_log` is provided on top of those two:
//! it subscribes first, then issues the command, then watches, so a reply
//! that arrives immediately is never lost.

use async_trait::async_trait;
use regex::Regex;

use crate::error::Result;
use crate::log_stream::{self, LogMatch, LogStream, WatchOptions};

/// Command channel and log stream of a running server.
#[async_trait]
pub trait Console: Send + Sync {
    /// Send one console command. Does not wait for any output.
    async fn execute(&self, command: &str) -> Result<()>;

    /// The server's shared log stream.
    fn log_stream(&self) -> &LogStream;

    /// Issue `command` and collect the matching window of log lines.
    async fn watch_log(&self, command: &str, pattern: &Regex, options: WatchOptions) -> Result<Vec<LogMatch>> {
        let mut receiver = self.log_stream().subscribe();
        self.execute(command).await?;
        log_stream::watch(&mut receiver, pattern, &options, command).await
    }
}
