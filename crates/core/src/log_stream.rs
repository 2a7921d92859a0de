//! Shared server log stream and the chunk watcher that correlates console
//! commands with their asynchronous log output.
//!
//! # Design
//!
//! - **Broadcast**: every published line goes to every subscriber; a
//!   watcher subscribes *before* its command is issued so no reply is missed
//! - **Window**: the first matching line accepted by `first` opens the
//!   window; with a `last` predicate the first later matching line it
//!   accepts closes it, otherwise the first non-matching line (or a quiet
//!   `post_match_delay`) does
//! - **Deadline**: the whole watch fails with `TransferError::Timeout` if
//!   the window has not closed by `timeout`
//!
//! # Log Prefixes
//!
//! Server lines look like `[2023.09.09-12.00.00:123][ 42]LogFoo: ...`. The
//! timestamp and frame prefix is stripped on publish, so patterns are
//! written against `LogFoo: ...`.

use std::collections::HashMap;
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::{Result, TransferError};

/// Lines buffered per subscriber before it starts lagging
pub const STREAM_CAPACITY: usize = 1024;

/// Broadcast stream of server log lines.
#[derive(Debug, Clone)]
pub struct LogStream {
    sender: broadcast::Sender<String>,
}

impl LogStream {
    /// Create an empty stream with no subscribers.
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(STREAM_CAPACITY);
        Self { sender }
    }

    /// Publish a raw server line (prefix stripped) to all subscribers.
    ///
    /// Lines published while nobody is subscribed are dropped.
    pub fn publish(&self, raw_line: &str) {
        let line = strip_log_prefix(raw_line.trim_end_matches(['\r', '\n']));
        // No receivers is fine: nobody is waiting on output right now
        let _ = self.sender.send(line.to_string());
    }

    /// Subscribe to lines published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.sender.subscribe()
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for LogStream {
    fn default() -> Self {
        Self::new()
    }
}

/// Remove a leading `[timestamp][frame]` prefix, if present.
pub fn strip_log_prefix(line: &str) -> &str {
    static PREFIX: OnceLock<Regex> = OnceLock::new();
    let prefix = PREFIX.get_or_init(|| {
        Regex::new(r"^\[\d{4}\.\d{2}\.\d{2}-\d{2}\.\d{2}\.\d{2}:\d{3}\]\[\s*\d+\]")
            .expect("static log prefix pattern")
    });

    match prefix.find(line) {
        Some(m) => &line[m.end()..],
        None => line,
    }
}

/// One log line matched against a watch pattern, with owned captures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogMatch {
    line: String,
    groups: Vec<Option<String>>,
    named: HashMap<String, String>,
}

impl LogMatch {
    /// Match `line` against `pattern`, capturing every group.
    pub fn capture(pattern: &Regex, line: &str) -> Option<Self> {
        let caps = pattern.captures(line)?;

        let groups = caps
            .iter()
            .map(|g| g.map(|m| m.as_str().to_string()))
            .collect();

        let named = pattern
            .capture_names()
            .flatten()
            .filter_map(|name| caps.name(name).map(|m| (name.to_string(), m.as_str().to_string())))
            .collect();

        Some(Self {
            line: line.to_string(),
            groups,
            named,
        })
    }

    /// The whole line.
    pub fn line(&self) -> &str {
        &self.line
    }

    /// Capture group by position (0 is the whole match).
    pub fn group(&self, index: usize) -> Option<&str> {
        self.groups.get(index)?.as_deref()
    }

    /// Capture group by name.
    pub fn name(&self, name: &str) -> Option<&str> {
        self.named.get(name).map(String::as_str)
    }
}

/// Predicate over a matched line.
pub type MatchPredicate = Box<dyn Fn(&LogMatch) -> bool + Send + Sync>;

/// How a watch opens and closes its window of matched lines.
pub struct WatchOptions {
    /// Accepts the line that opens the window
    pub first: MatchPredicate,
    /// Accepts the line that closes the window; `None` closes on the first
    /// non-matching line or a quiet `post_match_delay`
    pub last: Option<MatchPredicate>,
    /// Deadline for the whole watch, measured from subscription
    pub timeout: Duration,
    /// Extra wait after the window closes (or quiet period without `last`)
    pub post_match_delay: Duration,
}

impl WatchOptions {
    /// Accept the first matching line, close on the first non-match.
    pub fn new(timeout: Duration) -> Self {
        Self {
            first: Box::new(|_| true),
            last: None,
            timeout,
            post_match_delay: Duration::ZERO,
        }
    }

    pub fn with_first(mut self, first: impl Fn(&LogMatch) -> bool + Send + Sync + 'static) -> Self {
        self.first = Box::new(first);
        self
    }

    pub fn with_last(mut self, last: impl Fn(&LogMatch) -> bool + Send + Sync + 'static) -> Self {
        self.last = Some(Box::new(last));
        self
    }

    pub fn with_post_match_delay(mut self, delay: Duration) -> Self {
        self.post_match_delay = delay;
        self
    }
}

impl std::fmt::Debug for WatchOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchOptions")
            .field("has_last", &self.last.is_some())
            .field("timeout", &self.timeout)
            .field("post_match_delay", &self.post_match_delay)
            .finish()
    }
}

/// Watch `receiver` until the window described by `options` closes.
///
/// `what` names the request in the timeout error.
///
/// # Errors
/// - `TransferError::Timeout` if the window does not close in time
/// - `TransferError::StreamClosed` if every sender is gone
pub async fn watch(
    receiver: &mut broadcast::Receiver<String>,
    pattern: &Regex,
    options: &WatchOptions,
    what: &str,
) -> Result<Vec<LogMatch>> {
    let deadline = Instant::now() + options.timeout;

    let window = match tokio::time::timeout_at(deadline, collect_window(receiver, pattern, options)).await {
        Ok(window) => window?,
        Err(_) => {
            debug!(what, timeout_ms = options.timeout.as_millis() as u64, "watch timed out");
            return Err(TransferError::Timeout {
                what: what.to_string(),
                timeout_ms: options.timeout.as_millis() as u64,
            }
            .into());
        }
    };

    if options.last.is_some() && !options.post_match_delay.is_zero() {
        tokio::time::sleep(options.post_match_delay).await;
    }

    Ok(window)
}

async fn collect_window(
    receiver: &mut broadcast::Receiver<String>,
    pattern: &Regex,
    options: &WatchOptions,
) -> Result<Vec<LogMatch>> {
    let mut window: Vec<LogMatch> = Vec::new();

    loop {
        let line = if window.is_empty() || options.last.is_some() {
            next_line(receiver).await?
        } else {
            match tokio::time::timeout(options.post_match_delay, next_line(receiver)).await {
                Ok(line) => line?,
                Err(_) => return Ok(window),
            }
        };

        match LogMatch::capture(pattern, &line) {
            Some(m) if window.is_empty() => {
                if (options.first)(&m) {
                    window.push(m);
                }
            }
            Some(m) => {
                let closes = options.last.as_ref().is_some_and(|last| last(&m));
                window.push(m);
                if closes {
                    return Ok(window);
                }
            }
            None if !window.is_empty() && options.last.is_none() => return Ok(window),
            None => {}
        }
    }
}

async fn next_line(receiver: &mut broadcast::Receiver<String>) -> Result<String> {
    loop {
        match receiver.recv().await {
            Ok(line) => return Ok(line),
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "log watcher lagged behind the stream");
            }
            Err(RecvError::Closed) => return Err(TransferError::StreamClosed.into()),
        }
    }
}
