//! Line matching capability shared by the search backends.
//!
//! A [`LineMatcher`] scans files in the order given and pushes every matching
//! line into a [`MatchSink`]. Consumers stop a scan cooperatively through the
//! sink's [`CancellationToken`] or by dropping the receiving end.

use crate::error::Result;
use crate::resolver::LogFileRef;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::Sender;
use tokio::sync::Notify;

/// An unparsed matching line and the file it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMatch {
    pub file: Arc<LogFileRef>,
    /// Line content without the trailing line terminator
    pub line: String,
}

#[derive(Debug, Default)]
struct CancelState {
    flag: AtomicBool,
    notify: Notify,
}

/// Shared flag set once a scan should stop producing matches.
///
/// Blocking scans poll [`CancellationToken::is_cancelled`]; async scans can
/// race their I/O against [`CancellationToken::cancelled`].
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    state: Arc<CancelState>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.state.flag.store(true, Ordering::Release);
        self.state.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.flag.load(Ordering::Acquire)
    }

    /// Resolves once [`CancellationToken::cancel`] has been called.
    pub async fn cancelled(&self) {
        loop {
            // Register before checking the flag so a concurrent cancel is not missed
            let notified = self.state.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

/// Receiving side of a scan as seen by a matcher.
#[derive(Debug, Clone)]
pub struct MatchSink {
    tx: Sender<RawMatch>,
    cancel: CancellationToken,
}

impl MatchSink {
    pub fn new(tx: Sender<RawMatch>, cancel: CancellationToken) -> Self {
        Self { tx, cancel }
    }

    /// Deliver one match. Returns `false` once the consumer is gone or the
    /// scan was cancelled; the matcher must stop scanning then.
    pub async fn send(&self, raw: RawMatch) -> bool {
        if self.is_cancelled() {
            return false;
        }
        self.tx.send(raw).await.is_ok()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled() || self.tx.is_closed()
    }

    /// Resolves once the scan is cancelled or the consumer is gone.
    pub async fn cancelled(&self) {
        tokio::select! {
            _ = self.cancel.cancelled() => {}
            _ = self.tx.closed() => {}
        }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }
}

/// Counters reported by a finished scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub files_scanned: usize,
    /// Files whose read failed; they contribute zero matches
    pub files_unreadable: usize,
    pub lines_matched: usize,
}

/// Case-insensitive extended-regex line matching over a list of files.
#[async_trait]
pub trait LineMatcher: Send + Sync + std::fmt::Debug {
    /// Short backend name for logs
    fn name(&self) -> &'static str;

    /// Check that `query` is a usable pattern before any file is scanned.
    ///
    /// # Errors
    /// * `QueryError` with the backend's diagnostic for invalid patterns
    /// * `SearchUnavailable` if the backend cannot be invoked at all
    async fn validate(&self, query: &str) -> Result<()>;

    /// Scan `files` in order, sending matching lines to `sink`.
    ///
    /// Matches keep file order and line order within a file. Per-file read
    /// failures count as zero matches for that file.
    async fn scan(
        &self,
        files: Vec<Arc<LogFileRef>>,
        query: String,
        sink: MatchSink,
    ) -> Result<ScanStats>;
}

/// Strip a trailing `\n` or `\r\n`.
pub(crate) fn trim_line_ending(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}
