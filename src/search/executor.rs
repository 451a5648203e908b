//! Search execution with date-group early termination.
//!
//! The executor runs a [`LineMatcher`] on a background task and exposes its
//! output as a [`MatchStream`]. Once the stream has yielded `budget` matches it
//! remembers the date of the match that reached the budget and keeps yielding
//! only while matches share that date. The first match from another date
//! cancels the scan and marks the stream truncated, so results always end on
//! a complete date group.

use crate::config::{Backend, SearchConfig};
use crate::error::{ChanlogError, Result};
use crate::resolver::LogFileRef;
use crate::search::matcher::{CancellationToken, LineMatcher, MatchSink, RawMatch, ScanStats};
use crate::search::native::NativeMatcher;
use crate::search::process::GrepProcessMatcher;
use log::debug;
use std::sync::Arc;
use tokio::sync::mpsc::{self, Receiver};
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Everything a drained stream produced.
#[derive(Debug, Default)]
pub struct Collected {
    pub matches: Vec<RawMatch>,
    /// Matches were withheld, by early termination or by the deadline
    pub truncated: bool,
    pub timed_out: bool,
    pub stats: ScanStats,
}

/// Lazy, finite sequence of matches for one query.
///
/// Restarting requires a new call to [`SearchExecutor::search`].
pub struct MatchStream {
    rx: Receiver<RawMatch>,
    cancel: CancellationToken,
    producer: JoinHandle<Result<ScanStats>>,
    budget: usize,
    emitted: usize,
    stopping_date: Option<String>,
    truncated: bool,
    done: bool,
}

impl MatchStream {
    /// Next match, or `None` when the scan finished or stopped early.
    pub async fn next(&mut self) -> Option<RawMatch> {
        if self.done {
            return None;
        }

        let Some(raw) = self.rx.recv().await else {
            self.done = true;
            return None;
        };

        if let Some(stopping_date) = &self.stopping_date {
            if raw.file.date != *stopping_date {
                debug!("date group {stopping_date} complete, stopping search");
                self.truncated = true;
                self.stop();
                return None;
            }
        }

        self.emitted += 1;
        if self.stopping_date.is_none() && self.emitted >= self.budget {
            self.stopping_date = Some(raw.file.date.clone());
        }
        Some(raw)
    }

    /// Whether matches were withheld so far.
    pub fn truncated(&self) -> bool {
        self.truncated
    }

    /// Number of matches yielded so far.
    pub fn emitted(&self) -> usize {
        self.emitted
    }

    /// Abandon the scan; queued and in-flight file scans stop.
    pub fn abort(&mut self) {
        if !self.done {
            self.truncated = true;
        }
        self.stop();
    }

    fn stop(&mut self) {
        self.done = true;
        self.cancel.cancel();
        self.rx.close();
    }

    /// Wait for the scanning task and return its counters.
    ///
    /// # Errors
    /// * Whatever the matcher failed with, e.g. `SearchUnavailable`
    pub async fn finish(mut self) -> Result<ScanStats> {
        self.stop();
        match self.producer.await {
            Ok(result) => result,
            Err(err) => Err(ChanlogError::search_unavailable(format!(
                "search task failed: {err}"
            ))),
        }
    }

    /// Stop the scanning task without waiting for it to notice cancellation.
    /// Counters of an abandoned scan are lost.
    async fn abandon(mut self) -> ScanStats {
        self.stop();
        self.producer.abort();
        match self.producer.await {
            Ok(Ok(stats)) => stats,
            Ok(Err(err)) => {
                debug!("abandoned search failed: {err}");
                ScanStats::default()
            }
            Err(_) => ScanStats::default(),
        }
    }

    /// Drain the stream, giving up at `deadline` with whatever was gathered.
    ///
    /// Once the deadline passes the scanning task is dropped rather than
    /// awaited, so a backend stuck in I/O cannot hold the caller past it.
    pub async fn collect(mut self, deadline: Option<Instant>) -> Result<Collected> {
        let mut matches = Vec::new();
        let mut timed_out = false;

        loop {
            let next = match deadline {
                Some(deadline) => match tokio::time::timeout_at(deadline, self.next()).await {
                    Ok(next) => next,
                    Err(_) => {
                        debug!("search deadline reached after {} matches", matches.len());
                        timed_out = true;
                        self.abort();
                        None
                    }
                },
                None => self.next().await,
            };
            match next {
                Some(raw) => matches.push(raw),
                None => break,
            }
        }

        let truncated = self.truncated;
        let stats = if timed_out {
            self.abandon().await
        } else {
            self.finish().await?
        };
        Ok(Collected {
            matches,
            truncated,
            timed_out,
            stats,
        })
    }
}

/// Runs searches over resolved files with a fixed display budget.
#[derive(Debug, Clone)]
pub struct SearchExecutor {
    matcher: Arc<dyn LineMatcher>,
    budget: usize,
    capacity: usize,
}

impl SearchExecutor {
    pub fn new(matcher: Arc<dyn LineMatcher>, budget: usize) -> Self {
        Self {
            matcher,
            budget: budget.max(1),
            capacity: 256,
        }
    }

    /// Executor using the backend selected in `config`.
    pub fn from_config(config: &SearchConfig) -> Self {
        let matcher: Arc<dyn LineMatcher> = match config.backend {
            Backend::Native => Arc::new(NativeMatcher::new(config.workers)),
            Backend::Grep => Arc::new(GrepProcessMatcher::new(config.grep_program.clone())),
        };
        Self::new(matcher, config.budget).with_capacity(config.stream_capacity)
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    pub fn matcher_name(&self) -> &'static str {
        self.matcher.name()
    }

    /// Check the query before resolving work for it.
    pub async fn validate(&self, query: &str) -> Result<()> {
        self.matcher.validate(query).await
    }

    /// Start scanning `files` in order. Must be called within a tokio runtime.
    pub fn search(&self, files: Vec<LogFileRef>, query: &str) -> MatchStream {
        let (tx, rx) = mpsc::channel(self.capacity);
        let cancel = CancellationToken::new();
        let sink = MatchSink::new(tx, cancel.clone());
        let files: Vec<Arc<LogFileRef>> = files.into_iter().map(Arc::new).collect();
        let matcher = Arc::clone(&self.matcher);
        let query = query.to_string();

        debug!(
            "scanning {} files with the {} matcher",
            files.len(),
            matcher.name()
        );
        let producer = tokio::spawn(async move { matcher.scan(files, query, sink).await });

        MatchStream {
            rx,
            cancel,
            producer,
            budget: self.budget,
            emitted: 0,
            stopping_date: None,
            truncated: false,
            done: false,
        }
    }

    /// Validate, scan and drain in one step.
    pub async fn run(
        &self,
        files: Vec<LogFileRef>,
        query: &str,
        deadline: Option<Instant>,
    ) -> Result<Collected> {
        self.validate(query).await?;
        self.search(files, query).collect(deadline).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::time::Duration;

    /// What a scripted scan does after replaying its lines.
    #[derive(Debug, Clone, Copy)]
    enum Tail {
        Finish,
        /// Idle until cancelled
        WaitForCancel,
        /// Idle far longer than any test deadline, ignoring cancellation
        Stall,
    }

    /// Matcher replaying canned `(date, line)` pairs, one file per date.
    #[derive(Debug)]
    struct ScriptedMatcher {
        lines: Vec<(&'static str, &'static str)>,
        tail: Tail,
    }

    #[async_trait]
    impl LineMatcher for ScriptedMatcher {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn validate(&self, query: &str) -> Result<()> {
            if query == "(" {
                return Err(ChanlogError::query("unclosed group"));
            }
            Ok(())
        }

        async fn scan(
            &self,
            _files: Vec<Arc<LogFileRef>>,
            _query: String,
            sink: MatchSink,
        ) -> Result<ScanStats> {
            let mut stats = ScanStats::default();
            for (date, line) in &self.lines {
                let raw = RawMatch {
                    file: Arc::new(file_ref(date)),
                    line: line.to_string(),
                };
                if !sink.send(raw).await {
                    return Ok(stats);
                }
                stats.lines_matched += 1;
            }
            match self.tail {
                Tail::Finish => {}
                Tail::WaitForCancel => sink.cancelled().await,
                Tail::Stall => tokio::time::sleep(Duration::from_secs(60)).await,
            }
            Ok(stats)
        }
    }

    fn file_ref(date: &str) -> LogFileRef {
        LogFileRef {
            path: PathBuf::from(format!("/logs/#hi/{date}.log")),
            name: "#hi".to_string(),
            date: date.to_string(),
        }
    }

    fn executor(lines: Vec<(&'static str, &'static str)>, budget: usize) -> SearchExecutor {
        let matcher = ScriptedMatcher {
            lines,
            tail: Tail::Finish,
        };
        SearchExecutor::new(Arc::new(matcher), budget).with_capacity(2)
    }

    #[tokio::test]
    async fn stops_at_date_group_boundary() {
        let executor = executor(
            vec![
                ("2023-01-03", "[01:00:00] a"),
                ("2023-01-02", "[02:00:00] b"),
                ("2023-01-02", "[01:00:00] c"),
                ("2023-01-02", "[00:30:00] d"),
                ("2023-01-01", "[05:00:00] e"),
            ],
            2,
        );

        let collected = executor.run(Vec::new(), "x", None).await.unwrap();
        let lines: Vec<_> = collected.matches.iter().map(|m| m.line.as_str()).collect();
        assert_eq!(
            lines,
            vec!["[01:00:00] a", "[02:00:00] b", "[01:00:00] c", "[00:30:00] d"]
        );
        assert!(collected.truncated);
        assert!(!collected.timed_out);
    }

    #[tokio::test]
    async fn natural_end_is_not_truncated() {
        let executor = executor(
            vec![("2023-01-02", "[00:00:00] a"), ("2023-01-01", "[00:00:00] b")],
            2,
        );
        let collected = executor.run(Vec::new(), "x", None).await.unwrap();
        assert_eq!(collected.matches.len(), 2);
        assert!(!collected.truncated);
        assert_eq!(collected.stats.lines_matched, 2);
    }

    #[tokio::test]
    async fn invalid_query_aborts_before_scanning() {
        let executor = executor(vec![("2023-01-01", "[00:00:00] a")], 5);
        let err = executor.run(Vec::new(), "(", None).await.unwrap_err();
        assert!(matches!(err, ChanlogError::QueryError { .. }));
    }

    #[tokio::test]
    async fn deadline_returns_partial_results() {
        let matcher = ScriptedMatcher {
            lines: vec![("2023-01-02", "[00:00:00] a"), ("2023-01-01", "[00:00:00] b")],
            tail: Tail::WaitForCancel,
        };
        let executor = SearchExecutor::new(Arc::new(matcher), 30);
        let deadline = Instant::now() + Duration::from_millis(100);

        let collected = executor.run(Vec::new(), "x", Some(deadline)).await.unwrap();
        assert_eq!(collected.matches.len(), 2);
        assert!(collected.truncated);
        assert!(collected.timed_out);
    }

    #[tokio::test]
    async fn deadline_does_not_wait_for_a_stalled_matcher() {
        let matcher = ScriptedMatcher {
            lines: vec![("2023-01-02", "[00:00:00] a")],
            tail: Tail::Stall,
        };
        let executor = SearchExecutor::new(Arc::new(matcher), 30);
        let started = std::time::Instant::now();
        let deadline = Instant::now() + Duration::from_millis(100);

        let collected = executor.run(Vec::new(), "x", Some(deadline)).await.unwrap();
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(collected.matches.len(), 1);
        assert!(collected.truncated);
        assert!(collected.timed_out);
    }

    #[tokio::test]
    async fn stream_is_lazy_and_abortable() {
        let executor = executor(
            vec![
                ("2023-01-03", "[00:00:00] a"),
                ("2023-01-02", "[00:00:00] b"),
                ("2023-01-01", "[00:00:00] c"),
            ],
            10,
        );
        let mut stream = executor.search(Vec::new(), "x");
        assert_eq!(stream.next().await.unwrap().line, "[00:00:00] a");
        assert_eq!(stream.emitted(), 1);
        stream.abort();
        assert!(stream.next().await.is_none());
        assert!(stream.truncated());
        assert!(stream.finish().await.is_ok());
    }
}
