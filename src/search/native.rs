//! In-process line matcher built on the ripgrep core libraries.
//!
//! Files are scanned on the blocking pool, at most `workers` at a time, and
//! their matches are forwarded strictly in file order. Queued scans check the
//! cancellation token before they start and running scans check it on every
//! read from the file, so a cancelled scan of a large file without matches
//! ends after at most one buffer.

use crate::error::{ChanlogError, Result};
use crate::resolver::LogFileRef;
use crate::search::matcher::{
    trim_line_ending, CancellationToken, LineMatcher, MatchSink, RawMatch, ScanStats,
};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use grep_regex::{RegexMatcher, RegexMatcherBuilder};
use grep_searcher::sinks::Lossy;
use grep_searcher::{BinaryDetection, SearcherBuilder};
use log::{debug, warn};
use std::fs::File;
use std::io::{self, Read};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct NativeMatcher {
    workers: usize,
}

impl NativeMatcher {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    fn compile(query: &str) -> Result<RegexMatcher> {
        RegexMatcherBuilder::new()
            .case_insensitive(true)
            .line_terminator(Some(b'\n'))
            .build(query)
            .map_err(|e| ChanlogError::query(e.to_string()))
    }
}

#[async_trait]
impl LineMatcher for NativeMatcher {
    fn name(&self) -> &'static str {
        "native"
    }

    async fn validate(&self, query: &str) -> Result<()> {
        Self::compile(query).map(|_| ())
    }

    async fn scan(
        &self,
        files: Vec<Arc<LogFileRef>>,
        query: String,
        sink: MatchSink,
    ) -> Result<ScanStats> {
        let matcher = Self::compile(&query)?;
        let cancel = sink.token().clone();
        let mut stats = ScanStats::default();

        let mut scans = stream::iter(files)
            .map(|file| {
                let matcher = matcher.clone();
                let cancel = cancel.clone();
                tokio::task::spawn_blocking(move || {
                    if cancel.is_cancelled() {
                        return (file, None);
                    }
                    let result = scan_file(&matcher, &file, &cancel);
                    (file, Some(result))
                })
            })
            .buffered(self.workers);

        loop {
            let joined = tokio::select! {
                joined = scans.next() => joined,
                _ = sink.cancelled() => break,
            };
            let Some(joined) = joined else {
                break;
            };
            let (file, result) = match joined {
                Ok(scanned) => scanned,
                Err(err) => {
                    warn!("scan task failed: {err}");
                    stats.files_unreadable += 1;
                    continue;
                }
            };
            let Some(result) = result else {
                break;
            };
            stats.files_scanned += 1;

            let lines = match result {
                Ok(lines) => lines,
                Err(_) if cancel.is_cancelled() => break,
                Err(err) => {
                    warn!("failed to read {}: {err}", file.path.display());
                    stats.files_unreadable += 1;
                    continue;
                }
            };

            for line in lines {
                let raw = RawMatch {
                    file: Arc::clone(&file),
                    line,
                };
                if !sink.send(raw).await {
                    debug!("native scan stopped after {} files", stats.files_scanned);
                    return Ok(stats);
                }
                stats.lines_matched += 1;
            }

            if sink.is_cancelled() {
                break;
            }
        }

        Ok(stats)
    }
}

/// Collect every matching line of one file.
fn scan_file(
    matcher: &RegexMatcher,
    file: &LogFileRef,
    cancel: &CancellationToken,
) -> io::Result<Vec<String>> {
    let mut searcher = SearcherBuilder::new()
        .binary_detection(BinaryDetection::none())
        .line_number(true)
        .build();

    let reader = CancellableReader {
        inner: File::open(&file.path)?,
        cancel,
    };
    let mut lines = Vec::new();
    searcher.search_reader(
        matcher,
        reader,
        Lossy(|_line_number, line| {
            lines.push(trim_line_ending(line).to_string());
            Ok(!cancel.is_cancelled())
        }),
    )?;
    Ok(lines)
}

/// Reader failing every read once the scan is cancelled.
struct CancellableReader<'a, R> {
    inner: R,
    cancel: &'a CancellationToken,
}

impl<R: Read> Read for CancellableReader<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.cancel.is_cancelled() {
            return Err(io::Error::other("scan cancelled"));
        }
        self.inner.read(buf)
    }
}
