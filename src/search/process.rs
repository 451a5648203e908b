//! Line matcher that shells out to an external `grep`.
//!
//! Files are handed to `grep -i -E --text --with-filename` in batches small
//! enough for any OS argument limit. Each output line is attributed back to
//! the file whose path prefixes it, walking the batch in order since grep
//! reports files in the order they were given. Cancellation kills the child,
//! even while it is still searching without having printed anything.

use crate::error::{ChanlogError, Result};
use crate::resolver::LogFileRef;
use crate::search::matcher::{LineMatcher, MatchSink, RawMatch, ScanStats};
use async_trait::async_trait;
use log::{debug, warn};
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;

/// Files passed to a single grep invocation
const FILES_PER_INVOCATION: usize = 256;

/// grep exit status for "an error occurred" (1 means no lines selected)
const GREP_TROUBLE: i32 = 2;

#[derive(Debug, Clone)]
pub struct GrepProcessMatcher {
    program: String,
}

impl GrepProcessMatcher {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn base_command(&self, query: &str) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("-i").arg("-E").arg("--text").arg("-e").arg(query);
        cmd.kill_on_drop(true);
        cmd
    }

    fn unavailable(&self, err: std::io::Error) -> ChanlogError {
        ChanlogError::search_unavailable(format!("cannot run '{}': {err}", self.program))
    }

    /// Run one grep over `batch`. Returns `false` once the consumer stopped.
    async fn scan_batch(
        &self,
        batch: &[Arc<LogFileRef>],
        query: &str,
        sink: &MatchSink,
        stats: &mut ScanStats,
    ) -> Result<bool> {
        let mut cmd = self.base_command(query);
        cmd.arg("--with-filename").arg("--");
        for file in batch {
            cmd.arg(&file.path);
        }

        let mut child = cmd
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.unavailable(e))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ChanlogError::search_unavailable("failed to capture grep stdout"))?;
        let stderr = child.stderr.take();
        let stderr_task = tokio::spawn(async move {
            let mut buf = String::new();
            if let Some(stderr) = stderr {
                let _ = BufReader::new(stderr).read_to_string(&mut buf).await;
            }
            buf
        });

        let prefixes: Vec<Vec<u8>> = batch.iter().map(|file| path_prefix(file)).collect();
        let mut reader = BufReader::new(stdout);
        let mut buf = Vec::new();
        let mut cursor = 0;
        let mut consumer_alive = true;

        loop {
            if sink.is_cancelled() {
                consumer_alive = false;
                break;
            }
            buf.clear();
            // grep may stay silent for a long time on large files
            let read = tokio::select! {
                read = reader.read_until(b'\n', &mut buf) => read,
                _ = sink.cancelled() => {
                    consumer_alive = false;
                    break;
                }
            };
            match read {
                Ok(0) => break,
                Ok(_) => {}
                Err(err) => {
                    warn!("reading grep output failed: {err}");
                    break;
                }
            }

            let Some((index, content)) = attribute_line(&buf, &prefixes, &mut cursor) else {
                warn!("unattributable grep output line skipped");
                continue;
            };
            let line = String::from_utf8_lossy(trim_line_ending(content)).into_owned();
            let raw = RawMatch {
                file: Arc::clone(&batch[index]),
                line,
            };
            if !sink.send(raw).await {
                consumer_alive = false;
                break;
            }
            stats.lines_matched += 1;
        }

        if !consumer_alive {
            let _ = child.kill().await;
            stderr_task.abort();
            debug!("grep killed after consumer stopped");
            return Ok(false);
        }

        let status = child.wait().await.map_err(|e| self.unavailable(e))?;
        let diagnostics = stderr_task.await.unwrap_or_default();
        stats.files_scanned += batch.len();
        if status.code() == Some(GREP_TROUBLE) {
            // Per-file read errors; the affected files simply yield nothing
            let unreadable = diagnostics.lines().filter(|l| !l.trim().is_empty()).count();
            stats.files_unreadable += unreadable;
            warn!("grep reported errors: {}", diagnostics.trim());
        }
        Ok(true)
    }
}

#[async_trait]
impl LineMatcher for GrepProcessMatcher {
    fn name(&self) -> &'static str {
        "grep"
    }

    /// Runs the pattern against empty input: exit status 2 means grep
    /// rejected the expression.
    async fn validate(&self, query: &str) -> Result<()> {
        let output = self
            .base_command(query)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| self.unavailable(e))?;

        match output.status.code() {
            Some(0) | Some(1) => Ok(()),
            Some(GREP_TROUBLE) => {
                let diagnostic = String::from_utf8_lossy(&output.stderr).trim().to_string();
                Err(ChanlogError::query(diagnostic))
            }
            other => Err(ChanlogError::search_unavailable(format!(
                "'{}' exited with status {other:?}",
                self.program
            ))),
        }
    }

    async fn scan(
        &self,
        files: Vec<Arc<LogFileRef>>,
        query: String,
        sink: MatchSink,
    ) -> Result<ScanStats> {
        let mut stats = ScanStats::default();
        for batch in files.chunks(FILES_PER_INVOCATION) {
            if sink.is_cancelled() {
                break;
            }
            if !self.scan_batch(batch, &query, &sink, &mut stats).await? {
                break;
            }
        }
        Ok(stats)
    }
}

/// `<path>:` as grep prints it in front of every matching line.
fn path_prefix(file: &LogFileRef) -> Vec<u8> {
    let mut prefix = file.path.as_os_str().as_encoded_bytes().to_vec();
    prefix.push(b':');
    prefix
}

/// Find the file a grep output line belongs to, starting at `cursor`.
///
/// Returns the file index and the line content after the `<path>:` prefix.
fn attribute_line<'a>(
    line: &'a [u8],
    prefixes: &[Vec<u8>],
    cursor: &mut usize,
) -> Option<(usize, &'a [u8])> {
    for index in *cursor..prefixes.len() {
        if let Some(content) = line.strip_prefix(prefixes[index].as_slice()) {
            *cursor = index;
            return Some((index, content));
        }
    }
    None
}

fn trim_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}
