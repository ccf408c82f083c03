//! Search and comment sources backed by the `yt-dlp` binary.

use std::{
    io::Read,
    process::{Child, Command as StdCommand, Output, Stdio},
    thread,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use serde_json::Value;
use tokio::process::Command;
use tracing::debug;

use crate::{
    error::{Result, TermometroError},
    source::{CommentSource, RawComment, RawCommentStream, SearchSource},
};

const DEFAULT_PROGRAM: &str = "yt-dlp";
const WAIT_POLL: Duration = Duration::from_millis(100);

/// Runs `yt-dlp "ytsearch<N>:<query>"` and returns its `entries`.
#[derive(Debug, Clone)]
pub struct YtDlpSearchSource {
    program: String,
}

impl Default for YtDlpSearchSource {
    fn default() -> Self {
        Self::new(DEFAULT_PROGRAM)
    }
}

impl YtDlpSearchSource {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl SearchSource for YtDlpSearchSource {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<Value>> {
        let search_query = format!("ytsearch{max_results}:{query}");
        debug!(%search_query, "running yt-dlp search");

        let output = Command::new(&self.program)
            .arg(&search_query)
            .arg("--dump-single-json")
            .arg("--skip-download")
            .arg("--no-warnings")
            .arg("--quiet")
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| TermometroError::SearchFailed {
                query: query.to_string(),
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(TermometroError::SearchFailed {
                query: query.to_string(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let info: Value = serde_json::from_slice(&output.stdout)?;
        Ok(take_array(info, "entries"))
    }
}

/// Runs `yt-dlp --write-comments` for one URL and yields each comment.
///
/// yt-dlp only prints once every comment has been fetched, so a call
/// to `comments` can block for a long time. With [`YtDlpCommentSource::with_kill_after`]
/// the child is killed once that much time has passed.
#[derive(Debug, Clone)]
pub struct YtDlpCommentSource {
    program: String,
    max_fetch: Option<usize>,
    kill_after: Option<Duration>,
}

impl Default for YtDlpCommentSource {
    fn default() -> Self {
        Self::new(DEFAULT_PROGRAM)
    }
}

impl YtDlpCommentSource {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            max_fetch: None,
            kill_after: None,
        }
    }

    /// Caps how many comments yt-dlp downloads per video.
    pub fn with_max_fetch(mut self, max_fetch: usize) -> Self {
        self.max_fetch = Some(max_fetch);
        self
    }

    /// Kills yt-dlp if it is still running after `limit`.
    pub fn with_kill_after(mut self, limit: Duration) -> Self {
        self.kill_after = Some(limit);
        self
    }
}

impl CommentSource for YtDlpCommentSource {
    fn comments(&self, url: &str) -> Result<RawCommentStream> {
        let mut command = StdCommand::new(&self.program);
        command
            .arg(url)
            .arg("--skip-download")
            .arg("--write-comments")
            .arg("--dump-single-json")
            .arg("--no-warnings")
            .arg("--quiet");
        if let Some(max_fetch) = self.max_fetch {
            command
                .arg("--extractor-args")
                .arg(format!("youtube:max_comments={max_fetch};comment_sort=top"));
        }

        let failed = |reason: String| TermometroError::SourceFailed {
            url: url.to_string(),
            reason,
        };
        let output = match self.kill_after {
            Some(limit) => {
                let child = command
                    .stdout(Stdio::piped())
                    .stderr(Stdio::piped())
                    .spawn()
                    .map_err(|e| failed(e.to_string()))?;
                wait_with_limit(child, limit).map_err(failed)?
            }
            None => command.output().map_err(|e| failed(e.to_string()))?,
        };

        if !output.status.success() {
            return Err(failed(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        let info: Value = serde_json::from_slice(&output.stdout)?;
        let comments = take_array(info, "comments");
        Ok(Box::new(comments.into_iter().map(|item| {
            serde_json::from_value::<RawComment>(item).map_err(TermometroError::from)
        })))
    }
}

/// Collects the child's output, killing it once `limit` has passed.
fn wait_with_limit(mut child: Child, limit: Duration) -> std::result::Result<Output, String> {
    // Pipes are drained on their own threads so a full pipe never stalls the child.
    let stdout = child.stdout.take().map(drain);
    let stderr = child.stderr.take().map(drain);
    let started = Instant::now();

    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if started.elapsed() >= limit => {
                let _ = child.kill();
                let _ = child.wait();
                debug!(limit_secs = limit.as_secs_f64(), "killed yt-dlp");
                return Err(format!("yt-dlp killed after {:.0}s", limit.as_secs_f64()));
            }
            Ok(None) => thread::sleep(WAIT_POLL),
            Err(e) => return Err(e.to_string()),
        }
    };

    let collect = |handle: Option<thread::JoinHandle<Vec<u8>>>| {
        handle
            .and_then(|h| h.join().ok())
            .unwrap_or_default()
    };
    Ok(Output {
        status,
        stdout: collect(stdout),
        stderr: collect(stderr),
    })
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut bytes = Vec::new();
        let _ = pipe.read_to_end(&mut bytes);
        bytes
    })
}

/// Missing or null arrays are empty.
fn take_array(mut info: Value, key: &str) -> Vec<Value> {
    match info.get_mut(key).map(Value::take) {
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
    }
}
