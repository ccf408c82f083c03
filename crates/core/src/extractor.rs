//! Deadline-bounded comment extraction.
//!
//! The source is a blocking iterator with no way to cancel it, so each
//! extraction runs on its own detached thread and writes admitted comments
//! into a [`SharedBuffer`]. The caller waits at most the deadline for the
//! thread's result, then closes the buffer and returns whatever it holds.
//! Closing is the only stop signal: the thread notices it on its next append
//! and exits, but a thread stuck inside the source keeps running until the
//! source returns. It is not owned by the runtime, so shutting the runtime down
//! never waits for it.

use std::{
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use tokio::sync::oneshot;

use tracing::{debug, info, warn};

use crate::{
    buffer::{Push, SharedBuffer},
    config::{EXTRACTION_DEADLINE, ScraperConfig},
    error::Result,
    source::{CommentSource, ContentType, RawComment},
    text::TextProcessor,
    types::Comment,
};

const DEFAULT_MAX_COMMENTS: usize = 300;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionOutcome {
    /// The source was exhausted or the comment limit was reached.
    Completed,
    /// The deadline expired; the comments are whatever was admitted by then.
    TimedOut,
    /// The source could not be opened or the extraction thread died.
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct ExtractionReport {
    pub comments: Vec<Comment>,
    /// Raw items dropped by language filtering or validation.
    pub filtered: usize,
    pub outcome: ExtractionOutcome,
    pub elapsed: Duration,
}

#[derive(Clone)]
pub struct CommentExtractor {
    source: Arc<dyn CommentSource>,
    processor: TextProcessor,
    max_comments: usize,
    deadline: Duration,
}

impl CommentExtractor {
    pub fn new(source: Arc<dyn CommentSource>, processor: TextProcessor) -> Self {
        Self {
            source,
            processor,
            max_comments: DEFAULT_MAX_COMMENTS,
            deadline: EXTRACTION_DEADLINE,
        }
    }

    pub fn from_config(source: Arc<dyn CommentSource>, config: &ScraperConfig) -> Self {
        Self::new(source, TextProcessor::new(config.language.clone()))
            .with_max_comments(config.max_comments_per_video)
            .with_deadline(config.extraction_deadline)
    }

    pub fn with_max_comments(mut self, max_comments: usize) -> Self {
        self.max_comments = max_comments;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn max_comments(&self) -> usize {
        self.max_comments
    }

    /// Admitted comments in source order. Never fails; a failed or timed-out
    /// extraction yields whatever was admitted before it stopped.
    pub async fn extract(
        &self,
        video_id: &str,
        video_title: &str,
        content_type: ContentType,
    ) -> Vec<Comment> {
        self.extract_report(video_id, video_title, content_type)
            .await
            .comments
    }

    pub async fn extract_report(
        &self,
        video_id: &str,
        video_title: &str,
        content_type: ContentType,
    ) -> ExtractionReport {
        let started = Instant::now();
        if self.max_comments == 0 {
            return ExtractionReport {
                comments: Vec::new(),
                filtered: 0,
                outcome: ExtractionOutcome::Completed,
                elapsed: started.elapsed(),
            };
        }

        info!(
            video_id,
            content_type = content_type.name(),
            deadline_secs = self.deadline.as_secs_f64(),
            "extracting comments"
        );

        let buffer = SharedBuffer::new(self.max_comments);
        let job = ExtractionJob {
            source: Arc::clone(&self.source),
            processor: self.processor.clone(),
            buffer: buffer.clone(),
            url: content_type.canonical_url(video_id),
            video_id: video_id.to_string(),
            video_title: video_title.to_string(),
        };

        let (done_tx, done_rx) = oneshot::channel();
        let spawned = thread::Builder::new()
            .name(format!("extract-{video_id}"))
            .spawn(move || {
                // The receiver is gone once the deadline has passed.
                let _ = done_tx.send(job.run());
            });
        if let Err(e) = spawned {
            warn!(video_id, error = %e, "could not start extraction thread");
            let (comments, filtered) = buffer.close();
            return ExtractionReport {
                comments,
                filtered,
                outcome: ExtractionOutcome::Failed(format!("extraction thread failed: {e}")),
                elapsed: started.elapsed(),
            };
        }

        let outcome = match tokio::time::timeout(self.deadline, done_rx).await {
            Ok(Ok(Ok(()))) => ExtractionOutcome::Completed,
            Ok(Ok(Err(e))) => {
                warn!(video_id, error = %e, "comment source failed");
                ExtractionOutcome::Failed(e.to_string())
            }
            // The sender was dropped without a result: the thread panicked.
            Ok(Err(_)) => {
                warn!(video_id, "extraction thread died");
                ExtractionOutcome::Failed("extraction thread died".to_string())
            }
            Err(_) => {
                warn!(
                    video_id,
                    deadline_secs = self.deadline.as_secs_f64(),
                    "extraction deadline reached, returning partial results"
                );
                ExtractionOutcome::TimedOut
            }
        };

        // The thread stays detached; closing the buffer stops anything it
        // would still write from being observed.
        let (comments, filtered) = buffer.close();
        let elapsed = started.elapsed();

        info!(
            video_id,
            admitted = comments.len(),
            filtered,
            elapsed_ms = elapsed.as_millis() as u64,
            "extraction finished"
        );

        ExtractionReport {
            comments,
            filtered,
            outcome,
            elapsed,
        }
    }
}

/// Everything the background thread owns.
struct ExtractionJob {
    source: Arc<dyn CommentSource>,
    processor: TextProcessor,
    buffer: SharedBuffer<Comment>,
    url: String,
    video_id: String,
    video_title: String,
}

impl ExtractionJob {
    fn run(self) -> Result<()> {
        let stream = self.source.comments(&self.url)?;
        let mut admitted = 0usize;

        for item in stream {
            let raw = match item {
                Ok(raw) => raw,
                Err(e) => {
                    debug!(video_id = %self.video_id, error = %e, "skipping undecodable comment");
                    continue;
                }
            };

            let Some(comment) = self.admit(raw, admitted) else {
                if !self.buffer.record_discard() {
                    return Ok(());
                }
                continue;
            };

            match self.buffer.push(comment) {
                Push::Accepted => {
                    admitted += 1;
                    if admitted % 10 == 0 {
                        debug!(video_id = %self.video_id, admitted, "extraction progress");
                    }
                }
                Push::Full => {
                    debug!(video_id = %self.video_id, "comment limit reached");
                    return Ok(());
                }
                Push::Closed => {
                    debug!(video_id = %self.video_id, "reader stopped waiting, abandoning extraction");
                    return Ok(());
                }
            }
        }

        Ok(())
    }

    /// `sequence` numbers the fallback id when the source omits one.
    fn admit(&self, raw: RawComment, sequence: usize) -> Option<Comment> {
        let language = TextProcessor::detect_language(&TextProcessor::clean_text(&raw.text));
        if !self.processor.admits_language(&language) {
            debug!(video_id = %self.video_id, %language, "discarding comment in other language");
            return None;
        }

        let Some(text) = self.processor.validate_comment(&raw.text, Some(&language)) else {
            debug!(video_id = %self.video_id, "discarding comment that failed validation");
            return None;
        };

        Some(Comment {
            comment_id: raw
                .id
                .clone()
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| format!("unknown_{sequence}")),
            text,
            author: raw
                .author
                .clone()
                .filter(|author| !author.is_empty())
                .unwrap_or_else(|| "Anonymous".to_string()),
            author_id: raw.channel_id.clone().unwrap_or_default(),
            timestamp: raw.published_at(),
            likes: raw.likes(),
            video_id: self.video_id.clone(),
            video_title: self.video_title.clone(),
            is_reply: raw.is_reply(),
            parent_comment_id: raw.parent_comment_id(),
            language,
        })
    }
}
