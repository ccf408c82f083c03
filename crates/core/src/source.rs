//! Boundaries to the external video platform.
//!
//! Both sources are traits so the extraction and search logic can run against
//! yt-dlp in production and against in-memory fakes in tests.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use crate::error::Result;

static VIDEO_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:https?://)?(?:(?:www|m)\.)?(?:youtube\.com/watch\?(?:.*&)?v=|youtu\.be/|youtube\.com/(shorts)/)([A-Za-z0-9_-]{11})(?:[?&#/].*)?$",
    )
    .unwrap()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContentType {
    #[default]
    Auto,
    Video,
    Short,
}

impl ContentType {
    /// `Auto` is treated as a regular video.
    pub fn resolve(self) -> Self {
        match self {
            ContentType::Auto => ContentType::Video,
            other => other,
        }
    }

    pub fn name(&self) -> &'static str {
        match self.resolve() {
            ContentType::Short => "short",
            _ => "video",
        }
    }

    pub fn canonical_url(&self, video_id: &str) -> String {
        match self.resolve() {
            ContentType::Short => format!("https://www.youtube.com/shorts/{video_id}"),
            _ => format!("https://www.youtube.com/watch?v={video_id}"),
        }
    }
}

/// Extracts the 11-character id and content type from a YouTube URL.
pub fn parse_video_url(url: &str) -> Option<(String, ContentType)> {
    let captures = VIDEO_URL.captures(url.trim())?;
    let content_type = if captures.get(1).is_some() {
        ContentType::Short
    } else {
        ContentType::Video
    };
    captures
        .get(2)
        .map(|id| (id.as_str().to_string(), content_type))
}

/// A like count as reported by the source: either a number or display text
/// such as `"1.2K"`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum VoteCount {
    Count(u64),
    Text(String),
}

impl VoteCount {
    pub fn value(&self) -> u64 {
        match self {
            VoteCount::Count(count) => *count,
            VoteCount::Text(text) => parse_vote_text(text),
        }
    }
}

fn parse_vote_text(text: &str) -> u64 {
    let compact: String = text
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .replace(',', ".");
    let (number, multiplier) = match compact.chars().last() {
        Some('K' | 'k') => (&compact[..compact.len() - 1], 1_000.0),
        Some('M' | 'm') => (&compact[..compact.len() - 1], 1_000_000.0),
        _ => (compact.as_str(), 1.0),
    };
    number
        .parse::<f64>()
        .map(|n| (n * multiplier).round().max(0.0) as u64)
        .unwrap_or(0)
}

/// One comment record as emitted by the extraction source.
///
/// Field names follow youtube-comment-downloader; yt-dlp names are accepted
/// through aliases.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawComment {
    #[serde(alias = "cid")]
    pub id: Option<String>,
    #[serde(default)]
    pub text: String,
    pub author: Option<String>,
    #[serde(alias = "author_id")]
    pub channel_id: Option<String>,
    #[serde(alias = "like_count")]
    pub votes: Option<VoteCount>,
    pub time_text: Option<String>,
    pub timestamp: Option<i64>,
    pub reply_count: Option<u64>,
    pub parent: Option<String>,
}

impl RawComment {
    pub fn likes(&self) -> u64 {
        self.votes.as_ref().map(VoteCount::value).unwrap_or(0)
    }

    pub fn published_at(&self) -> DateTime<Utc> {
        self.timestamp
            .or_else(|| {
                self.time_text
                    .as_deref()
                    .and_then(|text| text.trim().parse::<i64>().ok())
            })
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
            .unwrap_or_else(Utc::now)
    }

    pub fn parent_comment_id(&self) -> Option<String> {
        self.parent
            .as_deref()
            .filter(|parent| !parent.is_empty() && *parent != "root")
            .map(str::to_string)
    }

    pub fn is_reply(&self) -> bool {
        match &self.parent {
            Some(_) => self.parent_comment_id().is_some(),
            None => self.reply_count.unwrap_or(0) > 0,
        }
    }
}

/// Lazy, possibly slow and possibly endless sequence of raw comments.
/// Each item decodes independently; an `Err` item is skipped by the consumer.
pub type RawCommentStream = Box<dyn Iterator<Item = Result<RawComment>> + Send>;

/// Blocking extraction source. Implementations offer no cancellation, so
/// callers run them on a dedicated thread.
pub trait CommentSource: Send + Sync + 'static {
    fn comments(&self, url: &str) -> Result<RawCommentStream>;
}

/// One search hit as emitted by the search source.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchEntry {
    pub id: String,
    pub title: Option<String>,
    pub uploader: Option<String>,
    pub view_count: Option<u64>,
    pub like_count: Option<u64>,
    /// `YYYYMMDD`
    pub upload_date: Option<String>,
    pub timestamp: Option<i64>,
    pub duration: Option<f64>,
}

#[async_trait]
pub trait SearchSource: Send + Sync {
    /// Raw entries for `query`, undecoded so that one bad entry does not sink
    /// the batch. "No results" is `Ok(vec![])`.
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<serde_json::Value>>;
}
