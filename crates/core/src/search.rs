use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::{
    error::{Result, TermometroError},
    source::{ContentType, SearchEntry, SearchSource},
    types::Video,
};

/// Finds recent videos for a query, most viewed first.
pub struct VideoSearchEngine {
    source: Arc<dyn SearchSource>,
}

impl VideoSearchEngine {
    pub fn new(source: Arc<dyn SearchSource>) -> Self {
        Self { source }
    }

    /// Like [`VideoSearchEngine::try_search`], but a failed search is logged
    /// and reported as no results.
    pub async fn search(&self, query: &str, max_results: usize, hours_back: u32) -> Vec<Video> {
        match self.try_search(query, max_results, hours_back).await {
            Ok(videos) => videos,
            Err(e) => {
                error!(query, error = %e, "video search failed");
                Vec::new()
            }
        }
    }

    /// Videos uploaded within the last `hours_back` hours, sorted by views
    /// descending. Entries without an upload time count as fresh; entries that
    /// fail to decode are skipped.
    pub async fn try_search(
        &self,
        query: &str,
        max_results: usize,
        hours_back: u32,
    ) -> Result<Vec<Video>> {
        info!(query, max_results, hours_back, "searching videos");

        let entries = self.source.search(query, max_results).await?;
        if entries.is_empty() {
            warn!(query, "no videos found");
            return Ok(Vec::new());
        }

        let now = Utc::now();
        // A window reaching past the earliest representable time has no cutoff.
        let cutoff = now
            .checked_sub_signed(Duration::hours(i64::from(hours_back)))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        let mut videos: Vec<Video> = entries
            .into_iter()
            .filter_map(|entry| match video_from_entry(entry, now) {
                Ok(video) => Some(video),
                Err(e) => {
                    warn!(query, error = %e, "skipping search entry");
                    None
                }
            })
            .filter(|video| {
                let fresh = video.upload_date >= cutoff;
                if !fresh {
                    debug!(video_id = %video.video_id, upload_date = %video.upload_date, "video older than cutoff");
                }
                fresh
            })
            .collect();

        // Stable: equal view counts keep the source's order.
        videos.sort_by(|a, b| b.views.cmp(&a.views));

        info!(query, found = videos.len(), "videos found");
        Ok(videos)
    }
}

fn video_from_entry(entry: Value, now: DateTime<Utc>) -> Result<Video> {
    let entry: SearchEntry =
        serde_json::from_value(entry).map_err(|e| TermometroError::InvalidEntry {
            reason: e.to_string(),
        })?;

    let upload_date = match (entry.timestamp, entry.upload_date.as_deref()) {
        (Some(timestamp), _) => Utc.timestamp_opt(timestamp, 0).single().ok_or_else(|| {
            TermometroError::InvalidEntry {
                reason: format!("timestamp {timestamp} out of range for {}", entry.id),
            }
        })?,
        (None, Some(date)) => parse_upload_date(date).ok_or_else(|| {
            TermometroError::InvalidEntry {
                reason: format!("upload_date {date:?} is not YYYYMMDD for {}", entry.id),
            }
        })?,
        (None, None) => now,
    };

    Ok(Video {
        url: ContentType::Video.canonical_url(&entry.id),
        title: entry.title.unwrap_or_else(|| "Unknown".to_string()),
        channel: entry.uploader.unwrap_or_else(|| "Unknown".to_string()),
        views: entry.view_count.unwrap_or(0),
        likes: entry.like_count.unwrap_or(0),
        upload_date,
        duration: entry.duration.map(|secs| secs.max(0.0).round() as u64).unwrap_or(0),
        video_id: entry.id,
    })
}

/// `YYYYMMDD` at midnight UTC.
fn parse_upload_date(date: &str) -> Option<DateTime<Utc>> {
    NaiveDate::parse_from_str(date, "%Y%m%d")
        .ok()?
        .and_hms_opt(0, 0, 0)
        .map(|naive| naive.and_utc())
}
