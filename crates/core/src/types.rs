use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An admitted comment: passed language filtering and validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub comment_id: String,
    pub text: String,
    pub author: String,
    pub author_id: String,
    pub timestamp: DateTime<Utc>,
    pub likes: u64,
    pub video_id: String,
    pub video_title: String,
    pub is_reply: bool,
    pub parent_comment_id: Option<String>,
    pub language: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Video {
    pub video_id: String,
    pub title: String,
    pub channel: String,
    pub views: u64,
    pub likes: u64,
    pub upload_date: DateTime<Utc>,
    /// Seconds
    pub duration: u64,
    pub url: String,
}

/// Counters for one scrape run. Owned by a single run and never shared.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeStats {
    pub run_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub videos_found: usize,
    pub videos_processed: usize,
    pub comments_extracted: usize,
    pub comments_filtered: usize,
    pub errors: Vec<String>,
}

impl ScrapeStats {
    pub fn start() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            start_time: Utc::now(),
            end_time: None,
            videos_found: 0,
            videos_processed: 0,
            comments_extracted: 0,
            comments_filtered: 0,
            errors: Vec::new(),
        }
    }

    pub fn record_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    /// Sets `end_time` on the first call only.
    pub fn finish(&mut self) {
        if self.end_time.is_none() {
            self.end_time = Some(Utc::now());
        }
    }

    pub fn is_finished(&self) -> bool {
        self.end_time.is_some()
    }

    pub fn elapsed_seconds(&self) -> Option<f64> {
        self.end_time
            .map(|end| (end - self.start_time).num_milliseconds() as f64 / 1000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finish_only_sets_end_time_once() {
        let mut stats = ScrapeStats::start();
        assert!(!stats.is_finished());

        stats.finish();
        let first = stats.end_time;
        std::thread::sleep(std::time::Duration::from_millis(5));
        stats.finish();

        assert_eq!(stats.end_time, first);
        assert!(stats.elapsed_seconds().unwrap() >= 0.0);
    }

    #[test]
    fn stats_serialize_with_errors() {
        let mut stats = ScrapeStats::start();
        stats.record_error("Error in video abc: boom");
        stats.finish();

        let value = serde_json::to_value(&stats).unwrap();
        assert_eq!(value["errors"][0], "Error in video abc: boom");
        assert!(value["end_time"].is_string());
    }
}
