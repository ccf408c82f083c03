use std::time::Duration;

use tracing::{error, info, warn};

use crate::{
    config::ScraperConfig,
    extractor::{CommentExtractor, ExtractionOutcome},
    search::VideoSearchEngine,
    source::ContentType,
    types::{Comment, ScrapeStats},
};

/// Search, then extract comments from each of the most viewed results.
pub struct ScrapeOrchestrator {
    search: VideoSearchEngine,
    extractor: CommentExtractor,
    delay_between_videos: Duration,
}

impl ScrapeOrchestrator {
    pub fn new(search: VideoSearchEngine, extractor: CommentExtractor) -> Self {
        Self {
            search,
            extractor,
            delay_between_videos: Duration::ZERO,
        }
    }

    pub fn from_config(
        search: VideoSearchEngine,
        extractor: CommentExtractor,
        config: &ScraperConfig,
    ) -> Self {
        Self::new(search, extractor).with_delay_between_videos(config.delay_between_videos)
    }

    pub fn with_delay_between_videos(mut self, delay: Duration) -> Self {
        self.delay_between_videos = delay;
        self
    }

    /// Runs one scrape. A video that fails is recorded in the stats and
    /// skipped; the returned stats are always finished.
    pub async fn run(
        &self,
        query: &str,
        max_videos: usize,
        max_comments_per_video: usize,
        hours_back: u32,
    ) -> (Vec<Comment>, ScrapeStats) {
        let mut stats = ScrapeStats::start();
        let mut comments = Vec::new();

        info!(run_id = %stats.run_id, query, max_videos, "scrape started");

        let videos = match self.search.try_search(query, max_videos, hours_back).await {
            Ok(videos) => videos,
            Err(e) => {
                let message = format!("Critical scraping error: {e}");
                error!(run_id = %stats.run_id, "{message}");
                stats.record_error(message);
                stats.finish();
                return (comments, stats);
            }
        };

        stats.videos_found = videos.len();
        if videos.is_empty() {
            warn!(run_id = %stats.run_id, query, "no videos to scrape");
            stats.finish();
            return (comments, stats);
        }

        let extractor = self.extractor.clone().with_max_comments(max_comments_per_video);

        for (index, video) in videos.iter().take(max_videos).enumerate() {
            if index > 0 && !self.delay_between_videos.is_zero() {
                tokio::time::sleep(self.delay_between_videos).await;
            }

            info!(
                run_id = %stats.run_id,
                video_id = %video.video_id,
                title = %video.title,
                views = video.views,
                "processing video"
            );

            let report = extractor
                .extract_report(&video.video_id, &video.title, ContentType::Video)
                .await;

            stats.comments_filtered += report.filtered;
            stats.comments_extracted += report.comments.len();

            match report.outcome {
                ExtractionOutcome::Completed | ExtractionOutcome::TimedOut => {
                    stats.videos_processed += 1;
                }
                ExtractionOutcome::Failed(reason) => {
                    let message = format!("Error in video {}: {reason}", video.video_id);
                    error!(run_id = %stats.run_id, "{message}");
                    stats.record_error(message);
                }
            }

            comments.extend(report.comments);
        }

        stats.finish();
        info!(
            run_id = %stats.run_id,
            videos_processed = stats.videos_processed,
            comments_extracted = stats.comments_extracted,
            comments_filtered = stats.comments_filtered,
            errors = stats.errors.len(),
            "scrape completed"
        );

        (comments, stats)
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, sync::Arc};

    use async_trait::async_trait;
    use serde_json::{Value, json};

    use super::*;
    use crate::{
        error::{Result, TermometroError},
        source::{CommentSource, RawComment, RawCommentStream, SearchSource},
        text::TextProcessor,
    };

    struct StaticSearch(Option<Vec<Value>>);

    #[async_trait]
    impl SearchSource for StaticSearch {
        async fn search(&self, query: &str, _max_results: usize) -> Result<Vec<Value>> {
            self.0.clone().ok_or_else(|| TermometroError::SearchFailed {
                query: query.to_string(),
                reason: "blocked".to_string(),
            })
        }
    }

    /// Comments per canonical URL; URLs without an entry fail.
    struct UrlComments(HashMap<String, Vec<&'static str>>);

    impl CommentSource for UrlComments {
        fn comments(&self, url: &str) -> Result<RawCommentStream> {
            let texts = self
                .0
                .get(url)
                .cloned()
                .ok_or_else(|| TermometroError::SourceFailed {
                    url: url.to_string(),
                    reason: "comments disabled".to_string(),
                })?;
            Ok(Box::new(texts.into_iter().map(|text| {
                Ok(RawComment {
                    text: text.to_string(),
                    ..RawComment::default()
                })
            })))
        }
    }

    fn orchestrator(entries: Option<Vec<Value>>, comments: UrlComments) -> ScrapeOrchestrator {
        let search = VideoSearchEngine::new(Arc::new(StaticSearch(entries)));
        let extractor = CommentExtractor::new(Arc::new(comments), TextProcessor::new(None));
        ScrapeOrchestrator::new(search, extractor)
    }

    fn url(id: &str) -> String {
        ContentType::Video.canonical_url(id)
    }

    #[tokio::test]
    async fn failing_video_does_not_abort_the_run() {
        let comments = UrlComments(HashMap::from([
            (url("a"), vec!["comentario uno", "x"]),
            (url("c"), vec!["comentario tres"]),
        ]));
        let orchestrator = orchestrator(
            Some(vec![
                json!({"id": "a", "view_count": 30}),
                json!({"id": "b", "view_count": 20}),
                json!({"id": "c", "view_count": 10}),
            ]),
            comments,
        );

        let (comments, stats) = orchestrator.run("elecciones", 3, 50, 24).await;

        let texts: Vec<_> = comments.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["comentario uno", "comentario tres"]);
        assert_eq!(stats.videos_found, 3);
        assert_eq!(stats.videos_processed, 2);
        assert_eq!(stats.comments_extracted, 2);
        assert_eq!(stats.comments_filtered, 1);
        assert_eq!(stats.errors.len(), 1);
        assert!(stats.errors[0].starts_with("Error in video b"));
        assert!(stats.is_finished());
    }

    #[tokio::test]
    async fn respects_max_videos_and_comment_limit() {
        let comments = UrlComments(HashMap::from([
            (url("a"), vec!["primero a", "segundo a", "tercero a"]),
            (url("b"), vec!["primero b"]),
        ]));
        let orchestrator = orchestrator(
            Some(vec![
                json!({"id": "b", "view_count": 1}),
                json!({"id": "a", "view_count": 2}),
            ]),
            comments,
        );

        let (comments, stats) = orchestrator.run("elecciones", 1, 2, 24).await;

        let texts: Vec<_> = comments.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["primero a", "segundo a"]);
        assert_eq!(stats.videos_processed, 1);
    }

    #[tokio::test]
    async fn no_videos_is_a_finished_empty_run() {
        let orchestrator = orchestrator(Some(Vec::new()), UrlComments(HashMap::new()));

        let (comments, stats) = orchestrator.run("nada", 5, 10, 24).await;

        assert!(comments.is_empty());
        assert_eq!(stats.videos_found, 0);
        assert!(stats.errors.is_empty());
        assert!(stats.is_finished());
    }

    #[tokio::test]
    async fn search_failure_is_recorded_and_finished() {
        let orchestrator = orchestrator(None, UrlComments(HashMap::new()));

        let (comments, stats) = orchestrator.run("elecciones", 5, 10, 24).await;

        assert!(comments.is_empty());
        assert_eq!(stats.errors.len(), 1);
        assert!(stats.errors[0].contains("blocked"));
        assert!(stats.is_finished());
    }
}
