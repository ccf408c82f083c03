pub mod buffer;
pub mod classifier;
pub mod config;
pub mod error;
pub mod extractor;
pub mod format;
pub mod keywords;
pub mod orchestrator;
pub mod router;
pub mod search;
pub mod sentiment;
pub mod source;
pub mod text;
pub mod types;
pub mod ytdlp;

pub use classifier::{LexiconClassifier, LocalClassifier};
pub use config::{EXTRACTION_DEADLINE, HEALTH_CHECK_TTL, RouterConfig, ScraperConfig};
pub use error::{Result, TermometroError};
pub use extractor::{CommentExtractor, ExtractionOutcome, ExtractionReport};
pub use format::{
    format_comments_readable, format_outcomes_readable, format_stats_readable,
    format_summary_readable, format_tally_readable, format_videos_readable,
};
pub use keywords::KeywordClassifier;
pub use orchestrator::ScrapeOrchestrator;
pub use router::SentimentRouter;
pub use search::VideoSearchEngine;
pub use sentiment::{Provenance, Sentiment, SentimentOutcome, SentimentSummary, aggregate};
pub use source::{CommentSource, ContentType, SearchSource, parse_video_url};
pub use text::TextProcessor;
pub use types::{Comment, ScrapeStats, Video};
pub use ytdlp::{YtDlpCommentSource, YtDlpSearchSource};
