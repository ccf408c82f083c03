use thiserror::Error;

#[derive(Error, Debug)]
pub enum TermometroError {
    #[error("Search failed for {query}: {reason}")]
    SearchFailed { query: String, reason: String },

    #[error("Invalid search entry: {reason}")]
    InvalidEntry { reason: String },

    #[error("Comment source failed for {url}: {reason}")]
    SourceFailed { url: String, reason: String },

    #[error("Sentiment batch must contain at least one text")]
    EmptyBatch,

    #[error("Sentiment service responded with status {status}")]
    RemoteStatus { status: u16 },

    #[error("Malformed sentiment response: {reason}")]
    MalformedResponse { reason: String },

    #[error("Sentiment service unavailable and local fallback is disabled")]
    FallbackUnavailable,

    #[error("Local classifier failed: {reason}")]
    ClassifierFailed { reason: String },

    #[error("Unknown sentiment label: {0}")]
    UnknownLabel(String),

    #[error("Invalid value for {key}: {value}")]
    InvalidConfig { key: String, value: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, TermometroError>;
