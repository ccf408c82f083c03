use std::{str::FromStr, time::Duration};

use crate::error::{Result, TermometroError};

/// Hard wall-clock limit for a single video's comment extraction.
pub const EXTRACTION_DEADLINE: Duration = Duration::from_secs(45);

/// How long a health probe result stays valid.
pub const HEALTH_CHECK_TTL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct ScraperConfig {
    pub max_videos: usize,
    pub hours_back: u32,
    pub max_comments_per_video: usize,
    /// `None` disables language filtering.
    pub language: Option<String>,
    pub extraction_deadline: Duration,
    pub delay_between_videos: Duration,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            max_videos: 10,
            hours_back: 24,
            max_comments_per_video: 300,
            language: Some("es".to_string()),
            extraction_deadline: EXTRACTION_DEADLINE,
            delay_between_videos: Duration::from_secs(2),
        }
    }
}

impl ScraperConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let language = match lookup("COMMENT_LANGUAGE") {
            Some(value) if value.trim().is_empty() => None,
            Some(value) => Some(value.trim().to_string()),
            None => defaults.language,
        };

        Ok(Self {
            max_videos: parse_or(&lookup, "MAX_VIDEOS_PER_SEARCH", defaults.max_videos)?,
            hours_back: parse_or(&lookup, "HOURS_BACK", defaults.hours_back)?,
            max_comments_per_video: parse_or(
                &lookup,
                "MAX_COMMENTS_PER_VIDEO",
                defaults.max_comments_per_video,
            )?,
            language,
            extraction_deadline: secs_or(
                &lookup,
                "EXTRACTION_DEADLINE_SECS",
                defaults.extraction_deadline,
            )?,
            delay_between_videos: secs_or(
                &lookup,
                "DELAY_BETWEEN_VIDEOS_SECS",
                defaults.delay_between_videos,
            )?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct RouterConfig {
    pub service_url: String,
    pub request_timeout: Duration,
    pub probe_timeout: Duration,
    pub health_ttl: Duration,
    pub fallback_to_local: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            service_url: "http://localhost:8001".to_string(),
            request_timeout: Duration::from_secs(30),
            probe_timeout: Duration::from_secs(5),
            health_ttl: HEALTH_CHECK_TTL,
            fallback_to_local: true,
        }
    }
}

impl RouterConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Ok(Self {
            service_url: lookup("SENTIMENT_SERVICE_URL")
                .map(|url| url.trim().trim_end_matches('/').to_string())
                .filter(|url| !url.is_empty())
                .unwrap_or(defaults.service_url),
            request_timeout: secs_or(&lookup, "SENTIMENT_TIMEOUT_SECS", defaults.request_timeout)?,
            probe_timeout: secs_or(
                &lookup,
                "SENTIMENT_PROBE_TIMEOUT_SECS",
                defaults.probe_timeout,
            )?,
            health_ttl: secs_or(&lookup, "SENTIMENT_HEALTH_TTL_SECS", defaults.health_ttl)?,
            fallback_to_local: parse_or(
                &lookup,
                "SENTIMENT_FALLBACK_TO_LOCAL",
                defaults.fallback_to_local,
            )?,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| TermometroError::InvalidConfig {
                key: key.to_string(),
                value,
            }),
        None => Ok(default),
    }
}

fn secs_or<F>(lookup: &F, key: &str, default: Duration) -> Result<Duration>
where
    F: Fn(&str) -> Option<String>,
{
    let secs: f64 = parse_or(lookup, key, default.as_secs_f64())?;
    Duration::try_from_secs_f64(secs).map_err(|_| TermometroError::InvalidConfig {
        key: key.to_string(),
        value: secs.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = ScraperConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.max_comments_per_video, 300);
        assert_eq!(config.extraction_deadline, EXTRACTION_DEADLINE);
        assert_eq!(config.language.as_deref(), Some("es"));
    }

    #[test]
    fn env_values_override_defaults() {
        let config = ScraperConfig::from_lookup(lookup(&[
            ("MAX_VIDEOS_PER_SEARCH", "3"),
            ("COMMENT_LANGUAGE", ""),
            ("DELAY_BETWEEN_VIDEOS_SECS", "0.5"),
        ]))
        .unwrap();
        assert_eq!(config.max_videos, 3);
        assert_eq!(config.language, None);
        assert_eq!(config.delay_between_videos, Duration::from_millis(500));
    }

    #[test]
    fn invalid_values_name_the_key() {
        let err = RouterConfig::from_lookup(lookup(&[("SENTIMENT_TIMEOUT_SECS", "soon")]))
            .unwrap_err();
        assert!(err.to_string().contains("SENTIMENT_TIMEOUT_SECS"));

        let err = RouterConfig::from_lookup(lookup(&[("SENTIMENT_PROBE_TIMEOUT_SECS", "-1")]))
            .unwrap_err();
        assert!(matches!(err, TermometroError::InvalidConfig { .. }));
    }

    #[test]
    fn service_url_is_normalised() {
        let config =
            RouterConfig::from_lookup(lookup(&[("SENTIMENT_SERVICE_URL", "http://svc:8001/")]))
                .unwrap();
        assert_eq!(config.service_url, "http://svc:8001");
        assert!(config.fallback_to_local);
    }
}
