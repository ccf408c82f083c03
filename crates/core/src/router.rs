//! Routes sentiment batches to the remote inference service, falling back to
//! an in-process classifier while the service is unhealthy.
//!
//! The probe result is cached for [`RouterConfig::health_ttl`]. The cache lock
//! is held across the probe, so concurrent callers wait for one probe instead
//! of issuing their own. A failed remote call marks the service unhealthy until
//! the cache expires.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::{
    classifier::LocalClassifier,
    config::RouterConfig,
    error::{Result, TermometroError},
    sentiment::{BatchScores, Provenance, Sentiment, SentimentOutcome},
};

#[derive(Debug, Default)]
struct HealthCache {
    healthy: bool,
    checked_at: Option<Instant>,
}

impl HealthCache {
    fn fresh(&self, ttl: Duration) -> bool {
        self.checked_at.is_some_and(|at| at.elapsed() < ttl)
    }

    fn record(&mut self, healthy: bool) {
        self.healthy = healthy;
        self.checked_at = Some(Instant::now());
    }
}

#[derive(Serialize)]
struct AnalyzeRequest<'a> {
    texts: &'a [String],
    use_simplified: bool,
}

#[derive(Deserialize)]
struct AnalyzeResponse {
    sentiments: Vec<Option<String>>,
    scores: Vec<f64>,
    confidences: Vec<f64>,
}

pub struct SentimentRouter {
    client: Client,
    config: RouterConfig,
    health: Mutex<HealthCache>,
    fallback: Option<Arc<dyn LocalClassifier>>,
}

impl SentimentRouter {
    pub fn new(config: RouterConfig) -> Result<Self> {
        let client = Client::builder().build()?;
        Ok(Self {
            client,
            config,
            health: Mutex::new(HealthCache::default()),
            fallback: None,
        })
    }

    pub fn with_fallback(mut self, classifier: Arc<dyn LocalClassifier>) -> Self {
        self.fallback = Some(classifier);
        self
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Classifies every text, remotely when the service is healthy and
    /// locally otherwise. Either the whole batch succeeds or the call fails.
    pub async fn analyze(
        &self,
        texts: &[String],
        use_simplified: bool,
    ) -> Result<Vec<SentimentOutcome>> {
        if texts.is_empty() {
            return Err(TermometroError::EmptyBatch);
        }

        if self.ensure_health().await {
            match self.analyze_remote(texts, use_simplified).await {
                Ok(scores) => {
                    info!(count = texts.len(), "remote sentiment analysis succeeded");
                    return Ok(scores.into_outcomes(texts, Provenance::Remote));
                }
                Err(e) => {
                    warn!(error = %e, "sentiment service failed, marking unhealthy");
                    self.health.lock().await.record(false);
                }
            }
        } else {
            debug!("sentiment service unhealthy, skipping remote call");
        }

        self.analyze_local(texts, use_simplified)
    }

    /// Probes the service now and refreshes the cached state.
    pub async fn health(&self) -> bool {
        let mut cache = self.health.lock().await;
        let healthy = self.probe().await;
        cache.record(healthy);
        healthy
    }

    async fn ensure_health(&self) -> bool {
        let mut cache = self.health.lock().await;
        if cache.fresh(self.config.health_ttl) {
            return cache.healthy;
        }
        let healthy = self.probe().await;
        cache.record(healthy);
        healthy
    }

    async fn probe(&self) -> bool {
        let url = format!("{}/health", self.config.service_url);
        match self
            .client
            .get(&url)
            .timeout(self.config.probe_timeout)
            .send()
            .await
        {
            Ok(response) if response.status() == StatusCode::OK => {
                debug!(%url, "sentiment service healthy");
                true
            }
            Ok(response) => {
                warn!(%url, status = response.status().as_u16(), "sentiment service not ready");
                false
            }
            Err(e) => {
                warn!(%url, error = %e, "sentiment service unreachable");
                false
            }
        }
    }

    async fn analyze_remote(&self, texts: &[String], use_simplified: bool) -> Result<BatchScores> {
        let response = self
            .client
            .post(format!("{}/analyze", self.config.service_url))
            .timeout(self.config.request_timeout)
            .json(&AnalyzeRequest {
                texts,
                use_simplified,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TermometroError::RemoteStatus {
                status: status.as_u16(),
            });
        }

        let body: AnalyzeResponse = response.json().await?;
        let sentiments = body
            .sentiments
            .into_iter()
            .map(|label| label.map(|l| l.parse::<Sentiment>()).transpose())
            .collect::<Result<Vec<_>>>()
            .map_err(|e| TermometroError::MalformedResponse {
                reason: e.to_string(),
            })?;
        // Simplified callers only ever see three classes, whatever the service sends.
        let sentiments = if use_simplified {
            sentiments
                .into_iter()
                .map(|s| s.map(Sentiment::simplified))
                .collect()
        } else {
            sentiments
        };

        let scores = BatchScores {
            sentiments,
            scores: body.scores,
            confidences: body.confidences,
        };
        if !scores.is_complete(texts.len()) {
            return Err(TermometroError::MalformedResponse {
                reason: format!(
                    "expected {} results, got {} sentiments, {} scores, {} confidences",
                    texts.len(),
                    scores.sentiments.len(),
                    scores.scores.len(),
                    scores.confidences.len()
                ),
            });
        }
        Ok(scores)
    }

    fn analyze_local(&self, texts: &[String], use_simplified: bool) -> Result<Vec<SentimentOutcome>> {
        let classifier = match &self.fallback {
            Some(classifier) if self.config.fallback_to_local => classifier,
            _ => return Err(TermometroError::FallbackUnavailable),
        };

        warn!(classifier = classifier.name(), count = texts.len(), "using local sentiment fallback");
        let scores = classifier.classify_batch(texts, use_simplified)?;
        if !scores.is_complete(texts.len()) {
            return Err(TermometroError::ClassifierFailed {
                reason: format!("expected {} results, got {}", texts.len(), scores.len()),
            });
        }
        Ok(scores.into_outcomes(texts, Provenance::Local))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::classifier::LexiconClassifier;

    fn config(server: &MockServer) -> RouterConfig {
        RouterConfig {
            service_url: server.uri(),
            request_timeout: Duration::from_secs(2),
            probe_timeout: Duration::from_millis(300),
            ..RouterConfig::default()
        }
    }

    fn router(config: RouterConfig) -> SentimentRouter {
        SentimentRouter::new(config)
            .expect("router should build")
            .with_fallback(Arc::new(LexiconClassifier::new()))
    }

    fn texts(items: &[&str]) -> Vec<String> {
        items.iter().map(|t| t.to_string()).collect()
    }

    async fn mount_health(server: &MockServer, status: u16, calls: u64) {
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(status))
            .expect(calls)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn healthy_service_answers_remotely() {
        let server = MockServer::start().await;
        mount_health(&server, 200, 1).await;
        Mock::given(method("POST"))
            .and(path("/analyze"))
            .and(body_partial_json(json!({"use_simplified": false})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "sentiments": ["5 stars", "1 star"],
                "scores": [1.0, 0.2],
                "confidences": [0.9, 0.8],
            })))
            .expect(1)
            .mount(&server)
            .await;

        let outcomes = router(config(&server))
            .analyze(&texts(&["buenísimo", "pésimo"]), false)
            .await
            .expect("analysis should succeed");

        assert_eq!(outcomes[0].sentiment, Some(Sentiment::Stars(5)));
        assert_eq!(outcomes[1].sentiment, Some(Sentiment::Stars(1)));
        assert_eq!(outcomes[1].text, "pésimo");
        assert!(outcomes.iter().all(|o| o.provenance == Provenance::Remote));
    }

    #[tokio::test]
    async fn star_labels_are_simplified_on_request() {
        let server = MockServer::start().await;
        mount_health(&server, 200, 1).await;
        Mock::given(method("POST"))
            .and(path("/analyze"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "sentiments": ["5 stars", "3 stars", "2 stars", null],
                "scores": [1.0, 0.6, 0.4, 0.6],
                "confidences": [0.9, 0.5, 0.7, 0.0],
            })))
            .mount(&server)
            .await;

        let outcomes = router(config(&server))
            .analyze(&texts(&["a", "b", "c", "d"]), true)
            .await
            .unwrap();

        let labels: Vec<_> = outcomes.iter().map(|o| o.sentiment).collect();
        assert_eq!(
            labels,
            vec![
                Some(Sentiment::Positive),
                Some(Sentiment::Neutral),
                Some(Sentiment::Negative),
                None,
            ]
        );
        assert!(outcomes.iter().all(|o| o.provenance == Provenance::Remote));
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_probe() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(503).set_delay(Duration::from_millis(150)))
            .expect(1)
            .mount(&server)
            .await;

        let router = router(RouterConfig {
            probe_timeout: Duration::from_secs(2),
            ..config(&server)
        });
        let batch = texts(&["hola a todos"]);
        let (a, b, c, d) = tokio::join!(
            router.analyze(&batch, true),
            router.analyze(&batch, true),
            router.analyze(&batch, true),
            router.analyze(&batch, true),
        );

        for outcomes in [a, b, c, d] {
            assert_eq!(outcomes.unwrap()[0].provenance, Provenance::Local);
        }
    }

    #[tokio::test]
    async fn slow_analysis_falls_back_in_time() {
        let server = MockServer::start().await;
        mount_health(&server, 200, 1).await;
        Mock::given(method("POST"))
            .and(path("/analyze"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({
                        "sentiments": ["positive"],
                        "scores": [0.8],
                        "confidences": [0.9],
                    }))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let router = router(RouterConfig {
            request_timeout: Duration::from_millis(300),
            ..config(&server)
        });
        let started = Instant::now();
        let outcomes = router.analyze(&texts(&["me encanta"]), true).await.unwrap();

        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(outcomes[0].provenance, Provenance::Local);
        assert_eq!(outcomes[0].sentiment, Some(Sentiment::Positive));
    }

    #[tokio::test]
    async fn unhealthy_service_is_never_called() {
        let server = MockServer::start().await;
        mount_health(&server, 503, 1).await;
        Mock::given(method("POST"))
            .and(path("/analyze"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let router = router(config(&server));
        for _ in 0..2 {
            let outcomes = router
                .analyze(&texts(&["me encanta", "terrible"]), true)
                .await
                .expect("fallback should succeed");
            assert!(outcomes.iter().all(|o| o.provenance == Provenance::Local));
        }
    }

    #[tokio::test]
    async fn remote_failure_falls_back_and_marks_unhealthy() {
        let server = MockServer::start().await;
        mount_health(&server, 200, 1).await;
        Mock::given(method("POST"))
            .and(path("/analyze"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let router = router(config(&server));
        let first = router.analyze(&texts(&["terrible"]), true).await.unwrap();
        let second = router.analyze(&texts(&["terrible"]), true).await.unwrap();

        assert_eq!(first[0].provenance, Provenance::Local);
        assert_eq!(first[0].sentiment, Some(Sentiment::Negative));
        assert_eq!(second[0].provenance, Provenance::Local);
    }

    #[tokio::test]
    async fn mismatched_response_falls_back() {
        let server = MockServer::start().await;
        mount_health(&server, 200, 1).await;
        Mock::given(method("POST"))
            .and(path("/analyze"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "sentiments": ["positive"],
                "scores": [0.8],
                "confidences": [0.9],
            })))
            .mount(&server)
            .await;

        let outcomes = router(config(&server))
            .analyze(&texts(&["uno bueno", "otro malo"]), true)
            .await
            .unwrap();

        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(|o| o.provenance == Provenance::Local));
    }

    #[tokio::test]
    async fn slow_probe_counts_as_unhealthy() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let started = Instant::now();
        let outcomes = router(config(&server))
            .analyze(&texts(&["tema neutral"]), true)
            .await
            .unwrap();

        assert_eq!(outcomes[0].provenance, Provenance::Local);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn expired_probe_is_repeated() {
        let server = MockServer::start().await;
        mount_health(&server, 503, 2).await;

        let router = router(RouterConfig {
            health_ttl: Duration::ZERO,
            ..config(&server)
        });
        router.analyze(&texts(&["hola"]), true).await.unwrap();
        router.analyze(&texts(&["hola"]), true).await.unwrap();
    }

    #[tokio::test]
    async fn empty_batch_is_rejected_without_probing() {
        let server = MockServer::start().await;
        mount_health(&server, 200, 0).await;

        let err = router(config(&server)).analyze(&[], true).await.unwrap_err();
        assert!(matches!(err, TermometroError::EmptyBatch));
    }

    #[tokio::test]
    async fn disabled_fallback_surfaces_unavailability() {
        let server = MockServer::start().await;
        mount_health(&server, 503, 1).await;

        let router = router(RouterConfig {
            fallback_to_local: false,
            ..config(&server)
        });
        let err = router.analyze(&texts(&["hola"]), true).await.unwrap_err();
        assert!(matches!(err, TermometroError::FallbackUnavailable));
    }

    #[tokio::test]
    async fn health_probe_requires_ok() {
        let server = MockServer::start().await;
        mount_health(&server, 204, 1).await;

        assert!(!router(config(&server)).health().await);
    }
}
