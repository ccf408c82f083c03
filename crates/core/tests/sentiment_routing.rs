use std::{sync::Arc, time::Duration};

use serde_json::json;
use termometro_core::{
    LexiconClassifier, Provenance, RouterConfig, Sentiment, SentimentRouter, aggregate,
};
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn batch() -> Vec<String> {
    ["me encanta", "terrible", "tema neutral"]
        .iter()
        .map(|t| t.to_string())
        .collect()
}

fn router(server: &MockServer) -> SentimentRouter {
    let config = RouterConfig {
        service_url: server.uri(),
        request_timeout: Duration::from_secs(2),
        probe_timeout: Duration::from_millis(500),
        ..RouterConfig::default()
    };
    SentimentRouter::new(config)
        .expect("router should build")
        .with_fallback(Arc::new(LexiconClassifier::new()))
}

#[tokio::test]
async fn healthy_remote_batch_aggregates_each_class_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/analyze"))
        .and(body_json(json!({
            "texts": ["me encanta", "terrible", "tema neutral"],
            "use_simplified": true,
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sentiments": ["positive", "negative", "neutral"],
            "scores": [0.9, 0.1, 0.5],
            "confidences": [0.95, 0.9, 0.6],
        })))
        .expect(1)
        .mount(&server)
        .await;

    let outcomes = router(&server)
        .analyze(&batch(), true)
        .await
        .expect("analysis should succeed");
    let summary = aggregate(&outcomes);

    assert!(outcomes.iter().all(|o| o.provenance == Provenance::Remote));
    assert_eq!(summary.total, 3);
    assert_eq!(summary.positive_count, 1);
    assert_eq!(summary.negative_count, 1);
    assert_eq!(summary.neutral_count, 1);
    assert!((summary.avg_score - 0.5).abs() < 1e-9);
}

#[tokio::test]
async fn unreachable_service_degrades_to_local_with_same_classes() {
    let closed_port = std::net::TcpListener::bind("127.0.0.1:0")
        .and_then(|listener| listener.local_addr())
        .expect("ephemeral port")
        .port();

    let config = RouterConfig {
        service_url: format!("http://127.0.0.1:{closed_port}"),
        probe_timeout: Duration::from_millis(500),
        ..RouterConfig::default()
    };
    let router = SentimentRouter::new(config)
        .expect("router should build")
        .with_fallback(Arc::new(LexiconClassifier::new()));

    let outcomes = router.analyze(&batch(), true).await.unwrap();

    assert!(outcomes.iter().all(|o| o.provenance == Provenance::Local));
    let sentiments: Vec<_> = outcomes.iter().map(|o| o.sentiment).collect();
    assert_eq!(
        sentiments,
        vec![
            Some(Sentiment::Positive),
            Some(Sentiment::Negative),
            Some(Sentiment::Neutral),
        ]
    );
    assert!(!router.health().await);
}
