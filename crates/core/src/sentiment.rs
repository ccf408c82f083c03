use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::TermometroError;

/// A sentiment label: the three-class reduction or a 1 to 5 star rating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
    Stars(u8),
}

impl Sentiment {
    /// Label for a star rating, reduced to three classes when `simplified`.
    pub fn from_stars(stars: u8, simplified: bool) -> Self {
        let stars = stars.clamp(1, 5);
        if simplified {
            Sentiment::Stars(stars).simplified()
        } else {
            Sentiment::Stars(stars)
        }
    }

    /// 1 and 2 stars are negative, 3 neutral, 4 and 5 positive.
    pub fn simplified(self) -> Self {
        match self {
            Sentiment::Stars(0..=2) => Sentiment::Negative,
            Sentiment::Stars(3) => Sentiment::Neutral,
            Sentiment::Stars(_) => Sentiment::Positive,
            other => other,
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sentiment::Positive => f.write_str("positive"),
            Sentiment::Negative => f.write_str("negative"),
            Sentiment::Neutral => f.write_str("neutral"),
            Sentiment::Stars(1) => f.write_str("1 star"),
            Sentiment::Stars(n) => write!(f, "{n} stars"),
        }
    }
}

impl FromStr for Sentiment {
    type Err = TermometroError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let label = s.trim().to_lowercase();
        match label.as_str() {
            "positive" => return Ok(Sentiment::Positive),
            "negative" => return Ok(Sentiment::Negative),
            "neutral" => return Ok(Sentiment::Neutral),
            _ => {}
        }

        let stars = label
            .strip_suffix(" stars")
            .or_else(|| label.strip_suffix(" star"))
            .and_then(|n| n.trim().parse::<u8>().ok())
            .filter(|n| (1..=5).contains(n));

        stars
            .map(Sentiment::Stars)
            .ok_or_else(|| TermometroError::UnknownLabel(s.to_string()))
    }
}

impl TryFrom<String> for Sentiment {
    type Error = TermometroError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Sentiment> for String {
    fn from(value: Sentiment) -> Self {
        value.to_string()
    }
}

/// Which path produced an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    Remote,
    Local,
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provenance::Remote => f.write_str("remote"),
            Provenance::Local => f.write_str("local"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentOutcome {
    pub text: String,
    /// `None` when the classifier could not label this text.
    pub sentiment: Option<Sentiment>,
    /// Normalized rating in `[0, 1]`.
    pub score: f64,
    pub confidence: f64,
    pub provenance: Provenance,
}

/// Parallel per-text results of one classifier call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchScores {
    pub sentiments: Vec<Option<Sentiment>>,
    pub scores: Vec<f64>,
    pub confidences: Vec<f64>,
}

impl BatchScores {
    pub fn len(&self) -> usize {
        self.sentiments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sentiments.is_empty()
    }

    /// True when all three columns have `expected` entries.
    pub fn is_complete(&self, expected: usize) -> bool {
        self.sentiments.len() == expected
            && self.scores.len() == expected
            && self.confidences.len() == expected
    }

    /// Pairs the scores with their input texts. Values are clamped to `[0, 1]`.
    pub fn into_outcomes(self, texts: &[String], provenance: Provenance) -> Vec<SentimentOutcome> {
        texts
            .iter()
            .zip(self.sentiments)
            .zip(self.scores.into_iter().zip(self.confidences))
            .map(|((text, sentiment), (score, confidence))| SentimentOutcome {
                text: text.clone(),
                sentiment,
                score: unit(score),
                confidence: unit(confidence),
                provenance,
            })
            .collect()
    }
}

fn unit(value: f64) -> f64 {
    if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SentimentSummary {
    pub total: usize,
    pub positive_count: usize,
    pub negative_count: usize,
    pub neutral_count: usize,
    pub positive_pct: f64,
    pub negative_pct: f64,
    pub neutral_pct: f64,
    pub avg_score: f64,
    pub avg_confidence: f64,
}

/// Statistics over the outcomes that carry a sentiment. Star ratings count
/// toward their simplified class.
pub fn aggregate(outcomes: &[SentimentOutcome]) -> SentimentSummary {
    let mut summary = SentimentSummary::default();
    let mut score_sum = 0.0;
    let mut confidence_sum = 0.0;

    for outcome in outcomes {
        let Some(sentiment) = outcome.sentiment else {
            continue;
        };
        summary.total += 1;
        score_sum += outcome.score;
        confidence_sum += outcome.confidence;
        match sentiment.simplified() {
            Sentiment::Positive => summary.positive_count += 1,
            Sentiment::Negative => summary.negative_count += 1,
            _ => summary.neutral_count += 1,
        }
    }

    if summary.total == 0 {
        return SentimentSummary::default();
    }

    let total = summary.total as f64;
    summary.positive_pct = summary.positive_count as f64 / total * 100.0;
    summary.negative_pct = summary.negative_count as f64 / total * 100.0;
    summary.neutral_pct = summary.neutral_count as f64 / total * 100.0;
    summary.avg_score = score_sum / total;
    summary.avg_confidence = confidence_sum / total;
    summary
}
