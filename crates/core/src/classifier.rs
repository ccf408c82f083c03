use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::{
    error::Result,
    sentiment::{BatchScores, Sentiment},
};

/// Longest input the classifiers look at, in characters.
pub const MAX_CLASSIFIER_INPUT: usize = 512;

/// An in-process classifier used when the remote service cannot be used.
pub trait LocalClassifier: Send + Sync {
    fn name(&self) -> &'static str;

    /// One entry per input text, in order.
    fn classify_batch(&self, texts: &[String], use_simplified: bool) -> Result<BatchScores>;
}

static WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\p{L}+").unwrap());

static POLARITY: Lazy<HashMap<&'static str, i32>> = Lazy::new(|| {
    const POSITIVE: &[&str] = &[
        "encanta", "encantó", "encantan", "excelente", "bueno", "buena", "buenos", "buenas",
        "genial", "increíble", "mejor", "gracias", "apoyo", "feliz", "amor", "bien", "bravo",
        "esperanza", "honesto", "honesta", "orgullo", "éxito", "love", "great", "good",
        "excellent", "amazing", "best", "happy", "thanks", "hope",
    ];
    const NEGATIVE: &[&str] = &[
        "terrible", "malo", "mala", "malos", "malas", "peor", "odio", "horrible", "corrupto",
        "corrupta", "corruptos", "corrupción", "mentiroso", "mentira", "mentiras", "ladrón",
        "ladrones", "vergüenza", "asco", "triste", "fraude", "pésimo", "pésima", "basura",
        "hate", "bad", "worst", "awful", "corrupt", "liar", "sad",
    ];
    POSITIVE
        .iter()
        .map(|w| (*w, 1))
        .chain(NEGATIVE.iter().map(|w| (*w, -1)))
        .collect()
});

const NEGATORS: &[&str] = &["no", "nunca", "jamás", "ni", "not", "never"];
const NEGATION_WINDOW: u8 = 3;

/// Counts polarity words, flipping a word preceded by a negator, and maps the
/// balance onto a 1 to 5 star rating.
#[derive(Debug, Clone, Copy, Default)]
pub struct LexiconClassifier;

impl LexiconClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Star rating and confidence for one text.
    pub fn rate(&self, text: &str) -> (u8, f64) {
        let text: String = text.trim().chars().take(MAX_CLASSIFIER_INPUT).collect();
        let lower = text.to_lowercase();

        let mut positive = 0u32;
        let mut negative = 0u32;
        // Words left in which a negator still applies.
        let mut negation = 0u8;
        for word in WORD.find_iter(&lower).map(|m| m.as_str()) {
            if NEGATORS.contains(&word) {
                negation = NEGATION_WINDOW;
                continue;
            }
            let polarity = match POLARITY.get(word) {
                Some(p) if negation > 0 => {
                    negation = 0;
                    -p
                }
                Some(p) => *p,
                None => {
                    negation = negation.saturating_sub(1);
                    0
                }
            };
            match polarity {
                1 => positive += 1,
                -1 => negative += 1,
                _ => {}
            }
        }

        let hits = positive + negative;
        if hits == 0 {
            return (3, 0.5);
        }

        let balance = (f64::from(positive) - f64::from(negative)) / f64::from(hits);
        let stars = match balance {
            b if b > 0.5 && hits >= 2 => 5,
            b if b > 0.0 => 4,
            b if b < -0.5 && hits >= 2 => 1,
            b if b < 0.0 => 2,
            _ => 3,
        };
        let support = f64::from(hits.min(4)) / 4.0;
        let confidence = 0.5 + 0.5 * balance.abs() * support;
        (stars, confidence)
    }
}

impl LocalClassifier for LexiconClassifier {
    fn name(&self) -> &'static str {
        "lexicon"
    }

    fn classify_batch(&self, texts: &[String], use_simplified: bool) -> Result<BatchScores> {
        let mut scores = BatchScores::default();
        for text in texts {
            let (stars, confidence) = self.rate(text);
            scores
                .sentiments
                .push(Some(Sentiment::from_stars(stars, use_simplified)));
            scores.scores.push(f64::from(stars) / 5.0);
            scores.confidences.push(confidence);
        }
        Ok(scores)
    }
}
