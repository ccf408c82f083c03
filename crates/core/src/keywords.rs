use std::collections::BTreeMap;

use regex::Regex;
use serde::Serialize;

use crate::{text::word_pattern, types::Comment};

/// One label and the keywords that select it.
#[derive(Debug, Clone, Serialize)]
pub struct KeywordRule {
    pub label: String,
    pub keywords: Vec<String>,
    #[serde(skip)]
    patterns: Vec<Regex>,
}

impl KeywordRule {
    pub fn new(label: impl Into<String>, keywords: Vec<String>) -> Self {
        let patterns = keywords.iter().filter_map(|k| word_pattern(k)).collect();
        Self {
            label: label.into(),
            keywords,
            patterns,
        }
    }

    /// `lowered` must already be lowercase.
    fn matches(&self, lowered: &str) -> bool {
        self.patterns.iter().any(|re| re.is_match(lowered))
    }
}

/// Ordered keyword rules. Rules are evaluated in insertion order and the first
/// rule with a whole-word match wins, so ties resolve to the earlier rule.
#[derive(Debug, Clone, Default, Serialize)]
pub struct KeywordClassifier {
    rules: Vec<KeywordRule>,
}

impl KeywordClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rule<L, K, S>(mut self, label: L, keywords: K) -> Self
    where
        L: Into<String>,
        K: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rules.push(KeywordRule::new(
            label,
            keywords.into_iter().map(Into::into).collect(),
        ));
        self
    }

    /// Party rules monitored for the 2026 Peruvian general election.
    pub fn political_parties() -> Self {
        Self::new()
            .with_rule(
                "Peru Libre",
                ["pedro castillo", "peru libre", "vladimir cerrón", "junín"],
            )
            .with_rule(
                "Fuerza Popular",
                ["keiko fujimori", "fuerza popular", "vargas llosa"],
            )
            .with_rule(
                "Juntos por el Perú",
                ["vladimiro montesinos", "juntos por el peru"],
            )
            .with_rule("Acción Popular", ["acción popular", "escritorio político"])
    }

    pub fn rules(&self) -> &[KeywordRule] {
        &self.rules
    }

    /// Every keyword across all rules, in rule order.
    pub fn all_keywords(&self) -> Vec<&str> {
        self.rules
            .iter()
            .flat_map(|rule| rule.keywords.iter().map(String::as_str))
            .collect()
    }

    pub fn classify(&self, text: &str) -> Option<&str> {
        let lowered = text.to_lowercase();
        self.rules
            .iter()
            .find(|rule| rule.matches(&lowered))
            .map(|rule| rule.label.as_str())
    }

    pub fn matches(&self, text: &str) -> Vec<&str> {
        let lowered = text.to_lowercase();
        self.rules
            .iter()
            .filter(|rule| rule.matches(&lowered))
            .map(|rule| rule.label.as_str())
            .collect()
    }

    /// Comments per first-match label. Unmatched comments are not counted.
    pub fn tally<'a, I>(&self, comments: I) -> BTreeMap<String, usize>
    where
        I: IntoIterator<Item = &'a Comment>,
    {
        let mut counts = BTreeMap::new();
        for comment in comments {
            if let Some(label) = self.classify(&comment.text) {
                *counts.entry(label.to_string()).or_insert(0) += 1;
            }
        }
        counts
    }
}
