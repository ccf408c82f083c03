//! Comment text cleaning, language detection and admissibility checks.

use once_cell::sync::Lazy;
use regex::Regex;
use whatlang::Lang;

pub const MIN_COMMENT_LENGTH: usize = 5;
pub const MAX_COMMENT_LENGTH: usize = 5000;

/// Returned by [`TextProcessor::detect_language`] when the detector gives up.
pub const UNKNOWN_LANGUAGE: &str = "unknown";

static URLS: Lazy<Regex> = Lazy::new(|| Regex::new(r"http\S+|www\.\S+").unwrap());

static EMOJIS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        "[",
        r"\x{1F600}-\x{1F64F}", // emoticons
        r"\x{1F300}-\x{1F5FF}", // symbols and pictographs
        r"\x{1F680}-\x{1F6FF}", // transport and map
        r"\x{1F1E0}-\x{1F1FF}", // flags
        r"\x{1F900}-\x{1F9FF}",
        r"\x{1F170}-\x{1F251}",
        r"\x{1FA70}-\x{1FAFF}", // symbols and pictographs extended-A
        r"\x{2702}-\x{27B0}",
        r"\x{2600}-\x{2B55}",
        r"\x{24C2}",
        r"\x{200D}",
        r"\x{23CF}",
        r"\x{23E9}",
        r"\x{231A}",
        r"\x{FE0F}",
        r"\x{3030}",
        "]+",
    ))
    .unwrap()
});

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

static LATIN_LETTER: Lazy<Regex> = Lazy::new(|| Regex::new(r"[a-záéíóúñü]").unwrap());

/// Stateless text pipeline applied to every raw comment before it becomes a
/// [`crate::Comment`]. The only configuration is the accepted language.
#[derive(Debug, Clone)]
pub struct TextProcessor {
    accepted_language: Option<String>,
}

impl Default for TextProcessor {
    fn default() -> Self {
        Self::new(Some("es".to_string()))
    }
}

impl TextProcessor {
    /// `None` disables language filtering.
    pub fn new(accepted_language: Option<String>) -> Self {
        Self {
            accepted_language: accepted_language.filter(|lang| !lang.trim().is_empty()),
        }
    }

    pub fn accepted_language(&self) -> Option<&str> {
        self.accepted_language.as_deref()
    }

    /// True when filtering is disabled or `language` is the accepted one.
    pub fn admits_language(&self, language: &str) -> bool {
        match &self.accepted_language {
            Some(accepted) => accepted == language,
            None => true,
        }
    }

    /// Best-effort ISO code of the text's language, or `"unknown"`.
    pub fn detect_language(text: &str) -> String {
        match whatlang::detect_lang(text) {
            Some(lang) => iso_code(lang).to_string(),
            None => UNKNOWN_LANGUAGE.to_string(),
        }
    }

    /// Strips control characters, pictographs and URLs, then collapses
    /// whitespace. Idempotent.
    pub fn clean_text(text: &str) -> String {
        let text: String = text
            .chars()
            .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
            .collect();
        let text = EMOJIS.replace_all(&text, "");
        let text = URLS.replace_all(&text, "");
        WHITESPACE.replace_all(&text, " ").trim().to_string()
    }

    /// Returns the cleaned text when the comment is admissible.
    ///
    /// Too short (after cleaning) or without any Latin letter is rejected,
    /// as is a `language` that differs from the accepted one. Overlong text is
    /// truncated to [`MAX_COMMENT_LENGTH`] characters rather than rejected.
    pub fn validate_comment(&self, text: &str, language: Option<&str>) -> Option<String> {
        let mut cleaned = Self::clean_text(text);

        let length = cleaned.chars().count();
        if length < MIN_COMMENT_LENGTH {
            return None;
        }
        if length > MAX_COMMENT_LENGTH {
            cleaned = cleaned.chars().take(MAX_COMMENT_LENGTH).collect();
        }

        if let (Some(language), Some(accepted)) = (language, self.accepted_language()) {
            if language != accepted {
                return None;
            }
        }

        if !LATIN_LETTER.is_match(&cleaned.to_lowercase()) {
            return None;
        }

        Some(cleaned)
    }

    /// Whole-word, case-insensitive matches, in the order of `keywords`.
    pub fn extract_keywords<S: AsRef<str>>(text: &str, keywords: &[S]) -> Vec<String> {
        let lowered = text.to_lowercase();
        keywords
            .iter()
            .map(AsRef::as_ref)
            .filter(|keyword| contains_word(&lowered, keyword))
            .map(str::to_string)
            .collect()
    }
}

/// Whole-word pattern for a keyword, to be matched against lowercase text.
pub(crate) fn word_pattern(keyword: &str) -> Option<Regex> {
    Regex::new(&format!(r"\b{}\b", regex::escape(&keyword.to_lowercase()))).ok()
}

/// `haystack` must already be lowercase.
pub(crate) fn contains_word(haystack: &str, keyword: &str) -> bool {
    word_pattern(keyword).is_some_and(|re| re.is_match(haystack))
}

fn iso_code(lang: Lang) -> &'static str {
    match lang {
        Lang::Spa => "es",
        Lang::Eng => "en",
        Lang::Por => "pt",
        Lang::Fra => "fr",
        Lang::Deu => "de",
        Lang::Ita => "it",
        Lang::Rus => "ru",
        other => other.code(),
    }
}
