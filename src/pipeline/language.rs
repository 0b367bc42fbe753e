//! Best-effort language detection of OCR text.
//!
//! Detection is restricted to the languages the Tesseract pack covers; a
//! wider set mostly adds false positives on short, number-heavy invoice
//! text. Anything inconclusive is reported as [`UNKNOWN_LANGUAGE`].

use lingua::{Language, LanguageDetectorBuilder};

/// Reported when the text is empty or no language can be told.
pub const UNKNOWN_LANGUAGE: &str = "unknown";

/// Languages considered by [`LinguaDetector::new`].
pub const SUPPORTED_LANGUAGES: [Language; 11] = [
    Language::English,
    Language::French,
    Language::German,
    Language::Arabic,
    Language::Spanish,
    Language::Italian,
    Language::Portuguese,
    Language::Russian,
    Language::Chinese,
    Language::Japanese,
    Language::Korean,
];

/// Guesses the language of a text as an ISO 639-1 code.
pub trait DetectLanguage: Send + Sync {
    /// `None` when the language cannot be determined.
    fn detect(&self, text: &str) -> Option<String>;

    /// Like [`DetectLanguage::detect`], but never empty: falls back to
    /// [`UNKNOWN_LANGUAGE`].
    fn detect_or_unknown(&self, text: &str) -> String {
        if text.trim().is_empty() {
            return UNKNOWN_LANGUAGE.to_string();
        }
        self.detect(text)
            .unwrap_or_else(|| UNKNOWN_LANGUAGE.to_string())
    }
}

/// [`DetectLanguage`] backed by `lingua`.
pub struct LinguaDetector {
    detector: lingua::LanguageDetector,
}

impl LinguaDetector {
    pub fn new() -> Self {
        Self::with_languages(&SUPPORTED_LANGUAGES)
    }

    pub fn with_languages(languages: &[Language]) -> Self {
        Self {
            detector: LanguageDetectorBuilder::from_languages(languages).build(),
        }
    }
}

impl Default for LinguaDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectLanguage for LinguaDetector {
    fn detect(&self, text: &str) -> Option<String> {
        self.detector
            .detect_language_of(text)
            .map(|lang| lang.iso_code_639_1().to_string())
    }
}
