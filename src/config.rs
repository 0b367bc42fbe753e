//! Configuration types for invoice processing.
//!
//! All pipeline behaviour is controlled through [`PipelineConfig`], built via
//! its [`PipelineConfigBuilder`]. API credentials live in
//! [`ProviderCredentials`] and are handed to the pipeline explicitly; nothing
//! in the library reads the environment behind the caller's back except
//! [`ProviderCredentials::from_env`].

use crate::error::InvoiceError;
use crate::pipeline::language::DetectLanguage;
use crate::providers::{ExtractionProvider, OcrProvider};
use edgequake_llm::LLMProvider;
use std::fmt;
use std::sync::Arc;

pub const DEFAULT_DEEPSEEK_BASE_URL: &str = "https://api.deepseek.com/v1";
pub const DEFAULT_OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_PUTER_BASE_URL: &str = "https://api.puter.ai";

/// Tesseract language pack used by the local OCR provider.
pub const DEFAULT_TESSERACT_LANGUAGES: &str =
    "eng+fra+deu+ara+spa+ita+por+rus+chi_sim+jpn+kor";

/// API keys and endpoints for the network providers.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ProviderCredentials {
    pub deepseek_api_key: Option<String>,
    pub openrouter_api_key: Option<String>,
    /// Override for the DeepSeek API root. Default: [`DEFAULT_DEEPSEEK_BASE_URL`].
    pub deepseek_base_url: Option<String>,
    /// Override for the OpenRouter API root. Default: [`DEFAULT_OPENROUTER_BASE_URL`].
    pub openrouter_base_url: Option<String>,
    /// Override for the Puter API root. Default: [`DEFAULT_PUTER_BASE_URL`].
    pub puter_base_url: Option<String>,
}

impl ProviderCredentials {
    /// Load credentials from the process environment, after reading an
    /// optional `.env` file in the working directory.
    ///
    /// Reads `DEEPSEEK_API_KEY`, `OPENROUTER_API_KEY`, `DEEPSEEK_BASE_URL`,
    /// `OPENROUTER_BASE_URL` and `PUTER_BASE_URL`. Empty values count as unset.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build credentials from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            deepseek_api_key: get("DEEPSEEK_API_KEY"),
            openrouter_api_key: get("OPENROUTER_API_KEY"),
            deepseek_base_url: get("DEEPSEEK_BASE_URL"),
            openrouter_base_url: get("OPENROUTER_BASE_URL"),
            puter_base_url: get("PUTER_BASE_URL"),
        }
    }

    pub fn deepseek_base_url(&self) -> &str {
        self.deepseek_base_url
            .as_deref()
            .unwrap_or(DEFAULT_DEEPSEEK_BASE_URL)
    }

    pub fn openrouter_base_url(&self) -> &str {
        self.openrouter_base_url
            .as_deref()
            .unwrap_or(DEFAULT_OPENROUTER_BASE_URL)
    }

    pub fn puter_base_url(&self) -> &str {
        self.puter_base_url.as_deref().unwrap_or(DEFAULT_PUTER_BASE_URL)
    }
}

impl fmt::Debug for ProviderCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |k: &Option<String>| k.as_ref().map(|_| "<redacted>");
        f.debug_struct("ProviderCredentials")
            .field("deepseek_api_key", &redact(&self.deepseek_api_key))
            .field("openrouter_api_key", &redact(&self.openrouter_api_key))
            .field("deepseek_base_url", &self.deepseek_base_url())
            .field("openrouter_base_url", &self.openrouter_base_url())
            .field("puter_base_url", &self.puter_base_url())
            .finish()
    }
}

/// Configuration for the OCR → extraction pipeline.
///
/// Built via [`PipelineConfig::builder()`] or using
/// [`PipelineConfig::default()`].
///
/// # Example
/// ```rust
/// use invoice_ai::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .ocr_min_chars(20)
///     .api_timeout_secs(60)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// OCR text must be strictly longer than this many characters to be
    /// accepted by the OCR chain. Default: 20.
    pub ocr_min_chars: usize,

    /// Per-request deadline for every network provider, in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Characters of OCR text kept in the `raw_text` fallback envelope. Default: 2000.
    pub raw_text_limit: usize,

    /// Longest edge, in pixels, when rasterising the first PDF page. Default: 2000.
    pub max_rendered_pixels: u32,

    /// Language pack passed to `tesseract -l`.
    pub tesseract_languages: String,

    /// Model used for DeepSeek OCR and extraction. Default: `deepseek-chat`.
    pub deepseek_model: String,

    /// Model used for OpenRouter extraction. Default: `openai/gpt-3.5-turbo`.
    pub openrouter_model: String,

    /// API keys and endpoints.
    pub credentials: ProviderCredentials,

    /// Extra edgequake-llm provider name (e.g. "openai", "anthropic") tried
    /// after the built-in providers of both chains.
    pub llm_provider_name: Option<String>,

    /// Model for `llm_provider_name`.
    pub llm_model: Option<String>,

    /// Pre-constructed edgequake-llm provider. Takes precedence over
    /// `llm_provider_name`.
    pub llm_provider: Option<Arc<dyn LLMProvider>>,

    /// Replace the default OCR chain entirely. Empty means "use defaults".
    pub ocr_providers: Vec<Arc<dyn OcrProvider>>,

    /// Replace the default extraction chain entirely. Empty means "use defaults".
    pub extraction_providers: Vec<Arc<dyn ExtractionProvider>>,

    /// Language detector. `None` uses the lingua-backed default.
    pub language_detector: Option<Arc<dyn DetectLanguage>>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            ocr_min_chars: 20,
            api_timeout_secs: 60,
            raw_text_limit: 2000,
            max_rendered_pixels: 2000,
            tesseract_languages: DEFAULT_TESSERACT_LANGUAGES.to_string(),
            deepseek_model: "deepseek-chat".to_string(),
            openrouter_model: "openai/gpt-3.5-turbo".to_string(),
            credentials: ProviderCredentials::default(),
            llm_provider_name: None,
            llm_model: None,
            llm_provider: None,
            ocr_providers: Vec::new(),
            extraction_providers: Vec::new(),
            language_detector: None,
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("ocr_min_chars", &self.ocr_min_chars)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("raw_text_limit", &self.raw_text_limit)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("tesseract_languages", &self.tesseract_languages)
            .field("deepseek_model", &self.deepseek_model)
            .field("openrouter_model", &self.openrouter_model)
            .field("credentials", &self.credentials)
            .field("llm_provider_name", &self.llm_provider_name)
            .field("llm_model", &self.llm_model)
            .field("llm_provider", &self.llm_provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field(
                "ocr_providers",
                &self.ocr_providers.iter().map(|p| p.name()).collect::<Vec<_>>(),
            )
            .field(
                "extraction_providers",
                &self
                    .extraction_providers
                    .iter()
                    .map(|p| p.name())
                    .collect::<Vec<_>>(),
            )
            .field(
                "language_detector",
                &self.language_detector.as_ref().map(|_| "<dyn DetectLanguage>"),
            )
            .finish()
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn ocr_min_chars(mut self, n: usize) -> Self {
        self.config.ocr_min_chars = n;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn raw_text_limit(mut self, n: usize) -> Self {
        self.config.raw_text_limit = n;
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn tesseract_languages(mut self, langs: impl Into<String>) -> Self {
        self.config.tesseract_languages = langs.into();
        self
    }

    pub fn deepseek_model(mut self, model: impl Into<String>) -> Self {
        self.config.deepseek_model = model.into();
        self
    }

    pub fn openrouter_model(mut self, model: impl Into<String>) -> Self {
        self.config.openrouter_model = model.into();
        self
    }

    pub fn credentials(mut self, credentials: ProviderCredentials) -> Self {
        self.config.credentials = credentials;
        self
    }

    pub fn llm_provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.llm_provider_name = Some(name.into());
        self
    }

    pub fn llm_model(mut self, model: impl Into<String>) -> Self {
        self.config.llm_model = Some(model.into());
        self
    }

    pub fn llm_provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.llm_provider = Some(provider);
        self
    }

    /// Append a provider to a custom OCR chain.
    pub fn ocr_provider(mut self, provider: Arc<dyn OcrProvider>) -> Self {
        self.config.ocr_providers.push(provider);
        self
    }

    /// Append a provider to a custom extraction chain.
    pub fn extraction_provider(mut self, provider: Arc<dyn ExtractionProvider>) -> Self {
        self.config.extraction_providers.push(provider);
        self
    }

    pub fn language_detector(mut self, detector: Arc<dyn DetectLanguage>) -> Self {
        self.config.language_detector = Some(detector);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, InvoiceError> {
        let c = &self.config;
        if c.api_timeout_secs == 0 {
            return Err(InvoiceError::InvalidConfig(
                "API timeout must be at least 1 second".into(),
            ));
        }
        if c.raw_text_limit == 0 {
            return Err(InvoiceError::InvalidConfig(
                "raw_text_limit must be ≥ 1".into(),
            ));
        }
        if c.tesseract_languages.trim().is_empty() {
            return Err(InvoiceError::InvalidConfig(
                "tesseract_languages must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = PipelineConfig::default();
        assert_eq!(c.ocr_min_chars, 20);
        assert_eq!(c.api_timeout_secs, 60);
        assert_eq!(c.raw_text_limit, 2000);
        assert_eq!(c.deepseek_model, "deepseek-chat");
        assert!(c.ocr_providers.is_empty());
    }

    #[test]
    fn zero_timeout_rejected() {
        let err = PipelineConfig::builder().api_timeout_secs(0).build();
        assert!(matches!(err, Err(InvoiceError::InvalidConfig(_))));
    }

    #[test]
    fn credentials_from_lookup_ignores_blank_values() {
        let creds = ProviderCredentials::from_lookup(|key| match key {
            "DEEPSEEK_API_KEY" => Some("sk-test".to_string()),
            "OPENROUTER_API_KEY" => Some("   ".to_string()),
            _ => None,
        });
        assert_eq!(creds.deepseek_api_key.as_deref(), Some("sk-test"));
        assert_eq!(creds.openrouter_api_key, None);
        assert_eq!(creds.deepseek_base_url(), DEFAULT_DEEPSEEK_BASE_URL);
    }

    #[test]
    fn debug_redacts_keys() {
        let creds = ProviderCredentials {
            deepseek_api_key: Some("sk-secret".into()),
            ..Default::default()
        };
        let shown = format!("{:?}", creds);
        assert!(!shown.contains("sk-secret"));
        assert!(shown.contains("<redacted>"));
    }
}
