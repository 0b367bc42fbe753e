//! OpenAI-compatible `/chat/completions` providers (DeepSeek, OpenRouter).
//!
//! Both services speak the same wire format, so one client handles the HTTP
//! round trip and two thin wrappers adapt it to the OCR and extraction
//! traits. The reply text is `choices[0].message.content`.

use crate::config::PipelineConfig;
use crate::error::ProviderError;
use crate::pipeline::encode;
use crate::prompts;
use crate::providers::{ExtractionProvider, OcrProvider};
use async_trait::async_trait;
use image::DynamicImage;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

/// Longest error body kept in [`ProviderError::Http`].
const MAX_ERROR_BODY: usize = 500;

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// HTTP client for one OpenAI-compatible endpoint and model.
#[derive(Clone)]
pub struct ChatCompletionsClient {
    name: String,
    endpoint: String,
    api_key: Option<String>,
    key_var: &'static str,
    model: String,
    http: reqwest::Client,
    timeout_secs: u64,
}

impl std::fmt::Debug for ChatCompletionsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatCompletionsClient")
            .field("name", &self.name)
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl ChatCompletionsClient {
    pub fn new(
        name: impl Into<String>,
        base_url: &str,
        api_key: Option<String>,
        key_var: &'static str,
        model: impl Into<String>,
        http: reqwest::Client,
        timeout_secs: u64,
    ) -> Self {
        Self {
            name: name.into(),
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key,
            key_var,
            model: model.into(),
            http,
            timeout_secs,
        }
    }

    /// DeepSeek with the configured key, endpoint and model.
    pub fn deepseek(config: &PipelineConfig, http: reqwest::Client) -> Self {
        let creds = &config.credentials;
        Self::new(
            "deepseek",
            creds.deepseek_base_url(),
            creds.deepseek_api_key.clone(),
            "DEEPSEEK_API_KEY",
            config.deepseek_model.clone(),
            http,
            config.api_timeout_secs,
        )
    }

    /// OpenRouter with the configured key, endpoint and model.
    pub fn openrouter(config: &PipelineConfig, http: reqwest::Client) -> Self {
        let creds = &config.credentials;
        Self::new(
            "openrouter",
            creds.openrouter_base_url(),
            creds.openrouter_api_key.clone(),
            "OPENROUTER_API_KEY",
            config.openrouter_model.clone(),
            http,
            config.api_timeout_secs,
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Send `messages` and return the first choice's content.
    pub async fn complete(&self, messages: Vec<Value>) -> Result<String, ProviderError> {
        let key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ProviderError::NotConfigured {
                provider: self.name.clone(),
                hint: format!("set {}", self.key_var),
            })?;

        let body = json!({ "model": self.model, "messages": messages });
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(&self.name, &e, self.timeout_secs))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ProviderError::from_reqwest(&self.name, &e, self.timeout_secs))?;

        if !status.is_success() {
            return Err(ProviderError::Http {
                provider: self.name.clone(),
                status: status.as_u16(),
                body: text.chars().take(MAX_ERROR_BODY).collect(),
            });
        }

        let content = parse_chat_content(&self.name, &text)?;
        debug!("{}: {} chars of reply", self.name, content.len());
        Ok(content)
    }
}

/// Pull `choices[0].message.content` out of a chat-completions body.
pub(crate) fn parse_chat_content(provider: &str, body: &str) -> Result<String, ProviderError> {
    let parsed: ChatResponse =
        serde_json::from_str(body).map_err(|e| ProviderError::MalformedResponse {
            provider: provider.to_string(),
            detail: e.to_string(),
        })?;
    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| ProviderError::MalformedResponse {
            provider: provider.to_string(),
            detail: "no choices[0].message.content".to_string(),
        })
}

/// Vision OCR over a chat-completions endpoint.
#[derive(Debug, Clone)]
pub struct ChatOcrProvider {
    client: ChatCompletionsClient,
}

impl ChatOcrProvider {
    pub fn new(client: ChatCompletionsClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl OcrProvider for ChatOcrProvider {
    fn name(&self) -> &str {
        self.client.name()
    }

    async fn recognize(&self, image: &DynamicImage) -> Result<String, ProviderError> {
        let url = encode::encode_data_url(image).map_err(|e| ProviderError::Encode {
            provider: self.client.name().to_string(),
            detail: e.to_string(),
        })?;
        let messages = vec![
            json!({ "role": "system", "content": prompts::OCR_SYSTEM_PROMPT }),
            json!({
                "role": "user",
                "content": [
                    { "type": "image_url", "image_url": { "url": url } }
                ]
            }),
        ];
        self.client.complete(messages).await
    }
}

/// Field extraction over a chat-completions endpoint.
#[derive(Clone)]
pub struct ChatExtractionProvider {
    client: ChatCompletionsClient,
    prompt: fn(&str) -> String,
}

impl std::fmt::Debug for ChatExtractionProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatExtractionProvider")
            .field("client", &self.client)
            .finish_non_exhaustive()
    }
}

impl ChatExtractionProvider {
    pub fn new(client: ChatCompletionsClient, prompt: fn(&str) -> String) -> Self {
        Self { client, prompt }
    }
}

#[async_trait]
impl ExtractionProvider for ChatExtractionProvider {
    fn name(&self) -> &str {
        self.client.name()
    }

    async fn extract(&self, invoice_text: &str) -> Result<String, ProviderError> {
        let messages = vec![json!({ "role": "user", "content": (self.prompt)(invoice_text) })];
        self.client.complete(messages).await
    }
}
