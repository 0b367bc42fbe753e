//! Puter image-to-text OCR.
//!
//! `POST {base}/img2txt` with `{"image": <base64 PNG>}`; the reply's `text`
//! field holds the recognised text. A reply without `text` counts as empty
//! text, which the OCR chain then rejects as too short.

use crate::config::PipelineConfig;
use crate::error::ProviderError;
use crate::pipeline::encode;
use crate::providers::OcrProvider;
use async_trait::async_trait;
use image::DynamicImage;
use serde_json::{json, Value};

const NAME: &str = "puter";

#[derive(Debug, Clone)]
pub struct PuterOcrProvider {
    endpoint: String,
    http: reqwest::Client,
    timeout_secs: u64,
}

impl PuterOcrProvider {
    pub fn new(base_url: &str, http: reqwest::Client, timeout_secs: u64) -> Self {
        Self {
            endpoint: format!("{}/img2txt", base_url.trim_end_matches('/')),
            http,
            timeout_secs,
        }
    }

    pub fn from_config(config: &PipelineConfig, http: reqwest::Client) -> Self {
        Self::new(
            config.credentials.puter_base_url(),
            http,
            config.api_timeout_secs,
        )
    }
}

#[async_trait]
impl OcrProvider for PuterOcrProvider {
    fn name(&self) -> &str {
        NAME
    }

    async fn recognize(&self, image: &DynamicImage) -> Result<String, ProviderError> {
        let b64 = encode::encode_base64_png(image).map_err(|e| ProviderError::Encode {
            provider: NAME.to_string(),
            detail: e.to_string(),
        })?;

        let response = self
            .http
            .post(&self.endpoint)
            .json(&json!({ "image": b64 }))
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(NAME, &e, self.timeout_secs))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::from_reqwest(NAME, &e, self.timeout_secs))?;
        if !status.is_success() {
            return Err(ProviderError::Http {
                provider: NAME.to_string(),
                status: status.as_u16(),
                body: body.chars().take(500).collect(),
            });
        }
        parse_text_field(&body)
    }
}

fn parse_text_field(body: &str) -> Result<String, ProviderError> {
    let value: Value = serde_json::from_str(body).map_err(|e| ProviderError::MalformedResponse {
        provider: NAME.to_string(),
        detail: e.to_string(),
    })?;
    Ok(value
        .get("text")
        .and_then(|t| t.as_str())
        .unwrap_or("")
        .to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_field_or_empty() {
        assert_eq!(parse_text_field(r#"{"text":"INVOICE 42"}"#).unwrap(), "INVOICE 42");
        assert_eq!(parse_text_field(r#"{"status":"ok"}"#).unwrap(), "");
        assert!(parse_text_field("not json").is_err());
    }

    #[test]
    fn endpoint_from_base() {
        let p = PuterOcrProvider::new("https://api.puter.ai/", reqwest::Client::new(), 60);
        assert_eq!(p.endpoint, "https://api.puter.ai/img2txt");
    }
}
