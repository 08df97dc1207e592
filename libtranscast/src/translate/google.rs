//! Google Translate client
//!
//! Without an API key the keyless `translate_a/single` endpoint is used;
//! with one, the Cloud Translation v2 API.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::error::TranslationError;
use crate::translate::Translator;

pub const FREE_API_BASE: &str = "https://translate.googleapis.com";
pub const CLOUD_API_BASE: &str = "https://translation.googleapis.com";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

enum Backend {
    Free,
    Cloud { api_key: SecretString },
}

#[derive(Debug, Deserialize)]
struct CloudResponse {
    data: CloudData,
}

#[derive(Debug, Deserialize)]
struct CloudData {
    translations: Vec<CloudTranslation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CloudTranslation {
    translated_text: String,
}

#[derive(Debug, Deserialize)]
struct CloudErrorBody {
    error: CloudErrorDetail,
}

#[derive(Debug, Deserialize)]
struct CloudErrorDetail {
    message: String,
}

pub struct GoogleTranslator {
    http: reqwest::Client,
    base_url: String,
    backend: Backend,
}

impl GoogleTranslator {
    pub fn new(api_key: Option<SecretString>) -> Result<Self, TranslationError> {
        let base = if api_key.is_some() {
            CLOUD_API_BASE
        } else {
            FREE_API_BASE
        };
        Self::with_base_url(api_key, base)
    }

    pub fn with_base_url(
        api_key: Option<SecretString>,
        base_url: &str,
    ) -> Result<Self, TranslationError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| TranslationError::Network(format!("Failed to build HTTP client: {}", e)))?;

        let backend = match api_key {
            Some(api_key) => Backend::Cloud { api_key },
            None => Backend::Free,
        };

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            backend,
        })
    }

    pub fn backend_name(&self) -> &'static str {
        match self.backend {
            Backend::Free => "google-free",
            Backend::Cloud { .. } => "google-cloud",
        }
    }

    async fn translate_free(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
    ) -> Result<String, TranslationError> {
        let response = self
            .http
            .get(format!("{}/translate_a/single", self.base_url))
            .query(&[
                ("client", "gtx"),
                ("sl", source_lang),
                ("tl", target_lang),
                ("dt", "t"),
                ("q", text),
            ])
            .send()
            .await
            .map_err(|e| TranslationError::Network(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| TranslationError::Network(e.to_string()))?;

        if !status.is_success() {
            return Err(TranslationError::Service {
                status: status.as_u16(),
                message: body.chars().take(200).collect(),
            });
        }

        let value: Value =
            serde_json::from_str(&body).map_err(|e| TranslationError::Decode(e.to_string()))?;
        parse_free_response(&value)
    }

    async fn translate_cloud(
        &self,
        api_key: &SecretString,
        text: &str,
        source_lang: &str,
        target_lang: &str,
    ) -> Result<String, TranslationError> {
        let response = self
            .http
            .post(format!("{}/language/translate/v2", self.base_url))
            .query(&[("key", api_key.expose_secret())])
            .json(&serde_json::json!({
                "q": text,
                "source": source_lang,
                "target": target_lang,
                "format": "text",
            }))
            .send()
            .await
            .map_err(|e| TranslationError::Network(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| TranslationError::Network(e.to_string()))?;

        if !status.is_success() {
            let message = serde_json::from_str::<CloudErrorBody>(&body)
                .map(|b| b.error.message)
                .unwrap_or_else(|_| body.chars().take(200).collect());
            return Err(TranslationError::Service {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: CloudResponse =
            serde_json::from_str(&body).map_err(|e| TranslationError::Decode(e.to_string()))?;
        let joined = parsed
            .data
            .translations
            .into_iter()
            .map(|t| t.translated_text)
            .collect::<Vec<_>>()
            .join("");
        non_blank(joined)
    }
}

/// The keyless endpoint answers with nested arrays:
/// `[[["translated segment", "source segment", ...], ...], null, "en", ...]`
fn parse_free_response(value: &Value) -> Result<String, TranslationError> {
    let segments = match value.get(0) {
        Some(Value::Array(segments)) => segments,
        Some(Value::Null) => return Err(TranslationError::Empty),
        _ => {
            return Err(TranslationError::Decode(
                "expected an array of translated segments".to_string(),
            ))
        }
    };

    let joined: String = segments
        .iter()
        .filter_map(|segment| segment.get(0).and_then(Value::as_str))
        .collect();
    non_blank(joined)
}

fn non_blank(text: String) -> Result<String, TranslationError> {
    if text.trim().is_empty() {
        Err(TranslationError::Empty)
    } else {
        Ok(text)
    }
}

#[async_trait]
impl Translator for GoogleTranslator {
    async fn translate(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
    ) -> Result<String, TranslationError> {
        debug!(
            backend = self.backend_name(),
            source_lang, target_lang, "Translating text"
        );
        match &self.backend {
            Backend::Free => self.translate_free(text, source_lang, target_lang).await,
            Backend::Cloud { api_key } => {
                self.translate_cloud(api_key, text, source_lang, target_lang)
                    .await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_free_response_joins_segments() {
        let value = json!([
            [
                ["नमस्ते। ", "Hello. ", null, null, 10],
                ["आप कैसे हैं?", "How are you?", null, null, 10]
            ],
            null,
            "en"
        ]);
        assert_eq!(parse_free_response(&value).unwrap(), "नमस्ते। आप कैसे हैं?");
    }

    #[test]
    fn test_parse_free_response_null_is_empty() {
        let value = json!([null, null, "en"]);
        assert!(matches!(
            parse_free_response(&value),
            Err(TranslationError::Empty)
        ));
    }

    #[test]
    fn test_parse_free_response_wrong_shape() {
        let value = json!({"sentences": []});
        assert!(matches!(
            parse_free_response(&value),
            Err(TranslationError::Decode(_))
        ));
    }

    #[test]
    fn test_parse_free_response_blank_segments() {
        let value = json!([[["  ", "", null]], null, "en"]);
        assert!(matches!(
            parse_free_response(&value),
            Err(TranslationError::Empty)
        ));
    }

    #[test]
    fn test_backend_selection() {
        let free = GoogleTranslator::new(None).unwrap();
        assert_eq!(free.backend_name(), "google-free");

        let cloud = GoogleTranslator::new(Some(SecretString::from("key".to_string()))).unwrap();
        assert_eq!(cloud.backend_name(), "google-cloud");
    }
}
