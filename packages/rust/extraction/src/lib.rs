//! Location extraction from free-form announcement text.
//!
//! [`TextExtractor`] is the capability the pipeline depends on.
//! [`LlmExtractor`] implements it against an OpenAI-compatible
//! chat-completions API (OpenRouter by default).

mod parser;
mod prompt;

use std::time::Duration;

use async_trait::async_trait;
use civicmap_shared::{CivicMapError, ExtractedData, ExtractionConfig, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};
use url::Url;

pub use parser::parse_extraction;

/// User-Agent string for extraction requests.
const USER_AGENT: &str = concat!("civicmap/", env!("CARGO_PKG_VERSION"));

/// Turns raw text into structured locations.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Extract pins and street sections.
    ///
    /// `Ok(None)` means no locations were recognizable. Errors are reserved
    /// for failures of the underlying capability.
    async fn extract(&self, text: &str) -> Result<Option<ExtractedData>>;
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    response_format: ResponseFormat,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

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
    content: Option<String>,
}

// ---------------------------------------------------------------------------
// LlmExtractor
// ---------------------------------------------------------------------------

/// Chat-completions backed extractor.
pub struct LlmExtractor {
    client: Client,
    endpoint: Url,
    api_key: String,
    model: String,
}

impl LlmExtractor {
    /// Build an extractor from config and an already-resolved API key.
    pub fn new(config: &ExtractionConfig, api_key: impl Into<String>) -> Result<Self> {
        let endpoint = format!("{}/chat/completions", config.base_url.trim_end_matches('/'));
        let endpoint = Url::parse(&endpoint).map_err(|e| {
            CivicMapError::config(format!("invalid extraction endpoint '{endpoint}': {e}"))
        })?;

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CivicMapError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint,
            api_key: api_key.into(),
            model: config.model.clone(),
        })
    }

    async fn complete(&self, text: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            temperature: 0.0,
            response_format: ResponseFormat {
                kind: "json_object",
            },
            messages: [
                ChatMessage {
                    role: "system",
                    content: prompt::SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: text,
                },
            ],
        };

        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CivicMapError::extraction("extraction request timed out")
                } else {
                    CivicMapError::extraction(format!("extraction request failed: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CivicMapError::extraction(format!(
                "extraction provider returned HTTP {status}: {}",
                body.chars().take(200).collect::<String>()
            )));
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| {
            CivicMapError::extraction(format!("invalid chat completion payload: {e}"))
        })?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| CivicMapError::extraction("chat completion contained no message content"))
    }
}

#[async_trait]
impl TextExtractor for LlmExtractor {
    #[instrument(skip_all, fields(model = %self.model, chars = text.chars().count()))]
    async fn extract(&self, text: &str) -> Result<Option<ExtractedData>> {
        info!("extracting locations");
        let content = self.complete(text).await?;
        debug!(len = content.len(), "received extraction reply");

        let data = parse_extraction(&content)?;
        match &data {
            Some(d) => info!(pins = d.pins.len(), streets = d.streets.len(), "locations extracted"),
            None => info!("no locations found in text"),
        }
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> ExtractionConfig {
        ExtractionConfig {
            base_url: server.uri(),
            timeout_secs: 5,
            ..ExtractionConfig::default()
        }
    }

    fn completion(content: &str) -> serde_json::Value {
        serde_json::json!({
            "id": "gen-1",
            "choices": [{ "index": 0, "message": { "role": "assistant", "content": content } }]
        })
    }

    #[tokio::test]
    async fn extracts_locations_from_completion() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_partial_json(serde_json::json!({
                "model": "google/gemini-2.5-flash",
                "response_format": { "type": "json_object" }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion(
                r#"{"pins":[{"address":"бул. Витоша 1","timespans":[]}],"streets":[]}"#,
            )))
            .expect(1)
            .mount(&server)
            .await;

        let extractor = LlmExtractor::new(&config_for(&server), "test-key").unwrap();
        let data = extractor
            .extract("Спира водата на бул. Витоша 1")
            .await
            .unwrap()
            .expect("locations");

        assert_eq!(data.pins.len(), 1);
        assert_eq!(data.pins[0].address, "бул. Витоша 1");
    }

    #[tokio::test]
    async fn empty_reply_is_not_an_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(completion(r#"{"pins":[],"streets":[]}"#)),
            )
            .mount(&server)
            .await;

        let extractor = LlmExtractor::new(&config_for(&server), "test-key").unwrap();
        let data = extractor.extract("Честит празник!").await.unwrap();
        assert!(data.is_none());
    }

    #[tokio::test]
    async fn provider_error_is_extraction_failure() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let extractor = LlmExtractor::new(&config_for(&server), "test-key").unwrap();
        let err = extractor.extract("текст").await.unwrap_err();
        assert!(matches!(err, CivicMapError::ExtractionFailed(_)));
        assert!(err.to_string().contains("502"));
    }

    #[tokio::test]
    async fn missing_content_is_extraction_failure() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "choices": [] })))
            .mount(&server)
            .await;

        let extractor = LlmExtractor::new(&config_for(&server), "test-key").unwrap();
        let err = extractor.extract("текст").await.unwrap_err();
        assert!(matches!(err, CivicMapError::ExtractionFailed(_)));
    }

    #[tokio::test]
    async fn malformed_reply_is_extraction_failure() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("{\"pins\": [")))
            .mount(&server)
            .await;

        let extractor = LlmExtractor::new(&config_for(&server), "test-key").unwrap();
        let err = extractor.extract("текст").await.unwrap_err();
        assert!(matches!(err, CivicMapError::ExtractionFailed(_)));
    }

    #[test]
    fn rejects_invalid_base_url() {
        let config = ExtractionConfig {
            base_url: "::not a url::".into(),
            ..ExtractionConfig::default()
        };
        assert!(LlmExtractor::new(&config, "k").is_err());
    }
}
