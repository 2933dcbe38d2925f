use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

pub const DEFAULT_GENERATION_ENDPOINT: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent";

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("generation request timed out after {0:?}")]
    Timeout(Duration),

    #[error("generation service returned {status}: {details}")]
    Http { status: u16, details: String },

    #[error("malformed generation response: {0}")]
    Malformed(String),

    #[error("generation transport error: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),
}

/// Client for a `generateContent`-style text generation endpoint.
pub struct GenerationClient {
    client: Client,
    endpoint: Url,
    timeout: Duration,
}

impl GenerationClient {
    pub fn new(
        endpoint: &str,
        api_key: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, GenerationError> {
        let mut endpoint = Url::parse(endpoint)?;
        if let Some(api_key) = api_key.map(str::trim).filter(|key| !key.is_empty()) {
            endpoint.query_pairs_mut().append_pair("key", api_key);
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(GenerationError::Transport)?;

        Ok(Self {
            client,
            endpoint,
            timeout,
        })
    }

    pub async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let body = json!({
            "contents": [{
                "parts": [{ "text": prompt }]
            }]
        });

        debug!(prompt_chars = prompt.chars().count(), "calling generation service");
        let response = self
            .client
            .post(self.endpoint.clone())
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|error| self.classify(error))?;

        let status = response.status();
        let payload: Value = if status.is_success() {
            response.json().await.map_err(|error| {
                if error.is_timeout() {
                    GenerationError::Timeout(self.timeout)
                } else {
                    GenerationError::Malformed(error.to_string())
                }
            })?
        } else {
            let raw = response.text().await.unwrap_or_default();
            let details = error_details(&raw, status.canonical_reason());
            warn!(status = status.as_u16(), %details, "generation service rejected the request");
            return Err(GenerationError::Http {
                status: status.as_u16(),
                details,
            });
        };

        reply_text(&payload)
    }

    fn classify(&self, error: reqwest::Error) -> GenerationError {
        if error.is_timeout() {
            GenerationError::Timeout(self.timeout)
        } else {
            GenerationError::Transport(error)
        }
    }
}

/// Text of the first candidate part.
pub fn reply_text(payload: &Value) -> Result<String, GenerationError> {
    payload
        .pointer("/candidates/0/content/parts/0/text")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| GenerationError::Malformed(format!("no candidate text in {payload}")))
}

fn error_details(raw: &str, reason: Option<&str>) -> String {
    serde_json::from_str::<Value>(raw)
        .ok()
        .and_then(|value| {
            value
                .pointer("/error/message")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| reason.unwrap_or("unknown error").to_string())
}

#[cfg(test)]
mod tests {
    use super::{error_details, reply_text, GenerationClient, GenerationError};
    use serde_json::json;
    use std::time::Duration;

    #[test]
    fn reply_text_reads_the_first_candidate() {
        let payload = json!({
            "candidates": [{
                "content": { "parts": [{ "text": "*Monitores*" }, { "text": "extra" }] }
            }]
        });
        assert_eq!(reply_text(&payload).expect("text expected"), "*Monitores*");
    }

    #[test]
    fn missing_candidates_are_malformed() {
        let payload = json!({ "promptFeedback": { "blockReason": "SAFETY" } });
        assert!(matches!(reply_text(&payload), Err(GenerationError::Malformed(_))));
    }

    #[test]
    fn error_details_prefer_the_service_message() {
        let raw = r#"{"error": {"code": 400, "message": "API key not valid"}}"#;
        assert_eq!(error_details(raw, Some("Bad Request")), "API key not valid");
        assert_eq!(error_details("<html>", Some("Bad Gateway")), "Bad Gateway");
        assert_eq!(error_details("", None), "unknown error");
    }

    #[test]
    fn api_key_is_sent_as_query_parameter() {
        let client = GenerationClient::new(
            "https://example.com/v1/models/m:generateContent",
            Some(" secret "),
            Duration::from_secs(30),
        )
        .expect("valid endpoint");
        assert_eq!(client.endpoint.query(), Some("key=secret"));
    }

    #[test]
    fn invalid_endpoint_is_rejected() {
        let result = GenerationClient::new("not a url", None, Duration::from_secs(1));
        assert!(matches!(result, Err(GenerationError::Url(_))));
    }
}
