use crate::config::GeminiConfig;
use crate::error::{Result, TrendError};
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, info};

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const PLACEHOLDER_KEY: &str = "YOUR_API_KEY_HERE";
const MIN_KEY_LEN: usize = 30;

/// Returned when the model answers without any candidate text.
pub const NO_RESPONSE: &str = "Could not get a response from the model.";

/// Client for the Gemini `generateContent` endpoint.
///
/// One request per call: no retries and no canned fallback content.
pub struct GeminiClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiClient {
    /// Fails before any network call when the key is missing or obviously
    /// not a real key.
    pub fn new(config: &GeminiConfig) -> Result<Self> {
        let api_key = validate_key(config.api_key.as_deref())?;
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| TrendError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            model: config.model.clone(),
            base_url: API_BASE.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn generate(&self, system: &str, prompt: &str) -> Result<String> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        info!("Calling {} ({} prompt chars)", self.model, prompt.chars().count());

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&request_body(system, prompt))
            .send()
            .await
            .map_err(|e| TrendError::Llm(format!("Model API call failed: {}", e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| TrendError::Llm(format!("Failed to read model response: {}", e)))?;
        if !status.is_success() {
            return Err(TrendError::Llm(format!("{} - {}", status.as_u16(), text)));
        }

        let body: Value = serde_json::from_str(&text)
            .map_err(|e| TrendError::Llm(format!("Failed to parse model response: {}", e)))?;
        let answer = candidate_text(&body);
        debug!("model answered with {} chars", answer.chars().count());
        Ok(answer)
    }
}

pub fn validate_key(key: Option<&str>) -> Result<String> {
    match key.map(str::trim) {
        Some(key) if key != PLACEHOLDER_KEY && key.len() >= MIN_KEY_LEN => Ok(key.to_string()),
        _ => Err(TrendError::Config(
            "GEMINI_API_KEY is missing or not a valid key".to_string(),
        )),
    }
}

fn request_body(system: &str, prompt: &str) -> Value {
    json!({
        "contents": [{"parts": [{"text": prompt}]}],
        "systemInstruction": {"parts": [{"text": system}]},
        "generationConfig": {"temperature": 0.7, "topP": 0.95}
    })
}

/// Text of the first part of the first candidate.
fn candidate_text(body: &Value) -> String {
    body["candidates"][0]["content"]["parts"][0]["text"]
        .as_str()
        .map(|s| s.to_string())
        .unwrap_or_else(|| NO_RESPONSE.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const KEY: &str = "AIzaSyA-0123456789abcdefghijklmnopq";

    #[test]
    fn test_key_validation() {
        assert!(validate_key(None).is_err());
        assert!(validate_key(Some(PLACEHOLDER_KEY)).is_err());
        assert!(validate_key(Some("AIza-short")).is_err());
        assert_eq!(validate_key(Some(KEY)).unwrap(), KEY);
    }

    #[test]
    fn test_client_rejects_placeholder_before_calling() {
        let config = GeminiConfig {
            api_key: Some(PLACEHOLDER_KEY.to_string()),
            model: "m".to_string(),
            timeout: Duration::from_secs(90),
        };
        assert!(matches!(GeminiClient::new(&config), Err(TrendError::Config(_))));
    }

    #[test]
    fn test_request_body_shape() {
        let body = request_body("sys", "user");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "user");
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "sys");
        assert_eq!(body["generationConfig"]["temperature"], 0.7);
        assert_eq!(body["generationConfig"]["topP"], 0.95);
    }

    #[test]
    fn test_candidate_text() {
        let ok = json!({"candidates": [{"content": {"parts": [{"text": "ideas"}]}}]});
        assert_eq!(candidate_text(&ok), "ideas");
        assert_eq!(candidate_text(&json!({"candidates": []})), NO_RESPONSE);
        assert_eq!(candidate_text(&json!({})), NO_RESPONSE);
    }
}
