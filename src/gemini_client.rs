use crate::advice::TextGenerator;
use crate::errors::AppError;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

/// Client for the Gemini `generateContent` REST endpoint.
#[derive(Clone)]
pub struct GeminiClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

impl GeminiClient {
    /// Creates a new `GeminiClient`.
    ///
    /// # Arguments
    ///
    /// * `base_url` - API root, e.g. `https://generativelanguage.googleapis.com`.
    /// * `model` - Model name, e.g. `gemini-1.5-flash`.
    /// * `api_key` - API key sent as the `key` query parameter.
    pub fn new(base_url: String, model: String, api_key: String) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                AppError::ExternalApiError(format!("Failed to create Gemini client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            api_key,
        })
    }

    /// Sends one prompt and returns the concatenated text of the first candidate.
    pub async fn generate_content(&self, prompt: &str) -> Result<String, AppError> {
        let url = reqwest::Url::parse_with_params(
            &format!(
                "{}/v1beta/models/{}:generateContent",
                self.base_url, self.model
            ),
            &[("key", self.api_key.as_str())],
        )
        .map_err(|e| AppError::ExternalApiError(format!("Failed to build URL: {}", e)))?;

        tracing::info!("Requesting text from Gemini model {}", self.model);

        let response = self
            .client
            .post(url)
            .json(&json!({
                "contents": [{ "parts": [{ "text": prompt }] }]
            }))
            .send()
            .await
            .map_err(|e| AppError::ExternalApiError(format!("Gemini request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            tracing::error!("Gemini returned error {}: {}", status, error_text);
            return Err(AppError::ExternalApiError(format!(
                "Gemini returned status {}: {}",
                status, error_text
            )));
        }

        let body: GenerateContentResponse = response.json().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to parse Gemini response: {}", e))
        })?;

        let text: String = body
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(AppError::ExternalApiError(
                "Gemini response contained no text".to_string(),
            ));
        }

        Ok(text)
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String, AppError> {
        self.generate_content(prompt).await
    }
}
