use anyhow::{anyhow, Result};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::debug;

const OPENAI_API_URL: &str = "https://api.openai.com/v1";

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Serialize)]
struct EmbeddingRequest {
    model: String,
    input: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

// =============================================================================
// OpenAI-compatible client
// =============================================================================

/// Client for an OpenAI-compatible embeddings API. Voyage AI exposes the
/// same request/response shape, so one client covers both.
#[derive(Clone)]
pub struct OpenAi {
    api_key: String,
    embedding_model: String,
    http: reqwest::Client,
    base_url: String,
}

impl OpenAi {
    pub fn new(api_key: impl Into<String>, embedding_model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            embedding_model: embedding_model.into(),
            http: reqwest::Client::new(),
            base_url: OPENAI_API_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.api_key))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    async fn embeddings(&self, input: serde_json::Value) -> Result<EmbeddingResponse> {
        let url = format!("{}/embeddings", self.base_url);

        debug!(model = %self.embedding_model, "Embedding request");

        let request = EmbeddingRequest {
            model: self.embedding_model.clone(),
            input,
        };

        let response = self
            .http
            .post(&url)
            .headers(self.headers()?)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            return Err(anyhow!("Embedding API error ({}): {}", status, error_text));
        }

        Ok(response.json().await?)
    }

    /// Embed a single text.
    pub async fn embed(&self, text: impl Into<String>) -> Result<Vec<f32>> {
        let response = self
            .embeddings(serde_json::Value::String(text.into()))
            .await?;

        response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| anyhow!("No embedding in response"))
    }

    /// Embed multiple texts in one call. The API returns vectors in input
    /// order.
    pub async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let response = self.embeddings(serde_json::json!(texts)).await?;

        Ok(response.data.into_iter().map(|d| d.embedding).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_base_url_overrides_default() {
        let client = OpenAi::new("key", "voyage-3-large")
            .with_base_url("https://api.voyageai.com/v1");
        assert_eq!(client.base_url, "https://api.voyageai.com/v1");
    }

    #[test]
    fn embedding_response_deserializes() {
        let json = r#"{"data": [{"embedding": [0.1, 0.2]}, {"embedding": [0.3, 0.4]}]}"#;
        let response: EmbeddingResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.data.len(), 2);
        assert_eq!(response.data[0].embedding, vec![0.1, 0.2]);
    }
}
