use ai_client::OpenAi;
use anyhow::Result;

#[async_trait::async_trait]
pub trait TextEmbedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Wrapper around Voyage AI embeddings via the OpenAI-compatible API.
pub struct Embedder {
    client: OpenAi,
}

impl Embedder {
    /// Create a new embedder using Voyage AI's API. Returns 1024-dim vectors.
    pub fn new(voyage_api_key: &str) -> Self {
        let client = OpenAi::new(voyage_api_key, "voyage-3-large")
            .with_base_url("https://api.voyageai.com/v1");
        Self { client }
    }
}

#[async_trait::async_trait]
impl TextEmbedder for Embedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.client.embed(text).await
    }
}
