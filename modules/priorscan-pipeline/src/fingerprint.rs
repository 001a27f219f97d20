use ai_client::util::truncate_to_char_boundary;
use ai_client::Claude;
use anyhow::{anyhow, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Compact semantic representation of a scan's text, used to query the
/// external sources. Keywords always present; the embedding only under the
/// vector strategy.
#[derive(Debug, Clone, Default)]
pub struct Fingerprint {
    pub keywords: Vec<String>,
    pub embedding: Option<Vec<f32>>,
}

#[async_trait::async_trait]
pub trait Fingerprinter: Send + Sync {
    /// Derive the keyword fingerprint for one scan's text. Any failure here
    /// is fatal to the run: no search can proceed without a fingerprint.
    async fn fingerprint(&self, text: &str) -> Result<Fingerprint>;
}

/// What the LLM returns for a keyword extraction call.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct KeywordResponse {
    /// 3-5 salient search terms, most distinctive first
    #[serde(default)]
    pub keywords: Vec<String>,
}

const KEYWORD_SYSTEM_PROMPT: &str = r#"You extract search keywords from an inventor's free-text idea description.

Return 3 to 5 salient terms that capture what is technically distinctive about the idea. Prefer concrete nouns and noun phrases over verbs or adjectives. Order from most to least distinctive.

Rules:
- Each keyword is 1-3 words, lowercase
- No duplicates, no generic filler terms ("device", "system", "method" alone)
- Keywords must appear in or directly paraphrase the input text"#;

/// Keyword extraction backed by the Anthropic messages API.
pub struct KeywordExtractor {
    claude: Claude,
}

impl KeywordExtractor {
    pub fn new(anthropic_api_key: &str) -> Self {
        Self {
            claude: Claude::new(anthropic_api_key, "claude-haiku-4-5-20251001"),
        }
    }

    pub fn with_client(claude: Claude) -> Self {
        Self { claude }
    }
}

#[async_trait::async_trait]
impl Fingerprinter for KeywordExtractor {
    async fn fingerprint(&self, text: &str) -> Result<Fingerprint> {
        // Truncate to stay well inside the model's input limits
        let text = truncate_to_char_boundary(text, 30_000);

        let response: KeywordResponse = self
            .claude
            .extract(KEYWORD_SYSTEM_PROMPT, format!("Idea description:\n\n{text}"))
            .await?;

        let keywords: Vec<String> = response
            .keywords
            .into_iter()
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .take(5)
            .collect();

        if keywords.is_empty() {
            return Err(anyhow!("Keyword extraction returned no terms"));
        }

        info!(keywords = ?keywords, "Extracted fingerprint keywords");

        Ok(Fingerprint {
            keywords,
            embedding: None,
        })
    }
}
