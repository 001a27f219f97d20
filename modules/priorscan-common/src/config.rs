use std::env;

/// Which similarity strategy the scorer runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreStrategy {
    /// Source-trust prior + keyword overlap. No per-candidate network
    /// round-trips; the robust default.
    Lexical,
    /// Cosine between the scan embedding and a fresh per-candidate
    /// embedding. One extra embedding call per candidate.
    Vector,
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Postgres
    pub database_url: String,

    // AI providers
    pub anthropic_api_key: String,
    pub voyage_api_key: String,

    // Patent registry
    pub patent_api_url: String,
    pub patent_api_key: String,

    // Pipeline tuning
    pub score_strategy: ScoreStrategy,
    pub score_seed: Option<u64>,
    pub per_source_cap: usize,
    pub source_timeout_secs: u64,

    // Web server
    pub web_host: String,
    pub web_port: u16,
}

impl Config {
    /// Load configuration from environment variables.
    /// Panics with a clear message if required vars are missing.
    pub fn from_env() -> Self {
        Self {
            database_url: required_env("DATABASE_URL"),
            anthropic_api_key: required_env("ANTHROPIC_API_KEY"),
            voyage_api_key: required_env("VOYAGE_API_KEY"),
            patent_api_url: env::var("PATENT_API_URL")
                .unwrap_or_else(|_| "https://search.patentsview.org/api/v1".to_string()),
            patent_api_key: required_env("PATENT_API_KEY"),
            score_strategy: match env::var("SCORE_STRATEGY").as_deref() {
                Ok("vector") => ScoreStrategy::Vector,
                _ => ScoreStrategy::Lexical,
            },
            score_seed: env::var("SCORE_SEED").ok().and_then(|s| s.parse().ok()),
            per_source_cap: env::var("PER_SOURCE_CAP")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5),
            source_timeout_secs: env::var("SOURCE_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(20),
            web_host: env::var("WEB_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            web_port: env::var("WEB_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .expect("WEB_PORT must be a number"),
        }
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}
