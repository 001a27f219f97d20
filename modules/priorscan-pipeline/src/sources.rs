use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use tracing::{info, warn};

use ai_client::util::extract_json_array;
use ai_client::Claude;
use priorscan_common::SourceKind;

use crate::fingerprint::Fingerprint;

/// One raw hit from an external source, before normalization. Every field
/// the source may omit is optional; the normalizer fills defaults.
#[derive(Debug, Clone)]
pub struct RawHit {
    pub title: Option<String>,
    pub owner: Option<String>,
    pub country: Option<String>,
    pub kind: SourceKind,
    pub legal_status: Option<String>,
    pub snippet: Option<String>,
    pub url: Option<String>,
    pub raw: Option<serde_json::Value>,
}

/// One external corpus queried for candidate matches.
#[async_trait::async_trait]
pub trait MatchSource: Send + Sync {
    fn name(&self) -> &str;
    fn kind(&self) -> SourceKind;

    /// Query the corpus with the fingerprint. At most `cap` hits come back.
    /// Errors are absorbed by the aggregator: a failed source contributes
    /// zero candidates, nothing more.
    async fn search(&self, fingerprint: &Fingerprint, cap: usize) -> Result<Vec<RawHit>>;
}

// ---------------------------------------------------------------------------
// Source trust priors
// ---------------------------------------------------------------------------

/// Baseline trust for a candidate, by source kind with domain adjustments.
/// A verified registry hit starts higher than an AI-discovered one.
pub fn source_trust(kind: SourceKind, url: &str) -> f32 {
    let domain = extract_domain(url);
    match domain.as_str() {
        // Patent registries
        d if d.contains("patentsview.org") || d.contains("patents.google.com") => 0.95,
        d if d.contains("epo.org") || d.contains("uspto.gov") => 0.95,
        // Research repositories
        d if d.contains("arxiv.org") || d.contains("doi.org") => 0.8,
        d if d.ends_with(".edu") || d.contains("nature.com") || d.contains("ieee.org") => 0.8,
        // Startup/company databases
        d if d.contains("crunchbase.com") || d.contains("pitchbook.com") => 0.65,
        d if d.contains("producthunt.com") || d.contains("kickstarter.com") => 0.55,
        // Fall back to the kind-level prior
        _ => match kind {
            SourceKind::Patent => 0.9,
            SourceKind::Research => 0.7,
            SourceKind::Startup => 0.55,
            SourceKind::Product => 0.5,
        },
    }
}

fn extract_domain(url: &str) -> String {
    url.split("://")
        .nth(1)
        .unwrap_or(url)
        .split('/')
        .next()
        .unwrap_or("")
        .to_lowercase()
}

// ---------------------------------------------------------------------------
// Patent registry (structured lookup)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct PatentSearchResponse {
    #[serde(default)]
    patents: Vec<PatentHit>,
}

#[derive(Debug, Deserialize)]
struct PatentHit {
    patent_id: String,
    patent_title: Option<String>,
    patent_abstract: Option<String>,
    patent_type: Option<String>,
    #[serde(default)]
    assignees: Vec<PatentAssignee>,
}

#[derive(Debug, Deserialize)]
struct PatentAssignee {
    assignee_organization: Option<String>,
    assignee_country: Option<String>,
}

/// PatentsView-style registry search: keyword query against patent titles
/// and abstracts, typed JSON response.
pub struct PatentRegistry {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl PatentRegistry {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }
}

#[async_trait::async_trait]
impl MatchSource for PatentRegistry {
    fn name(&self) -> &str {
        "patent-registry"
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Patent
    }

    async fn search(&self, fingerprint: &Fingerprint, cap: usize) -> Result<Vec<RawHit>> {
        let url = format!("{}/patent/", self.base_url);
        let terms = fingerprint.keywords.join(" ");

        let body = serde_json::json!({
            "q": { "_or": [
                { "_text_any": { "patent_title": terms } },
                { "_text_any": { "patent_abstract": terms } },
            ]},
            "f": ["patent_id", "patent_title", "patent_abstract", "patent_type",
                  "assignees.assignee_organization", "assignees.assignee_country"],
            "o": { "size": cap },
        });

        let response = self
            .http
            .post(&url)
            .header("X-Api-Key", &self.api_key)
            .json(&body)
            .send()
            .await
            .context("Patent registry request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(anyhow!("Patent registry error ({status}): {error_text}"));
        }

        let parsed: PatentSearchResponse = response
            .json()
            .await
            .context("Patent registry returned malformed JSON")?;

        let hits: Vec<RawHit> = parsed
            .patents
            .into_iter()
            .take(cap)
            .map(|p| {
                let assignee = p.assignees.first();
                RawHit {
                    title: p.patent_title.clone(),
                    owner: assignee.and_then(|a| a.assignee_organization.clone()),
                    country: assignee.and_then(|a| a.assignee_country.clone()),
                    kind: SourceKind::Patent,
                    legal_status: p.patent_type.clone(),
                    snippet: p.patent_abstract.clone(),
                    url: Some(format!(
                        "https://patents.google.com/patent/US{}",
                        p.patent_id
                    )),
                    raw: Some(serde_json::json!({
                        "patent_id": p.patent_id,
                        "patent_type": p.patent_type,
                    })),
                }
            })
            .collect();

        info!(count = hits.len(), "Patent registry hits");
        Ok(hits)
    }
}

// ---------------------------------------------------------------------------
// AI-mediated discovery
// ---------------------------------------------------------------------------

/// What each discovered item should look like. Parsed element-by-element so
/// one malformed entry doesn't sink the rest.
#[derive(Debug, Deserialize)]
struct DiscoveredItem {
    name: String,
    owner: Option<String>,
    country: Option<String>,
    status: Option<String>,
    snippet: Option<String>,
    url: Option<String>,
}

const DISCOVERY_SYSTEM_PROMPT: &str = r#"You are an innovation scout. Given search keywords describing an idea, list real, pre-existing innovations from the corpus you are asked about that are similar to the idea.

Respond with ONLY a JSON array. Each element:
{"name": "...", "owner": "...", "country": "...", "status": "...", "snippet": "one or two sentences on what it does and how it overlaps", "url": "https://..."}

Rules:
- Only real entries you are confident exist; never invent names or URLs
- "url" must be an absolute http(s) link to the innovation's page
- Omit a field rather than guessing it
- No prose before or after the array"#;

/// AI-mediated discovery against one corpus (startup landscape, research
/// literature). The reply is semi-structured free text expected to embed a
/// single array payload; parsing is defensive throughout.
pub struct AiDiscovery {
    claude: Claude,
    name: String,
    kind: SourceKind,
    corpus: String,
}

impl AiDiscovery {
    pub fn new(claude: Claude, name: &str, kind: SourceKind, corpus: &str) -> Self {
        Self {
            claude,
            name: name.to_string(),
            kind,
            corpus: corpus.to_string(),
        }
    }

    /// Discovery over the startup and commercial product landscape.
    pub fn startups(claude: Claude) -> Self {
        Self::new(
            claude,
            "ai-startup-discovery",
            SourceKind::Startup,
            "startups, commercial products and funded companies",
        )
    }

    /// Discovery over published research and academic prototypes.
    pub fn research(claude: Claude) -> Self {
        Self::new(
            claude,
            "ai-research-discovery",
            SourceKind::Research,
            "published research, academic prototypes and preprints",
        )
    }

    fn parse_reply(&self, reply: &str, cap: usize) -> Result<Vec<RawHit>> {
        let array_text = extract_json_array(reply)
            .ok_or_else(|| anyhow!("No JSON array in discovery response"))?;

        let elements: Vec<serde_json::Value> =
            serde_json::from_str(array_text).context("Discovery array failed to parse")?;

        let mut hits = Vec::new();
        for element in elements {
            let item: DiscoveredItem = match serde_json::from_value(element) {
                Ok(item) => item,
                Err(e) => {
                    warn!(source = self.name.as_str(), error = %e, "Discarding malformed discovery item");
                    continue;
                }
            };

            // An un-attributable match is worse than no match
            let Some(url) = item.url.filter(|u| crate::normalize::valid_http_url(u)) else {
                warn!(
                    source = self.name.as_str(),
                    name = item.name.as_str(),
                    "Discarding discovery item without a valid URL"
                );
                continue;
            };

            hits.push(RawHit {
                title: Some(item.name),
                owner: item.owner,
                country: item.country,
                kind: self.kind,
                legal_status: item.status,
                snippet: item.snippet,
                url: Some(url),
                raw: None,
            });

            if hits.len() >= cap {
                break;
            }
        }

        Ok(hits)
    }
}

#[async_trait::async_trait]
impl MatchSource for AiDiscovery {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SourceKind {
        self.kind
    }

    async fn search(&self, fingerprint: &Fingerprint, cap: usize) -> Result<Vec<RawHit>> {
        let user_prompt = format!(
            "Corpus: {}\n\nKeywords: {}\n\nList up to {cap} similar pre-existing innovations.",
            self.corpus,
            fingerprint.keywords.join(", "),
        );

        let reply = self
            .claude
            .complete(DISCOVERY_SYSTEM_PROMPT, user_prompt)
            .await?;

        let hits = self.parse_reply(&reply, cap)?;
        info!(source = self.name.as_str(), count = hits.len(), "Discovery hits");
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trust_prefers_registries_over_ai_sources() {
        let patent = source_trust(SourceKind::Patent, "https://patents.google.com/patent/US1");
        let startup = source_trust(SourceKind::Startup, "https://example.com/startup");
        assert!(patent > startup);
    }

    #[test]
    fn trust_uses_domain_overrides() {
        assert_eq!(
            source_trust(SourceKind::Research, "https://arxiv.org/abs/2101.00001"),
            0.8
        );
        assert_eq!(
            source_trust(SourceKind::Startup, "https://www.crunchbase.com/org/x"),
            0.65
        );
    }

    #[test]
    fn discovery_parse_discards_bad_items_and_bad_urls() {
        let discovery = AiDiscovery::startups(Claude::new("test-key", "test-model"));
        let reply = r#"Here is what I found:
```json
[
  {"name": "DripSense", "owner": "DripSense Ltd", "url": "https://dripsense.example.com"},
  {"name": "NoUrl Co"},
  {"name": "BadScheme", "url": "ftp://files.example.com"},
  {"owner": "missing name entirely"},
  {"name": "GrowMate", "snippet": "Soil probes", "url": "http://growmate.example.org"}
]
```"#;

        let hits = discovery.parse_reply(reply, 10).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].title.as_deref(), Some("DripSense"));
        assert_eq!(hits[1].title.as_deref(), Some("GrowMate"));
    }

    #[test]
    fn discovery_parse_respects_cap() {
        let discovery = AiDiscovery::research(Claude::new("test-key", "test-model"));
        let reply = r#"[
            {"name": "A", "url": "https://a.example.com"},
            {"name": "B", "url": "https://b.example.com"},
            {"name": "C", "url": "https://c.example.com"}
        ]"#;

        let hits = discovery.parse_reply(reply, 2).unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn discovery_parse_fails_without_array() {
        let discovery = AiDiscovery::startups(Claude::new("test-key", "test-model"));
        assert!(discovery.parse_reply("I could not find anything.", 5).is_err());
    }
}
