use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How many characters of snippet a persisted match keeps.
pub const SNIPPET_MAX_CHARS: usize = 500;

// ---------------------------------------------------------------------------
// Scan lifecycle
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    Processing,
    Completed,
    Failed,
}

impl ScanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanStatus::Processing => "processing",
            ScanStatus::Completed => "completed",
            ScanStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "processing" => Some(ScanStatus::Processing),
            "completed" => Some(ScanStatus::Completed),
            "failed" => Some(ScanStatus::Failed),
            _ => None,
        }
    }

    /// Terminal scans are never reopened; a new submission creates a new scan.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ScanStatus::Completed | ScanStatus::Failed)
    }
}

impl std::fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One user submission and its lifecycle state. Created outside the
/// pipeline with status `processing`; the pipeline mutates only the status
/// and the cached embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scan {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub input_text: String,
    pub image_url: Option<String>,
    pub embedding: Option<Vec<f32>>,
    pub status: ScanStatus,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Sources and candidates
// ---------------------------------------------------------------------------

/// Which external corpus a candidate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Patent,
    Startup,
    Research,
    Product,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Patent => "patent",
            SourceKind::Startup => "startup",
            SourceKind::Research => "research",
            SourceKind::Product => "product",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "patent" => Some(SourceKind::Patent),
            "startup" => Some(SourceKind::Startup),
            "research" => Some(SourceKind::Research),
            "product" => Some(SourceKind::Product),
            _ => None,
        }
    }

    /// Legal/status label to assume when a source reports none.
    pub fn default_legal_status(&self) -> &'static str {
        match self {
            SourceKind::Patent => "Granted",
            SourceKind::Startup => "Active",
            SourceKind::Research => "Published",
            SourceKind::Product => "On market",
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An unscored tentative match gathered from one source during one run.
/// Transient: lives only inside a pipeline invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub title: String,
    pub owner: String,
    pub country: String,
    pub kind: SourceKind,
    pub legal_status: String,
    pub snippet: String,
    pub source_url: String,
    /// Trust prior of the source that produced this candidate, in [0, 1].
    pub trust: f32,
    /// Raw source payload, kept for debugging and downstream enrichment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<serde_json::Value>,
}

// ---------------------------------------------------------------------------
// Persisted match
// ---------------------------------------------------------------------------

/// A scored candidate persisted against its scan. Immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchRecord {
    pub scan_id: Uuid,
    pub title: String,
    pub owner: String,
    pub country: String,
    pub kind: SourceKind,
    pub legal_status: String,
    pub snippet: String,
    pub source_url: String,
    /// Invariant: 0 ≤ similarity_score ≤ 100.
    pub similarity_score: f64,
}

impl MatchRecord {
    pub fn from_candidate(scan_id: Uuid, candidate: &Candidate, similarity_score: f64) -> Self {
        Self {
            scan_id,
            title: candidate.title.clone(),
            owner: candidate.owner.clone(),
            country: candidate.country.clone(),
            kind: candidate.kind,
            legal_status: candidate.legal_status.clone(),
            snippet: truncate_chars(&candidate.snippet, SNIPPET_MAX_CHARS).to_string(),
            source_url: candidate.source_url.clone(),
            similarity_score,
        }
    }
}

/// Truncate to at most `max_chars` characters (not bytes).
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
