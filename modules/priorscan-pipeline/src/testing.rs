//! Deterministic in-process doubles for the pipeline seams: no network, no
//! database. Compiled for unit tests and behind the `test-support` feature
//! for the integration suite.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use priorscan_common::{MatchRecord, Scan, ScanStatus, SourceKind};

use crate::embedder::TextEmbedder;
use crate::fingerprint::{Fingerprint, Fingerprinter};
use crate::sources::{MatchSource, RawHit};
use crate::store::ScanStore;

// ---------------------------------------------------------------------------
// Scan fixture
// ---------------------------------------------------------------------------

/// A fresh `processing` scan with the given text.
pub fn scan_fixture(text: &str) -> Scan {
    Scan {
        id: Uuid::new_v4(),
        user_id: None,
        input_text: text.to_string(),
        image_url: None,
        embedding: None,
        status: ScanStatus::Processing,
        created_at: Utc::now(),
    }
}

// ---------------------------------------------------------------------------
// MockFingerprinter
// ---------------------------------------------------------------------------

pub struct MockFingerprinter {
    keywords: Vec<String>,
    fail: bool,
    calls: AtomicU32,
}

impl MockFingerprinter {
    pub fn new(keywords: &[&str]) -> Self {
        Self {
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            fail: false,
            calls: AtomicU32::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            keywords: Vec::new(),
            fail: true,
            calls: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fingerprinter for MockFingerprinter {
    async fn fingerprint(&self, _text: &str) -> Result<Fingerprint> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(anyhow!("fingerprint service unreachable"));
        }
        Ok(Fingerprint {
            keywords: self.keywords.clone(),
            embedding: None,
        })
    }
}

// ---------------------------------------------------------------------------
// MockEmbedder
// ---------------------------------------------------------------------------

/// Returns pinned vectors by exact input text; unknown texts error, which
/// exercises the "failed per-candidate embedding drops the candidate" path.
#[derive(Default)]
pub struct MockEmbedder {
    vectors: HashMap<String, Vec<f32>>,
}

impl MockEmbedder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_vector(mut self, text: &str, vector: Vec<f32>) -> Self {
        self.vectors.insert(text.to_string(), vector);
        self
    }
}

#[async_trait]
impl TextEmbedder for MockEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.vectors
            .get(text)
            .cloned()
            .ok_or_else(|| anyhow!("no embedding pinned for: {text}"))
    }
}

// ---------------------------------------------------------------------------
// MockSource
// ---------------------------------------------------------------------------

enum SourceBehavior {
    Hits(Vec<RawHit>),
    Fail,
    Slow(Duration),
}

pub struct MockSource {
    name: String,
    kind: SourceKind,
    behavior: SourceBehavior,
}

impl MockSource {
    /// Hits from (title, url) pairs; other fields left for the normalizer.
    pub fn with_hits(name: &str, kind: SourceKind, hits: Vec<(&str, &str)>) -> Self {
        let hits = hits
            .into_iter()
            .map(|(title, url)| RawHit {
                title: Some(title.to_string()),
                owner: None,
                country: None,
                kind,
                legal_status: None,
                snippet: None,
                url: Some(url.to_string()),
                raw: None,
            })
            .collect();
        Self {
            name: name.to_string(),
            kind,
            behavior: SourceBehavior::Hits(hits),
        }
    }

    pub fn with_raw_hits(name: &str, kind: SourceKind, hits: Vec<RawHit>) -> Self {
        Self {
            name: name.to_string(),
            kind,
            behavior: SourceBehavior::Hits(hits),
        }
    }

    pub fn failing(name: &str, kind: SourceKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            behavior: SourceBehavior::Fail,
        }
    }

    pub fn slow(name: &str, kind: SourceKind, delay: Duration) -> Self {
        Self {
            name: name.to_string(),
            kind,
            behavior: SourceBehavior::Slow(delay),
        }
    }
}

#[async_trait]
impl MatchSource for MockSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SourceKind {
        self.kind
    }

    async fn search(&self, _fingerprint: &Fingerprint, cap: usize) -> Result<Vec<RawHit>> {
        match &self.behavior {
            SourceBehavior::Hits(hits) => Ok(hits.iter().take(cap).cloned().collect()),
            SourceBehavior::Fail => Err(anyhow!("source unreachable")),
            SourceBehavior::Slow(delay) => {
                tokio::time::sleep(*delay).await;
                Ok(Vec::new())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// In-memory `ScanStore` with switchable failure injection.
#[derive(Default)]
pub struct MemoryStore {
    scans: Mutex<HashMap<Uuid, Scan>>,
    matches: Mutex<Vec<MatchRecord>>,
    claimed: Mutex<HashSet<Uuid>>,
    fail_insert: Mutex<bool>,
    fail_status: Mutex<bool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_scan(&self, scan: Scan) {
        self.scans.lock().unwrap().insert(scan.id, scan);
    }

    pub fn status_of(&self, id: Uuid) -> Option<ScanStatus> {
        self.scans.lock().unwrap().get(&id).map(|s| s.status)
    }

    pub fn embedding_of(&self, id: Uuid) -> Option<Vec<f32>> {
        self.scans
            .lock()
            .unwrap()
            .get(&id)
            .and_then(|s| s.embedding.clone())
    }

    pub fn matches_for(&self, scan_id: Uuid) -> Vec<MatchRecord> {
        self.matches
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.scan_id == scan_id)
            .cloned()
            .collect()
    }

    pub fn fail_next_insert(&self) {
        *self.fail_insert.lock().unwrap() = true;
    }

    pub fn fail_status_writes(&self) {
        *self.fail_status.lock().unwrap() = true;
    }
}

#[async_trait]
impl ScanStore for MemoryStore {
    async fn fetch_scan(&self, id: Uuid) -> Result<Option<Scan>> {
        Ok(self.scans.lock().unwrap().get(&id).cloned())
    }

    async fn claim(&self, id: Uuid) -> Result<bool> {
        let scans = self.scans.lock().unwrap();
        let Some(scan) = scans.get(&id) else {
            return Ok(false);
        };
        if scan.status != ScanStatus::Processing {
            return Ok(false);
        }
        Ok(self.claimed.lock().unwrap().insert(id))
    }

    async fn cache_embedding(&self, id: Uuid, embedding: &[f32]) -> Result<()> {
        if let Some(scan) = self.scans.lock().unwrap().get_mut(&id) {
            scan.embedding = Some(embedding.to_vec());
        }
        Ok(())
    }

    async fn insert_matches(&self, _scan_id: Uuid, matches: &[MatchRecord]) -> Result<()> {
        if *self.fail_insert.lock().unwrap() {
            return Err(anyhow!("batch insert failed"));
        }
        self.matches.lock().unwrap().extend_from_slice(matches);
        Ok(())
    }

    async fn set_status(&self, id: Uuid, status: ScanStatus) -> Result<()> {
        if *self.fail_status.lock().unwrap() {
            return Err(anyhow!("status write failed"));
        }
        if let Some(scan) = self.scans.lock().unwrap().get_mut(&id) {
            scan.status = status;
        }
        Ok(())
    }
}
