use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use sqlx::PgPool;
use tracing::{error, info, warn};
use uuid::Uuid;

use ai_client::Claude;
use priorscan_common::{
    Candidate, Config, MatchRecord, Scan, ScanError, ScanStatus, ScoreStrategy,
};

use crate::aggregate::Aggregator;
use crate::embedder::{Embedder, TextEmbedder};
use crate::fingerprint::{Fingerprinter, KeywordExtractor};
use crate::normalize::{dedup_candidates, normalize, valid_http_url};
use crate::score::{sort_by_score, Jitter, SimilarityScorer};
use crate::sources::{AiDiscovery, MatchSource, PatentRegistry};
use crate::store::{PgScanStore, ScanStore};

/// Cap on in-flight per-candidate embedding calls under the vector
/// strategy. Keeps a large candidate set from turning into an unbounded
/// fan-out.
const EMBED_CONCURRENCY: usize = 4;

/// Stats from one pipeline run.
#[derive(Debug, Default)]
pub struct RunReport {
    pub scan_id: Uuid,
    pub sources_queried: u32,
    pub sources_failed: u32,
    pub candidates_gathered: u32,
    pub candidates_deduplicated: u32,
    pub candidates_dropped: u32,
    pub matches_persisted: u32,
}

impl std::fmt::Display for RunReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Scan run: sources={}/{} ok, gathered={}, deduped={}, dropped={}, persisted={}",
            self.sources_queried - self.sources_failed,
            self.sources_queried,
            self.candidates_gathered,
            self.candidates_deduplicated,
            self.candidates_dropped,
            self.matches_persisted,
        )
    }
}

/// The scan-processing pipeline. Stateless between invocations except
/// through the store; processes exactly one scan per call.
pub struct ScanPipeline {
    store: Arc<dyn ScanStore>,
    fingerprinter: Arc<dyn Fingerprinter>,
    embedder: Option<Arc<dyn TextEmbedder>>,
    aggregator: Aggregator,
    strategy: ScoreStrategy,
    jitter: Jitter,
}

impl ScanPipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn ScanStore>,
        fingerprinter: Arc<dyn Fingerprinter>,
        embedder: Option<Arc<dyn TextEmbedder>>,
        sources: Vec<Arc<dyn MatchSource>>,
        strategy: ScoreStrategy,
        jitter: Jitter,
        per_source_cap: usize,
        source_timeout: Duration,
    ) -> Self {
        Self {
            store,
            fingerprinter,
            embedder,
            aggregator: Aggregator::new(sources, per_source_cap, source_timeout),
            strategy,
            jitter,
        }
    }

    /// Wire up the production pipeline: Postgres store, Claude keyword
    /// extraction and discovery, Voyage embeddings, patent registry.
    pub fn from_config(config: &Config, pool: PgPool) -> Self {
        let claude = Claude::new(&config.anthropic_api_key, "claude-haiku-4-5-20251001");

        let sources: Vec<Arc<dyn MatchSource>> = vec![
            Arc::new(PatentRegistry::new(
                &config.patent_api_url,
                &config.patent_api_key,
            )),
            Arc::new(AiDiscovery::startups(claude.clone())),
            Arc::new(AiDiscovery::research(claude.clone())),
        ];

        let jitter = match config.score_seed {
            Some(seed) => Jitter::Seeded(seed),
            None => Jitter::Entropy,
        };

        Self::new(
            Arc::new(PgScanStore::new(pool)),
            Arc::new(KeywordExtractor::with_client(claude)),
            Some(Arc::new(Embedder::new(&config.voyage_api_key))),
            sources,
            config.score_strategy,
            jitter,
            config.per_source_cap,
            Duration::from_secs(config.source_timeout_secs),
        )
    }

    /// Process one scan end to end. Fatal errors transition the scan to
    /// `failed` (best effort) before propagating; request-level errors
    /// mutate nothing.
    pub async fn process(&self, scan_id: Uuid) -> Result<RunReport, ScanError> {
        let scan = self
            .store
            .fetch_scan(scan_id)
            .await?
            .ok_or(ScanError::ScanNotFound(scan_id))?;

        // Precondition guaranteed at scan creation; if violated anyway,
        // reject before contacting any external service.
        if scan.input_text.trim().is_empty() {
            return Err(ScanError::InvalidRequest(
                "scan has empty input text".to_string(),
            ));
        }

        if scan.status.is_terminal() {
            return Err(ScanError::InvalidRequest(format!(
                "scan is already {}",
                scan.status
            )));
        }

        // Idempotency guard: exactly one run per scan.
        if !self.store.claim(scan_id).await? {
            return Err(ScanError::RunConflict(scan_id));
        }

        match self.run_claimed(&scan).await {
            Ok(report) => {
                info!(scan_id = %scan_id, "{report}");
                Ok(report)
            }
            Err(e) => {
                if e.is_fatal() {
                    self.mark_failed(scan_id).await;
                }
                Err(e)
            }
        }
    }

    async fn run_claimed(&self, scan: &Scan) -> Result<RunReport, ScanError> {
        // The single required round-trip with no fallback.
        let mut fingerprint = self
            .fingerprinter
            .fingerprint(&scan.input_text)
            .await
            .map_err(|e| ScanError::ServiceUnavailable(e.to_string()))?;

        if self.strategy == ScoreStrategy::Vector {
            fingerprint.embedding = Some(self.scan_embedding(scan).await?);
        }

        let outcome = self.aggregator.gather(&fingerprint).await;

        let mut report = RunReport {
            scan_id: scan.id,
            sources_queried: outcome.sources_queried,
            sources_failed: outcome.sources_failed,
            candidates_gathered: outcome.hits.len() as u32,
            ..RunReport::default()
        };

        let candidates: Vec<Candidate> = outcome.hits.into_iter().map(normalize).collect();

        let before_dedup = candidates.len();
        let candidates = dedup_candidates(candidates);
        report.candidates_deduplicated = (before_dedup - candidates.len()) as u32;

        // An un-attributable match is worse than no match.
        let before_url_filter = candidates.len();
        let candidates: Vec<Candidate> = candidates
            .into_iter()
            .filter(|c| valid_http_url(&c.source_url))
            .collect();
        report.candidates_dropped += (before_url_filter - candidates.len()) as u32;

        let mut scored = match self.strategy {
            ScoreStrategy::Lexical => {
                let mut scorer = SimilarityScorer::new(self.jitter);
                candidates
                    .into_iter()
                    .map(|c| {
                        let score = scorer.lexical(&fingerprint, &c);
                        (c, score)
                    })
                    .collect()
            }
            ScoreStrategy::Vector => {
                self.score_vector(&fingerprint, candidates, &mut report)
                    .await?
            }
        };

        sort_by_score(&mut scored);

        let matches: Vec<MatchRecord> = scored
            .iter()
            .map(|(c, score)| MatchRecord::from_candidate(scan.id, c, *score))
            .collect();

        // All rows or none; a failed batch is a failed run. Zero matches is
        // a valid, displayable outcome and still completes the scan.
        self.store
            .insert_matches(scan.id, &matches)
            .await
            .map_err(|e| ScanError::PersistenceFailure(e.to_string()))?;

        self.store
            .set_status(scan.id, ScanStatus::Completed)
            .await
            .map_err(|e| ScanError::PersistenceFailure(e.to_string()))?;

        report.matches_persisted = matches.len() as u32;
        Ok(report)
    }

    /// Resolve the scan's own embedding: reuse the cached one when present,
    /// otherwise compute and cache it.
    async fn scan_embedding(&self, scan: &Scan) -> Result<Vec<f32>, ScanError> {
        let embedder = self.embedder.as_ref().ok_or_else(|| {
            ScanError::ServiceUnavailable("vector strategy configured without an embedder".into())
        })?;

        if let Some(cached) = &scan.embedding {
            return Ok(cached.clone());
        }

        let embedding = embedder
            .embed(&scan.input_text)
            .await
            .map_err(|e| ScanError::ServiceUnavailable(e.to_string()))?;

        if let Err(e) = self.store.cache_embedding(scan.id, &embedding).await {
            warn!(scan_id = %scan.id, error = %e, "Failed to cache scan embedding, continuing");
        }

        Ok(embedding)
    }

    /// Vector strategy: one embedding call per surviving candidate, bounded
    /// fan-out, order-preserving so score ties keep arrival order. A failed
    /// per-candidate embedding drops that candidate.
    async fn score_vector(
        &self,
        fingerprint: &crate::fingerprint::Fingerprint,
        candidates: Vec<Candidate>,
        report: &mut RunReport,
    ) -> Result<Vec<(Candidate, f64)>, ScanError> {
        let scan_embedding = fingerprint.embedding.as_ref().ok_or_else(|| {
            ScanError::ServiceUnavailable("scan embedding missing for vector scoring".into())
        })?;
        let embedder = self.embedder.as_ref().ok_or_else(|| {
            ScanError::ServiceUnavailable("vector strategy configured without an embedder".into())
        })?;

        let results: Vec<_> = stream::iter(candidates.into_iter().map(|candidate| {
            let embedder = embedder.clone();
            async move {
                let text = format!("{} {}", candidate.title, candidate.snippet);
                let embedding = embedder.embed(&text).await;
                (candidate, embedding)
            }
        }))
        .buffered(EMBED_CONCURRENCY)
        .collect()
        .await;

        let mut scored = Vec::with_capacity(results.len());
        for (candidate, result) in results {
            match result {
                Ok(embedding) => {
                    let score = SimilarityScorer::vector(scan_embedding, &embedding);
                    scored.push((candidate, score));
                }
                Err(e) => {
                    warn!(
                        title = candidate.title.as_str(),
                        error = %e,
                        "Candidate embedding failed, dropping candidate"
                    );
                    report.candidates_dropped += 1;
                }
            }
        }

        Ok(scored)
    }

    /// Best-effort cleanup: the failed-status write is logged, never
    /// re-raised, so it cannot mask the original error.
    async fn mark_failed(&self, scan_id: Uuid) {
        if let Err(e) = self.store.set_status(scan_id, ScanStatus::Failed).await {
            error!(scan_id = %scan_id, error = %e, "Failed to mark scan as failed");
        }
    }
}
