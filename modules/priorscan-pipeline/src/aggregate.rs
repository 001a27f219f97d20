use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tracing::{info, warn};

use crate::fingerprint::Fingerprint;
use crate::sources::{MatchSource, RawHit};

/// What one fan-out produced: the union of whatever sources succeeded,
/// which may legitimately be empty.
#[derive(Debug, Default)]
pub struct AggregateOutcome {
    pub hits: Vec<RawHit>,
    pub sources_queried: u32,
    pub sources_failed: u32,
}

/// Fans out one query per configured source, concurrently, with per-source
/// timeout and failure isolation. A failed or slow source degrades to zero
/// contributions without aborting the others; no source is retried within
/// one run.
pub struct Aggregator {
    sources: Vec<Arc<dyn MatchSource>>,
    per_source_cap: usize,
    timeout: Duration,
}

impl Aggregator {
    pub fn new(sources: Vec<Arc<dyn MatchSource>>, per_source_cap: usize, timeout: Duration) -> Self {
        Self {
            sources,
            per_source_cap,
            timeout,
        }
    }

    /// Join over all dispatched source calls: every source either returns,
    /// errors, or times out before the pipeline proceeds. Each dispatched
    /// future owns its source handle and fingerprint so the join is free of
    /// borrows into the aggregator.
    pub async fn gather(&self, fingerprint: &Fingerprint) -> AggregateOutcome {
        let mut outcome = AggregateOutcome::default();
        let fingerprint = Arc::new(fingerprint.clone());

        let calls: Vec<_> = self
            .sources
            .iter()
            .cloned()
            .map(|source| {
                let fingerprint = Arc::clone(&fingerprint);
                let cap = self.per_source_cap;
                let timeout = self.timeout;
                async move {
                    let name = source.name().to_string();
                    let result =
                        tokio::time::timeout(timeout, source.search(&fingerprint, cap)).await;
                    (name, result)
                }
            })
            .collect();

        let results: Vec<_> = stream::iter(calls)
            .buffer_unordered(self.sources.len().max(1))
            .collect()
            .await;

        for (name, result) in results {
            outcome.sources_queried += 1;
            match result {
                Ok(Ok(mut hits)) => {
                    hits.truncate(self.per_source_cap);
                    info!(source = name.as_str(), hits = hits.len(), "Source contributed");
                    outcome.hits.extend(hits);
                }
                Ok(Err(e)) => {
                    warn!(source = name.as_str(), error = %e, "Source degraded, contributing nothing");
                    outcome.sources_failed += 1;
                }
                Err(_) => {
                    warn!(
                        source = name.as_str(),
                        timeout_secs = self.timeout.as_secs(),
                        "Source timed out, contributing nothing"
                    );
                    outcome.sources_failed += 1;
                }
            }
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockSource;
    use priorscan_common::SourceKind;

    fn fingerprint() -> Fingerprint {
        Fingerprint {
            keywords: vec!["soil moisture".to_string(), "irrigation".to_string()],
            embedding: None,
        }
    }

    #[tokio::test]
    async fn failed_source_degrades_without_aborting_others() {
        let good = Arc::new(MockSource::with_hits(
            "good",
            SourceKind::Startup,
            vec![("DripSense", "https://dripsense.example.com")],
        ));
        let bad = Arc::new(MockSource::failing("bad", SourceKind::Research));

        let aggregator = Aggregator::new(vec![good, bad], 5, Duration::from_secs(5));
        let outcome = aggregator.gather(&fingerprint()).await;

        assert_eq!(outcome.sources_queried, 2);
        assert_eq!(outcome.sources_failed, 1);
        assert_eq!(outcome.hits.len(), 1);
    }

    #[tokio::test]
    async fn all_sources_failing_yields_empty_union() {
        let aggregator = Aggregator::new(
            vec![
                Arc::new(MockSource::failing("a", SourceKind::Patent)) as Arc<dyn MatchSource>,
                Arc::new(MockSource::failing("b", SourceKind::Startup)),
            ],
            5,
            Duration::from_secs(5),
        );
        let outcome = aggregator.gather(&fingerprint()).await;

        assert_eq!(outcome.sources_failed, 2);
        assert!(outcome.hits.is_empty());
    }

    #[tokio::test]
    async fn per_source_cap_is_enforced() {
        let hits: Vec<(&str, &str)> = vec![
            ("A", "https://a.example.com"),
            ("B", "https://b.example.com"),
            ("C", "https://c.example.com"),
        ];
        let source = Arc::new(MockSource::with_hits("many", SourceKind::Startup, hits));

        let aggregator = Aggregator::new(vec![source], 2, Duration::from_secs(5));
        let outcome = aggregator.gather(&fingerprint()).await;

        assert_eq!(outcome.hits.len(), 2);
    }

    #[tokio::test]
    async fn slow_source_times_out() {
        let slow = Arc::new(MockSource::slow(
            "slow",
            SourceKind::Research,
            Duration::from_millis(200),
        ));

        let aggregator = Aggregator::new(vec![slow], 5, Duration::from_millis(20));
        let outcome = aggregator.gather(&fingerprint()).await;

        assert_eq!(outcome.sources_failed, 1);
        assert!(outcome.hits.is_empty());
    }
}
