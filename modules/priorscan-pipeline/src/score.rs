use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use priorscan_common::Candidate;

use crate::fingerprint::Fingerprint;

/// Lexical scores are clamped to this band.
pub const LEXICAL_MIN: f64 = 30.0;
pub const LEXICAL_MAX: f64 = 95.0;

/// Half-width of the symmetric perturbation added for result diversity.
const JITTER_SPAN: f64 = 7.5;

/// Randomness source for the lexical perturbation. Injectable so tests can
/// pin or disable it.
#[derive(Debug, Clone, Copy)]
pub enum Jitter {
    /// Deterministic stream from a fixed seed.
    Seeded(u64),
    /// Fresh OS entropy per scorer.
    Entropy,
    /// No perturbation; lexical scoring becomes a pure function.
    Disabled,
}

/// Scores candidates against a scan's fingerprint.
pub struct SimilarityScorer {
    rng: Option<StdRng>,
}

impl SimilarityScorer {
    pub fn new(jitter: Jitter) -> Self {
        let rng = match jitter {
            Jitter::Seeded(seed) => Some(StdRng::seed_from_u64(seed)),
            Jitter::Entropy => Some(StdRng::from_os_rng()),
            Jitter::Disabled => None,
        };
        Self { rng }
    }

    /// Lexical heuristic: source-trust prior, plus a bonus proportional to
    /// the fraction of fingerprint keywords literally present in the
    /// candidate's title+snippet, plus bounded jitter. Clamped to [30, 95],
    /// rounded to two decimals.
    pub fn lexical(&mut self, fingerprint: &Fingerprint, candidate: &Candidate) -> f64 {
        let base = 40.0 + f64::from(candidate.trust) * 30.0;

        let haystack = format!("{} {}", candidate.title, candidate.snippet).to_lowercase();
        let matched = fingerprint
            .keywords
            .iter()
            .filter(|k| haystack.contains(k.to_lowercase().as_str()))
            .count();
        let fraction = if fingerprint.keywords.is_empty() {
            0.0
        } else {
            matched as f64 / fingerprint.keywords.len() as f64
        };
        let bonus = fraction * 25.0;

        let jitter = match self.rng.as_mut() {
            Some(rng) => rng.random_range(-JITTER_SPAN..=JITTER_SPAN),
            None => 0.0,
        };

        round2((base + bonus + jitter).clamp(LEXICAL_MIN, LEXICAL_MAX))
    }

    /// Vector heuristic: cosine between the scan embedding and the
    /// candidate embedding, mapped from [-1, 1] to [0, 100].
    pub fn vector(scan_embedding: &[f32], candidate_embedding: &[f32]) -> f64 {
        let cos = cosine(scan_embedding, candidate_embedding);
        round2(((cos + 1.0) / 2.0 * 100.0).clamp(0.0, 100.0))
    }
}

/// Stable descending sort by score; ties keep arrival order.
pub fn sort_by_score(scored: &mut [(Candidate, f64)]) {
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn cosine(a: &[f32], b: &[f32]) -> f64 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += f64::from(*x) * f64::from(*y);
        norm_a += f64::from(*x) * f64::from(*x);
        norm_b += f64::from(*y) * f64::from(*y);
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}
