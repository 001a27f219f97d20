//! The scan-processing and similarity-ranking pipeline.
//!
//! One invocation turns a single scan (free-text idea description) into a
//! ranked, scored set of persisted matches: fingerprint the text, fan out
//! to the configured external sources, normalize and score whatever came
//! back, then write the batch and flip the scan's status.

pub mod aggregate;
pub mod embedder;
pub mod fingerprint;
pub mod normalize;
pub mod run;
pub mod score;
pub mod sources;
pub mod store;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use run::{RunReport, ScanPipeline};
