pub mod config;
pub mod error;
pub mod types;

pub use config::{Config, ScoreStrategy};
pub use error::ScanError;
pub use types::{
    truncate_chars, Candidate, MatchRecord, Scan, ScanStatus, SourceKind, SNIPPET_MAX_CHARS,
};
