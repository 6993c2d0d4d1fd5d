//! Extraction pipeline: validate run parameters, walk each account's timeline
//! into the document store, and export the stored posts as flat text.
//!
//! The pipeline only sees the [`harvest_social::SocialClient`] and
//! [`harvest_store::DocumentStore`] traits; concrete clients are built by the
//! binary and passed in.
pub mod document;
pub mod export;
pub mod extract;
pub mod params;
pub mod persist;

pub use document::{PostDocument, PostMetrics, TweetEnvelope};
pub use export::{CSV_HEADER, export_csv, try_export_csv};
pub use extract::{AccountReport, AccountStatus, ExtractionSummary, extract_tweets};
pub use params::{ParamError, RunParams, ValidatedRun};
pub use persist::TweetPersister;
