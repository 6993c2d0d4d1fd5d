//! Shared error type and observability helpers for the harvest workspace.
//!
//! - [`HarvestError`] and [`Result`]: errors that cross crate boundaries
//! - [`observability`]: one-shot `tracing` initialisation for binaries and tests
//!
//! ```rust
//! use harvest_common::HarvestError;
//!
//! let err = HarvestError::Config("SUPABASE_URL is not set".into());
//! assert_eq!(err.to_string(), "Configuration error: SUPABASE_URL is not set");
//! ```

pub mod observability;

/// Errors that reach the entry point.
#[derive(thiserror::Error, Debug)]
pub enum HarvestError {
    /// Configuration was incomplete or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Run parameters were rejected before any network call.
    #[error("Invalid run parameters: {0}")]
    Validation(String),

    /// An external client could not be constructed or failed outright.
    #[error("Client error: {0}")]
    Client(#[from] anyhow::Error),
}

/// Convenient alias for results that use [`HarvestError`].
pub type Result<T> = std::result::Result<T, HarvestError>;
