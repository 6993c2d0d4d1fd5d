//! Twitter/X API v2 integration: the HTTP wrapper and the typed response models.
pub mod client;
pub mod types;

pub use client::TwitterApi;
