//! Document storage used by the extraction pipeline.
//!
//! Rows are plain JSON documents so the pipeline owns the shape; the store only
//! knows collections, inserts and projections.
use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

pub mod memory;
pub mod supabase;

pub use memory::MemoryStore;
pub use supabase::SupabaseStore;

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert `rows` into `collection` in a single request.
    async fn insert(&self, collection: &str, rows: &[Value]) -> Result<()>;

    /// Every row of `collection`, restricted to the comma-separated `projection`.
    async fn select(&self, collection: &str, projection: &str) -> Result<Vec<Value>>;
}

/// Collection and column names end up in URL paths and query strings.
pub(crate) fn check_identifier(kind: &str, name: &str) -> Result<()> {
    if name.is_empty()
        || !name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_')
    {
        anyhow::bail!("invalid {kind} name {name:?}");
    }
    Ok(())
}
