//! Flat text export of every stored post.
//!
//! The output is comma-joined but not quoted: commas are stripped from the
//! post text instead of escaped, and line breaks are folded into spaces so
//! every stored post occupies exactly one line.
use crate::document::string_or_number;
use anyhow::{Context, Result};
use harvest_store::DocumentStore;
use serde::Deserialize;
use std::path::Path;

pub const CSV_HEADER: &str = "tweet_id,username,text,created_at";
pub const EXPORT_PROJECTION: &str = "tweet_data,username";

#[derive(Debug, Clone, Deserialize)]
pub struct ExportRow {
    pub tweet_data: ExportedPost,
    pub username: String,
}

/// The subset of the stored document the export reads.
#[derive(Debug, Clone, Deserialize)]
pub struct ExportedPost {
    #[serde(deserialize_with = "string_or_number")]
    pub tweet_id: String,
    pub text: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl ExportRow {
    pub fn to_line(&self) -> String {
        let text: String = self
            .tweet_data
            .text
            .chars()
            .filter(|c| *c != ',')
            .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
            .collect();
        format!(
            "{},{},{},{}",
            self.tweet_data.tweet_id,
            self.username,
            text,
            self.tweet_data.created_at.as_deref().unwrap_or_default()
        )
    }
}

/// Header line followed by one line per row, no trailing newline after the
/// last row.
pub fn render_csv(rows: &[ExportRow]) -> String {
    let body = rows
        .iter()
        .map(ExportRow::to_line)
        .collect::<Vec<_>>()
        .join("\n");
    format!("{CSV_HEADER}\n{body}")
}

/// Read the whole collection and write it to `path`, overwriting.
///
/// Best-effort: failures are logged and nothing is returned to the caller.
pub async fn export_csv(store: &dyn DocumentStore, collection: &str, path: &Path) {
    match try_export_csv(store, collection, path).await {
        Ok(rows) => tracing::info!(
            rows,
            path = %path.display(),
            "data exported to {}",
            path.display()
        ),
        Err(err) => tracing::error!(
            path = %path.display(),
            error = %format!("{err:#}"),
            "error exporting to CSV: {err:#}"
        ),
    }
}

/// Fallible core of [`export_csv`]; returns the number of rows written.
///
/// Rows are decoded and rendered before the file is touched, so a malformed
/// row leaves any previous export in place.
pub async fn try_export_csv(
    store: &dyn DocumentStore,
    collection: &str,
    path: &Path,
) -> Result<usize> {
    let raw = store
        .select(collection, EXPORT_PROJECTION)
        .await
        .with_context(|| format!("select from {collection}"))?;

    let rows = raw
        .into_iter()
        .enumerate()
        .map(|(idx, value)| {
            serde_json::from_value::<ExportRow>(value)
                .with_context(|| format!("malformed row {idx} in {collection}"))
        })
        .collect::<Result<Vec<_>>>()?;

    let csv = render_csv(&rows);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("create {}", parent.display()))?;
    }
    tokio::fs::write(path, csv)
        .await
        .with_context(|| format!("write {}", path.display()))?;
    Ok(rows.len())
}
