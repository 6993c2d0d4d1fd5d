//! In-process [`DocumentStore`] for tests.
//!
//! Rows live in a shared map, so clones observe the same data. Inserts can be
//! made to fail for rows matching a JSON pointer, which is how tests simulate
//! a storage-side rejection of one particular document.
use crate::{DocumentStore, check_identifier};
use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Default)]
struct Inner {
    collections: HashMap<String, Vec<Value>>,
    reject: Vec<(String, Value)>,
    fail_select: Option<String>,
    insert_calls: usize,
    select_calls: usize,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| anyhow!("memory store lock poisoned"))
    }

    /// Reject any insert containing a row whose `pointer` resolves to `value`.
    pub fn reject_rows_where(&self, pointer: &str, value: Value) {
        if let Ok(mut inner) = self.lock() {
            inner.reject.push((pointer.to_string(), value));
        }
    }

    /// Make every `select` fail with `message`.
    pub fn fail_selects(&self, message: &str) {
        if let Ok(mut inner) = self.lock() {
            inner.fail_select = Some(message.to_string());
        }
    }

    /// Seed rows directly, bypassing rejection rules and call counters.
    pub fn seed(&self, collection: &str, rows: Vec<Value>) {
        if let Ok(mut inner) = self.lock() {
            inner
                .collections
                .entry(collection.to_string())
                .or_default()
                .extend(rows);
        }
    }

    pub fn rows(&self, collection: &str) -> Vec<Value> {
        self.lock()
            .ok()
            .and_then(|inner| inner.collections.get(collection).cloned())
            .unwrap_or_default()
    }

    pub fn insert_calls(&self) -> usize {
        self.lock().map(|inner| inner.insert_calls).unwrap_or_default()
    }

    pub fn select_calls(&self) -> usize {
        self.lock().map(|inner| inner.select_calls).unwrap_or_default()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn insert(&self, collection: &str, rows: &[Value]) -> Result<()> {
        check_identifier("collection", collection)?;
        let mut inner = self.lock()?;
        inner.insert_calls += 1;
        for row in rows {
            if let Some((pointer, _)) = inner
                .reject
                .iter()
                .find(|(pointer, value)| row.pointer(pointer) == Some(value))
            {
                bail!("row rejected by store rule on {pointer}");
            }
        }
        inner
            .collections
            .entry(collection.to_string())
            .or_default()
            .extend(rows.iter().cloned());
        Ok(())
    }

    async fn select(&self, collection: &str, projection: &str) -> Result<Vec<Value>> {
        check_identifier("collection", collection)?;
        let mut inner = self.lock()?;
        inner.select_calls += 1;
        if let Some(message) = &inner.fail_select {
            bail!("{message}");
        }
        let columns: Vec<&str> = projection.split(',').map(str::trim).collect();
        let rows = inner
            .collections
            .get(collection)
            .map(|rows| rows.iter().map(|row| project(row, &columns)).collect())
            .unwrap_or_default();
        Ok(rows)
    }
}

fn project(row: &Value, columns: &[&str]) -> Value {
    match row {
        Value::Object(obj) => {
            let picked: Map<String, Value> = obj
                .iter()
                .filter(|(k, _)| columns.contains(&k.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            Value::Object(picked)
        }
        other => other.clone(),
    }
}
