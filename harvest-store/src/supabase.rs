//! Supabase (PostgREST) backed [`DocumentStore`].
//!
//! Inserts go to `POST /rest/v1/<collection>`, reads to
//! `GET /rest/v1/<collection>?select=<projection>`. The anon key is sent both
//! as `apikey` and as the bearer token, which is what the Supabase gateway
//! expects for anonymous access.
//!
//! PostgREST caps a single response at its `max-rows` setting (1000 on hosted
//! projects), so selects walk the table with `limit`/`offset` until a short
//! page comes back.
use crate::{DocumentStore, check_identifier};
use anyhow::{Context, Result};
use async_trait::async_trait;
use harvest_http::{Auth, HttpClient, RequestOpts};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;

const REST_PATH: &str = "rest/v1/";
const DEFAULT_PAGE_SIZE: usize = 1000;

#[derive(Clone)]
pub struct SupabaseStore {
    http: HttpClient,
    key: String,
    page_size: usize,
}

impl SupabaseStore {
    /// `url` is the project URL, e.g. `https://abcd.supabase.co`.
    pub fn new(url: &str, key: String) -> Result<Self> {
        let http = HttpClient::new(&rest_base(url)).context("supabase url")?;
        Ok(Self::from_http(http, key))
    }

    /// `http` must already point at the REST root (`.../rest/v1/`).
    pub fn from_http(http: HttpClient, key: String) -> Self {
        Self {
            http,
            key,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Rows requested per select page. Must not exceed the server's `max-rows`.
    pub fn with_page_size(mut self, rows: usize) -> Self {
        self.page_size = rows.max(1);
        self
    }

    fn headers(&self, prefer: Option<&'static str>) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        let mut key = HeaderValue::from_str(self.key.trim()).context("invalid supabase key")?;
        key.set_sensitive(true);
        headers.insert(HeaderName::from_static("apikey"), key);
        if let Some(prefer) = prefer {
            headers.insert(
                HeaderName::from_static("prefer"),
                HeaderValue::from_static(prefer),
            );
        }
        Ok(headers)
    }
}

/// Append the REST root to a project URL unless it is already there.
pub fn rest_base(url: &str) -> String {
    let trimmed = url.trim().trim_end_matches('/');
    if trimmed.ends_with("/rest/v1") {
        format!("{trimmed}/")
    } else {
        format!("{trimmed}/{REST_PATH}")
    }
}

#[async_trait]
impl DocumentStore for SupabaseStore {
    async fn insert(&self, collection: &str, rows: &[Value]) -> Result<()> {
        check_identifier("collection", collection)?;
        let inserted: Vec<Value> = self
            .http
            .post_json(
                collection,
                rows,
                RequestOpts {
                    auth: Some(Auth::Bearer(&self.key)),
                    headers: Some(self.headers(Some("return=representation"))?),
                    ..Default::default()
                },
            )
            .await?;
        tracing::debug!(
            collection,
            requested = rows.len(),
            inserted = inserted.len(),
            "store.supabase.insert"
        );
        Ok(())
    }

    async fn select(&self, collection: &str, projection: &str) -> Result<Vec<Value>> {
        check_identifier("collection", collection)?;
        for column in projection.split(',') {
            check_identifier("column", column.trim())?;
        }
        let mut rows: Vec<Value> = Vec::new();
        let mut pages = 0usize;
        loop {
            let page: Vec<Value> = self
                .http
                .get_json(
                    collection,
                    RequestOpts {
                        auth: Some(Auth::Bearer(&self.key)),
                        headers: Some(self.headers(None)?),
                        query: Some(vec![
                            ("select", projection.into()),
                            ("limit", self.page_size.to_string().into()),
                            ("offset", rows.len().to_string().into()),
                        ]),
                        ..Default::default()
                    },
                )
                .await?;
            pages += 1;
            let short = page.len() < self.page_size;
            rows.extend(page);
            if short {
                break;
            }
        }
        tracing::debug!(collection, rows = rows.len(), pages, "store.supabase.select");
        Ok(rows)
    }
}
