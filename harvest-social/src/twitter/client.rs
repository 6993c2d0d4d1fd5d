//! Thin wrapper around the Twitter/X v2 user endpoints.
//!
//! Handles bearer auth, request parameter shaping and `next_token` pagination
//! before delegating to the shared HTTP client.
use crate::traits::{SocialClient, TimelineQuery, TimelineStream};
use crate::twitter::types::{TimelinePage, TimelineResponse, User, UserLookupResponse};
use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use harvest_http::{Auth, HttpClient, RequestOpts};
use std::borrow::Cow;
use time::format_description::well_known::Rfc3339;

pub const DEFAULT_BASE_URL: &str = "https://api.twitter.com";

/// The user timeline endpoint rejects `max_results` outside 5..=100.
const MIN_PAGE_SIZE: u32 = 5;
const MAX_PAGE_SIZE: u32 = 100;
const MAX_HANDLE_LEN: usize = 15;

#[derive(Clone)]
pub struct TwitterApi {
    http: HttpClient,
    bearer: String,
}

impl TwitterApi {
    pub fn new(bearer_token: String) -> Result<Self> {
        let http = HttpClient::new(DEFAULT_BASE_URL).context("twitter base url")?;
        Ok(Self::from_http(http, bearer_token))
    }

    /// Use a preconfigured client (custom base URL, timeout or retry budget).
    pub fn from_http(http: HttpClient, bearer_token: String) -> Self {
        Self {
            http,
            bearer: bearer_token,
        }
    }

    pub async fn user_by_username(&self, handle: &str) -> Result<Option<User>> {
        let handle = normalize_handle(handle)?;
        let resp: UserLookupResponse = self
            .http
            .get_json(
                &format!("2/users/by/username/{handle}"),
                RequestOpts {
                    auth: Some(Auth::Bearer(&self.bearer)),
                    ..Default::default()
                },
            )
            .await
            .with_context(|| format!("user lookup for {handle}"))?;

        if resp.data.is_none() {
            let reason = resp
                .errors
                .as_ref()
                .and_then(|errs| errs.first())
                .map(|e| e.summary().to_string());
            tracing::debug!(handle, ?reason, "twitter.user_lookup.not_found");
        }
        Ok(resp.data)
    }

    /// Fetch a single page of `user_id`'s timeline.
    pub async fn user_timeline_page(
        &self,
        user_id: &str,
        query: &TimelineQuery,
        pagination_token: Option<&str>,
    ) -> Result<TimelineResponse> {
        if user_id.is_empty() || !user_id.bytes().all(|b| b.is_ascii_digit()) {
            bail!("invalid user id {user_id:?}");
        }
        let page_size = query
            .max_results_per_page
            .clamp(MIN_PAGE_SIZE, MAX_PAGE_SIZE);

        let mut params: Vec<(&str, Cow<'_, str>)> = vec![
            ("max_results", page_size.to_string().into()),
            ("tweet.fields", query.tweet_fields.as_str().into()),
            ("start_time", query.start_time.format(&Rfc3339)?.into()),
            ("end_time", query.end_time.format(&Rfc3339)?.into()),
        ];
        if let Some(token) = pagination_token {
            params.push(("pagination_token", token.into()));
        }

        let resp: TimelineResponse = self
            .http
            .get_json(
                &format!("2/users/{user_id}/tweets"),
                RequestOpts {
                    auth: Some(Auth::Bearer(&self.bearer)),
                    query: Some(params),
                    ..Default::default()
                },
            )
            .await
            .with_context(|| format!("timeline page for user {user_id}"))?;

        if let Some(errs) = resp.errors.as_ref().filter(|e| !e.is_empty()) {
            tracing::warn!(
                user_id,
                partial_errors = errs.len(),
                first = errs[0].summary(),
                "twitter.timeline.partial_errors"
            );
        }
        Ok(resp)
    }
}

#[async_trait]
impl SocialClient for TwitterApi {
    async fn resolve_user(&self, handle: &str) -> Result<Option<User>> {
        self.user_by_username(handle).await
    }

    fn timeline(&self, user_id: &str, query: TimelineQuery) -> TimelineStream {
        let api = self.clone();
        let user_id = user_id.to_string();
        Box::pin(async_stream::try_stream! {
            let mut pagination_token: Option<String> = None;
            let mut page_idx = 0u32;
            loop {
                let resp = api
                    .user_timeline_page(&user_id, &query, pagination_token.as_deref())
                    .await?;
                page_idx += 1;

                let next_token = resp.meta.as_ref().and_then(|m| m.next_token.clone());
                let tweets = resp.data.unwrap_or_default();
                tracing::debug!(
                    user_id = %user_id,
                    page = page_idx,
                    tweets = tweets.len(),
                    has_next = next_token.is_some(),
                    "twitter.timeline.page"
                );

                yield TimelinePage {
                    tweets,
                    next_token: next_token.clone(),
                };

                match next_token {
                    Some(token) => pagination_token = Some(token),
                    None => break,
                }
            }
        })
    }
}

/// Accepts `name` or `@name`; platform handles are 1-15 of `[A-Za-z0-9_]`.
fn normalize_handle(raw: &str) -> Result<&str> {
    let handle = raw.trim().trim_start_matches('@');
    if handle.is_empty()
        || handle.len() > MAX_HANDLE_LEN
        || !handle.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
    {
        bail!("invalid account handle {raw:?}");
    }
    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_are_normalized() {
        assert_eq!(normalize_handle("rafalejov").unwrap(), "rafalejov");
        assert_eq!(normalize_handle(" @user_A1 ").unwrap(), "user_A1");
    }

    #[test]
    fn bad_handles_are_rejected() {
        assert!(normalize_handle("").is_err());
        assert!(normalize_handle("@").is_err());
        assert!(normalize_handle("has space").is_err());
        assert!(normalize_handle("../2/tweets").is_err());
        assert!(normalize_handle("abcdefghijklmnop").is_err());
    }
}
