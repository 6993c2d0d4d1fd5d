use crate::twitter::types::{TimelinePage, User};
use anyhow::Result;
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;
use time::OffsetDateTime;

/// Fields requested for every timeline post.
pub const TIMELINE_TWEET_FIELDS: &str = "created_at,public_metrics,text";

/// Lazy, forward-only sequence of timeline pages. Each poll that yields an
/// item (page or error) corresponds to one request against the platform;
/// dropping the stream stops pagination.
pub type TimelineStream = Pin<Box<dyn Stream<Item = Result<TimelinePage>> + Send + 'static>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelineQuery {
    pub max_results_per_page: u32,
    pub start_time: OffsetDateTime,
    pub end_time: OffsetDateTime,
    pub tweet_fields: String,
}

impl TimelineQuery {
    pub fn new(max_results_per_page: u32, start_time: OffsetDateTime, end_time: OffsetDateTime) -> Self {
        Self {
            max_results_per_page,
            start_time,
            end_time,
            tweet_fields: TIMELINE_TWEET_FIELDS.to_string(),
        }
    }
}

/// Read-only view of a social platform: who is this handle, and what did
/// they post in a window.
#[async_trait]
pub trait SocialClient: Send + Sync {
    /// Resolve a public handle. `Ok(None)` means the platform has no such account.
    async fn resolve_user(&self, handle: &str) -> Result<Option<User>>;

    /// Paginated timeline for `user_id` restricted to the query window.
    fn timeline(&self, user_id: &str, query: TimelineQuery) -> TimelineStream;
}
