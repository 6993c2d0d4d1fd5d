//! Best-effort sink for harvested posts.
use crate::document::TweetEnvelope;
use anyhow::{Context, Result};
use harvest_social::Tweet;
use harvest_store::DocumentStore;

pub struct TweetPersister<'a> {
    store: &'a dyn DocumentStore,
    collection: &'a str,
}

impl<'a> TweetPersister<'a> {
    pub fn new(store: &'a dyn DocumentStore, collection: &'a str) -> Self {
        Self { store, collection }
    }

    /// Store one post. Failures are logged here and never reach the caller.
    pub async fn save(&self, tweet: &Tweet, username: &str) {
        match self.try_save(tweet, username).await {
            Ok(()) => tracing::info!(
                tweet_id = %tweet.id,
                username,
                "tweet {} saved successfully",
                tweet.id
            ),
            Err(err) => tracing::error!(
                tweet_id = %tweet.id,
                username,
                error = %format!("{err:#}"),
                "failed to save {}: {err:#}",
                tweet.id
            ),
        }
    }

    async fn try_save(&self, tweet: &Tweet, username: &str) -> Result<()> {
        let row = serde_json::to_value(TweetEnvelope::new(tweet, username))
            .context("encode tweet document")?;
        self.store
            .insert(self.collection, std::slice::from_ref(&row))
            .await
            .context("error saving tweet")
    }
}
