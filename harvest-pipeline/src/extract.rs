//! Sequential extraction: one account at a time, posts in delivery order.
//!
//! The API call counter counts every request the run makes: one per handle
//! lookup plus one per timeline page actually pulled from the stream. Pages the
//! run never polls are never requested, so they are not counted.
use crate::params::{ParamError, RunParams, ValidatedRun};
use crate::persist::TweetPersister;
use anyhow::Result;
use futures::StreamExt;
use harvest_social::{SocialClient, TimelineQuery};
use harvest_store::DocumentStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountStatus {
    /// Posts handed to the persister (attempted saves, not confirmed rows).
    Fetched(u32),
    NotFound,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountReport {
    pub handle: String,
    pub status: AccountStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionSummary {
    pub accounts: Vec<AccountReport>,
    pub api_calls: u32,
}

impl ExtractionSummary {
    pub fn total_fetched(&self) -> u32 {
        self.accounts
            .iter()
            .map(|a| match a.status {
                AccountStatus::Fetched(n) => n,
                _ => 0,
            })
            .sum()
    }

    pub fn skipped(&self) -> impl Iterator<Item = &str> {
        self.handles_where(|s| matches!(s, AccountStatus::NotFound))
    }

    pub fn failed(&self) -> impl Iterator<Item = &str> {
        self.handles_where(|s| matches!(s, AccountStatus::Failed(_)))
    }

    fn handles_where(&self, pred: fn(&AccountStatus) -> bool) -> impl Iterator<Item = &str> {
        self.accounts
            .iter()
            .filter(move |a| pred(&a.status))
            .map(|a| a.handle.as_str())
    }
}

/// Validate `params`, then harvest every account into `collection`.
///
/// Only validation errors are returned; per-account failures are logged and
/// recorded in the summary.
pub async fn extract_tweets(
    social: &dyn SocialClient,
    store: &dyn DocumentStore,
    collection: &str,
    params: &RunParams,
) -> Result<ExtractionSummary, ParamError> {
    let run = params.validate()?;
    let persister = TweetPersister::new(store, collection);

    tracing::info!(
        max_tweets = run.max_tweets,
        start_date = %run.start_date,
        end_date = %run.end_date,
        accounts = run.accounts.len(),
        "extracting up to {} tweets per account from {} to {}",
        run.max_tweets,
        run.start_date,
        run.end_date
    );

    let mut summary = ExtractionSummary::default();
    for handle in &run.accounts {
        tracing::info!(account = %handle, "processing account {handle}");
        let status =
            match extract_account(social, &persister, &run, handle, &mut summary.api_calls).await {
                Ok(Some(fetched)) => {
                    tracing::info!(account = %handle, fetched, "fetched {fetched} tweets for {handle}");
                    AccountStatus::Fetched(fetched)
                }
                Ok(None) => {
                    tracing::warn!(account = %handle, "user {handle} not found");
                    AccountStatus::NotFound
                }
                Err(err) => {
                    tracing::error!(
                        account = %handle,
                        error = %format!("{err:#}"),
                        "error processing {handle}: {err:#}"
                    );
                    AccountStatus::Failed(format!("{err:#}"))
                }
            };
        summary.accounts.push(AccountReport {
            handle: handle.clone(),
            status,
        });
    }

    tracing::info!(
        api_calls = summary.api_calls,
        fetched = summary.total_fetched(),
        "extraction finished, total API requests: {}",
        summary.api_calls
    );
    Ok(summary)
}

/// `Ok(None)` when the handle does not resolve to an account.
async fn extract_account(
    social: &dyn SocialClient,
    persister: &TweetPersister<'_>,
    run: &ValidatedRun,
    handle: &str,
    api_calls: &mut u32,
) -> Result<Option<u32>> {
    *api_calls += 1;
    let Some(user) = social.resolve_user(handle).await? else {
        return Ok(None);
    };

    let (start_time, end_time) = run.window();
    let query = TimelineQuery::new(run.page_size(), start_time, end_time);
    let mut pages = social.timeline(&user.id, query);

    let mut fetched = 0u32;
    while fetched < run.max_tweets {
        let Some(page) = pages.next().await else {
            break;
        };
        *api_calls += 1;
        let page = page?;

        let remaining = (run.max_tweets - fetched) as usize;
        for tweet in page.tweets.iter().take(remaining) {
            persister.save(tweet, handle).await;
            fetched += 1;
        }
    }
    Ok(Some(fetched))
}
