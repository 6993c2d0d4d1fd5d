//! Run parameters and their validation.
//!
//! Everything here is checked before either external client is touched.
use serde::Deserialize;
use time::macros::{format_description, time};
use time::{Date, OffsetDateTime};

pub const MAX_ACCOUNTS: usize = 10;
pub const MIN_TWEETS: i64 = 1;
pub const MAX_TWEETS: i64 = 100;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ParamError {
    #[error("at least one account is required")]
    NoAccounts,
    #[error("at most 10 accounts are allowed, got {0}")]
    TooManyAccounts(usize),
    #[error("max_tweets must be between 1 and 100, got {0:?}")]
    MaxTweetsOutOfRange(Option<i64>),
    #[error("start_date and end_date are required")]
    MissingDates,
    #[error("{field} {value:?} is not a YYYY-MM-DD date")]
    InvalidDate { field: &'static str, value: String },
    #[error("end_date {end} precedes start_date {start}")]
    InvertedWindow { start: Date, end: Date },
}

/// Parameters as supplied by the caller; every field may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RunParams {
    #[serde(default)]
    pub accounts: Vec<String>,
    #[serde(default)]
    pub max_tweets: Option<i64>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
}

impl RunParams {
    pub fn new<I, S>(accounts: I, max_tweets: i64, start_date: &str, end_date: &str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            accounts: accounts.into_iter().map(Into::into).collect(),
            max_tweets: Some(max_tweets),
            start_date: Some(start_date.to_string()),
            end_date: Some(end_date.to_string()),
        }
    }

    pub fn validate(&self) -> Result<ValidatedRun, ParamError> {
        if self.accounts.is_empty() {
            return Err(ParamError::NoAccounts);
        }
        if self.accounts.len() > MAX_ACCOUNTS {
            return Err(ParamError::TooManyAccounts(self.accounts.len()));
        }
        let max_tweets = match self.max_tweets {
            Some(n) if (MIN_TWEETS..=MAX_TWEETS).contains(&n) => n as u32,
            other => return Err(ParamError::MaxTweetsOutOfRange(other)),
        };
        let (Some(start), Some(end)) = (
            self.start_date.as_deref().filter(|s| !s.trim().is_empty()),
            self.end_date.as_deref().filter(|s| !s.trim().is_empty()),
        ) else {
            return Err(ParamError::MissingDates);
        };
        let start_date = parse_date("start_date", start)?;
        let end_date = parse_date("end_date", end)?;
        if end_date < start_date {
            return Err(ParamError::InvertedWindow {
                start: start_date,
                end: end_date,
            });
        }

        Ok(ValidatedRun {
            accounts: self.accounts.clone(),
            max_tweets,
            start_date,
            end_date,
        })
    }
}

fn parse_date(field: &'static str, value: &str) -> Result<Date, ParamError> {
    Date::parse(value.trim(), format_description!("[year]-[month]-[day]")).map_err(|_| {
        ParamError::InvalidDate {
            field,
            value: value.to_string(),
        }
    })
}

/// Parameters that passed validation; immutable for the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedRun {
    pub accounts: Vec<String>,
    pub max_tweets: u32,
    pub start_date: Date,
    pub end_date: Date,
}

impl ValidatedRun {
    /// Inclusive UTC window: start day 00:00:00 through end day 23:59:59.
    pub fn window(&self) -> (OffsetDateTime, OffsetDateTime) {
        (
            self.start_date.midnight().assume_utc(),
            self.end_date.with_time(time!(23:59:59)).assume_utc(),
        )
    }

    /// Items requested per timeline page.
    pub fn page_size(&self) -> u32 {
        self.max_tweets.min(MAX_TWEETS as u32)
    }
}
