//! Storage shape of a harvested post.
use harvest_social::Tweet;
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostMetrics {
    pub likes: u64,
    pub retweets: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostDocument {
    #[serde(deserialize_with = "string_or_number")]
    pub tweet_id: String,
    pub text: String,
    pub created_at: Option<String>,
    pub metrics: PostMetrics,
}

/// Row written to the collection. `created_at` duplicates the post timestamp
/// so it can be filtered without reaching into `tweet_data`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TweetEnvelope {
    pub tweet_data: PostDocument,
    pub username: String,
    pub created_at: Option<String>,
}

impl From<&Tweet> for PostDocument {
    fn from(tweet: &Tweet) -> Self {
        let metrics = tweet.public_metrics.clone().unwrap_or_default();
        Self {
            tweet_id: tweet.id.clone(),
            text: tweet.text.clone(),
            created_at: tweet.created_at.clone(),
            metrics: PostMetrics {
                likes: metrics.like_count.unwrap_or_default(),
                retweets: metrics.retweet_count.unwrap_or_default(),
            },
        }
    }
}

impl TweetEnvelope {
    pub fn new(tweet: &Tweet, username: &str) -> Self {
        Self {
            tweet_data: PostDocument::from(tweet),
            username: username.to_string(),
            created_at: tweet.created_at.clone(),
        }
    }
}

/// Platform ids are strings, but rows written by other tools may carry numbers.
pub(crate) fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Int(u64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(s) => s,
        Id::Int(n) => n.to_string(),
    })
}
