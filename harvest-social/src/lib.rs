//! Social network clients used by harvest.
//!
//! [`traits::SocialClient`] is the seam the extraction pipeline depends on;
//! [`twitter::TwitterApi`] is the only concrete platform.
pub mod traits;
pub mod twitter;

pub use traits::{SocialClient, TIMELINE_TWEET_FIELDS, TimelineQuery, TimelineStream};
pub use twitter::TwitterApi;
pub use twitter::types::{PublicMetrics, TimelinePage, Tweet, User};
