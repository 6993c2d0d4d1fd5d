#![allow(dead_code)]

use anyhow::anyhow;
use async_trait::async_trait;
use futures::StreamExt;
use harvest_social::{
    SocialClient, TimelinePage, TimelineQuery, TimelineStream, Tweet, User,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub fn tweet(id: &str, text: &str) -> Tweet {
    Tweet {
        id: id.to_string(),
        text: text.to_string(),
        created_at: Some("2025-03-20T12:00:00.000Z".to_string()),
        public_metrics: None,
    }
}

pub fn tweets(prefix: &str, n: usize) -> Vec<Tweet> {
    (1..=n)
        .map(|i| tweet(&format!("{prefix}{i}"), &format!("post {i}")))
        .collect()
}

enum Lookup {
    Found(String),
    Fails(String),
}

/// Social client driven by a script: which handles resolve, and the pages
/// each user id serves. Records every call it receives.
#[derive(Default)]
pub struct ScriptedSocial {
    users: HashMap<String, Lookup>,
    timelines: HashMap<String, Vec<Result<Vec<Tweet>, String>>>,
    pub resolved: Arc<Mutex<Vec<String>>>,
    pub queries: Arc<Mutex<Vec<(String, TimelineQuery)>>>,
    pub pages_served: Arc<Mutex<usize>>,
}

impl ScriptedSocial {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user(mut self, handle: &str, id: &str) -> Self {
        self.users
            .insert(handle.to_string(), Lookup::Found(id.to_string()));
        self
    }

    pub fn failing_user(mut self, handle: &str, message: &str) -> Self {
        self.users
            .insert(handle.to_string(), Lookup::Fails(message.to_string()));
        self
    }

    pub fn page(mut self, user_id: &str, tweets: Vec<Tweet>) -> Self {
        self.timelines
            .entry(user_id.to_string())
            .or_default()
            .push(Ok(tweets));
        self
    }

    pub fn failing_page(mut self, user_id: &str, message: &str) -> Self {
        self.timelines
            .entry(user_id.to_string())
            .or_default()
            .push(Err(message.to_string()));
        self
    }

    pub fn resolve_count(&self) -> usize {
        self.resolved.lock().unwrap().len()
    }

    pub fn pages_served(&self) -> usize {
        *self.pages_served.lock().unwrap()
    }
}

#[async_trait]
impl SocialClient for ScriptedSocial {
    async fn resolve_user(&self, handle: &str) -> anyhow::Result<Option<User>> {
        self.resolved.lock().unwrap().push(handle.to_string());
        match self.users.get(handle) {
            Some(Lookup::Found(id)) => Ok(Some(User {
                id: id.clone(),
                username: handle.to_string(),
                name: None,
            })),
            Some(Lookup::Fails(message)) => Err(anyhow!("{message}")),
            None => Ok(None),
        }
    }

    fn timeline(&self, user_id: &str, query: TimelineQuery) -> TimelineStream {
        self.queries
            .lock()
            .unwrap()
            .push((user_id.to_string(), query));
        let pages = self.timelines.get(user_id).cloned().unwrap_or_default();
        let served = self.pages_served.clone();
        Box::pin(futures::stream::iter(pages).map(move |page| {
            *served.lock().unwrap() += 1;
            page.map(|tweets| TimelinePage {
                tweets,
                next_token: None,
            })
            .map_err(|message| anyhow!(message))
        }))
    }
}
