//! Mock timeline and publisher for testing
//!
//! Scriptable stand-ins for the X/Twitter client: the timeline serves a
//! fixed list of posts with `since_id` and pagination semantics, the
//! publisher records every text it is asked to post. Both can be told to
//! fail on specific calls.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use crate::error::{PlatformError, Result};
use crate::platforms::{Publisher, Timeline, TimelinePage, TimelineQuery};
use crate::types::{Post, PublishedPost};

/// Mock source timeline
///
/// Posts are served in the order they were given, which lets tests
/// reproduce the unordered responses of the real API.
#[derive(Default)]
pub struct MockTimeline {
    posts: Mutex<Vec<Post>>,
    failures: Mutex<VecDeque<PlatformError>>,
    queries: Mutex<Vec<TimelineQuery>>,
}

impl MockTimeline {
    pub fn new(posts: Vec<Post>) -> Self {
        Self {
            posts: Mutex::new(posts),
            ..Default::default()
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Make the next fetch fail with `error`; queued failures are used in order
    pub fn fail_next(&self, error: PlatformError) {
        self.failures.lock().unwrap().push_back(error);
    }

    /// Add posts that "appeared" since the last poll
    pub fn push_posts(&self, posts: Vec<Post>) {
        self.posts.lock().unwrap().extend(posts);
    }

    /// Every query received, in order
    pub fn queries(&self) -> Vec<TimelineQuery> {
        self.queries.lock().unwrap().clone()
    }

    pub fn fetch_count(&self) -> usize {
        self.queries.lock().unwrap().len()
    }
}

#[async_trait]
impl Timeline for MockTimeline {
    async fn fetch(&self, query: &TimelineQuery) -> Result<TimelinePage> {
        self.queries.lock().unwrap().push(query.clone());

        if let Some(error) = self.failures.lock().unwrap().pop_front() {
            return Err(error.into());
        }

        let matching: Vec<Post> = self
            .posts
            .lock()
            .unwrap()
            .iter()
            .filter(|p| query.since.map_or(true, |since| p.id > since))
            .cloned()
            .collect();

        let offset = match &query.pagination_token {
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| PlatformError::Validation(format!("bad pagination token {}", token)))?,
            None => 0,
        };
        let end = (offset + query.max_results).min(matching.len());
        let posts = matching.get(offset..end).map(|s| s.to_vec()).unwrap_or_default();
        let next_token = (end < matching.len()).then(|| end.to_string());

        Ok(TimelinePage { posts, next_token })
    }
}

/// Mock target account
#[derive(Clone, Default)]
pub struct MockPublisher {
    published: Arc<Mutex<Vec<String>>>,
    call_count: Arc<Mutex<usize>>,
    /// Failures keyed by 1-based call number
    failures: Arc<Mutex<HashMap<usize, PlatformError>>>,
    fail_always: Option<PlatformError>,
}

impl MockPublisher {
    /// Publisher that accepts everything
    pub fn new() -> Self {
        Self::default()
    }

    /// Publisher that rejects every post
    pub fn failing(error: PlatformError) -> Self {
        Self {
            fail_always: Some(error),
            ..Default::default()
        }
    }

    /// Fail the `call`-th publish (1-based)
    pub fn fail_on_call(self, call: usize, error: PlatformError) -> Self {
        self.failures.lock().unwrap().insert(call, error);
        self
    }

    /// Texts that were successfully published
    pub fn published(&self) -> Vec<String> {
        self.published.lock().unwrap().clone()
    }

    /// Number of times publish was called, successful or not
    pub fn call_count(&self) -> usize {
        *self.call_count.lock().unwrap()
    }
}

#[async_trait]
impl Publisher for MockPublisher {
    async fn publish(&self, text: &str) -> Result<PublishedPost> {
        let call = {
            let mut count = self.call_count.lock().unwrap();
            *count += 1;
            *count
        };

        if let Some(error) = &self.fail_always {
            return Err(error.clone().into());
        }
        if let Some(error) = self.failures.lock().unwrap().remove(&call) {
            return Err(error.into());
        }

        self.published.lock().unwrap().push(text.to_string());
        Ok(PublishedPost {
            remote_id: format!("remote-{}", call),
        })
    }
}
