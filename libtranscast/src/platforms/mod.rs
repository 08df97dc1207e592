//! Social platform abstraction
//!
//! Reading the source account and writing to the target account are split
//! into two traits: in production both are served by the X/Twitter client
//! (with different credentials), while tests substitute the fakes in
//! [`mock`].

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{Post, PostId, PublishedPost};

pub mod oauth;
pub mod twitter;

// Mock platform is available for all builds (not just tests) to support integration tests
pub mod mock;

/// Parameters of a single timeline request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelineQuery {
    /// Only posts strictly newer than this id
    pub since: Option<PostId>,
    pub max_results: usize,
    /// Continuation token from a previous page
    pub pagination_token: Option<String>,
}

impl TimelineQuery {
    pub fn new(since: Option<PostId>, max_results: usize) -> Self {
        Self {
            since,
            max_results,
            pagination_token: None,
        }
    }

    pub fn next_page(&self, token: String) -> Self {
        Self {
            pagination_token: Some(token),
            ..self.clone()
        }
    }
}

/// One page of a timeline. Order of `posts` is not guaranteed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimelinePage {
    pub posts: Vec<Post>,
    pub next_token: Option<String>,
}

/// Read access to the source account's original posts (no replies, no
/// reposts)
#[async_trait]
pub trait Timeline: Send + Sync {
    /// Fetch one page of posts
    ///
    /// # Errors
    ///
    /// Returns a `PlatformError` when the request fails or the response
    /// cannot be understood.
    async fn fetch(&self, query: &TimelineQuery) -> Result<TimelinePage>;
}

/// Write access to the target account
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Create one post with the given text
    ///
    /// # Errors
    ///
    /// Any error means the post must be considered not created.
    async fn publish(&self, text: &str) -> Result<PublishedPost>;
}
