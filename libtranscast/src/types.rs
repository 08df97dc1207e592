//! Core types for Transcast

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of a post on the source platform.
///
/// X/Twitter ids are snowflakes: numerically increasing with creation
/// time, so ordering ids orders posts chronologically. The same type is
/// used as the forwarding cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PostId(u64);

impl PostId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PostId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .map(PostId)
            .map_err(|e| format!("Invalid post id '{}': {}", s, e))
    }
}

impl TryFrom<String> for PostId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PostId> for String {
    fn from(id: PostId) -> Self {
        id.to_string()
    }
}

impl From<u64> for PostId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// A post fetched from the source account. Never mutated after fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    pub text: String,
    pub author: String,
    pub created_at: Option<DateTime<Utc>>,
}

impl Post {
    pub fn new(id: impl Into<PostId>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            author: String::new(),
            created_at: None,
        }
    }
}

/// The account whose posts are forwarded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceAccount {
    /// Numeric user id used for timeline lookups
    pub id: String,
    /// Handle used when building attribution links
    pub handle: String,
}

impl SourceAccount {
    /// Link to a post by this account
    pub fn post_url(&self, id: PostId) -> String {
        format!("https://twitter.com/{}/status/{}", self.handle, id)
    }
}

/// A post created on the target account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedPost {
    pub remote_id: String,
}

/// How a single post fared within one loop iteration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForwardOutcome {
    Published { remote_id: String },
    TranslationFailed(String),
    PublishFailed(String),
}

/// Ephemeral record of one forwarding attempt; not persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardAttempt {
    pub post: Post,
    pub translated_text: Option<String>,
    pub outcome: ForwardOutcome,
}

impl ForwardAttempt {
    pub fn succeeded(&self) -> bool {
        matches!(self.outcome, ForwardOutcome::Published { .. })
    }
}

/// Poll loop states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopPhase {
    Idle,
    Fetching,
    Processing,
}

impl fmt::Display for LoopPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoopPhase::Idle => write!(f, "idle"),
            LoopPhase::Fetching => write!(f, "fetching"),
            LoopPhase::Processing => write!(f, "processing"),
        }
    }
}

/// Why a batch stopped before every post was forwarded
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HaltReason {
    FetchFailed(String),
    TranslationFailed { post_id: PostId, reason: String },
    PublishFailed { post_id: PostId, reason: String },
    /// Shutdown was requested; the remaining posts wait for the next run
    ShutdownRequested,
}

/// Summary of one poll iteration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    /// Furthest phase the iteration reached
    pub phase: LoopPhase,
    /// Number of new posts (newer than the cursor) returned by the fetch
    pub fetched: usize,
    pub attempts: Vec<ForwardAttempt>,
    /// Cursor value after the iteration
    pub cursor: Option<PostId>,
    pub halt: Option<HaltReason>,
    /// Server-provided hint to wait at least this long before polling again
    pub retry_after: Option<std::time::Duration>,
}

impl TickReport {
    pub fn forwarded(&self) -> usize {
        self.attempts.iter().filter(|a| a.succeeded()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_id_orders_numerically() {
        let mut ids: Vec<PostId> = ["5", "30", "4"].iter().map(|s| s.parse().unwrap()).collect();
        ids.sort();
        assert_eq!(ids, vec![PostId::new(4), PostId::new(5), PostId::new(30)]);
    }

    #[test]
    fn test_post_id_parse_trims_whitespace() {
        let id: PostId = " 1849302219\n".parse().unwrap();
        assert_eq!(id.get(), 1849302219);
    }

    #[test]
    fn test_post_id_rejects_non_numeric() {
        let result = "abc".parse::<PostId>();
        assert!(result.unwrap_err().contains("Invalid post id 'abc'"));
    }

    #[test]
    fn test_post_id_serializes_as_string() {
        let json = serde_json::to_string(&PostId::new(1234567890123456789)).unwrap();
        assert_eq!(json, "\"1234567890123456789\"");

        let back: PostId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, PostId::new(1234567890123456789));
    }

    #[test]
    fn test_source_account_post_url() {
        let account = SourceAccount {
            id: "44196397".to_string(),
            handle: "newsdesk".to_string(),
        };
        assert_eq!(
            account.post_url(PostId::new(100)),
            "https://twitter.com/newsdesk/status/100"
        );
    }

    #[test]
    fn test_tick_report_counts_forwarded() {
        let report = TickReport {
            phase: LoopPhase::Processing,
            fetched: 2,
            attempts: vec![
                ForwardAttempt {
                    post: Post::new(1, "a"),
                    translated_text: Some("अ".to_string()),
                    outcome: ForwardOutcome::Published {
                        remote_id: "9".to_string(),
                    },
                },
                ForwardAttempt {
                    post: Post::new(2, "b"),
                    translated_text: None,
                    outcome: ForwardOutcome::TranslationFailed("down".to_string()),
                },
            ],
            cursor: Some(PostId::new(1)),
            halt: None,
            retry_after: None,
        };
        assert_eq!(report.forwarded(), 1);
    }
}
