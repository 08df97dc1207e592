//! X/Twitter API v2 client
//!
//! Reads go through the app-only bearer token; writes are signed with the
//! posting account's OAuth 1.0a user credentials.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::config::{normalize_handle, Credentials};
use crate::error::{ConfigError, PlatformError, Result, TranscastError};
use crate::platforms::oauth::OAuth1Signer;
use crate::platforms::{Publisher, Timeline, TimelinePage, TimelineQuery};
use crate::types::{Post, PostId, PublishedPost, SourceAccount};

pub const API_BASE: &str = "https://api.twitter.com";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const TWEET_FIELDS: &str = "created_at,author_id,note_tweet";

#[derive(Debug, Deserialize)]
struct ApiTweet {
    id: String,
    text: String,
    author_id: Option<String>,
    created_at: Option<DateTime<Utc>>,
    note_tweet: Option<NoteTweet>,
}

/// Full text of posts longer than the classic limit
#[derive(Debug, Deserialize)]
struct NoteTweet {
    text: String,
}

#[derive(Debug, Default, Deserialize)]
struct TimelineMeta {
    next_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TimelineResponse {
    #[serde(default)]
    data: Vec<ApiTweet>,
    #[serde(default)]
    meta: TimelineMeta,
}

#[derive(Debug, Deserialize)]
struct ApiUser {
    id: String,
    username: String,
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    data: Option<ApiUser>,
    #[serde(default)]
    errors: Vec<ApiProblem>,
}

#[derive(Debug, Deserialize)]
struct CreatedTweet {
    id: String,
}

#[derive(Debug, Deserialize)]
struct CreateTweetResponse {
    data: CreatedTweet,
}

#[derive(Debug, Default, Deserialize)]
struct ApiProblem {
    title: Option<String>,
    detail: Option<String>,
}

impl ApiProblem {
    fn describe(&self) -> Option<String> {
        self.detail.clone().or_else(|| self.title.clone())
    }
}

/// Undo the HTML escaping the API applies to post text
pub fn decode_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

impl ApiTweet {
    fn into_post(self, fallback_author: &str) -> Result<Post> {
        let id = self
            .id
            .parse::<PostId>()
            .map_err(|e| PlatformError::Decode(format!("Twitter returned {}", e)))?;
        let text = self.note_tweet.map(|n| n.text).unwrap_or(self.text);

        Ok(Post {
            id,
            text: decode_entities(&text),
            author: self.author_id.unwrap_or_else(|| fallback_author.to_string()),
            created_at: self.created_at,
        })
    }
}

/// Seconds until the rate-limit window resets, from `x-rate-limit-reset`
fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    let reset = headers
        .get("x-rate-limit-reset")?
        .to_str()
        .ok()?
        .parse::<i64>()
        .ok()?;
    let wait = reset - Utc::now().timestamp();
    Some(Duration::from_secs(wait.max(0) as u64))
}

/// Map a non-success response to a `PlatformError`
fn map_status_error(status: StatusCode, headers: &HeaderMap, body: &str, context: &str) -> PlatformError {
    let detail = serde_json::from_str::<ApiProblem>(body)
        .ok()
        .and_then(|p| p.describe())
        .unwrap_or_else(|| body.chars().take(200).collect());

    match status.as_u16() {
        401 | 403 => PlatformError::Authentication(format!(
            "Twitter rejected credentials during {} ({}): {}",
            context, status, detail
        )),
        400 | 422 => PlatformError::Validation(format!(
            "Twitter rejected the request during {} ({}): {}",
            context, status, detail
        )),
        429 => PlatformError::RateLimit {
            message: format!("Twitter rate limit hit during {}: {}", context, detail),
            retry_after: retry_after(headers),
        },
        500..=599 => PlatformError::Network(format!(
            "Twitter unavailable during {} ({}): {}",
            context, status, detail
        )),
        _ => PlatformError::Posting(format!(
            "Twitter request failed during {} ({}): {}",
            context, status, detail
        )),
    }
}

fn map_transport_error(error: reqwest::Error, context: &str) -> PlatformError {
    PlatformError::Network(format!(
        "Could not reach Twitter during {}: {}",
        context, error
    ))
}

pub struct TwitterClient {
    http: reqwest::Client,
    base_url: String,
    bearer_token: SecretString,
    signer: OAuth1Signer,
}

impl TwitterClient {
    pub fn new(credentials: Credentials) -> Result<Self> {
        Self::with_base_url(credentials, API_BASE)
    }

    /// Client against a different API host (used by tests)
    pub fn with_base_url(credentials: Credentials, base_url: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("transcast/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PlatformError::Network(format!("Failed to build HTTP client: {}", e)))?;

        let signer = OAuth1Signer::new(
            credentials.consumer_key,
            credentials.consumer_secret,
            credentials.access_token,
            credentials.access_token_secret,
        );

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            bearer_token: credentials.bearer_token,
            signer,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn read_body<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
        context: &str,
    ) -> Result<T> {
        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .text()
            .await
            .map_err(|e| map_transport_error(e, context))?;

        if !status.is_success() {
            return Err(map_status_error(status, &headers, &body, context).into());
        }

        serde_json::from_str(&body).map_err(|e| {
            TranscastError::from(PlatformError::Decode(format!(
                "Unexpected Twitter response during {}: {}",
                context, e
            )))
        })
    }

    async fn get_user(&self, path: &str, context: &str) -> Result<ApiUser> {
        let response = self
            .http
            .get(self.url(path))
            .bearer_auth(self.bearer_token.expose_secret())
            .send()
            .await
            .map_err(|e| map_transport_error(e, context))?;

        let body: UserResponse = Self::read_body(response, context).await?;
        match body.data {
            Some(user) => Ok(user),
            None => {
                let detail = body
                    .errors
                    .first()
                    .and_then(|p| p.describe())
                    .unwrap_or_else(|| "no such user".to_string());
                Err(PlatformError::Validation(format!("{}: {}", context, detail)).into())
            }
        }
    }

    /// Resolve `SOURCE_USER` (handle or numeric id) to id and handle
    pub async fn resolve_account(&self, source_user: &str) -> Result<SourceAccount> {
        let source_user = normalize_handle(source_user);
        let user = if source_user.chars().all(|c| c.is_ascii_digit()) {
            self.get_user(&format!("/2/users/{}", source_user), "user lookup")
                .await?
        } else {
            self.get_user(
                &format!("/2/users/by/username/{}", urlencoding::encode(&source_user)),
                "user lookup",
            )
            .await?
        };

        debug!(id = %user.id, handle = %user.username, "Resolved source account");
        Ok(SourceAccount {
            id: user.id,
            handle: user.username,
        })
    }

    /// Username of the account the user credentials belong to
    pub async fn authenticated_username(&self) -> Result<String> {
        let url = self.url("/2/users/me");
        let auth = self.signer.authorization_header("GET", &url, &[])?;

        let response = self
            .http
            .get(&url)
            .header(reqwest::header::AUTHORIZATION, auth)
            .send()
            .await
            .map_err(|e| map_transport_error(e, "identity check"))?;

        let body: UserResponse = Self::read_body(response, "identity check").await?;
        body.data.map(|u| u.username).ok_or_else(|| {
            TranscastError::from(PlatformError::Decode(
                "identity check returned no user".to_string(),
            ))
        })
    }

    /// Fail when the posting credentials belong to another account than
    /// `target_user`
    pub async fn verify_identity(&self, target_user: &str) -> Result<()> {
        let actual = self.authenticated_username().await?;
        let expected = normalize_handle(target_user);

        if !actual.eq_ignore_ascii_case(&expected) {
            return Err(ConfigError::IdentityMismatch { expected, actual }.into());
        }
        Ok(())
    }

    /// One page of a user's original posts
    pub async fn user_timeline(&self, user_id: &str, query: &TimelineQuery) -> Result<TimelinePage> {
        let context = "timeline fetch";
        let mut params: Vec<(&str, String)> = vec![
            ("exclude", "replies,retweets".to_string()),
            ("max_results", query.max_results.to_string()),
            ("tweet.fields", TWEET_FIELDS.to_string()),
        ];
        if let Some(since) = query.since {
            params.push(("since_id", since.to_string()));
        }
        if let Some(token) = &query.pagination_token {
            params.push(("pagination_token", token.clone()));
        }

        let response = self
            .http
            .get(self.url(&format!("/2/users/{}/tweets", user_id)))
            .bearer_auth(self.bearer_token.expose_secret())
            .query(&params)
            .send()
            .await
            .map_err(|e| map_transport_error(e, context))?;

        let body: TimelineResponse = Self::read_body(response, context).await?;
        let posts = body
            .data
            .into_iter()
            .map(|tweet| tweet.into_post(user_id))
            .collect::<Result<Vec<_>>>()?;

        Ok(TimelinePage {
            posts,
            next_token: body.meta.next_token,
        })
    }

    /// Create a post as the authenticated user
    pub async fn create_post(&self, text: &str) -> Result<PublishedPost> {
        let context = "post creation";
        let url = self.url("/2/tweets");
        let auth = self.signer.authorization_header("POST", &url, &[])?;

        let response = self
            .http
            .post(&url)
            .header(reqwest::header::AUTHORIZATION, auth)
            .json(&serde_json::json!({ "text": text }))
            .send()
            .await
            .map_err(|e| map_transport_error(e, context))?;

        let body: CreateTweetResponse = Self::read_body(response, context).await?;
        Ok(PublishedPost {
            remote_id: body.data.id,
        })
    }
}

#[async_trait]
impl Publisher for TwitterClient {
    async fn publish(&self, text: &str) -> Result<PublishedPost> {
        self.create_post(text).await
    }
}

/// Timeline of one resolved account
pub struct SourceTimeline {
    client: Arc<TwitterClient>,
    account: SourceAccount,
}

impl SourceTimeline {
    pub fn new(client: Arc<TwitterClient>, account: SourceAccount) -> Self {
        Self { client, account }
    }

    pub fn account(&self) -> &SourceAccount {
        &self.account
    }
}

#[async_trait]
impl Timeline for SourceTimeline {
    async fn fetch(&self, query: &TimelineQuery) -> Result<TimelinePage> {
        self.client.user_timeline(&self.account.id, query).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_decode_entities() {
        assert_eq!(decode_entities("Q&amp;A &lt;live&gt;"), "Q&A <live>");
        // Only one level of escaping is undone
        assert_eq!(decode_entities("&amp;lt;"), "&lt;");
    }

    #[test]
    fn test_note_tweet_replaces_truncated_text() {
        let tweet: ApiTweet = serde_json::from_str(
            r#"{"id":"100","text":"Short version…","note_tweet":{"text":"The full long version"}}"#,
        )
        .unwrap();

        let post = tweet.into_post("44196397").unwrap();
        assert_eq!(post.id, PostId::new(100));
        assert_eq!(post.text, "The full long version");
        assert_eq!(post.author, "44196397");
    }

    #[test]
    fn test_tweet_with_bad_id_is_decode_error() {
        let tweet: ApiTweet = serde_json::from_str(r#"{"id":"abc","text":"x"}"#).unwrap();
        let err = tweet.into_post("1").unwrap_err();
        assert!(err.to_string().contains("Unexpected response"));
    }

    #[test]
    fn test_timeline_without_data_is_empty() {
        let body: TimelineResponse =
            serde_json::from_str(r#"{"meta":{"result_count":0}}"#).unwrap();
        assert!(body.data.is_empty());
        assert!(body.meta.next_token.is_none());
    }

    #[test]
    fn test_status_mapping() {
        let headers = HeaderMap::new();
        let problem = r#"{"title":"Unauthorized","detail":"Unauthorized","type":"about:blank","status":401}"#;

        assert!(matches!(
            map_status_error(StatusCode::UNAUTHORIZED, &headers, problem, "post creation"),
            PlatformError::Authentication(_)
        ));
        assert!(matches!(
            map_status_error(StatusCode::FORBIDDEN, &headers, "", "post creation"),
            PlatformError::Authentication(_)
        ));
        assert!(matches!(
            map_status_error(StatusCode::BAD_REQUEST, &headers, "", "timeline fetch"),
            PlatformError::Validation(_)
        ));
        assert!(matches!(
            map_status_error(StatusCode::SERVICE_UNAVAILABLE, &headers, "", "timeline fetch"),
            PlatformError::Network(_)
        ));
        assert!(matches!(
            map_status_error(StatusCode::CONFLICT, &headers, "", "post creation"),
            PlatformError::Posting(_)
        ));
    }

    #[test]
    fn test_status_mapping_uses_problem_detail() {
        let body = r#"{"detail":"You are not allowed to create a Tweet with duplicate content.","status":403}"#;
        let err = map_status_error(StatusCode::FORBIDDEN, &HeaderMap::new(), body, "post creation");
        assert!(err.to_string().contains("duplicate content"));
    }

    #[test]
    fn test_rate_limit_reads_reset_header() {
        let mut headers = HeaderMap::new();
        let reset = Utc::now().timestamp() + 120;
        headers.insert(
            "x-rate-limit-reset",
            HeaderValue::from_str(&reset.to_string()).unwrap(),
        );

        let err = map_status_error(StatusCode::TOO_MANY_REQUESTS, &headers, "", "timeline fetch");
        let wait = err.retry_after().unwrap();
        assert!(wait <= Duration::from_secs(120));
        assert!(wait >= Duration::from_secs(110));
    }

    #[test]
    fn test_rate_limit_reset_in_past_is_zero() {
        let mut headers = HeaderMap::new();
        headers.insert("x-rate-limit-reset", HeaderValue::from_static("1000"));

        assert_eq!(retry_after(&headers), Some(Duration::ZERO));
    }
}
