//! The forwarding loop
//!
//! Each iteration loads the cursor, fetches posts newer than it, and
//! forwards them oldest first: translate, compose, publish, then persist
//! the cursor. The first post that cannot be forwarded ends the batch so
//! the next poll picks it up again.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::clock::Sleeper;
use crate::compose::MessageComposer;
use crate::config::{BacklogPolicy, ForwardingConfig, TranslationConfig};
use crate::cursor::CursorStore;
use crate::error::{CursorError, Result, TranslationError};
use crate::platforms::{Publisher, Timeline, TimelineQuery};
use crate::translate::Translator;
use crate::types::{
    ForwardAttempt, ForwardOutcome, HaltReason, LoopPhase, Post, PostId, SourceAccount, TickReport,
};

/// Upper bound on pages followed in one poll when draining a backlog
const MAX_DRAIN_PAGES: usize = 32;

/// Tunables of the forwarding loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardSettings {
    pub source: SourceAccount,
    pub batch_size: usize,
    pub poll_interval: Duration,
    pub post_delay: Duration,
    pub backlog: BacklogPolicy,
    pub attribution_prefix: String,
    pub source_lang: String,
    pub target_lang: String,
    /// Translation attempts per post, including the first
    pub translate_attempts: u32,
}

impl ForwardSettings {
    pub fn new(
        source: SourceAccount,
        forwarding: &ForwardingConfig,
        translation: &TranslationConfig,
    ) -> Self {
        Self {
            source,
            batch_size: forwarding.batch_size,
            poll_interval: forwarding.poll_interval,
            post_delay: forwarding.post_delay,
            backlog: forwarding.backlog,
            attribution_prefix: forwarding.attribution_prefix.clone(),
            source_lang: translation.source_lang.clone(),
            target_lang: translation.target_lang.clone(),
            translate_attempts: translation.max_attempts,
        }
    }
}

/// External collaborators of the loop
pub struct Services {
    pub timeline: Arc<dyn Timeline>,
    pub translator: Arc<dyn Translator>,
    pub publisher: Arc<dyn Publisher>,
    pub cursor: Arc<dyn CursorStore>,
    pub sleeper: Arc<dyn Sleeper>,
}

pub struct Forwarder {
    services: Services,
    settings: ForwardSettings,
    composer: MessageComposer,
}

impl Forwarder {
    pub fn new(services: Services, settings: ForwardSettings) -> Result<Self> {
        let composer = MessageComposer::new(settings.attribution_prefix.clone())?;
        Ok(Self {
            services,
            settings,
            composer,
        })
    }

    /// Run iterations until `shutdown` is raised.
    ///
    /// Only a failure to persist the cursor ends the loop with an error;
    /// fetch, translation and publish failures are retried on the next
    /// poll.
    pub async fn run(&self, shutdown: &AtomicBool) -> Result<()> {
        info!(
            source = %self.settings.source.handle,
            poll_interval = %humantime::format_duration(self.settings.poll_interval),
            "Forwarding loop started"
        );

        loop {
            if shutdown.load(Ordering::Relaxed) {
                info!("Shutdown requested, stopping forwarding loop");
                break;
            }

            let report = match self.tick().await {
                Ok(report) => report,
                Err(e) => {
                    error!(error = %e, "Forwarding loop stopped");
                    return Err(e);
                }
            };

            if shutdown.load(Ordering::Relaxed) {
                info!("Shutdown requested, stopping forwarding loop");
                break;
            }

            let wait = self.next_wait(&report);
            debug!(
                phase = %LoopPhase::Idle,
                wait = %humantime::format_duration(wait),
                "Waiting for next poll"
            );
            self.services.sleeper.sleep(wait).await;
        }

        Ok(())
    }

    /// Time to wait after an iteration. A rate-limit hint can lengthen the
    /// poll interval but never shorten it.
    pub fn next_wait(&self, report: &TickReport) -> Duration {
        match report.retry_after {
            Some(hint) => hint.max(self.settings.poll_interval),
            None => self.settings.poll_interval,
        }
    }

    /// One poll iteration
    pub async fn tick(&self) -> Result<TickReport> {
        let cursor = self.services.cursor.load();
        debug!(phase = %LoopPhase::Fetching, cursor = ?cursor.map(|c| c.get()), "Polling source timeline");

        let mut report = TickReport {
            phase: LoopPhase::Fetching,
            fetched: 0,
            attempts: Vec::new(),
            cursor,
            halt: None,
            retry_after: None,
        };

        let posts = match self.fetch_new_posts(cursor).await {
            Ok(posts) => posts,
            Err(e) => {
                warn!(error = %e, "Failed to fetch source timeline, retrying next poll");
                report.retry_after = e.retry_after();
                report.halt = Some(HaltReason::FetchFailed(e.to_string()));
                return Ok(report);
            }
        };

        report.fetched = posts.len();
        if posts.is_empty() {
            debug!("No new posts");
            return Ok(report);
        }

        info!(count = posts.len(), "Found new post(s) to forward");
        report.phase = LoopPhase::Processing;

        let total = posts.len();
        for (index, post) in posts.into_iter().enumerate() {
            let post_id = post.id;

            let translated = match self.translate_with_retry(&post).await {
                Ok(translated) => translated,
                Err(e) => {
                    warn!(post_id = %post_id, error = %e, "Translation failed, halting batch");
                    report.halt = Some(HaltReason::TranslationFailed {
                        post_id,
                        reason: e.to_string(),
                    });
                    report.attempts.push(ForwardAttempt {
                        post,
                        translated_text: None,
                        outcome: ForwardOutcome::TranslationFailed(e.to_string()),
                    });
                    break;
                }
            };

            let message = self
                .composer
                .compose(&translated, &self.settings.source.post_url(post_id));

            match self.services.publisher.publish(&message).await {
                Ok(published) => {
                    self.advance_cursor(report.cursor, post_id)?;
                    report.cursor = Some(post_id);
                    info!(post_id = %post_id, remote_id = %published.remote_id, "Forwarded post");

                    report.attempts.push(ForwardAttempt {
                        post,
                        translated_text: Some(translated),
                        outcome: ForwardOutcome::Published {
                            remote_id: published.remote_id,
                        },
                    });

                    if index + 1 < total
                        && !self.services.sleeper.sleep(self.settings.post_delay).await
                    {
                        info!(
                            remaining = total - index - 1,
                            "Shutdown requested, leaving remaining posts for the next run"
                        );
                        report.halt = Some(HaltReason::ShutdownRequested);
                        break;
                    }
                }
                Err(e) => {
                    warn!(post_id = %post_id, error = %e, "Publishing failed, halting batch");
                    report.retry_after = e.retry_after();
                    report.halt = Some(HaltReason::PublishFailed {
                        post_id,
                        reason: e.to_string(),
                    });
                    report.attempts.push(ForwardAttempt {
                        post,
                        translated_text: Some(translated),
                        outcome: ForwardOutcome::PublishFailed(e.to_string()),
                    });
                    break;
                }
            }
        }

        info!(
            forwarded = report.forwarded(),
            fetched = report.fetched,
            cursor = ?report.cursor.map(|c| c.get()),
            "Batch complete"
        );
        Ok(report)
    }

    /// Posts newer than `cursor`, oldest first and without duplicates
    async fn fetch_new_posts(&self, cursor: Option<PostId>) -> Result<Vec<Post>> {
        let mut query = TimelineQuery::new(cursor, self.settings.batch_size);
        let mut posts: Vec<Post> = Vec::new();
        let mut pages = 0;

        loop {
            let page = self.services.timeline.fetch(&query).await?;
            pages += 1;
            let page_was_empty = page.posts.is_empty();
            posts.extend(page.posts);

            // Without a cursor there is no backlog to recover: the first
            // run starts from the most recent page.
            let (Some(_), Some(token)) = (cursor, page.next_token) else {
                break;
            };
            if page_was_empty {
                break;
            }

            match self.settings.backlog {
                BacklogPolicy::Drain if pages >= MAX_DRAIN_PAGES => {
                    warn!(
                        pages,
                        oldest = ?posts.iter().map(|post| post.id.get()).min(),
                        "Backlog exceeds the drain page limit; older posts will not be forwarded"
                    );
                    break;
                }
                BacklogPolicy::Drain => query = query.next_page(token),
                BacklogPolicy::Cap => {
                    warn!(
                        batch_size = self.settings.batch_size,
                        "More new posts than fit in one batch; older ones will not be forwarded"
                    );
                    break;
                }
            }
        }

        posts.retain(|post| cursor.map_or(true, |c| post.id > c));
        posts.sort_by_key(|post| post.id);
        posts.dedup_by_key(|post| post.id);
        Ok(posts)
    }

    /// Translate with exponential backoff (1s, 2s, 4s, ...) for transient
    /// failures
    async fn translate_with_retry(&self, post: &Post) -> std::result::Result<String, TranslationError> {
        let max_attempts = self.settings.translate_attempts.max(1);
        let mut attempt = 1;

        loop {
            match self
                .services
                .translator
                .translate(
                    &post.text,
                    &self.settings.source_lang,
                    &self.settings.target_lang,
                )
                .await
            {
                Ok(translated) => {
                    if attempt > 1 {
                        info!(post_id = %post.id, attempt, "Translation succeeded after retry");
                    }
                    return Ok(translated);
                }
                Err(e) if e.is_transient() && attempt < max_attempts => {
                    let delay = Duration::from_secs(1u64 << (attempt - 1).min(16));
                    warn!(
                        post_id = %post.id,
                        attempt,
                        max_attempts,
                        error = %e,
                        "Transient translation error, retrying in {}",
                        humantime::format_duration(delay)
                    );
                    if !self.services.sleeper.sleep(delay).await {
                        return Err(e);
                    }
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn advance_cursor(&self, current: Option<PostId>, next: PostId) -> Result<()> {
        if let Some(current) = current {
            if next <= current {
                return Err(CursorError::Regression {
                    current: current.to_string(),
                    proposed: next.to_string(),
                }
                .into());
            }
        }
        self.services.cursor.save(next)?;
        Ok(())
    }
}
