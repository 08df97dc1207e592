//! Translation services
//!
//! Failures are returned as typed [`TranslationError`]s and never escape
//! as panics; the poll loop decides what a failure means for the batch.

use async_trait::async_trait;

use crate::error::TranslationError;

pub mod google;

// Mock translator is available for all builds (not just tests) to support integration tests
pub mod mock;

#[async_trait]
pub trait Translator: Send + Sync {
    /// Translate `text` from `source_lang` to `target_lang` (ISO 639-1 codes)
    async fn translate(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
    ) -> Result<String, TranslationError>;
}
