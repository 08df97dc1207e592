//! Mock translator for testing
//!
//! Translates through a fixed dictionary (falling back to tagging the text
//! with the target language) and can be told to fail for particular inputs
//! or calls.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::error::TranslationError;
use crate::translate::Translator;

#[derive(Clone, Default)]
pub struct MockTranslator {
    dictionary: HashMap<String, String>,
    /// Inputs that always fail
    failing_texts: HashMap<String, TranslationError>,
    /// Failures keyed by 1-based call number
    failing_calls: Arc<Mutex<HashMap<usize, TranslationError>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(mut self, source: &str, translated: &str) -> Self {
        self.dictionary
            .insert(source.to_string(), translated.to_string());
        self
    }

    /// Fail every translation of `text`
    pub fn failing_for(mut self, text: &str, error: TranslationError) -> Self {
        self.failing_texts.insert(text.to_string(), error);
        self
    }

    /// Fail only the `call`-th translation (1-based)
    pub fn fail_on_call(self, call: usize, error: TranslationError) -> Self {
        self.failing_calls.lock().unwrap().insert(call, error);
        self
    }

    /// Texts passed to `translate`, in order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Translator for MockTranslator {
    async fn translate(
        &self,
        text: &str,
        _source_lang: &str,
        target_lang: &str,
    ) -> Result<String, TranslationError> {
        let call = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(text.to_string());
            calls.len()
        };

        if let Some(error) = self.failing_calls.lock().unwrap().remove(&call) {
            return Err(error);
        }
        if let Some(error) = self.failing_texts.get(text) {
            return Err(error.clone());
        }

        Ok(self
            .dictionary
            .get(text)
            .cloned()
            .unwrap_or_else(|| format!("[{}] {}", target_lang, text)))
    }
}
