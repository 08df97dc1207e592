//! Composition of the republished message
//!
//! A forwarded post reads `<translation>\n\n(<prefix>: <link to original>)`.
//! X counts length in weighted units rather than characters, so the
//! translation is shortened when translation plus attribution would not
//! fit in one post.

use unicode_segmentation::UnicodeSegmentation;

use crate::error::{ConfigError, Result};

/// Weighted length limit of a single post
pub const MAX_WEIGHTED_LENGTH: usize = 280;

/// Every link is shortened by the platform and counts as this many units
pub const URL_WEIGHT: usize = 23;

const ELLIPSIS: char = '…';

/// Smallest budget left for the translation itself
const MIN_TEXT_WEIGHT: usize = 10;

/// Code point ranges that count as one unit; everything else counts two.
const LIGHT_RANGES: [(u32, u32); 4] = [(0, 4351), (8192, 8205), (8208, 8223), (8242, 8247)];

/// Weight of a single character under X's counting rules
pub fn char_weight(c: char) -> usize {
    let cp = c as u32;
    if LIGHT_RANGES.iter().any(|(lo, hi)| (*lo..=*hi).contains(&cp)) {
        1
    } else {
        2
    }
}

/// Weighted length of plain text (no link detection)
pub fn weighted_length(text: &str) -> usize {
    text.chars().map(char_weight).sum()
}

#[derive(Debug, Clone)]
pub struct MessageComposer {
    prefix: String,
    max_weight: usize,
}

impl MessageComposer {
    pub fn new(prefix: impl Into<String>) -> Result<Self> {
        Self::with_limit(prefix, MAX_WEIGHTED_LENGTH)
    }

    /// Composer for a custom length limit. Fails when the attribution
    /// alone leaves no useful room for the translation.
    pub fn with_limit(prefix: impl Into<String>, max_weight: usize) -> Result<Self> {
        let composer = Self {
            prefix: prefix.into(),
            max_weight,
        };

        if composer.text_budget() < MIN_TEXT_WEIGHT {
            return Err(ConfigError::InvalidValue {
                field: "ATTRIBUTION_PREFIX".to_string(),
                reason: format!(
                    "attribution '{}' leaves only {} of {} units for the translation",
                    composer.prefix,
                    composer.text_budget(),
                    max_weight
                ),
            }
            .into());
        }

        Ok(composer)
    }

    fn attribution(&self, original_url: &str) -> String {
        format!("\n\n({}: {})", self.prefix, original_url)
    }

    fn attribution_weight(&self) -> usize {
        weighted_length("\n\n(") + weighted_length(&self.prefix) + weighted_length(": ")
            + URL_WEIGHT
            + weighted_length(")")
    }

    /// Units available for the translated text
    pub fn text_budget(&self) -> usize {
        self.max_weight.saturating_sub(self.attribution_weight())
    }

    /// Build the message for `translated`, shortening it if needed
    pub fn compose(&self, translated: &str, original_url: &str) -> String {
        let body = fit_to_budget(translated.trim(), self.text_budget());
        format!("{}{}", body, self.attribution(original_url))
    }
}

fn fit_to_budget(text: &str, budget: usize) -> String {
    if weighted_length(text) <= budget {
        return text.to_string();
    }

    // Cut between grapheme clusters so a vowel sign or virama stays with
    // its consonant.
    let limit = budget.saturating_sub(char_weight(ELLIPSIS));
    let mut used = 0;
    let mut cut = String::new();
    for cluster in text.graphemes(true) {
        let weight = weighted_length(cluster);
        if used + weight > limit {
            break;
        }
        used += weight;
        cut.push_str(cluster);
    }

    let mut shortened = cut.trim_end().to_string();
    shortened.push(ELLIPSIS);
    shortened
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compose_matches_attribution_format() {
        let composer = MessageComposer::new("स्रोत").unwrap();
        let message = composer.compose("नमस्ते", "https://twitter.com/newsdesk/status/100");

        assert_eq!(
            message,
            "नमस्ते\n\n(स्रोत: https://twitter.com/newsdesk/status/100)"
        );
    }

    #[test]
    fn test_compose_trims_translation() {
        let composer = MessageComposer::new("Source").unwrap();
        let message = composer.compose("  hola \n", "u");
        assert_eq!(message, "hola\n\n(Source: u)");
    }

    #[test]
    fn test_weights() {
        assert_eq!(weighted_length("hello"), 5);
        // Devanagari code points count double
        assert_eq!(weighted_length("नमस्ते"), 12);
        assert_eq!(char_weight('—'), 1);
        assert_eq!(char_weight(ELLIPSIS), 2);
    }

    #[test]
    fn test_budget_accounts_for_attribution() {
        let composer = MessageComposer::new("Source").unwrap();
        // "\n\n(" + "Source" + ": " + url + ")"
        assert_eq!(composer.text_budget(), 280 - (3 + 6 + 2 + 23 + 1));
    }

    #[test]
    fn test_long_translation_is_truncated_to_fit() {
        let composer = MessageComposer::new("स्रोत").unwrap();
        let long_text = "क".repeat(400);
        let url = "https://twitter.com/newsdesk/status/1849302219";

        let message = composer.compose(&long_text, url);
        let body = message.split("\n\n(").next().unwrap();

        assert!(body.ends_with('…'));
        assert!(weighted_length(body) <= composer.text_budget());
        assert!(message.ends_with(&format!("(स्रोत: {})", url)));

        let total = weighted_length(&message) - weighted_length(url) + URL_WEIGHT;
        assert!(total <= MAX_WEIGHTED_LENGTH);
    }

    #[test]
    fn test_text_at_budget_is_untouched() {
        let composer = MessageComposer::with_limit("S", 60).unwrap();
        let text = "a".repeat(composer.text_budget());
        let message = composer.compose(&text, "u");
        assert!(message.starts_with(&text));
        assert!(!message.contains('…'));
    }

    #[test]
    fn test_truncation_drops_trailing_whitespace() {
        let composer = MessageComposer::with_limit("S", 50).unwrap();
        let budget = composer.text_budget();
        // Place a space right before the cut point
        let text = format!("{} {}", "a".repeat(budget - 3), "b".repeat(10));

        let message = composer.compose(&text, "u");
        let body = message.split("\n\n(").next().unwrap();
        assert!(!body.contains(" …"));
        assert!(body.ends_with('…'));
    }

    #[test]
    fn test_truncation_keeps_vowel_signs_with_consonants() {
        // "कि" is one cluster of two code points
        let text = "कि".repeat(100);

        for limit in 60..64 {
            let composer = MessageComposer::with_limit("S", limit).unwrap();
            let message = composer.compose(&text, "u");
            let body = message.split("\n\n(").next().unwrap();
            let kept = body.trim_end_matches('…');

            assert!(kept.ends_with('ि'), "cut inside a cluster at limit {}", limit);
            assert_eq!(kept.chars().count() % 2, 0);
            assert!(weighted_length(body) <= composer.text_budget());
        }
    }

    #[test]
    fn test_prefix_that_leaves_no_room_is_rejected() {
        let result = MessageComposer::new("x".repeat(260));
        let err = result.unwrap_err();
        assert!(err.to_string().contains("ATTRIBUTION_PREFIX"));
    }
}
