//! Token estimation.
//!
//! A character heuristic of roughly four characters per token. Close
//! enough for budget enforcement; a model with a real tokenizer can be
//! wrapped in a [`ModelTokenCounter`] instead.

use std::sync::Arc;

use attune_core::{LanguageModel, TokenCounter};

/// Estimate the token count of a text, rounding up.
pub fn estimate_tokens(text: &str) -> usize {
    if text.is_empty() {
        0
    } else {
        (text.len() + 3) / 4
    }
}

/// A [`TokenCounter`] using the character heuristic.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicTokenCounter;

impl TokenCounter for HeuristicTokenCounter {
    fn count(&self, text: &str) -> usize {
        estimate_tokens(text)
    }
}

/// A [`TokenCounter`] deferring to a model's own tokenizer.
pub struct ModelTokenCounter {
    model: Arc<dyn LanguageModel>,
}

impl ModelTokenCounter {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }
}

impl TokenCounter for ModelTokenCounter {
    fn count(&self, text: &str) -> usize {
        self.model.count_tokens(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_is_zero_tokens() {
        assert_eq!(estimate_tokens(""), 0);
    }

    #[test]
    fn rounds_up_to_whole_tokens() {
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
        assert_eq!(estimate_tokens(&"x".repeat(100)), 25);
    }
}
