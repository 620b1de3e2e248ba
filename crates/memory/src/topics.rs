//! Topic extraction from session summaries.

/// Extracts topic labels from free text.
///
/// Runs synchronously inside memory write paths, so implementations
/// should stay cheap.
pub trait TopicExtractor: Send + Sync {
    /// Identifier used in logs.
    fn name(&self) -> &str;

    /// Topic labels found in the text.
    fn extract(&self, text: &str) -> Vec<String>;
}

/// Keyword-list extractor matching case-insensitive substrings.
pub struct KeywordTopicExtractor {
    keywords: Vec<String>,
    max_topics: usize,
}

impl KeywordTopicExtractor {
    pub fn new(keywords: impl IntoIterator<Item = impl Into<String>>, max_topics: usize) -> Self {
        Self {
            keywords: keywords
                .into_iter()
                .map(|k| k.into().to_lowercase())
                .collect(),
            max_topics,
        }
    }
}

impl Default for KeywordTopicExtractor {
    /// Common counseling themes, capped at three topics per text.
    fn default() -> Self {
        Self::new(
            [
                "work",
                "family",
                "anxiety",
                "depression",
                "stress",
                "sleep",
                "relationships",
            ],
            3,
        )
    }
}

impl TopicExtractor for KeywordTopicExtractor {
    fn name(&self) -> &str {
        "keyword"
    }

    fn extract(&self, text: &str) -> Vec<String> {
        let lowered = text.to_lowercase();
        self.keywords
            .iter()
            .filter(|keyword| lowered.contains(keyword.as_str()))
            .take(self.max_topics)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_keywords_case_insensitively() {
        let extractor = KeywordTopicExtractor::default();
        let topics = extractor.extract("Anxiety about WORK has been rising");
        assert_eq!(topics, vec!["work", "anxiety"]);
    }

    #[test]
    fn caps_the_number_of_topics() {
        let extractor = KeywordTopicExtractor::default();
        let topics = extractor.extract("work family anxiety depression stress");
        assert_eq!(topics.len(), 3);
    }

    #[test]
    fn no_matches_yields_empty() {
        let extractor = KeywordTopicExtractor::default();
        assert!(extractor.extract("a quiet afternoon").is_empty());
    }
}
