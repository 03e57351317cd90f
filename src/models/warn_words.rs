//! Warn-word classification of engine output.

use std::sync::Arc;

/// Immutable set of substrings that mark an output line as notable.
///
/// Classification only changes the severity a line is logged at; the line
/// delivered to listeners is never altered. Cloning shares the underlying
/// storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarnWords(Arc<[String]>);

impl WarnWords {
    /// Build a set from `words`, ignoring empty entries.
    #[must_use]
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let words: Vec<String> = words
            .into_iter()
            .map(Into::into)
            .filter(|word| !word.is_empty())
            .collect();
        Self(words.into())
    }

    /// First configured word contained in `line`, if any.
    #[must_use]
    pub fn matching(&self, line: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|word| line.contains(word.as_str()))
            .map(String::as_str)
    }

    /// Number of configured words.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no words are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for WarnWords {
    fn default() -> Self {
        Self(Vec::new().into())
    }
}
