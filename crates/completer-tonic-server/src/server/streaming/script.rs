//! The canned response streamed to every caller.

use completer_tonic_core::{Error, Result};

/// A fixed response, pre-split into the words emitted as deltas.
///
/// The full text is kept verbatim so the terminal event reproduces the
/// original spacing, independent of how the deltas were chunked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseScript {
    text: String,
    words: Vec<String>,
}

impl ResponseScript {
    /// Splits `text` on whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`] if `text` contains no words.
    pub fn new(text: impl Into<String>) -> Result<Self> {
        let text = text.into();
        let words: Vec<String> = text.split_whitespace().map(str::to_owned).collect();

        if words.is_empty() {
            return Err(Error::InvalidRequest {
                reason: "response text must contain at least one word".to_string(),
            });
        }

        Ok(Self { text, words })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn words(&self) -> &[String] {
        &self.words
    }

    pub fn word_count(&self) -> usize {
        self.words.len()
    }

    /// Number of events a complete stream carries: one per word plus the
    /// terminal message.
    pub fn event_count(&self) -> usize {
        self.words.len() + 1
    }

    /// Text carried by the delta for `word`.
    pub fn delta_text(word: &str) -> String {
        format!("{word} ")
    }
}
