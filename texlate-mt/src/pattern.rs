//! Wildcard patterns.
//!
//! A pattern is literal text with `**` placeholders, e.g. `Load case **` or
//! `** at ** m`. Matching anchors on the literal segments: the first segment must be
//! a prefix of the text, the last a suffix, and each middle segment is located
//! leftmost-first. Every placeholder captures a non-empty span, and the captures fill
//! the placeholders of a target pattern in order.

use crate::error::{MtError, MtResult};

pub const WILDCARD: &str = "**";

/// Number of `**` placeholders in `text`.
pub fn wildcard_count(text: &str) -> usize {
    text.matches(WILDCARD).count()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WildcardPattern {
    /// Literal text around the placeholders; always one more than the placeholder count
    segments: Vec<String>,
}

impl WildcardPattern {
    /// Split `pattern` on its placeholders. Two adjacent placeholders leave the span
    /// between them ambiguous and are rejected.
    pub fn compile(pattern: &str) -> MtResult<Self> {
        let segments: Vec<String> = pattern.split(WILDCARD).map(str::to_string).collect();
        let inner = segments.len().saturating_sub(1);
        if segments
            .iter()
            .enumerate()
            .any(|(i, segment)| i > 0 && i < inner && segment.is_empty())
        {
            return Err(MtError::DictionaryError(format!(
                "Adjacent wildcards in pattern '{}'",
                pattern
            )));
        }
        Ok(WildcardPattern { segments })
    }

    pub fn wildcard_count(&self) -> usize {
        self.segments.len() - 1
    }

    pub fn is_literal(&self) -> bool {
        self.segments.len() == 1
    }

    /// The spans of `text` captured by each placeholder, or `None` if it does not match.
    pub fn captures<'t>(&self, text: &'t str) -> Option<Vec<&'t str>> {
        let (first, rest) = self.segments.split_first()?;
        let Some((last, middle)) = rest.split_last() else {
            return (text == first.as_str()).then(Vec::new);
        };

        if text.len() < first.len() + last.len()
            || !text.starts_with(first.as_str())
            || !text.ends_with(last.as_str())
        {
            return None;
        }

        let limit = text.len() - last.len();
        let mut pos = first.len();
        let mut captures = Vec::with_capacity(self.wildcard_count());
        for segment in middle {
            let window = text.get(pos..limit)?;
            let (offset, _) = window
                .match_indices(segment.as_str())
                .find(|(offset, _)| *offset > 0)?;
            captures.push(&window[..offset]);
            pos += offset + segment.len();
        }

        let tail = text.get(pos..limit)?;
        if tail.is_empty() {
            return None;
        }
        captures.push(tail);
        Some(captures)
    }

    /// Fill the placeholders with `captures`, in order.
    pub fn fill(&self, captures: &[&str]) -> String {
        let mut result = String::new();
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                result.push_str(captures.get(i - 1).copied().unwrap_or(WILDCARD));
            }
            result.push_str(segment);
        }
        result
    }
}

impl std::fmt::Display for WildcardPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.segments.join(WILDCARD))
    }
}
