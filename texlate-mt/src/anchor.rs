//! Anchor tokens for protecting markup during machine translation
//!
//! A fragment such as `Load $F = 2.5$ applied at \ref{fig:beam}` still carries math
//! and control sequences. Sent as is, a translation service may translate `fig`,
//! reorder the braces or "correct" the math. Before the backend call every such span
//! is replaced with a numeric anchor token (`777001`, `777002`, ...), which services
//! pass through untouched, and the spans are put back afterwards.
//!
//! Format: `777000 + index`, index counted from 1 in order of appearance.
//!
//! ```ignore
//! let protector = MarkupProtector::new()?;
//! let protected = protector.protect(r"Load $F$ on \unit{kN}");
//! assert_eq!(protected.text, "Load 777001 on 777002");
//! let restored = protector.restore("Last 777001 op 777002", &protected)?;
//! assert_eq!(restored, r"Last $F$ op \unit{kN}");
//! ```

use std::ops::Range;

use regex::Regex;
use texlate::scanner::{find_closing_brace, find_closing_bracket, find_unescaped};

use crate::error::{MtError, MtResult};

pub const ANCHOR_BASE: usize = 777_000;

/// An anchor token and the markup it stands for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnchorToken {
    /// 1-based position of the span in the fragment
    pub index: usize,
    pub token: String,
    pub original: String,
}

impl AnchorToken {
    pub fn new(index: usize, original: impl Into<String>) -> Self {
        AnchorToken {
            index,
            token: (ANCHOR_BASE + index).to_string(),
            original: original.into(),
        }
    }
}

/// A fragment with its markup swapped for anchor tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtectedText {
    pub text: String,
    pub anchors: Vec<AnchorToken>,
}

impl ProtectedText {
    /// Text sent unchanged, with nothing to restore.
    pub fn unprotected(text: &str) -> Self {
        ProtectedText {
            text: text.to_string(),
            anchors: Vec::new(),
        }
    }

    pub fn has_anchors(&self) -> bool {
        !self.anchors.is_empty()
    }
}

/// Replaces inline math and control sequences with anchor tokens and restores them.
#[derive(Debug, Clone)]
pub struct MarkupProtector {
    /// Start of a protected span: `$$`, `$`, `\(`, a control word or a control symbol
    opener: Regex,
}

impl MarkupProtector {
    /// Compile the markup scanner.
    ///
    /// # Returns
    ///
    /// * `Err(MtError::AnchorTokenError)` - Only if the built-in pattern fails to compile
    pub fn new() -> MtResult<Self> {
        let opener = Regex::new(r"\$\$|\$|\\\(|\\[A-Za-z]+\*?|\\[^A-Za-z\s]")
            .map_err(|e| MtError::AnchorTokenError(format!("Invalid markup pattern: {}", e)))?;
        Ok(MarkupProtector { opener })
    }

    /// Swap every markup span of `text` for an anchor token.
    ///
    /// Text that already contains one of the tokens it would generate is returned
    /// unprotected, since restoring it could not tell the two apart.
    pub fn protect(&self, text: &str) -> ProtectedText {
        let spans = self.markup_spans(text);
        if spans.is_empty() {
            return ProtectedText::unprotected(text);
        }

        let anchors: Vec<AnchorToken> = spans
            .iter()
            .enumerate()
            .map(|(i, span)| AnchorToken::new(i + 1, &text[span.clone()]))
            .collect();
        if anchors.iter().any(|anchor| text.contains(&anchor.token)) {
            return ProtectedText::unprotected(text);
        }

        let mut result = String::with_capacity(text.len());
        let mut cursor = 0;
        for (span, anchor) in spans.iter().zip(&anchors) {
            result.push_str(&text[cursor..span.start]);
            result.push_str(&anchor.token);
            cursor = span.end;
        }
        result.push_str(&text[cursor..]);

        ProtectedText {
            text: result,
            anchors,
        }
    }

    /// Put the protected markup back into a translation.
    ///
    /// Every anchor must survive translation exactly once; a missing or duplicated
    /// anchor is an error and the caller should keep the source text instead.
    pub fn restore(&self, translated: &str, protected: &ProtectedText) -> MtResult<String> {
        let mut result = translated.to_string();

        // Highest index first, so a longer token is never split by a shorter one
        for anchor in protected.anchors.iter().rev() {
            match result.matches(&anchor.token).count() {
                1 => result = result.replacen(&anchor.token, &anchor.original, 1),
                0 => {
                    return Err(MtError::AnchorTokenError(format!(
                        "Anchor {} missing from translation",
                        anchor.token
                    )));
                }
                n => {
                    return Err(MtError::AnchorTokenError(format!(
                        "Anchor {} appears {} times in translation",
                        anchor.token, n
                    )));
                }
            }
        }

        Ok(result)
    }

    fn markup_spans(&self, text: &str) -> Vec<Range<usize>> {
        let bytes = text.as_bytes();
        let mut spans = Vec::new();
        let mut pos = 0;
        while let Some(head) = self.opener.find_at(text, pos) {
            let end = match head.as_str() {
                "$$" => find_unescaped(bytes, head.end(), b"$$").map_or(bytes.len(), |c| c + 2),
                "$" => find_unescaped(bytes, head.end(), b"$").map_or(bytes.len(), |c| c + 1),
                r"\(" => text[head.end()..]
                    .find(r"\)")
                    .map_or(bytes.len(), |offset| head.end() + offset + 2),
                word if word[1..].starts_with(|c: char| c.is_ascii_alphabetic()) => {
                    argument_end(bytes, head.end())
                }
                _ => head.end(),
            };
            spans.push(head.start()..end);
            pos = end;
        }
        spans
    }
}

/// End of the `[..]` and `{..}` arguments directly following a control word.
fn argument_end(bytes: &[u8], mut pos: usize) -> usize {
    loop {
        let close = match bytes.get(pos) {
            Some(b'{') => find_closing_brace(bytes, pos),
            Some(b'[') => find_closing_bracket(bytes, pos),
            _ => None,
        };
        match close {
            Some(close) => pos = close + 1,
            None => return pos,
        }
    }
}
