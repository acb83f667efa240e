//! Reassembly of the translated document.
//!
//! Each fragment's untrimmed run is replaced with `leading_space + translation +
//! trailing_space`. The command wrapping the run is outside its byte range and is
//! copied through unchanged. All offsets refer to the original document, and the
//! output is built in one left-to-right pass.

use texlate::Fragment;
use tracing::debug;

use crate::error::{MtError, MtResult};

#[derive(Debug, Clone, Copy)]
pub struct Reassembler<'a> {
    source: &'a str,
}

impl<'a> Reassembler<'a> {
    /// Reassembler over the document the fragments were extracted from.
    pub fn new(source: &'a str) -> Self {
        Reassembler { source }
    }

    /// Substitute `translations[i]` for `fragments[i]`.
    ///
    /// Fragments may come in any order but must lie on character boundaries of the
    /// source and must not overlap. A translation equal to the fragment's text still
    /// goes through substitution, which reproduces the source bytes exactly.
    pub fn reassemble(&self, fragments: &[Fragment], translations: &[String]) -> MtResult<String> {
        if fragments.len() != translations.len() {
            return Err(MtError::ReassemblyError(format!(
                "{} translations for {} fragments",
                translations.len(),
                fragments.len()
            )));
        }

        let mut order: Vec<usize> = (0..fragments.len()).collect();
        order.sort_by_key(|&i| fragments[i].byte_range.start);

        let mut output = String::with_capacity(self.source.len());
        let mut cursor = 0;
        for i in order {
            let range = &fragments[i].byte_range;
            if range.start < cursor {
                return Err(MtError::ReassemblyError(format!(
                    "fragment at {}..{} overlaps the previous one",
                    range.start, range.end
                )));
            }
            let before = self.source.get(cursor..range.start);
            let replaced = self.source.get(range.clone());
            let (Some(before), Some(_)) = (before, replaced) else {
                return Err(MtError::ReassemblyError(format!(
                    "fragment at {}..{} is outside the document",
                    range.start, range.end
                )));
            };
            output.push_str(before);
            output.push_str(&fragments[i].render(&translations[i]));
            cursor = range.end;
        }
        output.push_str(&self.source[cursor..]);

        debug!(
            fragments = fragments.len(),
            before = self.source.len(),
            after = output.len(),
            "reassembled document"
        );
        Ok(output)
    }
}
