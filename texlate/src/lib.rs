//! Markup layer for translating LaTeX-style engineering reports.
//!
//! The crate finds the human-language text embedded in a fixed set of markup
//! commands and formats numbers for the destination locale. It knows nothing
//! about how text gets translated; that lives in `texlate-mt`.
//!
//! ```ignore
//! use texlate::{Document, LocaleFormatter};
//!
//! let document = Document::parse(r"\section{Results} \txt{Load $F = 2.5$ kN}");
//! for fragment in document.fragments() {
//!     println!("{}: {}", fragment.kind, fragment.raw_content);
//! }
//! let formatted = LocaleFormatter::default().format(document.source(), "de");
//! ```

pub mod command;
pub mod error;
pub mod fragment;
pub mod locale;
pub mod scanner;

pub use command::{CommandKind, FragmentKind};
pub use error::ScanError;
pub use fragment::{Extraction, Fragment, extract_fragments, has_translatable_text};
pub use locale::{DEFAULT_DECIMAL_COMMA_LANGUAGES, LocaleFormatter, convert_decimal_separators};
pub use scanner::{CommandSpan, Scanner, TableCell};

/// An input document and the fragments extracted from it.
#[derive(Debug, Clone)]
pub struct Document<'a> {
    source: &'a str,
    extraction: Extraction,
}

impl<'a> Document<'a> {
    pub fn parse(source: &'a str) -> Self {
        Document {
            source,
            extraction: extract_fragments(source),
        }
    }

    pub fn source(&self) -> &'a str {
        self.source
    }

    pub fn fragments(&self) -> &[Fragment] {
        &self.extraction.fragments
    }

    pub fn scan_errors(&self) -> &[ScanError] {
        &self.extraction.errors
    }

    pub fn extraction(&self) -> &Extraction {
        &self.extraction
    }

    pub fn into_extraction(self) -> Extraction {
        self.extraction
    }
}
