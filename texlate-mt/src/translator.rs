//! Backend interface for the fragments the dictionary could not answer.
//!
//! A backend receives an ordered list of texts and a language pair and answers with
//! one translation per text, in the same order. The pipeline holds it as
//! `Arc<dyn MachineTranslator>`.
//!
//! ```ignore
//! use texlate_mt::{MachineTranslator, GoogleTranslateProvider};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = GoogleTranslateProvider::from_env()?;
//!     let batch = vec!["Load case".to_string(), "Results".to_string()];
//!     println!("{:?}", backend.translate_batch(&batch, "en", "nl").await?);
//!     Ok(())
//! }
//! ```

use async_trait::async_trait;

use crate::error::{MtError, MtResult};

#[async_trait]
pub trait MachineTranslator: Send + Sync {
    async fn translate(
        &self,
        text: &str,
        source_locale: &str,
        target_locale: &str,
    ) -> MtResult<String>;

    /// Answer one translation per input text, position for position.
    ///
    /// Backends that may reorder or drop results must return `false` from
    /// [`MachineTranslator::preserves_order`].
    async fn translate_batch(
        &self,
        texts: &[String],
        source_locale: &str,
        target_locale: &str,
    ) -> MtResult<Vec<String>>;

    /// Short name used in logs and diagnostics
    fn provider_name(&self) -> &str;

    /// The bridge refuses to map results from a backend that answers `false`.
    fn preserves_order(&self) -> bool {
        true
    }
}

/// Language part of a locale code, lowercased: `pt_BR` and `PT-br` both give `pt`.
pub fn normalize_locale(locale: &str) -> String {
    let language = match locale.find(['-', '_']) {
        Some(end) => &locale[..end],
        None => locale,
    };
    language.to_ascii_lowercase()
}

/// Accept codes made of ASCII letters, digits, `-` and `_`.
pub fn validate_locale(locale: &str) -> MtResult<()> {
    if locale.is_empty() {
        return Err(MtError::InvalidLocale("empty locale code".to_string()));
    }
    if let Some(bad) = locale
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
    {
        return Err(MtError::InvalidLocale(format!(
            "'{}' contains '{}'",
            locale, bad
        )));
    }
    Ok(())
}

/// Whether two locale codes name the same language.
pub fn same_language(a: &str, b: &str) -> bool {
    normalize_locale(a) == normalize_locale(b)
}
