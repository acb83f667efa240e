//! Pipeline configuration.
//!
//! Every field has a default, so an empty JSON object is a valid configuration:
//!
//! ```json
//! {
//!   "source_language": "en",
//!   "backend_timeout_ms": 30000,
//!   "comma_decimal_locales": ["nl", "de", "fr"],
//!   "protect_markup": true
//! }
//! ```
//!
//! Backend credentials are never part of the file; the Google backend reads its key
//! from `GOOGLE_TRANSLATE_API_KEY`.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use texlate::{DEFAULT_DECIMAL_COMMA_LANGUAGES, LocaleFormatter};

use crate::error::{MtError, MtResult};
use crate::translator::validate_locale;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Language the documents are written in
    #[serde(default = "default_source_language")]
    pub source_language: String,

    #[serde(default = "default_backend_timeout_ms")]
    pub backend_timeout_ms: u64,

    /// Languages whose numbers use a decimal comma
    #[serde(default = "default_comma_decimal_locales")]
    pub comma_decimal_locales: Vec<String>,

    /// Hide math and control sequences from the backend behind anchor tokens
    #[serde(default = "default_protect_markup")]
    pub protect_markup: bool,
}

fn default_source_language() -> String {
    "en".to_string()
}

fn default_backend_timeout_ms() -> u64 {
    30_000
}

fn default_comma_decimal_locales() -> Vec<String> {
    DEFAULT_DECIMAL_COMMA_LANGUAGES
        .iter()
        .map(|code| code.to_string())
        .collect()
}

fn default_protect_markup() -> bool {
    true
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            source_language: default_source_language(),
            backend_timeout_ms: default_backend_timeout_ms(),
            comma_decimal_locales: default_comma_decimal_locales(),
            protect_markup: default_protect_markup(),
        }
    }
}

impl PipelineConfig {
    /// Parse and validate a JSON configuration. Missing fields take their defaults.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let config = PipelineConfig::from_json_str(r#"{"source_language": "de"}"#)?;
    /// assert_eq!(config.backend_timeout_ms, 30_000);
    /// ```
    pub fn from_json_str(json: &str) -> MtResult<Self> {
        let config: PipelineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a JSON configuration file.
    ///
    /// # Returns
    ///
    /// * `Ok(Self)` - A validated configuration
    /// * `Err(MtError::ConfigError)` - The file could not be read
    /// * `Err(MtError::Json)` - The file is not valid JSON for this type
    pub fn from_json_file(path: impl AsRef<Path>) -> MtResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            MtError::ConfigError(format!("Cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&json)
    }

    /// Reject an invalid source language or a zero timeout.
    pub fn validate(&self) -> MtResult<()> {
        validate_locale(&self.source_language)?;
        if self.backend_timeout_ms == 0 {
            return Err(MtError::ConfigError(
                "backend_timeout_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn backend_timeout(&self) -> Duration {
        Duration::from_millis(self.backend_timeout_ms)
    }

    pub fn locale_formatter(&self) -> LocaleFormatter {
        LocaleFormatter::new(&self.comma_decimal_locales)
    }
}
