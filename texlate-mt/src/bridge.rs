//! Backend bridge.
//!
//! Sends every text the dictionary could not resolve to the translation backend in
//! a single batch and maps the answers back by position. Failures never leave the
//! bridge: a timeout, a transport error, a response of the wrong length or a
//! backend that cannot promise result order all turn into the identity translation
//! for the whole batch, plus a diagnostic.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::anchor::{MarkupProtector, ProtectedText};
use crate::error::{MtError, MtResult};
use crate::translator::MachineTranslator;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Translations for one batch, aligned with the request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BridgeOutcome {
    /// One entry per requested text; the source text wherever translation failed
    pub translations: Vec<String>,
    /// The batch call itself failed and every entry is the source text
    pub failed: bool,
    pub diagnostics: Vec<String>,
}

impl BridgeOutcome {
    fn identity(texts: &[String], diagnostic: String) -> Self {
        BridgeOutcome {
            translations: texts.to_vec(),
            failed: true,
            diagnostics: vec![diagnostic],
        }
    }
}

#[derive(Clone)]
pub struct BackendBridge {
    translator: Arc<dyn MachineTranslator>,
    timeout: Duration,
    protector: Option<MarkupProtector>,
}

impl BackendBridge {
    /// Bridge to `translator` with the default timeout and markup protection on.
    pub fn new(translator: Arc<dyn MachineTranslator>) -> Self {
        let protector = match MarkupProtector::new() {
            Ok(protector) => Some(protector),
            Err(e) => {
                warn!(error = %e, "markup protection unavailable");
                None
            }
        };
        BackendBridge {
            translator,
            timeout: DEFAULT_TIMEOUT,
            protector,
        }
    }

    /// Give up on the backend after `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Send math and control sequences to the backend as is instead of as anchors.
    pub fn without_markup_protection(mut self) -> Self {
        self.protector = None;
        self
    }

    pub fn provider_name(&self) -> &str {
        self.translator.provider_name()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Translate `texts` with one batched backend call.
    ///
    /// # Arguments
    ///
    /// * `texts` - Fragment texts, in document order
    /// * `source_locale` - Language of `texts`
    /// * `target_locale` - Language to translate into
    ///
    /// # Returns
    ///
    /// A [`BridgeOutcome`] with exactly one entry per input text. Entries whose
    /// translation failed hold the input text unchanged.
    pub async fn translate(
        &self,
        texts: &[String],
        source_locale: &str,
        target_locale: &str,
    ) -> BridgeOutcome {
        if texts.is_empty() {
            return BridgeOutcome::default();
        }

        let protected_texts: Vec<ProtectedText> = texts
            .iter()
            .map(|text| match &self.protector {
                Some(protector) => protector.protect(text),
                None => ProtectedText::unprotected(text),
            })
            .collect();
        let payload: Vec<String> = protected_texts.iter().map(|p| p.text.clone()).collect();

        debug!(
            provider = self.provider_name(),
            count = payload.len(),
            "sending batch to backend"
        );
        let responses = match self.request(&payload, source_locale, target_locale).await {
            Ok(responses) => responses,
            Err(e) => {
                warn!(provider = self.provider_name(), error = %e, "backend failed, keeping source text");
                return BridgeOutcome::identity(
                    texts,
                    format!("backend {} failed: {}", self.provider_name(), e),
                );
            }
        };

        let mut outcome = BridgeOutcome {
            translations: Vec::with_capacity(texts.len()),
            failed: false,
            diagnostics: Vec::new(),
        };
        for (index, ((source, protected), response)) in
            texts.iter().zip(&protected_texts).zip(responses).enumerate()
        {
            match self.finish(response.trim(), protected) {
                Ok(translation) => outcome.translations.push(translation),
                Err(e) => {
                    warn!(index, error = %e, "keeping source text for fragment");
                    outcome
                        .diagnostics
                        .push(format!("fragment {} kept in source language: {}", index, e));
                    outcome.translations.push(source.clone());
                }
            }
        }
        outcome
    }

    /// Blocking form of [`BackendBridge::translate`].
    ///
    /// Inside a tokio runtime the call runs on a scoped helper thread with its own
    /// current-thread runtime, so the caller's runtime is never blocked on itself.
    pub fn translate_blocking(
        &self,
        texts: &[String],
        source_locale: &str,
        target_locale: &str,
    ) -> BridgeOutcome {
        if texts.is_empty() {
            return BridgeOutcome::default();
        }

        if tokio::runtime::Handle::try_current().is_err() {
            return self.run_to_completion(texts, source_locale, target_locale);
        }

        std::thread::scope(|scope| {
            scope
                .spawn(|| self.run_to_completion(texts, source_locale, target_locale))
                .join()
                .unwrap_or_else(|_| {
                    warn!("backend thread panicked, keeping source text");
                    BridgeOutcome::identity(texts, "backend thread panicked".to_string())
                })
        })
    }

    fn run_to_completion(
        &self,
        texts: &[String],
        source_locale: &str,
        target_locale: &str,
    ) -> BridgeOutcome {
        match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime.block_on(self.translate(texts, source_locale, target_locale)),
            Err(e) => {
                warn!(error = %e, "cannot start runtime for backend call");
                BridgeOutcome::identity(texts, format!("cannot start runtime: {}", e))
            }
        }
    }

    async fn request(
        &self,
        payload: &[String],
        source_locale: &str,
        target_locale: &str,
    ) -> MtResult<Vec<String>> {
        if !self.translator.preserves_order() {
            return Err(MtError::TranslationError(format!(
                "{} does not guarantee result order",
                self.provider_name()
            )));
        }

        let call = self
            .translator
            .translate_batch(payload, source_locale, target_locale);
        let responses = tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| MtError::Timeout(self.timeout.as_millis() as u64))??;

        if responses.len() != payload.len() {
            return Err(MtError::ResponseMismatch {
                expected: payload.len(),
                actual: responses.len(),
            });
        }
        Ok(responses)
    }

    fn finish(&self, response: &str, protected: &ProtectedText) -> MtResult<String> {
        if response.is_empty() {
            return Err(MtError::TranslationError(
                "backend returned an empty translation".to_string(),
            ));
        }
        match &self.protector {
            Some(protector) if protected.has_anchors() => protector.restore(response, protected),
            _ => Ok(response.to_string()),
        }
    }
}

impl std::fmt::Debug for BackendBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendBridge")
            .field("provider", &self.provider_name())
            .field("timeout", &self.timeout)
            .field("protect_markup", &self.protector.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockMode, MockTranslator};
    use std::collections::HashMap;

    fn texts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn bridge(mock: &MockTranslator) -> BackendBridge {
        BackendBridge::new(Arc::new(mock.clone()))
    }

    #[tokio::test]
    async fn test_single_batched_call() {
        let mock = MockTranslator::new(MockMode::Suffix);
        let outcome = bridge(&mock)
            .translate(&texts(&["one", "two", "three"]), "en", "nl")
            .await;
        assert_eq!(outcome.translations, vec!["one_nl", "two_nl", "three_nl"]);
        assert!(!outcome.failed);
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn test_empty_batch_skips_backend() {
        let mock = MockTranslator::new(MockMode::Suffix);
        let outcome = bridge(&mock).translate(&[], "en", "nl").await;
        assert!(outcome.translations.is_empty());
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_backend_error_falls_back_to_identity() {
        let mock = MockTranslator::new(MockMode::Error("quota exceeded".to_string()));
        let input = texts(&["Hello", "World"]);
        let outcome = bridge(&mock).translate(&input, "en", "nl").await;
        assert!(outcome.failed);
        assert_eq!(outcome.translations, input);
        assert!(outcome.diagnostics[0].contains("quota exceeded"));
    }

    #[tokio::test]
    async fn test_length_mismatch_falls_back_to_identity() {
        let mock = MockTranslator::new(MockMode::Truncate);
        let input = texts(&["a", "b"]);
        let outcome = bridge(&mock).translate(&input, "en", "nl").await;
        assert!(outcome.failed);
        assert_eq!(outcome.translations, input);
    }

    #[tokio::test]
    async fn test_unordered_backend_is_rejected() {
        let mock = MockTranslator::new(MockMode::Suffix).unordered();
        let input = texts(&["a"]);
        let outcome = bridge(&mock).translate(&input, "en", "nl").await;
        assert!(outcome.failed);
        assert_eq!(outcome.translations, input);
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_timeout_falls_back_to_identity() {
        let mock = MockTranslator::with_delay(MockMode::Suffix, 500);
        let input = texts(&["slow"]);
        let outcome = bridge(&mock)
            .with_timeout(Duration::from_millis(20))
            .translate(&input, "en", "nl")
            .await;
        assert!(outcome.failed);
        assert_eq!(outcome.translations, input);
        assert!(outcome.diagnostics[0].contains("timed out"));
    }

    #[tokio::test]
    async fn test_responses_are_trimmed() {
        let mock = MockTranslator::new(MockMode::Padded);
        let outcome = bridge(&mock).translate(&texts(&["hello"]), "en", "nl").await;
        assert_eq!(outcome.translations, vec!["hello_nl"]);
    }

    #[tokio::test]
    async fn test_markup_is_sent_as_anchors_and_restored() {
        let mock = MockTranslator::new(MockMode::Suffix);
        let outcome = bridge(&mock)
            .translate(&texts(&["Load $F$ applied"]), "en", "nl")
            .await;
        assert_eq!(mock.requests(), vec![texts(&["Load 777001 applied"])]);
        assert_eq!(outcome.translations, vec!["Load $F$ applied_nl"]);
    }

    #[tokio::test]
    async fn test_lost_anchor_keeps_that_fragment_only() {
        let mut map = HashMap::new();
        map.insert(
            ("Load 777001 applied".to_string(), "nl".to_string()),
            "Belasting toegepast".to_string(),
        );
        let mock = MockTranslator::new(MockMode::Mappings(map));
        let input = texts(&["Load $F$ applied", "Results"]);
        let outcome = bridge(&mock).translate(&input, "en", "nl").await;
        assert!(!outcome.failed);
        assert_eq!(outcome.translations, vec!["Load $F$ applied", "Results_nl"]);
        assert_eq!(outcome.diagnostics.len(), 1);
    }

    #[tokio::test]
    async fn test_without_markup_protection() {
        let mock = MockTranslator::new(MockMode::NoOp);
        bridge(&mock)
            .without_markup_protection()
            .translate(&texts(&["Load $F$"]), "en", "nl")
            .await;
        assert_eq!(mock.requests(), vec![texts(&["Load $F$"])]);
    }

    #[test]
    fn test_blocking_outside_runtime() {
        let mock = MockTranslator::new(MockMode::Suffix);
        let outcome = bridge(&mock).translate_blocking(&texts(&["hello"]), "en", "de");
        assert_eq!(outcome.translations, vec!["hello_de"]);
    }

    #[tokio::test]
    async fn test_blocking_inside_runtime_does_not_deadlock() {
        let mock = MockTranslator::with_delay(MockMode::Suffix, 10);
        let outcome = bridge(&mock).translate_blocking(&texts(&["hello"]), "en", "de");
        assert_eq!(outcome.translations, vec!["hello_de"]);
    }

    #[test]
    fn test_debug_output() {
        let mock = MockTranslator::new(MockMode::NoOp);
        let debug_str = format!("{:?}", bridge(&mock));
        assert!(debug_str.contains("Mock Translator"));
    }
}
