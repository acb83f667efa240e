//! The translation pipeline.
//!
//! extraction → dictionary → backend for the misses → reassembly → number formatting
//!
//! A [`Pipeline`] is built once, holding the dictionary and the backend handle, and
//! then used for any number of documents. Nothing is cached between calls. Every
//! failure along the way degrades to keeping the source text, so translating
//! always produces a document; what went wrong is listed in
//! [`TranslationOutcome::diagnostics`].

use std::sync::Arc;

use texlate::{Document, Extraction, LocaleFormatter};
use tracing::{debug, info, warn};

use crate::bridge::{BackendBridge, BridgeOutcome};
use crate::config::PipelineConfig;
use crate::dictionary::{Dictionary, DictionarySource, PhraseResolver};
use crate::google_translate::GoogleTranslateProvider;
use crate::reassembly::Reassembler;
use crate::translator::{MachineTranslator, same_language};

/// Dictionary answer for one fragment; `None` means it goes to the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionResult {
    pub fragment_index: usize,
    pub translated_text: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranslationOutcome {
    pub final_document: String,
    /// Fragments the dictionary could not resolve
    pub unresolved_count: usize,
    /// The backend call failed and its fragments kept the source text
    pub backend_failed: bool,
    pub fragment_count: usize,
    pub dictionary_hits: usize,
    pub diagnostics: Vec<String>,
}

/// Extraction and dictionary results for one document, before the backend runs.
#[derive(Debug)]
struct Plan {
    extraction: Extraction,
    resolutions: Vec<ResolutionResult>,
    diagnostics: Vec<String>,
}

impl Plan {
    fn pending_texts(&self) -> Vec<String> {
        self.resolutions
            .iter()
            .filter(|resolution| resolution.translated_text.is_none())
            .map(|resolution| self.extraction.fragments[resolution.fragment_index].raw_content.clone())
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
    dictionary: Option<Arc<Dictionary>>,
    bridge: Option<BackendBridge>,
    formatter: LocaleFormatter,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(PipelineConfig::default())
    }
}

impl Pipeline {
    /// A pipeline with neither dictionary nor backend; fragments keep their text and
    /// only numbers are formatted.
    pub fn new(config: PipelineConfig) -> Self {
        let formatter = config.locale_formatter();
        Pipeline {
            config,
            dictionary: None,
            bridge: None,
            formatter,
        }
    }

    /// Resolve fragments against `dictionary` before anything goes to the backend.
    ///
    /// The dictionary is shared, so one loaded table can serve many pipelines.
    pub fn with_dictionary(mut self, dictionary: Arc<Dictionary>) -> Self {
        self.dictionary = Some(dictionary);
        self
    }

    /// Send the fragments the dictionary misses to `translator`.
    ///
    /// The backend timeout and markup protection come from the pipeline's
    /// [`PipelineConfig`], so set the configuration first.
    ///
    /// # Arguments
    ///
    /// * `translator` - Any backend; wrapped in a [`BackendBridge`]
    ///
    /// # Example
    ///
    /// ```ignore
    /// let pipeline = Pipeline::new(PipelineConfig::default())
    ///     .with_translator(Arc::new(MockTranslator::new(MockMode::Suffix)));
    /// assert!(pipeline.has_backend());
    /// ```
    pub fn with_translator(mut self, translator: Arc<dyn MachineTranslator>) -> Self {
        let bridge = BackendBridge::new(translator).with_timeout(self.config.backend_timeout());
        self.bridge = Some(if self.config.protect_markup {
            bridge
        } else {
            bridge.without_markup_protection()
        });
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn dictionary(&self) -> Option<&Dictionary> {
        self.dictionary.as_deref()
    }

    /// Whether a backend was attached with [`Pipeline::with_translator`].
    pub fn has_backend(&self) -> bool {
        self.bridge.is_some()
    }

    /// Look every fragment up in the dictionary for the given language pair.
    pub fn resolve(
        &self,
        extraction: &Extraction,
        source_locale: &str,
        target_locale: &str,
    ) -> Vec<ResolutionResult> {
        let resolver = self
            .dictionary
            .as_ref()
            .map(|dictionary| dictionary.resolver(source_locale, target_locale));
        resolve_fragments(extraction, resolver.as_ref())
    }

    /// Translate `document`, awaiting the backend on the current runtime.
    ///
    /// # Arguments
    ///
    /// * `document` - Full report source
    /// * `source_locale` - Language the report is written in
    /// * `target_locale` - Language to translate into
    ///
    /// # Returns
    ///
    /// Always a [`TranslationOutcome`]. Failures along the way leave the affected
    /// fragments in the source language and are listed in its `diagnostics`.
    pub async fn translate_async(
        &self,
        document: &str,
        source_locale: &str,
        target_locale: &str,
    ) -> TranslationOutcome {
        let Some(plan) = self.plan(document, source_locale, target_locale) else {
            return self.format_only(document, target_locale);
        };
        let pending = plan.pending_texts();
        let bridged = match &self.bridge {
            Some(bridge) if !pending.is_empty() => {
                Some(bridge.translate(&pending, source_locale, target_locale).await)
            }
            _ => None,
        };
        self.complete(document, target_locale, plan, bridged)
    }

    /// Translate `document`, blocking until the backend answers.
    ///
    /// Safe to call from inside a tokio runtime; see
    /// [`BackendBridge::translate_blocking`].
    pub fn translate(
        &self,
        document: &str,
        source_locale: &str,
        target_locale: &str,
    ) -> TranslationOutcome {
        let Some(plan) = self.plan(document, source_locale, target_locale) else {
            return self.format_only(document, target_locale);
        };
        let pending = plan.pending_texts();
        let bridged = match &self.bridge {
            Some(bridge) if !pending.is_empty() => {
                Some(bridge.translate_blocking(&pending, source_locale, target_locale))
            }
            _ => None,
        };
        self.complete(document, target_locale, plan, bridged)
    }

    /// Extract and resolve, or `None` when source and target are the same language.
    fn plan(&self, document: &str, source_locale: &str, target_locale: &str) -> Option<Plan> {
        if same_language(source_locale, target_locale) {
            debug!(
                source = source_locale,
                target = target_locale,
                "same language, formatting only"
            );
            return None;
        }

        let extraction = Document::parse(document).into_extraction();
        let mut diagnostics = Vec::new();
        for error in &extraction.errors {
            warn!(%error, "skipped during scanning");
            diagnostics.push(format!("scan: {}", error));
        }

        let resolver = self.dictionary.as_ref().map(|dictionary| {
            let resolver = dictionary.resolver(source_locale, target_locale);
            diagnostics.extend(
                dictionary
                    .diagnostics()
                    .iter()
                    .chain(resolver.diagnostics())
                    .map(|diagnostic| format!("dictionary: {}", diagnostic)),
            );
            resolver
        });

        let resolutions = resolve_fragments(&extraction, resolver.as_ref());
        debug!(
            fragments = extraction.len(),
            resolved = resolutions.iter().filter(|r| r.translated_text.is_some()).count(),
            "resolved against dictionary"
        );

        Some(Plan {
            extraction,
            resolutions,
            diagnostics,
        })
    }

    fn complete(
        &self,
        document: &str,
        target_locale: &str,
        plan: Plan,
        bridged: Option<BridgeOutcome>,
    ) -> TranslationOutcome {
        let Plan {
            extraction,
            resolutions,
            mut diagnostics,
        } = plan;

        let unresolved_count = resolutions
            .iter()
            .filter(|resolution| resolution.translated_text.is_none())
            .count();
        if unresolved_count > 0 && self.bridge.is_none() {
            debug!(unresolved_count, "no backend configured, keeping source text");
            diagnostics.push(format!(
                "no backend configured; {} fragments kept in source language",
                unresolved_count
            ));
        }

        let backend_failed = bridged.as_ref().is_some_and(|outcome| outcome.failed);
        let mut backend_translations = match bridged {
            Some(outcome) => {
                diagnostics.extend(outcome.diagnostics);
                outcome.translations.into_iter()
            }
            None => Vec::new().into_iter(),
        };

        let translations: Vec<String> = resolutions
            .into_iter()
            .zip(&extraction.fragments)
            .map(|(resolution, fragment)| {
                resolution
                    .translated_text
                    .or_else(|| backend_translations.next())
                    .unwrap_or_else(|| fragment.raw_content.clone())
            })
            .collect();

        let reassembled = match Reassembler::new(document).reassemble(&extraction.fragments, &translations) {
            Ok(reassembled) => reassembled,
            Err(e) => {
                warn!(error = %e, "reassembly failed, keeping source document");
                diagnostics.push(format!("reassembly: {}", e));
                document.to_string()
            }
        };
        let final_document = self.formatter.format(&reassembled, target_locale);

        let fragment_count = extraction.len();
        info!(
            target = target_locale,
            fragments = fragment_count,
            dictionary_hits = fragment_count - unresolved_count,
            unresolved = unresolved_count,
            backend_failed,
            "translated document"
        );

        TranslationOutcome {
            final_document,
            unresolved_count,
            backend_failed,
            fragment_count,
            dictionary_hits: fragment_count - unresolved_count,
            diagnostics,
        }
    }

    fn format_only(&self, document: &str, target_locale: &str) -> TranslationOutcome {
        TranslationOutcome {
            final_document: self.formatter.format(document, target_locale),
            ..TranslationOutcome::default()
        }
    }
}

fn resolve_fragments(
    extraction: &Extraction,
    resolver: Option<&PhraseResolver>,
) -> Vec<ResolutionResult> {
    extraction
        .fragments
        .iter()
        .enumerate()
        .map(|(fragment_index, fragment)| ResolutionResult {
            fragment_index,
            translated_text: resolver.and_then(|resolver| resolver.resolve(&fragment.raw_content)),
        })
        .collect()
}

/// Translate a document in one call.
///
/// The dictionary, if given, is loaded for this call only; one that cannot be read
/// is skipped with a warning. The Google backend is used when
/// `GOOGLE_TRANSLATE_API_KEY` is set. Never fails: the worst case is the source
/// document with its numbers formatted for `destination_language`.
///
/// # Example
///
/// ```ignore
/// let table = DictionarySource::from(b"en,nl\nResults,Resultaten\n".to_vec());
/// let out = texlate_mt::translate(r"\section{Results} $2.5$", "nl", "en", Some(&table));
/// assert_eq!(out, r"\section{Resultaten} $2,5$");
/// ```
pub fn translate(
    document: &str,
    destination_language: &str,
    source_language: &str,
    dictionary_source: Option<&DictionarySource>,
) -> String {
    let config = PipelineConfig::default();
    let mut pipeline = Pipeline::new(config.clone());

    if let Some(source) = dictionary_source {
        match Dictionary::load(source) {
            Ok(dictionary) => pipeline = pipeline.with_dictionary(Arc::new(dictionary)),
            Err(e) => warn!(error = %e, "cannot load dictionary, continuing without it"),
        }
    }

    match GoogleTranslateProvider::with_timeout(
        std::env::var("GOOGLE_TRANSLATE_API_KEY").unwrap_or_default(),
        config.backend_timeout(),
    ) {
        Ok(provider) => pipeline = pipeline.with_translator(Arc::new(provider)),
        Err(e) => debug!(error = %e, "no translation backend"),
    }

    pipeline
        .translate(document, source_language, destination_language)
        .final_document
}
