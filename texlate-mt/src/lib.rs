//! Dictionary and machine translation for texlate documents
//!
//! Finds the human-language text of a LaTeX-style report with [`texlate`], resolves
//! it against a phrase dictionary, sends the misses to a translation backend in one
//! batch, writes the results back in place and formats numbers for the destination
//! locale.
//!
//! # Workflow Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use texlate_mt::{Dictionary, GoogleTranslateProvider, Pipeline, PipelineConfig};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let dictionary = Dictionary::from_path("dictionary.csv")?;
//!     let pipeline = Pipeline::new(PipelineConfig::default())
//!         .with_dictionary(Arc::new(dictionary))
//!         .with_translator(Arc::new(GoogleTranslateProvider::from_env()?));
//!
//!     let outcome = pipeline.translate(r"\section{Results} \txt{Load $F = 2.5$ kN}", "en", "nl");
//!     println!("{}", outcome.final_document);
//!     Ok(())
//! }
//! ```

pub mod anchor;
pub mod bridge;
pub mod config;
pub mod dictionary;
pub mod error;
pub mod google_translate;
pub mod mock;
pub mod pattern;
pub mod pipeline;
pub mod reassembly;
pub mod translator;


pub use anchor::{AnchorToken, MarkupProtector, ProtectedText};
pub use bridge::{BackendBridge, BridgeOutcome};
pub use config::PipelineConfig;
pub use dictionary::{Dictionary, DictionarySource, PhraseResolver};
pub use error::{LoadDiagnostic, MtError, MtResult};
pub use google_translate::GoogleTranslateProvider;
pub use mock::{MockMode, MockTranslator};
pub use pattern::WildcardPattern;
pub use pipeline::{Pipeline, ResolutionResult, TranslationOutcome, translate};
pub use reassembly::Reassembler;
pub use translator::MachineTranslator;
