use clap::{Arg, ArgAction, Command};
use std::path::PathBuf;
use std::sync::Arc;
use texlate_mt::{
    Dictionary, GoogleTranslateProvider, MockMode, MockTranslator, Pipeline, PipelineConfig,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let matches = Command::new("texlate-mt")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Translate the text of a LaTeX-style report")
        .arg(
            Arg::new("input")
                .help("Document to translate")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::new("target-locale")
                .help("Target language code (e.g., nl, de, fr)")
                .required(true)
                .index(2),
        )
        .arg(
            Arg::new("source-locale")
                .long("source")
                .short('s')
                .help("Source language code (default: from config, else en)"),
        )
        .arg(
            Arg::new("dictionary")
                .long("dictionary")
                .short('d')
                .help("CSV phrase dictionary")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .help("JSON pipeline configuration")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("output")
                .long("output")
                .short('o')
                .help("Write the translated document here instead of stdout")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("mock")
                .long("mock")
                .short('m')
                .help("Use mock translator instead of Google Translate")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .help("Log every stage and print a summary")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    let verbose = matches.get_flag("verbose");
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" })),
        )
        .init();

    let input = matches
        .get_one::<String>("input")
        .ok_or("missing input document")?;
    let target_locale = matches
        .get_one::<String>("target-locale")
        .ok_or("missing target locale")?;

    let config = match matches.get_one::<PathBuf>("config") {
        Some(path) => PipelineConfig::from_json_file(path)?,
        None => PipelineConfig::default(),
    };
    let source_locale = matches
        .get_one::<String>("source-locale")
        .cloned()
        .unwrap_or_else(|| config.source_language.clone());

    let document = std::fs::read_to_string(input)
        .map_err(|e| format!("Cannot read {}: {}", input, e))?;

    let mut pipeline = Pipeline::new(config);

    if let Some(path) = matches.get_one::<PathBuf>("dictionary") {
        match Dictionary::from_path(path) {
            Ok(dictionary) => {
                info!(path = %path.display(), rows = dictionary.len(), "loaded dictionary");
                pipeline = pipeline.with_dictionary(Arc::new(dictionary));
            }
            Err(e) => warn!(error = %e, "continuing without dictionary"),
        }
    }

    if matches.get_flag("mock") {
        pipeline = pipeline.with_translator(Arc::new(MockTranslator::new(MockMode::Suffix)));
    } else {
        match GoogleTranslateProvider::with_timeout(
            std::env::var("GOOGLE_TRANSLATE_API_KEY").unwrap_or_default(),
            pipeline.config().backend_timeout(),
        ) {
            Ok(provider) => pipeline = pipeline.with_translator(Arc::new(provider)),
            Err(_) => {
                warn!("GOOGLE_TRANSLATE_API_KEY not set; only the dictionary will be used");
                warn!("Set it with: export GOOGLE_TRANSLATE_API_KEY=your_api_key, or pass --mock");
            }
        }
    }

    let outcome = pipeline
        .translate_async(&document, &source_locale, target_locale)
        .await;

    if verbose {
        eprintln!("{} → {}", source_locale, target_locale);
        eprintln!(
            "fragments: {}, dictionary hits: {}, unresolved: {}, backend failed: {}",
            outcome.fragment_count,
            outcome.dictionary_hits,
            outcome.unresolved_count,
            outcome.backend_failed
        );
        for diagnostic in &outcome.diagnostics {
            eprintln!("  - {}", diagnostic);
        }
    }

    match matches.get_one::<PathBuf>("output") {
        Some(path) => std::fs::write(path, &outcome.final_document)?,
        None => print!("{}", outcome.final_document),
    }

    Ok(())
}
