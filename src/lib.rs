//! Interleaf: bilingual document translation.
//! Signs machine-translation requests, caches results for the run, and
//! writes each translation directly after its source text.

pub mod cancellation;
pub mod config;
pub mod document;
pub mod metrics;
pub mod translate;

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tracing::{info, Instrument};

use cancellation::CancelScope;
use config::{ConfigError, PipelineConfig};
use document::{Document, DocumentError, DocumentMutator, DocumentTree, TranslationReport};
use metrics::MetricsRegistry;
use translate::cache::TranslationCache;
use translate::volc::VolcClient;
use translate::{TranslateError, Translator};

pub const LOG_JSON_VAR: &str = "INTERLEAF_LOG_JSON";

#[derive(Debug, Error)]
pub enum RunError {
    #[error("usage: interleaf <input.json> <output.json>")]
    Usage,
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error("translation client setup failed: {0}")]
    Client(#[from] TranslateError),
}

/// Install the global subscriber. `RUST_LOG` wins; otherwise `interleaf=info`.
/// Set `INTERLEAF_LOG_JSON=1` for one JSON object per line.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("interleaf=info"));
    let json = std::env::var(LOG_JSON_VAR).is_ok_and(|v| v == "1");

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);
    // try_init: tests may install a subscriber first.
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

/// Translate `doc` in place with any backend. Library entry point for hosts
/// that bring their own document and translator.
pub async fn translate_document_with<D, T>(
    doc: &mut D,
    translator: T,
    target_lang: &str,
    scope: CancelScope,
    metrics: Arc<MetricsRegistry>,
) -> Result<TranslationReport, DocumentError>
where
    D: DocumentTree,
    T: Translator,
{
    let mut cache = TranslationCache::new(translator, target_lang).with_metrics(Arc::clone(&metrics));
    let watch = scope.spawn_deadline_watch();
    let run_id = uuid::Uuid::new_v4().to_string();
    let span = tracing::info_span!("translate_document", %run_id, target_lang);

    let report = DocumentMutator::new(&mut cache, scope)
        .with_metrics(Arc::clone(&metrics))
        .translate_document(doc)
        .instrument(span)
        .await;
    if let Some(watch) = watch {
        watch.abort();
    }
    metrics.log_summary();
    report
}

/// Command-line pipeline: `<input.json> <output.json>`.
/// Only configuration and I/O problems are errors; failed translations are
/// reported and the output is still written.
pub async fn run_with_args<I>(args: I) -> Result<TranslationReport, RunError>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter();
    let (input, output) = match (args.next(), args.next(), args.next()) {
        (Some(input), Some(output), None) => (PathBuf::from(input), PathBuf::from(output)),
        _ => return Err(RunError::Usage),
    };

    let config = PipelineConfig::from_env()?;
    info!(
        host = %config.host,
        target_lang = %config.target_lang,
        input = %input.display(),
        "interleaf starting"
    );

    let mut doc = Document::load(&input)?;
    let client = VolcClient::new(&config)?;
    let scope = match config.run_timeout {
        Some(budget) => CancelScope::with_budget(budget),
        None => CancelScope::new(),
    };

    let report = translate_document_with(
        &mut doc,
        client,
        &config.target_lang,
        scope,
        Arc::new(MetricsRegistry::new()),
    )
    .await?;

    doc.save(&output)?;
    info!(output = %output.display(), "document written");
    Ok(report)
}

/// Run with the process arguments.
pub async fn run() -> Result<TranslationReport, RunError> {
    init_tracing();
    run_with_args(std::env::args().skip(1)).await
}
