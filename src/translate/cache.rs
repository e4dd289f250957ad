//! Per-run translation cache.
//! Key: the exact source string handed in by the caller. No eviction, no TTL:
//! the cache lives exactly as long as one pipeline run.
//! Only successful translations are stored, so a failed text is retried
//! the next time it comes up.

use std::collections::HashMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{TranslateError, Translator, FAILED_TRANSLATION};
use crate::metrics::{metric_names, MetricsRegistry};

/// Outcome of one cache-through lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Cached(String),
    Translated(String),
    Failed(TranslateError),
}

impl Lookup {
    /// The text to write into the document; failures become the sentinel.
    pub fn into_text(self) -> String {
        match self {
            Lookup::Cached(t) | Lookup::Translated(t) => t,
            Lookup::Failed(_) => FAILED_TRANSLATION.to_string(),
        }
    }

    pub fn error(&self) -> Option<&TranslateError> {
        match self {
            Lookup::Failed(e) => Some(e),
            _ => None,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    pub failures: usize,
}

/// Cache-through front of a `Translator`.
pub struct TranslationCache<T> {
    translator: T,
    target_lang: String,
    entries: HashMap<String, String>,
    stats: CacheStats,
    metrics: Option<Arc<MetricsRegistry>>,
}

impl<T: Translator> TranslationCache<T> {
    pub fn new(translator: T, target_lang: impl Into<String>) -> Self {
        Self {
            translator,
            target_lang: target_lang.into(),
            entries: HashMap::new(),
            stats: CacheStats::default(),
            metrics: None,
        }
    }

    /// Record the latency of every network round trip in `metrics`.
    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn translator(&self) -> &T {
        &self.translator
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, text: &str) -> Option<&str> {
        self.entries.get(text).map(String::as_str)
    }

    /// Return the stored translation of `text`, or ask the backend and store
    /// the answer. Failures are returned but never stored.
    pub async fn get_or_translate(&mut self, text: &str, cancel: &CancellationToken) -> Lookup {
        if let Some(hit) = self.entries.get(text) {
            self.stats.hits += 1;
            return Lookup::Cached(hit.clone());
        }
        self.stats.misses += 1;

        let span = self.metrics.as_ref().map(|m| m.span(metric_names::TRANSLATE_CALL));
        let result = self
            .translator
            .translate(text, &self.target_lang, cancel)
            .await;
        if let Some(span) = span {
            span.finish();
        }

        match result {
            Ok(translated) => {
                debug!(
                    provider = self.translator.provider_name(),
                    src_len = text.len(),
                    "translation stored"
                );
                self.entries.insert(text.to_string(), translated.clone());
                Lookup::Translated(translated)
            }
            Err(e) => {
                self.stats.failures += 1;
                if e.is_recoverable() {
                    warn!(error = %e, text = %text, "translation failed, not cached");
                }
                Lookup::Failed(e)
            }
        }
    }
}
