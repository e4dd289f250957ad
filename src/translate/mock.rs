//! Deterministic translator for tests and offline runs.
//! Records every text it is asked for, so callers can assert on
//! how many round trips a pipeline made.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use super::{TranslateError, Translator};

#[derive(Debug, Clone)]
pub enum MockMode {
    /// "hello" → "hello_en"
    Suffix,
    /// Fixed source → translation table; unknown texts fall back to `Suffix`.
    Mappings(HashMap<String, String>),
    /// Every call fails with this error.
    Error(TranslateError),
}

/// Mock backend with a call log.
#[derive(Debug)]
pub struct MockTranslator {
    mode: MockMode,
    delay: Duration,
    /// Number of leading calls that fail with `Transport` before `mode` applies.
    fail_first: AtomicUsize,
    calls: Mutex<Vec<String>>,
}

impl MockTranslator {
    pub fn new(mode: MockMode) -> Self {
        Self {
            mode,
            delay: Duration::ZERO,
            fail_first: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_mappings<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let map = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self::new(MockMode::Mappings(map))
    }

    /// Simulated network latency per call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Fail the next `n` calls with a transport error.
    pub fn failing_first(self, n: usize) -> Self {
        self.fail_first.store(n, Ordering::SeqCst);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Texts requested so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn apply(&self, text: &str, target_lang: &str) -> Result<String, TranslateError> {
        match &self.mode {
            MockMode::Suffix => Ok(format!("{text}_{target_lang}")),
            MockMode::Mappings(map) => Ok(map
                .get(text)
                .cloned()
                .unwrap_or_else(|| format!("{text}_{target_lang}"))),
            MockMode::Error(err) => Err(err.clone()),
        }
    }
}

#[async_trait]
impl Translator for MockTranslator {
    async fn translate_batch(
        &self,
        texts: &[String],
        target_lang: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, TranslateError> {
        self.calls.lock().extend(texts.iter().cloned());

        if !self.delay.is_zero() {
            tokio::select! {
                _ = tokio::time::sleep(self.delay) => {}
                _ = cancel.cancelled() => return Err(TranslateError::Cancelled),
            }
        }

        let pending = self.fail_first.load(Ordering::SeqCst);
        if pending > 0 {
            self.fail_first.store(pending - 1, Ordering::SeqCst);
            return Err(TranslateError::Transport("connection reset (mock)".into()));
        }

        texts.iter().map(|t| self.apply(t, target_lang)).collect()
    }

    fn provider_name(&self) -> &str {
        "Mock Translator"
    }
}
