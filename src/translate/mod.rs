//! Translation module: wire types, error taxonomy, and the backend trait.
//! The signed HTTP client lives in `volc`, the per-run cache in `cache`.

pub mod cache;
pub mod mock;
pub mod signing;
pub mod volc;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Written in place of a translation that could not be obtained.
pub const FAILED_TRANSLATION: &str = "Failed to obtain translation result.";

/// Request body of `TranslateText`.
#[derive(Debug, Clone, Serialize)]
pub struct TranslateRequest<'a> {
    #[serde(rename = "TargetLanguage")]
    pub target_language: &'a str,
    #[serde(rename = "TextList")]
    pub text_list: &'a [String],
}

/// Response body of `TranslateText`. Extra fields are ignored; a missing
/// `TranslationList` fails deserialization.
#[derive(Debug, Clone, Deserialize)]
pub struct TranslateResponse {
    #[serde(rename = "TranslationList")]
    pub translation_list: Vec<TranslationItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TranslationItem {
    #[serde(rename = "Translation")]
    pub translation: String,
    #[serde(rename = "DetectedSourceLanguage", default)]
    pub detected_source_language: Option<String>,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TranslateError {
    /// Connection, TLS or body read failure.
    #[error("transport error: {0}")]
    Transport(String),
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },
    /// Response arrived but does not have the expected shape.
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("translation timed out after {0:?}")]
    Timeout(Duration),
    #[error("translation cancelled")]
    Cancelled,
}

impl TranslateError {
    /// Everything except cancellation is recovered locally with the sentinel.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, TranslateError::Cancelled)
    }
}

/// Translation backend (adapter for different services).
#[async_trait]
pub trait Translator: Send + Sync {
    /// Translate `texts` in order. The result has the same length as `texts`.
    async fn translate_batch(
        &self,
        texts: &[String],
        target_lang: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, TranslateError>;

    /// Translate one text.
    async fn translate(
        &self,
        text: &str,
        target_lang: &str,
        cancel: &CancellationToken,
    ) -> Result<String, TranslateError> {
        let texts = [text.to_string()];
        let mut out = self.translate_batch(&texts, target_lang, cancel).await?;
        if out.is_empty() {
            return Err(TranslateError::Protocol("empty translation list".into()));
        }
        Ok(out.swap_remove(0))
    }

    fn provider_name(&self) -> &str;
}
