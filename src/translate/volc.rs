//! Volcengine `TranslateText` client.
//! One signed POST per call, no retries. Each call is bounded by the
//! configured deadline and aborts early when the run is cancelled.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::signing::{SignRequest, Signer, CONTENT_TYPE_JSON};
use super::{TranslateError, TranslateRequest, TranslateResponse, Translator};
use crate::config::PipelineConfig;

pub const TRANSLATE_ACTION: &str = "TranslateText";

/// Signed HTTPS client for the translation API.
pub struct VolcClient {
    http: reqwest::Client,
    signer: Signer,
    host: String,
    base_url: String,
    timeout: Duration,
}

impl VolcClient {
    pub fn new(config: &PipelineConfig) -> Result<Self, TranslateError> {
        let http = reqwest::Client::builder()
            .pool_max_idle_per_host(2)
            .pool_idle_timeout(Duration::from_secs(90))
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| TranslateError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            signer: Signer::new(config.credential.clone()),
            host: config.host.clone(),
            base_url: format!("https://{}", config.host),
            timeout: config.request_timeout,
        })
    }

    /// Send requests to `base_url` while still signing for the configured host.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn post(&self, body: String) -> Result<String, TranslateError> {
        let signed = self.signer.sign(&SignRequest {
            method: "POST",
            host: &self.host,
            path: "/",
            action: TRANSLATE_ACTION,
            query: Vec::new(),
            content_type: CONTENT_TYPE_JSON,
            body: &body,
            timestamp: Utc::now(),
        });

        let url = format!("{}/?{}", self.base_url, signed.query);
        debug!(host = %self.host, query = %signed.query, body_len = body.len(), "POST translate");

        let mut request = self.http.post(&url);
        for (name, value) in signed.as_pairs() {
            request = request.header(name, value);
        }

        let response = request.body(body).send().await.map_err(|e| self.map_reqwest(e))?;
        let status = response.status();
        let text = response.text().await.map_err(|e| self.map_reqwest(e))?;
        debug!(status = status.as_u16(), len = text.len(), "translate response");

        if !status.is_success() {
            return Err(TranslateError::Status {
                status: status.as_u16(),
                body: text.chars().take(200).collect(),
            });
        }
        Ok(text)
    }

    fn map_reqwest(&self, e: reqwest::Error) -> TranslateError {
        if e.is_timeout() {
            TranslateError::Timeout(self.timeout)
        } else {
            TranslateError::Transport(e.to_string())
        }
    }
}

/// Decode a response body, expecting at least `expected` translations.
pub fn parse_translations(body: &str, expected: usize) -> Result<Vec<String>, TranslateError> {
    let parsed: TranslateResponse = serde_json::from_str(body).map_err(|e| {
        TranslateError::Protocol(format!(
            "{e}; body: {}",
            body.chars().take(200).collect::<String>()
        ))
    })?;

    if parsed.translation_list.len() < expected {
        return Err(TranslateError::Protocol(format!(
            "expected {expected} translations, got {}",
            parsed.translation_list.len()
        )));
    }

    Ok(parsed
        .translation_list
        .into_iter()
        .take(expected)
        .map(|item| item.translation)
        .collect())
}

#[async_trait]
impl Translator for VolcClient {
    async fn translate_batch(
        &self,
        texts: &[String],
        target_lang: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, TranslateError> {
        if cancel.is_cancelled() {
            return Err(TranslateError::Cancelled);
        }
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let body = serde_json::to_string(&TranslateRequest {
            target_language: target_lang,
            text_list: texts,
        })
        .map_err(|e| TranslateError::Protocol(e.to_string()))?;

        let start = Instant::now();
        let result = tokio::select! {
            r = tokio::time::timeout(self.timeout, self.post(body)) => {
                r.unwrap_or(Err(TranslateError::Timeout(self.timeout)))
            }
            _ = cancel.cancelled() => Err(TranslateError::Cancelled),
        };

        match result {
            Ok(raw) => parse_translations(&raw, texts.len()),
            Err(e) => {
                warn!(
                    error = %e,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "translate request failed"
                );
                Err(e)
            }
        }
    }

    fn provider_name(&self) -> &str {
        "Volcengine Translate"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Credential;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn config() -> PipelineConfig {
        let mut config = PipelineConfig::new(Credential::new("AKLTexample", "c2VjcmV0LWtleQ=="));
        config.request_timeout = Duration::from_secs(5);
        config
    }

    /// Accept one connection, capture the raw request, answer with `status` and `body`.
    async fn one_shot_server(
        status: &'static str,
        body: &'static str,
    ) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut raw = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                raw.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&raw);
                if let Some(split) = text.find("\r\n\r\n") {
                    let content_length = text[..split]
                        .lines()
                        .find_map(|l| {
                            let (name, value) = l.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())
                                .flatten()
                        })
                        .unwrap_or(0);
                    if raw.len() >= split + 4 + content_length {
                        break;
                    }
                }
            }
            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            String::from_utf8_lossy(&raw).into_owned()
        });
        (format!("http://{addr}"), handle)
    }

    #[test]
    fn test_parse_first_translation() {
        let out = parse_translations(
            r#"{"TranslationList":[{"Translation":"Hello"},{"Translation":"extra"}]}"#,
            1,
        )
        .unwrap();
        assert_eq!(out, vec!["Hello"]);
    }

    #[test]
    fn test_parse_missing_list_is_protocol_error() {
        let err = parse_translations(r#"{"ResponseMetadata":{}}"#, 1).unwrap_err();
        assert!(matches!(err, TranslateError::Protocol(_)));
    }

    #[test]
    fn test_parse_short_list_is_protocol_error() {
        let err = parse_translations(r#"{"TranslationList":[]}"#, 1).unwrap_err();
        assert!(matches!(err, TranslateError::Protocol(_)));
    }

    #[test]
    fn test_parse_non_json_is_protocol_error() {
        let err = parse_translations("<html>bad gateway</html>", 1).unwrap_err();
        assert!(matches!(err, TranslateError::Protocol(_)));
    }

    #[tokio::test]
    async fn test_signed_post_round_trip() {
        let (base, server) =
            one_shot_server("200 OK", r#"{"TranslationList":[{"Translation":"Hello"}]}"#).await;
        let client = VolcClient::new(&config()).unwrap().with_base_url(base);
        let token = CancellationToken::new();

        let out = client.translate("你好", "en", &token).await.unwrap();
        assert_eq!(out, "Hello");

        let raw = server.await.unwrap();
        let lower = raw.to_ascii_lowercase();
        assert!(raw.starts_with("POST /?Action=TranslateText&Version=2020-06-01 HTTP/1.1"));
        assert!(lower.contains("host: translate.volcengineapi.com"));
        assert!(lower.contains("content-type: application/json"));
        assert!(lower.contains("x-date: "));
        assert!(lower.contains("x-content-sha256: "));
        assert!(raw.contains("HMAC-SHA256 Credential=AKLTexample/"));
        assert!(raw.contains("SignedHeaders=content-type;host;x-content-sha256;x-date"));
        assert!(raw.ends_with(r#"{"TargetLanguage":"en","TextList":["你好"]}"#));
    }

    #[tokio::test]
    async fn test_http_error_status() {
        let (base, server) = one_shot_server("403 Forbidden", r#"{"error":"denied"}"#).await;
        let client = VolcClient::new(&config()).unwrap().with_base_url(base);
        let token = CancellationToken::new();

        let err = client.translate("x", "en", &token).await.unwrap_err();
        assert!(matches!(err, TranslateError::Status { status: 403, .. }));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_unexpected_shape_is_protocol_error() {
        let (base, server) = one_shot_server("200 OK", r#"{"ResponseMetadata":{}}"#).await;
        let client = VolcClient::new(&config()).unwrap().with_base_url(base);
        let token = CancellationToken::new();

        let err = client.translate("x", "en", &token).await.unwrap_err();
        assert!(matches!(err, TranslateError::Protocol(_)));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        // Bind then drop to get a port nobody listens on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = VolcClient::new(&config())
            .unwrap()
            .with_base_url(format!("http://{addr}"));
        let token = CancellationToken::new();
        let err = client.translate("x", "en", &token).await.unwrap_err();
        assert!(matches!(err, TranslateError::Transport(_)));
    }

    #[tokio::test]
    async fn test_deadline_surfaces_timeout() {
        // Accepts but never answers.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
            drop(socket);
        });

        let mut cfg = config();
        cfg.request_timeout = Duration::from_millis(200);
        let client = VolcClient::new(&cfg).unwrap().with_base_url(format!("http://{addr}"));
        let token = CancellationToken::new();
        let err = client.translate("x", "en", &token).await.unwrap_err();
        assert_eq!(err, TranslateError::Timeout(Duration::from_millis(200)));
    }

    #[tokio::test]
    async fn test_cancelled_before_send() {
        let client = VolcClient::new(&config()).unwrap();
        let token = CancellationToken::new();
        token.cancel();
        let err = client.translate("x", "en", &token).await.unwrap_err();
        assert_eq!(err, TranslateError::Cancelled);
    }
}
