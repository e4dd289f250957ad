//! Pipeline configuration loaded once from the process environment.
//! Credentials are mandatory; everything else has a default.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

pub const ACCESS_KEY_VAR: &str = "VOLC_ACCESS_KEY";
pub const SECRET_KEY_VAR: &str = "VOLC_SECRET_KEY";

pub const DEFAULT_HOST: &str = "translate.volcengineapi.com";
pub const DEFAULT_REGION: &str = "cn-north-1";
pub const DEFAULT_SERVICE: &str = "translate";
pub const DEFAULT_TARGET_LANG: &str = "en";
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("environment variable {0} is not set")]
    MissingVar(&'static str),
    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// Access key pair plus the region/service the signature is scoped to.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub service: String,
    pub region: String,
}

impl Credential {
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            service: DEFAULT_SERVICE.to_string(),
            region: DEFAULT_REGION.to_string(),
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }
}

// Secret stays out of logs and panic messages.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("service", &self.service)
            .field("region", &self.region)
            .finish()
    }
}

/// Everything one pipeline run needs besides the document itself.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub credential: Credential,
    pub host: String,
    pub target_lang: String,
    /// Deadline for a single translation round trip.
    pub request_timeout: Duration,
    /// Optional bound on the whole run.
    pub run_timeout: Option<Duration>,
}

impl PipelineConfig {
    pub fn new(credential: Credential) -> Self {
        Self {
            credential,
            host: DEFAULT_HOST.to_string(),
            target_lang: DEFAULT_TARGET_LANG.to_string(),
            request_timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            run_timeout: None,
        }
    }

    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as `from_env`, but reads variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |var: &'static str| -> Result<String, ConfigError> {
            lookup(var)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::MissingVar(var))
        };

        let access_key_id = required(ACCESS_KEY_VAR)?;
        let secret_access_key = required(SECRET_KEY_VAR)?;

        let mut credential = Credential::new(access_key_id, secret_access_key);
        if let Some(region) = lookup("INTERLEAF_REGION").filter(|v| !v.is_empty()) {
            credential = credential.with_region(region);
        }

        let mut config = Self::new(credential);
        if let Some(host) = lookup("INTERLEAF_HOST").filter(|v| !v.is_empty()) {
            config.host = host;
        }
        if let Some(lang) = lookup("INTERLEAF_TARGET_LANG").filter(|v| !v.is_empty()) {
            config.target_lang = lang;
        }
        if let Some(raw) = lookup("INTERLEAF_TIMEOUT_MS") {
            let ms = parse_positive("INTERLEAF_TIMEOUT_MS", &raw)?;
            config.request_timeout = Duration::from_millis(ms);
        }
        if let Some(raw) = lookup("INTERLEAF_RUN_TIMEOUT_SECS") {
            let secs = parse_positive("INTERLEAF_RUN_TIMEOUT_SECS", &raw)?;
            config.run_timeout = Some(Duration::from_secs(secs));
        }

        Ok(config)
    }
}

fn parse_positive(var: &'static str, raw: &str) -> Result<u64, ConfigError> {
    match raw.trim().parse::<u64>() {
        Ok(0) => Err(ConfigError::Invalid {
            var,
            reason: "must be greater than zero".into(),
        }),
        Ok(v) => Ok(v),
        Err(e) => Err(ConfigError::Invalid {
            var,
            reason: e.to_string(),
        }),
    }
}
