//! HMAC-SHA256 request signing for the translation API.
//! Canonical request → string-to-sign → date/region/service/request key chain.
//! The remote side recomputes the same bytes, so every separator matters.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use parking_lot::Mutex;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use sha2::{Digest, Sha256};

use crate::config::Credential;

type HmacSha256 = Hmac<Sha256>;

pub const ALGORITHM: &str = "HMAC-SHA256";
pub const SIGNED_HEADERS: &str = "content-type;host;x-content-sha256;x-date";
pub const API_VERSION: &str = "2020-06-01";
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// Everything outside `A-Za-z0-9-_.~` gets percent-encoded (space → `%20`).
const UNRESERVED: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// One request to be signed. `Action` and `Version` are added by the signer.
#[derive(Debug, Clone)]
pub struct SignRequest<'a> {
    pub method: &'a str,
    pub host: &'a str,
    pub path: &'a str,
    pub action: &'a str,
    /// Extra query parameters; a key may repeat.
    pub query: Vec<(String, String)>,
    pub content_type: &'a str,
    pub body: &'a str,
    pub timestamp: DateTime<Utc>,
}

/// Headers to attach to the outbound request, plus the exact query string
/// that was signed (the URL must carry it byte-for-byte).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedHeaders {
    pub host: String,
    pub content_type: String,
    pub x_date: String,
    pub x_content_sha256: String,
    pub authorization: String,
    pub query: String,
}

impl SignedHeaders {
    pub fn as_pairs(&self) -> [(&'static str, &str); 5] {
        [
            ("Host", self.host.as_str()),
            ("Content-Type", self.content_type.as_str()),
            ("X-Date", self.x_date.as_str()),
            ("X-Content-Sha256", self.x_content_sha256.as_str()),
            ("Authorization", self.authorization.as_str()),
        ]
    }
}

pub fn percent_encode(s: &str) -> String {
    utf8_percent_encode(s, UNRESERVED).to_string()
}

/// Encode, sort by encoded key, join with `&`. Sorting is stable, so values of
/// a repeated key keep their order.
pub fn normalize_query(params: &[(String, String)]) -> String {
    let mut encoded: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| (percent_encode(k), percent_encode(v)))
        .collect();
    encoded.sort_by(|a, b| a.0.cmp(&b.0));
    encoded
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

pub fn sha256_hex(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

pub fn format_x_date(timestamp: &DateTime<Utc>) -> String {
    timestamp.format("%Y%m%dT%H%M%SZ").to_string()
}

fn hmac_sha256(key: &[u8], content: &str) -> [u8; 32] {
    // HMAC accepts keys of any length; this cannot fail.
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC-SHA256 accepts any key length");
    mac.update(content.as_bytes());
    mac.finalize().into_bytes().into()
}

/// Derive kDate → kRegion → kService → kSigning.
pub fn derive_signing_key(secret: &str, date: &str, region: &str, service: &str) -> [u8; 32] {
    let k_date = hmac_sha256(secret.as_bytes(), date);
    let k_region = hmac_sha256(&k_date, region);
    let k_service = hmac_sha256(&k_region, service);
    hmac_sha256(&k_service, "request")
}

/// Intermediate strings of one signature, kept around for tests and tracing.
#[derive(Debug, Clone)]
pub struct Canonical {
    pub query: String,
    pub x_date: String,
    pub x_content_sha256: String,
    pub canonical_request: String,
    pub credential_scope: String,
    pub string_to_sign: String,
}

pub fn build_canonical(req: &SignRequest<'_>, credential: &Credential) -> Canonical {
    let mut params = Vec::with_capacity(req.query.len() + 2);
    params.push(("Action".to_string(), req.action.to_string()));
    params.push(("Version".to_string(), API_VERSION.to_string()));
    params.extend(req.query.iter().cloned());
    let query = normalize_query(&params);

    let x_date = format_x_date(&req.timestamp);
    let x_content_sha256 = sha256_hex(req.body);

    let header_block = [
        format!("content-type:{}", req.content_type),
        format!("host:{}", req.host),
        format!("x-content-sha256:{x_content_sha256}"),
        format!("x-date:{x_date}"),
    ]
    .join("\n");

    let canonical_request = [
        req.method.to_uppercase().as_str(),
        req.path,
        query.as_str(),
        header_block.as_str(),
        "",
        SIGNED_HEADERS,
        x_content_sha256.as_str(),
    ]
    .join("\n");

    let credential_scope = format!(
        "{}/{}/{}/request",
        &x_date[..8],
        credential.region,
        credential.service
    );
    let string_to_sign = [
        ALGORITHM,
        x_date.as_str(),
        credential_scope.as_str(),
        sha256_hex(&canonical_request).as_str(),
    ]
    .join("\n");

    Canonical {
        query,
        x_date,
        x_content_sha256,
        canonical_request,
        credential_scope,
        string_to_sign,
    }
}

/// Signs requests for one credential.
///
/// The derived signing key only depends on the date, so it is cached per day
/// and rebuilt when the date in the timestamp changes.
pub struct Signer {
    credential: Credential,
    day_key: Mutex<Option<(String, [u8; 32])>>,
}

impl Signer {
    pub fn new(credential: Credential) -> Self {
        Self {
            credential,
            day_key: Mutex::new(None),
        }
    }

    fn signing_key(&self, date: &str) -> [u8; 32] {
        let mut cached = self.day_key.lock();
        if let Some((day, key)) = cached.as_ref() {
            if day == date {
                return *key;
            }
        }
        let key = derive_signing_key(
            &self.credential.secret_access_key,
            date,
            &self.credential.region,
            &self.credential.service,
        );
        *cached = Some((date.to_string(), key));
        key
    }

    pub fn sign(&self, req: &SignRequest<'_>) -> SignedHeaders {
        let canonical = build_canonical(req, &self.credential);
        let key = self.signing_key(&canonical.x_date[..8]);
        let signature = hex::encode(hmac_sha256(&key, &canonical.string_to_sign));

        let authorization = format!(
            "{ALGORITHM} Credential={}/{}, SignedHeaders={SIGNED_HEADERS}, Signature={signature}",
            self.credential.access_key_id, canonical.credential_scope,
        );

        SignedHeaders {
            host: req.host.to_string(),
            content_type: req.content_type.to_string(),
            x_date: canonical.x_date,
            x_content_sha256: canonical.x_content_sha256,
            authorization,
            query: canonical.query,
        }
    }
}
