use crate::meta;
use crate::signing::SigningKey;
use crate::ContextError;
use chrono::{DateTime, Utc};
use linkward_core::{DeepLinkRecord, DeepLinkSource, SameSite};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Configuration for the deep-link context cookie, header and page marker.
#[derive(Debug, Clone)]
pub struct CarrierConfig {
    /// Name of the cookie carrying context across a navigation.
    pub cookie_name: String,
    /// Name of the response header mirroring the context.
    pub header_name: String,
    /// `name` attribute of the page meta marker.
    pub meta_name: String,
    /// Lifetime of carried context. Older records are treated as absent.
    pub max_age: chrono::Duration,
    /// Cookie path.
    pub path: String,
    /// Whether the cookie should only be sent over HTTPS.
    pub secure: bool,
    /// Whether the cookie is hidden from scripts.
    pub http_only: bool,
    /// Cross-site policy of the cookie.
    pub same_site: SameSite,
    /// Key the cookie is signed with.
    pub signing_key: SigningKey,
}

impl Default for CarrierConfig {
    fn default() -> Self {
        Self {
            cookie_name: "deep-link-context".to_string(),
            header_name: "X-Deep-Link-Context".to_string(),
            meta_name: "deep-link-context".to_string(),
            max_age: chrono::Duration::seconds(300),
            path: "/".to_string(),
            secure: true,
            http_only: true,
            same_site: SameSite::Lax,
            signing_key: SigningKey::generate(),
        }
    }
}

/// A framework-neutral description of a cookie to set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextCookie {
    /// Cookie name.
    pub name: String,
    /// Cookie value; empty when clearing.
    pub value: String,
    /// Cookie path.
    pub path: String,
    /// `Max-Age`; zero when clearing.
    pub max_age: chrono::Duration,
    /// `Secure` attribute.
    pub secure: bool,
    /// `HttpOnly` attribute.
    pub http_only: bool,
    /// `SameSite` attribute.
    pub same_site: SameSite,
}

/// The non-sensitive part of a record, as mirrored into the header and meta marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextPayload {
    /// See [`DeepLinkRecord::source`].
    pub source: DeepLinkSource,
    /// See [`DeepLinkRecord::params`].
    pub params: BTreeMap<String, String>,
    /// See [`DeepLinkRecord::timestamp`].
    pub timestamp: i64,
}

impl From<&DeepLinkRecord> for ContextPayload {
    fn from(record: &DeepLinkRecord) -> Self {
        Self {
            source: record.source(),
            params: record.params().clone(),
            timestamp: record.timestamp(),
        }
    }
}

impl ContextPayload {
    /// Rebuild a fresh, unprocessed record from the payload.
    pub fn into_record(self) -> DeepLinkRecord {
        DeepLinkRecord::new(self.source, self.params, self.timestamp)
    }

    /// Serialize to JSON restricted to visible ASCII, so it is a legal header value.
    pub fn to_header_value(&self) -> Result<String, ContextError> {
        let json = serde_json::to_string(self)?;
        Ok(escape_non_ascii(&json))
    }

    /// Parse a header value or meta marker content.
    pub fn from_header_value(value: &str) -> Result<Self, ContextError> {
        Ok(serde_json::from_str(value)?)
    }
}

fn escape_non_ascii(json: &str) -> String {
    let mut out = String::with_capacity(json.len());
    for c in json.chars() {
        if c.is_ascii() && c != '\u{7f}' {
            out.push(c);
            continue;
        }
        let mut units = [0u16; 2];
        for unit in c.encode_utf16(&mut units) {
            out.push_str(&format!("\\u{unit:04x}"));
        }
    }
    out
}

/// Ships deep-link records across the unauthenticated to authenticated boundary.
///
/// The signed cookie is the only channel that survives a full navigation; the
/// header and meta marker serve the same response. Nothing read back from any
/// of them is trusted as a redirect target without validation.
#[derive(Debug, Clone, Default)]
pub struct ContextCarrier {
    config: CarrierConfig,
}

impl ContextCarrier {
    /// Create a carrier with the given configuration.
    pub fn new(config: CarrierConfig) -> Self {
        Self { config }
    }

    /// The carrier configuration.
    pub fn config(&self) -> &CarrierConfig {
        &self.config
    }

    /// Encode the full record as a signed cookie value.
    pub fn encode_cookie_value(&self, record: &DeepLinkRecord) -> Result<String, ContextError> {
        let json = serde_json::to_vec(record)?;
        self.config.signing_key.sign(&json)
    }

    /// Decode a signed cookie value without checking its age.
    pub fn decode_cookie_value(&self, value: &str) -> Result<DeepLinkRecord, ContextError> {
        let json = self.config.signing_key.verify(value)?;
        let record: DeepLinkRecord = serde_json::from_slice(&json)?;
        if !record.is_consistent() {
            return Err(ContextError::Inconsistent);
        }
        Ok(record)
    }

    /// Read a cookie-carried record, treating stale or unreadable values as absent.
    pub fn read_cookie(&self, value: &str, now: DateTime<Utc>) -> Option<DeepLinkRecord> {
        let record = match self.decode_cookie_value(value) {
            Ok(record) => record,
            Err(ContextError::BadSignature) => {
                warn!(cookie = %self.config.cookie_name, "deep-link cookie signature mismatch");
                return None;
            }
            Err(e) => {
                debug!(
                    cookie = %self.config.cookie_name,
                    error = %e,
                    "ignoring unreadable deep-link cookie"
                );
                return None;
            }
        };
        if !record.is_fresh(self.config.max_age, now) {
            debug!(timestamp = record.timestamp(), "ignoring stale deep-link cookie");
            return None;
        }
        Some(record)
    }

    /// The cookie that carries `record` into the next navigation.
    pub fn cookie_for(&self, record: &DeepLinkRecord) -> Result<ContextCookie, ContextError> {
        Ok(ContextCookie {
            name: self.config.cookie_name.clone(),
            value: self.encode_cookie_value(record)?,
            path: self.config.path.clone(),
            max_age: self.config.max_age,
            secure: self.config.secure,
            http_only: self.config.http_only,
            same_site: self.config.same_site,
        })
    }

    /// A cookie that removes any carried context.
    pub fn expired_cookie(&self) -> ContextCookie {
        ContextCookie {
            name: self.config.cookie_name.clone(),
            value: String::new(),
            path: self.config.path.clone(),
            max_age: chrono::Duration::zero(),
            secure: self.config.secure,
            http_only: self.config.http_only,
            same_site: self.config.same_site,
        }
    }

    /// The header value mirroring `record`.
    pub fn header_value(&self, record: &DeepLinkRecord) -> Result<String, ContextError> {
        ContextPayload::from(record).to_header_value()
    }

    /// Read a header value or meta marker, treating stale or unreadable values as absent.
    pub fn read_header(&self, value: &str, now: DateTime<Utc>) -> Option<DeepLinkRecord> {
        let record = match ContextPayload::from_header_value(value) {
            Ok(payload) => payload.into_record(),
            Err(e) => {
                debug!(error = %e, "ignoring unreadable deep-link context");
                return None;
            }
        };
        if !record.is_fresh(self.config.max_age, now) {
            debug!(timestamp = record.timestamp(), "ignoring stale deep-link context");
            return None;
        }
        Some(record)
    }

    /// The page meta marker embedding `record`.
    pub fn meta_tag(&self, record: &DeepLinkRecord) -> Result<String, ContextError> {
        let content = self.header_value(record)?;
        Ok(meta::render_meta_tag(&self.config.meta_name, &content))
    }
}
