use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Query parameters that mark an inbound request as a deep link.
///
/// Only these keys are ever copied into [`DeepLinkRecord::params`].
pub const MARKER_KEYS: [&str; 6] = [
    "utm_source",
    "utm_campaign",
    "invite",
    "share",
    "competition",
    "ref",
];

/// The signal that classified a request as a deep link.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeepLinkSource {
    /// Marketing campaign (`utm_source` / `utm_campaign`).
    Utm,
    /// Invitation token (`invite`).
    Invite,
    /// Shared competition link (`share`).
    Share,
    /// Direct competition link (`competition`).
    Competition,
    /// Referral attribution (`ref`).
    Referral,
    /// No marker present.
    #[default]
    None,
}

impl DeepLinkSource {
    /// Signals in the order they are checked, each paired with the query keys that raise it.
    pub const PRIORITY: [(DeepLinkSource, &'static [&'static str]); 5] = [
        (DeepLinkSource::Invite, &["invite"]),
        (DeepLinkSource::Share, &["share"]),
        (DeepLinkSource::Competition, &["competition"]),
        (DeepLinkSource::Referral, &["ref"]),
        (DeepLinkSource::Utm, &["utm_source", "utm_campaign"]),
    ];

    /// The wire name of this source.
    pub fn as_str(&self) -> &'static str {
        match self {
            DeepLinkSource::Utm => "utm",
            DeepLinkSource::Invite => "invite",
            DeepLinkSource::Share => "share",
            DeepLinkSource::Competition => "competition",
            DeepLinkSource::Referral => "referral",
            DeepLinkSource::None => "none",
        }
    }

    /// The query key whose value drives a route rewrite.
    ///
    /// Attribution-only sources (`utm`, `referral`) return `None`.
    pub fn routing_key(&self) -> Option<&'static str> {
        match self {
            DeepLinkSource::Invite => Some("invite"),
            DeepLinkSource::Share => Some("share"),
            DeepLinkSource::Competition => Some("competition"),
            _ => None,
        }
    }
}

impl fmt::Display for DeepLinkSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The canonical description of a deep link, captured once per request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeepLinkRecord {
    source: DeepLinkSource,
    params: BTreeMap<String, String>,
    timestamp: i64,
    is_deep_link: bool,
    processed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    referrer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    user_agent: Option<String>,
}

impl DeepLinkRecord {
    /// Create a record captured at `timestamp` (milliseconds since the epoch).
    pub fn new(source: DeepLinkSource, params: BTreeMap<String, String>, timestamp: i64) -> Self {
        Self {
            source,
            params,
            timestamp,
            is_deep_link: source != DeepLinkSource::None,
            processed: false,
            referrer: None,
            user_agent: None,
        }
    }

    /// Attach the client details seen on the originating request.
    pub fn with_client_info(
        mut self,
        referrer: Option<String>,
        user_agent: Option<String>,
    ) -> Self {
        self.referrer = referrer;
        self.user_agent = user_agent;
        self
    }

    /// The signal that classified this record.
    pub fn source(&self) -> DeepLinkSource {
        self.source
    }

    /// Every allow-listed marker present on the request.
    pub fn params(&self) -> &BTreeMap<String, String> {
        &self.params
    }

    /// Look up a single marker value.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Capture instant in milliseconds since the epoch.
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Whether any marker was present.
    pub fn is_deep_link(&self) -> bool {
        self.is_deep_link
    }

    /// Whether the post-auth redirect for this record was executed or abandoned.
    pub fn processed(&self) -> bool {
        self.processed
    }

    /// The `Referer` header of the originating request.
    pub fn referrer(&self) -> Option<&str> {
        self.referrer.as_deref()
    }

    /// The `User-Agent` header of the originating request.
    pub fn user_agent(&self) -> Option<&str> {
        self.user_agent.as_deref()
    }

    /// Flag the record as consumed. There is no way back.
    pub fn mark_processed(&mut self) {
        self.processed = true;
    }

    /// `is_deep_link` must agree with `source`; a record read back from the
    /// wire that breaks this is discarded.
    pub fn is_consistent(&self) -> bool {
        self.is_deep_link == (self.source != DeepLinkSource::None)
    }

    /// Whether the record is still within `ttl` of its capture instant.
    pub fn is_fresh(&self, ttl: chrono::Duration, now: DateTime<Utc>) -> bool {
        now.timestamp_millis()
            .checked_sub(self.timestamp)
            .is_some_and(|age| age <= ttl.num_milliseconds())
    }
}

/// The router's verdict for a single request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteDecision {
    /// Whether the request should be rewritten.
    pub should_redirect: bool,
    /// Target pathname, present only when `should_redirect` is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Query parameters to attach to the rewritten URL.
    pub search_params: BTreeMap<String, String>,
}

impl RouteDecision {
    /// The router decided not to rewrite.
    pub fn noop() -> Self {
        Self::default()
    }

    /// Rewrite to `path`, carrying `search_params`.
    pub fn redirect(path: impl Into<String>, search_params: BTreeMap<String, String>) -> Self {
        Self {
            should_redirect: true,
            path: Some(path.into()),
            search_params,
        }
    }

    /// The origin-relative URL to redirect to, if any.
    pub fn location(&self) -> Option<String> {
        if !self.should_redirect {
            return None;
        }
        let path = self.path.as_deref()?;
        if self.search_params.is_empty() {
            return Some(path.to_string());
        }
        let query = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.search_params.iter())
            .finish();
        Some(format!("{path}?{query}"))
    }
}
