//! # Linkward Flow
//!
//! `linkward-flow` orchestrates the server side of the deep-link pipeline: it runs
//! extraction and routing for a request and decides what context to carry to the
//! client. It acts as the bridge between the pure functions in `linkward-core` and
//! the framework-specific adapters.
//!
//! ## Key Components
//!
//! - **[`Linkward`]**: The service holding the validator, router and context carrier.
//! - **[`LinkwardBuilder`]**: A builder for configuring and creating a [`Linkward`] instance.
//! - **[`ContextCarrier`]**: Signed cookie, header and meta-marker codecs.
//! - **[`PipelineOutcome`]**: Everything an adapter needs to apply to the response.

#![warn(missing_docs)]

pub use linkward_core::{
    DeepLinkError, DeepLinkRecord, DeepLinkRouter, DeepLinkSource, RedirectValidator,
    RequestDescriptor, RouteDecision, RouterConfig, SafeRedirect, SameSite,
};

use chrono::{DateTime, Utc};
use tracing::warn;

/// Cookie, header and meta-marker codecs.
pub mod carrier;
/// The page-embedded context marker.
pub mod meta;
/// HMAC signing of carried context.
pub mod signing;

pub use carrier::{CarrierConfig, ContextCarrier, ContextCookie, ContextPayload};
pub use signing::SigningKey;

pub use chrono;

/// Errors that can occur while encoding or decoding carried context.
///
/// Readers recover from every variant by treating the context as absent.
#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    /// The value is not in the expected shape.
    #[error("Malformed context: {0}")]
    Malformed(String),
    /// The signature does not match the payload.
    #[error("Context signature mismatch")]
    BadSignature,
    /// `isDeepLink` disagrees with `source`.
    #[error("Inconsistent deep-link record")]
    Inconsistent,
    /// JSON encoding or decoding failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Marker for a missing component in the typestate pattern.
#[derive(Clone, Default)]
pub struct Missing;

/// Marker for a configured component in the typestate pattern.
#[derive(Clone)]
pub struct Configured<T>(pub T);

/// What the server should do with a request, as decided by [`Linkward::process`].
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    /// The record extracted from this request.
    pub record: DeepLinkRecord,
    /// The router's verdict for this request.
    pub decision: RouteDecision,
    /// The context to expose to the page: this request's record when it is a
    /// deep link, otherwise a fresh record carried in by the cookie.
    pub context: Option<DeepLinkRecord>,
    /// Cookie to set; present only alongside a redirect.
    pub set_cookie: Option<ContextCookie>,
    /// Value of the context header; present whenever `context` is.
    pub header: Option<String>,
}

impl PipelineOutcome {
    /// The redirect location, if the router decided to rewrite.
    pub fn location(&self) -> Option<String> {
        self.decision.location()
    }
}

/// The unified Linkward service.
#[derive(Debug, Clone)]
pub struct Linkward {
    validator: RedirectValidator,
    router: DeepLinkRouter,
    carrier: ContextCarrier,
}

impl Linkward {
    /// Create a new [`LinkwardBuilder`] to configure the service.
    pub fn builder() -> LinkwardBuilder<Missing> {
        LinkwardBuilder::default()
    }

    /// The redirect validator every decision goes through.
    pub fn validator(&self) -> &RedirectValidator {
        &self.validator
    }

    /// The deep-link router.
    pub fn router(&self) -> &DeepLinkRouter {
        &self.router
    }

    /// The context carrier.
    pub fn carrier(&self) -> &ContextCarrier {
        &self.carrier
    }

    /// Run the pipeline for `request`, given the value of the context cookie it carried.
    pub fn process(
        &self,
        request: &(impl RequestDescriptor + ?Sized),
        context_cookie: Option<&str>,
    ) -> PipelineOutcome {
        self.process_at(request, context_cookie, Utc::now())
    }

    /// Run the pipeline as of `now`.
    pub fn process_at(
        &self,
        request: &(impl RequestDescriptor + ?Sized),
        context_cookie: Option<&str>,
        now: DateTime<Utc>,
    ) -> PipelineOutcome {
        let record = linkward_core::extract_at(request, now);
        let decision = self.router.route(&record, request);

        let context = if record.is_deep_link() {
            Some(record.clone())
        } else {
            context_cookie.and_then(|value| self.carrier.read_cookie(value, now))
        };

        let set_cookie = if decision.should_redirect {
            self.carrier
                .cookie_for(&record)
                .map_err(|e| warn!(error = %e, "failed to encode deep-link cookie"))
                .ok()
        } else {
            None
        };

        let header = context.as_ref().and_then(|ctx| {
            self.carrier
                .header_value(ctx)
                .map_err(|e| warn!(error = %e, "failed to encode deep-link header"))
                .ok()
        });

        PipelineOutcome {
            record,
            decision,
            context,
            set_cookie,
            header,
        }
    }

    /// Pick the post-auth destination for an inbound `redirect` parameter.
    ///
    /// Falls back to `default`, and to the site root if `default` itself is
    /// not a valid target.
    pub fn resolve_redirect_param(&self, raw: Option<&str>, default: &str) -> SafeRedirect {
        raw.and_then(|candidate| self.validator.check(candidate).ok())
            .or_else(|| self.validator.check(default).ok())
            .unwrap_or_else(|| self.validator.root())
    }
}

/// A builder for configuring and creating a [`Linkward`] instance.
///
/// The site origin is required; `build` only exists once it is set.
pub struct LinkwardBuilder<V> {
    validator: V,
    router_config: RouterConfig,
    carrier_config: CarrierConfig,
}

impl Default for LinkwardBuilder<Missing> {
    fn default() -> Self {
        Self {
            validator: Missing,
            router_config: RouterConfig::default(),
            carrier_config: CarrierConfig::default(),
        }
    }
}

impl<V> LinkwardBuilder<V> {
    /// Set the origin all redirects must stay within.
    pub fn site_origin(
        self,
        origin: &str,
    ) -> Result<LinkwardBuilder<Configured<RedirectValidator>>, DeepLinkError> {
        Ok(self.validator(RedirectValidator::new(origin)?))
    }

    /// Use an existing validator.
    pub fn validator(
        self,
        validator: RedirectValidator,
    ) -> LinkwardBuilder<Configured<RedirectValidator>> {
        LinkwardBuilder {
            validator: Configured(validator),
            router_config: self.router_config,
            carrier_config: self.carrier_config,
        }
    }

    /// Set the router configuration.
    pub fn router_config(mut self, config: RouterConfig) -> Self {
        self.router_config = config;
        self
    }

    /// Set the carrier configuration.
    pub fn carrier_config(mut self, config: CarrierConfig) -> Self {
        self.carrier_config = config;
        self
    }
}

impl LinkwardBuilder<Configured<RedirectValidator>> {
    /// Build the [`Linkward`] instance.
    pub fn build(self) -> Linkward {
        let validator = self.validator.0;
        Linkward {
            router: DeepLinkRouter::new(self.router_config, validator.clone()),
            carrier: ContextCarrier::new(self.carrier_config),
            validator,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linkward() -> Linkward {
        Linkward::builder()
            .site_origin("https://app.example.com")
            .unwrap()
            .build()
    }

    fn request(uri: &str) -> http::Request<()> {
        http::Request::builder().uri(uri).body(()).unwrap()
    }

    fn at(millis: i64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp_millis(millis).unwrap()
    }

    const NOW: i64 = 1_700_000_000_000;

    #[test]
    fn test_invite_redirects_with_cookie_and_header() {
        let invite = request("/?invite=TOKEN123&utm_source=newsletter");
        let outcome = linkward().process_at(&invite, None, at(NOW));

        assert_eq!(
            outcome.location().as_deref(),
            Some("/invite/TOKEN123?invite=TOKEN123&utm_source=newsletter")
        );
        let cookie = outcome.set_cookie.expect("cookie");
        assert_eq!(cookie.name, "deep-link-context");
        assert!(outcome.header.is_some());
        assert_eq!(outcome.context, Some(outcome.record));
    }

    #[test]
    fn test_attribution_only_sets_header_without_cookie() {
        let outcome = linkward().process_at(&request("/?utm_source=newsletter"), None, at(NOW));
        assert!(!outcome.decision.should_redirect);
        assert!(outcome.set_cookie.is_none());
        let header = outcome.header.expect("header");
        let payload = ContextPayload::from_header_value(&header).unwrap();
        assert_eq!(payload.source, DeepLinkSource::Utm);
    }

    #[test]
    fn test_plain_request_has_no_context() {
        let outcome = linkward().process_at(&request("/pricing"), None, at(NOW));
        assert!(outcome.context.is_none());
        assert!(outcome.header.is_none());
        assert!(outcome.set_cookie.is_none());
    }

    #[test]
    fn test_cookie_context_survives_navigation() {
        let linkward = linkward();
        let first = linkward.process_at(&request("/?share=cup-7"), None, at(NOW));
        let cookie = first.set_cookie.expect("cookie");

        let login = linkward.process_at(&request("/login"), Some(&cookie.value), at(NOW + 60_000));
        let context = login.context.expect("carried context");
        assert_eq!(context.source(), DeepLinkSource::Share);
        assert_eq!(context.param("share"), Some("cup-7"));
        assert!(login.header.is_some());
        assert!(login.set_cookie.is_none());

        let late = linkward.process_at(&request("/login"), Some(&cookie.value), at(NOW + 300_001));
        assert!(late.context.is_none());
        assert!(late.header.is_none());
    }

    #[test]
    fn test_redirect_target_does_not_loop() {
        let linkward = linkward();
        let first = linkward.process_at(&request("/?competition=spring"), None, at(NOW));
        let location = first.location().expect("location");

        let second = linkward.process_at(&request(&location), None, at(NOW + 10));
        assert!(!second.decision.should_redirect);
        assert!(second.set_cookie.is_none());
        assert!(second.header.is_some());
    }

    #[test]
    fn test_resolve_redirect_param() {
        let linkward = linkward();
        assert_eq!(
            linkward.resolve_redirect_param(Some("/checkout"), "/home").relative(),
            "/checkout"
        );
        assert_eq!(
            linkward
                .resolve_redirect_param(Some("https://evil.example/"), "/home")
                .relative(),
            "/home"
        );
        assert_eq!(
            linkward
                .resolve_redirect_param(Some("//evil.example"), "javascript:alert(1)")
                .relative(),
            "/"
        );
        assert_eq!(linkward.resolve_redirect_param(None, "/home").relative(), "/home");
    }

    #[test]
    fn test_builder_rejects_bad_origin() {
        assert!(Linkward::builder().site_origin("javascript:alert(1)").is_err());
    }
}
