use crate::record::{DeepLinkRecord, RouteDecision};
use crate::request::RequestDescriptor;
use crate::validator::RedirectValidator;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Where invite and competition deep links land.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Landing prefix for `invite` links; the token becomes the next segment.
    pub invite_path: String,
    /// Landing prefix for `competition` and `share` links.
    pub competition_path: String,
    /// Request paths starting with any of these are never rewritten.
    pub excluded_prefixes: Vec<String>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            invite_path: "/invite".to_string(),
            competition_path: "/competitions".to_string(),
            excluded_prefixes: vec![
                "/api/".to_string(),
                "/static/".to_string(),
                "/assets/".to_string(),
                "/favicon.ico".to_string(),
            ],
        }
    }
}

/// Decides whether a deep link rewrites the request route.
#[derive(Debug, Clone)]
pub struct DeepLinkRouter {
    config: RouterConfig,
    validator: RedirectValidator,
}

impl DeepLinkRouter {
    /// Create a router whose rewrites are checked by `validator`.
    pub fn new(config: RouterConfig, validator: RedirectValidator) -> Self {
        Self { config, validator }
    }

    /// The router configuration.
    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Route `record`, extracted from `request`.
    ///
    /// Only invite, share and competition links rewrite; everything else is
    /// attribution-only. A request already at its canonical path is a no-op,
    /// so routing the rewritten URL again never redirects.
    pub fn route(
        &self,
        record: &DeepLinkRecord,
        request: &(impl RequestDescriptor + ?Sized),
    ) -> RouteDecision {
        let Some(key) = record.source().routing_key() else {
            return RouteDecision::noop();
        };
        let Some(value) = record.param(key) else {
            return RouteDecision::noop();
        };

        let current = request.path();
        if self
            .config
            .excluded_prefixes
            .iter()
            .any(|prefix| current.starts_with(prefix.as_str()))
        {
            debug!(path = %current, "deep link on excluded path, not routing");
            return RouteDecision::noop();
        }

        let prefix = match key {
            "invite" => &self.config.invite_path,
            _ => &self.config.competition_path,
        };
        let path = format!(
            "{}/{}",
            prefix.trim_end_matches('/'),
            urlencoding::encode(value)
        );
        if current == path {
            return RouteDecision::noop();
        }

        let decision = RouteDecision::redirect(path, record.params().clone());
        let Some(location) = decision.location() else {
            return RouteDecision::noop();
        };
        let Ok(target) = self.validator.check(&location) else {
            return RouteDecision::noop();
        };
        // A browser lands on the normalized path; if that differs from what was
        // built (dot segments), the landing page would route again forever.
        if decision.path.as_deref() != Some(target.as_url().path()) {
            debug!(value = %value, "deep-link value is not a stable path segment, not routing");
            return RouteDecision::noop();
        }
        decision
    }
}
