//! # Linkward Axum
//!
//! Axum integration for `linkward`: a middleware running the deep-link pipeline
//! in front of every route, and extractors for the carried context and the
//! validated post-auth redirect.
//!
//! ```ignore
//! let linkward = Arc::new(Linkward::builder().site_origin("https://app.example.com")?.build());
//! let app = Router::new()
//!     .route("/login", get(login))
//!     .with_deep_links(linkward.clone())
//!     .with_state(LinkwardState::from(linkward));
//! ```

pub use linkward_flow::{Linkward, PipelineOutcome};
use axum::extract::{FromRef, FromRequestParts};
use linkward_core::extractor::parse_query;
use linkward_core::{DeepLinkRecord, SafeRedirect};
use std::convert::Infallible;
use std::sync::Arc;

pub mod helpers;

pub use helpers::*;

/// Application state holding a shared [`Linkward`] service.
#[derive(Clone)]
pub struct LinkwardState {
    /// The service the middleware and extractors run against.
    pub linkward: Arc<Linkward>,
}

impl From<Arc<Linkward>> for LinkwardState {
    fn from(linkward: Arc<Linkward>) -> Self {
        Self { linkward }
    }
}

impl From<Linkward> for LinkwardState {
    fn from(linkward: Linkward) -> Self {
        Arc::new(linkward).into()
    }
}

impl FromRef<LinkwardState> for Arc<Linkward> {
    fn from_ref(state: &LinkwardState) -> Self {
        state.linkward.clone()
    }
}

/// The deep-link context of the current request.
///
/// Either the record extracted from this request, or a fresh one carried in by
/// the context cookie. `None` without [`LinkwardAxumExt::with_deep_links`].
pub struct DeepLinkContext(pub Option<DeepLinkRecord>);

impl<S> FromRequestParts<S> for DeepLinkContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        let context = parts
            .extensions
            .get::<helpers::CarriedContext>()
            .and_then(|carried| carried.0.clone());
        Ok(DeepLinkContext(context))
    }
}

/// The validated `redirect` query parameter, or `/` when it is missing or rejected.
pub struct PostAuthRedirect(pub SafeRedirect);

impl<S> FromRequestParts<S> for PostAuthRedirect
where
    S: Send + Sync,
    Arc<Linkward>: FromRef<S>,
{
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        state: &S,
    ) -> Result<Self, Self::Rejection> {
        let linkward = Arc::<Linkward>::from_ref(state);
        let raw = parts.uri.query().and_then(|query| {
            parse_query(query)
                .into_iter()
                .find(|(key, _)| key == "redirect")
                .map(|(_, value)| value)
        });
        Ok(PostAuthRedirect(
            linkward.resolve_redirect_param(raw.as_deref(), "/"),
        ))
    }
}

/// Extension methods wiring `linkward` into an [`axum::Router`].
pub trait LinkwardAxumExt {
    /// Run the deep-link pipeline in front of every route of this router.
    fn with_deep_links(self, linkward: Arc<Linkward>) -> Self;
}

impl<S> LinkwardAxumExt for axum::Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_deep_links(self, linkward: Arc<Linkward>) -> Self {
        self.layer(axum::middleware::from_fn_with_state(
            linkward,
            helpers::deep_link_middleware,
        ))
        .layer(tower_cookies::CookieManagerLayer::new())
    }
}
