//! # Linkward
//!
//! Deep-link attribution and safe redirect routing. Captures campaign, invite,
//! share and referral markers from inbound URLs, routes users to the right
//! landing page, carries the context across the authentication boundary and
//! never navigates anywhere outside the site origin.
//!
//! This crate re-exports the workspace crates behind features:
//!
//! - `flow` (default): the server pipeline, [`Linkward`].
//! - `client`: the browser-side store and post-auth resolver.
//! - `axum`: the axum middleware and extractors.

pub use linkward_core::{
    extract, extract_at, DeepLinkError, DeepLinkRecord, DeepLinkRouter, DeepLinkSource,
    RedirectValidation, RedirectValidator, RejectReason, RequestDescriptor, RouteDecision,
    RouterConfig, SafeRedirect, SameSite,
};

#[cfg(feature = "flow")]
pub use linkward_flow as flow;
#[cfg(feature = "flow")]
pub use linkward_flow::{CarrierConfig, ContextCarrier, Linkward, LinkwardBuilder, PipelineOutcome};

#[cfg(feature = "client")]
pub use linkward_client as client;

#[cfg(feature = "axum")]
pub use linkward_axum as axum;
