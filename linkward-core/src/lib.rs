//! # Linkward Core
//!
//! `linkward-core` provides the foundational types and pure decision functions of the
//! Linkward deep-link pipeline. Everything in this crate is synchronous and free of
//! shared state: each function works only on the inputs it is handed.
//!
//! ## Key Components
//!
//! - **[`RedirectValidator`]**: The single choke point every redirect target passes through.
//! - **[`extract`]**: Turns a request into a canonical [`DeepLinkRecord`].
//! - **[`DeepLinkRouter`]**: Decides whether a deep link rewrites the request route.
//! - **[`RequestDescriptor`]**: The capability set ("has URL", "has headers") both the
//!   server and the browser environment implement.

#![warn(missing_docs)]

use serde::{Deserialize, Serialize};

/// Errors that can occur while handling deep-link context.
pub mod error;
pub use crate::error::DeepLinkError;

/// The deep-link record and routing decision types.
pub mod record;
pub use crate::record::{DeepLinkRecord, DeepLinkSource, RouteDecision, MARKER_KEYS};

/// Request descriptors for the environments deep links are read from.
pub mod request;
pub use crate::request::RequestDescriptor;

/// Open-redirect protection.
pub mod validator;
pub use crate::validator::{RedirectValidation, RedirectValidator, RejectReason, SafeRedirect};

/// Query-string extraction of deep-link markers.
pub mod extractor;
pub use crate::extractor::{extract, extract_at};

/// Route rewrites for invite and competition links.
pub mod router;
pub use crate::router::{DeepLinkRouter, RouterConfig};

pub use chrono;

/// Controls whether a cookie is sent with cross-site requests.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SameSite {
    /// The cookie is sent with "safe" cross-site requests (e.g., following a link).
    Lax,
    /// The cookie is only sent for same-site requests.
    Strict,
    /// The cookie is sent with all requests, including cross-site. Requires `Secure`.
    None,
}
