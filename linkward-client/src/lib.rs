//! # Linkward Client
//!
//! The browser half of the deep-link pipeline. It runs the same extractor and
//! router as the server against the page location, keeps a single
//! [`ClientDeepLinkState`] per session, and decides where the user lands after
//! authentication.
//!
//! ## Key Components
//!
//! - **[`DeepLinkStore`]**: The shared state holder, initialized on page load.
//! - **[`PostAuthResolver`]**: Picks the post-auth destination.
//! - **[`Navigator`]**: The seam through which the client navigates; it only
//!   accepts validated targets.

#![warn(missing_docs)]

use linkward_core::SafeRedirect;
use std::sync::Arc;

/// The page location as a request descriptor.
pub mod location;
/// Post-authentication navigation.
pub mod resolver;
/// The client state and its reducer.
pub mod state;
/// The shared state holder.
pub mod store;

pub use location::BrowserLocation;
pub use resolver::{NavigationDecision, PostAuthResolver};
pub use state::{ClientDeepLinkState, DeepLinkAction, DeepLinkPhase};
pub use store::{DeepLinkStore, PageContext};

/// Performs client-side navigation.
///
/// Implementations may assume the target has already been validated; they must
/// not be handed anything else.
pub trait Navigator: Send + Sync {
    /// Navigate to `target`. Fire-and-forget.
    fn navigate(&self, target: &SafeRedirect);
}

impl<N: Navigator + ?Sized> Navigator for Arc<N> {
    fn navigate(&self, target: &SafeRedirect) {
        (**self).navigate(target)
    }
}
