use crate::store::DeepLinkStore;
use crate::Navigator;
use linkward_core::SafeRedirect;
use tracing::debug;

/// Which stored target won after sign-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationDecision {
    /// The target requested by the authentication UI.
    RedirectAfterAuth(SafeRedirect),
    /// The deep-link destination computed before sign-in.
    PendingRedirect(SafeRedirect),
    /// Neither stored target survived validation.
    Default(SafeRedirect),
}

impl NavigationDecision {
    /// Where the user is sent.
    pub fn target(&self) -> &SafeRedirect {
        match self {
            Self::RedirectAfterAuth(target)
            | Self::PendingRedirect(target)
            | Self::Default(target) => target,
        }
    }
}

/// Chooses the landing page once authentication succeeds.
pub struct PostAuthResolver<N> {
    store: DeepLinkStore,
    navigator: N,
}

impl<N: Navigator> PostAuthResolver<N> {
    /// Create a resolver over a shared store.
    pub fn new(store: DeepLinkStore, navigator: N) -> Self {
        Self { store, navigator }
    }

    /// The store this resolver consumes.
    pub fn store(&self) -> &DeepLinkStore {
        &self.store
    }

    /// Navigate to the first stored target that still validates, in the order
    /// redirect-after-auth, pending redirect, `default_route`.
    ///
    /// Both stored targets are cleared and the record is marked processed
    /// before navigating, whichever target wins.
    pub fn on_auth_success(&self, user_id: &str, default_route: &str) -> NavigationDecision {
        let validator = self.store.validator();
        let (after_auth, pending) = self.store.take_redirects();

        let decision = after_auth
            .and_then(|target| validator.check(&target).ok())
            .map(NavigationDecision::RedirectAfterAuth)
            .or_else(|| {
                pending
                    .and_then(|target| validator.check(&target).ok())
                    .map(NavigationDecision::PendingRedirect)
            })
            .unwrap_or_else(|| {
                NavigationDecision::Default(
                    validator
                        .check(default_route)
                        .unwrap_or_else(|_| validator.root()),
                )
            });

        self.store.mark_processed();
        debug!(user_id = %user_id, target = %decision.target(), "post-auth navigation");
        self.navigator.navigate(decision.target());
        decision
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{ClientDeepLinkState, DeepLinkPhase};
    use crate::tests::RecordingNavigator;
    use crate::{BrowserLocation, PageContext};
    use chrono::{DateTime, Utc};
    use linkward_flow::Linkward;
    use std::sync::Arc;

    fn store() -> DeepLinkStore {
        let linkward = Linkward::builder()
            .site_origin("https://app.example.com")
            .unwrap()
            .build();
        DeepLinkStore::from_linkward(&linkward)
    }

    fn init(store: &DeepLinkStore, href: &str) {
        let page = PageContext::new(BrowserLocation::parse(href).unwrap());
        store.init_at(&page, DateTime::<Utc>::from_timestamp_millis(1_700_000_000_000).unwrap());
    }

    fn resolver(
        store: &DeepLinkStore,
    ) -> (PostAuthResolver<Arc<RecordingNavigator>>, Arc<RecordingNavigator>) {
        let navigator = Arc::new(RecordingNavigator::default());
        (PostAuthResolver::new(store.clone(), navigator.clone()), navigator)
    }

    fn persisted(store: &DeepLinkStore, key: &str, value: &str) -> ClientDeepLinkState {
        let mut json = serde_json::to_value(store.snapshot()).unwrap();
        json[key] = value.into();
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_redirect_after_auth_wins() {
        let store = store();
        init(&store, "https://app.example.com/?invite=abc");
        store.set_redirect_after_auth("/checkout");

        let (resolver, navigator) = resolver(&store);
        let decision = resolver.on_auth_success("user-1", "/home");
        assert_eq!(decision.target().relative(), "/checkout");
        assert!(matches!(decision, NavigationDecision::RedirectAfterAuth(_)));
        assert_eq!(navigator.visited(), vec!["/checkout"]);

        let state = store.snapshot();
        assert_eq!(state.phase(), DeepLinkPhase::Processed);
        assert_eq!(state.pending_redirect(), None);
        assert_eq!(state.redirect_after_auth(), None);
    }

    #[test]
    fn test_pending_redirect_used_when_no_after_auth() {
        let store = store();
        init(&store, "https://app.example.com/?competition=spring");

        let (resolver, navigator) = resolver(&store);
        let decision = resolver.on_auth_success("user-1", "/home");
        assert!(matches!(decision, NavigationDecision::PendingRedirect(_)));
        assert_eq!(navigator.visited(), vec!["/competitions/spring?competition=spring"]);
    }

    #[test]
    fn test_invalid_after_auth_falls_through_to_pending() {
        let store = store();
        init(&store, "https://app.example.com/?invite=abc");
        store.hydrate(persisted(&store, "redirectAfterAuth", "https://evil.example/"));

        let (resolver, navigator) = resolver(&store);
        let decision = resolver.on_auth_success("user-1", "/home");
        assert!(matches!(decision, NavigationDecision::PendingRedirect(_)));
        assert_eq!(navigator.visited(), vec!["/invite/abc?invite=abc"]);
    }

    #[test]
    fn test_both_invalid_fall_through_to_default() {
        let store = store();
        init(&store, "https://app.example.com/?invite=abc");
        let state = persisted(&store, "redirectAfterAuth", "//evil.example");
        let mut json = serde_json::to_value(state).unwrap();
        json["pendingRedirect"] = "javascript:alert(1)".into();
        store.hydrate(serde_json::from_value(json).unwrap());

        let (resolver, navigator) = resolver(&store);
        let decision = resolver.on_auth_success("user-1", "/home");
        let home = store.validator().check("/home").unwrap();
        assert_eq!(decision, NavigationDecision::Default(home));
        assert_eq!(navigator.visited(), vec!["/home"]);
        assert_eq!(store.phase(), DeepLinkPhase::Processed);
    }

    #[test]
    fn test_invalid_default_falls_back_to_root() {
        let store = store();
        let (resolver, navigator) = resolver(&store);
        let decision = resolver.on_auth_success("user-1", "https://evil.example/");
        assert_eq!(decision.target().relative(), "/");
        assert_eq!(navigator.visited(), vec!["/"]);
    }
}
