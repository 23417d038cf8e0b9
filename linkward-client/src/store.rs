use crate::location::BrowserLocation;
use crate::state::{ClientDeepLinkState, DeepLinkAction, DeepLinkPhase};
use crate::Navigator;
use chrono::{DateTime, Utc};
use linkward_core::extractor::parse_query;
use linkward_core::{
    DeepLinkRecord, DeepLinkRouter, RedirectValidator, RequestDescriptor, SafeRedirect,
};
use linkward_flow::{ContextCarrier, Linkward};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// What the page hands the store on load.
#[derive(Debug, Clone)]
pub struct PageContext {
    /// The current page location.
    pub location: BrowserLocation,
    /// Content of the deep-link meta marker, if the server rendered one.
    pub meta_content: Option<String>,
}

impl PageContext {
    /// A page with no meta marker.
    pub fn new(location: BrowserLocation) -> Self {
        Self {
            location,
            meta_content: None,
        }
    }

    /// Attach the meta marker content.
    pub fn with_meta_content(mut self, content: impl Into<String>) -> Self {
        self.meta_content = Some(content.into());
        self
    }
}

/// The process-wide holder of [`ClientDeepLinkState`].
///
/// Create one per browser session at page load with [`DeepLinkStore::init`] and
/// hand clones to every consumer; clones share the same state. Mutations are
/// synchronous and never interleave. [`DeepLinkStore::mark_processed`] ends the
/// lifecycle of a record, [`DeepLinkStore::teardown`] discards everything when
/// the user navigates away.
#[derive(Debug, Clone)]
pub struct DeepLinkStore {
    state: Arc<Mutex<ClientDeepLinkState>>,
    validator: RedirectValidator,
    router: DeepLinkRouter,
    carrier: ContextCarrier,
}

impl DeepLinkStore {
    /// Create an idle store.
    pub fn new(
        validator: RedirectValidator,
        router: DeepLinkRouter,
        carrier: ContextCarrier,
    ) -> Self {
        Self {
            state: Arc::new(Mutex::new(ClientDeepLinkState::default())),
            validator,
            router,
            carrier,
        }
    }

    /// Create an idle store sharing the configuration of a [`Linkward`] service.
    pub fn from_linkward(linkward: &Linkward) -> Self {
        Self::new(
            linkward.validator().clone(),
            linkward.router().clone(),
            linkward.carrier().clone(),
        )
    }

    fn lock(&self) -> MutexGuard<'_, ClientDeepLinkState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The validator every stored target is checked against.
    pub fn validator(&self) -> &RedirectValidator {
        &self.validator
    }

    /// Apply `action` to the shared state.
    pub fn dispatch(&self, action: DeepLinkAction) {
        self.lock().reduce(action);
    }

    /// A copy of the current state.
    pub fn snapshot(&self) -> ClientDeepLinkState {
        self.lock().clone()
    }

    /// Replace the state with one persisted elsewhere (another tab, session storage).
    ///
    /// Stored targets are not re-checked here; every consumer re-validates them.
    pub fn hydrate(&self, state: ClientDeepLinkState) {
        *self.lock() = state;
    }

    /// The lifecycle phase.
    pub fn phase(&self) -> DeepLinkPhase {
        self.lock().phase()
    }

    /// Initialize from the page being loaded.
    pub fn init(&self, page: &PageContext) -> DeepLinkPhase {
        self.init_at(page, Utc::now())
    }

    /// Initialize from the page being loaded, as of `now`.
    ///
    /// The meta marker wins over the page URL; a stale or unreadable marker
    /// counts as absent. A `redirect` parameter on the page URL is offered to
    /// [`DeepLinkStore::set_redirect_after_auth`].
    pub fn init_at(&self, page: &PageContext, now: DateTime<Utc>) -> DeepLinkPhase {
        let record = page
            .meta_content
            .as_deref()
            .and_then(|content| self.carrier.read_header(content, now))
            .filter(DeepLinkRecord::is_deep_link)
            .or_else(|| {
                let extracted = linkward_core::extract_at(&page.location, now);
                extracted.is_deep_link().then_some(extracted)
            });

        if let Some(record) = record {
            let pending_redirect = self
                .router
                .route(&record, &page.location)
                .location()
                .and_then(|location| self.validator.check(&location).ok());
            self.dispatch(DeepLinkAction::Activate {
                record,
                pending_redirect,
            });
        }

        let redirect_param = page.location.query().and_then(|query| {
            parse_query(query)
                .into_iter()
                .find(|(key, _)| key == "redirect")
                .map(|(_, value)| value)
        });
        if let Some(target) = redirect_param {
            self.set_redirect_after_auth(&target);
        }

        self.phase()
    }

    /// Remember where to go after sign-in. Rejected targets never enter state.
    pub fn set_redirect_after_auth(&self, url: &str) -> bool {
        match self.validator.check(url) {
            Ok(target) => {
                self.dispatch(DeepLinkAction::SetRedirectAfterAuth(target));
                true
            }
            Err(_) => false,
        }
    }

    /// Re-validate and perform the pending redirect.
    ///
    /// A target that no longer validates is dropped without navigating. The
    /// navigation is fire-and-forget; the record is marked processed first.
    pub fn execute_pending_redirect(&self, navigator: &dyn Navigator) -> Option<SafeRedirect> {
        let pending = self.lock().pending_redirect().map(str::to_string)?;
        match self.validator.check(&pending) {
            Ok(target) => {
                self.dispatch(DeepLinkAction::MarkProcessed);
                navigator.navigate(&target);
                Some(target)
            }
            Err(_) => {
                self.dispatch(DeepLinkAction::ClearPendingRedirect);
                None
            }
        }
    }

    /// Flag the record consumed after a successful authenticated action.
    pub fn mark_processed(&self) {
        self.dispatch(DeepLinkAction::MarkProcessed);
    }

    /// Discard all state; the user navigated away.
    pub fn teardown(&self) {
        debug!("tearing down deep-link state");
        self.dispatch(DeepLinkAction::Reset);
    }

    /// Take both stored targets, leaving neither behind.
    pub(crate) fn take_redirects(&self) -> (Option<String>, Option<String>) {
        let mut state = self.lock();
        let taken = (
            state.redirect_after_auth().map(str::to_string),
            state.pending_redirect().map(str::to_string),
        );
        state.reduce(DeepLinkAction::ClearRedirectAfterAuth);
        state.reduce(DeepLinkAction::ClearPendingRedirect);
        taken
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::RecordingNavigator;
    use linkward_core::DeepLinkSource;

    const NOW: i64 = 1_700_000_000_000;

    fn at(millis: i64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp_millis(millis).unwrap()
    }

    fn linkward() -> Linkward {
        Linkward::builder()
            .site_origin("https://app.example.com")
            .unwrap()
            .build()
    }

    fn page(href: &str) -> PageContext {
        PageContext::new(BrowserLocation::parse(href).unwrap())
    }

    #[test]
    fn test_init_from_page_url_sets_pending_redirect() {
        let store = DeepLinkStore::from_linkward(&linkward());
        let phase = store.init_at(&page("https://app.example.com/?invite=TOKEN123"), at(NOW));

        assert_eq!(phase, DeepLinkPhase::Active);
        let state = store.snapshot();
        assert_eq!(state.data().map(|r| r.source()), Some(DeepLinkSource::Invite));
        assert_eq!(state.pending_redirect(), Some("/invite/TOKEN123?invite=TOKEN123"));
    }

    #[test]
    fn test_init_from_meta_marker() {
        let linkward = linkward();
        let outcome = linkward.process_at(
            &server_request("/?share=cup-7&utm_source=mail"),
            None,
            at(NOW),
        );
        let header = outcome.header.unwrap();

        let store = DeepLinkStore::from_linkward(&linkward);
        let page = page("https://app.example.com/competitions/cup-7?share=cup-7&utm_source=mail")
            .with_meta_content(header);
        assert_eq!(store.init_at(&page, at(NOW + 1_000)), DeepLinkPhase::Active);

        let state = store.snapshot();
        assert_eq!(state.data().map(|r| r.source()), Some(DeepLinkSource::Share));
        // Already on the canonical path.
        assert_eq!(state.pending_redirect(), None);
    }

    #[test]
    fn test_stale_meta_falls_back_to_url() {
        let linkward = linkward();
        let header = linkward
            .process_at(&server_request("/?share=old"), None, at(NOW))
            .header
            .unwrap();

        let store = DeepLinkStore::from_linkward(&linkward);
        let page = page("https://app.example.com/?ref=friend").with_meta_content(header);
        store.init_at(&page, at(NOW + 301_000));

        let state = store.snapshot();
        assert_eq!(state.data().map(|r| r.source()), Some(DeepLinkSource::Referral));
        assert_eq!(state.pending_redirect(), None);
    }

    #[test]
    fn test_garbage_meta_is_ignored() {
        let store = DeepLinkStore::from_linkward(&linkward());
        let page = page("https://app.example.com/").with_meta_content("{\"source\":");
        assert_eq!(store.init_at(&page, at(NOW)), DeepLinkPhase::Idle);
    }

    #[test]
    fn test_redirect_param_is_validated() {
        let store = DeepLinkStore::from_linkward(&linkward());
        store.init_at(&page("https://app.example.com/login?redirect=%2Fcheckout"), at(NOW));
        assert_eq!(store.snapshot().redirect_after_auth(), Some("/checkout"));

        let store = DeepLinkStore::from_linkward(&linkward());
        store.init_at(
            &page("https://app.example.com/login?redirect=https%3A%2F%2Fevil.example%2F"),
            at(NOW),
        );
        assert_eq!(store.snapshot().redirect_after_auth(), None);
    }

    #[test]
    fn test_rejected_target_never_enters_state() {
        let store = DeepLinkStore::from_linkward(&linkward());
        assert!(!store.set_redirect_after_auth("javascript:alert(1)"));
        assert_eq!(store.snapshot().redirect_after_auth(), None);
        assert!(store.set_redirect_after_auth("/checkout"));
        assert_eq!(store.snapshot().redirect_after_auth(), Some("/checkout"));
    }

    #[test]
    fn test_execute_pending_redirect() {
        let store = DeepLinkStore::from_linkward(&linkward());
        store.init_at(&page("https://app.example.com/?competition=spring"), at(NOW));

        let navigator = RecordingNavigator::default();
        let target = store.execute_pending_redirect(&navigator).unwrap();
        assert_eq!(target.relative(), "/competitions/spring?competition=spring");
        assert_eq!(navigator.visited(), vec!["/competitions/spring?competition=spring"]);
        assert_eq!(store.phase(), DeepLinkPhase::Processed);

        assert!(store.execute_pending_redirect(&navigator).is_none());
        assert_eq!(navigator.visited().len(), 1);
    }

    #[test]
    fn test_pending_redirect_revalidated_against_current_origin() {
        let store = DeepLinkStore::from_linkward(&linkward());
        store.init_at(&page("https://app.example.com/?invite=abc"), at(NOW));
        let mut persisted = serde_json::to_value(store.snapshot()).unwrap();
        persisted["pendingRedirect"] = "https://app.example.com/invite/abc".into();

        let moved = Linkward::builder()
            .site_origin("https://new.example.com")
            .unwrap()
            .build();
        let other = DeepLinkStore::from_linkward(&moved);
        other.hydrate(serde_json::from_value(persisted).unwrap());

        let navigator = RecordingNavigator::default();
        assert!(other.execute_pending_redirect(&navigator).is_none());
        assert!(navigator.visited().is_empty());
        assert_eq!(other.snapshot().pending_redirect(), None);
        assert_eq!(other.phase(), DeepLinkPhase::Active);
    }

    #[test]
    fn test_teardown_discards_state() {
        let store = DeepLinkStore::from_linkward(&linkward());
        let shared = store.clone();
        store.init_at(&page("https://app.example.com/?invite=abc"), at(NOW));
        shared.teardown();
        assert_eq!(store.phase(), DeepLinkPhase::Idle);
        assert_eq!(store.snapshot(), ClientDeepLinkState::default());
    }

    fn server_request(uri: &str) -> BrowserLocation {
        BrowserLocation::parse(&format!("https://app.example.com{uri}")).unwrap()
    }
}
