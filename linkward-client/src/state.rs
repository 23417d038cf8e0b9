use linkward_core::{DeepLinkRecord, SafeRedirect};
use serde::{Deserialize, Serialize};

/// Where the client deep-link lifecycle stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeepLinkPhase {
    /// No record.
    Idle,
    /// A record is present and not yet processed.
    Active,
    /// The record was consumed; it is kept for inspection only.
    Processed,
}

/// Mutations of [`ClientDeepLinkState`].
///
/// Redirect targets enter state only as [`SafeRedirect`], so nothing unvalidated
/// can be assigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeepLinkAction {
    /// A record was extracted on page load or client-side navigation.
    Activate {
        /// The extracted record.
        record: DeepLinkRecord,
        /// Where the router wants to send the user before authentication.
        pending_redirect: Option<SafeRedirect>,
    },
    /// The authentication UI asked to land somewhere after sign-in.
    SetRedirectAfterAuth(SafeRedirect),
    /// Drop the pending redirect without navigating.
    ClearPendingRedirect,
    /// Drop the post-auth redirect.
    ClearRedirectAfterAuth,
    /// The record was consumed: flag it and clear both redirects.
    MarkProcessed,
    /// Discard everything.
    Reset,
}

/// The single per-session deep-link state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientDeepLinkState {
    data: Option<DeepLinkRecord>,
    pending_redirect: Option<String>,
    redirect_after_auth: Option<String>,
}

impl ClientDeepLinkState {
    /// The current record, processed or not.
    pub fn data(&self) -> Option<&DeepLinkRecord> {
        self.data.as_ref()
    }

    /// The redirect the router wants to perform before authentication.
    pub fn pending_redirect(&self) -> Option<&str> {
        self.pending_redirect.as_deref()
    }

    /// The redirect requested by the authentication UI.
    pub fn redirect_after_auth(&self) -> Option<&str> {
        self.redirect_after_auth.as_deref()
    }

    /// Whether a record is present and unprocessed.
    pub fn active(&self) -> bool {
        self.phase() == DeepLinkPhase::Active
    }

    /// The lifecycle phase.
    pub fn phase(&self) -> DeepLinkPhase {
        match &self.data {
            None => DeepLinkPhase::Idle,
            Some(record) if record.processed() => DeepLinkPhase::Processed,
            Some(_) => DeepLinkPhase::Active,
        }
    }

    /// Apply `action`.
    pub fn reduce(&mut self, action: DeepLinkAction) {
        match action {
            DeepLinkAction::Activate {
                record,
                pending_redirect,
            } => {
                if !record.is_deep_link() || record.processed() {
                    return;
                }
                // A processed record only gives way to a fresh extraction.
                if let Some(current) = &self.data {
                    if current.processed() && same_capture(current, &record) {
                        return;
                    }
                }
                self.data = Some(record);
                self.pending_redirect = pending_redirect.map(|target| target.relative());
            }
            DeepLinkAction::SetRedirectAfterAuth(target) => {
                self.redirect_after_auth = Some(target.relative());
            }
            DeepLinkAction::ClearPendingRedirect => {
                self.pending_redirect = None;
            }
            DeepLinkAction::ClearRedirectAfterAuth => {
                self.redirect_after_auth = None;
            }
            DeepLinkAction::MarkProcessed => {
                if let Some(record) = &mut self.data {
                    record.mark_processed();
                }
                self.pending_redirect = None;
                self.redirect_after_auth = None;
            }
            DeepLinkAction::Reset => {
                *self = Self::default();
            }
        }
    }
}

fn same_capture(a: &DeepLinkRecord, b: &DeepLinkRecord) -> bool {
    a.source() == b.source() && a.params() == b.params() && a.timestamp() == b.timestamp()
}
