use crate::error::DeepLinkError;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;
use url::Url;

/// Why a redirect target was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RejectReason {
    /// Empty or whitespace-only input.
    Empty,
    /// Not parseable as a URL, or carries control characters or credentials.
    Malformed,
    /// A scheme other than the site's own http(s), or a protocol-relative target.
    DisallowedScheme,
    /// Resolves to a different scheme, host or port than the site.
    CrossOrigin,
    /// The path contains a `..` segment.
    Traversal,
}

impl RejectReason {
    /// The wire name of this reason.
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::Empty => "empty",
            RejectReason::Malformed => "malformed",
            RejectReason::DisallowedScheme => "disallowed-scheme",
            RejectReason::CrossOrigin => "cross-origin",
            RejectReason::Traversal => "traversal",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The verdict of [`RedirectValidator::validate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedirectValidation {
    /// Whether the candidate may be navigated to.
    pub is_valid: bool,
    /// Present only when `is_valid` is false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<RejectReason>,
}

impl RedirectValidation {
    fn valid() -> Self {
        Self {
            is_valid: true,
            reason: None,
        }
    }

    fn invalid(reason: RejectReason) -> Self {
        Self {
            is_valid: false,
            reason: Some(reason),
        }
    }
}

/// A redirect target that passed validation.
///
/// Only [`RedirectValidator`] can produce one, so anything that accepts a
/// `SafeRedirect` is guaranteed to have gone through the validator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafeRedirect {
    url: Url,
}

impl SafeRedirect {
    /// The fully resolved, same-origin URL.
    pub fn as_url(&self) -> &Url {
        &self.url
    }

    /// The origin-relative form (`path?query#fragment`) used for navigation.
    pub fn relative(&self) -> String {
        let mut out = self.url.path().to_string();
        if let Some(query) = self.url.query() {
            out.push('?');
            out.push_str(query);
        }
        if let Some(fragment) = self.url.fragment() {
            out.push('#');
            out.push_str(fragment);
        }
        out
    }
}

impl fmt::Display for SafeRedirect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.relative())
    }
}

/// Guards every redirect against leaving the site's origin.
///
/// This is the single choke point for redirect decisions: routers, carriers,
/// the client store and the post-auth resolver all call into it rather than
/// making their own judgement.
#[derive(Debug, Clone)]
pub struct RedirectValidator {
    origin: Url,
}

impl RedirectValidator {
    /// Create a validator for the site served at `site_origin`.
    ///
    /// Any path, query or fragment on `site_origin` is ignored.
    pub fn new(site_origin: &str) -> Result<Self, DeepLinkError> {
        let mut origin = Url::parse(site_origin)
            .map_err(|e| DeepLinkError::InvalidOrigin(format!("{site_origin}: {e}")))?;

        if !matches!(origin.scheme(), "http" | "https") {
            return Err(DeepLinkError::InvalidOrigin(format!(
                "{site_origin}: scheme must be http or https"
            )));
        }
        if origin.host().is_none() {
            return Err(DeepLinkError::InvalidOrigin(format!(
                "{site_origin}: missing host"
            )));
        }
        if !origin.username().is_empty() || origin.password().is_some() {
            return Err(DeepLinkError::InvalidOrigin(format!(
                "{site_origin}: credentials are not allowed"
            )));
        }

        origin.set_path("/");
        origin.set_query(None);
        origin.set_fragment(None);
        Ok(Self { origin })
    }

    /// The site origin every target is checked against.
    pub fn origin(&self) -> &Url {
        &self.origin
    }

    /// Judge `candidate` without side effects.
    pub fn validate(&self, candidate: &str) -> RedirectValidation {
        match self.resolve(candidate) {
            Ok(_) => RedirectValidation::valid(),
            Err(reason) => RedirectValidation::invalid(reason),
        }
    }

    /// Judge `candidate`, logging rejections for audit.
    pub fn check(&self, candidate: &str) -> Result<SafeRedirect, RejectReason> {
        self.resolve(candidate).map_err(|reason| {
            warn!(candidate = %candidate, reason = %reason, "rejected redirect target");
            reason
        })
    }

    /// The site root, always a valid target.
    pub fn root(&self) -> SafeRedirect {
        SafeRedirect {
            url: self.origin.clone(),
        }
    }

    fn resolve(&self, candidate: &str) -> Result<SafeRedirect, RejectReason> {
        let trimmed = candidate.trim();
        if trimmed.is_empty() {
            return Err(RejectReason::Empty);
        }
        // URL parsers silently drop tabs and newlines: `/\t/host` is `//host` and
        // `java\tscript:` is `javascript:` once parsed.
        let parsed_form: String = trimmed
            .chars()
            .filter(|c| !matches!(c, '\t' | '\n' | '\r'))
            .collect();
        if is_protocol_relative(&parsed_form) {
            return Err(RejectReason::DisallowedScheme);
        }
        if scheme_of(&parsed_form).is_some_and(|scheme| {
            !scheme.eq_ignore_ascii_case("http") && !scheme.eq_ignore_ascii_case("https")
        }) {
            return Err(RejectReason::DisallowedScheme);
        }
        if trimmed.chars().any(char::is_control) {
            return Err(RejectReason::Malformed);
        }

        let resolved = match scheme_of(trimmed) {
            Some(scheme) => {
                let scheme = scheme.to_ascii_lowercase();
                if scheme != "http" && scheme != "https" {
                    return Err(RejectReason::DisallowedScheme);
                }
                let url = Url::parse(trimmed).map_err(|_| RejectReason::Malformed)?;
                if url.scheme() != self.origin.scheme() || url.host() != self.origin.host() {
                    return Err(RejectReason::CrossOrigin);
                }
                url
            }
            None => self
                .origin
                .join(trimmed)
                .map_err(|_| RejectReason::Malformed)?,
        };

        if !resolved.username().is_empty() || resolved.password().is_some() {
            return Err(RejectReason::Malformed);
        }
        // `/.//host` normalizes to a path of `//host`, which renders protocol-relative.
        if resolved.path().starts_with("//") {
            return Err(RejectReason::DisallowedScheme);
        }
        if has_traversal(trimmed) {
            return Err(RejectReason::Traversal);
        }
        if resolved.origin() != self.origin.origin() {
            return Err(RejectReason::CrossOrigin);
        }

        Ok(SafeRedirect { url: resolved })
    }
}

/// `//host`, `\\host`, `/\host` and `\/host` all inherit the current scheme
/// and name a foreign authority.
fn is_protocol_relative(candidate: &str) -> bool {
    let mut chars = candidate.chars();
    matches!(
        (chars.next(), chars.next()),
        (Some('/' | '\\'), Some('/' | '\\'))
    )
}

fn scheme_of(candidate: &str) -> Option<&str> {
    let (scheme, _) = candidate.split_once(':')?;
    let mut chars = scheme.chars();
    let first = chars.next()?;
    let well_formed = first.is_ascii_alphabetic()
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    well_formed.then_some(scheme)
}

fn has_traversal(candidate: &str) -> bool {
    let path = candidate.split(['?', '#']).next().unwrap_or_default();
    path.split(['/', '\\']).any(|segment| {
        urlencoding::decode(segment)
            .map(|decoded| decoded == "..")
            .unwrap_or(false)
    })
}
