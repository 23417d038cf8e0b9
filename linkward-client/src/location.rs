use linkward_core::{DeepLinkError, RequestDescriptor};
use url::Url;

/// The browser's view of the current page, as a request descriptor.
///
/// Lets the client run the same extractor and router the server runs, against
/// `window.location`, `document.referrer` and `navigator.userAgent`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserLocation {
    url: Url,
    referrer: Option<String>,
    user_agent: Option<String>,
}

impl BrowserLocation {
    /// Parse the page's absolute `href`.
    pub fn parse(href: &str) -> Result<Self, DeepLinkError> {
        let url = Url::parse(href)
            .map_err(|e| DeepLinkError::Extraction(format!("location {href}: {e}")))?;
        Ok(Self {
            url,
            referrer: None,
            user_agent: None,
        })
    }

    /// Set the document referrer. Browsers report an absent referrer as `""`.
    pub fn with_referrer(mut self, referrer: impl Into<String>) -> Self {
        let referrer = referrer.into();
        self.referrer = (!referrer.is_empty()).then_some(referrer);
        self
    }

    /// Set the user agent.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// The full page URL.
    pub fn href(&self) -> &str {
        self.url.as_str()
    }
}

impl RequestDescriptor for BrowserLocation {
    fn path(&self) -> &str {
        self.url.path()
    }

    fn query(&self) -> Option<&str> {
        self.url.query()
    }

    fn referrer(&self) -> Option<&str> {
        self.referrer.as_deref()
    }

    fn user_agent(&self) -> Option<&str> {
        self.user_agent.as_deref()
    }
}
