/// Errors that can occur while configuring or extracting deep links.
///
/// None of these are fatal to a request: callers recover by discarding the
/// offending value and proceeding without deep-link context.
#[derive(Debug, thiserror::Error)]
pub enum DeepLinkError {
    /// The configured site origin is not an absolute http(s) URL with a host.
    #[error("Invalid site origin: {0}")]
    InvalidOrigin(String),
    /// A URL or query string could not be read.
    #[error("Extraction error: {0}")]
    Extraction(String),
}
