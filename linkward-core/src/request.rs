use http::header::{HeaderMap, HeaderName, REFERER, USER_AGENT};

/// Read access to the parts of a request that deep-link handling depends on.
///
/// Implemented once per environment: server requests ([`http::Request`] and
/// [`http::request::Parts`]) here, the browser location in `linkward-client`.
/// Extraction and routing only ever see this trait.
pub trait RequestDescriptor {
    /// The request pathname, percent-encoded as received.
    fn path(&self) -> &str;

    /// The raw query string without the leading `?`.
    fn query(&self) -> Option<&str>;

    /// The `Referer` header, if sent.
    fn referrer(&self) -> Option<&str>;

    /// The `User-Agent` header, if sent.
    fn user_agent(&self) -> Option<&str>;
}

fn header_str<'a>(headers: &'a HeaderMap, name: &HeaderName) -> Option<&'a str> {
    headers.get(name)?.to_str().ok()
}

impl RequestDescriptor for http::request::Parts {
    fn path(&self) -> &str {
        self.uri.path()
    }

    fn query(&self) -> Option<&str> {
        self.uri.query()
    }

    fn referrer(&self) -> Option<&str> {
        header_str(&self.headers, &REFERER)
    }

    fn user_agent(&self) -> Option<&str> {
        header_str(&self.headers, &USER_AGENT)
    }
}

impl<B> RequestDescriptor for http::Request<B> {
    fn path(&self) -> &str {
        self.uri().path()
    }

    fn query(&self) -> Option<&str> {
        self.uri().query()
    }

    fn referrer(&self) -> Option<&str> {
        header_str(self.headers(), &REFERER)
    }

    fn user_agent(&self) -> Option<&str> {
        header_str(self.headers(), &USER_AGENT)
    }
}

impl<T: RequestDescriptor + ?Sized> RequestDescriptor for &T {
    fn path(&self) -> &str {
        (**self).path()
    }

    fn query(&self) -> Option<&str> {
        (**self).query()
    }

    fn referrer(&self) -> Option<&str> {
        (**self).referrer()
    }

    fn user_agent(&self) -> Option<&str> {
        (**self).user_agent()
    }
}
