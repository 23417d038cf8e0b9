use axum::{
    extract::{Request, State},
    http::{header, HeaderName, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use linkward_core::DeepLinkRecord;
use linkward_flow::{ContextCookie, Linkward};
use std::sync::Arc;
use tower_cookies::{cookie::time::Duration, Cookie, Cookies};
use tracing::warn;

/// The context the middleware resolved for the current request.
#[derive(Debug, Clone)]
pub(crate) struct CarriedContext(pub(crate) Option<DeepLinkRecord>);

/// Map the framework-neutral `SameSite` onto the cookie crate's.
pub fn to_cookie_same_site(ss: linkward_core::SameSite) -> tower_cookies::cookie::SameSite {
    match ss {
        linkward_core::SameSite::Lax => tower_cookies::cookie::SameSite::Lax,
        linkward_core::SameSite::Strict => tower_cookies::cookie::SameSite::Strict,
        linkward_core::SameSite::None => tower_cookies::cookie::SameSite::None,
    }
}

/// Build the cookie jar entry for a [`ContextCookie`].
pub fn create_context_cookie(cookie: &ContextCookie) -> Cookie<'static> {
    Cookie::build((cookie.name.clone(), cookie.value.clone()))
        .path(cookie.path.clone())
        .secure(cookie.secure)
        .http_only(cookie.http_only)
        .same_site(to_cookie_same_site(cookie.same_site))
        .max_age(Duration::seconds(cookie.max_age.num_seconds()))
        .build()
}

/// Clear the context cookie, typically once the post-auth redirect is done.
pub fn clear_context(cookies: &Cookies, linkward: &Linkward) {
    cookies.add(create_context_cookie(&linkward.carrier().expired_cookie()));
}

/// Runs the deep-link pipeline in front of every route.
///
/// Deep links that need a landing page get a `302 Found` with the context
/// cookie set. Every other request reaches the handler with its context
/// available through [`crate::DeepLinkContext`], and the response carries the
/// context header when there is one.
pub async fn deep_link_middleware(
    State(linkward): State<Arc<Linkward>>,
    cookies: Cookies,
    mut request: Request,
    next: Next,
) -> Response {
    let carried = cookies
        .get(&linkward.carrier().config().cookie_name)
        .map(|c| c.value().to_string());
    let outcome = linkward.process(&request, carried.as_deref());

    if let Some(location) = outcome.location() {
        if let Some(cookie) = &outcome.set_cookie {
            cookies.add(create_context_cookie(cookie));
        }
        let mut response = (StatusCode::FOUND, [(header::LOCATION, location)]).into_response();
        attach_context_header(&mut response, &linkward, outcome.header.as_deref());
        return response;
    }

    request
        .extensions_mut()
        .insert(CarriedContext(outcome.context));
    let mut response = next.run(request).await;
    attach_context_header(&mut response, &linkward, outcome.header.as_deref());
    response
}

fn attach_context_header(response: &mut Response, linkward: &Linkward, value: Option<&str>) {
    let Some(value) = value else {
        return;
    };
    let name = HeaderName::try_from(linkward.carrier().config().header_name.as_str());
    match (name, HeaderValue::from_str(value)) {
        (Ok(name), Ok(value)) => {
            response.headers_mut().insert(name, value);
        }
        _ => warn!("deep-link context header is not a valid header"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linkward_core::SameSite;

    #[test]
    fn test_create_context_cookie() {
        let cookie = create_context_cookie(&ContextCookie {
            name: "deep-link-context".to_string(),
            value: "abc.def".to_string(),
            path: "/".to_string(),
            max_age: linkward_flow::chrono::Duration::seconds(300),
            secure: true,
            http_only: true,
            same_site: SameSite::Lax,
        });

        assert_eq!(cookie.name(), "deep-link-context");
        assert_eq!(cookie.value(), "abc.def");
        assert_eq!(cookie.max_age(), Some(Duration::seconds(300)));
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(
            cookie.same_site(),
            Some(tower_cookies::cookie::SameSite::Lax)
        );
    }
}
