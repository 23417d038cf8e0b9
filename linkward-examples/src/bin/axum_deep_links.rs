//! # Axum Deep Links Example
//!
//! A small site wired through `linkward`:
//! - `/?invite=abc` lands on `/invite/abc` with the context cookie set.
//! - `/?share=cup-7` and `/?competition=cup-7` land on `/competitions/cup-7`.
//! - `/?utm_source=newsletter` stays put but the page still carries the context.
//! - `/login/complete?redirect=/checkout` finishes sign-in and sends the user to
//!   the validated target, or `/` when the target is off-site.
//!
//! Configure with `LINKWARD_SITE_ORIGIN`, `LINKWARD_SIGNING_KEY`,
//! `LINKWARD_SECURE_COOKIES` and `LINKWARD_BIND_ADDR`, or a `.env` file.

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse},
    routing::get,
    Router,
};
use linkward::flow::{CarrierConfig, Linkward, SigningKey};
use linkward_axum::{
    clear_context, DeepLinkContext, LinkwardAxumExt, LinkwardState, PostAuthRedirect,
};
use linkward_core::DeepLinkRecord;
use linkward_flow::meta::escape_html;
use std::sync::Arc;
use tower_cookies::Cookies;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

fn build_linkward() -> Result<Linkward, Box<dyn std::error::Error>> {
    let origin = std::env::var("LINKWARD_SITE_ORIGIN")
        .unwrap_or_else(|_| "http://localhost:3000".to_string());

    let mut carrier = CarrierConfig {
        secure: std::env::var("LINKWARD_SECURE_COOKIES")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(false), // For local development
        ..Default::default()
    };
    match std::env::var("LINKWARD_SIGNING_KEY") {
        Ok(key) if !key.is_empty() => carrier.signing_key = SigningKey::new(key.into_bytes()),
        _ => warn!("LINKWARD_SIGNING_KEY not set, context cookies will not survive a restart"),
    }

    Ok(Linkward::builder()
        .site_origin(&origin)?
        .carrier_config(carrier)
        .build())
}

fn app(linkward: Arc<Linkward>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/invite/{code}", get(invite))
        .route("/competitions/{id}", get(competition))
        .route("/login", get(login))
        .route("/login/complete", get(login_complete))
        .with_deep_links(linkward.clone())
        .with_state(LinkwardState::from(linkward))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let linkward = Arc::new(build_linkward()?);
    info!(origin = %linkward.validator().origin(), "deep-link routing enabled");

    let addr = std::env::var("LINKWARD_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app(linkward)).await?;
    Ok(())
}

fn page(linkward: &Linkward, context: Option<&DeepLinkRecord>, body: &str) -> Html<String> {
    let meta = context
        .and_then(|record| linkward.carrier().meta_tag(record).ok())
        .unwrap_or_default();
    Html(format!(
        "<!doctype html><html><head>{meta}</head><body>{body}</body></html>"
    ))
}

async fn index(
    State(state): State<LinkwardState>,
    DeepLinkContext(context): DeepLinkContext,
) -> impl IntoResponse {
    let mut body = String::from("<h1>Linkward Example</h1>");
    if let Some(record) = &context {
        body.push_str(&format!(
            "<p>You arrived via <b>{}</b>.</p>",
            escape_html(record.source().as_str())
        ));
    }
    body.push_str("<p><a href=\"/login?redirect=/checkout\">Sign in and check out</a></p>");
    page(&state.linkward, context.as_ref(), &body)
}

async fn invite(
    State(state): State<LinkwardState>,
    Path(code): Path<String>,
    DeepLinkContext(context): DeepLinkContext,
) -> impl IntoResponse {
    let body = format!(
        "<h1>You're invited</h1><p>Invite code: {}</p>\
         <p><a href=\"/login\">Sign in to accept</a></p>",
        escape_html(&code)
    );
    page(&state.linkward, context.as_ref(), &body)
}

async fn competition(
    State(state): State<LinkwardState>,
    Path(id): Path<String>,
    DeepLinkContext(context): DeepLinkContext,
) -> impl IntoResponse {
    let body = format!(
        "<h1>Competition {}</h1><p><a href=\"/login\">Sign in to join</a></p>",
        escape_html(&id)
    );
    page(&state.linkward, context.as_ref(), &body)
}

async fn login(
    State(state): State<LinkwardState>,
    PostAuthRedirect(target): PostAuthRedirect,
    DeepLinkContext(context): DeepLinkContext,
) -> impl IntoResponse {
    let next = urlencoding::encode(&target.relative()).into_owned();
    let body = format!(
        "<h1>Sign in</h1><p><a href=\"/login/complete?redirect={}\">Continue</a></p>",
        escape_html(&next)
    );
    page(&state.linkward, context.as_ref(), &body)
}

/// Stands in for a real authentication callback.
async fn login_complete(
    State(state): State<LinkwardState>,
    cookies: Cookies,
    PostAuthRedirect(target): PostAuthRedirect,
) -> impl IntoResponse {
    clear_context(&cookies, &state.linkward);
    (StatusCode::FOUND, [(header::LOCATION, target.relative())])
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn setup_app() -> Router {
        let linkward = Linkward::builder()
            .site_origin("http://localhost:3000")
            .unwrap()
            .build();
        app(Arc::new(linkward))
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_invite_link_redirects_to_landing() {
        let response = setup_app()
            .oneshot(get("/?invite=TOKEN123&utm_source=newsletter"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            response.headers().get(header::LOCATION).unwrap(),
            "/invite/TOKEN123?invite=TOKEN123&utm_source=newsletter"
        );
        assert!(response.headers().get(header::SET_COOKIE).is_some());
        assert!(response.headers().get("x-deep-link-context").is_some());
    }

    #[tokio::test]
    async fn test_landing_page_renders_context_without_looping() {
        let response = setup_app()
            .oneshot(get("/invite/TOKEN123?invite=TOKEN123&utm_source=newsletter"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let html = body_text(response).await;
        assert!(html.contains(r#"<meta name="deep-link-context""#));
        assert!(html.contains("TOKEN123"));
    }

    #[tokio::test]
    async fn test_attribution_only_link_stays_put() {
        let response = setup_app()
            .oneshot(get("/?utm_source=newsletter"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get("x-deep-link-context").is_some());
        assert!(response.headers().get(header::SET_COOKIE).is_none());
        assert!(body_text(response).await.contains("<b>utm</b>"));
    }

    #[tokio::test]
    async fn test_login_complete_honors_internal_redirect() {
        let response = setup_app()
            .oneshot(get("/login/complete?redirect=%2Fcheckout"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/checkout");
        let cleared = response
            .headers()
            .get(header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap();
        assert!(cleared.starts_with("deep-link-context=;"));
        assert!(cleared.contains("Max-Age=0"));
    }

    #[tokio::test]
    async fn test_login_complete_rejects_open_redirect() {
        for evil in [
            "https%3A%2F%2Fevil.example%2Fsteal",
            "%2F%2Fevil.example",
            "javascript%3Aalert(1)",
        ] {
            let response = setup_app()
                .oneshot(get(&format!("/login/complete?redirect={evil}")))
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::FOUND);
            assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/");
        }
    }
}
