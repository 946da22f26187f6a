use axum::{
    extract::{Request, State},
    http::{header::SET_COOKIE, HeaderValue},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use examshop_core::SessionId;

use crate::state::AppState;

/// Resolves the browser session from its cookie, issuing a fresh id on
/// first contact. Handlers read the id back as `Extension<SessionId>`.
pub async fn session_middleware(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Response {
    let existing = jar
        .get(&state.session_cookie)
        .and_then(|cookie| SessionId::parse(cookie.value()));
    let (session, issued) = match existing {
        Some(session) => (session, false),
        None => (SessionId::generate(), true),
    };

    req.extensions_mut().insert(session.clone());
    let mut response = next.run(req).await;

    if issued {
        let cookie = Cookie::build((state.session_cookie.clone(), session.to_string()))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .build();
        match HeaderValue::from_str(&cookie.to_string()) {
            Ok(value) => {
                response.headers_mut().append(SET_COOKIE, value);
            }
            Err(e) => tracing::warn!("Could not encode session cookie: {}", e),
        }
    }

    response
}
