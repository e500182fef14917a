use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// The unauthenticated surface, kept intentionally tiny: a liveness probe and
/// the credential boundary. Every other endpoint in the application sits
/// behind a session.
///
/// Credential failures get one generic answer; the response never reveals
/// whether the email or the password was the wrong half.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for monitoring; answers "ok" without touching any state.
        .route("/health", get(|| async { "ok" }))
        // GET/POST /login
        // GET is the landing point that protected routes redirect to. POST verifies
        // the submitted form credentials, mints an opaque session token, sets it as
        // an HttpOnly cookie and forwards the client to the dashboard.
        .route("/login", get(handlers::login_page).post(handlers::login))
}
