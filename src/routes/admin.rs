use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Account provisioning and oversight of who can log in, nested under
/// `/admin`.
///
/// The handlers authenticate via the `AuthUser` extractor, then the service
/// checks the admin flag before acting. An authenticated non-admin therefore
/// receives an explicit 403 rather than being bounced to the login page.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET/POST /admin/users
        // GET enumerates every login (password hashes never serialize).
        // POST provisions a new login from the form; the admin flag arrives
        // checkbox-style, so mere presence of the field grants the role.
        // A duplicate email conflicts without touching the existing account.
        .route(
            "/users",
            get(handlers::list_users).post(handlers::create_user),
        )
}
