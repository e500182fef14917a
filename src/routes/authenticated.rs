use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post, put},
};

/// The day-to-day record workflow: the filtered dashboard plus creation and
/// maintenance of hoarding records.
///
/// None of these handlers check the session themselves. The whole table is
/// wrapped in the session middleware at assembly time, so by the time a
/// handler runs the `AuthUser` extractor has already produced the full user
/// record that the owner-or-admin check on edit and the admin-only check on
/// delete work from.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /logout
        // Invalidates the server-side session, clears the cookie and forwards
        // the client back to the login boundary.
        .route("/logout", get(handlers::logout))
        // GET /dashboard?place=...&showroom=...&location=...&match=...
        // The single listing view: filtered records ordered by renewal date,
        // the filter dropdown option sets, headline counts and the
        // per-showroom aggregation.
        .route("/dashboard", get(handlers::dashboard))
        // POST /hoardings
        // Creates a record from the multipart form, with an optional image.
        // Ownership is stamped from the session, never taken from the form.
        .route("/hoardings", post(handlers::add_hoarding))
        // PUT/DELETE /hoardings/{id}
        // PUT replaces a record's fields and optionally swaps its image;
        // permitted for the creator or an admin. DELETE is admin-only, which
        // is checked inside the lifecycle service; ownership does not grant it.
        .route(
            "/hoardings/{id}",
            put(handlers::edit_hoarding).delete(handlers::delete_hoarding),
        )
}
