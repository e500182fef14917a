use crate::{
    AppState, auth,
    auth::AuthUser,
    error::{AppError, ValidationError},
    models::{
        CreateUserRequest, DashboardData, HoardingFilter, HoardingForm, ImageUpload, LoginRequest,
        MatchMode, User,
    },
};
use axum::{
    Form, Json,
    extract::{Multipart, Path, Query, State},
    http::{HeaderMap, header},
    response::{AppendHeaders, IntoResponse, Redirect},
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

// --- Query parameters ---

/// DashboardQuery
///
/// Defines the accepted query parameters for the dashboard listing endpoint
/// (GET /dashboard). `match` selects the filter comparison mode and defaults
/// to case-insensitive substring matching.
#[derive(Deserialize, utoipa::IntoParams)]
pub struct DashboardQuery {
    /// Optional filter on the hoarding's place.
    pub place: Option<String>,
    /// Optional filter on the associated showroom name.
    pub showroom: Option<String>,
    /// Optional filter on the associated showroom location.
    pub location: Option<String>,
    /// "contains" (default) or "exact".
    #[serde(rename = "match", default)]
    pub match_mode: MatchMode,
}

// Empty query values mean "no filter", the way HTML forms submit untouched inputs.
fn presence(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

// --- Endpoint handlers ---

/// login_page
///
/// [Public Route] The unauthenticated landing point that protected routes
/// redirect to. Rendering is owned by the frontend; this endpoint only tells
/// clients where to submit credentials.
#[utoipa::path(
    get,
    path = "/login",
    responses((status = 200, description = "Login entry point"))
)]
pub async fn login_page() -> Json<serde_json::Value> {
    Json(json!({ "message": "Submit email and password to POST /login" }))
}

/// login
///
/// [Public Route] Verifies the submitted credentials and establishes a
/// session. On success the session token is set as an HttpOnly cookie and the
/// client is forwarded to the dashboard.
///
/// *Security*: failure is always the same generic 401, regardless of whether
/// the email was unknown or the password wrong.
#[utoipa::path(
    post,
    path = "/login",
    request_body(content = LoginRequest, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Session established, forwarded to dashboard"),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Form(payload): Form<LoginRequest>,
) -> Result<impl IntoResponse + std::fmt::Debug, AppError> {
    let token = state.auth.login(&payload.email, &payload.password).await?;
    Ok((
        AppendHeaders([(header::SET_COOKIE, auth::session_cookie(&token))]),
        Redirect::to("/dashboard"),
    ))
}

/// logout
///
/// [Authenticated Route] Invalidates the server-side session and clears the
/// cookie. The token cannot be replayed afterwards; a fresh login is required.
#[utoipa::path(
    get,
    path = "/logout",
    responses((status = 303, description = "Session cleared, forwarded to login"))
)]
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    if let Some(token) = auth::token_from_headers(&headers) {
        state.auth.logout(&token);
    }
    (
        AppendHeaders([(header::SET_COOKIE, auth::clear_session_cookie())]),
        Redirect::to("/login"),
    )
}

/// dashboard
///
/// [Authenticated Route] The main listing view: filtered records ordered by
/// renewal date, the dropdown option sets, headline counts, and the
/// per-showroom aggregation, all in one payload.
#[utoipa::path(
    get,
    path = "/dashboard",
    params(DashboardQuery),
    responses((status = 200, description = "Dashboard data", body = DashboardData))
)]
pub async fn dashboard(
    AuthUser(_user): AuthUser,
    State(state): State<AppState>,
    Query(query): Query<DashboardQuery>,
) -> Result<Json<DashboardData>, AppError> {
    let filter = HoardingFilter {
        place: presence(query.place),
        showroom: presence(query.showroom),
        location: presence(query.location),
        mode: query.match_mode,
    };
    let data = state.service.view_dashboard(&filter).await?;
    Ok(Json(data))
}

/// add_hoarding
///
/// [Authenticated Route] Creates a new record from the multipart form, with
/// an optional image attachment. Ownership is taken from the session, never
/// from the form.
#[utoipa::path(
    post,
    path = "/hoardings",
    request_body(content = HoardingForm, content_type = "multipart/form-data"),
    responses(
        (status = 303, description = "Created, forwarded to dashboard"),
        (status = 422, description = "Validation failure")
    )
)]
pub async fn add_hoarding(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let (form, upload) = collect_hoarding_form(multipart).await?;
    state.service.create_hoarding(&user, form, upload).await?;
    Ok(Redirect::to("/dashboard"))
}

/// edit_hoarding
///
/// [Authenticated Route] Replaces a record's fields, optionally swapping the
/// image. Permitted for the record's creator or an admin; everyone else gets
/// a 403 with the access-denied message.
#[utoipa::path(
    put,
    path = "/hoardings/{id}",
    params(("id" = Uuid, Path, description = "Hoarding ID")),
    request_body(content = HoardingForm, content_type = "multipart/form-data"),
    responses(
        (status = 303, description = "Updated, forwarded to dashboard"),
        (status = 403, description = "Not owner or admin"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn edit_hoarding(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let (form, upload) = collect_hoarding_form(multipart).await?;
    state.service.edit_hoarding(&user, id, form, upload).await?;
    Ok(Redirect::to("/dashboard"))
}

/// delete_hoarding
///
/// [Authenticated Route] Permanently removes a record. Admin-only; ownership
/// deliberately does not grant deletion.
#[utoipa::path(
    delete,
    path = "/hoardings/{id}",
    params(("id" = Uuid, Path, description = "Hoarding ID")),
    responses(
        (status = 303, description = "Deleted, forwarded to dashboard"),
        (status = 403, description = "Not an admin"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_hoarding(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse + std::fmt::Debug, AppError> {
    state.service.delete_hoarding(&user, id).await?;
    Ok(Redirect::to("/dashboard"))
}

/// list_users
///
/// [Admin Route] Enumerates all logins. The admin check happens in the
/// lifecycle service, so an authenticated non-admin receives a 403.
#[utoipa::path(
    get,
    path = "/admin/users",
    responses(
        (status = 200, description = "All users", body = [User]),
        (status = 403, description = "Not an admin")
    )
)]
pub async fn list_users(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<User>>, AppError> {
    Ok(Json(state.service.list_users(&user).await?))
}

/// create_user
///
/// [Admin Route] Provisions a new login. The admin flag arrives
/// checkbox-style (present means admin). A duplicate email conflicts without
/// touching the existing user's credential.
#[utoipa::path(
    post,
    path = "/admin/users",
    request_body(content = CreateUserRequest, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Created, forwarded to the user list"),
        (status = 403, description = "Not an admin"),
        (status = 409, description = "Email already taken")
    )
)]
pub async fn create_user(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Form(payload): Form<CreateUserRequest>,
) -> Result<impl IntoResponse + std::fmt::Debug, AppError> {
    state
        .service
        .create_user(&user, &payload.email, &payload.password, payload.admin_flag())
        .await?;
    Ok(Redirect::to("/admin/users"))
}

// --- Multipart Collection ---

/// collect_hoarding_form
///
/// Walks the multipart parts once, binding each known text field by name and
/// capturing the optional `image` part into memory. Unknown part names are
/// dropped on the floor, which is what makes mass assignment impossible at
/// this boundary.
async fn collect_hoarding_form(
    mut multipart: Multipart,
) -> Result<(HoardingForm, Option<ImageUpload>), AppError> {
    let mut form = HoardingForm::default();
    let mut upload = None;

    while let Some(field) = multipart.next_field().await.map_err(malformed_body)? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        if name == "image" {
            let filename = field.file_name().map(str::to_string);
            let bytes = field.bytes().await.map_err(malformed_body)?;
            // A file input left empty still posts a part, with an empty filename.
            if let Some(filename) = filename.filter(|f| !f.is_empty()) {
                upload = Some(ImageUpload {
                    filename,
                    bytes: bytes.to_vec(),
                });
            }
            continue;
        }

        let value = field.text().await.map_err(malformed_body)?;
        match name.as_str() {
            "size" => form.size = Some(value),
            "place" => form.place = Some(value),
            "owner_name" => form.owner_name = Some(value),
            "contact" => form.contact = Some(value),
            "address" => form.address = Some(value),
            "location_url" => form.location_url = Some(value),
            "showroom_name" => form.showroom_name = Some(value),
            "showroom_location" => form.showroom_location = Some(value),
            "renewal_date" => form.renewal_date = Some(value),
            "amount" => form.amount = Some(value),
            _ => {}
        }
    }

    Ok((form, upload))
}

fn malformed_body(err: axum::extract::multipart::MultipartError) -> AppError {
    tracing::debug!(error = %err, "rejecting multipart body");
    ValidationError::MalformedField {
        field: "form",
        reason: "malformed multipart payload",
    }
    .into()
}
