use axum::{
    Json, Router,
    extract::{FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
    routing::get,
};
use utoipa::OpenApi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    services::ServeDir,
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Modules ---

// Domain components, wired together in create_router below.
pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod policy;
pub mod repository;
pub mod service;
pub mod storage;

// Route tables, split by the access level they require.
pub mod routes;
use auth::AuthUser;
use routes::{admin, authenticated, public};

// --- Re-exports ---

// State types main.rs and the integration tests assemble the app from.
pub use auth::{AuthManager, AuthState};
pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use repository::{HoardingStoreState, PostgresRepository, UserStoreState, memory_stores};
pub use service::{RecordService, ServiceState};
pub use storage::{ImageStoreState, LocalImageStore, MockImageStore};

/// ApiDoc
///
/// Aggregate OpenAPI document, assembled from every handler annotated with
/// `#[utoipa::path]` plus the `ToSchema` types those handlers mention.
/// Served as plain JSON at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    // Every documented handler must be registered here or it silently
    // vanishes from the generated document.
    paths(
        handlers::login_page, handlers::login, handlers::logout,
        handlers::dashboard, handlers::add_hoarding, handlers::edit_hoarding,
        handlers::delete_hoarding, handlers::list_users, handlers::create_user
    ),
    components(
        schemas(
            models::User, models::Hoarding, models::MatchMode,
            models::LoginRequest, models::CreateUserRequest,
            models::HoardingForm, models::DashboardData,
        )
    ),
    tags(
        (name = "hoarding-portal", description = "Hoarding record management API")
    )
)]
struct ApiDoc;

/// AppState
///
/// The one shared container every request handler sees: the lifecycle
/// service, the auth manager and the loaded configuration. Cloning is cheap
/// (Arc handles all the way down) and nothing in it is mutable after startup.
#[derive(Clone)]
pub struct AppState {
    /// Record lifecycle service: validation, authorization and persistence.
    pub service: ServiceState,
    /// Authentication: credential verification and the in-memory session table.
    pub auth: AuthState,
    /// Loaded environment configuration.
    pub config: AppConfig,
}

// --- FromRef projections ---

// Lets extractors (and the AuthUser middleware) pull just the sub-state they
// need instead of taking the whole AppState.

impl FromRef<AppState> for ServiceState {
    fn from_ref(app_state: &AppState) -> ServiceState {
        app_state.service.clone()
    }
}

impl FromRef<AppState> for AuthState {
    fn from_ref(app_state: &AppState) -> AuthState {
        app_state.auth.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// auth_middleware
///
/// Session gate for the `authenticated_routes` table. Running the `AuthUser`
/// extractor as middleware means a request without a live session never
/// reaches its handler; the extractor's rejection (a 303 to `/login`) becomes
/// the response. Requests that pass are forwarded untouched, and the handler
/// extracts `AuthUser` again for the identity itself.
async fn auth_middleware(_auth_user: AuthUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// create_router
///
/// Builds the full application router: the three route tables, the static
/// upload mount, the shared state, and the outer observability/CORS layers.
pub fn create_router(state: AppState) -> Router {
    // CORS is wide open; the portal is internal and the frontend origin
    // varies between deployments.
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    // Correlation header shared by the set/propagate layers below.
    let x_request_id = HeaderName::from_static("x-request-id");

    // Accepted images are served straight from the upload directory.
    let uploads = ServeDir::new(state.config.upload_dir.clone());

    let base_router = Router::new()
        // The generated OpenAPI document, as plain JSON.
        .route(
            "/api-docs/openapi.json",
            get(|| async { Json(ApiDoc::openapi()) }),
        )
        // No session required here.
        .merge(public::public_routes())
        // Everything in this table sits behind the session gate.
        .merge(
            authenticated::authenticated_routes()
                .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware)),
        )
        // Admin routes authenticate via the AuthUser extractor in each
        // handler; the admin check itself runs inside the lifecycle
        // service, so a logged-in non-admin gets a 403 instead of a
        // redirect.
        .nest("/admin", admin::admin_routes())
        .nest_service("/uploads", uploads)
        .with_state(state);

    // Outer layers: give every request an id, trace it, and echo the id
    // back out, then CORS around the lot.
    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Span constructor for `TraceLayer`: one span per request, carrying the
/// method, the URI and the generated request id so every log line emitted
/// while handling a request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
