use hoarding_portal::{
    AppState, AuthManager, AuthState, HoardingStoreState, ImageStoreState, LocalImageStore,
    PostgresRepository, RecordService, ServiceState, UserStoreState,
    auth::hash_password,
    config::{AppConfig, Env},
    create_router,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Startup sequence: configuration, logging, database, upload storage,
/// bootstrap admin, then the HTTP server. Every step that cannot be
/// recovered from panics with a FATAL message rather than limping on.
#[tokio::main]
async fn main() {
    // .env first, so AppConfig::load sees its values.
    dotenv::dotenv().ok();
    // Panics on missing mandatory settings; better now than mid-request.
    let config = AppConfig::load();

    // RUST_LOG wins when set; otherwise a chatty default for development.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "hoarding_portal=debug,tower_http=info,axum=trace".into());

    // Log format follows the environment: readable locally, JSON for the
    // aggregator in production.
    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Starting in {:?} mode", config.env);

    // Postgres pool, then the embedded migrations before anything touches
    // the tables.
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.db_url)
        .await
        .expect("FATAL: Postgres is unreachable; check DATABASE_URL");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("FATAL: Failed to run database migrations.");

    // One repository instance serves both store facets.
    let repo = Arc::new(PostgresRepository::new(pool));
    let users: UserStoreState = repo.clone();
    let hoardings: HoardingStoreState = repo;

    // The upload directory is created up front so ServeDir and the store
    // never race on first write.
    tokio::fs::create_dir_all(&config.upload_dir)
        .await
        .expect("FATAL: Failed to create upload directory.");
    let images: ImageStoreState = Arc::new(LocalImageStore::new(
        config.upload_dir.clone(),
        config.allowed_extensions.clone(),
    ));

    // First-run bootstrap: an empty user table means nobody can log in, so
    // the configured admin is provisioned here. Existing deployments are
    // never touched.
    let user_count = users
        .count_users()
        .await
        .expect("FATAL: Failed to query the user table.");
    if user_count == 0 {
        match (&config.admin_email, &config.admin_password) {
            (Some(email), Some(password)) => {
                let hash =
                    hash_password(password).expect("FATAL: Failed to hash the bootstrap password.");
                users
                    .add_user(email, &hash, true)
                    .await
                    .expect("FATAL: Failed to create the bootstrap admin.");
                tracing::info!(email = %email, "bootstrap admin account created");
            }
            _ => {
                tracing::warn!(
                    "user table is empty and ADMIN_EMAIL/ADMIN_PASSWORD are not set; no account can log in"
                );
            }
        }
    }

    // Service assembly and the shared state.
    let auth: AuthState = Arc::new(AuthManager::new(
        users.clone(),
        Duration::from_secs(config.session_ttl_minutes * 60),
    ));
    let service: ServiceState = Arc::new(RecordService::new(users, hoardings, images));

    let app_state = AppState {
        service,
        auth,
        config,
    };

    let app = create_router(app_state);

    let listener = TcpListener::bind("0.0.0.0:3000").await.unwrap();

    tracing::info!("Listening on 0.0.0.0:3000");
    tracing::info!("API documentation at: http://localhost:3000/api-docs/openapi.json");

    axum::serve(listener, app).await.unwrap();
}
