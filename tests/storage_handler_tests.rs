use hoarding_portal::{
    AppConfig, AppState, AuthManager, AuthState, LocalImageStore, RecordService, auth,
    create_router, memory_stores, models::DashboardData, repository::UserStoreState,
};
use reqwest::{StatusCode, multipart, redirect::Policy};
use std::{path::PathBuf, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use uuid::Uuid;

// End-to-end coverage of the image pipeline: multipart ingestion, the
// extension allow-list, sanitization, disk placement under the configured
// upload root, and serving back through the static mount.

pub struct TestApp {
    pub address: String,
    pub root: PathBuf,
    pub users: UserStoreState,
}

async fn spawn_app() -> TestApp {
    let root = std::env::temp_dir().join(format!("hoarding-uploads-{}", Uuid::new_v4()));

    let config = AppConfig {
        upload_dir: root.clone(),
        ..AppConfig::default()
    };

    let (users, hoardings) = memory_stores();
    let images = Arc::new(LocalImageStore::new(
        root.clone(),
        config.allowed_extensions.clone(),
    ));
    let auth_state: AuthState = Arc::new(AuthManager::new(
        users.clone(),
        Duration::from_secs(60 * 60),
    ));
    let service = Arc::new(RecordService::new(users.clone(), hoardings, images));

    let state = AppState {
        service,
        auth: auth_state,
        config,
    };
    let router = create_router(state);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    TestApp {
        address,
        root,
        users,
    }
}

fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(Policy::none())
        .cookie_store(true)
        .build()
        .unwrap()
}

async fn login_as(app: &TestApp, email: &str, is_admin: bool) -> reqwest::Client {
    let hash = auth::hash_password("hunter2!").unwrap();
    app.users
        .add_user(email, &hash, is_admin)
        .await
        .unwrap()
        .expect("seed user should not conflict");

    let client = client();
    let response = client
        .post(format!("{}/login", app.address))
        .form(&[("email", email), ("password", "hunter2!")])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    client
}

fn record_form(image_name: Option<&str>, bytes: &[u8]) -> multipart::Form {
    let mut form = multipart::Form::new()
        .text("size", "20x10 ft")
        .text("place", "Surat")
        .text("owner_name", "Mehta Ads")
        .text("contact", "9876543210")
        .text("address", "NH-48 service road")
        .text("location_url", "https://maps.example.com/x")
        .text("renewal_date", "2026-09-15")
        .text("amount", "42000");
    if let Some(name) = image_name {
        form = form.part(
            "image",
            multipart::Part::bytes(bytes.to_vec()).file_name(name.to_string()),
        );
    }
    form
}

async fn dashboard(client: &reqwest::Client, app: &TestApp) -> DashboardData {
    client
        .get(format!("{}/dashboard", app.address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}

#[tokio::test]
async fn test_uploaded_image_is_stored_and_served() {
    let app = spawn_app().await;
    let client = login_as(&app, "user@example.com", false).await;

    let response = client
        .post(format!("{}/hoardings", app.address))
        .multipart(record_form(Some("site photo.png"), b"png-bytes"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let data = dashboard(&client, &app).await;
    assert_eq!(
        data.hoardings[0].image_filename.as_deref(),
        Some("site_photo.png")
    );

    // On disk under the configured root...
    let written = tokio::fs::read(app.root.join("site_photo.png"))
        .await
        .unwrap();
    assert_eq!(written, b"png-bytes");

    // ...and reachable through the static mount.
    let served = client
        .get(format!("{}/uploads/site_photo.png", app.address))
        .send()
        .await
        .unwrap();
    assert_eq!(served.status(), StatusCode::OK);
    assert_eq!(served.bytes().await.unwrap().as_ref(), b"png-bytes");

    tokio::fs::remove_dir_all(&app.root).await.ok();
}

#[tokio::test]
async fn test_disallowed_extension_rejects_whole_submission() {
    let app = spawn_app().await;
    let client = login_as(&app, "user@example.com", false).await;

    let response = client
        .post(format!("{}/hoardings", app.address))
        .multipart(record_form(Some("payload.exe"), b"MZ"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], "File type not allowed: payload.exe");

    // Neither a record nor a file came out of it.
    let data = dashboard(&client, &app).await;
    assert_eq!(data.total_count, 0);
    assert!(!app.root.join("payload.exe").exists());
}

#[tokio::test]
async fn test_traversal_filename_stays_inside_upload_root() {
    let app = spawn_app().await;
    let client = login_as(&app, "user@example.com", false).await;

    let response = client
        .post(format!("{}/hoardings", app.address))
        .multipart(record_form(Some("../../escape.png"), b"png-bytes"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    // The separators are gone from the stored name and the file sits
    // directly under the root, not two levels above it.
    let data = dashboard(&client, &app).await;
    assert_eq!(
        data.hoardings[0].image_filename.as_deref(),
        Some("escape.png")
    );
    assert!(app.root.join("escape.png").exists());
    assert!(!app.root.parent().unwrap().join("escape.png").exists());

    tokio::fs::remove_dir_all(&app.root).await.ok();
}

#[tokio::test]
async fn test_edit_without_new_upload_keeps_previous_image() {
    let app = spawn_app().await;
    let client = login_as(&app, "user@example.com", false).await;

    client
        .post(format!("{}/hoardings", app.address))
        .multipart(record_form(Some("original.png"), b"v1"))
        .send()
        .await
        .unwrap();
    let id = dashboard(&client, &app).await.hoardings[0].id;

    // Resubmit the form without selecting a file.
    let response = client
        .put(format!("{}/hoardings/{}", app.address, id))
        .multipart(record_form(None, b""))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let data = dashboard(&client, &app).await;
    assert_eq!(
        data.hoardings[0].image_filename.as_deref(),
        Some("original.png")
    );

    tokio::fs::remove_dir_all(&app.root).await.ok();
}

#[tokio::test]
async fn test_deleting_record_leaves_image_on_disk() {
    let app = spawn_app().await;
    let admin = login_as(&app, "admin@example.com", true).await;

    admin
        .post(format!("{}/hoardings", app.address))
        .multipart(record_form(Some("kept.png"), b"png-bytes"))
        .send()
        .await
        .unwrap();
    let id = dashboard(&admin, &app).await.hoardings[0].id;

    let response = admin
        .delete(format!("{}/hoardings/{}", app.address, id))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    // The record is gone; the file stays behind for manual cleanup.
    let data = dashboard(&admin, &app).await;
    assert_eq!(data.total_count, 0);
    assert!(app.root.join("kept.png").exists());

    tokio::fs::remove_dir_all(&app.root).await.ok();
}
