use crate::error::{AppError, AppResult, ValidationError};
use crate::models::ImageUpload;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;

// --- Store contract ---
/// ImageStore
///
/// Defines the abstract contract for image attachment handling. This trait
/// allows us to swap the concrete implementation, from the real filesystem
/// writer (LocalImageStore) in production to the in-memory Mock
/// (MockImageStore) during testing, without affecting the calling service.
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Validates and persists an uploaded image.
    ///
    /// A missing upload is not an error: it yields `Ok(None)` and the record
    /// simply carries no image. A present upload must pass the extension
    /// allow-list on its original client-supplied name; the name is then
    /// sanitized and the bytes written under it, overwriting any existing file
    /// of the same name. Returns the stored filename for the record to
    /// reference.
    async fn accept(&self, upload: Option<ImageUpload>) -> AppResult<Option<String>>;
}

/// ImageStoreState
///
/// The concrete type used to share the image store across the application state.
pub type ImageStoreState = Arc<dyn ImageStore>;

/// allowed_file
///
/// The extension allow-list check: the name must contain a `.` and the
/// lowercased suffix after the last `.` must be in the configured set. The
/// check is deliberately limited to the name, no content sniffing happens.
pub fn allowed_file(filename: &str, allowed: &HashSet<String>) -> bool {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| allowed.contains(&ext.to_lowercase()))
        .unwrap_or(false)
}

/// sanitize_filename
///
/// Flattens a client-supplied filename into something safe to place directly
/// in the upload directory: path separators become underscores, anything
/// outside `[A-Za-z0-9._-]` is dropped, and leading/trailing dots and
/// underscores are trimmed so no traversal component survives. May return an
/// empty string for degenerate inputs; callers must treat that as invalid.
pub fn sanitize_filename(name: &str) -> String {
    let joined = name
        .replace(['/', '\\'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_");

    joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect::<String>()
        .trim_matches(['.', '_'])
        .to_string()
}

// --- Filesystem-backed store ---
/// LocalImageStore
///
/// Writes accepted images to the configured upload directory, named by their
/// sanitized original filename. No subdirectory partitioning or content
/// hashing: a record references its image by bare name, and a name collision
/// overwrites the previous file.
#[derive(Clone)]
pub struct LocalImageStore {
    root: PathBuf,
    allowed: HashSet<String>,
}

impl LocalImageStore {
    /// Constructs the store from the configured upload directory and
    /// extension allow-list.
    pub fn new(root: PathBuf, allowed: HashSet<String>) -> Self {
        Self { root, allowed }
    }
}

#[async_trait]
impl ImageStore for LocalImageStore {
    async fn accept(&self, upload: Option<ImageUpload>) -> AppResult<Option<String>> {
        let Some(upload) = upload else {
            return Ok(None);
        };

        if !allowed_file(&upload.filename, &self.allowed) {
            return Err(ValidationError::UnsupportedType(upload.filename).into());
        }

        let stored_name = sanitize_filename(&upload.filename);
        if stored_name.is_empty() {
            return Err(ValidationError::MalformedField {
                field: "image",
                reason: "filename empty after sanitization",
            }
            .into());
        }

        fs::create_dir_all(&self.root)
            .await
            .map_err(|e| AppError::Internal(format!("create upload dir: {e}")))?;

        let target = self.root.join(&stored_name);
        fs::write(&target, &upload.bytes)
            .await
            .map_err(|e| AppError::Internal(format!("write {}: {e}", target.display())))?;

        tracing::debug!(file = %stored_name, bytes = upload.bytes.len(), "image stored");
        Ok(Some(stored_name))
    }
}

// --- Mock store ---
/// MockImageStore
///
/// A mock implementation of `ImageStore` used exclusively for unit and
/// integration testing. It applies the same validation and sanitization as
/// the real store but records names instead of touching the filesystem, so
/// handler tests can assert on what would have been written.
#[derive(Clone)]
pub struct MockImageStore {
    /// When true, accepted uploads return a simulated infrastructure failure.
    pub should_fail: bool,
    /// Names the mock has "written", in acceptance order.
    pub saved: Arc<RwLock<Vec<String>>>,
    allowed: HashSet<String>,
}

impl MockImageStore {
    pub fn new() -> Self {
        Self {
            should_fail: false,
            saved: Arc::new(RwLock::new(Vec::new())),
            allowed: ["png", "jpg", "jpeg", "gif"]
                .into_iter()
                .map(str::to_string)
                .collect(),
        }
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::new()
        }
    }
}

impl Default for MockImageStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ImageStore for MockImageStore {
    async fn accept(&self, upload: Option<ImageUpload>) -> AppResult<Option<String>> {
        let Some(upload) = upload else {
            return Ok(None);
        };

        if !allowed_file(&upload.filename, &self.allowed) {
            return Err(ValidationError::UnsupportedType(upload.filename).into());
        }

        if self.should_fail {
            return Err(AppError::Internal(
                "image store failure injected by test".to_string(),
            ));
        }

        let stored_name = sanitize_filename(&upload.filename);
        if stored_name.is_empty() {
            return Err(ValidationError::MalformedField {
                field: "image",
                reason: "filename empty after sanitization",
            }
            .into());
        }

        self.saved.write().push(stored_name.clone());
        Ok(Some(stored_name))
    }
}
