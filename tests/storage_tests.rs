use hoarding_portal::{
    models::ImageUpload,
    storage::{ImageStore, LocalImageStore, MockImageStore, allowed_file, sanitize_filename},
};
use std::collections::HashSet;
use uuid::Uuid;

fn default_extensions() -> HashSet<String> {
    ["png", "jpg", "jpeg", "gif"]
        .into_iter()
        .map(str::to_string)
        .collect()
}

fn upload(filename: &str) -> Option<ImageUpload> {
    Some(ImageUpload {
        filename: filename.to_string(),
        bytes: b"not-really-a-png".to_vec(),
    })
}

// --- Allow-list and Sanitization ---

#[cfg(test)]
mod validation_tests {
    use super::*;

    #[test]
    fn test_allowed_file_checks_extension_case_insensitively() {
        let allowed = default_extensions();
        assert!(allowed_file("site.png", &allowed));
        assert!(allowed_file("SITE.PNG", &allowed));
        assert!(allowed_file("archive.tar.jpg", &allowed));
        assert!(!allowed_file("payload.exe", &allowed));
        assert!(!allowed_file("noextension", &allowed));
        // The check looks at the last dot segment only.
        assert!(!allowed_file("photo.png.exe", &allowed));
    }

    #[test]
    fn test_sanitize_strips_path_traversal() {
        let name = sanitize_filename("../../etc/passwd.png");
        assert!(!name.contains(".."));
        assert!(!name.contains('/'));
        assert!(name.ends_with("passwd.png"));
    }

    #[test]
    fn test_sanitize_collapses_whitespace_and_odd_characters() {
        assert_eq!(sanitize_filename("my photo (1).png"), "my_photo_1.png");
        assert_eq!(sanitize_filename("..\\..\\shot.jpg"), "shot.jpg");
        // Nothing printable survives: the caller must treat this as invalid.
        assert_eq!(sanitize_filename("../.."), "");
    }
}

// --- Mock Store ---

#[cfg(test)]
mod mock_tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_accepts_and_records_sanitized_name() {
        let mock = MockImageStore::new();
        let stored = mock.accept(upload("my billboard.PNG")).await.unwrap();
        assert_eq!(stored.as_deref(), Some("my_billboard.PNG"));
        assert_eq!(mock.saved.read().as_slice(), ["my_billboard.PNG"]);
    }

    #[tokio::test]
    async fn test_mock_passes_through_missing_upload() {
        let mock = MockImageStore::new();
        let stored = mock.accept(None).await.unwrap();
        assert!(stored.is_none());
        assert!(mock.saved.read().is_empty());
    }

    #[tokio::test]
    async fn test_mock_rejects_disallowed_extension() {
        let mock = MockImageStore::new();
        let result = mock.accept(upload("payload.exe")).await;
        assert!(result.is_err());
        assert!(mock.saved.read().is_empty());
    }

    #[tokio::test]
    async fn test_mock_failure_simulation() {
        let mock = MockImageStore::new_failing();
        let result = mock.accept(upload("site.png")).await;
        assert!(result.is_err());
    }
}

// --- Local Disk Store ---

#[cfg(test)]
mod local_tests {
    use super::*;

    fn temp_root() -> std::path::PathBuf {
        std::env::temp_dir().join(format!("hoarding-uploads-{}", Uuid::new_v4()))
    }

    #[tokio::test]
    async fn test_local_store_writes_file_under_root() {
        let root = temp_root();
        let store = LocalImageStore::new(root.clone(), default_extensions());

        let stored = store
            .accept(upload("site photo.png"))
            .await
            .unwrap()
            .expect("upload should be accepted");
        assert_eq!(stored, "site_photo.png");

        let written = tokio::fs::read(root.join(&stored)).await.unwrap();
        assert_eq!(written, b"not-really-a-png");

        tokio::fs::remove_dir_all(&root).await.ok();
    }

    #[tokio::test]
    async fn test_local_store_overwrites_same_name() {
        let root = temp_root();
        let store = LocalImageStore::new(root.clone(), default_extensions());

        store.accept(upload("site.png")).await.unwrap();
        store
            .accept(Some(ImageUpload {
                filename: "site.png".to_string(),
                bytes: b"second-version".to_vec(),
            }))
            .await
            .unwrap();

        let written = tokio::fs::read(root.join("site.png")).await.unwrap();
        assert_eq!(written, b"second-version");

        tokio::fs::remove_dir_all(&root).await.ok();
    }

    #[tokio::test]
    async fn test_local_store_rejects_before_touching_disk() {
        let root = temp_root();
        let store = LocalImageStore::new(root.clone(), default_extensions());

        let result = store.accept(upload("script.sh")).await;
        assert!(result.is_err());
        // The root directory is only created on an accepted write.
        assert!(!root.exists());
    }

    #[tokio::test]
    async fn test_local_store_collapses_dotted_prefix_to_bare_name() {
        let root = temp_root();
        let store = LocalImageStore::new(root.clone(), default_extensions());

        // "....png" passes the allow-list; edge dots are trimmed away and the
        // file lands under the surviving name.
        let stored = store.accept(upload("....png")).await.unwrap();
        assert_eq!(stored.as_deref(), Some("png"));

        tokio::fs::remove_dir_all(&root).await.ok();
    }
}
