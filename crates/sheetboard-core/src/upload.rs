//! Image and file uploads from inline data URLs.
//!
//! The page sends uploads as `data:<mime>;base64,<payload>` strings. They are
//! parsed and decoded completely before the blob store is touched, so a
//! malformed upload never leaves a partial blob behind.

use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use regex::Regex;
use serde::Serialize;
use tokio::io::AsyncWriteExt;

use crate::{Error, Result};

static DATA_URL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^data:([A-Za-z0-9.+/-]+(?:;[A-Za-z0-9=._-]+)*);base64,(.+)$")
        .expect("data URL regex should compile")
});

/// Characters outside this set are replaced in uploaded file names.
static UNSAFE_NAME_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_ .-]").expect("file name regex should compile"));

/// Long Drive file IDs embedded in share links.
static DRIVE_FILE_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[-\w]{25,}").expect("drive id regex should compile"));

const DRIVE_HOST: &str = "drive.google.com";

/// How many suffixed names the local store tries before giving up.
const MAX_NAME_ATTEMPTS: u32 = 100;

/// Decoded `data:` URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUrl {
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl DataUrl {
    /// Parse and decode a `data:<mime>;base64,<payload>` string.
    pub fn parse(input: &str) -> Result<Self> {
        let caps = DATA_URL_REGEX
            .captures(input.trim())
            .ok_or_else(|| Error::Format("expected data:<mime>;base64,<payload>".to_string()))?;

        // Parameters such as `;charset=utf-8` are not part of the MIME type.
        let mime = caps[1]
            .split(';')
            .next()
            .unwrap_or_default()
            .to_string();

        let payload: String = caps[2].chars().filter(|c| !c.is_whitespace()).collect();
        let bytes = STANDARD
            .decode(payload.as_bytes())
            .map_err(|e| Error::Format(format!("invalid base64 payload: {e}")))?;

        Ok(Self { mime, bytes })
    }
}

/// Replace characters outside `[A-Za-z0-9_ .-]` with `_`.
pub fn sanitize_file_name(name: &str) -> String {
    UNSAFE_NAME_CHARS.replace_all(name, "_").into_owned()
}

/// Rewrite Drive share links into a fixed-size thumbnail URL for display.
///
/// Any other URL is returned unchanged. Stored URLs are never rewritten; this
/// is only applied when an image URL is handed to the page.
pub fn format_drive_url(url: &str) -> String {
    if url.is_empty() {
        return String::new();
    }
    if url.contains(DRIVE_HOST) {
        if let Some(id) = DRIVE_FILE_ID.find(url) {
            return format!("https://lh3.google.com/u/0/d/{}=w640-h480-iv1", id.as_str());
        }
    }
    url.to_string()
}

/// Folder handle returned by [`BlobStore::ensure_folder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Folder {
    pub name: String,
}

/// A stored blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    /// Store-specific identifier.
    pub id: String,
    /// URL the blob can be fetched from once shared.
    pub url: String,
}

/// Blob storage with URL-returning uploads and link sharing.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Get the named folder, creating it if needed.
    async fn ensure_folder(&self, name: &str) -> Result<Folder>;

    /// Store `bytes` as a new blob in `folder`.
    async fn create_file(
        &self,
        folder: &Folder,
        name: &str,
        mime: &str,
        bytes: Vec<u8>,
    ) -> Result<StoredBlob>;

    /// Make the blob viewable by anyone with its URL (read-only).
    async fn share_with_link(&self, blob: &StoredBlob) -> Result<()>;
}

/// Result of a file upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    pub file_url: String,
    /// Name as supplied by the uploader, before sanitizing.
    pub file_name: String,
}

/// Uploads decoded data URLs into a [`BlobStore`].
pub struct Uploader {
    store: Arc<dyn BlobStore>,
}

impl Uploader {
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self { store }
    }

    /// Upload an image and return its stored URL.
    pub async fn upload_image(&self, folder: &str, data_url: &str) -> Result<String> {
        let data = DataUrl::parse(data_url)?;
        let name = format!("image_{}", unix_millis());
        let blob = self.put(folder, &name, data).await?;
        Ok(blob.url)
    }

    /// Upload an image for the editor and return a display URL.
    pub async fn upload_editor_image(&self, folder: &str, data_url: &str) -> Result<String> {
        let url = self.upload_image(folder, data_url).await?;
        Ok(format_drive_url(&url))
    }

    /// Upload an arbitrary file, keeping a sanitized form of its name.
    pub async fn upload_file(
        &self,
        folder: &str,
        file_name: &str,
        data_url: &str,
    ) -> Result<UploadedFile> {
        let data = DataUrl::parse(data_url)?;
        let name = format!("{}_{}", sanitize_file_name(file_name), unix_millis());
        let blob = self.put(folder, &name, data).await?;
        Ok(UploadedFile {
            file_url: blob.url,
            file_name: file_name.to_string(),
        })
    }

    async fn put(&self, folder: &str, name: &str, data: DataUrl) -> Result<StoredBlob> {
        let size = data.bytes.len();
        let folder = self.store.ensure_folder(folder).await?;
        let blob = self
            .store
            .create_file(&folder, name, &data.mime, data.bytes)
            .await?;
        self.store.share_with_link(&blob).await?;

        metrics::counter!("board_uploads_total").increment(1);
        tracing::info!(
            folder = %folder.name,
            name = %name,
            mime = %data.mime,
            bytes = size,
            "blob uploaded"
        );

        Ok(blob)
    }
}

fn unix_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Blob store on the local filesystem.
///
/// Blobs live at `<root>/<folder>/<name>` and are served by the HTTP layer at
/// `<public_base_url>/files/<folder>/<name>`.
pub struct LocalBlobStore {
    root: PathBuf,
    public_base_url: String,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn folder_path(&self, name: &str) -> Result<PathBuf> {
        // Folder names come from the settings table; keep them to one path segment.
        let safe = sanitize_file_name(name);
        if safe.trim_matches('.').is_empty() {
            return Err(Error::Storage(format!("invalid folder name '{name}'")));
        }
        Ok(self.root.join(safe))
    }
}

fn storage_error(action: &str, path: &Path, err: std::io::Error) -> Error {
    Error::Storage(format!("failed to {action} {}: {err}", path.display()))
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn ensure_folder(&self, name: &str) -> Result<Folder> {
        let path = self.folder_path(name)?;
        tokio::fs::create_dir_all(&path)
            .await
            .map_err(|e| storage_error("create folder", &path, e))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Folder { name })
    }

    async fn create_file(
        &self,
        folder: &Folder,
        name: &str,
        _mime: &str,
        bytes: Vec<u8>,
    ) -> Result<StoredBlob> {
        let base = sanitize_file_name(name);
        let dir = self.folder_path(&folder.name)?;

        // Never overwrite: a taken name gets a `_<n>` suffix.
        let mut attempt = 0;
        let (name, path, mut file) = loop {
            let candidate = if attempt == 0 {
                base.clone()
            } else {
                format!("{base}_{attempt}")
            };
            let path = dir.join(&candidate);
            match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => break (candidate, path, file),
                Err(e)
                    if e.kind() == std::io::ErrorKind::AlreadyExists
                        && attempt < MAX_NAME_ATTEMPTS =>
                {
                    attempt += 1;
                }
                Err(e) => return Err(storage_error("create", &path, e)),
            }
        };

        file.write_all(&bytes)
            .await
            .map_err(|e| storage_error("write", &path, e))?;
        file.flush()
            .await
            .map_err(|e| storage_error("write", &path, e))?;

        let id = format!("{}/{}", folder.name, name);
        let url = format!("{}/files/{}", self.public_base_url, id);
        Ok(StoredBlob { id, url })
    }

    async fn share_with_link(&self, blob: &StoredBlob) -> Result<()> {
        let path = self.root.join(&blob.id);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644))
                .await
                .map_err(|e| storage_error("share", &path, e))?;
        }

        #[cfg(not(unix))]
        {
            tokio::fs::metadata(&path)
                .await
                .map_err(|e| storage_error("share", &path, e))?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    /// Records calls so tests can assert nothing reached the store.
    #[derive(Default)]
    struct RecordingStore {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl BlobStore for RecordingStore {
        async fn ensure_folder(&self, name: &str) -> Result<Folder> {
            self.calls.lock().push(format!("folder:{name}"));
            Ok(Folder {
                name: name.to_string(),
            })
        }

        async fn create_file(
            &self,
            folder: &Folder,
            name: &str,
            mime: &str,
            bytes: Vec<u8>,
        ) -> Result<StoredBlob> {
            self.calls
                .lock()
                .push(format!("create:{}/{name}:{mime}:{}", folder.name, bytes.len()));
            Ok(StoredBlob {
                id: name.to_string(),
                url: format!("https://drive.google.com/file/d/{}/view", "a".repeat(33)),
            })
        }

        async fn share_with_link(&self, blob: &StoredBlob) -> Result<()> {
            self.calls.lock().push(format!("share:{}", blob.id));
            Ok(())
        }
    }

    /// Fails at one step so tests can check what the uploader does next.
    struct FailingStore {
        fail_on: &'static str,
        calls: Mutex<Vec<String>>,
    }

    impl FailingStore {
        fn new(fail_on: &'static str) -> Self {
            Self {
                fail_on,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn record(&self, step: &'static str) -> Result<()> {
            self.calls.lock().push(step.to_string());
            if self.fail_on == step {
                Err(Error::Storage(format!("{step} refused")))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl BlobStore for FailingStore {
        async fn ensure_folder(&self, name: &str) -> Result<Folder> {
            self.record("folder")?;
            Ok(Folder {
                name: name.to_string(),
            })
        }

        async fn create_file(
            &self,
            _folder: &Folder,
            name: &str,
            _mime: &str,
            _bytes: Vec<u8>,
        ) -> Result<StoredBlob> {
            self.record("create")?;
            Ok(StoredBlob {
                id: name.to_string(),
                url: format!("https://blobs.example/{name}"),
            })
        }

        async fn share_with_link(&self, _blob: &StoredBlob) -> Result<()> {
            self.record("share")
        }
    }

    const PNG_DATA_URL: &str = "data:image/png;base64,iVBORw0KGgo=";

    #[test]
    fn test_parse_data_url() {
        let data = DataUrl::parse(PNG_DATA_URL).unwrap();
        assert_eq!(data.mime, "image/png");
        assert_eq!(data.bytes, b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn test_parse_strips_mime_parameters() {
        let data = DataUrl::parse("data:text/plain;charset=utf-8;base64,aGk=").unwrap();
        assert_eq!(data.mime, "text/plain");
        assert_eq!(data.bytes, b"hi");
    }

    #[test]
    fn test_parse_rejects_missing_base64_marker() {
        let err = DataUrl::parse("data:image/png,iVBORw0KGgo=").unwrap_err();
        assert!(matches!(err, Error::Format(_)));
    }

    #[test]
    fn test_parse_rejects_bad_payload() {
        let err = DataUrl::parse("data:image/png;base64,!!!").unwrap_err();
        assert!(matches!(err, Error::Format(_)));
    }

    #[test]
    fn test_parse_rejects_plain_url() {
        assert!(DataUrl::parse("https://example.com/cat.png").is_err());
        assert!(DataUrl::parse("").is_err());
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("report v2.pdf"), "report v2.pdf");
        assert_eq!(sanitize_file_name("a/b\\c?.txt"), "a_b_c_.txt");
        assert_eq!(sanitize_file_name("資料.xlsx"), "__.xlsx");
    }

    #[test]
    fn test_sanitize_keeps_only_plain_spaces() {
        assert_eq!(sanitize_file_name("a\tb\nc.txt"), "a_b_c.txt");
        assert_eq!(sanitize_file_name("a\u{a0}b.txt"), "a_b.txt");
        assert_eq!(sanitize_file_name("a b.txt"), "a b.txt");
    }

    #[test]
    fn test_format_drive_url() {
        let id = "1AbCdEfGhIjKlMnOpQrStUvWxYz012345";
        let share = format!("https://drive.google.com/file/d/{id}/view?usp=drivesdk");
        assert_eq!(
            format_drive_url(&share),
            format!("https://lh3.google.com/u/0/d/{id}=w640-h480-iv1")
        );
    }

    #[test]
    fn test_format_drive_url_passthrough() {
        assert_eq!(format_drive_url(""), "");
        assert_eq!(
            format_drive_url("https://example.com/files/x.png"),
            "https://example.com/files/x.png"
        );
        // Drive host but no long ID
        assert_eq!(
            format_drive_url("https://drive.google.com/short"),
            "https://drive.google.com/short"
        );
    }

    #[tokio::test]
    async fn test_malformed_upload_never_reaches_store() {
        let store = Arc::new(RecordingStore::default());
        let uploader = Uploader::new(store.clone());

        let err = uploader
            .upload_image("bbs_files", "data:image/png,abc")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Format(_)));

        let err = uploader
            .upload_file("bbs_files", "x.txt", "not a data url")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Format(_)));

        assert!(store.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_upload_image_creates_then_shares() {
        let store = Arc::new(RecordingStore::default());
        let uploader = Uploader::new(store.clone());

        let url = uploader.upload_image("bbs_files", PNG_DATA_URL).await.unwrap();
        assert!(url.contains("drive.google.com"));

        let calls = store.calls.lock();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0], "folder:bbs_files");
        assert!(calls[1].starts_with("create:bbs_files/image_"));
        assert!(calls[1].ends_with(":image/png:8"));
        assert!(calls[2].starts_with("share:image_"));
    }

    #[tokio::test]
    async fn test_editor_upload_returns_display_url() {
        let uploader = Uploader::new(Arc::new(RecordingStore::default()));
        let url = uploader
            .upload_editor_image("bbs_files", PNG_DATA_URL)
            .await
            .unwrap();
        assert!(url.starts_with("https://lh3.google.com/u/0/d/"));
        assert!(url.ends_with("=w640-h480-iv1"));
    }

    #[tokio::test]
    async fn test_upload_file_keeps_original_name() {
        let store = Arc::new(RecordingStore::default());
        let uploader = Uploader::new(store.clone());

        let uploaded = uploader
            .upload_file("docs", "my notes?.txt", "data:text/plain;base64,aGk=")
            .await
            .unwrap();
        assert_eq!(uploaded.file_name, "my notes?.txt");

        let calls = store.calls.lock();
        assert!(calls[1].starts_with("create:docs/my notes_.txt_"));
    }

    #[tokio::test]
    async fn test_local_store_writes_and_links() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(LocalBlobStore::new(dir.path(), "http://localhost:8080/"));
        let uploader = Uploader::new(store.clone());

        let uploaded = uploader
            .upload_file("bbs_files", "hello.txt", "data:text/plain;base64,aGVsbG8=")
            .await
            .unwrap();

        assert!(
            uploaded
                .file_url
                .starts_with("http://localhost:8080/files/bbs_files/hello.txt_")
        );

        let stored_name = uploaded.file_url.rsplit('/').next().unwrap();
        let contents = std::fs::read(dir.path().join("bbs_files").join(stored_name)).unwrap();
        assert_eq!(contents, b"hello");
    }

    #[tokio::test]
    async fn test_failed_create_is_not_shared() {
        let store = Arc::new(FailingStore::new("create"));
        let uploader = Uploader::new(store.clone());

        let err = uploader
            .upload_image("bbs_files", PNG_DATA_URL)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
        assert_eq!(*store.calls.lock(), ["folder", "create"]);
    }

    #[tokio::test]
    async fn test_failed_share_surfaces_storage_error() {
        let store = Arc::new(FailingStore::new("share"));
        let uploader = Uploader::new(store.clone());

        let err = uploader
            .upload_file("bbs_files", "a.txt", "data:text/plain;base64,aGk=")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
        assert_eq!(*store.calls.lock(), ["folder", "create", "share"]);
    }

    #[tokio::test]
    async fn test_back_to_back_uploads_keep_both_blobs() {
        let dir = tempfile::tempdir().unwrap();
        let uploader = Uploader::new(Arc::new(LocalBlobStore::new(dir.path(), "http://x")));

        let first = uploader
            .upload_image("f", "data:text/plain;base64,QUFB")
            .await
            .unwrap();
        let second = uploader
            .upload_image("f", "data:text/plain;base64,QkJC")
            .await
            .unwrap();
        assert_ne!(first, second);

        let read = |url: &str| {
            let name = url.rsplit('/').next().unwrap();
            std::fs::read(dir.path().join("f").join(name)).unwrap()
        };
        assert_eq!(read(&first), b"AAA");
        assert_eq!(read(&second), b"BBB");
    }

    #[tokio::test]
    async fn test_local_store_never_overwrites_same_name() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path(), "http://x");
        let folder = store.ensure_folder("f").await.unwrap();

        let a = store
            .create_file(&folder, "image_1", "text/plain", b"AAA".to_vec())
            .await
            .unwrap();
        let b = store
            .create_file(&folder, "image_1", "text/plain", b"BBB".to_vec())
            .await
            .unwrap();

        assert_eq!(a.url, "http://x/files/f/image_1");
        assert_eq!(b.url, "http://x/files/f/image_1_1");
        assert_eq!(std::fs::read(dir.path().join("f/image_1")).unwrap(), b"AAA");
        assert_eq!(std::fs::read(dir.path().join("f/image_1_1")).unwrap(), b"BBB");
    }

    #[tokio::test]
    async fn test_local_store_rejects_dot_folder() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path(), "http://localhost");
        let err = store.ensure_folder("..").await.unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
    }
}
