//! Application configuration loaded from environment variables.

use std::path::PathBuf;

use sheetboard_core::generate::{DEFAULT_ENDPOINT, DEFAULT_MODEL};

/// Application configuration.
#[derive(Clone)]
pub struct Config {
    /// Server bind address (e.g., "0.0.0.0:8080").
    pub bind_addr: String,

    /// Path to the SQLite file holding the post and settings tables.
    pub db_path: PathBuf,

    /// Root directory for uploaded blobs, served under `/files`.
    pub files_dir: PathBuf,

    /// Public base URL used to build upload URLs.
    pub public_url: String,

    /// Page title.
    pub title: String,

    /// Port for the Prometheus `/metrics` server. Disabled when unset.
    pub metrics_port: Option<u16>,

    /// Gemini API key. Drafting requests fail (as text) without one.
    pub gemini_api_key: Option<String>,

    /// Gemini model name.
    pub gemini_model: String,

    /// Gemini API base URL.
    pub gemini_endpoint: String,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("bind_addr", &self.bind_addr)
            .field("db_path", &self.db_path)
            .field("files_dir", &self.files_dir)
            .field("public_url", &self.public_url)
            .field("title", &self.title)
            .field("metrics_port", &self.metrics_port)
            .field("gemini_api_key", &self.gemini_api_key.as_ref().map(|_| "<redacted>"))
            .field("gemini_model", &self.gemini_model)
            .field("gemini_endpoint", &self.gemini_endpoint)
            .finish()
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Required:
    /// - None (all have defaults for local development)
    ///
    /// Optional:
    /// - `BOARD_BIND_ADDR`: Server bind address (default: "0.0.0.0:8080")
    /// - `BOARD_DB_PATH`: SQLite file (default: "data/board.db")
    /// - `BOARD_FILES_DIR`: Upload root (default: "data/files")
    /// - `BOARD_PUBLIC_URL`: Base URL for upload links (default: "http://localhost:8080")
    /// - `BOARD_TITLE`: Page title (default: "Bulletin Board")
    /// - `BOARD_METRICS_PORT`: Prometheus port (default: disabled)
    /// - `GEMINI_API_KEY`: API key for drafting
    /// - `GEMINI_MODEL`: Model name (default: "gemini-2.5-flash")
    /// - `GEMINI_ENDPOINT`: API base URL
    pub fn from_env() -> anyhow::Result<Self> {
        let bind_addr =
            std::env::var("BOARD_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

        let db_path = std::env::var("BOARD_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("data/board.db"));

        let files_dir = std::env::var("BOARD_FILES_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("data/files"));

        let public_url = std::env::var("BOARD_PUBLIC_URL")
            .unwrap_or_else(|_| "http://localhost:8080".to_string())
            .trim_end_matches('/')
            .to_string();

        let title = std::env::var("BOARD_TITLE").unwrap_or_else(|_| "Bulletin Board".to_string());

        let metrics_port = match std::env::var("BOARD_METRICS_PORT") {
            Ok(value) if !value.trim().is_empty() => Some(
                value
                    .trim()
                    .parse::<u16>()
                    .map_err(|e| anyhow::anyhow!("BOARD_METRICS_PORT '{value}' is invalid: {e}"))?,
            ),
            _ => None,
        };

        let gemini_api_key = std::env::var("GEMINI_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty());

        let gemini_model =
            std::env::var("GEMINI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        let gemini_endpoint =
            std::env::var("GEMINI_ENDPOINT").unwrap_or_else(|_| DEFAULT_ENDPOINT.to_string());

        tracing::info!(
            bind_addr = %bind_addr,
            db_path = %db_path.display(),
            files_dir = %files_dir.display(),
            public_url = %public_url,
            metrics_port = ?metrics_port,
            gemini_model = %gemini_model,
            gemini_key_set = gemini_api_key.is_some(),
            "configuration loaded"
        );

        Ok(Self {
            bind_addr,
            db_path,
            files_dir,
            public_url,
            title,
            metrics_port,
            gemini_api_key,
            gemini_model,
            gemini_endpoint,
        })
    }
}
