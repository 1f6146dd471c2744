//! Application state shared across all request handlers.

use std::sync::Arc;

use sheetboard_core::{Board, Drafter, GeminiClient, LocalBlobStore, Uploader, Workbook};

use crate::config::Config;

/// Shared application state available to all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Post and settings service.
    pub board: Arc<Board>,

    /// Data-URL uploads into the blob store.
    pub uploader: Arc<Uploader>,

    /// Drafting proxy in front of the text-generation API.
    pub drafter: Arc<Drafter>,

    /// Application configuration.
    pub config: Arc<Config>,
}

impl AppState {
    /// Open the workbook and blob store and build the services.
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let workbook = Workbook::open(&config.db_path)?;
        let board = Board::open(Arc::new(workbook.posts()), Arc::new(workbook.settings()))?;

        let blobs = LocalBlobStore::new(&config.files_dir, &config.public_url);
        let uploader = Uploader::new(Arc::new(blobs));

        let gemini = GeminiClient::new(
            &config.gemini_endpoint,
            &config.gemini_model,
            config.gemini_api_key.clone(),
        )?;
        let drafter = Drafter::new(Arc::new(gemini));

        tracing::info!(
            db_path = %config.db_path.display(),
            files_dir = %config.files_dir.display(),
            "application state initialized"
        );

        Ok(Self::from_parts(config, board, uploader, drafter))
    }

    /// Assemble state from already-built services.
    pub fn from_parts(config: Config, board: Board, uploader: Uploader, drafter: Drafter) -> Self {
        Self {
            board: Arc::new(board),
            uploader: Arc::new(uploader),
            drafter: Arc::new(drafter),
            config: Arc::new(config),
        }
    }

    /// Folder uploads go into, from the settings table.
    pub fn storage_folder(&self) -> String {
        self.board.settings().storage_folder
    }
}
