//! Core services for the sheetboard bulletin board.
//!
//! This crate provides:
//! - The post table and settings store (SQLite, one row per post, soft delete)
//! - The [`board::Board`] service with its listing cache and write lock
//! - Data-URL uploads into a blob store
//! - The retrying, serialized drafting proxy in front of Gemini
//! - Prometheus metrics helpers
//! - Shared error types

pub mod board;
pub mod cache;
mod error;
pub mod generate;
pub mod lock;
pub mod metrics;
pub mod post;
pub mod retry;
pub mod settings;
pub mod store;
pub mod upload;

pub use board::{Board, DisplaySettings};
pub use error::{Error, Result};
pub use generate::{Drafter, GeminiClient, TextModel};
pub use post::{Pagination, Post, PostDraft, PostPage};
pub use settings::{PageSize, Settings};
pub use store::Workbook;
pub use upload::{BlobStore, LocalBlobStore, UploadedFile, Uploader};
