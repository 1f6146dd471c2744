//! Sheetboard Serve - HTTP server for the bulletin board
//!
//! Serves the single board page and the JSON API it drives: post listing and
//! editing behind a shared password, display settings, data-URL uploads and
//! the drafting assistant.
//!
//! # Architecture
//!
//! - **AppState**: Board, uploader and drafter services plus configuration
//! - **Routes**: Endpoint handlers grouped by domain
//! - **ApiError**: Maps board errors to status codes and a JSON body

mod config;
mod error;
mod routes;
mod state;

pub use self::config::Config;
pub use self::error::ApiError;
pub use self::routes::router;
pub use self::state::AppState;
