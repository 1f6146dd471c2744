//! Route definitions for the board service.
//!
//! ## Routes
//!
//! - `GET /` - Board page
//! - `GET /health` - Health check (JSON)
//! - `GET /api/posts?page=&pageSize=` - Visible posts, newest first
//! - `POST /api/posts` - Create a post
//! - `PUT /api/posts/{id}` - Update a post
//! - `DELETE /api/posts/{id}` - Hide a post
//! - `POST /api/auth/verify` - Check the shared password
//! - `GET /api/settings/display` - Display settings
//! - `PUT /api/settings/page-size` - Change the default page size
//! - `POST /api/uploads/image` - Upload an editor image
//! - `POST /api/uploads/file` - Upload an attachment
//! - `POST /api/generate` - Draft a post
//! - `GET /files/*` - Uploaded blobs

mod generate;
mod health;
mod page;
mod posts;
mod settings;
mod uploads;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post, put};
use tower_http::services::ServeDir;

use crate::state::AppState;

/// Uploads arrive base64-encoded inside JSON, so allow more than axum's default.
const MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

/// Build the complete board router.
pub fn router(state: AppState) -> Router {
    let files = ServeDir::new(&state.config.files_dir);

    let api = Router::new()
        .route(
            "/posts",
            get(posts::list_posts).post(posts::create_post),
        )
        .route(
            "/posts/{id}",
            put(posts::update_post).delete(posts::delete_post),
        )
        .route("/auth/verify", post(posts::verify_password))
        .route("/settings/display", get(settings::display_settings))
        .route("/settings/page-size", put(settings::set_page_size))
        .route("/uploads/image", post(uploads::upload_image))
        .route("/uploads/file", post(uploads::upload_file))
        .route("/generate", post(generate::generate))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES));

    Router::new()
        .route("/", get(page::board_page))
        .route("/health", get(health::health_check))
        .nest("/api", api)
        .nest_service("/files", files)
        .with_state(state)
}
