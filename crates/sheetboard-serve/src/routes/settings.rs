//! Display settings endpoints.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use serde::{Deserialize, Serialize};
use sheetboard_core::{DisplaySettings, PageSize};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSizeRequest {
    pub posts_per_page: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSizeResponse {
    success: bool,
    posts_per_page: PageSize,
}

/// Settings the page needs to render. Never includes the password.
pub async fn display_settings(State(state): State<AppState>) -> Json<DisplaySettings> {
    Json(state.board.display_settings())
}

pub async fn set_page_size(
    State(state): State<AppState>,
    body: Result<Json<PageSizeRequest>, JsonRejection>,
) -> Result<Json<PageSizeResponse>, ApiError> {
    let Json(req) = body?;
    let page_size = state.board.set_page_size(req.posts_per_page).await?;
    Ok(Json(PageSizeResponse {
        success: true,
        posts_per_page: page_size,
    }))
}
