//! Drafting assistant endpoint.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    text: String,
}

/// Draft a post from rough input.
///
/// Always 200 for a well-formed body: upstream failures come back as text.
pub async fn generate(
    State(state): State<AppState>,
    body: Result<Json<GenerateRequest>, JsonRejection>,
) -> Result<Json<GenerateResponse>, ApiError> {
    let Json(req) = body?;
    let text = state.drafter.draft(&req.text).await;
    Ok(Json(GenerateResponse { text }))
}
