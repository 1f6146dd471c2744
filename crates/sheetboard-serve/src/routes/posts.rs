//! Post listing and mutation endpoints.

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use sheetboard_core::{Post, PostDraft, PostPage};

use crate::error::ApiError;
use crate::state::AppState;

/// Query parameters for `GET /api/posts`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

/// Body for create and update.
#[derive(Debug, Deserialize)]
pub struct WritePostRequest {
    pub name: String,
    #[serde(default)]
    pub text: String,
    pub password: String,
}

/// Body carrying only the shared password.
#[derive(Debug, Deserialize)]
pub struct PasswordRequest {
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct PostResponse {
    success: bool,
    post: Post,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    success: bool,
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    valid: bool,
}

pub async fn list_posts(
    State(state): State<AppState>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Result<Json<PostPage>, ApiError> {
    let Query(query) = query?;
    let page = state.board.list(query.page, query.page_size).await?;
    Ok(Json(page))
}

pub async fn create_post(
    State(state): State<AppState>,
    body: Result<Json<WritePostRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<PostResponse>), ApiError> {
    let Json(req) = body?;
    let post = state
        .board
        .create(PostDraft::new(req.name, req.text), &req.password)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(PostResponse {
            success: true,
            post,
        }),
    ))
}

pub async fn update_post(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
    body: Result<Json<WritePostRequest>, JsonRejection>,
) -> Result<Json<PostResponse>, ApiError> {
    let Path(id) = id?;
    let Json(req) = body?;
    let post = state
        .board
        .update(id, PostDraft::new(req.name, req.text), &req.password)
        .await?;

    Ok(Json(PostResponse {
        success: true,
        post,
    }))
}

pub async fn delete_post(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
    body: Result<Json<PasswordRequest>, JsonRejection>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let Path(id) = id?;
    let Json(req) = body?;
    state.board.soft_delete(id, &req.password).await?;
    Ok(Json(SuccessResponse { success: true }))
}

/// Check the shared password so the page can unlock editing.
pub async fn verify_password(
    State(state): State<AppState>,
    body: Result<Json<PasswordRequest>, JsonRejection>,
) -> Result<Json<VerifyResponse>, ApiError> {
    let Json(req) = body?;
    Ok(Json(VerifyResponse {
        valid: state.board.verify_password(&req.password),
    }))
}
