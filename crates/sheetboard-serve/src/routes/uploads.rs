//! Image and file upload endpoints.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageUploadRequest {
    pub data_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileUploadRequest {
    pub file_name: String,
    pub data_url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageUploadResponse {
    success: bool,
    image_url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileUploadResponse {
    success: bool,
    file_url: String,
    file_name: String,
}

/// Upload an editor image. The returned URL is ready to embed.
pub async fn upload_image(
    State(state): State<AppState>,
    body: Result<Json<ImageUploadRequest>, JsonRejection>,
) -> Result<Json<ImageUploadResponse>, ApiError> {
    let Json(req) = body?;
    let folder = state.storage_folder();
    let image_url = state
        .uploader
        .upload_editor_image(&folder, &req.data_url)
        .await?;

    Ok(Json(ImageUploadResponse {
        success: true,
        image_url,
    }))
}

pub async fn upload_file(
    State(state): State<AppState>,
    body: Result<Json<FileUploadRequest>, JsonRejection>,
) -> Result<Json<FileUploadResponse>, ApiError> {
    let Json(req) = body?;
    let folder = state.storage_folder();
    let uploaded = state
        .uploader
        .upload_file(&folder, &req.file_name, &req.data_url)
        .await?;

    Ok(Json(FileUploadResponse {
        success: true,
        file_url: uploaded.file_url,
        file_name: uploaded.file_name,
    }))
}
