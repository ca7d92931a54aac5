// /forum-platform/services/upload-service/src/handlers.rs

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::Json,
    Extension,
};

use crate::error::AppResult;
use crate::models::FileUploadResponse;
use crate::policy::UploadEndpoint;
use crate::identity::ClientIdentity;
use crate::AppState;

// Handler untuk health check endpoint
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "service": "upload-service",
        "status": "healthy",
        "timestamp": chrono::Utc::now(),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

// Handler upload attachment untuk forum post
pub async fn upload_post_attachment(
    State(state): State<AppState>,
    Extension(identity): Extension<ClientIdentity>,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<FileUploadResponse>)> {
    upload_attachment(state, UploadEndpoint::ForumPost, &identity, multipart).await
}

// Handler upload attachment untuk reply
pub async fn upload_reply_attachment(
    State(state): State<AppState>,
    Extension(identity): Extension<ClientIdentity>,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<FileUploadResponse>)> {
    upload_attachment(state, UploadEndpoint::Reply, &identity, multipart).await
}

// Handler upload attachment untuk notes
pub async fn upload_note_attachment(
    State(state): State<AppState>,
    Extension(identity): Extension<ClientIdentity>,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<FileUploadResponse>)> {
    upload_attachment(state, UploadEndpoint::Note, &identity, multipart).await
}

async fn upload_attachment(
    state: AppState,
    endpoint: UploadEndpoint,
    identity: &ClientIdentity,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<FileUploadResponse>)> {
    let file = state.uploader.upload(endpoint, identity, multipart).await?;

    Ok((StatusCode::CREATED, Json(FileUploadResponse::success(file))))
}
