use axum::Json;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::AppState;
use crate::ingest::UploadedFile;
use crate::pipeline::Answer;
use crate::{DocQueryError, Result};

pub const UPLOAD_FIELD: &str = "files";
pub const UPLOAD_COMPLETE: &str = "Files processed and embeddings generated.";

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QueryRequest {
    pub question: String,
}

/// POST /upload/ - multipart form with one or more `files` parts
#[inline]
pub async fn upload(
    State(service): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>> {
    let mut files = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| DocQueryError::InvalidRequest(format!("Malformed multipart body: {}", e)))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            debug!("Ignoring multipart field {:?}", field.name());
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await.map_err(|e| {
            DocQueryError::InvalidRequest(format!("Failed to read {}: {}", filename, e))
        })?;

        info!("Received {} ({} bytes)", filename, bytes.len());
        files.push(UploadedFile::new(filename, bytes.to_vec()));
    }

    service.upload(files).await?;
    Ok(Json(UploadResponse {
        status: UPLOAD_COMPLETE.to_string(),
    }))
}

/// POST /query/ - `{"question": ...}`
#[inline]
pub async fn query(
    State(service): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<Answer>> {
    let answer = service.query(&request.question).await?;
    Ok(Json(answer))
}

#[inline]
pub async fn health() -> &'static str {
    "OK"
}

/// 200 once a pipeline is bound
#[inline]
pub async fn ready(State(service): State<AppState>) -> StatusCode {
    if service.is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}
