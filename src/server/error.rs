use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::{error, warn};

use crate::DocQueryError;

impl DocQueryError {
    #[inline]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NoPipelineBound => StatusCode::CONFLICT,
            Self::UnsupportedFileType(_)
            | Self::Load { .. }
            | Self::EmptyUpload
            | Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::DependencyUnavailable(_) | Self::StartupTimeout { .. } => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            Self::Config(_) | Self::Io(_) | Self::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for DocQueryError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            Self::Other(e) => format!("{:#}", e),
            other => other.to_string(),
        };

        if status.is_server_error() {
            error!("Request failed: {}", message);
        } else if status != StatusCode::CONFLICT {
            warn!("Request rejected: {}", message);
        }

        (status, Json(json!({ "error": message }))).into_response()
    }
}
