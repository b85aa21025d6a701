use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

/// Failures talking to the CRM REST endpoint
#[derive(Debug, Error)]
pub enum CrmError {
    #[error("CRM request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("CRM API error in {entity}.{action}: {message}")]
    Api {
        entity: String,
        action: String,
        message: String,
    },

    #[error("unexpected CRM response: {0}")]
    Decode(String),
}

/// Failures talking to the Zoom REST API
#[derive(Debug, Error)]
pub enum ZoomError {
    #[error("Zoom request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Zoom API returned {status}: {message}")]
    Api { status: u16, message: String },
}

/// Error type shared by the sync services.
///
/// "Not configured" and "remote failure" are separate variants so callers
/// can tell a missing mapping from a CRM or Zoom outage.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("not configured: {0}")]
    NotConfigured(String),

    #[error("missing parameters: {0}")]
    MissingParams(String),

    #[error(transparent)]
    Crm(#[from] CrmError),

    #[error(transparent)]
    Zoom(#[from] ZoomError),

    #[error("storage error: {0}")]
    Storage(String),
}

impl SyncError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            SyncError::NotConfigured(_) => StatusCode::UNPROCESSABLE_ENTITY,
            SyncError::MissingParams(_) => StatusCode::BAD_REQUEST,
            SyncError::Crm(_) | SyncError::Zoom(_) => StatusCode::BAD_GATEWAY,
            SyncError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for SyncError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        } else {
            warn!("Request rejected: {}", self);
        }

        (
            status,
            Json(json!({
                "success": false,
                "message": self.to_string(),
            })),
        )
            .into_response()
    }
}
