use ndk_k8s::ClientError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DashboardError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Restore failed: {0}")]
    RestoreFailed(String),

    #[error("Kubernetes API error: {0}")]
    Client(#[from] ClientError),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type DashboardResult<T> = Result<T, DashboardError>;

impl DashboardError {
    pub fn validation(msg: impl Into<String>) -> Self {
        DashboardError::Validation(msg.into())
    }

    /// HTTP status this error surfaces as. Remote failures keep their code.
    pub fn status_code(&self) -> u16 {
        match self {
            DashboardError::Validation(_) => 400,
            DashboardError::NotFound(_) => 404,
            DashboardError::RestoreFailed(_) => 500,
            DashboardError::Client(ClientError::Api { code, .. }) => *code,
            DashboardError::Client(_) => 502,
            DashboardError::Internal(_) => 500,
        }
    }
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("{1}")]
    Upstream(u16, String),

    #[error("Internal server error: {0}")]
    InternalServerError(String),
}

impl From<DashboardError> for ApiError {
    fn from(e: DashboardError) -> Self {
        match e {
            DashboardError::Validation(msg) => ApiError::BadRequest(msg),
            DashboardError::NotFound(msg) => ApiError::NotFound(msg),
            DashboardError::Client(ClientError::Api {
                code, message, ..
            }) => ApiError::Upstream(code, message),
            other => ApiError::InternalServerError(other.to_string()),
        }
    }
}

impl axum::response::IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        use axum::{Json, http::StatusCode};
        use serde_json::json;

        let (status, error_message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Upstream(code, msg) => (
                StatusCode::from_u16(code)
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                msg,
            ),
            ApiError::InternalServerError(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}
