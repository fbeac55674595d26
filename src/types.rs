// Shared error type for the search subsystem

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Vector index error: {0}")]
    VectorIndex(String),

    /// Upsert or query against a collection this client never ensured.
    #[error("Collection not ready: {0}")]
    CollectionNotReady(String),

    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

pub type AppResult<T> = std::result::Result<T, AppError>;

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            // Vector sizes come from the provider and the collection, never the caller
            AppError::VectorIndex(_) | AppError::DimensionMismatch { .. } => {
                StatusCode::BAD_GATEWAY
            }
            AppError::CollectionNotReady(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::VectorIndex(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        let body = Json(serde_json::json!({
            "error": self.to_string(),
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AppError::InvalidRequest("empty".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::DimensionMismatch { expected: 768, actual: 3 }.status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            AppError::CollectionNotReady("images_768".into()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            AppError::VectorIndex("down".into()).status_code(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_dimension_mismatch_message() {
        let err = AppError::DimensionMismatch { expected: 768, actual: 512 };
        assert_eq!(err.to_string(), "Vector dimension mismatch: expected 768, got 512");
    }
}
