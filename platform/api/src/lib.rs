use std::sync::Arc;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Shared result type for request-facing layers.
pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error, Clone)]
pub enum ApiError {
    #[error("resource not found")]
    NotFound,
    #[error("employee already exists with email {0}")]
    DuplicateEmail(String),
    #[error("internal server error")]
    Internal(Arc<anyhow::Error>),
}

impl ApiError {
    fn code(&self) -> &'static str {
        match self {
            ApiError::NotFound => "NOT_FOUND",
            ApiError::DuplicateEmail(_) => "DUPLICATE_EMAIL",
            ApiError::Internal(_) => "INTERNAL",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::DuplicateEmail(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn internal(err: anyhow::Error) -> Self {
        Self::Internal(Arc::new(err))
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(value: anyhow::Error) -> Self {
        Self::internal(value)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            // Not-found responses carry an empty body.
            ApiError::NotFound => self.status().into_response(),
            ApiError::DuplicateEmail(_) => (
                self.status(),
                Json(ErrorBody {
                    code: self.code(),
                    message: self.to_string(),
                }),
            )
                .into_response(),
            ApiError::Internal(source) => {
                error!(error = %source, "request failed");
                (
                    self.status(),
                    Json(ErrorBody {
                        code: self.code(),
                        // Display masks the source; only the code and a
                        // generic message reach the client.
                        message: self.to_string(),
                    }),
                )
                    .into_response()
            }
        }
    }
}
