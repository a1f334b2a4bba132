use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use sitelens_core::error::ValidationError;
use sitelens_core::filter::FilterError;

use crate::envelope::failure;

/// Errors that map directly to a failure envelope and HTTP status.
///
/// Handlers return `Result<_, ApiError>`; storage failures are wrapped with
/// the resource name so callers see `"Failed to fetch <resource>"` while the
/// engine's own message only reaches the log.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Failed to fetch {resource}")]
    Storage {
        resource: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    /// `map_err` adaptor for store calls: `.map_err(ApiError::storage("sessions"))`.
    pub fn storage(resource: &'static str) -> impl FnOnce(anyhow::Error) -> Self {
        move |source| ApiError::Storage { resource, source }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Storage { .. } | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::Validation(err.to_string())
    }
}

impl From<FilterError> for ApiError {
    fn from(err: FilterError) -> Self {
        ValidationError::from(err).into()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            ApiError::Storage { resource, source } => {
                tracing::error!(resource = *resource, error = %format!("{source:#}"), "Storage query failed");
                self.to_string()
            }
            ApiError::Internal(e) => {
                tracing::error!("Internal error: {e:#}");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        failure(status, message).into_response()
    }
}
