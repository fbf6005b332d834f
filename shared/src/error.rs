use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

/// Error taxonomy shared by every service. Variants map 1:1 onto HTTP
/// status codes at the edge; the consumer and webhook paths use the same
/// variants to decide whether a message is retryable.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Validation(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// A call to another service failed. `retryable` distinguishes a
    /// transport failure from a well-formed error response.
    #[error("upstream call to {service} failed: {reason}")]
    Upstream {
        service: &'static str,
        reason: String,
        retryable: bool,
    },

    #[error("storage error: {0}")]
    Persistence(String),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl ServiceError {
    pub fn persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }

    pub fn upstream(service: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Upstream {
            service,
            reason: err.to_string(),
            retryable: true,
        }
    }

    pub fn upstream_rejected(service: &'static str, reason: impl Into<String>) -> Self {
        Self::Upstream {
            service,
            reason: reason.into(),
            retryable: false,
        }
    }

    /// Whether redelivering the triggering message or retrying the call can
    /// ever succeed. Client-side failures are final.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::NotFound(_) | Self::Conflict(_) | Self::Validation(_) | Self::Unauthorized(_) => {
                false
            }
            Self::Upstream { retryable, .. } => *retryable,
            Self::Persistence(_) => true,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Upstream { .. } => StatusCode::BAD_GATEWAY,
            Self::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("request failed: {self}");
        }
        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_are_not_retryable() {
        assert!(!ServiceError::NotFound("order").is_retryable());
        assert!(!ServiceError::Conflict("slot already booked".into()).is_retryable());
        assert!(!ServiceError::upstream_rejected("field-service", "409").is_retryable());
    }

    #[test]
    fn transport_and_storage_errors_are_retryable() {
        assert!(ServiceError::upstream("payment-service", "connection refused").is_retryable());
        assert!(ServiceError::persistence("pool timed out").is_retryable());
    }

    #[test]
    fn status_codes_follow_the_taxonomy() {
        assert_eq!(
            ServiceError::NotFound("payment").status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ServiceError::Validation("limit must be positive".into()).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ServiceError::upstream("field-service", "timeout").status_code(),
            StatusCode::BAD_GATEWAY
        );
    }
}
