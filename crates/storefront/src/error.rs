//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures server errors to Sentry
//! before responding to the client. All route handlers return
//! `Result<T, AppError>`; the body is always `{"error": "..."}`.

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::payments::{EventDecodeError, PaymentError, SignatureError};
use crate::services::CheckoutError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad or missing client input.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Webhook authenticity check failed.
    #[error("Signature error: {0}")]
    Signature(#[from] SignatureError),

    /// Upstream payment provider call failed.
    #[error("Payment provider error: {0}")]
    PaymentProvider(#[from] PaymentError),

    /// Order write failed. The provider redelivers the webhook on 500.
    #[error("Persistence error: {0}")]
    Persistence(#[from] RepositoryError),

    /// Page rendering failed.
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::Signature(_) => StatusCode::BAD_REQUEST,
            Self::PaymentProvider(_)
            | Self::Persistence(_)
            | Self::Template(_)
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to return to the caller.
    fn public_message(&self) -> String {
        match self {
            Self::Validation(msg) => msg.clone(),
            Self::Signature(_) => "Webhook signature verification failed".to_string(),
            Self::PaymentProvider(err) => err.to_string(),
            Self::Persistence(_) => "Error processing webhook".to_string(),
            Self::Template(_) | Self::Internal(_) => "Internal server error".to_string(),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

impl From<CheckoutError> for AppError {
    fn from(err: CheckoutError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<EventDecodeError> for AppError {
    fn from(err: EventDecodeError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::warn!(error = %self, "Rejected request");
        }

        (status, Json(json!({ "error": self.public_message() }))).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    async fn body_json(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::Validation("Please provide cart items".to_string());
        assert_eq!(err.to_string(), "Validation error: Please provide cart items");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            AppError::Validation("x".to_string()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Signature(SignatureError::MissingHeader).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Persistence(RepositoryError::InvalidInput("too many order items".to_string())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError::Internal("x".to_string()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_provider_message_passes_through() {
        let err = AppError::PaymentProvider(PaymentError::Api {
            status: 402,
            message: "Your card was declined.".to_string(),
        });
        let (status, body) = body_json(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Your card was declined.");
    }

    #[tokio::test]
    async fn test_persistence_details_hidden() {
        let err = AppError::Persistence(RepositoryError::DataCorruption(
            "invalid email in database".to_string(),
        ));
        let (_, body) = body_json(err).await;
        assert_eq!(body["error"], "Error processing webhook");
    }
}
