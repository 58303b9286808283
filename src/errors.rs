use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::aggregator::sync::SyncError;
use crate::aggregator::AggregatorError;
use crate::processor::ProcessorError;
use crate::purchase::SagaError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Validation failed")]
    Validation(Vec<String>),

    #[error("Payment declined: {0}")]
    PaymentDeclined(String),

    /// A third party failed. The message is shown; the detail is only logged.
    #[error("Upstream failure: {message}")]
    Upstream { message: String, detail: String },

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn upstream(message: &str, detail: impl std::fmt::Display) -> Self {
        AppError::Upstream {
            message: message.into(),
            detail: detail.to_string(),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    details: Vec<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut details = Vec::new();
        let (status, message) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Validation(errors) => {
                details = errors;
                (StatusCode::UNPROCESSABLE_ENTITY, "Validation failed".into())
            }
            AppError::PaymentDeclined(msg) => (StatusCode::PAYMENT_REQUIRED, msg),
            AppError::Upstream { message, detail } => {
                tracing::error!(detail = %detail, "Upstream failure: {message}");
                (StatusCode::BAD_GATEWAY, message)
            }
            AppError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".into())
            }
        };

        (
            status,
            Json(ErrorBody {
                success: false,
                error: message,
                details,
            }),
        )
            .into_response()
    }
}

impl From<SagaError> for AppError {
    fn from(e: SagaError) -> Self {
        let message = e.to_string();
        match e {
            SagaError::Validation(errors) => {
                AppError::Validation(errors.iter().map(ToString::to_string).collect())
            }
            SagaError::MissingPurchase => AppError::BadRequest(message),
            SagaError::NotFound => AppError::NotFound(message),
            SagaError::OrderCreation(source) | SagaError::Verification(source) => {
                AppError::upstream(&message, source)
            }
            SagaError::NotCompleted(_) | SagaError::Mismatch(_) => {
                AppError::PaymentDeclined("payment was not completed".into())
            }
            SagaError::Recording(source) => {
                AppError::Internal(source.context("payment captured but investment could not be recorded"))
            }
            SagaError::Store(source) => AppError::Internal(source),
        }
    }
}

impl From<AggregatorError> for AppError {
    fn from(e: AggregatorError) -> Self {
        AppError::upstream("aggregator request failed", e)
    }
}

impl From<ProcessorError> for AppError {
    fn from(e: ProcessorError) -> Self {
        AppError::upstream("payment processor request failed", e)
    }
}

impl From<SyncError> for AppError {
    fn from(e: SyncError) -> Self {
        match e {
            SyncError::Aggregator(source) => AppError::upstream("aggregator sync failed", source),
            SyncError::Store(source) => AppError::Internal(source),
        }
    }
}
