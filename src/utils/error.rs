use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::{error, warn};

use crate::billing::BillingError;
use crate::payments::ProviderError;
use crate::utils::response::error as error_response;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Billing(#[from] BillingError),

    #[error(transparent)]
    Webhook(#[from] ProviderError),

    #[error("Database error")]
    DatabaseError(#[from] sqlx::Error),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Billing(inner) => billing_status(inner),
            AppError::Webhook(inner) => webhook_status(inner),
            AppError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Billing(inner) => billing_code(inner),
            AppError::Webhook(inner) => webhook_code(inner),
            AppError::DatabaseError(_) => "DATABASE_ERROR",
        }
    }

    fn log(&self) {
        if self.status_code().is_server_error() {
            error!(error = ?self, "Request failed");
        } else {
            warn!(error = %self, code = self.code(), "Request rejected");
        }
    }
}

fn billing_status(err: &BillingError) -> StatusCode {
    match err {
        BillingError::OrderNotFound(_)
        | BillingError::EditionNotFound(_)
        | BillingError::TicketTypeNotFound(_) => StatusCode::NOT_FOUND,
        BillingError::SoldOut(_) | BillingError::InvalidTransition { .. } => StatusCode::CONFLICT,
        BillingError::InvalidCart(_) => StatusCode::BAD_REQUEST,
        BillingError::Provider(_) => StatusCode::BAD_GATEWAY,
        BillingError::Sequence { .. } | BillingError::Database(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn billing_code(err: &BillingError) -> &'static str {
    match err {
        BillingError::OrderNotFound(_)
        | BillingError::EditionNotFound(_)
        | BillingError::TicketTypeNotFound(_) => "NOT_FOUND",
        BillingError::SoldOut(_) => "SOLD_OUT",
        BillingError::InvalidTransition { .. } => "INVALID_TRANSITION",
        BillingError::InvalidCart(_) => "VALIDATION_ERROR",
        BillingError::Provider(_) => "PROVIDER_ERROR",
        BillingError::Sequence { .. } => "SEQUENCE_ERROR",
        BillingError::Database(_) => "DATABASE_ERROR",
    }
}

fn webhook_status(err: &ProviderError) -> StatusCode {
    match err {
        ProviderError::SignatureInvalid => StatusCode::UNAUTHORIZED,
        ProviderError::MalformedPayload(_) => StatusCode::BAD_REQUEST,
        ProviderError::Call(_) => StatusCode::BAD_GATEWAY,
    }
}

fn webhook_code(err: &ProviderError) -> &'static str {
    match err {
        ProviderError::SignatureInvalid => "SIGNATURE_INVALID",
        ProviderError::MalformedPayload(_) => "MALFORMED_PAYLOAD",
        ProviderError::Call(_) => "PROVIDER_ERROR",
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();

        // Log internal details
        self.log();

        // Only expose high-level messages to the client
        let public_message = match &self {
            AppError::ValidationError(msg) | AppError::NotFound(msg) => msg.clone(),
            AppError::Billing(inner) => match inner {
                BillingError::Sequence { .. } | BillingError::Database(_) => {
                    "An internal error occurred".to_string()
                }
                other => other.to_string(),
            },
            AppError::Webhook(inner) => inner.to_string(),
            AppError::DatabaseError(_) => "A database error occurred".to_string(),
        };

        // Do not expose internal details in the API response
        let details = None;

        error_response(code, public_message, details, status)
    }
}
