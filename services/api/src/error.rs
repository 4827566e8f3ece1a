use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use common::AppError;
use thiserror::Error;

use crate::response;

#[derive(Debug, Error)]
pub enum HttpApiError {
    #[error(transparent)]
    App(#[from] AppError),
    #[error("Authentication credentials were not provided.")]
    MissingCredentials,
    #[error("{0}")]
    BadRequest(String),
    #[error("Invalid page.")]
    InvalidPage,
}

impl HttpApiError {
    fn code(&self) -> &'static str {
        match self {
            Self::App(e) => match e {
                AppError::Validation(_) => "VALIDATION_ERROR",
                AppError::Conflict { .. } => "CONFLICT",
                AppError::RoleMismatch { .. } => "ROLE_MISMATCH",
                AppError::Unauthorized => "AUTHENTICATION_FAILED",
                AppError::Forbidden(_) => "PERMISSION_DENIED",
                AppError::AccountDisabled => "ACCOUNT_DISABLED",
                AppError::NotFound => "NOT_FOUND",
                AppError::Internal => "INTERNAL_ERROR",
            },
            Self::MissingCredentials => "AUTHENTICATION_FAILED",
            Self::BadRequest(_) => "VALIDATION_ERROR",
            Self::InvalidPage => "NOT_FOUND",
        }
    }

    fn message(&self) -> String {
        match self {
            Self::App(AppError::Validation(_)) => "Invalid input.".to_string(),
            Self::App(AppError::Unauthorized) => "Invalid email or password.".to_string(),
            Self::App(AppError::AccountDisabled) => "User account is disabled.".to_string(),
            Self::App(AppError::NotFound) => "Not found.".to_string(),
            Self::App(AppError::Internal) => "Internal server error.".to_string(),
            other => other.to_string(),
        }
    }
}

impl ResponseError for HttpApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::App(e) => match e {
                AppError::Validation(_)
                | AppError::Conflict { .. }
                | AppError::RoleMismatch { .. } => StatusCode::BAD_REQUEST,
                AppError::Unauthorized => StatusCode::UNAUTHORIZED,
                AppError::Forbidden(_) | AppError::AccountDisabled => StatusCode::FORBIDDEN,
                AppError::NotFound => StatusCode::NOT_FOUND,
                AppError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::MissingCredentials => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::InvalidPage => StatusCode::NOT_FOUND,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let fields = match self {
            Self::App(e) => e.fields(),
            _ => Vec::new(),
        };
        response::failure(self.status_code(), self.code(), self.message(), fields)
    }
}
