//! Unified error handling with Sentry integration.
//!
//! Route handlers return `Result<T, AppError>`. Every error becomes a JSON
//! body `{"error": "..."}` with a matching status code; server-side failures
//! are captured to Sentry before responding.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use bazaar_core::{CartError, Denial, WorkflowError};
use serde_json::json;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::db::settings::SettingsError;
use crate::services::auth::AuthError;
use crate::services::identity::IdentityError;

/// Application-level error type for the API.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Settings could not be read or written.
    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Identity provider call failed.
    #[error("Identity provider error: {0}")]
    Identity(#[from] IdentityError),

    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),

    /// Refused by the access gate.
    #[error("Access denied: {0}")]
    Denied(#[from] Denial),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Database(err) => match err {
                RepositoryError::NotFound => StatusCode::NOT_FOUND,
                RepositoryError::Conflict(_) => StatusCode::CONFLICT,
                RepositoryError::Database(_) | RepositoryError::DataCorruption(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Settings(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials | AuthError::AccountDisabled => {
                    StatusCode::UNAUTHORIZED
                }
                AuthError::UserAlreadyExists => StatusCode::CONFLICT,
                AuthError::WeakPassword(_) | AuthError::InvalidEmail(_) => StatusCode::BAD_REQUEST,
                AuthError::Repository(_) | AuthError::PasswordHash => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Identity(err) => match err {
                IdentityError::InvalidToken => StatusCode::UNAUTHORIZED,
                IdentityError::NotConfigured => StatusCode::SERVICE_UNAVAILABLE,
                IdentityError::Http(_) | IdentityError::Api { .. } | IdentityError::Parse(_) => {
                    StatusCode::BAD_GATEWAY
                }
            },
            Self::Cart(err) => match err {
                CartError::NotInCart => StatusCode::NOT_FOUND,
                CartError::OutOfStock => StatusCode::CONFLICT,
                CartError::ZeroQuantity | CartError::Empty => StatusCode::BAD_REQUEST,
            },
            Self::Workflow(_) | Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Denied(denial) => match denial {
                Denial::Maintenance(_) => StatusCode::SERVICE_UNAVAILABLE,
                Denial::CheckoutLocked | Denial::RegistrationLocked => StatusCode::LOCKED,
                Denial::Unauthenticated => StatusCode::UNAUTHORIZED,
                Denial::Forbidden => StatusCode::FORBIDDEN,
            },
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show the client.
    fn public_message(&self) -> String {
        match self {
            Self::Database(RepositoryError::NotFound) => "Not found".to_string(),
            Self::Database(RepositoryError::Conflict(msg)) => msg.clone(),
            Self::Database(_) | Self::Settings(_) | Self::Internal(_) => {
                "Internal server error".to_string()
            }
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials => "Invalid credentials".to_string(),
                AuthError::AccountDisabled => "This account has been disabled".to_string(),
                AuthError::UserAlreadyExists => {
                    "An account with this email already exists".to_string()
                }
                AuthError::WeakPassword(msg) => msg.clone(),
                AuthError::InvalidEmail(_) => "Invalid email address".to_string(),
                AuthError::Repository(_) | AuthError::PasswordHash => {
                    "Authentication error".to_string()
                }
            },
            Self::Identity(IdentityError::InvalidToken) => "Invalid ID token".to_string(),
            Self::Identity(IdentityError::NotConfigured) => {
                "Identity provider is not configured".to_string()
            }
            Self::Identity(_) => "Identity provider error".to_string(),
            Self::Cart(err) => err.to_string(),
            Self::Workflow(err) => err.to_string(),
            Self::Denied(denial) => denial.to_string(),
            Self::NotFound(msg)
            | Self::Unauthorized(msg)
            | Self::Forbidden(msg)
            | Self::BadRequest(msg)
            | Self::Conflict(msg) => msg.clone(),
            Self::RateLimited => "Too many requests, please slow down".to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() && !matches!(self, Self::Denied(_)) {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        (status, Json(json!({ "error": self.public_message() }))).into_response()
    }
}

impl From<tower_sessions::session::Error> for AppError {
    fn from(err: tower_sessions::session::Error) -> Self {
        Self::Internal(format!("session store: {err}"))
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context after authentication.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("product 12".to_string());
        assert_eq!(err.to_string(), "Not found: product 12");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(status_of(AppError::NotFound("x".into())), StatusCode::NOT_FOUND);
        assert_eq!(status_of(AppError::Unauthorized("x".into())), StatusCode::UNAUTHORIZED);
        assert_eq!(status_of(AppError::Forbidden("x".into())), StatusCode::FORBIDDEN);
        assert_eq!(status_of(AppError::BadRequest("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(AppError::RateLimited), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            status_of(AppError::Internal("x".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_repository_errors_map_to_client_statuses() {
        assert_eq!(
            status_of(AppError::Database(RepositoryError::NotFound)),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(AppError::Database(RepositoryError::Conflict("dup".into()))),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_gate_denials() {
        assert_eq!(
            status_of(Denial::Maintenance("down".into()).into()),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(status_of(Denial::CheckoutLocked.into()), StatusCode::LOCKED);
        assert_eq!(status_of(Denial::Unauthenticated.into()), StatusCode::UNAUTHORIZED);
        assert_eq!(status_of(Denial::Forbidden.into()), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_domain_errors() {
        assert_eq!(status_of(CartError::OutOfStock.into()), StatusCode::CONFLICT);
        assert_eq!(status_of(CartError::NotInCart.into()), StatusCode::NOT_FOUND);
        assert_eq!(
            status_of(WorkflowError::NothingToCancel.into()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(IdentityError::InvalidToken.into()),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn test_internal_details_hidden() {
        let err = AppError::Internal("pool exhausted at 10.0.0.3".into());
        assert_eq!(err.public_message(), "Internal server error");
    }
}
