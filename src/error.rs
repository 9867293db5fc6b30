use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::{
    password::PasswordError, repository::RepositoryError, response::ApiResponse,
    token::TokenError,
};

/// ApiError
///
/// Every failure a request can end in. Handlers return it through `?`; the
/// `IntoResponse` impl translates it into the uniform envelope at the boundary.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Bad input shape or range.
    #[error("{0}")]
    Validation(String),

    /// Missing, malformed or expired credentials.
    #[error("{0}")]
    Unauthenticated(String),

    /// The principal does not own the resource it tried to mutate.
    #[error("{0}")]
    NotOwner(String),

    #[error("{0}")]
    NotFound(String),

    /// Duplicate username or email.
    #[error("{0}")]
    Conflict(String),

    /// Data-store or crypto failure. The message is client-safe; causes are logged where they occur.
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotOwner(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        ApiResponse::failure(self.status_code(), self.to_string()).into_response()
    }
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Conflict(field) => ApiError::Conflict(format!("{field} already exists")),
            RepositoryError::Database(e) => {
                tracing::error!(error = ?e, "data store failure");
                ApiError::Internal("database error".to_string())
            }
        }
    }
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Signing(e) => {
                tracing::error!(error = ?e, "failed to sign access token");
                ApiError::Internal("failed to generate token".to_string())
            }
            TokenError::MissingSecret => {
                tracing::error!("token signing secret is not configured");
                ApiError::Internal("failed to generate token".to_string())
            }
            other => ApiError::Unauthenticated(other.to_string()),
        }
    }
}

impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        match err {
            PasswordError::EmptyInput => ApiError::Validation(err.to_string()),
            PasswordError::HashingFailed(ref reason) => {
                tracing::error!(%reason, "password hashing failed");
                ApiError::Internal("failed to hash password".to_string())
            }
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut messages: Vec<String> = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| {
                    e.message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("{field}: invalid value"))
                })
            })
            .collect();
        messages.sort();
        ApiError::Validation(messages.join("; "))
    }
}
