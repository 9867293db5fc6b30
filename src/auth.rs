use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};

use crate::{error::ApiError, token::TokenService};

/// AuthUser
///
/// The principal of an authenticated request, derived from a verified access token.
/// Lives only for the duration of the request and is never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    pub user_id: i64,
    pub username: String,
}

impl AuthUser {
    /// Ownership gate for mutating a resource whose owner FK is `owner_id`.
    /// Compares immutable ids, never display names.
    pub fn owns(&self, owner_id: i64) -> bool {
        is_owner(&owner_id, &self.user_id)
    }
}

/// Owner check: strict equality between the resource's recorded owner and the acting principal.
pub fn is_owner<T: PartialEq + ?Sized>(resource_owner: &T, acting: &T) -> bool {
    resource_owner == acting
}

/// AuthUser Extractor Implementation
///
/// Resolves the principal from an `Authorization: Bearer <token>` header.
///
/// Rejection: `ApiError::Unauthenticated` (401 envelope) when the header is absent, lacks the
/// `Bearer ` prefix, or carries a token that fails signature, structure or expiry checks.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    TokenService: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let tokens = TokenService::from_ref(state);

        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .ok_or_else(|| ApiError::Unauthenticated("authorization header is required".to_string()))?
            .to_str()
            .map_err(|_| ApiError::Unauthenticated("authorization header is not valid text".to_string()))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ApiError::Unauthenticated("bearer token is required".to_string()))?;

        let claims = tokens.verify(token).map_err(|e| {
            tracing::warn!(error = %e, "rejected access token");
            ApiError::from(e)
        })?;

        Ok(AuthUser {
            user_id: claims.user_id,
            username: claims.username,
        })
    }
}
