use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

/// ApiResponse
///
/// The uniform envelope wrapping every body this service returns:
/// `{ "code": <http status>, "message": <text>, "data": <payload | null> }`.
///
/// Success bodies always carry `code = 200` and `message = "success"`; error bodies are
/// produced by [`crate::error::ApiError`] and carry `data = null`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub code: u16,
    pub message: String,
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            code: StatusCode::OK.as_u16(),
            message: "success".to_string(),
            data: Some(data),
        }
    }
}

impl ApiResponse<()> {
    /// Error envelope; `data` is always null.
    pub fn failure(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code: status.as_u16(),
            message: message.into(),
            data: None,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.code).unwrap_or(StatusCode::OK);
        (status, Json(self)).into_response()
    }
}

/// Handler result alias: a successful envelope or an [`crate::error::ApiError`].
pub type ApiResult<T> = Result<ApiResponse<T>, crate::error::ApiError>;
