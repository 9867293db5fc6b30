use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

// --- Persisted Rows ---

/// User
///
/// The canonical account row from the `users` table. Deliberately not `Serialize`:
/// it carries the password digest and must be mapped to [`UserResponse`] before leaving the service.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// NewUser
///
/// Insert payload for the repository. The password is already hashed at this point.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

/// Post
///
/// A blog post row, joined with the author's username.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, FromRow)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub content: String,
    // FK to users.id (owner).
    pub user_id: i64,
    // Loaded via a JOIN on users.
    #[sqlx(default)]
    pub author: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Comment
///
/// A comment row from the `comments` table, augmented with the author's username.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, FromRow)]
pub struct Comment {
    pub id: i64,
    pub content: String,
    pub user_id: i64,
    pub post_id: i64,
    #[sqlx(default)]
    pub author: Option<String>,
    pub created_at: DateTime<Utc>,
}

// --- Output Schemas ---

/// UserResponse
///
/// Public view of an account. Never contains the password digest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// AuthResponse
///
/// Returned by register and login: a fresh access token plus the account it belongs to.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserResponse,
}

/// PostSummary
///
/// One entry of the paginated post listing.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, FromRow)]
pub struct PostSummary {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub post: Post,
    pub comment_count: i64,
}

/// PostDetail
///
/// A single post with its full comment thread, oldest comment first.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PostDetail {
    #[serde(flatten)]
    pub post: Post,
    pub comments: Vec<Comment>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthStatus {
    pub status: String,
    pub message: String,
}

// --- Request Payloads (Input Schemas) ---

/// RegisterRequest
///
/// Wire-level registration input. Kept separate from [`User`] so the plaintext password
/// never reaches a type that can be persisted or echoed back.
#[derive(Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    #[validate(length(min = 3, max = 20, message = "username must be 3-20 characters"))]
    #[schema(example = "alice")]
    pub username: String,
    #[validate(email(message = "email is not a valid address"))]
    #[schema(example = "alice@example.com")]
    pub email: String,
    #[validate(length(min = 6, message = "password must be at least 6 characters"))]
    pub password: String,
}

#[derive(Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "username is required"))]
    pub username: String,
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
}

/// SavePostRequest
///
/// Create-or-update payload. Absent `postID` creates a new post; present `postID`
/// updates that post if the caller owns it.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct SavePostRequest {
    #[serde(rename = "postID", default, skip_serializing_if = "Option::is_none")]
    pub post_id: Option<i64>,
    #[validate(length(min = 1, max = 100, message = "title must be 1-100 characters"))]
    pub title: String,
    #[validate(length(min = 1, message = "content is required"))]
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateCommentRequest {
    #[validate(length(min = 1, max = 1000, message = "content must be 1-1000 characters"))]
    pub content: String,
}
