use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints that need no token: health, the auth gateway and read-only post access.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for monitors and load balancers.
        .route("/health", get(handlers::health))
        // POST /auth/register
        .route("/auth/register", post(handlers::register_user))
        // POST /auth/login
        .route("/auth/login", post(handlers::login))
        // GET /posts?page=...&size=...
        // Paginated listing, newest first.
        .route("/posts", get(handlers::list_posts))
        // GET /posts/{post_id}
        // Post detail with author and comments. Shares the path with the authenticated DELETE.
        .route("/posts/{post_id}", get(handlers::get_post))
        // GET /posts/{post_id}/comments?page=...&size=...
        .route("/posts/{post_id}/comments", get(handlers::list_comments))
}
