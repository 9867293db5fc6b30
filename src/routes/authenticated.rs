use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{delete, get, post},
};

/// Authenticated Router Module
///
/// Every handler here also takes an `AuthUser` argument; ownership of posts is decided by
/// comparing the post's `user_id` with the principal's id inside the handler.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /profile
        // The principal's own account.
        .route("/profile", get(handlers::get_profile))
        // POST /posts/saveOrUpdate
        // Creates a post, or updates one the principal owns when `postID` is supplied.
        .route("/posts/saveOrUpdate", post(handlers::save_or_update_post))
        // DELETE /posts/{post_id}
        // Owner-only soft delete.
        .route("/posts/{post_id}", delete(handlers::delete_post))
        // POST /posts/{post_id}/comment
        .route("/posts/{post_id}/comment", post(handlers::create_comment))
}
