use crate::{
    AppState,
    auth::AuthUser,
    error::ApiError,
    extract::{ApiPath, ApiQuery, ValidatedJson},
    models::{
        AuthResponse, Comment, CreateCommentRequest, HealthStatus, LoginRequest, NewUser, Post,
        PostDetail, PostSummary, RegisterRequest, SavePostRequest, UserResponse,
    },
    pagination::{PageQuery, PageRequest, PageResult},
    password,
    response::{ApiResponse, ApiResult},
};
use axum::{extract::State, http::Uri};

// --- Helpers ---

/// Loads a live post and applies the owner check against the principal.
/// Missing post → 404; someone else's post → `NotOwner`.
async fn load_owned_post(state: &AppState, auth: &AuthUser, post_id: i64) -> Result<Post, ApiError> {
    let post = state
        .repo
        .get_post(post_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("post {post_id} not found")))?;

    if !auth.owns(post.user_id) {
        tracing::warn!(
            post_id,
            owner_id = post.user_id,
            user_id = auth.user_id,
            "ownership check failed"
        );
        let owner = post.author.as_deref().unwrap_or("another user");
        return Err(ApiError::NotOwner(format!("cannot modify posts owned by {owner}")));
    }

    Ok(post)
}

async fn require_post(state: &AppState, post_id: i64) -> Result<Post, ApiError> {
    state
        .repo
        .get_post(post_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("post {post_id} not found")))
}

// --- Handlers ---

/// not_found
///
/// Router fallback, so unknown paths still answer with the envelope.
pub async fn not_found(uri: Uri) -> ApiError {
    ApiError::NotFound(format!("no route for {}", uri.path()))
}

/// health
///
/// [Public Route] Liveness probe. Does not touch the data store.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is running", body = HealthStatus))
)]
pub async fn health() -> ApiResponse<HealthStatus> {
    ApiResponse::success(HealthStatus {
        status: "ok".to_string(),
        message: "Blog API is running".to_string(),
    })
}

/// register_user
///
/// [Public Route] Creates an account and returns it together with a fresh access token.
///
/// *Uniqueness*: username and email are checked up front for a friendly message; the
/// database constraints still catch a concurrent duplicate and surface it as the same 400.
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "Registered", body = AuthResponse),
        (status = 400, description = "Invalid input or duplicate username/email")
    )
)]
pub async fn register_user(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<RegisterRequest>,
) -> ApiResult<AuthResponse> {
    if state.repo.get_user_by_username(&payload.username).await?.is_some() {
        tracing::info!(username = %payload.username, "registration rejected: username taken");
        return Err(ApiError::Conflict(format!("{} already exists", payload.username)));
    }
    if state.repo.get_user_by_email(&payload.email).await?.is_some() {
        tracing::info!("registration rejected: email taken");
        return Err(ApiError::Conflict("email already exists".to_string()));
    }

    // Refuse before persisting anything if no token could be issued afterwards.
    state.tokens.ensure_can_sign()?;

    let password_hash = password::hash_password(&payload.password)?;
    let user = state
        .repo
        .create_user(NewUser {
            username: payload.username,
            email: payload.email,
            password_hash,
        })
        .await?;

    let token = state.tokens.issue(user.id, &user.username)?;
    tracing::info!(user_id = user.id, "user registered");

    Ok(ApiResponse::success(AuthResponse {
        token,
        user: user.into(),
    }))
}

/// login
///
/// [Public Route] Exchanges username + password for an access token.
/// Unknown user and wrong password produce the same 401 so usernames cannot be probed.
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = AuthResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<LoginRequest>,
) -> ApiResult<AuthResponse> {
    let invalid = || ApiError::Unauthenticated("invalid username or password".to_string());

    let user = state
        .repo
        .get_user_by_username(&payload.username)
        .await?
        .ok_or_else(invalid)?;

    if !password::verify_password(&payload.password, &user.password_hash) {
        tracing::info!(user_id = user.id, "login rejected: wrong password");
        return Err(invalid());
    }

    let token = state.tokens.issue(user.id, &user.username)?;
    Ok(ApiResponse::success(AuthResponse {
        token,
        user: user.into(),
    }))
}

/// get_profile
///
/// [Authenticated Route] Returns the principal's own account, looked up by user id.
#[utoipa::path(
    get,
    path = "/profile",
    responses(
        (status = 200, description = "Profile", body = UserResponse),
        (status = 401, description = "Missing or invalid token"),
        (status = 404, description = "Account no longer exists")
    )
)]
pub async fn get_profile(auth: AuthUser, State(state): State<AppState>) -> ApiResult<UserResponse> {
    let user = state
        .repo
        .get_user(auth.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("user does not exist".to_string()))?;
    Ok(ApiResponse::success(user.into()))
}

/// save_or_update_post
///
/// [Authenticated Route] Without `postID` creates a post owned by the principal.
/// With `postID` updates that post, after the owner check.
#[utoipa::path(
    post,
    path = "/posts/saveOrUpdate",
    request_body = SavePostRequest,
    responses(
        (status = 200, description = "Created or updated", body = Post),
        (status = 400, description = "Invalid input or not the owner"),
        (status = 404, description = "Post not found")
    )
)]
pub async fn save_or_update_post(
    auth: AuthUser,
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<SavePostRequest>,
) -> ApiResult<Post> {
    match payload.post_id {
        Some(post_id) => {
            let post = load_owned_post(&state, &auth, post_id).await?;
            let updated = state
                .repo
                .update_post(post.id, payload.title, payload.content)
                .await?
                .ok_or_else(|| ApiError::NotFound(format!("post {post_id} not found")))?;
            tracing::info!(post_id, user_id = auth.user_id, "post updated");
            Ok(ApiResponse::success(updated))
        }
        None => {
            let post = state
                .repo
                .create_post(auth.user_id, payload.title, payload.content)
                .await?;
            tracing::info!(post_id = post.id, user_id = auth.user_id, "post created");
            Ok(ApiResponse::success(post))
        }
    }
}

/// delete_post
///
/// [Authenticated Route] Soft-deletes a post. Owner only.
#[utoipa::path(
    delete,
    path = "/posts/{post_id}",
    params(("post_id" = i64, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Deleted"),
        (status = 400, description = "Not the owner"),
        (status = 404, description = "Post not found")
    )
)]
pub async fn delete_post(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiPath(post_id): ApiPath<i64>,
) -> ApiResult<()> {
    load_owned_post(&state, &auth, post_id).await?;

    // A concurrent delete between the check and here leaves nothing to remove.
    if !state.repo.delete_post(post_id).await? {
        return Err(ApiError::NotFound(format!("post {post_id} not found")));
    }

    tracing::info!(post_id, user_id = auth.user_id, "post deleted");
    Ok(ApiResponse::success(()))
}

/// create_comment
///
/// [Authenticated Route] Adds a comment by the principal to an existing post.
#[utoipa::path(
    post,
    path = "/posts/{post_id}/comment",
    params(("post_id" = i64, Path, description = "Post ID")),
    request_body = CreateCommentRequest,
    responses(
        (status = 200, description = "Comment added", body = Comment),
        (status = 404, description = "Post not found")
    )
)]
pub async fn create_comment(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiPath(post_id): ApiPath<i64>,
    ValidatedJson(payload): ValidatedJson<CreateCommentRequest>,
) -> ApiResult<Comment> {
    require_post(&state, post_id).await?;
    let comment = state
        .repo
        .add_comment(post_id, auth.user_id, payload.content)
        .await?;
    Ok(ApiResponse::success(comment))
}

/// list_posts
///
/// [Public Route] Paginated listing, newest first. Invalid `page`/`size` fall back to defaults.
#[utoipa::path(
    get,
    path = "/posts",
    params(PageQuery),
    responses((status = 200, description = "A page of posts", body = [PostSummary]))
)]
pub async fn list_posts(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> ApiResult<PageResult<PostSummary>> {
    let page = PageRequest::from_query(&query);
    let (offset, limit) = page.to_offset_limit();

    let total = state.repo.count_posts().await?;
    let posts = state.repo.list_posts(offset, limit).await?;

    Ok(ApiResponse::success(PageResult::from_request(posts, total, page)))
}

/// get_post
///
/// [Public Route] A single post with author and every comment.
#[utoipa::path(
    get,
    path = "/posts/{post_id}",
    params(("post_id" = i64, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Found", body = PostDetail),
        (status = 404, description = "Post not found")
    )
)]
pub async fn get_post(
    State(state): State<AppState>,
    ApiPath(post_id): ApiPath<i64>,
) -> ApiResult<PostDetail> {
    let post = require_post(&state, post_id).await?;
    let comments = state.repo.get_all_comments(post_id).await?;
    Ok(ApiResponse::success(PostDetail { post, comments }))
}

/// list_comments
///
/// [Public Route] Paginated comments of one post, oldest first.
#[utoipa::path(
    get,
    path = "/posts/{post_id}/comments",
    params(("post_id" = i64, Path, description = "Post ID"), PageQuery),
    responses(
        (status = 200, description = "A page of comments", body = [Comment]),
        (status = 404, description = "Post not found")
    )
)]
pub async fn list_comments(
    State(state): State<AppState>,
    ApiPath(post_id): ApiPath<i64>,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> ApiResult<PageResult<Comment>> {
    require_post(&state, post_id).await?;

    let page = PageRequest::from_query(&query);
    let (offset, limit) = page.to_offset_limit();

    let total = state.repo.count_comments(post_id).await?;
    let comments = state.repo.list_comments(post_id, offset, limit).await?;

    Ok(ApiResponse::success(PageResult::from_request(comments, total, page)))
}
