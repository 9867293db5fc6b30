use crate::models::{Comment, NewUser, Post, PostSummary, User};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepositoryError {
    /// A unique constraint was violated; carries the offending field name.
    #[error("{0} already exists")]
    Conflict(&'static str),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Repository Trait
///
/// The persistence contract the handlers depend on. Injected through `AppState` so the
/// Postgres implementation can be swapped for [`InMemoryRepository`] in tests.
///
/// Every read excludes soft-deleted rows.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    async fn get_user(&self, id: i64) -> RepositoryResult<Option<User>>;
    async fn get_user_by_username(&self, username: &str) -> RepositoryResult<Option<User>>;
    async fn get_user_by_email(&self, email: &str) -> RepositoryResult<Option<User>>;
    /// Fails with `Conflict("username" | "email")` on a duplicate.
    async fn create_user(&self, user: NewUser) -> RepositoryResult<User>;

    // --- Posts ---
    async fn create_post(&self, user_id: i64, title: String, content: String) -> RepositoryResult<Post>;
    async fn get_post(&self, id: i64) -> RepositoryResult<Option<Post>>;
    async fn update_post(&self, id: i64, title: String, content: String) -> RepositoryResult<Option<Post>>;
    /// Soft delete. Returns false when no live post had that id.
    async fn delete_post(&self, id: i64) -> RepositoryResult<bool>;
    async fn count_posts(&self) -> RepositoryResult<i64>;
    /// Newest first.
    async fn list_posts(&self, offset: i64, limit: i64) -> RepositoryResult<Vec<PostSummary>>;

    // --- Comments ---
    async fn add_comment(&self, post_id: i64, user_id: i64, content: String) -> RepositoryResult<Comment>;
    async fn count_comments(&self, post_id: i64) -> RepositoryResult<i64>;
    /// Oldest first.
    async fn list_comments(&self, post_id: i64, offset: i64, limit: i64) -> RepositoryResult<Vec<Comment>>;
    async fn get_all_comments(&self, post_id: i64) -> RepositoryResult<Vec<Comment>>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

// --- Postgres ---

const USER_COLUMNS: &str = "id, username, email, password_hash, created_at, updated_at";

const POST_SELECT: &str = r#"
    SELECT p.id, p.title, p.content, p.user_id, u.username AS author, p.created_at, p.updated_at
    FROM posts p
    JOIN users u ON u.id = p.user_id
"#;

const COMMENT_SELECT: &str = r#"
    SELECT c.id, c.content, c.user_id, c.post_id, u.username AS author, c.created_at
    FROM comments c
    JOIN users u ON u.id = c.user_id
"#;

/// PostgresRepository
///
/// The production implementation of [`Repository`], backed by a `PgPool`.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_user_by(&self, column: &str, value: &str) -> RepositoryResult<Option<User>> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE {column} = $1 AND deleted_at IS NULL"
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }
}

/// Maps a unique-constraint violation on `users` to the field it guards.
fn map_unique_violation(err: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return match db_err.constraint() {
                Some(c) if c.contains("email") => RepositoryError::Conflict("email"),
                _ => RepositoryError::Conflict("username"),
            };
        }
    }
    RepositoryError::Database(err)
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn get_user(&self, id: i64) -> RepositoryResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1 AND deleted_at IS NULL");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn get_user_by_username(&self, username: &str) -> RepositoryResult<Option<User>> {
        self.find_user_by("username", username).await
    }

    async fn get_user_by_email(&self, email: &str) -> RepositoryResult<Option<User>> {
        self.find_user_by("email", email).await
    }

    async fn create_user(&self, user: NewUser) -> RepositoryResult<User> {
        let sql = format!(
            "INSERT INTO users (username, email, password_hash) VALUES ($1, $2, $3) RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(&user.username)
            .bind(&user.email)
            .bind(&user.password_hash)
            .fetch_one(&self.pool)
            .await
            .map_err(map_unique_violation)
    }

    /// Inserts and joins the author in one round trip, the same CTE shape as `add_comment`.
    async fn create_post(&self, user_id: i64, title: String, content: String) -> RepositoryResult<Post> {
        let post = sqlx::query_as::<_, Post>(
            r#"
            WITH inserted AS (
                INSERT INTO posts (title, content, user_id) VALUES ($1, $2, $3)
                RETURNING id, title, content, user_id, created_at, updated_at
            )
            SELECT i.id, i.title, i.content, i.user_id, u.username AS author, i.created_at, i.updated_at
            FROM inserted i JOIN users u ON u.id = i.user_id
            "#,
        )
        .bind(title)
        .bind(content)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(post)
    }

    async fn get_post(&self, id: i64) -> RepositoryResult<Option<Post>> {
        let sql = format!("{POST_SELECT} WHERE p.id = $1 AND p.deleted_at IS NULL");
        let post = sqlx::query_as::<_, Post>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(post)
    }

    async fn update_post(&self, id: i64, title: String, content: String) -> RepositoryResult<Option<Post>> {
        let post = sqlx::query_as::<_, Post>(
            r#"
            WITH updated AS (
                UPDATE posts SET title = $2, content = $3, updated_at = NOW()
                WHERE id = $1 AND deleted_at IS NULL
                RETURNING id, title, content, user_id, created_at, updated_at
            )
            SELECT d.id, d.title, d.content, d.user_id, u.username AS author, d.created_at, d.updated_at
            FROM updated d JOIN users u ON u.id = d.user_id
            "#,
        )
        .bind(id)
        .bind(title)
        .bind(content)
        .fetch_optional(&self.pool)
        .await?;
        Ok(post)
    }

    async fn delete_post(&self, id: i64) -> RepositoryResult<bool> {
        let result = sqlx::query(
            "UPDATE posts SET deleted_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_posts(&self) -> RepositoryResult<i64> {
        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM posts WHERE deleted_at IS NULL")
            .fetch_one(&self.pool)
            .await?;
        Ok(total)
    }

    async fn list_posts(&self, offset: i64, limit: i64) -> RepositoryResult<Vec<PostSummary>> {
        let posts = sqlx::query_as::<_, PostSummary>(
            r#"
            SELECT p.id, p.title, p.content, p.user_id, u.username AS author,
                   p.created_at, p.updated_at,
                   (SELECT COUNT(*) FROM comments c
                    WHERE c.post_id = p.id AND c.deleted_at IS NULL) AS comment_count
            FROM posts p
            JOIN users u ON u.id = p.user_id
            WHERE p.deleted_at IS NULL
            ORDER BY p.created_at DESC, p.id DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(posts)
    }

    async fn add_comment(&self, post_id: i64, user_id: i64, content: String) -> RepositoryResult<Comment> {
        let comment = sqlx::query_as::<_, Comment>(
            r#"
            WITH inserted AS (
                INSERT INTO comments (content, user_id, post_id) VALUES ($1, $2, $3)
                RETURNING id, content, user_id, post_id, created_at
            )
            SELECT i.id, i.content, i.user_id, i.post_id, u.username AS author, i.created_at
            FROM inserted i JOIN users u ON u.id = i.user_id
            "#,
        )
        .bind(content)
        .bind(user_id)
        .bind(post_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(comment)
    }

    async fn count_comments(&self, post_id: i64) -> RepositoryResult<i64> {
        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM comments WHERE post_id = $1 AND deleted_at IS NULL",
        )
        .bind(post_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(total)
    }

    async fn list_comments(&self, post_id: i64, offset: i64, limit: i64) -> RepositoryResult<Vec<Comment>> {
        let sql = format!(
            "{COMMENT_SELECT} WHERE c.post_id = $1 AND c.deleted_at IS NULL
             ORDER BY c.created_at ASC, c.id ASC LIMIT $2 OFFSET $3"
        );
        let comments = sqlx::query_as::<_, Comment>(&sql)
            .bind(post_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;
        Ok(comments)
    }

    async fn get_all_comments(&self, post_id: i64) -> RepositoryResult<Vec<Comment>> {
        let sql = format!(
            "{COMMENT_SELECT} WHERE c.post_id = $1 AND c.deleted_at IS NULL
             ORDER BY c.created_at ASC, c.id ASC"
        );
        let comments = sqlx::query_as::<_, Comment>(&sql)
            .bind(post_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(comments)
    }
}

// --- In-memory ---

#[derive(Default)]
struct MemoryTables {
    users: Vec<User>,
    posts: Vec<(Post, bool)>,
    comments: Vec<Comment>,
}

impl MemoryTables {
    fn username_of(&self, user_id: i64) -> Option<String> {
        self.users
            .iter()
            .find(|u| u.id == user_id)
            .map(|u| u.username.clone())
    }

    fn live_post(&self, id: i64) -> Option<&Post> {
        self.posts
            .iter()
            .find(|(p, deleted)| p.id == id && !deleted)
            .map(|(p, _)| p)
    }

    fn with_author(&self, post: &Post) -> Post {
        Post {
            author: self.username_of(post.user_id),
            ..post.clone()
        }
    }

    fn comments_of(&self, post_id: i64) -> Vec<Comment> {
        let mut comments: Vec<Comment> = self
            .comments
            .iter()
            .filter(|c| c.post_id == post_id)
            .map(|c| Comment {
                author: self.username_of(c.user_id),
                ..c.clone()
            })
            .collect();
        comments.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        comments
    }
}

/// InMemoryRepository
///
/// A process-local implementation of [`Repository`] with the same unique constraints,
/// soft-delete and ordering rules as the Postgres schema. Used by the test suite.
#[derive(Default)]
pub struct InMemoryRepository {
    tables: RwLock<MemoryTables>,
    /// When true, every operation returns a simulated data-store failure.
    pub should_fail: bool,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    fn check(&self) -> RepositoryResult<()> {
        if self.should_fail {
            return Err(RepositoryError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }

    fn read<R>(&self, f: impl FnOnce(&MemoryTables) -> R) -> RepositoryResult<R> {
        self.check()?;
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        Ok(f(&tables))
    }

    fn write<R>(&self, f: impl FnOnce(&mut MemoryTables) -> RepositoryResult<R>) -> RepositoryResult<R> {
        self.check()?;
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut tables)
    }
}

fn paginate<T>(items: Vec<T>, offset: i64, limit: i64) -> Vec<T> {
    items
        .into_iter()
        .skip(offset.max(0) as usize)
        .take(limit.max(0) as usize)
        .collect()
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn get_user(&self, id: i64) -> RepositoryResult<Option<User>> {
        self.read(|t| t.users.iter().find(|u| u.id == id).cloned())
    }

    async fn get_user_by_username(&self, username: &str) -> RepositoryResult<Option<User>> {
        self.read(|t| t.users.iter().find(|u| u.username == username).cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> RepositoryResult<Option<User>> {
        self.read(|t| t.users.iter().find(|u| u.email == email).cloned())
    }

    async fn create_user(&self, user: NewUser) -> RepositoryResult<User> {
        self.write(|t| {
            if t.users.iter().any(|u| u.username == user.username) {
                return Err(RepositoryError::Conflict("username"));
            }
            if t.users.iter().any(|u| u.email == user.email) {
                return Err(RepositoryError::Conflict("email"));
            }
            let now = Utc::now();
            let created = User {
                id: t.users.len() as i64 + 1,
                username: user.username,
                email: user.email,
                password_hash: user.password_hash,
                created_at: now,
                updated_at: now,
            };
            t.users.push(created.clone());
            Ok(created)
        })
    }

    async fn create_post(&self, user_id: i64, title: String, content: String) -> RepositoryResult<Post> {
        self.write(|t| {
            let now = Utc::now();
            let post = Post {
                id: t.posts.len() as i64 + 1,
                title,
                content,
                user_id,
                author: None,
                created_at: now,
                updated_at: now,
            };
            t.posts.push((post.clone(), false));
            Ok(t.with_author(&post))
        })
    }

    async fn get_post(&self, id: i64) -> RepositoryResult<Option<Post>> {
        self.read(|t| t.live_post(id).map(|p| t.with_author(p)))
    }

    async fn update_post(&self, id: i64, title: String, content: String) -> RepositoryResult<Option<Post>> {
        self.write(|t| {
            let Some((post, _)) = t.posts.iter_mut().find(|(p, deleted)| p.id == id && !deleted) else {
                return Ok(None);
            };
            post.title = title;
            post.content = content;
            post.updated_at = Utc::now();
            let updated = post.clone();
            Ok(Some(t.with_author(&updated)))
        })
    }

    async fn delete_post(&self, id: i64) -> RepositoryResult<bool> {
        self.write(|t| {
            match t.posts.iter_mut().find(|(p, deleted)| p.id == id && !deleted) {
                Some(entry) => {
                    entry.1 = true;
                    Ok(true)
                }
                None => Ok(false),
            }
        })
    }

    async fn count_posts(&self) -> RepositoryResult<i64> {
        self.read(|t| t.posts.iter().filter(|(_, deleted)| !deleted).count() as i64)
    }

    async fn list_posts(&self, offset: i64, limit: i64) -> RepositoryResult<Vec<PostSummary>> {
        self.read(|t| {
            let mut live: Vec<&Post> = t
                .posts
                .iter()
                .filter(|(_, deleted)| !deleted)
                .map(|(p, _)| p)
                .collect();
            live.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
            let summaries: Vec<PostSummary> = live
                .into_iter()
                .map(|p| PostSummary {
                    post: t.with_author(p),
                    comment_count: t.comments.iter().filter(|c| c.post_id == p.id).count() as i64,
                })
                .collect();
            paginate(summaries, offset, limit)
        })
    }

    async fn add_comment(&self, post_id: i64, user_id: i64, content: String) -> RepositoryResult<Comment> {
        self.write(|t| {
            let comment = Comment {
                id: t.comments.len() as i64 + 1,
                content,
                user_id,
                post_id,
                author: t.username_of(user_id),
                created_at: Utc::now(),
            };
            t.comments.push(comment.clone());
            Ok(comment)
        })
    }

    async fn count_comments(&self, post_id: i64) -> RepositoryResult<i64> {
        self.read(|t| t.comments.iter().filter(|c| c.post_id == post_id).count() as i64)
    }

    async fn list_comments(&self, post_id: i64, offset: i64, limit: i64) -> RepositoryResult<Vec<Comment>> {
        self.read(|t| paginate(t.comments_of(post_id), offset, limit))
    }

    async fn get_all_comments(&self, post_id: i64) -> RepositoryResult<Vec<Comment>> {
        self.read(|t| t.comments_of(post_id))
    }
}
