use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool, Row};
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

use crate::config::DatabaseConfig;

use super::manager::DatabaseError;
use super::models::{NewPost, NewUser, PostChanges, PostRow, PostWithCreator, User, DEFAULT_STATUS};
use super::store::FeedStore;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id UUID PRIMARY KEY,
        email TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        name TEXT NOT NULL,
        status TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS posts (
        id UUID PRIMARY KEY,
        title TEXT NOT NULL,
        content TEXT NOT NULL,
        image_url TEXT NOT NULL,
        creator_id UUID NOT NULL REFERENCES users (id) ON DELETE CASCADE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    "CREATE INDEX IF NOT EXISTS posts_created_at_idx ON posts (created_at DESC)",
    "CREATE INDEX IF NOT EXISTS posts_creator_id_idx ON posts (creator_id)",
    "CREATE INDEX IF NOT EXISTS posts_image_url_idx ON posts (image_url)",
];

const USER_COLUMNS: &str = "id, email, password_hash, name, status, created_at";

const POST_COLUMNS: &str = "p.id, p.title, p.content, p.image_url, p.creator_id, \
                            p.created_at, p.updated_at, u.name AS creator_name";

/// PostgreSQL store over a shared connection pool.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(url: &str, config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout))
            .connect(url)
            .await
            .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

        info!("Created database pool (max {} connections)", config.max_connections);
        Ok(Self { pool })
    }

    /// Create tables and indexes when missing.
    pub async fn migrate(&self) -> Result<(), DatabaseError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }
}

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";

fn has_sqlstate(err: &sqlx::Error, code: &str) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().as_deref() == Some(code),
        _ => false,
    }
}

#[async_trait]
impl FeedStore for PgStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn health_check(&self) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn create_user(&self, user: NewUser) -> Result<User, DatabaseError> {
        let sql = format!(
            "INSERT INTO users (id, email, password_hash, name, status) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            USER_COLUMNS
        );

        sqlx::query_as::<_, User>(&sql)
            .bind(Uuid::new_v4())
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(&user.name)
            .bind(DEFAULT_STATUS)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                if has_sqlstate(&e, UNIQUE_VIOLATION) {
                    DatabaseError::Conflict(format!("email '{}' is already registered", user.email))
                } else {
                    DatabaseError::Sqlx(e)
                }
            })
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError> {
        let sql = format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS);
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, DatabaseError> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn update_user_status(&self, id: Uuid, status: &str) -> Result<User, DatabaseError> {
        let sql = format!("UPDATE users SET status = $2 WHERE id = $1 RETURNING {}", USER_COLUMNS);
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(status)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DatabaseError::NotFound("User not found.".to_string()))
    }

    async fn post_ids_for_user(&self, id: Uuid) -> Result<Vec<Uuid>, DatabaseError> {
        let rows = sqlx::query("SELECT id FROM posts WHERE creator_id = $1 ORDER BY created_at DESC, id DESC")
            .bind(id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| row.try_get::<Uuid, _>("id").map_err(DatabaseError::from))
            .collect()
    }

    async fn count_posts(&self) -> Result<i64, DatabaseError> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM posts")
            .fetch_one(&self.pool)
            .await?;
        let count: i64 = row.try_get("count")?;
        Ok(count)
    }

    async fn list_posts(&self, offset: i64, limit: i64) -> Result<Vec<PostWithCreator>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM posts p JOIN users u ON u.id = p.creator_id \
             ORDER BY p.created_at DESC, p.id DESC OFFSET $1 LIMIT $2",
            POST_COLUMNS
        );
        let rows = sqlx::query_as::<_, PostRow>(&sql)
            .bind(offset.max(0))
            .bind(limit.max(0))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(PostWithCreator::from).collect())
    }

    async fn find_post(&self, id: Uuid) -> Result<Option<PostWithCreator>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM posts p JOIN users u ON u.id = p.creator_id WHERE p.id = $1",
            POST_COLUMNS
        );
        let row = sqlx::query_as::<_, PostRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(PostWithCreator::from))
    }

    async fn find_post_by_image(&self, image_url: &str) -> Result<Option<PostWithCreator>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM posts p JOIN users u ON u.id = p.creator_id WHERE p.image_url = $1 LIMIT 1",
            POST_COLUMNS
        );
        let row = sqlx::query_as::<_, PostRow>(&sql)
            .bind(image_url)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(PostWithCreator::from))
    }

    async fn create_post(&self, post: NewPost) -> Result<PostWithCreator, DatabaseError> {
        let sql = format!(
            "WITH p AS ( \
                 INSERT INTO posts (id, title, content, image_url, creator_id) \
                 VALUES ($1, $2, $3, $4, $5) RETURNING * \
             ) SELECT {} FROM p JOIN users u ON u.id = p.creator_id",
            POST_COLUMNS
        );
        let row = sqlx::query_as::<_, PostRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(&post.title)
            .bind(&post.content)
            .bind(&post.image_url)
            .bind(post.creator_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                if has_sqlstate(&e, FOREIGN_KEY_VIOLATION) {
                    DatabaseError::NotFound("User not found.".to_string())
                } else {
                    DatabaseError::Sqlx(e)
                }
            })?;
        Ok(row.into())
    }

    async fn update_post(&self, id: Uuid, changes: PostChanges) -> Result<PostWithCreator, DatabaseError> {
        let sql = format!(
            "WITH p AS ( \
                 UPDATE posts SET title = $2, content = $3, image_url = $4, updated_at = NOW() \
                 WHERE id = $1 RETURNING * \
             ) SELECT {} FROM p JOIN users u ON u.id = p.creator_id",
            POST_COLUMNS
        );
        let row = sqlx::query_as::<_, PostRow>(&sql)
            .bind(id)
            .bind(&changes.title)
            .bind(&changes.content)
            .bind(&changes.image_url)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DatabaseError::NotFound("Could not find post.".to_string()))?;
        Ok(row.into())
    }

    async fn delete_post(&self, id: Uuid) -> Result<(), DatabaseError> {
        let result = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound("Could not find post.".to_string()));
        }
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
        info!("Closed database pool");
    }
}
