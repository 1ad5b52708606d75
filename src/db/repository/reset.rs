use chrono::Utc;

use sqlx::Row;
use sqlx::SqlitePool;

use crate::db::models::Reset;
use crate::error::{AppError, AppResult};

// ============================================================================
// Reset Repository
// ============================================================================

pub struct ResetRepository;

impl ResetRepository {
    /// Create or overwrite the outstanding reset grant for a user. A repeat
    /// request invalidates the previous token.
    pub async fn upsert(pool: &SqlitePool, username: &str, token: &str) -> AppResult<()> {
        let now = Utc::now().naive_utc();

        sqlx::query(
            r#"
            INSERT INTO resets (username, token, created_at)
            VALUES (?, ?, ?)
            ON CONFLICT (username) DO UPDATE SET token = excluded.token, created_at = excluded.created_at
            "#,
        )
        .bind(username)
        .bind(token)
        .bind(now)
        .execute(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(())
    }

    pub async fn find_by_username(pool: &SqlitePool, username: &str) -> AppResult<Option<Reset>> {
        let row = sqlx::query(
            r#"
            SELECT username, token, created_at
            FROM resets
            WHERE username = ?
            "#,
        )
        .bind(username)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row.map(|r| Reset {
            username: r.get("username"),
            token: r.get("token"),
            created_at: r.get("created_at"),
        }))
    }

    pub async fn delete_by_username(pool: &SqlitePool, username: &str) -> AppResult<()> {
        sqlx::query("DELETE FROM resets WHERE username = ?")
            .bind(username)
            .execute(pool)
            .await
            .map_err(AppError::Database)?;

        Ok(())
    }
}
