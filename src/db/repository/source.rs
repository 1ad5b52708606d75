use chrono::Utc;

use sqlx::Row;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::models::Source;
use crate::error::{AppError, AppResult};

// ============================================================================
// Source Repository
// ============================================================================

/// Default connector kind for sources created implicitly by check-sources.
pub const DEFAULT_SOURCE_TYPE: &str = "stomp";

pub struct SourceRepository;

fn map_row(r: sqlx::sqlite::SqliteRow) -> Source {
    Source {
        id: r.get("id"),
        owner: r.get("owner"),
        name: r.get("name"),
        source_type: r.get("type"),
        url: r.get("url"),
        login: r.get("login"),
        passcode: r.get("passcode"),
        vhost: r.get("vhost"),
        created_at: r.get("created_at"),
        updated_at: r.get("updated_at"),
    }
}

impl SourceRepository {
    pub async fn list_by_owner(pool: &SqlitePool, owner: &str) -> AppResult<Vec<Source>> {
        let rows = sqlx::query(
            r#"
            SELECT id, owner, name, type, url, login, passcode, vhost, created_at, updated_at
            FROM sources
            WHERE owner = ?
            ORDER BY created_at ASC
            "#,
        )
        .bind(owner)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(rows.into_iter().map(map_row).collect())
    }

    pub async fn find_by_owner_and_name(
        pool: &SqlitePool,
        owner: &str,
        name: &str,
    ) -> AppResult<Option<Source>> {
        let row = sqlx::query(
            r#"
            SELECT id, owner, name, type, url, login, passcode, vhost, created_at, updated_at
            FROM sources
            WHERE owner = ? AND name = ?
            "#,
        )
        .bind(owner)
        .bind(name)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row.map(map_row))
    }

    pub async fn find_by_id_and_owner(
        pool: &SqlitePool,
        id: &str,
        owner: &str,
    ) -> AppResult<Option<Source>> {
        let row = sqlx::query(
            r#"
            SELECT id, owner, name, type, url, login, passcode, vhost, created_at, updated_at
            FROM sources
            WHERE id = ? AND owner = ?
            "#,
        )
        .bind(id)
        .bind(owner)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row.map(map_row))
    }

    /// Rename collision check: another source of the same owner already
    /// holding `name`.
    pub async fn find_other_with_name(
        pool: &SqlitePool,
        id: &str,
        owner: &str,
        name: &str,
    ) -> AppResult<Option<Source>> {
        let row = sqlx::query(
            r#"
            SELECT id, owner, name, type, url, login, passcode, vhost, created_at, updated_at
            FROM sources
            WHERE id != ? AND owner = ? AND name = ?
            "#,
        )
        .bind(id)
        .bind(owner)
        .bind(name)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row.map(map_row))
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn create(
        pool: &SqlitePool,
        owner: &str,
        name: &str,
        source_type: &str,
        url: &str,
        login: &str,
        passcode: &str,
        vhost: &str,
    ) -> AppResult<()> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();

        sqlx::query(
            r#"
            INSERT INTO sources (id, owner, name, type, url, login, passcode, vhost, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(owner)
        .bind(name)
        .bind(source_type)
        .bind(url)
        .bind(login)
        .bind(passcode)
        .bind(vhost)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn update(
        pool: &SqlitePool,
        id: &str,
        owner: &str,
        name: &str,
        source_type: &str,
        url: &str,
        login: &str,
        passcode: &str,
        vhost: &str,
    ) -> AppResult<()> {
        let now = Utc::now().naive_utc();

        sqlx::query(
            r#"
            UPDATE sources
            SET name = ?, type = ?, url = ?, login = ?, passcode = ?, vhost = ?, updated_at = ?
            WHERE id = ? AND owner = ?
            "#,
        )
        .bind(name)
        .bind(source_type)
        .bind(url)
        .bind(login)
        .bind(passcode)
        .bind(vhost)
        .bind(now)
        .bind(id)
        .bind(owner)
        .execute(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(())
    }

    /// Atomic find-and-remove scoped to (id, owner). Returns whether a row
    /// was actually deleted.
    pub async fn delete_by_id_and_owner(
        pool: &SqlitePool,
        id: &str,
        owner: &str,
    ) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM sources WHERE id = ? AND owner = ?")
            .bind(id)
            .bind(owner)
            .execute(pool)
            .await
            .map_err(AppError::Database)?;

        Ok(result.rows_affected() > 0)
    }

    /// Batch-ensure step for check-sources: create the source with default
    /// connection fields unless the owner already has one with that name.
    /// Returns whether a new row was inserted.
    pub async fn insert_if_absent(pool: &SqlitePool, owner: &str, name: &str) -> AppResult<bool> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();

        let result = sqlx::query(
            r#"
            INSERT INTO sources (id, owner, name, type, url, login, passcode, vhost, created_at, updated_at)
            VALUES (?, ?, ?, ?, '', '', '', '', ?, ?)
            ON CONFLICT (owner, name) DO NOTHING
            "#,
        )
        .bind(&id)
        .bind(owner)
        .bind(name)
        .bind(DEFAULT_SOURCE_TYPE)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(result.rows_affected() > 0)
    }
}
