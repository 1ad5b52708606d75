use chrono::Utc;

use sqlx::Row;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::models::Dashboard;
use crate::error::{AppError, AppResult};

// ============================================================================
// Dashboard Repository
// ============================================================================

pub struct DashboardRepository;

/// `layout` and `items` live in TEXT columns; a row that fails to parse as
/// JSON is corrupt and surfaces as an internal error.
fn map_row(r: sqlx::sqlite::SqliteRow, include_password: bool) -> AppResult<Dashboard> {
    let layout: String = r.get("layout");
    let items: String = r.get("items");

    Ok(Dashboard {
        id: r.get("id"),
        owner: r.get("owner"),
        name: r.get("name"),
        layout: serde_json::from_str(&layout)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("corrupt dashboard layout: {}", e)))?,
        items: serde_json::from_str(&items)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("corrupt dashboard items: {}", e)))?,
        next_id: r.get("next_id"),
        shared: r.get("shared"),
        password: if include_password {
            r.get("password")
        } else {
            None
        },
        views: r.get("views"),
        created_at: r.get("created_at"),
        updated_at: r.get("updated_at"),
    })
}

const ALL_COLUMNS: &str =
    "id, owner, name, layout, items, next_id, shared, password, views, created_at, updated_at";

impl DashboardRepository {
    pub async fn list_by_owner(pool: &SqlitePool, owner: &str) -> AppResult<Vec<Dashboard>> {
        let rows = sqlx::query(&format!(
            "SELECT {ALL_COLUMNS} FROM dashboards WHERE owner = ? ORDER BY created_at ASC"
        ))
        .bind(owner)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)?;

        rows.into_iter().map(|r| map_row(r, false)).collect()
    }

    pub async fn create(
        pool: &SqlitePool,
        owner: &str,
        name: &str,
        layout: &serde_json::Value,
        items: &serde_json::Value,
        next_id: i64,
    ) -> AppResult<()> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();

        sqlx::query(
            r#"
            INSERT INTO dashboards (id, owner, name, layout, items, next_id, shared, password, views, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, FALSE, NULL, 0, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(owner)
        .bind(name)
        .bind(layout.to_string())
        .bind(items.to_string())
        .bind(next_id)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(())
    }

    pub async fn find_by_owner_and_name(
        pool: &SqlitePool,
        owner: &str,
        name: &str,
    ) -> AppResult<Option<Dashboard>> {
        let row = sqlx::query(&format!(
            "SELECT {ALL_COLUMNS} FROM dashboards WHERE owner = ? AND name = ?"
        ))
        .bind(owner)
        .bind(name)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)?;

        row.map(|r| map_row(r, false)).transpose()
    }

    pub async fn find_by_id_and_owner(
        pool: &SqlitePool,
        id: &str,
        owner: &str,
    ) -> AppResult<Option<Dashboard>> {
        let row = sqlx::query(&format!(
            "SELECT {ALL_COLUMNS} FROM dashboards WHERE id = ? AND owner = ?"
        ))
        .bind(id)
        .bind(owner)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)?;

        row.map(|r| map_row(r, false)).transpose()
    }

    /// Single lookup used by the public viewing routes. The password column
    /// is only populated when the caller opts in with `include_password`.
    pub async fn find_by_id(
        pool: &SqlitePool,
        id: &str,
        include_password: bool,
    ) -> AppResult<Option<Dashboard>> {
        let row = sqlx::query(&format!(
            "SELECT {ALL_COLUMNS} FROM dashboards WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)?;

        row.map(|r| map_row(r, include_password)).transpose()
    }

    /// Wholesale replacement of layout/items/nextId scoped to (id, owner).
    /// Returns whether a row matched.
    pub async fn save_contents(
        pool: &SqlitePool,
        id: &str,
        owner: &str,
        layout: &serde_json::Value,
        items: &serde_json::Value,
        next_id: i64,
    ) -> AppResult<bool> {
        let now = Utc::now().naive_utc();

        let result = sqlx::query(
            r#"
            UPDATE dashboards
            SET layout = ?, items = ?, next_id = ?, updated_at = ?
            WHERE id = ? AND owner = ?
            "#,
        )
        .bind(layout.to_string())
        .bind(items.to_string())
        .bind(next_id)
        .bind(now)
        .bind(id)
        .bind(owner)
        .execute(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_by_id_and_owner(
        pool: &SqlitePool,
        id: &str,
        owner: &str,
    ) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM dashboards WHERE id = ? AND owner = ?")
            .bind(id)
            .bind(owner)
            .execute(pool)
            .await
            .map_err(AppError::Database)?;

        Ok(result.rows_affected() > 0)
    }

    /// Atomic find-and-update flip of the shared flag. Returns the new value,
    /// or None when no dashboard matched (id, owner).
    pub async fn toggle_shared(
        pool: &SqlitePool,
        id: &str,
        owner: &str,
    ) -> AppResult<Option<bool>> {
        let now = Utc::now().naive_utc();

        let row = sqlx::query(
            r#"
            UPDATE dashboards
            SET shared = NOT shared, updated_at = ?
            WHERE id = ? AND owner = ?
            RETURNING shared
            "#,
        )
        .bind(now)
        .bind(id)
        .bind(owner)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row.map(|r| r.get("shared")))
    }

    /// Stores the supplied value verbatim; None clears the password and
    /// disables the gate. Returns whether a row matched.
    pub async fn set_password(
        pool: &SqlitePool,
        id: &str,
        owner: &str,
        password: Option<&str>,
    ) -> AppResult<bool> {
        let now = Utc::now().naive_utc();

        let result = sqlx::query(
            r#"
            UPDATE dashboards
            SET password = ?, updated_at = ?
            WHERE id = ? AND owner = ?
            "#,
        )
        .bind(password)
        .bind(now)
        .bind(id)
        .bind(owner)
        .execute(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn increment_views(pool: &SqlitePool, id: &str) -> AppResult<()> {
        sqlx::query("UPDATE dashboards SET views = views + 1 WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await
            .map_err(AppError::Database)?;

        Ok(())
    }
}
