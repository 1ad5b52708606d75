use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,

    /// Bcrypt hash. Never serialized into API responses.
    #[serde(skip_serializing)]
    pub password: String,

    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}
