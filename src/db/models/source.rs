use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Connection record for an external system (e.g. a message-queue broker)
/// that feeds dashboard widgets. (owner, name) is unique.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Source {
    pub id: String,
    pub owner: String,
    pub name: String,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub source_type: String,
    pub url: String,
    pub login: String,
    pub passcode: String,
    pub vhost: String,

    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}
