use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Outstanding password-reset grant for one user. Absence of the row is the
/// expiry signal; completing a password change deletes it.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Reset {
    pub username: String,
    pub token: String,
    pub created_at: NaiveDateTime,
}
