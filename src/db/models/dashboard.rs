use chrono::NaiveDateTime;
use serde::Serialize;

/// A grid of widgets owned by one user.
///
/// `layout` is the ordered sequence of widget placement descriptors and
/// `items` the widget-id-to-configuration mapping. Both are stored as JSON
/// text and passed through verbatim so a save-then-get round-trip returns
/// exactly what the client sent.
///
/// `password` is excluded from default reads; repository lookups only fill
/// it when the caller explicitly opts in.
#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub id: String,
    pub owner: String,
    pub name: String,
    pub layout: serde_json::Value,
    pub items: serde_json::Value,
    pub next_id: i64,
    pub shared: bool,
    pub password: Option<String>,
    pub views: i64,

    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}
