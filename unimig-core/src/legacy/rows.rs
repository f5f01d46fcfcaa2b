use chrono::{DateTime, Utc};
use serde_json::Value;

/// A dashboard or folder, current or historical
#[derive(Clone, Debug, PartialEq)]
pub struct DashboardRow {
    pub internal_id: i64,
    pub org_id: i64,
    pub uid: String,
    pub folder_uid: Option<String>,
    pub title: String,
    pub is_folder: bool,
    pub version: i64,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    pub created_by: i64,
    pub updated_by: i64,
    pub deleted: Option<DateTime<Utc>>,
    pub message: Option<String>,
    pub data: Value,
    pub resource_version: i64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LibraryPanelRow {
    pub internal_id: i64,
    pub org_id: i64,
    pub uid: String,
    pub folder_uid: Option<String>,
    pub name: String,
    pub panel_type: String,
    pub description: String,
    pub model: Value,
    pub version: i64,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    pub created_by: i64,
    pub updated_by: i64,
    pub resource_version: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlaylistItemRow {
    pub item_type: String,
    pub value: String,
    pub title: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlaylistRow {
    pub internal_id: i64,
    pub org_id: i64,
    pub uid: String,
    pub name: String,
    pub interval: String,
    pub items: Vec<PlaylistItemRow>,
    /// Epoch milliseconds
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShortUrlRow {
    pub internal_id: i64,
    pub org_id: i64,
    pub uid: String,
    pub path: String,
    pub created_by: i64,
    /// Epoch seconds
    pub created_at: i64,
    pub last_seen_at: i64,
}
