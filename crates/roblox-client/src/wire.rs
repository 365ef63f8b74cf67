//! JSON shapes of the directory responses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UsernamesRequest<'a> {
    pub usernames: [&'a str; 1],
    pub exclude_banned_users: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DataEnvelope<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UsernameEntry {
    pub id: u64,
    pub name: String,
    pub display_name: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GroupRoleEntry {
    pub group: GroupInfo,
    pub role: RoleInfo,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GroupInfo {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RoleInfo {
    pub name: String,
    pub rank: u8,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UserEntry {
    #[serde(default)]
    pub description: Option<String>,
    pub created: DateTime<Utc>,
    #[serde(default)]
    pub is_banned: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ThumbnailEntry {
    pub state: String,
    #[serde(default)]
    pub image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BadgeEntry {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CountEntry {
    pub count: u64,
}
