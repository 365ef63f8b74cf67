//! Typed success payloads returned by the directory gateway.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Numeric Roblox user id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub u64);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Result of resolving a human-supplied name to an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedAccount {
    pub id: AccountId,
    /// Canonical username, as stored upstream.
    pub name: String,
    pub display_name: String,
}

/// Role held by an account in the configured group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRole {
    pub rank: u8,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub description: String,
    pub created: DateTime<Utc>,
    pub is_banned: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Badge {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMembership {
    pub group_id: u64,
    pub group_name: String,
    pub role_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountAge {
    pub created: DateTime<Utc>,
    /// Whole days between `created` and the time of the call.
    pub days: i64,
}

/// Success payload of one remote call, tagged by the call that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "call", content = "data", rename_all = "snake_case")]
pub enum CallPayload {
    Account(ResolvedAccount),
    /// `None` when the account is not a member of the group.
    Role(Option<GroupRole>),
    Profile(Profile),
    AvatarUrl(String),
    Badges(Vec<Badge>),
    Friends(u64),
    Groups(Vec<GroupMembership>),
    AccountAge(AccountAge),
}

impl CallPayload {
    pub fn as_account(&self) -> Option<&ResolvedAccount> {
        match self {
            Self::Account(account) => Some(account),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_id_is_transparent() {
        let json = serde_json::to_string(&AccountId(156)).unwrap();
        assert_eq!(json, "156");
    }

    #[test]
    fn test_as_account_only_matches_account() {
        let account = ResolvedAccount {
            id: AccountId(1),
            name: "builderman".to_string(),
            display_name: "Builderman".to_string(),
        };
        assert_eq!(
            CallPayload::Account(account.clone()).as_account(),
            Some(&account)
        );
        assert!(CallPayload::Friends(3).as_account().is_none());
    }

    #[test]
    fn test_role_payload_none_serializes() {
        let json = serde_json::to_value(CallPayload::Role(None)).unwrap();
        assert_eq!(json["call"], "role");
        assert!(json["data"].is_null());
    }
}
