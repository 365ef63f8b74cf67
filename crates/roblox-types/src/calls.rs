//! Catalog of remote calls supported by the directory gateway.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::payloads::AccountId;

/// Name of one entry in the fixed remote-call catalog.
///
/// Ordering follows declaration order, so maps keyed by `CallName` iterate
/// in catalog order regardless of completion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CallName {
    #[serde(rename = "resolve-account-by-name")]
    ResolveAccount,
    #[serde(rename = "get-role-in-group")]
    RoleInGroup,
    #[serde(rename = "get-profile")]
    Profile,
    #[serde(rename = "get-avatar-url")]
    AvatarUrl,
    #[serde(rename = "get-badges")]
    Badges,
    #[serde(rename = "get-friends")]
    Friends,
    #[serde(rename = "get-groups")]
    Groups,
    #[serde(rename = "get-account-age")]
    AccountAge,
}

impl CallName {
    /// Every catalog entry, in catalog order.
    pub const ALL: [CallName; 8] = [
        CallName::ResolveAccount,
        CallName::RoleInGroup,
        CallName::Profile,
        CallName::AvatarUrl,
        CallName::Badges,
        CallName::Friends,
        CallName::Groups,
        CallName::AccountAge,
    ];

    /// Wire name used in logs and in `Skipped` causes.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ResolveAccount => "resolve-account-by-name",
            Self::RoleInGroup => "get-role-in-group",
            Self::Profile => "get-profile",
            Self::AvatarUrl => "get-avatar-url",
            Self::Badges => "get-badges",
            Self::Friends => "get-friends",
            Self::Groups => "get-groups",
            Self::AccountAge => "get-account-age",
        }
    }

    /// Whether the call needs a resolved account id as input.
    pub fn requires_account(&self) -> bool {
        !matches!(self, Self::ResolveAccount)
    }
}

impl fmt::Display for CallName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully-parameterised remote call.
///
/// Each variant carries exactly the fields its call requires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum CallRequest {
    ResolveAccount { name: String },
    RoleInGroup { account_id: AccountId, group_id: u64 },
    Profile { account_id: AccountId },
    AvatarUrl { account_id: AccountId },
    Badges { account_id: AccountId },
    Friends { account_id: AccountId },
    Groups { account_id: AccountId },
    AccountAge { account_id: AccountId },
}

impl CallRequest {
    /// Build the request for an account-scoped call.
    ///
    /// Returns `None` for [`CallName::ResolveAccount`], which takes a name.
    pub fn for_account(name: CallName, account_id: AccountId, group_id: u64) -> Option<Self> {
        let request = match name {
            CallName::ResolveAccount => return None,
            CallName::RoleInGroup => Self::RoleInGroup {
                account_id,
                group_id,
            },
            CallName::Profile => Self::Profile { account_id },
            CallName::AvatarUrl => Self::AvatarUrl { account_id },
            CallName::Badges => Self::Badges { account_id },
            CallName::Friends => Self::Friends { account_id },
            CallName::Groups => Self::Groups { account_id },
            CallName::AccountAge => Self::AccountAge { account_id },
        };
        Some(request)
    }

    pub fn name(&self) -> CallName {
        match self {
            Self::ResolveAccount { .. } => CallName::ResolveAccount,
            Self::RoleInGroup { .. } => CallName::RoleInGroup,
            Self::Profile { .. } => CallName::Profile,
            Self::AvatarUrl { .. } => CallName::AvatarUrl,
            Self::Badges { .. } => CallName::Badges,
            Self::Friends { .. } => CallName::Friends,
            Self::Groups { .. } => CallName::Groups,
            Self::AccountAge { .. } => CallName::AccountAge,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_names_match_serde() {
        for name in CallName::ALL {
            let json = serde_json::to_string(&name).unwrap();
            assert_eq!(json, format!("\"{}\"", name.as_str()));
        }
    }

    #[test]
    fn test_only_resolve_takes_a_name() {
        assert!(!CallName::ResolveAccount.requires_account());
        assert!(CallName::ALL[1..].iter().all(|n| n.requires_account()));
    }

    #[test]
    fn test_for_account_builds_matching_variant() {
        let id = AccountId(42);
        for name in &CallName::ALL[1..] {
            let request = CallRequest::for_account(*name, id, 7).unwrap();
            assert_eq!(request.name(), *name);
        }
        assert!(CallRequest::for_account(CallName::ResolveAccount, id, 7).is_none());
    }

    #[test]
    fn test_role_request_carries_group() {
        let request = CallRequest::for_account(CallName::RoleInGroup, AccountId(1), 11592051);
        assert_eq!(
            request,
            Some(CallRequest::RoleInGroup {
                account_id: AccountId(1),
                group_id: 11592051
            })
        );
    }

    #[test]
    fn test_catalog_order_is_ord() {
        let mut shuffled = vec![CallName::Groups, CallName::ResolveAccount, CallName::Badges];
        shuffled.sort();
        assert_eq!(
            shuffled,
            vec![CallName::ResolveAccount, CallName::Badges, CallName::Groups]
        );
    }
}
