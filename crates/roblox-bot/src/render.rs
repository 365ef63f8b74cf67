//! Pure rendering of aggregate results and user-facing texts.
//!
//! The field list is fixed: a field whose call failed or was skipped shows
//! [`UNAVAILABLE`] instead of disappearing, so every lookup renders the
//! same shape.

#[cfg(test)]
#[path = "render_tests.rs"]
mod render_tests;

use std::collections::BTreeMap;

use roblox_types::{CallName, CallPayload, GroupRole};
use serde::{Deserialize, Serialize};

use crate::aggregator::AggregateResult;

pub const UNAVAILABLE: &str = "unavailable";

/// Discord caps embed field values at 1024 characters.
const FIELD_VALUE_LIMIT: usize = 1024;

const COLOUR_COMPLETE: u32 = 0x2ecc71;
const COLOUR_PARTIAL: u32 = 0xf1c40f;
const COLOUR_NOT_FOUND: u32 = 0xe74c3c;

const FOOTER: &str = "Roblox account lookup";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

/// Display payload for one lookup, independent of the chat platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayPayload {
    pub title: String,
    pub url: Option<String>,
    pub description: Option<String>,
    pub fields: Vec<EmbedField>,
    pub thumbnail_url: Option<String>,
    pub footer: String,
    pub colour: u32,
}

/// One rank number → rank name entry, as written in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankName {
    pub rank: u8,
    pub name: String,
}

/// Rank number → display name mapping for the configured group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RankNames(BTreeMap<u8, String>);

impl RankNames {
    pub fn get(&self, rank: u8) -> Option<&str> {
        self.0.get(&rank).map(String::as_str)
    }
}

impl FromIterator<RankName> for RankNames {
    fn from_iter<I: IntoIterator<Item = RankName>>(iter: I) -> Self {
        Self(iter.into_iter().map(|r| (r.rank, r.name)).collect())
    }
}

#[derive(Debug, Clone, Default)]
pub struct Renderer {
    ranks: RankNames,
}

impl Renderer {
    pub fn new(ranks: RankNames) -> Self {
        Self { ranks }
    }

    pub fn render(&self, result: &AggregateResult) -> DisplayPayload {
        let account = result.account.as_ref();
        let role = match result.payload(CallName::RoleInGroup) {
            Some(CallPayload::Role(role)) => Some(role.as_ref()),
            _ => None,
        };
        let profile = match result.payload(CallName::Profile) {
            Some(CallPayload::Profile(profile)) => Some(profile),
            _ => None,
        };

        let fields = vec![
            field("Username", account.map(|a| a.name.clone()), true),
            field("Display Name", account.map(|a| a.display_name.clone()), true),
            field("User ID", account.map(|a| a.id.to_string()), true),
            field("Rank", role.map(|r| self.rank_text(r)), true),
            field(
                "Role",
                role.map(|r| r.map_or_else(not_in_group, |r| r.name.clone())),
                true,
            ),
            field(
                "Description",
                profile.map(|p| {
                    if p.description.trim().is_empty() {
                        "No description".to_string()
                    } else {
                        p.description.trim().to_string()
                    }
                }),
                false,
            ),
            field(
                "Created",
                profile.map(|p| p.created.format("%Y-%m-%d").to_string()),
                true,
            ),
            field(
                "Banned",
                profile.map(|p| if p.is_banned { "Yes" } else { "No" }.to_string()),
                true,
            ),
            field(
                "Account Age",
                match result.payload(CallName::AccountAge) {
                    Some(CallPayload::AccountAge(age)) => Some(format!("{} days", age.days)),
                    _ => None,
                },
                true,
            ),
            field(
                "Badges",
                match result.payload(CallName::Badges) {
                    Some(CallPayload::Badges(badges)) if badges.is_empty() => {
                        Some("None".to_string())
                    }
                    Some(CallPayload::Badges(badges)) => Some(
                        badges
                            .iter()
                            .map(|b| b.name.as_str())
                            .collect::<Vec<_>>()
                            .join(", "),
                    ),
                    _ => None,
                },
                false,
            ),
            field(
                "Friends",
                match result.payload(CallName::Friends) {
                    Some(CallPayload::Friends(count)) => Some(count.to_string()),
                    _ => None,
                },
                true,
            ),
            field(
                "Groups",
                match result.payload(CallName::Groups) {
                    Some(CallPayload::Groups(groups)) => Some(groups.len().to_string()),
                    _ => None,
                },
                true,
            ),
        ];

        let thumbnail_url = match result.payload(CallName::AvatarUrl) {
            Some(CallPayload::AvatarUrl(url)) => Some(url.clone()),
            _ => None,
        };

        let not_found = result
            .resolve_failure()
            .is_some_and(|failure| failure.is_not_found());
        let complete = account.is_some() && result.is_complete();

        let (description, colour) = if not_found {
            (
                Some(format!("Roblox account `{}` not found.", result.target)),
                COLOUR_NOT_FOUND,
            )
        } else if complete {
            (None, COLOUR_COMPLETE)
        } else {
            (
                Some("Some details are unavailable right now.".to_string()),
                COLOUR_PARTIAL,
            )
        };

        DisplayPayload {
            title: match account {
                Some(a) => format!("{} (@{})", a.display_name, a.name),
                None => result.target.clone(),
            },
            url: account.map(|a| format!("https://www.roblox.com/users/{}/profile", a.id)),
            description,
            fields,
            thumbnail_url,
            footer: FOOTER.to_string(),
            colour,
        }
    }

    fn rank_text(&self, role: Option<&GroupRole>) -> String {
        match role {
            None => not_in_group(),
            Some(role) => match self.ranks.get(role.rank) {
                Some(name) => name.to_string(),
                None => format!("{} ({})", role.name, role.rank),
            },
        }
    }
}

/// Canonical progress text. Also the prefix used to recognise an
/// in-progress message in channel history.
pub fn fetching_text(target: &str) -> String {
    format!("Fetching profile for `{}`...", target)
}

pub fn cooldown_text(target: &str, remaining_secs: u64) -> String {
    format!(
        "Please wait {} seconds before reusing the command for `{}`.",
        remaining_secs, target
    )
}

pub fn failure_text(target: &str) -> String {
    format!(
        "Something went wrong while looking up `{}`. Please try again later.",
        target
    )
}

pub fn usage_text(prefix: &str) -> String {
    format!("Usage: `{}rank <username>`", prefix)
}

fn not_in_group() -> String {
    "Not in group".to_string()
}

fn field(name: &str, value: Option<String>, inline: bool) -> EmbedField {
    EmbedField {
        name: name.to_string(),
        value: value
            .map(|v| truncate(&v, FIELD_VALUE_LIMIT))
            .unwrap_or_else(|| UNAVAILABLE.to_string()),
        inline,
    }
}

fn truncate(value: &str, limit: usize) -> String {
    if value.chars().count() <= limit {
        return value.to_string();
    }
    let mut out: String = value.chars().take(limit - 1).collect();
    out.push('…');
    out
}
