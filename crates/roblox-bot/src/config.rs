//! Configuration management for roblox-bot

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;

use std::fs;

use anyhow::{bail, Context, Result};
use roblox_client::{ClientConfig, Endpoints};
use serde::{Deserialize, Serialize};
use tokio::time::Duration;

use crate::aggregator::RetryPolicy;
use crate::render::RankName;
use crate::service::LookupSettings;
use crate::tracker::{DedupeScope, ReleasePolicy};

/// Discord caps a history fetch at 100 messages.
const MAX_HISTORY_SCAN_DEPTH: u8 = 100;

/// Source of environment variables.
pub trait ReadEnv {
    fn var(&self, key: &str) -> Option<String>;
}

/// Reads the process environment.
pub struct SystemEnv;

impl ReadEnv for SystemEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// Complete bot configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub discord: DiscordBotConfig,
    pub roblox: RobloxConfig,
    #[serde(default)]
    pub lookup: LookupConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordBotConfig {
    /// Bot token from the Discord developer portal
    #[serde(default = "default_bot_token")]
    pub bot_token: String,
    #[serde(default = "default_command_prefix")]
    pub command_prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RobloxConfig {
    /// `.ROBLOSECURITY` cookie sent with every directory request
    #[serde(default = "default_cookie")]
    pub cookie: String,
    /// Group whose rank and role are looked up
    pub group_id: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub endpoints: Endpoints,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupConfig {
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
    /// Recent messages scanned for an unfinished progress message
    #[serde(default = "default_history_scan_depth")]
    pub history_scan_depth: u8,
    #[serde(default)]
    pub dedupe_scope: DedupeScope,
    #[serde(default)]
    pub release: ReleasePolicy,
    #[serde(default)]
    pub retry: RetryPolicy,
    /// Display names for group rank numbers
    #[serde(default)]
    pub ranks: Vec<RankName>,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: default_cooldown_secs(),
            history_scan_depth: default_history_scan_depth(),
            dedupe_scope: DedupeScope::default(),
            release: ReleasePolicy::default(),
            retry: RetryPolicy::default(),
            ranks: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path))?;

        Ok(config)
    }

    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_env_with(&SystemEnv)
    }

    pub fn from_env_with<E: ReadEnv>(env: &E) -> Result<Self> {
        let bot_token = env
            .var("DISCORD_BOT_TOKEN")
            .context("DISCORD_BOT_TOKEN not set")?;
        let cookie = env.var("ROBLOX_COOKIE").context("ROBLOX_COOKIE not set")?;
        let group_id = env
            .var("ROBLOX_GROUP_ID")
            .context("ROBLOX_GROUP_ID not set")?
            .trim()
            .parse::<u64>()
            .context("ROBLOX_GROUP_ID must be a number")?;

        let command_prefix = env
            .var("COMMAND_PREFIX")
            .unwrap_or_else(default_command_prefix);
        let request_timeout_secs = parse_or(
            env,
            "ROBLOX_REQUEST_TIMEOUT_SECS",
            default_request_timeout_secs(),
        )?;

        let dedupe_scope = match env
            .var("LOOKUP_DEDUPE_SCOPE")
            .unwrap_or_default()
            .to_lowercase()
            .as_str()
        {
            "channel" => DedupeScope::Channel,
            _ => DedupeScope::Requester,
        };
        let release = match env
            .var("LOOKUP_RELEASE")
            .unwrap_or_default()
            .to_lowercase()
            .as_str()
        {
            "after_cooldown" => ReleasePolicy::AfterCooldown,
            _ => ReleasePolicy::OnCompletion,
        };
        let ranks = parse_rank_names(&env.var("ROBLOX_RANK_NAMES").unwrap_or_default())?;

        Ok(Config {
            discord: DiscordBotConfig {
                bot_token,
                command_prefix,
            },
            roblox: RobloxConfig {
                cookie,
                group_id,
                request_timeout_secs,
                endpoints: Endpoints::default(),
            },
            lookup: LookupConfig {
                cooldown_secs: parse_or(env, "LOOKUP_COOLDOWN_SECS", default_cooldown_secs())?,
                history_scan_depth: parse_or(
                    env,
                    "LOOKUP_HISTORY_SCAN_DEPTH",
                    default_history_scan_depth(),
                )?,
                dedupe_scope,
                release,
                retry: RetryPolicy::default(),
                ranks,
            },
        })
    }

    /// Reject settings the bot cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.discord.bot_token.trim().is_empty() {
            bail!("discord.bot_token is empty");
        }
        if self.discord.command_prefix.is_empty() {
            bail!("discord.command_prefix is empty");
        }
        if self.roblox.cookie.trim().is_empty() {
            bail!("roblox.cookie is empty");
        }
        if self.roblox.request_timeout_secs == 0 {
            bail!("roblox.request_timeout_secs must be greater than zero");
        }
        if self.lookup.cooldown_secs == 0 {
            bail!("lookup.cooldown_secs must be greater than zero");
        }
        if self.lookup.history_scan_depth == 0
            || self.lookup.history_scan_depth > MAX_HISTORY_SCAN_DEPTH
        {
            bail!(
                "lookup.history_scan_depth must be between 1 and {}",
                MAX_HISTORY_SCAN_DEPTH
            );
        }
        if self.lookup.retry.max_attempts == 0 {
            bail!("lookup.retry.max_attempts must be greater than zero");
        }
        Ok(())
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::new(self.roblox.cookie.clone())
            .with_timeout(Duration::from_secs(self.roblox.request_timeout_secs))
            .with_endpoints(self.roblox.endpoints.clone())
    }

    pub fn lookup_settings(&self) -> LookupSettings {
        LookupSettings {
            cooldown: Duration::from_secs(self.lookup.cooldown_secs),
            history_scan_depth: self.lookup.history_scan_depth,
            dedupe_scope: self.lookup.dedupe_scope,
            release: self.lookup.release,
            group_id: self.roblox.group_id,
            retry: self.lookup.retry,
            ranks: self.lookup.ranks.iter().cloned().collect(),
        }
    }
}

fn default_bot_token() -> String {
    std::env::var("DISCORD_BOT_TOKEN").unwrap_or_default()
}

fn default_cookie() -> String {
    std::env::var("ROBLOX_COOKIE").unwrap_or_default()
}

fn default_command_prefix() -> String {
    "!".to_string()
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_cooldown_secs() -> u64 {
    60
}

fn default_history_scan_depth() -> u8 {
    10
}

fn parse_or<E: ReadEnv, T: std::str::FromStr>(env: &E, key: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env.var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} has an invalid value: {}", key, raw)),
        None => Ok(default),
    }
}

/// Parse `"1:Member,5:Officer"` into rank names.
fn parse_rank_names(s: &str) -> Result<Vec<RankName>> {
    s.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| -> Result<RankName> {
            let (rank, name) = entry
                .split_once(':')
                .with_context(|| format!("rank entry '{}' is not <rank>:<name>", entry))?;
            let rank = rank
                .trim()
                .parse::<u8>()
                .with_context(|| format!("rank '{}' is not a number from 0 to 255", rank))?;
            Ok(RankName {
                rank,
                name: name.trim().to_string(),
            })
        })
        .collect()
}
