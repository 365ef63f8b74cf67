//! Client configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Base URLs of the directory services. Overridable so tests can point
/// every service at a local mock server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoints {
    #[serde(default = "default_users")]
    pub users: String,
    #[serde(default = "default_groups")]
    pub groups: String,
    #[serde(default = "default_thumbnails")]
    pub thumbnails: String,
    #[serde(default = "default_badges")]
    pub badges: String,
    #[serde(default = "default_friends")]
    pub friends: String,
}

impl Endpoints {
    /// Point every service at the same base URL.
    pub fn all(base: impl Into<String>) -> Self {
        let base = base.into();
        Self {
            users: base.clone(),
            groups: base.clone(),
            thumbnails: base.clone(),
            badges: base.clone(),
            friends: base,
        }
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            users: default_users(),
            groups: default_groups(),
            thumbnails: default_thumbnails(),
            badges: default_badges(),
            friends: default_friends(),
        }
    }
}

/// Configuration for [`crate::RobloxClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Value of the `.ROBLOSECURITY` cookie. Empty means unauthenticated.
    pub cookie: String,
    pub timeout: Duration,
    pub endpoints: Endpoints,
}

impl ClientConfig {
    pub fn new(cookie: impl Into<String>) -> Self {
        Self {
            cookie: cookie.into(),
            timeout: DEFAULT_TIMEOUT,
            endpoints: Endpoints::default(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }
}

fn default_users() -> String {
    "https://users.roblox.com".to_string()
}

fn default_groups() -> String {
    "https://groups.roblox.com".to_string()
}

fn default_thumbnails() -> String {
    "https://thumbnails.roblox.com".to_string()
}

fn default_badges() -> String {
    "https://badges.roblox.com".to_string()
}

fn default_friends() -> String {
    "https://friends.roblox.com".to_string()
}
