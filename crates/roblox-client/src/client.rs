//! HTTP implementation of [`DirectoryGateway`].

use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue, COOKIE};
use reqwest::{Client, RequestBuilder, StatusCode};
use roblox_types::{
    AccountAge, AccountId, Badge, CallFailure, CallPayload, CallRequest, GroupMembership,
    GroupRole, Profile, ResolvedAccount,
};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::gateway::DirectoryGateway;
use crate::wire::{
    BadgeEntry, CountEntry, DataEnvelope, GroupRoleEntry, ThumbnailEntry, UserEntry,
    UsernameEntry, UsernamesRequest,
};

/// Number of most recent badges fetched per lookup.
const BADGE_LIMIT: u32 = 10;

/// Roblox directory client.
#[derive(Clone)]
pub struct RobloxClient {
    http: Client,
    config: ClientConfig,
}

impl RobloxClient {
    pub fn new(config: ClientConfig) -> crate::Result<Self> {
        if config.timeout.is_zero() {
            return Err(ClientError::Config(
                "request timeout must be non-zero".to_string(),
            ));
        }

        let mut headers = HeaderMap::new();
        if !config.cookie.is_empty() {
            let mut value = HeaderValue::from_str(&format!(".ROBLOSECURITY={}", config.cookie))
                .map_err(|e| ClientError::Config(format!("invalid cookie: {}", e)))?;
            value.set_sensitive(true);
            headers.insert(COOKIE, value);
        }

        let http = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()?;

        Ok(Self { http, config })
    }

    pub async fn resolve_account(&self, name: &str) -> Result<ResolvedAccount, CallFailure> {
        let url = format!("{}/v1/usernames/users", self.config.endpoints.users);
        let body = UsernamesRequest {
            usernames: [name],
            exclude_banned_users: false,
        };
        let envelope: DataEnvelope<UsernameEntry> =
            self.fetch(self.http.post(&url).json(&body)).await?;

        let entry = envelope
            .data
            .into_iter()
            .next()
            .ok_or_else(|| CallFailure::not_found(format!("no account named {}", name)))?;

        Ok(ResolvedAccount {
            id: AccountId(entry.id),
            name: entry.name,
            display_name: entry.display_name,
        })
    }

    pub async fn role_in_group(
        &self,
        account_id: AccountId,
        group_id: u64,
    ) -> Result<Option<GroupRole>, CallFailure> {
        let roles = self.group_roles(account_id).await?;
        Ok(roles
            .into_iter()
            .find(|entry| entry.group.id == group_id)
            .map(|entry| GroupRole {
                rank: entry.role.rank,
                name: entry.role.name,
            }))
    }

    pub async fn groups(
        &self,
        account_id: AccountId,
    ) -> Result<Vec<GroupMembership>, CallFailure> {
        let roles = self.group_roles(account_id).await?;
        Ok(roles
            .into_iter()
            .map(|entry| GroupMembership {
                group_id: entry.group.id,
                group_name: entry.group.name,
                role_name: entry.role.name,
            })
            .collect())
    }

    pub async fn profile(&self, account_id: AccountId) -> Result<Profile, CallFailure> {
        let user = self.user(account_id).await?;
        Ok(Profile {
            description: user.description.unwrap_or_default(),
            created: user.created,
            is_banned: user.is_banned,
        })
    }

    pub async fn avatar_url(&self, account_id: AccountId) -> Result<String, CallFailure> {
        let url = format!(
            "{}/v1/users/avatar-headshot?userIds={}&size=420x420&format=Png&isCircular=false",
            self.config.endpoints.thumbnails, account_id
        );
        let envelope: DataEnvelope<ThumbnailEntry> = self.fetch(self.http.get(&url)).await?;

        envelope
            .data
            .into_iter()
            .find(|entry| entry.state == "Completed")
            .and_then(|entry| entry.image_url)
            .ok_or_else(|| CallFailure::not_found(format!("no avatar for {}", account_id)))
    }

    pub async fn badges(&self, account_id: AccountId) -> Result<Vec<Badge>, CallFailure> {
        let url = format!(
            "{}/v1/users/{}/badges?limit={}&sortOrder=Desc",
            self.config.endpoints.badges, account_id, BADGE_LIMIT
        );
        let envelope: DataEnvelope<BadgeEntry> = self.fetch(self.http.get(&url)).await?;
        Ok(envelope
            .data
            .into_iter()
            .map(|entry| Badge {
                id: entry.id,
                name: entry.name,
            })
            .collect())
    }

    pub async fn friend_count(&self, account_id: AccountId) -> Result<u64, CallFailure> {
        let url = format!(
            "{}/v1/users/{}/friends/count",
            self.config.endpoints.friends, account_id
        );
        let entry: CountEntry = self.fetch(self.http.get(&url)).await?;
        Ok(entry.count)
    }

    pub async fn account_age(&self, account_id: AccountId) -> Result<AccountAge, CallFailure> {
        let user = self.user(account_id).await?;
        let days = (Utc::now() - user.created).num_days().max(0);
        Ok(AccountAge {
            created: user.created,
            days,
        })
    }

    async fn user(&self, account_id: AccountId) -> Result<UserEntry, CallFailure> {
        let url = format!("{}/v1/users/{}", self.config.endpoints.users, account_id);
        self.fetch(self.http.get(&url)).await
    }

    async fn group_roles(
        &self,
        account_id: AccountId,
    ) -> Result<Vec<GroupRoleEntry>, CallFailure> {
        let url = format!(
            "{}/v1/users/{}/groups/roles",
            self.config.endpoints.groups, account_id
        );
        let envelope: DataEnvelope<GroupRoleEntry> = self.fetch(self.http.get(&url)).await?;
        Ok(envelope.data)
    }

    /// Send a request and decode a JSON body, classifying every failure.
    async fn fetch<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, CallFailure> {
        let response = request.send().await.map_err(|e| classify_transport(&e))?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            debug!("Directory request failed with HTTP {}: {}", status, body);
            return Err(classify_status(status, &body));
        }

        let bytes = response.bytes().await.map_err(|e| classify_transport(&e))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| CallFailure::malformed(format!("unexpected response body: {}", e)))
    }
}

impl DirectoryGateway for RobloxClient {
    async fn call(&self, request: &CallRequest) -> Result<CallPayload, CallFailure> {
        debug!("Directory call {}", request.name());
        match request {
            CallRequest::ResolveAccount { name } => {
                self.resolve_account(name).await.map(CallPayload::Account)
            }
            CallRequest::RoleInGroup {
                account_id,
                group_id,
            } => self
                .role_in_group(*account_id, *group_id)
                .await
                .map(CallPayload::Role),
            CallRequest::Profile { account_id } => {
                self.profile(*account_id).await.map(CallPayload::Profile)
            }
            CallRequest::AvatarUrl { account_id } => {
                self.avatar_url(*account_id).await.map(CallPayload::AvatarUrl)
            }
            CallRequest::Badges { account_id } => {
                self.badges(*account_id).await.map(CallPayload::Badges)
            }
            CallRequest::Friends { account_id } => {
                self.friend_count(*account_id).await.map(CallPayload::Friends)
            }
            CallRequest::Groups { account_id } => {
                self.groups(*account_id).await.map(CallPayload::Groups)
            }
            CallRequest::AccountAge { account_id } => self
                .account_age(*account_id)
                .await
                .map(CallPayload::AccountAge),
        }
    }
}

/// Map a non-success HTTP status to a failure kind.
pub fn classify_status(status: StatusCode, body: &str) -> CallFailure {
    let message = if body.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("HTTP {}: {}", status.as_u16(), body)
    };

    match status {
        StatusCode::NOT_FOUND => CallFailure::not_found(message),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => CallFailure::unauthorized(message),
        StatusCode::TOO_MANY_REQUESTS | StatusCode::REQUEST_TIMEOUT => {
            CallFailure::transport(message)
        }
        s if s.is_server_error() => CallFailure::transport(message),
        _ => CallFailure::malformed(message),
    }
}

fn classify_transport(err: &reqwest::Error) -> CallFailure {
    if err.is_decode() {
        CallFailure::malformed(err.to_string())
    } else {
        CallFailure::transport(err.to_string())
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod client_tests;
