//! Roblox lookup bot for Discord
//!
//! Answers `!rank <name>` with an account's profile and its rank in the
//! configured group, editing a single progress message as results arrive.

mod aggregator;
mod chat;
mod clock;
mod config;
mod errors;
mod handlers;
mod health;
mod plan;
mod progress;
mod render;
mod service;
mod tracker;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use roblox_client::RobloxClient;
use serenity::model::gateway::GatewayIntents;
use serenity::prelude::*;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::clock::SystemClock;
use crate::config::Config;
use crate::handlers::{Handler, LookupServiceKey};
use crate::health::AppState;
use crate::service::LookupService;

/// Roblox lookup bot CLI
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/roblox-bot.toml")]
    config: String,

    /// Discord bot token (overrides config file)
    #[arg(long, env = "DISCORD_BOT_TOKEN")]
    bot_token: Option<String>,

    /// `.ROBLOSECURITY` cookie (overrides config file)
    #[arg(long, env = "ROBLOX_COOKIE", hide_env_values = true)]
    cookie: Option<String>,

    /// Group whose ranks are looked up (overrides config file)
    #[arg(long, env = "ROBLOX_GROUP_ID")]
    group_id: Option<u64>,

    /// Health check server port
    #[arg(long, env = "HEALTH_CHECK_PORT", default_value = "3001")]
    health_port: u16,
}

impl Args {
    fn apply(&self, config: &mut Config) {
        if let Some(bot_token) = &self.bot_token {
            config.discord.bot_token = bot_token.clone();
        }
        if let Some(cookie) = &self.cookie {
            config.roblox.cookie = cookie.clone();
        }
        if let Some(group_id) = self.group_id {
            config.roblox.group_id = group_id;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "roblox_bot=debug,roblox_client=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Roblox lookup bot");

    let args = Args::parse();

    let mut config = if std::path::Path::new(&args.config).exists() {
        info!("Loading config from file: {}", args.config);
        Config::from_file(&args.config)?
    } else {
        info!("Config file not found, loading from environment");
        Config::from_env()?
    };
    args.apply(&mut config);
    config.validate().context("Invalid configuration")?;

    info!(
        "Group {}, cooldown {}s, prefix '{}'",
        config.roblox.group_id, config.lookup.cooldown_secs, config.discord.command_prefix
    );
    if config.lookup.ranks.is_empty() {
        warn!("No rank names configured; ranks will show the group role name");
    }

    let gateway =
        RobloxClient::new(config.client_config()).context("Failed to build Roblox client")?;
    let service = Arc::new(LookupService::new(
        gateway,
        SystemClock,
        config.lookup_settings(),
    ));
    let health_state = AppState::new(service.tracker());

    let intents = GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::DIRECT_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;

    let mut client = Client::builder(&config.discord.bot_token, intents)
        .event_handler(Handler::new(config.discord.command_prefix.clone()))
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create Discord client: {}", e))?;

    {
        let mut data = client.data.write().await;
        data.insert::<LookupServiceKey>(service);
        data.insert::<AppState>(health_state.clone());
    }

    let health_port = args.health_port;
    tokio::spawn(async move {
        if let Err(e) = health::start_health_server(health_state, health_port).await {
            error!("Health server error: {}", e);
        }
    });

    // Graceful shutdown: close all shards on SIGTERM or Ctrl+C.
    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutdown signal received, stopping Discord client...");
        shard_manager.shutdown_all().await;
    });

    info!("Starting Discord gateway connection...");

    // Blocks until all shards are stopped
    client
        .start()
        .await
        .map_err(|e| anyhow::anyhow!("Discord client error: {}", e))?;

    info!("Roblox lookup bot stopped");
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(e) => {
                warn!("Could not install SIGTERM handler: {}", e);
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.ok();
    }
}
