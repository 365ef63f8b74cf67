//! Gateway to the Roblox directory services.
//!
//! [`DirectoryGateway`] is the seam the bot programs against: one typed
//! request in, one typed payload or [`CallFailure`] out. [`RobloxClient`]
//! implements it over HTTP; [`MockGateway`] (feature `test-support`)
//! replays scripted outcomes.
//!
//! The gateway never retries. Retry policy belongs to the caller.

pub mod client;
pub mod config;
pub mod error;
pub mod gateway;
mod wire;

#[cfg(any(test, feature = "test-support"))]
pub mod mock;

pub use client::RobloxClient;
pub use config::{ClientConfig, Endpoints};
pub use error::{ClientError, Result};
pub use gateway::DirectoryGateway;

#[cfg(any(test, feature = "test-support"))]
pub use mock::MockGateway;
