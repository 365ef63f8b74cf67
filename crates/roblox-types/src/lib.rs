//! Shared types for Roblox directory lookups.
//!
//! The catalog of named remote calls, their typed requests and payloads,
//! and the per-call failure taxonomy used by both the gateway and the bot.

pub mod calls;
pub mod errors;
pub mod payloads;

pub use calls::{CallName, CallRequest};
pub use errors::{CallFailure, FailureKind};
pub use payloads::{
    AccountAge, AccountId, Badge, CallPayload, GroupMembership, GroupRole, Profile,
    ResolvedAccount,
};
