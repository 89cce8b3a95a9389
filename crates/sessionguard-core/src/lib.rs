//! Core library for sessionguard.
//!
//! Checks whether a locally stored session token is present and unexpired,
//! hands it out for outgoing requests, and clears it on logout.

pub mod api;
pub mod auth;
pub mod config;

pub use api::{ApiError, AuthorizedClient};
pub use auth::{
    Claims, FileStore, KeyringStore, Logout, MemoryStore, SessionGuard, SessionStatus,
    TokenError, TokenStore,
};
pub use config::{Backend, Config};
