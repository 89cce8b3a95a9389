//! Authentication module for checking the locally stored session token.
//!
//! This module provides:
//! - `SessionGuard`: present / absent / expired checks with automatic clearing
//! - `TokenStore`: the single token slot, with file, keychain and in-memory backends
//! - `jwt`: unverified decoding of the token payload and its `exp` claim
//!
//! A token is usable until the instant its `exp` claim names.

pub mod credentials;
pub mod jwt;
pub mod session;
pub mod store;

pub use credentials::KeyringStore;
pub use jwt::{Claims, TokenError};
pub use session::{Logout, SessionGuard, SessionStatus, DEFAULT_LOGIN_ROUTE};
pub use store::{CorruptRecord, FileStore, MemoryStore, StoredToken, TokenStore};
