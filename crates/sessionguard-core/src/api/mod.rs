//! HTTP helpers for sending the stored bearer token with outgoing requests.
//!
//! The token is attached only while the session check reports it as
//! authenticated. The server's own verdict (401, 403) is surfaced as an
//! `ApiError` and never changes local storage.

pub mod client;
pub mod error;

pub use client::AuthorizedClient;
pub use error::ApiError;
