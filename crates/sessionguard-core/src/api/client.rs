//! HTTP client that attaches the stored session token.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{header, Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::auth::SessionGuard;

use super::ApiError;

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// HTTP client bound to a session.
pub struct AuthorizedClient {
    client: Client,
    guard: SessionGuard,
}

impl AuthorizedClient {
    pub fn new(guard: SessionGuard) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self { client, guard })
    }

    pub fn guard(&self) -> &SessionGuard {
        &self.guard
    }

    /// Start a request carrying the bearer token.
    ///
    /// Fails with [`ApiError::Unauthenticated`] without touching the network
    /// when no valid session is stored.
    pub fn request(&self, method: Method, url: &str) -> Result<RequestBuilder> {
        let token = self.bearer_token()?;
        Ok(self
            .client
            .request(method, url)
            .headers(Self::auth_headers(&token)?))
    }

    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self
            .request(Method::GET, url)?
            .send()
            .await
            .with_context(|| format!("Failed to send GET request to {}", url))?;

        let response = Self::check_response(response).await?;
        debug!(url = url, "GET succeeded");

        response
            .json()
            .await
            .with_context(|| format!("Failed to parse JSON response from {}", url))
    }

    fn bearer_token(&self) -> Result<String> {
        if !self.guard.status()?.is_authenticated() {
            return Err(ApiError::Unauthenticated.into());
        }
        self.guard
            .token()?
            .ok_or_else(|| ApiError::Unauthenticated.into())
    }

    fn auth_headers(token: &str) -> Result<header::HeaderMap> {
        let mut value = header::HeaderValue::from_str(&format!("Bearer {}", token))
            .context("Token is not a valid header value")?;
        value.set_sensitive(true);

        let mut headers = header::HeaderMap::new();
        headers.insert(header::AUTHORIZATION, value);
        Ok(headers)
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body).into())
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
