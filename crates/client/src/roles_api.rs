//! HTTP client for the app server's roles endpoint.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use genera_auth::{SessionError, UserRole};

use crate::config::ClientConfig;

pub const MY_ROLES_PATH: &str = "/api/auth/my-roles";

/// Body of `GET /api/auth/my-roles`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MyRolesResponse {
    #[serde(default)]
    pub roles: Vec<UserRole>,
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum RolesApiError {
    #[error("network error: {0}")]
    Network(String),
    #[error("API error ({0}): {1}")]
    Api(u16, String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("no access token to authenticate with")]
    MissingToken,
    #[error("session not usable: {0}")]
    InvalidSession(#[from] SessionError),
}

/// Primary source of a user's roles: an authenticated call on their behalf.
#[async_trait]
pub trait RolesSource: Send + Sync {
    async fn fetch_my_roles(&self, access_token: &str) -> Result<Vec<UserRole>, RolesApiError>;
}

#[derive(Debug, Clone)]
pub struct RolesApiClient {
    http: reqwest::Client,
    api_url: String,
}

impl RolesApiClient {
    pub fn new(api_url: impl Into<String>, timeout: Duration) -> Result<Self, RolesApiError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RolesApiError::Network(e.to_string()))?;
        let api_url = api_url.into().trim_end_matches('/').to_string();
        Ok(Self { http, api_url })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, RolesApiError> {
        Self::new(config.api_url.clone(), config.request_timeout)
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Check connectivity by hitting the health endpoint.
    pub async fn check_connectivity(&self) -> bool {
        let url = format!("{}/health", self.api_url);
        matches!(self.http.get(&url).send().await, Ok(resp) if resp.status().is_success())
    }
}

#[async_trait]
impl RolesSource for RolesApiClient {
    #[instrument(skip(self, access_token), fields(api_url = %self.api_url), err)]
    async fn fetch_my_roles(&self, access_token: &str) -> Result<Vec<UserRole>, RolesApiError> {
        if access_token.trim().is_empty() {
            return Err(RolesApiError::MissingToken);
        }

        let url = format!("{}{}", self.api_url, MY_ROLES_PATH);
        let resp = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| RolesApiError::Network(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(RolesApiError::Api(
                resp.status().as_u16(),
                resp.text().await.unwrap_or_default(),
            ));
        }

        let body: MyRolesResponse = resp
            .json()
            .await
            .map_err(|e| RolesApiError::Parse(e.to_string()))?;
        Ok(body.roles)
    }
}
