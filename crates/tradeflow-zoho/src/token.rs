//! # Zoho OAuth Tokens
//!
//! Zoho issues short-lived access tokens (one hour) and a long-lived refresh
//! token. Both grants go to the same endpoint as a form post.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Connect (once per organization)                                        │
//! │    POST {accounts}/oauth/v2/token                                       │
//! │      grant_type=authorization_code, code, client_id, client_secret,     │
//! │      redirect_uri                                                       │
//! │    ◄── { access_token, refresh_token, expires_in, api_domain }          │
//! │                                                                         │
//! │  Refresh (when now + buffer >= expires_at, or after a 401)              │
//! │    POST {accounts}/oauth/v2/token                                       │
//! │      grant_type=refresh_token, refresh_token, client_id, client_secret  │
//! │    ◄── { access_token, expires_in, api_domain }   (no refresh_token)    │
//! │                                                                         │
//! │  Failures come back as HTTP 200 with { "error": "invalid_code" }.       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::ZohoConfig;
use crate::error::{ZohoError, ZohoResult};

/// Tokens for one organization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSet {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    pub api_domain: Option<String>,
}

impl TokenSet {
    pub fn needs_refresh(&self, now: DateTime<Utc>, buffer: Duration) -> bool {
        now + buffer >= self.expires_at
    }
}

/// Raw token endpoint response.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    api_domain: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl TokenResponse {
    /// A refresh grant omits `refresh_token`; `previous_refresh` fills it in.
    pub(crate) fn into_token_set(
        self,
        previous_refresh: Option<&str>,
        now: DateTime<Utc>,
    ) -> ZohoResult<TokenSet> {
        if let Some(error) = self.error {
            return Err(ZohoError::TokenRefresh(error));
        }

        let access_token = self
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or(ZohoError::MissingField("access_token"))?;
        let refresh_token = self
            .refresh_token
            .or_else(|| previous_refresh.map(str::to_string))
            .ok_or(ZohoError::MissingField("refresh_token"))?;
        let expires_in = self.expires_in.unwrap_or(3600);

        Ok(TokenSet {
            access_token,
            refresh_token,
            expires_at: now + Duration::seconds(expires_in),
            api_domain: self.api_domain,
        })
    }
}

/// Talks to the Zoho accounts server.
#[derive(Debug, Clone)]
pub struct TokenClient {
    http: reqwest::Client,
    config: ZohoConfig,
}

impl TokenClient {
    pub fn new(http: reqwest::Client, config: ZohoConfig) -> Self {
        TokenClient { http, config }
    }

    /// Authorization-code grant, used when an organization connects.
    pub async fn exchange_code(&self, code: &str) -> ZohoResult<TokenSet> {
        debug!("Exchanging Zoho authorization code");
        let form = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("redirect_uri", self.config.redirect_uri.as_str()),
        ];
        let response = self.post(&form).await?;
        response.into_token_set(None, Utc::now())
    }

    pub async fn refresh(&self, refresh_token: &str) -> ZohoResult<TokenSet> {
        debug!("Refreshing Zoho access token");
        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
        ];
        let response = self.post(&form).await?;
        response.into_token_set(Some(refresh_token), Utc::now())
    }

    async fn post(&self, form: &[(&str, &str)]) -> ZohoResult<TokenResponse> {
        let response = self
            .http
            .post(self.config.token_url())
            .form(form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            warn!(status = status.as_u16(), "Zoho token endpoint returned an error");
            return Err(ZohoError::TokenRefresh(format!("HTTP {}: {}", status.as_u16(), body)));
        }
        Ok(serde_json::from_str(&body)?)
    }
}
