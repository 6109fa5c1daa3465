//! # Zoho Configuration
//!
//! OAuth client credentials and endpoint URLs. Loaded as the `[zoho]` table of
//! the API configuration (`TRADEFLOW__ZOHO__CLIENT_ID`, ...).
//!
//! ```toml
//! [zoho]
//! accounts_url = "https://accounts.zoho.in"
//! books_url = "https://www.zohoapis.in/books/v3"
//! client_id = "1000.XXXX"
//! client_secret = "..."
//! redirect_uri = "https://portal.example.com/zoho/callback"
//! ```
//!
//! Zoho runs separate data centres (`.com`, `.eu`, `.in`, ...). When the token
//! endpoint reports an `api_domain` for a connection, that domain wins over
//! `books_url`.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Path appended to a connection's `api_domain`.
pub const BOOKS_API_PATH: &str = "/books/v3";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ZohoConfig {
    pub accounts_url: String,
    pub books_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    /// Refresh this many seconds before the access token expires.
    pub refresh_buffer_secs: u64,
    pub timeout_secs: u64,
    /// Retries for 429 / 5xx / connection failures. 401 is handled separately.
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
}

impl Default for ZohoConfig {
    fn default() -> Self {
        ZohoConfig {
            accounts_url: "https://accounts.zoho.com".to_string(),
            books_url: "https://www.zohoapis.com/books/v3".to_string(),
            client_id: String::new(),
            client_secret: String::new(),
            redirect_uri: String::new(),
            refresh_buffer_secs: 300,
            timeout_secs: 30,
            max_retries: 3,
            initial_backoff_ms: 500,
        }
    }
}

impl ZohoConfig {
    pub fn token_url(&self) -> String {
        format!("{}/oauth/v2/token", self.accounts_url.trim_end_matches('/'))
    }

    /// Base URL for Books calls of a connection.
    pub fn books_base_url(&self, api_domain: Option<&str>) -> String {
        match api_domain {
            Some(domain) if !domain.trim().is_empty() => {
                format!("{}{}", domain.trim_end_matches('/'), BOOKS_API_PATH)
            }
            _ => self.books_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn refresh_buffer(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.refresh_buffer_secs as i64)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    /// Client credentials are present.
    pub fn is_configured(&self) -> bool {
        !self.client_id.trim().is_empty() && !self.client_secret.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ZohoConfig::default();
        assert_eq!(config.refresh_buffer_secs, 300);
        assert_eq!(config.max_retries, 3);
        assert!(!config.is_configured());
        assert_eq!(config.token_url(), "https://accounts.zoho.com/oauth/v2/token");
    }

    #[test]
    fn test_books_base_url_prefers_api_domain() {
        let config = ZohoConfig {
            books_url: "https://www.zohoapis.com/books/v3/".to_string(),
            ..Default::default()
        };
        assert_eq!(config.books_base_url(None), "https://www.zohoapis.com/books/v3");
        assert_eq!(
            config.books_base_url(Some("https://www.zohoapis.in/")),
            "https://www.zohoapis.in/books/v3"
        );
        assert_eq!(config.books_base_url(Some("  ")), "https://www.zohoapis.com/books/v3");
    }
}
