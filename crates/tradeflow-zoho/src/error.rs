//! # Zoho Error Types
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Zoho Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐  │
//! │  │  Connection     │  │   Transport     │  │     Zoho API            │  │
//! │  │                 │  │                 │  │                         │  │
//! │  │  NotConnected   │  │  Http           │  │  Api { code, message }  │  │
//! │  │  TokenRefresh   │  │  Status (5xx)   │  │  MissingField           │  │
//! │  │  Unauthorized   │  │                 │  │  Serialization          │  │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘  │
//! │                                                                         │
//! │  Local: Db(DbError), Core(CoreError)                                    │
//! │                                                                         │
//! │  Retried with backoff: Http (connect/timeout), Status 429 / 5xx         │
//! │  Retried once after refresh: Unauthorized                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;
use tradeflow_core::CoreError;
use tradeflow_db::DbError;

/// Zoho Books "record does not exist".
pub const CODE_NOT_FOUND: i64 = 1002;

pub type ZohoResult<T> = Result<T, ZohoError>;

#[derive(Debug, Error)]
pub enum ZohoError {
    /// The organization has no stored OAuth grant.
    #[error("Organization {0} is not connected to Zoho")]
    NotConnected(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success HTTP status without a Zoho envelope.
    #[error("Zoho returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Zoho envelope with `code != 0`.
    #[error("Zoho error {code}: {message}")]
    Api { code: i64, message: String },

    #[error("Token refresh failed: {0}")]
    TokenRefresh(String),

    /// 401 even after a refresh.
    #[error("Zoho rejected the access token")]
    Unauthorized,

    #[error("Zoho response is missing `{0}`")]
    MissingField(&'static str),

    #[error(transparent)]
    Db(#[from] DbError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ZohoError {
    /// Zoho does not know a record referenced by the request.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ZohoError::Api { code, .. } if *code == CODE_NOT_FOUND)
    }

    /// Zoho no longer knows the contact (customer) referenced by a request.
    ///
    /// A request can reference several records, so the code alone is not
    /// enough: the message has to name the contact.
    pub fn is_missing_contact(&self) -> bool {
        match self {
            ZohoError::Api { code, message } => {
                let message = message.to_lowercase();
                let names_contact = message.contains("contact") || message.contains("customer");
                let missing = *code == CODE_NOT_FOUND
                    || message.contains("not exist")
                    || message.contains("not found");
                names_contact && missing
            }
            _ => false,
        }
    }

    /// Worth retrying after a pause.
    pub fn is_transient(&self) -> bool {
        match self {
            ZohoError::Http(e) => e.is_connect() || e.is_timeout() || e.is_request(),
            ZohoError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_contact_detection() {
        let by_code = ZohoError::Api {
            code: 1002,
            message: "Customer does not exist.".to_string(),
        };
        assert!(by_code.is_missing_contact());

        // Same code, but the stale reference is a line item
        let item = ZohoError::Api {
            code: 1002,
            message: "Item does not exist.".to_string(),
        };
        assert!(item.is_not_found());
        assert!(!item.is_missing_contact());

        let record = ZohoError::Api {
            code: 1002,
            message: "Record does not exist.".to_string(),
        };
        assert!(record.is_not_found());
        assert!(!record.is_missing_contact());

        let by_message = ZohoError::Api {
            code: 4,
            message: "The Contact does not exist".to_string(),
        };
        assert!(by_message.is_missing_contact());

        let other = ZohoError::Api {
            code: 1001,
            message: "Invalid value passed for rate".to_string(),
        };
        assert!(!other.is_missing_contact());
        assert!(!other.is_not_found());
        assert!(!ZohoError::Unauthorized.is_missing_contact());
    }

    #[test]
    fn test_transient_statuses() {
        let status = |status| ZohoError::Status {
            status,
            body: String::new(),
        };
        assert!(status(429).is_transient());
        assert!(status(503).is_transient());
        assert!(!status(400).is_transient());
        assert!(!ZohoError::Api { code: 1002, message: String::new() }.is_transient());
    }
}
