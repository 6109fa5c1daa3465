//! # Zoho Books HTTP Client
//!
//! Authenticated calls against the Books REST API for any connected
//! organization. Tokens live in the `zoho_connections` table; this client
//! refreshes them on demand.
//!
//! ## Request Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  send(org, method, path, query, body)                                   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  connection(org) ── missing ──► NotConnected                            │
//! │       │ expires within refresh buffer?                                  │
//! │       ├── yes ──► lock ──► re-read ──► refresh ──► persist              │
//! │       ▼                                                                 │
//! │  HTTP request  (Authorization: Zoho-oauthtoken …, ?organization_id=…)   │
//! │       │                                                                 │
//! │       ├── 401 (first time) ──► force refresh, retry once                │
//! │       ├── 429 / 5xx / connect error ──► backoff, retry ≤ max_retries    │
//! │       ├── envelope code != 0 ──► ZohoError::Api                         │
//! │       ▼                                                                 │
//! │  JSON envelope                                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Refreshes are serialized through one async mutex and the connection is
//! re-read after the lock is taken, so concurrent callers that all saw an
//! expiring token trigger a single refresh.

use async_trait::async_trait;
use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use chrono::Utc;
use reqwest::header::AUTHORIZATION;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::api::{
    ContactPayload, InvoiceRef, ItemPage, SalesOrderPayload, SalesOrderRef, ZohoApi, ZohoItem,
    ZohoOrg, ITEMS_PER_PAGE,
};
use crate::config::ZohoConfig;
use crate::error::{ZohoError, ZohoResult};
use crate::token::{TokenClient, TokenSet};
use tradeflow_core::ZohoConnection;
use tradeflow_db::Database;

pub struct ZohoClient {
    http: reqwest::Client,
    config: ZohoConfig,
    tokens: TokenClient,
    db: Database,
    refresh_lock: Mutex<()>,
}

impl ZohoClient {
    pub fn new(config: ZohoConfig, db: Database) -> ZohoResult<Self> {
        let user_agent = format!("tradeflow/{}", env!("CARGO_PKG_VERSION"));
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(user_agent)
            .build()?;

        Ok(ZohoClient {
            tokens: TokenClient::new(http.clone(), config.clone()),
            http,
            config,
            db,
            refresh_lock: Mutex::new(()),
        })
    }

    pub fn config(&self) -> &ZohoConfig {
        &self.config
    }

    // =========================================================================
    // Connection management
    // =========================================================================

    /// Exchanges an authorization code and stores the grant.
    pub async fn connect(&self, organization_id: &str, code: &str) -> ZohoResult<ZohoConnection> {
        let tokens = self.tokens.exchange_code(code).await?;
        let connection = ZohoConnection {
            organization_id: organization_id.to_string(),
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            expires_at: tokens.expires_at,
            api_domain: tokens.api_domain,
            updated_at: Utc::now(),
        };
        self.db.zoho_connections().upsert(&connection).await?;
        info!(organization_id = %organization_id, "Organization connected to Zoho");
        Ok(connection)
    }

    pub async fn disconnect(&self, organization_id: &str) -> ZohoResult<bool> {
        let removed = self.db.zoho_connections().delete(organization_id).await?;
        if removed {
            info!(organization_id = %organization_id, "Zoho connection removed");
        }
        Ok(removed)
    }

    pub async fn is_connected(&self, organization_id: &str) -> ZohoResult<bool> {
        Ok(self.db.zoho_connections().get(organization_id).await?.is_some())
    }

    /// A valid access token, refreshed first if it is about to expire.
    pub async fn access_token(&self, organization_id: &str) -> ZohoResult<String> {
        Ok(self.connection(organization_id, None).await?.access_token)
    }

    /// Loads the connection, refreshing when it expires within the buffer or
    /// still carries the `rejected` token.
    async fn connection(
        &self,
        organization_id: &str,
        rejected: Option<&str>,
    ) -> ZohoResult<ZohoConnection> {
        let current = self.load(organization_id).await?;
        if !self.must_refresh(&current, rejected) {
            return Ok(current);
        }

        let _guard = self.refresh_lock.lock().await;

        // Another task may have refreshed while we waited
        let current = self.load(organization_id).await?;
        if !self.must_refresh(&current, rejected) {
            return Ok(current);
        }

        let refreshed = self.tokens.refresh(&current.refresh_token).await?;
        self.db
            .zoho_connections()
            .update_access_token(
                organization_id,
                &refreshed.access_token,
                refreshed.expires_at,
                refreshed.api_domain.as_deref(),
            )
            .await?;
        info!(
            organization_id = %organization_id,
            expires_at = %refreshed.expires_at,
            "Zoho access token refreshed"
        );

        Ok(ZohoConnection {
            access_token: refreshed.access_token,
            expires_at: refreshed.expires_at,
            api_domain: refreshed.api_domain.or(current.api_domain),
            updated_at: Utc::now(),
            ..current
        })
    }

    async fn load(&self, organization_id: &str) -> ZohoResult<ZohoConnection> {
        self.db
            .zoho_connections()
            .get(organization_id)
            .await?
            .ok_or_else(|| ZohoError::NotConnected(organization_id.to_string()))
    }

    fn must_refresh(&self, connection: &ZohoConnection, rejected: Option<&str>) -> bool {
        if rejected == Some(connection.access_token.as_str()) {
            return true;
        }
        let tokens = TokenSet {
            access_token: connection.access_token.clone(),
            refresh_token: connection.refresh_token.clone(),
            expires_at: connection.expires_at,
            api_domain: connection.api_domain.clone(),
        };
        tokens.needs_refresh(Utc::now(), self.config.refresh_buffer())
    }

    // =========================================================================
    // Requests
    // =========================================================================

    /// Sends one Books request with refresh-on-401 and transient retries, and
    /// returns the JSON envelope.
    pub async fn send(
        &self,
        org: &ZohoOrg,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> ZohoResult<Value> {
        let mut backoff = self.backoff();
        let mut attempt = 0u32;
        let mut rejected: Option<String> = None;

        loop {
            let connection = self
                .connection(&org.organization_id, rejected.as_deref())
                .await?;

            match self
                .send_once(&connection, org, method.clone(), path, query, body)
                .await
            {
                Ok(envelope) => return Ok(envelope),
                Err(ZohoError::Unauthorized) if rejected.is_none() => {
                    warn!(
                        organization_id = %org.organization_id,
                        path = %path,
                        "Zoho rejected the access token, refreshing"
                    );
                    rejected = Some(connection.access_token);
                }
                Err(e) if e.is_transient() && attempt < self.config.max_retries => {
                    attempt += 1;
                    let delay = backoff
                        .next_backoff()
                        .unwrap_or_else(|| self.config.initial_backoff());
                    warn!(attempt, ?delay, error = %e, path = %path, "Zoho request failed, retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn send_once(
        &self,
        connection: &ZohoConnection,
        org: &ZohoOrg,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> ZohoResult<Value> {
        let base = self.config.books_base_url(connection.api_domain.as_deref());
        let url = format!("{base}{path}");
        debug!(%method, url = %url, "Zoho request");

        let mut request = self
            .http
            .request(method, &url)
            .header(AUTHORIZATION, format!("Zoho-oauthtoken {}", connection.access_token))
            .query(&[("organization_id", org.zoho_organization_id.as_str())])
            .query(query);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        parse_envelope(status, text)
    }

    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.config.initial_backoff(),
            max_interval: Duration::from_secs(10),
            multiplier: 2.0,
            max_elapsed_time: None,
            ..Default::default()
        }
    }
}

/// Maps an HTTP response onto the Zoho envelope or an error.
fn parse_envelope(status: StatusCode, body: String) -> ZohoResult<Value> {
    if status == StatusCode::UNAUTHORIZED {
        return Err(ZohoError::Unauthorized);
    }
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        return Err(ZohoError::Status {
            status: status.as_u16(),
            body,
        });
    }

    let Ok(envelope) = serde_json::from_str::<Value>(&body) else {
        return Err(ZohoError::Status {
            status: status.as_u16(),
            body,
        });
    };

    let code = envelope.get("code").and_then(Value::as_i64).unwrap_or(0);
    if code != 0 {
        let message = envelope
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        return Err(ZohoError::Api { code, message });
    }
    if !status.is_success() {
        return Err(ZohoError::Status {
            status: status.as_u16(),
            body,
        });
    }
    Ok(envelope)
}

/// Takes `key` out of the envelope.
fn field<T: DeserializeOwned>(mut envelope: Value, key: &'static str) -> ZohoResult<T> {
    let value = envelope
        .get_mut(key)
        .map(Value::take)
        .ok_or(ZohoError::MissingField(key))?;
    Ok(serde_json::from_value(value)?)
}

#[derive(Debug, Deserialize)]
struct ContactRef {
    contact_id: String,
}

#[async_trait]
impl ZohoApi for ZohoClient {
    async fn create_contact(&self, org: &ZohoOrg, contact: &ContactPayload) -> ZohoResult<String> {
        let body = serde_json::to_value(contact)?;
        let envelope = self.send(org, Method::POST, "/contacts", &[], Some(&body)).await?;
        let created: ContactRef = field(envelope, "contact")?;
        info!(contact_id = %created.contact_id, name = %contact.contact_name, "Zoho contact created");
        Ok(created.contact_id)
    }

    async fn update_contact(
        &self,
        org: &ZohoOrg,
        contact_id: &str,
        contact: &ContactPayload,
    ) -> ZohoResult<()> {
        let body = serde_json::to_value(contact)?;
        let path = format!("/contacts/{contact_id}");
        self.send(org, Method::PUT, &path, &[], Some(&body)).await?;
        debug!(contact_id = %contact_id, "Zoho contact updated");
        Ok(())
    }

    async fn create_sales_order(
        &self,
        org: &ZohoOrg,
        sales_order: &SalesOrderPayload,
    ) -> ZohoResult<SalesOrderRef> {
        let body = serde_json::to_value(sales_order)?;
        let envelope = self
            .send(org, Method::POST, "/salesorders", &[], Some(&body))
            .await?;
        field(envelope, "salesorder")
    }

    async fn create_invoice_from_sales_order(
        &self,
        org: &ZohoOrg,
        salesorder_id: &str,
    ) -> ZohoResult<InvoiceRef> {
        let query = [("salesorder_id", salesorder_id.to_string())];
        let envelope = self
            .send(org, Method::POST, "/invoices/fromsalesorder", &query, None)
            .await?;
        field(envelope, "invoice")
    }

    async fn mark_invoice_sent(&self, org: &ZohoOrg, invoice_id: &str) -> ZohoResult<()> {
        let path = format!("/invoices/{invoice_id}/status/sent");
        self.send(org, Method::POST, &path, &[], None).await?;
        Ok(())
    }

    async fn list_items(&self, org: &ZohoOrg, page: u32) -> ZohoResult<ItemPage> {
        let query = [
            ("page", page.to_string()),
            ("per_page", ITEMS_PER_PAGE.to_string()),
        ];
        let envelope = self.send(org, Method::GET, "/items", &query, None).await?;
        let has_more_page = envelope
            .pointer("/page_context/has_more_page")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let items: Vec<ZohoItem> = field(envelope, "items")?;
        Ok(ItemPage {
            items,
            has_more_page,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Query, State};
    use axum::http::HeaderMap;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use chrono::Duration as ChronoDuration;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;
    use tradeflow_core::Organization;
    use tradeflow_db::DbConfig;

    struct FakeZoho {
        /// Token the items endpoint accepts.
        accepted: &'static str,
        token_calls: AtomicUsize,
        item_calls: AtomicUsize,
        unavailable_once: AtomicBool,
        /// `api_domain` reported by the token endpoint.
        api_domain: std::sync::Mutex<Option<String>>,
    }

    async fn token(State(fake): State<Arc<FakeZoho>>, body: String) -> Json<Value> {
        fake.token_calls.fetch_add(1, Ordering::SeqCst);
        assert!(body.contains("grant_type=refresh_token"));
        assert!(body.contains("refresh_token=r1"));
        let api_domain = fake.api_domain.lock().unwrap().clone();
        Json(json!({ "access_token": "fresh", "expires_in": 3600, "api_domain": api_domain }))
    }

    async fn items(
        State(fake): State<Arc<FakeZoho>>,
        headers: HeaderMap,
        Query(query): Query<HashMap<String, String>>,
    ) -> (axum::http::StatusCode, Json<Value>) {
        fake.item_calls.fetch_add(1, Ordering::SeqCst);
        if fake.unavailable_once.swap(false, Ordering::SeqCst) {
            return (
                axum::http::StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "code": 1, "message": "busy" })),
            );
        }
        let expected = format!("Zoho-oauthtoken {}", fake.accepted);
        if headers.get("authorization").and_then(|v| v.to_str().ok()) != Some(expected.as_str()) {
            return (
                axum::http::StatusCode::UNAUTHORIZED,
                Json(json!({ "code": 57, "message": "You are not authorized to perform this operation" })),
            );
        }
        assert_eq!(query.get("organization_id").map(String::as_str), Some("60001"));
        (
            axum::http::StatusCode::OK,
            Json(json!({
                "code": 0,
                "message": "success",
                "items": [{ "item_id": "9001", "name": "Hex Bolt M8", "rate": 12.5, "status": "active" }],
                "page_context": { "page": 1, "has_more_page": false }
            })),
        )
    }

    async fn spawn(fake: Arc<FakeZoho>) -> String {
        let app = Router::new()
            .route("/oauth/v2/token", post(token))
            .route("/books/items", get(items))
            .route("/books/v3/items", get(items))
            .with_state(fake);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn fake(accepted: &'static str) -> Arc<FakeZoho> {
        Arc::new(FakeZoho {
            accepted,
            token_calls: AtomicUsize::new(0),
            item_calls: AtomicUsize::new(0),
            unavailable_once: AtomicBool::new(false),
            api_domain: std::sync::Mutex::new(None),
        })
    }

    /// Client against `base`, plus an organization holding `access_token`.
    async fn setup(
        base: &str,
        access_token: &str,
        expires_in: ChronoDuration,
    ) -> (ZohoClient, Database, ZohoOrg) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let now = Utc::now();
        let org = Organization {
            id: "org-1".to_string(),
            name: "Acme Hardware".to_string(),
            slug: "acme".to_string(),
            currency_code: "INR".to_string(),
            zoho_organization_id: Some("60001".to_string()),
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        db.organizations().insert(&org).await.unwrap();
        db.zoho_connections()
            .upsert(&ZohoConnection {
                organization_id: org.id.clone(),
                access_token: access_token.to_string(),
                refresh_token: "r1".to_string(),
                expires_at: now + expires_in,
                api_domain: None,
                updated_at: now,
            })
            .await
            .unwrap();

        let config = ZohoConfig {
            accounts_url: base.to_string(),
            books_url: format!("{base}/books"),
            client_id: "client".to_string(),
            client_secret: "secret".to_string(),
            max_retries: 2,
            initial_backoff_ms: 10,
            ..Default::default()
        };
        let client = ZohoClient::new(config, db.clone()).unwrap();
        let zoho_org = ZohoOrg::from_organization(&org).unwrap();
        (client, db, zoho_org)
    }

    #[tokio::test]
    async fn test_refreshes_and_retries_once_after_401() {
        let fake = fake("fresh");
        let base = spawn(fake.clone()).await;
        let (client, db, org) = setup(&base, "stale", ChronoDuration::hours(1)).await;

        let page = client.list_items(&org, 1).await.unwrap();
        assert_eq!(page.items.len(), 1);
        assert!(!page.has_more_page);
        assert_eq!(fake.token_calls.load(Ordering::SeqCst), 1);
        assert_eq!(fake.item_calls.load(Ordering::SeqCst), 2);

        let stored = db.zoho_connections().get("org-1").await.unwrap().unwrap();
        assert_eq!(stored.access_token, "fresh");
        assert_eq!(stored.refresh_token, "r1");
    }

    #[tokio::test]
    async fn test_refreshes_before_expiry() {
        let fake = fake("fresh");
        let base = spawn(fake.clone()).await;
        // Inside the 300 s buffer
        let (client, _db, org) = setup(&base, "stale", ChronoDuration::seconds(60)).await;

        client.list_items(&org, 1).await.unwrap();
        assert_eq!(fake.token_calls.load(Ordering::SeqCst), 1);
        assert_eq!(fake.item_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_refresh_stores_reported_api_domain() {
        let fake = fake("fresh");
        let base = spawn(fake.clone()).await;
        *fake.api_domain.lock().unwrap() = Some(base.clone());
        let (client, db, org) = setup(&base, "stale", ChronoDuration::seconds(60)).await;

        // Served from {api_domain}/books/v3 after the refresh
        client.list_items(&org, 1).await.unwrap();
        assert_eq!(fake.item_calls.load(Ordering::SeqCst), 1);

        let stored = db.zoho_connections().get("org-1").await.unwrap().unwrap();
        assert_eq!(stored.api_domain.as_deref(), Some(base.as_str()));
    }

    #[tokio::test]
    async fn test_second_401_is_not_retried() {
        let fake = fake("never-issued");
        let base = spawn(fake.clone()).await;
        let (client, _db, org) = setup(&base, "stale", ChronoDuration::hours(1)).await;

        let err = client.list_items(&org, 1).await.unwrap_err();
        assert!(matches!(err, ZohoError::Unauthorized));
        assert_eq!(fake.token_calls.load(Ordering::SeqCst), 1);
        assert_eq!(fake.item_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried() {
        let fake = fake("fresh");
        fake.unavailable_once.store(true, Ordering::SeqCst);
        let base = spawn(fake.clone()).await;
        let (client, _db, org) = setup(&base, "fresh", ChronoDuration::hours(1)).await;

        client.list_items(&org, 1).await.unwrap();
        assert_eq!(fake.item_calls.load(Ordering::SeqCst), 2);
        assert_eq!(fake.token_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_not_connected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let client = ZohoClient::new(ZohoConfig::default(), db).unwrap();
        let err = client.access_token("nobody").await.unwrap_err();
        assert!(matches!(err, ZohoError::NotConnected(ref id) if id == "nobody"));
    }

    #[test]
    fn test_parse_envelope() {
        let ok = parse_envelope(StatusCode::OK, r#"{"code":0,"contact":{"contact_id":"1"}}"#.into())
            .unwrap();
        let contact: ContactRef = field(ok, "contact").unwrap();
        assert_eq!(contact.contact_id, "1");

        let err = parse_envelope(
            StatusCode::BAD_REQUEST,
            r#"{"code":1002,"message":"Contact does not exist."}"#.into(),
        )
        .unwrap_err();
        assert!(err.is_missing_contact());

        let err = parse_envelope(StatusCode::BAD_GATEWAY, "upstream".into()).unwrap_err();
        assert!(err.is_transient());

        let missing = parse_envelope(StatusCode::OK, r#"{"code":0}"#.into()).unwrap();
        assert!(matches!(
            field::<ContactRef>(missing, "contact"),
            Err(ZohoError::MissingField("contact"))
        ));
    }
}
