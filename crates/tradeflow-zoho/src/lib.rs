//! # tradeflow-zoho: Zoho Books Integration
//!
//! Everything Tradeflow says to Zoho goes through this crate: the OAuth
//! grant per organization, authenticated REST calls, and the pipeline that
//! turns a placed order into a Zoho sales order and invoice.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Zoho Integration                                 │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                  OrderSync<A: ZohoApi>                            │  │
//! │  │                                                                  │  │
//! │  │  sync_order / sync_pending / sync_branch_contact /               │  │
//! │  │  import_products                                                 │  │
//! │  └────────────────────────────┬─────────────────────────────────────┘  │
//! │                               │ ZohoApi (trait)                         │
//! │                               ▼                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                        ZohoClient                                │  │
//! │  │                                                                  │  │
//! │  │  send() ── 401 ──► refresh (TokenClient) ──► retry once          │  │
//! │  │         ── 429/5xx/timeout ──► exponential backoff               │  │
//! │  └──────────────┬───────────────────────────────────┬───────────────┘  │
//! │                 │                                   │                   │
//! │                 ▼                                   ▼                   │
//! │  ┌──────────────────────────┐         ┌───────────────────────────┐    │
//! │  │ zoho_connections (SQLite)│         │ Zoho accounts + Books API │    │
//! │  └──────────────────────────┘         └───────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`config`] - Endpoints, OAuth client credentials, retry tuning
//! - [`error`] - Zoho error types
//! - [`token`] - OAuth grants and the token set
//! - [`api`] - Request/response payloads and the `ZohoApi` trait
//! - [`client`] - `ZohoClient`, the HTTP implementation of `ZohoApi`
//! - [`sync`] - Order, contact and catalog synchronisation
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tradeflow_zoho::{OrderSync, ZohoClient, ZohoConfig};
//!
//! let client = Arc::new(ZohoClient::new(ZohoConfig::default(), db.clone())?);
//! client.connect(&org.id, &authorization_code).await?;
//!
//! let sync = OrderSync::new(client, db);
//! let order = sync.sync_order(&order_id).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod sync;
pub mod token;

// =============================================================================
// Re-exports
// =============================================================================

pub use api::{ZohoApi, ZohoOrg};
pub use client::ZohoClient;
pub use config::ZohoConfig;
pub use error::{ZohoError, ZohoResult};
pub use sync::{ImportReport, OrderSync, SyncReport};
pub use token::TokenSet;
