//! # tradeflow-db: Database Layer for Tradeflow
//!
//! SQLite storage for the Tradeflow back office, accessed through sqlx.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Tradeflow Data Flow                              │
//! │                                                                         │
//! │  axum handler (POST /api/cart/checkout)      Zoho sync (tradeflow-zoho) │
//! │       │                                              │                  │
//! │       ▼                                              ▼                  │
//! │  ┌─────────────────────────────────────────────────────────────────┐    │
//! │  │                   tradeflow-db (THIS CRATE)                     │    │
//! │  │                                                                 │    │
//! │  │   ┌───────────────┐    ┌────────────────┐    ┌──────────────┐   │    │
//! │  │   │   Database    │    │  Repositories  │    │  Migrations  │   │    │
//! │  │   │   (pool.rs)   │    │                │    │  (embedded)  │   │    │
//! │  │   │               │    │ ProductRepo    │    │              │   │    │
//! │  │   │ SqlitePool    │◄───│ CartRepo       │    │ 001_initial  │   │    │
//! │  │   │               │    │ OrderRepo ...  │    │              │   │    │
//! │  │   └───────────────┘    └────────────────┘    └──────────────┘   │    │
//! │  └─────────────────────────────────────────────────────────────────┘    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  tradeflow.db (WAL)                                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - One repository per aggregate
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tradeflow_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("tradeflow.db")).await?;
//!
//! let mut filter = ProductFilter::new(&org_id);
//! filter.query = Some("bolt".into());
//! let products = db.products().search(&filter).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

pub use repository::{
    BranchRepository, CartRepository, InvoiceRepository, NewOrder, OrderFilter,
    OrderRepository, OrganizationRepository, ProductFilter, ProductRepository,
    QuotationRepository, UpsertOutcome, UserRepository, ZohoConnectionRepository,
    ZohoItemSnapshot,
};
