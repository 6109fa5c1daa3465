//! # tradeflow-core: Pure Business Logic for Tradeflow
//!
//! This crate contains the domain model and every business rule of Tradeflow as
//! pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Tradeflow Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    apps/api (axum)                              │   │
//! │  │    routes ──► validation ──► repositories ──► Zoho sync         │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │             ★ tradeflow-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌──────────┐ ┌─────────┐ │   │
//! │  │   │  types  │ │  money  │ │  cart   │ │validation│ │analytics│ │   │
//! │  │   │ Order   │ │  Money  │ │ Totals  │ │  rules   │ │ buckets │ │   │
//! │  │   │ Branch  │ │ TaxRate │ │ qty     │ │  checks  │ │ summary │ │   │
//! │  │   └─────────┘ └─────────┘ └─────────┘ └──────────┘ └─────────┘ │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │          tradeflow-db / tradeflow-zoho (I/O layers)             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain entities and status enums with their transition tables
//! - [`money`] - Money type with integer arithmetic
//! - [`cart`] - Line pricing, totals, order quantity rules
//! - [`validation`] - Field validation
//! - [`numbering`] - Human-readable document numbers
//! - [`analytics`] - Sales aggregation by period, category and product
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use tradeflow_core::money::Money;
//! use tradeflow_core::types::TaxRate;
//!
//! let price = Money::from_cents(1099);
//! let tax = price.calculate_tax(TaxRate::from_bps(1800));
//! assert_eq!(tax.cents(), 198);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod analytics;
pub mod cart;
pub mod error;
pub mod money;
pub mod numbering;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use cart::{PricedLine, Totals};
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum distinct lines in one cart.
pub const MAX_CART_ITEMS: usize = 200;

/// Maximum quantity of a single line, whatever the product allows.
///
/// B2B orders run into the thousands (fasteners by the piece), but five digits
/// is almost always a typo.
pub const MAX_ITEM_QUANTITY: i64 = 10_000;

/// Default validity of a new quotation.
pub const DEFAULT_QUOTATION_VALIDITY_DAYS: i64 = 30;
