//! # Domain Types
//!
//! Core domain types used throughout Tradeflow.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  Organization (tenant) ──┬── Branch ──── Zoho contact (1:1)             │
//! │                          ├── User                                       │
//! │                          ├── Product                                    │
//! │                          ├── Cart ──── CartItem                         │
//! │                          ├── Quotation ──── QuotationItem (snapshot)    │
//! │                          ├── Order ──── OrderItem (snapshot)            │
//! │                          │     └── Zoho sales order id                  │
//! │                          ├── Invoice ──── Zoho invoice id               │
//! │                          └── ZohoConnection (OAuth tokens)              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has:
//! - `id`: UUID v4 - immutable, used for relations
//! - Business ID: (sku, slug, order_number, ...) - human-readable

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::{CoreError, ValidationError};
use crate::money::Money;

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate represented in basis points (1800 bps = 18%).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxRate(u32);

impl TaxRate {
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Rate as a percentage (for display and the Zoho wire format only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        TaxRate::zero()
    }
}

// =============================================================================
// Organization
// =============================================================================

/// A tenant. Everything else hangs off an organization.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Organization {
    pub id: String,
    pub name: String,
    /// URL-safe unique identifier.
    pub slug: String,
    /// ISO 4217 code, e.g. "INR".
    pub currency_code: String,
    /// Zoho Books organization the tenant invoices through.
    pub zoho_organization_id: Option<String>,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Branch
// =============================================================================

/// A location / cost-center under an organization.
///
/// Each branch is invoiced as one Zoho Books contact; `zoho_contact_id` is filled
/// the first time the branch is synchronised.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Branch {
    pub id: String,
    pub organization_id: String,
    pub name: String,
    /// Short code unique within the organization ("BLR-01").
    pub code: String,
    pub contact_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address_line: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    /// GSTIN / VAT number printed on invoices.
    pub tax_number: Option<String>,
    pub zoho_contact_id: Option<String>,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// User
// =============================================================================

/// Role of a user inside their organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum UserRole {
    Admin,
    Manager,
    Buyer,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::Manager => "manager",
            UserRole::Buyer => "buyer",
        }
    }

    /// Products and branches can be created / edited.
    pub fn can_manage_catalog(&self) -> bool {
        matches!(self, UserRole::Admin | UserRole::Manager)
    }

    /// Quotations can be approved / rejected and orders moved along.
    pub fn can_approve(&self) -> bool {
        matches!(self, UserRole::Admin | UserRole::Manager)
    }

    /// Users, the Zoho connection and organization settings.
    pub fn can_administer(&self) -> bool {
        matches!(self, UserRole::Admin)
    }
}

impl FromStr for UserRole {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(UserRole::Admin),
            "manager" => Ok(UserRole::Manager),
            "buyer" => Ok(UserRole::Buyer),
            _ => Err(not_allowed("role", &["admin", "manager", "buyer"])),
        }
    }
}

/// A person who can sign in.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct User {
    pub id: String,
    pub organization_id: String,
    pub email: String,
    pub name: String,
    pub role: UserRole,
    /// Argon2 PHC string. Never leaves the server.
    #[serde(skip_serializing)]
    #[ts(skip)]
    pub password_hash: String,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Product
// =============================================================================

/// A catalog item sold to branches.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    pub id: String,
    pub organization_id: String,
    /// Stock Keeping Unit, unique per organization.
    pub sku: String,
    /// URL slug, unique per organization.
    pub slug: String,
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    /// Selling unit ("pcs", "box", "kg").
    pub unit: String,
    pub price_cents: i64,
    pub tax_rate_bps: u32,
    /// Smallest quantity a branch may order.
    pub min_order_quantity: i64,
    /// Largest quantity a branch may order in one line.
    pub max_order_quantity: Option<i64>,
    /// Tracked stock; `None` means stock is not tracked.
    pub stock_quantity: Option<i64>,
    /// Zoho Inventory item id once linked.
    pub zoho_item_id: Option<String>,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    #[inline]
    pub fn tax_rate(&self) -> TaxRate {
        TaxRate::from_bps(self.tax_rate_bps)
    }
}

// =============================================================================
// Cart
// =============================================================================

/// Lifecycle of a cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum CartStatus {
    Active,
    CheckedOut,
    Abandoned,
}

/// Who a cart belongs to.
///
/// Guests are identified by an opaque session id until they sign in, at which
/// point the guest cart is merged into the user's cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartOwner {
    User(String),
    Guest(String),
}

impl CartOwner {
    pub fn user_id(&self) -> Option<&str> {
        match self {
            CartOwner::User(id) => Some(id),
            CartOwner::Guest(_) => None,
        }
    }

    pub fn session_id(&self) -> Option<&str> {
        match self {
            CartOwner::User(_) => None,
            CartOwner::Guest(id) => Some(id),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Cart {
    pub id: String,
    pub organization_id: String,
    pub branch_id: Option<String>,
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    pub status: CartStatus,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

/// A cart line. Price and tax are captured when the line is added.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct CartItem {
    pub id: String,
    pub cart_id: String,
    pub product_id: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub tax_rate_bps: u32,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Quotation
// =============================================================================

/// Quotation lifecycle.
///
/// ```text
///  Draft ──► Sent ──► Approved ──► Converted
///    │         │
///    │         ├────► Rejected
///    │         └────► Expired
///    └──────────────► Rejected
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum QuotationStatus {
    Draft,
    Sent,
    Approved,
    Rejected,
    Expired,
    Converted,
}

impl QuotationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuotationStatus::Draft => "draft",
            QuotationStatus::Sent => "sent",
            QuotationStatus::Approved => "approved",
            QuotationStatus::Rejected => "rejected",
            QuotationStatus::Expired => "expired",
            QuotationStatus::Converted => "converted",
        }
    }

    pub fn can_transition_to(&self, next: QuotationStatus) -> bool {
        use QuotationStatus::*;
        matches!(
            (self, next),
            (Draft, Sent)
                | (Draft, Rejected)
                | (Sent, Approved)
                | (Sent, Rejected)
                | (Sent, Expired)
                | (Approved, Converted)
        )
    }

    /// Returns `next` if the move is legal.
    pub fn transition(&self, next: QuotationStatus) -> Result<QuotationStatus, CoreError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(CoreError::InvalidStatusTransition {
                entity: "Quotation",
                from: self.to_string(),
                to: next.to_string(),
            })
        }
    }
}

impl fmt::Display for QuotationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuotationStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(QuotationStatus::Draft),
            "sent" => Ok(QuotationStatus::Sent),
            "approved" => Ok(QuotationStatus::Approved),
            "rejected" => Ok(QuotationStatus::Rejected),
            "expired" => Ok(QuotationStatus::Expired),
            "converted" => Ok(QuotationStatus::Converted),
            _ => Err(not_allowed(
                "status",
                &["draft", "sent", "approved", "rejected", "expired", "converted"],
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Quotation {
    pub id: String,
    pub organization_id: String,
    pub branch_id: String,
    /// User who raised the quotation.
    pub created_by: String,
    pub quotation_number: String,
    pub status: QuotationStatus,
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
    #[ts(as = "String")]
    pub valid_until: NaiveDate,
    pub notes: Option<String>,
    /// Order created when the quotation was converted.
    pub order_id: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Quotation {
    /// True once `today` is past `valid_until`.
    pub fn is_expired_on(&self, today: NaiveDate) -> bool {
        today > self.valid_until
    }
}

/// A quotation line, frozen at creation.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct QuotationItem {
    pub id: String,
    pub quotation_id: String,
    pub product_id: String,
    pub sku_snapshot: String,
    pub name_snapshot: String,
    pub unit_price_cents: i64,
    pub quantity: i64,
    pub discount_bps: u32,
    pub tax_rate_bps: u32,
    pub line_total_cents: i64,
}

// =============================================================================
// Order
// =============================================================================

/// Order fulfilment lifecycle.
///
/// ```text
///  Pending ──► Confirmed ──► Processing ──► Shipped ──► Delivered
///     │            │             │
///     └────────────┴─────────────┴──► Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed)
                | (Confirmed, Processing)
                | (Processing, Shipped)
                | (Shipped, Delivered)
                | (Pending, Cancelled)
                | (Confirmed, Cancelled)
                | (Processing, Cancelled)
        )
    }

    pub fn transition(&self, next: OrderStatus) -> Result<OrderStatus, CoreError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(CoreError::InvalidStatusTransition {
                entity: "Order",
                from: self.to_string(),
                to: next.to_string(),
            })
        }
    }

    /// Delivered and cancelled orders never change again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "confirmed" => Ok(OrderStatus::Confirmed),
            "processing" => Ok(OrderStatus::Processing),
            "shipped" => Ok(OrderStatus::Shipped),
            "delivered" => Ok(OrderStatus::Delivered),
            "cancelled" => Ok(OrderStatus::Cancelled),
            _ => Err(not_allowed(
                "status",
                &[
                    "pending",
                    "confirmed",
                    "processing",
                    "shipped",
                    "delivered",
                    "cancelled",
                ],
            )),
        }
    }
}

/// Where an order came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum OrderSource {
    Cart,
    Quotation,
}

/// State of the Zoho mirror of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum ZohoSyncStatus {
    NotSynced,
    Synced,
    Failed,
}

impl ZohoSyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ZohoSyncStatus::NotSynced => "not_synced",
            ZohoSyncStatus::Synced => "synced",
            ZohoSyncStatus::Failed => "failed",
        }
    }
}

/// A finalized purchase. Lines and totals never change after creation; only the
/// status and the Zoho mirror fields move.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Order {
    pub id: String,
    pub organization_id: String,
    pub branch_id: String,
    pub user_id: String,
    pub order_number: String,
    pub status: OrderStatus,
    pub source: OrderSource,
    pub quotation_id: Option<String>,
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
    pub notes: Option<String>,
    pub zoho_sales_order_id: Option<String>,
    pub zoho_sales_order_number: Option<String>,
    pub zoho_sync_status: ZohoSyncStatus,
    pub zoho_sync_error: Option<String>,
    #[ts(as = "Option<String>")]
    pub zoho_synced_at: Option<DateTime<Utc>>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Order {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }
}

/// An order line. Uses the snapshot pattern to freeze product data.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct OrderItem {
    pub id: String,
    pub order_id: String,
    pub product_id: String,
    pub sku_snapshot: String,
    pub name_snapshot: String,
    pub category_snapshot: Option<String>,
    pub unit_price_cents: i64,
    pub quantity: i64,
    pub discount_cents: i64,
    pub tax_rate_bps: u32,
    pub tax_cents: i64,
    pub line_total_cents: i64,
}

// =============================================================================
// Invoice
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum InvoiceStatus {
    Draft,
    Sent,
    PartiallyPaid,
    Paid,
    Overdue,
    Void,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Sent => "sent",
            InvoiceStatus::PartiallyPaid => "partially_paid",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Overdue => "overdue",
            InvoiceStatus::Void => "void",
        }
    }

    /// Maps a Zoho Books invoice status string.
    pub fn from_zoho(status: &str) -> InvoiceStatus {
        match status {
            "sent" => InvoiceStatus::Sent,
            "partially_paid" => InvoiceStatus::PartiallyPaid,
            "paid" => InvoiceStatus::Paid,
            "overdue" => InvoiceStatus::Overdue,
            "void" => InvoiceStatus::Void,
            _ => InvoiceStatus::Draft,
        }
    }
}

impl FromStr for InvoiceStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(InvoiceStatus::Draft),
            "sent" => Ok(InvoiceStatus::Sent),
            "partially_paid" => Ok(InvoiceStatus::PartiallyPaid),
            "paid" => Ok(InvoiceStatus::Paid),
            "overdue" => Ok(InvoiceStatus::Overdue),
            "void" => Ok(InvoiceStatus::Void),
            _ => Err(not_allowed(
                "status",
                &["draft", "sent", "partially_paid", "paid", "overdue", "void"],
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Invoice {
    pub id: String,
    pub organization_id: String,
    pub order_id: String,
    pub invoice_number: String,
    pub status: InvoiceStatus,
    pub total_cents: i64,
    pub balance_cents: i64,
    #[ts(as = "Option<String>")]
    pub due_date: Option<NaiveDate>,
    pub zoho_invoice_id: Option<String>,
    #[ts(as = "Option<String>")]
    pub issued_at: Option<DateTime<Utc>>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Zoho Connection
// =============================================================================

/// OAuth tokens for one organization's Zoho account.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ZohoConnection {
    pub organization_id: String,
    #[serde(skip_serializing)]
    pub access_token: String,
    #[serde(skip_serializing)]
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    /// Data-centre specific API domain returned by Zoho ("https://www.zohoapis.in").
    pub api_domain: Option<String>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Helpers
// =============================================================================

fn not_allowed(field: &str, allowed: &[&str]) -> ValidationError {
    ValidationError::NotAllowed {
        field: field.to_string(),
        allowed: allowed.iter().map(|s| s.to_string()).collect(),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
