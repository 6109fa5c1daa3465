//! Request and response bodies.
//!
//! Entities never leave the server as-is when they carry secrets
//! (`password_hash`, OAuth tokens) or raw cents only. Response DTOs carry every
//! amount twice: `*_cents` for arithmetic and a decimal string for display.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use tradeflow_core::cart::{PricedLine, Totals};
use tradeflow_core::{
    Cart, Invoice, InvoiceStatus, Money, Order, OrderItem, OrderSource, OrderStatus, Product,
    Quotation, QuotationItem, QuotationStatus, User, UserRole, ZohoConnection, ZohoSyncStatus,
};

fn amount(cents: i64) -> String {
    Money::from_cents(cents).to_decimal_string()
}

// =============================================================================
// Auth / Organizations / Users
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    /// Guest cart to fold into the user's cart.
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    pub user: UserDto,
    /// Active cart after a guest merge.
    pub cart_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterOrganizationRequest {
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub currency_code: Option<String>,
    pub admin_name: String,
    pub admin_email: String,
    pub admin_password: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateOrganizationRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub currency_code: Option<String>,
    /// Empty string unlinks the Zoho organization.
    #[serde(default)]
    pub zoho_organization_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub name: String,
    pub password: String,
    pub role: UserRole,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserDto {
    pub id: String,
    pub organization_id: String,
    pub email: String,
    pub name: String,
    pub role: UserRole,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserDto {
    fn from(u: User) -> Self {
        UserDto {
            id: u.id,
            organization_id: u.organization_id,
            email: u.email,
            name: u.name,
            role: u.role,
            is_active: u.is_active,
            created_at: u.created_at,
        }
    }
}

// =============================================================================
// Branches
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateBranchRequest {
    pub name: String,
    pub code: String,
    #[serde(default)]
    pub contact_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address_line: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub tax_number: Option<String>,
}

/// Absent fields keep their value.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateBranchRequest {
    pub name: Option<String>,
    pub contact_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address_line: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub tax_number: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct BranchListQuery {
    #[serde(default)]
    pub include_inactive: bool,
}

// =============================================================================
// Products
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub sku: String,
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub unit: Option<String>,
    pub price_cents: i64,
    #[serde(default)]
    pub tax_rate_bps: u32,
    #[serde(default)]
    pub min_order_quantity: Option<i64>,
    #[serde(default)]
    pub max_order_quantity: Option<i64>,
    #[serde(default)]
    pub stock_quantity: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub unit: Option<String>,
    pub price_cents: Option<i64>,
    pub tax_rate_bps: Option<u32>,
    pub min_order_quantity: Option<i64>,
    pub max_order_quantity: Option<i64>,
    /// Replaces the tracked stock level.
    pub stock_quantity: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProductQuery {
    pub q: Option<String>,
    pub category: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    #[serde(default)]
    pub include_inactive: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductDto {
    pub id: String,
    pub organization_id: String,
    pub sku: String,
    pub slug: String,
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub unit: String,
    pub price_cents: i64,
    pub price: String,
    pub tax_rate_bps: u32,
    pub min_order_quantity: i64,
    pub max_order_quantity: Option<i64>,
    pub stock_quantity: Option<i64>,
    pub zoho_item_id: Option<String>,
    pub is_active: bool,
    pub updated_at: DateTime<Utc>,
}

impl From<Product> for ProductDto {
    fn from(p: Product) -> Self {
        ProductDto {
            price: amount(p.price_cents),
            id: p.id,
            organization_id: p.organization_id,
            sku: p.sku,
            slug: p.slug,
            name: p.name,
            description: p.description,
            category: p.category,
            unit: p.unit,
            price_cents: p.price_cents,
            tax_rate_bps: p.tax_rate_bps,
            min_order_quantity: p.min_order_quantity,
            max_order_quantity: p.max_order_quantity,
            stock_quantity: p.stock_quantity,
            zoho_item_id: p.zoho_item_id,
            is_active: p.is_active,
            updated_at: p.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProductPage {
    pub items: Vec<ProductDto>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

// =============================================================================
// Carts
// =============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct CartQuery {
    pub organization_id: Option<String>,
    pub branch_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AddCartItemRequest {
    #[serde(default)]
    pub organization_id: Option<String>,
    #[serde(default)]
    pub branch_id: Option<String>,
    pub product_id: String,
    #[serde(default = "default_quantity")]
    pub quantity: i64,
}

fn default_quantity() -> i64 {
    1
}

#[derive(Debug, Deserialize)]
pub struct SetQuantityRequest {
    #[serde(default)]
    pub organization_id: Option<String>,
    pub quantity: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct CheckoutRequest {
    #[serde(default)]
    pub organization_id: Option<String>,
    #[serde(default)]
    pub branch_id: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TotalsDto {
    pub item_count: usize,
    pub total_quantity: i64,
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
    pub subtotal: String,
    pub discount: String,
    pub tax: String,
    pub total: String,
}

impl From<&Totals> for TotalsDto {
    fn from(t: &Totals) -> Self {
        TotalsDto {
            item_count: t.item_count,
            total_quantity: t.total_quantity,
            subtotal_cents: t.subtotal.cents(),
            discount_cents: t.discount.cents(),
            tax_cents: t.tax.cents(),
            total_cents: t.total.cents(),
            subtotal: t.subtotal.to_decimal_string(),
            discount: t.discount.to_decimal_string(),
            tax: t.tax.to_decimal_string(),
            total: t.total.to_decimal_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CartLineDto {
    pub product_id: String,
    pub sku: String,
    pub name: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub unit_price: String,
    pub tax_rate_bps: u32,
    pub line_tax_cents: i64,
    pub line_total_cents: i64,
    pub line_total: String,
}

impl From<&PricedLine> for CartLineDto {
    fn from(line: &PricedLine) -> Self {
        CartLineDto {
            product_id: line.product_id.clone(),
            sku: line.sku.clone(),
            name: line.name.clone(),
            quantity: line.quantity,
            unit_price_cents: line.unit_price.cents(),
            unit_price: line.unit_price.to_decimal_string(),
            tax_rate_bps: line.tax_rate.bps(),
            line_tax_cents: line.line_tax().cents(),
            line_total_cents: line.line_total().cents(),
            line_total: line.line_total().to_decimal_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CartResponse {
    pub id: String,
    pub organization_id: String,
    pub branch_id: Option<String>,
    pub items: Vec<CartLineDto>,
    pub totals: TotalsDto,
    pub updated_at: DateTime<Utc>,
}

impl CartResponse {
    pub fn new(cart: Cart, lines: &[PricedLine]) -> Self {
        CartResponse {
            items: lines.iter().map(CartLineDto::from).collect(),
            totals: TotalsDto::from(&Totals::from_lines(lines)),
            id: cart.id,
            organization_id: cart.organization_id,
            branch_id: cart.branch_id,
            updated_at: cart.updated_at,
        }
    }
}

// =============================================================================
// Quotations
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct QuotationLineRequest {
    pub product_id: String,
    pub quantity: i64,
    #[serde(default)]
    pub discount_bps: u32,
}

#[derive(Debug, Deserialize)]
pub struct CreateQuotationRequest {
    pub branch_id: String,
    /// Explicit lines. When absent the caller's active cart is quoted.
    #[serde(default)]
    pub items: Option<Vec<QuotationLineRequest>>,
    /// Discount applied to every cart line when quoting a cart.
    #[serde(default)]
    pub discount_bps: u32,
    #[serde(default)]
    pub valid_until: Option<NaiveDate>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct QuotationListQuery {
    pub status: Option<QuotationStatus>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuotationItemDto {
    pub product_id: String,
    pub sku: String,
    pub name: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub discount_bps: u32,
    pub tax_rate_bps: u32,
    pub line_total_cents: i64,
    pub line_total: String,
}

impl From<QuotationItem> for QuotationItemDto {
    fn from(i: QuotationItem) -> Self {
        QuotationItemDto {
            line_total: amount(i.line_total_cents),
            product_id: i.product_id,
            sku: i.sku_snapshot,
            name: i.name_snapshot,
            quantity: i.quantity,
            unit_price_cents: i.unit_price_cents,
            discount_bps: i.discount_bps,
            tax_rate_bps: i.tax_rate_bps,
            line_total_cents: i.line_total_cents,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct QuotationResponse {
    pub id: String,
    pub organization_id: String,
    pub branch_id: String,
    pub created_by: String,
    pub quotation_number: String,
    pub status: QuotationStatus,
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
    pub total: String,
    pub valid_until: NaiveDate,
    pub notes: Option<String>,
    pub order_id: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<QuotationItemDto>>,
}

impl QuotationResponse {
    pub fn with_items(quotation: Quotation, items: Vec<QuotationItem>) -> Self {
        let mut response = QuotationResponse::from(quotation);
        response.items = Some(items.into_iter().map(QuotationItemDto::from).collect());
        response
    }
}

impl From<Quotation> for QuotationResponse {
    fn from(q: Quotation) -> Self {
        QuotationResponse {
            total: amount(q.total_cents),
            id: q.id,
            organization_id: q.organization_id,
            branch_id: q.branch_id,
            created_by: q.created_by,
            quotation_number: q.quotation_number,
            status: q.status,
            subtotal_cents: q.subtotal_cents,
            discount_cents: q.discount_cents,
            tax_cents: q.tax_cents,
            total_cents: q.total_cents,
            valid_until: q.valid_until,
            notes: q.notes,
            order_id: q.order_id,
            created_at: q.created_at,
            items: None,
        }
    }
}

// =============================================================================
// Orders / Invoices
// =============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct OrderListQuery {
    pub status: Option<OrderStatus>,
    pub branch_id: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct OrderStatusRequest {
    pub status: OrderStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderItemDto {
    pub product_id: String,
    pub sku: String,
    pub name: String,
    pub category: Option<String>,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub discount_cents: i64,
    pub tax_cents: i64,
    pub line_total_cents: i64,
    pub line_total: String,
}

impl From<OrderItem> for OrderItemDto {
    fn from(i: OrderItem) -> Self {
        OrderItemDto {
            line_total: amount(i.line_total_cents),
            product_id: i.product_id,
            sku: i.sku_snapshot,
            name: i.name_snapshot,
            category: i.category_snapshot,
            quantity: i.quantity,
            unit_price_cents: i.unit_price_cents,
            discount_cents: i.discount_cents,
            tax_cents: i.tax_cents,
            line_total_cents: i.line_total_cents,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderResponse {
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
    pub total: String,
    pub notes: Option<String>,
    pub zoho_sales_order_id: Option<String>,
    pub zoho_sales_order_number: Option<String>,
    pub zoho_sync_status: ZohoSyncStatus,
    pub zoho_sync_error: Option<String>,
    pub zoho_synced_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<OrderItemDto>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice: Option<InvoiceDto>,
}

impl OrderResponse {
    pub fn detailed(order: Order, items: Vec<OrderItem>, invoice: Option<Invoice>) -> Self {
        let mut response = OrderResponse::from(order);
        response.items = Some(items.into_iter().map(OrderItemDto::from).collect());
        response.invoice = invoice.map(InvoiceDto::from);
        response
    }
}

impl From<Order> for OrderResponse {
    fn from(o: Order) -> Self {
        OrderResponse {
            total: amount(o.total_cents),
            id: o.id,
            organization_id: o.organization_id,
            branch_id: o.branch_id,
            user_id: o.user_id,
            order_number: o.order_number,
            status: o.status,
            source: o.source,
            quotation_id: o.quotation_id,
            subtotal_cents: o.subtotal_cents,
            discount_cents: o.discount_cents,
            tax_cents: o.tax_cents,
            total_cents: o.total_cents,
            notes: o.notes,
            zoho_sales_order_id: o.zoho_sales_order_id,
            zoho_sales_order_number: o.zoho_sales_order_number,
            zoho_sync_status: o.zoho_sync_status,
            zoho_sync_error: o.zoho_sync_error,
            zoho_synced_at: o.zoho_synced_at,
            created_at: o.created_at,
            items: None,
            invoice: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct InvoiceListQuery {
    pub status: Option<InvoiceStatus>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InvoiceDto {
    pub id: String,
    pub order_id: String,
    pub invoice_number: String,
    pub status: InvoiceStatus,
    pub total_cents: i64,
    pub total: String,
    pub balance_cents: i64,
    pub balance: String,
    pub due_date: Option<NaiveDate>,
    pub zoho_invoice_id: Option<String>,
    pub issued_at: Option<DateTime<Utc>>,
}

impl From<Invoice> for InvoiceDto {
    fn from(i: Invoice) -> Self {
        InvoiceDto {
            total: amount(i.total_cents),
            balance: amount(i.balance_cents),
            id: i.id,
            order_id: i.order_id,
            invoice_number: i.invoice_number,
            status: i.status,
            total_cents: i.total_cents,
            balance_cents: i.balance_cents,
            due_date: i.due_date,
            zoho_invoice_id: i.zoho_invoice_id,
            issued_at: i.issued_at,
        }
    }
}

// =============================================================================
// Zoho
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct ZohoConnectRequest {
    /// Authorization code from the Zoho consent redirect.
    pub code: String,
    #[serde(default)]
    pub zoho_organization_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ZohoStatusDto {
    pub connected: bool,
    pub zoho_organization_id: Option<String>,
    pub api_domain: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl ZohoStatusDto {
    pub fn new(zoho_organization_id: Option<String>, connection: Option<ZohoConnection>) -> Self {
        ZohoStatusDto {
            connected: connection.is_some(),
            zoho_organization_id,
            api_domain: connection.as_ref().and_then(|c| c.api_domain.clone()),
            expires_at: connection.map(|c| c.expires_at),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct SyncPendingQuery {
    pub limit: Option<i64>,
}

// =============================================================================
// Analytics
// =============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct AnalyticsQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub granularity: Option<String>,
    pub limit: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tradeflow_core::TaxRate;

    #[test]
    fn test_totals_carry_cents_and_decimal() {
        let line = PricedLine {
            product_id: "p1".to_string(),
            sku: "BOLT-M8".to_string(),
            name: "Hex Bolt M8".to_string(),
            unit_price: Money::from_cents(1250),
            tax_rate: TaxRate::from_bps(1800),
            quantity: 4,
            discount_bps: 0,
        };
        let totals = TotalsDto::from(&Totals::from_lines(std::slice::from_ref(&line)));
        assert_eq!(totals.subtotal_cents, 5000);
        assert_eq!(totals.subtotal, "50.00");
        assert_eq!(totals.tax_cents, 900);
        assert_eq!(totals.total, "59.00");

        let dto = CartLineDto::from(&line);
        assert_eq!(dto.unit_price, "12.50");
        assert_eq!(dto.line_total_cents, 5900);
    }

    #[test]
    fn test_user_dto_hides_password_hash() {
        let user = User {
            id: "u1".to_string(),
            organization_id: "o1".to_string(),
            email: "a@b.in".to_string(),
            name: "A".to_string(),
            role: UserRole::Admin,
            password_hash: "$argon2id$secret".to_string(),
            is_active: true,
            created_at: Utc::now(),
        };
        let json = serde_json::to_string(&UserDto::from(user)).unwrap();
        assert!(!json.contains("argon2"));
        assert!(json.contains("\"role\":\"admin\""));
    }
}
