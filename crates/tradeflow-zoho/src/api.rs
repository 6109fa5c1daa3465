//! # Zoho Books API Surface
//!
//! The [`ZohoApi`] trait covers the handful of Books endpoints the order
//! pipeline needs. [`crate::ZohoClient`] implements it over HTTP; tests use an
//! in-memory fake.
//!
//! | Method                            | Endpoint                                   |
//! |-----------------------------------|--------------------------------------------|
//! | `create_contact`                  | `POST /contacts`                           |
//! | `update_contact`                  | `PUT /contacts/{contact_id}`               |
//! | `create_sales_order`              | `POST /salesorders`                        |
//! | `create_invoice_from_sales_order` | `POST /invoices/fromsalesorder`            |
//! | `mark_invoice_sent`               | `POST /invoices/{invoice_id}/status/sent`  |
//! | `list_items`                      | `GET /items?page=&per_page=`               |
//!
//! Amounts cross this boundary as decimals (`rate: 12.5`); everything inside
//! Tradeflow stays in cents.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{ZohoError, ZohoResult};
use tradeflow_core::{Branch, Money, Order, OrderItem, Organization};
use tradeflow_db::ZohoItemSnapshot;

/// Page size for item listing.
pub const ITEMS_PER_PAGE: u32 = 200;

/// Which Zoho organization a call targets, and whose tokens to use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZohoOrg {
    /// Local organization id (owner of the stored tokens).
    pub organization_id: String,
    pub zoho_organization_id: String,
}

impl ZohoOrg {
    pub fn from_organization(org: &Organization) -> ZohoResult<Self> {
        let zoho_organization_id = org
            .zoho_organization_id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .ok_or(ZohoError::MissingField("zoho_organization_id"))?;
        Ok(ZohoOrg {
            organization_id: org.id.clone(),
            zoho_organization_id,
        })
    }
}

// =============================================================================
// Contacts
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Address {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContactPerson {
    pub first_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub is_primary_contact: bool,
}

/// Body of `POST /contacts` and `PUT /contacts/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContactPayload {
    pub contact_name: String,
    pub company_name: String,
    pub contact_type: &'static str,
    pub billing_address: Address,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub contact_persons: Vec<ContactPerson>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gst_no: Option<String>,
}

impl ContactPayload {
    /// A branch is a customer contact named "<branch> (<code>)" under the
    /// organization's company name.
    pub fn from_branch(organization_name: &str, branch: &Branch) -> Self {
        let person_name = branch.contact_name.clone().or_else(|| branch.email.clone());
        let contact_persons = person_name
            .map(|first_name| ContactPerson {
                first_name,
                email: branch.email.clone(),
                phone: branch.phone.clone(),
                is_primary_contact: true,
            })
            .into_iter()
            .collect();

        ContactPayload {
            contact_name: format!("{} ({})", branch.name, branch.code),
            company_name: organization_name.to_string(),
            contact_type: "customer",
            billing_address: Address {
                address: branch.address_line.clone(),
                city: branch.city.clone(),
                state: branch.state.clone(),
                zip: branch.postal_code.clone(),
                country: branch.country.clone(),
            },
            contact_persons,
            gst_no: branch.tax_number.clone(),
        }
    }
}

// =============================================================================
// Sales orders & invoices
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineItemPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
    pub name: String,
    pub description: String,
    pub rate: f64,
    pub quantity: i64,
    /// Line discount as an amount.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount: Option<f64>,
}

/// Body of `POST /salesorders`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SalesOrderPayload {
    pub customer_id: String,
    pub date: String,
    pub reference_number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub line_items: Vec<LineItemPayload>,
}

impl SalesOrderPayload {
    /// `zoho_item_ids[i]` is the Zoho item of `items[i]`, when the product is
    /// linked.
    pub fn from_order(
        customer_id: &str,
        order: &Order,
        items: &[OrderItem],
        zoho_item_ids: &[Option<String>],
    ) -> Self {
        let line_items = items
            .iter()
            .enumerate()
            .map(|(i, item)| LineItemPayload {
                item_id: zoho_item_ids.get(i).cloned().flatten(),
                name: item.name_snapshot.clone(),
                description: item.sku_snapshot.clone(),
                rate: Money::from_cents(item.unit_price_cents).as_major_f64(),
                quantity: item.quantity,
                discount: (item.discount_cents != 0)
                    .then(|| Money::from_cents(item.discount_cents).as_major_f64()),
            })
            .collect();

        SalesOrderPayload {
            customer_id: customer_id.to_string(),
            date: order.created_at.date_naive().format("%Y-%m-%d").to_string(),
            reference_number: order.order_number.clone(),
            notes: order.notes.clone(),
            line_items,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SalesOrderRef {
    pub salesorder_id: String,
    #[serde(default)]
    pub salesorder_number: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InvoiceRef {
    pub invoice_id: String,
    pub invoice_number: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub total: Option<f64>,
    #[serde(default)]
    pub balance: Option<f64>,
    /// `YYYY-MM-DD`
    #[serde(default)]
    pub due_date: Option<String>,
}

impl InvoiceRef {
    pub fn due_date(&self) -> Option<NaiveDate> {
        self.due_date
            .as_deref()
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
    }
}

// =============================================================================
// Items
// =============================================================================

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ZohoItem {
    pub item_id: String,
    pub name: String,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub rate: f64,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub tax_percentage: Option<f64>,
    #[serde(default)]
    pub stock_on_hand: Option<f64>,
}

impl ZohoItem {
    pub fn is_active(&self) -> bool {
        self.status.as_deref().map_or(true, |s| s == "active")
    }

    pub fn to_snapshot(&self) -> ZohoItemSnapshot {
        ZohoItemSnapshot {
            item_id: self.item_id.clone(),
            sku: self.sku.clone().filter(|s| !s.trim().is_empty()),
            name: self.name.clone(),
            description: self.description.clone().filter(|d| !d.trim().is_empty()),
            rate_cents: Money::from_major_f64(self.rate).cents(),
            tax_rate_bps: self
                .tax_percentage
                .map(|p| (p * 100.0).round().clamp(0.0, 10_000.0) as u32)
                .unwrap_or(0),
            unit: self.unit.clone().filter(|u| !u.trim().is_empty()),
            stock_on_hand: self.stock_on_hand.map(|s| s.floor().max(0.0) as i64),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemPage {
    pub items: Vec<ZohoItem>,
    pub has_more_page: bool,
}

// =============================================================================
// Trait
// =============================================================================

#[async_trait]
pub trait ZohoApi: Send + Sync {
    /// Returns the new contact id.
    async fn create_contact(&self, org: &ZohoOrg, contact: &ContactPayload) -> ZohoResult<String>;

    async fn update_contact(
        &self,
        org: &ZohoOrg,
        contact_id: &str,
        contact: &ContactPayload,
    ) -> ZohoResult<()>;

    async fn create_sales_order(
        &self,
        org: &ZohoOrg,
        sales_order: &SalesOrderPayload,
    ) -> ZohoResult<SalesOrderRef>;

    async fn create_invoice_from_sales_order(
        &self,
        org: &ZohoOrg,
        salesorder_id: &str,
    ) -> ZohoResult<InvoiceRef>;

    async fn mark_invoice_sent(&self, org: &ZohoOrg, invoice_id: &str) -> ZohoResult<()>;

    /// `page` starts at 1.
    async fn list_items(&self, org: &ZohoOrg, page: u32) -> ZohoResult<ItemPage>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tradeflow_core::{OrderSource, OrderStatus, ZohoSyncStatus};

    fn branch() -> Branch {
        let now = Utc::now();
        Branch {
            id: "b1".into(),
            organization_id: "o1".into(),
            name: "Pune Depot".into(),
            code: "PUN".into(),
            contact_name: None,
            email: Some("pune@acme.in".into()),
            phone: None,
            address_line: None,
            city: Some("Pune".into()),
            state: None,
            postal_code: Some("411001".into()),
            country: None,
            tax_number: Some("27AAAPL1234C1ZV".into()),
            zoho_contact_id: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_contact_payload_from_branch() {
        let payload = ContactPayload::from_branch("Acme Hardware", &branch());
        assert_eq!(payload.contact_name, "Pune Depot (PUN)");
        assert_eq!(payload.company_name, "Acme Hardware");
        assert_eq!(payload.contact_persons.len(), 1);
        assert_eq!(payload.contact_persons[0].first_name, "pune@acme.in");

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["contact_type"], "customer");
        assert_eq!(json["billing_address"]["zip"], "411001");
        assert!(json["billing_address"].get("address").is_none());
        assert_eq!(json["gst_no"], "27AAAPL1234C1ZV");
    }

    #[test]
    fn test_sales_order_payload() {
        let now = Utc::now();
        let order = Order {
            id: "ord1".into(),
            organization_id: "o1".into(),
            branch_id: "b1".into(),
            user_id: "u1".into(),
            order_number: "ORD-20260105-ABC123".into(),
            status: OrderStatus::Pending,
            source: OrderSource::Cart,
            quotation_id: None,
            subtotal_cents: 2500,
            discount_cents: 125,
            tax_cents: 428,
            total_cents: 2803,
            notes: None,
            zoho_sales_order_id: None,
            zoho_sales_order_number: None,
            zoho_sync_status: ZohoSyncStatus::NotSynced,
            zoho_sync_error: None,
            zoho_synced_at: None,
            created_at: now,
            updated_at: now,
        };
        let item = OrderItem {
            id: "i1".into(),
            order_id: "ord1".into(),
            product_id: "p1".into(),
            sku_snapshot: "BOLT-M8".into(),
            name_snapshot: "Hex Bolt M8".into(),
            category_snapshot: None,
            unit_price_cents: 1250,
            quantity: 2,
            discount_cents: 125,
            tax_rate_bps: 1800,
            tax_cents: 428,
            line_total_cents: 2803,
        };

        let payload =
            SalesOrderPayload::from_order("c1", &order, &[item], &[Some("9001".to_string())]);
        assert_eq!(payload.reference_number, "ORD-20260105-ABC123");
        assert_eq!(payload.line_items[0].item_id.as_deref(), Some("9001"));
        assert_eq!(payload.line_items[0].rate, 12.5);
        assert_eq!(payload.line_items[0].discount, Some(1.25));
    }

    #[test]
    fn test_item_snapshot() {
        let item: ZohoItem = serde_json::from_str(
            r#"{"item_id":"9001","name":"Hex Bolt M8","sku":"","rate":12.5,
                "status":"active","tax_percentage":18,"stock_on_hand":40.0}"#,
        )
        .unwrap();
        assert!(item.is_active());
        let snapshot = item.to_snapshot();
        assert_eq!(snapshot.sku, None);
        assert_eq!(snapshot.rate_cents, 1250);
        assert_eq!(snapshot.tax_rate_bps, 1800);
        assert_eq!(snapshot.stock_on_hand, Some(40));
    }
}
