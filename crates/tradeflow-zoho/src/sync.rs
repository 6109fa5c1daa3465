//! # Order Synchronisation Pipeline
//!
//! Mirrors a local order into Zoho Books: the ordering branch becomes a
//! contact, the order becomes a sales order, and the sales order is invoiced.
//!
//! ## Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  sync_order(order_id)                                                   │
//! │                                                                         │
//! │  order ── already Synced? ──► return                                    │
//! │    │                                                                    │
//! │    ▼                                                                    │
//! │  ensure_contact(branch) ── no contact id ──► create + store             │
//! │    │                                                                    │
//! │    ▼                                                                    │
//! │  create_sales_order ── "contact does not exist" ──┐                     │
//! │    │                                              ▼                     │
//! │    │                           clear id, create contact, retry ONCE     │
//! │    ▼                                                                    │
//! │  record sales order id/number on the order                              │
//! │    │                                                                    │
//! │    ▼                                                                    │
//! │  invoice from sales order ─► local Invoice row (Draft) ─► mark sent     │
//! │    │                                                                    │
//! │    ▼                                                                    │
//! │  order.zoho_sync_status = Synced                                        │
//! │                                                                         │
//! │  Any failure: order.zoho_sync_status = Failed + message, error returned │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each step is skipped when its result is already stored, so a retry of a
//! half-finished order resumes where it stopped instead of creating a second
//! sales order or invoice. The invoice row is written before it is marked
//! sent; a retry only re-sends a stored draft.

use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::api::{ContactPayload, SalesOrderPayload, ZohoApi, ZohoOrg};
use crate::error::{ZohoError, ZohoResult};
use tradeflow_core::numbering;
use tradeflow_core::{Branch, Invoice, InvoiceStatus, Money, Order, Organization, ZohoSyncStatus};
use tradeflow_db::{Database, DbError, UpsertOutcome};

/// Upper bound on item pages fetched by one import.
const MAX_IMPORT_PAGES: u32 = 100;

/// Outcome of [`OrderSync::sync_pending`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct SyncReport {
    pub attempted: usize,
    pub synced: usize,
    pub failed: usize,
}

/// Outcome of [`OrderSync::import_products`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct ImportReport {
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
}

pub struct OrderSync<A: ZohoApi> {
    api: Arc<A>,
    db: Database,
}

impl<A: ZohoApi> OrderSync<A> {
    pub fn new(api: Arc<A>, db: Database) -> Self {
        OrderSync { api, db }
    }

    // =========================================================================
    // Contacts
    // =========================================================================

    /// Pushes the branch's current details to Zoho, creating the contact when
    /// the branch has none (or Zoho lost it). Returns the contact id.
    pub async fn sync_branch_contact(&self, branch_id: &str) -> ZohoResult<String> {
        let branch = self.load_branch(branch_id).await?;
        let org = self.load_organization(&branch.organization_id).await?;
        let zoho_org = ZohoOrg::from_organization(&org)?;
        let payload = ContactPayload::from_branch(&org.name, &branch);

        if let Some(contact_id) = branch.zoho_contact_id.as_deref() {
            match self.api.update_contact(&zoho_org, contact_id, &payload).await {
                Ok(()) => {
                    info!(branch_id = %branch.id, contact_id = %contact_id, "Branch contact updated in Zoho");
                    return Ok(contact_id.to_string());
                }
                // The contact is the only record this request references
                Err(e) if e.is_not_found() || e.is_missing_contact() => {
                    warn!(branch_id = %branch.id, contact_id = %contact_id, "Zoho lost the branch contact, recreating");
                    self.db.branches().set_zoho_contact_id(&branch.id, None).await?;
                }
                Err(e) => return Err(e),
            }
        }

        self.create_contact(&zoho_org, &org, &branch).await
    }

    /// Existing contact id of the branch, or a freshly created one.
    pub async fn ensure_contact(
        &self,
        zoho_org: &ZohoOrg,
        org: &Organization,
        branch: &Branch,
    ) -> ZohoResult<String> {
        match branch.zoho_contact_id.as_deref() {
            Some(contact_id) => Ok(contact_id.to_string()),
            None => self.create_contact(zoho_org, org, branch).await,
        }
    }

    async fn create_contact(
        &self,
        zoho_org: &ZohoOrg,
        org: &Organization,
        branch: &Branch,
    ) -> ZohoResult<String> {
        let payload = ContactPayload::from_branch(&org.name, branch);
        let contact_id = self.api.create_contact(zoho_org, &payload).await?;
        self.db
            .branches()
            .set_zoho_contact_id(&branch.id, Some(&contact_id))
            .await?;
        info!(branch_id = %branch.id, contact_id = %contact_id, "Branch linked to new Zoho contact");
        Ok(contact_id)
    }

    // =========================================================================
    // Orders
    // =========================================================================

    /// Runs the pipeline for one order and returns the order as stored
    /// afterwards. Failures are recorded on the order before being returned.
    pub async fn sync_order(&self, order_id: &str) -> ZohoResult<Order> {
        match self.try_sync_order(order_id).await {
            Ok(order) => Ok(order),
            Err(e) => {
                error!(order_id = %order_id, error = %e, "Zoho order sync failed");
                if let Err(record_err) = self.db.orders().record_zoho_failure(order_id, &e.to_string()).await {
                    if !record_err.is_not_found() {
                        warn!(order_id = %order_id, error = %record_err, "Could not record Zoho sync failure");
                    }
                }
                Err(e)
            }
        }
    }

    async fn try_sync_order(&self, order_id: &str) -> ZohoResult<Order> {
        let order = self.load_order(order_id).await?;
        if order.zoho_sync_status == ZohoSyncStatus::Synced {
            return Ok(order);
        }

        let org = self.load_organization(&order.organization_id).await?;
        let zoho_org = ZohoOrg::from_organization(&org)?;

        let salesorder_id = match order.zoho_sales_order_id.clone() {
            Some(id) => id,
            None => self.push_sales_order(&zoho_org, &org, &order).await?,
        };

        let invoice = match self.db.invoices().get_by_order(&order.id).await? {
            Some(invoice) => invoice,
            None => self.push_invoice(&zoho_org, &order, &salesorder_id).await?,
        };
        if invoice.status == InvoiceStatus::Draft {
            self.send_invoice(&zoho_org, &invoice).await?;
        }

        self.db.orders().mark_zoho_synced(&order.id).await?;
        info!(order_id = %order.id, order_number = %order.order_number, "Order synced to Zoho");
        self.load_order(order_id).await
    }

    /// Creates the sales order, recreating the branch contact once if Zoho no
    /// longer has it. Returns the sales order id.
    async fn push_sales_order(
        &self,
        zoho_org: &ZohoOrg,
        org: &Organization,
        order: &Order,
    ) -> ZohoResult<String> {
        let branch = self.load_branch(&order.branch_id).await?;
        let items = self.db.orders().items(&order.id).await?;

        let mut zoho_item_ids = Vec::with_capacity(items.len());
        for item in &items {
            let product = self.db.products().get_by_id(&item.product_id).await?;
            zoho_item_ids.push(product.and_then(|p| p.zoho_item_id));
        }

        let contact_id = self.ensure_contact(zoho_org, org, &branch).await?;
        let payload = SalesOrderPayload::from_order(&contact_id, order, &items, &zoho_item_ids);

        let created = match self.api.create_sales_order(zoho_org, &payload).await {
            Ok(created) => created,
            Err(e) if e.is_missing_contact() => {
                warn!(
                    order_id = %order.id,
                    contact_id = %contact_id,
                    "Zoho contact missing, recreating and retrying"
                );
                self.db.branches().set_zoho_contact_id(&branch.id, None).await?;
                let contact_id = self.create_contact(zoho_org, org, &branch).await?;
                let payload = SalesOrderPayload {
                    customer_id: contact_id,
                    ..payload
                };
                self.api.create_sales_order(zoho_org, &payload).await?
            }
            Err(e) => return Err(e),
        };

        self.db
            .orders()
            .record_zoho_sales_order(
                &order.id,
                &created.salesorder_id,
                created.salesorder_number.as_deref(),
            )
            .await?;
        info!(
            order_id = %order.id,
            salesorder_id = %created.salesorder_id,
            "Zoho sales order created"
        );
        Ok(created.salesorder_id)
    }

    /// Invoices the sales order in Zoho and stores the result straight away,
    /// in whatever status Zoho reports for the new invoice.
    async fn push_invoice(
        &self,
        zoho_org: &ZohoOrg,
        order: &Order,
        salesorder_id: &str,
    ) -> ZohoResult<Invoice> {
        let remote = self
            .api
            .create_invoice_from_sales_order(zoho_org, salesorder_id)
            .await?;

        let now = Utc::now();
        let status = InvoiceStatus::from_zoho(remote.status.as_deref().unwrap_or("draft"));
        let total_cents = remote
            .total
            .map(|t| Money::from_major_f64(t).cents())
            .unwrap_or(order.total_cents);
        let invoice = Invoice {
            id: Uuid::new_v4().to_string(),
            organization_id: order.organization_id.clone(),
            order_id: order.id.clone(),
            invoice_number: if remote.invoice_number.is_empty() {
                numbering::invoice_number(now)
            } else {
                remote.invoice_number.clone()
            },
            status,
            total_cents,
            balance_cents: remote
                .balance
                .map(|b| Money::from_major_f64(b).cents())
                .unwrap_or(total_cents),
            due_date: remote.due_date(),
            zoho_invoice_id: Some(remote.invoice_id.clone()),
            issued_at: (status != InvoiceStatus::Draft).then_some(now),
            created_at: now,
            updated_at: now,
        };
        self.db.invoices().insert(&invoice).await?;
        info!(
            order_id = %order.id,
            invoice_id = %remote.invoice_id,
            invoice_number = %invoice.invoice_number,
            status = status.as_str(),
            "Zoho invoice created"
        );
        Ok(invoice)
    }

    /// Marks a stored draft invoice as sent in Zoho, then locally.
    async fn send_invoice(&self, zoho_org: &ZohoOrg, invoice: &Invoice) -> ZohoResult<()> {
        let zoho_invoice_id = invoice
            .zoho_invoice_id
            .as_deref()
            .ok_or(ZohoError::MissingField("zoho_invoice_id"))?;

        self.api.mark_invoice_sent(zoho_org, zoho_invoice_id).await?;
        self.db
            .invoices()
            .set_status(&invoice.id, InvoiceStatus::Sent, invoice.balance_cents)
            .await?;
        info!(
            order_id = %invoice.order_id,
            invoice_id = %zoho_invoice_id,
            invoice_number = %invoice.invoice_number,
            "Zoho invoice issued"
        );
        Ok(())
    }

    /// Best-effort pass over unsynced and failed orders, oldest first.
    pub async fn sync_pending(&self, organization_id: &str, limit: i64) -> ZohoResult<SyncReport> {
        let pending = self.db.orders().pending_zoho_sync(organization_id, limit).await?;
        let mut report = SyncReport::default();

        for order in pending {
            report.attempted += 1;
            match self.sync_order(&order.id).await {
                Ok(_) => report.synced += 1,
                Err(_) => report.failed += 1,
            }
        }

        info!(
            organization_id = %organization_id,
            attempted = report.attempted,
            synced = report.synced,
            failed = report.failed,
            "Pending Zoho sync finished"
        );
        Ok(report)
    }

    // =========================================================================
    // Catalog import
    // =========================================================================

    /// Pages through Zoho items and creates or refreshes local products.
    /// Inactive items are skipped.
    pub async fn import_products(&self, organization_id: &str) -> ZohoResult<ImportReport> {
        let org = self.load_organization(organization_id).await?;
        let zoho_org = ZohoOrg::from_organization(&org)?;
        let mut report = ImportReport::default();

        for page in 1..=MAX_IMPORT_PAGES {
            let batch = self.api.list_items(&zoho_org, page).await?;

            for item in &batch.items {
                if !item.is_active() {
                    report.skipped += 1;
                    continue;
                }
                match self
                    .db
                    .products()
                    .upsert_from_zoho(organization_id, &item.to_snapshot())
                    .await
                {
                    Ok((_, UpsertOutcome::Created)) => report.created += 1,
                    Ok((_, UpsertOutcome::Updated)) => report.updated += 1,
                    Err(e @ DbError::UniqueViolation { .. }) => {
                        warn!(item_id = %item.item_id, error = %e, "Skipping Zoho item");
                        report.skipped += 1;
                    }
                    Err(e) => return Err(e.into()),
                }
            }

            if !batch.has_more_page {
                break;
            }
        }

        info!(
            organization_id = %organization_id,
            created = report.created,
            updated = report.updated,
            skipped = report.skipped,
            "Zoho product import finished"
        );
        Ok(report)
    }

    // =========================================================================
    // Loaders
    // =========================================================================

    async fn load_order(&self, id: &str) -> ZohoResult<Order> {
        self.db
            .orders()
            .get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Order", id).into())
    }

    async fn load_branch(&self, id: &str) -> ZohoResult<Branch> {
        self.db
            .branches()
            .get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Branch", id).into())
    }

    async fn load_organization(&self, id: &str) -> ZohoResult<Organization> {
        self.db
            .organizations()
            .get_by_id(id)
            .await?
            .ok_or_else(|| ZohoError::Db(DbError::not_found("Organization", id)))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{InvoiceRef, ItemPage, SalesOrderRef, ZohoItem};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tradeflow_core::{CartOwner, Product, User, UserRole};
    use tradeflow_db::{DbConfig, NewOrder};

    // -------------------------------------------------------------------------
    // Fake Zoho
    // -------------------------------------------------------------------------

    #[derive(Default)]
    struct FakeState {
        contacts_created: Vec<String>,
        contacts_updated: Vec<String>,
        sales_orders: Vec<SalesOrderPayload>,
        invoices_created: Vec<String>,
        invoices_sent: Vec<String>,
        /// `mark_invoice_sent` calls left to fail with a 503.
        mark_sent_failures: usize,
        /// New invoices come back already `sent`.
        invoices_auto_sent: bool,
        /// Contact ids Zoho claims not to know.
        unknown_contacts: Vec<String>,
        fail_sales_orders: bool,
        /// Sales orders are rejected for referencing an unknown item.
        stale_items: bool,
        item_pages: Vec<ItemPage>,
    }

    #[derive(Default)]
    struct FakeZoho {
        state: Mutex<FakeState>,
    }

    fn missing_contact() -> ZohoError {
        ZohoError::Api {
            code: 1002,
            message: "Contact does not exist.".to_string(),
        }
    }

    #[async_trait]
    impl ZohoApi for FakeZoho {
        async fn create_contact(&self, _org: &ZohoOrg, contact: &ContactPayload) -> ZohoResult<String> {
            let mut state = self.state.lock().unwrap();
            let id = format!("contact-{}", state.contacts_created.len() + 1);
            state.contacts_created.push(contact.contact_name.clone());
            Ok(id)
        }

        async fn update_contact(
            &self,
            _org: &ZohoOrg,
            contact_id: &str,
            _contact: &ContactPayload,
        ) -> ZohoResult<()> {
            let mut state = self.state.lock().unwrap();
            if state.unknown_contacts.iter().any(|c| c == contact_id) {
                return Err(missing_contact());
            }
            state.contacts_updated.push(contact_id.to_string());
            Ok(())
        }

        async fn create_sales_order(
            &self,
            _org: &ZohoOrg,
            sales_order: &SalesOrderPayload,
        ) -> ZohoResult<SalesOrderRef> {
            let mut state = self.state.lock().unwrap();
            if state.fail_sales_orders {
                return Err(ZohoError::Status {
                    status: 500,
                    body: "internal error".to_string(),
                });
            }
            if state.unknown_contacts.contains(&sales_order.customer_id) {
                return Err(missing_contact());
            }
            if state.stale_items {
                return Err(ZohoError::Api {
                    code: 1002,
                    message: "Item does not exist.".to_string(),
                });
            }
            state.sales_orders.push(sales_order.clone());
            let n = state.sales_orders.len();
            Ok(SalesOrderRef {
                salesorder_id: format!("so-{n}"),
                salesorder_number: Some(format!("SO-{n:05}")),
            })
        }

        async fn create_invoice_from_sales_order(
            &self,
            _org: &ZohoOrg,
            salesorder_id: &str,
        ) -> ZohoResult<InvoiceRef> {
            let mut state = self.state.lock().unwrap();
            state.invoices_created.push(salesorder_id.to_string());
            let n = state.invoices_created.len();
            let status = if state.invoices_auto_sent { "sent" } else { "draft" };
            Ok(InvoiceRef {
                invoice_id: format!("inv-{n}"),
                invoice_number: "INV-00001".to_string(),
                status: Some(status.to_string()),
                total: None,
                balance: None,
                due_date: Some("2026-02-15".to_string()),
            })
        }

        async fn mark_invoice_sent(&self, _org: &ZohoOrg, invoice_id: &str) -> ZohoResult<()> {
            let mut state = self.state.lock().unwrap();
            if state.mark_sent_failures > 0 {
                state.mark_sent_failures -= 1;
                return Err(ZohoError::Status {
                    status: 503,
                    body: "service unavailable".to_string(),
                });
            }
            state.invoices_sent.push(invoice_id.to_string());
            Ok(())
        }

        async fn list_items(&self, _org: &ZohoOrg, page: u32) -> ZohoResult<ItemPage> {
            let state = self.state.lock().unwrap();
            Ok(state
                .item_pages
                .get(page as usize - 1)
                .cloned()
                .unwrap_or_default())
        }
    }

    // -------------------------------------------------------------------------
    // Fixture
    // -------------------------------------------------------------------------

    struct Setup {
        db: Database,
        org: Organization,
        branch: Branch,
        product: Product,
        user: User,
    }

    async fn setup() -> Setup {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let now = Utc::now();

        let org = Organization {
            id: Uuid::new_v4().to_string(),
            name: "Acme Hardware".to_string(),
            slug: "acme".to_string(),
            currency_code: "INR".to_string(),
            zoho_organization_id: Some("60001".to_string()),
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        db.organizations().insert(&org).await.unwrap();

        let user = User {
            id: Uuid::new_v4().to_string(),
            organization_id: org.id.clone(),
            email: "buyer@acme.in".to_string(),
            name: "Buyer".to_string(),
            role: UserRole::Buyer,
            password_hash: "x".to_string(),
            is_active: true,
            created_at: now,
        };
        db.users().insert(&user).await.unwrap();

        let branch = Branch {
            id: Uuid::new_v4().to_string(),
            organization_id: org.id.clone(),
            name: "Main Store".to_string(),
            code: "MAIN".to_string(),
            contact_name: Some("Ravi".to_string()),
            email: Some("main@acme.in".to_string()),
            phone: None,
            address_line: None,
            city: Some("Mumbai".to_string()),
            state: None,
            postal_code: None,
            country: None,
            tax_number: None,
            zoho_contact_id: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        db.branches().insert(&branch).await.unwrap();

        let product = Product {
            id: Uuid::new_v4().to_string(),
            organization_id: org.id.clone(),
            sku: "BOLT-M8".to_string(),
            slug: "hex-bolt-m8".to_string(),
            name: "Hex Bolt M8".to_string(),
            description: None,
            category: Some("Fasteners".to_string()),
            unit: "box".to_string(),
            price_cents: 1250,
            tax_rate_bps: 1800,
            min_order_quantity: 1,
            max_order_quantity: None,
            stock_quantity: None,
            zoho_item_id: Some("9001".to_string()),
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        db.products().insert(&product).await.unwrap();

        Setup {
            db,
            org,
            branch,
            product,
            user,
        }
    }

    async fn place_order(s: &Setup) -> Order {
        let cart = s
            .db
            .carts()
            .get_or_create_active(&s.org.id, Some(&s.branch.id), &CartOwner::User(s.user.id.clone()))
            .await
            .unwrap();
        s.db.carts().upsert_item(&cart.id, &s.product, 2).await.unwrap();
        let new_order = NewOrder {
            organization_id: s.org.id.clone(),
            branch_id: s.branch.id.clone(),
            user_id: s.user.id.clone(),
            notes: None,
        };
        s.db.orders().create_from_cart(&cart.id, &new_order).await.unwrap().0
    }

    // -------------------------------------------------------------------------
    // Tests
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_sync_order_full_pipeline() {
        let s = setup().await;
        let order = place_order(&s).await;
        let fake = Arc::new(FakeZoho::default());
        let sync = OrderSync::new(fake.clone(), s.db.clone());

        let synced = sync.sync_order(&order.id).await.unwrap();
        assert_eq!(synced.zoho_sync_status, ZohoSyncStatus::Synced);
        assert_eq!(synced.zoho_sales_order_id.as_deref(), Some("so-1"));
        assert_eq!(synced.zoho_sales_order_number.as_deref(), Some("SO-00001"));

        let branch = s.db.branches().get_by_id(&s.branch.id).await.unwrap().unwrap();
        assert_eq!(branch.zoho_contact_id.as_deref(), Some("contact-1"));

        let invoice = s.db.invoices().get_by_order(&order.id).await.unwrap().unwrap();
        assert_eq!(invoice.status, InvoiceStatus::Sent);
        assert_eq!(invoice.total_cents, order.total_cents);
        assert_eq!(invoice.zoho_invoice_id.as_deref(), Some("inv-1"));
        assert!(invoice.due_date.is_some());
        assert!(invoice.issued_at.is_some());

        {
            let state = fake.state.lock().unwrap();
            assert_eq!(state.sales_orders.len(), 1);
            let payload = &state.sales_orders[0];
            assert_eq!(payload.customer_id, "contact-1");
            assert_eq!(payload.reference_number, order.order_number);
            assert_eq!(payload.line_items[0].item_id.as_deref(), Some("9001"));
            assert_eq!(state.invoices_created, vec!["so-1".to_string()]);
            assert_eq!(state.invoices_sent, vec!["inv-1".to_string()]);
        }

        // Second run is a no-op
        sync.sync_order(&order.id).await.unwrap();
        assert_eq!(fake.state.lock().unwrap().sales_orders.len(), 1);
    }

    #[tokio::test]
    async fn test_retry_after_send_failure_reuses_invoice() {
        let s = setup().await;
        let order = place_order(&s).await;
        let fake = Arc::new(FakeZoho::default());
        fake.state.lock().unwrap().mark_sent_failures = 1;
        let sync = OrderSync::new(fake.clone(), s.db.clone());

        let err = sync.sync_order(&order.id).await.unwrap_err();
        assert!(err.is_transient());
        let draft = s.db.invoices().get_by_order(&order.id).await.unwrap().unwrap();
        assert_eq!(draft.status, InvoiceStatus::Draft);
        assert_eq!(draft.zoho_invoice_id.as_deref(), Some("inv-1"));
        assert!(draft.issued_at.is_none());

        let synced = sync.sync_order(&order.id).await.unwrap();
        assert_eq!(synced.zoho_sync_status, ZohoSyncStatus::Synced);

        let invoice = s.db.invoices().get_by_order(&order.id).await.unwrap().unwrap();
        assert_eq!(invoice.id, draft.id);
        assert_eq!(invoice.status, InvoiceStatus::Sent);
        assert!(invoice.issued_at.is_some());

        let state = fake.state.lock().unwrap();
        assert_eq!(state.sales_orders.len(), 1);
        assert_eq!(state.invoices_created.len(), 1);
        assert_eq!(state.invoices_sent, vec!["inv-1".to_string()]);
    }

    #[tokio::test]
    async fn test_invoice_already_sent_by_zoho_is_not_resent() {
        let s = setup().await;
        let order = place_order(&s).await;

        let fake = Arc::new(FakeZoho::default());
        fake.state.lock().unwrap().invoices_auto_sent = true;
        let sync = OrderSync::new(fake.clone(), s.db.clone());
        sync.sync_order(&order.id).await.unwrap();

        let invoice = s.db.invoices().get_by_order(&order.id).await.unwrap().unwrap();
        assert_eq!(invoice.status, InvoiceStatus::Sent);
        assert!(invoice.issued_at.is_some());
        assert!(fake.state.lock().unwrap().invoices_sent.is_empty());
    }

    #[tokio::test]
    async fn test_missing_contact_is_recreated_once() {
        let s = setup().await;
        s.db
            .branches()
            .set_zoho_contact_id(&s.branch.id, Some("stale"))
            .await
            .unwrap();
        let order = place_order(&s).await;

        let fake = Arc::new(FakeZoho::default());
        fake.state.lock().unwrap().unknown_contacts.push("stale".to_string());
        let sync = OrderSync::new(fake.clone(), s.db.clone());

        let synced = sync.sync_order(&order.id).await.unwrap();
        assert_eq!(synced.zoho_sync_status, ZohoSyncStatus::Synced);

        let branch = s.db.branches().get_by_id(&s.branch.id).await.unwrap().unwrap();
        assert_eq!(branch.zoho_contact_id.as_deref(), Some("contact-1"));
        let state = fake.state.lock().unwrap();
        assert_eq!(state.contacts_created.len(), 1);
        assert_eq!(state.sales_orders[0].customer_id, "contact-1");
    }

    #[tokio::test]
    async fn test_stale_item_does_not_recreate_contact() {
        let s = setup().await;
        s.db
            .branches()
            .set_zoho_contact_id(&s.branch.id, Some("contact-7"))
            .await
            .unwrap();
        let order = place_order(&s).await;

        let fake = Arc::new(FakeZoho::default());
        fake.state.lock().unwrap().stale_items = true;
        let sync = OrderSync::new(fake.clone(), s.db.clone());

        let err = sync.sync_order(&order.id).await.unwrap_err();
        assert!(err.is_not_found());

        let branch = s.db.branches().get_by_id(&s.branch.id).await.unwrap().unwrap();
        assert_eq!(branch.zoho_contact_id.as_deref(), Some("contact-7"));
        assert!(fake.state.lock().unwrap().contacts_created.is_empty());
    }

    #[tokio::test]
    async fn test_failure_is_recorded_and_retried_by_sync_pending() {
        let s = setup().await;
        let order = place_order(&s).await;
        let fake = Arc::new(FakeZoho::default());
        fake.state.lock().unwrap().fail_sales_orders = true;
        let sync = OrderSync::new(fake.clone(), s.db.clone());

        let err = sync.sync_order(&order.id).await.unwrap_err();
        assert!(err.is_transient());
        let failed = s.db.orders().get_by_id(&order.id).await.unwrap().unwrap();
        assert_eq!(failed.zoho_sync_status, ZohoSyncStatus::Failed);
        assert!(failed.zoho_sync_error.unwrap().contains("500"));

        let report = sync.sync_pending(&s.org.id, 10).await.unwrap();
        assert_eq!(report, SyncReport { attempted: 1, synced: 0, failed: 1 });

        fake.state.lock().unwrap().fail_sales_orders = false;
        let report = sync.sync_pending(&s.org.id, 10).await.unwrap();
        assert_eq!(report, SyncReport { attempted: 1, synced: 1, failed: 0 });
        assert!(s.db.orders().pending_zoho_sync(&s.org.id, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_organization_without_zoho_id_fails() {
        let s = setup().await;
        s.db
            .organizations()
            .set_zoho_organization_id(&s.org.id, None)
            .await
            .unwrap();
        let order = place_order(&s).await;
        let sync = OrderSync::new(Arc::new(FakeZoho::default()), s.db.clone());

        let err = sync.sync_order(&order.id).await.unwrap_err();
        assert!(matches!(err, ZohoError::MissingField("zoho_organization_id")));
    }

    #[tokio::test]
    async fn test_sync_branch_contact() {
        let s = setup().await;
        let fake = Arc::new(FakeZoho::default());
        let sync = OrderSync::new(fake.clone(), s.db.clone());

        // First push creates
        let id = sync.sync_branch_contact(&s.branch.id).await.unwrap();
        assert_eq!(id, "contact-1");
        // Second push updates
        let id = sync.sync_branch_contact(&s.branch.id).await.unwrap();
        assert_eq!(id, "contact-1");
        assert_eq!(fake.state.lock().unwrap().contacts_updated, vec!["contact-1".to_string()]);

        // Zoho lost it: recreated
        fake.state.lock().unwrap().unknown_contacts.push("contact-1".to_string());
        let id = sync.sync_branch_contact(&s.branch.id).await.unwrap();
        assert_eq!(id, "contact-2");
    }

    #[tokio::test]
    async fn test_import_products() {
        let s = setup().await;
        let item = |id: &str, sku: Option<&str>, name: &str, status: &str| ZohoItem {
            item_id: id.to_string(),
            name: name.to_string(),
            sku: sku.map(str::to_string),
            description: None,
            rate: 15.0,
            unit: Some("box".to_string()),
            status: Some(status.to_string()),
            tax_percentage: Some(18.0),
            stock_on_hand: None,
        };

        let fake = Arc::new(FakeZoho::default());
        fake.state.lock().unwrap().item_pages = vec![
            ItemPage {
                items: vec![
                    item("9001", Some("BOLT-M8"), "Hex Bolt M8", "active"),
                    item("9002", None, "Hex Nut M8", "active"),
                ],
                has_more_page: true,
            },
            ItemPage {
                items: vec![item("9003", Some("OLD-1"), "Retired Item", "inactive")],
                has_more_page: false,
            },
        ];
        let sync = OrderSync::new(fake, s.db.clone());

        let report = sync.import_products(&s.org.id).await.unwrap();
        assert_eq!(report, ImportReport { created: 1, updated: 1, skipped: 1 });

        let bolt = s.db.products().get_by_id(&s.product.id).await.unwrap().unwrap();
        assert_eq!(bolt.price_cents, 1500);
        let nut = s.db.products().get_by_sku(&s.org.id, "ZOHO-9002").await.unwrap();
        assert!(nut.is_some());
    }
}
