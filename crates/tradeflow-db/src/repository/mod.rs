//! # Repository Module
//!
//! Database repositories for Tradeflow, one per aggregate.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  HTTP handler / Zoho sync                                               │
//! │       │                                                                 │
//! │       │  db.orders().create_from_cart(&cart_id, &new_order)             │
//! │       ▼                                                                 │
//! │  OrderRepository ──┬── cart::items_in / mark_checked_out_in             │
//! │                    └── quotation::get_in / mark_converted_in            │
//! │       │                                                                 │
//! │       │  one transaction, one connection                                │
//! │       ▼                                                                 │
//! │  SQLite                                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Helpers suffixed `_in` take a `&mut SqliteConnection` so that a
//! transaction spanning several tables can reuse them. Public methods never
//! hold a connection while calling another pool-backed method.
//!
//! ## Available Repositories
//!
//! - [`OrganizationRepository`] - Tenants
//! - [`UserRepository`] - Sign-in accounts
//! - [`BranchRepository`] - Buying locations, Zoho contacts
//! - [`ProductRepository`] - Catalog, stock, Zoho item import
//! - [`CartRepository`] - Active carts and guest merge
//! - [`QuotationRepository`] - Priced proposals
//! - [`OrderRepository`] - Checkout, conversion, Zoho mirror fields, sales feed
//! - [`InvoiceRepository`] - Local invoice mirror
//! - [`ZohoConnectionRepository`] - OAuth tokens

pub mod branch;
pub mod cart;
pub mod invoice;
pub mod order;
pub mod organization;
pub mod product;
pub mod quotation;
pub mod user;
pub mod zoho_connection;

pub use branch::BranchRepository;
pub use cart::CartRepository;
pub use invoice::InvoiceRepository;
pub use order::{NewOrder, OrderFilter, OrderRepository};
pub use organization::OrganizationRepository;
pub use product::{ProductFilter, ProductRepository, UpsertOutcome, ZohoItemSnapshot};
pub use quotation::QuotationRepository;
pub use user::UserRepository;
pub use zoho_connection::ZohoConnectionRepository;

/// Builders shared by the repository tests.
#[cfg(test)]
pub(crate) mod test_support {
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    use crate::pool::{Database, DbConfig};
    use tradeflow_core::cart::{PricedLine, Totals};
    use tradeflow_core::numbering;
    use tradeflow_core::validation::slugify;
    use tradeflow_core::{
        Branch, Organization, Product, Quotation, QuotationItem, QuotationStatus, User, UserRole,
    };

    pub async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    pub fn new_organization(name: &str, slug: &str) -> Organization {
        let now = Utc::now();
        Organization {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            slug: slug.to_string(),
            currency_code: "INR".to_string(),
            zoho_organization_id: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub async fn seed_organization(db: &Database) -> Organization {
        let org = new_organization("Acme Hardware", "acme");
        db.organizations().insert(&org).await.unwrap();
        org
    }

    pub fn new_user(organization_id: &str, email: &str, role: UserRole) -> User {
        User {
            id: Uuid::new_v4().to_string(),
            organization_id: organization_id.to_string(),
            email: email.to_string(),
            name: "Test User".to_string(),
            role,
            password_hash: "$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA".to_string(),
            is_active: true,
            created_at: Utc::now(),
        }
    }

    pub fn new_branch(organization_id: &str, name: &str, code: &str) -> Branch {
        let now = Utc::now();
        Branch {
            id: Uuid::new_v4().to_string(),
            organization_id: organization_id.to_string(),
            name: name.to_string(),
            code: code.to_string(),
            contact_name: Some("Store Manager".to_string()),
            email: Some(format!("{}@acme.in", code.to_lowercase())),
            phone: None,
            address_line: Some("12 Market Road".to_string()),
            city: Some("Mumbai".to_string()),
            state: Some("Maharashtra".to_string()),
            postal_code: Some("400001".to_string()),
            country: Some("India".to_string()),
            tax_number: None,
            zoho_contact_id: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Active, untracked stock, 18% tax, minimum quantity 1.
    pub fn new_product(organization_id: &str, sku: &str, name: &str, price_cents: i64) -> Product {
        let now = Utc::now();
        Product {
            id: Uuid::new_v4().to_string(),
            organization_id: organization_id.to_string(),
            sku: sku.to_string(),
            slug: slugify(name),
            name: name.to_string(),
            description: None,
            category: None,
            unit: "pcs".to_string(),
            price_cents,
            tax_rate_bps: 1800,
            min_order_quantity: 1,
            max_order_quantity: None,
            stock_quantity: None,
            zoho_item_id: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub struct Fixture {
        pub db: Database,
        pub org: Organization,
        pub user: User,
        pub branch: Branch,
        pub product: Product,
    }

    /// Organization with one buyer, one branch and one product
    /// ("BOLT-M8", 12.50, category "Fasteners").
    pub async fn fixture() -> Fixture {
        let db = test_db().await;
        let org = seed_organization(&db).await;

        let user = new_user(&org.id, "buyer@acme.in", UserRole::Buyer);
        db.users().insert(&user).await.unwrap();

        let branch = new_branch(&org.id, "Main Store", "MAIN");
        db.branches().insert(&branch).await.unwrap();

        let mut product = new_product(&org.id, "BOLT-M8", "Hex Bolt M8", 1250);
        product.category = Some("Fasteners".to_string());
        db.products().insert(&product).await.unwrap();

        Fixture {
            db,
            org,
            user,
            branch,
            product,
        }
    }

    /// Draft quotation with one line of the fixture product at 5% discount.
    pub fn new_quotation(fx: &Fixture, quantity: i64) -> (Quotation, Vec<QuotationItem>) {
        let now = Utc::now();
        let quotation_id = Uuid::new_v4().to_string();
        let line = PricedLine::from_product(&fx.product, quantity).with_discount(500);
        let totals = Totals::from_lines(std::slice::from_ref(&line));

        let item = QuotationItem {
            id: Uuid::new_v4().to_string(),
            quotation_id: quotation_id.clone(),
            product_id: fx.product.id.clone(),
            sku_snapshot: fx.product.sku.clone(),
            name_snapshot: fx.product.name.clone(),
            unit_price_cents: fx.product.price_cents,
            quantity,
            discount_bps: 500,
            tax_rate_bps: fx.product.tax_rate_bps,
            line_total_cents: line.line_total().cents(),
        };

        let quotation = Quotation {
            id: quotation_id,
            organization_id: fx.org.id.clone(),
            branch_id: fx.branch.id.clone(),
            created_by: fx.user.id.clone(),
            quotation_number: numbering::quotation_number(now),
            status: QuotationStatus::Draft,
            subtotal_cents: totals.subtotal.cents(),
            discount_cents: totals.discount.cents(),
            tax_cents: totals.tax.cents(),
            total_cents: totals.total.cents(),
            valid_until: (now + Duration::days(30)).date_naive(),
            notes: None,
            order_id: None,
            created_at: now,
            updated_at: now,
        };

        (quotation, vec![item])
    }
}
