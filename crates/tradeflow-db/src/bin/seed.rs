//! # Seed Data Generator
//!
//! Creates a demo organization with an admin, two branches and a small
//! hardware catalog so the API can be exercised locally.
//!
//! ## Usage
//! ```bash
//! cargo run -p tradeflow-db --bin seed
//!
//! # Custom database and admin password
//! cargo run -p tradeflow-db --bin seed -- --db ./data/tradeflow.db --password s3cret-pass
//! ```
//!
//! The run is skipped when the demo organization already exists.

use anyhow::{bail, Context};
use argon2::password_hash::{rand_core::OsRng, PasswordHasher, SaltString};
use argon2::Argon2;
use chrono::Utc;
use std::env;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use tradeflow_core::validation::slugify;
use tradeflow_core::{Branch, Organization, Product, User, UserRole};
use tradeflow_db::{Database, DbConfig};

const DEMO_SLUG: &str = "demo-hardware";

/// (category, sku prefix, items as (name, price in cents, unit))
const CATALOG: &[(&str, &str, &[(&str, i64, &str)])] = &[
    (
        "Fasteners",
        "FST",
        &[
            ("Hex Bolt M6", 450, "box"),
            ("Hex Bolt M8", 650, "box"),
            ("Hex Bolt M10", 900, "box"),
            ("Hex Nut M8", 300, "box"),
            ("Washer M8", 150, "box"),
            ("Wood Screw 40mm", 520, "box"),
        ],
    ),
    (
        "Pipes",
        "PIP",
        &[
            ("PVC Pipe 20mm", 9900, "length"),
            ("PVC Pipe 25mm", 12900, "length"),
            ("PVC Elbow 20mm", 1400, "pcs"),
            ("PVC Tee 20mm", 1600, "pcs"),
        ],
    ),
    (
        "Electrical",
        "ELC",
        &[
            ("Copper Wire 1.5mm", 189900, "coil"),
            ("Copper Wire 2.5mm", 279900, "coil"),
            ("Modular Switch 6A", 8900, "pcs"),
            ("LED Bulb 9W", 11900, "pcs"),
        ],
    ),
    (
        "Tools",
        "TLS",
        &[
            ("Claw Hammer", 34900, "pcs"),
            ("Screwdriver Set", 59900, "set"),
            ("Measuring Tape 5m", 19900, "pcs"),
        ],
    ),
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = env::args().collect();
    let mut db_path = String::from("./tradeflow_dev.db");
    let mut password = String::from("tradeflow-admin");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--password" | "-p" => {
                if i + 1 < args.len() {
                    password = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Tradeflow Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>          Database file path (default: ./tradeflow_dev.db)");
                println!("  -p, --password <PASS>    Admin password (default: tradeflow-admin)");
                println!("  -h, --help               Show this help message");
                return Ok(());
            }
            other => bail!("unknown argument: {other}"),
        }
        i += 1;
    }

    let db = Database::new(DbConfig::new(&db_path))
        .await
        .with_context(|| format!("opening {db_path}"))?;
    info!(path = %db_path, "Connected, migrations applied");

    if db.organizations().get_by_slug(DEMO_SLUG).await?.is_some() {
        warn!(slug = DEMO_SLUG, "Demo organization already exists, skipping seed");
        return Ok(());
    }

    let now = Utc::now();
    let org = Organization {
        id: Uuid::new_v4().to_string(),
        name: "Demo Hardware Traders".to_string(),
        slug: DEMO_SLUG.to_string(),
        currency_code: "INR".to_string(),
        zoho_organization_id: None,
        is_active: true,
        created_at: now,
        updated_at: now,
    };
    db.organizations().insert(&org).await?;

    let admin = User {
        id: Uuid::new_v4().to_string(),
        organization_id: org.id.clone(),
        email: "admin@demo-hardware.in".to_string(),
        name: "Demo Admin".to_string(),
        role: UserRole::Admin,
        password_hash: hash_password(&password)?,
        is_active: true,
        created_at: now,
    };
    db.users().insert(&admin).await?;

    for (name, code, city) in [("Head Office", "HO", "Mumbai"), ("Pune Depot", "PUN", "Pune")] {
        let branch = Branch {
            id: Uuid::new_v4().to_string(),
            organization_id: org.id.clone(),
            name: name.to_string(),
            code: code.to_string(),
            contact_name: Some("Purchase Desk".to_string()),
            email: Some(format!("{}@demo-hardware.in", code.to_lowercase())),
            phone: None,
            address_line: None,
            city: Some(city.to_string()),
            state: Some("Maharashtra".to_string()),
            postal_code: None,
            country: Some("India".to_string()),
            tax_number: None,
            zoho_contact_id: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        db.branches().insert(&branch).await?;
    }

    let mut generated = 0usize;
    for (category, prefix, items) in CATALOG {
        for (index, (name, price_cents, unit)) in items.iter().enumerate() {
            let product = Product {
                id: Uuid::new_v4().to_string(),
                organization_id: org.id.clone(),
                sku: format!("{prefix}-{:03}", index + 1),
                slug: slugify(name),
                name: name.to_string(),
                description: None,
                category: Some(category.to_string()),
                unit: unit.to_string(),
                price_cents: *price_cents,
                tax_rate_bps: 1800,
                min_order_quantity: 1,
                max_order_quantity: None,
                stock_quantity: Some(((index + 1) * 50) as i64),
                zoho_item_id: None,
                is_active: true,
                created_at: now,
                updated_at: now,
            };
            if let Err(e) = db.products().insert(&product).await {
                warn!(sku = %product.sku, error = %e, "Failed to insert product");
                continue;
            }
            generated += 1;
        }
    }

    info!(
        organization = %org.slug,
        admin = %admin.email,
        products = generated,
        "Seed complete"
    );
    db.close().await;
    Ok(())
}

fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("hashing admin password: {e}"))?;
    Ok(hash.to_string())
}
