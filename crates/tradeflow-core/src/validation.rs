//! # Validation Module
//!
//! Input validation utilities for Tradeflow.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: HTTP extractor (axum Json / Query)                            │
//! │  └── Type validation (deserialization)                                  │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Route handler                                                 │
//! │  └── THIS MODULE: field rules, quantity bounds                          │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                             │
//! │  ├── UNIQUE (organization_id, sku) / (organization_id, slug)            │
//! │  └── Foreign key constraints                                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use tradeflow_core::validation::{validate_sku, validate_quantity};
//!
//! validate_sku("BOLT-M8").unwrap();
//! validate_quantity(50, 10, None).unwrap();
//! ```

use crate::error::ValidationError;
use crate::{MAX_CART_ITEMS, MAX_ITEM_QUANTITY};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a SKU (Stock Keeping Unit).
///
/// ## Rules
/// - 1 to 50 characters after trimming
/// - Letters, digits, hyphens and underscores only
///
/// ## Example
/// ```rust
/// use tradeflow_core::validation::validate_sku;
///
/// assert!(validate_sku("BOLT-M8").is_ok());
/// assert!(validate_sku("").is_err());
/// assert!(validate_sku("BOLT M8").is_err());
/// ```
pub fn validate_sku(sku: &str) -> ValidationResult<()> {
    let sku = sku.trim();

    if sku.is_empty() {
        return Err(ValidationError::required("sku"));
    }

    if sku.len() > 50 {
        return Err(ValidationError::TooLong {
            field: "sku".to_string(),
            max: 50,
        });
    }

    if !sku
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::invalid(
            "sku",
            "must contain only letters, numbers, hyphens, and underscores",
        ));
    }

    Ok(())
}

/// Validates a URL slug: lowercase ASCII letters and digits separated by single
/// hyphens, at most 100 characters.
pub fn validate_slug(slug: &str) -> ValidationResult<()> {
    if slug.is_empty() {
        return Err(ValidationError::required("slug"));
    }

    if slug.len() > 100 {
        return Err(ValidationError::TooLong {
            field: "slug".to_string(),
            max: 100,
        });
    }

    let allowed = slug
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if !allowed || slug.starts_with('-') || slug.ends_with('-') || slug.contains("--") {
        return Err(ValidationError::invalid(
            "slug",
            "use lowercase letters and digits separated by single hyphens",
        ));
    }

    Ok(())
}

/// Derives a slug from a display name.
///
/// ## Example
/// ```rust
/// use tradeflow_core::validation::slugify;
///
/// assert_eq!(slugify("Hex Bolt  M8 (Zinc)"), "hex-bolt-m8-zinc");
/// ```
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_hyphen = false;

    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_hyphen = true;
        }
    }

    slug.truncate(100);
    slug.trim_end_matches('-').to_string()
}

/// Validates a required free-text field (names, titles).
pub fn validate_name(field: &str, value: &str, max: usize) -> ValidationResult<()> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::required(field));
    }

    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }

    Ok(())
}

/// Light structural check: one `@`, non-empty local part, dotted domain.
pub fn validate_email(email: &str) -> ValidationResult<()> {
    let email = email.trim();

    if email.is_empty() {
        return Err(ValidationError::required("email"));
    }

    if email.len() > 254 {
        return Err(ValidationError::TooLong {
            field: "email".to_string(),
            max: 254,
        });
    }

    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };

    if !valid {
        return Err(ValidationError::invalid("email", "not a valid email address"));
    }

    Ok(())
}

pub fn validate_password(password: &str) -> ValidationResult<()> {
    if password.chars().count() < 8 {
        return Err(ValidationError::TooShort {
            field: "password".to_string(),
            min: 8,
        });
    }
    Ok(())
}

/// ISO 4217: exactly three uppercase ASCII letters.
pub fn validate_currency_code(code: &str) -> ValidationResult<()> {
    if code.len() != 3 || !code.chars().all(|c| c.is_ascii_uppercase()) {
        return Err(ValidationError::invalid(
            "currency_code",
            "must be a three-letter ISO 4217 code",
        ));
    }
    Ok(())
}

pub fn validate_uuid(field: &str, value: &str) -> ValidationResult<()> {
    uuid::Uuid::parse_str(value)
        .map(|_| ())
        .map_err(|_| ValidationError::invalid(field, "must be a UUID"))
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a line quantity.
///
/// ## Rules
/// - Must be positive
/// - Must be at least `min` (product minimum order quantity)
/// - Must not exceed `max` when given, nor `MAX_ITEM_QUANTITY`
///
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  qty <= 0              → MustBePositive                                 │
/// │  qty > ceiling         → OutOfRange { min, max: ceiling }               │
/// │  qty < min             → OutOfRange { min, max: ceiling }               │
/// │  otherwise             → Ok                                             │
/// │                                                                         │
/// │  ceiling = min(max.unwrap_or(MAX_ITEM_QUANTITY), MAX_ITEM_QUANTITY)     │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
pub fn validate_quantity(qty: i64, min: i64, max: Option<i64>) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    let ceiling = max.unwrap_or(MAX_ITEM_QUANTITY).min(MAX_ITEM_QUANTITY);
    let floor = min.max(1);

    if qty < floor || qty > ceiling {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: floor,
            max: ceiling,
        });
    }

    Ok(())
}

/// Validates a price in minor units. Zero is allowed (samples, free items).
pub fn validate_price_cents(cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::OutOfRange {
            field: "price".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }
    Ok(())
}

/// Tax rate in basis points: 0% to 100%.
pub fn validate_tax_rate_bps(bps: u32) -> ValidationResult<()> {
    if bps > 10_000 {
        return Err(ValidationError::OutOfRange {
            field: "tax_rate_bps".to_string(),
            min: 0,
            max: 10_000,
        });
    }
    Ok(())
}

/// Discount in basis points: 0% to 100%.
pub fn validate_discount_bps(bps: u32) -> ValidationResult<()> {
    if bps > 10_000 {
        return Err(ValidationError::OutOfRange {
            field: "discount_bps".to_string(),
            min: 0,
            max: 10_000,
        });
    }
    Ok(())
}

/// Validates that adding one more distinct line keeps the cart within limits.
pub fn validate_cart_size(current_lines: usize) -> ValidationResult<()> {
    if current_lines >= MAX_CART_ITEMS {
        return Err(ValidationError::OutOfRange {
            field: "cart items".to_string(),
            min: 0,
            max: MAX_CART_ITEMS as i64,
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_sku() {
        assert!(validate_sku("BOLT-M8").is_ok());
        assert!(validate_sku("pipe_20mm").is_ok());
        assert!(validate_sku("  ").is_err());
        assert!(validate_sku(&"A".repeat(51)).is_err());
        assert!(validate_sku("BOLT/M8").is_err());
    }

    #[test]
    fn test_validate_slug() {
        assert!(validate_slug("hex-bolt-m8").is_ok());
        assert!(validate_slug("Hex-Bolt").is_err());
        assert!(validate_slug("-bolt").is_err());
        assert!(validate_slug("bolt--m8").is_err());
        assert!(validate_slug("").is_err());
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Acme Hardware Ltd."), "acme-hardware-ltd");
        assert_eq!(slugify("  PVC Pipe 20mm / Grey "), "pvc-pipe-20mm-grey");
        assert_eq!(slugify("***"), "");
        assert!(validate_slug(&slugify("Cement (50 kg) Bag")).is_ok());
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("buyer@acme.in").is_ok());
        assert!(validate_email("buyer@acme").is_err());
        assert!(validate_email("buyer.acme.in").is_err());
        assert!(validate_email("a@@acme.in").is_err());
        assert!(validate_email("a b@acme.in").is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1, 1, None).is_ok());
        assert!(validate_quantity(MAX_ITEM_QUANTITY, 1, None).is_ok());
        assert!(validate_quantity(0, 1, None).is_err());
        assert!(validate_quantity(MAX_ITEM_QUANTITY + 1, 1, None).is_err());

        // min / max from the product
        assert!(validate_quantity(5, 10, None).is_err());
        assert!(validate_quantity(60, 10, Some(50)).is_err());
        assert!(validate_quantity(50, 10, Some(50)).is_ok());

        // a product max above the global ceiling is clamped
        assert!(validate_quantity(MAX_ITEM_QUANTITY + 1, 1, Some(i64::MAX)).is_err());
    }

    #[test]
    fn test_validate_rates() {
        assert!(validate_tax_rate_bps(1800).is_ok());
        assert!(validate_tax_rate_bps(10_001).is_err());
        assert!(validate_discount_bps(10_000).is_ok());
        assert!(validate_price_cents(0).is_ok());
        assert!(validate_price_cents(-1).is_err());
    }

    #[test]
    fn test_misc() {
        assert!(validate_currency_code("INR").is_ok());
        assert!(validate_currency_code("inr").is_err());
        assert!(validate_password("short").is_err());
        assert!(validate_password("long enough").is_ok());
        assert!(validate_uuid("id", "00000000-0000-0000-0000-000000000001").is_ok());
        assert!(validate_uuid("id", "nope").is_err());
        assert!(validate_name("name", "Main Branch", 100).is_ok());
        assert!(validate_name("name", " ", 100).is_err());
    }

    #[test]
    fn test_validate_cart_size() {
        assert!(validate_cart_size(0).is_ok());
        assert!(validate_cart_size(MAX_CART_ITEMS - 1).is_ok());
        assert!(validate_cart_size(MAX_CART_ITEMS).is_err());
    }
}
