//! # Error Types
//!
//! Domain-specific error types for tradeflow-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  tradeflow-core (this file)                                             │
//! │  ├── CoreError        - Business rule violations                        │
//! │  └── ValidationError  - Input validation failures                       │
//! │                                                                         │
//! │  tradeflow-db        └── DbError     - Database operation failures      │
//! │  tradeflow-zoho      └── ZohoError   - Zoho API / OAuth failures        │
//! │  apps/api            └── ApiError    - JSON body + HTTP status          │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → ApiError → HTTP response           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Business rule violations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Product does not exist or is inactive.
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// Product exists but is not sellable (soft-deleted).
    #[error("Product {sku} is not available for ordering")]
    ProductUnavailable { sku: String },

    /// Not enough tracked stock to accept the quantity.
    ///
    /// ## When This Occurs
    /// - Product has `stock_quantity` set and the requested quantity exceeds it
    #[error("Insufficient stock for {sku}: available {available}, requested {requested}")]
    InsufficientStock {
        sku: String,
        available: i64,
        requested: i64,
    },

    /// Quantity is below the product's minimum order quantity.
    #[error("Minimum order quantity for {sku} is {min}, requested {requested}")]
    BelowMinimumQuantity { sku: String, min: i64, requested: i64 },

    /// Quantity exceeds the product's (or the global) maximum.
    #[error("Quantity {requested} exceeds maximum allowed ({max})")]
    QuantityTooLarge { requested: i64, max: i64 },

    /// Cart has too many distinct lines.
    #[error("Cart cannot have more than {max} items")]
    CartTooLarge { max: usize },

    /// Checkout or quotation attempted on an empty cart.
    #[error("Cart is empty")]
    EmptyCart,

    /// A branch is required (checkout, quotations) but none was chosen.
    #[error("A branch must be selected")]
    BranchRequired,

    /// Entity is not in a state that allows the requested change.
    ///
    /// ## When This Occurs
    /// - Approving a quotation that was never sent
    /// - Shipping a cancelled order
    #[error("{entity} cannot move from {from} to {to}")]
    InvalidStatusTransition {
        entity: &'static str,
        from: String,
        to: String,
    },

    /// Quotation validity date has passed.
    #[error("Quotation {0} has expired")]
    QuotationExpired(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors, raised before any business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{field} is required")]
    Required { field: String },

    #[error("{field} must be at least {min} characters")]
    TooShort { field: String, min: usize },

    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    #[error("{field} must be positive")]
    MustBePositive { field: String },

    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },

    #[error("{field} '{value}' already exists")]
    Duplicate { field: String, value: String },
}

impl ValidationError {
    /// Shorthand for a `Required` error.
    pub fn required(field: impl Into<String>) -> Self {
        ValidationError::Required {
            field: field.into(),
        }
    }

    /// Shorthand for an `InvalidFormat` error.
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError::InvalidFormat {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::BelowMinimumQuantity {
            sku: "BOLT-M8".to_string(),
            min: 50,
            requested: 10,
        };
        assert_eq!(
            err.to_string(),
            "Minimum order quantity for BOLT-M8 is 50, requested 10"
        );

        let err = CoreError::InvalidStatusTransition {
            entity: "Order",
            from: "cancelled".to_string(),
            to: "shipped".to_string(),
        };
        assert_eq!(err.to_string(), "Order cannot move from cancelled to shipped");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let core_err: CoreError = ValidationError::required("sku").into();
        assert!(matches!(core_err, CoreError::Validation(_)));
        assert_eq!(core_err.to_string(), "Validation error: sku is required");
    }
}
