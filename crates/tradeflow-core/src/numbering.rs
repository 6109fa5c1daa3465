//! Human-readable document numbers.
//!
//! `PREFIX-YYYYMMDD-XXXXXX`, where the suffix is the first six hex characters of
//! a random v4 UUID, uppercased. The UUID `id` stays the real key; numbers exist
//! for people and for Zoho's `reference_number`.

use chrono::{DateTime, Utc};
use uuid::Uuid;

pub const ORDER_PREFIX: &str = "ORD";
pub const QUOTATION_PREFIX: &str = "QT";
pub const INVOICE_PREFIX: &str = "INV";

pub fn order_number(at: DateTime<Utc>) -> String {
    document_number(ORDER_PREFIX, at)
}

pub fn quotation_number(at: DateTime<Utc>) -> String {
    document_number(QUOTATION_PREFIX, at)
}

pub fn invoice_number(at: DateTime<Utc>) -> String {
    document_number(INVOICE_PREFIX, at)
}

fn document_number(prefix: &str, at: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!(
        "{}-{}-{}",
        prefix,
        at.format("%Y%m%d"),
        suffix[..6].to_ascii_uppercase()
    )
}
