//! Input validation for the facade endpoints. Requests that fail here are
//! rejected locally and never reach a backend.

use serde_json::{Map, Value};

use crate::envelope::ErrorInfo;

pub type JsonObject = Map<String, Value>;

/// Validate a cart item add payload.
///
/// `source` must be exactly `"shopify"` or `"external"`. External items must
/// carry an `externalId`; shopify items must carry a `variantId`.
pub fn validate_cart_item(body: &JsonObject) -> Result<(), ErrorInfo> {
    match body.get("source").and_then(Value::as_str) {
        Some("external") => {
            if !has_string(body, "externalId") {
                return Err(ErrorInfo::validation(
                    "externalId is required for external items",
                ));
            }
        }
        Some("shopify") => {
            if !has_string(body, "variantId") {
                return Err(ErrorInfo::validation(
                    "variantId is required for shopify items",
                ));
            }
        }
        _ => {
            return Err(ErrorInfo::validation(
                "source must be 'shopify' or 'external'",
            ));
        }
    }
    Ok(())
}

/// Require each named field to be present as a string, in order; the first
/// missing field wins.
pub fn require_string_fields(body: &JsonObject, fields: &[&str]) -> Result<(), ErrorInfo> {
    for field in fields {
        if !has_string(body, field) {
            return Err(ErrorInfo::validation(format!("{field} is required")));
        }
    }
    Ok(())
}

fn has_string(body: &JsonObject, key: &str) -> bool {
    matches!(body.get(key), Some(Value::String(_)))
}
