//! # Validation Module
//!
//! Input validation for values that end up as SQL identifiers or key
//! components.
//!
//! ## Identifiers
//! Source tables are produced by external collaborators and their column
//! names (CSV headers such as `Qty Open`) flow straight into
//! `CREATE`/`ALTER TABLE` statements of the recon store. Every statement
//! quotes them with [`crate::schema::quote_ident`], so spaces and
//! punctuation are kept as-is. Only names SQLite cannot store are refused.
//!
//! ## Usage
//! ```rust
//! use linerecon_core::validation::{validate_column_name, validate_key_component};
//!
//! assert!(validate_column_name("erp_warehouse_status").is_ok());
//! assert!(validate_key_component("shop_sku", "  ").is_err());
//! ```

use crate::error::ValidationError;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// SQLite has no practical identifier limit; this keeps DDL readable.
pub const MAX_COLUMN_NAME_LEN: usize = 128;

// =============================================================================
// Identifier Validators
// =============================================================================

/// Validates a column name destined for the recon store.
///
/// ## Rules
/// - Must not be empty
/// - At most [`MAX_COLUMN_NAME_LEN`] characters
/// - No control characters (NUL ends an identifier inside SQLite)
///
/// ## Example
/// ```rust
/// use linerecon_core::validation::validate_column_name;
///
/// assert!(validate_column_name("oms_fulfillment_id").is_ok());
/// assert!(validate_column_name("erp_Qty Open").is_ok());
/// assert!(validate_column_name("").is_err());
/// ```
pub fn validate_column_name(name: &str) -> ValidationResult<()> {
    if name.is_empty() {
        return Err(ValidationError::Required {
            field: "column name".to_string(),
        });
    }

    if name.len() > MAX_COLUMN_NAME_LEN {
        return Err(ValidationError::TooLong {
            field: format!("column '{}'", name),
            max: MAX_COLUMN_NAME_LEN,
        });
    }

    if name.chars().any(char::is_control) {
        return Err(ValidationError::InvalidFormat {
            field: format!("column '{}'", name.escape_debug()),
            reason: "must not contain control characters".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Key Validators
// =============================================================================

/// Validates one component of a line key and returns it trimmed.
///
/// Blank and whitespace-only values count as absent.
pub fn validate_key_component<'a>(field: &str, value: &'a str) -> ValidationResult<&'a str> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    Ok(value)
}

/// Returns `value` trimmed, or `None` when it is absent or blank.
pub fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

// =============================================================================
// Unit Tests
// =============================================================================
