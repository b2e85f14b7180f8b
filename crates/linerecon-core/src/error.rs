//! # Error Types
//!
//! Domain-specific error types for linerecon-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  linerecon-core errors (this file)                                     │
//! │  ├── CoreError        - Row-level and domain failures                  │
//! │  └── ValidationError  - Field/identifier validation failures           │
//! │                                                                         │
//! │  linerecon-db errors (separate crate)                                  │
//! │  └── DbError          - Store failures, SourceUnavailable              │
//! │                                                                         │
//! │  recon-runner errors (app)                                             │
//! │  └── PipelineError    - Which stage failed, and why                    │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → PipelineError           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A `MalformedRow` never aborts a batch: the stage that hits it skips the
//! row and logs a warning. Everything else propagates.

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core reconciliation errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A single row failed a required-field check.
    ///
    /// ## When This Occurs
    /// - A storefront line has no order name, SKU or line item id
    /// - A stored merged/aging row lost one of its key columns
    ///
    /// Callers skip the row and keep going.
    #[error("Malformed {table} row: {reason}")]
    MalformedRow { table: String, reason: String },

    /// A table schema definition is inconsistent.
    #[error("Invalid schema for {table}: {reason}")]
    InvalidSchema { table: String, reason: String },

    /// Validation error (wraps ValidationError, reachable via `source()`).
    #[error("Validation error")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Creates a MalformedRow error for the given table.
    pub fn malformed(table: impl Into<String>, reason: impl Into<String>) -> Self {
        CoreError::MalformedRow {
            table: table.into(),
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Field and identifier validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or blank.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Invalid format (e.g., a column name with a control character in it).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Duplicate value (e.g., the same column declared twice).
    #[error("{field} '{value}' already exists")]
    Duplicate { field: String, value: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

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
        let err = CoreError::malformed("shop_open_lines", "shop_sku is required");
        assert_eq!(
            err.to_string(),
            "Malformed shop_open_lines row: shop_sku is required"
        );
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "shop_order_name".to_string(),
        };
        assert_eq!(err.to_string(), "shop_order_name is required");

        let err = ValidationError::Duplicate {
            field: "column".to_string(),
            value: "shop_sku".to_string(),
        };
        assert_eq!(err.to_string(), "column 'shop_sku' already exists");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "shop_sku".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
        assert_eq!(core_err.to_string(), "Validation error");
        assert_eq!(
            std::error::Error::source(&core_err).map(|e| e.to_string()),
            Some("shop_sku is required".to_string())
        );
    }
}
