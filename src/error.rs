//! Error types for the table engine.
//!
//! Errors fall into two classes. Configuration errors mean the engine is
//! being driven incorrectly (unknown field type, reserved table name, missing
//! hook) and are returned to the caller as `Err`. Data errors (a value that
//! does not parse, a failed statement) are recorded on the [`Table`] as its
//! last error and the operation reports failure through its return value.
//!
//! [`Table`]: crate::table::Table

use thiserror::Error;

use crate::format::FormatError;

/// Error class, decides how an error propagates out of a table operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Defect in how the engine is driven. Propagated immediately.
    Config,
    /// Bad value or failed statement. Recorded and reported as failure.
    Data,
}

/// Engine error type.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The metadata table name cannot be used by callers.
    #[error("table name '{0}' is reserved")]
    ReservedTable(String),

    /// Create was called for an existing table without `open_if_exists`.
    #[error("table '{0}' already exists")]
    TableExists(String),

    /// The table does not exist.
    #[error("table '{0}' does not exist")]
    TableNotFound(String),

    /// Field type name not recognized by the field DSL.
    #[error("invalid type '{ty}' for field '{field}'")]
    UnknownFieldType { field: String, ty: String },

    /// Field DSL could not be parsed.
    #[error("invalid field specification: {0}")]
    InvalidFieldSpec(String),

    /// Field is not a column of the table.
    #[error("field '{field}' not found in table '{table}'")]
    FieldNotFound { table: String, field: String },

    /// Field is maintained by the engine and cannot be written.
    #[error("field '{0}' is read-only")]
    ReadOnlyField(String),

    /// Value variant cannot be stored in the field.
    #[error("field '{field}' expects {expected}, got {actual}")]
    TypeMismatch {
        field: String,
        expected: &'static str,
        actual: &'static str,
    },

    /// Display template rejected when it was set.
    #[error("invalid template '{template}': {reason}")]
    InvalidTemplate { template: String, reason: String },

    /// No hook registered under the name.
    #[error("hook '{0}' is not registered")]
    HookNotFound(String),

    /// Hook body returned an error.
    #[error("hook '{name}' failed: {source}")]
    Hook {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    /// A schema change could not be applied and was rolled back.
    #[error("schema change on '{table}' failed: {source}")]
    Schema {
        table: String,
        #[source]
        source: rusqlite::Error,
    },

    /// Primary key lookup failed after a write.
    #[error("row {id} not found in table '{table}'")]
    RowNotFound { table: String, id: i64 },

    /// Value conversion failed.
    #[error(transparent)]
    Format(#[from] FormatError),

    /// Filter expression operand could not be embedded.
    #[error("invalid filter on '{field}': {reason}")]
    Filter { field: String, reason: String },

    /// Statement execution failed.
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),
}

impl EngineError {
    pub fn class(&self) -> ErrorClass {
        match self {
            EngineError::Format(_)
            | EngineError::Filter { .. }
            | EngineError::Storage(_)
            | EngineError::RowNotFound { .. } => ErrorClass::Data,
            _ => ErrorClass::Config,
        }
    }

    pub fn is_data(&self) -> bool {
        self.class() == ErrorClass::Data
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classes() {
        assert_eq!(
            EngineError::ReservedTable("table_metadata".into()).class(),
            ErrorClass::Config
        );
        assert_eq!(
            EngineError::UnknownFieldType {
                field: "a".into(),
                ty: "Money".into()
            }
            .class(),
            ErrorClass::Config
        );
        assert!(EngineError::Storage(rusqlite::Error::QueryReturnedNoRows).is_data());
        assert!(EngineError::Format(FormatError::OutOfRange("31.02.2024".into())).is_data());
    }
}
