//! Persisted side table of logical-type overrides.
//!
//! SQLite only knows INTEGER, REAL, TEXT and BLOB. A boolean column is a
//! plain INTEGER and a date column a plain TEXT; the fact that they carry
//! booleans or dates lives here, one row per (table, field). A column with
//! no row is exactly its physical type.
//!
//! Rows of scratch tables carry the `temporary` flag and are purged when the
//! database is opened, since those tables do not survive the connection.

use std::fmt;
use std::rc::Rc;

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::Result;
use crate::format::LogicalType;

/// Reserved name of the metadata table.
pub const METADATA_TABLE: &str = "table_metadata";

/// Physical SQLite storage class of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    Integer,
    Text,
    Real,
    Blob,
}

impl DataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Integer => "INTEGER",
            DataType::Text => "TEXT",
            DataType::Real => "REAL",
            DataType::Blob => "BLOB",
        }
    }

    /// Storage class of a declared column type, following SQLite's affinity
    /// rules. NUMERIC affinity has no single class and yields `None`.
    pub fn from_declared(declared: &str) -> Option<Self> {
        let decl = declared.to_ascii_uppercase();
        if decl.contains("INT") {
            Some(DataType::Integer)
        } else if decl.contains("CHAR") || decl.contains("CLOB") || decl.contains("TEXT") {
            Some(DataType::Text)
        } else if decl.is_empty() || decl.contains("BLOB") {
            Some(DataType::Blob)
        } else if decl.contains("REAL") || decl.contains("FLOA") || decl.contains("DOUB") {
            Some(DataType::Real)
        } else {
            None
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Effective type of a column: the logical override when the metadata table
/// has one, otherwise the physical storage class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Integer,
    Real,
    Text,
    Blob,
    /// NUMERIC affinity or no usable declaration.
    Untyped,
    Logical(LogicalType),
}

impl FieldType {
    pub fn resolve(declared: &str, metadata: Option<&TableMetadata>) -> Self {
        if let Some(logical) = metadata.and_then(|m| m.logical_type) {
            return FieldType::Logical(logical);
        }
        let physical = metadata
            .map(|m| m.actual_type)
            .or_else(|| DataType::from_declared(declared));
        match physical {
            Some(DataType::Integer) => FieldType::Integer,
            Some(DataType::Real) => FieldType::Real,
            Some(DataType::Text) => FieldType::Text,
            Some(DataType::Blob) => FieldType::Blob,
            None => FieldType::Untyped,
        }
    }

    pub fn logical(&self) -> Option<LogicalType> {
        match self {
            FieldType::Logical(t) => Some(*t),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, FieldType::Integer | FieldType::Real)
    }
}

/// One metadata row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableMetadata {
    pub table_name: String,
    pub field_name: String,
    pub actual_type: DataType,
    pub logical_type: Option<LogicalType>,
    pub nullable: bool,
    pub default_value: String,
    pub scratch: bool,
}

impl TableMetadata {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let actual: String = row.get(2)?;
        let logical: String = row.get(3)?;
        Ok(Self {
            table_name: row.get(0)?,
            field_name: row.get(1)?,
            actual_type: DataType::from_declared(&actual).unwrap_or(DataType::Text),
            logical_type: LogicalType::parse(&logical),
            nullable: row.get(4)?,
            default_value: row.get(5)?,
            scratch: row.get(6)?,
        })
    }
}

const SELECT_COLUMNS: &str =
    "table_name, field_name, actual_type, logical_type, is_nullable, default_value, temporary";

/// Access to the `table_metadata` table on a shared connection.
///
/// Statements run on the connection as-is, so calls made while a
/// transaction is open on it take part in that transaction.
#[derive(Debug, Clone)]
pub struct TypeMetadataStore {
    conn: Rc<Connection>,
}

impl TypeMetadataStore {
    pub fn new(conn: Rc<Connection>) -> Self {
        Self { conn }
    }

    /// Create the metadata table and its index if missing.
    pub fn ensure_schema(&self) -> Result<()> {
        self.conn.execute_batch(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                table_name TEXT NOT NULL,
                field_name TEXT NOT NULL,
                actual_type TEXT NOT NULL,
                logical_type TEXT NOT NULL DEFAULT '',
                is_nullable INTEGER NOT NULL DEFAULT 1,
                default_value TEXT NOT NULL DEFAULT '',
                temporary INTEGER NOT NULL DEFAULT 0
            );
            CREATE UNIQUE INDEX IF NOT EXISTS idx_table_field ON {table} (table_name, field_name);
            "#,
            table = METADATA_TABLE
        ))?;
        Ok(())
    }

    /// Insert or replace the row for (table, field).
    pub fn put(&self, entry: &TableMetadata) -> Result<()> {
        debug!(
            table = %entry.table_name,
            field = %entry.field_name,
            logical = ?entry.logical_type,
            "storing field metadata"
        );
        self.conn.execute(
            &format!(
                "INSERT INTO {METADATA_TABLE} ({SELECT_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(table_name, field_name) DO UPDATE SET
                    actual_type = excluded.actual_type,
                    logical_type = excluded.logical_type,
                    is_nullable = excluded.is_nullable,
                    default_value = excluded.default_value,
                    temporary = excluded.temporary"
            ),
            params![
                entry.table_name,
                entry.field_name,
                entry.actual_type.as_str(),
                entry.logical_type.map_or("", |t| t.as_str()),
                entry.nullable,
                entry.default_value,
                entry.scratch,
            ],
        )?;
        Ok(())
    }

    /// Delete the row for (table, field); returns the number of rows removed.
    pub fn remove(&self, table: &str, field: &str) -> Result<usize> {
        debug!(table, field, "removing field metadata");
        let n = self.conn.execute(
            &format!("DELETE FROM {METADATA_TABLE} WHERE table_name = ?1 AND field_name = ?2"),
            params![table, field],
        )?;
        Ok(n)
    }

    /// Delete every row of a table.
    pub fn remove_table(&self, table: &str) -> Result<usize> {
        let n = self.conn.execute(
            &format!("DELETE FROM {METADATA_TABLE} WHERE table_name = ?1"),
            params![table],
        )?;
        Ok(n)
    }

    pub fn get(&self, table: &str, field: &str) -> Result<Option<TableMetadata>> {
        let entry = self
            .conn
            .query_row(
                &format!(
                    "SELECT {SELECT_COLUMNS} FROM {METADATA_TABLE}
                     WHERE table_name = ?1 AND field_name = ?2"
                ),
                params![table, field],
                TableMetadata::from_row,
            )
            .optional()?;
        Ok(entry)
    }

    /// All rows of a table, in field-name order.
    pub fn entries(&self, table: &str) -> Result<Vec<TableMetadata>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM {METADATA_TABLE}
             WHERE table_name = ?1 ORDER BY field_name"
        ))?;
        let rows = stmt.query_map(params![table], TableMetadata::from_row)?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    /// Delete every scratch row. Runs once when the database is opened.
    pub fn purge_scratch(&self) -> Result<usize> {
        let n = self.conn.execute(
            &format!("DELETE FROM {METADATA_TABLE} WHERE temporary = 1"),
            [],
        )?;
        if n > 0 {
            info!(rows = n, "purged scratch table metadata");
        }
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> TypeMetadataStore {
        let store = TypeMetadataStore::new(Rc::new(Connection::open_in_memory().unwrap()));
        store.ensure_schema().unwrap();
        store
    }

    fn entry(table: &str, field: &str, logical: LogicalType, scratch: bool) -> TableMetadata {
        TableMetadata {
            table_name: table.to_string(),
            field_name: field.to_string(),
            actual_type: DataType::Text,
            logical_type: Some(logical),
            nullable: false,
            default_value: String::new(),
            scratch,
        }
    }

    #[test]
    fn test_put_get_remove() {
        let s = store();
        s.put(&entry("tasks", "due", LogicalType::Date, false)).unwrap();
        let got = s.get("tasks", "due").unwrap().unwrap();
        assert_eq!(got.logical_type, Some(LogicalType::Date));
        assert_eq!(got.actual_type, DataType::Text);

        s.put(&entry("tasks", "due", LogicalType::DateTime, false))
            .unwrap();
        assert_eq!(s.entries("tasks").unwrap().len(), 1);
        assert_eq!(
            s.get("tasks", "due").unwrap().unwrap().logical_type,
            Some(LogicalType::DateTime)
        );

        assert_eq!(s.remove("tasks", "due").unwrap(), 1);
        assert!(s.get("tasks", "due").unwrap().is_none());
    }

    #[test]
    fn test_purge_scratch_keeps_persistent_rows() {
        let s = store();
        s.put(&entry("tasks", "due", LogicalType::Date, false)).unwrap();
        s.put(&entry("tmp", "at", LogicalType::Time, true)).unwrap();
        s.put(&entry("tmp", "ok", LogicalType::Boolean, true)).unwrap();
        assert_eq!(s.purge_scratch().unwrap(), 2);
        assert!(s.entries("tmp").unwrap().is_empty());
        assert_eq!(s.entries("tasks").unwrap().len(), 1);
    }

    #[test]
    fn test_declared_type_affinity() {
        assert_eq!(DataType::from_declared("TEXT(10)"), Some(DataType::Text));
        assert_eq!(DataType::from_declared("varchar"), Some(DataType::Text));
        assert_eq!(DataType::from_declared("BIGINT"), Some(DataType::Integer));
        assert_eq!(DataType::from_declared("DOUBLE"), Some(DataType::Real));
        assert_eq!(DataType::from_declared(""), Some(DataType::Blob));
        assert_eq!(DataType::from_declared("NUMERIC"), None);
    }

    #[test]
    fn test_field_type_prefers_logical_override() {
        let meta = entry("tasks", "due", LogicalType::Date, false);
        assert_eq!(
            FieldType::resolve("TEXT(10)", Some(&meta)),
            FieldType::Logical(LogicalType::Date)
        );
        assert_eq!(FieldType::resolve("TEXT(10)", None), FieldType::Text);
        assert_eq!(FieldType::resolve("NUMERIC", None), FieldType::Untyped);
    }
}
