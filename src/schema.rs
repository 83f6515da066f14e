//! Table creation and alteration from the field-specification DSL.
//!
//! A table is described as `|`-separated fields, each a `;`-separated list of
//! `key::value` pairs:
//!
//! ```text
//! n::Name;t::Text;l::100|n::Age;t::Integer|n::Born;t::Date
//! ```
//!
//! Keys are `n` (name), `t` (type) and `l` (length, Text only). Types are
//! `Text`, `Integer`, `Float`, `Boolean`, `Date`, `Time` and `DateTime`.
//! Alterations use `drop::Field` and `add::Field;t::Type;l::Length` entries.
//!
//! Every column gets an explicit default equal to the zero value of its
//! physical type, and every Boolean/Date/Time/DateTime column gets a row in
//! the [`TypeMetadataStore`].

use std::rc::Rc;

use rusqlite::{params, Connection};
use tracing::{debug, info};

use crate::error::{EngineError, Result};
use crate::format::LogicalType;
use crate::metadata::{DataType, TableMetadata, TypeMetadataStore, METADATA_TABLE};
use crate::value::PRIMARY_KEY;

const FIELD_SEPARATOR: char = '|';
const PART_SEPARATOR: char = ';';
const KEY_SEPARATOR: &str = "::";

/// Quote an SQL identifier.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Field type names accepted by the DSL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Integer,
    Float,
    Boolean,
    Date,
    Time,
    DateTime,
}

impl FieldKind {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "Text" => Some(FieldKind::Text),
            "Integer" => Some(FieldKind::Integer),
            "Float" => Some(FieldKind::Float),
            "Boolean" => Some(FieldKind::Boolean),
            "Date" => Some(FieldKind::Date),
            "Time" => Some(FieldKind::Time),
            "DateTime" => Some(FieldKind::DateTime),
            _ => None,
        }
    }

    pub fn data_type(&self) -> DataType {
        match self {
            FieldKind::Integer | FieldKind::Boolean => DataType::Integer,
            FieldKind::Float => DataType::Real,
            FieldKind::Text | FieldKind::Date | FieldKind::Time | FieldKind::DateTime => {
                DataType::Text
            }
        }
    }

    pub fn logical_type(&self) -> Option<LogicalType> {
        match self {
            FieldKind::Boolean => Some(LogicalType::Boolean),
            FieldKind::Date => Some(LogicalType::Date),
            FieldKind::Time => Some(LogicalType::Time),
            FieldKind::DateTime => Some(LogicalType::DateTime),
            _ => None,
        }
    }

    pub fn default_value(&self) -> DefaultValue {
        match self.data_type() {
            DataType::Integer => DefaultValue::Integer(0),
            DataType::Real => DefaultValue::Real(0.0),
            DataType::Text | DataType::Blob => DefaultValue::Text(String::new()),
        }
    }

    /// Width of the TEXT column holding a date/time value in display form.
    fn fixed_length(&self) -> Option<u32> {
        match self {
            FieldKind::Date => Some(10),
            FieldKind::Time => Some(8),
            FieldKind::DateTime => Some(19),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DefaultValue {
    Integer(i64),
    Text(String),
    Real(f64),
}

impl DefaultValue {
    fn sql_literal(&self) -> String {
        match self {
            DefaultValue::Integer(i) => i.to_string(),
            DefaultValue::Real(r) => format!("{:.1}", r),
            DefaultValue::Text(s) => format!("'{}'", s.replace('\'', "''")),
        }
    }

    /// Default as recorded in the metadata table.
    fn as_metadata(&self) -> String {
        match self {
            DefaultValue::Integer(i) => i.to_string(),
            DefaultValue::Real(r) => format!("{:.1}", r),
            DefaultValue::Text(s) => s.clone(),
        }
    }
}

/// One parsed field of the DSL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
    pub length: Option<u32>,
}

impl FieldSpec {
    pub fn into_column(self) -> ColumnDefinition {
        let length = match self.kind {
            FieldKind::Text => self.length,
            other => other.fixed_length(),
        };
        ColumnDefinition {
            data_type: self.kind.data_type(),
            logical_type: self.kind.logical_type(),
            default_value: self.kind.default_value(),
            length,
            name: self.name,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDefinition {
    pub name: String,
    pub data_type: DataType,
    pub logical_type: Option<LogicalType>,
    pub length: Option<u32>,
    pub default_value: DefaultValue,
}

impl ColumnDefinition {
    /// Column clause for CREATE TABLE / ADD COLUMN.
    pub fn to_sql(&self) -> String {
        let ty = match self.length {
            Some(len) => format!("{}({})", self.data_type, len),
            None => self.data_type.to_string(),
        };
        format!(
            "{} {} DEFAULT {}",
            quote_ident(&self.name),
            ty,
            self.default_value.sql_literal()
        )
    }

    /// Metadata row for the column, only when it carries a logical type.
    pub fn metadata(&self, table: &str, scratch: bool) -> Option<TableMetadata> {
        self.logical_type.map(|logical| TableMetadata {
            table_name: table.to_string(),
            field_name: self.name.clone(),
            actual_type: self.data_type,
            logical_type: Some(logical),
            nullable: false,
            default_value: self.default_value.as_metadata(),
            scratch,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableDefinition {
    pub name: String,
    pub columns: Vec<ColumnDefinition>,
    pub temporary: bool,
}

impl TableDefinition {
    pub fn to_create_sql(&self) -> String {
        let mut columns = vec![format!(
            "{} INTEGER PRIMARY KEY AUTOINCREMENT",
            quote_ident(PRIMARY_KEY)
        )];
        columns.extend(self.columns.iter().map(ColumnDefinition::to_sql));
        format!(
            "CREATE {}TABLE {} ({})",
            if self.temporary { "TEMP " } else { "" },
            quote_ident(&self.name),
            columns.join(", ")
        )
    }
}

/// One entry of the alter DSL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlterClause {
    Drop(String),
    Add(FieldSpec),
}

/// Split `key::value;key::value` into pairs, skipping malformed parts.
fn key_values(field: &str) -> Vec<(&str, &str)> {
    field
        .split(PART_SEPARATOR)
        .filter_map(|part| part.split_once(KEY_SEPARATOR))
        .map(|(k, v)| (k.trim(), v.trim()))
        .collect()
}

fn check_field_name(name: &str) -> Result<()> {
    if name.eq_ignore_ascii_case(PRIMARY_KEY) {
        return Err(EngineError::InvalidFieldSpec(format!(
            "'{}' is the primary key and is managed by the engine",
            name
        )));
    }
    Ok(())
}

fn build_spec(name: &str, ty: &str, length: Option<&str>) -> Result<FieldSpec> {
    check_field_name(name)?;
    let kind = FieldKind::parse(ty).ok_or_else(|| EngineError::UnknownFieldType {
        field: name.to_string(),
        ty: ty.to_string(),
    })?;
    let length = match length {
        Some(l) if !l.is_empty() => Some(l.parse::<u32>().map_err(|_| {
            EngineError::InvalidFieldSpec(format!("length '{}' of field '{}'", l, name))
        })?),
        _ => None,
    };
    Ok(FieldSpec {
        name: name.to_string(),
        kind,
        length,
    })
}

/// Parse the field DSL. Fields without a name are skipped.
pub fn parse_field_specs(dsl: &str) -> Result<Vec<FieldSpec>> {
    let mut specs = Vec::new();
    for field in dsl.split(FIELD_SEPARATOR) {
        let (mut name, mut ty, mut length) = ("", "", None);
        for (key, value) in key_values(field) {
            match key {
                "n" => name = value,
                "t" => ty = value,
                "l" => length = Some(value),
                _ => {}
            }
        }
        if name.is_empty() {
            continue;
        }
        specs.push(build_spec(name, ty, length)?);
    }
    Ok(specs)
}

/// Parse the alter DSL.
pub fn parse_alter_clauses(dsl: &str) -> Result<Vec<AlterClause>> {
    let mut clauses = Vec::new();
    for entry in dsl.split(FIELD_SEPARATOR) {
        if entry.trim().is_empty() {
            continue;
        }
        let (mut drop, mut add, mut ty, mut length) = ("", "", "", None);
        for (key, value) in key_values(entry) {
            match key {
                "drop" => drop = value,
                "add" => add = value,
                "t" => ty = value,
                "l" => length = Some(value),
                _ => {}
            }
        }
        if !drop.is_empty() {
            check_field_name(drop)?;
            clauses.push(AlterClause::Drop(drop.to_string()));
        }
        if !add.is_empty() {
            clauses.push(AlterClause::Add(build_spec(add, ty, length)?));
        }
        if drop.is_empty() && add.is_empty() {
            return Err(EngineError::InvalidFieldSpec(format!(
                "'{}' is neither a drop nor an add entry",
                entry
            )));
        }
    }
    Ok(clauses)
}

/// Attribute a failed statement to the schema change on `table`.
fn schema_error(table: &str, err: EngineError) -> EngineError {
    match err {
        EngineError::Storage(source) => EngineError::Schema {
            table: table.to_string(),
            source,
        },
        other => other,
    }
}

fn check_not_reserved(name: &str) -> Result<()> {
    if name.eq_ignore_ascii_case(METADATA_TABLE) {
        return Err(EngineError::ReservedTable(name.to_string()));
    }
    Ok(())
}

/// Outcome of [`SchemaManager::create_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    Created,
    AlreadyExists,
}

/// Issues DDL and keeps the metadata table in step with it.
#[derive(Debug, Clone)]
pub struct SchemaManager {
    conn: Rc<Connection>,
    metadata: TypeMetadataStore,
}

impl SchemaManager {
    pub fn new(conn: Rc<Connection>, metadata: TypeMetadataStore) -> Self {
        Self { conn, metadata }
    }

    /// Whether the table exists in the main or the temp schema.
    pub fn table_exists(&self, name: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT count(*) FROM (
                SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1
                UNION ALL
                SELECT name FROM sqlite_temp_master WHERE type = 'table' AND name = ?1
            )",
            params![name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn is_temporary(&self, name: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT count(*) FROM sqlite_temp_master WHERE type = 'table' AND name = ?1",
            params![name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Create `name` from the field DSL.
    ///
    /// Scratch tables are created as TEMP tables and their metadata rows are
    /// flagged for purging on the next start.
    pub fn create_table(
        &self,
        name: &str,
        dsl: &str,
        open_if_exists: bool,
        scratch: bool,
    ) -> Result<CreateOutcome> {
        check_not_reserved(name)?;
        if self.table_exists(name)? {
            if open_if_exists {
                return Ok(CreateOutcome::AlreadyExists);
            }
            return Err(EngineError::TableExists(name.to_string()));
        }
        let definition = TableDefinition {
            name: name.to_string(),
            columns: parse_field_specs(dsl)?
                .into_iter()
                .map(FieldSpec::into_column)
                .collect(),
            temporary: scratch,
        };
        let sql = definition.to_create_sql();
        debug!(%sql, "creating table");

        let tx = self.conn.unchecked_transaction()?;
        tx.execute(&sql, [])
            .map_err(|e| schema_error(name, e.into()))?;
        for column in &definition.columns {
            if let Some(entry) = column.metadata(name, scratch) {
                self.metadata
                    .put(&entry)
                    .map_err(|e| schema_error(name, e))?;
            }
        }
        tx.commit()?;
        info!(table = name, scratch, "table created");
        Ok(CreateOutcome::Created)
    }

    /// Apply the alter DSL to `name` as one all-or-nothing batch.
    pub fn alter_table(&self, name: &str, dsl: &str) -> Result<()> {
        check_not_reserved(name)?;
        if !self.table_exists(name)? {
            return Err(EngineError::TableNotFound(name.to_string()));
        }
        let clauses = parse_alter_clauses(dsl)?;
        let scratch = self.is_temporary(name)?;
        let table = quote_ident(name);

        let tx = self.conn.unchecked_transaction()?;
        for clause in clauses {
            match clause {
                AlterClause::Drop(field) => {
                    let sql = format!("ALTER TABLE {} DROP COLUMN {}", table, quote_ident(&field));
                    debug!(%sql, "altering table");
                    tx.execute(&sql, [])
                        .map_err(|e| schema_error(name, e.into()))?;
                    self.metadata
                        .remove(name, &field)
                        .map_err(|e| schema_error(name, e))?;
                }
                AlterClause::Add(spec) => {
                    let column = spec.into_column();
                    let sql = format!("ALTER TABLE {} ADD COLUMN {}", table, column.to_sql());
                    debug!(%sql, "altering table");
                    tx.execute(&sql, [])
                        .map_err(|e| schema_error(name, e.into()))?;
                    if let Some(entry) = column.metadata(name, scratch) {
                        self.metadata
                            .put(&entry)
                            .map_err(|e| schema_error(name, e))?;
                    }
                }
            }
        }
        tx.commit()?;
        info!(table = name, "table altered");
        Ok(())
    }

    /// Drop `name` together with its metadata rows.
    pub fn drop_table(&self, name: &str) -> Result<()> {
        check_not_reserved(name)?;
        let tx = self.conn.unchecked_transaction()?;
        self.metadata
            .remove_table(name)
            .map_err(|e| schema_error(name, e))?;
        tx.execute(&format!("DROP TABLE IF EXISTS {}", quote_ident(name)), [])
            .map_err(|e| schema_error(name, e.into()))?;
        tx.commit()?;
        info!(table = name, "table dropped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_field_specs() {
        let specs = parse_field_specs("n::Name;t::Text;l::100|n::Age;t::Integer|t::Date").unwrap();
        assert_eq!(
            specs,
            vec![
                FieldSpec {
                    name: "Name".into(),
                    kind: FieldKind::Text,
                    length: Some(100)
                },
                FieldSpec {
                    name: "Age".into(),
                    kind: FieldKind::Integer,
                    length: None
                },
            ]
        );
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let err = parse_field_specs("n::Price;t::Money").unwrap_err();
        assert!(matches!(
            err,
            EngineError::UnknownFieldType { ref field, ref ty } if field == "Price" && ty == "Money"
        ));
    }

    #[test]
    fn test_primary_key_name_is_rejected() {
        assert!(matches!(
            parse_field_specs("n::id;t::Integer"),
            Err(EngineError::InvalidFieldSpec(_))
        ));
    }

    #[test]
    fn test_parse_alter_clauses() {
        let clauses = parse_alter_clauses("drop::ProjectId|add::TaskId;t::Integer").unwrap();
        assert_eq!(clauses.len(), 2);
        assert_eq!(clauses[0], AlterClause::Drop("ProjectId".into()));
        assert!(matches!(&clauses[1], AlterClause::Add(spec) if spec.name == "TaskId"));
        assert!(parse_alter_clauses("rename::x").is_err());
    }

    #[test]
    fn test_create_sql() {
        let definition = TableDefinition {
            name: "people".into(),
            columns: parse_field_specs("n::Name;t::Text;l::40|n::Born;t::Date|n::Score;t::Float")
                .unwrap()
                .into_iter()
                .map(FieldSpec::into_column)
                .collect(),
            temporary: false,
        };
        assert_eq!(
            definition.to_create_sql(),
            "CREATE TABLE \"people\" (\"id\" INTEGER PRIMARY KEY AUTOINCREMENT, \
             \"Name\" TEXT(40) DEFAULT '', \"Born\" TEXT(10) DEFAULT '', \"Score\" REAL DEFAULT 0.0)"
        );
    }

    #[test]
    fn test_metadata_only_for_logical_types() {
        let columns: Vec<_> = parse_field_specs("n::A;t::Text|n::B;t::Boolean")
            .unwrap()
            .into_iter()
            .map(FieldSpec::into_column)
            .collect();
        assert!(columns[0].metadata("t", false).is_none());
        let meta = columns[1].metadata("t", true).unwrap();
        assert_eq!(meta.logical_type, Some(LogicalType::Boolean));
        assert_eq!(meta.actual_type, DataType::Integer);
        assert_eq!(meta.default_value, "0");
        assert!(meta.scratch);
    }
}
