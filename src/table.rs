//! Cursor over the rows of one table with typed reads and writes.
//!
//! A [`Table`] caches the column list of the underlying SQLite table, the
//! effective [`FieldType`] and default of every column, the filter state and
//! the last materialized [`Rowset`]. Values pass through the table's
//! [`FormatEngine`]: callers read and write display strings, the store holds
//! canonical ones.
//!
//! Data errors do not escape as `Err`. They are kept in [`Table::last_error`]
//! and the operation reports failure through its return value.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;
use std::sync::Arc;

use rusqlite::{params_from_iter, Connection};
use tracing::{debug, warn};

use crate::error::{EngineError, Result};
use crate::filter::FilterCompiler;
use crate::format::{format_bool, Direction, FormatEngine, FormatError, LogicalType};
use crate::hooks::{HookCall, HookDispatcher, HookKind, RegisteredHook};
use crate::metadata::{FieldType, TypeMetadataStore, METADATA_TABLE};
use crate::schema::quote_ident;
use crate::value::{Record, Value, PRIMARY_KEY};

/// Rows materialized by the last query plus a cursor.
///
/// The cursor is always on a row, except on an empty rowset where it is 0.
/// An unsaved row added by [`Table::new_row`] sits last with primary key 0.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Rowset {
    rows: Vec<Record>,
    pos: usize,
}

impl Rowset {
    pub fn new(rows: Vec<Record>) -> Self {
        Self { rows, pos: 0 }
    }

    pub fn rows(&self) -> &[Record] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn current(&self) -> Option<&Record> {
        self.rows.get(self.pos)
    }

    fn current_mut(&mut self) -> Option<&mut Record> {
        self.rows.get_mut(self.pos)
    }

    fn next(&mut self) -> bool {
        if self.pos + 1 < self.rows.len() {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn prev(&mut self) -> bool {
        if self.pos > 0 {
            self.pos -= 1;
            true
        } else {
            false
        }
    }

    fn seek(&mut self, row: usize) {
        self.pos = row.min(self.rows.len().saturating_sub(1));
    }

    pub fn has_placeholder(&self) -> bool {
        self.rows.last().and_then(Record::id) == Some(0)
    }

    fn position_of(&self, id: i64) -> Option<usize> {
        self.rows.iter().position(|r| r.id() == Some(id))
    }

    /// Put a freshly inserted row in place of the placeholder, or append it.
    fn place_inserted(&mut self, record: Record) {
        if self.has_placeholder() {
            self.rows.pop();
        }
        self.rows.push(record);
        self.pos = self.rows.len() - 1;
    }

    fn replace(&mut self, index: usize, record: Record) {
        self.rows[index] = record;
        self.pos = index;
    }

    fn remove_current(&mut self) {
        if self.pos < self.rows.len() {
            self.rows.remove(self.pos);
        }
        self.pos = self.pos.saturating_sub(1);
    }
}

/// Read-only view of a single row, handed to hooks.
#[derive(Debug, Clone)]
pub struct RowCursor {
    table: String,
    record: Record,
    field_types: HashMap<String, FieldType>,
    defaults: HashMap<String, Value>,
    format: Arc<FormatEngine>,
}

impl RowCursor {
    pub fn table_name(&self) -> &str {
        &self.table
    }

    pub fn record(&self) -> &Record {
        &self.record
    }

    pub fn id(&self) -> Option<i64> {
        self.record.id()
    }

    /// Field value in display form, like [`Table::get_field`].
    pub fn get_field(&self, name: &str) -> Result<Value> {
        let field_type = self
            .field_types
            .get(name)
            .ok_or_else(|| EngineError::FieldNotFound {
                table: self.table.clone(),
                field: name.to_string(),
            })?;
        let default = self.defaults.get(name).cloned().unwrap_or(Value::Null);
        let raw = self.record.get(name).cloned().unwrap_or(Value::Null);
        Ok(display_value(&self.format, field_type.logical(), raw, default)?)
    }
}

#[derive(Debug, Clone)]
struct RangeFilter {
    field: String,
    min: Value,
    max: Value,
}

/// Stored value to what callers see.
fn display_value(
    format: &FormatEngine,
    logical: Option<LogicalType>,
    raw: Value,
    default: Value,
) -> std::result::Result<Value, FormatError> {
    match logical {
        Some(LogicalType::Boolean) => {
            let canonical = match raw {
                Value::Integer(i) => i.to_string(),
                Value::Boolean(b) => i64::from(b).to_string(),
                Value::Text(s) => s,
                _ => String::new(),
            };
            Ok(Value::Text(format_bool(&canonical, Direction::ToDisplay)))
        }
        Some(ty) => match raw {
            Value::Text(s) => Ok(Value::Text(format.format_value(&s, ty, Direction::ToDisplay)?)),
            Value::Integer(i) => Ok(Value::Text(format.format_value(
                &i.to_string(),
                ty,
                Direction::ToDisplay,
            )?)),
            Value::Null => Ok(Value::Text(String::new())),
            other => Ok(other),
        },
        None if raw.is_null() => Ok(default),
        None => Ok(raw),
    }
}

fn type_mismatch(field: &str, expected: &'static str, value: &Value) -> EngineError {
    EngineError::TypeMismatch {
        field: field.to_string(),
        expected,
        actual: value.type_name(),
    }
}

/// Default of a column as declared in the table schema.
fn parse_default_literal(literal: &str) -> Value {
    let literal = literal.trim();
    if literal.len() >= 2 && literal.starts_with('\'') && literal.ends_with('\'') {
        return Value::Text(literal[1..literal.len() - 1].replace("''", "'"));
    }
    if literal.eq_ignore_ascii_case("NULL") {
        return Value::Null;
    }
    if let Ok(i) = literal.parse::<i64>() {
        Value::Integer(i)
    } else if let Ok(r) = literal.parse::<f64>() {
        Value::Real(r)
    } else {
        Value::Text(literal.to_string())
    }
}

fn column_default(field_type: FieldType, declared: Option<&str>) -> Value {
    match (field_type, declared) {
        (FieldType::Logical(LogicalType::Boolean), _) => Value::Integer(0),
        (FieldType::Logical(_), _) => Value::Text(String::new()),
        (_, Some(literal)) => parse_default_literal(literal),
        (FieldType::Integer, None) => Value::Integer(0),
        (FieldType::Real, None) => Value::Real(0.0),
        (FieldType::Text, None) => Value::Text(String::new()),
        (FieldType::Blob | FieldType::Untyped, None) => Value::Null,
    }
}

/// Handle to one opened table.
#[derive(Debug)]
pub struct Table {
    conn: Rc<Connection>,
    format: Arc<FormatEngine>,
    name: String,
    columns: Vec<String>,
    field_types: HashMap<String, FieldType>,
    defaults: HashMap<String, Value>,
    plain_filter: Option<String>,
    range_filter: Option<RangeFilter>,
    field_filters: BTreeMap<String, String>,
    order: Option<String>,
    rows: Option<Rowset>,
    x_record: Option<Record>,
    hooks: HashMap<HookKind, RegisteredHook>,
    update_hook_running: bool,
    last_error: RefCell<Option<String>>,
}

impl Table {
    /// Open an existing table and cache its columns, types and defaults.
    pub fn open(conn: Rc<Connection>, format: Arc<FormatEngine>, name: &str) -> Result<Self> {
        if name.eq_ignore_ascii_case(METADATA_TABLE) {
            return Err(EngineError::ReservedTable(name.to_string()));
        }
        let metadata = TypeMetadataStore::new(Rc::clone(&conn));
        let mut columns = Vec::new();
        let mut field_types = HashMap::new();
        let mut defaults = HashMap::new();
        {
            let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", quote_ident(name)))?;
            let mut rows = stmt.query([])?;
            while let Some(row) = rows.next()? {
                let column: String = row.get(1)?;
                let declared: String = row.get(2)?;
                let declared_default: Option<String> = row.get(4)?;
                let entry = metadata.get(name, &column)?;
                let field_type = FieldType::resolve(&declared, entry.as_ref());
                defaults.insert(
                    column.clone(),
                    column_default(field_type, declared_default.as_deref()),
                );
                field_types.insert(column.clone(), field_type);
                columns.push(column);
            }
        }
        if columns.is_empty() {
            return Err(EngineError::TableNotFound(name.to_string()));
        }
        debug!(table = name, columns = columns.len(), "table opened");

        Ok(Self {
            conn,
            format,
            name: name.to_string(),
            columns,
            field_types,
            defaults,
            plain_filter: None,
            range_filter: None,
            field_filters: BTreeMap::new(),
            order: None,
            rows: None,
            x_record: None,
            hooks: HashMap::new(),
            update_hook_running: false,
            last_error: RefCell::new(None),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Column names in table order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn field_type(&self, name: &str) -> Result<FieldType> {
        self.field_types
            .get(name)
            .copied()
            .ok_or_else(|| EngineError::FieldNotFound {
                table: self.name.clone(),
                field: name.to_string(),
            })
    }

    pub fn default_value(&self, name: &str) -> Result<Value> {
        self.field_type(name)?;
        Ok(self.defaults.get(name).cloned().unwrap_or(Value::Null))
    }

    pub fn format(&self) -> &Arc<FormatEngine> {
        &self.format
    }

    /// Use other display templates from now on.
    pub fn set_format(&mut self, format: Arc<FormatEngine>) {
        self.format = format;
    }

    // --- errors ---

    /// Message of the last data error, if the last fallible call had one.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.borrow().clone()
    }

    pub fn clear_errors(&self) {
        self.last_error.borrow_mut().take();
    }

    fn record_error(&self, err: &EngineError) {
        warn!(table = %self.name, error = %err, "table operation failed");
        *self.last_error.borrow_mut() = Some(err.to_string());
    }

    /// Record a data error and yield `None`; configuration errors pass through.
    fn absorb<T>(&self, result: Result<T>) -> Result<Option<T>> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.is_data() => {
                self.record_error(&err);
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    // --- rowset and cursor ---

    pub fn rows(&self) -> Option<&Rowset> {
        self.rows.as_ref()
    }

    pub fn is_loaded(&self) -> bool {
        self.rows.is_some()
    }

    pub fn current_record(&self) -> Option<&Record> {
        self.rows.as_ref().and_then(Rowset::current)
    }

    pub fn row_count(&self) -> usize {
        self.rows.as_ref().map_or(0, Rowset::len)
    }

    pub fn position(&self) -> usize {
        self.rows.as_ref().map_or(0, Rowset::position)
    }

    /// Row captured before the last hooked update or delete.
    pub fn snapshot(&self) -> Option<&Record> {
        self.x_record.as_ref()
    }

    pub fn next(&mut self) -> bool {
        self.rows.as_mut().is_some_and(|rows| rows.next())
    }

    pub fn prev(&mut self) -> bool {
        self.rows.as_mut().is_some_and(|rows| rows.prev())
    }

    pub fn scroll_to_beginning(&mut self) {
        if let Some(rows) = self.rows.as_mut() {
            rows.seek(0);
        }
    }

    pub fn scroll_to_end(&mut self) {
        if let Some(rows) = self.rows.as_mut() {
            rows.seek(usize::MAX);
        }
    }

    /// Move to `row`, clamped to the last row.
    pub fn scroll_to_row(&mut self, row: usize) {
        if let Some(rows) = self.rows.as_mut() {
            rows.seek(row);
        }
    }

    fn cursor_over(&self, record: Record) -> RowCursor {
        RowCursor {
            table: self.name.clone(),
            record,
            field_types: self.field_types.clone(),
            defaults: self.defaults.clone(),
            format: Arc::clone(&self.format),
        }
    }

    // --- filters ---

    /// Filter expression on one field; an empty expression removes it.
    pub fn set_filter(&mut self, field: &str, expression: &str) -> Result<&mut Self> {
        self.field_type(field)?;
        if expression.trim().is_empty() {
            self.field_filters.remove(field);
        } else {
            self.field_filters
                .insert(field.to_string(), expression.to_string());
        }
        Ok(self)
    }

    /// Raw SQL predicate. Replaces any range filter.
    pub fn set_plain_filter(&mut self, predicate: &str) -> &mut Self {
        self.range_filter = None;
        self.plain_filter = Some(predicate.to_string()).filter(|p| !p.trim().is_empty());
        self
    }

    /// `field BETWEEN min AND max`, bounds given in display form. Replaces
    /// any plain filter. Returns false when a bound does not convert.
    pub fn set_range_filter(
        &mut self,
        field: &str,
        min: impl Into<Value>,
        max: impl Into<Value>,
    ) -> Result<bool> {
        self.clear_errors();
        let logical = self.field_type(field)?.logical();
        let Some(min) = self.absorb(self.to_internal(field, min.into(), logical))? else {
            return Ok(false);
        };
        let Some(max) = self.absorb(self.to_internal(field, max.into(), logical))? else {
            return Ok(false);
        };
        self.plain_filter = None;
        self.range_filter = Some(RangeFilter {
            field: field.to_string(),
            min,
            max,
        });
        Ok(true)
    }

    pub fn clear_filters(&mut self) -> &mut Self {
        self.plain_filter = None;
        self.range_filter = None;
        self.field_filters.clear();
        self
    }

    /// ORDER BY clause, e.g. `"Name DESC"`. Empty clears it.
    pub fn order_by(&mut self, clause: &str) -> &mut Self {
        self.order = Some(clause.to_string()).filter(|c| !c.trim().is_empty());
        self
    }

    // --- hooks ---

    /// Attach the hook registered under `name`.
    pub fn set_hook(&mut self, kind: HookKind, dispatcher: &HookDispatcher, name: &str) -> Result<()> {
        let hook = dispatcher.resolve(name)?;
        self.attach_hook(kind, hook);
        Ok(())
    }

    pub fn attach_hook(&mut self, kind: HookKind, hook: RegisteredHook) {
        debug!(table = %self.name, hook = hook.name(), ?kind, "hook attached");
        self.hooks.insert(kind, hook);
    }

    pub fn clear_hook(&mut self, kind: HookKind) -> Option<RegisteredHook> {
        self.hooks.remove(&kind)
    }

    pub fn hook(&self, kind: HookKind) -> Option<&RegisteredHook> {
        self.hooks.get(&kind)
    }

    // --- queries ---

    fn select_list(&self) -> String {
        self.columns
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn build_query(&self) -> Result<(String, Vec<Value>)> {
        let mut sql = format!("SELECT {} FROM {}", self.select_list(), quote_ident(&self.name));
        let mut predicates = Vec::new();
        let mut params = Vec::new();

        if let Some(plain) = &self.plain_filter {
            predicates.push(plain.clone());
        } else if let Some(range) = &self.range_filter {
            predicates.push(format!("{} BETWEEN ? AND ?", quote_ident(&range.field)));
            params.push(range.min.clone());
            params.push(range.max.clone());
        }

        let compiler = FilterCompiler::new(&self.format);
        for (field, expression) in &self.field_filters {
            let fragment = compiler.compile(field, self.field_type(field)?, expression)?;
            if !fragment.is_empty() {
                predicates.push(fragment);
            }
        }

        if !predicates.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&predicates.join(" AND "));
        }
        if let Some(order) = &self.order {
            sql.push_str(" ORDER BY ");
            sql.push_str(order);
        }
        Ok((sql, params))
    }

    fn query_records(&self, sql: &str, params: &[Value]) -> Result<Vec<Record>> {
        debug!(table = %self.name, %sql, "querying rows");
        let mut stmt = self.conn.prepare(sql)?;
        let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let mut rows = stmt.query(params_from_iter(params.iter()))?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            let mut record = Record::new();
            for (i, name) in names.iter().enumerate() {
                record.set(name, Value::from(row.get_ref(i)?));
            }
            records.push(record);
        }
        Ok(records)
    }

    fn fetch_optional(&self, id: i64) -> Result<Option<Record>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE {} = ?",
            self.select_list(),
            quote_ident(&self.name),
            quote_ident(PRIMARY_KEY)
        );
        Ok(self.query_records(&sql, &[Value::Integer(id)])?.into_iter().next())
    }

    fn fetch_record(&self, id: i64) -> Result<Record> {
        self.fetch_optional(id)?.ok_or_else(|| EngineError::RowNotFound {
            table: self.name.clone(),
            id,
        })
    }

    /// Run the filtered, ordered query and replace the rowset. The cursor
    /// starts on the first row. Returns whether any row matched.
    pub fn find(&mut self) -> Result<bool> {
        self.clear_errors();
        let Some((sql, params)) = self.absorb(self.build_query())? else {
            return Ok(false);
        };
        let Some(records) = self.absorb(self.query_records(&sql, &params))? else {
            return Ok(false);
        };
        let found = !records.is_empty();
        self.rows = Some(Rowset::new(records));
        Ok(found)
    }

    /// Load one row by primary key. A row already in the rowset is refreshed
    /// in place and the cursor moves to it; otherwise the rowset is replaced
    /// by that single row.
    pub fn find_by_id(&mut self, id: i64) -> Result<bool> {
        self.clear_errors();
        let Some(found) = self.absorb(self.fetch_optional(id))? else {
            return Ok(false);
        };
        let Some(record) = found else {
            return Ok(false);
        };
        if let Some(rows) = self.rows.as_mut() {
            if let Some(index) = rows.position_of(id) {
                rows.replace(index, record);
                return Ok(true);
            }
        }
        self.rows = Some(Rowset::new(vec![record]));
        Ok(true)
    }

    // --- reads ---

    /// Value of `name` on the cursor row, in display form.
    ///
    /// Without a current row the column default is returned.
    pub fn get_field(&self, name: &str) -> Result<Value> {
        let logical = self.field_type(name)?.logical();
        self.read_field(name, logical)
    }

    /// Like [`get_field`](Self::get_field), converting as `ty` regardless of
    /// the column's own type.
    pub fn get_field_as(&self, name: &str, ty: LogicalType) -> Result<Value> {
        self.field_type(name)?;
        self.read_field(name, Some(ty))
    }

    fn read_field(&self, name: &str, logical: Option<LogicalType>) -> Result<Value> {
        self.clear_errors();
        let default = self.defaults.get(name).cloned().unwrap_or(Value::Null);
        let Some(record) = self.current_record() else {
            return Ok(default);
        };
        let raw = record.get(name).cloned().unwrap_or(Value::Null);
        let value = self.absorb(display_value(&self.format, logical, raw, default).map_err(EngineError::from))?;
        Ok(value.unwrap_or(Value::Null))
    }

    // --- writes ---

    /// What callers pass to what the store holds.
    fn to_internal(&self, field: &str, value: Value, logical: Option<LogicalType>) -> Result<Value> {
        let Some(ty) = logical else {
            return Ok(value);
        };
        if ty == LogicalType::Boolean {
            let input = match &value {
                Value::Boolean(b) => return Ok(Value::Integer(i64::from(*b))),
                Value::Integer(i) => i.to_string(),
                Value::Text(s) => s.clone(),
                other => return Err(type_mismatch(field, "boolean", other)),
            };
            let canonical = format_bool(&input, Direction::ToCanonical);
            return Ok(Value::Integer(i64::from(canonical == "1")));
        }

        let input = match value {
            Value::Text(s) => s,
            other => return Err(type_mismatch(field, "text", &other)),
        };
        Ok(Value::Text(self.format.to_canonical(&input, ty)?))
    }

    fn check_writable(&self, fields: &Record) -> Result<()> {
        for (name, _) in fields.iter() {
            self.field_type(name)?;
            if name == PRIMARY_KEY {
                return Err(EngineError::ReadOnlyField(name.to_string()));
            }
        }
        Ok(())
    }

    /// Insert a row. Columns missing from `fields` get their defaults.
    ///
    /// On success the new row replaces a pending placeholder or is appended,
    /// and the cursor moves to it. Returns the new primary key.
    pub fn insert(&mut self, fields: &Record) -> Result<Option<i64>> {
        self.clear_errors();
        self.check_writable(fields)?;

        let mut names = Vec::new();
        let mut values = Vec::new();
        for column in &self.columns {
            if column == PRIMARY_KEY {
                continue;
            }
            let value = match fields.get(column) {
                Some(value) => {
                    let logical = self.field_type(column)?.logical();
                    let Some(value) = self.absorb(self.to_internal(column, value.clone(), logical))? else {
                        return Ok(None);
                    };
                    value
                }
                None => self.defaults.get(column).cloned().unwrap_or(Value::Null),
            };
            names.push(quote_ident(column));
            values.push(value);
        }

        let table = quote_ident(&self.name);
        let sql = if names.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES", table)
        } else {
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                table,
                names.join(", "),
                vec!["?"; values.len()].join(", ")
            )
        };
        debug!(table = %self.name, %sql, "inserting row");
        if let Err(err) = self.conn.execute(&sql, params_from_iter(values.iter())) {
            self.record_error(&EngineError::from(err));
            return Ok(None);
        }
        let id = self.conn.last_insert_rowid();

        let Some(record) = self.absorb(self.fetch_record(id))? else {
            return Ok(None);
        };
        self.rows
            .get_or_insert_with(Rowset::default)
            .place_inserted(record);

        if let Some(hook) = self.hooks.get(&HookKind::AfterInsert).cloned() {
            hook.invoke(HookCall::AfterInsert { table: &mut *self })?;
        }
        Ok(Some(id))
    }

    /// Update the row `id` with `fields` and refresh it in the rowset.
    pub fn update(&mut self, id: i64, fields: &Record) -> Result<bool> {
        self.clear_errors();
        if id < 1 {
            return Ok(false);
        }
        self.check_writable(fields)?;

        let hook = self.hooks.get(&HookKind::AfterUpdate).cloned();
        if hook.is_some() {
            let Some(snapshot) = self.absorb(self.fetch_record(id))? else {
                return Ok(false);
            };
            self.x_record = Some(snapshot);
        }

        let mut assignments = Vec::new();
        let mut values = Vec::new();
        for (name, value) in fields.iter() {
            let logical = self.field_type(name)?.logical();
            let Some(value) = self.absorb(self.to_internal(name, value.clone(), logical))? else {
                return Ok(false);
            };
            assignments.push(format!("{} = ?", quote_ident(name)));
            values.push(value);
        }
        if assignments.is_empty() {
            return Ok(true);
        }
        values.push(Value::Integer(id));

        let sql = format!(
            "UPDATE {} SET {} WHERE {} = ?",
            quote_ident(&self.name),
            assignments.join(", "),
            quote_ident(PRIMARY_KEY)
        );
        debug!(table = %self.name, %sql, "updating row");
        if let Err(err) = self.conn.execute(&sql, params_from_iter(values.iter())) {
            self.record_error(&EngineError::from(err));
            return Ok(false);
        }

        let Some(record) = self.absorb(self.fetch_record(id))? else {
            return Ok(false);
        };
        if let Some(rows) = self.rows.as_mut() {
            if let Some(index) = rows.position_of(id) {
                rows.replace(index, record.clone());
            }
        }

        if let Some(hook) = hook {
            if !self.update_hook_running {
                let current = self.cursor_over(record);
                // Writes made by the hook must not replace this update's snapshot.
                let outer_snapshot = self.x_record.clone();
                let previous = self.cursor_over(outer_snapshot.clone().unwrap_or_default());
                self.update_hook_running = true;
                let result = hook.invoke(HookCall::AfterUpdate {
                    table: &mut *self,
                    current,
                    previous,
                });
                self.update_hook_running = false;
                self.x_record = outer_snapshot;
                result?;
            }
        }
        Ok(true)
    }

    /// Delete the row `id`. Returns whether a row was removed.
    ///
    /// The rowset is left as is; see [`delete_row`](Self::delete_row).
    pub fn delete(&mut self, id: i64) -> Result<bool> {
        self.clear_errors();
        let hook = self.hooks.get(&HookKind::AfterDelete).cloned();
        if hook.is_some() {
            let Some(snapshot) = self.absorb(self.fetch_record(id))? else {
                return Ok(false);
            };
            self.x_record = Some(snapshot);
        }

        let sql = format!(
            "DELETE FROM {} WHERE {} = ?",
            quote_ident(&self.name),
            quote_ident(PRIMARY_KEY)
        );
        debug!(table = %self.name, %sql, id, "deleting row");
        let removed = match self.conn.execute(&sql, [id]) {
            Ok(n) => n,
            Err(err) => {
                self.record_error(&EngineError::from(err));
                return Ok(false);
            }
        };

        if let Some(hook) = hook {
            let deleted = self.cursor_over(self.x_record.clone().unwrap_or_default());
            hook.invoke(HookCall::AfterDelete { deleted })?;
        }
        Ok(removed > 0)
    }

    /// Delete the cursor row and drop it from the rowset. The cursor moves
    /// back by one row.
    pub fn delete_row(&mut self) -> Result<bool> {
        let Some(id) = self.current_record().and_then(Record::id) else {
            return Ok(false);
        };
        if id == 0 {
            return Ok(self.cancel_new_row());
        }
        if !self.delete(id)? {
            return Ok(false);
        }
        if let Some(rows) = self.rows.as_mut() {
            rows.remove_current();
        }
        Ok(true)
    }

    /// Write one field of the cursor row to the store.
    ///
    /// With no current row, or on the placeholder, this inserts a new row
    /// holding only that field.
    pub fn save_field(&mut self, name: &str, value: impl Into<Value>) -> Result<bool> {
        let fields = Record::new().with_value(name, value);
        match self.current_record().and_then(Record::id) {
            Some(id) if id > 0 => self.update(id, &fields),
            _ => Ok(self.insert(&fields)?.is_some()),
        }
    }

    /// Append a placeholder row with default values and move onto it.
    ///
    /// An unloaded table runs [`find`](Self::find) first. Only one
    /// placeholder exists at a time.
    pub fn new_row(&mut self) -> Result<()> {
        if self.rows.is_none() {
            self.find()?;
        }
        let placeholder: Record = self
            .columns
            .iter()
            .map(|column| {
                let value = if column == PRIMARY_KEY {
                    Value::Integer(0)
                } else {
                    self.defaults.get(column).cloned().unwrap_or(Value::Null)
                };
                (column.clone(), value)
            })
            .collect();
        let rows = self.rows.get_or_insert_with(Rowset::default);
        if !rows.has_placeholder() {
            rows.rows.push(placeholder);
        }
        rows.pos = rows.rows.len() - 1;
        Ok(())
    }

    /// Drop the placeholder, if any.
    pub fn cancel_new_row(&mut self) -> bool {
        match self.rows.as_mut() {
            Some(rows) if rows.has_placeholder() => {
                rows.rows.pop();
                rows.seek(rows.pos);
                true
            }
            _ => false,
        }
    }

    /// Set a field on the in-memory cursor row without writing it.
    ///
    /// Creates a placeholder when there is no current row.
    pub fn set_field(&mut self, name: &str, value: impl Into<Value>) -> Result<bool> {
        self.clear_errors();
        let logical = self.field_type(name)?.logical();
        if name == PRIMARY_KEY {
            return Err(EngineError::ReadOnlyField(name.to_string()));
        }
        let Some(value) = self.absorb(self.to_internal(name, value.into(), logical))? else {
            return Ok(false);
        };
        if self.current_record().is_none() {
            self.new_row()?;
        }
        if let Some(record) = self.rows.as_mut().and_then(Rowset::current_mut) {
            record.set(name, value);
        }
        Ok(true)
    }

    /// Insert a defaulted row with one field set, then re-run the query.
    pub fn add_row(&mut self, field: &str, value: impl Into<Value>) -> Result<bool> {
        if self.insert(&Record::new().with_value(field, value))?.is_none() {
            return Ok(false);
        }
        self.find()?;
        Ok(true)
    }
}
