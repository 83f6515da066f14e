//! Entry point: one SQLite connection plus the components built on it.

use std::rc::Rc;
use std::sync::Arc;

use rusqlite::Connection;
use tracing::info;

use crate::config::DatabaseConfig;
use crate::error::Result;
use crate::format::FormatEngine;
use crate::metadata::TypeMetadataStore;
use crate::schema::{CreateOutcome, SchemaManager};
use crate::table::Table;

/// An open database.
///
/// Owns the connection and shares it with every [`Table`] opened from it.
/// Tables keep the [`FormatEngine`] they were opened with; changing the
/// templates here affects tables opened afterwards.
#[derive(Debug)]
pub struct Database {
    config: DatabaseConfig,
    conn: Rc<Connection>,
    format: Arc<FormatEngine>,
    metadata: TypeMetadataStore,
    schema: SchemaManager,
}

impl Database {
    /// Open (or create) the database described by `config`.
    ///
    /// Creates the metadata table when missing and, unless disabled, drops
    /// metadata left behind by scratch tables of an earlier connection.
    pub fn open(config: DatabaseConfig) -> Result<Self> {
        let format = FormatEngine::new(&config.format)?;
        info!(path = %config.db_path, "opening database");
        let conn = if config.is_in_memory() {
            Connection::open_in_memory()?
        } else {
            Connection::open(&config.db_path)?
        };
        let conn = Rc::new(conn);

        let metadata = TypeMetadataStore::new(Rc::clone(&conn));
        metadata.ensure_schema()?;
        if config.purge_scratch_on_open {
            metadata.purge_scratch()?;
        }
        let schema = SchemaManager::new(Rc::clone(&conn), metadata.clone());

        Ok(Self {
            config,
            conn,
            format: Arc::new(format),
            metadata,
            schema,
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::open(DatabaseConfig::default())
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    pub fn path(&self) -> &str {
        &self.config.db_path
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn format(&self) -> &Arc<FormatEngine> {
        &self.format
    }

    pub fn metadata(&self) -> &TypeMetadataStore {
        &self.metadata
    }

    pub fn schema(&self) -> &SchemaManager {
        &self.schema
    }

    pub fn set_date_format(&mut self, template: &str) -> Result<()> {
        Arc::make_mut(&mut self.format).set_date_format(template)?;
        self.config.format.date_format = template.to_string();
        Ok(())
    }

    pub fn set_time_format(&mut self, template: &str) -> Result<()> {
        Arc::make_mut(&mut self.format).set_time_format(template)?;
        self.config.format.time_format = template.to_string();
        Ok(())
    }

    pub fn set_date_time_format(&mut self, template: &str) -> Result<()> {
        Arc::make_mut(&mut self.format).set_date_time_format(template)?;
        self.config.format.date_time_format = template.to_string();
        Ok(())
    }

    pub fn table_exists(&self, name: &str) -> Result<bool> {
        self.schema.table_exists(name)
    }

    pub fn open_table(&self, name: &str) -> Result<Table> {
        Table::open(Rc::clone(&self.conn), Arc::clone(&self.format), name)
    }

    /// Create a table from the field DSL and open it. With `open_if_exists`
    /// an existing table is opened as is.
    pub fn create_table(&self, name: &str, fields: &str, open_if_exists: bool) -> Result<Table> {
        self.create(name, fields, open_if_exists, false)
    }

    /// Like [`create_table`](Self::create_table), for a table that lives only
    /// as long as this connection.
    pub fn create_scratch_table(
        &self,
        name: &str,
        fields: &str,
        open_if_exists: bool,
    ) -> Result<Table> {
        self.create(name, fields, open_if_exists, true)
    }

    fn create(&self, name: &str, fields: &str, open_if_exists: bool, scratch: bool) -> Result<Table> {
        if self.schema.create_table(name, fields, open_if_exists, scratch)?
            == CreateOutcome::AlreadyExists
        {
            info!(table = name, "opening existing table");
        }
        self.open_table(name)
    }

    /// Apply the alter DSL and reopen the table with its new columns.
    pub fn alter_table(&self, name: &str, changes: &str) -> Result<Table> {
        self.schema.alter_table(name, changes)?;
        self.open_table(name)
    }

    pub fn drop_table(&self, name: &str) -> Result<()> {
        self.schema.drop_table(name)
    }

    /// Close the connection. Tables still open keep it alive until they are
    /// dropped.
    pub fn close(self) -> Result<()> {
        let Database {
            conn,
            metadata,
            schema,
            ..
        } = self;
        drop(schema);
        drop(metadata);
        match Rc::try_unwrap(conn) {
            Ok(conn) => conn.close().map_err(|(_, err)| err.into()),
            Err(_) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_bootstraps_metadata_table() {
        let db = Database::open_in_memory().unwrap();
        let count: i64 = db
            .connection()
            .query_row(
                "SELECT count(*) FROM sqlite_master WHERE name = 'table_metadata'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_format_change_applies_to_tables_opened_later() {
        let mut db = Database::open_in_memory().unwrap();
        db.create_table("events", "n::On;t::Date", false).unwrap();
        let before = db.open_table("events").unwrap();
        db.set_date_format("yyyy-mm-dd").unwrap();
        let after = db.open_table("events").unwrap();
        assert_eq!(before.format().config().date_format, "dd.mm.yyyy");
        assert_eq!(after.format().config().date_format, "yyyy-mm-dd");
        assert_eq!(db.config().format.date_format, "yyyy-mm-dd");
    }

    #[test]
    fn test_invalid_template_in_config() {
        let mut config = DatabaseConfig::default();
        config.format.time_format = "hh:xx".into();
        assert!(Database::open(config).is_err());
    }
}
