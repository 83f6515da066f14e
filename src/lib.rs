//! Dynamic-schema tables over SQLite.
//!
//! # Intention
//!
//! - Let callers define tables at run time from a compact field DSL and work
//!   with them through a cursor-based [`Table`] handle.
//! - Keep logical types (Boolean, Date, Time, DateTime) apart from SQLite's
//!   physical storage classes, recorded in a metadata side table.
//! - Convert date and time values between a sortable canonical encoding and
//!   configurable display templates.
//!
//! # Architectural Boundaries
//!
//! - Only SQLite/database code belongs here.
//! - Callbacks are plain Rust closures registered in a [`HookDispatcher`]; no
//!   scripting runtime is embedded.
//! - Single-threaded: a [`Database`] and its tables share one connection.
//!
//! ```no_run
//! use rust_sqlite_tables::{Database, Record};
//!
//! # fn main() -> rust_sqlite_tables::Result<()> {
//! let db = Database::open_in_memory()?;
//! let mut people = db.create_table("people", "n::Name;t::Text;l::100|n::Born;t::Date", false)?;
//! people.insert(&Record::new().with_value("Name", "Ada").with_value("Born", "10.12.1815"))?;
//! people.set_filter("Born", "<01.01.1900")?;
//! if people.find()? {
//!     loop {
//!         println!("{}", people.get_field("Name")?);
//!         if !people.next() {
//!             break;
//!         }
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod database;
pub mod error;
pub mod filter;
pub mod format;
pub mod hooks;
pub mod metadata;
pub mod schema;
pub mod table;
pub mod value;

pub use config::{DatabaseConfig, FormatConfig};
pub use database::Database;
pub use error::{EngineError, ErrorClass, Result};
pub use format::{Direction, FormatEngine, FormatError, LogicalType};
pub use hooks::{HookCall, HookDispatcher, HookKind, RegisteredHook, TableHook};
pub use metadata::{FieldType, TableMetadata, TypeMetadataStore};
pub use schema::SchemaManager;
pub use table::{RowCursor, Rowset, Table};
pub use value::{Record, Value};
