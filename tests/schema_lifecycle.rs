use rust_sqlite_tables::metadata::METADATA_TABLE;
use rust_sqlite_tables::{
    Database, DatabaseConfig, EngineError, FieldType, LogicalType, Record, Value,
};
use tempfile::NamedTempFile;

// Helper function to create a temporary file-based database config
fn create_temp_config() -> (DatabaseConfig, NamedTempFile) {
    let temp_file = NamedTempFile::new().unwrap();
    let path = temp_file.path().to_str().unwrap().to_string();
    (DatabaseConfig::new(path), temp_file)
}

fn field_names(db: &Database, table: &str) -> Vec<String> {
    db.metadata()
        .entries(table)
        .unwrap()
        .into_iter()
        .map(|e| e.field_name)
        .collect()
}

#[test]
fn test_create_records_logical_types() {
    let db = Database::open_in_memory().unwrap();
    let tasks = db
        .create_table(
            "tasks",
            "n::Title;t::Text;l::80|n::Done;t::Boolean|n::Due;t::Date|n::At;t::Time|n::Stamp;t::DateTime|n::Cost;t::Float",
            false,
        )
        .unwrap();

    assert_eq!(
        tasks.columns(),
        &["id", "Title", "Done", "Due", "At", "Stamp", "Cost"]
    );
    assert_eq!(tasks.field_type("Title").unwrap(), FieldType::Text);
    assert_eq!(tasks.field_type("Cost").unwrap(), FieldType::Real);
    assert_eq!(
        tasks.field_type("Done").unwrap(),
        FieldType::Logical(LogicalType::Boolean)
    );
    assert_eq!(
        tasks.field_type("Stamp").unwrap(),
        FieldType::Logical(LogicalType::DateTime)
    );
    assert_eq!(field_names(&db, "tasks"), vec!["At", "Done", "Due", "Stamp"]);
    assert!(db
        .metadata()
        .entries("tasks")
        .unwrap()
        .iter()
        .all(|e| !e.scratch));
}

#[test]
fn test_create_existing_table() {
    let db = Database::open_in_memory().unwrap();
    let mut first = db.create_table("notes", "n::Body;t::Text", false).unwrap();
    first
        .insert(&Record::new().with_value("Body", "kept"))
        .unwrap()
        .unwrap();

    assert!(matches!(
        db.create_table("notes", "n::Body;t::Text", false),
        Err(EngineError::TableExists(_))
    ));
    let mut reopened = db.create_table("notes", "n::Other;t::Integer", true).unwrap();
    assert_eq!(reopened.columns(), &["id", "Body"]);
    assert!(reopened.find().unwrap());
    assert_eq!(
        reopened.get_field("Body").unwrap(),
        Value::Text("kept".into())
    );
}

#[test]
fn test_reserved_table_name() {
    let db = Database::open_in_memory().unwrap();
    assert!(matches!(
        db.create_table(METADATA_TABLE, "n::A;t::Text", false),
        Err(EngineError::ReservedTable(_))
    ));
    assert!(matches!(
        db.alter_table(METADATA_TABLE, "drop::field_name"),
        Err(EngineError::ReservedTable(_))
    ));
    assert!(matches!(
        db.drop_table(METADATA_TABLE),
        Err(EngineError::ReservedTable(_))
    ));
    assert!(matches!(
        db.open_table(METADATA_TABLE),
        Err(EngineError::ReservedTable(_))
    ));
}

#[test]
fn test_unknown_field_type_creates_nothing() {
    let db = Database::open_in_memory().unwrap();
    let err = db
        .create_table("prices", "n::Label;t::Text|n::Price;t::Money", false)
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::UnknownFieldType { ref field, ref ty } if field == "Price" && ty == "Money"
    ));
    assert!(!err.is_data());
    assert!(!db.table_exists("prices").unwrap());
}

#[test]
fn test_open_missing_table() {
    let db = Database::open_in_memory().unwrap();
    assert!(matches!(
        db.open_table("ghost"),
        Err(EngineError::TableNotFound(_))
    ));
    assert!(matches!(
        db.alter_table("ghost", "drop::x"),
        Err(EngineError::TableNotFound(_))
    ));
}

#[test]
fn test_drop_field_removes_one_metadata_row() {
    let db = Database::open_in_memory().unwrap();
    db.create_table(
        "tasks",
        "n::ProjectId;t::Integer|n::Due;t::Date|n::Done;t::Boolean",
        false,
    )
    .unwrap();
    assert_eq!(db.metadata().entries("tasks").unwrap().len(), 2);

    let tasks = db.alter_table("tasks", "drop::Due").unwrap();
    assert_eq!(field_names(&db, "tasks"), vec!["Done"]);
    assert_eq!(tasks.columns(), &["id", "ProjectId", "Done"]);

    let tasks = db
        .alter_table("tasks", "drop::ProjectId|add::TaskId;t::Integer|add::Start;t::Time")
        .unwrap();
    assert_eq!(tasks.columns(), &["id", "Done", "TaskId", "Start"]);
    assert_eq!(field_names(&db, "tasks"), vec!["Done", "Start"]);
    assert_eq!(
        tasks.default_value("TaskId").unwrap(),
        Value::Integer(0)
    );
}

#[test]
fn test_failed_alter_rolls_back() {
    let db = Database::open_in_memory().unwrap();
    db.create_table("tasks", "n::Title;t::Text|n::Due;t::Date", false)
        .unwrap();

    let err = db
        .alter_table("tasks", "add::Start;t::Date|drop::Missing")
        .unwrap_err();
    assert!(matches!(err, EngineError::Schema { ref table, .. } if table == "tasks"));

    let tasks = db.open_table("tasks").unwrap();
    assert_eq!(tasks.columns(), &["id", "Title", "Due"]);
    assert_eq!(field_names(&db, "tasks"), vec!["Due"]);
}

#[test]
fn test_drop_table_removes_metadata() {
    let db = Database::open_in_memory().unwrap();
    db.create_table("tasks", "n::Due;t::Date", false).unwrap();
    db.drop_table("tasks").unwrap();
    assert!(!db.table_exists("tasks").unwrap());
    assert!(db.metadata().entries("tasks").unwrap().is_empty());
}

#[test]
fn test_scratch_metadata_is_purged_on_reopen() {
    let (config, _temp_file) = create_temp_config();

    let db = Database::open(config.clone()).unwrap();
    db.create_table("kept", "n::Due;t::Date", false).unwrap();
    let mut scratch = db
        .create_scratch_table("work", "n::At;t::Time|n::Note;t::Text", false)
        .unwrap();
    scratch
        .insert(&Record::new().with_value("At", "12:30:00"))
        .unwrap()
        .unwrap();
    assert_eq!(scratch.get_field("At").unwrap(), Value::Text("12:30:00".into()));
    assert!(db.metadata().entries("work").unwrap()[0].scratch);
    drop(scratch);
    db.close().unwrap();

    let db = Database::open(config).unwrap();
    assert!(!db.table_exists("work").unwrap());
    assert!(db.metadata().entries("work").unwrap().is_empty());
    assert_eq!(field_names(&db, "kept"), vec!["Due"]);
}

#[test]
fn test_purge_can_be_disabled() {
    let (config, _temp_file) = create_temp_config();
    let db = Database::open(config.clone()).unwrap();
    db.create_scratch_table("work", "n::On;t::Date", false).unwrap();
    db.close().unwrap();

    let config = DatabaseConfig {
        purge_scratch_on_open: false,
        ..config
    };
    let db = Database::open(config).unwrap();
    assert_eq!(field_names(&db, "work"), vec!["On"]);
}

#[test]
fn test_file_database_persists_rows() {
    let (config, _temp_file) = create_temp_config();
    {
        let db = Database::open(config.clone()).unwrap();
        let mut events = db
            .create_table("events", "n::Name;t::Text|n::On;t::Date", false)
            .unwrap();
        events
            .insert(&Record::new().with_value("Name", "launch").with_value("On", "01.02.2024"))
            .unwrap()
            .unwrap();
    }

    let db = Database::open(config).unwrap();
    let mut events = db.open_table("events").unwrap();
    assert!(events.find().unwrap());
    assert_eq!(events.get_field("On").unwrap(), Value::Text("01.02.2024".into()));
}

#[test]
fn test_config_from_json() {
    let config: DatabaseConfig = serde_json::from_str(
        r#"{ "db_path": "tables.db", "format": { "date_format": "yyyy-mm-dd" } }"#,
    )
    .unwrap();
    assert_eq!(config.db_path, "tables.db");
    assert_eq!(config.format.date_format, "yyyy-mm-dd");
    assert_eq!(config.format.time_format, "hh:ii:ss");
    assert!(config.purge_scratch_on_open);
    assert!(!config.is_in_memory());

    let empty: DatabaseConfig = serde_json::from_str("{}").unwrap();
    assert_eq!(empty, DatabaseConfig::default());
}
