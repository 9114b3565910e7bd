#![allow(clippy::unwrap_used)]

use chrono::{DateTime, TimeZone, Utc};
use tablecraft::{ConversionIssue, Row, TableRow, Value};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, TableRow)]
#[table_row(table = "person")]
struct Person {
    #[column(read_only)]
    id: i64,
    first_name: String,
    #[column(name = "supervisor_id")]
    supervisor: Option<i64>,
    #[column(read_only)]
    concurrency_stamp: Uuid,
    #[column(read_only)]
    created_at: DateTime<Utc>,
    #[column(skip)]
    dirty: bool,
}

fn sample() -> Person {
    Person {
        id: 7,
        first_name: "Ada".into(),
        supervisor: None,
        concurrency_stamp: Uuid::nil(),
        created_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        dirty: false,
    }
}

#[test]
fn test_metadata() {
    assert_eq!(Person::table_name(), "person");
    assert_eq!(
        Person::columns(),
        &["id", "first_name", "supervisor_id", "concurrency_stamp", "created_at"]
    );
}

#[test]
fn test_insertable_row_skips_read_only_fields() {
    let row = sample().insertable_row();
    assert_eq!(
        row.columns().collect::<Vec<_>>(),
        vec!["first_name", "supervisor_id"]
    );
    assert_eq!(row.get("supervisor_id"), Some(&Value::Null));
}

#[test]
fn test_row_round_trip() {
    let person = sample();
    assert_eq!(Person::from_row(person.to_row()).unwrap(), person);
}

#[test]
fn test_missing_optional_column_reads_as_none() {
    let mut row = sample().to_row();
    row.take("supervisor_id");
    assert_eq!(Person::from_row(row).unwrap().supervisor, None);
}

#[test]
fn test_wrong_type_names_the_column() {
    let row: Row = sample().to_row().into_iter().collect();
    let mut row = row;
    row.set("id", "seven");
    let err = Person::from_row(row).unwrap_err();
    assert_eq!(err.table, "person");
    assert_eq!(err.column, "id");
    assert!(matches!(err.issue, ConversionIssue::TypeMismatch { .. }));
}
