//! Round trips against a live server.
//!
//! Set `TABLECRAFT_POSTGRES_URL` to run these; without it they return early.

#![allow(clippy::unwrap_used)]

use tablecraft::schema::{self};
use tablecraft::{Row, Session, SessionConfig, SessionConnection, Shape, Value, define_table};
use tablecraft_postgres::{PgStore, driver};

fn database_url() -> Option<String> {
    std::env::var("TABLECRAFT_POSTGRES_URL").ok()
}

fn session(suffix: &str) -> (String, Session) {
    let name = format!("account_{suffix}");
    let table = define_table(
        name.as_str(),
        [
            ("id", schema::pk_auto_increment()),
            ("balance", schema::bigint()),
            ("rate", schema::decimal(8, 3)),
            ("tags", schema::json().shape(Shape::array(Shape::String))),
            ("active", schema::boolean()),
            ("row_version", schema::row_version()),
            ("updated_at", schema::updated_at()),
        ],
    )
    .unwrap();
    let session = Session::new(SessionConfig {
        tables: vec![table],
        driver: driver(),
    })
    .unwrap();
    (name, session)
}

#[tokio::test]
async fn test_insert_update_select() {
    let Some(url) = database_url() else {
        return;
    };
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    let (table, session) = session(&suffix[..12]);
    let store = PgStore::connect(url, session).await.unwrap();
    store.initialize().await.unwrap();

    let inserted = store
        .insert_returning(
            &table,
            Row::new()
                .with("balance", i128::MAX)
                .with("rate", "0.5")
                .with("tags", serde_json::json!(["a", "b"]))
                .with("active", true),
        )
        .await
        .unwrap();
    assert_eq!(inserted.get("balance"), Some(&Value::BigInt(i128::MAX)));
    assert_eq!(inserted.get("rate"), Some(&Value::Decimal("0.500".into())));
    assert_eq!(inserted.get("row_version"), Some(&Value::Int(1)));
    let id = inserted.get("id").cloned().unwrap();

    let updated = store
        .update(
            &table,
            Row::new().with("active", false),
            Row::new().with("id", id).with("row_version", 1i64),
        )
        .await
        .unwrap();
    assert_eq!(updated, 1);

    let rows = store.select_all(&table).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("active"), Some(&Value::Bool(false)));
    assert_eq!(rows[0].get("row_version"), Some(&Value::Int(2)));
}
