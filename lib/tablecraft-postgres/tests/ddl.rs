#![allow(clippy::unwrap_used)]

use tablecraft::schema::{self, Column, ColumnKind};
use tablecraft::{
    ColumnPhysical, ConfigurationError, Driver, Shape, Table, compile, define_table, foreign_key,
    foreign_key_untyped,
};
use tablecraft_postgres::driver;

fn create_sql(table: &Table) -> String {
    let compiled = compile(std::slice::from_ref(table), &driver()).unwrap();
    compiled.artifacts[0].create.to_sql()
}

#[test]
fn test_auto_increment_pk_and_created_at() {
    let t = define_table(
        "t",
        [
            ("id", schema::pk_auto_increment()),
            ("name", schema::string()),
            ("created_at", schema::created_at()),
        ],
    )
    .unwrap();
    let compiled = compile(&[t], &driver()).unwrap();
    assert_eq!(
        compiled.statements(),
        vec![
            "create table \"t\" (\"id\" bigserial not null primary key, \"name\" text not null, \
             \"created_at\" timestamptz default now() not null)"
        ]
    );
}

#[test]
fn test_concurrency_columns() {
    let t = define_table(
        "t",
        [
            ("id", schema::int32().primary_key().auto_increment()),
            ("row_version", schema::row_version()),
            ("concurrency_stamp", schema::concurrency_stamp()),
        ],
    )
    .unwrap();
    assert_eq!(
        create_sql(&t),
        "create table \"t\" (\"id\" serial not null primary key, \
         \"row_version\" bigint default 1 not null, \
         \"concurrency_stamp\" uuid default gen_random_uuid() not null)"
    );
}

#[test]
fn test_every_kind() {
    let t = define_table(
        "kinds",
        [
            ("a", schema::int32()),
            ("b", schema::int64()),
            ("c", schema::bigint()),
            ("d", schema::float32()),
            ("e", schema::float64()),
            ("f", schema::decimal(12, 4)),
            ("g", schema::uuid()),
            ("h", schema::string()),
            ("i", schema::varchar(40)),
            ("j", schema::boolean()),
            ("k", schema::datetime()),
            ("l", schema::date_part()),
            ("m", schema::time_part()),
            ("n", schema::json()),
            ("o", schema::json_binary().nullable()),
        ],
    )
    .unwrap();
    assert_eq!(
        create_sql(&t),
        "create table \"kinds\" (\"a\" integer not null, \"b\" bigint not null, \
         \"c\" numeric not null, \"d\" real not null, \"e\" double precision not null, \
         \"f\" decimal(12, 4) not null, \"g\" uuid not null, \"h\" text not null, \
         \"i\" varchar(40) not null, \"j\" boolean not null, \"k\" timestamptz not null, \
         \"l\" date not null, \"m\" time not null, \"n\" json not null, \"o\" jsonb)"
    );
}

#[test]
fn test_literal_defaults_use_storage_form() {
    let t = define_table(
        "t",
        [
            ("flag", schema::boolean().default_value(true)),
            ("label", schema::string().default_value("it's")),
            ("price", schema::decimal(6, 2).default_value("1.5")),
            ("note", schema::string().nullable().default_value(tablecraft::Value::Null)),
        ],
    )
    .unwrap();
    assert_eq!(
        create_sql(&t),
        "create table \"t\" (\"flag\" boolean default true not null, \
         \"label\" text default 'it''s' not null, \
         \"price\" decimal(6, 2) default 1.50 not null, \"note\" text default null)"
    );
}

#[test]
fn test_foreign_keys() {
    let person = define_table("person", [("id", schema::pk_auto_increment())]).unwrap();
    let pet = define_table(
        "pet",
        [
            ("id", schema::pk_auto_increment()),
            ("owner_id", foreign_key(&person, "id").unwrap()),
        ],
    )
    .unwrap();
    let compiled = compile(&[person, pet], &driver()).unwrap();
    assert_eq!(
        compiled.artifact("pet").unwrap().create.to_sql(),
        "create table \"pet\" (\"id\" bigserial not null primary key, \"owner_id\" bigint not null, \
         constraint \"FOREIGN_KEY_pet_owner_id_TO_person_id\" foreign key (\"owner_id\") \
         references \"person\" (\"id\"))"
    );
}

#[test]
fn test_self_reference() {
    let employee = define_table(
        "employee",
        [
            ("id", schema::pk_auto_increment()),
            (
                "manager_id",
                foreign_key_untyped(schema::int64().nullable(), "employee", "id"),
            ),
        ],
    )
    .unwrap();
    let sql = create_sql(&employee);
    assert!(sql.ends_with(
        "\"manager_id\" bigint, constraint \"FOREIGN_KEY_employee_manager_id_TO_employee_id\" \
         foreign key (\"manager_id\") references \"employee\" (\"id\"))"
    ));
}

#[test]
fn test_json_shape_adds_table_check() {
    let t = define_table(
        "t",
        [
            ("tags", schema::json_binary().shape(Shape::array(Shape::String))),
            ("meta", schema::json().shape(Shape::object([("v", Shape::Integer)]))),
            ("raw", schema::json().shape(Shape::Any)),
        ],
    )
    .unwrap();
    assert_eq!(
        create_sql(&t),
        "create table \"t\" (\"tags\" jsonb not null, \"meta\" json not null, \"raw\" json not null, \
         check (jsonb_typeof(\"tags\") = 'array'), check (json_typeof(\"meta\") = 'object'))"
    );
}

#[test]
fn test_on_update_statements_follow_tables() {
    let t = define_table(
        "t",
        [
            ("id", schema::pk_auto_increment()),
            ("updated_at", schema::updated_at()),
            ("concurrency_stamp", schema::concurrency_stamp()),
        ],
    )
    .unwrap();
    let compiled = compile(&[t], &driver()).unwrap();
    assert_eq!(compiled.after.len(), 4);
    assert!(compiled.after[1].contains("new.\"concurrency_stamp\" := gen_random_uuid();"));
    assert_eq!(
        compiled.after[3],
        "create trigger \"t_concurrency_stamp_update\" before update on \"t\" for each row \
         execute function \"onupdate_regenerate_concurrency_stamp\"()"
    );
    let statements = compiled.statements();
    assert!(statements[0].starts_with("create table"));
    assert_eq!(statements.len(), 5);
}

#[test]
fn test_compile_is_deterministic() {
    let tables = || {
        vec![
            define_table(
                "a",
                [
                    ("id", schema::pk_auto_increment()),
                    ("updated_at", schema::updated_at()),
                    ("row_version", schema::row_version()),
                ],
            )
            .unwrap(),
        ]
    };
    assert_eq!(
        compile(&tables(), &driver()).unwrap(),
        compile(&tables(), &driver()).unwrap()
    );
}

#[test]
fn test_merge_overrides_a_kind() {
    let overrides = Driver::new("postgres").with_resolver(ColumnKind::String, |c: &Column| {
        Ok(ColumnPhysical::new("citext", c))
    });
    let merged = driver().merge(overrides);
    let t = define_table(
        "t",
        [("email", schema::string()), ("n", schema::int64())],
    )
    .unwrap();
    let compiled = compile(&[t], &merged).unwrap();
    assert_eq!(
        compiled.artifacts[0].create.to_sql(),
        "create table \"t\" (\"email\" citext not null, \"n\" bigint not null)"
    );
    assert_eq!(merged.engine(), "postgres");
}

#[test]
fn test_custom_kind_needs_a_resolver() {
    let t = define_table("t", [("geo", schema::custom("geometry"))]).unwrap();
    let err = compile(&[t], &driver()).unwrap_err();
    assert!(matches!(
        err,
        ConfigurationError::UnknownColumnKind { ref column, .. } if column == "geo"
    ));
}

#[test]
fn test_helper_columns() {
    let t = define_table(
        "t",
        [
            ("email", schema::email()),
            ("updated_at", schema::updated_at()),
        ],
    )
    .unwrap();
    assert_eq!(
        create_sql(&t),
        "create table \"t\" (\"email\" varchar(320) not null, \
         \"updated_at\" timestamptz default now() not null)"
    );
}
