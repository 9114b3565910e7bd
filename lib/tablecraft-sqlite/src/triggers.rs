//! On-update maintenance for SQLite.
//!
//! SQLite triggers cannot assign to `new`, so each table with on-update
//! columns gets a single `after update` trigger that rewrites the row. A
//! column the statement already changed keeps its new value. One trigger per
//! table matters: with several, each one's rewrite would fire the others.

use tablecraft::{OnUpdate, Table, quote_ident};

use crate::driver::{NOW_EXPRESSION, UUID_EXPRESSION};

fn next_value(policy: OnUpdate, column: &str) -> String {
    match policy {
        OnUpdate::SetTimestamp => NOW_EXPRESSION.to_string(),
        OnUpdate::Increment => format!("old.{} + 1", quote_ident(column)),
        OnUpdate::Regenerate => UUID_EXPRESSION.to_string(),
    }
}

fn trigger_sql(table: &Table) -> Option<String> {
    let assignments: Vec<String> = table
        .columns()
        .iter()
        .filter_map(|column| {
            let policy = column.params().on_update?;
            let c = quote_ident(column.name());
            Some(format!(
                "{c} = case when new.{c} is old.{c} then {} else new.{c} end",
                next_value(policy, column.name())
            ))
        })
        .collect();
    if assignments.is_empty() {
        return None;
    }
    let t = quote_ident(table.name());
    Some(format!(
        "create trigger {} after update on {t} for each row \
         begin update {t} set {} where rowid = new.rowid; end",
        quote_ident(&format!("{}_on_update", table.name())),
        assignments.join(", ")
    ))
}

pub(crate) fn on_update_triggers(tables: &[Table]) -> Vec<String> {
    tables.iter().filter_map(trigger_sql).collect()
}
