//! `before update` triggers for columns with an on-update policy.
//!
//! One plpgsql function per (policy, column name) pair, shared by every table
//! that has such a column, and one trigger per table column.

use tablecraft::{OnUpdate, Table, quote_ident};

fn function_name(policy: OnUpdate, column: &str) -> String {
    let prefix = match policy {
        OnUpdate::SetTimestamp => "onupdate_set_timestamp",
        OnUpdate::Increment => "onupdate_increment",
        OnUpdate::Regenerate => "onupdate_regenerate",
    };
    format!("{prefix}_{column}")
}

fn next_value(policy: OnUpdate, column: &str) -> String {
    match policy {
        OnUpdate::SetTimestamp => "current_timestamp".to_string(),
        OnUpdate::Increment => format!("old.{} + 1", quote_ident(column)),
        OnUpdate::Regenerate => "gen_random_uuid()".to_string(),
    }
}

/// The function refreshes the column only when the statement left it alone,
/// so an explicit assignment in the update wins.
fn function_sql(policy: OnUpdate, column: &str) -> String {
    let col = quote_ident(column);
    format!(
        "create or replace function {}() returns trigger language plpgsql as $$\
         begin if new.{col} is not distinct from old.{col} then new.{col} := {}; end if; \
         return new; end;$$",
        quote_ident(&function_name(policy, column)),
        next_value(policy, column)
    )
}

fn trigger_sql(policy: OnUpdate, table: &str, column: &str) -> String {
    format!(
        "create trigger {} before update on {} for each row execute function {}()",
        quote_ident(&format!("{table}_{column}_update")),
        quote_ident(table),
        quote_ident(&function_name(policy, column))
    )
}

/// After hook: functions first (deduplicated, in first-seen order), then triggers.
pub(crate) fn on_update_triggers(tables: &[Table]) -> Vec<String> {
    let mut functions: Vec<(OnUpdate, &str)> = Vec::new();
    let mut triggers = Vec::new();
    for table in tables {
        for column in table.columns() {
            let Some(policy) = column.params().on_update else {
                continue;
            };
            if !functions.contains(&(policy, column.name())) {
                functions.push((policy, column.name()));
            }
            triggers.push(trigger_sql(policy, table.name(), column.name()));
        }
    }
    functions
        .into_iter()
        .map(|(policy, column)| function_sql(policy, column))
        .chain(triggers)
        .collect()
}
