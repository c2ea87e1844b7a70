use crate::ast::{
    Completion, Event, Expr, JsonAuditLog, KeyStrategy, Outbox, RuleOptions, TableRef, UpdatedAt,
};
use crate::compiler::{ColumnDef, Compilation, ProcedureSpec, ReturnContract, TableSpec, Timing};
use crate::guard::{body, RETURN_ROW};
use crate::naming;
use crate::quote::Quoting;
use crate::timestamps;

const AUDIT_COLUMNS: [&str; 7] = ["txid", "at", "user", "schema", "table", "action", "prior"];

fn audit_table(name: &TableRef) -> TableSpec {
    TableSpec {
        name: name.clone(),
        columns: vec![
            ColumnDef::new("txid", "bigint").not_null(),
            ColumnDef::new("at", "timestamptz")
                .not_null()
                .default_value("CURRENT_TIMESTAMP"),
            ColumnDef::new("user", "text").not_null(),
            ColumnDef::new("schema", "text").not_null(),
            ColumnDef::new("table", "text").not_null(),
            ColumnDef::new("action", "text").not_null(),
            ColumnDef::new("prior", "jsonb").not_null(),
        ],
        indexes: vec![vec!["txid".to_owned()]],
    }
}

pub fn json_audit_log(quoting: &dyn Quoting, rule: &JsonAuditLog) -> Compilation {
    let function = naming::json_audit_log_function(quoting, rule);
    let columns = AUDIT_COLUMNS
        .iter()
        .map(|column| quoting.quote_identifier(column))
        .collect::<Vec<_>>()
        .join(", ");
    let statements = format!(
        "INSERT INTO {} ({}) VALUES\n  (txid_current(), CURRENT_TIMESTAMP, CURRENT_USER, TG_TABLE_SCHEMA, TG_TABLE_NAME, TG_OP, to_jsonb(OLD));",
        quoting.quote_schema_table(&rule.log_table),
        columns
    );

    let mut compilation = Compilation::default();
    compilation.tables.push(audit_table(&rule.log_table));
    compilation.procedures.push(ProcedureSpec {
        name: function.clone(),
        table: None,
        body: body(&[], rule.options.trigger_depth_limit, &statements, RETURN_ROW),
        returns: ReturnContract::RowImage,
    });
    for table in &rule.tables {
        compilation.attach(
            table,
            naming::json_audit_log_trigger(quoting, rule, table),
            function.clone(),
            &[Event::Update, Event::Delete],
            Timing::After,
            None,
        );
    }
    compilation
}

pub const OUTBOX_UPDATED_COLUMN: &str = "updated";

fn outbox_table(rule: &Outbox) -> TableSpec {
    let id = match rule.key {
        KeyStrategy::Serial => ColumnDef::new("id", "bigserial").primary_key(),
        KeyStrategy::Uuid => ColumnDef::new("id", "uuid")
            .primary_key()
            .default_value("gen_random_uuid()"),
    };
    let completed = match rule.completion {
        Completion::Timestamp => ColumnDef::new("completed", "timestamptz"),
        Completion::Boolean => ColumnDef::new("completed", "boolean")
            .not_null()
            .default_value("false"),
    };
    TableSpec {
        name: outbox_table_ref(rule),
        columns: vec![
            id,
            ColumnDef::new("attempts", "integer")
                .not_null()
                .default_value("0"),
            ColumnDef::new("created", "timestamptz").default_value("CURRENT_TIMESTAMP"),
            ColumnDef::new(OUTBOX_UPDATED_COLUMN, "timestamptz"),
            ColumnDef::new("attempted", "timestamptz"),
            completed,
            ColumnDef::new("event_type", "text").not_null(),
            ColumnDef::new("last_error", "text"),
            ColumnDef::new("data_before", "jsonb"),
            ColumnDef::new("data_after", "jsonb"),
            ColumnDef::new("metadata", "jsonb"),
        ],
        indexes: vec![vec!["created".to_owned()], vec!["attempted".to_owned()]],
    }
}

pub fn outbox_table_ref(rule: &Outbox) -> TableRef {
    rule.outbox_table.clone().unwrap_or_else(|| TableRef {
        schema: rule.table.schema.clone(),
        name: format!("{}_outbox", rule.table.name),
    })
}

pub fn outbox(quoting: &dyn Quoting, rule: &Outbox) -> Compilation {
    let names = naming::outbox(quoting, rule);
    let storage = outbox_table(rule);
    let target = quoting.quote_schema_table(&storage.name);
    let prefix = rule
        .event_prefix
        .clone()
        .unwrap_or_else(|| rule.table.name.clone());
    let event = |suffix: &str| quoting.literal(&Expr::String(format!("{}_{}", prefix, suffix)));
    let event_type = quoting.quote_identifier("event_type");
    let before = quoting.quote_identifier("data_before");
    let after = quoting.quote_identifier("data_after");

    let statements = format!(
        "IF (TG_OP = 'INSERT') THEN
  INSERT INTO {target} ({event_type}, {after}) VALUES ({created}, to_jsonb(NEW));
ELSIF (TG_OP = 'UPDATE') THEN
  INSERT INTO {target} ({event_type}, {before}, {after}) VALUES ({updated}, to_jsonb(OLD), to_jsonb(NEW));
ELSIF (TG_OP = 'DELETE') THEN
  INSERT INTO {target} ({event_type}, {before}) VALUES ({deleted}, to_jsonb(OLD));
END IF;",
        target = target,
        event_type = event_type,
        before = before,
        after = after,
        created = event("created"),
        updated = event("updated"),
        deleted = event("deleted"),
    );

    // Keeps the outbox row's own `updated` column current while consumers
    // record attempts against it.
    let touch_updated = timestamps::updated_at(
        quoting,
        &UpdatedAt {
            table: storage.name.clone(),
            column: OUTBOX_UPDATED_COLUMN.to_owned(),
            options: RuleOptions {
                function_name: Some(format!("{}_updated", names.function)),
                trigger_name: Some(format!("{}_updated", names.trigger)),
                trigger_depth_limit: None,
            },
        },
    );

    let events = rule.trigger_events();
    let when = rule.when.as_ref().map(|when| quoting.literal(when));

    let mut compilation = Compilation::default();
    compilation.procedures.push(ProcedureSpec {
        name: names.function.clone(),
        table: Some(rule.table.clone()),
        body: body(&[], rule.options.trigger_depth_limit, &statements, RETURN_ROW),
        returns: ReturnContract::RowImage,
    });
    compilation.attach(
        &rule.table,
        names.trigger,
        names.function,
        &events,
        Timing::After,
        when,
    );
    compilation.tables.push(storage);
    compilation.procedures.extend(touch_updated.procedures);
    compilation.triggers.extend(touch_updated.triggers);
    compilation
}
