use crate::ast::{CreatedAt, Event, ForceDefaults, UpdatedAt};
use crate::compiler::{Compilation, Timing};
use crate::guard::body;
use crate::naming;
use crate::quote::Quoting;

pub fn created_at(quoting: &dyn Quoting, rule: &CreatedAt) -> Compilation {
    let column = quoting.quote_identifier(&rule.column);
    let statements = format!(
        "IF (TG_OP = 'UPDATE') THEN\n  NEW.{column} := OLD.{column};\nELSIF (TG_OP = 'INSERT') THEN\n  NEW.{column} := CURRENT_TIMESTAMP;\nEND IF;",
        column = column
    );

    let mut compilation = Compilation::default();
    compilation.add_trigger(
        &rule.table,
        naming::created_at(quoting, rule),
        &[Event::Insert, Event::Update],
        Timing::Before,
        body(&[], rule.options.trigger_depth_limit, &statements, "RETURN NEW;"),
    );
    compilation
}

pub fn updated_at(quoting: &dyn Quoting, rule: &UpdatedAt) -> Compilation {
    let statements = format!(
        "NEW.{} := CURRENT_TIMESTAMP;",
        quoting.quote_identifier(&rule.column)
    );

    let mut compilation = Compilation::default();
    compilation.add_trigger(
        &rule.table,
        naming::updated_at(quoting, rule),
        &[Event::Insert, Event::Update],
        Timing::Before,
        body(&[], rule.options.trigger_depth_limit, &statements, "RETURN NEW;"),
    );
    compilation
}

pub fn force_defaults(quoting: &dyn Quoting, rule: &ForceDefaults) -> Compilation {
    let statements = rule
        .defaults
        .iter()
        .map(|(column, value)| {
            format!(
                "NEW.{} := {};",
                quoting.quote_identifier(column),
                quoting.literal(value)
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let mut compilation = Compilation::default();
    compilation.add_trigger(
        &rule.table,
        naming::force_defaults(quoting, rule),
        &[Event::Insert],
        Timing::Before,
        body(&[], rule.options.trigger_depth_limit, &statements, "RETURN NEW;"),
    );
    compilation
}
