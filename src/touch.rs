use itertools::Itertools;

use crate::ast::{Row, Touch};
use crate::compiler::{Compilation, Timing, ALL_EVENTS};
use crate::guard::{body, RETURN_ROW};
use crate::naming;
use crate::quote::Quoting;

// The update only fires for rows whose timestamp is older than the current
// transaction time (or NULL), so the timestamp never moves backwards and two
// tables touching each other stop after one round trip.
pub fn touch(quoting: &dyn Quoting, rule: &Touch) -> Compilation {
    let table = quoting.quote_schema_table(&rule.touch_table);
    let column = quoting.quote_identifier(&rule.column);

    let condition = |row: Row| {
        rule.expr
            .iter()
            .map(|(touch_column, main_column)| {
                format!(
                    "{} = {}.{}",
                    quoting.quote_identifier(touch_column),
                    row.keyword(),
                    quoting.quote_identifier(main_column)
                )
            })
            .join(" AND ")
    };
    let update = |row: Row| {
        format!(
            "UPDATE {} SET {} = CURRENT_TIMESTAMP WHERE {} AND ({} < CURRENT_TIMESTAMP OR {} IS NULL);",
            table,
            column,
            condition(row),
            column,
            column
        )
    };
    let same_key = rule
        .expr
        .iter()
        .map(|(_, main_column)| {
            let main_column = quoting.quote_identifier(main_column);
            format!("NEW.{} IS NOT DISTINCT FROM OLD.{}", main_column, main_column)
        })
        .join(" AND ");

    let statements = format!(
        "IF (TG_OP = 'UPDATE' AND ({same_key})) THEN\n  {new}\nELSE\n  IF (TG_OP = 'INSERT' OR TG_OP = 'UPDATE') THEN\n    {new}\n  END IF;\n  IF (TG_OP = 'DELETE' OR TG_OP = 'UPDATE') THEN\n    {old}\n  END IF;\nEND IF;",
        same_key = same_key,
        new = update(Row::New),
        old = update(Row::Old),
    );

    let mut compilation = Compilation::default();
    compilation.add_trigger(
        &rule.main_table,
        naming::touch(quoting, rule),
        &ALL_EVENTS,
        Timing::After,
        body(&[], rule.options.trigger_depth_limit, &statements, RETURN_ROW),
    );
    compilation
}
