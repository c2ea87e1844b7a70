use crate::ast::{CounterCache, Expr, Qualifier, Row, SumCache, SumThroughManyCache};
use crate::compiler::{Compilation, Timing, ALL_EVENTS};
use crate::delta::{Amount, Delta, OnUnchanged, Selector};
use crate::guard::{body, RETURN_ROW};
use crate::naming;
use crate::quote::Quoting;

fn coalesced(quoting: &dyn Quoting, expr: &Expr) -> String {
    format!("COALESCE({}, 0)", quoting.literal(expr))
}

fn row_values(quoting: &dyn Quoting, expr: &Expr) -> Amount {
    Amount::Values {
        new: coalesced(quoting, &expr.for_row(Row::New)),
        old: coalesced(quoting, &expr.for_row(Row::Old)),
    }
}

pub fn counter_cache(quoting: &dyn Quoting, rule: &CounterCache) -> Compilation {
    let key = quoting.quote_identifier(&rule.counted_table_id_column);
    let delta = Delta {
        target: quoting.quote_schema_table(&rule.main_table),
        aggregate: quoting.quote_identifier(&rule.counter_column),
        key: vec![key.clone()],
        selector: Selector::Column {
            column: quoting.quote_identifier(&rule.main_table_id_column),
            key,
        },
        amount: Amount::Constant(1),
        on_unchanged: OnUnchanged::Skip,
    };

    let mut compilation = Compilation::default();
    compilation.add_trigger(
        &rule.counted_table,
        naming::counter_cache(quoting, rule),
        &ALL_EVENTS,
        Timing::After,
        body(&[], rule.options.trigger_depth_limit, &delta.to_sql(), RETURN_ROW),
    );
    compilation
}

pub fn sum_cache(quoting: &dyn Quoting, rule: &SumCache) -> Compilation {
    let key = quoting.quote_identifier(&rule.summed_table_id_column);
    let delta = Delta {
        target: quoting.quote_schema_table(&rule.main_table),
        aggregate: quoting.quote_identifier(&rule.sum_column),
        key: vec![key.clone()],
        selector: Selector::Column {
            column: quoting.quote_identifier(&rule.main_table_id_column),
            key,
        },
        amount: row_values(quoting, &rule.summed_column),
        on_unchanged: OnUnchanged::Adjust,
    };

    let mut compilation = Compilation::default();
    compilation.add_trigger(
        &rule.summed_table,
        naming::sum_cache(quoting, rule),
        &ALL_EVENTS,
        Timing::After,
        body(&[], rule.options.trigger_depth_limit, &delta.to_sql(), RETURN_ROW),
    );
    compilation
}

pub fn sum_through_many_cache(quoting: &dyn Quoting, rule: &SumThroughManyCache) -> Compilation {
    let (summed_names, join_names) = naming::sum_through_many_cache(quoting, rule);

    let main_table = quoting.quote_schema_table(&rule.main_table);
    let main_id = quoting.quote_identifier(&rule.main_table_id_column);
    let sum_column = quoting.quote_identifier(&rule.sum_column);
    let summed_table = quoting.quote_schema_table(&rule.summed_table);
    let summed_id = quoting.quote_identifier(&rule.summed_table_id_column);
    let join_table = quoting.quote_schema_table(&rule.join_table);
    let main_fk = quoting.quote_identifier(&rule.main_table_fk_column);
    let summed_fk = quoting.quote_identifier(&rule.summed_table_fk_column);

    let summed_delta = Delta {
        target: main_table.clone(),
        aggregate: sum_column.clone(),
        key: vec![summed_id.clone()],
        selector: Selector::Through {
            column: main_id.clone(),
            join_table,
            join_column: main_fk.clone(),
            join_key: summed_fk.clone(),
            key: summed_id.clone(),
        },
        amount: row_values(quoting, &rule.summed_column),
        on_unchanged: OnUnchanged::Adjust,
    };

    let general_value = quoting.literal(
        &rule
            .summed_column
            .qualified(&Qualifier::Table(rule.summed_table.clone())),
    );
    let lookup = |row: Row| {
        format!(
            "COALESCE((SELECT {} FROM {} WHERE {} = {}.{}), 0)",
            general_value,
            summed_table,
            summed_id,
            row.keyword(),
            summed_fk
        )
    };
    let join_delta = Delta {
        target: main_table,
        aggregate: sum_column,
        key: vec![main_fk.clone(), summed_fk.clone()],
        selector: Selector::Column {
            column: main_id,
            key: main_fk,
        },
        amount: Amount::Values {
            new: lookup(Row::New),
            old: lookup(Row::Old),
        },
        on_unchanged: OnUnchanged::Skip,
    };

    let limit = rule.options.trigger_depth_limit;
    let mut compilation = Compilation::default();
    compilation.add_trigger(
        &rule.summed_table,
        summed_names,
        &ALL_EVENTS,
        Timing::After,
        body(&[], limit, &summed_delta.to_sql(), RETURN_ROW),
    );
    compilation.add_trigger(
        &rule.join_table,
        join_names,
        &ALL_EVENTS,
        Timing::After,
        body(&[], limit, &join_delta.to_sql(), RETURN_ROW),
    );
    compilation
}
