//! Default names for generated functions and triggers.
//!
//! Installed objects are looked up by these names when a rule is
//! re-installed, so the output of every function here must stay stable.

use itertools::Itertools;

use crate::ast::{
    ColumnName, CounterCache, CreatedAt, Expr, ForceDefaults, ForeignKeyArray, Identifier,
    Immutable, JsonAuditLog, Outbox, SumCache, SumThroughManyCache, TableRef, Touch, UpdatedAt,
};
use crate::quote::Quoting;

const PREFIX: &str = "pgt";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Names {
    pub function: Identifier,
    pub trigger: Identifier,
}

pub fn mangle(quoted: &str) -> String {
    let mut out = String::with_capacity(quoted.len());
    let mut in_separator = false;
    for c in quoted.chars().filter(|&c| c != '"') {
        if c.is_ascii_alphanumeric() {
            out.push(c);
            in_separator = false;
        } else if !in_separator {
            out.push('_');
            in_separator = true;
        }
    }
    out
}

fn table(quoting: &dyn Quoting, table: &TableRef) -> String {
    mangle(&quoting.quote_schema_table(table))
}

fn value(quoting: &dyn Quoting, expr: &Expr) -> String {
    match expr.as_column() {
        Some(column) => column.to_owned(),
        None => mangle(&quoting.literal(expr)),
    }
}

fn name(kind: &str, parts: &[&str]) -> Identifier {
    format!("{}_{}_{}", PREFIX, kind, parts.iter().join("__"))
}

fn choose(explicit: &Option<Identifier>, default: impl FnOnce() -> Identifier) -> Identifier {
    explicit.clone().unwrap_or_else(default)
}

pub fn counter_cache(quoting: &dyn Quoting, rule: &CounterCache) -> Names {
    let main = table(quoting, &rule.main_table);
    let counted = table(quoting, &rule.counted_table);
    Names {
        trigger: choose(&rule.options.trigger_name, || {
            name(
                "cc",
                &[
                    &main,
                    &rule.main_table_id_column,
                    &rule.counter_column,
                    &rule.counted_table_id_column,
                ],
            )
        }),
        function: choose(&rule.options.function_name, || {
            name(
                "cc",
                &[
                    &main,
                    &rule.main_table_id_column,
                    &rule.counter_column,
                    &counted,
                    &rule.counted_table_id_column,
                ],
            )
        }),
    }
}

pub fn sum_cache(quoting: &dyn Quoting, rule: &SumCache) -> Names {
    let main = table(quoting, &rule.main_table);
    let summed = table(quoting, &rule.summed_table);
    let summed_column = value(quoting, &rule.summed_column);
    Names {
        trigger: choose(&rule.options.trigger_name, || {
            name(
                "sc",
                &[
                    &main,
                    &rule.main_table_id_column,
                    &rule.sum_column,
                    &rule.summed_table_id_column,
                ],
            )
        }),
        function: choose(&rule.options.function_name, || {
            name(
                "sc",
                &[
                    &main,
                    &rule.main_table_id_column,
                    &rule.sum_column,
                    &summed,
                    &rule.summed_table_id_column,
                    &summed_column,
                ],
            )
        }),
    }
}

pub fn sum_through_many_cache(quoting: &dyn Quoting, rule: &SumThroughManyCache) -> (Names, Names) {
    let main = table(quoting, &rule.main_table);
    let summed = table(quoting, &rule.summed_table);
    let join = table(quoting, &rule.join_table);
    let summed_column = value(quoting, &rule.summed_column);

    let trigger_parts: [&str; 6] = [
        &main,
        &rule.main_table_id_column,
        &rule.sum_column,
        &rule.summed_table_id_column,
        &rule.main_table_fk_column,
        &rule.summed_table_fk_column,
    ];
    let function_parts: [&str; 9] = [
        &main,
        &rule.main_table_id_column,
        &rule.sum_column,
        &summed,
        &rule.summed_table_id_column,
        &summed_column,
        &join,
        &rule.main_table_fk_column,
        &rule.summed_table_fk_column,
    ];

    let summed_names = Names {
        trigger: choose(&rule.options.trigger_name, || name("stmc", &trigger_parts)),
        function: choose(&rule.options.function_name, || name("stmc", &function_parts)),
    };
    let join_names = Names {
        trigger: choose(&rule.join_trigger_name, || name("stmc_join", &trigger_parts)),
        function: choose(&rule.join_function_name, || name("stmc_join", &function_parts)),
    };
    (summed_names, join_names)
}

pub fn touch(quoting: &dyn Quoting, rule: &Touch) -> Names {
    let default = || {
        name(
            "t",
            &[
                &table(quoting, &rule.main_table),
                &table(quoting, &rule.touch_table),
            ],
        )
    };
    Names {
        trigger: choose(&rule.options.trigger_name, default),
        function: choose(&rule.options.function_name, default),
    }
}

pub fn created_at(quoting: &dyn Quoting, rule: &CreatedAt) -> Names {
    Names {
        trigger: choose(&rule.options.trigger_name, || name("ca", &[&rule.column])),
        function: choose(&rule.options.function_name, || {
            name("ca", &[&table(quoting, &rule.table), &rule.column])
        }),
    }
}

pub fn updated_at(quoting: &dyn Quoting, rule: &UpdatedAt) -> Names {
    Names {
        trigger: choose(&rule.options.trigger_name, || name("ua", &[&rule.column])),
        function: choose(&rule.options.function_name, || {
            name("ua", &[&table(quoting, &rule.table), &rule.column])
        }),
    }
}

/// Immutability names depend on the columns only: the generated body does
/// not mention the table, so tables protecting the same columns share it.
pub fn immutable(rule: &Immutable) -> Names {
    let default = || {
        let columns: Vec<&str> = rule.columns.iter().map(String::as_str).collect();
        name("im", &columns)
    };
    Names {
        trigger: choose(&rule.options.trigger_name, default),
        function: choose(&rule.options.function_name, default),
    }
}

pub fn force_defaults(quoting: &dyn Quoting, rule: &ForceDefaults) -> Names {
    let columns = rule
        .defaults
        .iter()
        .map(|(column, _)| column.as_str())
        .sorted()
        .join("_");
    Names {
        trigger: choose(&rule.options.trigger_name, || name("fd", &[&columns])),
        function: choose(&rule.options.function_name, || {
            name("fd", &[&table(quoting, &rule.table), &columns])
        }),
    }
}

pub fn foreign_key_array(quoting: &dyn Quoting, rule: &ForeignKeyArray) -> (Names, Names) {
    let owner = table(quoting, &rule.table);
    let column: &ColumnName = &rule.column;
    (
        Names {
            trigger: choose(&rule.options.trigger_name, || name("fka", &[column])),
            function: choose(&rule.options.function_name, || {
                name("fka", &[&owner, column])
            }),
        },
        Names {
            trigger: choose(&rule.referenced_trigger_name, || name("rfka", &[column])),
            function: choose(&rule.referenced_function_name, || {
                name("rfka", &[&owner, column])
            }),
        },
    )
}

pub fn json_audit_log_function(quoting: &dyn Quoting, rule: &JsonAuditLog) -> Identifier {
    choose(&rule.options.function_name, || {
        name("jal", &[&table(quoting, &rule.log_table)])
    })
}

pub fn json_audit_log_trigger(
    quoting: &dyn Quoting,
    rule: &JsonAuditLog,
    audited: &TableRef,
) -> Identifier {
    choose(&rule.options.trigger_name, || {
        name("jal", &[&table(quoting, audited)])
    })
}

pub fn outbox(quoting: &dyn Quoting, rule: &Outbox) -> Names {
    let default = || name("outbox", &[&table(quoting, &rule.table)]);
    Names {
        trigger: choose(&rule.options.trigger_name, default),
        function: choose(&rule.options.function_name, default),
    }
}
