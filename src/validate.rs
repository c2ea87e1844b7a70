use std::collections::HashSet;

use thiserror::Error;

use crate::ast::{
    ColumnName, Event, Expr, Identifier, Qualifier, Row, RuleDescription, RuleOptions, TableRef,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{rule}: missing required field `{field}`")]
    MissingField {
        rule: &'static str,
        field: &'static str,
    },

    #[error("{rule}: `{field}` must list at least one entry")]
    EmptyList {
        rule: &'static str,
        field: &'static str,
    },

    #[error("{rule}: trigger depth limit must be at least 1, got {limit}")]
    InvalidDepthLimit { rule: &'static str, limit: i64 },

    #[error("{rule}: conflicting names: {detail}")]
    ConflictingNames { rule: &'static str, detail: String },

    #[error("{rule}: column `{column}` listed more than once")]
    DuplicateColumn {
        rule: &'static str,
        column: ColumnName,
    },

    #[error("{rule}: invalid value for `{field}`: {detail}")]
    InvalidValue {
        rule: &'static str,
        field: &'static str,
        detail: String,
    },
}

pub type Result<T> = std::result::Result<T, ConfigError>;

struct Checker {
    rule: &'static str,
}

impl Checker {
    fn ident(&self, field: &'static str, value: &str) -> Result<()> {
        if value.trim().is_empty() {
            return Err(ConfigError::MissingField {
                rule: self.rule,
                field,
            });
        }
        Ok(())
    }

    fn table(&self, field: &'static str, table: &TableRef) -> Result<()> {
        self.ident(field, &table.name)?;
        if let Some(schema) = &table.schema {
            self.ident(field, schema)?;
        }
        Ok(())
    }

    fn non_empty<T>(&self, field: &'static str, items: &[T]) -> Result<()> {
        if items.is_empty() {
            return Err(ConfigError::EmptyList {
                rule: self.rule,
                field,
            });
        }
        Ok(())
    }

    fn distinct<'a>(
        &self,
        field: &'static str,
        columns: impl IntoIterator<Item = &'a ColumnName>,
    ) -> Result<()> {
        let mut seen = HashSet::new();
        for column in columns {
            self.ident(field, column)?;
            if !seen.insert(column) {
                return Err(ConfigError::DuplicateColumn {
                    rule: self.rule,
                    column: column.clone(),
                });
            }
        }
        Ok(())
    }

    fn override_name(&self, field: &'static str, name: &Option<Identifier>) -> Result<()> {
        match name {
            Some(name) => self.ident(field, name),
            None => Ok(()),
        }
    }

    fn invalid(&self, field: &'static str, detail: impl Into<String>) -> ConfigError {
        ConfigError::InvalidValue {
            rule: self.rule,
            field,
            detail: detail.into(),
        }
    }

    fn expr(&self, field: &'static str, expr: &Expr) -> Result<()> {
        let mut bad = None;
        expr.walk(&mut |e: &Expr| {
            if let Expr::Function { name, .. } = e {
                if bad.is_none() && !is_plain_identifier(name) {
                    bad = Some(name.clone());
                }
            }
        });
        match bad {
            Some(name) => Err(self.invalid(field, format!("invalid function name {:?}", name))),
            None => Ok(()),
        }
    }

    fn constant(&self, field: &'static str, expr: &Expr) -> Result<()> {
        self.expr(field, expr)?;
        let mut column = false;
        expr.walk(&mut |e: &Expr| {
            column |= matches!(e, Expr::Column(_) | Expr::Qualified(..));
        });
        if column {
            return Err(self.invalid(field, "values may not reference columns"));
        }
        Ok(())
    }

    // A trigger WHEN clause sees only the row images, and only those that
    // exist for every event the trigger fires on.
    fn trigger_condition(&self, when: &Expr, events: &[Event]) -> Result<()> {
        self.expr("when", when)?;
        let mut columns = vec![];
        when.walk(&mut |e: &Expr| match e {
            Expr::Column(name) => columns.push((None, name.clone())),
            Expr::Qualified(Qualifier::Row(row), name) => columns.push((Some(*row), name.clone())),
            Expr::Qualified(Qualifier::Table(table), name) => {
                columns.push((None, format!("{}.{}", table.name, name)))
            }
            _ => {}
        });
        for (row, name) in columns {
            let detail = match row {
                None => format!("column `{}` must be qualified with NEW or OLD", name),
                Some(Row::New) if events.contains(&Event::Delete) => {
                    format!("NEW.{} is not available on DELETE", name)
                }
                Some(Row::Old) if events.contains(&Event::Insert) => {
                    format!("OLD.{} is not available on INSERT", name)
                }
                Some(_) => continue,
            };
            return Err(self.invalid("when", detail));
        }
        Ok(())
    }

    fn options(&self, options: &RuleOptions) -> Result<()> {
        self.override_name("function_name", &options.function_name)?;
        self.override_name("trigger_name", &options.trigger_name)?;
        if let Some(limit) = options.trigger_depth_limit {
            if limit < 1 {
                return Err(ConfigError::InvalidDepthLimit {
                    rule: self.rule,
                    limit,
                });
            }
        }
        Ok(())
    }

    fn different(
        &self,
        what: &str,
        first: &Option<Identifier>,
        second: &Option<Identifier>,
    ) -> Result<()> {
        match (first, second) {
            (Some(first), Some(second)) if first == second => {
                Err(ConfigError::ConflictingNames {
                    rule: self.rule,
                    detail: format!("both {} procedures are named {:?}", what, first),
                })
            }
            _ => Ok(()),
        }
    }
}

fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

pub fn validate(rule: &RuleDescription) -> Result<()> {
    let check = Checker { rule: rule.kind() };
    check.options(rule.options())?;

    match rule {
        RuleDescription::CounterCache(rule) => {
            check.table("main_table", &rule.main_table)?;
            check.ident("main_table_id_column", &rule.main_table_id_column)?;
            check.ident("counter_column", &rule.counter_column)?;
            check.table("counted_table", &rule.counted_table)?;
            check.ident("counted_table_id_column", &rule.counted_table_id_column)
        }

        RuleDescription::SumCache(rule) => {
            check.table("main_table", &rule.main_table)?;
            check.ident("main_table_id_column", &rule.main_table_id_column)?;
            check.ident("sum_column", &rule.sum_column)?;
            check.table("summed_table", &rule.summed_table)?;
            check.ident("summed_table_id_column", &rule.summed_table_id_column)?;
            check.expr("summed_column", &rule.summed_column)
        }

        RuleDescription::SumThroughManyCache(rule) => {
            check.table("main_table", &rule.main_table)?;
            check.ident("main_table_id_column", &rule.main_table_id_column)?;
            check.ident("sum_column", &rule.sum_column)?;
            check.table("summed_table", &rule.summed_table)?;
            check.ident("summed_table_id_column", &rule.summed_table_id_column)?;
            check.expr("summed_column", &rule.summed_column)?;
            check.table("join_table", &rule.join_table)?;
            check.ident("main_table_fk_column", &rule.main_table_fk_column)?;
            check.ident("summed_table_fk_column", &rule.summed_table_fk_column)?;
            check.override_name("join_function_name", &rule.join_function_name)?;
            check.override_name("join_trigger_name", &rule.join_trigger_name)?;
            check.different(
                "summed and join",
                &rule.options.function_name,
                &rule.join_function_name,
            )
        }

        RuleDescription::Touch(rule) => {
            check.table("main_table", &rule.main_table)?;
            check.table("touch_table", &rule.touch_table)?;
            check.ident("column", &rule.column)?;
            check.non_empty("expr", &rule.expr)?;
            check.distinct("expr", rule.expr.iter().map(|(touch, _)| touch))?;
            for (_, main) in &rule.expr {
                check.ident("expr", main)?;
            }
            Ok(())
        }

        RuleDescription::CreatedAt(rule) => {
            check.table("table", &rule.table)?;
            check.ident("column", &rule.column)
        }

        RuleDescription::UpdatedAt(rule) => {
            check.table("table", &rule.table)?;
            check.ident("column", &rule.column)
        }

        RuleDescription::Immutable(rule) => {
            check.table("table", &rule.table)?;
            check.non_empty("columns", &rule.columns)?;
            check.distinct("columns", &rule.columns)
        }

        RuleDescription::ForceDefaults(rule) => {
            check.table("table", &rule.table)?;
            check.non_empty("defaults", &rule.defaults)?;
            check.distinct("defaults", rule.defaults.iter().map(|(column, _)| column))?;
            for (_, value) in &rule.defaults {
                check.constant("defaults", value)?;
            }
            Ok(())
        }

        RuleDescription::ForeignKeyArray(rule) => {
            check.table("table", &rule.table)?;
            check.ident("column", &rule.column)?;
            check.table("referenced_table", &rule.referenced_table)?;
            check.ident("referenced_column", &rule.referenced_column)?;
            check.override_name("referenced_function_name", &rule.referenced_function_name)?;
            check.override_name("referenced_trigger_name", &rule.referenced_trigger_name)?;
            check.different(
                "owning and referenced",
                &rule.options.function_name,
                &rule.referenced_function_name,
            )
        }

        RuleDescription::JsonAuditLog(rule) => {
            check.table("log_table", &rule.log_table)?;
            check.non_empty("tables", &rule.tables)?;
            for table in &rule.tables {
                check.table("tables", table)?;
            }
            if rule.options.trigger_name.is_some() && rule.tables.len() > 1 {
                return Err(ConfigError::ConflictingNames {
                    rule: check.rule,
                    detail: format!(
                        "one trigger name given for {} audited tables",
                        rule.tables.len()
                    ),
                });
            }
            Ok(())
        }

        RuleDescription::Outbox(rule) => {
            check.table("table", &rule.table)?;
            if let Some(outbox_table) = &rule.outbox_table {
                check.table("outbox_table", outbox_table)?;
                if outbox_table == &rule.table {
                    return Err(ConfigError::ConflictingNames {
                        rule: check.rule,
                        detail: "outbox table is the captured table".to_owned(),
                    });
                }
            }
            if let Some(prefix) = &rule.event_prefix {
                check.ident("event_prefix", prefix)?;
            }
            if let Some(events) = &rule.events {
                check.non_empty("events", events)?;
                let distinct: HashSet<_> = events.iter().collect();
                if distinct.len() != events.len() {
                    return Err(check.invalid("events", "event listed more than once"));
                }
            }
            match &rule.when {
                Some(when) => check.trigger_condition(when, &rule.trigger_events()),
                None => Ok(()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{
        BinaryOp, CounterCache, ForceDefaults, Immutable, JsonAuditLog, Outbox, SumCache,
        SumThroughManyCache,
    };

    fn counter() -> CounterCache {
        CounterCache {
            main_table: TableRef::new("accounts"),
            main_table_id_column: "id".to_owned(),
            counter_column: "num_entries".to_owned(),
            counted_table: TableRef::new("entries"),
            counted_table_id_column: "account_id".to_owned(),
            options: RuleOptions::default(),
        }
    }

    #[test]
    fn test_valid_rule() {
        assert_eq!(validate(&RuleDescription::CounterCache(counter())), Ok(()));
    }

    #[test]
    fn test_missing_field() {
        let mut rule = counter();
        rule.counter_column = String::new();
        assert_eq!(
            validate(&RuleDescription::CounterCache(rule)),
            Err(ConfigError::MissingField {
                rule: "counter_cache",
                field: "counter_column",
            })
        );
    }

    #[test]
    fn test_depth_limit_must_be_positive() {
        for limit in [0, -3] {
            let mut rule = counter();
            rule.options.trigger_depth_limit = Some(limit);
            assert_eq!(
                validate(&RuleDescription::CounterCache(rule)),
                Err(ConfigError::InvalidDepthLimit {
                    rule: "counter_cache",
                    limit,
                })
            );
        }

        let mut rule = counter();
        rule.options.trigger_depth_limit = Some(1);
        assert!(validate(&RuleDescription::CounterCache(rule)).is_ok());
    }

    #[test]
    fn test_duplicate_immutable_column() {
        let rule = Immutable {
            table: TableRef::new("accounts"),
            columns: vec!["balance".to_owned(), "balance".to_owned()],
            options: RuleOptions::default(),
        };
        assert!(matches!(
            validate(&RuleDescription::Immutable(rule)),
            Err(ConfigError::DuplicateColumn { .. })
        ));
    }

    #[test]
    fn test_conflicting_procedure_names() {
        let rule = SumThroughManyCache {
            main_table: TableRef::new("parents"),
            main_table_id_column: "id".to_owned(),
            sum_column: "balance".to_owned(),
            summed_table: TableRef::new("children"),
            summed_table_id_column: "id".to_owned(),
            summed_column: Expr::column("amount"),
            join_table: TableRef::new("links"),
            main_table_fk_column: "parent_id".to_owned(),
            summed_table_fk_column: "child_id".to_owned(),
            join_function_name: Some("same".to_owned()),
            join_trigger_name: None,
            options: RuleOptions {
                function_name: Some("same".to_owned()),
                ..RuleOptions::default()
            },
        };
        assert!(matches!(
            validate(&RuleDescription::SumThroughManyCache(rule)),
            Err(ConfigError::ConflictingNames { .. })
        ));
    }

    #[test]
    fn test_audit_log_trigger_name_needs_single_table() {
        let rule = JsonAuditLog {
            log_table: TableRef::new("table_audit_logs"),
            tables: vec![TableRef::new("accounts"), TableRef::new("entries")],
            options: RuleOptions {
                trigger_name: Some("audit".to_owned()),
                ..RuleOptions::default()
            },
        };
        let err = validate(&RuleDescription::JsonAuditLog(rule)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "json_audit_log: conflicting names: one trigger name given for 2 audited tables"
        );
    }

    fn outbox(events: Option<Vec<Event>>, when: Expr) -> RuleDescription {
        RuleDescription::Outbox(Outbox {
            table: TableRef::new("orders"),
            outbox_table: None,
            event_prefix: None,
            completion: Default::default(),
            key: Default::default(),
            events,
            when: Some(when),
            options: RuleOptions::default(),
        })
    }

    fn new_total_positive() -> Expr {
        Expr::Binary {
            op: BinaryOp::Gt,
            lhs: Box::new(Expr::Qualified(Qualifier::Row(Row::New), "total".to_owned())),
            rhs: Box::new(Expr::Integer(0)),
        }
    }

    #[test]
    fn test_outbox_condition_rows_match_events() {
        let insert_update = Some(vec![Event::Insert, Event::Update]);
        assert_eq!(validate(&outbox(insert_update, new_total_positive())), Ok(()));

        assert_eq!(
            validate(&outbox(None, new_total_positive())),
            Err(ConfigError::InvalidValue {
                rule: "outbox",
                field: "when",
                detail: "NEW.total is not available on DELETE".to_owned(),
            })
        );

        let old_flag = Expr::IsNull {
            expr: Box::new(Expr::Qualified(Qualifier::Row(Row::Old), "flag".to_owned())),
            negated: true,
        };
        let update_delete = Some(vec![Event::Update, Event::Delete]);
        assert!(validate(&outbox(update_delete, old_flag.clone())).is_ok());
        assert!(validate(&outbox(Some(vec![Event::Insert]), old_flag)).is_err());
    }

    #[test]
    fn test_outbox_condition_needs_row_qualifier() {
        let err = validate(&outbox(Some(vec![Event::Insert]), Expr::column("total"))).unwrap_err();
        assert_eq!(
            err.to_string(),
            "outbox: invalid value for `when`: column `total` must be qualified with NEW or OLD"
        );
    }

    #[test]
    fn test_function_names_must_be_identifiers() {
        let rule = SumCache {
            main_table: TableRef::new("accounts"),
            main_table_id_column: "id".to_owned(),
            sum_column: "balance".to_owned(),
            summed_table: TableRef::new("entries"),
            summed_table_id_column: "account_id".to_owned(),
            summed_column: Expr::Function {
                name: "x); DELETE FROM accounts; --".to_owned(),
                args: vec![Expr::column("amount")],
            },
            options: RuleOptions::default(),
        };
        assert!(matches!(
            validate(&RuleDescription::SumCache(rule.clone())),
            Err(ConfigError::InvalidValue {
                field: "summed_column",
                ..
            })
        ));

        let rule = SumCache {
            summed_column: Expr::Function {
                name: "abs".to_owned(),
                args: vec![Expr::column("amount")],
            },
            ..rule
        };
        assert_eq!(validate(&RuleDescription::SumCache(rule)), Ok(()));
    }

    #[test]
    fn test_force_defaults_take_constants() {
        let rule = |value: Expr| {
            RuleDescription::ForceDefaults(ForceDefaults {
                table: TableRef::new("accounts"),
                defaults: vec![("a".to_owned(), value)],
                options: RuleOptions::default(),
            })
        };
        assert_eq!(validate(&rule(Expr::Integer(1))), Ok(()));
        assert_eq!(validate(&rule(Expr::CurrentTimestamp)), Ok(()));
        assert!(validate(&rule(Expr::column("b"))).is_err());
        assert!(validate(&rule(Expr::Function {
            name: "lower".to_owned(),
            args: vec![Expr::Qualified(Qualifier::Row(Row::New), "b".to_owned())],
        }))
        .is_err());
    }
}
