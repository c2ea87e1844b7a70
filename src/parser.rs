use std::borrow::BorrowMut;
use std::collections::HashMap;

use anyhow::{anyhow, bail, Context, Result};
use pest::Parser as _;
use pest_derive::Parser;

use crate::ast::{
    BinaryOp, Completion, CounterCache, CreatedAt, Event, Expr, ForceDefaults, ForeignKeyArray,
    Identifier, Immutable, JsonAuditLog, KeyStrategy, Outbox, Qualifier, Row, RuleDescription,
    RuleOptions, SumCache, SumThroughManyCache, TableRef, Touch, UpdatedAt,
};
use crate::validate::ConfigError;

#[derive(Parser)]
#[grammar = "rules.pest"]
struct Parser;

type Pair<'a> = pest::iterators::Pair<'a, Rule>;
type Pairs<'a> = pest::iterators::Pairs<'a, Rule>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Value {
    Expr(Expr),
    List(Vec<Value>),
    Mapping(Vec<(Identifier, Value)>),
}

pub fn parse_rules(code: &str) -> Result<Vec<RuleDescription>> {
    let program = Parser::parse(Rule::program, code)
        .context("Failed to parse input")?
        .next()
        .unwrap();

    program
        .into_inner()
        .take_while(|pair| pair.as_rule() != Rule::EOI)
        .map(convert_rule_block)
        .collect()
}

pub fn parse_expr(code: &str) -> Result<Expr> {
    let mut pairs = Parser::parse(Rule::expr, code).context("Failed to parse expression")?;
    let pair = pairs.next().unwrap();
    if pair.as_str().len() != code.trim_end().len() {
        bail!("Unexpected input after expression: {:?}", &code[pair.as_str().len()..]);
    }
    convert_expr(pair)
}

fn expect_next_rule<'a, P: BorrowMut<Pairs<'a>>>(mut pairs: P, rule: Rule) -> Pair<'a> {
    let pair = pairs.borrow_mut().next().expect("missing pair");
    assert_eq!(pair.as_rule(), rule);
    pair
}

fn convert_identifier(pair: Pair) -> Identifier {
    assert_eq!(pair.as_rule(), Rule::identifier);
    pair.as_str().to_string()
}

fn expect_identifier<'a, P: BorrowMut<Pairs<'a>>>(pairs: P) -> Identifier {
    convert_identifier(expect_next_rule(pairs, Rule::identifier))
}

fn is_keyword(rule: Rule) -> bool {
    matches!(
        rule,
        Rule::kw_case | Rule::kw_when | Rule::kw_then | Rule::kw_else | Rule::kw_end
    )
}

fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
    Expr::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    }
}

fn convert_expr(pair: Pair) -> Result<Expr> {
    assert_eq!(pair.as_rule(), Rule::expr);
    let mut pairs = pair.into_inner().filter(|pair| pair.as_rule() != Rule::kw_or);
    let mut lhs = convert_conjunction(pairs.next().unwrap())?;
    for pair in pairs {
        lhs = binary(BinaryOp::Or, lhs, convert_conjunction(pair)?);
    }
    Ok(lhs)
}

fn convert_conjunction(pair: Pair) -> Result<Expr> {
    assert_eq!(pair.as_rule(), Rule::conjunction);
    let mut pairs = pair.into_inner().filter(|pair| pair.as_rule() != Rule::kw_and);
    let mut lhs = convert_negation(pairs.next().unwrap())?;
    for pair in pairs {
        lhs = binary(BinaryOp::And, lhs, convert_negation(pair)?);
    }
    Ok(lhs)
}

fn convert_negation(pair: Pair) -> Result<Expr> {
    assert_eq!(pair.as_rule(), Rule::negation);
    let inner = pair.into_inner().last().unwrap();
    match inner.as_rule() {
        Rule::negation => Ok(Expr::Not(Box::new(convert_negation(inner)?))),
        _ => convert_comparison(inner),
    }
}

fn convert_comparison(pair: Pair) -> Result<Expr> {
    assert_eq!(pair.as_rule(), Rule::comparison);
    let mut pairs = pair.into_inner();
    let lhs = convert_sum(expect_next_rule(&mut pairs, Rule::sum))?;
    let op = match pairs.next() {
        None => return Ok(lhs),
        Some(op) => op,
    };
    if op.as_rule() == Rule::null_test {
        let negated = op.into_inner().any(|pair| pair.as_rule() == Rule::kw_not);
        return Ok(Expr::IsNull {
            expr: Box::new(lhs),
            negated,
        });
    }
    let op = match op.as_str() {
        "=" => BinaryOp::Eq,
        "<>" | "!=" => BinaryOp::NotEq,
        "<" => BinaryOp::Lt,
        "<=" => BinaryOp::LtEq,
        ">" => BinaryOp::Gt,
        _ => BinaryOp::GtEq,
    };
    let rhs = convert_sum(expect_next_rule(&mut pairs, Rule::sum))?;
    Ok(binary(op, lhs, rhs))
}

fn convert_sum(pair: Pair) -> Result<Expr> {
    let mut pairs = pair.into_inner();
    let mut lhs = convert_product(expect_next_rule(&mut pairs, Rule::product))?;
    while let Some(op) = pairs.next() {
        let op = match op.as_str() {
            "+" => BinaryOp::Add,
            _ => BinaryOp::Subtract,
        };
        let rhs = convert_product(expect_next_rule(&mut pairs, Rule::product))?;
        lhs = binary(op, lhs, rhs);
    }
    Ok(lhs)
}

fn convert_product(pair: Pair) -> Result<Expr> {
    let mut pairs = pair.into_inner();
    let mut lhs = convert_term(pairs.next().unwrap())?;
    while let Some(op) = pairs.next() {
        let op = match op.as_str() {
            "*" => BinaryOp::Multiply,
            _ => BinaryOp::Divide,
        };
        let rhs = convert_term(pairs.next().unwrap())?;
        lhs = binary(op, lhs, rhs);
    }
    Ok(lhs)
}

fn convert_term(pair: Pair) -> Result<Expr> {
    match pair.as_rule() {
        Rule::expr => convert_expr(pair),

        Rule::integer => {
            let n = pair
                .as_str()
                .parse()
                .with_context(|| format!("Integer out of range: {}", pair.as_str()))?;
            Ok(Expr::Integer(n))
        }

        Rule::string_literal => {
            let interior = expect_next_rule(pair.into_inner(), Rule::string_interior);
            Ok(Expr::String(interior.as_str().replace("''", "'")))
        }

        Rule::keyword_literal => {
            let keyword = pair.into_inner().next().unwrap();
            Ok(match keyword.as_rule() {
                Rule::kw_null => Expr::Null,
                Rule::kw_true => Expr::Boolean(true),
                Rule::kw_false => Expr::Boolean(false),
                Rule::kw_current_timestamp => Expr::CurrentTimestamp,
                _ => unreachable!(),
            })
        }

        Rule::column => {
            let mut pairs = pair.into_inner();
            let first = expect_identifier(&mut pairs);
            Ok(match pairs.next().map(convert_identifier) {
                None => Expr::Column(first),
                Some(column) => {
                    let qualifier = match first.to_ascii_lowercase().as_str() {
                        "new" => Qualifier::Row(Row::New),
                        "old" => Qualifier::Row(Row::Old),
                        _ => Qualifier::Table(TableRef::new(first)),
                    };
                    Expr::Qualified(qualifier, column)
                }
            })
        }

        Rule::function_call => {
            let mut pairs = pair.into_inner();
            let name = expect_identifier(&mut pairs);
            let args = pairs.map(convert_expr).collect::<Result<_>>()?;
            Ok(Expr::Function { name, args })
        }

        Rule::case_expr => {
            let mut operand = None;
            let mut branches = vec![];
            let mut default = None;
            for pair in pair.into_inner().filter(|pair| !is_keyword(pair.as_rule())) {
                match pair.as_rule() {
                    Rule::case_operand => {
                        let inner = expect_next_rule(pair.into_inner(), Rule::expr);
                        operand = Some(Box::new(convert_expr(inner)?));
                    }
                    Rule::when_branch => {
                        let mut pairs = pair
                            .into_inner()
                            .filter(|pair| !is_keyword(pair.as_rule()));
                        let when = convert_expr(pairs.next().unwrap())?;
                        let then = convert_expr(pairs.next().unwrap())?;
                        branches.push((when, then));
                    }
                    Rule::expr => default = Some(Box::new(convert_expr(pair)?)),
                    _ => unreachable!(),
                }
            }
            Ok(Expr::Case {
                operand,
                branches,
                default: default.unwrap(),
            })
        }

        _ => unreachable!(),
    }
}

fn convert_value(pair: Pair) -> Result<Value> {
    assert_eq!(pair.as_rule(), Rule::value);
    let inner = pair.into_inner().next().unwrap();
    match inner.as_rule() {
        Rule::list => Ok(Value::List(
            inner.into_inner().map(convert_value).collect::<Result<_>>()?,
        )),

        Rule::mapping => Ok(Value::Mapping(
            inner
                .into_inner()
                .map(|pair| {
                    let mut pairs = pair.into_inner();
                    let key = expect_identifier(&mut pairs);
                    let value = convert_value(expect_next_rule(&mut pairs, Rule::value))?;
                    Ok((key, value))
                })
                .collect::<Result<_>>()?,
        )),

        Rule::expr => Ok(Value::Expr(convert_expr(inner)?)),

        _ => unreachable!(),
    }
}

// The settings of one rule block. Each accessor consumes its setting, so
// whatever is left over at the end was not understood.
struct Settings {
    rule: &'static str,
    values: HashMap<Identifier, Value>,
}

impl Settings {
    fn invalid(&self, field: &'static str, detail: impl Into<String>) -> ConfigError {
        ConfigError::InvalidValue {
            rule: self.rule,
            field,
            detail: detail.into(),
        }
    }

    fn take(&mut self, field: &'static str) -> Option<Value> {
        self.values.remove(field)
    }

    fn require(&mut self, field: &'static str) -> Result<Value, ConfigError> {
        self.take(field).ok_or(ConfigError::MissingField {
            rule: self.rule,
            field,
        })
    }

    fn to_ident(&self, field: &'static str, value: Value) -> Result<Identifier, ConfigError> {
        match value {
            Value::Expr(Expr::Column(name)) => Ok(name),
            other => Err(self.invalid(field, format!("expected a name, got {:?}", other))),
        }
    }

    fn to_table(&self, field: &'static str, value: Value) -> Result<TableRef, ConfigError> {
        match value {
            Value::Expr(Expr::Column(name)) => Ok(TableRef::new(name)),
            Value::Expr(Expr::Qualified(
                Qualifier::Table(TableRef { schema: None, name: schema }),
                name,
            )) => Ok(TableRef::with_schema(schema, name)),
            other => Err(self.invalid(field, format!("expected a table, got {:?}", other))),
        }
    }

    fn to_list(value: Value) -> Vec<Value> {
        match value {
            Value::List(items) => items,
            single => vec![single],
        }
    }

    fn ident(&mut self, field: &'static str) -> Result<Identifier, ConfigError> {
        let value = self.require(field)?;
        self.to_ident(field, value)
    }

    fn ident_or(&mut self, field: &'static str, default: &str) -> Result<Identifier, ConfigError> {
        Ok(self.optional_ident(field)?.unwrap_or_else(|| default.to_owned()))
    }

    fn optional_ident(&mut self, field: &'static str) -> Result<Option<Identifier>, ConfigError> {
        self.take(field)
            .map(|value| self.to_ident(field, value))
            .transpose()
    }

    fn table(&mut self, field: &'static str) -> Result<TableRef, ConfigError> {
        let value = self.require(field)?;
        self.to_table(field, value)
    }

    fn optional_table(&mut self, field: &'static str) -> Result<Option<TableRef>, ConfigError> {
        self.take(field)
            .map(|value| self.to_table(field, value))
            .transpose()
    }

    fn expr(&mut self, field: &'static str) -> Result<Expr, ConfigError> {
        match self.require(field)? {
            Value::Expr(expr) => Ok(expr),
            other => Err(self.invalid(field, format!("expected an expression, got {:?}", other))),
        }
    }

    fn optional_expr(&mut self, field: &'static str) -> Result<Option<Expr>, ConfigError> {
        match self.take(field) {
            None => Ok(None),
            Some(Value::Expr(expr)) => Ok(Some(expr)),
            Some(other) => {
                Err(self.invalid(field, format!("expected an expression, got {:?}", other)))
            }
        }
    }

    fn idents(&mut self, field: &'static str) -> Result<Vec<Identifier>, ConfigError> {
        let value = self.require(field)?;
        Self::to_list(value)
            .into_iter()
            .map(|value| self.to_ident(field, value))
            .collect()
    }

    fn tables(&mut self, field: &'static str) -> Result<Vec<TableRef>, ConfigError> {
        let value = self.require(field)?;
        Self::to_list(value)
            .into_iter()
            .map(|value| self.to_table(field, value))
            .collect()
    }

    fn mapping(&mut self, field: &'static str) -> Result<Vec<(Identifier, Value)>, ConfigError> {
        match self.require(field)? {
            Value::Mapping(entries) => Ok(entries),
            other => Err(self.invalid(field, format!("expected a mapping, got {:?}", other))),
        }
    }

    fn flag(&mut self, field: &'static str) -> Result<bool, ConfigError> {
        match self.take(field) {
            None => Ok(false),
            Some(Value::Expr(Expr::Boolean(flag))) => Ok(flag),
            Some(other) => Err(self.invalid(field, format!("expected true or false, got {:?}", other))),
        }
    }

    fn events(&mut self, field: &'static str) -> Result<Option<Vec<Event>>, ConfigError> {
        let value = match self.take(field) {
            Some(value) => value,
            None => return Ok(None),
        };
        Self::to_list(value)
            .into_iter()
            .map(|value| {
                let name = self.to_ident(field, value)?;
                match name.to_ascii_lowercase().as_str() {
                    "insert" => Ok(Event::Insert),
                    "update" => Ok(Event::Update),
                    "delete" => Ok(Event::Delete),
                    _ => Err(self.invalid(field, format!("unknown event {:?}", name))),
                }
            })
            .collect::<Result<_, _>>()
            .map(Some)
    }

    fn options(&mut self) -> Result<RuleOptions, ConfigError> {
        let trigger_depth_limit = match self.take("trigger_depth_limit") {
            None => None,
            Some(Value::Expr(Expr::Integer(limit))) => Some(limit),
            Some(other) => {
                return Err(self.invalid(
                    "trigger_depth_limit",
                    format!("expected an integer, got {:?}", other),
                ))
            }
        };
        Ok(RuleOptions {
            function_name: self.optional_ident("function_name")?,
            trigger_name: self.optional_ident("trigger_name")?,
            trigger_depth_limit,
        })
    }

    fn finish(self) -> Result<()> {
        let mut unknown: Vec<_> = self.values.into_keys().collect();
        unknown.sort();
        match unknown.first() {
            None => Ok(()),
            Some(field) => Err(anyhow!("{}: unknown setting `{}`", self.rule, field)),
        }
    }
}

const RULE_KINDS: [&str; 11] = [
    "counter_cache",
    "sum_cache",
    "sum_through_many_cache",
    "touch",
    "created_at",
    "updated_at",
    "immutable",
    "force_defaults",
    "foreign_key_array",
    "json_audit_log",
    "outbox",
];

fn convert_rule_block(pair: Pair) -> Result<RuleDescription> {
    assert_eq!(pair.as_rule(), Rule::rule_block);
    let mut pairs = pair.into_inner();
    let kind = expect_identifier(&mut pairs);
    let kind = *RULE_KINDS
        .iter()
        .find(|known| **known == kind)
        .ok_or_else(|| anyhow!("Unknown rule kind {:?}", kind))?;

    let mut values = HashMap::new();
    for setting in pairs {
        let mut setting_pairs = setting.into_inner();
        let key = expect_next_rule(&mut setting_pairs, Rule::setting_name)
            .as_str()
            .to_owned();
        let value = convert_value(expect_next_rule(&mut setting_pairs, Rule::value))?;
        if values.insert(key.clone(), value).is_some() {
            bail!("{}: setting `{}` given more than once", kind, key);
        }
    }

    let mut settings = Settings { rule: kind, values };
    let rule = build_rule(&mut settings)?;
    settings.finish()?;
    Ok(rule)
}

fn build_rule(s: &mut Settings) -> Result<RuleDescription> {
    let rule = match s.rule {
        "counter_cache" => RuleDescription::CounterCache(CounterCache {
            main_table: s.table("main_table")?,
            main_table_id_column: s.ident("main_table_id_column")?,
            counter_column: s.ident("counter_column")?,
            counted_table: s.table("counted_table")?,
            counted_table_id_column: s.ident("counted_table_id_column")?,
            options: s.options()?,
        }),

        "sum_cache" => RuleDescription::SumCache(SumCache {
            main_table: s.table("main_table")?,
            main_table_id_column: s.ident("main_table_id_column")?,
            sum_column: s.ident("sum_column")?,
            summed_table: s.table("summed_table")?,
            summed_table_id_column: s.ident("summed_table_id_column")?,
            summed_column: s.expr("summed_column")?,
            options: s.options()?,
        }),

        "sum_through_many_cache" => RuleDescription::SumThroughManyCache(SumThroughManyCache {
            main_table: s.table("main_table")?,
            main_table_id_column: s.ident_or("main_table_id_column", "id")?,
            sum_column: s.ident("sum_column")?,
            summed_table: s.table("summed_table")?,
            summed_table_id_column: s.ident_or("summed_table_id_column", "id")?,
            summed_column: s.expr("summed_column")?,
            join_table: s.table("join_table")?,
            main_table_fk_column: s.ident("main_table_fk_column")?,
            summed_table_fk_column: s.ident("summed_table_fk_column")?,
            join_function_name: s.optional_ident("join_function_name")?,
            join_trigger_name: s.optional_ident("join_trigger_name")?,
            options: s.options()?,
        }),

        "touch" => {
            let main_table = s.table("main_table")?;
            let touch_table = s.table("touch_table")?;
            let column = s.ident("column")?;
            let expr = s
                .mapping("expr")?
                .into_iter()
                .map(|(touch_column, value)| Ok((touch_column, s.to_ident("expr", value)?)))
                .collect::<Result<_, ConfigError>>()?;
            RuleDescription::Touch(Touch {
                main_table,
                touch_table,
                column,
                expr,
                options: s.options()?,
            })
        }

        "created_at" => RuleDescription::CreatedAt(CreatedAt {
            table: s.table("table")?,
            column: s.ident("column")?,
            options: s.options()?,
        }),

        "updated_at" => RuleDescription::UpdatedAt(UpdatedAt {
            table: s.table("table")?,
            column: s.ident("column")?,
            options: s.options()?,
        }),

        "immutable" => RuleDescription::Immutable(Immutable {
            table: s.table("table")?,
            columns: s.idents("columns")?,
            options: s.options()?,
        }),

        "force_defaults" => {
            let table = s.table("table")?;
            let defaults = s
                .mapping("defaults")?
                .into_iter()
                .map(|(column, value)| match value {
                    Value::Expr(expr) => Ok((column, expr)),
                    other => Err(s.invalid("defaults", format!("expected a value, got {:?}", other))),
                })
                .collect::<Result<_, ConfigError>>()?;
            RuleDescription::ForceDefaults(ForceDefaults {
                table,
                defaults,
                options: s.options()?,
            })
        }

        "foreign_key_array" => RuleDescription::ForeignKeyArray(ForeignKeyArray {
            table: s.table("table")?,
            column: s.ident("column")?,
            referenced_table: s.table("referenced_table")?,
            referenced_column: s.ident("referenced_column")?,
            referenced_function_name: s.optional_ident("referenced_function_name")?,
            referenced_trigger_name: s.optional_ident("referenced_trigger_name")?,
            options: s.options()?,
        }),

        "json_audit_log" => RuleDescription::JsonAuditLog(JsonAuditLog {
            log_table: s.table("log_table")?,
            tables: s.tables("tables")?,
            options: s.options()?,
        }),

        "outbox" => RuleDescription::Outbox(Outbox {
            table: s.table("table")?,
            outbox_table: s.optional_table("outbox_table")?,
            event_prefix: s.optional_ident("event_prefix")?,
            completion: if s.flag("boolean_completed_column")? {
                Completion::Boolean
            } else {
                Completion::Timestamp
            },
            key: if s.flag("uuid_primary_key")? {
                KeyStrategy::Uuid
            } else {
                KeyStrategy::Serial
            },
            events: s.events("events")?,
            when: s.optional_expr("when")?,
            options: s.options()?,
        }),

        _ => unreachable!(),
    };
    Ok(rule)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_counter_cache() {
        let rules = parse_rules(
            "# keeps accounts.num_entries current
            counter_cache {
                main_table = accounts
                main_table_id_column = id
                counter_column = num_entries
                counted_table = app.entries
                counted_table_id_column = account_id
                trigger_depth_limit = 2
            }",
        )
        .unwrap();
        assert_eq!(
            rules,
            vec![RuleDescription::CounterCache(CounterCache {
                main_table: TableRef::new("accounts"),
                main_table_id_column: "id".to_owned(),
                counter_column: "num_entries".to_owned(),
                counted_table: TableRef::with_schema("app", "entries"),
                counted_table_id_column: "account_id".to_owned(),
                options: RuleOptions {
                    trigger_depth_limit: Some(2),
                    ..RuleOptions::default()
                },
            })]
        );
    }

    #[test]
    fn test_parse_case_expression() {
        assert_eq!(
            parse_expr("case amount when 0 then 0 else 1 end").unwrap(),
            Expr::Case {
                operand: Some(Box::new(Expr::column("amount"))),
                branches: vec![(Expr::Integer(0), Expr::Integer(0))],
                default: Box::new(Expr::Integer(1)),
            }
        );
    }

    #[test]
    fn test_parse_searched_case_and_precedence() {
        let expr = parse_expr("CASE WHEN flag THEN a + b * 2 ELSE NULL END").unwrap();
        assert_eq!(
            expr,
            Expr::Case {
                operand: None,
                branches: vec![(
                    Expr::column("flag"),
                    Expr::Binary {
                        op: BinaryOp::Add,
                        lhs: Box::new(Expr::column("a")),
                        rhs: Box::new(Expr::Binary {
                            op: BinaryOp::Multiply,
                            lhs: Box::new(Expr::column("b")),
                            rhs: Box::new(Expr::Integer(2)),
                        }),
                    },
                )],
                default: Box::new(Expr::Null),
            }
        );
    }

    #[test]
    fn test_parse_boolean_precedence() {
        let expr = parse_expr("a = 1 OR NOT b AND c IS NOT NULL").unwrap();
        assert_eq!(
            expr,
            binary(
                BinaryOp::Or,
                binary(BinaryOp::Eq, Expr::column("a"), Expr::Integer(1)),
                binary(
                    BinaryOp::And,
                    Expr::Not(Box::new(Expr::column("b"))),
                    Expr::IsNull {
                        expr: Box::new(Expr::column("c")),
                        negated: true,
                    },
                ),
            )
        );
        assert_eq!(
            parse_expr("total + 1 != 0").unwrap(),
            binary(
                BinaryOp::NotEq,
                binary(BinaryOp::Add, Expr::column("total"), Expr::Integer(1)),
                Expr::Integer(0),
            )
        );
    }

    #[test]
    fn test_parse_row_qualified_and_strings() {
        assert_eq!(
            parse_expr("coalesce(NEW.amount, 'it''s')").unwrap(),
            Expr::Function {
                name: "coalesce".to_owned(),
                args: vec![
                    Expr::Qualified(Qualifier::Row(Row::New), "amount".to_owned()),
                    Expr::String("it's".to_owned()),
                ],
            }
        );
    }

    #[test]
    fn test_parse_touch_and_outbox() {
        let rules = parse_rules(
            "touch {
                main_table = children
                touch_table = parents
                column = changed_on
                expr = { id1: parent_id1, id2: parent_id2 }
            }
            outbox {
                table = orders;
                events = [insert, delete];
                uuid_primary_key = true;
                boolean_completed_column = true;
                when = NEW.published;
            }",
        )
        .unwrap();
        match &rules[0] {
            RuleDescription::Touch(touch) => assert_eq!(
                touch.expr,
                vec![
                    ("id1".to_owned(), "parent_id1".to_owned()),
                    ("id2".to_owned(), "parent_id2".to_owned()),
                ]
            ),
            other => panic!("unexpected rule {:?}", other),
        }
        match &rules[1] {
            RuleDescription::Outbox(outbox) => {
                assert_eq!(outbox.events, Some(vec![Event::Insert, Event::Delete]));
                assert_eq!(outbox.key, KeyStrategy::Uuid);
                assert_eq!(outbox.completion, Completion::Boolean);
                assert_eq!(
                    outbox.when,
                    Some(Expr::Qualified(Qualifier::Row(Row::New), "published".to_owned()))
                );
            }
            other => panic!("unexpected rule {:?}", other),
        }
    }

    #[test]
    fn test_missing_setting() {
        let err = parse_rules("immutable { table = accounts }").unwrap_err();
        assert_eq!(
            err.downcast_ref::<ConfigError>(),
            Some(&ConfigError::MissingField {
                rule: "immutable",
                field: "columns",
            })
        );
    }

    #[test]
    fn test_unknown_setting_and_kind() {
        let err = parse_rules("updated_at { table = t column = c colour = red }").unwrap_err();
        assert_eq!(err.to_string(), "updated_at: unknown setting `colour`");

        let err = parse_rules("audit { table = t }").unwrap_err();
        assert_eq!(err.to_string(), "Unknown rule kind \"audit\"");
    }
}
