use itertools::Itertools;

use crate::ast::{Expr, Qualifier, TableRef};

pub trait Quoting {
    fn quote_identifier(&self, name: &str) -> String;

    fn quote_table(&self, table: &TableRef) -> String {
        self.quote_identifier(&table.name)
    }

    fn quote_schema_table(&self, table: &TableRef) -> String {
        match &table.schema {
            Some(schema) => format!(
                "{}.{}",
                self.quote_identifier(schema),
                self.quote_identifier(&table.name)
            ),
            None => self.quote_identifier(&table.name),
        }
    }

    fn quote_string(&self, s: &str) -> String {
        format!("'{}'", s.replace('\'', "''"))
    }

    fn literal(&self, expr: &Expr) -> String {
        match expr {
            Expr::Column(name) => self.quote_identifier(name),
            Expr::Qualified(Qualifier::Row(row), name) => {
                format!("{}.{}", row.keyword(), self.quote_identifier(name))
            }
            Expr::Qualified(Qualifier::Table(table), name) => {
                format!(
                    "{}.{}",
                    self.quote_schema_table(table),
                    self.quote_identifier(name)
                )
            }
            Expr::Integer(n) => n.to_string(),
            Expr::String(s) => self.quote_string(s),
            Expr::Boolean(true) => "true".to_owned(),
            Expr::Boolean(false) => "false".to_owned(),
            Expr::Null => "NULL".to_owned(),
            Expr::CurrentTimestamp => "CURRENT_TIMESTAMP".to_owned(),
            Expr::Case {
                operand,
                branches,
                default,
            } => {
                let mut s = String::from("(CASE ");
                if let Some(operand) = operand {
                    s.push_str(&self.literal(operand));
                    s.push(' ');
                }
                for (when, then) in branches {
                    s.push_str(&format!(
                        "WHEN {} THEN {} ",
                        self.literal(when),
                        self.literal(then)
                    ));
                }
                s.push_str(&format!("ELSE {} END)", self.literal(default)));
                s
            }
            Expr::Binary { op, lhs, rhs } => format!(
                "({} {} {})",
                self.literal(lhs),
                op.symbol(),
                self.literal(rhs)
            ),
            Expr::Not(expr) => format!("(NOT {})", self.literal(expr)),
            Expr::IsNull { expr, negated } => format!(
                "({} IS {}NULL)",
                self.literal(expr),
                if *negated { "NOT " } else { "" }
            ),
            Expr::Function { name, args } => format!(
                "{}({})",
                name,
                args.iter().map(|arg| self.literal(arg)).join(", ")
            ),
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct PgQuoting;

impl Quoting for PgQuoting {
    fn quote_identifier(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }
}
