use itertools::Itertools;

use crate::ast::Row;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Amount {
    Constant(i64),
    Values { new: String, old: String },
}

impl Amount {
    fn for_row(&self, row: Row) -> String {
        match (self, row) {
            (Amount::Constant(n), _) => n.to_string(),
            (Amount::Values { new, .. }, Row::New) => new.clone(),
            (Amount::Values { old, .. }, Row::Old) => old.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Selector {
    Column { column: String, key: String },
    Through {
        column: String,
        join_table: String,
        join_column: String,
        join_key: String,
        key: String,
    },
}

impl Selector {
    fn to_sql(&self, row: Row) -> String {
        let row = row.keyword();
        match self {
            Selector::Column { column, key } => format!("{} = {}.{}", column, row, key),
            Selector::Through {
                column,
                join_table,
                join_column,
                join_key,
                key,
            } => format!(
                "{} IN (SELECT {} FROM {} WHERE {} = {}.{})",
                column, join_column, join_table, join_key, row, key
            ),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OnUnchanged {
    Skip,
    Adjust,
}

#[derive(Clone, Debug)]
pub struct Delta {
    pub target: String,
    pub aggregate: String,
    pub key: Vec<String>,
    pub selector: Selector,
    pub amount: Amount,
    pub on_unchanged: OnUnchanged,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    Insert,
    Update,
    Delete,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Step<K> {
    Add(K),
    Subtract(K),
    Adjust(K),
}

impl Delta {
    fn unchanged(&self) -> String {
        self.key
            .iter()
            .map(|column| format!("NEW.{} IS NOT DISTINCT FROM OLD.{}", column, column))
            .join(" AND ")
    }

    fn present(&self, row: Row) -> String {
        self.key
            .iter()
            .map(|column| format!("{}.{} IS NOT NULL", row.keyword(), column))
            .join(" AND ")
    }

    fn update(&self, op: &str, value: String, row: Row) -> String {
        format!(
            "UPDATE {} SET {} = {} {} {} WHERE {};",
            self.target,
            self.aggregate,
            self.aggregate,
            op,
            value,
            self.selector.to_sql(row)
        )
    }

    pub fn to_sql(&self) -> String {
        let unchanged = match self.on_unchanged {
            OnUnchanged::Skip => "NULL;".to_owned(),
            OnUnchanged::Adjust => format!(
                "UPDATE {} SET {} = {} + {} - {} WHERE {};",
                self.target,
                self.aggregate,
                self.aggregate,
                self.amount.for_row(Row::New),
                self.amount.for_row(Row::Old),
                self.selector.to_sql(Row::New)
            ),
        };

        let mut s = String::new();
        s.push_str(&format!(
            "IF (TG_OP = 'UPDATE' AND ({})) THEN\n  {}\nELSE\n",
            self.unchanged(),
            unchanged
        ));
        s.push_str(&format!(
            "  IF ((TG_OP = 'INSERT' OR TG_OP = 'UPDATE') AND {}) THEN\n    {}\n  END IF;\n",
            self.present(Row::New),
            self.update("+", self.amount.for_row(Row::New), Row::New)
        ));
        s.push_str(&format!(
            "  IF ((TG_OP = 'DELETE' OR TG_OP = 'UPDATE') AND {}) THEN\n    {}\n  END IF;\n",
            self.present(Row::Old),
            self.update("-", self.amount.for_row(Row::Old), Row::Old)
        ));
        s.push_str("END IF;");
        s
    }

    /// The updates the rendered procedure performs for one event, given the
    /// old and new correlating keys (`None` when any key column is NULL).
    ///
    /// Mirrors the branch structure of [`Delta::to_sql`].
    pub fn steps<K: Clone + PartialEq>(
        &self,
        op: Operation,
        old_key: Option<K>,
        new_key: Option<K>,
    ) -> Vec<Step<K>> {
        if op == Operation::Update && old_key == new_key {
            return match (self.on_unchanged, new_key) {
                (OnUnchanged::Adjust, Some(key)) => vec![Step::Adjust(key)],
                _ => vec![],
            };
        }

        let mut steps = vec![];
        if matches!(op, Operation::Insert | Operation::Update) {
            steps.extend(new_key.map(Step::Add));
        }
        if matches!(op, Operation::Delete | Operation::Update) {
            steps.extend(old_key.map(Step::Subtract));
        }
        steps
    }
}

#[cfg(test)]
mod tests {
    use hashbag::HashBag;

    use super::*;

    fn counter() -> Delta {
        Delta {
            target: "\"accounts\"".to_owned(),
            aggregate: "\"num_entries\"".to_owned(),
            key: vec!["\"account_id\"".to_owned()],
            selector: Selector::Column {
                column: "\"id\"".to_owned(),
                key: "\"account_id\"".to_owned(),
            },
            amount: Amount::Constant(1),
            on_unchanged: OnUnchanged::Skip,
        }
    }

    fn sum() -> Delta {
        Delta {
            amount: Amount::Values {
                new: "NEW.\"amount\"".to_owned(),
                old: "OLD.\"amount\"".to_owned(),
            },
            on_unchanged: OnUnchanged::Adjust,
            ..counter()
        }
    }

    #[test]
    fn test_insert_and_delete() {
        let delta = counter();
        assert_eq!(
            delta.steps(Operation::Insert, None, Some(1)),
            vec![Step::Add(1)]
        );
        assert_eq!(
            delta.steps(Operation::Delete, Some(1), None),
            vec![Step::Subtract(1)]
        );
    }

    #[test]
    fn test_null_keys_never_participate() {
        let delta = sum();
        assert!(delta.steps::<i64>(Operation::Insert, None, None).is_empty());
        assert!(delta.steps::<i64>(Operation::Delete, None, None).is_empty());
        assert!(delta.steps::<i64>(Operation::Update, None, None).is_empty());
        assert_eq!(
            delta.steps(Operation::Update, Some(2), None),
            vec![Step::Subtract(2)]
        );
    }

    #[test]
    fn test_unchanged_key_update() {
        assert!(counter().steps(Operation::Update, Some(1), Some(1)).is_empty());
        assert_eq!(
            sum().steps(Operation::Update, Some(1), Some(1)),
            vec![Step::Adjust(1)]
        );
    }

    #[test]
    fn test_changed_key_update_moves_contribution() {
        let steps = counter().steps(Operation::Update, Some(1), Some(2));
        let steps: HashBag<_> = steps.into_iter().collect();
        let expected: HashBag<_> = vec![Step::Subtract(1), Step::Add(2)].into_iter().collect();
        assert_eq!(steps, expected);
    }

    #[test]
    fn test_counter_sql() {
        let sql = counter().to_sql();
        assert!(sql.starts_with(
            "IF (TG_OP = 'UPDATE' AND (NEW.\"account_id\" IS NOT DISTINCT FROM OLD.\"account_id\")) THEN\n  NULL;\nELSE"
        ));
        assert!(sql.contains(
            "UPDATE \"accounts\" SET \"num_entries\" = \"num_entries\" + 1 WHERE \"id\" = NEW.\"account_id\";"
        ));
        assert!(sql.contains(
            "UPDATE \"accounts\" SET \"num_entries\" = \"num_entries\" - 1 WHERE \"id\" = OLD.\"account_id\";"
        ));
        assert!(sql.contains("AND NEW.\"account_id\" IS NOT NULL) THEN"));
        assert!(sql.ends_with("END IF;"));
    }

    #[test]
    fn test_sum_adjusts_in_one_statement() {
        let sql = sum().to_sql();
        assert!(sql.contains(
            "UPDATE \"accounts\" SET \"num_entries\" = \"num_entries\" + NEW.\"amount\" - OLD.\"amount\" WHERE \"id\" = NEW.\"account_id\";"
        ));
    }

    #[test]
    fn test_through_selector() {
        let delta = Delta {
            selector: Selector::Through {
                column: "\"id\"".to_owned(),
                join_table: "\"links\"".to_owned(),
                join_column: "\"parent_id\"".to_owned(),
                join_key: "\"child_id\"".to_owned(),
                key: "\"id\"".to_owned(),
            },
            ..sum()
        };
        assert!(delta.to_sql().contains(
            "WHERE \"id\" IN (SELECT \"parent_id\" FROM \"links\" WHERE \"child_id\" = OLD.\"id\");"
        ));
    }

    #[test]
    fn test_composite_key() {
        let delta = Delta {
            key: vec!["\"a\"".to_owned(), "\"b\"".to_owned()],
            ..counter()
        };
        let sql = delta.to_sql();
        assert!(sql.contains(
            "(NEW.\"a\" IS NOT DISTINCT FROM OLD.\"a\" AND NEW.\"b\" IS NOT DISTINCT FROM OLD.\"b\")"
        ));
        assert!(sql.contains("AND NEW.\"a\" IS NOT NULL AND NEW.\"b\" IS NOT NULL) THEN"));
    }
}
