use anyhow::{Context, Result};
use itertools::Itertools;
use tracing::info;

use crate::compiler::{Compilation, Granularity, ProcedureSpec, TableSpec, Timing, TriggerSpec};
use crate::quote::Quoting;

pub trait Database {
    fn create_table(&mut self, table: &TableSpec) -> Result<()>;
    fn install_procedure(&mut self, procedure: &ProcedureSpec) -> Result<()>;
    fn install_trigger(&mut self, trigger: &TriggerSpec) -> Result<()>;
}

pub fn install(database: &mut dyn Database, compilation: &Compilation) -> Result<()> {
    for table in &compilation.tables {
        database
            .create_table(table)
            .with_context(|| format!("Failed to create table {:?}", table.name.name))?;
        info!(table = %table.name.name, "created table");
    }
    for procedure in &compilation.procedures {
        database
            .install_procedure(procedure)
            .with_context(|| format!("Failed to install function {:?}", procedure.name))?;
        info!(function = %procedure.name, "installed function");
    }
    for trigger in &compilation.triggers {
        database.install_trigger(trigger).with_context(|| {
            format!(
                "Failed to install trigger {:?} on {:?}",
                trigger.name, trigger.table.name
            )
        })?;
        info!(trigger = %trigger.name, table = %trigger.table.name, "installed trigger");
    }
    Ok(())
}

pub struct Script<'q> {
    quoting: &'q dyn Quoting,
    statements: Vec<String>,
}

impl<'q> Script<'q> {
    pub fn new(quoting: &'q dyn Quoting) -> Self {
        Self {
            quoting,
            statements: vec![],
        }
    }

    pub fn statements(&self) -> &[String] {
        &self.statements
    }

    pub fn to_sql(&self) -> String {
        let mut s = self.statements.join("\n\n");
        s.push('\n');
        s
    }
}

fn dollar_tag(body: &str) -> String {
    let mut tag = "$pgt$".to_owned();
    let mut n = 0;
    while body.contains(&tag) {
        n += 1;
        tag = format!("$pgt{}$", n);
    }
    tag
}

impl Database for Script<'_> {
    fn create_table(&mut self, table: &TableSpec) -> Result<()> {
        let q = self.quoting;
        let name = q.quote_schema_table(&table.name);
        let columns = table
            .columns
            .iter()
            .map(|column| {
                let mut s = format!("  {} {}", q.quote_identifier(&column.name), column.sql_type);
                if column.primary_key {
                    s.push_str(" PRIMARY KEY");
                }
                if column.not_null {
                    s.push_str(" NOT NULL");
                }
                if let Some(default) = &column.default {
                    s.push_str(" DEFAULT ");
                    s.push_str(default);
                }
                s
            })
            .join(",\n");
        self.statements
            .push(format!("CREATE TABLE {} (\n{}\n);", name, columns));

        for index in &table.indexes {
            self.statements.push(format!(
                "CREATE INDEX ON {} ({});",
                name,
                index.iter().map(|column| q.quote_identifier(column)).join(", ")
            ));
        }
        Ok(())
    }

    fn install_procedure(&mut self, procedure: &ProcedureSpec) -> Result<()> {
        let tag = dollar_tag(&procedure.body);
        self.statements.push(format!(
            "CREATE OR REPLACE FUNCTION {}() RETURNS trigger LANGUAGE plpgsql AS {}\n{}\n{};",
            self.quoting.quote_identifier(&procedure.name),
            tag,
            procedure.body,
            tag
        ));
        Ok(())
    }

    fn install_trigger(&mut self, trigger: &TriggerSpec) -> Result<()> {
        let q = self.quoting;
        let name = q.quote_identifier(&trigger.name);
        let table = q.quote_schema_table(&trigger.table);
        let timing = match trigger.timing {
            Timing::Before => "BEFORE",
            Timing::After => "AFTER",
        };
        let granularity = match trigger.granularity {
            Granularity::Row => "FOR EACH ROW",
        };
        let events = trigger.events.iter().map(|event| event.keyword()).join(" OR ");
        let when = match &trigger.when {
            Some(condition) => format!(" WHEN ({})", condition),
            None => String::new(),
        };

        self.statements
            .push(format!("DROP TRIGGER IF EXISTS {} ON {};", name, table));
        self.statements.push(format!(
            "CREATE TRIGGER {} {} {} ON {} {}{} EXECUTE FUNCTION {}();",
            name,
            timing,
            events,
            table,
            granularity,
            when,
            q.quote_identifier(&trigger.procedure)
        ));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Event, TableRef};
    use crate::compiler::{ColumnDef, ReturnContract};
    use crate::quote::PgQuoting;

    #[derive(Default)]
    struct Recorder {
        log: Vec<String>,
        fail_on: Option<String>,
    }

    impl Database for Recorder {
        fn create_table(&mut self, table: &TableSpec) -> Result<()> {
            self.log.push(format!("table {}", table.name.name));
            Ok(())
        }

        fn install_procedure(&mut self, procedure: &ProcedureSpec) -> Result<()> {
            if self.fail_on.as_deref() == Some(procedure.name.as_str()) {
                anyhow::bail!("permission denied");
            }
            self.log.push(format!("function {}", procedure.name));
            Ok(())
        }

        fn install_trigger(&mut self, trigger: &TriggerSpec) -> Result<()> {
            self.log.push(format!("trigger {}", trigger.name));
            Ok(())
        }
    }

    fn compilation() -> Compilation {
        let mut compilation = Compilation::default();
        compilation.tables.push(TableSpec {
            name: TableRef::new("logs"),
            columns: vec![ColumnDef::new("id", "bigserial").primary_key()],
            indexes: vec![],
        });
        compilation.procedures.push(ProcedureSpec {
            name: "log_it".to_owned(),
            table: None,
            body: "BEGIN\n  RETURN NEW;\nEND;".to_owned(),
            returns: ReturnContract::RowImage,
        });
        compilation.attach(
            &TableRef::with_schema("app", "accounts"),
            "log_accounts".to_owned(),
            "log_it".to_owned(),
            &[Event::Update, Event::Delete],
            Timing::After,
            Some("OLD.\"id\" > 0".to_owned()),
        );
        compilation
    }

    #[test]
    fn test_install_order() {
        let mut recorder = Recorder::default();
        install(&mut recorder, &compilation()).unwrap();
        assert_eq!(
            recorder.log,
            vec!["table logs", "function log_it", "trigger log_accounts"]
        );
    }

    #[test]
    fn test_install_stops_at_first_failure() {
        let mut recorder = Recorder {
            fail_on: Some("log_it".to_owned()),
            ..Recorder::default()
        };
        let err = install(&mut recorder, &compilation()).unwrap_err();
        assert_eq!(err.to_string(), "Failed to install function \"log_it\"");
        assert_eq!(recorder.log, vec!["table logs"]);
    }

    #[test]
    fn test_script() {
        let mut script = Script::new(&PgQuoting);
        install(&mut script, &compilation()).unwrap();
        assert_eq!(
            script.statements(),
            &[
                "CREATE TABLE \"logs\" (\n  \"id\" bigserial PRIMARY KEY\n);".to_owned(),
                "CREATE OR REPLACE FUNCTION \"log_it\"() RETURNS trigger LANGUAGE plpgsql AS $pgt$\nBEGIN\n  RETURN NEW;\nEND;\n$pgt$;".to_owned(),
                "DROP TRIGGER IF EXISTS \"log_accounts\" ON \"app\".\"accounts\";".to_owned(),
                "CREATE TRIGGER \"log_accounts\" AFTER UPDATE OR DELETE ON \"app\".\"accounts\" FOR EACH ROW WHEN (OLD.\"id\" > 0) EXECUTE FUNCTION \"log_it\"();".to_owned(),
            ]
        );
    }

    #[test]
    fn test_dollar_tag_avoids_body_contents() {
        assert_eq!(dollar_tag("RETURN NEW;"), "$pgt$");
        assert_eq!(dollar_tag("SELECT '$pgt$';"), "$pgt1$");
    }
}
