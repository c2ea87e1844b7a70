use tracing::debug;

use crate::ast::{ColumnName, Event, Identifier, RuleDescription, TableRef};
use crate::naming::Names;
use crate::quote::Quoting;
use crate::validate::{self, validate};
use crate::{cache, capture, guards, timestamps, touch};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReturnContract {
    RowImage,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcedureSpec {
    pub name: Identifier,
    pub table: Option<TableRef>,
    pub body: String,
    pub returns: ReturnContract,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Timing {
    Before,
    After,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Granularity {
    Row,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TriggerSpec {
    pub name: Identifier,
    pub table: TableRef,
    pub procedure: Identifier,
    pub events: Vec<Event>,
    pub granularity: Granularity,
    pub timing: Timing,
    pub when: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: ColumnName,
    pub sql_type: String,
    pub not_null: bool,
    pub default: Option<String>,
    pub primary_key: bool,
}

impl ColumnDef {
    pub fn new(name: impl Into<ColumnName>, sql_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql_type: sql_type.into(),
            not_null: false,
            default: None,
            primary_key: false,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    pub fn default_value(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableSpec {
    pub name: TableRef,
    pub columns: Vec<ColumnDef>,
    pub indexes: Vec<Vec<ColumnName>>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Compilation {
    pub tables: Vec<TableSpec>,
    pub procedures: Vec<ProcedureSpec>,
    pub triggers: Vec<TriggerSpec>,
}

impl Compilation {
    pub fn procedure(&self, name: &str) -> Option<&ProcedureSpec> {
        self.procedures.iter().find(|procedure| procedure.name == name)
    }

    pub fn trigger(&self, name: &str) -> Option<&TriggerSpec> {
        self.triggers.iter().find(|trigger| trigger.name == name)
    }

    pub(crate) fn add_trigger(
        &mut self,
        table: &TableRef,
        names: Names,
        events: &[Event],
        timing: Timing,
        body: String,
    ) {
        self.procedures.push(ProcedureSpec {
            name: names.function.clone(),
            table: Some(table.clone()),
            body,
            returns: ReturnContract::RowImage,
        });
        self.attach(table, names.trigger, names.function, events, timing, None);
    }

    pub(crate) fn attach(
        &mut self,
        table: &TableRef,
        name: Identifier,
        procedure: Identifier,
        events: &[Event],
        timing: Timing,
        when: Option<String>,
    ) {
        self.triggers.push(TriggerSpec {
            name,
            table: table.clone(),
            procedure,
            events: events.to_vec(),
            granularity: Granularity::Row,
            timing,
            when,
        });
    }
}

pub const ALL_EVENTS: [Event; 3] = [Event::Insert, Event::Update, Event::Delete];

pub struct Compiler<'q> {
    quoting: &'q dyn Quoting,
}

impl<'q> Compiler<'q> {
    pub fn new(quoting: &'q dyn Quoting) -> Self {
        Self { quoting }
    }

    pub fn compile(&self, rule: &RuleDescription) -> validate::Result<Compilation> {
        validate(rule)?;

        let q = self.quoting;
        let compilation = match rule {
            RuleDescription::CounterCache(rule) => cache::counter_cache(q, rule),
            RuleDescription::SumCache(rule) => cache::sum_cache(q, rule),
            RuleDescription::SumThroughManyCache(rule) => cache::sum_through_many_cache(q, rule),
            RuleDescription::Touch(rule) => touch::touch(q, rule),
            RuleDescription::CreatedAt(rule) => timestamps::created_at(q, rule),
            RuleDescription::UpdatedAt(rule) => timestamps::updated_at(q, rule),
            RuleDescription::Immutable(rule) => guards::immutable(q, rule),
            RuleDescription::ForceDefaults(rule) => timestamps::force_defaults(q, rule),
            RuleDescription::ForeignKeyArray(rule) => guards::foreign_key_array(q, rule),
            RuleDescription::JsonAuditLog(rule) => capture::json_audit_log(q, rule),
            RuleDescription::Outbox(rule) => capture::outbox(q, rule),
        };

        for procedure in &compilation.procedures {
            debug!(kind = rule.kind(), procedure = %procedure.name, "compiled procedure");
        }
        Ok(compilation)
    }
}
