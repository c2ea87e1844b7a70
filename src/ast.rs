pub type Identifier = String;
pub type ColumnName = Identifier;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TableRef {
    pub schema: Option<Identifier>,
    pub name: Identifier,
}

impl TableRef {
    pub fn new(name: impl Into<Identifier>) -> Self {
        Self {
            schema: None,
            name: name.into(),
        }
    }

    pub fn with_schema(schema: impl Into<Identifier>, name: impl Into<Identifier>) -> Self {
        Self {
            schema: Some(schema.into()),
            name: name.into(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Row {
    New,
    Old,
}

impl Row {
    pub fn keyword(self) -> &'static str {
        match self {
            Row::New => "NEW",
            Row::Old => "OLD",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Qualifier {
    Row(Row),
    Table(TableRef),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Eq => "=",
            BinaryOp::NotEq => "<>",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
            BinaryOp::And => "AND",
            BinaryOp::Or => "OR",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Expr {
    Column(ColumnName),
    Qualified(Qualifier, ColumnName),
    Integer(i64),
    String(String),
    Boolean(bool),
    Null,
    CurrentTimestamp,
    Case {
        operand: Option<Box<Expr>>,
        branches: Vec<(Expr, Expr)>,
        default: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Not(Box<Expr>),
    IsNull {
        expr: Box<Expr>,
        negated: bool,
    },
    Function {
        name: Identifier,
        args: Vec<Expr>,
    },
}

impl Expr {
    pub fn column(name: impl Into<ColumnName>) -> Self {
        Expr::Column(name.into())
    }

    pub fn qualified(&self, qualifier: &Qualifier) -> Expr {
        let q = |e: &Expr| Box::new(e.qualified(qualifier));
        match self {
            Expr::Column(name) => Expr::Qualified(qualifier.clone(), name.clone()),
            Expr::Case {
                operand,
                branches,
                default,
            } => Expr::Case {
                operand: operand.as_deref().map(q),
                branches: branches
                    .iter()
                    .map(|(when, then)| (when.qualified(qualifier), then.qualified(qualifier)))
                    .collect(),
                default: q(&**default),
            },
            Expr::Binary { op, lhs, rhs } => Expr::Binary {
                op: *op,
                lhs: q(&**lhs),
                rhs: q(&**rhs),
            },
            Expr::Not(expr) => Expr::Not(q(&**expr)),
            Expr::IsNull { expr, negated } => Expr::IsNull {
                expr: q(&**expr),
                negated: *negated,
            },
            Expr::Function { name, args } => Expr::Function {
                name: name.clone(),
                args: args.iter().map(|arg| arg.qualified(qualifier)).collect(),
            },
            other => other.clone(),
        }
    }

    pub fn for_row(&self, row: Row) -> Expr {
        self.qualified(&Qualifier::Row(row))
    }

    pub fn walk(&self, f: &mut dyn FnMut(&Expr)) {
        f(self);
        match self {
            Expr::Case {
                operand,
                branches,
                default,
            } => {
                if let Some(operand) = operand {
                    operand.walk(f);
                }
                for (when, then) in branches {
                    when.walk(f);
                    then.walk(f);
                }
                default.walk(f);
            }
            Expr::Binary { lhs, rhs, .. } => {
                lhs.walk(f);
                rhs.walk(f);
            }
            Expr::Not(expr) | Expr::IsNull { expr, .. } => expr.walk(f),
            Expr::Function { args, .. } => {
                for arg in args {
                    arg.walk(f);
                }
            }
            _ => {}
        }
    }

    pub fn as_column(&self) -> Option<&str> {
        match self {
            Expr::Column(name) => Some(name),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Event {
    Insert,
    Update,
    Delete,
}

impl Event {
    pub fn keyword(self) -> &'static str {
        match self {
            Event::Insert => "INSERT",
            Event::Update => "UPDATE",
            Event::Delete => "DELETE",
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RuleOptions {
    pub function_name: Option<Identifier>,
    pub trigger_name: Option<Identifier>,
    pub trigger_depth_limit: Option<i64>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CounterCache {
    pub main_table: TableRef,
    pub main_table_id_column: ColumnName,
    pub counter_column: ColumnName,
    pub counted_table: TableRef,
    pub counted_table_id_column: ColumnName,
    pub options: RuleOptions,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SumCache {
    pub main_table: TableRef,
    pub main_table_id_column: ColumnName,
    pub sum_column: ColumnName,
    pub summed_table: TableRef,
    pub summed_table_id_column: ColumnName,
    pub summed_column: Expr,
    pub options: RuleOptions,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SumThroughManyCache {
    pub main_table: TableRef,
    pub main_table_id_column: ColumnName,
    pub sum_column: ColumnName,
    pub summed_table: TableRef,
    pub summed_table_id_column: ColumnName,
    pub summed_column: Expr,
    pub join_table: TableRef,
    pub main_table_fk_column: ColumnName,
    pub summed_table_fk_column: ColumnName,
    pub join_function_name: Option<Identifier>,
    pub join_trigger_name: Option<Identifier>,
    pub options: RuleOptions,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Touch {
    pub main_table: TableRef,
    pub touch_table: TableRef,
    pub column: ColumnName,
    // `(touch table column, main table column)` pairs.
    pub expr: Vec<(ColumnName, ColumnName)>,
    pub options: RuleOptions,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreatedAt {
    pub table: TableRef,
    pub column: ColumnName,
    pub options: RuleOptions,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpdatedAt {
    pub table: TableRef,
    pub column: ColumnName,
    pub options: RuleOptions,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Immutable {
    pub table: TableRef,
    pub columns: Vec<ColumnName>,
    pub options: RuleOptions,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ForceDefaults {
    pub table: TableRef,
    pub defaults: Vec<(ColumnName, Expr)>,
    pub options: RuleOptions,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ForeignKeyArray {
    pub table: TableRef,
    pub column: ColumnName,
    pub referenced_table: TableRef,
    pub referenced_column: ColumnName,
    pub referenced_function_name: Option<Identifier>,
    pub referenced_trigger_name: Option<Identifier>,
    pub options: RuleOptions,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JsonAuditLog {
    pub log_table: TableRef,
    pub tables: Vec<TableRef>,
    pub options: RuleOptions,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Completion {
    #[default]
    Timestamp,
    Boolean,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum KeyStrategy {
    #[default]
    Serial,
    Uuid,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Outbox {
    pub table: TableRef,
    pub outbox_table: Option<TableRef>,
    pub event_prefix: Option<Identifier>,
    pub completion: Completion,
    pub key: KeyStrategy,
    pub events: Option<Vec<Event>>,
    pub when: Option<Expr>,
    pub options: RuleOptions,
}

impl Outbox {
    pub fn trigger_events(&self) -> Vec<Event> {
        self.events
            .clone()
            .unwrap_or_else(|| vec![Event::Insert, Event::Update, Event::Delete])
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RuleDescription {
    CounterCache(CounterCache),
    SumCache(SumCache),
    SumThroughManyCache(SumThroughManyCache),
    Touch(Touch),
    CreatedAt(CreatedAt),
    UpdatedAt(UpdatedAt),
    Immutable(Immutable),
    ForceDefaults(ForceDefaults),
    ForeignKeyArray(ForeignKeyArray),
    JsonAuditLog(JsonAuditLog),
    Outbox(Outbox),
}

impl RuleDescription {
    pub fn options(&self) -> &RuleOptions {
        match self {
            RuleDescription::CounterCache(rule) => &rule.options,
            RuleDescription::SumCache(rule) => &rule.options,
            RuleDescription::SumThroughManyCache(rule) => &rule.options,
            RuleDescription::Touch(rule) => &rule.options,
            RuleDescription::CreatedAt(rule) => &rule.options,
            RuleDescription::UpdatedAt(rule) => &rule.options,
            RuleDescription::Immutable(rule) => &rule.options,
            RuleDescription::ForceDefaults(rule) => &rule.options,
            RuleDescription::ForeignKeyArray(rule) => &rule.options,
            RuleDescription::JsonAuditLog(rule) => &rule.options,
            RuleDescription::Outbox(rule) => &rule.options,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            RuleDescription::CounterCache(_) => "counter_cache",
            RuleDescription::SumCache(_) => "sum_cache",
            RuleDescription::SumThroughManyCache(_) => "sum_through_many_cache",
            RuleDescription::Touch(_) => "touch",
            RuleDescription::CreatedAt(_) => "created_at",
            RuleDescription::UpdatedAt(_) => "updated_at",
            RuleDescription::Immutable(_) => "immutable",
            RuleDescription::ForceDefaults(_) => "force_defaults",
            RuleDescription::ForeignKeyArray(_) => "foreign_key_array",
            RuleDescription::JsonAuditLog(_) => "json_audit_log",
            RuleDescription::Outbox(_) => "outbox",
        }
    }
}
