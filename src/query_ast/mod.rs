//! Query abstract syntax tree.
//!
//! A [`QueryBuilder`] accumulates clauses while a query is assembled. Calling
//! [`QueryBuilder::finish`] consumes it and yields a [`Query`], which has no
//! mutation methods at all: once returned, the tree cannot change. Callers
//! that need a variation copy it back into a fresh builder with
//! [`Query::to_builder`].

pub mod dialect;
pub mod to_sql;

pub use dialect::Dialect;

use crate::field_parser::child_query::ChildQuery;

/// Physical tables are named `<prefix><entity>`
pub const TABLE_PREFIX: &str = "tab";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableRef {
    table_name: String,
}

impl TableRef {
    pub fn for_entity(entity: &str) -> Self {
        TableRef {
            table_name: format!("{TABLE_PREFIX}{entity}"),
        }
    }

    pub fn from_table_name(table_name: impl Into<String>) -> Self {
        TableRef {
            table_name: table_name.into(),
        }
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Entity name recovered from the naming convention
    pub fn entity(&self) -> &str {
        self.table_name
            .strip_prefix(TABLE_PREFIX)
            .unwrap_or(&self.table_name)
    }

    pub fn field(&self, name: impl Into<String>) -> Field {
        Field {
            table: self.clone(),
            name: name.into(),
            alias: None,
        }
    }

    pub fn star(&self) -> Term {
        Term::Star(Some(self.clone()))
    }
}

/// Column reference, always bound to a table.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub table: TableRef,
    pub name: String,
    pub alias: Option<String>,
}

impl Field {
    pub fn as_(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn with_alias(mut self, alias: Option<String>) -> Self {
        self.alias = alias;
        self
    }

    pub fn eq(self, other: impl Into<Term>) -> Criterion {
        Criterion::Compare {
            left: self.into(),
            op: BinaryOp::Eq,
            right: other.into(),
        }
    }

    pub fn isin(self, values: impl IntoIterator<Item = impl Into<Term>>) -> Criterion {
        Criterion::In {
            term: self.into(),
            values: values.into_iter().map(Into::into).collect(),
            negated: false,
        }
    }

    pub fn isnull(self) -> Criterion {
        Criterion::IsNull {
            term: self.into(),
            negated: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Literal {
    /// Text form used when a literal names a record (hierarchy lookups, IN splitting)
    pub fn as_text(&self) -> String {
        match self {
            Literal::Null => String::new(),
            Literal::Bool(b) => (*b as i64).to_string(),
            Literal::Int(i) => i.to_string(),
            Literal::Float(f) => f.to_string(),
            Literal::Str(s) => s.clone(),
        }
    }
}

impl From<&str> for Literal {
    fn from(value: &str) -> Self {
        Literal::Str(value.to_string())
    }
}

impl From<String> for Literal {
    fn from(value: String) -> Self {
        Literal::Str(value)
    }
}

impl From<i64> for Literal {
    fn from(value: i64) -> Self {
        Literal::Int(value)
    }
}

/// Arithmetic and comparison operators usable inside terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

impl BinaryOp {
    pub fn from_token(token: &str) -> Option<BinaryOp> {
        let op = match token {
            "+" => BinaryOp::Add,
            "-" => BinaryOp::Sub,
            "*" => BinaryOp::Mul,
            "/" => BinaryOp::Div,
            "=" => BinaryOp::Eq,
            "!=" | "<>" => BinaryOp::Ne,
            "<" => BinaryOp::Lt,
            ">" => BinaryOp::Gt,
            "<=" | "=<" => BinaryOp::Le,
            ">=" | "=>" => BinaryOp::Ge,
            _ => return None,
        };
        Some(op)
    }

    pub fn to_sql(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Eq => "=",
            BinaryOp::Ne => "<>",
            BinaryOp::Lt => "<",
            BinaryOp::Gt => ">",
            BinaryOp::Le => "<=",
            BinaryOp::Ge => ">=",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    pub name: String,
    pub args: Vec<Term>,
    pub alias: Option<String>,
}

impl FunctionCall {
    pub fn new(name: impl Into<String>, args: Vec<Term>) -> Self {
        FunctionCall {
            name: name.into(),
            args,
            alias: None,
        }
    }

    /// Plain column references made anywhere inside the call
    pub fn referenced_fields(&self) -> Vec<&Field> {
        let mut fields = Vec::new();
        for arg in &self.args {
            arg.collect_fields(&mut fields);
        }
        fields
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    Field(Field),
    /// `*`, optionally bound to a table
    Star(Option<TableRef>),
    Literal(Literal),
    Tuple(Vec<Term>),
    /// Ordinal reference in ORDER BY / GROUP BY
    Position(u64),
    Function(FunctionCall),
    Binary {
        left: Box<Term>,
        op: BinaryOp,
        right: Box<Term>,
    },
    /// Unit keyword of an `EXTRACT` call
    DatePart(DatePart),
    Criterion(Box<Criterion>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatePart {
    Year,
    Quarter,
    Month,
    Week,
    Day,
    Hour,
    Minute,
    Second,
}

impl DatePart {
    pub fn from_keyword(keyword: &str) -> Option<DatePart> {
        let part = match keyword.to_ascii_lowercase().as_str() {
            "year" => DatePart::Year,
            "quarter" => DatePart::Quarter,
            "month" => DatePart::Month,
            "week" => DatePart::Week,
            "day" => DatePart::Day,
            "hour" => DatePart::Hour,
            "minute" => DatePart::Minute,
            "second" => DatePart::Second,
            _ => return None,
        };
        Some(part)
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            DatePart::Year => "YEAR",
            DatePart::Quarter => "QUARTER",
            DatePart::Month => "MONTH",
            DatePart::Week => "WEEK",
            DatePart::Day => "DAY",
            DatePart::Hour => "HOUR",
            DatePart::Minute => "MINUTE",
            DatePart::Second => "SECOND",
        }
    }

    /// SQLite `STRFTIME` format; quarter is derived from the month
    pub fn strftime_format(&self) -> &'static str {
        match self {
            DatePart::Year => "%Y",
            DatePart::Quarter | DatePart::Month => "%m",
            DatePart::Week => "%W",
            DatePart::Day => "%d",
            DatePart::Hour => "%H",
            DatePart::Minute => "%M",
            DatePart::Second => "%S",
        }
    }
}

impl Term {
    pub fn binary(left: Term, op: BinaryOp, right: Term) -> Self {
        Term::Binary {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    fn collect_fields<'a>(&'a self, out: &mut Vec<&'a Field>) {
        match self {
            Term::Field(field) => out.push(field),
            Term::Tuple(items) => items.iter().for_each(|t| t.collect_fields(out)),
            Term::Function(call) => call.args.iter().for_each(|t| t.collect_fields(out)),
            Term::Binary { left, right, .. } => {
                left.collect_fields(out);
                right.collect_fields(out);
            }
            Term::Star(_)
            | Term::Literal(_)
            | Term::Position(_)
            | Term::DatePart(_)
            | Term::Criterion(_) => {}
        }
    }
}

impl From<Field> for Term {
    fn from(value: Field) -> Self {
        Term::Field(value)
    }
}

impl From<Literal> for Term {
    fn from(value: Literal) -> Self {
        Term::Literal(value)
    }
}

impl From<FunctionCall> for Term {
    fn from(value: FunctionCall) -> Self {
        Term::Function(value)
    }
}

impl From<&str> for Term {
    fn from(value: &str) -> Self {
        Term::Literal(Literal::from(value))
    }
}

impl From<String> for Term {
    fn from(value: String) -> Self {
        Term::Literal(Literal::Str(value))
    }
}

/// Boolean predicate tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Criterion {
    Compare {
        left: Term,
        op: BinaryOp,
        right: Term,
    },
    In {
        term: Term,
        values: Vec<Term>,
        negated: bool,
    },
    IsNull {
        term: Term,
        negated: bool,
    },
    Like {
        term: Term,
        pattern: Term,
        negated: bool,
    },
    Regex {
        term: Term,
        pattern: Term,
    },
    Between {
        term: Term,
        low: Term,
        high: Term,
    },
    All(Vec<Criterion>),
    Any(Vec<Criterion>),
    Not(Box<Criterion>),
    /// Opaque predicate from a trusted provider, rendered verbatim
    Raw(String),
}

impl Criterion {
    /// Conjunction of all criteria; a single criterion is returned unchanged
    pub fn all(mut criteria: Vec<Criterion>) -> Criterion {
        if criteria.len() == 1 {
            criteria.remove(0)
        } else {
            Criterion::All(criteria)
        }
    }

    pub fn and(self, other: Criterion) -> Criterion {
        match self {
            Criterion::All(mut items) => {
                items.push(other);
                Criterion::All(items)
            }
            left => Criterion::All(vec![left, other]),
        }
    }

    pub fn or(self, other: Criterion) -> Criterion {
        match self {
            Criterion::Any(mut items) => {
                items.push(other);
                Criterion::Any(items)
            }
            left => Criterion::Any(vec![left, other]),
        }
    }

    pub fn negate(self) -> Criterion {
        Criterion::Not(Box::new(self))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub table: TableRef,
    pub on: Criterion,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub term: Term,
    pub order: Order,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryMode {
    #[default]
    Select,
    Update,
    Insert,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockClause {
    pub skip_locked: bool,
    pub nowait: bool,
}

#[derive(Debug, Clone, PartialEq)]
struct QueryParts {
    mode: QueryMode,
    dialect: Dialect,
    table: TableRef,
    selects: Vec<Term>,
    joins: Vec<Join>,
    wheres: Vec<Criterion>,
    group_bys: Vec<Term>,
    order_bys: Vec<OrderBy>,
    limit: Option<u64>,
    offset: Option<u64>,
    distinct: bool,
    lock: Option<LockClause>,
    sets: Vec<(Field, Term)>,
    columns: Vec<Field>,
    rows: Vec<Vec<Term>>,
    child_queries: Vec<ChildQuery>,
}

/// Mutable accumulator for one query build.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryBuilder {
    parts: QueryParts,
}

impl QueryBuilder {
    pub fn new(mode: QueryMode, table: TableRef, dialect: Dialect) -> Self {
        QueryBuilder {
            parts: QueryParts {
                mode,
                dialect,
                table,
                selects: Vec::new(),
                joins: Vec::new(),
                wheres: Vec::new(),
                group_bys: Vec::new(),
                order_bys: Vec::new(),
                limit: None,
                offset: None,
                distinct: false,
                lock: None,
                sets: Vec::new(),
                columns: Vec::new(),
                rows: Vec::new(),
                child_queries: Vec::new(),
            },
        }
    }

    pub fn from_(table: TableRef, dialect: Dialect) -> Self {
        Self::new(QueryMode::Select, table, dialect)
    }

    pub fn table(&self) -> &TableRef {
        &self.parts.table
    }

    pub fn mode(&self) -> QueryMode {
        self.parts.mode
    }

    pub fn select(&mut self, term: impl Into<Term>) -> &mut Self {
        self.parts.selects.push(term.into());
        self
    }

    pub fn and_where(&mut self, criterion: Criterion) -> &mut Self {
        self.parts.wheres.push(criterion);
        self
    }

    pub fn left_join(&mut self, table: TableRef, on: Criterion) -> &mut Self {
        self.parts.joins.push(Join { table, on });
        self
    }

    /// Join by target identity, not by predicate equality
    pub fn is_joined(&self, table: &TableRef) -> bool {
        self.parts.joins.iter().any(|j| &j.table == table)
    }

    pub fn order_by(&mut self, term: impl Into<Term>, order: Order) -> &mut Self {
        self.parts.order_bys.push(OrderBy {
            term: term.into(),
            order,
        });
        self
    }

    pub fn group_by(&mut self, term: impl Into<Term>) -> &mut Self {
        self.parts.group_bys.push(term.into());
        self
    }

    pub fn limit(&mut self, limit: u64) -> &mut Self {
        self.parts.limit = Some(limit);
        self
    }

    pub fn offset(&mut self, offset: u64) -> &mut Self {
        self.parts.offset = Some(offset);
        self
    }

    pub fn distinct(&mut self) -> &mut Self {
        self.parts.distinct = true;
        self
    }

    pub fn for_update(&mut self, skip_locked: bool, nowait: bool) -> &mut Self {
        self.parts.lock = Some(LockClause {
            skip_locked,
            nowait,
        });
        self
    }

    /// `SET column = value` for update mode
    pub fn set(&mut self, column: &str, value: impl Into<Term>) -> &mut Self {
        let field = self.parts.table.field(column);
        self.parts.sets.push((field, value.into()));
        self
    }

    /// Target columns for insert mode
    pub fn columns(&mut self, columns: &[&str]) -> &mut Self {
        let table = self.parts.table.clone();
        self.parts
            .columns
            .extend(columns.iter().map(|c| table.field(*c)));
        self
    }

    /// One VALUES row for insert mode
    pub fn insert(&mut self, row: Vec<Term>) -> &mut Self {
        self.parts.rows.push(row);
        self
    }

    pub fn add_child_query(&mut self, child: ChildQuery) -> &mut Self {
        self.parts.child_queries.push(child);
        self
    }

    pub fn has_selects(&self) -> bool {
        !self.parts.selects.is_empty()
    }

    /// Freeze the query
    pub fn finish(self) -> Query {
        Query { parts: self.parts }
    }
}

/// Immutable, fully assembled query.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    parts: QueryParts,
}

impl Query {
    pub fn mode(&self) -> QueryMode {
        self.parts.mode
    }

    pub fn dialect(&self) -> Dialect {
        self.parts.dialect
    }

    pub fn table(&self) -> &TableRef {
        &self.parts.table
    }

    pub fn selects(&self) -> &[Term] {
        &self.parts.selects
    }

    pub fn joins(&self) -> &[Join] {
        &self.parts.joins
    }

    pub fn wheres(&self) -> &[Criterion] {
        &self.parts.wheres
    }

    pub fn group_bys(&self) -> &[Term] {
        &self.parts.group_bys
    }

    pub fn order_bys(&self) -> &[OrderBy] {
        &self.parts.order_bys
    }

    pub fn limit_value(&self) -> Option<u64> {
        self.parts.limit
    }

    pub fn offset_value(&self) -> Option<u64> {
        self.parts.offset
    }

    pub fn is_distinct(&self) -> bool {
        self.parts.distinct
    }

    pub fn lock(&self) -> Option<LockClause> {
        self.parts.lock
    }

    pub fn is_joined(&self, table: &TableRef) -> bool {
        self.parts.joins.iter().any(|j| &j.table == table)
    }

    /// Child-collection queries to run once parent rows are fetched
    pub fn child_queries(&self) -> &[ChildQuery] {
        &self.parts.child_queries
    }

    /// Copy into a new builder; `self` is left untouched
    pub fn to_builder(&self) -> QueryBuilder {
        QueryBuilder {
            parts: self.parts.clone(),
        }
    }
}
