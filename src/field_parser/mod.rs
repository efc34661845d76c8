//! Field-list parsing.
//!
//! Turns the caller's field specification into [`ParsedField`] values. Every
//! string entry is validated and comment-stripped first, then routed to the
//! function-term parser, the dynamic-field resolver or the plain column
//! grammar, in that order. Child-collection mappings become [`ChildQuery`]
//! nodes that are executed after the parent rows are fetched.

pub mod child_query;
pub mod function_registry;
pub mod function_term;

use crate::catalog::MetadataProvider;
use crate::dynamic_field::DynamicField;
use crate::errors::QueryError;
use crate::expression_validator::{
    is_numeric, parse_clause_field, split_alias, split_top_level, ExpressionValidator,
};
use crate::query_ast::{Dialect, Field, FunctionCall, TableRef, Term};

pub use child_query::ChildQuery;
pub use function_registry::has_function;
pub use function_term::parse_function_term;

/// Field specification as supplied by the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum Fields {
    /// Comma-separated field list
    Text(String),
    List(Vec<FieldSpec>),
}

impl From<&str> for Fields {
    fn from(value: &str) -> Self {
        Fields::Text(value.to_string())
    }
}

impl From<String> for Fields {
    fn from(value: String) -> Self {
        Fields::Text(value)
    }
}

impl From<Vec<&str>> for Fields {
    fn from(value: Vec<&str>) -> Self {
        Fields::List(value.into_iter().map(FieldSpec::from).collect())
    }
}

impl From<Vec<FieldSpec>> for Fields {
    fn from(value: Vec<FieldSpec>) -> Self {
        Fields::List(value)
    }
}

/// One entry of a field list.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldSpec {
    /// A single field expression; not split on commas
    Text(String),
    /// Pre-built term, selected unchanged
    Term(Term),
    /// Child-collection field and the columns to fetch from its rows
    Child {
        fieldname: String,
        fields: Vec<String>,
    },
}

impl FieldSpec {
    pub fn child(fieldname: &str, fields: &[&str]) -> Self {
        FieldSpec::Child {
            fieldname: fieldname.to_string(),
            fields: fields.iter().map(|f| f.to_string()).collect(),
        }
    }
}

impl From<&str> for FieldSpec {
    fn from(value: &str) -> Self {
        FieldSpec::Text(value.to_string())
    }
}

impl From<Term> for FieldSpec {
    fn from(value: Term) -> Self {
        FieldSpec::Term(value)
    }
}

/// A resolved field, one variant per kind.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedField {
    /// Column of a physical table, possibly aliased
    Plain(Field),
    /// `*` of the queried table
    Star(TableRef),
    /// Ordinal reference into the select list
    Position(u64),
    Function(FunctionCall),
    /// Linked-record or child-row column, selected through a join
    Dynamic(DynamicField),
    ChildQuery(ChildQuery),
    Term(Term),
}

pub struct FieldParser<'a> {
    table: &'a TableRef,
    dialect: Dialect,
    metadata: &'a dyn MetadataProvider,
    validator: &'a ExpressionValidator,
}

impl<'a> FieldParser<'a> {
    pub fn new(
        table: &'a TableRef,
        dialect: Dialect,
        metadata: &'a dyn MetadataProvider,
        validator: &'a ExpressionValidator,
    ) -> Self {
        FieldParser {
            table,
            dialect,
            metadata,
            validator,
        }
    }

    fn entity(&self) -> &str {
        self.table.entity()
    }

    pub fn parse_fields(&self, fields: &Fields) -> Result<Vec<ParsedField>, QueryError> {
        let specs: Vec<FieldSpec> = match fields {
            Fields::Text(text) => split_top_level(text, ',')
                .into_iter()
                .map(str::trim)
                .filter(|f| !f.is_empty())
                .map(FieldSpec::from)
                .collect(),
            Fields::List(specs) => specs.clone(),
        };

        let mut parsed = Vec::with_capacity(specs.len());
        for spec in &specs {
            if let Some(field) = self.parse_single(spec)? {
                parsed.push(field);
            }
        }
        Ok(parsed)
    }

    /// `Ok(None)` when a child mapping does not name a child collection
    pub fn parse_single(&self, spec: &FieldSpec) -> Result<Option<ParsedField>, QueryError> {
        match spec {
            FieldSpec::Term(term) => Ok(Some(ParsedField::Term(term.clone()))),
            FieldSpec::Child { fieldname, fields } => Ok(ChildQuery::new(
                fieldname,
                fields.clone(),
                self.entity(),
                self.metadata,
            )?
            .map(ParsedField::ChildQuery)),
            FieldSpec::Text(text) => {
                let sanitized = self.validator.sanitize_field(text, self.dialect)?;
                self.parse_string_field(&sanitized).map(Some)
            }
        }
    }

    /// Parse one already-sanitized field expression
    pub fn parse_string_field(&self, field: &str) -> Result<ParsedField, QueryError> {
        if field == "*" {
            return Ok(ParsedField::Star(self.table.clone()));
        }
        if is_numeric(field) {
            return field
                .parse()
                .map(ParsedField::Position)
                .map_err(|_| QueryError::UnparsableField(field.to_string()));
        }
        if has_function(field) {
            return parse_function_term(field, self.table, self.dialect).map(ParsedField::Function);
        }
        if let Some(dynamic) = DynamicField::parse(field, self.entity(), self.metadata)? {
            return Ok(ParsedField::Dynamic(dynamic));
        }

        let (expr, alias) = split_alias(field);
        let clause =
            parse_clause_field(expr).ok_or_else(|| QueryError::UnparsableField(field.to_string()))?;
        let table = match (&clause.table, clause.prefixed_table()) {
            (None, _) => self.table.clone(),
            (Some(_), Some(prefixed)) => TableRef::from_table_name(prefixed),
            (Some(_), None) => return Err(QueryError::UnparsableField(field.to_string())),
        };
        Ok(ParsedField::Plain(table.field(clause.column).with_alias(alias)))
    }
}
