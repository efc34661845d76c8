//! Filter normalization.
//!
//! Scalars, mappings, tuple lists and pre-built predicates are all reduced
//! to criteria against resolved fields and ANDed onto the query. Field
//! identifiers only reach the AST through the clause grammar or the
//! dynamic-field resolver; any other shape is rejected.

pub mod hierarchy;
pub mod operators;
pub mod value;

use serde_json::Value;

use crate::catalog::{MetadataProvider, NestedSetStore};
use crate::dynamic_field::{child_join_criterion, DynamicField};
use crate::errors::QueryError;
use crate::expression_validator::{has_special_chars, parse_clause_field, validate_entity_name};
use crate::query_ast::{BinaryOp, Criterion, Field, Literal, QueryBuilder, TableRef, Term};

pub use hierarchy::get_nested_set_hierarchy_result;
pub use operators::{HierarchyOp, Operator};
pub use value::{convert_to_value, FilterValue};

/// Filter specification as supplied by the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum Filters {
    /// Scalar (primary key), mapping, list of scalars or list of tuples
    Json(Value),
    /// Pre-built predicate, attached unchanged
    Criterion(Criterion),
    /// Several specifications applied in order
    List(Vec<Filters>),
}

impl From<Value> for Filters {
    fn from(value: Value) -> Self {
        Filters::Json(value)
    }
}

impl From<Criterion> for Filters {
    fn from(value: Criterion) -> Self {
        Filters::Criterion(value)
    }
}

pub struct FilterCompiler<'a> {
    table: &'a TableRef,
    metadata: &'a dyn MetadataProvider,
    hierarchy: &'a dyn NestedSetStore,
}

impl<'a> FilterCompiler<'a> {
    pub fn new(
        table: &'a TableRef,
        metadata: &'a dyn MetadataProvider,
        hierarchy: &'a dyn NestedSetStore,
    ) -> Self {
        FilterCompiler {
            table,
            metadata,
            hierarchy,
        }
    }

    fn entity(&self) -> &str {
        self.table.entity()
    }

    pub fn apply(&self, query: &mut QueryBuilder, filters: &Filters) -> Result<(), QueryError> {
        match filters {
            Filters::Criterion(criterion) => {
                query.and_where(criterion.clone());
                Ok(())
            }
            Filters::List(items) => items.iter().try_for_each(|f| self.apply(query, f)),
            Filters::Json(value) => self.apply_json(query, value),
        }
    }

    fn apply_json(&self, query: &mut QueryBuilder, filters: &Value) -> Result<(), QueryError> {
        match filters {
            Value::Null => Ok(()),
            Value::Object(map) => {
                for (field, value) in map {
                    self.apply_dict_entry(query, field, value)?;
                }
                Ok(())
            }
            Value::Array(items) if !items.is_empty() && items.iter().all(is_filter_scalar) => {
                let values = Value::Array(items.clone());
                self.apply_filter(query, "name", &values, "in", None)
            }
            Value::Array(items) => {
                for item in items {
                    match item {
                        Value::Array(tuple) => self.apply_list_filter(query, tuple)?,
                        other => self.apply_json(query, other)?,
                    }
                }
                Ok(())
            }
            scalar => self.apply_filter(query, "name", scalar, "=", None),
        }
    }

    /// `field: value` or `field: [operator, value]`
    fn apply_dict_entry(
        &self,
        query: &mut QueryBuilder,
        field: &str,
        value: &Value,
    ) -> Result<(), QueryError> {
        match value {
            Value::Array(pair) => match pair.as_slice() {
                [Value::String(operator), value] => {
                    self.apply_filter(query, field, value, operator, None)
                }
                _ => Err(QueryError::UnknownFilterFormat(format!("{field}: {value}"))),
            },
            value => self.apply_filter(query, field, value, "=", None),
        }
    }

    /// `[field, value]`, `[field, operator, value]` or `[entity, field, operator, value]`
    fn apply_list_filter(&self, query: &mut QueryBuilder, tuple: &[Value]) -> Result<(), QueryError> {
        let unknown = || QueryError::UnknownFilterFormat(Value::Array(tuple.to_vec()).to_string());
        match tuple {
            [Value::String(field), value] => self.apply_filter(query, field, value, "=", None),
            [Value::String(field), Value::String(operator), value] => {
                self.apply_filter(query, field, value, operator, None)
            }
            [Value::String(entity), Value::String(field), Value::String(operator), value] => {
                self.apply_filter(query, field, value, operator, Some(entity))
            }
            _ => Err(unknown()),
        }
    }

    fn apply_filter(
        &self,
        query: &mut QueryBuilder,
        field: &str,
        value: &Value,
        operator: &str,
        entity: Option<&str>,
    ) -> Result<(), QueryError> {
        let operator = Operator::parse(operator)?;
        let entity = entity.filter(|e| *e != self.entity());
        if let Some(entity) = entity {
            self.join_child_entity(query, entity)?;
        }
        let field = self.resolve_field(query, field, entity)?;
        let value = convert_to_value(value)?;

        if let Operator::Hierarchy(op) = operator {
            let criterion = self.hierarchy_criterion(field, &value, op)?;
            query.and_where(criterion);
            return Ok(());
        }

        let criterion = if value.is_null() {
            Criterion::IsNull {
                term: field.into(),
                negated: operator == Operator::Compare(BinaryOp::Ne),
            }
        } else {
            operator.build(field.into(), value)?
        };
        query.and_where(criterion);
        Ok(())
    }

    /// Left-join a child entity named by a 4-tuple filter. Any other entity
    /// must already be joined, or the predicate would name an absent table.
    fn join_child_entity(&self, query: &mut QueryBuilder, entity: &str) -> Result<(), QueryError> {
        validate_entity_name(entity)?;
        let table = TableRef::for_entity(entity);
        if query.is_joined(&table) {
            return Ok(());
        }
        if !self.metadata.is_child_entity(entity)? {
            return Err(QueryError::UnknownFilterFormat(format!(
                "{entity} is neither {} nor one of its child entities",
                self.entity()
            )));
        }
        log::debug!("joining {} for filter", table.table_name());
        let on = child_join_criterion(&table, self.entity(), None);
        query.left_join(table, on);
        Ok(())
    }

    /// Resolve a filter field. Identifiers outside `[A-Za-z0-9_]` must be a
    /// dynamic field or a clause field naming a physical table.
    pub fn resolve_field(
        &self,
        query: &mut QueryBuilder,
        field: &str,
        entity: Option<&str>,
    ) -> Result<Field, QueryError> {
        if field.trim().is_empty() {
            return Err(QueryError::InvalidFilterField(field.to_string()));
        }
        let table = entity.map_or_else(|| self.table.clone(), TableRef::for_entity);
        if !has_special_chars(field) {
            return Ok(table.field(field));
        }

        if let Some(dynamic) = DynamicField::parse(field, self.entity(), self.metadata)? {
            dynamic.apply_join(query);
            return Ok(dynamic.field());
        }

        let reject = || QueryError::InvalidFilterField(field.to_string());
        let clause = parse_clause_field(field).ok_or_else(reject)?;
        match (&clause.table, clause.prefixed_table()) {
            (None, _) => Ok(table.field(clause.column)),
            (Some(_), Some(prefixed)) => Ok(TableRef::from_table_name(prefixed).field(clause.column)),
            (Some(_), None) => Err(reject()),
        }
    }

    /// `IN`/`NOT IN` over the related node names. The tree is the one the
    /// field links to, or the field's own entity when it is not a link.
    fn hierarchy_criterion(
        &self,
        field: Field,
        value: &FilterValue,
        op: HierarchyOp,
    ) -> Result<Criterion, QueryError> {
        let owner = field.table.entity().to_string();
        let tree_entity = self
            .metadata
            .get_field(&owner, &field.name)?
            .and_then(|meta| meta.options)
            .unwrap_or(owner);
        let name = value.as_text()?;

        let mut nodes: Vec<Term> =
            get_nested_set_hierarchy_result(self.hierarchy, &tree_entity, &name, op)?
                .into_iter()
                .map(Term::from)
                .collect();
        if nodes.is_empty() {
            nodes.push(Term::Literal(Literal::from("")));
        }
        Ok(Criterion::In {
            term: field.into(),
            values: nodes,
            negated: op.is_negated(),
        })
    }
}

fn is_filter_scalar(value: &Value) -> bool {
    matches!(
        value,
        Value::Bool(_) | Value::Number(_) | Value::String(_)
    )
}
