//! # Query Engine
//!
//! Entry point that turns a [`QueryRequest`] into a frozen [`Query`].
//!
//! ## Build Sequence
//!
//! 1. Resolve the table; entity names are validated before anything else
//! 2. Entity-level read check, when permissions apply
//! 3. Pick the mode; select mode parses fields and filters columns
//! 4. Compile filters
//! 5. Order by, limit, offset, distinct, row locking, group by
//! 6. Row-level permission predicates, when permissions apply
//! 7. Freeze
//!
//! Every step either mutates the private builder or fails the whole build;
//! nothing partial ever escapes.

pub mod request;

use crate::catalog::Collaborators;
use crate::config::BuilderConfig;
use crate::errors::QueryError;
use crate::expression_validator::{
    parse_group_by, parse_order_by, validate_entity_name, ClauseField, ClauseItem,
    ExpressionValidator,
};
use crate::field_parser::{FieldParser, Fields, ParsedField};
use crate::filter_compiler::{FilterCompiler, Filters};
use crate::permissions::{
    add_permission_conditions, apply_field_permissions, check_read_permission, PermissionContext,
};
use crate::query_ast::{Query, QueryBuilder, QueryMode, TableRef, Term};

pub use request::{QueryRequest, TableSpec};

/// Stateless query builder bound to its collaborators. One engine serves any
/// number of concurrent builds; the only shared state is the validator cache.
pub struct Engine {
    services: Collaborators,
    config: BuilderConfig,
    validator: ExpressionValidator,
}

impl Engine {
    pub fn new(services: Collaborators, config: BuilderConfig) -> Self {
        let validator = ExpressionValidator::new(config.validator_cache_size);
        Engine {
            services,
            config,
            validator,
        }
    }

    pub fn services(&self) -> &Collaborators {
        &self.services
    }

    pub fn config(&self) -> &BuilderConfig {
        &self.config
    }

    pub fn validator(&self) -> &ExpressionValidator {
        &self.validator
    }

    pub fn get_query(
        &self,
        request: &QueryRequest,
        ctx: &PermissionContext,
    ) -> Result<Query, QueryError> {
        let table = resolve_table(&request.table)?;
        log::debug!("building {:?} query on {}", request.mode, table.table_name());

        if ctx.apply_permissions {
            check_read_permission(self.services.permissions.as_ref(), table.entity(), ctx)?;
        }

        let mut query = QueryBuilder::new(request.mode, table.clone(), self.config.dialect);
        if request.mode == QueryMode::Select {
            self.apply_fields(&mut query, request.fields.as_ref(), ctx)?;
        }

        if let Some(filters) = &request.filters {
            self.apply_filters(&mut query, filters)?;
        }

        if let Some(order_by) = &request.order_by {
            apply_order_by(&mut query, order_by)?;
        }

        match request.limit {
            Some(limit) if limit < 0 => return Err(QueryError::InvalidLimit(limit)),
            Some(limit) if limit > 0 => {
                query.limit(limit as u64);
            }
            _ => {}
        }
        match request.offset {
            Some(offset) if offset < 0 => return Err(QueryError::InvalidOffset(offset)),
            Some(offset) if offset > 0 => {
                query.offset(offset as u64);
            }
            _ => {}
        }

        if request.distinct {
            query.distinct();
        }
        if request.for_update {
            query.for_update(request.skip_locked, !request.wait);
        }

        if let Some(group_by) = &request.group_by {
            apply_group_by(&mut query, group_by)?;
        }

        if ctx.apply_permissions {
            add_permission_conditions(
                &mut query,
                &self.services,
                ctx,
                self.config.apply_strict_user_permissions,
            )?;
        }

        log::debug!("query on {} frozen", table.table_name());
        Ok(query.finish())
    }

    fn apply_fields(
        &self,
        query: &mut QueryBuilder,
        fields: Option<&Fields>,
        ctx: &PermissionContext,
    ) -> Result<(), QueryError> {
        let table = query.table().clone();
        let parser = FieldParser::new(
            &table,
            self.config.dialect,
            self.services.metadata.as_ref(),
            &self.validator,
        );
        let mut parsed = match fields {
            Some(fields) => parser.parse_fields(fields)?,
            None => Vec::new(),
        };
        if ctx.filters_fields() {
            parsed = apply_field_permissions(parsed, self.services.permissions.as_ref(), &table, ctx)?;
        }
        log::debug!("{} fields selected from {}", parsed.len(), table.entity());

        for field in parsed {
            match field {
                ParsedField::Plain(field) => {
                    query.select(field);
                }
                ParsedField::Star(star_table) => {
                    query.select(star_table.star());
                }
                ParsedField::Position(position) => {
                    query.select(Term::Position(position));
                }
                ParsedField::Function(call) => {
                    query.select(call);
                }
                ParsedField::Dynamic(dynamic) => dynamic.apply_select(query),
                ParsedField::ChildQuery(child) => {
                    query.add_child_query(child);
                }
                ParsedField::Term(term) => {
                    query.select(term);
                }
            }
        }

        // child queries are keyed on the parent name
        if !query.has_selects() {
            query.select(table.field("name"));
        }
        Ok(())
    }

    fn apply_filters(&self, query: &mut QueryBuilder, filters: &Filters) -> Result<(), QueryError> {
        let table = query.table().clone();
        FilterCompiler::new(
            &table,
            self.services.metadata.as_ref(),
            self.services.hierarchy.as_ref(),
        )
        .apply(query, filters)
    }
}

fn resolve_table(table: &TableSpec) -> Result<TableRef, QueryError> {
    match table {
        TableSpec::Entity(entity) => {
            validate_entity_name(entity)?;
            Ok(TableRef::for_entity(entity))
        }
        TableSpec::Table(table) => Ok(table.clone()),
    }
}

/// Clause operand: bare columns belong to the queried table, qualified ones
/// must name a physical table
fn clause_term(table: &TableRef, item: ClauseItem) -> Option<Term> {
    match item {
        ClauseItem::Position(position) => Some(Term::Position(position)),
        ClauseItem::Field(field) => {
            let owner = match (&field.table, field.prefixed_table()) {
                (None, _) => table.clone(),
                (Some(_), Some(prefixed)) => TableRef::from_table_name(prefixed),
                (Some(_), None) => return None,
            };
            Some(owner.field(field.column).into())
        }
    }
}

fn clause_text(item: &ClauseItem) -> String {
    match item {
        ClauseItem::Position(position) => position.to_string(),
        ClauseItem::Field(ClauseField {
            table: Some(table),
            column,
        }) => format!("{table}.{column}"),
        ClauseItem::Field(ClauseField { table: None, column }) => column.clone(),
    }
}

fn apply_order_by(query: &mut QueryBuilder, order_by: &str) -> Result<(), QueryError> {
    let table = query.table().clone();
    for declaration in parse_order_by(order_by)? {
        let text = clause_text(&declaration.item);
        let term = clause_term(&table, declaration.item).ok_or(QueryError::InvalidOrderBy(text))?;
        query.order_by(term, declaration.order);
    }
    Ok(())
}

fn apply_group_by(query: &mut QueryBuilder, group_by: &str) -> Result<(), QueryError> {
    let table = query.table().clone();
    for item in parse_group_by(group_by)? {
        let text = clause_text(&item);
        let term = clause_term(&table, item).ok_or(QueryError::InvalidGroupBy(text))?;
        query.group_by(term);
    }
    Ok(())
}
