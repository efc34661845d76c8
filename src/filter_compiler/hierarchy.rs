//! Nested-set (`lft`/`rgt`) ancestor and descendant resolution.

use crate::catalog::{NestedSetRange, NestedSetStore};
use crate::errors::QueryError;
use crate::query_ast::{BinaryOp, Criterion, Dialect, Literal, Order, Query, QueryBuilder, TableRef};

use super::operators::HierarchyOp;

/// Names related to `name` in the tree stored for `entity`: descendants in
/// `lft` order or ancestors nearest first. The inclusive variant appends
/// `name` itself. A missing node yields no names.
pub fn get_nested_set_hierarchy_result(
    store: &dyn NestedSetStore,
    entity: &str,
    name: &str,
    op: HierarchyOp,
) -> Result<Vec<String>, QueryError> {
    let Some(bounds) = store.bounds(entity, name)? else {
        log::debug!("no nested set node {name} in {entity}");
        return Ok(Vec::new());
    };

    let range = if op.is_descendants() {
        NestedSetRange::Inside(bounds)
    } else {
        NestedSetRange::Enclosing(bounds)
    };
    let mut names = store.names_in_range(entity, range)?;
    if op == HierarchyOp::DescendantsOfInclusive {
        names.push(name.to_string());
    }
    Ok(names)
}

/// `SELECT lft, rgt FROM tab<entity> WHERE name = <name>`
pub fn bounds_query(entity: &str, name: &str, dialect: Dialect) -> Query {
    let table = TableRef::for_entity(entity);
    let mut query = QueryBuilder::from_(table.clone(), dialect);
    query
        .select(table.field("lft"))
        .select(table.field("rgt"))
        .and_where(table.field("name").eq(name));
    query.finish()
}

/// Query listing the names in `range`, for stores backed by SQL
pub fn lookup_query(entity: &str, range: NestedSetRange, dialect: Dialect) -> Query {
    let table = TableRef::for_entity(entity);
    let mut query = QueryBuilder::from_(table.clone(), dialect);
    query.select(table.field("name"));

    let (lft_op, rgt_op, bounds, order) = match range {
        NestedSetRange::Inside(b) => (BinaryOp::Gt, BinaryOp::Lt, b, Order::Asc),
        NestedSetRange::Enclosing(b) => (BinaryOp::Lt, BinaryOp::Gt, b, Order::Desc),
    };
    query
        .and_where(Criterion::Compare {
            left: table.field("lft").into(),
            op: lft_op,
            right: Literal::Int(bounds.lft).into(),
        })
        .and_where(Criterion::Compare {
            left: table.field("rgt").into(),
            op: rgt_op,
            right: Literal::Int(bounds.rgt).into(),
        })
        .order_by(table.field("lft"), order);
    query.finish()
}
