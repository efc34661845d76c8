use serde_json::json;

use super::{FieldSpec, Fields};
use crate::catalog::MetadataProvider;
use crate::engine::{Engine, QueryRequest};
use crate::errors::QueryError;
use crate::filter_compiler::Filters;
use crate::permissions::PermissionContext;
use crate::query_ast::Query;

/// Columns fetched from the rows of one child collection, resolved once the
/// parent rows are known.
#[derive(Debug, Clone, PartialEq)]
pub struct ChildQuery {
    /// Collection field on the parent entity
    pub fieldname: String,
    pub fields: Vec<String>,
    pub parent_entity: String,
    /// Child entity
    pub entity: String,
}

impl ChildQuery {
    /// `Ok(None)` when `fieldname` is not a child collection of `parent_entity`
    pub fn new(
        fieldname: &str,
        fields: Vec<String>,
        parent_entity: &str,
        metadata: &dyn MetadataProvider,
    ) -> Result<Option<Self>, QueryError> {
        let Some(field) = metadata.get_field(parent_entity, fieldname)? else {
            log::warn!("{parent_entity}.{fieldname} does not exist, child query dropped");
            return Ok(None);
        };
        if !metadata.is_child_collection_type(&field.fieldtype) {
            log::warn!(
                "{parent_entity}.{fieldname} is a {} field, child query dropped",
                field.fieldtype
            );
            return Ok(None);
        }
        let Some(entity) = field.options else {
            return Ok(None);
        };
        Ok(Some(ChildQuery {
            fieldname: fieldname.to_string(),
            fields,
            parent_entity: parent_entity.to_string(),
            entity,
        }))
    }

    /// Query for the child rows of `parent_names`, in row order. Runs
    /// without permission checks: the field list was already narrowed when
    /// the parent query was built.
    pub fn get_query(
        &self,
        engine: &Engine,
        parent_names: &[String],
        ctx: &PermissionContext,
    ) -> Result<Query, QueryError> {
        let mut fields: Vec<FieldSpec> = self
            .fields
            .iter()
            .map(|f| FieldSpec::Text(f.clone()))
            .collect();
        fields.push(FieldSpec::from("parent"));
        fields.push(FieldSpec::from("parentfield"));

        let filters = Filters::Json(json!({
            "parenttype": self.parent_entity,
            "parentfield": self.fieldname,
            "parent": ["in", parent_names],
        }));

        let request = QueryRequest::new(&self.entity)
            .fields(Fields::List(fields))
            .filters(filters)
            .order_by("idx asc");
        let ctx = PermissionContext {
            apply_permissions: false,
            ..ctx.clone()
        }
        .with_parent_entity(&self.parent_entity);
        engine.get_query(&request, &ctx)
    }
}
