//! Cross-table field references.
//!
//! A dotted field either names a column of a linked record
//! (`assigned_to.email`, joined through the link column) or a column of a
//! child-collection row (`` `tabTask Item`.`qty` `` or `items.qty`, joined
//! through `parent`/`parenttype`). Resolution yields the join and the
//! column reference; joins are added at most once per target table.

use lazy_static::lazy_static;
use regex::Regex;

use crate::catalog::{FieldType, MetadataProvider};
use crate::errors::QueryError;
use crate::expression_validator::split_alias;
use crate::query_ast::{Criterion, Field, QueryBuilder, TableRef};

lazy_static! {
    static ref QUOTED_CHILD_FIELD: Regex = Regex::new(
        r#"^(?:`tab([A-Za-z0-9_ -]+)`\.`([A-Za-z0-9_]+)`|"tab([A-Za-z0-9_ -]+)"\."([A-Za-z0-9_]+)")$"#
    )
    .unwrap();
    static ref BARE_DOTTED_FIELD: Regex =
        Regex::new(r"^([A-Za-z0-9_]+)\.([A-Za-z0-9_]+)$").unwrap();
}

/// Column of the record referenced by a Link field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedField {
    /// Linked entity
    pub entity: String,
    pub fieldname: String,
    pub parent_entity: String,
    /// Link column on the parent entity
    pub link_fieldname: String,
    pub alias: Option<String>,
}

/// Column of a child-collection row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildField {
    /// Child entity
    pub entity: String,
    pub fieldname: String,
    pub parent_entity: String,
    /// Collection field on the parent, when the reference named one
    pub parent_fieldname: Option<String>,
    pub alias: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DynamicField {
    Linked(LinkedField),
    Child(ChildField),
}

impl DynamicField {
    /// Resolve a dotted reference against `owner`. `Ok(None)` means the field
    /// is not a cross-table reference and should be parsed as a plain column.
    pub fn parse(
        field: &str,
        owner: &str,
        metadata: &dyn MetadataProvider,
    ) -> Result<Option<DynamicField>, QueryError> {
        if !field.contains('.') {
            return Ok(None);
        }
        let (expr, alias) = split_alias(field);

        if expr.starts_with("`tab") || expr.starts_with("\"tab") {
            let Some(caps) = QUOTED_CHILD_FIELD.captures(expr) else {
                return Ok(None);
            };
            let entity = caps.get(1).or_else(|| caps.get(3)).map(|m| m.as_str());
            let fieldname = caps.get(2).or_else(|| caps.get(4)).map(|m| m.as_str());
            let (Some(entity), Some(fieldname)) = (entity, fieldname) else {
                return Ok(None);
            };
            if entity == owner {
                return Ok(None);
            }
            return Ok(Some(DynamicField::Child(ChildField {
                entity: entity.to_string(),
                fieldname: fieldname.to_string(),
                parent_entity: owner.to_string(),
                parent_fieldname: None,
                alias,
            })));
        }

        let Some(caps) = BARE_DOTTED_FIELD.captures(expr) else {
            return Ok(None);
        };
        let (link_fieldname, fieldname) = (&caps[1], &caps[2]);
        let Some(link_field) = metadata.get_field(owner, link_fieldname)? else {
            return Ok(None);
        };
        let Some(target) = link_field.options.clone() else {
            return Ok(None);
        };

        if link_field.fieldtype == FieldType::Link {
            Ok(Some(DynamicField::Linked(LinkedField {
                entity: target,
                fieldname: fieldname.to_string(),
                parent_entity: owner.to_string(),
                link_fieldname: link_fieldname.to_string(),
                alias,
            })))
        } else if metadata.is_child_collection_type(&link_field.fieldtype) {
            Ok(Some(DynamicField::Child(ChildField {
                entity: target,
                fieldname: fieldname.to_string(),
                parent_entity: owner.to_string(),
                parent_fieldname: Some(link_fieldname.to_string()),
                alias,
            })))
        } else {
            Ok(None)
        }
    }

    pub fn entity(&self) -> &str {
        match self {
            DynamicField::Linked(f) => &f.entity,
            DynamicField::Child(f) => &f.entity,
        }
    }

    pub fn table(&self) -> TableRef {
        TableRef::for_entity(self.entity())
    }

    /// Resolved column, without alias
    pub fn field(&self) -> Field {
        let fieldname = match self {
            DynamicField::Linked(f) => &f.fieldname,
            DynamicField::Child(f) => &f.fieldname,
        };
        self.table().field(fieldname.as_str())
    }

    pub fn alias(&self) -> Option<&str> {
        match self {
            DynamicField::Linked(f) => f.alias.as_deref(),
            DynamicField::Child(f) => f.alias.as_deref(),
        }
    }

    pub fn join_criterion(&self) -> Criterion {
        let table = self.table();
        match self {
            DynamicField::Linked(f) => {
                let parent = TableRef::for_entity(&f.parent_entity);
                table
                    .field("name")
                    .eq(parent.field(f.link_fieldname.as_str()))
            }
            DynamicField::Child(f) => child_join_criterion(
                &table,
                &f.parent_entity,
                f.parent_fieldname.as_deref(),
            ),
        }
    }

    /// Add the join unless the target table is already joined
    pub fn apply_join(&self, query: &mut QueryBuilder) {
        let table = self.table();
        if !query.is_joined(&table) {
            log::debug!("joining {} for {}", table.table_name(), self.field().name);
            query.left_join(table, self.join_criterion());
        }
    }

    pub fn apply_select(&self, query: &mut QueryBuilder) {
        self.apply_join(query);
        let field = self.field().with_alias(self.alias().map(str::to_string));
        query.select(field);
    }
}

/// `child.parent = owner.name AND child.parenttype = '<owner>'`, narrowed to
/// one collection field when given
pub fn child_join_criterion(
    child: &TableRef,
    parent_entity: &str,
    parent_fieldname: Option<&str>,
) -> Criterion {
    let parent = TableRef::for_entity(parent_entity);
    let mut on = child
        .field("parent")
        .eq(parent.field("name"))
        .and(child.field("parenttype").eq(parent_entity));
    if let Some(parent_fieldname) = parent_fieldname {
        on = on.and(child.field("parentfield").eq(parent_fieldname));
    }
    on
}
