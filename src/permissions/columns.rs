use std::collections::HashMap;

use crate::catalog::PermissionProvider;
use crate::dynamic_field::DynamicField;
use crate::errors::QueryError;
use crate::field_parser::ParsedField;
use crate::query_ast::{Field, TableRef};

use super::{get_permission_type, PermissionContext};

/// Permitted column names per entity, fetched once per build
struct PermittedFields<'a> {
    permissions: &'a dyn PermissionProvider,
    user: &'a str,
    by_entity: HashMap<String, Vec<String>>,
}

impl<'a> PermittedFields<'a> {
    fn new(permissions: &'a dyn PermissionProvider, user: &'a str) -> Self {
        PermittedFields {
            permissions,
            user,
            by_entity: HashMap::new(),
        }
    }

    fn get(&mut self, entity: &str, parent: Option<&str>) -> Result<&[String], QueryError> {
        if !self.by_entity.contains_key(entity) {
            let ptype = get_permission_type(self.permissions, entity, self.user)?;
            let fields = self
                .permissions
                .get_permitted_fields(entity, self.user, parent, ptype, true)?;
            self.by_entity.insert(entity.to_string(), fields);
        }
        Ok(self
            .by_entity
            .get(entity)
            .map(Vec::as_slice)
            .unwrap_or_default())
    }

    fn allows(&mut self, entity: &str, parent: Option<&str>, column: &str) -> Result<bool, QueryError> {
        Ok(self.get(entity, parent)?.iter().any(|f| f == column))
    }

    /// Own-table columns are checked against the queried entity, columns of
    /// any other table against that table's entity read through the owner
    fn allows_field(
        &mut self,
        field: &Field,
        table: &TableRef,
        ctx: &PermissionContext,
    ) -> Result<bool, QueryError> {
        if &field.table == table {
            self.allows(table.entity(), ctx.parent_entity.as_deref(), &field.name)
        } else {
            self.allows(field.table.entity(), Some(table.entity()), &field.name)
        }
    }
}

/// Keep only the fields the user may read. `*` expands to the permitted
/// columns; child queries are narrowed and dropped when nothing survives.
pub fn apply_field_permissions(
    fields: Vec<ParsedField>,
    permissions: &dyn PermissionProvider,
    table: &TableRef,
    ctx: &PermissionContext,
) -> Result<Vec<ParsedField>, QueryError> {
    let entity = table.entity();
    let mut permitted = PermittedFields::new(permissions, &ctx.user);
    let own: Vec<String> = permitted
        .get(entity, ctx.parent_entity.as_deref())?
        .to_vec();

    let mut allowed = Vec::with_capacity(fields.len());
    for field in fields {
        let keep = match &field {
            ParsedField::Star(star_table) => {
                allowed.extend(
                    own.iter()
                        .map(|name| ParsedField::Plain(star_table.field(name.as_str()))),
                );
                continue;
            }
            ParsedField::Plain(plain) => permitted.allows_field(plain, table, ctx)?,
            ParsedField::Function(call) => {
                let mut all_permitted = true;
                for referenced in call.referenced_fields() {
                    if !permitted.allows_field(referenced, table, ctx)? {
                        all_permitted = false;
                        break;
                    }
                }
                all_permitted
            }
            ParsedField::Dynamic(DynamicField::Linked(linked)) => {
                own.contains(&linked.link_fieldname)
            }
            ParsedField::Dynamic(DynamicField::Child(child)) => {
                permitted.allows(&child.entity, Some(&child.parent_entity), &child.fieldname)?
            }
            ParsedField::ChildQuery(child) => {
                let child_permitted = permitted.get(&child.entity, Some(&child.parent_entity))?;
                let mut narrowed = child.clone();
                narrowed.fields = expand_star(&child.fields, child_permitted)
                    .into_iter()
                    .filter(|f| child_permitted.contains(f))
                    .collect();
                if narrowed.fields.is_empty() {
                    log::warn!(
                        "no readable fields left in {}, child query dropped",
                        child.fieldname
                    );
                } else {
                    allowed.push(ParsedField::ChildQuery(narrowed));
                }
                continue;
            }
            ParsedField::Position(_) | ParsedField::Term(_) => true,
        };

        if keep {
            allowed.push(field);
        } else {
            log::warn!("dropping unpermitted field {field:?} of {entity}");
        }
    }
    Ok(allowed)
}

fn expand_star(fields: &[String], permitted: &[String]) -> Vec<String> {
    let mut expanded = Vec::with_capacity(fields.len());
    for field in fields {
        if field == "*" {
            expanded.extend(permitted.iter().cloned());
        } else {
            expanded.push(field.clone());
        }
    }
    expanded
}
