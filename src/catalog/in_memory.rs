//! In-memory implementation of every collaborator contract.
//!
//! Backs the developer CLI (loaded from a YAML fixture) and the test suite
//! (assembled programmatically with the builder methods below).

use std::collections::HashMap;
use std::sync::Arc;

use super::config::{CatalogDefinition, EntityAccess, EntityDefinition, NestedSetNode};
use super::errors::CatalogError;
use super::{
    ConditionHook, FieldMeta, MetadataProvider, NestedSetBounds, NestedSetRange, NestedSetStore,
    PermissionHooks, PermissionProvider, PermissionType, RolePermissions, ScriptCondition,
    ShareRegistry, UserPermission, UserPermissionProvider, UserPermissions,
};

/// Columns every entity carries regardless of its declared fields
pub const STANDARD_FIELDS: &[&str] = &[
    "name",
    "owner",
    "creation",
    "modified",
    "modified_by",
    "docstatus",
    "idx",
];

/// Extra columns carried by child-collection entities
pub const CHILD_STANDARD_FIELDS: &[&str] = &["parent", "parentfield", "parenttype"];

/// Key under which hooks apply to every entity
pub const WILDCARD_ENTITY: &str = "*";

#[derive(Clone, Default)]
pub struct InMemoryCatalog {
    definition: CatalogDefinition,
    hooks: HashMap<String, Vec<ConditionHook>>,
    scripts: HashMap<String, ScriptCondition>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a parsed fixture. Condition templates become hooks.
    pub fn from_definition(definition: CatalogDefinition) -> Self {
        let mut catalog = InMemoryCatalog {
            definition: CatalogDefinition {
                permission_query_conditions: HashMap::new(),
                permission_query_scripts: HashMap::new(),
                ..definition.clone()
            },
            ..Default::default()
        };

        for (entity, templates) in definition.permission_query_conditions {
            for template in templates {
                let hook: ConditionHook =
                    Arc::new(move |user, _entity| Some(render_template(&template, user)));
                catalog.hooks.entry(entity.clone()).or_default().push(hook);
            }
        }
        for (entity, template) in definition.permission_query_scripts {
            let script: ScriptCondition = Arc::new(move |user| Some(render_template(&template, user)));
            catalog.scripts.insert(entity, script);
        }
        catalog
    }

    pub fn with_entity(mut self, name: impl Into<String>, definition: EntityDefinition) -> Self {
        self.definition.entities.insert(name.into(), definition);
        self
    }

    pub fn with_fields(self, name: impl Into<String>, fields: Vec<FieldMeta>) -> Self {
        self.with_entity(
            name,
            EntityDefinition {
                fields,
                ..Default::default()
            },
        )
    }

    pub fn with_child_entity(self, name: impl Into<String>, fields: Vec<FieldMeta>) -> Self {
        self.with_entity(
            name,
            EntityDefinition {
                is_child: true,
                fields,
                ..Default::default()
            },
        )
    }

    /// Attach nested-set nodes, keeping any fields already declared
    pub fn with_tree(mut self, name: impl Into<String>, nodes: &[(&str, i64, i64)]) -> Self {
        self.definition.entities.entry(name.into()).or_default().nodes = nodes
            .iter()
            .map(|(node, lft, rgt)| NestedSetNode {
                name: node.to_string(),
                lft: *lft,
                rgt: *rgt,
            })
            .collect();
        self
    }

    pub fn grant(mut self, user: &str, entity: &str, access: EntityAccess) -> Self {
        self.definition
            .users
            .entry(user.to_string())
            .or_default()
            .access
            .insert(entity.to_string(), access);
        self
    }

    pub fn with_user_permission(mut self, user: &str, entity: &str, permission: UserPermission) -> Self {
        self.definition
            .users
            .entry(user.to_string())
            .or_default()
            .user_permissions
            .entry(entity.to_string())
            .or_default()
            .push(permission);
        self
    }

    pub fn share(mut self, entity: &str, user: &str, name: &str) -> Self {
        self.definition
            .users
            .entry(user.to_string())
            .or_default()
            .shared
            .entry(entity.to_string())
            .or_default()
            .push(name.to_string());
        self
    }

    pub fn add_condition_hook(mut self, entity: &str, hook: ConditionHook) -> Self {
        self.hooks.entry(entity.to_string()).or_default().push(hook);
        self
    }

    pub fn set_permission_script(mut self, entity: &str, script: ScriptCondition) -> Self {
        self.scripts.insert(entity.to_string(), script);
        self
    }

    fn entity(&self, entity: &str) -> Result<&EntityDefinition, CatalogError> {
        self.definition
            .entities
            .get(entity)
            .ok_or_else(|| CatalogError::UnknownEntity {
                entity: entity.to_string(),
            })
    }

    fn access(&self, entity: &str, user: &str) -> Option<&EntityAccess> {
        self.definition.users.get(user)?.access.get(entity)
    }

    /// Standard columns followed by declared, non-collection columns
    fn all_columns(&self, entity: &str, ignore_virtual: bool) -> Result<Vec<String>, CatalogError> {
        let definition = self.entity(entity)?;
        let mut columns: Vec<String> = STANDARD_FIELDS.iter().map(|f| f.to_string()).collect();
        if definition.is_child {
            columns.extend(CHILD_STANDARD_FIELDS.iter().map(|f| f.to_string()));
        }
        columns.extend(
            definition
                .fields
                .iter()
                .filter(|f| !f.fieldtype.is_child_collection())
                .filter(|f| !(ignore_virtual && f.is_virtual))
                .map(|f| f.fieldname.clone()),
        );
        Ok(columns)
    }
}

fn render_template(template: &str, user: &str) -> String {
    template.replace("{user}", &format!("'{}'", user.replace('\'', "''")))
}

impl MetadataProvider for InMemoryCatalog {
    fn get_field(&self, entity: &str, fieldname: &str) -> Result<Option<FieldMeta>, CatalogError> {
        Ok(self
            .entity(entity)?
            .fields
            .iter()
            .find(|f| f.fieldname == fieldname)
            .cloned())
    }

    fn get_link_fields(&self, entity: &str) -> Result<Vec<FieldMeta>, CatalogError> {
        Ok(self
            .entity(entity)?
            .fields
            .iter()
            .filter(|f| f.fieldtype == super::FieldType::Link)
            .cloned()
            .collect())
    }

    fn is_child_entity(&self, entity: &str) -> Result<bool, CatalogError> {
        Ok(self.entity(entity)?.is_child)
    }
}

impl PermissionProvider for InMemoryCatalog {
    fn has_permission(
        &self,
        entity: &str,
        ptype: PermissionType,
        user: &str,
        parent_entity: Option<&str>,
    ) -> Result<bool, CatalogError> {
        if let Some(access) = self.access(entity, user) {
            return Ok(access.allows(ptype));
        }
        // Child rows are readable through their parent
        match parent_entity {
            Some(parent) if self.entity(entity)?.is_child => {
                Ok(self.access(parent, user).is_some_and(|a| a.allows(ptype)))
            }
            _ => Ok(false),
        }
    }

    fn get_role_permissions(&self, entity: &str, user: &str) -> Result<RolePermissions, CatalogError> {
        let Some(access) = self.access(entity, user) else {
            return Ok(RolePermissions::default());
        };
        Ok(RolePermissions {
            read: access.allows(PermissionType::Read),
            select: access.allows(PermissionType::Select),
            has_if_owner_enabled: !access.if_owner.is_empty(),
            if_owner: access.if_owner.clone(),
        })
    }

    fn get_permitted_fields(
        &self,
        entity: &str,
        user: &str,
        _parent_entity: Option<&str>,
        permission_type: PermissionType,
        ignore_virtual: bool,
    ) -> Result<Vec<String>, CatalogError> {
        let columns = self.all_columns(entity, ignore_virtual)?;
        // without a column restriction of its own every column is readable
        let Some(access) = self.access(entity, user) else {
            return Ok(columns);
        };

        let declared = match permission_type {
            PermissionType::Select => access.select_fields.as_ref().or(access.permitted_fields.as_ref()),
            _ => access.permitted_fields.as_ref(),
        };
        Ok(match declared {
            Some(fields) => columns.into_iter().filter(|c| fields.contains(c)).collect(),
            None => columns,
        })
    }

    fn only_has_select_permission(&self, entity: &str, user: &str) -> Result<bool, CatalogError> {
        Ok(self.access(entity, user).is_some_and(|a| {
            a.allows(PermissionType::Select) && !a.allows(PermissionType::Read)
        }))
    }
}

impl UserPermissionProvider for InMemoryCatalog {
    fn get_user_permissions(&self, user: &str) -> Result<UserPermissions, CatalogError> {
        Ok(self
            .definition
            .users
            .get(user)
            .map(|u| u.user_permissions.clone())
            .unwrap_or_default())
    }
}

impl ShareRegistry for InMemoryCatalog {
    fn get_shared(&self, entity: &str, user: &str) -> Result<Vec<String>, CatalogError> {
        Ok(self
            .definition
            .users
            .get(user)
            .and_then(|u| u.shared.get(entity))
            .cloned()
            .unwrap_or_default())
    }
}

impl PermissionHooks for InMemoryCatalog {
    fn get_permission_query_conditions_hooks(&self, entity: &str) -> Vec<ConditionHook> {
        let mut hooks = self.hooks.get(entity).cloned().unwrap_or_default();
        if entity != WILDCARD_ENTITY {
            hooks.extend(self.hooks.get(WILDCARD_ENTITY).cloned().unwrap_or_default());
        }
        hooks
    }

    fn get_permission_query_script(&self, entity: &str) -> Option<ScriptCondition> {
        self.scripts.get(entity).cloned()
    }
}

impl NestedSetStore for InMemoryCatalog {
    fn bounds(&self, entity: &str, name: &str) -> Result<Option<NestedSetBounds>, CatalogError> {
        let Some(node) = self.entity(entity)?.nodes.iter().find(|n| n.name == name) else {
            return Ok(None);
        };
        if node.lft >= node.rgt {
            return Err(CatalogError::backend_with_context(
                format!("corrupt nested set bounds ({}, {})", node.lft, node.rgt),
                format!("node '{}' of '{}'", name, entity),
            ));
        }
        Ok(Some(NestedSetBounds {
            lft: node.lft,
            rgt: node.rgt,
        }))
    }

    fn names_in_range(&self, entity: &str, range: NestedSetRange) -> Result<Vec<String>, CatalogError> {
        let nodes = &self.entity(entity)?.nodes;
        let mut matched: Vec<&NestedSetNode> = match range {
            NestedSetRange::Inside(bounds) => nodes
                .iter()
                .filter(|n| n.lft > bounds.lft && n.rgt < bounds.rgt)
                .collect(),
            NestedSetRange::Enclosing(bounds) => nodes
                .iter()
                .filter(|n| n.lft < bounds.lft && n.rgt > bounds.rgt)
                .collect(),
        };
        match range {
            NestedSetRange::Inside(_) => matched.sort_by_key(|n| n.lft),
            NestedSetRange::Enclosing(_) => matched.sort_by_key(|n| std::cmp::Reverse(n.lft)),
        }
        Ok(matched.into_iter().map(|n| n.name.clone()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::FieldType;

    fn catalog() -> InMemoryCatalog {
        InMemoryCatalog::new()
            .with_fields(
                "Task",
                vec![
                    FieldMeta::new("subject", FieldType::Data),
                    FieldMeta::link("assigned_to", "User"),
                    FieldMeta::table("items", "Task Item"),
                ],
            )
            .with_child_entity("Task Item", vec![FieldMeta::new("description", FieldType::Data)])
            .with_tree(
                "Category",
                &[("Root", 1, 10), ("X", 2, 7), ("Y", 3, 4), ("Z", 5, 6), ("W", 8, 9)],
            )
            .grant(
                "jane@example.com",
                "Task",
                EntityAccess::with_capabilities(&[PermissionType::Read, PermissionType::Select])
                    .with_permitted_fields(&["name", "subject"]),
            )
            .grant(
                "sel@example.com",
                "Task",
                EntityAccess::with_capabilities(&[PermissionType::Select]),
            )
    }

    #[test]
    fn test_metadata_lookups() {
        let catalog = catalog();
        assert_eq!(
            catalog.get_field("Task", "assigned_to").unwrap().unwrap().options.as_deref(),
            Some("User")
        );
        assert!(catalog.get_field("Task", "name").unwrap().is_none());
        assert_eq!(catalog.get_link_fields("Task").unwrap().len(), 1);
        assert!(catalog.is_child_entity("Task Item").unwrap());
        assert!(matches!(
            catalog.get_field("Nope", "x"),
            Err(CatalogError::UnknownEntity { .. })
        ));
    }

    #[test]
    fn test_permitted_fields() {
        let catalog = catalog();
        assert_eq!(
            catalog
                .get_permitted_fields("Task", "jane@example.com", None, PermissionType::Read, true)
                .unwrap(),
            vec!["name".to_string(), "subject".to_string()]
        );
        let all = catalog
            .get_permitted_fields("Task", "sel@example.com", None, PermissionType::Select, true)
            .unwrap();
        assert!(all.contains(&"assigned_to".to_string()));
        assert!(!all.contains(&"items".to_string()));

        let child = catalog
            .get_permitted_fields("Task Item", "jane@example.com", Some("Task"), PermissionType::Read, true)
            .unwrap();
        assert!(child.contains(&"parenttype".to_string()));
    }

    #[test]
    fn test_child_permission_through_parent() {
        let catalog = catalog();
        assert!(catalog
            .has_permission("Task Item", PermissionType::Read, "jane@example.com", Some("Task"))
            .unwrap());
        assert!(!catalog
            .has_permission("Task Item", PermissionType::Read, "jane@example.com", None)
            .unwrap());
    }

    #[test]
    fn test_only_select() {
        let catalog = catalog();
        assert!(catalog.only_has_select_permission("Task", "sel@example.com").unwrap());
        assert!(!catalog.only_has_select_permission("Task", "jane@example.com").unwrap());
    }

    #[test]
    fn test_hierarchy_ranges() {
        let catalog = catalog();
        let x = catalog.bounds("Category", "X").unwrap().unwrap();
        assert_eq!(
            catalog.names_in_range("Category", NestedSetRange::Inside(x)).unwrap(),
            vec!["Y".to_string(), "Z".to_string()]
        );
        let y = catalog.bounds("Category", "Y").unwrap().unwrap();
        assert_eq!(
            catalog.names_in_range("Category", NestedSetRange::Enclosing(y)).unwrap(),
            vec!["X".to_string(), "Root".to_string()]
        );
        assert!(catalog.bounds("Category", "Missing").unwrap().is_none());
    }

    #[test]
    fn test_templates_quote_user() {
        let definition = CatalogDefinition {
            permission_query_conditions: HashMap::from([(
                "*".to_string(),
                vec!["`owner` = {user}".to_string()],
            )]),
            ..Default::default()
        };
        let catalog = InMemoryCatalog::from_definition(definition);
        let hooks = catalog.get_permission_query_conditions_hooks("Task");
        assert_eq!(hooks.len(), 1);
        assert_eq!(hooks[0]("o'brien", "Task").unwrap(), "`owner` = 'o''brien'");
    }
}
