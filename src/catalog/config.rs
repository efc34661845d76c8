/// Catalog fixture definitions.
///
/// The in-memory catalog is described in YAML with the following structure:
///
/// ```yaml
/// entities:
///   Task:
///     fields:
///       - { fieldname: subject, fieldtype: Data }
///       - { fieldname: assigned_to, fieldtype: Link, options: User }
///       - { fieldname: items, fieldtype: Table, options: Task Item }
///   Task Item:
///     is_child: true
///     fields:
///       - { fieldname: description, fieldtype: Data }
///   Category:
///     nodes:
///       - { name: All Categories, lft: 1, rgt: 8 }
/// users:
///   jane@example.com:
///     access:
///       Task:
///         capabilities: [select, read]
///         if_owner: []
///         permitted_fields: [name, subject, assigned_to]
///     user_permissions:
///       User: [{ doc: jane@example.com }]
///     shared:
///       Task: [TASK-0001]
/// permission_query_conditions:
///   Task: ["`tabTask`.`owner` = {user}"]
/// ```
///
/// `{user}` in a condition template is replaced by the acting user as a
/// quoted SQL string literal.
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::errors::CatalogError;
use super::{FieldMeta, PermissionType, UserPermissions};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogDefinition {
    pub entities: HashMap<String, EntityDefinition>,
    pub users: HashMap<String, UserDefinition>,
    /// entity (or `*`) -> raw predicate templates
    pub permission_query_conditions: HashMap<String, Vec<String>>,
    /// entity -> scripted predicate template
    pub permission_query_scripts: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityDefinition {
    pub is_child: bool,
    pub fields: Vec<FieldMeta>,
    pub nodes: Vec<NestedSetNode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NestedSetNode {
    pub name: String,
    pub lft: i64,
    pub rgt: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UserDefinition {
    pub access: HashMap<String, EntityAccess>,
    pub user_permissions: UserPermissions,
    /// entity -> record names shared with the user
    pub shared: HashMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityAccess {
    pub capabilities: HashSet<PermissionType>,
    pub if_owner: HashSet<PermissionType>,
    /// Readable columns. `None` means every column of the entity.
    pub permitted_fields: Option<Vec<String>>,
    /// Columns visible with select-only access. Falls back to `permitted_fields`.
    pub select_fields: Option<Vec<String>>,
}

impl EntityAccess {
    pub fn with_capabilities(capabilities: &[PermissionType]) -> Self {
        EntityAccess {
            capabilities: capabilities.iter().copied().collect(),
            ..Default::default()
        }
    }

    pub fn owner_only(capabilities: &[PermissionType]) -> Self {
        EntityAccess {
            if_owner: capabilities.iter().copied().collect(),
            ..Default::default()
        }
    }

    pub fn with_permitted_fields(mut self, fields: &[&str]) -> Self {
        self.permitted_fields = Some(fields.iter().map(|f| f.to_string()).collect());
        self
    }

    /// Capabilities held either outright or on owned records
    pub fn allows(&self, ptype: PermissionType) -> bool {
        self.capabilities.contains(&ptype) || self.if_owner.contains(&ptype)
    }
}

impl CatalogDefinition {
    pub fn from_yaml_str(content: &str) -> Result<Self, CatalogError> {
        let definition: CatalogDefinition =
            serde_yaml::from_str(content).map_err(|e| CatalogError::ConfigParseError {
                error: e.to_string(),
            })?;
        definition.validate()?;
        Ok(definition)
    }

    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
        let content = fs::read_to_string(path).map_err(|e| CatalogError::ConfigReadError {
            error: e.to_string(),
        })?;
        Self::from_yaml_str(&content)
    }

    /// Structural checks: links name a target, child tables exist and
    /// nested-set bounds are ordered.
    pub fn validate(&self) -> Result<(), CatalogError> {
        for (entity, definition) in &self.entities {
            for field in &definition.fields {
                if field.fieldtype == super::FieldType::Link
                    || field.fieldtype.is_child_collection()
                {
                    let Some(target) = field.options.as_deref() else {
                        return Err(CatalogError::ConfigParseError {
                            error: format!(
                                "field '{}' of '{}' has no target entity",
                                field.fieldname, entity
                            ),
                        });
                    };
                    if field.fieldtype.is_child_collection() && !self.entities.contains_key(target)
                    {
                        return Err(CatalogError::ConfigParseError {
                            error: format!(
                                "field '{}' of '{}' references unknown child entity '{}'",
                                field.fieldname, entity, target
                            ),
                        });
                    }
                }
            }
            for node in &definition.nodes {
                if node.lft >= node.rgt {
                    return Err(CatalogError::ConfigParseError {
                        error: format!(
                            "node '{}' of '{}' has lft {} >= rgt {}",
                            node.name, entity, node.lft, node.rgt
                        ),
                    });
                }
            }
        }
        Ok(())
    }
}
