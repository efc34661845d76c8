//! Collaborator contracts consumed by the query builder.
//!
//! The builder never owns schema, permission or sharing state. It asks these
//! services and treats every answer as a pure, read-only lookup. Each
//! contract is a narrow trait so a storage-backed implementation and the
//! in-memory one used by the CLI and the tests are interchangeable.

pub mod config;
pub mod errors;
pub mod in_memory;

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub use errors::CatalogError;
pub use in_memory::InMemoryCatalog;

/// Field types the builder distinguishes. Anything else is carried verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FieldType {
    /// Single-record reference to another entity
    Link,
    /// One-to-many child collection
    Table,
    /// Child collection rendered as a multi-select
    TableMultiSelect,
    Data,
    Int,
    Check,
    Date,
    Datetime,
    Select,
    Text,
    Other(String),
}

impl FieldType {
    pub fn is_child_collection(&self) -> bool {
        matches!(self, FieldType::Table | FieldType::TableMultiSelect)
    }
}

impl From<String> for FieldType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Link" => FieldType::Link,
            "Table" => FieldType::Table,
            "Table MultiSelect" => FieldType::TableMultiSelect,
            "Data" => FieldType::Data,
            "Int" => FieldType::Int,
            "Check" => FieldType::Check,
            "Date" => FieldType::Date,
            "Datetime" => FieldType::Datetime,
            "Select" => FieldType::Select,
            "Text" => FieldType::Text,
            _ => FieldType::Other(value),
        }
    }
}

impl From<FieldType> for String {
    fn from(value: FieldType) -> Self {
        value.to_string()
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldType::Link => "Link",
            FieldType::Table => "Table",
            FieldType::TableMultiSelect => "Table MultiSelect",
            FieldType::Data => "Data",
            FieldType::Int => "Int",
            FieldType::Check => "Check",
            FieldType::Date => "Date",
            FieldType::Datetime => "Datetime",
            FieldType::Select => "Select",
            FieldType::Text => "Text",
            FieldType::Other(other) => other,
        };
        f.write_str(name)
    }
}

/// Metadata for one field of an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMeta {
    pub fieldname: String,
    pub fieldtype: FieldType,
    /// Target entity for Link and Table fields
    #[serde(default)]
    pub options: Option<String>,
    #[serde(default)]
    pub ignore_user_permissions: bool,
    /// Computed fields with no backing column
    #[serde(default)]
    pub is_virtual: bool,
}

impl FieldMeta {
    pub fn new(fieldname: impl Into<String>, fieldtype: FieldType) -> Self {
        FieldMeta {
            fieldname: fieldname.into(),
            fieldtype,
            options: None,
            ignore_user_permissions: false,
            is_virtual: false,
        }
    }

    pub fn link(fieldname: impl Into<String>, target: impl Into<String>) -> Self {
        FieldMeta {
            options: Some(target.into()),
            ..FieldMeta::new(fieldname, FieldType::Link)
        }
    }

    pub fn table(fieldname: impl Into<String>, child_entity: impl Into<String>) -> Self {
        FieldMeta {
            options: Some(child_entity.into()),
            ..FieldMeta::new(fieldname, FieldType::Table)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionType {
    Select,
    Read,
    Write,
    Create,
    Delete,
}

impl fmt::Display for PermissionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PermissionType::Select => "select",
            PermissionType::Read => "read",
            PermissionType::Write => "write",
            PermissionType::Create => "create",
            PermissionType::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// Role-derived capabilities of one user on one entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RolePermissions {
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub select: bool,
    #[serde(default)]
    pub has_if_owner_enabled: bool,
    /// Capabilities granted only on records the user owns
    #[serde(default)]
    pub if_owner: HashSet<PermissionType>,
}

impl RolePermissions {
    pub fn grants(&self, ptype: PermissionType) -> bool {
        match ptype {
            PermissionType::Read => self.read,
            PermissionType::Select => self.select,
            _ => false,
        }
    }
}

/// A record a user is restricted to, optionally scoped to the entity
/// through which it applies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPermission {
    pub doc: String,
    #[serde(default)]
    pub applicable_for: Option<String>,
}

/// entity -> permitted records
pub type UserPermissions = HashMap<String, Vec<UserPermission>>;

/// Left/right bounds of a node in a nested-set tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NestedSetBounds {
    pub lft: i64,
    pub rgt: i64,
}

impl NestedSetBounds {
    pub fn contains(&self, other: &NestedSetBounds) -> bool {
        self.lft < other.lft && self.rgt > other.rgt
    }
}

/// Which side of a reference node to collect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NestedSetRange {
    /// Nodes nested inside the bounds, ordered by `lft` ascending
    Inside(NestedSetBounds),
    /// Nodes containing the bounds, ordered by `lft` descending
    Enclosing(NestedSetBounds),
}

/// Raw predicate provider registered for an entity: `(user, entity) -> SQL`
pub type ConditionHook = Arc<dyn Fn(&str, &str) -> Option<String> + Send + Sync>;

/// Scripted predicate provider: `user -> SQL`
pub type ScriptCondition = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

pub trait MetadataProvider: Send + Sync {
    fn get_field(&self, entity: &str, fieldname: &str) -> Result<Option<FieldMeta>, CatalogError>;

    fn get_link_fields(&self, entity: &str) -> Result<Vec<FieldMeta>, CatalogError>;

    /// Whether the entity is itself stored as a child collection
    fn is_child_entity(&self, entity: &str) -> Result<bool, CatalogError>;

    fn is_child_collection_type(&self, fieldtype: &FieldType) -> bool {
        fieldtype.is_child_collection()
    }
}

pub trait PermissionProvider: Send + Sync {
    fn has_permission(
        &self,
        entity: &str,
        ptype: PermissionType,
        user: &str,
        parent_entity: Option<&str>,
    ) -> Result<bool, CatalogError>;

    fn get_role_permissions(&self, entity: &str, user: &str)
        -> Result<RolePermissions, CatalogError>;

    fn get_permitted_fields(
        &self,
        entity: &str,
        user: &str,
        parent_entity: Option<&str>,
        permission_type: PermissionType,
        ignore_virtual: bool,
    ) -> Result<Vec<String>, CatalogError>;

    fn only_has_select_permission(&self, entity: &str, user: &str) -> Result<bool, CatalogError>;
}

pub trait UserPermissionProvider: Send + Sync {
    fn get_user_permissions(&self, user: &str) -> Result<UserPermissions, CatalogError>;
}

pub trait ShareRegistry: Send + Sync {
    fn get_shared(&self, entity: &str, user: &str) -> Result<Vec<String>, CatalogError>;
}

pub trait PermissionHooks: Send + Sync {
    /// Hooks registered for the entity, followed by wildcard hooks
    fn get_permission_query_conditions_hooks(&self, entity: &str) -> Vec<ConditionHook>;

    fn get_permission_query_script(&self, entity: &str) -> Option<ScriptCondition>;
}

pub trait NestedSetStore: Send + Sync {
    /// `None` when the node does not exist
    fn bounds(&self, entity: &str, name: &str) -> Result<Option<NestedSetBounds>, CatalogError>;

    /// Names of nodes in the range, in the order documented on [`NestedSetRange`]
    fn names_in_range(
        &self,
        entity: &str,
        range: NestedSetRange,
    ) -> Result<Vec<String>, CatalogError>;
}

/// Bundle of collaborators handed to the engine.
#[derive(Clone)]
pub struct Collaborators {
    pub metadata: Arc<dyn MetadataProvider>,
    pub permissions: Arc<dyn PermissionProvider>,
    pub user_permissions: Arc<dyn UserPermissionProvider>,
    pub shares: Arc<dyn ShareRegistry>,
    pub hooks: Arc<dyn PermissionHooks>,
    pub hierarchy: Arc<dyn NestedSetStore>,
}

impl Collaborators {
    /// Use one object for every contract
    pub fn from_catalog<C>(catalog: Arc<C>) -> Self
    where
        C: MetadataProvider
            + PermissionProvider
            + UserPermissionProvider
            + ShareRegistry
            + PermissionHooks
            + NestedSetStore
            + 'static,
    {
        Collaborators {
            metadata: catalog.clone(),
            permissions: catalog.clone(),
            user_permissions: catalog.clone(),
            shares: catalog.clone(),
            hooks: catalog.clone(),
            hierarchy: catalog,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_type_round_trips_through_strings() {
        assert_eq!(FieldType::from("Link".to_string()), FieldType::Link);
        assert_eq!(
            FieldType::from("Table MultiSelect".to_string()),
            FieldType::TableMultiSelect
        );
        assert_eq!(
            FieldType::from("Currency".to_string()),
            FieldType::Other("Currency".to_string())
        );
        assert_eq!(String::from(FieldType::TableMultiSelect), "Table MultiSelect");
    }

    #[test]
    fn test_child_collection_types() {
        assert!(FieldType::Table.is_child_collection());
        assert!(FieldType::TableMultiSelect.is_child_collection());
        assert!(!FieldType::Link.is_child_collection());
    }

    #[test]
    fn test_nested_set_containment() {
        let x = NestedSetBounds { lft: 2, rgt: 7 };
        let y = NestedSetBounds { lft: 3, rgt: 4 };
        assert!(x.contains(&y));
        assert!(!y.contains(&x));
        assert!(!x.contains(&x));
    }
}
