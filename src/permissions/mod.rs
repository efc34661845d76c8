//! Access control applied while a query is assembled.
//!
//! - [`check_read_permission`]: entity-level gate, run before any parsing
//! - [`check_permissions`]: the same gate for every table a SQL string names
//! - [`columns`]: drops selected fields the user may not read
//! - [`rows`]: owner, user-permission, hook and share predicates

pub mod columns;
pub mod rows;

use lazy_static::lazy_static;
use regex::Regex;

use crate::catalog::{PermissionProvider, PermissionType};
use crate::errors::QueryError;

pub use columns::apply_field_permissions;
pub use rows::add_permission_conditions;

lazy_static! {
    // quoted names may hold spaces and hyphens, bare names are one word
    static ref TABLE_REFERENCE: Regex =
        Regex::new(r#"[`"]tab([A-Za-z0-9_ -]+)[`"]|\btab(\w+)"#).unwrap();
}

/// Who is asking and how much enforcement applies. Fixed for one build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionContext {
    pub user: String,
    /// Entity through which a child entity is being read
    pub parent_entity: Option<String>,
    /// Entity holding the link whose values are being listed
    pub reference_entity: Option<String>,
    pub apply_permissions: bool,
    /// Column filtering; only effective with `apply_permissions`
    pub filter_fields: bool,
}

impl PermissionContext {
    /// Enforce every check for `user`
    pub fn for_user(user: impl Into<String>) -> Self {
        PermissionContext {
            user: user.into(),
            parent_entity: None,
            reference_entity: None,
            apply_permissions: true,
            filter_fields: true,
        }
    }

    /// Trusted internal call: no permission checks or predicates
    pub fn ignoring_permissions(user: impl Into<String>) -> Self {
        PermissionContext {
            apply_permissions: false,
            ..Self::for_user(user)
        }
    }

    pub fn with_parent_entity(mut self, parent_entity: impl Into<String>) -> Self {
        self.parent_entity = Some(parent_entity.into());
        self
    }

    pub fn with_reference_entity(mut self, reference_entity: impl Into<String>) -> Self {
        self.reference_entity = Some(reference_entity.into());
        self
    }

    pub fn without_field_filtering(mut self) -> Self {
        self.filter_fields = false;
        self
    }

    pub fn filters_fields(&self) -> bool {
        self.apply_permissions && self.filter_fields
    }
}

/// Fail unless the user can select or read `entity`
pub fn check_read_permission(
    permissions: &dyn PermissionProvider,
    entity: &str,
    ctx: &PermissionContext,
) -> Result<(), QueryError> {
    let parent = ctx.parent_entity.as_deref();
    let allowed = permissions.has_permission(entity, PermissionType::Select, &ctx.user, parent)?
        || permissions.has_permission(entity, PermissionType::Read, &ctx.user, parent)?;
    if allowed {
        Ok(())
    } else {
        log::debug!("{} may not read {}", ctx.user, entity);
        Err(QueryError::InsufficientPermission(entity.to_string()))
    }
}

/// Entities whose tables `sql` mentions, in order of first appearance
pub fn get_tables_from_query(sql: &str) -> Vec<String> {
    let mut entities: Vec<String> = Vec::new();
    for caps in TABLE_REFERENCE.captures_iter(sql) {
        let Some(entity) = caps.get(1).or_else(|| caps.get(2)) else {
            continue;
        };
        if !entities.iter().any(|e| e == entity.as_str()) {
            entities.push(entity.as_str().to_string());
        }
    }
    entities
}

/// Require select or read on every `tab<Entity>` table referenced by an
/// already rendered query. Fails on the first table the user cannot read.
pub fn check_permissions(
    sql: &str,
    permissions: &dyn PermissionProvider,
    ctx: &PermissionContext,
) -> Result<(), QueryError> {
    let entities = get_tables_from_query(sql);
    log::debug!("checking {} on tables of {:?}", ctx.user, entities);
    for entity in &entities {
        check_read_permission(permissions, entity, ctx)?;
    }
    Ok(())
}

/// Select-only users see the select column set, everyone else the read set
pub fn get_permission_type(
    permissions: &dyn PermissionProvider,
    entity: &str,
    user: &str,
) -> Result<PermissionType, QueryError> {
    if permissions.only_has_select_permission(entity, user)? {
        Ok(PermissionType::Select)
    } else {
        Ok(PermissionType::Read)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::config::EntityAccess;
    use crate::catalog::{FieldMeta, FieldType, InMemoryCatalog};

    fn catalog() -> InMemoryCatalog {
        InMemoryCatalog::new()
            .with_fields("Task", vec![FieldMeta::new("subject", FieldType::Data)])
            .with_child_entity("Task Item", vec![])
            .grant(
                "jane@example.com",
                "Task",
                EntityAccess::with_capabilities(&[PermissionType::Read]),
            )
            .grant(
                "sel@example.com",
                "Task",
                EntityAccess::with_capabilities(&[PermissionType::Select]),
            )
    }

    #[test]
    fn test_check_read_permission() {
        let catalog = catalog();
        let jane = PermissionContext::for_user("jane@example.com");
        assert!(check_read_permission(&catalog, "Task", &jane).is_ok());

        let err = check_read_permission(&catalog, "Task", &PermissionContext::for_user("bob"))
            .unwrap_err();
        assert_eq!(err, QueryError::InsufficientPermission("Task".to_string()));
        assert!(err.is_permission_error());
    }

    #[test]
    fn test_child_entity_through_parent() {
        let catalog = catalog();
        let jane = PermissionContext::for_user("jane@example.com");
        assert!(check_read_permission(&catalog, "Task Item", &jane).is_err());
        let jane = jane.with_parent_entity("Task");
        assert!(check_read_permission(&catalog, "Task Item", &jane).is_ok());
    }

    #[test]
    fn test_get_tables_from_query() {
        assert_eq!(
            get_tables_from_query(
                "SELECT `tabTask`.`name` FROM `tabTask` LEFT JOIN `tabTask Item` \
                 ON `tabTask Item`.`parent`=`tabTask`.`name` WHERE tabUser.x = 1"
            ),
            vec!["Task".to_string(), "Task Item".to_string(), "User".to_string()]
        );
        assert_eq!(
            get_tables_from_query("SELECT \"name\" FROM \"tabProject\""),
            vec!["Project".to_string()]
        );
        assert!(get_tables_from_query("SELECT 1 AS stable").is_empty());
    }

    #[test]
    fn test_check_permissions() {
        let catalog = catalog();
        let jane = PermissionContext::for_user("jane@example.com");
        assert!(check_permissions("SELECT `name` FROM `tabTask`", &catalog, &jane).is_ok());

        let err = check_permissions(
            "SELECT `tabTask`.`name` FROM `tabTask` LEFT JOIN `tabTask Item` \
             ON `tabTask Item`.`parent`=`tabTask`.`name`",
            &catalog,
            &jane,
        )
        .unwrap_err();
        assert_eq!(err, QueryError::InsufficientPermission("Task Item".to_string()));

        let jane = jane.with_parent_entity("Task");
        assert!(check_permissions(
            "SELECT `qty` FROM `tabTask Item` JOIN `tabTask` ON 1=1",
            &catalog,
            &jane
        )
        .is_ok());
    }

    #[test]
    fn test_permission_type() {
        let catalog = catalog();
        assert_eq!(
            get_permission_type(&catalog, "Task", "sel@example.com").unwrap(),
            PermissionType::Select
        );
        assert_eq!(
            get_permission_type(&catalog, "Task", "jane@example.com").unwrap(),
            PermissionType::Read
        );
    }

    #[test]
    fn test_context_flags() {
        assert!(PermissionContext::for_user("a").filters_fields());
        assert!(!PermissionContext::ignoring_permissions("a").filters_fields());
        assert!(!PermissionContext::for_user("a")
            .without_field_filtering()
            .filters_fields());
    }
}
