use crate::catalog::{Collaborators, FieldMeta, PermissionHooks, PermissionType, RolePermissions};
use crate::errors::QueryError;
use crate::query_ast::{Criterion, QueryBuilder, TableRef};

use super::PermissionContext;

/// Attach the row-level predicates for the queried entity, after every
/// caller-supplied filter.
///
/// The owner constraint, user-permission constraints and hook predicates are
/// ANDed together. When shared records apply they are ORed onto that group,
/// so a shared record stays visible whatever the other constraints say.
pub fn add_permission_conditions(
    query: &mut QueryBuilder,
    services: &Collaborators,
    ctx: &PermissionContext,
    strict_user_permissions: bool,
) -> Result<(), QueryError> {
    let table = query.table().clone();
    let entity = table.entity();
    let role = services.permissions.get_role_permissions(entity, &ctx.user)?;

    let mut conditions = Vec::new();
    let mut fetch_shared = false;

    if requires_owner_constraint(&role) {
        fetch_shared = true;
        conditions.push(table.field("owner").eq(ctx.user.as_str()));
    } else if role.read || role.select {
        let (user_conditions, has_user_permissions) =
            get_user_permission_conditions(services, &table, ctx, strict_user_permissions)?;
        conditions.extend(user_conditions);
        fetch_shared |= has_user_permissions;
    }

    conditions.extend(get_permission_query_conditions(
        services.hooks.as_ref(),
        entity,
        &ctx.user,
    ));

    let shared = if fetch_shared {
        services.shares.get_shared(entity, &ctx.user)?
    } else {
        Vec::new()
    };

    log::debug!(
        "{} row conditions and {} shared records for {} on {}",
        conditions.len(),
        shared.len(),
        ctx.user,
        entity
    );

    if !shared.is_empty() {
        let shared_condition = table.field("name").isin(shared);
        if conditions.is_empty() {
            query.and_where(shared_condition);
        } else {
            query.and_where(Criterion::all(conditions).or(shared_condition));
        }
    } else if !conditions.is_empty() {
        query.and_where(Criterion::all(conditions));
    }
    Ok(())
}

/// Whether select/read is only granted on records the user owns
pub fn requires_owner_constraint(role: &RolePermissions) -> bool {
    if !role.has_if_owner_enabled || role.if_owner.is_empty() {
        return false;
    }
    // either select or read is needed to query at all
    ![PermissionType::Select, PermissionType::Read]
        .iter()
        .any(|ptype| role.grants(*ptype) && !role.if_owner.contains(ptype))
}

/// Restrict the entity's own name and each link column to the records the
/// user is permitted. Also reports whether the user has any user permission
/// at all, which makes shared records relevant.
pub fn get_user_permission_conditions(
    services: &Collaborators,
    table: &TableRef,
    ctx: &PermissionContext,
    strict: bool,
) -> Result<(Vec<Criterion>, bool), QueryError> {
    let mut conditions = Vec::new();
    let user_permissions = services.user_permissions.get_user_permissions(&ctx.user)?;
    if user_permissions.is_empty() {
        return Ok((conditions, false));
    }

    let entity = table.entity();
    let mut link_fields = vec![FieldMeta::link("name", entity)];
    link_fields.extend(services.metadata.get_link_fields(entity)?);

    for df in link_fields {
        if df.ignore_user_permissions {
            continue;
        }
        let Some(permitted) = df.options.as_ref().and_then(|t| user_permissions.get(t)) else {
            continue;
        };

        let docs: Vec<String> = permitted
            .iter()
            .filter(|p| match p.applicable_for.as_deref() {
                None => true,
                Some(applicable_for) => match ctx.reference_entity.as_deref() {
                    Some(reference) if df.fieldname == "name" => applicable_for == reference,
                    _ => applicable_for == entity,
                },
            })
            .map(|p| p.doc.clone())
            .collect();
        if docs.is_empty() {
            continue;
        }

        let column = table.field(df.fieldname.as_str());
        if strict {
            conditions.push(column.isin(docs));
        } else {
            conditions.push(column.clone().isnull().or(column.isin(docs)));
        }
    }
    Ok((conditions, true))
}

/// Raw predicates from registered hooks, then from the entity's script
pub fn get_permission_query_conditions(
    hooks: &dyn PermissionHooks,
    entity: &str,
    user: &str,
) -> Vec<Criterion> {
    let mut conditions: Vec<Criterion> = hooks
        .get_permission_query_conditions_hooks(entity)
        .iter()
        .filter_map(|hook| hook(user, entity))
        .filter(|sql| !sql.trim().is_empty())
        .map(Criterion::Raw)
        .collect();

    if let Some(script) = hooks.get_permission_query_script(entity) {
        if let Some(sql) = script(user).filter(|sql| !sql.trim().is_empty()) {
            conditions.push(Criterion::Raw(sql));
        }
    }
    conditions
}
