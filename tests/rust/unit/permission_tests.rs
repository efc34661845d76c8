//! Column filtering and row-level predicates against the shared fixture

#[cfg(test)]
mod permission_tests {
    use std::collections::HashSet;

    use crate::common::*;
    use guarded_query::permissions::check_permissions;
    use guarded_query::query_ast::Term;
    use guarded_query::{BuilderConfig, FieldSpec, PermissionContext, QueryError, QueryRequest};
    use serde_json::json;

    fn selected_names(request: &QueryRequest, user: &str) -> HashSet<String> {
        build(request, user)
            .unwrap()
            .selects()
            .iter()
            .map(|term| match term {
                Term::Field(field) => field.name.clone(),
                other => panic!("unexpected select {other:?}"),
            })
            .collect()
    }

    #[test]
    fn test_star_is_the_permitted_set() {
        let names = selected_names(&QueryRequest::new("Task").fields("*"), PAT);
        let expected: HashSet<String> = ["name", "subject", "status", "assigned_to"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(names, expected);
        assert_eq!(
            sql_for(&QueryRequest::new("Task").fields("*"), PAT),
            "SELECT `name`,`subject`,`status`,`assigned_to` FROM `tabTask`"
        );
    }

    #[test]
    fn test_filtering_only_removes_columns() {
        let requested = "name, budget, subject, owner, status";
        let unrestricted = selected_names(&QueryRequest::new("Task").fields(requested), JANE);
        let restricted = selected_names(&QueryRequest::new("Task").fields(requested), PAT);
        assert!(restricted.is_subset(&unrestricted));
        assert_eq!(
            sql_for(&QueryRequest::new("Task").fields(requested), PAT),
            "SELECT `name`,`subject`,`status` FROM `tabTask`"
        );
    }

    #[test]
    fn test_linked_fields_follow_the_link_column() {
        assert_eq!(
            sql_for(
                &QueryRequest::new("Task").fields("assigned_to.email, project.title"),
                PAT
            ),
            "SELECT `tabUser`.`email` FROM `tabTask` \
             LEFT JOIN `tabUser` ON `tabUser`.`name`=`tabTask`.`assigned_to`"
        );
        // nothing readable left
        assert_eq!(
            sql_for(&QueryRequest::new("Task").fields("budget"), PAT),
            "SELECT `name` FROM `tabTask`"
        );
    }

    #[test]
    fn test_child_query_is_narrowed() {
        let engine = engine();
        let ctx = PermissionContext::for_user(PAT);
        let request = QueryRequest::new("Task").fields(vec![
            FieldSpec::from("subject"),
            FieldSpec::child("items", &["item_code", "rate"]),
        ]);
        let query = engine.get_query(&request, &ctx).unwrap();
        let child = &query.child_queries()[0];
        assert_eq!(child.fields, vec!["item_code".to_string()]);
        assert_eq!(
            child
                .get_query(&engine, &["TASK-0001".to_string()], &ctx)
                .unwrap()
                .to_sql(),
            "SELECT `item_code`,`parent`,`parentfield` FROM `tabTask Item` \
             WHERE `parenttype`='Task' AND `parentfield`='items' \
             AND `parent` IN ('TASK-0001') ORDER BY `idx` ASC"
        );

        let request =
            QueryRequest::new("Task").fields(vec![FieldSpec::child("items", &["rate"])]);
        assert!(engine.get_query(&request, &ctx).unwrap().child_queries().is_empty());
    }

    #[test]
    fn test_owner_only_access_with_shares() {
        assert_eq!(
            sql_for(&QueryRequest::new("Task"), OWEN),
            "SELECT `name` FROM `tabTask` \
             WHERE (`owner`='owen@example.com' OR `name` IN ('TASK-0007'))"
        );
    }

    #[test]
    fn test_row_conditions_follow_caller_filters() {
        let request = QueryRequest::new("Task").filters(json!({"status": "Open"}));
        assert_eq!(
            sql_for(&request, OWEN),
            "SELECT `name` FROM `tabTask` WHERE `status`='Open' \
             AND (`owner`='owen@example.com' OR `name` IN ('TASK-0007'))"
        );
    }

    #[test]
    fn test_user_permissions_lenient_and_strict() {
        assert_eq!(
            sql_for(&QueryRequest::new("Task"), UNA),
            "SELECT `name` FROM `tabTask` WHERE \
             (`project` IS NULL OR `project` IN ('PRJ-1') OR `name` IN ('TASK-0042'))"
        );

        let strict = engine_with(BuilderConfig::default().with_strict_user_permissions(true));
        assert_eq!(
            strict
                .get_query(&QueryRequest::new("Task"), &PermissionContext::for_user(UNA))
                .unwrap()
                .to_sql(),
            "SELECT `name` FROM `tabTask` WHERE \
             (`project` IN ('PRJ-1') OR `name` IN ('TASK-0042'))"
        );
    }

    #[test]
    fn test_permission_query_conditions() {
        assert_eq!(
            sql_for(&QueryRequest::new("Project").fields("title"), JANE),
            "SELECT `title` FROM `tabProject` WHERE (`tabProject`.`owner` = 'jane@example.com')"
        );
    }

    #[test]
    fn test_insufficient_permission() {
        for (entity, user) in [("Task", "nobody@example.com"), ("User", PAT), ("Task Item", JANE)] {
            let err = build(&QueryRequest::new(entity), user).unwrap_err();
            assert_eq!(err, QueryError::InsufficientPermission(entity.to_string()));
            assert!(err.is_permission_error());
        }
    }

    #[test]
    fn test_rendered_sql_needs_access_to_every_table() {
        let sql = sql_for(&QueryRequest::new("Task").fields("assigned_to.email"), JANE);
        let engine = engine();
        let permissions = engine.services().permissions.as_ref();

        assert!(check_permissions(&sql, permissions, &PermissionContext::for_user(JANE)).is_ok());

        let err =
            check_permissions(&sql, permissions, &PermissionContext::for_user(PAT)).unwrap_err();
        assert_eq!(err, QueryError::InsufficientPermission("User".to_string()));
        assert!(err.is_permission_error());
    }

    #[test]
    fn test_parent_entity_grants_child_access() {
        let ctx = PermissionContext::for_user(JANE).with_parent_entity("Task");
        let query = engine()
            .get_query(&QueryRequest::new("Task Item").fields("qty"), &ctx)
            .unwrap();
        assert_eq!(query.to_sql(), "SELECT `qty` FROM `tabTask Item`");
    }

    #[test]
    fn test_ignoring_permissions_skips_every_check() {
        let request = QueryRequest::new("Task").fields("budget");
        assert_eq!(admin_sql(&request), "SELECT `budget` FROM `tabTask`");
        let ctx = PermissionContext::ignoring_permissions(OWEN);
        assert_eq!(
            engine().get_query(&request, &ctx).unwrap().to_sql(),
            "SELECT `budget` FROM `tabTask`"
        );
    }
}
