//! Field lists: plain columns, functions, linked and child fields, child queries

#[cfg(test)]
mod field_parsing_tests {
    use crate::common::*;
    use guarded_query::query_ast::{TableRef, Term};
    use guarded_query::{FieldSpec, PermissionContext, QueryRequest};

    #[test]
    fn test_plain_and_aliased_columns() {
        let request = QueryRequest::new("Task").fields("name, `creation` as created_on");
        let query = build(&request, JANE).unwrap();
        let task = TableRef::for_entity("Task");

        assert_eq!(
            query.selects(),
            &[
                Term::Field(task.field("name")),
                Term::Field(task.field("creation").as_("created_on")),
            ]
        );
        assert_eq!(
            query.to_sql(),
            "SELECT `name`,`creation` `created_on` FROM `tabTask`"
        );
    }

    #[test]
    fn test_no_fields_selects_name() {
        assert_eq!(
            sql_for(&QueryRequest::new("Task"), JANE),
            "SELECT `name` FROM `tabTask`"
        );
    }

    #[test]
    fn test_linked_field_joins_target() {
        let query = build(&QueryRequest::new("Task").fields("assigned_to.email"), JANE).unwrap();
        let user = TableRef::for_entity("User");
        let task = TableRef::for_entity("Task");

        assert_eq!(query.joins().len(), 1);
        assert_eq!(query.joins()[0].table, user);
        assert_eq!(
            query.joins()[0].on,
            user.field("name").eq(task.field("assigned_to"))
        );
        assert_eq!(query.selects(), &[Term::Field(user.field("email"))]);
        assert_eq!(
            query.to_sql(),
            "SELECT `tabUser`.`email` FROM `tabTask` \
             LEFT JOIN `tabUser` ON `tabUser`.`name`=`tabTask`.`assigned_to`"
        );
    }

    #[test]
    fn test_joins_are_idempotent() {
        let request = QueryRequest::new("Task")
            .fields("assigned_to.email, assigned_to.full_name as assignee")
            .filters(serde_json::json!({"assigned_to.email": ["like", "%@example.com"]}));
        let query = build(&request, JANE).unwrap();

        assert_eq!(query.joins().len(), 1);
        assert_eq!(
            query.to_sql(),
            "SELECT `tabUser`.`email`,`tabUser`.`full_name` `assignee` FROM `tabTask` \
             LEFT JOIN `tabUser` ON `tabUser`.`name`=`tabTask`.`assigned_to` \
             WHERE `tabUser`.`email` LIKE '%@example.com'"
        );
    }

    #[test]
    fn test_child_field_through_collection() {
        assert_eq!(
            sql_for(&QueryRequest::new("Task").fields("items.qty"), JANE),
            "SELECT `tabTask Item`.`qty` FROM `tabTask` \
             LEFT JOIN `tabTask Item` ON `tabTask Item`.`parent`=`tabTask`.`name` \
             AND `tabTask Item`.`parenttype`='Task' AND `tabTask Item`.`parentfield`='items'"
        );
    }

    #[test]
    fn test_quoted_child_field_shares_join() {
        let request = QueryRequest::new("Task").fields("`tabTask Item`.`qty`, items.rate");
        let query = build(&request, JANE).unwrap();
        assert!(query.is_joined(&TableRef::for_entity("Task Item")));
        assert_eq!(query.joins().len(), 1);
        assert_eq!(query.selects().len(), 2);
    }

    #[test]
    fn test_functions_and_positions() {
        let request = QueryRequest::new("Task")
            .fields("status, count(name) as total, sum(budget)")
            .group_by("1");
        assert_eq!(
            sql_for(&request, JANE),
            "SELECT `status`,COUNT(`name`) `total`,SUM(`budget`) FROM `tabTask` GROUP BY 1"
        );
    }

    #[test]
    fn test_child_queries() {
        let engine = engine();
        let ctx = PermissionContext::for_user(JANE);
        let request = QueryRequest::new("Task").fields(vec![
            FieldSpec::from("name"),
            FieldSpec::child("items", &["item_code", "qty"]),
            FieldSpec::child("subject", &["qty"]),
        ]);
        let query = engine.get_query(&request, &ctx).unwrap();

        assert_eq!(query.to_sql(), "SELECT `name` FROM `tabTask`");
        assert_eq!(query.child_queries().len(), 1);

        let child = &query.child_queries()[0];
        assert_eq!(child.entity, "Task Item");
        let names = vec!["TASK-0001".to_string(), "TASK-0002".to_string()];
        assert_eq!(
            child.get_query(&engine, &names, &ctx).unwrap().to_sql(),
            "SELECT `item_code`,`qty`,`parent`,`parentfield` FROM `tabTask Item` \
             WHERE `parenttype`='Task' AND `parentfield`='items' \
             AND `parent` IN ('TASK-0001','TASK-0002') ORDER BY `idx` ASC"
        );
    }

    #[test]
    fn test_prebuilt_terms_pass_through() {
        let task = TableRef::for_entity("Task");
        let request = QueryRequest::new("Task").fields(vec![
            FieldSpec::from("name"),
            FieldSpec::Term(Term::Field(task.field("subject").as_("title"))),
        ]);
        assert_eq!(
            sql_for(&request, JANE),
            "SELECT `name`,`subject` `title` FROM `tabTask`"
        );
    }
}
