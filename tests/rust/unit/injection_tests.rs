//! Hostile identifiers must fail with a permission-class error before
//! anything is attached to the query

#[cfg(test)]
mod injection_tests {
    use crate::common::*;
    use guarded_query::{ErrorKind, QueryError, QueryRequest};
    use serde_json::json;
    use test_case::test_case;

    fn rejected(request: QueryRequest) -> QueryError {
        let err = build(&request, JANE).expect_err("request must be rejected");
        assert!(err.is_permission_error(), "{err:?} is not a permission error");
        assert_eq!(err.kind(), ErrorKind::Permission);
        err
    }

    #[test_case("name; DROP TABLE `tabUser`" ; "statement terminator")]
    #[test_case("name UNION SELECT password FROM `tabUser`" ; "union")]
    #[test_case("name FROM `tabUser`" ; "from clause")]
    #[test_case("(SELECT password FROM `tabUser`)" ; "subquery")]
    #[test_case("`name`/**/`owner`" ; "comment splice")]
    #[test_case("name as `x` , `y`z" ; "broken alias")]
    fn test_select_field_rejected(field: &str) {
        let err = rejected(QueryRequest::new("Task").fields(field));
        assert!(matches!(err, QueryError::InvalidSelectField(_)), "{err:?}");
    }

    #[test_case("status; DROP TABLE x" ; "statement terminator")]
    #[test_case("status = 1 OR 1" ; "tautology")]
    #[test_case("user.password" ; "unprefixed qualifier")]
    #[test_case("(SELECT 1)" ; "subquery")]
    #[test_case("`status` as s" ; "alias")]
    #[test_case("" ; "empty field")]
    #[test_case("   " ; "blank field")]
    fn test_filter_field_rejected(field: &str) {
        let err = rejected(QueryRequest::new("Task").filters(json!({ field: "Open" })));
        assert!(matches!(err, QueryError::InvalidFilterField(_)), "{err:?}");
    }

    #[test_case("modified desc; DROP TABLE x" ; "statement terminator")]
    #[test_case("(SELECT 1)" ; "subquery")]
    #[test_case("sleep(5)" ; "function call")]
    #[test_case("user.password asc" ; "unprefixed qualifier")]
    fn test_order_by_rejected(order_by: &str) {
        let err = rejected(QueryRequest::new("Task").order_by(order_by));
        assert!(matches!(err, QueryError::InvalidOrderBy(_)), "{err:?}");
    }

    #[test_case("status HAVING 1=1" ; "having")]
    #[test_case("count(*)" ; "function call")]
    #[test_case("other.status" ; "unprefixed qualifier")]
    fn test_group_by_rejected(group_by: &str) {
        let err = rejected(QueryRequest::new("Task").group_by(group_by));
        assert!(matches!(err, QueryError::InvalidGroupBy(_)), "{err:?}");
    }

    #[test_case("Task; DROP TABLE x" ; "statement terminator")]
    #[test_case("Task`" ; "quote")]
    #[test_case("tabTask.name" ; "dotted")]
    fn test_entity_rejected(entity: &str) {
        let err = rejected(QueryRequest::new(entity));
        assert!(matches!(err, QueryError::InvalidEntity(_)), "{err:?}");
    }

    #[test]
    fn test_values_are_quoted_not_parsed() {
        let request = QueryRequest::new("Task")
            .filters(json!({"subject": "x' OR '1'='1", "status": "a\\' --"}));
        assert_eq!(
            admin_sql(&request),
            "SELECT `name` FROM `tabTask` WHERE `subject`='x'' OR ''1''=''1' \
             AND `status`='a\\\\'' --'"
        );
    }

    #[test]
    fn test_bad_direction_is_a_validation_error() {
        let err = build(&QueryRequest::new("Task").order_by("modified sideways"), JANE).unwrap_err();
        assert_eq!(err, QueryError::InvalidOrderDirection("sideways".to_string()));
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_accepted_qualified_forms() {
        let request = QueryRequest::new("Task")
            .fields("`tabTask`.`subject` as title")
            .filters(json!({"`tabTask`.`status`": "Open"}))
            .order_by("`tabTask`.`modified` asc");
        assert_eq!(
            sql_for(&request, JANE),
            "SELECT `subject` `title` FROM `tabTask` WHERE `status`='Open' ORDER BY `modified` ASC"
        );
    }
}
