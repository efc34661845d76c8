//! Filter shapes, operators and nested-set hierarchy lookups

#[cfg(test)]
mod filter_tests {
    use crate::common::*;
    use guarded_query::query_ast::{Criterion, TableRef, Term};
    use guarded_query::{QueryError, QueryRequest};
    use serde_json::{json, Value};

    fn where_sql(filters: Value) -> String {
        admin_sql(&QueryRequest::new("Task").filters(filters))
    }

    const SELECT: &str = "SELECT `name` FROM `tabTask`";

    #[test]
    fn test_in_filter_structure() {
        let request =
            QueryRequest::new("Task").filters(json!({"status": ["in", ["Open", "Closed"]]}));
        let query = build(&request, JANE).unwrap();
        let task = TableRef::for_entity("Task");

        assert_eq!(
            query.wheres(),
            &[Criterion::In {
                term: Term::Field(task.field("status")),
                values: vec!["Open".into(), "Closed".into()],
                negated: false,
            }]
        );
    }

    #[test]
    fn test_operators() {
        let cases = [
            (json!({"budget": ["between", [10, 20]]}), "`budget` BETWEEN 10 AND 20"),
            (json!({"assigned_to": ["is", "set"]}), "`assigned_to` IS NOT NULL"),
            (json!({"assigned_to": ["is", "not set"]}), "`assigned_to` IS NULL"),
            (json!({"subject": ["not like", "%draft%"]}), "`subject` NOT LIKE '%draft%'"),
            (json!({"subject": ["regex", "^T"]}), "`subject` REGEXP '^T'"),
            (json!({"status": ["in", "Open, Working"]}), "`status` IN ('Open','Working')"),
            (json!({"budget": ["=>", 5]}), "`budget`>=5"),
            (json!({"docstatus": true}), "`docstatus`=1"),
            (json!({"assigned_to": {"name": "jane@example.com"}}), "`assigned_to`='jane@example.com'"),
        ];
        for (filters, predicate) in cases {
            assert_eq!(where_sql(filters.clone()), format!("{SELECT} WHERE {predicate}"), "{filters}");
        }
    }

    #[test]
    fn test_filter_shapes() {
        assert_eq!(where_sql(json!("TASK-0001")), format!("{SELECT} WHERE `name`='TASK-0001'"));
        assert_eq!(
            where_sql(json!(["TASK-0001", "TASK-0002"])),
            format!("{SELECT} WHERE `name` IN ('TASK-0001','TASK-0002')")
        );
        assert_eq!(
            where_sql(json!([["status", "Open"], ["budget", ">", 100], {"subject": "x"}])),
            format!("{SELECT} WHERE `status`='Open' AND `budget`>100 AND `subject`='x'")
        );
    }

    #[test]
    fn test_child_entity_tuple_joins_once() {
        assert_eq!(
            where_sql(json!([
                ["Task Item", "qty", ">", 5],
                ["Task Item", "item_code", "like", "LAP-%"]
            ])),
            "SELECT `tabTask`.`name` FROM `tabTask` LEFT JOIN `tabTask Item` \
             ON `tabTask Item`.`parent`=`tabTask`.`name` AND `tabTask Item`.`parenttype`='Task' \
             WHERE `tabTask Item`.`qty`>5 AND `tabTask Item`.`item_code` LIKE 'LAP-%'"
        );
    }

    #[test]
    fn test_tuple_entity_must_be_child_or_joined() {
        let err = build(
            &QueryRequest::new("Task").filters(json!([["Project", "title", "=", "x"]])),
            JANE,
        )
        .unwrap_err();
        assert!(matches!(err, QueryError::UnknownFilterFormat(_)), "{err:?}");

        assert_eq!(
            where_sql(json!([
                ["project.title", "like", "Apollo%"],
                ["Project", "title", "!=", "Apollo 13"]
            ])),
            "SELECT `tabTask`.`name` FROM `tabTask` \
             LEFT JOIN `tabProject` ON `tabProject`.`name`=`tabTask`.`project` \
             WHERE `tabProject`.`title` LIKE 'Apollo%' AND `tabProject`.`title`<>'Apollo 13'"
        );
    }

    #[test]
    fn test_hierarchy_operators() {
        let cases = [
            ("descendants of", "Hardware", "`category` IN ('Laptops','Phones')"),
            (
                "descendants of (inclusive)",
                "Hardware",
                "`category` IN ('Laptops','Phones','Hardware')",
            ),
            ("not descendants of", "Hardware", "`category` NOT IN ('Laptops','Phones')"),
            ("ancestors of", "Laptops", "`category` IN ('Hardware','All Categories')"),
            ("not ancestors of", "Laptops", "`category` NOT IN ('Hardware','All Categories')"),
            ("descendants of", "Services", "`category` IN ('')"),
        ];
        for (op, node, predicate) in cases {
            assert_eq!(
                where_sql(json!({"category": [op, node]})),
                format!("{SELECT} WHERE {predicate}"),
                "{op} {node}"
            );
        }
    }

    #[test]
    fn test_missing_hierarchy_node_matches_nothing() {
        for (op, keyword) in [
            ("descendants of", "IN"),
            ("descendants of (inclusive)", "IN"),
            ("not descendants of", "NOT IN"),
            ("ancestors of", "IN"),
            ("not ancestors of", "NOT IN"),
        ] {
            assert_eq!(
                where_sql(json!({"category": [op, "Gadgets"]})),
                format!("{SELECT} WHERE `category` {keyword} ('')"),
                "{op}"
            );
        }
    }

    #[test]
    fn test_malformed_filters() {
        let build_err = |filters: Value| {
            build(&QueryRequest::new("Task").filters(filters), JANE).unwrap_err()
        };
        assert!(matches!(
            build_err(json!({"status": ["~=", "Open"]})),
            QueryError::UnknownOperator(_)
        ));
        assert!(matches!(
            build_err(json!([["status"]])),
            QueryError::UnknownFilterFormat(_)
        ));
        assert!(matches!(
            build_err(json!({"status": {"nested": "object"}})),
            QueryError::UnsupportedValue(_)
        ));
        assert!(matches!(
            build_err(json!({"budget": ["between", [1]]})),
            QueryError::UnsupportedValue(_)
        ));
    }
}
