//! Dialect rendering, locking clauses and fixture loading

#[cfg(test)]
mod rendering_tests {
    use std::io::Write;

    use crate::common::*;
    use guarded_query::catalog::config::CatalogDefinition;
    use guarded_query::{BuilderConfig, Dialect, PermissionContext, QueryRequest};
    use serde_json::json;
    use serial_test::serial;

    fn sql_in(dialect: Dialect, request: &QueryRequest) -> String {
        engine_with(BuilderConfig::default().with_dialect(dialect))
            .get_query(request, &PermissionContext::for_user(JANE))
            .unwrap()
            .to_sql()
    }

    fn sample() -> QueryRequest {
        QueryRequest::new("Task")
            .fields("name, assigned_to.email")
            .filters(json!({"subject": ["regex", "^It's"]}))
            .order_by("modified")
            .limit(5)
    }

    #[test]
    fn test_mariadb() {
        assert_eq!(
            sql_in(Dialect::MariaDb, &sample()),
            "SELECT `tabTask`.`name`,`tabUser`.`email` FROM `tabTask` \
             LEFT JOIN `tabUser` ON `tabUser`.`name`=`tabTask`.`assigned_to` \
             WHERE `tabTask`.`subject` REGEXP '^It''s' \
             ORDER BY `tabTask`.`modified` DESC LIMIT 5"
        );
    }

    #[test]
    fn test_postgres() {
        assert_eq!(
            sql_in(Dialect::Postgres, &sample()),
            "SELECT \"tabTask\".\"name\",\"tabUser\".\"email\" FROM \"tabTask\" \
             LEFT JOIN \"tabUser\" ON \"tabUser\".\"name\"=\"tabTask\".\"assigned_to\" \
             WHERE \"tabTask\".\"subject\" ~ '^It''s' \
             ORDER BY \"tabTask\".\"modified\" DESC LIMIT 5"
        );
    }

    #[test]
    fn test_sqlite() {
        assert_eq!(
            sql_in(Dialect::Sqlite, &sample()),
            "SELECT `tabTask`.`name`,`tabUser`.`email` FROM `tabTask` \
             LEFT JOIN `tabUser` ON `tabUser`.`name`=`tabTask`.`assigned_to` \
             WHERE `tabTask`.`subject` REGEXP '^It''s' \
             ORDER BY `tabTask`.`modified` DESC LIMIT 5"
        );
    }

    #[test]
    fn test_row_locking() {
        let locked = QueryRequest::new("Task").for_update(false, true);
        assert_eq!(
            sql_in(Dialect::MariaDb, &locked),
            "SELECT `name` FROM `tabTask` FOR UPDATE"
        );
        assert_eq!(
            sql_in(Dialect::Postgres, &QueryRequest::new("Task").for_update(false, false)),
            "SELECT \"name\" FROM \"tabTask\" FOR UPDATE NOWAIT"
        );
        assert_eq!(
            sql_in(Dialect::MariaDb, &QueryRequest::new("Task").for_update(true, true)),
            "SELECT `name` FROM `tabTask` FOR UPDATE SKIP LOCKED"
        );
        // no row locks on sqlite
        assert_eq!(sql_in(Dialect::Sqlite, &locked), "SELECT `name` FROM `tabTask`");
    }

    #[test]
    fn test_request_document_end_to_end() {
        let document: serde_json::Value =
            serde_json::from_str(include_str!("../../fixtures/open_tasks.json")).unwrap();
        let request = QueryRequest::from_json(&document).unwrap();
        let query = build(&request, OWEN).unwrap();
        assert!(query.to_sql().contains("`owner`='owen@example.com'"));
    }

    #[test]
    fn test_fixture_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(FIXTURE.as_bytes()).unwrap();
        let definition = CatalogDefinition::from_yaml_file(file.path()).unwrap();
        assert!(definition.entities.contains_key("Task Item"));
        assert!(definition.users.contains_key(PAT));
    }

    #[test]
    fn test_fixture_rejects_unknown_child_tables() {
        let broken = "entities:\n  Task:\n    fields:\n      - { fieldname: lines, fieldtype: Table, options: Task Line }\n";
        assert!(CatalogDefinition::from_yaml_str(broken).is_err());
    }

    #[test]
    #[serial]
    fn test_config_from_env() {
        std::env::set_var("GUARDED_QUERY_DIALECT", "postgres");
        let config = BuilderConfig::from_env().unwrap();
        std::env::remove_var("GUARDED_QUERY_DIALECT");
        assert_eq!(config.dialect, Dialect::Postgres);
        assert_eq!(
            sql_in(config.dialect, &QueryRequest::new("Task")),
            "SELECT \"name\" FROM \"tabTask\""
        );
    }
}
