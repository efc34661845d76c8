//! Shared fixture and build helpers

#![allow(dead_code)]

use std::sync::Arc;

use guarded_query::catalog::config::CatalogDefinition;
use guarded_query::{
    BuilderConfig, Collaborators, Engine, InMemoryCatalog, PermissionContext, Query, QueryError,
    QueryRequest,
};

pub const FIXTURE: &str = include_str!("../../fixtures/catalog.yaml");

pub const JANE: &str = "jane@example.com";
pub const PAT: &str = "pat@example.com";
pub const OWEN: &str = "owen@example.com";
pub const UNA: &str = "una@example.com";

pub fn catalog() -> InMemoryCatalog {
    let definition = CatalogDefinition::from_yaml_str(FIXTURE).expect("fixture must parse");
    InMemoryCatalog::from_definition(definition)
}

pub fn engine_with(config: BuilderConfig) -> Engine {
    Engine::new(Collaborators::from_catalog(Arc::new(catalog())), config)
}

pub fn engine() -> Engine {
    engine_with(BuilderConfig::default())
}

pub fn build(request: &QueryRequest, user: &str) -> Result<Query, QueryError> {
    engine().get_query(request, &PermissionContext::for_user(user))
}

pub fn sql_for(request: &QueryRequest, user: &str) -> String {
    build(request, user)
        .unwrap_or_else(|e| panic!("build failed for {user}: {e}"))
        .to_sql()
}

/// Trusted build with every permission check skipped
pub fn admin_sql(request: &QueryRequest) -> String {
    engine()
        .get_query(request, &PermissionContext::ignoring_permissions("Administrator"))
        .unwrap_or_else(|e| panic!("admin build failed: {e}"))
        .to_sql()
}
