//! Guarded Query - permission-aware dynamic query construction
//!
//! This crate turns caller-supplied field lists, filters and clause options
//! into a query AST that is safe to render:
//! - Whitelist validation of every identifier before it reaches the AST
//! - Linked and child-collection fields resolved into idempotent joins
//! - Column filtering and row-level permission predicates
//! - SQL rendering for MariaDB, PostgreSQL and SQLite

pub mod catalog;
pub mod config;
pub mod dynamic_field;
pub mod engine;
pub mod errors;
pub mod expression_validator;
pub mod field_parser;
pub mod filter_compiler;
pub mod permissions;
pub mod query_ast;

pub use catalog::{Collaborators, InMemoryCatalog};
pub use config::BuilderConfig;
pub use engine::{Engine, QueryRequest, TableSpec};
pub use errors::{ErrorKind, QueryError};
pub use field_parser::{FieldSpec, Fields};
pub use filter_compiler::Filters;
pub use permissions::PermissionContext;
pub use query_ast::{Dialect, Query, QueryBuilder, QueryMode};
