//! Whitelist grammars for every identifier-bearing string the builder accepts.
//!
//! Nothing user-supplied reaches the AST as text. Select fields, clause
//! fields, order-by declarations, group-by lists and entity names are
//! matched against the fixed shapes below and anything else is rejected
//! with a permission-class error before it is attached anywhere.

pub mod cache;
pub mod comments;
pub mod grammar;

use lazy_static::lazy_static;
use regex::Regex;

use crate::errors::QueryError;
use crate::query_ast::{Dialect, Order, TABLE_PREFIX};

pub use cache::{CacheMetrics, SanitizeCache};
pub use comments::strip_comments;
pub use grammar::{parse_function_call, split_top_level, FunctionCallSyntax};

/// Order-by value that keeps the backend's default ordering
pub const KEEP_DEFAULT_ORDERING: &str = "KEEP_DEFAULT_ORDERING";

lazy_static! {
    static ref ENTITY_NAME_PATTERN: Regex = Regex::new(r"^[A-Za-z0-9_ -]+$").unwrap();

    static ref SPECIAL_CHAR_PATTERN: Regex = Regex::new(r"[^A-Za-z0-9_]").unwrap();

    // [table.]column [as alias]; tables may be quoted with spaces and hyphens
    static ref SELECT_FIELD_PATTERN: Regex = Regex::new(
        r#"^(?:(?:`[A-Za-z0-9_ -]+`|"[A-Za-z0-9_ -]+"|[A-Za-z0-9_]+)\.)?(?:`[A-Za-z0-9_]+`|"[A-Za-z0-9_]+"|[A-Za-z0-9_]+)(?:\s+(?i:as)\s+(?:`[A-Za-z0-9_]+`|"[A-Za-z0-9_]+"|[A-Za-z0-9_]+))?$"#
    )
    .unwrap();

    static ref FUNCTION_CALL_PATTERN: Regex = Regex::new(
        r#"^[A-Za-z0-9_]+\(.*\)(?:\s+(?i:as)\s+(?:`[A-Za-z0-9_]+`|"[A-Za-z0-9_]+"|[A-Za-z0-9_]+))?$"#
    )
    .unwrap();

    // [table.]column, no alias, no calls
    static ref CLAUSE_FIELD_PATTERN: Regex = Regex::new(
        r#"^(?:(?:`([A-Za-z0-9_ -]+)`|"([A-Za-z0-9_ -]+)"|([A-Za-z0-9_]+))\.)?(?:`([A-Za-z0-9_]+)`|"([A-Za-z0-9_]+)"|([A-Za-z0-9_]+))$"#
    )
    .unwrap();

    static ref ALIAS_SEPARATOR: Regex = Regex::new(r"(?i)\s+as\s+").unwrap();

    static ref NUMERIC_PATTERN: Regex = Regex::new(r"^[0-9]+$").unwrap();
}

/// A table-qualified (or bare) column reference accepted by a clause grammar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClauseField {
    pub table: Option<String>,
    pub column: String,
}

impl ClauseField {
    /// Qualifier that names a physical table under the naming convention
    pub fn prefixed_table(&self) -> Option<&str> {
        self.table
            .as_deref()
            .filter(|t| t.starts_with(TABLE_PREFIX))
    }
}

/// GROUP BY / ORDER BY operand
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClauseItem {
    Field(ClauseField),
    Position(u64),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderDeclaration {
    pub item: ClauseItem,
    pub order: Order,
}

pub fn is_valid_entity_name(name: &str) -> bool {
    ENTITY_NAME_PATTERN.is_match(name)
}

pub fn validate_entity_name(name: &str) -> Result<(), QueryError> {
    if is_valid_entity_name(name) {
        Ok(())
    } else {
        Err(QueryError::InvalidEntity(name.to_string()))
    }
}

/// Anything outside `[A-Za-z0-9_]`
pub fn has_special_chars(value: &str) -> bool {
    SPECIAL_CHAR_PATTERN.is_match(value)
}

pub fn is_numeric(value: &str) -> bool {
    NUMERIC_PATTERN.is_match(value)
}

pub fn is_select_field(field: &str) -> bool {
    field == "*"
        || is_numeric(field)
        || SELECT_FIELD_PATTERN.is_match(field)
        || FUNCTION_CALL_PATTERN.is_match(field)
}

pub fn validate_select_field(field: &str) -> Result<(), QueryError> {
    if is_select_field(field) {
        Ok(())
    } else {
        Err(QueryError::InvalidSelectField(field.to_string()))
    }
}

/// Parse a `[table.]column` clause field
pub fn parse_clause_field(field: &str) -> Option<ClauseField> {
    let caps = CLAUSE_FIELD_PATTERN.captures(field)?;
    let table = caps
        .get(1)
        .or_else(|| caps.get(2))
        .or_else(|| caps.get(3))
        .map(|m| m.as_str().to_string());
    let column = caps
        .get(4)
        .or_else(|| caps.get(5))
        .or_else(|| caps.get(6))?
        .as_str()
        .to_string();
    Some(ClauseField { table, column })
}

pub fn is_clause_field(field: &str) -> bool {
    CLAUSE_FIELD_PATTERN.is_match(field)
}

/// Split `expr as alias`, case-insensitively, stripping quotes from the alias
pub fn split_alias(field: &str) -> (&str, Option<String>) {
    let mut parts = ALIAS_SEPARATOR.splitn(field, 2);
    let expr = parts.next().unwrap_or(field).trim();
    let alias = parts
        .next()
        .map(|a| a.trim().trim_matches(|c| c == '`' || c == '"').to_string())
        .filter(|a| !a.is_empty());
    (expr, alias)
}

fn parse_clause_item(token: &str) -> Option<ClauseItem> {
    if is_numeric(token) {
        return token.parse().ok().map(ClauseItem::Position);
    }
    parse_clause_field(token).map(ClauseItem::Field)
}

/// Validate a comma-separated GROUP BY list
pub fn parse_group_by(group_by: &str) -> Result<Vec<ClauseItem>, QueryError> {
    let mut items = Vec::new();
    for part in split_top_level(group_by, ',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let item =
            parse_clause_item(part).ok_or_else(|| QueryError::InvalidGroupBy(part.to_string()))?;
        items.push(item);
    }
    Ok(items)
}

/// Validate a comma-separated ORDER BY list. A declaration without a
/// direction sorts descending.
pub fn parse_order_by(order_by: &str) -> Result<Vec<OrderDeclaration>, QueryError> {
    let mut declarations = Vec::new();
    if order_by.trim().is_empty() || order_by == KEEP_DEFAULT_ORDERING {
        return Ok(declarations);
    }

    for declaration in split_top_level(order_by, ',') {
        let declaration = declaration.trim();
        if declaration.is_empty() {
            continue;
        }
        let tokens: Vec<&str> = declaration.split_whitespace().collect();
        if tokens.len() > 2 {
            return Err(QueryError::InvalidOrderBy(declaration.to_string()));
        }
        let item = parse_clause_item(tokens[0])
            .ok_or_else(|| QueryError::InvalidOrderBy(tokens[0].to_string()))?;
        let order = match tokens.get(1) {
            None => Order::Desc,
            Some(direction) if direction.eq_ignore_ascii_case("asc") => Order::Asc,
            Some(direction) if direction.eq_ignore_ascii_case("desc") => Order::Desc,
            Some(direction) => {
                return Err(QueryError::InvalidOrderDirection(direction.to_string()))
            }
        };
        declarations.push(OrderDeclaration { item, order });
    }
    Ok(declarations)
}

/// Select-field validation plus comment stripping, memoized.
#[derive(Debug)]
pub struct ExpressionValidator {
    cache: SanitizeCache,
}

impl ExpressionValidator {
    pub fn new(cache_size: usize) -> Self {
        ExpressionValidator {
            cache: SanitizeCache::new(cache_size),
        }
    }

    /// Validate a select field, strip comments from it and trim it.
    /// Validation always runs on the raw text.
    pub fn sanitize_field(&self, field: &str, dialect: Dialect) -> Result<String, QueryError> {
        if let Some(sanitized) = self.cache.get(field, dialect) {
            return Ok(sanitized);
        }
        validate_select_field(field)?;
        let sanitized = strip_comments(field, dialect).trim().to_string();
        self.cache.insert(field, dialect, sanitized.clone());
        Ok(sanitized)
    }

    pub fn cache_metrics(&self) -> CacheMetrics {
        self.cache.metrics()
    }
}

impl Default for ExpressionValidator {
    fn default() -> Self {
        Self::new(cache::DEFAULT_CACHE_SIZE)
    }
}
