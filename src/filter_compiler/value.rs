use serde_json::Value;

use crate::errors::QueryError;
use crate::query_ast::{Literal, Term};

/// Filter operand after conversion to primitive form.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Null,
    Scalar(Literal),
    List(Vec<Literal>),
}

impl FilterValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FilterValue::Null)
    }

    /// Single-term form used by comparison operators
    pub fn into_term(self) -> Term {
        match self {
            FilterValue::Null => Term::Literal(Literal::Null),
            FilterValue::Scalar(literal) => Term::Literal(literal),
            FilterValue::List(items) => Term::Tuple(items.into_iter().map(Term::Literal).collect()),
        }
    }

    /// Text of a scalar operand; lists are rejected
    pub fn as_text(&self) -> Result<String, QueryError> {
        match self {
            FilterValue::Null => Ok(String::new()),
            FilterValue::Scalar(literal) => Ok(literal.as_text()),
            FilterValue::List(items) => Err(QueryError::UnsupportedValue(format!("{items:?}"))),
        }
    }
}

/// Coerce a JSON filter operand to primitive form. Booleans become 0/1,
/// record references (objects with a `name` entry) unwrap to the name, and
/// an empty list becomes `[""]` so `IN` stays well-formed. A null inside a
/// list is rejected: `IN (.., NULL)` never matches a null column.
pub fn convert_to_value(value: &Value) -> Result<FilterValue, QueryError> {
    match value {
        Value::Null => Ok(FilterValue::Null),
        Value::Array(items) => {
            if items.is_empty() {
                return Ok(FilterValue::List(vec![Literal::from("")]));
            }
            items
                .iter()
                .map(|item| match item {
                    Value::Null => Err(QueryError::UnsupportedValue(format!(
                        "null inside list {value}; filter with IS NULL instead"
                    ))),
                    item => convert_scalar(item),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(FilterValue::List)
        }
        other => convert_scalar(other).map(FilterValue::Scalar),
    }
}

fn convert_scalar(value: &Value) -> Result<Literal, QueryError> {
    match value {
        Value::Null => Ok(Literal::Null),
        Value::Bool(b) => Ok(Literal::Int(*b as i64)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Ok(Literal::Int(i)),
            None => n
                .as_f64()
                .map(Literal::Float)
                .ok_or_else(|| QueryError::UnsupportedValue(n.to_string())),
        },
        Value::String(s) => Ok(Literal::Str(s.clone())),
        Value::Object(map) => match map.get("name") {
            Some(name @ (Value::String(_) | Value::Number(_))) => convert_scalar(name),
            _ => Err(QueryError::UnsupportedValue(value.to_string())),
        },
        Value::Array(_) => Err(QueryError::UnsupportedValue(value.to_string())),
    }
}
