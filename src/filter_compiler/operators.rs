//! Filter operator table.

use crate::errors::QueryError;
use crate::query_ast::{BinaryOp, Criterion, Literal, Term};

use super::value::FilterValue;

/// Nested-set operators, resolved against the tree before comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HierarchyOp {
    DescendantsOf,
    DescendantsOfInclusive,
    NotDescendantsOf,
    AncestorsOf,
    NotAncestorsOf,
}

impl HierarchyOp {
    pub fn is_negated(&self) -> bool {
        matches!(self, HierarchyOp::NotDescendantsOf | HierarchyOp::NotAncestorsOf)
    }

    pub fn is_descendants(&self) -> bool {
        matches!(
            self,
            HierarchyOp::DescendantsOf
                | HierarchyOp::DescendantsOfInclusive
                | HierarchyOp::NotDescendantsOf
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Compare(BinaryOp),
    Like,
    NotLike,
    In,
    NotIn,
    /// `is set` / `is not set`
    Is,
    Between,
    Regex,
    Hierarchy(HierarchyOp),
}

impl Operator {
    /// Case-insensitive lookup
    pub fn parse(token: &str) -> Result<Operator, QueryError> {
        let normalized = token.trim().to_lowercase();
        let op = match normalized.as_str() {
            "=" => Operator::Compare(BinaryOp::Eq),
            "!=" | "<>" => Operator::Compare(BinaryOp::Ne),
            "<" => Operator::Compare(BinaryOp::Lt),
            ">" => Operator::Compare(BinaryOp::Gt),
            "<=" | "=<" => Operator::Compare(BinaryOp::Le),
            ">=" | "=>" => Operator::Compare(BinaryOp::Ge),
            "like" => Operator::Like,
            "not like" => Operator::NotLike,
            "in" => Operator::In,
            "not in" => Operator::NotIn,
            "is" => Operator::Is,
            "between" => Operator::Between,
            "regex" => Operator::Regex,
            "descendants of" => Operator::Hierarchy(HierarchyOp::DescendantsOf),
            "descendants of (inclusive)" => {
                Operator::Hierarchy(HierarchyOp::DescendantsOfInclusive)
            }
            "not descendants of" => Operator::Hierarchy(HierarchyOp::NotDescendantsOf),
            "ancestors of" => Operator::Hierarchy(HierarchyOp::AncestorsOf),
            "not ancestors of" => Operator::Hierarchy(HierarchyOp::NotAncestorsOf),
            _ => return Err(QueryError::UnknownOperator(token.to_string())),
        };
        Ok(op)
    }

    /// Predicate for a non-null operand. Hierarchy operators are resolved by
    /// the compiler and never reach here.
    pub fn build(&self, term: Term, value: FilterValue) -> Result<Criterion, QueryError> {
        let criterion = match self {
            Operator::Compare(op) => Criterion::Compare {
                left: term,
                op: *op,
                right: value.into_term(),
            },
            Operator::Like | Operator::NotLike => Criterion::Like {
                term,
                pattern: value.into_term(),
                negated: *self == Operator::NotLike,
            },
            Operator::In | Operator::NotIn => Criterion::In {
                term,
                values: in_values(value),
                negated: *self == Operator::NotIn,
            },
            Operator::Is => Criterion::IsNull {
                term,
                negated: value.as_text()?.eq_ignore_ascii_case("set"),
            },
            Operator::Between => match value {
                FilterValue::List(items) if items.len() == 2 => {
                    let mut items = items.into_iter().map(Term::Literal);
                    match (items.next(), items.next()) {
                        (Some(low), Some(high)) => Criterion::Between { term, low, high },
                        _ => return Err(QueryError::UnsupportedValue("between".to_string())),
                    }
                }
                other => {
                    return Err(QueryError::UnsupportedValue(format!(
                        "between expects two values, got {other:?}"
                    )))
                }
            },
            Operator::Regex => Criterion::Regex {
                term,
                pattern: value.into_term(),
            },
            Operator::Hierarchy(op) => {
                return Err(QueryError::UnknownOperator(format!("{op:?}")));
            }
        };
        Ok(criterion)
    }
}

/// A comma-separated string is split into its items
fn in_values(value: FilterValue) -> Vec<Term> {
    match value {
        FilterValue::List(items) => items.into_iter().map(Term::Literal).collect(),
        FilterValue::Scalar(Literal::Str(s)) => s
            .split(',')
            .map(|item| Term::Literal(Literal::from(item.trim())))
            .collect(),
        FilterValue::Scalar(literal) => vec![Term::Literal(literal)],
        FilterValue::Null => vec![Term::Literal(Literal::Null)],
    }
}
