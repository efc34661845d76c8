//! Function-call terms parsed from select strings.
//!
//! `name(arg, ...) [as alias]` is split by the call grammar, then each
//! argument becomes a typed term: `*`, a literal, a nested call, an
//! arithmetic or comparison expression, or a column reference. Anything
//! else rejects the whole field.

use lazy_static::lazy_static;
use regex::Regex;

use super::function_registry::{build_call, is_recognized};
use crate::errors::QueryError;
use crate::expression_validator::grammar::find_top_level_operator;
use crate::expression_validator::{parse_clause_field, parse_function_call};
use crate::query_ast::{BinaryOp, DatePart, Dialect, FunctionCall, Literal, TableRef, Term};

/// Lowest precedence first; within a level the longest token wins
const COMPARISON_OPERATORS: &[&str] = &["!=", "<>", "<=", ">=", "=<", "=>", "=", "<", ">"];
const ADDITIVE_OPERATORS: &[&str] = &["+", "-"];
const MULTIPLICATIVE_OPERATORS: &[&str] = &["*", "/"];

lazy_static! {
    static ref INTEGER_LITERAL: Regex = Regex::new(r"^-?[0-9]+$").unwrap();
    static ref FLOAT_LITERAL: Regex = Regex::new(r"^-?(?:[0-9]+\.[0-9]*|\.[0-9]+)$").unwrap();
    static ref EXTRACT_ARGUMENT: Regex =
        Regex::new(r"(?is)^([a-z]+)\s+from\s+(.+)$").unwrap();
}

/// Parse a complete function-call field owned by `table`
pub fn parse_function_term(
    field: &str,
    table: &TableRef,
    dialect: Dialect,
) -> Result<FunctionCall, QueryError> {
    let reject = || QueryError::InvalidSelectField(field.to_string());
    let syntax = parse_function_call(field).ok_or_else(reject)?;
    let mut call = build_function(syntax.name, &syntax.args, table, dialect).ok_or_else(reject)?;
    call.alias = syntax.alias.map(str::to_string);
    Ok(call)
}

fn build_function(
    name: &str,
    args: &[&str],
    table: &TableRef,
    dialect: Dialect,
) -> Option<FunctionCall> {
    if name.eq_ignore_ascii_case("extract") {
        let [arg] = args else {
            return None;
        };
        let caps = EXTRACT_ARGUMENT.captures(arg)?;
        let part = DatePart::from_keyword(&caps[1])?;
        let term = parse_argument(caps[2].trim(), table, dialect)?;
        return Some(FunctionCall::new("EXTRACT", vec![Term::DatePart(part), term]));
    }

    let args = args
        .iter()
        .map(|arg| parse_argument(arg, table, dialect))
        .collect::<Option<Vec<_>>>()?;
    Some(build_call(name, args, dialect))
}

fn parse_argument(arg: &str, table: &TableRef, dialect: Dialect) -> Option<Term> {
    let arg = arg.trim();
    if arg.is_empty() {
        return None;
    }
    if arg == "*" {
        return Some(Term::Star(None));
    }
    if let Some(literal) = parse_literal(arg) {
        return Some(Term::Literal(literal));
    }
    if let Some(syntax) = parse_function_call(arg) {
        if syntax.alias.is_none() && is_recognized(syntax.name) {
            return build_function(syntax.name, &syntax.args, table, dialect)
                .map(Term::Function);
        }
    }
    if let Some(term) = parse_operator_expression(arg, table, dialect) {
        return Some(term);
    }
    parse_column(arg, table)
}

fn parse_literal(arg: &str) -> Option<Literal> {
    if INTEGER_LITERAL.is_match(arg) {
        return arg.parse().ok().map(Literal::Int);
    }
    if FLOAT_LITERAL.is_match(arg) {
        return arg.parse().ok().map(Literal::Float);
    }
    let inner = arg.strip_prefix('\'')?.strip_suffix('\'')?;
    // a lone quote inside is not a well-formed literal
    if inner.replace("''", "").contains('\'') {
        return None;
    }
    Some(Literal::Str(inner.replace("''", "'")))
}

fn parse_operator_expression(arg: &str, table: &TableRef, dialect: Dialect) -> Option<Term> {
    let levels: [(&[&str], bool); 3] = [
        (COMPARISON_OPERATORS, false),
        (ADDITIVE_OPERATORS, true),
        (MULTIPLICATIVE_OPERATORS, true),
    ];
    for (tokens, left_assoc) in levels {
        if let Some((pos, token)) = find_top_level_operator(arg, tokens, left_assoc) {
            let op = BinaryOp::from_token(token)?;
            let left = parse_argument(&arg[..pos], table, dialect)?;
            let right = parse_argument(&arg[pos + token.len()..], table, dialect)?;
            return Some(Term::binary(left, op, right));
        }
    }
    None
}

/// Column reference; qualifiers must name a physical table
fn parse_column(arg: &str, table: &TableRef) -> Option<Term> {
    let clause = parse_clause_field(arg)?;
    let field = match (&clause.table, clause.prefixed_table()) {
        (None, _) => table.field(clause.column),
        (Some(_), Some(prefixed)) => TableRef::from_table_name(prefixed).field(clause.column),
        (Some(_), None) => return None,
    };
    Some(Term::Field(field))
}
