/// SQL function registry.
///
/// Maps the recognized function names to their spelling on each dialect,
/// with optional argument transformations where the dialects disagree on
/// argument order or shape.
use std::collections::HashMap;

use lazy_static::lazy_static;
use regex::Regex;

use crate::query_ast::{Dialect, FunctionCall, Literal, Term};

/// Argument rewrite applied for one dialect
#[derive(Debug, Clone, Copy)]
pub enum ArgTransform {
    /// Exchange the first two arguments
    SwapFirstTwo,
    /// Insert a string literal before the arguments
    Prepend(&'static str),
    /// Replace all arguments with a single string literal
    Replace(&'static str),
}

impl ArgTransform {
    fn apply(&self, mut args: Vec<Term>) -> Vec<Term> {
        match self {
            ArgTransform::SwapFirstTwo => {
                if args.len() >= 2 {
                    args.swap(0, 1);
                }
                args
            }
            ArgTransform::Prepend(literal) => {
                args.insert(0, Term::Literal(Literal::from(*literal)));
                args
            }
            ArgTransform::Replace(literal) => vec![Term::Literal(Literal::from(*literal))],
        }
    }
}

/// Function mapping entry
#[derive(Clone)]
pub struct FunctionMapping {
    /// MariaDB spelling, also the default
    pub sql_name: &'static str,
    pub postgres: Option<(&'static str, Option<ArgTransform>)>,
    pub sqlite: Option<(&'static str, Option<ArgTransform>)>,
    /// Calls that never take arguments
    pub drops_args: bool,
}

impl FunctionMapping {
    fn plain(sql_name: &'static str) -> Self {
        FunctionMapping {
            sql_name,
            postgres: None,
            sqlite: None,
            drops_args: false,
        }
    }

    fn resolve(&self, dialect: Dialect, args: Vec<Term>) -> (&'static str, Vec<Term>) {
        let args = if self.drops_args { Vec::new() } else { args };
        let dialect_entry = match dialect {
            Dialect::MariaDb => None,
            Dialect::Postgres => self.postgres,
            Dialect::Sqlite => self.sqlite,
        };
        match dialect_entry {
            Some((name, Some(transform))) => (name, transform.apply(args)),
            Some((name, None)) => (name, args),
            None => (self.sql_name, args),
        }
    }
}

lazy_static! {
    static ref FUNCTION_MAPPINGS: HashMap<&'static str, FunctionMapping> = {
        let mut m = HashMap::new();

        // ===== AGGREGATES =====
        for (name, sql_name) in [
            ("count", "COUNT"),
            ("sum", "SUM"),
            ("avg", "AVG"),
            ("max", "MAX"),
            ("min", "MIN"),
        ] {
            m.insert(name, FunctionMapping::plain(sql_name));
        }

        // ===== SCALAR =====
        for (name, sql_name) in [
            ("abs", "ABS"),
            ("coalesce", "COALESCE"),
            ("concat", "CONCAT"),
            ("lower", "LOWER"),
            ("upper", "UPPER"),
            ("length", "LENGTH"),
            ("date", "DATE"),
        ] {
            m.insert(name, FunctionMapping::plain(sql_name));
        }

        m.insert("ifnull", FunctionMapping {
            postgres: Some(("COALESCE", None)),
            ..FunctionMapping::plain("IFNULL")
        });

        // locate(substr, str) -> strpos(str, substr)
        m.insert("locate", FunctionMapping {
            postgres: Some(("STRPOS", Some(ArgTransform::SwapFirstTwo))),
            sqlite: Some(("INSTR", Some(ArgTransform::SwapFirstTwo))),
            ..FunctionMapping::plain("LOCATE")
        });

        // ===== DATETIME =====
        m.insert("now", FunctionMapping {
            sqlite: Some(("DATETIME", Some(ArgTransform::Replace("now")))),
            drops_args: true,
            ..FunctionMapping::plain("NOW")
        });

        m.insert("timestamp", FunctionMapping {
            sqlite: Some(("DATETIME", None)),
            ..FunctionMapping::plain("TIMESTAMP")
        });

        // date_format(date, fmt) -> strftime(fmt, date)
        m.insert("date_format", FunctionMapping {
            postgres: Some(("TO_CHAR", None)),
            sqlite: Some(("STRFTIME", Some(ArgTransform::SwapFirstTwo))),
            ..FunctionMapping::plain("DATE_FORMAT")
        });

        m.insert("year", FunctionMapping {
            postgres: Some(("DATE_PART", Some(ArgTransform::Prepend("year")))),
            sqlite: Some(("STRFTIME", Some(ArgTransform::Prepend("%Y")))),
            ..FunctionMapping::plain("YEAR")
        });

        m.insert("month", FunctionMapping {
            postgres: Some(("DATE_PART", Some(ArgTransform::Prepend("month")))),
            sqlite: Some(("STRFTIME", Some(ArgTransform::Prepend("%m")))),
            ..FunctionMapping::plain("MONTH")
        });

        m.insert("day", FunctionMapping {
            postgres: Some(("DATE_PART", Some(ArgTransform::Prepend("day")))),
            sqlite: Some(("STRFTIME", Some(ArgTransform::Prepend("%d")))),
            ..FunctionMapping::plain("DAY")
        });

        m.insert("dayofyear", FunctionMapping {
            postgres: Some(("DATE_PART", Some(ArgTransform::Prepend("doy")))),
            sqlite: Some(("STRFTIME", Some(ArgTransform::Prepend("%j")))),
            ..FunctionMapping::plain("DAYOFYEAR")
        });

        // EXTRACT(<part> FROM <expr>) is rendered by the AST itself
        m.insert("extract", FunctionMapping::plain("EXTRACT"));

        m
    };

    static ref RECOGNIZED_CALL: Regex = {
        let mut names: Vec<&str> = FUNCTION_MAPPINGS.keys().copied().collect();
        names.sort_unstable();
        Regex::new(&format!(r"(?i)\b(?:{})\(", names.join("|"))).unwrap()
    };
}

/// Get function mapping for a function name
pub fn get_function_mapping(name: &str) -> Option<&'static FunctionMapping> {
    FUNCTION_MAPPINGS.get(name.to_ascii_lowercase().as_str())
}

pub fn is_recognized(name: &str) -> bool {
    get_function_mapping(name).is_some()
}

/// Whether a recognized call such as `count(` appears anywhere in the text
pub fn has_function(field: &str) -> bool {
    RECOGNIZED_CALL.is_match(field)
}

/// Build a call for the dialect. Unrecognized names are kept verbatim.
pub fn build_call(name: &str, args: Vec<Term>, dialect: Dialect) -> FunctionCall {
    match get_function_mapping(name) {
        Some(mapping) => {
            let (sql_name, args) = mapping.resolve(dialect, args);
            FunctionCall::new(sql_name, args)
        }
        None => FunctionCall::new(name, args),
    }
}
