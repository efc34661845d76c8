use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Storage dialect: identifier quoting, comment syntax and function names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    MariaDb,
    Postgres,
    Sqlite,
}

impl Dialect {
    pub fn quote_char(&self) -> char {
        match self {
            Dialect::MariaDb | Dialect::Sqlite => '`',
            Dialect::Postgres => '"',
        }
    }

    /// Quote an identifier, doubling any embedded quote character
    pub fn quote_identifier(&self, name: &str) -> String {
        let q = self.quote_char();
        let escaped = name.replace(q, &format!("{q}{q}"));
        format!("{q}{escaped}{q}")
    }

    /// Render a string literal
    pub fn quote_string(&self, value: &str) -> String {
        let escaped = match self {
            // MariaDB treats backslash as an escape inside string literals
            Dialect::MariaDb => value.replace('\\', "\\\\").replace('\'', "''"),
            Dialect::Postgres | Dialect::Sqlite => value.replace('\'', "''"),
        };
        format!("'{escaped}'")
    }

    pub fn supports_row_locking(&self) -> bool {
        !matches!(self, Dialect::Sqlite)
    }

    /// `#` starts a line comment only on MariaDB
    pub fn has_hash_comments(&self) -> bool {
        matches!(self, Dialect::MariaDb)
    }

    pub fn regex_operator(&self) -> &'static str {
        match self {
            Dialect::MariaDb | Dialect::Sqlite => "REGEXP",
            Dialect::Postgres => "~",
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Dialect::MariaDb => "mariadb",
            Dialect::Postgres => "postgres",
            Dialect::Sqlite => "sqlite",
        };
        f.write_str(name)
    }
}

impl FromStr for Dialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mariadb" | "mysql" => Ok(Dialect::MariaDb),
            "postgres" | "postgresql" => Ok(Dialect::Postgres),
            "sqlite" => Ok(Dialect::Sqlite),
            other => Err(format!("unknown dialect '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_identifier() {
        assert_eq!(Dialect::MariaDb.quote_identifier("tabNote Seen By"), "`tabNote Seen By`");
        assert_eq!(Dialect::Postgres.quote_identifier("name"), "\"name\"");
        assert_eq!(Dialect::MariaDb.quote_identifier("a`b"), "`a``b`");
    }

    #[test]
    fn test_quote_string() {
        assert_eq!(Dialect::Postgres.quote_string("o'brien"), "'o''brien'");
        assert_eq!(Dialect::MariaDb.quote_string("a\\'b"), "'a\\\\''b'");
    }

    #[test]
    fn test_parse() {
        assert_eq!("MySQL".parse::<Dialect>().unwrap(), Dialect::MariaDb);
        assert_eq!("postgresql".parse::<Dialect>().unwrap(), Dialect::Postgres);
        assert!("oracle".parse::<Dialect>().is_err());
    }
}
