//! SQL dialect extension points.
//!
//! Everything structural (traversal order, node dispatch, the operator
//! whitelist, memoization) lives in [`Grammar`](super::Grammar) and is shared.
//! A dialect only decides identifier quoting, placeholder syntax, and how
//! literal values are escaped for the debug `sql` string.

use std::fmt::Write as _;
use std::sync::Arc;

use crate::value::Value;

/// Shared dialect handle; builders and grammars clone it freely.
pub type DialectRef = Arc<dyn Dialect + Send + Sync>;

/// Per-dialect rendering hooks. Defaults implement the generic (ANSI-ish)
/// dialect: bare identifiers, `?` placeholders, single-quoted literals.
pub trait Dialect: std::fmt::Debug {
    /// Dialect name, for logs.
    fn name(&self) -> &'static str;

    /// Quote a single dot-separated identifier segment. The grammar splits
    /// `schema.table.column` and passes `*` through without calling this.
    fn quote_segment(&self, segment: &str, out: &mut String) {
        out.push_str(segment);
    }

    /// Placeholder for the 1-based binding position `n`.
    fn placeholder(&self, n: usize) -> String {
        let _ = n;
        "?".to_string()
    }

    /// Escape one string literal into `out`, including surrounding quotes.
    fn escape_text(&self, s: &str, out: &mut String) {
        out.push('\'');
        for ch in s.chars() {
            if ch == '\'' {
                out.push('\'');
            }
            out.push(ch);
        }
        out.push('\'');
    }

    /// Render a value as an inline literal for the debug string.
    ///
    /// Never execute the result; the `query` + bindings form is the only
    /// executable output.
    fn escape_value(&self, value: &Value, out: &mut String) {
        match value {
            Value::Null => out.push_str("NULL"),
            Value::Bool(true) => out.push_str("TRUE"),
            Value::Bool(false) => out.push_str("FALSE"),
            Value::Int(n) => {
                let _ = write!(out, "{n}");
            }
            Value::Float(f) => {
                let _ = write!(out, "{f}");
            }
            Value::Text(s) => self.escape_text(s, out),
            Value::Date(d) => {
                let _ = write!(out, "'{}'", d.format("%Y-%m-%d"));
            }
            Value::Timestamp(ts) => {
                let _ = write!(out, "'{}'", ts.format("%Y-%m-%d %H:%M:%S"));
            }
            Value::Uuid(u) => {
                let _ = write!(out, "'{u}'");
            }
            Value::Json(j) => self.escape_text(&j.to_string(), out),
        }
    }
}

/// Generic dialect: bare identifiers, `?` placeholders.
#[derive(Debug, Clone, Copy, Default)]
pub struct Generic;

impl Dialect for Generic {
    fn name(&self) -> &'static str {
        "generic"
    }
}

/// PostgreSQL: double-quoted identifiers, `$n` placeholders.
#[derive(Debug, Clone, Copy, Default)]
pub struct Postgres;

impl Dialect for Postgres {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn quote_segment(&self, segment: &str, out: &mut String) {
        out.push('"');
        for ch in segment.chars() {
            if ch == '"' {
                out.push('"');
            }
            out.push(ch);
        }
        out.push('"');
    }

    fn placeholder(&self, n: usize) -> String {
        format!("${n}")
    }
}

/// MySQL: backtick identifiers, `?` placeholders, backslash escapes.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySql;

impl Dialect for MySql {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn quote_segment(&self, segment: &str, out: &mut String) {
        out.push('`');
        for ch in segment.chars() {
            if ch == '`' {
                out.push('`');
            }
            out.push(ch);
        }
        out.push('`');
    }

    fn escape_text(&self, s: &str, out: &mut String) {
        out.push('\'');
        for ch in s.chars() {
            match ch {
                '\'' => out.push_str("''"),
                '\\' => out.push_str("\\\\"),
                _ => out.push(ch),
            }
        }
        out.push('\'');
    }
}

/// SQLite: double-quoted identifiers, `?` placeholders.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sqlite;

impl Dialect for Sqlite {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn quote_segment(&self, segment: &str, out: &mut String) {
        out.push('"');
        for ch in segment.chars() {
            if ch == '"' {
                out.push('"');
            }
            out.push(ch);
        }
        out.push('"');
    }
}

/// SQL Server: bracketed identifiers, `?` placeholders.
#[derive(Debug, Clone, Copy, Default)]
pub struct Mssql;

impl Dialect for Mssql {
    fn name(&self) -> &'static str {
        "mssql"
    }

    fn quote_segment(&self, segment: &str, out: &mut String) {
        out.push('[');
        for ch in segment.chars() {
            if ch == ']' {
                out.push(']');
            }
            out.push(ch);
        }
        out.push(']');
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quoted(d: &dyn Dialect, s: &str) -> String {
        let mut out = String::new();
        d.quote_segment(s, &mut out);
        out
    }

    #[test]
    fn generic_leaves_identifiers_bare() {
        assert_eq!(quoted(&Generic, "users"), "users");
        assert_eq!(Generic.placeholder(3), "?");
    }

    #[test]
    fn postgres_quoting_and_placeholders() {
        assert_eq!(quoted(&Postgres, "users"), "\"users\"");
        assert_eq!(quoted(&Postgres, "we\"ird"), "\"we\"\"ird\"");
        assert_eq!(Postgres.placeholder(2), "$2");
    }

    #[test]
    fn mysql_backticks_and_backslash_escape() {
        assert_eq!(quoted(&MySql, "users"), "`users`");
        let mut out = String::new();
        MySql.escape_value(&Value::Text("a\\'b".into()), &mut out);
        assert_eq!(out, "'a\\\\''b'");
    }

    #[test]
    fn mssql_brackets() {
        assert_eq!(quoted(&Mssql, "users"), "[users]");
        assert_eq!(quoted(&Mssql, "a]b"), "[a]]b]");
    }

    #[test]
    fn text_escaping_doubles_quotes() {
        let mut out = String::new();
        Generic.escape_value(&Value::Text("o'clock".into()), &mut out);
        assert_eq!(out, "'o''clock'");
    }
}
