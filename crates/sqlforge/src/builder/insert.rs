//! INSERT builder.

use std::sync::Arc;

use serde::Serialize;

use crate::ast::{Ast, ColumnRef, InsertAst, Operand};
use crate::builder::Mode;
use crate::error::{ForgeError, ForgeResult};
use crate::grammar::{DialectRef, Grammar, Operation};
use crate::raw::RawSql;
use crate::value::Value;

/// One row of named values.
pub trait IntoInsertRow {
    fn into_insert_row(self) -> Vec<(String, Operand)>;
}

impl<S, V> IntoInsertRow for Vec<(S, V)>
where
    S: Into<String>,
    V: Into<Operand>,
{
    fn into_insert_row(self) -> Vec<(String, Operand)> {
        self.into_iter().map(|(c, v)| (c.into(), v.into())).collect()
    }
}

impl<S, V, const N: usize> IntoInsertRow for [(S, V); N]
where
    S: Into<String>,
    V: Into<Operand>,
{
    fn into_insert_row(self) -> Vec<(String, Operand)> {
        self.into_iter().map(|(c, v)| (c.into(), v.into())).collect()
    }
}

/// Fluent INSERT builder.
///
/// The column list is fixed by an explicit [`columns`](Insert::columns) call
/// or derived from the first row; later rows fill missing columns with NULL
/// and reject unknown ones.
///
/// # Example
/// ```ignore
/// let op = insert("users")
///     .value([("name", "alice"), ("city", "berlin")])
///     .returning(["id"])
///     .to_operation()?;
/// ```
#[derive(Debug, Clone)]
pub struct Insert {
    ast: Arc<Ast>,
    mode: Mode,
    grammar: Grammar,
    build_error: Option<ForgeError>,
}

impl Default for Insert {
    fn default() -> Self {
        Self::new()
    }
}

impl Insert {
    pub fn new() -> Self {
        Self::with_grammar(Grammar::new())
    }

    pub fn with_dialect(dialect: DialectRef) -> Self {
        Self::with_grammar(Grammar::with_dialect(dialect))
    }

    pub(crate) fn with_grammar(grammar: Grammar) -> Self {
        Self {
            ast: Arc::new(Ast::Insert(InsertAst::default())),
            mode: Mode::default(),
            grammar,
            build_error: None,
        }
    }

    fn chain(mut self, patch: impl FnOnce(&mut InsertAst)) -> Self {
        let mut next = match &*self.ast {
            Ast::Insert(insert) => insert.clone(),
            _ => InsertAst::default(),
        };
        patch(&mut next);
        self.ast = Arc::new(Ast::Insert(next));
        if self.mode == Mode::Immutable {
            self.grammar = self.grammar.new_instance();
        }
        self
    }

    fn fail(mut self, err: ForgeError) -> Self {
        self.build_error.get_or_insert(err);
        self
    }

    /// Set the target table. A blank name is a silent no-op.
    pub fn into_table(self, table: impl Into<String>) -> Self {
        let table = table.into();
        if table.trim().is_empty() {
            return self;
        }
        self.chain(|ast| ast.table = Some(table))
    }

    /// Fix the column list explicitly instead of deriving it from the first
    /// row.
    pub fn columns<I, S>(self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        self.chain(|ast| ast.columns = columns)
    }

    /// Append one row of named values.
    pub fn value(self, row: impl IntoInsertRow) -> Self {
        self.push_row(row.into_insert_row())
    }

    /// Append several rows of named values.
    pub fn values<R>(mut self, rows: impl IntoIterator<Item = R>) -> Self
    where
        R: IntoInsertRow,
    {
        for row in rows {
            self = self.push_row(row.into_insert_row());
        }
        self
    }

    fn push_row(mut self, mut row: Vec<(String, Operand)>) -> Self {
        let derived: Vec<String> = {
            let Ast::Insert(insert) = &*self.ast else {
                return self;
            };
            if insert.columns.is_empty() && insert.rows.is_empty() {
                row.iter().map(|(c, _)| c.clone()).collect()
            } else {
                insert.columns.clone()
            }
        };
        let mut ordered = Vec::with_capacity(derived.len());
        for column in &derived {
            match row.iter().position(|(c, _)| c == column) {
                Some(i) => ordered.push(row.remove(i).1),
                // A row may omit columns other rows set.
                None => ordered.push(Operand::Value(Value::Null)),
            }
        }
        if let Some((unknown, _)) = row.first() {
            return self.fail(ForgeError::invalid_argument(format!(
                "unknown insert column: {unknown}"
            )));
        }
        self = self.chain(|ast| {
            ast.columns = derived;
            ast.rows.push(ordered);
        });
        self
    }

    /// Set one column of a single-row insert. Cannot mix with multi-row
    /// [`values`](Insert::values).
    pub fn set(self, column: impl Into<String>, value: impl Into<Operand>) -> Self {
        let column = column.into();
        let value = value.into();
        {
            let Ast::Insert(insert) = &*self.ast else {
                return self;
            };
            if insert.rows.len() > 1 {
                return self.fail(ForgeError::invalid_argument(
                    "set() applies to a single-row insert",
                ));
            }
        }
        self.chain(|ast| {
            ast.columns.push(column);
            if let Some(row) = ast.rows.first_mut() {
                row.push(value);
            } else {
                ast.rows.push(vec![value]);
            }
        })
    }

    /// Set one column to a raw SQL expression.
    pub fn set_raw(self, column: impl Into<String>, raw: RawSql) -> Self {
        self.set(column, Operand::Raw(raw))
    }

    /// Set one column to a serialized JSON document. A serialization failure
    /// is recorded like any other argument error.
    pub fn set_json<T: Serialize>(self, column: impl Into<String>, value: &T) -> Self {
        match serde_json::to_value(value) {
            Ok(json) => self.set(column, Value::Json(json)),
            Err(err) => self.fail(ForgeError::invalid_argument(format!(
                "json serialization failed: {err}"
            ))),
        }
    }

    pub fn returning<I, C>(self, columns: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<ColumnRef>,
    {
        let columns: Vec<ColumnRef> = columns.into_iter().map(Into::into).collect();
        self.chain(|ast| ast.returning.extend(columns))
    }

    pub fn ast(&self) -> &Arc<Ast> {
        &self.ast
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn to_immutable(mut self) -> Self {
        self.mode = Mode::Immutable;
        self.grammar = self.grammar.new_instance();
        self
    }

    pub fn to_mutable(mut self) -> Self {
        self.mode = Mode::Mutable;
        self.grammar = self.grammar.new_instance();
        self
    }

    pub fn grammar(&self) -> &Grammar {
        &self.grammar
    }

    pub fn to_operation(&mut self) -> ForgeResult<Operation> {
        if let Some(err) = &self.build_error {
            return Err(err.clone());
        }
        self.grammar.to_operation(&self.ast)
    }

    pub fn to_sql(&mut self) -> ForgeResult<String> {
        Ok(self.to_operation()?.sql)
    }
}
