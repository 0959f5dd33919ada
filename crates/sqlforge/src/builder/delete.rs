//! DELETE builder.

use std::sync::Arc;

use crate::ast::{Ast, ClauseKind, ColumnRef, Combine, DeleteAst, InSet};
use crate::builder::Mode;
use crate::builder::conditions::{ConditionBuilder, IntoConditionArg};
use crate::error::{ForgeError, ForgeResult};
use crate::grammar::{DialectRef, Grammar, Operation};
use crate::raw::RawSql;

/// Fluent DELETE builder.
///
/// # Example
/// ```ignore
/// let op = delete("sessions").where_(("expired", true)).to_operation()?;
/// ```
#[derive(Debug, Clone)]
pub struct Delete {
    ast: Arc<Ast>,
    mode: Mode,
    grammar: Grammar,
    build_error: Option<ForgeError>,
}

impl Default for Delete {
    fn default() -> Self {
        Self::new()
    }
}

impl Delete {
    pub fn new() -> Self {
        Self::with_grammar(Grammar::new())
    }

    pub fn with_dialect(dialect: DialectRef) -> Self {
        Self::with_grammar(Grammar::with_dialect(dialect))
    }

    pub(crate) fn with_grammar(grammar: Grammar) -> Self {
        Self {
            ast: Arc::new(Ast::Delete(DeleteAst::default())),
            mode: Mode::default(),
            grammar,
            build_error: None,
        }
    }

    fn chain(mut self, patch: impl FnOnce(&mut DeleteAst)) -> Self {
        let mut next = match &*self.ast {
            Ast::Delete(delete) => delete.clone(),
            _ => DeleteAst::default(),
        };
        patch(&mut next);
        self.ast = Arc::new(Ast::Delete(next));
        if self.mode == Mode::Immutable {
            self.grammar = self.grammar.new_instance();
        }
        self
    }

    fn fail(mut self, err: ForgeError) -> Self {
        self.build_error.get_or_insert(err);
        self
    }

    fn absorb_wheres(mut self, builder: ConditionBuilder) -> Self {
        let (nodes, error) = builder.into_parts();
        if let Some(err) = error {
            self = self.fail(err);
        }
        if nodes.is_empty() {
            return self;
        }
        self.chain(|ast| ast.wheres.extend(nodes))
    }

    fn push_where(self, arg: impl IntoConditionArg, combine: Combine, negated: bool) -> Self {
        let mut cb = ConditionBuilder::new(ClauseKind::Where);
        cb.push(arg.into_condition_arg(), combine, negated);
        self.absorb_wheres(cb)
    }

    /// Set the target table. A blank name is a silent no-op.
    pub fn from(self, table: impl Into<String>) -> Self {
        let table = table.into();
        if table.trim().is_empty() {
            return self;
        }
        self.chain(|ast| ast.from = Some(table))
    }

    pub fn where_(self, arg: impl IntoConditionArg) -> Self {
        self.push_where(arg, Combine::And, false)
    }

    pub fn and_where(self, arg: impl IntoConditionArg) -> Self {
        self.push_where(arg, Combine::And, false)
    }

    pub fn or_where(self, arg: impl IntoConditionArg) -> Self {
        self.push_where(arg, Combine::Or, false)
    }

    pub fn where_not(self, arg: impl IntoConditionArg) -> Self {
        self.push_where(arg, Combine::And, true)
    }

    pub fn where_in(self, column: impl Into<ColumnRef>, set: impl Into<InSet>) -> Self {
        let mut cb = ConditionBuilder::new(ClauseKind::Where);
        cb.push_in(column.into(), set.into(), Combine::And, false);
        self.absorb_wheres(cb)
    }

    pub fn where_not_in(self, column: impl Into<ColumnRef>, set: impl Into<InSet>) -> Self {
        let mut cb = ConditionBuilder::new(ClauseKind::Where);
        cb.push_in(column.into(), set.into(), Combine::And, true);
        self.absorb_wheres(cb)
    }

    pub fn where_null(self, column: impl Into<ColumnRef>) -> Self {
        let mut cb = ConditionBuilder::new(ClauseKind::Where);
        cb.push_null(column.into(), Combine::And, false);
        self.absorb_wheres(cb)
    }

    pub fn where_not_null(self, column: impl Into<ColumnRef>) -> Self {
        let mut cb = ConditionBuilder::new(ClauseKind::Where);
        cb.push_null(column.into(), Combine::And, true);
        self.absorb_wheres(cb)
    }

    pub fn where_raw(self, raw: RawSql) -> Self {
        let mut cb = ConditionBuilder::new(ClauseKind::Where);
        cb.and_where_raw(raw);
        self.absorb_wheres(cb)
    }

    pub fn where_group(self, f: impl FnOnce(&mut ConditionBuilder)) -> Self {
        let mut cb = ConditionBuilder::new(ClauseKind::Where);
        cb.push_group(f, Combine::And, false);
        self.absorb_wheres(cb)
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
