//! SELECT builder.

use std::sync::Arc;

use crate::ast::{
    Ast, ClauseKind, ColumnRef, Combine, DatePart, InSet, JoinKind, JoinNode, Lock, Operand,
    OrderDir, OrderNode, SelectAst, SubQuery, UnionNode,
};
use crate::builder::conditions::{ConditionBuilder, IntoConditionArg, OnBuilder};
use crate::builder::Mode;
use crate::error::{ForgeError, ForgeResult};
use crate::grammar::{DialectRef, Grammar, Operation};
use crate::raw::RawSql;
use crate::value::Value;

/// Fluent SELECT builder.
///
/// # Example
/// ```ignore
/// let op = from("users")
///     .columns(["id", "name"])
///     .where_(("active", true))
///     .order_by_desc("created_at")
///     .limit(10)
///     .to_operation()?;
/// ```
#[derive(Debug, Clone)]
pub struct Select {
    ast: Arc<Ast>,
    mode: Mode,
    grammar: Grammar,
    build_error: Option<ForgeError>,
}

impl Default for Select {
    fn default() -> Self {
        Self::new()
    }
}

impl Select {
    /// A fresh builder for the generic dialect.
    pub fn new() -> Self {
        Self::with_grammar(Grammar::new())
    }

    /// A fresh builder for the given dialect.
    pub fn with_dialect(dialect: DialectRef) -> Self {
        Self::with_grammar(Grammar::with_dialect(dialect))
    }

    pub(crate) fn with_grammar(grammar: Grammar) -> Self {
        Self {
            ast: Arc::new(Ast::Select(SelectAst::default())),
            mode: Mode::default(),
            grammar,
            build_error: None,
        }
    }

    /// Clone-patch-rewrap: earlier handles to the AST stay valid.
    fn chain(mut self, patch: impl FnOnce(&mut SelectAst)) -> Self {
        let mut next = match &*self.ast {
            Ast::Select(select) => select.clone(),
            _ => SelectAst::default(),
        };
        patch(&mut next);
        self.ast = Arc::new(Ast::Select(next));
        if self.mode == Mode::Immutable {
            self.grammar = self.grammar.new_instance();
        }
        self
    }

    /// Record the first argument error; later calls keep chaining.
    fn fail(mut self, err: ForgeError) -> Self {
        self.build_error.get_or_insert(err);
        self
    }

    fn absorb_conditions(mut self, builder: ConditionBuilder, kind: ClauseKind) -> Self {
        let (nodes, error) = builder.into_parts();
        if let Some(err) = error {
            self = self.fail(err);
        }
        if nodes.is_empty() {
            return self;
        }
        self.chain(|ast| match kind {
            ClauseKind::Having => ast.havings.extend(nodes),
            _ => ast.wheres.extend(nodes),
        })
    }

    fn push_where(self, arg: impl IntoConditionArg, combine: Combine, negated: bool) -> Self {
        let mut cb = ConditionBuilder::new(ClauseKind::Where);
        cb.push(arg.into_condition_arg(), combine, negated);
        self.absorb_conditions(cb, ClauseKind::Where)
    }

    fn push_having(self, arg: impl IntoConditionArg, combine: Combine, negated: bool) -> Self {
        let mut cb = ConditionBuilder::new(ClauseKind::Having);
        cb.push(arg.into_condition_arg(), combine, negated);
        self.absorb_conditions(cb, ClauseKind::Having)
    }

    // ==================== projection ====================

    /// Append columns to the projection. An empty projection renders `*`.
    pub fn columns<I, C>(self, columns: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<ColumnRef>,
    {
        let columns: Vec<ColumnRef> = columns.into_iter().map(Into::into).collect();
        self.chain(|ast| ast.columns.extend(columns))
    }

    /// Append one column to the projection.
    pub fn column(self, column: impl Into<ColumnRef>) -> Self {
        let column = column.into();
        self.chain(|ast| ast.columns.push(column))
    }

    pub fn distinct(self) -> Self {
        self.chain(|ast| ast.distinct = true)
    }

    /// Set the FROM target. A blank name is a silent no-op so optional table
    /// plumbing can pass empty strings through.
    pub fn from(self, table: impl Into<ColumnRef>) -> Self {
        let table = table.into();
        if table.is_blank() {
            return self;
        }
        self.chain(|ast| ast.from = Some(table))
    }

    /// Alias emitted when this builder is used as a sub-query.
    pub fn alias(self, alias: impl Into<String>) -> Self {
        let alias = alias.into();
        self.chain(|ast| ast.alias = Some(alias))
    }

    // ==================== joins ====================

    pub fn join(self, table: impl Into<ColumnRef>, on: impl FnOnce(&mut OnBuilder)) -> Self {
        self.join_with(JoinKind::Inner, table, on)
    }

    pub fn left_join(self, table: impl Into<ColumnRef>, on: impl FnOnce(&mut OnBuilder)) -> Self {
        self.join_with(JoinKind::Left, table, on)
    }

    pub fn right_join(self, table: impl Into<ColumnRef>, on: impl FnOnce(&mut OnBuilder)) -> Self {
        self.join_with(JoinKind::Right, table, on)
    }

    pub fn full_join(self, table: impl Into<ColumnRef>, on: impl FnOnce(&mut OnBuilder)) -> Self {
        self.join_with(JoinKind::Full, table, on)
    }

    pub fn cross_join(self, table: impl Into<ColumnRef>) -> Self {
        self.join_with(JoinKind::Cross, table, |_| {})
    }

    fn join_with(
        mut self,
        kind: JoinKind,
        table: impl Into<ColumnRef>,
        on: impl FnOnce(&mut OnBuilder),
    ) -> Self {
        let table = table.into();
        if table.is_blank() {
            return self;
        }
        let mut ob = OnBuilder::new();
        on(&mut ob);
        let (on, error) = ob.into_parts();
        if let Some(err) = error {
            self = self.fail(err);
        }
        self.chain(|ast| ast.joins.push(JoinNode { kind, table, on }))
    }

    // ==================== WHERE ====================

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

    pub fn or_where_not(self, arg: impl IntoConditionArg) -> Self {
        self.push_where(arg, Combine::Or, true)
    }

    pub fn where_in(self, column: impl Into<ColumnRef>, set: impl Into<InSet>) -> Self {
        let mut cb = ConditionBuilder::new(ClauseKind::Where);
        cb.push_in(column.into(), set.into(), Combine::And, false);
        self.absorb_conditions(cb, ClauseKind::Where)
    }

    pub fn where_not_in(self, column: impl Into<ColumnRef>, set: impl Into<InSet>) -> Self {
        let mut cb = ConditionBuilder::new(ClauseKind::Where);
        cb.push_in(column.into(), set.into(), Combine::And, true);
        self.absorb_conditions(cb, ClauseKind::Where)
    }

    pub fn or_where_in(self, column: impl Into<ColumnRef>, set: impl Into<InSet>) -> Self {
        let mut cb = ConditionBuilder::new(ClauseKind::Where);
        cb.push_in(column.into(), set.into(), Combine::Or, false);
        self.absorb_conditions(cb, ClauseKind::Where)
    }

    pub fn or_where_not_in(self, column: impl Into<ColumnRef>, set: impl Into<InSet>) -> Self {
        let mut cb = ConditionBuilder::new(ClauseKind::Where);
        cb.push_in(column.into(), set.into(), Combine::Or, true);
        self.absorb_conditions(cb, ClauseKind::Where)
    }

    pub fn where_null(self, column: impl Into<ColumnRef>) -> Self {
        let mut cb = ConditionBuilder::new(ClauseKind::Where);
        cb.push_null(column.into(), Combine::And, false);
        self.absorb_conditions(cb, ClauseKind::Where)
    }

    pub fn where_not_null(self, column: impl Into<ColumnRef>) -> Self {
        let mut cb = ConditionBuilder::new(ClauseKind::Where);
        cb.push_null(column.into(), Combine::And, true);
        self.absorb_conditions(cb, ClauseKind::Where)
    }

    pub fn or_where_null(self, column: impl Into<ColumnRef>) -> Self {
        let mut cb = ConditionBuilder::new(ClauseKind::Where);
        cb.push_null(column.into(), Combine::Or, false);
        self.absorb_conditions(cb, ClauseKind::Where)
    }

    pub fn or_where_not_null(self, column: impl Into<ColumnRef>) -> Self {
        let mut cb = ConditionBuilder::new(ClauseKind::Where);
        cb.push_null(column.into(), Combine::Or, true);
        self.absorb_conditions(cb, ClauseKind::Where)
    }

    pub fn where_between(
        self,
        column: impl Into<ColumnRef>,
        first: impl Into<Value>,
        second: impl Into<Value>,
    ) -> Self {
        let mut cb = ConditionBuilder::new(ClauseKind::Where);
        cb.push_between(column.into(), first.into(), second.into(), Combine::And, false);
        self.absorb_conditions(cb, ClauseKind::Where)
    }

    pub fn where_not_between(
        self,
        column: impl Into<ColumnRef>,
        first: impl Into<Value>,
        second: impl Into<Value>,
    ) -> Self {
        let mut cb = ConditionBuilder::new(ClauseKind::Where);
        cb.push_between(column.into(), first.into(), second.into(), Combine::And, true);
        self.absorb_conditions(cb, ClauseKind::Where)
    }

    pub fn or_where_between(
        self,
        column: impl Into<ColumnRef>,
        first: impl Into<Value>,
        second: impl Into<Value>,
    ) -> Self {
        let mut cb = ConditionBuilder::new(ClauseKind::Where);
        cb.push_between(column.into(), first.into(), second.into(), Combine::Or, false);
        self.absorb_conditions(cb, ClauseKind::Where)
    }

    pub fn where_exists(self, query: impl Into<SubQuery>) -> Self {
        let mut cb = ConditionBuilder::new(ClauseKind::Where);
        cb.push_exists(query.into(), Combine::And, false);
        self.absorb_conditions(cb, ClauseKind::Where)
    }

    pub fn where_not_exists(self, query: impl Into<SubQuery>) -> Self {
        let mut cb = ConditionBuilder::new(ClauseKind::Where);
        cb.push_exists(query.into(), Combine::And, true);
        self.absorb_conditions(cb, ClauseKind::Where)
    }

    pub fn or_where_exists(self, query: impl Into<SubQuery>) -> Self {
        let mut cb = ConditionBuilder::new(ClauseKind::Where);
        cb.push_exists(query.into(), Combine::Or, false);
        self.absorb_conditions(cb, ClauseKind::Where)
    }

    pub fn where_raw(self, raw: RawSql) -> Self {
        let mut cb = ConditionBuilder::new(ClauseKind::Where);
        cb.and_where_raw(raw);
        self.absorb_conditions(cb, ClauseKind::Where)
    }

    pub fn or_where_raw(self, raw: RawSql) -> Self {
        let mut cb = ConditionBuilder::new(ClauseKind::Where);
        cb.or_where_raw(raw);
        self.absorb_conditions(cb, ClauseKind::Where)
    }

    /// Parenthesized WHERE group. An empty group is elided entirely.
    pub fn where_group(self, f: impl FnOnce(&mut ConditionBuilder)) -> Self {
        let mut cb = ConditionBuilder::new(ClauseKind::Where);
        cb.push_group(f, Combine::And, false);
        self.absorb_conditions(cb, ClauseKind::Where)
    }

    pub fn or_where_group(self, f: impl FnOnce(&mut ConditionBuilder)) -> Self {
        let mut cb = ConditionBuilder::new(ClauseKind::Where);
        cb.push_group(f, Combine::Or, false);
        self.absorb_conditions(cb, ClauseKind::Where)
    }

    pub fn where_date(
        self,
        part: DatePart,
        column: impl Into<ColumnRef>,
        operator: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        let mut cb = ConditionBuilder::new(ClauseKind::Where);
        cb.push_date(part, column.into(), operator.into(), value.into(), Combine::And);
        self.absorb_conditions(cb, ClauseKind::Where)
    }

    pub fn where_year(
        self,
        column: impl Into<ColumnRef>,
        operator: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        self.where_date(DatePart::Year, column, operator, value)
    }

    pub fn where_month(
        self,
        column: impl Into<ColumnRef>,
        operator: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        self.where_date(DatePart::Month, column, operator, value)
    }

    pub fn where_day(
        self,
        column: impl Into<ColumnRef>,
        operator: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        self.where_date(DatePart::Day, column, operator, value)
    }

    // ==================== grouping and HAVING ====================

    pub fn group_by<I, C>(self, columns: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<ColumnRef>,
    {
        let columns: Vec<ColumnRef> = columns.into_iter().map(Into::into).collect();
        self.chain(|ast| ast.groups.extend(columns))
    }

    pub fn having(self, arg: impl IntoConditionArg) -> Self {
        self.push_having(arg, Combine::And, false)
    }

    pub fn or_having(self, arg: impl IntoConditionArg) -> Self {
        self.push_having(arg, Combine::Or, false)
    }

    pub fn having_raw(self, raw: RawSql) -> Self {
        let mut cb = ConditionBuilder::new(ClauseKind::Having);
        cb.and_where_raw(raw);
        self.absorb_conditions(cb, ClauseKind::Having)
    }

    pub fn having_group(self, f: impl FnOnce(&mut ConditionBuilder)) -> Self {
        let mut cb = ConditionBuilder::new(ClauseKind::Having);
        cb.push_group(f, Combine::And, false);
        self.absorb_conditions(cb, ClauseKind::Having)
    }

    // ==================== ordering and paging ====================

    pub fn order_by(self, column: impl Into<ColumnRef>, dir: OrderDir) -> Self {
        let column = column.into();
        self.chain(|ast| ast.orders.push(OrderNode { column, dir }))
    }

    pub fn order_by_asc(self, column: impl Into<ColumnRef>) -> Self {
        self.order_by(column, OrderDir::Asc)
    }

    pub fn order_by_desc(self, column: impl Into<ColumnRef>) -> Self {
        self.order_by(column, OrderDir::Desc)
    }

    pub fn limit(self, limit: u64) -> Self {
        self.chain(|ast| ast.limit = Some(limit))
    }

    pub fn offset(self, offset: u64) -> Self {
        self.chain(|ast| ast.offset = Some(offset))
    }

    /// LIMIT/OFFSET from a 1-based page number. Page 0 is treated as page 1.
    pub fn paginate(self, page: u64, per_page: u64) -> Self {
        let page = page.max(1);
        self.chain(|ast| {
            ast.limit = Some(per_page);
            ast.offset = Some((page - 1) * per_page);
        })
    }

    // ==================== set operations and locks ====================

    pub fn union(self, query: impl Into<SubQuery>) -> Self {
        let query = query.into();
        self.chain(|ast| ast.unions.push(UnionNode { query, all: false }))
    }

    pub fn union_all(self, query: impl Into<SubQuery>) -> Self {
        let query = query.into();
        self.chain(|ast| ast.unions.push(UnionNode { query, all: true }))
    }

    pub fn for_update(self) -> Self {
        self.chain(|ast| ast.lock = Some(Lock::ForUpdate))
    }

    pub fn for_share(self) -> Self {
        self.chain(|ast| ast.lock = Some(Lock::ForShare))
    }

    // ==================== output ====================

    /// The current AST handle.
    pub fn ast(&self) -> &Arc<Ast> {
        &self.ast
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Switch to immutable chaining. Mode copies never share a compiler.
    pub fn to_immutable(mut self) -> Self {
        self.mode = Mode::Immutable;
        self.grammar = self.grammar.new_instance();
        self
    }

    /// Switch back to mutable chaining.
    pub fn to_mutable(mut self) -> Self {
        self.mode = Mode::Mutable;
        self.grammar = self.grammar.new_instance();
        self
    }

    /// The compiler attached to this builder.
    pub fn grammar(&self) -> &Grammar {
        &self.grammar
    }

    /// Compile the current AST. A recorded argument error surfaces here,
    /// before any SQL is rendered.
    pub fn to_operation(&mut self) -> ForgeResult<Operation> {
        if let Some(err) = &self.build_error {
            return Err(err.clone());
        }
        self.grammar.to_operation(&self.ast)
    }

    /// Compile and return the debug rendering with inlined literals.
    pub fn to_sql(&mut self) -> ForgeResult<String> {
        Ok(self.to_operation()?.sql)
    }
}

impl From<Select> for SubQuery {
    fn from(select: Select) -> Self {
        SubQuery {
            ast: select.ast,
            error: select.build_error,
        }
    }
}

impl From<Select> for Operand {
    fn from(select: Select) -> Self {
        Operand::SubQuery(select.into())
    }
}

impl From<Select> for ColumnRef {
    fn from(select: Select) -> Self {
        ColumnRef::SubQuery(select.into())
    }
}

impl From<Select> for InSet {
    fn from(select: Select) -> Self {
        InSet::SubQuery(select.into())
    }
}
