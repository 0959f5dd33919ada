//! Condition normalization.
//!
//! Every WHERE/HAVING/ON entry point funnels through [`ConditionBuilder`],
//! which resolves the accepted argument shapes into [`ConditionNode`]s at the
//! API boundary. The compiler downstream never re-interprets shapes: by the
//! time a node exists its meaning is fixed.
//!
//! Normalization rules:
//! - a bare bool/number becomes a constant truth guard (`1 = 0` / `1 = 1`)
//! - a `(column, value)` pair implies `=`; a NULL value redirects to IS NULL
//!   and a value list redirects to IN
//! - a `(column, operator, value)` triple with an `in`/`between`/`not in`/
//!   `not between` operator redirects to the dedicated node, with the
//!   operator's own negation XOR-folded into the caller's
//! - in ON clauses the right-hand side names a column, not a binding

use std::sync::LazyLock;

use regex::Regex;

use crate::ast::{
    ClauseKind, ColumnRef, Combine, ConditionNode, DatePart, InSet, Operand, SubQuery,
};
use crate::error::ForgeError;
use crate::raw::RawSql;
use crate::value::Value;

/// Matches `in` / `not in` / `between` / `not between` operator spellings,
/// any case, tolerant of surrounding whitespace.
static IN_BETWEEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*(not\s+)?(in|between)\s*$").expect("operator pattern"));

// ==================== argument shapes ====================

/// A resolved condition argument.
///
/// Callers rarely build this directly; the [`IntoConditionArg`] impls cover
/// the accepted shapes and [`group`] wraps a closure for nested groups.
pub enum ConditionArg {
    /// Constant truth guard.
    Truth(bool),
    /// Numeric truth guard; zero is false, anything else true.
    Number(i64),
    /// Opaque raw condition.
    Raw(RawSql),
    /// Several implied-equality pairs, AND-combined inside one group.
    Pairs(Vec<(String, Operand)>),
    /// `(column, value)` with implied `=`.
    Binary(ColumnRef, Operand),
    /// `(column, operator, value)`.
    Ternary(ColumnRef, String, Operand),
    /// Nested group built by a closure.
    Group(Box<dyn FnOnce(&mut ConditionBuilder)>),
}

/// Conversion into a condition argument. One impl per accepted call shape.
pub trait IntoConditionArg {
    fn into_condition_arg(self) -> ConditionArg;
}

impl IntoConditionArg for ConditionArg {
    fn into_condition_arg(self) -> ConditionArg {
        self
    }
}

impl IntoConditionArg for bool {
    fn into_condition_arg(self) -> ConditionArg {
        ConditionArg::Truth(self)
    }
}

impl IntoConditionArg for i32 {
    fn into_condition_arg(self) -> ConditionArg {
        ConditionArg::Number(self as i64)
    }
}

impl IntoConditionArg for i64 {
    fn into_condition_arg(self) -> ConditionArg {
        ConditionArg::Number(self)
    }
}

impl IntoConditionArg for RawSql {
    fn into_condition_arg(self) -> ConditionArg {
        ConditionArg::Raw(self)
    }
}

impl<S, V> IntoConditionArg for Vec<(S, V)>
where
    S: Into<String>,
    V: Into<Operand>,
{
    fn into_condition_arg(self) -> ConditionArg {
        ConditionArg::Pairs(
            self.into_iter()
                .map(|(c, v)| (c.into(), v.into()))
                .collect(),
        )
    }
}

impl<S, V, const N: usize> IntoConditionArg for [(S, V); N]
where
    S: Into<String>,
    V: Into<Operand>,
{
    fn into_condition_arg(self) -> ConditionArg {
        ConditionArg::Pairs(
            self.into_iter()
                .map(|(c, v)| (c.into(), v.into()))
                .collect(),
        )
    }
}

impl<C, V> IntoConditionArg for (C, V)
where
    C: Into<ColumnRef>,
    V: Into<Operand>,
{
    fn into_condition_arg(self) -> ConditionArg {
        ConditionArg::Binary(self.0.into(), self.1.into())
    }
}

impl<C, M, V> IntoConditionArg for (C, M, V)
where
    C: Into<ColumnRef>,
    M: Into<String>,
    V: Into<Operand>,
{
    fn into_condition_arg(self) -> ConditionArg {
        ConditionArg::Ternary(self.0.into(), self.1.into(), self.2.into())
    }
}

/// Wrap a closure as a nested condition group.
///
/// # Example
/// ```ignore
/// from("users").where_(("role", "admin")).or_where(group(|g| {
///     g.and_where(("age", ">", 40)).and_where(("city", "berlin"));
/// }));
/// ```
pub fn group<F>(f: F) -> ConditionArg
where
    F: FnOnce(&mut ConditionBuilder) + 'static,
{
    ConditionArg::Group(Box::new(f))
}

// ==================== condition builder ====================

/// Accumulates normalized condition nodes for one clause.
#[derive(Debug)]
pub struct ConditionBuilder {
    kind: ClauseKind,
    nodes: Vec<ConditionNode>,
    error: Option<ForgeError>,
}

impl ConditionBuilder {
    pub(crate) fn new(kind: ClauseKind) -> Self {
        Self {
            kind,
            nodes: Vec::new(),
            error: None,
        }
    }

    /// The accumulated nodes plus the first recorded argument error.
    pub(crate) fn into_parts(self) -> (Vec<ConditionNode>, Option<ForgeError>) {
        (self.nodes, self.error)
    }

    fn record_error(&mut self, err: ForgeError) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }

    /// Normalize one argument into a node and append it.
    pub(crate) fn push(&mut self, arg: ConditionArg, combine: Combine, negated: bool) {
        match arg {
            ConditionArg::Truth(b) => self.push_truth(b, combine, negated),
            ConditionArg::Number(n) => self.push_truth(n != 0, combine, negated),
            ConditionArg::Raw(raw) => {
                if negated {
                    self.nodes.push(ConditionNode::Sub {
                        nodes: vec![ConditionNode::Raw {
                            raw,
                            combine: Combine::And,
                        }],
                        negated: true,
                        combine,
                    });
                } else {
                    self.nodes.push(ConditionNode::Raw { raw, combine });
                }
            }
            ConditionArg::Pairs(pairs) => {
                let mut inner = ConditionBuilder::new(self.kind);
                for (column, value) in pairs {
                    inner.push_binary(column.into(), value, Combine::And, false);
                }
                let (nodes, error) = inner.into_parts();
                if let Some(err) = error {
                    self.record_error(err);
                }
                if !nodes.is_empty() {
                    self.nodes.push(ConditionNode::Sub {
                        nodes,
                        negated,
                        combine,
                    });
                }
            }
            ConditionArg::Binary(column, value) => {
                self.push_binary(column, value, combine, negated)
            }
            ConditionArg::Ternary(column, operator, value) => {
                self.push_ternary(column, operator, value, combine, negated)
            }
            ConditionArg::Group(f) => self.push_group(f, combine, negated),
        }
    }

    /// Append a nested group built by `f`. An empty group is elided.
    pub(crate) fn push_group<F>(&mut self, f: F, combine: Combine, negated: bool)
    where
        F: FnOnce(&mut ConditionBuilder),
    {
        let mut inner = ConditionBuilder::new(self.kind);
        f(&mut inner);
        let (nodes, error) = inner.into_parts();
        if let Some(err) = error {
            self.record_error(err);
        }
        if !nodes.is_empty() {
            self.nodes.push(ConditionNode::Sub {
                nodes,
                negated,
                combine,
            });
        }
    }

    fn push_truth(&mut self, truthy: bool, combine: Combine, negated: bool) {
        // `where(false)` and `where_not(true)` both pin the clause false.
        let value = i64::from(truthy != negated);
        self.nodes.push(ConditionNode::Expr {
            column: ColumnRef::Numeric(1),
            operator: "=".to_string(),
            value: Operand::Value(Value::Int(value)),
            negated: false,
            combine,
        });
    }

    fn check_column(&mut self, column: &ColumnRef) -> bool {
        if column.is_blank() {
            self.record_error(ForgeError::invalid_argument(
                "condition column must not be empty",
            ));
            false
        } else {
            true
        }
    }

    fn push_binary(&mut self, column: ColumnRef, value: Operand, combine: Combine, negated: bool) {
        if !self.check_column(&column) {
            return;
        }
        match value {
            // Implied equality against NULL means a null test, never `= NULL`.
            Operand::Value(Value::Null) => self.nodes.push(ConditionNode::Null {
                column,
                negated,
                combine,
            }),
            Operand::Values(values) => self.nodes.push(ConditionNode::In {
                column,
                set: InSet::Values(values),
                negated,
                combine,
            }),
            value if self.kind == ClauseKind::On => {
                self.push_column_pair(column, "=".to_string(), value, combine, negated)
            }
            value => self.nodes.push(ConditionNode::Expr {
                column,
                operator: "=".to_string(),
                value,
                negated,
                combine,
            }),
        }
    }

    fn push_ternary(
        &mut self,
        column: ColumnRef,
        operator: String,
        value: Operand,
        combine: Combine,
        negated: bool,
    ) {
        if !self.check_column(&column) {
            return;
        }
        if let Some(caps) = IN_BETWEEN_RE.captures(&operator) {
            // `where_not(.., "not in", ..)` folds both negations away.
            let negated = negated != caps.get(1).is_some();
            let keyword = caps[2].to_ascii_lowercase();
            if keyword == "in" {
                let set = match value {
                    Operand::Value(v) => InSet::Values(vec![v]),
                    Operand::Values(vs) => InSet::Values(vs),
                    Operand::Raw(raw) => InSet::Raw(raw),
                    Operand::SubQuery(sub) => InSet::SubQuery(sub),
                };
                self.nodes.push(ConditionNode::In {
                    column,
                    set,
                    negated,
                    combine,
                });
            } else {
                match value {
                    Operand::Values(mut vs) if vs.len() == 2 => {
                        let second = vs.pop().unwrap_or(Value::Null);
                        let first = vs.pop().unwrap_or(Value::Null);
                        self.nodes.push(ConditionNode::Between {
                            column,
                            first,
                            second,
                            negated,
                            combine,
                        });
                    }
                    other => self.record_error(ForgeError::invalid_argument(format!(
                        "between expects exactly two values, got {}",
                        other.shape_name()
                    ))),
                }
            }
            return;
        }

        let op = operator.trim().to_ascii_lowercase();
        if let Operand::Value(Value::Null) = value {
            // Explicit equality/`is` against NULL also becomes a null test.
            match op.as_str() {
                "=" | "is" => {
                    self.nodes.push(ConditionNode::Null {
                        column,
                        negated,
                        combine,
                    });
                    return;
                }
                "!=" | "<>" | "is not" => {
                    self.nodes.push(ConditionNode::Null {
                        column,
                        negated: !negated,
                        combine,
                    });
                    return;
                }
                _ => {}
            }
        }

        if self.kind == ClauseKind::On {
            self.push_column_pair(column, operator, value, combine, negated);
        } else {
            self.nodes.push(ConditionNode::Expr {
                column,
                operator,
                value,
                negated,
                combine,
            });
        }
    }

    /// ON-clause right-hand sides name columns; reinterpret the operand.
    fn push_column_pair(
        &mut self,
        column: ColumnRef,
        operator: String,
        value: Operand,
        combine: Combine,
        negated: bool,
    ) {
        let right = match value {
            Operand::Value(Value::Text(s)) => ColumnRef::parse(&s),
            Operand::Value(Value::Int(n)) => ColumnRef::Numeric(n),
            Operand::Raw(raw) => ColumnRef::Raw(raw),
            Operand::SubQuery(sub) => ColumnRef::SubQuery(sub),
            other => {
                self.record_error(ForgeError::invalid_argument(format!(
                    "join condition expects a column name on the right, got {}",
                    other.shape_name()
                )));
                return;
            }
        };
        if right.is_blank() {
            self.record_error(ForgeError::invalid_argument(
                "join condition column must not be empty",
            ));
            return;
        }
        self.nodes.push(ConditionNode::Column {
            column,
            operator,
            right,
            negated,
            combine,
        });
    }

    // ==================== public entry points ====================
    //
    // These mirror the builder-level methods so the same vocabulary works
    // inside group closures.

    pub fn and_where(&mut self, arg: impl IntoConditionArg) -> &mut Self {
        self.push(arg.into_condition_arg(), Combine::And, false);
        self
    }

    pub fn or_where(&mut self, arg: impl IntoConditionArg) -> &mut Self {
        self.push(arg.into_condition_arg(), Combine::Or, false);
        self
    }

    pub fn and_where_not(&mut self, arg: impl IntoConditionArg) -> &mut Self {
        self.push(arg.into_condition_arg(), Combine::And, true);
        self
    }

    pub fn or_where_not(&mut self, arg: impl IntoConditionArg) -> &mut Self {
        self.push(arg.into_condition_arg(), Combine::Or, true);
        self
    }

    pub fn and_where_in(
        &mut self,
        column: impl Into<ColumnRef>,
        set: impl Into<InSet>,
    ) -> &mut Self {
        self.push_in(column.into(), set.into(), Combine::And, false);
        self
    }

    pub fn and_where_not_in(
        &mut self,
        column: impl Into<ColumnRef>,
        set: impl Into<InSet>,
    ) -> &mut Self {
        self.push_in(column.into(), set.into(), Combine::And, true);
        self
    }

    pub fn or_where_in(
        &mut self,
        column: impl Into<ColumnRef>,
        set: impl Into<InSet>,
    ) -> &mut Self {
        self.push_in(column.into(), set.into(), Combine::Or, false);
        self
    }

    pub fn or_where_not_in(
        &mut self,
        column: impl Into<ColumnRef>,
        set: impl Into<InSet>,
    ) -> &mut Self {
        self.push_in(column.into(), set.into(), Combine::Or, true);
        self
    }

    pub fn and_where_null(&mut self, column: impl Into<ColumnRef>) -> &mut Self {
        self.push_null(column.into(), Combine::And, false);
        self
    }

    pub fn and_where_not_null(&mut self, column: impl Into<ColumnRef>) -> &mut Self {
        self.push_null(column.into(), Combine::And, true);
        self
    }

    pub fn or_where_null(&mut self, column: impl Into<ColumnRef>) -> &mut Self {
        self.push_null(column.into(), Combine::Or, false);
        self
    }

    pub fn or_where_not_null(&mut self, column: impl Into<ColumnRef>) -> &mut Self {
        self.push_null(column.into(), Combine::Or, true);
        self
    }

    pub fn and_where_between(
        &mut self,
        column: impl Into<ColumnRef>,
        first: impl Into<Value>,
        second: impl Into<Value>,
    ) -> &mut Self {
        self.push_between(column.into(), first.into(), second.into(), Combine::And, false);
        self
    }

    pub fn and_where_not_between(
        &mut self,
        column: impl Into<ColumnRef>,
        first: impl Into<Value>,
        second: impl Into<Value>,
    ) -> &mut Self {
        self.push_between(column.into(), first.into(), second.into(), Combine::And, true);
        self
    }

    pub fn or_where_between(
        &mut self,
        column: impl Into<ColumnRef>,
        first: impl Into<Value>,
        second: impl Into<Value>,
    ) -> &mut Self {
        self.push_between(column.into(), first.into(), second.into(), Combine::Or, false);
        self
    }

    pub fn and_where_exists(&mut self, query: impl Into<SubQuery>) -> &mut Self {
        self.push_exists(query.into(), Combine::And, false);
        self
    }

    pub fn and_where_not_exists(&mut self, query: impl Into<SubQuery>) -> &mut Self {
        self.push_exists(query.into(), Combine::And, true);
        self
    }

    pub fn or_where_exists(&mut self, query: impl Into<SubQuery>) -> &mut Self {
        self.push_exists(query.into(), Combine::Or, false);
        self
    }

    pub fn and_where_raw(&mut self, raw: RawSql) -> &mut Self {
        self.nodes.push(ConditionNode::Raw {
            raw,
            combine: Combine::And,
        });
        self
    }

    pub fn or_where_raw(&mut self, raw: RawSql) -> &mut Self {
        self.nodes.push(ConditionNode::Raw {
            raw,
            combine: Combine::Or,
        });
        self
    }

    pub fn and_where_date(
        &mut self,
        part: DatePart,
        column: impl Into<ColumnRef>,
        operator: impl Into<String>,
        value: impl Into<Value>,
    ) -> &mut Self {
        self.push_date(part, column.into(), operator.into(), value.into(), Combine::And);
        self
    }

    pub(crate) fn push_in(
        &mut self,
        column: ColumnRef,
        set: InSet,
        combine: Combine,
        negated: bool,
    ) {
        if !self.check_column(&column) {
            return;
        }
        self.nodes.push(ConditionNode::In {
            column,
            set,
            negated,
            combine,
        });
    }

    pub(crate) fn push_null(&mut self, column: ColumnRef, combine: Combine, negated: bool) {
        if !self.check_column(&column) {
            return;
        }
        self.nodes.push(ConditionNode::Null {
            column,
            negated,
            combine,
        });
    }

    pub(crate) fn push_between(
        &mut self,
        column: ColumnRef,
        first: Value,
        second: Value,
        combine: Combine,
        negated: bool,
    ) {
        if !self.check_column(&column) {
            return;
        }
        self.nodes.push(ConditionNode::Between {
            column,
            first,
            second,
            negated,
            combine,
        });
    }

    pub(crate) fn push_exists(&mut self, query: SubQuery, combine: Combine, negated: bool) {
        self.nodes.push(ConditionNode::Exists {
            query,
            negated,
            combine,
        });
    }

    pub(crate) fn push_date(
        &mut self,
        part: DatePart,
        column: ColumnRef,
        operator: String,
        value: Value,
        combine: Combine,
    ) {
        if !self.check_column(&column) {
            return;
        }
        self.nodes.push(ConditionNode::Date {
            part,
            column,
            operator,
            value,
            negated: false,
            combine,
        });
    }
}

// ==================== join ON builder ====================

/// Builder for the ON clause of a join. Same normalization engine, column
/// comparison semantics.
#[derive(Debug)]
pub struct OnBuilder {
    inner: ConditionBuilder,
}

impl OnBuilder {
    pub(crate) fn new() -> Self {
        Self {
            inner: ConditionBuilder::new(ClauseKind::On),
        }
    }

    pub(crate) fn into_parts(self) -> (Vec<ConditionNode>, Option<ForgeError>) {
        self.inner.into_parts()
    }

    pub fn on(&mut self, arg: impl IntoConditionArg) -> &mut Self {
        self.inner.push(arg.into_condition_arg(), Combine::And, false);
        self
    }

    pub fn and_on(&mut self, arg: impl IntoConditionArg) -> &mut Self {
        self.on(arg)
    }

    pub fn or_on(&mut self, arg: impl IntoConditionArg) -> &mut Self {
        self.inner.push(arg.into_condition_arg(), Combine::Or, false);
        self
    }

    pub fn on_not(&mut self, arg: impl IntoConditionArg) -> &mut Self {
        self.inner.push(arg.into_condition_arg(), Combine::And, true);
        self
    }

    pub fn or_on_not(&mut self, arg: impl IntoConditionArg) -> &mut Self {
        self.inner.push(arg.into_condition_arg(), Combine::Or, true);
        self
    }

    pub fn on_in(&mut self, column: impl Into<ColumnRef>, set: impl Into<InSet>) -> &mut Self {
        self.inner.push_in(column.into(), set.into(), Combine::And, false);
        self
    }

    pub fn on_null(&mut self, column: impl Into<ColumnRef>) -> &mut Self {
        self.inner.push_null(column.into(), Combine::And, false);
        self
    }

    pub fn on_not_null(&mut self, column: impl Into<ColumnRef>) -> &mut Self {
        self.inner.push_null(column.into(), Combine::And, true);
        self
    }

    pub fn on_raw(&mut self, raw: RawSql) -> &mut Self {
        self.inner.and_where_raw(raw);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn build(f: impl FnOnce(&mut ConditionBuilder)) -> (Vec<ConditionNode>, Option<ForgeError>) {
        let mut cb = ConditionBuilder::new(ClauseKind::Where);
        f(&mut cb);
        cb.into_parts()
    }

    #[test]
    fn pair_implies_equality() {
        let (nodes, err) = build(|cb| {
            cb.and_where(("id", 1));
        });
        assert_eq!(err, None);
        assert_eq!(
            nodes,
            vec![ConditionNode::Expr {
                column: ColumnRef::Name("id".into()),
                operator: "=".into(),
                value: Operand::Value(Value::Int(1)),
                negated: false,
                combine: Combine::And,
            }]
        );
    }

    #[test]
    fn null_value_redirects_to_null_test() {
        let (nodes, _) = build(|cb| {
            cb.and_where(("deleted_at", Value::Null));
        });
        assert_eq!(
            nodes,
            vec![ConditionNode::Null {
                column: ColumnRef::Name("deleted_at".into()),
                negated: false,
                combine: Combine::And,
            }]
        );
    }

    #[test]
    fn list_value_redirects_to_in() {
        let (nodes, _) = build(|cb| {
            cb.and_where(("id", vec![1, 2, 3]));
        });
        match &nodes[0] {
            ConditionNode::In { set, negated, .. } => {
                assert_eq!(
                    set,
                    &InSet::Values(vec![Value::Int(1), Value::Int(2), Value::Int(3)])
                );
                assert!(!negated);
            }
            other => panic!("expected In node, got {other:?}"),
        }
    }

    #[test]
    fn not_in_operator_xors_with_caller_negation() {
        // where_not + "not in" cancels out to a plain IN.
        let (nodes, _) = build(|cb| {
            cb.and_where_not(("id", "not in", vec![1, 2]));
        });
        match &nodes[0] {
            ConditionNode::In { negated, .. } => assert!(!negated),
            other => panic!("expected In node, got {other:?}"),
        }
    }

    #[test]
    fn between_requires_two_values() {
        let (nodes, err) = build(|cb| {
            cb.and_where(("age", "between", vec![1, 2, 3]));
        });
        assert!(nodes.is_empty());
        assert!(err.is_some_and(|e| e.is_invalid_argument()));
    }

    #[test]
    fn between_operator_any_case() {
        let (nodes, err) = build(|cb| {
            cb.and_where(("age", " Not Between ", vec![18, 65]));
        });
        assert_eq!(err, None);
        assert_eq!(
            nodes,
            vec![ConditionNode::Between {
                column: ColumnRef::Name("age".into()),
                first: Value::Int(18),
                second: Value::Int(65),
                negated: true,
                combine: Combine::And,
            }]
        );
    }

    #[test]
    fn bool_argument_is_truth_guard() {
        let (nodes, _) = build(|cb| {
            cb.and_where(false);
        });
        assert_eq!(
            nodes,
            vec![ConditionNode::Expr {
                column: ColumnRef::Numeric(1),
                operator: "=".into(),
                value: Operand::Value(Value::Int(0)),
                negated: false,
                combine: Combine::And,
            }]
        );
    }

    #[test]
    fn empty_group_is_elided() {
        let (nodes, err) = build(|cb| {
            cb.and_where(group(|_| {}));
        });
        assert!(nodes.is_empty());
        assert_eq!(err, None);
    }

    #[test]
    fn pairs_nest_into_one_group() {
        let (nodes, _) = build(|cb| {
            cb.and_where(vec![("a", 1), ("b", 2)]);
        });
        match &nodes[0] {
            ConditionNode::Sub { nodes, negated, .. } => {
                assert_eq!(nodes.len(), 2);
                assert!(!negated);
            }
            other => panic!("expected Sub node, got {other:?}"),
        }
    }

    #[test]
    fn blank_column_records_error() {
        let (nodes, err) = build(|cb| {
            cb.and_where(("", 1));
        });
        assert!(nodes.is_empty());
        assert!(err.is_some_and(|e| e.is_invalid_argument()));
    }

    #[test]
    fn on_clause_compares_columns() {
        let mut ob = OnBuilder::new();
        ob.on(("users.id", "orders.user_id"));
        let (nodes, err) = ob.into_parts();
        assert_eq!(err, None);
        assert_eq!(
            nodes,
            vec![ConditionNode::Column {
                column: ColumnRef::Name("users.id".into()),
                operator: "=".into(),
                right: ColumnRef::Name("orders.user_id".into()),
                negated: false,
                combine: Combine::And,
            }]
        );
    }
}
