//! AST compilation.
//!
//! [`Grammar`] walks an operation AST and emits SQL twice from one pass: a
//! fragment list interleaved with bound values. Zipping fragments with
//! dialect placeholders yields the executable `query`; zipping with escaped
//! literals yields the debug `sql`. Binding order is the traversal order, so
//! the two renderings always agree.
//!
//! Compilation is memoized by AST handle identity: recompiling the same
//! `Arc<Ast>` returns the cached [`Operation`] without a second walk.

mod dialect;

use std::sync::Arc;

use crate::ast::{
    Ast, ColumnRef, Combine, ConditionNode, DeleteAst, InSet, InsertAst, JoinKind, Operand,
    SelectAst, SubQuery, TruncateAst, UpdateAst,
};
use crate::error::{ForgeError, ForgeResult};
use crate::raw::RawSql;
use crate::value::Value;

pub use dialect::{Dialect, DialectRef, Generic, Mssql, MySql, Postgres, Sqlite};

/// Infix operators the compiler will splice into SQL text.
///
/// Operators are rendered unescaped, so anything outside this list is a hard
/// [`ForgeError::InvalidOperator`] instead of a silent pass-through.
const OPERATORS: &[&str] = &[
    "=", "<", ">", "<=", ">=", "<>", "!=", "like", "not like", "ilike", "not ilike", "is",
    "is not", "in", "not in", "between", "not between", "@>", "<@", "&&", "~", "~*", "!~", "!~*",
    "->", "->>", "#>", "#>>",
];

/// One compiled operation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Operation {
    /// Debug rendering with values inlined as escaped literals. Never execute
    /// this form.
    pub sql: String,
    /// Executable rendering with dialect placeholders.
    pub query: String,
    /// Bound values, in placeholder order.
    pub values: Vec<Value>,
    /// Text fragments between consecutive bindings; `values.len() + 1`
    /// entries for any non-empty operation.
    pub fragments: Vec<String>,
}

/// The AST-to-SQL compiler for one dialect.
#[derive(Debug, Clone)]
pub struct Grammar {
    dialect: DialectRef,
    fragments: Vec<String>,
    current: String,
    values: Vec<Value>,
    cache: Option<(Arc<Ast>, Operation)>,
    compiles: usize,
}

impl Default for Grammar {
    fn default() -> Self {
        Self::new()
    }
}

impl Grammar {
    /// A grammar for the generic dialect.
    pub fn new() -> Self {
        Self::with_dialect(Arc::new(Generic))
    }

    /// A grammar for the given dialect.
    pub fn with_dialect(dialect: DialectRef) -> Self {
        Self {
            dialect,
            fragments: Vec::new(),
            current: String::new(),
            values: Vec::new(),
            cache: None,
            compiles: 0,
        }
    }

    /// A fresh grammar with the same dialect and no state. Sub-queries
    /// compile through one of these so their fragments can be spliced into
    /// the outer stream.
    pub fn new_instance(&self) -> Self {
        Self::with_dialect(Arc::clone(&self.dialect))
    }

    /// The dialect this grammar renders for.
    pub fn dialect(&self) -> &DialectRef {
        &self.dialect
    }

    /// Number of full compilation walks performed. Cache hits do not count.
    pub fn compile_count(&self) -> usize {
        self.compiles
    }

    /// Compile an AST handle into an [`Operation`].
    ///
    /// Recompiling the identical handle returns the memoized result; any
    /// chained builder call produces a new handle and invalidates the cache
    /// naturally.
    pub fn to_operation(&mut self, ast: &Arc<Ast>) -> ForgeResult<Operation> {
        if let Some((cached, op)) = &self.cache {
            if Arc::ptr_eq(cached, ast) {
                tracing::trace!(kind = ast.kind(), "compile cache hit");
                return Ok(op.clone());
            }
        }
        if ast.is_unset() {
            return Ok(Operation::default());
        }

        self.fragments.clear();
        self.current.clear();
        self.values.clear();
        self.compiles += 1;

        match &**ast {
            Ast::Select(select) => self.build_select(select)?,
            Ast::Insert(insert) => self.build_insert(insert)?,
            Ast::Update(update) => self.build_update(update)?,
            Ast::Delete(delete) => self.build_delete(delete)?,
            Ast::Truncate(truncate) => self.build_truncate(truncate)?,
        }

        self.fragments.push(std::mem::take(&mut self.current));
        let fragments = std::mem::take(&mut self.fragments);
        let values = std::mem::take(&mut self.values);

        let mut query = String::new();
        let mut sql = String::new();
        for (i, fragment) in fragments.iter().enumerate() {
            query.push_str(fragment);
            sql.push_str(fragment);
            if i < values.len() {
                query.push_str(&self.dialect.placeholder(i + 1));
                self.dialect.escape_value(&values[i], &mut sql);
            }
        }

        let op = Operation {
            sql,
            query,
            values,
            fragments,
        };
        tracing::debug!(
            kind = ast.kind(),
            dialect = self.dialect.name(),
            bindings = op.values.len(),
            "compiled operation"
        );
        self.cache = Some((Arc::clone(ast), op.clone()));
        Ok(op)
    }

    // ==================== output stream ====================

    fn push_sql(&mut self, s: &str) {
        self.current.push_str(s);
    }

    /// End the current fragment and record a bound value in its place.
    fn push_binding(&mut self, value: Value) {
        self.fragments.push(std::mem::take(&mut self.current));
        self.values.push(value);
    }

    /// Interleave a compiled sub-operation into the current stream. Binding
    /// positions renumber at final assembly, so nested placeholders stay
    /// globally ordered.
    fn splice(&mut self, op: Operation) {
        let mut fragments = op.fragments.into_iter();
        if let Some(first) = fragments.next() {
            self.push_sql(&first);
        }
        for (value, fragment) in op.values.into_iter().zip(fragments) {
            self.push_binding(value);
            self.push_sql(&fragment);
        }
    }

    fn splice_raw(&mut self, raw: &RawSql) {
        self.push_sql(&raw.fragments[0]);
        for (value, fragment) in raw.bindings.iter().zip(&raw.fragments[1..]) {
            self.push_binding(value.clone());
            self.push_sql(fragment);
        }
    }

    // ==================== identifiers and slots ====================

    /// Quote a possibly dotted identifier. `*` segments pass through.
    fn push_ident(&mut self, ident: &str) {
        let mut out = String::new();
        for (i, segment) in ident.split('.').enumerate() {
            if i > 0 {
                out.push('.');
            }
            if segment == "*" {
                out.push('*');
            } else {
                self.dialect.quote_segment(segment, &mut out);
            }
        }
        self.current.push_str(&out);
    }

    fn push_column(&mut self, column: &ColumnRef) -> ForgeResult<()> {
        match column {
            ColumnRef::Name(name) => self.push_ident(name),
            ColumnRef::Aliased { ident, alias } => {
                self.push_ident(ident);
                self.push_sql(" AS ");
                self.push_ident(alias);
            }
            ColumnRef::Numeric(n) => self.push_sql(&n.to_string()),
            ColumnRef::Raw(raw) => self.splice_raw(raw),
            ColumnRef::SubQuery(sub) => self.push_subquery(sub, true, true)?,
        }
        Ok(())
    }

    fn push_operand(&mut self, operand: &Operand) -> ForgeResult<()> {
        match operand {
            Operand::Value(v) => self.push_binding(v.clone()),
            Operand::Values(vs) => {
                self.push_sql("(");
                for (i, v) in vs.iter().enumerate() {
                    if i > 0 {
                        self.push_sql(", ");
                    }
                    self.push_binding(v.clone());
                }
                self.push_sql(")");
            }
            Operand::Raw(raw) => self.splice_raw(raw),
            Operand::SubQuery(sub) => self.push_subquery(sub, true, false)?,
        }
        Ok(())
    }

    /// Compile a nested operation through a fresh grammar and splice it in.
    /// `aliased` positions (column list, FROM) also emit `AS alias` when the
    /// nested SELECT carries one; predicate positions never do.
    fn push_subquery(&mut self, sub: &SubQuery, parens: bool, aliased: bool) -> ForgeResult<()> {
        if let Some(err) = &sub.error {
            return Err(err.clone());
        }
        let op = self.new_instance().to_operation(sub.ast())?;
        if parens {
            self.push_sql("(");
        }
        self.splice(op);
        if parens {
            self.push_sql(")");
        }
        if aliased {
            if let Ast::Select(select) = &**sub.ast() {
                if let Some(alias) = &select.alias {
                    self.push_sql(" AS ");
                    self.push_ident(alias);
                }
            }
        }
        Ok(())
    }

    fn validated_operator<'a>(&self, operator: &'a str) -> ForgeResult<&'a str> {
        let trimmed = operator.trim();
        if OPERATORS.contains(&trimmed.to_ascii_lowercase().as_str()) {
            Ok(trimmed)
        } else {
            Err(ForgeError::InvalidOperator(operator.to_string()))
        }
    }

    // ==================== conditions ====================

    fn build_condition_list(&mut self, nodes: &[ConditionNode]) -> ForgeResult<()> {
        let mut first = true;
        for node in nodes {
            // An empty group renders as nothing, so it must not claim a
            // combine keyword either.
            if let ConditionNode::Sub { nodes, .. } = node {
                if nodes.is_empty() {
                    continue;
                }
            }
            if !first {
                self.push_sql(match node.combine() {
                    Combine::And => " AND ",
                    Combine::Or => " OR ",
                });
            }
            first = false;
            self.build_condition(node)?;
        }
        Ok(())
    }

    fn build_condition(&mut self, node: &ConditionNode) -> ForgeResult<()> {
        match node {
            ConditionNode::Expr {
                column,
                operator,
                value,
                negated,
                ..
            } => {
                if *negated {
                    self.push_sql("NOT ");
                }
                let op = self.validated_operator(operator)?.to_string();
                self.push_column(column)?;
                self.push_sql(" ");
                self.push_sql(&op);
                self.push_sql(" ");
                self.push_operand(value)?;
            }
            ConditionNode::Column {
                column,
                operator,
                right,
                negated,
                ..
            } => {
                if *negated {
                    self.push_sql("NOT ");
                }
                let op = self.validated_operator(operator)?.to_string();
                self.push_column(column)?;
                self.push_sql(" ");
                self.push_sql(&op);
                self.push_sql(" ");
                self.push_column(right)?;
            }
            ConditionNode::In {
                column,
                set,
                negated,
                ..
            } => {
                if let InSet::SubQuery(sub) = set {
                    if let Some(err) = &sub.error {
                        return Err(err.clone());
                    }
                }
                let empty = match set {
                    InSet::Values(values) => values.is_empty(),
                    InSet::SubQuery(sub) => sub.ast().is_unset(),
                    InSet::Raw(_) => false,
                };
                if empty {
                    // `IN ()` is invalid SQL; an empty set can never match,
                    // so pin the truth value instead.
                    self.push_sql(if *negated { "1 = 1" } else { "1 = 0" });
                    return Ok(());
                }
                self.push_column(column)?;
                self.push_sql(if *negated { " NOT IN (" } else { " IN (" });
                match set {
                    InSet::Values(values) => {
                        for (i, v) in values.iter().enumerate() {
                            if i > 0 {
                                self.push_sql(", ");
                            }
                            self.push_binding(v.clone());
                        }
                    }
                    InSet::Raw(raw) => self.splice_raw(raw),
                    InSet::SubQuery(sub) => self.push_subquery(sub, false, false)?,
                }
                self.push_sql(")");
            }
            ConditionNode::Null {
                column, negated, ..
            } => {
                self.push_column(column)?;
                self.push_sql(if *negated { " IS NOT NULL" } else { " IS NULL" });
            }
            ConditionNode::Between {
                column,
                first,
                second,
                negated,
                ..
            } => {
                self.push_column(column)?;
                self.push_sql(if *negated { " NOT BETWEEN " } else { " BETWEEN " });
                self.push_binding(first.clone());
                self.push_sql(" AND ");
                self.push_binding(second.clone());
            }
            ConditionNode::Exists { query, negated, .. } => {
                if *negated {
                    self.push_sql("NOT ");
                }
                self.push_sql("EXISTS ");
                self.push_subquery(query, true, false)?;
            }
            ConditionNode::Sub { nodes, negated, .. } => {
                if *negated {
                    self.push_sql("NOT ");
                }
                self.push_sql("(");
                self.build_condition_list(nodes)?;
                self.push_sql(")");
            }
            ConditionNode::Date {
                part,
                column,
                operator,
                value,
                negated,
                ..
            } => {
                if *negated {
                    self.push_sql("NOT ");
                }
                let op = self.validated_operator(operator)?.to_string();
                self.push_sql("EXTRACT(");
                self.push_sql(part.keyword());
                self.push_sql(" FROM ");
                self.push_column(column)?;
                self.push_sql(") ");
                self.push_sql(&op);
                self.push_sql(" ");
                self.push_binding(value.clone());
            }
            ConditionNode::Raw { raw, .. } => self.splice_raw(raw),
        }
        Ok(())
    }

    // ==================== statements ====================

    fn build_select(&mut self, ast: &SelectAst) -> ForgeResult<()> {
        self.push_sql("SELECT ");
        if ast.distinct {
            self.push_sql("DISTINCT ");
        }
        if ast.columns.is_empty() {
            self.push_sql("*");
        } else {
            for (i, column) in ast.columns.iter().enumerate() {
                if i > 0 {
                    self.push_sql(", ");
                }
                self.push_column(column)?;
            }
        }
        if let Some(from) = &ast.from {
            self.push_sql(" FROM ");
            self.push_column(from)?;
        }
        for join in &ast.joins {
            self.push_sql(" ");
            self.push_sql(join.kind.keyword());
            self.push_sql(" ");
            self.push_column(&join.table)?;
            if join.kind != JoinKind::Cross && !join.on.is_empty() {
                self.push_sql(" ON ");
                self.build_condition_list(&join.on)?;
            }
        }
        if !ast.wheres.is_empty() {
            self.push_sql(" WHERE ");
            self.build_condition_list(&ast.wheres)?;
        }
        if !ast.groups.is_empty() {
            self.push_sql(" GROUP BY ");
            for (i, column) in ast.groups.iter().enumerate() {
                if i > 0 {
                    self.push_sql(", ");
                }
                self.push_column(column)?;
            }
        }
        if !ast.havings.is_empty() {
            self.push_sql(" HAVING ");
            self.build_condition_list(&ast.havings)?;
        }
        if !ast.orders.is_empty() {
            self.push_sql(" ORDER BY ");
            for (i, order) in ast.orders.iter().enumerate() {
                if i > 0 {
                    self.push_sql(", ");
                }
                self.push_column(&order.column)?;
                self.push_sql(" ");
                self.push_sql(order.dir.keyword());
            }
        }
        if let Some(limit) = ast.limit {
            self.push_sql(&format!(" LIMIT {limit}"));
        }
        if let Some(offset) = ast.offset {
            self.push_sql(&format!(" OFFSET {offset}"));
        }
        for union in &ast.unions {
            if let Some(err) = &union.query.error {
                return Err(err.clone());
            }
            self.push_sql(if union.all { " UNION ALL " } else { " UNION " });
            let op = self.new_instance().to_operation(union.query.ast())?;
            self.splice(op);
        }
        if let Some(lock) = ast.lock {
            self.push_sql(" ");
            self.push_sql(lock.keyword());
        }
        Ok(())
    }

    fn build_insert(&mut self, ast: &InsertAst) -> ForgeResult<()> {
        let Some(table) = &ast.table else {
            return Err(ForgeError::invalid_argument("insert requires a table"));
        };
        self.push_sql("INSERT INTO ");
        self.push_ident(table);
        if ast.rows.is_empty() {
            self.push_sql(" DEFAULT VALUES");
        } else {
            self.push_sql(" (");
            for (i, column) in ast.columns.iter().enumerate() {
                if i > 0 {
                    self.push_sql(", ");
                }
                self.push_ident(column);
            }
            self.push_sql(") VALUES ");
            for (i, row) in ast.rows.iter().enumerate() {
                if row.len() != ast.columns.len() {
                    return Err(ForgeError::invalid_argument(format!(
                        "insert row {} has {} values for {} columns",
                        i + 1,
                        row.len(),
                        ast.columns.len()
                    )));
                }
                if i > 0 {
                    self.push_sql(", ");
                }
                self.push_sql("(");
                for (j, operand) in row.iter().enumerate() {
                    if j > 0 {
                        self.push_sql(", ");
                    }
                    self.push_operand(operand)?;
                }
                self.push_sql(")");
            }
        }
        self.push_returning(&ast.returning)?;
        Ok(())
    }

    fn build_update(&mut self, ast: &UpdateAst) -> ForgeResult<()> {
        let Some(table) = &ast.table else {
            return Err(ForgeError::invalid_argument("update requires a table"));
        };
        if ast.sets.is_empty() {
            return Err(ForgeError::invalid_argument(
                "update requires at least one set column",
            ));
        }
        self.push_sql("UPDATE ");
        self.push_ident(table);
        self.push_sql(" SET ");
        for (i, (column, operand)) in ast.sets.iter().enumerate() {
            if i > 0 {
                self.push_sql(", ");
            }
            self.push_ident(column);
            self.push_sql(" = ");
            self.push_operand(operand)?;
        }
        if !ast.wheres.is_empty() {
            self.push_sql(" WHERE ");
            self.build_condition_list(&ast.wheres)?;
        }
        self.push_returning(&ast.returning)?;
        Ok(())
    }

    fn build_delete(&mut self, ast: &DeleteAst) -> ForgeResult<()> {
        let Some(from) = &ast.from else {
            return Err(ForgeError::invalid_argument("delete requires a table"));
        };
        self.push_sql("DELETE FROM ");
        self.push_ident(from);
        if !ast.wheres.is_empty() {
            self.push_sql(" WHERE ");
            self.build_condition_list(&ast.wheres)?;
        }
        self.push_returning(&ast.returning)?;
        Ok(())
    }

    fn build_truncate(&mut self, ast: &TruncateAst) -> ForgeResult<()> {
        let Some(table) = &ast.table else {
            return Err(ForgeError::invalid_argument("truncate requires a table"));
        };
        self.push_sql("TRUNCATE TABLE ");
        self.push_ident(table);
        Ok(())
    }

    fn push_returning(&mut self, returning: &[ColumnRef]) -> ForgeResult<()> {
        if returning.is_empty() {
            return Ok(());
        }
        self.push_sql(" RETURNING ");
        for (i, column) in returning.iter().enumerate() {
            if i > 0 {
                self.push_sql(", ");
            }
            self.push_column(column)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Combine, ConditionNode, Operand};
    use pretty_assertions::assert_eq;

    fn compile(ast: Ast) -> Operation {
        let arc = Arc::new(ast);
        Grammar::new().to_operation(&arc).unwrap()
    }

    fn simple_where(column: &str, value: i64) -> ConditionNode {
        ConditionNode::Expr {
            column: ColumnRef::Name(column.into()),
            operator: "=".into(),
            value: Operand::Value(Value::Int(value)),
            negated: false,
            combine: Combine::And,
        }
    }

    #[test]
    fn select_star_when_no_columns() {
        let op = compile(Ast::Select(SelectAst {
            from: Some(ColumnRef::Name("users".into())),
            ..Default::default()
        }));
        assert_eq!(op.query, "SELECT * FROM users");
        assert_eq!(op.sql, "SELECT * FROM users");
        assert!(op.values.is_empty());
    }

    #[test]
    fn bindings_render_both_ways() {
        let op = compile(Ast::Select(SelectAst {
            from: Some(ColumnRef::Name("users".into())),
            wheres: vec![simple_where("id", 7)],
            ..Default::default()
        }));
        assert_eq!(op.query, "SELECT * FROM users WHERE id = ?");
        assert_eq!(op.sql, "SELECT * FROM users WHERE id = 7");
        assert_eq!(op.values, vec![Value::Int(7)]);
        assert_eq!(op.fragments, vec!["SELECT * FROM users WHERE id = ", ""]);
    }

    #[test]
    fn postgres_numbers_placeholders() {
        let ast = Arc::new(Ast::Select(SelectAst {
            from: Some(ColumnRef::Name("users".into())),
            wheres: vec![simple_where("a", 1), simple_where("b", 2)],
            ..Default::default()
        }));
        let op = Grammar::with_dialect(Arc::new(Postgres))
            .to_operation(&ast)
            .unwrap();
        assert_eq!(
            op.query,
            "SELECT * FROM \"users\" WHERE \"a\" = $1 AND \"b\" = $2"
        );
    }

    #[test]
    fn unknown_operator_is_rejected() {
        let ast = Arc::new(Ast::Select(SelectAst {
            from: Some(ColumnRef::Name("users".into())),
            wheres: vec![ConditionNode::Expr {
                column: ColumnRef::Name("id".into()),
                operator: "isnt".into(),
                value: Operand::Value(Value::Int(1)),
                negated: false,
                combine: Combine::And,
            }],
            ..Default::default()
        }));
        let err = Grammar::new().to_operation(&ast).unwrap_err();
        assert_eq!(err, ForgeError::InvalidOperator("isnt".into()));
    }

    #[test]
    fn empty_in_list_pins_truth_value() {
        let op = compile(Ast::Select(SelectAst {
            from: Some(ColumnRef::Name("users".into())),
            wheres: vec![ConditionNode::In {
                column: ColumnRef::Name("id".into()),
                set: InSet::Values(vec![]),
                negated: false,
                combine: Combine::And,
            }],
            ..Default::default()
        }));
        assert_eq!(op.query, "SELECT * FROM users WHERE 1 = 0");
    }

    #[test]
    fn memoizes_by_handle_identity() {
        let ast = Arc::new(Ast::Select(SelectAst {
            from: Some(ColumnRef::Name("users".into())),
            ..Default::default()
        }));
        let mut grammar = Grammar::new();
        let first = grammar.to_operation(&ast).unwrap();
        let second = grammar.to_operation(&ast).unwrap();
        assert_eq!(first, second);
        assert_eq!(grammar.compile_count(), 1);

        // A structurally equal but distinct handle recompiles.
        let other = Arc::new((*ast).clone());
        grammar.to_operation(&other).unwrap();
        assert_eq!(grammar.compile_count(), 2);
    }

    #[test]
    fn unset_ast_compiles_to_nothing() {
        let ast = Arc::new(Ast::Update(UpdateAst::default()));
        let mut grammar = Grammar::new();
        let op = grammar.to_operation(&ast).unwrap();
        assert_eq!(op, Operation::default());
        assert_eq!(grammar.compile_count(), 0);
    }

    #[test]
    fn insert_without_rows_uses_default_values() {
        let op = compile(Ast::Insert(InsertAst {
            table: Some("logs".into()),
            ..Default::default()
        }));
        assert_eq!(op.query, "INSERT INTO logs DEFAULT VALUES");
    }

    #[test]
    fn insert_row_length_mismatch_errors() {
        let ast = Arc::new(Ast::Insert(InsertAst {
            table: Some("users".into()),
            columns: vec!["a".into(), "b".into()],
            rows: vec![vec![Operand::Value(Value::Int(1))]],
            ..Default::default()
        }));
        let err = Grammar::new().to_operation(&ast).unwrap_err();
        assert!(err.is_invalid_argument());
    }

    #[test]
    fn update_requires_sets() {
        let ast = Arc::new(Ast::Update(UpdateAst {
            table: Some("users".into()),
            ..Default::default()
        }));
        let err = Grammar::new().to_operation(&ast).unwrap_err();
        assert!(err.is_invalid_argument());
    }

    #[test]
    fn star_segment_is_never_quoted() {
        let ast = Arc::new(Ast::Select(SelectAst {
            columns: vec![ColumnRef::Name("u.*".into())],
            from: Some(ColumnRef::parse("users AS u")),
            ..Default::default()
        }));
        let op = Grammar::with_dialect(Arc::new(Postgres))
            .to_operation(&ast)
            .unwrap();
        assert_eq!(op.query, "SELECT \"u\".* FROM \"users\" AS \"u\"");
    }
}
