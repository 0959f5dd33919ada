//! Sub-node types shared by the operation ASTs.
//!
//! Everything here is pure data: the builders construct these nodes and the
//! grammar pattern-matches on them exhaustively. Column slots accept
//! identifiers, `X AS Y` aliases, raw numeric literals, raw SQL, and
//! sub-queries; value slots accept scalar bindings, binding lists, raw SQL,
//! and sub-queries.

use std::sync::Arc;
use std::sync::LazyLock;

use regex::Regex;

use crate::ast::Ast;
use crate::error::ForgeError;
use crate::raw::RawSql;
use crate::value::Value;

/// Case-insensitive `X AS Y` alias pattern, tolerant of surrounding
/// whitespace.
static ALIAS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*(.+?)\s+as\s+(\S+)\s*$").expect("alias pattern"));

/// How a condition node combines with its predecessor in the list.
///
/// The first node in a list compiles with no leading operator; every
/// subsequent node is prefixed with its own combine keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combine {
    And,
    Or,
}

/// Which clause a condition list belongs to.
///
/// WHERE and HAVING bind values; ON compares columns against columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClauseKind {
    Where,
    Having,
    On,
}

/// Date component extracted by a date condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatePart {
    Year,
    Month,
    Day,
}

impl DatePart {
    pub(crate) fn keyword(self) -> &'static str {
        match self {
            DatePart::Year => "YEAR",
            DatePart::Month => "MONTH",
            DatePart::Day => "DAY",
        }
    }
}

/// A wrapped nested operation, usable wherever a SELECT may appear nested
/// (columns, FROM, conditions, UNION branches).
#[derive(Debug, Clone, PartialEq)]
pub struct SubQuery {
    pub(crate) ast: Arc<Ast>,
    /// First argument error recorded by the builder this was converted from.
    /// The compiler refuses the node, so the error survives the conversion
    /// and still surfaces from the outer query's `to_operation`.
    pub(crate) error: Option<ForgeError>,
}

impl SubQuery {
    /// Wrap an AST handle. The handle is shared, not copied.
    pub fn new(ast: Arc<Ast>) -> Self {
        Self { ast, error: None }
    }

    /// The wrapped operation AST.
    pub fn ast(&self) -> &Arc<Ast> {
        &self.ast
    }
}

/// A column-like slot.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnRef {
    /// Plain identifier, possibly dotted (`schema.table.column`, `t.*`).
    Name(String),
    /// `ident AS alias`, extracted from an `X AS Y` string.
    Aliased { ident: String, alias: String },
    /// Raw numeric literal; used for positional column references and never
    /// rendered as a placeholder.
    Numeric(i64),
    /// Opaque raw SQL.
    Raw(RawSql),
    /// Nested SELECT.
    SubQuery(SubQuery),
}

impl ColumnRef {
    /// Parse a column string, extracting an `X AS Y` alias when present.
    pub fn parse(s: &str) -> Self {
        if let Some(caps) = ALIAS_RE.captures(s) {
            ColumnRef::Aliased {
                ident: caps[1].trim().to_string(),
                alias: caps[2].to_string(),
            }
        } else {
            ColumnRef::Name(s.trim().to_string())
        }
    }

    /// Check for a blank identifier (the silent no-op affordance in table
    /// setters, a recorded error in condition slots).
    pub(crate) fn is_blank(&self) -> bool {
        matches!(self, ColumnRef::Name(s) if s.is_empty())
    }
}

impl From<&str> for ColumnRef {
    fn from(s: &str) -> Self {
        ColumnRef::parse(s)
    }
}

impl From<String> for ColumnRef {
    fn from(s: String) -> Self {
        ColumnRef::parse(&s)
    }
}

impl From<i32> for ColumnRef {
    fn from(n: i32) -> Self {
        ColumnRef::Numeric(n as i64)
    }
}

impl From<i64> for ColumnRef {
    fn from(n: i64) -> Self {
        ColumnRef::Numeric(n)
    }
}

impl From<RawSql> for ColumnRef {
    fn from(raw: RawSql) -> Self {
        ColumnRef::Raw(raw)
    }
}

impl From<SubQuery> for ColumnRef {
    fn from(sub: SubQuery) -> Self {
        ColumnRef::SubQuery(sub)
    }
}

/// A value-like slot.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// One bound scalar.
    Value(Value),
    /// A list of bound scalars (IN lists, BETWEEN pairs).
    Values(Vec<Value>),
    /// Opaque raw SQL.
    Raw(RawSql),
    /// Nested SELECT.
    SubQuery(SubQuery),
}

impl Operand {
    /// Short shape name used in error messages.
    pub(crate) fn shape_name(&self) -> &'static str {
        match self {
            Operand::Value(v) => v.type_name(),
            Operand::Values(_) => "value list",
            Operand::Raw(_) => "raw sql",
            Operand::SubQuery(_) => "sub-query",
        }
    }
}

impl From<Value> for Operand {
    fn from(v: Value) -> Self {
        Operand::Value(v)
    }
}

impl From<RawSql> for Operand {
    fn from(raw: RawSql) -> Self {
        Operand::Raw(raw)
    }
}

impl From<SubQuery> for Operand {
    fn from(sub: SubQuery) -> Self {
        Operand::SubQuery(sub)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Operand {
    fn from(vs: Vec<T>) -> Self {
        Operand::Values(vs.into_iter().map(Into::into).collect())
    }
}

macro_rules! operand_from_value {
    ($($t:ty),* $(,)?) => {
        $(impl From<$t> for Operand {
            fn from(v: $t) -> Self {
                Operand::Value(v.into())
            }
        })*
    };
}

operand_from_value!(
    bool,
    i16,
    i32,
    i64,
    u32,
    f32,
    f64,
    &str,
    String,
    chrono::NaiveDate,
    chrono::NaiveDateTime,
    uuid::Uuid,
    serde_json::Value,
);

impl<T: Into<Value>> From<Option<T>> for Operand {
    fn from(v: Option<T>) -> Self {
        Operand::Value(v.into())
    }
}

/// The right-hand side of an IN condition.
#[derive(Debug, Clone, PartialEq)]
pub enum InSet {
    /// Bound scalar list. An empty list compiles to a constant-false
    /// (constant-true when negated) guard instead of invalid `IN ()` syntax.
    Values(Vec<Value>),
    /// Opaque raw SQL.
    Raw(RawSql),
    /// Nested SELECT.
    SubQuery(SubQuery),
}

impl<T: Into<Value>> From<Vec<T>> for InSet {
    fn from(vs: Vec<T>) -> Self {
        InSet::Values(vs.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>, const N: usize> From<[T; N]> for InSet {
    fn from(vs: [T; N]) -> Self {
        InSet::Values(vs.into_iter().map(Into::into).collect())
    }
}

impl From<RawSql> for InSet {
    fn from(raw: RawSql) -> Self {
        InSet::Raw(raw)
    }
}

impl From<SubQuery> for InSet {
    fn from(sub: SubQuery) -> Self {
        InSet::SubQuery(sub)
    }
}

/// One WHERE/HAVING/ON predicate unit.
#[derive(Debug, Clone, PartialEq)]
pub enum ConditionNode {
    /// `column op value`
    Expr {
        column: ColumnRef,
        operator: String,
        value: Operand,
        negated: bool,
        combine: Combine,
    },
    /// `column op right_column` (JOIN-ON mode)
    Column {
        column: ColumnRef,
        operator: String,
        right: ColumnRef,
        negated: bool,
        combine: Combine,
    },
    /// `column [NOT] IN (...)`
    In {
        column: ColumnRef,
        set: InSet,
        negated: bool,
        combine: Combine,
    },
    /// `column IS [NOT] NULL`
    Null {
        column: ColumnRef,
        negated: bool,
        combine: Combine,
    },
    /// `column [NOT] BETWEEN first AND second`
    Between {
        column: ColumnRef,
        first: Value,
        second: Value,
        negated: bool,
        combine: Combine,
    },
    /// `[NOT] EXISTS (sub-select)`
    Exists {
        query: SubQuery,
        negated: bool,
        combine: Combine,
    },
    /// Parenthesized nested condition group. Only appended when non-empty.
    Sub {
        nodes: Vec<ConditionNode>,
        negated: bool,
        combine: Combine,
    },
    /// `EXTRACT(part FROM column) op value`
    Date {
        part: DatePart,
        column: ColumnRef,
        operator: String,
        value: Value,
        negated: bool,
        combine: Combine,
    },
    /// Opaque raw condition.
    Raw { raw: RawSql, combine: Combine },
}

impl ConditionNode {
    /// The combine keyword this node joins its predecessor with.
    pub fn combine(&self) -> Combine {
        match self {
            ConditionNode::Expr { combine, .. }
            | ConditionNode::Column { combine, .. }
            | ConditionNode::In { combine, .. }
            | ConditionNode::Null { combine, .. }
            | ConditionNode::Between { combine, .. }
            | ConditionNode::Exists { combine, .. }
            | ConditionNode::Sub { combine, .. }
            | ConditionNode::Date { combine, .. }
            | ConditionNode::Raw { combine, .. } => *combine,
        }
    }
}

/// JOIN flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Full,
    Cross,
}

impl JoinKind {
    pub(crate) fn keyword(self) -> &'static str {
        match self {
            JoinKind::Inner => "INNER JOIN",
            JoinKind::Left => "LEFT JOIN",
            JoinKind::Right => "RIGHT JOIN",
            JoinKind::Full => "FULL OUTER JOIN",
            JoinKind::Cross => "CROSS JOIN",
        }
    }
}

/// One JOIN clause.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinNode {
    pub kind: JoinKind,
    pub table: ColumnRef,
    pub on: Vec<ConditionNode>,
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDir {
    Asc,
    Desc,
}

impl OrderDir {
    pub(crate) fn keyword(self) -> &'static str {
        match self {
            OrderDir::Asc => "ASC",
            OrderDir::Desc => "DESC",
        }
    }
}

/// One ORDER BY entry.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderNode {
    pub column: ColumnRef,
    pub dir: OrderDir,
}

/// One UNION branch.
#[derive(Debug, Clone, PartialEq)]
pub struct UnionNode {
    pub query: SubQuery,
    pub all: bool,
}

/// Row locking clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lock {
    ForUpdate,
    ForShare,
}

impl Lock {
    pub(crate) fn keyword(self) -> &'static str {
        match self {
            Lock::ForUpdate => "FOR UPDATE",
            Lock::ForShare => "FOR SHARE",
        }
    }
}
