//! Operation ASTs.
//!
//! One immutable record per statement kind. Builders never edit these in
//! place: every chained call clones the current value, applies a patch, and
//! wraps the result in a fresh `Arc`, so older handles stay valid and the
//! compiler can memoize by handle identity.

mod nodes;

pub use nodes::{
    ClauseKind, ColumnRef, Combine, ConditionNode, DatePart, InSet, JoinKind, JoinNode, Lock,
    Operand, OrderDir, OrderNode, SubQuery, UnionNode,
};

/// SELECT statement AST.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SelectAst {
    /// Selected columns; empty means `*`.
    pub columns: Vec<ColumnRef>,
    pub from: Option<ColumnRef>,
    pub joins: Vec<JoinNode>,
    pub wheres: Vec<ConditionNode>,
    pub groups: Vec<ColumnRef>,
    pub havings: Vec<ConditionNode>,
    pub orders: Vec<OrderNode>,
    pub unions: Vec<UnionNode>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub distinct: bool,
    /// Alias emitted when this SELECT renders as a sub-query.
    pub alias: Option<String>,
    pub lock: Option<Lock>,
}

/// INSERT statement AST.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InsertAst {
    pub table: Option<String>,
    pub columns: Vec<String>,
    /// One operand per column, one inner vec per row, in insertion order.
    pub rows: Vec<Vec<Operand>>,
    pub returning: Vec<ColumnRef>,
}

/// UPDATE statement AST.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UpdateAst {
    pub table: Option<String>,
    pub sets: Vec<(String, Operand)>,
    pub wheres: Vec<ConditionNode>,
    pub returning: Vec<ColumnRef>,
}

/// DELETE statement AST.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DeleteAst {
    pub from: Option<String>,
    pub wheres: Vec<ConditionNode>,
    pub returning: Vec<ColumnRef>,
}

/// TRUNCATE statement AST.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TruncateAst {
    pub table: Option<String>,
}

/// One SQL statement of any supported kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Ast {
    Select(SelectAst),
    Insert(InsertAst),
    Update(UpdateAst),
    Delete(DeleteAst),
    Truncate(TruncateAst),
}

impl Ast {
    /// Statement keyword, for logs and error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Ast::Select(_) => "SELECT",
            Ast::Insert(_) => "INSERT",
            Ast::Update(_) => "UPDATE",
            Ast::Delete(_) => "DELETE",
            Ast::Truncate(_) => "TRUNCATE",
        }
    }

    /// Check whether this AST is still the untouched default for its kind.
    ///
    /// The compiler fast-paths an untouched AST to an empty operation, so an
    /// UPDATE or DELETE that was never configured compiles to nothing.
    pub fn is_unset(&self) -> bool {
        match self {
            Ast::Select(a) => *a == SelectAst::default(),
            Ast::Insert(a) => *a == InsertAst::default(),
            Ast::Update(a) => *a == UpdateAst::default(),
            Ast::Delete(a) => *a == DeleteAst::default(),
            Ast::Truncate(a) => *a == TruncateAst::default(),
        }
    }

    /// WHERE list accessor for the kinds that carry one.
    pub fn wheres(&self) -> Option<&[ConditionNode]> {
        match self {
            Ast::Select(a) => Some(&a.wheres),
            Ast::Update(a) => Some(&a.wheres),
            Ast::Delete(a) => Some(&a.wheres),
            Ast::Insert(_) | Ast::Truncate(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_asts_are_unset() {
        assert!(Ast::Select(SelectAst::default()).is_unset());
        assert!(Ast::Update(UpdateAst::default()).is_unset());
        assert!(Ast::Delete(DeleteAst::default()).is_unset());
    }

    #[test]
    fn touched_ast_is_set() {
        let a = SelectAst {
            from: Some(ColumnRef::Name("users".into())),
            ..Default::default()
        };
        assert!(!Ast::Select(a).is_unset());
    }
}
