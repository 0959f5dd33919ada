//! Fluent operation builders.
//!
//! Each builder holds an `Arc<Ast>` handle plus its own [`Grammar`]. Chained
//! calls clone the AST, patch the clone, and swap in a fresh handle; the old
//! handle stays valid, which is what makes cloned builders cheap snapshots
//! and lets the grammar memoize by handle identity.
//!
//! Argument errors never panic and never interrupt a chain: the first one is
//! recorded on the builder and surfaces from `to_operation`.

mod conditions;
mod delete;
mod insert;
mod select;
mod truncate;
mod update;

pub use conditions::{ConditionArg, ConditionBuilder, IntoConditionArg, OnBuilder, group};
pub use delete::Delete;
pub use insert::{Insert, IntoInsertRow};
pub use select::Select;
pub use truncate::Truncate;
pub use update::Update;

use crate::ast::{ColumnRef, SubQuery};

/// Chaining behavior of a builder.
///
/// Both modes leave earlier AST handles untouched; the difference is the
/// compiler cache. A mutable builder carries its grammar (and memoized
/// compile) across chained calls, an immutable one starts every chained call
/// with a fresh grammar. The execution layer additionally refuses to run
/// immutable builders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Mutable,
    Immutable,
}

/// Start a SELECT with an explicit column list.
///
/// # Example
/// ```ignore
/// let op = select(["id", "name"]).from("users").to_operation()?;
/// ```
pub fn select<I, C>(columns: I) -> Select
where
    I: IntoIterator<Item = C>,
    C: Into<ColumnRef>,
{
    Select::new().columns(columns)
}

/// Start a `SELECT *` from a table.
pub fn from(table: impl Into<ColumnRef>) -> Select {
    Select::new().from(table)
}

/// Start an INSERT.
pub fn insert(table: impl Into<String>) -> Insert {
    Insert::new().into_table(table)
}

/// Start an UPDATE.
pub fn update(table: impl Into<String>) -> Update {
    Update::new().table(table)
}

/// Start a DELETE.
pub fn delete(table: impl Into<String>) -> Delete {
    Delete::new().from(table)
}

/// Start a TRUNCATE.
pub fn truncate(table: impl Into<String>) -> Truncate {
    Truncate::new().table(table)
}

/// Build a sub-query from a closure over a fresh SELECT builder.
///
/// # Example
/// ```ignore
/// from("users").where_in("id", sub(|q| q.columns(["user_id"]).from("orders")));
/// ```
pub fn sub(f: impl FnOnce(Select) -> Select) -> SubQuery {
    f(Select::new()).into()
}
