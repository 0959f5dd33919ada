//! # sqlforge
//!
//! A SQL query construction engine: fluent builders accumulate an immutable
//! operation AST, and a dialect-parameterized [`Grammar`] compiles it into
//! parameterized SQL with an ordered binding list.
//!
//! ## Design
//!
//! - **Immutable AST with structural sharing.** Builders hold an `Arc<Ast>`;
//!   every chained call clones, patches, and rewraps. Older handles stay
//!   valid, so cloned builders are cheap snapshots.
//! - **Identity-memoized compilation.** A grammar caches the last compiled
//!   handle; recompiling an unchanged builder is a pointer comparison.
//! - **Normalization at the API boundary.** Argument shapes (pairs, triples,
//!   lists, raw SQL, sub-queries, groups) resolve into closed condition node
//!   variants before compilation; the compiler never re-interprets them.
//! - **Two renderings per compile.** `query` carries dialect placeholders
//!   for execution, `sql` inlines escaped literals for logs. Both come from
//!   one fragment/binding interleaved stream, so they always agree.
//!
//! ## Example
//!
//! ```
//! use sqlforge::from;
//!
//! let mut users = from("users")
//!     .columns(["id", "name"])
//!     .where_(("active", true))
//!     .order_by_desc("created_at")
//!     .limit(10);
//!
//! let op = users.to_operation()?;
//! assert_eq!(
//!     op.query,
//!     "SELECT id, name FROM users WHERE active = ? ORDER BY created_at DESC LIMIT 10"
//! );
//! # Ok::<(), sqlforge::ForgeError>(())
//! ```

pub mod ast;
pub mod builder;
pub mod error;
pub mod grammar;
pub mod raw;
pub mod value;

pub use ast::{
    Ast, ClauseKind, ColumnRef, Combine, ConditionNode, DatePart, InSet, JoinKind, Lock, Operand,
    OrderDir, SubQuery,
};
pub use builder::{
    ConditionArg, ConditionBuilder, Delete, Insert, IntoConditionArg, IntoInsertRow, Mode,
    OnBuilder, Select, Truncate, Update, delete, from, group, insert, select, sub, truncate,
    update,
};
pub use error::{ForgeError, ForgeResult};
pub use grammar::{
    Dialect, DialectRef, Generic, Grammar, Mssql, MySql, Operation, Postgres, Sqlite,
};
pub use raw::{RawSql, raw, raw_with};
pub use value::Value;

#[cfg(test)]
mod tests;
