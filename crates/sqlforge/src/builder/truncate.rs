//! TRUNCATE builder.

use std::sync::Arc;

use crate::ast::{Ast, TruncateAst};
use crate::builder::Mode;
use crate::error::{ForgeError, ForgeResult};
use crate::grammar::{DialectRef, Grammar, Operation};

/// Fluent TRUNCATE builder.
#[derive(Debug, Clone)]
pub struct Truncate {
    ast: Arc<Ast>,
    mode: Mode,
    grammar: Grammar,
    build_error: Option<ForgeError>,
}

impl Default for Truncate {
    fn default() -> Self {
        Self::new()
    }
}

impl Truncate {
    pub fn new() -> Self {
        Self::with_grammar(Grammar::new())
    }

    pub fn with_dialect(dialect: DialectRef) -> Self {
        Self::with_grammar(Grammar::with_dialect(dialect))
    }

    pub(crate) fn with_grammar(grammar: Grammar) -> Self {
        Self {
            ast: Arc::new(Ast::Truncate(TruncateAst::default())),
            mode: Mode::default(),
            grammar,
            build_error: None,
        }
    }

    /// Set the target table. A blank name is a silent no-op.
    pub fn table(mut self, table: impl Into<String>) -> Self {
        let table = table.into();
        if table.trim().is_empty() {
            return self;
        }
        self.ast = Arc::new(Ast::Truncate(TruncateAst { table: Some(table) }));
        if self.mode == Mode::Immutable {
            self.grammar = self.grammar.new_instance();
        }
        self
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
