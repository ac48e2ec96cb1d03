//! Compiler from MongoDB-style metadata filters to EdgeQL predicates.
//!
//! Syntax (JSON, one key per object):
//!   {"field": value}                   - equality shorthand
//!   {"$eq": {"field": value}}          - also $ne $lt $lte $gt $gte $like $ilike
//!   {"$in": {"field": [v1, v2]}}       - set membership, also $nin
//!   {"$and": [expr, expr, ...]}        - AND, two or more operands
//!   {"$or": [expr, expr, ...]}         - OR
//!   {}                                 - no constraint (empty fragment)
//!
//! Every field is read as `<str>json_get(.metadata, "field")`, so the fragment
//! assumes the enclosing query binds the document metadata as `.metadata`.

mod ast;
mod parser;
mod render;

pub use ast::*;
pub use parser::parse_filter;
pub use render::{CompiledFilter, escape, format_float};

use render::Renderer;

use serde_json::Value;

use crate::config::{CompileMode, CompilerConfig, DEFAULT_MAX_DEPTH};
use crate::error::Result;

/// Compile a filter document with the legacy, unescaped output format.
pub fn compile(expr: &Value) -> Result<String> {
    let ast = parse_filter(expr, DEFAULT_MAX_DEPTH)?;
    Ok(Renderer::new(CompileMode::Legacy).render(&ast).fragment)
}

/// Wrap a fragment as a `filter` clause; `None` when there is nothing to filter on.
pub fn filter_clause(fragment: &str) -> Option<String> {
    if fragment.is_empty() {
        None
    } else {
        Some(format!("filter {fragment}"))
    }
}

/// A configured compiler. Holds no state between calls and can be shared across threads.
#[derive(Debug, Clone)]
pub struct FilterCompiler {
    mode: CompileMode,
    max_depth: usize,
}

impl Default for FilterCompiler {
    fn default() -> Self {
        Self::new(CompileMode::Legacy, DEFAULT_MAX_DEPTH)
    }
}

impl FilterCompiler {
    pub fn new(mode: CompileMode, max_depth: usize) -> Self {
        Self { mode, max_depth }
    }

    pub fn from_config(config: &CompilerConfig) -> Self {
        Self::new(config.mode, config.max_depth)
    }

    pub fn mode(&self) -> CompileMode {
        self.mode
    }

    /// Parse and render a JSON filter document.
    pub fn compile(&self, expr: &Value) -> Result<CompiledFilter> {
        let ast = parse_filter(expr, self.max_depth)?;
        tracing::trace!("Parsed filter: {:?}", ast);
        self.check_strict(&ast)?;
        Ok(self.render(&ast))
    }

    /// Validate and render a filter built in code.
    pub fn compile_ast(&self, ast: &FilterAst) -> Result<CompiledFilter> {
        ast.validate(self.max_depth)?;
        self.check_strict(ast)?;
        Ok(self.render(ast))
    }

    /// Legacy output passes mixed-type lists through unchanged.
    fn check_strict(&self, ast: &FilterAst) -> Result<()> {
        match self.mode {
            CompileMode::Legacy => Ok(()),
            CompileMode::Escaped | CompileMode::Parameterized => ast.check_list_types(),
        }
    }

    fn render(&self, ast: &FilterAst) -> CompiledFilter {
        let compiled = Renderer::new(self.mode).render(ast);
        tracing::debug!(
            "Compiled filter ({}, depth {}, {} params): {}",
            self.mode.label(),
            ast.depth(),
            compiled.params.len(),
            compiled.fragment
        );
        compiled
    }
}
