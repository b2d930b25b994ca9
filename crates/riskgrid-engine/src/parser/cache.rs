//! The hash-keyed AST cache.
//!
//! Keyed on the canonical hash from [`super::hash`], so structurally
//! identical formulas at different addresses share one parsed tree and one
//! precomputed dependency list.

use std::collections::HashMap;
use std::sync::Arc;

use super::ast::Ast;
use super::deps::{collect_dependencies, Dep};
use super::hash::hash_ast;
use crate::config::Config;
use crate::functions;

/// A cached parse: the shared AST, its relative dependencies, and the
/// function-derived flags the scheduler needs.
#[derive(Clone, Debug)]
pub struct CacheEntry {
    pub ast: Arc<Ast>,
    pub dependencies: Vec<Dep>,
    /// Any function in the tree is volatile (`RAND`, `NOW`, …).
    pub has_volatile_fn: bool,
    /// Any function in the tree depends on sheet geometry (`FORMULATEXT`).
    pub has_structural_fn: bool,
}

impl CacheEntry {
    fn build(ast: Ast) -> Self {
        let dependencies = collect_dependencies(&ast);
        let has_volatile_fn = ast.any_function(&functions::function_is_volatile);
        let has_structural_fn = ast.any_function(&functions::function_is_structural);
        Self {
            ast: Arc::new(ast),
            dependencies,
            has_volatile_fn,
            has_structural_fn,
        }
    }
}

/// Hash → entry map owned by one engine instance.
#[derive(Debug, Default)]
pub struct ParserCache {
    entries: HashMap<String, Arc<CacheEntry>>,
}

impl ParserCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, hash: &str) -> Option<Arc<CacheEntry>> {
        self.entries.get(hash).cloned()
    }

    /// Insert (or overwrite) the entry for `hash`.
    pub fn set(&mut self, hash: String, ast: Ast) -> Arc<CacheEntry> {
        let entry = Arc::new(CacheEntry::build(ast));
        self.entries.insert(hash, Arc::clone(&entry));
        entry
    }

    /// Insert only if absent, returning the (possibly pre-existing) entry.
    pub fn maybe_set_and_get(&mut self, hash: &str, ast: &Ast) -> Arc<CacheEntry> {
        if let Some(existing) = self.entries.get(hash) {
            return Arc::clone(existing);
        }
        self.set(hash.to_string(), ast.clone())
    }

    /// Re-hash a (possibly transformed) AST and return its shared entry,
    /// inserting it if this shape has not been seen before.
    pub fn fetch_cached_for_ast(&mut self, ast: &Ast, config: &Config) -> (String, Arc<CacheEntry>) {
        let hash = hash_ast(ast, config);
        let entry = self.maybe_set_and_get(&hash, ast);
        (hash, entry)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
