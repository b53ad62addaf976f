//! The abstract parsing/module-loading surface (spec §6). Neither trait
//! is implemented concretely here — there's no lexer or filesystem
//! walker in this crate — but the checker and `link_modules` are written
//! entirely against these traits, so any concrete `Parser`/
//! `ModuleLoader` pair (a real lexer+grammar, or the
//! `tests/support` stand-ins) can drive them.

use crate::ast::{Module, Name, Program};
use crate::checker::module_var_name;
use fble_common::Diagnostic;
use rustc_hash::{FxHashMap, FxHashSet};

/// A load-time failure (spec §7's "Load errors" bucket): file not
/// found, a module with both a public and private definition, or (once
/// module dependencies are known) a recursive module.
#[derive(Clone, Debug)]
pub struct LoadError(pub Diagnostic);

impl From<Diagnostic> for LoadError {
    fn from(d: Diagnostic) -> Self {
        LoadError(d)
    }
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for LoadError {}

/// Turns one source file into a [`Program`]: a root expression plus the
/// module paths it references. Out of scope to implement for real (no
/// lexer/grammar ships in this crate, §6/§9 non-goals); the core only
/// needs something that satisfies this trait.
pub trait Parser {
    fn parse(&self, filename: &str) -> Result<Program, LoadError>;
}

/// Resolves every module path a [`Program`] (transitively) references
/// into a dependency-ordered list of [`Module`]s, so `link_modules` can
/// fold them into one `Tc::Let` chain without doing its own file
/// resolution or cycle detection.
pub trait ModuleLoader {
    fn load(&self, program: &Program) -> Result<Vec<Module>, LoadError>;
}

/// Topologically sorts a table of already-parsed modules by dependency
/// (grounded on `load.c`'s `FbleLoad`: a stack walk that reports
/// "recursive module dependency" the moment a path being resolved shows
/// up again as one of its own, transitive, dependencies). Pure graph
/// logic over already-resolved `Module`s — no filesystem access — so any
/// concrete [`ModuleLoader`] can resolve paths to files itself and then
/// reuse this to get the dependency order `link_modules` requires.
pub fn toposort_modules(by_name: &FxHashMap<String, Module>, roots: &[Vec<Name>]) -> Result<Vec<Module>, LoadError> {
    let mut visiting = FxHashSet::default();
    let mut done = FxHashSet::default();
    let mut out = Vec::new();
    for root in roots {
        visit(&module_var_name(root), by_name, &mut visiting, &mut done, &mut out)?;
    }
    Ok(out)
}

fn visit(
    name: &str,
    by_name: &FxHashMap<String, Module>,
    visiting: &mut FxHashSet<String>,
    done: &mut FxHashSet<String>,
    out: &mut Vec<Module>,
) -> Result<(), LoadError> {
    if done.contains(name) {
        return Ok(());
    }
    let module = by_name
        .get(name)
        .unwrap_or_else(|| panic!("toposort_modules: {name} not in by_name (a ModuleLoader bug, not a user error)"));
    if !visiting.insert(name.to_string()) {
        return Err(Diagnostic::recursive_module(
            module.path.last().map(|n| n.loc.clone()).unwrap_or_else(fble_common::Loc::synthetic),
            name,
        )
        .into());
    }
    for dep in &module.deps {
        visit(&module_var_name(dep), by_name, visiting, done, out)?;
    }
    visiting.remove(name);
    done.insert(name.to_string());
    out.push(module.clone());
    Ok(())
}
