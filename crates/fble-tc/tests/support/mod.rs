//! Stand-in `Parser`/`ModuleLoader` for integration tests: both are
//! backed by in-memory maps of hand-built `Program`/`Module` values (no
//! lexing, no filesystem), so tests can exercise `link_modules` and the
//! `ModuleLoader` trait boundary without a real fble grammar.

use fble_tc::ast::{Module, Name, Program};
use fble_tc::{toposort_modules, LoadError, ModuleLoader, Parser};
use rustc_hash::FxHashMap;

pub struct TestParser {
    pub files: FxHashMap<String, Program>,
}

impl Parser for TestParser {
    fn parse(&self, filename: &str) -> Result<Program, fble_tc::LoadError> {
        self.files
            .get(filename)
            .cloned()
            .ok_or_else(|| LoadError(fble_common::Diagnostic::file_not_found(fble_common::Loc::synthetic(), filename)))
    }
}

/// Keyed by canonical module path name (`fble_tc::ast`'s `/`-joined
/// form, matching what `ModuleRef` resolves against).
pub struct TestLoader {
    pub modules: FxHashMap<String, Module>,
}

impl TestLoader {
    pub fn new(modules: Vec<Module>) -> Self {
        let by_name = modules
            .into_iter()
            .map(|m| (module_name(&m.path), m))
            .collect();
        TestLoader { modules: by_name }
    }
}

impl ModuleLoader for TestLoader {
    fn load(&self, program: &Program) -> Result<Vec<Module>, LoadError> {
        toposort_modules(&self.modules, &program.deps)
    }
}

pub fn module_name(path: &[Name]) -> String {
    path.iter().map(|n| n.text.as_ref()).collect::<Vec<_>>().join("/")
}
