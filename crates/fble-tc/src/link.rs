//! Folds a dependency-ordered module list and a main program into one
//! checked [`Tc`] (spec §6, grounded directly on `load.c`'s `FbleLoad`
//! and `typecheck.c`'s `TypeCheckProgram`): each module is checked in
//! order and bound as a local of its own checked type before the next
//! module (or the main body) is checked, then the whole thing is
//! wrapped, innermost-first, into a chain of single-binding `Tc::Let`s —
//! exactly the shape `TypeCheckProgram`'s own recursion builds.
//!
//! Real file resolution and the load-time "recursive module dependency"
//! cycle check belong to a concrete [`crate::ModuleLoader`] (none ships
//! here, per §6/§9's non-goals); this pass only re-validates that the
//! list it's handed is actually in dependency order, since a
//! `ModuleLoader` bug here would otherwise surface as a confusing
//! "not defined" checker diagnostic instead of a clear load error.

use crate::ast::{Module, Program};
use crate::checker::{module_var_name, Checker};
use crate::loader::LoadError;
use crate::tc::{LetBinding, Tc};
use fble_common::Diagnostic;
use fble_types::TypeId;
use rustc_hash::FxHashSet;
use std::rc::Rc;

/// Checks every module in `modules` (which must already be topologically
/// sorted — dependencies before dependents) followed by `main`, folding
/// the result into one `Tc`. Returns a [`LoadError`] only for a
/// dependency that isn't satisfied by an earlier entry in `modules`;
/// ordinary type errors are accumulated as diagnostics on `checker`
/// exactly like any other `check_expr` call, not raised here.
pub fn link_modules(checker: &mut Checker, modules: &[Module], main: &Program) -> Result<(Rc<Tc>, TypeId), LoadError> {
    let mut bound = FxHashSet::default();
    let mut bindings = Vec::with_capacity(modules.len());

    for module in modules {
        let name = module_var_name(&module.path);
        for dep in &module.deps {
            let dep_name = module_var_name(dep);
            if !bound.contains(&dep_name) {
                let loc = dep.last().map(|n| n.loc.clone()).unwrap_or_else(fble_common::Loc::synthetic);
                return Err(Diagnostic::recursive_module(loc, &dep_name).into());
            }
        }

        let (tc, ty) = checker.check_expr(&module.expr);
        let loc = module.path.last().map(|n| n.loc.clone()).unwrap_or_else(|| module.expr.loc().clone());
        checker.bind_module(name.clone(), ty, loc.clone());
        bound.insert(name.clone());
        let profiled = Rc::new(Tc::Profile { name: name.clone().into(), body: tc });
        bindings.push((name, profiled, loc));
    }

    let (body_tc, body_ty) = checker.check_expr(&main.expr);

    let mut acc = body_tc;
    for (name, value, loc) in bindings.into_iter().rev() {
        acc = Rc::new(Tc::Let {
            recursive: false,
            bindings: vec![LetBinding { name: name.into(), value }],
            body: acc,
            loc,
        });
    }
    Ok((acc, body_ty))
}
