//! The bidirectional type checker (spec §4.C): walks a surface [`Expr`]
//! tree, produces a checked [`Tc`] tree with names/types erased down to
//! integer variable indices, and accumulates diagnostics rather than
//! bailing on the first error.
//!
//! A note on memory: unlike [`fble_types::TypeTable`]'s own tests, which
//! hold heap conservation to the letter (spec §8 invariant #1 governs
//! the *runtime* value heap, not this one), the checker does not
//! meticulously release every intermediate `TypeId` it produces. The
//! `TypeTable` here is scoped to a single compilation and dropped
//! whole at the end of it, the same way `fble`'s own C type arena is
//! freed in one shot when a compile finishes rather than incrementally
//! as each type goes out of use.

use crate::ast::{Binding, Choice as AstChoice, Expr, KindExpr, Name, Namespace};
use crate::scope::Scope;
use crate::tc::{self, LetBinding, Tc, VarIndex};
use fble_common::{Diagnostic, DiagnosticSink, Loc, Phase};
use fble_types::{DataTag as TyDataTag, Kind, TypeData, TypeId, TypeTable};
use rustc_hash::FxHashSet;
use std::rc::Rc;

fn to_kind(k: &KindExpr) -> Kind {
    match k {
        KindExpr::Basic { level, loc } => Kind::basic(*level, loc.clone()),
        KindExpr::Poly { arg, result, loc } => Kind::poly(to_kind(arg), to_kind(result), loc.clone()),
    }
}

pub struct Checker<'t> {
    table: &'t mut TypeTable,
    scope: Scope,
    diags: DiagnosticSink,
    error_ty: Option<TypeId>,
}

impl<'t> Checker<'t> {
    pub fn new(table: &'t mut TypeTable) -> Self {
        Checker {
            table,
            scope: Scope::new(),
            diags: DiagnosticSink::new(),
            error_ty: None,
        }
    }

    pub fn into_diagnostics(self) -> DiagnosticSink {
        self.diags
    }

    pub fn diagnostics(&self) -> &DiagnosticSink {
        &self.diags
    }

    /// Entry point for a single already-resolved (no `ModuleRef` left
    /// unbound) expression tree.
    pub fn check_program(&mut self, expr: &Expr) -> (Rc<Tc>, TypeId) {
        self.check_expr(expr)
    }

    /// Binds an already-checked module's result at its canonical path
    /// name, for [`crate::link::link_modules`] to grow the scope one
    /// module at a time without reaching into its private fields.
    pub(crate) fn bind_module(&mut self, name: impl Into<String>, ty: TypeId, loc: Loc) {
        self.scope.push_local(name, ty, loc);
    }

    // --- error recovery ---

    fn error_ty(&mut self) -> TypeId {
        match self.error_ty {
            Some(t) => t,
            None => {
                let t = self.table.data_type(TyDataTag::Struct, Vec::new(), Loc::synthetic());
                self.error_ty = Some(t);
                t
            }
        }
    }

    fn error(&mut self, loc: Loc) -> (Rc<Tc>, TypeId) {
        let ty = self.error_ty();
        (Rc::new(Tc::TypeValue { loc }), ty)
    }

    fn check_namespace(&mut self, name: &Name, level: u32) {
        let expected = if level == 0 { Namespace::Normal } else { Namespace::Type };
        if name.space != expected {
            self.diags
                .push(Diagnostic::namespace_mismatch(name.loc.clone(), &name.text));
        }
    }

    fn describe(&self, ty: TypeId, depth: u32) -> String {
        if depth == 0 {
            return "...".to_string();
        }
        match self.table.get(ty) {
            TypeData::Data { tag, fields, .. } => {
                let bullet = match tag {
                    TyDataTag::Struct => "*",
                    TyDataTag::Union => "+",
                };
                let inner: Vec<String> = fields
                    .iter()
                    .map(|(n, t)| format!("{n}: {}", self.describe(*t, depth - 1)))
                    .collect();
                format!("{bullet}({})", inner.join(", "))
            }
            TypeData::Func { args, result, .. } => {
                let args: Vec<String> = args.iter().map(|a| self.describe(*a, depth - 1)).collect();
                format!("({}) {{ {}; }}", args.join(", "), self.describe(*result, depth - 1))
            }
            TypeData::Proc { inner, .. } => format!("{}!", self.describe(*inner, depth - 1)),
            TypeData::Poly { arg, body, .. } => {
                format!("<{}> {{ {} }}", self.describe(*arg, depth - 1), self.describe(*body, depth - 1))
            }
            TypeData::PolyApply { poly, arg, .. } => {
                format!("{}<{}>", self.describe(*poly, depth - 1), self.describe(*arg, depth - 1))
            }
            TypeData::Var { name, .. } => name.clone(),
            TypeData::TypeType { inner, .. } => format!("typeof({})", self.describe(*inner, depth - 1)),
        }
    }

    fn diag_type_mismatch(&mut self, found: TypeId, expected: TypeId, loc: &Loc) {
        let expected = self.describe(expected, 4);
        let found = self.describe(found, 4);
        self.diags.push(Diagnostic::type_mismatch(loc.clone(), &expected, &found));
    }

    // --- normal-form projections used throughout the rules below ---

    fn normal_data(&mut self, ty: TypeId) -> Option<(TyDataTag, Vec<(String, TypeId)>)> {
        let n = self.table.normal(ty)?;
        match self.table.get(n).clone() {
            TypeData::Data { tag, fields, .. } => Some((tag, fields)),
            _ => None,
        }
    }

    fn normal_func(&mut self, ty: TypeId) -> Option<(Vec<TypeId>, TypeId)> {
        let n = self.table.normal(ty)?;
        match self.table.get(n).clone() {
            TypeData::Func { args, result, .. } => Some((args, result)),
            _ => None,
        }
    }

    fn normal_proc(&mut self, ty: TypeId) -> Option<TypeId> {
        let n = self.table.normal(ty)?;
        match self.table.get(n) {
            TypeData::Proc { inner, .. } => Some(*inner),
            _ => None,
        }
    }

    fn normal_poly(&mut self, ty: TypeId) -> Option<(TypeId, TypeId)> {
        let n = self.table.normal(ty)?;
        match self.table.get(n) {
            TypeData::Poly { arg, body, .. } => Some((*arg, *body)),
            _ => None,
        }
    }

    fn as_type_value(&mut self, ty: TypeId) -> Option<TypeId> {
        let n = self.table.normal(ty)?;
        match self.table.get(n) {
            TypeData::TypeType { inner, .. } => Some(*inner),
            _ => None,
        }
    }

    // --- TypeCheckType: evaluates an Expr used in type position ---

    pub fn check_type(&mut self, expr: &Expr) -> Option<TypeId> {
        match expr {
            Expr::StructType { fields, loc } => {
                let mut seen = FxHashSet::default();
                let mut out = Vec::with_capacity(fields.len());
                for f in fields {
                    let fty = self.check_type(&f.ty)?;
                    if !seen.insert(f.name.text.clone()) {
                        self.diags
                            .push(Diagnostic::duplicate_name(f.name.loc.clone(), "field", &f.name.text));
                    }
                    out.push((f.name.text.to_string(), fty));
                }
                Some(self.table.data_type(TyDataTag::Struct, out, loc.clone()))
            }
            Expr::UnionType { fields, loc } => {
                let mut seen = FxHashSet::default();
                let mut out = Vec::with_capacity(fields.len());
                for f in fields {
                    let fty = self.check_type(&f.ty)?;
                    if !seen.insert(f.name.text.clone()) {
                        self.diags
                            .push(Diagnostic::duplicate_name(f.name.loc.clone(), "field", &f.name.text));
                    }
                    out.push((f.name.text.to_string(), fty));
                }
                Some(self.table.data_type(TyDataTag::Union, out, loc.clone()))
            }
            Expr::FuncType { args, result, loc } => {
                let mut arg_tys = Vec::with_capacity(args.len());
                for a in args {
                    arg_tys.push(self.check_type(a)?);
                }
                let rty = self.check_type(result)?;
                Some(self.table.func_type(arg_tys, rty, loc.clone()))
            }
            Expr::ProcType { ty, loc } => {
                let inner = self.check_type(ty)?;
                Some(self.table.proc_type(inner, loc.clone()))
            }
            Expr::Typeof { expr, .. } => {
                let (_, ty) = self.check_expr(expr);
                Some(ty)
            }
            Expr::PolyApply { poly, arg, loc } => {
                let poly_ty = self.check_type(poly)?;
                let arg_ty = self.check_type(arg)?;
                Some(self.table.poly_apply(poly_ty, arg_ty, loc.clone()))
            }
            Expr::Var { name } => {
                let Some((_, ty)) = self.scope.lookup(&name.text) else {
                    self.diags.push(Diagnostic::not_defined(name.loc.clone(), &name.text));
                    return None;
                };
                match self.as_type_value(ty) {
                    Some(inner) => Some(inner),
                    None => {
                        self.diags
                            .push(Diagnostic::not_a_data_type(name.loc.clone(), &self.describe(ty, 3)));
                        None
                    }
                }
            }
            Expr::ModuleRef { path, loc } => {
                let name = module_var_name(path);
                let Some((_, ty)) = self.scope.lookup(&name) else {
                    self.diags.push(Diagnostic::not_defined(loc.clone(), &name));
                    return None;
                };
                match self.as_type_value(ty) {
                    Some(inner) => Some(inner),
                    None => {
                        self.diags.push(Diagnostic::not_a_data_type(loc.clone(), &self.describe(ty, 3)));
                        None
                    }
                }
            }
            other => {
                self.diags
                    .push(Diagnostic::not_a_data_type(other.loc().clone(), "a non-type expression"));
                None
            }
        }
    }

    fn check_type_as_value(&mut self, expr: &Expr) -> (Rc<Tc>, TypeId) {
        let loc = expr.loc().clone();
        match self.check_type(expr) {
            Some(t) => {
                let tt = self.table.type_type(t, loc.clone());
                (Rc::new(Tc::TypeValue { loc }), tt)
            }
            None => self.error(loc),
        }
    }

    // --- TypeCheckExpr ---

    pub fn check_expr(&mut self, expr: &Expr) -> (Rc<Tc>, TypeId) {
        match expr {
            Expr::Var { name } => match self.scope.lookup(&name.text) {
                Some((index, ty)) => (Rc::new(Tc::Var { index, loc: name.loc.clone() }), ty),
                None => {
                    self.diags.push(Diagnostic::not_defined(name.loc.clone(), &name.text));
                    self.error(name.loc.clone())
                }
            },
            Expr::ModuleRef { path, loc } => {
                let name = module_var_name(path);
                match self.scope.lookup(&name) {
                    Some((index, ty)) => (Rc::new(Tc::Var { index, loc: loc.clone() }), ty),
                    None => {
                        self.diags.push(Diagnostic::not_defined(loc.clone(), &name));
                        self.error(loc.clone())
                    }
                }
            }
            Expr::StructType { .. }
            | Expr::UnionType { .. }
            | Expr::ProcType { .. }
            | Expr::Typeof { .. }
            | Expr::FuncType { .. } => self.check_type_as_value(expr),
            Expr::StructValueImplicitType { args, loc } => {
                let mut seen = FxHashSet::default();
                let mut fields = Vec::with_capacity(args.len());
                let mut tcs = Vec::with_capacity(args.len());
                for (name, e) in args {
                    let (tc, ty) = self.check_expr(e);
                    if !seen.insert(name.text.clone()) {
                        self.diags
                            .push(Diagnostic::duplicate_name(name.loc.clone(), "field", &name.text));
                    }
                    fields.push((name.text.to_string(), ty));
                    tcs.push(tc);
                }
                let sty = self.table.data_type(TyDataTag::Struct, fields, loc.clone());
                (Rc::new(Tc::StructValue { fields: tcs, loc: loc.clone() }), sty)
            }
            Expr::UnionValue { ty, field, arg, loc } => self.check_union_value(ty, field, arg, loc),
            Expr::UnionSelect { condition, choices, default, loc } => {
                self.check_union_select(condition, choices, default.as_deref(), loc)
            }
            Expr::FuncValue { args, body, loc } => self.check_func_value(args, body, loc),
            Expr::MiscApply { func, args, loc } => self.check_misc_apply(func, args, loc),
            Expr::Eval { expr: inner, loc } => {
                self.scope.push_frame(false);
                let (tc, ty) = self.check_expr(inner);
                self.wrap_as_process(tc, ty, loc)
            }
            Expr::Link { ty, get, put, body, loc } => {
                self.scope.push_frame(false);
                let (tc, ty) = self.check_exec_link(ty, get, put, body, loc);
                self.wrap_as_process(tc, ty, loc)
            }
            Expr::Exec { bindings, body, loc } => {
                self.scope.push_frame(false);
                let (tc, ty) = self.check_exec_exec(bindings, body, loc);
                self.wrap_as_process(tc, ty, loc)
            }
            Expr::MiscAccess { object, field, loc } => self.check_access(object, field, loc),
            Expr::Let { bindings, body, loc, .. } => self.check_let(bindings, body, loc.clone()),
            Expr::Poly { arg, body, loc } => self.check_poly(arg, body, loc),
            Expr::PolyApply { poly, arg, loc } => self.check_poly_apply(poly, arg, loc),
            Expr::List { ty, elems, loc } => self.check_list(ty, elems, loc),
            Expr::Literal { ty, word, loc } => self.check_literal(ty, word, loc),
        }
    }

    /// TypeCheckExprForType: checks `expr` against an `expected` type
    /// already known from context, giving struct-value-implicit-type
    /// literals the chance to take their field types from `expected`
    /// rather than re-deriving them from each argument alone.
    pub fn check_expr_for_type(&mut self, expr: &Expr, expected: TypeId) -> Rc<Tc> {
        if let Expr::StructValueImplicitType { args, loc } = expr {
            if let Some((TyDataTag::Struct, fields)) = self.normal_data(expected) {
                if fields.len() == args.len() {
                    let mut seen = FxHashSet::default();
                    let mut tcs = Vec::with_capacity(args.len());
                    for ((name, e), (fname, fty)) in args.iter().zip(fields.iter()) {
                        if &*name.text != fname {
                            self.diags.push(Diagnostic::unrecognized_tag(name.loc.clone(), &name.text));
                        }
                        if !seen.insert(name.text.clone()) {
                            self.diags
                                .push(Diagnostic::duplicate_name(name.loc.clone(), "field", &name.text));
                        }
                        tcs.push(self.check_expr_for_type(e, *fty));
                    }
                    return Rc::new(Tc::StructValue { fields: tcs, loc: loc.clone() });
                }
            }
        }
        let (tc, ty) = self.check_expr(expr);
        if !self.table.types_equal(ty, expected) {
            self.diag_type_mismatch(ty, expected, expr.loc());
        }
        tc
    }

    // --- process bodies (TypeCheckExec) ---

    /// Checks an expression known to be a process's body: `Eval`/`Link`/
    /// `Exec` thread straight through into the *current* frame (they
    /// don't get their own closure — only the outermost proc-to-value
    /// wrapper in [`Checker::check_expr`] does that); anything else is
    /// checked as an ordinary value and "run" via a zero-argument
    /// `FuncApply`, since a process value *is* a zero-argument function
    /// here (spec §3.3, grounded on `tc.h`'s `FBLE_FUNC_VALUE_TC`
    /// doubling as both).
    fn check_exec(&mut self, expr: &Expr) -> (Rc<Tc>, TypeId) {
        match expr {
            Expr::Eval { expr, .. } => self.check_expr(expr),
            Expr::Link { ty, get, put, body, loc } => self.check_exec_link(ty, get, put, body, loc),
            Expr::Exec { bindings, body, loc } => self.check_exec_exec(bindings, body, loc),
            _ => {
                let (tc, ty) = self.check_expr(expr);
                match self.normal_proc(ty) {
                    Some(inner) => (Rc::new(Tc::FuncApply { func: tc, args: Vec::new(), loc: expr.loc().clone() }), inner),
                    None => {
                        self.diags
                            .push(Diagnostic::not_applicable(expr.loc().clone(), &self.describe(ty, 3)));
                        self.error(expr.loc().clone())
                    }
                }
            }
        }
    }

    /// A `get` port is bound as a value of type `Proc<port_ty>` (so
    /// referencing it bare in a process position already runs it — the
    /// `check_exec` fallback handles that with no extra support here); a
    /// `put` port is bound as an ordinary function `(port_ty) { Proc<Unit>; }`,
    /// so `put(x)` is a plain function call. Neither needs a dedicated
    /// "port type" or a `MiscApply` special case.
    fn check_exec_link(&mut self, ty: &Expr, get: &Name, put: &Name, body: &Expr, loc: &Loc) -> (Rc<Tc>, TypeId) {
        let port_ty = self.check_type(ty).unwrap_or_else(|| self.error_ty());
        let get_ty = self.table.proc_type(port_ty, get.loc.clone());
        let unit_ty = self.table.data_type(TyDataTag::Struct, Vec::new(), put.loc.clone());
        let unit_proc_ty = self.table.proc_type(unit_ty, put.loc.clone());
        let put_ty = self.table.func_type(vec![port_ty], unit_proc_ty, put.loc.clone());
        self.scope.push_local(get.text.to_string(), get_ty, get.loc.clone());
        self.scope.push_local(put.text.to_string(), put_ty, put.loc.clone());
        let (body_tc, body_ty) = self.check_exec(body);
        (Rc::new(Tc::Link { body: body_tc, loc: loc.clone() }), body_ty)
    }

    /// Exec bindings run concurrently, so each is checked as an ordinary
    /// value expression expected to produce a not-yet-run `Proc<T>` (not
    /// "run" via `check_exec`'s own fallback), and none of them can see
    /// any other binding's name: every binding is checked before any of
    /// them is pushed into scope (`typecheck.c`'s `FBLE_EXEC_EXPR` case
    /// inside `TypeCheckExec`).
    fn check_exec_exec(&mut self, bindings: &[Binding], body: &Expr, loc: &Loc) -> (Rc<Tc>, TypeId) {
        let mut binding_tcs = Vec::with_capacity(bindings.len());
        let mut bound_tys = Vec::with_capacity(bindings.len());
        for b in bindings {
            let declared = b.ty.as_ref().and_then(|t| self.check_type(t));
            let (val_tc, val_ty) = self.check_expr(&b.expr);
            let inner = match self.normal_proc(val_ty) {
                Some(inner) => inner,
                None => {
                    let found = self.describe(val_ty, 3);
                    self.diags.push(Diagnostic::not_a_process(b.expr.loc().clone(), &found));
                    self.error_ty()
                }
            };
            if let Some(d) = declared {
                if !self.table.types_equal(d, inner) {
                    self.diag_type_mismatch(inner, d, &b.name.loc);
                }
            }
            let bound_ty = declared.unwrap_or(inner);
            binding_tcs.push(val_tc);
            bound_tys.push(bound_ty);
        }
        for (b, ty) in bindings.iter().zip(bound_tys.into_iter()) {
            self.scope.push_local(b.name.text.to_string(), ty, b.name.loc.clone());
        }
        let (body_tc, body_ty) = self.check_exec(body);
        (Rc::new(Tc::Exec { bindings: binding_tcs, body: body_tc, loc: loc.clone() }), body_ty)
    }

    /// Closes the frame opened for a top-level `Eval`/`Link`/`Exec` and
    /// wraps the inner process computation as a zero-argument `FuncValue`
    /// (spec §3.3: a process value *is* a zero-arg function).
    fn wrap_as_process(&mut self, tc: Rc<Tc>, ty: TypeId, loc: &Loc) -> (Rc<Tc>, TypeId) {
        let captures = self.scope.pop_frame(&mut self.diags);
        let proc_ty = self.table.proc_type(ty, loc.clone());
        let wrapped = Rc::new(Tc::FuncValue { scope: captures, argc: 0, body: tc, body_loc: loc.clone() });
        (wrapped, proc_ty)
    }

    // --- individual rules ---

    fn check_union_value(&mut self, ty: &Expr, field: &Name, arg: &Expr, loc: &Loc) -> (Rc<Tc>, TypeId) {
        let Some(union_ty) = self.check_type(ty) else {
            return self.error(loc.clone());
        };
        match self.normal_data(union_ty) {
            Some((TyDataTag::Union, fields)) => match fields.iter().position(|(n, _)| n == &*field.text) {
                Some(tag) => {
                    let field_ty = fields[tag].1;
                    let arg_tc = self.check_expr_for_type(arg, field_ty);
                    (Rc::new(Tc::UnionValue { tag, arg: arg_tc, loc: loc.clone() }), union_ty)
                }
                None => {
                    self.diags.push(Diagnostic::unrecognized_tag(field.loc.clone(), &field.text));
                    self.error(loc.clone())
                }
            },
            _ => {
                self.diags
                    .push(Diagnostic::not_a_union(loc.clone(), &self.describe(union_ty, 3)));
                self.error(loc.clone())
            }
        }
    }

    fn check_union_select(
        &mut self,
        condition: &Expr,
        choices: &[AstChoice],
        default: Option<&Expr>,
        loc: &Loc,
    ) -> (Rc<Tc>, TypeId) {
        let (cond_tc, cond_ty) = self.check_expr(condition);
        let Some((TyDataTag::Union, fields)) = self.normal_data(cond_ty) else {
            self.diags.push(Diagnostic::not_a_union(loc.clone(), &self.describe(cond_ty, 3)));
            return self.error(loc.clone());
        };
        for c in choices {
            if !fields.iter().any(|(n, _)| n == &*c.name.text) {
                self.diags.push(Diagnostic::unrecognized_tag(c.name.loc.clone(), &c.name.text));
            }
        }
        let mut result_ty: Option<TypeId> = None;
        let mut default_tc: Option<Rc<Tc>> = None;
        let mut branches = Vec::with_capacity(fields.len());
        for (fname, _) in &fields {
            if let Some(c) = choices.iter().find(|c| &*c.name.text == fname) {
                let tc = match result_ty {
                    Some(rt) => self.check_expr_for_type(&c.expr, rt),
                    None => {
                        let (tc, ty) = self.check_expr(&c.expr);
                        result_ty = Some(ty);
                        tc
                    }
                };
                branches.push(tc);
            } else if let Some(d) = default {
                if default_tc.is_none() {
                    let tc = match result_ty {
                        Some(rt) => self.check_expr_for_type(d, rt),
                        None => {
                            let (tc, ty) = self.check_expr(d);
                            result_ty = Some(ty);
                            tc
                        }
                    };
                    default_tc = Some(tc);
                }
                branches.push(default_tc.clone().unwrap());
            } else {
                self.diags.push(Diagnostic::missing_tag(loc.clone(), fname));
                branches.push(Rc::new(Tc::TypeValue { loc: loc.clone() }));
            }
        }
        let result_ty = result_ty.unwrap_or_else(|| self.error_ty());
        let choices = branches
            .into_iter()
            .enumerate()
            .map(|(tag, body)| tc::Choice { tag, body })
            .collect();
        (
            Rc::new(Tc::UnionSelect { condition: cond_tc, choices, loc: loc.clone() }),
            result_ty,
        )
    }

    fn check_func_value(&mut self, args: &[crate::ast::TaggedExpr], body: &Expr, loc: &Loc) -> (Rc<Tc>, TypeId) {
        self.scope.push_frame(false);
        let mut arg_tys = Vec::with_capacity(args.len());
        for a in args {
            let ty = self.check_type(&a.ty).unwrap_or_else(|| self.error_ty());
            self.check_namespace(&a.name, 0);
            self.scope.push_local(a.name.text.to_string(), ty, a.name.loc.clone());
            arg_tys.push(ty);
        }
        let (body_tc, body_ty) = self.check_expr(body);
        let captures = self.scope.pop_frame(&mut self.diags);
        let func_ty = self.table.func_type(arg_tys, body_ty, loc.clone());
        let tc = Rc::new(Tc::FuncValue {
            scope: captures,
            argc: args.len(),
            body: body_tc,
            body_loc: loc.clone(),
        });
        (tc, func_ty)
    }

    fn check_misc_apply(&mut self, func: &Expr, args: &[Expr], loc: &Loc) -> (Rc<Tc>, TypeId) {
        let (func_tc, func_ty) = self.check_expr(func);
        if let Some((formals, result_ty)) = self.normal_func(func_ty) {
            if formals.len() != args.len() {
                self.diags.push(Diagnostic::arity_mismatch(loc.clone(), formals.len(), args.len()));
                return self.error(loc.clone());
            }
            let arg_tcs = formals
                .iter()
                .zip(args.iter())
                .map(|(fty, a)| self.check_expr_for_type(a, *fty))
                .collect();
            return (Rc::new(Tc::FuncApply { func: func_tc, args: arg_tcs, loc: loc.clone() }), result_ty);
        }
        if let Some(struct_ty) = self.as_type_value(func_ty) {
            if let Some((TyDataTag::Struct, fields)) = self.normal_data(struct_ty) {
                if fields.len() != args.len() {
                    self.diags.push(Diagnostic::arity_mismatch(loc.clone(), fields.len(), args.len()));
                    return self.error(loc.clone());
                }
                let arg_tcs = fields
                    .iter()
                    .zip(args.iter())
                    .map(|((_, fty), a)| self.check_expr_for_type(a, *fty))
                    .collect();
                return (Rc::new(Tc::StructValue { fields: arg_tcs, loc: loc.clone() }), struct_ty);
            }
        }
        self.diags.push(Diagnostic::not_applicable(loc.clone(), &self.describe(func_ty, 3)));
        self.error(loc.clone())
    }

    fn check_access(&mut self, object: &Expr, field: &Name, loc: &Loc) -> (Rc<Tc>, TypeId) {
        let (obj_tc, obj_ty) = self.check_expr(object);
        match self.normal_data(obj_ty) {
            Some((tag, fields)) => match fields.iter().position(|(n, _)| n == &*field.text) {
                Some(idx) => {
                    let field_ty = fields[idx].1;
                    let datatype = match tag {
                        TyDataTag::Struct => tc::DataTag::Struct,
                        TyDataTag::Union => tc::DataTag::Union,
                    };
                    (
                        Rc::new(Tc::DataAccess { datatype, obj: obj_tc, tag: idx, loc: loc.clone() }),
                        field_ty,
                    )
                }
                None => {
                    self.diags.push(Diagnostic::unrecognized_tag(field.loc.clone(), &field.text));
                    self.error(loc.clone())
                }
            },
            None => {
                self.diags
                    .push(Diagnostic::not_a_data_type(loc.clone(), &self.describe(obj_ty, 3)));
                self.error(loc.clone())
            }
        }
    }

    fn check_let(&mut self, bindings: &[Binding], body: &Expr, loc: Loc) -> (Rc<Tc>, TypeId) {
        enum Pending {
            Explicit(TypeId),
            /// Carries the declared kind level too (from the binding's own
            /// `kind`, e.g. `@ Foo@ = ...` at level 1 vs `% x = ...` at
            /// level 0), since an inferred binding's namespace and final
            /// kind check both depend on it, not just on whether a type
            /// was given explicitly.
            Inferred(TypeId, u32),
        }
        let mut pending = Vec::with_capacity(bindings.len());
        for b in bindings {
            match b.ty.as_deref() {
                Some(ty_expr) => {
                    let expected = self.check_type(ty_expr).unwrap_or_else(|| self.error_ty());
                    let level = self.table.kind_of(expected).basic_level().unwrap_or(1);
                    self.check_namespace(&b.name, level);
                    self.scope.push_local(b.name.text.to_string(), expected, b.name.loc.clone());
                    pending.push(Pending::Explicit(expected));
                }
                None => {
                    let level = b
                        .kind
                        .as_ref()
                        .map(to_kind)
                        .and_then(|k| k.basic_level())
                        .unwrap_or(0);
                    let placeholder = self.table.var_type(level, format!("__{}", b.name.text), b.name.loc.clone());
                    self.scope.push_local(b.name.text.to_string(), placeholder, b.name.loc.clone());
                    self.check_namespace(&b.name, level);
                    pending.push(Pending::Inferred(placeholder, level));
                }
            }
        }
        let mut let_bindings = Vec::with_capacity(bindings.len());
        for (b, p) in bindings.iter().zip(pending.into_iter()) {
            let value_tc = match p {
                Pending::Explicit(expected) => self.check_expr_for_type(&b.expr, expected),
                Pending::Inferred(placeholder, level) => {
                    let (tc, ty) = self.check_expr(&b.expr);
                    let expected_kind = Kind::basic(level, b.name.loc.clone());
                    let actual_kind = self.table.kind_of(ty);
                    if actual_kind != expected_kind {
                        self.diags.push(Diagnostic::kind_mismatch(
                            b.name.loc.clone(),
                            &format!("{expected_kind:?}"),
                            &format!("{actual_kind:?}"),
                        ));
                    }
                    self.table.assign_var(placeholder, ty);
                    if self.table.is_vacuous(placeholder) {
                        self.diags.push(Diagnostic::vacuous_type(b.name.loc.clone(), &b.name.text));
                    }
                    tc
                }
            };
            let_bindings.push(LetBinding { name: b.name.text.clone(), value: value_tc });
        }
        let (body_tc, body_ty) = self.check_expr(body);
        let recursive = bindings.iter().any(|b| self.scope.was_accessed(&b.name.text));
        (Rc::new(Tc::Let { recursive, bindings: let_bindings, body: body_tc, loc: loc.clone() }), body_ty)
    }

    fn check_poly(&mut self, arg: &crate::ast::TypeField, body: &Expr, loc: &Loc) -> (Rc<Tc>, TypeId) {
        // A poly binder's name always lives in the type namespace (`T@`),
        // independent of its own kind's level — level 0 is the ordinary
        // `List@<T@>`-style type parameter, not a namespace violation.
        if arg.name.space != Namespace::Type {
            self.diags
                .push(Diagnostic::namespace_mismatch(arg.name.loc.clone(), &arg.name.text));
        }
        let kind = to_kind(&arg.kind);
        let level = match kind.basic_level() {
            Some(l) => l,
            None => {
                // Higher-kinded binders (a poly-kind argument, e.g. a type
                // constructor parameter) aren't representable by
                // `TypeTable::var_type`, which only models flat basic
                // levels (see the "var_type is a plain u32 level" design
                // decision).
                self.diags
                    .push(Diagnostic::kind_mismatch(arg.name.loc.clone(), "a basic kind", "a polymorphic kind"));
                0
            }
        };
        let param = self.table.var_type(level, arg.name.text.to_string(), arg.name.loc.clone());
        let param_as_value = self.table.type_type(param, arg.name.loc.clone());
        self.scope.push_local(arg.name.text.to_string(), param_as_value, arg.name.loc.clone());
        let (body_tc, body_ty) = self.check_expr(body);
        let poly_ty = self.table.poly(param, body_ty, loc.clone());
        let let_tc = Rc::new(Tc::Let {
            recursive: false,
            bindings: vec![LetBinding {
                name: arg.name.text.clone(),
                value: Rc::new(Tc::TypeValue { loc: loc.clone() }),
            }],
            body: body_tc,
            loc: loc.clone(),
        });
        (let_tc, poly_ty)
    }

    fn check_poly_apply(&mut self, poly: &Expr, arg: &Expr, loc: &Loc) -> (Rc<Tc>, TypeId) {
        let (poly_tc, poly_ty) = self.check_expr(poly);
        let Some(arg_ty) = self.check_type(arg) else {
            return self.error(loc.clone());
        };
        match self.normal_poly(poly_ty) {
            Some((param, body_ty)) => {
                let param_kind = self.table.kind_of(param);
                let arg_kind = self.table.kind_of(arg_ty);
                if param_kind != arg_kind {
                    self.diags.push(Diagnostic::kind_mismatch(
                        loc.clone(),
                        &format!("{param_kind:?}"),
                        &format!("{arg_kind:?}"),
                    ));
                }
                let result_ty = self.table.subst(body_ty, param, arg_ty);
                (poly_tc, result_ty)
            }
            None => {
                self.diags
                    .push(Diagnostic::not_applicable(loc.clone(), &self.describe(poly_ty, 3)));
                self.error(loc.clone())
            }
        }
    }

    fn check_list(&mut self, ty: &Expr, elems: &[Expr], loc: &Loc) -> (Rc<Tc>, TypeId) {
        let elem_ty = match self.check_type(ty) {
            Some(t) => t,
            None => return self.error(loc.clone()),
        };
        let elem_tcs: Vec<Rc<Tc>> = elems.iter().map(|e| self.check_expr_for_type(e, elem_ty)).collect();
        let (func_tc, list_ty) = self.build_cons_lambda(elem_ty, elem_tcs, loc.clone());
        (func_tc, list_ty)
    }

    fn check_literal(&mut self, ty: &Expr, word: &str, loc: &Loc) -> (Rc<Tc>, TypeId) {
        let (spec_tc, spec_ty) = self.check_expr(ty);
        let Some((TyDataTag::Struct, fields)) = self.normal_data(spec_ty) else {
            self.diags.push(Diagnostic::bad_literal_spec(loc.clone()));
            return self.error(loc.clone());
        };
        if fields.iter().any(|(n, _)| n.chars().count() != 1) {
            self.diags.push(Diagnostic::bad_literal_spec(loc.clone()));
            return self.error(loc.clone());
        }
        if word.is_empty() {
            self.diags.push(Diagnostic::empty_literal_word(loc.clone()));
            return self.error(loc.clone());
        }
        let elem_ty = fields[0].1;
        let spec_idx = self.scope.push_local("spec", spec_ty, loc.clone());
        let spec_var_tc = Rc::new(Tc::Var { index: spec_idx, loc: loc.clone() });

        let elem_tcs: Vec<Rc<Tc>> = word
            .chars()
            .map(|ch| {
                let name = ch.to_string();
                let tag = match fields.iter().position(|(n, _)| *n == name) {
                    Some(t) => t,
                    None => {
                        self.diags.push(Diagnostic::unrecognized_tag(loc.clone(), &name));
                        0
                    }
                };
                Rc::new(Tc::DataAccess {
                    datatype: tc::DataTag::Struct,
                    obj: spec_var_tc.clone(),
                    tag,
                    loc: loc.clone(),
                })
            })
            .collect();
        let (lambda_tc, list_ty) = self.build_cons_lambda(elem_ty, elem_tcs, loc.clone());

        let let_tc = Rc::new(Tc::Let {
            recursive: false,
            bindings: vec![LetBinding { name: "spec".into(), value: spec_tc }],
            body: lambda_tc,
            loc: loc.clone(),
        });
        (let_tc, list_ty)
    }

    /// Shared by list and literal desugaring (spec §4.C "List
    /// desugaring"/"Literal desugaring"): `\(cons, nil) { cons e1 (cons
    /// e2 (... (cons eN nil))); }`. The outer `\T. ... @ typeof(e1)`
    /// poly layer is skipped — `elem_ty` is already known statically
    /// here, and `Tc` carries no type information for a poly-apply over
    /// it to erase.
    fn build_cons_lambda(&mut self, elem_ty: TypeId, elem_tcs: Vec<Rc<Tc>>, loc: Loc) -> (Rc<Tc>, TypeId) {
        let r_var = self.table.var_type(0, "R", loc.clone());
        let cons_ty = self.table.func_type(vec![elem_ty, r_var], r_var, loc.clone());
        self.scope.push_frame(false);
        let cons_idx = self.scope.push_local("cons", cons_ty, loc.clone());
        let nil_idx = self.scope.push_local("nil", r_var, loc.clone());
        let mut body = Rc::new(Tc::Var { index: nil_idx, loc: loc.clone() });
        for elem_tc in elem_tcs.into_iter().rev() {
            body = Rc::new(Tc::FuncApply {
                func: Rc::new(Tc::Var { index: cons_idx, loc: loc.clone() }),
                args: vec![elem_tc, body],
                loc: loc.clone(),
            });
        }
        let captures = self.scope.pop_frame(&mut self.diags);
        let func_tc = Rc::new(Tc::FuncValue { scope: captures, argc: 2, body, body_loc: loc.clone() });
        let list_func_ty = self.table.func_type(vec![cons_ty, r_var], r_var, loc.clone());
        let list_ty = self.table.poly(r_var, list_func_ty, loc);
        (func_tc, list_ty)
    }
}

pub(crate) fn module_var_name(path: &[Name]) -> String {
    path.iter().map(|n| n.text.as_ref()).collect::<Vec<_>>().join("/")
}

#[cfg(test)]
mod tests;
