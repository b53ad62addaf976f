//! Types (spec §3.2, §4.B): a directed graph of struct/union/func/proc/
//! poly/var/type-type nodes living in a [`fble_heap::GraphHeap`], plus
//! the operations (`HasParam`, `Subst`, `Normal`, `TypesEqual`,
//! `KindsEqual`/`GetKind`) that walk it.
//!
//! Every cycle in this graph passes through at least one `Var` whose
//! `value` closes the loop (§3.2); that's exactly the tie-the-knot case
//! `fble_heap::GraphHeap::add_ref` is built to detect.

use crate::kind::{Kind, KindData};
use fble_common::Loc;
use fble_heap::{GraphHeap, ObjId, Traced};
use rustc_hash::FxHashSet;
use smallvec::SmallVec;

/// Types are graph-heap objects; their id doubles as the cycle-
/// detection id (§4.A) and the "equality up to substitution" id (§3.2).
pub type TypeId = ObjId;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DataTag {
    Struct,
    Union,
}

#[derive(Clone, Debug)]
pub enum TypeData {
    Data {
        tag: DataTag,
        fields: Vec<(String, TypeId)>,
        loc: Loc,
    },
    Func {
        args: Vec<TypeId>,
        result: TypeId,
        loc: Loc,
    },
    Proc {
        inner: TypeId,
        loc: Loc,
    },
    Poly {
        arg: TypeId,
        body: TypeId,
        loc: Loc,
    },
    PolyApply {
        poly: TypeId,
        arg: TypeId,
        loc: Loc,
    },
    Var {
        kind: Kind,
        name: String,
        value: Option<TypeId>,
        loc: Loc,
    },
    TypeType {
        inner: TypeId,
        loc: Loc,
    },
}

impl TypeData {
    pub fn loc(&self) -> &Loc {
        match self {
            TypeData::Data { loc, .. }
            | TypeData::Func { loc, .. }
            | TypeData::Proc { loc, .. }
            | TypeData::Poly { loc, .. }
            | TypeData::PolyApply { loc, .. }
            | TypeData::Var { loc, .. }
            | TypeData::TypeType { loc, .. } => loc,
        }
    }

    fn set_var_value(&mut self, value: TypeId) {
        match self {
            TypeData::Var { value: v, .. } => *v = Some(value),
            _ => unreachable!("set_var_value called on a non-Var type"),
        }
    }
}

impl Traced for TypeData {
    fn trace(&self, visit: &mut dyn FnMut(ObjId)) {
        match self {
            TypeData::Data { fields, .. } => {
                for (_, t) in fields {
                    visit(*t);
                }
            }
            TypeData::Func { args, result, .. } => {
                for a in args {
                    visit(*a);
                }
                visit(*result);
            }
            TypeData::Proc { inner, .. } | TypeData::TypeType { inner, .. } => visit(*inner),
            TypeData::Poly { arg, body, .. } => {
                visit(*arg);
                visit(*body);
            }
            TypeData::PolyApply { poly, arg, .. } => {
                visit(*poly);
                visit(*arg);
            }
            TypeData::Var { value, .. } => {
                if let Some(v) = value {
                    visit(*v);
                }
            }
        }
    }
}

/// The type table: a non-incremental interner over a cycle-aware heap,
/// exposing the smart constructors and operations of spec §4.B.
pub struct TypeTable {
    heap: GraphHeap<TypeData>,
}

impl Default for TypeTable {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeTable {
    pub fn new() -> Self {
        TypeTable {
            heap: GraphHeap::new(|_| {}),
        }
    }

    pub fn get(&self, ty: TypeId) -> &TypeData {
        self.heap.get(ty)
    }

    pub fn stats(&self) -> fble_heap::Stats {
        self.heap.stats()
    }

    pub fn retain(&mut self, ty: TypeId) {
        self.heap.retain(ty);
    }

    pub fn release(&mut self, ty: TypeId) {
        self.heap.release(ty);
    }

    // --- Smart constructors (§3.2 invariants) ---

    pub fn data_type(&mut self, tag: DataTag, fields: Vec<(String, TypeId)>, loc: Loc) -> TypeId {
        let ty = self.heap.alloc(TypeData::Data {
            tag,
            fields: fields.clone(),
            loc,
        });
        for (_, f) in &fields {
            self.heap.add_ref(ty, *f);
        }
        ty
    }

    pub fn func_type(&mut self, args: Vec<TypeId>, result: TypeId, loc: Loc) -> TypeId {
        let ty = self.heap.alloc(TypeData::Func {
            args: args.clone(),
            result,
            loc,
        });
        for a in &args {
            self.heap.add_ref(ty, *a);
        }
        self.heap.add_ref(ty, result);
        ty
    }

    pub fn proc_type(&mut self, inner: TypeId, loc: Loc) -> TypeId {
        let ty = self.heap.alloc(TypeData::Proc { inner, loc });
        self.heap.add_ref(ty, inner);
        ty
    }

    pub fn type_type(&mut self, inner: TypeId, loc: Loc) -> TypeId {
        let ty = self.heap.alloc(TypeData::TypeType { inner, loc });
        self.heap.add_ref(ty, inner);
        ty
    }

    /// Invariant 3: a `Var`'s stored kind always has level 0; a var-type
    /// of basic kind level `level` is a level-0 `Var` wrapped in
    /// `TypeType` `level` times.
    pub fn var_type(&mut self, level: u32, name: impl Into<String>, loc: Loc) -> TypeId {
        let var = self.heap.alloc(TypeData::Var {
            kind: Kind::basic(0, loc.clone()),
            name: name.into(),
            value: None,
            loc: loc.clone(),
        });
        let mut ty = var;
        for _ in 0..level {
            let wrapped = self.type_type(ty, loc.clone());
            self.heap.release(ty);
            ty = wrapped;
        }
        ty
    }

    /// Invariant 4: assigning a value to a (possibly `TypeType`-wrapped)
    /// `Var` descends through matching `TypeType` layers on both sides
    /// before tying the knot on the innermost `Var`.
    pub fn assign_var(&mut self, var: TypeId, value: TypeId) {
        let mut v = var;
        let mut val = value;
        loop {
            let (v_inner, val_inner) = match (self.get(v), self.get(val)) {
                (TypeData::TypeType { inner: vi, .. }, TypeData::TypeType { inner: vali, .. }) => {
                    (*vi, *vali)
                }
                (TypeData::Var { value: None, .. }, _) => break,
                _ => panic!("assign_var: mismatched TypeType nesting between var and value"),
            };
            v = v_inner;
            val = val_inner;
        }
        self.heap.get_mut(v).set_var_value(val);
        self.heap.add_ref(v, val);
    }

    /// Invariant 1: `Poly` of `TypeType(x)` rewrites to `TypeType(Poly
    /// of x)`.
    pub fn poly(&mut self, arg: TypeId, body: TypeId, loc: Loc) -> TypeId {
        if let TypeData::TypeType {
            inner,
            loc: inner_loc,
        } = self.get(body).clone()
        {
            let rewritten = self.poly(arg, inner, loc);
            let ty = self.type_type(rewritten, inner_loc);
            self.heap.release(rewritten);
            return ty;
        }
        let ty = self.heap.alloc(TypeData::Poly { arg, body, loc });
        self.heap.add_ref(ty, arg);
        self.heap.add_ref(ty, body);
        ty
    }

    /// Invariant 2: `PolyApply(TypeType(f), x)` rewrites to
    /// `TypeType(PolyApply(f, x))`.
    pub fn poly_apply(&mut self, poly: TypeId, arg: TypeId, loc: Loc) -> TypeId {
        if let TypeData::TypeType {
            inner: f,
            loc: inner_loc,
        } = self.get(poly).clone()
        {
            let rewritten = self.poly_apply(f, arg, loc);
            let ty = self.type_type(rewritten, inner_loc);
            self.heap.release(rewritten);
            return ty;
        }
        let ty = self.heap.alloc(TypeData::PolyApply { poly, arg, loc });
        self.heap.add_ref(ty, poly);
        self.heap.add_ref(ty, arg);
        ty
    }

    // --- §4.B.1 GetKind ---

    pub fn kind_of(&self, ty: TypeId) -> Kind {
        match self.get(ty) {
            TypeData::Data { loc, .. } | TypeData::Func { loc, .. } | TypeData::Proc { loc, .. } => {
                Kind::basic(0, loc.clone())
            }
            TypeData::Poly { arg, body, loc } => {
                let arg_kind = self.kind_of(*arg).level_adjust(1);
                let body_kind = self.kind_of(*body);
                Kind::poly(arg_kind, body_kind, loc.clone())
            }
            TypeData::PolyApply { poly, .. } => match self.kind_of(*poly).data() {
                KindData::Poly { result, .. } => result.clone(),
                KindData::Basic { .. } => {
                    panic!("GetKind: PolyApply of a non-poly-kinded type")
                }
            },
            TypeData::Var { kind, .. } => kind.clone(),
            TypeData::TypeType { inner, .. } => self.kind_of(*inner).level_adjust(1),
        }
    }

    // --- §4.B.2 HasParam ---

    pub fn has_param(&self, ty: TypeId, param: TypeId) -> bool {
        let mut visited = FxHashSet::default();
        self.has_param_rec(ty, param, &mut visited)
    }

    fn has_param_rec(&self, ty: TypeId, param: TypeId, visited: &mut FxHashSet<TypeId>) -> bool {
        if ty == param {
            return true;
        }
        if !visited.insert(ty) {
            return false;
        }
        match self.get(ty) {
            TypeData::Data { fields, .. } => fields
                .iter()
                .any(|(_, t)| self.has_param_rec(*t, param, visited)),
            TypeData::Func { args, result, .. } => {
                args.iter().any(|a| self.has_param_rec(*a, param, visited))
                    || self.has_param_rec(*result, param, visited)
            }
            TypeData::Proc { inner, .. } | TypeData::TypeType { inner, .. } => {
                self.has_param_rec(*inner, param, visited)
            }
            TypeData::Poly { arg, body, .. } => {
                // A Poly shadows `param` when its own bound var is `param`.
                *arg != param && self.has_param_rec(*body, param, visited)
            }
            TypeData::PolyApply { poly, arg, .. } => {
                self.has_param_rec(*poly, param, visited) || self.has_param_rec(*arg, param, visited)
            }
            TypeData::Var { value, .. } => {
                value.is_some_and(|v| self.has_param_rec(v, param, visited))
            }
        }
    }

    // --- §4.B.3 Subst ---

    pub fn subst(&mut self, ty: TypeId, param: TypeId, arg: TypeId) -> TypeId {
        let mut memo: SmallVec<[(TypeId, TypeId); 4]> = SmallVec::new();
        self.subst_rec(ty, param, arg, &mut memo)
    }

    fn subst_rec(
        &mut self,
        ty: TypeId,
        param: TypeId,
        arg: TypeId,
        memo: &mut SmallVec<[(TypeId, TypeId); 4]>,
    ) -> TypeId {
        if !self.has_param(ty, param) {
            self.heap.retain(ty);
            return ty;
        }
        if ty == param {
            self.heap.retain(arg);
            return arg;
        }

        let source_id = self.heap.id(ty);
        let data = self.get(ty).clone();
        let new_ty = match data {
            TypeData::Data { tag, fields, loc } => {
                let fields: Vec<_> = fields
                    .into_iter()
                    .map(|(name, t)| (name, self.subst_rec(t, param, arg, memo)))
                    .collect();
                let new_ty = self.data_type(tag, fields.clone(), loc);
                for (_, t) in fields {
                    self.heap.release(t);
                }
                new_ty
            }
            TypeData::Func { args, result, loc } => {
                let args: Vec<_> = args
                    .into_iter()
                    .map(|a| self.subst_rec(a, param, arg, memo))
                    .collect();
                let result = self.subst_rec(result, param, arg, memo);
                let new_ty = self.func_type(args.clone(), result, loc);
                for a in args {
                    self.heap.release(a);
                }
                self.heap.release(result);
                new_ty
            }
            TypeData::Proc { inner, loc } => {
                let inner = self.subst_rec(inner, param, arg, memo);
                let new_ty = self.proc_type(inner, loc);
                self.heap.release(inner);
                new_ty
            }
            TypeData::Poly {
                arg: bound,
                body,
                loc,
            } => {
                // `bound` is borrowed straight from `ty`'s own structure,
                // not a fresh owned copy, so it's passed through as-is.
                let body = self.subst_rec(body, param, arg, memo);
                let new_ty = self.poly(bound, body, loc);
                self.heap.release(body);
                new_ty
            }
            TypeData::PolyApply { poly, arg: pa, loc } => {
                let poly = self.subst_rec(poly, param, arg, memo);
                let pa = self.subst_rec(pa, param, arg, memo);
                let new_ty = self.poly_apply(poly, pa, loc);
                self.heap.release(poly);
                self.heap.release(pa);
                new_ty
            }
            TypeData::Var {
                kind,
                name,
                value: Some(inner),
                loc,
            } => {
                // Memoized by the pointer/id of the var's *value*, so a
                // recursive type's self-reference terminates instead of
                // looping forever.
                if let Some(&(_, replacement)) = memo.iter().find(|(orig, _)| *orig == inner) {
                    self.heap.retain(replacement);
                    return replacement;
                }
                let new_var = self.heap.alloc(TypeData::Var {
                    kind,
                    name,
                    value: None,
                    loc,
                });
                memo.push((inner, new_var));
                let new_value = self.subst_rec(inner, param, arg, memo);
                self.heap.get_mut(new_var).set_var_value(new_value);
                self.heap.add_ref(new_var, new_value);
                self.heap.release(new_value);
                return new_var; // fresh id per invariant 5 — not inherited
            }
            TypeData::Var { value: None, .. } => {
                // Unreachable: an unequal, valueless Var can't contain
                // `param`, so `has_param` would already have returned
                // false above.
                self.heap.retain(ty);
                return ty;
            }
            TypeData::TypeType { inner, loc } => {
                let inner = self.subst_rec(inner, param, arg, memo);
                let new_ty = self.type_type(inner, loc);
                self.heap.release(inner);
                new_ty
            }
        };
        self.heap.set_id(new_ty, source_id);
        new_ty
    }

    // --- §4.B.4 Normal ---

    /// `None` is the C API's `NULL`: either a true cycle (re-entered
    /// while normalizing the same id) or — through [`TypeTable::is_vacuous`] —
    /// a vacuous type.
    pub fn normal(&mut self, ty: TypeId) -> Option<TypeId> {
        let mut normalizing = FxHashSet::default();
        self.normal_rec(ty, &mut normalizing)
    }

    fn normal_rec(&mut self, ty: TypeId, normalizing: &mut FxHashSet<u64>) -> Option<TypeId> {
        let id = self.heap.id(ty);
        if !normalizing.insert(id) {
            return None;
        }
        let result = match self.get(ty).clone() {
            TypeData::Poly { arg, body, .. } => {
                // eta: Poly(a, PolyApply(f, a)) => normal(f)
                if let TypeData::PolyApply {
                    poly: f,
                    arg: applied,
                    ..
                } = self.get(body).clone()
                {
                    if applied == arg {
                        self.normal_rec(f, normalizing)
                    } else {
                        self.heap.retain(ty);
                        Some(ty)
                    }
                } else {
                    self.heap.retain(ty);
                    Some(ty)
                }
            }
            TypeData::PolyApply { poly, arg: x, loc } => {
                let norm_poly = self.normal_rec(poly, normalizing);
                let result = match norm_poly {
                    None => None,
                    Some(norm_poly) => {
                        let r = if let TypeData::Poly { arg: a, body, .. } = self.get(norm_poly).clone()
                        {
                            let substituted = self.subst(body, a, x);
                            let r = self.normal_rec(substituted, normalizing);
                            self.heap.release(substituted);
                            r
                        } else {
                            let rebuilt = self.heap.alloc(TypeData::PolyApply {
                                poly: norm_poly,
                                arg: x,
                                loc,
                            });
                            self.heap.add_ref(rebuilt, norm_poly);
                            self.heap.add_ref(rebuilt, x);
                            Some(rebuilt)
                        };
                        self.heap.release(norm_poly);
                        r
                    }
                };
                result
            }
            TypeData::Var { value: Some(v), .. } => self.normal_rec(v, normalizing),
            _ => {
                self.heap.retain(ty);
                Some(ty)
            }
        };
        normalizing.remove(&id);
        result
    }

    /// A type is vacuous if its normal form is `None` after stripping
    /// `TypeType` and `Poly` layers (spec §4.B.4).
    pub fn is_vacuous(&mut self, ty: TypeId) -> bool {
        let mut cur = ty;
        loop {
            let next = match self.get(cur) {
                TypeData::TypeType { inner, .. } => Some(*inner),
                TypeData::Poly { body, .. } => Some(*body),
                _ => None,
            };
            match next {
                Some(n) => cur = n,
                None => break,
            }
        }
        let mut normalizing = FxHashSet::default();
        match self.normal_rec(cur, &mut normalizing) {
            Some(owned) => {
                self.heap.release(owned);
                false
            }
            None => true,
        }
    }

    // --- §4.B.5 TypesEqual ---

    pub fn types_equal(&mut self, a: TypeId, b: TypeId) -> bool {
        let mut assumed = FxHashSet::default();
        self.types_equal_rec(a, b, &mut assumed)
    }

    fn types_equal_rec(
        &mut self,
        a: TypeId,
        b: TypeId,
        assumed: &mut FxHashSet<(u64, u64)>,
    ) -> bool {
        let mut scratch = FxHashSet::default();
        let na = match self.normal_rec(a, &mut scratch) {
            Some(x) => x,
            None => return false,
        };
        scratch.clear();
        let nb = match self.normal_rec(b, &mut scratch) {
            Some(x) => x,
            None => {
                self.heap.release(na);
                return false;
            }
        };

        let id_a = self.heap.id(na);
        let id_b = self.heap.id(nb);
        if id_a == id_b {
            self.heap.release(na);
            self.heap.release(nb);
            return true;
        }

        let key = (id_a.min(id_b), id_a.max(id_b));
        if assumed.contains(&key) {
            self.heap.release(na);
            self.heap.release(nb);
            return true;
        }
        // Assume the pair equal before recursing into their structure, the
        // same way type.c's TypesEqual does for every pair compared, not
        // just Poly: a corecursive Data/Func/Proc/TypeType pair that loops
        // back to (na, nb) through its own fields terminates here instead
        // of recursing forever.
        assumed.insert(key);

        let result = match (self.get(na).clone(), self.get(nb).clone()) {
            (
                TypeData::Data {
                    tag: t1, fields: f1, ..
                },
                TypeData::Data {
                    tag: t2, fields: f2, ..
                },
            ) => {
                t1 == t2
                    && f1.len() == f2.len()
                    && f1.iter().zip(f2.iter()).all(|((n1, ty1), (n2, ty2))| {
                        n1 == n2 && self.types_equal_rec(*ty1, *ty2, assumed)
                    })
            }
            (
                TypeData::Func {
                    args: a1, result: r1, ..
                },
                TypeData::Func {
                    args: a2, result: r2, ..
                },
            ) => {
                a1.len() == a2.len()
                    && a1
                        .iter()
                        .zip(a2.iter())
                        .all(|(x, y)| self.types_equal_rec(*x, *y, assumed))
                    && self.types_equal_rec(r1, r2, assumed)
            }
            (TypeData::Proc { inner: i1, .. }, TypeData::Proc { inner: i2, .. }) => {
                self.types_equal_rec(i1, i2, assumed)
            }
            (
                TypeData::Poly {
                    arg: a1, body: b1, ..
                },
                TypeData::Poly {
                    arg: a2, body: b2, ..
                },
            ) => {
                if self.kind_of(a1) != self.kind_of(a2) {
                    false
                } else {
                    // The bound vars themselves, not the Poly nodes (already
                    // covered by `key` above): a1/a2 are fresh per
                    // elaboration (check_poly mints an uninterned var_type
                    // on every call), so their ids only coincide between
                    // alpha-equivalent bodies through this assumed pair.
                    let id_a1 = self.heap.id(a1);
                    let id_a2 = self.heap.id(a2);
                    assumed.insert((id_a1.min(id_a2), id_a1.max(id_a2)));
                    self.types_equal_rec(b1, b2, assumed)
                }
            }
            (TypeData::Var { .. }, TypeData::Var { .. }) => na == nb,
            (TypeData::TypeType { inner: i1, .. }, TypeData::TypeType { inner: i2, .. }) => {
                self.types_equal_rec(i1, i2, assumed)
            }
            _ => false,
        };

        self.heap.release(na);
        self.heap.release(nb);
        result
    }
}

#[cfg(test)]
mod tests;
