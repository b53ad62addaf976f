//! The typed intermediate representation (spec §3.3), grounded directly
//! on `tc.h`'s `FbleTc`: names and types are gone, field/variable
//! references are integer indices, and processes are just zero-argument
//! functions (`Link`/`Exec` describe what running the process computes,
//! not a value that later gets run).

use fble_common::Loc;
use std::rc::Rc;

/// Where a variable lives, resolved by [`crate::scope::Scope`] (spec
/// §4.C "Scope"): a local slot in the current frame, or a value
/// captured from an enclosing function's frame.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum VarSource {
    Local,
    Static,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct VarIndex {
    pub source: VarSource,
    pub index: usize,
}

impl VarIndex {
    pub fn local(index: usize) -> Self {
        VarIndex {
            source: VarSource::Local,
            index,
        }
    }

    pub fn static_(index: usize) -> Self {
        VarIndex {
            source: VarSource::Static,
            index,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DataTag {
    Struct,
    Union,
}

/// One binding in a `Let`: the checked body plus whether this slot is
/// itself referenced recursively (drives whether the compiler needs a
/// `RefValue` placeholder at this frame slot).
#[derive(Clone, Debug)]
pub struct LetBinding {
    pub name: Rc<str>,
    pub value: Rc<Tc>,
}

#[derive(Clone, Debug)]
pub struct Choice {
    pub tag: usize,
    pub body: Rc<Tc>,
}

#[derive(Clone, Debug)]
pub enum Tc {
    /// A type used as a value (spec §3.5 "TypeValue"): all type
    /// information has already been erased by the time this node is
    /// reached, so it carries nothing but a location.
    TypeValue { loc: Loc },
    Var { index: VarIndex, loc: Loc },
    Let {
        recursive: bool,
        bindings: Vec<LetBinding>,
        body: Rc<Tc>,
        loc: Loc,
    },
    StructValue { fields: Vec<Rc<Tc>>, loc: Loc },
    UnionValue {
        tag: usize,
        arg: Rc<Tc>,
        loc: Loc,
    },
    UnionSelect {
        condition: Rc<Tc>,
        choices: Vec<Choice>,
        loc: Loc,
    },
    /// Struct or union field access; `datatype` records which, since the
    /// runtime error on a union access is "wrong tag", not "no field".
    DataAccess {
        datatype: DataTag,
        obj: Rc<Tc>,
        tag: usize,
        loc: Loc,
    },
    FuncValue {
        /// Static variables captured from the enclosing scope, in the
        /// order the function body indexes them under `VarSource::Static`.
        scope: Vec<VarIndex>,
        argc: usize,
        body: Rc<Tc>,
        body_loc: Loc,
    },
    FuncApply {
        func: Rc<Tc>,
        args: Vec<Rc<Tc>>,
        loc: Loc,
    },
    /// A `Link ~ get, put; body` process: running it creates one link
    /// (a FIFO queue) and two ports bound as the next two locals of
    /// `body` (get first, then put).
    Link { body: Rc<Tc>, loc: Loc },
    /// An `Exec` process: each binding's process runs, its result binds
    /// to the next local slot, then `body` runs with all of them bound.
    Exec {
        bindings: Vec<Rc<Tc>>,
        body: Rc<Tc>,
        loc: Loc,
    },
    /// Attaches a profiling block around `body` (spec §4.G): emitted
    /// around every function value and at entry/exit for the
    /// non-tail-call boundaries the compiler needs to mark.
    Profile { name: Rc<str>, body: Rc<Tc> },
}

impl Tc {
    pub fn loc(&self) -> &Loc {
        match self {
            Tc::TypeValue { loc }
            | Tc::Var { loc, .. }
            | Tc::Let { loc, .. }
            | Tc::StructValue { loc, .. }
            | Tc::UnionValue { loc, .. }
            | Tc::UnionSelect { loc, .. }
            | Tc::DataAccess { loc, .. }
            | Tc::FuncApply { loc, .. }
            | Tc::Link { loc, .. }
            | Tc::Exec { loc, .. } => loc,
            Tc::FuncValue { body_loc, .. } => body_loc,
            Tc::Profile { body, .. } => body.loc(),
        }
    }
}
