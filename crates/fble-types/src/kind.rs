//! Kinds (spec §3.1): the "type of a type". Unlike `Type`, a `Kind` can
//! never be part of a cycle (there's no kind-level equivalent of a
//! recursive `Var`), so it carries its own plain, non-cyclic reference
//! count — `Rc` — rather than living in a [`fble_heap::GraphHeap`].

use fble_common::Loc;
use std::rc::Rc;

#[derive(Clone, Debug)]
pub struct Kind(Rc<KindData>);

#[derive(Debug)]
pub enum KindData {
    Basic { level: u32, loc: Loc },
    Poly { arg: Kind, result: Kind, loc: Loc },
}

impl Kind {
    pub fn basic(level: u32, loc: Loc) -> Kind {
        Kind(Rc::new(KindData::Basic { level, loc }))
    }

    pub fn poly(arg: Kind, result: Kind, loc: Loc) -> Kind {
        Kind(Rc::new(KindData::Poly { arg, result, loc }))
    }

    pub fn data(&self) -> &KindData {
        &self.0
    }

    pub fn loc(&self) -> &Loc {
        match &*self.0 {
            KindData::Basic { loc, .. } | KindData::Poly { loc, .. } => loc,
        }
    }

    pub fn basic_level(&self) -> Option<u32> {
        match &*self.0 {
            KindData::Basic { level, .. } => Some(*level),
            KindData::Poly { .. } => None,
        }
    }

    /// Adds `delta` to every basic-kind level this kind contains;
    /// applied only to leaves (spec §3.1).
    pub fn level_adjust(&self, delta: i32) -> Kind {
        match &*self.0 {
            KindData::Basic { level, loc } => {
                let adjusted = level
                    .checked_add_signed(delta)
                    .expect("kind level adjustment underflowed below zero");
                Kind::basic(adjusted, loc.clone())
            }
            KindData::Poly { arg, result, loc } => Kind::poly(
                arg.level_adjust(delta),
                result.level_adjust(delta),
                loc.clone(),
            ),
        }
    }
}

impl PartialEq for Kind {
    fn eq(&self, other: &Self) -> bool {
        kinds_equal(self, other)
    }
}

impl Eq for Kind {}

/// `KindsEqual` (spec §4.B.6): purely structural.
pub fn kinds_equal(a: &Kind, b: &Kind) -> bool {
    match (a.data(), b.data()) {
        (KindData::Basic { level: l1, .. }, KindData::Basic { level: l2, .. }) => l1 == l2,
        (
            KindData::Poly {
                arg: a1,
                result: r1,
                ..
            },
            KindData::Poly {
                arg: a2,
                result: r2,
                ..
            },
        ) => kinds_equal(a1, a2) && kinds_equal(r1, r2),
        _ => false,
    }
}
