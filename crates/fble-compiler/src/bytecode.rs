//! Bytecode vocabulary (spec §4.D), grounded on `instr.h`'s
//! `FbleFrameIndex`/`FbleInstr`/`FbleInstrBlock`. A linked list of
//! `FbleProfileOp`s per instruction becomes a plain `Vec`; everything
//! else keeps its original shape, including the field names that
//! matter (`exit` on `Call`, `ref`/`value` on `RefDef`).
//!
//! Two instruction kinds from `instr.h` have no counterpart here.
//! `FbleGetInstr`/`FblePutInstr` exist because the original represents a
//! port as its own kind of value; here a `get` port typechecks as an
//! ordinary `Proc<T>` and a `put` port as an ordinary `(T) { Proc<Unit>; }`
//! function (`fble-tc`'s `check_exec_link`), so reading or writing one is
//! already an ordinary zero/one-argument `Call`. `FbleReleaseInstr` exists
//! to drop a local's refcount as soon as its last use has compiled; Rust's
//! ownership gives a local's drop for free when the frame's locals vector
//! is discarded, so nothing needs to ask for it early.

use fble_profile::BlockId;

/// Which frame a [`FrameIndex`] counts into: the function's captured
/// statics array, or the current frame's local slots.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum FrameSection {
    Statics,
    Locals,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct FrameIndex {
    pub section: FrameSection,
    pub index: usize,
}

impl FrameIndex {
    pub fn statics(index: usize) -> Self {
        FrameIndex { section: FrameSection::Statics, index }
    }

    pub fn locals(index: usize) -> Self {
        FrameIndex { section: FrameSection::Locals, index }
    }
}

/// A slot in the current frame's locals array. Distinct from
/// [`FrameIndex`] because most instructions write only to locals
/// (never directly to statics, which are write-once at `FuncValue`
/// construction), so destinations are typed more narrowly than sources.
pub type LocalIndex = usize;

/// Profiling operations to perform before an instruction runs (spec
/// §4.G): entering a block, leaving one, or replacing the top of the
/// profile stack in place for a tail call so the stack doesn't grow.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ProfileOp {
    Enter(BlockId),
    Exit,
    AutoExit(BlockId),
}

#[derive(Clone, Debug)]
pub struct Instr {
    /// Applied in order before the instruction executes.
    pub profile_ops: Vec<ProfileOp>,
    pub kind: InstrKind,
}

impl Instr {
    pub fn new(kind: InstrKind) -> Self {
        Instr { profile_ops: Vec::new(), kind }
    }

    pub fn with_profile_ops(kind: InstrKind, profile_ops: Vec<ProfileOp>) -> Self {
        Instr { profile_ops, kind }
    }
}

/// Struct/union field access; separate from `StructAccess`/`UnionAccess`
/// only by which runtime error a bad tag produces ("no such field" vs
/// "wrong tag"), so both share this shape (`instr.h`'s
/// `FbleAccessInstr`).
#[derive(Clone, Debug)]
pub struct AccessInstr {
    pub obj: FrameIndex,
    pub tag: usize,
    pub dest: LocalIndex,
}

#[derive(Clone, Debug)]
pub enum InstrKind {
    /// Allocates a struct value from `args`, writing it to `dest`.
    StructValue { args: Vec<FrameIndex>, dest: LocalIndex },
    /// Allocates a union value tagged `tag` wrapping `arg`.
    UnionValue { tag: usize, arg: FrameIndex, dest: LocalIndex },
    StructAccess(AccessInstr),
    UnionAccess(AccessInstr),
    /// Jumps to `jumps[tag]` instructions forward from here; branches
    /// sharing a default body share a jump-table entry.
    UnionSelect { condition: FrameIndex, jumps: Vec<usize> },
    /// Forward-only jump of `count` instructions; used to rejoin after
    /// a `UnionSelect` branch.
    Jump { count: usize },
    /// Allocates a closure over `code`, capturing `scope` (frame
    /// indices resolved in the *enclosing* frame, at the point this
    /// instruction runs) as the new closure's statics array.
    FuncValue { argc: usize, code: std::rc::Rc<InstrBlock>, scope: Vec<FrameIndex>, dest: LocalIndex },
    /// Calls `func` with `args`. If `exit` is set this is a tail call:
    /// `dest` is ignored and the result is returned to the caller
    /// directly instead of being stored in this frame.
    Call { exit: bool, dest: LocalIndex, func: FrameIndex, args: Vec<FrameIndex> },
    /// Allocates a new link (FIFO queue); binds the get/put ports to
    /// `get`/`put`.
    Link { get: LocalIndex, put: LocalIndex },
    /// Runs each of `args` (proc values) in its own child thread;
    /// `dests[i]` receives the `i`th child's result once every child
    /// has finished.
    Fork { args: Vec<FrameIndex>, dests: Vec<LocalIndex> },
    Copy { source: FrameIndex, dest: LocalIndex },
    /// Reserves `dest` as an as-yet-undefined reference, for a
    /// recursive `Let` binding that may be read before it's resolved.
    RefValue { dest: LocalIndex },
    /// Resolves a `RefValue` placeholder. Skipped at compile time if
    /// the checker never observed the binding being read recursively
    /// (`Tc::Let.recursive`), since defining an unused reference is
    /// pure overhead.
    RefDef { ref_: LocalIndex, value: FrameIndex },
    Return { result: FrameIndex },
    /// Materializes a type as a value (`Tc::TypeValue`): carries no
    /// payload, since all type information is erased by this point.
    TypeValue { dest: LocalIndex },
}

/// A refcounted sequence of instructions (spec §4.D): `statics` is the
/// size of the captured-scope array this block expects to run with,
/// `locals` is the number of local slots the frame needs.
#[derive(Clone, Debug, Default)]
pub struct InstrBlock {
    pub statics: usize,
    pub locals: usize,
    pub instrs: Vec<Instr>,
}
