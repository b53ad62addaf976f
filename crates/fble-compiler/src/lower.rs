//! Lowers a checked [`Tc`] to bytecode (spec §4.D). The checker has
//! already resolved every variable to a [`VarIndex`] and every
//! function's captures to a list of [`VarIndex`]s relative to its
//! enclosing frame (`fble-tc`'s `Scope`/`Frame`); this pass only needs
//! to translate those indices into [`FrameIndex`]es and pick concrete
//! local slots, not redo capture analysis.
//!
//! A [`CompileFrame`] corresponds 1:1 to one `Tc::FuncValue` body (the
//! checker never opens a new `Scope` frame anywhere else — nested
//! `Let`/`Exec`/`Link` share their enclosing function's frame, which is
//! why `VarIndex::Local` numbering keeps climbing across them instead
//! of resetting). Every node is compiled through one of two entry
//! points: [`Lowerer::compile_expr`] writes its result into a
//! caller-supplied `dest` local; [`Lowerer::compile_tail`] is used for
//! a function body (or anything in tail position within one), and ends
//! the instruction stream with a `Return` or, for a syntactic tail
//! call, a tail `Call` — so no superfluous `Return` sits after a tail
//! call that will never fall through to it.

use crate::bytecode::{
    AccessInstr, FrameIndex, Instr, InstrBlock, InstrKind, LocalIndex, ProfileOp,
};
use fble_profile::BlockTable;
use fble_tc::tc::{Choice as TcChoice, DataTag, LetBinding, Tc, VarIndex, VarSource};
use rustc_hash::FxHashMap;
use std::rc::Rc;

/// One in-progress function/process body: local-slot bookkeeping for
/// the frame currently being compiled.
struct CompileFrame {
    /// `named_locals[n]` is the bytecode local slot bound to
    /// `VarIndex::Local(n)` in this Tc frame — not `n` itself, since
    /// compiler-introduced scratch locals (sub-expression temporaries)
    /// interleave with named slots and would otherwise shift them.
    named_locals: Vec<LocalIndex>,
    next_local: usize,
}

impl CompileFrame {
    fn new() -> Self {
        CompileFrame { named_locals: Vec::new(), next_local: 0 }
    }

    fn alloc_local(&mut self) -> LocalIndex {
        let l = self.next_local;
        self.next_local += 1;
        l
    }

    /// Allocates a local and records it as the next named slot, for a
    /// binding the checker itself pushed with `Scope::push_local`.
    fn alloc_named_local(&mut self) -> LocalIndex {
        let l = self.alloc_local();
        self.named_locals.push(l);
        l
    }

    fn resolve(&self, idx: VarIndex) -> FrameIndex {
        match idx.source {
            VarSource::Local => FrameIndex::locals(self.named_locals[idx.index]),
            VarSource::Static => FrameIndex::statics(idx.index),
        }
    }
}

fn emit(instrs: &mut Vec<Instr>, pending: &mut Vec<ProfileOp>, kind: InstrKind) {
    let ops = std::mem::take(pending);
    instrs.push(Instr::with_profile_ops(kind, ops));
}

/// Lowers checked `Tc` trees to `InstrBlock`s, interning profile block
/// names along the way.
pub struct Lowerer {
    blocks: BlockTable,
}

impl Lowerer {
    pub fn new() -> Self {
        Lowerer { blocks: BlockTable::new() }
    }

    /// Compiles a whole checked program as the body of an implicit
    /// top-level block: zero statics (nothing encloses it), zero args.
    /// Running a program is then just invoking this block, the same as
    /// invoking any other zero-argument process value (spec §3.3).
    pub fn compile_program(mut self, tc: &Tc) -> (InstrBlock, BlockTable) {
        let mut frame = CompileFrame::new();
        let mut instrs = Vec::new();
        let mut pending = Vec::new();
        self.compile_tail(tc, &mut frame, &mut instrs, &mut pending);
        debug_assert!(pending.is_empty(), "tail compilation must fully drain pending profile ops");
        let block = InstrBlock { statics: 0, locals: frame.next_local, instrs };
        tracing::debug!(instrs = block.instrs.len(), locals = block.locals, blocks = self.blocks.len(), "lowered program to bytecode");
        (block, self.blocks)
    }

    fn compile_expr(
        &mut self,
        tc: &Tc,
        dest: LocalIndex,
        frame: &mut CompileFrame,
        instrs: &mut Vec<Instr>,
        pending: &mut Vec<ProfileOp>,
    ) {
        match tc {
            Tc::TypeValue { .. } => emit(instrs, pending, InstrKind::TypeValue { dest }),
            Tc::Var { index, .. } => {
                let source = frame.resolve(*index);
                emit(instrs, pending, InstrKind::Copy { source, dest });
            }
            Tc::Let { recursive, bindings, body, .. } => {
                self.compile_let_bindings(*recursive, bindings, frame, instrs, pending);
                self.compile_expr(body, dest, frame, instrs, pending);
            }
            Tc::StructValue { fields, .. } => {
                let args = self.compile_operands(fields, frame, instrs, pending);
                emit(instrs, pending, InstrKind::StructValue { args, dest });
            }
            Tc::UnionValue { tag, arg, .. } => {
                let arg = self.compile_operand(arg, frame, instrs, pending);
                emit(instrs, pending, InstrKind::UnionValue { tag: *tag, arg, dest });
            }
            Tc::UnionSelect { condition, choices, .. } => {
                self.compile_union_select_expr(condition, choices, dest, frame, instrs, pending);
            }
            Tc::DataAccess { datatype, obj, tag, .. } => {
                let obj = self.compile_operand(obj, frame, instrs, pending);
                let access = AccessInstr { obj, tag: *tag, dest };
                let kind = match datatype {
                    DataTag::Struct => InstrKind::StructAccess(access),
                    DataTag::Union => InstrKind::UnionAccess(access),
                };
                emit(instrs, pending, kind);
            }
            Tc::FuncValue { scope, argc, body, .. } => {
                let capture_scope = scope.iter().map(|vi| frame.resolve(*vi)).collect();
                let code = self.compile_func_value(scope.len(), *argc, body);
                emit(instrs, pending, InstrKind::FuncValue { argc: *argc, code, scope: capture_scope, dest });
            }
            Tc::FuncApply { func, args, .. } => {
                let func = self.compile_operand(func, frame, instrs, pending);
                let args = self.compile_operands(args, frame, instrs, pending);
                emit(instrs, pending, InstrKind::Call { exit: false, dest, func, args });
            }
            Tc::Link { body, .. } => {
                self.compile_link_ports(frame, instrs, pending);
                self.compile_expr(body, dest, frame, instrs, pending);
            }
            Tc::Exec { bindings, body, .. } => {
                self.compile_exec_bindings(bindings, frame, instrs, pending);
                self.compile_expr(body, dest, frame, instrs, pending);
            }
            Tc::Profile { name, body } => {
                let id = self.blocks.register(name.to_string());
                pending.push(ProfileOp::Enter(id));
                self.compile_expr(body, dest, frame, instrs, pending);
                pending.push(ProfileOp::Exit);
            }
        }
    }

    /// Compiles `tc` as a function body, or anything occupying the
    /// same tail position: a syntactic `FuncApply` becomes a tail
    /// `Call` that hands control straight to the callee instead of
    /// returning to be copied out and returned again.
    fn compile_tail(
        &mut self,
        tc: &Tc,
        frame: &mut CompileFrame,
        instrs: &mut Vec<Instr>,
        pending: &mut Vec<ProfileOp>,
    ) {
        match tc {
            Tc::FuncApply { func, args, .. } => {
                let func = self.compile_operand(func, frame, instrs, pending);
                let args = self.compile_operands(args, frame, instrs, pending);
                emit(instrs, pending, InstrKind::Call { exit: true, dest: 0, func, args });
            }
            Tc::Let { recursive, bindings, body, .. } => {
                self.compile_let_bindings(*recursive, bindings, frame, instrs, pending);
                self.compile_tail(body, frame, instrs, pending);
            }
            Tc::UnionSelect { condition, choices, .. } => {
                self.compile_union_select_tail(condition, choices, frame, instrs, pending);
            }
            Tc::Link { body, .. } => {
                self.compile_link_ports(frame, instrs, pending);
                self.compile_tail(body, frame, instrs, pending);
            }
            Tc::Exec { bindings, body, .. } => {
                self.compile_exec_bindings(bindings, frame, instrs, pending);
                self.compile_tail(body, frame, instrs, pending);
            }
            Tc::Profile { name, body } => {
                let id = self.blocks.register(name.to_string());
                pending.push(ProfileOp::Enter(id));
                self.compile_tail(body, frame, instrs, pending);
                let last = instrs.last_mut().expect("tail compilation always emits at least one instruction");
                match last.kind {
                    InstrKind::Call { exit: true, .. } => last.profile_ops.push(ProfileOp::AutoExit(id)),
                    _ => last.profile_ops.push(ProfileOp::Exit),
                }
            }
            _ => {
                let l = frame.alloc_local();
                self.compile_expr(tc, l, frame, instrs, pending);
                emit(instrs, pending, InstrKind::Return { result: FrameIndex::locals(l) });
            }
        }
    }

    fn compile_operand(
        &mut self,
        tc: &Tc,
        frame: &mut CompileFrame,
        instrs: &mut Vec<Instr>,
        pending: &mut Vec<ProfileOp>,
    ) -> FrameIndex {
        let l = frame.alloc_local();
        self.compile_expr(tc, l, frame, instrs, pending);
        FrameIndex::locals(l)
    }

    fn compile_operands(
        &mut self,
        tcs: &[Rc<Tc>],
        frame: &mut CompileFrame,
        instrs: &mut Vec<Instr>,
        pending: &mut Vec<ProfileOp>,
    ) -> Vec<FrameIndex> {
        tcs.iter().map(|tc| self.compile_operand(tc, frame, instrs, pending)).collect()
    }

    /// Allocates one local per binding and binds it as the next named
    /// slot before compiling any binding's value, matching
    /// `check_let`'s own push-before-check order (the only way a
    /// binding can reference itself or a later sibling). Recursive
    /// bindings get a `RefValue` placeholder first and a `RefDef` once
    /// their value is in — the value itself is compiled into a fresh
    /// scratch local, not `l`, since `Frame::set_local` releases and
    /// overwrites whatever `l` already holds: compiling straight into
    /// `l` would clobber the very `Ref` placeholder `RefDef` needs to
    /// tie, before it ever ties it.
    fn compile_let_bindings(
        &mut self,
        recursive: bool,
        bindings: &[LetBinding],
        frame: &mut CompileFrame,
        instrs: &mut Vec<Instr>,
        pending: &mut Vec<ProfileOp>,
    ) {
        let locals: Vec<LocalIndex> = bindings.iter().map(|_| frame.alloc_named_local()).collect();
        if recursive {
            for &l in &locals {
                emit(instrs, pending, InstrKind::RefValue { dest: l });
            }
        }
        for (b, &l) in bindings.iter().zip(locals.iter()) {
            if recursive {
                let scratch = frame.alloc_local();
                self.compile_expr(&b.value, scratch, frame, instrs, pending);
                emit(instrs, pending, InstrKind::RefDef { ref_: l, value: FrameIndex::locals(scratch) });
            } else {
                self.compile_expr(&b.value, l, frame, instrs, pending);
            }
        }
    }

    /// `Link ~ get, put` binds two locals before its body is checked;
    /// neither is recursive, so no `RefValue` dance is needed.
    fn compile_link_ports(&mut self, frame: &mut CompileFrame, instrs: &mut Vec<Instr>, pending: &mut Vec<ProfileOp>) {
        let get = frame.alloc_named_local();
        let put = frame.alloc_named_local();
        emit(instrs, pending, InstrKind::Link { get, put });
    }

    /// `Exec` bindings run concurrently: each binding's not-yet-run
    /// proc value is compiled to a scratch temp (unnamed — the
    /// checker never binds a name to the proc value itself, only to
    /// its result) *before* any of the result locals are allocated, so
    /// a nested `Let` inside one binding's expression claims its named
    /// locals ahead of this `Exec`'s own bindings — exactly the order
    /// `check_exec_exec`'s two-phase check produces.
    fn compile_exec_bindings(
        &mut self,
        bindings: &[Rc<Tc>],
        frame: &mut CompileFrame,
        instrs: &mut Vec<Instr>,
        pending: &mut Vec<ProfileOp>,
    ) {
        let procs = self.compile_operands(bindings, frame, instrs, pending);
        let dests: Vec<LocalIndex> = bindings.iter().map(|_| frame.alloc_named_local()).collect();
        emit(instrs, pending, InstrKind::Fork { args: procs, dests });
    }

    fn compile_func_value(&mut self, statics: usize, argc: usize, body: &Tc) -> Rc<InstrBlock> {
        tracing::trace!(statics, argc, "compiling func value body");
        let mut child = CompileFrame::new();
        for _ in 0..argc {
            child.alloc_named_local();
        }
        let mut child_instrs = Vec::new();
        let mut child_pending = Vec::new();
        self.compile_tail(body, &mut child, &mut child_instrs, &mut child_pending);
        debug_assert!(child_pending.is_empty(), "tail compilation must fully drain pending profile ops");
        Rc::new(InstrBlock { statics, locals: child.next_local, instrs: child_instrs })
    }

    /// Non-tail union select: every branch writes into `dest` and
    /// jumps forward to the shared join point after the table, except
    /// branches that dedup to an already-compiled default (pointer-
    /// identical `Rc`, since `check_union_select` clones the same
    /// default `Tc` into every tag that falls back to it).
    fn compile_union_select_expr(
        &mut self,
        condition: &Tc,
        choices: &[TcChoice],
        dest: LocalIndex,
        frame: &mut CompileFrame,
        instrs: &mut Vec<Instr>,
        pending: &mut Vec<ProfileOp>,
    ) {
        let condition = self.compile_operand(condition, frame, instrs, pending);
        emit(instrs, pending, InstrKind::UnionSelect { condition, jumps: vec![0; choices.len()] });
        let select_idx = instrs.len() - 1;

        let mut seen: FxHashMap<*const Tc, usize> = FxHashMap::default();
        let mut jumps = vec![0usize; choices.len()];
        let mut trailing_jumps = Vec::new();
        for choice in choices {
            let ptr = Rc::as_ptr(&choice.body);
            if let Some(&start) = seen.get(&ptr) {
                jumps[choice.tag] = start - (select_idx + 1);
                continue;
            }
            let start = instrs.len();
            seen.insert(ptr, start);
            self.compile_expr(&choice.body, dest, frame, instrs, pending);
            jumps[choice.tag] = start - (select_idx + 1);
            trailing_jumps.push(instrs.len());
            instrs.push(Instr::new(InstrKind::Jump { count: 0 }));
        }
        let join_idx = instrs.len();
        for &jidx in &trailing_jumps {
            if let InstrKind::Jump { count } = &mut instrs[jidx].kind {
                *count = join_idx - (jidx + 1);
            }
        }
        if let InstrKind::UnionSelect { jumps: j, .. } = &mut instrs[select_idx].kind {
            *j = jumps;
        }
    }

    /// Tail union select: each branch ends in its own `Return`/tail
    /// `Call`, so (unlike the non-tail case) no join point or trailing
    /// `Jump`s are needed — control never falls through a branch.
    fn compile_union_select_tail(
        &mut self,
        condition: &Tc,
        choices: &[TcChoice],
        frame: &mut CompileFrame,
        instrs: &mut Vec<Instr>,
        pending: &mut Vec<ProfileOp>,
    ) {
        let condition = self.compile_operand(condition, frame, instrs, pending);
        emit(instrs, pending, InstrKind::UnionSelect { condition, jumps: vec![0; choices.len()] });
        let select_idx = instrs.len() - 1;

        let mut seen: FxHashMap<*const Tc, usize> = FxHashMap::default();
        let mut jumps = vec![0usize; choices.len()];
        for choice in choices {
            let ptr = Rc::as_ptr(&choice.body);
            if let Some(&start) = seen.get(&ptr) {
                jumps[choice.tag] = start - (select_idx + 1);
                continue;
            }
            let start = instrs.len();
            seen.insert(ptr, start);
            self.compile_tail(&choice.body, frame, instrs, pending);
            jumps[choice.tag] = start - (select_idx + 1);
        }
        if let InstrKind::UnionSelect { jumps: j, .. } = &mut instrs[select_idx].kind {
            *j = jumps;
        }
    }
}

impl Default for Lowerer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests;
