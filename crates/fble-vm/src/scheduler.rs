//! The instruction-dispatch loop and cooperative scheduler (spec §4.F,
//! §5): one [`Scheduler`] owns the value heap, the profile call graph,
//! and every live thread, and drives them round-robin until the root
//! thread finishes or the whole program aborts.

use crate::frame::{CallFrame, Frame};
use crate::io::{IoHost, PortSlot};
use crate::ids::ThreadId;
use fble_common::{Diagnostic, Loc};
use fble_compiler::bytecode::{AccessInstr, FrameIndex, InstrBlock, InstrKind, LocalIndex, ProfileOp};
use fble_profile::{frames_from_snapshot, fresh_frames, snapshot_of, CallGraph, ProfileFrame, ProfileThread};
use fble_value::{FuncValue, PortId, ValueData, ValueId, ValueTable, ValueTag};
use rustc_hash::FxHashMap;
use std::collections::VecDeque;
use std::rc::Rc;

/// How a whole program run ends (spec §7: "Runtime errors abort the
/// thread and, in the current design, the whole program").
pub enum RunResult {
    Finished(ValueId),
    Aborted(Diagnostic),
}

/// How driving one thread for a turn ended. Never observed outside
/// this module except as the payload of [`RunResult`]; `Running` is an
/// internal continue-the-loop marker and never escapes [`Scheduler::run_thread`].
enum Step {
    Running,
    Finished(ValueId),
    Blocked,
    Yielded,
    Aborted(Diagnostic),
}

enum NativeRetry {
    StillBlocked,
    Resolved(Step),
}

/// One thread's call stack plus the bookkeeping the scheduler needs to
/// suspend and resume it between turns.
struct ThreadState {
    stack: Vec<CallFrame>,
    /// Set while this thread's next step is retrying a blocked `Get`
    /// rather than running an ordinary instruction: the proc value and
    /// where its eventual result should land (`None` finishes the
    /// thread itself, mirroring `CallFrame::return_dest`).
    pending_native: Option<(ValueId, Option<LocalIndex>)>,
    /// The link/port this thread is waiting to become non-empty, so a
    /// `Put` elsewhere knows who to wake.
    blocked_on: Option<ValueId>,
    /// Set while blocked in a `Fork`: how many of its children have
    /// yet to finish.
    pending_fork: Option<usize>,
    /// Where this thread's own final result is delivered: `None` for
    /// the program's root thread, `Some((parent, dest))` for a forked
    /// child (spec §4.F: "each child writes its result into a
    /// pre-assigned destination slot").
    parent: Option<(ThreadId, LocalIndex)>,
    profile_frames: Vec<ProfileFrame>,
}

/// Drives a compiled program to completion. Generic over the [`IoHost`]
/// the way `tsz-checker` is generic over its database trait — a
/// [`crate::io::NullIoHost`] for `check`/`mem-test`, a
/// [`crate::io::ChannelIoHost`] for deterministic `run` scripting.
pub struct Scheduler<H: IoHost> {
    host: H,
    values: ValueTable,
    graph: CallGraph,
    ports: Vec<PortSlot>,
    port_values: Vec<ValueId>,
    threads: FxHashMap<ThreadId, ThreadState>,
    runnable: VecDeque<ThreadId>,
    next_thread: u32,
    root: Option<ThreadId>,
    /// Instructions a thread runs before yielding (spec §4.F "an
    /// implementation choice"; `fble_common::CompileOptions::instruction_quantum`
    /// is where a driver sets this).
    quantum: u32,
}

impl<H: IoHost> Scheduler<H> {
    pub fn new(host: H, values: ValueTable, blockc: usize, quantum: u32) -> Self {
        Scheduler {
            host,
            values,
            graph: CallGraph::new(blockc.max(1)),
            ports: Vec::new(),
            port_values: Vec::new(),
            threads: FxHashMap::default(),
            runnable: VecDeque::new(),
            next_thread: 0,
            root: None,
            quantum: quantum.max(1),
        }
    }

    pub fn values(&self) -> &ValueTable {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut ValueTable {
        &mut self.values
    }

    pub fn profile(&self) -> &CallGraph {
        &self.graph
    }

    /// Allocates a fresh external port (spec §6): a single-slot FIFO a
    /// driver's [`IoHost`] reads from and writes into between turns.
    pub fn new_port(&mut self) -> ValueId {
        let id = PortId::from_index(self.ports.len());
        self.ports.push(PortSlot::default());
        let v = self.values.port(id);
        self.port_values.push(v);
        v
    }

    fn alloc_thread(
        &mut self,
        stack: Vec<CallFrame>,
        profile_frames: Vec<ProfileFrame>,
        parent: Option<(ThreadId, LocalIndex)>,
    ) -> ThreadId {
        let id = ThreadId::from_index(self.next_thread as usize);
        self.next_thread += 1;
        self.threads.insert(
            id,
            ThreadState { stack, pending_native: None, blocked_on: None, pending_fork: None, parent, profile_frames },
        );
        id
    }

    /// Runs `proc` (spec §4.F: a zero-argument process value) to
    /// completion.
    pub fn run(&mut self, proc: ValueId) -> RunResult {
        assert_eq!(self.values.args_needed(proc), 0, "a program's entry point must be a zero-argument process");
        let root = self.alloc_thread(Vec::new(), fresh_frames(), None);
        self.root = Some(root);
        if let Some(result) = self.spawn(root, proc) {
            return result;
        }

        loop {
            let Some(tid) = self.runnable.pop_front() else {
                if !self.host_io(true) {
                    return RunResult::Aborted(Diagnostic::deadlock(Loc::synthetic()));
                }
                continue;
            };
            match self.run_thread(tid) {
                Step::Running => unreachable!("run_thread never returns Running to its caller"),
                Step::Yielded => self.runnable.push_back(tid),
                Step::Blocked => {}
                Step::Finished(value) => {
                    if let Some(result) = self.finish_thread(tid, value) {
                        return result;
                    }
                }
                Step::Aborted(diag) => return RunResult::Aborted(diag),
            }
        }
    }

    /// Starts `tid` running `proc` as its very first frame: pushes a
    /// code frame for a closure, or resolves/blocks immediately for a
    /// native `Get`/`PutReady` proc with no code behind it at all.
    /// Shared between the program's root thread and every `Fork`ed
    /// child. Takes ownership of `proc` — a caller handing over an
    /// aliased reference (a resolved local, for a fork's children) must
    /// retain it first.
    fn spawn(&mut self, tid: ThreadId, proc: ValueId) -> Option<RunResult> {
        match self.values.func(proc).clone() {
            FuncValue::Closure { .. } | FuncValue::Applied { .. } => {
                let (code, scope, call_args) = self.unwind(proc);
                let frame = Frame::with_args(code, scope, call_args);
                self.threads.get_mut(&tid).unwrap().stack.push(CallFrame { frame, return_dest: None });
                self.runnable.push_back(tid);
                None
            }
            FuncValue::Get { target } => match self.try_take(target) {
                Some(v) => {
                    // The value popped off the link's queue may still be
                    // aliased elsewhere (whoever `put` it is free to keep
                    // reading their own copy), so this needs its own
                    // independent reference before it lands as the
                    // thread's result, same as `StructAccess`/`Copy`.
                    self.values.retain(v);
                    self.values.release(proc);
                    self.finish_thread(tid, v)
                }
                None => {
                    let thread = self.threads.get_mut(&tid).unwrap();
                    thread.blocked_on = Some(target);
                    thread.pending_native = Some((proc, None));
                    None
                }
            },
            FuncValue::PutReady { target, arg } => {
                self.put(target, arg);
                self.values.release(proc);
                let unit = self.values.struct_value(Vec::new());
                self.finish_thread(tid, unit)
            }
            FuncValue::Put { .. } => unreachable!("a zero-argument proc is never an unsaturated Put"),
        }
    }

    /// Walks an application chain (spec §3.5: repeated single-argument
    /// `app`) down to the [`FuncValue::Closure`] underneath, retaining
    /// its scope and collected arguments as independent references for
    /// the new frame and releasing the chain itself — so the caller's
    /// own reference to `v` (an `Applied` node, or a bare `Closure` with
    /// no arguments yet applied) can safely be dropped out from under
    /// it, including by a tail call that pops its frame immediately
    /// after resolving `v`.
    fn unwind(&mut self, v: ValueId) -> (Rc<InstrBlock>, Vec<ValueId>, Vec<ValueId>) {
        let mut args_rev = Vec::new();
        let mut cur = v;
        let (code, scope) = loop {
            match self.values.func(cur).clone() {
                FuncValue::Closure { code, scope, .. } => break (code, scope),
                FuncValue::Applied { func, arg, .. } => {
                    args_rev.push(arg);
                    cur = func;
                }
                other => unreachable!("a saturated call always unwinds to a Closure, found {other:?}"),
            }
        };
        for s in &scope {
            self.values.retain(*s);
        }
        for a in &args_rev {
            self.values.retain(*a);
        }
        self.values.release(v);
        args_rev.reverse();
        (code, scope, args_rev)
    }

    /// Removes a finished thread and routes its result: to the
    /// program's result if it was the root, or into its parent's
    /// pre-assigned destination local, resuming the parent once every
    /// sibling has also finished (spec §4.F: "Parent is blocked until
    /// all children terminate").
    fn finish_thread(&mut self, tid: ThreadId, value: ValueId) -> Option<RunResult> {
        let thread = self.threads.remove(&tid).expect("finishing an already-removed thread");
        if Some(tid) == self.root {
            return Some(RunResult::Finished(value));
        }
        let (parent_id, dest) = thread.parent.expect("a non-root thread always has a parent");
        let done = {
            let parent = self.threads.get_mut(&parent_id).expect("a forking parent outlives its children");
            let top = parent.stack.last_mut().expect("a forking parent keeps its frame while blocked");
            top.frame.set_local(&mut self.values, dest, value);
            let remaining = parent.pending_fork.as_mut().expect("a child's parent must be mid-fork");
            *remaining -= 1;
            if *remaining == 0 {
                parent.pending_fork = None;
                true
            } else {
                false
            }
        };
        if done {
            self.runnable.push_back(parent_id);
        }
        None
    }

    fn host_io(&mut self, block: bool) -> bool {
        let changed = self.host.io(&mut self.ports, block);
        if changed {
            for v in self.port_values.clone() {
                self.wake_blocked_on(v);
            }
        }
        changed
    }

    fn wake_blocked_on(&mut self, target: ValueId) {
        let woken: Vec<ThreadId> =
            self.threads.iter().filter(|(_, t)| t.blocked_on == Some(target)).map(|(id, _)| *id).collect();
        for id in woken {
            self.runnable.push_back(id);
        }
    }

    fn try_take(&mut self, target: ValueId) -> Option<ValueId> {
        match self.values.tag(target) {
            ValueTag::Link => self.values.link_get(target),
            ValueTag::Port => {
                let id = self.port_id_of(target);
                self.ports[id.index()].value.take()
            }
            other => panic!("Get/Put target is neither a link nor a port: {other:?}"),
        }
    }

    fn put(&mut self, target: ValueId, arg: ValueId) {
        match self.values.tag(target) {
            ValueTag::Link => self.values.link_put(target, arg),
            ValueTag::Port => {
                let id = self.port_id_of(target);
                if let Some(old) = self.ports[id.index()].value.replace(arg) {
                    self.values.release(old);
                }
            }
            other => panic!("Get/Put target is neither a link nor a port: {other:?}"),
        }
        self.wake_blocked_on(target);
    }

    fn port_id_of(&self, target: ValueId) -> PortId {
        match self.values.get(target) {
            ValueData::Port { id } => *id,
            other => panic!("expected a port value, found {:?}", other.tag()),
        }
    }

    /// Reads a frame slot as-is, *without* following a `Ref` wrapper. A
    /// recursive closure captures its own still-untied `Ref` as a
    /// static (see `FuncValue`'s capture below) before `RefDef` ever
    /// runs, so forcing a deref here would panic on an uninitialized
    /// ref that is never meant to be read yet, only carried along.
    /// Strictness (spec §4.E: "a value must be dereferenced before
    /// being otherwise accessed") is applied at the specific points
    /// that actually inspect a value's shape — `strict` below, called
    /// from struct/union access, union select, and call dispatch —
    /// not universally on every frame read.
    fn resolve(&self, tid: ThreadId, fi: FrameIndex) -> ValueId {
        self.threads[&tid].stack.last().expect("a running thread has a current frame").frame.resolve(fi)
    }

    /// Follows a resolved value past any `Ref` wrapper a tied recursive
    /// binding left around it. Call this at points that dispatch on a
    /// value's shape (struct/union access, union select, function
    /// application) — never at points that only copy or capture a
    /// value along, since the `Ref` it wraps may not be tied yet.
    fn strict(&self, v: ValueId) -> ValueId {
        self.values.deref(v)
    }

    fn local(&self, tid: ThreadId, idx: LocalIndex) -> ValueId {
        self.threads[&tid]
            .stack
            .last()
            .expect("a running thread has a current frame")
            .frame
            .local(idx)
            .expect("referenced a local before it was written")
    }

    fn set_local(&mut self, tid: ThreadId, dest: LocalIndex, v: ValueId) {
        let thread = self.threads.get_mut(&tid).unwrap();
        let top = thread.stack.last_mut().expect("a running thread has a current frame");
        top.frame.set_local(&mut self.values, dest, v);
    }

    fn pop_frame(&mut self, tid: ThreadId) -> CallFrame {
        self.threads.get_mut(&tid).unwrap().stack.pop().expect("cannot pop an empty thread stack")
    }

    /// Routes a synchronously-known value to wherever the instruction
    /// that produced it said to send it: into a local (non-tail), or
    /// straight to the thread's own completion (tail).
    fn deliver(&mut self, tid: ThreadId, landing: Option<LocalIndex>, value: ValueId) -> Step {
        match landing {
            Some(dest) => {
                self.set_local(tid, dest, value);
                Step::Running
            }
            None => Step::Finished(value),
        }
    }

    fn retry_native(&mut self, tid: ThreadId) -> NativeRetry {
        let (proc, landing) =
            self.threads.get(&tid).unwrap().pending_native.clone().expect("retry_native with nothing pending");
        let target = match self.values.func(proc) {
            FuncValue::Get { target } => *target,
            _ => unreachable!("only Get ever parks as pending_native"),
        };
        match self.try_take(target) {
            Some(v) => {
                self.values.retain(v);
                self.values.release(proc);
                let thread = self.threads.get_mut(&tid).unwrap();
                thread.pending_native = None;
                thread.blocked_on = None;
                NativeRetry::Resolved(self.deliver(tid, landing, v))
            }
            None => NativeRetry::StillBlocked,
        }
    }

    fn run_thread(&mut self, tid: ThreadId) -> Step {
        let mut budget = self.quantum;
        loop {
            if self.threads[&tid].pending_native.is_some() {
                match self.retry_native(tid) {
                    NativeRetry::StillBlocked => return Step::Blocked,
                    NativeRetry::Resolved(Step::Running) => continue,
                    NativeRetry::Resolved(other) => return other,
                }
            }

            if budget == 0 {
                return Step::Yielded;
            }
            budget -= 1;

            let instr = {
                let thread = self.threads.get_mut(&tid).unwrap();
                let call = thread.stack.last_mut().expect("a running thread always has a current frame");
                let pc = call.frame.pc;
                assert!(pc < call.frame.code.instrs.len(), "program counter ran past the end of a block");
                let instr = call.frame.code.instrs[pc].clone();
                call.frame.pc += 1;
                instr
            };

            {
                let frames = std::mem::take(&mut self.threads.get_mut(&tid).unwrap().profile_frames);
                let mut profile = ProfileThread::resume(&mut self.graph, frames);
                for op in &instr.profile_ops {
                    match op {
                        ProfileOp::Enter(b) => profile.enter(*b),
                        ProfileOp::Exit => profile.exit(),
                        ProfileOp::AutoExit(b) => profile.auto_exit_enter(*b),
                    }
                }
                self.threads.get_mut(&tid).unwrap().profile_frames = profile.suspend();
            }

            match self.execute(tid, instr.kind) {
                Step::Running => continue,
                other => return other,
            }
        }
    }

    fn execute(&mut self, tid: ThreadId, kind: InstrKind) -> Step {
        match kind {
            InstrKind::StructValue { args, dest } => {
                let fields: Vec<ValueId> = args.iter().map(|fi| self.resolve(tid, *fi)).collect();
                let v = self.values.struct_value(fields);
                self.set_local(tid, dest, v);
                Step::Running
            }
            InstrKind::UnionValue { tag, arg, dest } => {
                let a = self.resolve(tid, arg);
                let v = self.values.union_value(tag, a);
                self.set_local(tid, dest, v);
                Step::Running
            }
            InstrKind::StructAccess(AccessInstr { obj, tag, dest }) => {
                let o = self.strict(self.resolve(tid, obj));
                let field = match self.values.get(o) {
                    ValueData::Struct { fields } => fields[tag],
                    other => panic!("StructAccess on a non-struct value: {:?}", other.tag()),
                };
                self.values.retain(field);
                self.set_local(tid, dest, field);
                Step::Running
            }
            InstrKind::UnionAccess(AccessInstr { obj, tag, dest }) => {
                let o = self.strict(self.resolve(tid, obj));
                let (utag, arg) = match self.values.get(o) {
                    ValueData::Union { tag, arg } => (*tag, *arg),
                    other => panic!("UnionAccess on a non-union value: {:?}", other.tag()),
                };
                if utag != tag {
                    return Step::Aborted(Diagnostic::union_access_wrong_tag(
                        Loc::synthetic(),
                        &tag.to_string(),
                        &utag.to_string(),
                    ));
                }
                self.values.retain(arg);
                self.set_local(tid, dest, arg);
                Step::Running
            }
            InstrKind::UnionSelect { condition, jumps } => {
                let c = self.strict(self.resolve(tid, condition));
                let tag = match self.values.get(c) {
                    ValueData::Union { tag, .. } => *tag,
                    other => panic!("UnionSelect on a non-union value: {:?}", other.tag()),
                };
                let offset = jumps[tag];
                let thread = self.threads.get_mut(&tid).unwrap();
                thread.stack.last_mut().unwrap().frame.pc += offset;
                Step::Running
            }
            InstrKind::Jump { count } => {
                let thread = self.threads.get_mut(&tid).unwrap();
                thread.stack.last_mut().unwrap().frame.pc += count;
                Step::Running
            }
            InstrKind::FuncValue { argc, code, scope, dest } => {
                let captured: Vec<ValueId> = scope.iter().map(|fi| self.resolve(tid, *fi)).collect();
                let v = self.values.closure(code, argc, captured);
                self.set_local(tid, dest, v);
                Step::Running
            }
            InstrKind::Call { exit, dest, func, args } => self.do_call(tid, exit, dest, func, args),
            InstrKind::Link { get, put } => {
                let link = self.values.link();
                let g = self.values.proc_get(link);
                let p = self.values.proc_put(link);
                // `link()` itself started the link at refcount 1 for a
                // temporary owner that never materializes; the get/put
                // procs each took their own reference above, so drop
                // that initial one.
                self.values.release(link);
                self.set_local(tid, get, g);
                self.set_local(tid, put, p);
                Step::Yielded
            }
            InstrKind::Fork { args, dests } => self.do_fork(tid, args, dests),
            InstrKind::Copy { source, dest } => {
                let v = self.resolve(tid, source);
                self.values.retain(v);
                self.set_local(tid, dest, v);
                Step::Running
            }
            InstrKind::RefValue { dest } => {
                let v = self.values.new_ref();
                self.set_local(tid, dest, v);
                Step::Running
            }
            InstrKind::RefDef { ref_, value } => {
                let r = self.local(tid, ref_);
                let v = self.resolve(tid, value);
                self.values.ref_def(r, v);
                Step::Running
            }
            InstrKind::Return { result } => {
                let v = self.resolve(tid, result);
                self.values.retain(v);
                let mut popped = self.pop_frame(tid);
                popped.frame.release_all(&mut self.values);
                self.deliver(tid, popped.return_dest, v)
            }
            InstrKind::TypeValue { dest } => {
                let v = self.values.type_value();
                self.set_local(tid, dest, v);
                Step::Running
            }
        }
    }

    /// Resolves `func`'s full application chain, then either stores or
    /// propagates a still-partial result, or dispatches a fully
    /// saturated call: pushes a new frame for a closure, or performs
    /// the native FIFO op directly for a `Get`/`PutReady`. An `exit`
    /// call always discards its own frame first (inheriting its
    /// `return_dest`), whether the eventual result takes zero turns
    /// (native) or many (a pushed closure frame) to arrive.
    fn do_call(&mut self, tid: ThreadId, exit: bool, dest: LocalIndex, func: FrameIndex, args: Vec<FrameIndex>) -> Step {
        let mut current = self.strict(self.resolve(tid, func));
        if args.is_empty() {
            // No `apply` ran to mint an independent reference — `current`
            // is still an alias of whatever local/static `func` named, so
            // it needs its own reference before this frame (possibly the
            // very frame that local lives in, for a tail call) is popped
            // out from under it below.
            self.values.retain(current);
        }
        for a in &args {
            let arg_v = self.resolve(tid, *a);
            current = self.values.apply(current, arg_v);
        }

        let landing = if exit {
            let mut popped = self.pop_frame(tid);
            popped.frame.release_all(&mut self.values);
            popped.return_dest
        } else {
            Some(dest)
        };

        if self.values.args_needed(current) > 0 {
            return self.deliver(tid, landing, current);
        }

        match self.values.func(current).clone() {
            FuncValue::Closure { .. } | FuncValue::Applied { .. } => {
                let (code, scope, call_args) = self.unwind(current);
                let frame = Frame::with_args(code, scope, call_args);
                self.threads.get_mut(&tid).unwrap().stack.push(CallFrame { frame, return_dest: landing });
                Step::Running
            }
            FuncValue::Get { target } => match self.try_take(target) {
                Some(v) => {
                    self.values.retain(v);
                    self.values.release(current);
                    self.deliver(tid, landing, v)
                }
                None => {
                    let thread = self.threads.get_mut(&tid).unwrap();
                    thread.blocked_on = Some(target);
                    thread.pending_native = Some((current, landing));
                    Step::Blocked
                }
            },
            FuncValue::PutReady { target, arg } => {
                self.put(target, arg);
                self.values.release(current);
                let unit = self.values.struct_value(Vec::new());
                self.deliver(tid, landing, unit)
            }
            FuncValue::Put { .. } => {
                unreachable!("apply() only leaves args_needed > 0 for an unsaturated Put")
            }
        }
    }

    /// Spawns one child thread per `args[i]` (spec §4.F: "each of
    /// `args` runs in its own child thread"), blocking this thread
    /// until all of them deliver into `dests[i]`.
    fn do_fork(&mut self, tid: ThreadId, args: Vec<FrameIndex>, dests: Vec<LocalIndex>) -> Step {
        // Each child thread needs its own independent reference to the
        // proc it runs — `resolve` only aliases the forking frame's own
        // locals, which stay live (and eventually release this same
        // value again) until that frame itself is popped.
        let procs: Vec<ValueId> = args
            .iter()
            .map(|fi| {
                let v = self.strict(self.resolve(tid, *fi));
                self.values.retain(v);
                v
            })
            .collect();
        if procs.is_empty() {
            return Step::Running;
        }

        let snapshot = {
            let frames = &self.threads[&tid].profile_frames;
            snapshot_of(frames)
        };
        self.threads.get_mut(&tid).unwrap().pending_fork = Some(procs.len());

        for (proc, dest) in procs.into_iter().zip(dests) {
            let child_frames = frames_from_snapshot(&snapshot);
            let child_id = self.alloc_thread(Vec::new(), child_frames, Some((tid, dest)));
            let result = self.spawn(child_id, proc);
            debug_assert!(result.is_none(), "a forked child is never the program's root thread");
        }

        Step::Blocked
    }
}

#[cfg(test)]
mod tests;
