use super::{RunResult, Scheduler};
use crate::io::NullIoHost;
use fble_compiler::bytecode::{AccessInstr, FrameIndex, Instr, InstrBlock, InstrKind};
use fble_value::{ValueData, ValueTable, ValueTag};
use std::rc::Rc;

#[test]
fn simple_return_with_no_calls() {
    let mut values = ValueTable::new();
    let code = Rc::new(InstrBlock {
        statics: 0,
        locals: 1,
        instrs: vec![
            Instr::new(InstrKind::TypeValue { dest: 0 }),
            Instr::new(InstrKind::Return { result: FrameIndex::locals(0) }),
        ],
    });
    let proc = values.closure(code, 0, Vec::new());
    let mut scheduler = Scheduler::new(NullIoHost, values, 1, 1024);
    match scheduler.run(proc) {
        RunResult::Finished(v) => assert_eq!(scheduler.values().tag(v), ValueTag::TypeValue),
        RunResult::Aborted(d) => panic!("unexpected abort: {d}"),
    }
}

#[test]
fn tail_call_chain_through_three_closures_returns_final_value() {
    let mut values = ValueTable::new();
    let code_c = Rc::new(InstrBlock {
        statics: 0,
        locals: 1,
        instrs: vec![
            Instr::new(InstrKind::TypeValue { dest: 0 }),
            Instr::new(InstrKind::Return { result: FrameIndex::locals(0) }),
        ],
    });
    let c = values.closure(code_c, 0, Vec::new());

    let code_b = Rc::new(InstrBlock {
        statics: 1,
        locals: 1,
        instrs: vec![Instr::new(InstrKind::Call {
            exit: true,
            dest: 0,
            func: FrameIndex::statics(0),
            args: Vec::new(),
        })],
    });
    let b = values.closure(code_b, 0, vec![c]);

    let code_a = Rc::new(InstrBlock {
        statics: 1,
        locals: 1,
        instrs: vec![Instr::new(InstrKind::Call {
            exit: true,
            dest: 0,
            func: FrameIndex::statics(0),
            args: Vec::new(),
        })],
    });
    let a = values.closure(code_a, 0, vec![b]);

    let mut scheduler = Scheduler::new(NullIoHost, values, 1, 1024);
    match scheduler.run(a) {
        RunResult::Finished(v) => assert_eq!(scheduler.values().tag(v), ValueTag::TypeValue),
        RunResult::Aborted(d) => panic!("unexpected abort: {d}"),
    }
}

#[test]
fn link_put_then_get_round_trips_the_value() {
    let mut values = ValueTable::new();
    let code = Rc::new(InstrBlock {
        statics: 0,
        locals: 5,
        instrs: vec![
            Instr::new(InstrKind::Link { get: 0, put: 1 }),
            Instr::new(InstrKind::TypeValue { dest: 2 }),
            Instr::new(InstrKind::Call {
                exit: false,
                dest: 3,
                func: FrameIndex::locals(1),
                args: vec![FrameIndex::locals(2)],
            }),
            Instr::new(InstrKind::Call { exit: false, dest: 4, func: FrameIndex::locals(0), args: Vec::new() }),
            Instr::new(InstrKind::Return { result: FrameIndex::locals(4) }),
        ],
    });
    let proc = values.closure(code, 0, Vec::new());
    let mut scheduler = Scheduler::new(NullIoHost, values, 1, 1024);
    match scheduler.run(proc) {
        RunResult::Finished(v) => assert_eq!(scheduler.values().tag(v), ValueTag::TypeValue),
        RunResult::Aborted(d) => panic!("unexpected abort: {d}"),
    }
}

#[test]
fn fork_runs_children_concurrently_and_joins_their_results() {
    let mut values = ValueTable::new();
    let leaf = Rc::new(InstrBlock {
        statics: 0,
        locals: 1,
        instrs: vec![
            Instr::new(InstrKind::TypeValue { dest: 0 }),
            Instr::new(InstrKind::Return { result: FrameIndex::locals(0) }),
        ],
    });
    let child_a = values.closure(leaf.clone(), 0, Vec::new());
    let child_b = values.closure(leaf, 0, Vec::new());

    let code = Rc::new(InstrBlock {
        statics: 2,
        locals: 3,
        instrs: vec![
            Instr::new(InstrKind::Fork {
                args: vec![FrameIndex::statics(0), FrameIndex::statics(1)],
                dests: vec![0, 1],
            }),
            Instr::new(InstrKind::StructValue {
                args: vec![FrameIndex::locals(0), FrameIndex::locals(1)],
                dest: 2,
            }),
            Instr::new(InstrKind::Return { result: FrameIndex::locals(2) }),
        ],
    });
    let proc = values.closure(code, 0, vec![child_a, child_b]);

    let mut scheduler = Scheduler::new(NullIoHost, values, 1, 1024);
    match scheduler.run(proc) {
        RunResult::Finished(v) => match scheduler.values().get(v) {
            ValueData::Struct { fields } => assert_eq!(fields.len(), 2),
            other => panic!("expected a struct, found {other:?}"),
        },
        RunResult::Aborted(d) => panic!("unexpected abort: {d}"),
    }
}

#[test]
fn blocking_get_with_no_io_deadlocks() {
    let mut scheduler = Scheduler::new(NullIoHost, ValueTable::new(), 1, 1024);
    let port = scheduler.new_port();
    let get_proc = scheduler.values_mut().proc_get(port);
    let code = Rc::new(InstrBlock {
        statics: 1,
        locals: 1,
        instrs: vec![Instr::new(InstrKind::Call {
            exit: true,
            dest: 0,
            func: FrameIndex::statics(0),
            args: Vec::new(),
        })],
    });
    let proc = scheduler.values_mut().closure(code, 0, vec![get_proc]);
    match scheduler.run(proc) {
        RunResult::Aborted(d) => assert!(d.is_error()),
        RunResult::Finished(_) => panic!("expected a deadlock abort"),
    }
}

#[test]
fn union_access_with_wrong_tag_aborts_the_program() {
    let mut values = ValueTable::new();
    let unit = values.struct_value(Vec::new());
    let wrong = values.union_value(0, unit);
    let code = Rc::new(InstrBlock {
        statics: 1,
        locals: 1,
        instrs: vec![
            Instr::new(InstrKind::UnionAccess(AccessInstr { obj: FrameIndex::statics(0), tag: 1, dest: 0 })),
            Instr::new(InstrKind::Return { result: FrameIndex::locals(0) }),
        ],
    });
    let proc = values.closure(code, 0, vec![wrong]);
    let mut scheduler = Scheduler::new(NullIoHost, values, 1, 1024);
    match scheduler.run(proc) {
        RunResult::Aborted(d) => assert!(d.is_error()),
        RunResult::Finished(_) => panic!("expected a wrong-tag abort"),
    }
}

/// A self-recursive function, built the way a recursive `let` lowers:
/// `RefValue` reserves a local, a `FuncValue` captures that still-untied
/// local as its one static, and `RefDef` ties it to the closure once
/// built. The function takes a 2-tagged union argument and calls itself
/// exactly once (tag 1, "keep going") before hitting its base case (tag
/// 0, "stop") and returning. Runs the whole thing through the scheduler
/// rather than just checking the emitted instructions, so it would have
/// caught both a `RefDef` that clobbers its own placeholder and a
/// dangling `Ref` never dereferenced before the recursive call reads it.
#[test]
fn self_recursive_function_calls_itself_once_then_returns() {
    let mut values = ValueTable::new();

    let f_code = Rc::new(InstrBlock {
        statics: 1,
        locals: 4,
        instrs: vec![
            Instr::new(InstrKind::UnionSelect { condition: FrameIndex::locals(0), jumps: vec![0, 2] }),
            // tag 0 ("stop"): base case, return immediately.
            Instr::new(InstrKind::TypeValue { dest: 1 }),
            Instr::new(InstrKind::Return { result: FrameIndex::locals(1) }),
            // tag 1 ("go"): call self with a "stop" argument.
            Instr::new(InstrKind::TypeValue { dest: 2 }),
            Instr::new(InstrKind::UnionValue { tag: 0, arg: FrameIndex::locals(2), dest: 3 }),
            Instr::new(InstrKind::Call {
                exit: true,
                dest: 0,
                func: FrameIndex::statics(0),
                args: vec![FrameIndex::locals(3)],
            }),
        ],
    });

    let entry_code = Rc::new(InstrBlock {
        statics: 0,
        locals: 5,
        instrs: vec![
            Instr::new(InstrKind::RefValue { dest: 0 }),
            Instr::new(InstrKind::FuncValue { argc: 1, code: f_code, scope: vec![FrameIndex::locals(0)], dest: 1 }),
            Instr::new(InstrKind::RefDef { ref_: 0, value: FrameIndex::locals(1) }),
            Instr::new(InstrKind::TypeValue { dest: 2 }),
            Instr::new(InstrKind::UnionValue { tag: 1, arg: FrameIndex::locals(2), dest: 3 }),
            Instr::new(InstrKind::Call {
                exit: true,
                dest: 4,
                func: FrameIndex::locals(0),
                args: vec![FrameIndex::locals(3)],
            }),
        ],
    });

    let proc = values.closure(entry_code, 0, Vec::new());
    let mut scheduler = Scheduler::new(NullIoHost, values, 1, 1024);
    match scheduler.run(proc) {
        RunResult::Finished(v) => assert_eq!(scheduler.values().tag(v), ValueTag::TypeValue),
        RunResult::Aborted(d) => panic!("unexpected abort: {d}"),
    }
}
