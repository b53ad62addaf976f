use super::*;
use crate::bytecode::{FrameIndex, FrameSection, InstrKind};
use fble_common::Loc;

fn loc() -> Loc {
    Loc::synthetic()
}

#[test]
fn identity_function_reads_its_argument_and_returns_it() {
    let body = Tc::Var { index: VarIndex::local(0), loc: loc() };
    let program = Tc::FuncValue { scope: Vec::new(), argc: 1, body: Rc::new(body), body_loc: loc() };

    let (block, _blocks) = Lowerer::new().compile_program(&program);

    assert_eq!(block.statics, 0);
    assert_eq!(block.locals, 1, "one scratch local to hold the FuncValue before returning it");
    assert_eq!(block.instrs.len(), 2);
    let code = match &block.instrs[0].kind {
        InstrKind::FuncValue { argc, code, scope, dest: _ } => {
            assert_eq!(*argc, 1);
            assert!(scope.is_empty());
            code.clone()
        }
        other => panic!("expected FuncValue, got {other:?}"),
    };
    assert!(matches!(&block.instrs[1].kind, InstrKind::Return { .. }));

    assert_eq!(code.statics, 0);
    assert_eq!(code.locals, 2, "arg occupies local 0, the Var read copies into local 1");
    match &code.instrs[0].kind {
        InstrKind::Copy { source, dest } => {
            assert_eq!(source.section, FrameSection::Locals);
            assert_eq!(source.index, 0);
            assert_eq!(*dest, 1);
        }
        other => panic!("expected Copy, got {other:?}"),
    }
    match &code.instrs[1].kind {
        InstrKind::Return { result } => {
            assert_eq!(result.section, FrameSection::Locals);
            assert_eq!(result.index, 1);
        }
        other => panic!("expected Return, got {other:?}"),
    }
}

#[test]
fn func_value_translates_captures_through_the_parent_frame() {
    // A let binding captured by a closure should show up as a
    // `FrameIndex::locals` pointing at the *parent* frame's slot for
    // that binding, not the child's own numbering.
    let capture_use = Tc::Var { index: VarIndex::static_(0), loc: loc() };
    let closure = Tc::FuncValue {
        scope: vec![VarIndex::local(0)],
        argc: 0,
        body: Rc::new(capture_use),
        body_loc: loc(),
    };
    let let_binding = LetBinding { name: "x".into(), value: Rc::new(Tc::TypeValue { loc: loc() }) };
    let program = Tc::Let {
        recursive: false,
        bindings: vec![let_binding],
        body: Rc::new(closure),
        loc: loc(),
    };

    let (block, _blocks) = Lowerer::new().compile_program(&program);

    // Top frame: local 0 is `x`, the let binding; the FuncValue
    // instruction's capture list should resolve VarIndex::local(0)
    // against that same slot.
    let capture_ops = block
        .instrs
        .iter()
        .find_map(|i| match &i.kind {
            InstrKind::FuncValue { scope, .. } => Some(scope.clone()),
            _ => None,
        })
        .expect("expected a FuncValue instruction");
    assert_eq!(capture_ops.len(), 1);
    assert_eq!(capture_ops[0].section, FrameSection::Locals);
    assert_eq!(capture_ops[0].index, 0);
}

#[test]
fn union_select_in_tail_position_shares_one_branch_for_identical_defaults() {
    let shared = Rc::new(Tc::TypeValue { loc: loc() });
    let program = Tc::UnionSelect {
        condition: Rc::new(Tc::TypeValue { loc: loc() }),
        choices: vec![
            TcChoice { tag: 0, body: shared.clone() },
            TcChoice { tag: 1, body: shared },
        ],
        loc: loc(),
    };

    let (block, _blocks) = Lowerer::new().compile_program(&program);

    let (select_idx, jumps) = block
        .instrs
        .iter()
        .enumerate()
        .find_map(|(i, instr)| match &instr.kind {
            InstrKind::UnionSelect { jumps, .. } => Some((i, jumps.clone())),
            _ => None,
        })
        .expect("expected a UnionSelect instruction");

    assert_eq!(jumps.len(), 2);
    assert_eq!(jumps[0], jumps[1], "both tags should jump to the single compiled default branch");

    // No trailing Jump instructions: every tail branch ends in its own
    // Return, so nothing needs to rejoin a shared continuation.
    assert!(
        !block.instrs[select_idx..].iter().any(|i| matches!(i.kind, InstrKind::Jump { .. })),
        "tail union select should never emit a join Jump"
    );
}

#[test]
fn union_select_in_a_struct_field_joins_its_branches() {
    let a = Tc::StructValue { fields: Vec::new(), loc: loc() };
    let b = Tc::StructValue { fields: Vec::new(), loc: loc() };
    let select = Tc::UnionSelect {
        condition: Rc::new(Tc::TypeValue { loc: loc() }),
        choices: vec![
            TcChoice { tag: 0, body: Rc::new(a) },
            TcChoice { tag: 1, body: Rc::new(b) },
        ],
        loc: loc(),
    };
    let program = Tc::StructValue { fields: vec![Rc::new(select)], loc: loc() };

    let (block, _blocks) = Lowerer::new().compile_program(&program);

    let jump_count = block.instrs.iter().filter(|i| matches!(i.kind, InstrKind::Jump { .. })).count();
    assert_eq!(jump_count, 2, "each of the two distinct branches needs its own join jump");
}

#[test]
fn profile_wrapping_a_tail_call_becomes_an_auto_exit_on_the_call() {
    let func = Tc::Var { index: VarIndex::static_(0), loc: loc() };
    let apply = Tc::FuncApply { func: Rc::new(func), args: Vec::new(), loc: loc() };
    let program = Tc::Profile { name: "f".into(), body: Rc::new(apply) };

    let (block, blocks) = Lowerer::new().compile_program(&program);

    assert_eq!(blocks.name(fble_profile::BlockId::from_index(1)), "f");
    let call = block.instrs.iter().find(|i| matches!(i.kind, InstrKind::Call { exit: true, .. })).expect("tail call");
    assert!(call.profile_ops.iter().any(|op| matches!(op, ProfileOp::AutoExit(_))));
    assert!(!call.profile_ops.iter().any(|op| matches!(op, ProfileOp::Exit)));
}

#[test]
fn recursive_let_binding_gets_a_ref_value_placeholder_and_ref_def() {
    let binding = LetBinding { name: "self".into(), value: Rc::new(Tc::Var { index: VarIndex::local(0), loc: loc() }) };
    let program = Tc::Let {
        recursive: true,
        bindings: vec![binding],
        body: Rc::new(Tc::Var { index: VarIndex::local(0), loc: loc() }),
        loc: loc(),
    };

    let (block, _blocks) = Lowerer::new().compile_program(&program);

    assert!(matches!(block.instrs[0].kind, InstrKind::RefValue { dest: 0 }));
    let ref_def = block
        .instrs
        .iter()
        .find_map(|i| match &i.kind {
            InstrKind::RefDef { ref_: 0, value } => Some(*value),
            _ => None,
        })
        .expect("expected a RefDef tying local 0");
    // The binding's value must land in a scratch local distinct from the
    // `RefValue` placeholder itself (local 0): compiling it straight into
    // local 0 would overwrite the placeholder before this RefDef ever
    // ran, which `Scheduler::execute`'s RefDef arm can't recover from.
    assert_ne!(ref_def, FrameIndex::locals(0));
}
