//! End-to-end scenarios exercising the checker and module linker
//! together, in the spirit of spec §8's worked examples: identity,
//! union-select with a default branch, list desugaring, a type error
//! surfacing the expected diagnostic, and linking across modules.

mod support;

use fble_common::Loc;
use fble_tc::ast::{Binding, Choice, Expr, Module, Name, Namespace, Program, TaggedExpr, TypeField, KindExpr};
use fble_tc::tc::Tc;
use fble_tc::{link_modules, Checker, ModuleLoader};
use fble_types::TypeTable;
use std::rc::Rc;
use support::{module_name, TestLoader};

fn loc() -> Loc {
    Loc::synthetic()
}

fn unit_type(loc: Loc) -> Expr {
    Expr::StructType { fields: Vec::new(), loc }
}

fn unit_value(loc: Loc) -> Expr {
    Expr::StructValueImplicitType { args: Vec::new(), loc }
}

#[test]
fn identity_function_returns_its_argument_unchanged() {
    let mut table = TypeTable::new();
    let mut checker = Checker::new(&mut table);

    let expr = Expr::FuncValue {
        args: vec![TaggedExpr { ty: Box::new(unit_type(loc())), name: Name::normal("x", loc()) }],
        body: Box::new(Expr::Var { name: Name::normal("x", loc()) }),
        loc: loc(),
    };

    let (tc, _ty) = checker.check_program(&expr);
    assert!(!checker.diagnostics().has_errors());
    match &*tc {
        Tc::FuncValue { argc, body, .. } => {
            assert_eq!(*argc, 1);
            assert!(matches!(&**body, Tc::Var { .. }));
        }
        other => panic!("expected a FuncValue, got {other:?}"),
    }
}

#[test]
fn union_select_falls_back_to_default_branch() {
    let mut table = TypeTable::new();
    let mut checker = Checker::new(&mut table);

    let union_ty = Expr::UnionType {
        fields: vec![
            TaggedExpr { ty: Box::new(unit_type(loc())), name: Name::ty("a", loc()) },
            TaggedExpr { ty: Box::new(unit_type(loc())), name: Name::ty("b", loc()) },
        ],
        loc: loc(),
    };
    let condition = Expr::UnionValue {
        ty: Box::new(union_ty),
        field: Name::normal("a", loc()),
        arg: Box::new(unit_value(loc())),
        loc: loc(),
    };
    let expr = Expr::UnionSelect {
        condition: Box::new(condition),
        choices: vec![Choice { name: Name::normal("a", loc()), expr: Box::new(unit_value(loc())) }],
        default: Some(Box::new(unit_value(loc()))),
        loc: loc(),
    };

    let (tc, _ty) = checker.check_program(&expr);
    assert!(!checker.diagnostics().has_errors());
    match &*tc {
        Tc::UnionSelect { choices, .. } => {
            assert_eq!(choices.len(), 2, "explicit 'a' branch plus the synthesized default for 'b'");
        }
        other => panic!("expected a UnionSelect, got {other:?}"),
    }
}

#[test]
fn list_desugars_to_nested_cons_applications() {
    let mut table = TypeTable::new();
    let mut checker = Checker::new(&mut table);

    let expr = Expr::List {
        ty: Box::new(unit_type(loc())),
        elems: vec![unit_value(loc()), unit_value(loc()), unit_value(loc())],
        loc: loc(),
    };

    let (tc, ty) = checker.check_program(&expr);
    assert!(!checker.diagnostics().has_errors());
    assert!(table.kind_of(ty).basic_level().is_none(), "List@ is a type constructor, poly-kinded, not a plain type");

    match &*tc {
        Tc::Let { body, .. } => match &**body {
            Tc::FuncValue { argc, .. } => assert_eq!(*argc, 2, "cons, nil"),
            other => panic!("expected the cons/nil lambda, got {other:?}"),
        },
        other => panic!("expected a Let wrapping the cons/nil lambda, got {other:?}"),
    }
}

#[test]
fn struct_value_arity_mismatch_reports_the_expected_diagnostic() {
    let mut table = TypeTable::new();
    let mut checker = Checker::new(&mut table);

    let struct_ty_name = Name::ty("Pair", loc());
    let struct_ty = Expr::StructType {
        fields: vec![
            TaggedExpr { ty: Box::new(unit_type(loc())), name: Name::normal("x", loc()) },
            TaggedExpr { ty: Box::new(unit_type(loc())), name: Name::normal("y", loc()) },
        ],
        loc: loc(),
    };
    let expr = Expr::Let {
        recursive: false,
        bindings: vec![Binding {
            kind: None,
            ty: Some(Box::new(Expr::Typeof { expr: Box::new(struct_ty.clone()), loc: loc() })),
            name: struct_ty_name.clone(),
            expr: Box::new(struct_ty),
        }],
        body: Box::new(Expr::MiscApply {
            func: Box::new(Expr::Var { name: struct_ty_name }),
            args: vec![unit_value(loc())],
            loc: loc(),
        }),
        loc: loc(),
    };

    let (_tc, _ty) = checker.check_program(&expr);
    assert!(checker.diagnostics().has_errors());
    let messages: Vec<String> = checker.diagnostics().diagnostics().iter().map(|d| d.message.clone()).collect();
    assert!(
        messages.iter().any(|m| m.contains("expected 2 arguments, found 1")),
        "expected an arity-mismatch diagnostic, got: {messages:?}"
    );
}

#[test]
fn link_modules_chains_a_dependency_before_its_dependent() {
    let unit_path = vec![Name::new("Unit", Namespace::Module, loc())];
    let unit_module = Module {
        path: unit_path.clone(),
        expr: unit_value(loc()),
        deps: Vec::new(),
    };

    let main_deps = vec![unit_path.clone()];
    let main_program = Program {
        expr: Expr::ModuleRef { path: unit_path, loc: loc() },
        deps: main_deps,
    };

    let loader = TestLoader::new(vec![unit_module]);
    let modules = loader.load(&main_program).expect("no cycle among these two");
    assert_eq!(modules.len(), 1);
    assert_eq!(module_name(&modules[0].path), "Unit");

    let mut table = TypeTable::new();
    let mut checker = Checker::new(&mut table);
    let (tc, _ty) = link_modules(&mut checker, &modules, &main_program).expect("no recursive dependency");
    assert!(!checker.diagnostics().has_errors());
    match &*tc {
        Tc::Let { bindings, body, .. } => {
            assert_eq!(bindings.len(), 1);
            assert!(matches!(&*bindings[0].value, Tc::Profile { .. }));
            assert!(matches!(&**body, Tc::Var { .. }), "main resolves the ModuleRef to the bound module var");
        }
        other => panic!("expected the module Let chain, got {other:?}"),
    }
}

#[test]
fn poly_value_has_a_poly_kind() {
    let mut table = TypeTable::new();
    let mut checker = Checker::new(&mut table);

    let expr = Expr::Poly {
        arg: TypeField { kind: KindExpr::Basic { level: 0, loc: loc() }, name: Name::ty("T", loc()) },
        body: Box::new(Expr::Var { name: Name::ty("T", loc()) }),
        loc: loc(),
    };

    let (_tc, ty) = checker.check_program(&expr);
    assert!(!checker.diagnostics().has_errors());
    let kind = table.kind_of(ty);
    assert!(kind.basic_level().is_none(), "a Poly's kind is a poly kind, not a basic one");
}
