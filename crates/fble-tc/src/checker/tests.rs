use super::*;
use crate::ast::TaggedExpr;
use fble_types::TypeTable;

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
fn let_binding_an_abstract_type_under_a_normal_name_is_a_namespace_mismatch() {
    let mut table = TypeTable::new();
    let mut checker = Checker::new(&mut table);

    // `% Foo = *();` — kind defaults to level 0 (no `kind` given), so
    // `Foo` should live in `Namespace::Normal`; binding it as `Foo@`
    // (`Namespace::Type`) is the violation this test exercises.
    let expr = Expr::Let {
        recursive: false,
        bindings: vec![Binding {
            kind: None,
            ty: None,
            name: Name::ty("Foo", loc()),
            expr: Box::new(unit_value(loc())),
        }],
        body: Box::new(unit_value(loc())),
        loc: loc(),
    };

    let (_tc, _ty) = checker.check_program(&expr);
    assert!(checker.diagnostics().has_errors());
    assert!(checker
        .diagnostics()
        .diagnostics()
        .iter()
        .any(|d| d.message.contains("not valid in this namespace")));
}

#[test]
fn let_binding_whose_value_type_does_not_match_its_declared_kind_is_a_kind_mismatch() {
    let mut table = TypeTable::new();
    let mut checker = Checker::new(&mut table);

    // `@ T@ = Unit@;` declares an abstract *type* (kind level 1) but
    // binds it to an ordinary struct *value* (kind level 0) — the
    // inferred binding's kind check in `check_let` should catch this
    // rather than silently accepting it at whatever level the value
    // happens to produce.
    let expr = Expr::Let {
        recursive: false,
        bindings: vec![Binding {
            kind: Some(KindExpr::Basic { level: 1, loc: loc() }),
            ty: None,
            name: Name::ty("T", loc()),
            expr: Box::new(unit_value(loc())),
        }],
        body: Box::new(unit_value(loc())),
        loc: loc(),
    };

    let (_tc, _ty) = checker.check_program(&expr);
    assert!(checker.diagnostics().has_errors());
    assert!(checker
        .diagnostics()
        .diagnostics()
        .iter()
        .any(|d| d.message.contains("expected kind")));
}

#[test]
fn let_binding_a_type_to_itself_is_vacuous() {
    let mut table = TypeTable::new();
    let mut checker = Checker::new(&mut table);

    // `@ T@ = T@;` — the placeholder never gets resolved to anything
    // but itself.
    let expr = Expr::Let {
        recursive: true,
        bindings: vec![Binding {
            kind: Some(KindExpr::Basic { level: 1, loc: loc() }),
            ty: None,
            name: Name::ty("T", loc()),
            expr: Box::new(Expr::Var { name: Name::ty("T", loc()) }),
        }],
        body: Box::new(unit_value(loc())),
        loc: loc(),
    };

    let (_tc, _ty) = checker.check_program(&expr);
    assert!(checker.diagnostics().has_errors());
    assert!(checker
        .diagnostics()
        .diagnostics()
        .iter()
        .any(|d| d.message.contains("vacuous")));
}

#[test]
fn func_value_argument_in_the_wrong_namespace_is_rejected() {
    let mut table = TypeTable::new();
    let mut checker = Checker::new(&mut table);

    // A function argument is always a `Normal`-namespace binding
    // (level 0); declaring it with a type-namespace name is invalid
    // regardless of the argument's own declared type.
    let expr = Expr::FuncValue {
        args: vec![TaggedExpr { ty: Box::new(unit_type(loc())), name: Name::ty("x", loc()) }],
        body: Box::new(unit_value(loc())),
        loc: loc(),
    };

    let (_tc, _ty) = checker.check_program(&expr);
    assert!(checker.diagnostics().has_errors());
    assert!(checker
        .diagnostics()
        .diagnostics()
        .iter()
        .any(|d| d.message.contains("not valid in this namespace")));
}

#[test]
fn referencing_an_undefined_variable_still_yields_a_usable_error_type() {
    let mut table = TypeTable::new();
    let mut checker = Checker::new(&mut table);

    let expr = Expr::Var { name: Name::normal("nope", loc()) };
    let (_tc, ty) = checker.check_program(&expr);

    assert!(checker.diagnostics().has_errors());
    // The error type is a plain (empty) struct, so it's usable
    // downstream (e.g. accessed, applied to) without a second
    // diagnostic cascade.
    let resolved = table.normal(ty).unwrap_or(ty);
    assert!(matches!(table.get(resolved), fble_types::TypeData::Data { .. }));
}
