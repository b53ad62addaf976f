use super::*;
use fble_common::Loc;

fn loc() -> Loc {
    Loc::synthetic()
}

fn unit_struct(table: &mut TypeTable) -> TypeId {
    table.data_type(DataTag::Struct, vec![], loc())
}

#[test]
fn types_equal_is_reflexive() {
    let mut table = TypeTable::new();
    let t = table.data_type(
        DataTag::Struct,
        vec![("x".into(), unit_struct(&mut table))],
        loc(),
    );
    assert!(table.types_equal(t, t));
    table.release(t);
    assert_eq!(table.stats().live, 0);
}

#[test]
fn types_equal_is_symmetric_across_independently_built_types() {
    let mut table = TypeTable::new();
    let a = table.data_type(
        DataTag::Union,
        vec![
            ("a".into(), unit_struct(&mut table)),
            ("b".into(), unit_struct(&mut table)),
        ],
        loc(),
    );
    let b = table.data_type(
        DataTag::Union,
        vec![
            ("a".into(), unit_struct(&mut table)),
            ("b".into(), unit_struct(&mut table)),
        ],
        loc(),
    );
    assert!(table.types_equal(a, b));
    assert!(table.types_equal(b, a));
    table.release(a);
    table.release(b);
    assert_eq!(table.stats().live, 0);
}

#[test]
fn types_not_equal_when_fields_differ() {
    let mut table = TypeTable::new();
    let u = unit_struct(&mut table);
    let a = table.data_type(DataTag::Struct, vec![("x".into(), u)], loc());
    let v = unit_struct(&mut table);
    let b = table.data_type(DataTag::Struct, vec![("y".into(), v)], loc());
    assert!(!table.types_equal(a, b));
    table.release(a);
    table.release(b);
    assert_eq!(table.stats().live, 0);
}

#[test]
fn subst_is_identity_when_type_does_not_contain_param() {
    let mut table = TypeTable::new();
    let param = table.var_type(1, "p", loc());
    let arg = unit_struct(&mut table);
    let ty = unit_struct(&mut table);

    assert!(!table.has_param(ty, param));
    let result = table.subst(ty, param, arg);
    assert!(table.types_equal(result, ty));

    table.release(param);
    table.release(arg);
    table.release(ty);
    table.release(result);
    assert_eq!(table.stats().live, 0);
}

#[test]
fn subst_replaces_every_occurrence_of_param() {
    let mut table = TypeTable::new();
    let param = table.var_type(1, "p", loc());
    let arg = unit_struct(&mut table);
    let ty = table.data_type(
        DataTag::Struct,
        vec![("a".into(), param), ("b".into(), param)],
        loc(),
    );
    assert!(table.has_param(ty, param));

    let result = table.subst(ty, param, arg);
    let expected = table.data_type(
        DataTag::Struct,
        vec![("a".into(), arg), ("b".into(), arg)],
        loc(),
    );
    assert!(table.types_equal(result, expected));

    table.release(param);
    table.release(arg);
    table.release(ty);
    table.release(result);
    table.release(expected);
    assert_eq!(table.stats().live, 0);
}

#[test]
fn normal_beta_reduces_poly_apply_of_poly_to_substituted_body() {
    let mut table = TypeTable::new();
    let param = table.var_type(1, "p", loc());
    let arg = unit_struct(&mut table);
    let body = table.data_type(DataTag::Struct, vec![("f".into(), param)], loc());
    let poly = table.poly(param, body, loc());
    let applied = table.poly_apply(poly, arg, loc());

    let normal = table.normal(applied).expect("not vacuous");
    let expected = table.data_type(DataTag::Struct, vec![("f".into(), arg)], loc());
    assert!(table.types_equal(normal, expected));

    table.release(param);
    table.release(arg);
    table.release(body);
    table.release(poly);
    table.release(applied);
    table.release(normal);
    table.release(expected);
    assert_eq!(table.stats().live, 0);
}

#[test]
fn normal_eta_reduces_poly_of_poly_apply_to_the_inner_function() {
    // Both at kind level 0 so neither `poly_apply` nor `poly` triggers
    // the TypeType-hoisting rewrite (invariants 1/2) and the eta shape
    // stays directly visible to `normal_rec` at the top level.
    let mut table = TypeTable::new();
    let param = table.var_type(0, "p", loc());
    let f = table.var_type(0, "f", loc());
    let applied = table.poly_apply(f, param, loc());
    let eta = table.poly(param, applied, loc());

    let normal = table.normal(eta).expect("not vacuous");
    assert_eq!(normal, f);

    table.release(param);
    table.release(f);
    table.release(applied);
    table.release(eta);
    table.release(normal);
    assert_eq!(table.stats().live, 0);
}

#[test]
fn self_referential_var_is_recognized_as_vacuous() {
    let mut table = TypeTable::new();
    let v = table.var_type(0, "x", loc());
    table.assign_var(v, v);
    assert!(table.is_vacuous(v));
    table.release(v);
    assert_eq!(table.stats().live, 0);
}

#[test]
fn kind_of_poly_adds_one_level_to_the_bound_var() {
    let mut table = TypeTable::new();
    let param = table.var_type(1, "p", loc());
    let body = unit_struct(&mut table);
    let poly = table.poly(param, body, loc());

    let kind = table.kind_of(poly);
    match kind.data() {
        KindData::Poly { arg, result, .. } => {
            assert_eq!(arg.basic_level(), Some(2));
            assert_eq!(result.basic_level(), Some(0));
        }
        KindData::Basic { .. } => panic!("expected poly kind"),
    }

    table.release(param);
    table.release(body);
    table.release(poly);
    assert_eq!(table.stats().live, 0);
}

#[test]
fn types_equal_treats_independently_built_alpha_equivalent_polys_as_equal() {
    // Mirrors check_poly: every call mints a fresh, uninterned var_type,
    // so two structurally identical Poly types built independently have
    // unrelated bound-var ids. The `assumed` pair keyed on those var ids
    // (not on the Poly nodes' own ids) is what lets their bodies compare
    // equal despite that.
    let mut table = TypeTable::new();

    let param_a = table.var_type(1, "p", loc());
    let body_a = table.data_type(DataTag::Struct, vec![("f".into(), param_a)], loc());
    let poly_a = table.poly(param_a, body_a, loc());

    let param_b = table.var_type(1, "p", loc());
    let body_b = table.data_type(DataTag::Struct, vec![("f".into(), param_b)], loc());
    let poly_b = table.poly(param_b, body_b, loc());

    assert!(table.types_equal(poly_a, poly_b));
    assert!(table.types_equal(poly_b, poly_a));

    table.release(param_a);
    table.release(body_a);
    table.release(poly_a);
    table.release(param_b);
    table.release(body_b);
    table.release(poly_b);
    assert_eq!(table.stats().live, 0);
}
