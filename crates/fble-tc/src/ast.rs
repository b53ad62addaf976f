//! Surface syntax tree produced by a [`crate::Parser`].
//!
//! Field/variable names are still strings here (they only become integer
//! indices in [`crate::tc::Tc`], after checking), and type expressions are
//! ordinary [`Expr`] nodes that happen to evaluate to a type value rather
//! than a separate "type expression" grammar.

use fble_common::Loc;
use std::rc::Rc;

/// A name lives in one of three namespaces, so `Foo` (normal), `Foo@`
/// (type) and a module path segment never collide even when spelled the
/// same way.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Namespace {
    Normal,
    Type,
    Module,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Name {
    pub text: Rc<str>,
    pub space: Namespace,
    pub loc: Loc,
}

impl Name {
    pub fn new(text: impl Into<Rc<str>>, space: Namespace, loc: Loc) -> Self {
        Name {
            text: text.into(),
            space,
            loc,
        }
    }

    pub fn normal(text: impl Into<Rc<str>>, loc: Loc) -> Self {
        Name::new(text, Namespace::Normal, loc)
    }

    pub fn ty(text: impl Into<Rc<str>>, loc: Loc) -> Self {
        Name::new(text, Namespace::Type, loc)
    }
}

/// Kind expressions, mirroring [`fble_types::Kind`]'s shape one level up:
/// a kind hasn't been resolved to a `fble_types::Kind` yet, just parsed.
#[derive(Clone, Debug)]
pub enum KindExpr {
    Basic { level: u32, loc: Loc },
    Poly {
        arg: Box<KindExpr>,
        result: Box<KindExpr>,
        loc: Loc,
    },
}

impl KindExpr {
    pub fn loc(&self) -> &Loc {
        match self {
            KindExpr::Basic { loc, .. } | KindExpr::Poly { loc, .. } => loc,
        }
    }
}

/// `(Type, Name)` pair used for struct/union field lists and function
/// arguments.
#[derive(Clone, Debug)]
pub struct TaggedExpr {
    pub ty: Box<Expr>,
    pub name: Name,
}

/// `(Kind, Name)` pair used for poly binders.
#[derive(Clone, Debug)]
pub struct TypeField {
    pub kind: KindExpr,
    pub name: Name,
}

/// A single `let`/`exec` binding: `Type name = Expr`, with the type
/// expression optional in sugared `Type@ name = ...` implicit-type forms
/// the parser is expected to have already desugared to an explicit type.
#[derive(Clone, Debug)]
pub struct Binding {
    pub kind: Option<KindExpr>,
    pub ty: Option<Box<Expr>>,
    pub name: Name,
    pub expr: Box<Expr>,
}

#[derive(Clone, Debug)]
pub struct Choice {
    pub name: Name,
    pub expr: Box<Expr>,
}

/// The surface expression grammar (spec §6, grounded on
/// `fble-syntax.h`'s `FbleExprTag`). Type expressions and value
/// expressions share this one grammar: `StructType`/`FuncType`/... are
/// ordinary `Expr`s that the checker, not the grammar, knows evaluate to
/// types.
#[derive(Clone, Debug)]
pub enum Expr {
    /// `*(Field1 x, Field2 y, ...)` as a type.
    StructType { fields: Vec<TaggedExpr>, loc: Loc },
    /// `Type(x: a, y: b)`: a struct value with its field types inferred
    /// from each argument rather than stated explicitly.
    StructValueImplicitType {
        args: Vec<(Name, Expr)>,
        loc: Loc,
    },
    /// `+(Field1 x, Field2 y, ...)` as a type.
    UnionType { fields: Vec<TaggedExpr>, loc: Loc },
    /// `Type(field: x)`: picks a union tag and wraps a payload.
    UnionValue {
        ty: Box<Expr>,
        field: Name,
        arg: Box<Expr>,
        loc: Loc,
    },
    /// `cond.?(tag1: e1, tag2: e2, : default)`.
    UnionSelect {
        condition: Box<Expr>,
        choices: Vec<Choice>,
        default: Option<Box<Expr>>,
        loc: Loc,
    },
    /// `(Arg) { Return; }` as a type.
    FuncType {
        args: Vec<Expr>,
        result: Box<Expr>,
        loc: Loc,
    },
    /// `(Type x, Type y) { body; }`.
    FuncValue {
        args: Vec<TaggedExpr>,
        body: Box<Expr>,
        loc: Loc,
    },
    /// `f(x, y)`: overloaded in the original grammar for function
    /// application, for a struct value with an explicit type
    /// (`Type(a, b)`), and for `get`/`put` on a port — the checker
    /// disambiguates by the statically known type/kind of `func`.
    MiscApply {
        func: Box<Expr>,
        args: Vec<Expr>,
        loc: Loc,
    },
    /// `+@<Type>` / `-@<Type>` as a type (an input or output port type).
    ProcType { ty: Box<Expr>, loc: Loc },
    /// `$(expr)`: wraps a pure value as a process that returns it.
    Eval { expr: Box<Expr>, loc: Loc },
    /// `Type ~ get, put; body`: introduces a linked get/put port pair.
    Link {
        ty: Box<Expr>,
        get: Name,
        put: Name,
        body: Box<Expr>,
        loc: Loc,
    },
    /// `Type a := expr, Type b := expr2; body`: runs processes, binds
    /// their results, then runs `body`.
    Exec {
        bindings: Vec<Binding>,
        body: Box<Expr>,
        loc: Loc,
    },
    /// `obj.field`: overloaded for both struct and union field access,
    /// disambiguated by `obj`'s checked type.
    MiscAccess { object: Box<Expr>, field: Name, loc: Loc },
    Var { name: Name },
    /// `Type x = expr, ...; body`, optionally `recursive` (mutually
    /// recursive bindings referencing each other, e.g. `Unit@ x = ...`
    /// tied through a `Var` type/value).
    Let {
        recursive: bool,
        bindings: Vec<Binding>,
        body: Box<Expr>,
        loc: Loc,
    },
    /// `typeof(expr)`: the type of `expr`'s type, without evaluating it.
    Typeof { expr: Box<Expr>, loc: Loc },
    /// `<@ arg@> body` or `<arg@> body`: a poly value.
    Poly {
        arg: TypeField,
        body: Box<Expr>,
        loc: Loc,
    },
    /// `poly<Type>`: applies a poly value/type to a type argument.
    PolyApply {
        poly: Box<Expr>,
        arg: Box<Expr>,
        loc: Loc,
    },
    /// `List@<Type>[e1, e2, ...]`, desugared by the checker per spec
    /// §4.C "List desugaring" into nested union constructors.
    List {
        ty: Box<Expr>,
        elems: Vec<Expr>,
        loc: Loc,
    },
    /// `Type@|abc|` or `Type@|abc|`-style word literal, desugared by
    /// the checker per spec §4.C "Literal desugaring".
    Literal {
        ty: Box<Expr>,
        word: String,
        loc: Loc,
    },
    /// `@module/path%`: a reference to another module, resolved by
    /// [`crate::ModuleLoader`] before checking, not by the checker itself.
    ModuleRef { path: Vec<Name>, loc: Loc },
}

impl Expr {
    pub fn loc(&self) -> &Loc {
        match self {
            Expr::StructType { loc, .. }
            | Expr::StructValueImplicitType { loc, .. }
            | Expr::UnionType { loc, .. }
            | Expr::UnionValue { loc, .. }
            | Expr::UnionSelect { loc, .. }
            | Expr::FuncType { loc, .. }
            | Expr::FuncValue { loc, .. }
            | Expr::MiscApply { loc, .. }
            | Expr::ProcType { loc, .. }
            | Expr::Eval { loc, .. }
            | Expr::Link { loc, .. }
            | Expr::Exec { loc, .. }
            | Expr::MiscAccess { loc, .. }
            | Expr::Let { loc, .. }
            | Expr::Typeof { loc, .. }
            | Expr::Poly { loc, .. }
            | Expr::PolyApply { loc, .. }
            | Expr::List { loc, .. }
            | Expr::Literal { loc, .. }
            | Expr::ModuleRef { loc, .. } => loc,
            Expr::Var { name } => &name.loc,
        }
    }
}

/// A single compilation unit: a module's own name, the expression it
/// evaluates to, and the other modules it names via `ModuleRef`
/// (recorded separately by [`crate::ModuleLoader`] so linking can
/// topologically sort without re-walking every expression).
#[derive(Clone, Debug)]
pub struct Module {
    pub path: Vec<Name>,
    pub expr: Expr,
    pub deps: Vec<Vec<Name>>,
}

/// The result of parsing one source file: a root expression plus every
/// `ModuleRef` path it mentions, for the loader to resolve.
#[derive(Clone, Debug)]
pub struct Program {
    pub expr: Expr,
    pub deps: Vec<Vec<Name>>,
}
