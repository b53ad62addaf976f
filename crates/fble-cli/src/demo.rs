//! Stand-in [`Parser`]: fble-cli ships no lexer or grammar (spec §6/§9
//! non-goals), so it cannot turn a real source file into a [`Program`].
//! This mirrors `fble-tc`'s own `tests/support::TestParser` — a fixed,
//! in-memory map of hand-built `Program`s keyed by name rather than
//! file contents — except it's a small catalogue of runnable demos
//! instead of test fixtures. A real front end replaces this with a
//! `Parser` backed by an actual lexer and drops nothing else in this
//! crate.

use fble_common::{Diagnostic, Loc};
use fble_tc::ast::{Expr, Name, Program};
use fble_tc::{LoadError, Parser};

fn loc(name: &str) -> Loc {
    Loc::new(format!("<demo:{name}>"), 1, 1)
}

/// `*()` — the empty struct value, `Unit@`'s only inhabitant.
fn unit(at: &Loc) -> Expr {
    Expr::StructValueImplicitType { args: Vec::new(), loc: at.clone() }
}

fn program_unit() -> Program {
    let at = loc("unit");
    Program {
        expr: Expr::Eval { expr: Box::new(unit(&at)), loc: at },
        deps: Vec::new(),
    }
}

/// `$(*(a: *(), b: *()))` — a process returning a two-field struct of
/// units, to exercise `StructValueImplicitType` with actual fields.
fn program_pair() -> Program {
    let at = loc("pair");
    let args = vec![
        (Name::normal("a", at.clone()), unit(&at)),
        (Name::normal("b", at.clone()), unit(&at)),
    ];
    Program {
        expr: Expr::Eval {
            expr: Box::new(Expr::StructValueImplicitType { args, loc: at.clone() }),
            loc: at,
        },
        deps: Vec::new(),
    }
}

/// Demo programs, looked up by name with an optional `.fble` suffix
/// stripped so `fble run unit` and `fble run unit.fble` both resolve.
pub struct DemoParser;

impl Parser for DemoParser {
    fn parse(&self, filename: &str) -> Result<Program, LoadError> {
        let key = filename.strip_suffix(".fble").unwrap_or(filename);
        match key {
            "unit" => Ok(program_unit()),
            "pair" => Ok(program_pair()),
            _ => Err(LoadError(Diagnostic::file_not_found(Loc::synthetic(), filename))),
        }
    }
}
