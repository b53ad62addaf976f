//! Wires the [`Parser`] → [`Checker`] → [`Lowerer`] → [`Scheduler`]
//! pipeline together for the two subcommands (spec §6: "check" and
//! "run"). Neither function does module resolution — `fble-cli`'s demo
//! programs never contain a `ModuleRef`, so `Checker::check_program`
//! (the single-expression entry point) is enough; a front end with a
//! real `ModuleLoader` would call `fble_tc::link_modules` instead.

use crate::report::print_diagnostics;
use fble_common::CompileOptions;
use fble_compiler::Lowerer;
use fble_profile::report;
use fble_tc::{Checker, Parser};
use fble_types::TypeTable;
use fble_value::{ValueData, ValueId, ValueTable};
use fble_vm::{NullIoHost, RunResult, Scheduler};
use std::rc::Rc;

/// Parses and type checks `file`, printing diagnostics. Returns whether
/// the program checked clean (no errors).
pub fn check(parser: &dyn Parser, file: &str) -> anyhow::Result<bool> {
    let program = parser.parse(file)?;
    let mut table = TypeTable::new();
    let mut checker = Checker::new(&mut table);
    checker.check_program(&program.expr);
    let diags = checker.into_diagnostics();
    print_diagnostics(diags.diagnostics());
    Ok(!diags.has_errors())
}

/// Checks, compiles, and runs `file` to completion under a headless
/// scheduler. Returns `Ok(false)` (with diagnostics already printed)
/// if checking failed; a runtime abort is reported as an error.
pub fn run(parser: &dyn Parser, file: &str, opts: &CompileOptions) -> anyhow::Result<bool> {
    let program = parser.parse(file)?;
    let mut table = TypeTable::new();
    let mut checker = Checker::new(&mut table);
    let (tc, _ty) = checker.check_program(&program.expr);
    let diags = checker.into_diagnostics();
    print_diagnostics(diags.diagnostics());
    if diags.has_errors() {
        return Ok(false);
    }

    let (code, blocks) = Lowerer::new().compile_program(&tc);
    let mut values = ValueTable::new();
    let proc = values.closure(Rc::new(code), 0, Vec::new());
    let mut scheduler = Scheduler::new(NullIoHost, values, blocks.len(), opts.instruction_quantum);
    let result = scheduler.run(proc);
    if opts.profiling {
        println!("{}", report::render(&scheduler.profile().compute(), &blocks));
    }
    match result {
        RunResult::Finished(v) => {
            println!("{}", format_value(scheduler.values(), v));
            Ok(true)
        }
        RunResult::Aborted(d) => anyhow::bail!("{d}"),
    }
}

/// A minimal, non-pretty-printed rendering of a runtime value (spec §9
/// excludes type/value pretty-printing; this is only enough to see
/// what `run` produced).
fn format_value(values: &ValueTable, v: ValueId) -> String {
    match values.get(v) {
        ValueData::Struct { fields } => {
            let inner: Vec<String> = fields.iter().map(|f| format_value(values, *f)).collect();
            format!("*({})", inner.join(", "))
        }
        ValueData::Union { tag, arg } => format!("+(tag {tag}: {})", format_value(values, *arg)),
        ValueData::Func(_) => "<func>".to_string(),
        ValueData::Link(_) => "<link>".to_string(),
        ValueData::Port { .. } => "<port>".to_string(),
        ValueData::Ref { value } => match value {
            Some(inner) => format_value(values, *inner),
            None => "<unresolved ref>".to_string(),
        },
        ValueData::TypeValue => "<type>".to_string(),
    }
}
