//! Command-line front end (spec §6): `fble check <file>` and
//! `fble run <file>`, built over a stand-in [`demo::DemoParser`] since
//! no lexer/grammar ships in this workspace (spec §9 non-goals). A real
//! front end swaps in its own `Parser` and keeps everything else here
//! unchanged — `fble-tc`, `fble-compiler`, and `fble-vm` are driven
//! entirely through their public traits/types, not anything specific to
//! the demo catalogue.
#![allow(clippy::print_stderr)]

mod args;
mod demo;
mod driver;
mod report;

use args::{CliArgs, Command};
use clap::Parser as _;
use demo::DemoParser;
use fble_common::CompileOptions;
use std::ffi::OsString;

/// Entry point called from the `fble` binary's `main`. Returns an
/// `anyhow::Result` so parse/load failures print with full context via
/// `main`'s `?`; `check`/`run` failing on diagnostics alone (as opposed
/// to an internal error) is reported by exiting non-zero, not erroring.
pub fn run<I, T>(args: I) -> anyhow::Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = CliArgs::parse_from(args);
    init_tracing(cli.verbose);

    let parser = DemoParser;
    let ok = match cli.command {
        Command::Check { file } => driver::check(&parser, &file)?,
        Command::Run { file, profile, quantum } => {
            let opts = CompileOptions { profiling: profile, instruction_quantum: quantum, ..CompileOptions::default() };
            driver::run(&parser, &file, &opts)?
        }
    };

    if ok {
        Ok(())
    } else {
        // Diagnostics are already on stderr; signal failure to the shell
        // without anyhow wrapping a second, redundant message.
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "fble_cli=debug,fble_vm=debug,fble_tc=debug" } else { "fble_cli=info,warn" };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.to_string()))
        .try_init();
}
