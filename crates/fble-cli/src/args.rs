use clap::{Parser, Subcommand};

/// A command-line front end for the checker, compiler, and scheduler.
///
/// No production `Parser`/`ModuleLoader` ships in this workspace (spec
/// §6/§9: lexing, grammar, and filesystem module discovery are out of
/// scope), so `<file>` below does not name a real `.fble` source file on
/// disk — it names one of a small, hand-built set of demo programs
/// registered in [`crate::demo::DemoParser`]. Run `fble run --help` for
/// the list. A real front end would supply its own `Parser` in place of
/// the demo one and everything downstream of it is unchanged.
#[derive(Parser, Debug)]
#[command(name = "fble", version, about)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,

    /// Emit compiled-code/scheduler trace spans at debug level.
    #[arg(long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Parse and type check a demo program; print diagnostics and exit
    /// 0 (no errors) or 1 (errors).
    Check {
        /// Name of a demo program (see `fble run --help`).
        file: String,
    },
    /// Check, compile, and execute a demo program under fble-vm with no
    /// external I/O, printing the final value.
    Run {
        /// Name of a demo program. Known names: "unit", "pair".
        file: String,

        /// Enable call-graph profiling while running.
        #[arg(long)]
        profile: bool,

        /// Number of instructions a thread runs before yielding the
        /// scheduler to the next runnable thread.
        #[arg(long, default_value_t = 1024)]
        quantum: u32,
    },
}
