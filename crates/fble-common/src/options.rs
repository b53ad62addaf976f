//! Compile/run options shared across the pipeline, modeled on
//! `tsz_common::checker_options::CheckerOptions` — a plain `Default`able
//! struct the CLI fills in from `clap`, never parsed inside library crates.

/// Options threaded through checking, compilation and execution.
#[derive(Clone, Debug)]
pub struct CompileOptions {
    /// Attach profiling instrumentation (spec §4.D "Profile wrappers") when
    /// lowering to bytecode. Off by default; the interpreter runs faster
    /// without the `ProfileOp` bookkeeping.
    pub profiling: bool,

    /// Number of instructions a thread executes before yielding
    /// (spec §4.F "YIELDED: the thread consumed its instruction quantum").
    pub instruction_quantum: u32,

    /// When true, two runs (with different input sizes, supplied by the
    /// driver) are compared and peak value-heap bytes must be within this
    /// run's tolerance of each other — the `mem-test --growth` check of
    /// spec §5/§6.
    pub mem_test_growth_expected: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions {
            profiling: false,
            instruction_quantum: 1024,
            mem_test_growth_expected: false,
        }
    }
}
