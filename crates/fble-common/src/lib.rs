//! Shared diagnostics, source locations, and compile options for the `fble`
//! compiler/runtime workspace.

pub mod diagnostics;
pub mod id;
pub mod loc;
pub mod options;

pub use diagnostics::{Diagnostic, DiagnosticSink, Phase, Severity};
pub use loc::Loc;
pub use options::CompileOptions;
