//! Diagnostics: the error catalogue of spec.md §7, plus a sink that
//! accumulates them the way the checker is required to (§4.C "Failures").

use crate::loc::Loc;
use std::fmt;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// One diagnostic producer, per spec §7's three buckets.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Phase {
    Load,
    Check,
    Runtime,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub phase: Phase,
    pub loc: Loc,
    pub message: String,
}

impl Diagnostic {
    pub fn error(phase: Phase, loc: Loc, message: impl Into<String>) -> Self {
        Diagnostic {
            severity: Severity::Error,
            phase,
            loc,
            message: message.into(),
        }
    }

    pub fn warning(phase: Phase, loc: Loc, message: impl Into<String>) -> Self {
        Diagnostic {
            severity: Severity::Warning,
            phase,
            loc,
            message: message.into(),
        }
    }

    // --- Load errors (spec §7) ---

    pub fn file_not_found(loc: Loc, path: &str) -> Self {
        Self::error(Phase::Load, loc, format!("file not found: {path}"))
    }

    pub fn ambiguous_module(loc: Loc, module: &str) -> Self {
        Self::error(
            Phase::Load,
            loc,
            format!("module `{module}` has both a public and a private file"),
        )
    }

    pub fn recursive_module(loc: Loc, module: &str) -> Self {
        Self::error(
            Phase::Load,
            loc,
            format!("module `{module}` depends on itself"),
        )
    }

    // --- Type errors (spec §7) ---

    pub fn duplicate_name(loc: Loc, kind: &str, name: &str) -> Self {
        Self::error(Phase::Check, loc, format!("duplicate {kind} name: {name}"))
    }

    pub fn not_defined(loc: Loc, name: &str) -> Self {
        Self::error(Phase::Check, loc, format!("variable not defined: {name}"))
    }

    pub fn type_mismatch(loc: Loc, expected: &str, found: &str) -> Self {
        Self::error(
            Phase::Check,
            loc,
            format!("expected type {expected}, found {found}"),
        )
    }

    pub fn kind_mismatch(loc: Loc, expected: &str, found: &str) -> Self {
        Self::error(
            Phase::Check,
            loc,
            format!("expected kind {expected}, found {found}"),
        )
    }

    pub fn namespace_mismatch(loc: Loc, name: &str) -> Self {
        Self::error(
            Phase::Check,
            loc,
            format!("`{name}` is not valid in this namespace"),
        )
    }

    pub fn not_a_data_type(loc: Loc, found: &str) -> Self {
        Self::error(
            Phase::Check,
            loc,
            format!("expected a struct or union type, found {found}"),
        )
    }

    pub fn not_a_union(loc: Loc, found: &str) -> Self {
        Self::error(
            Phase::Check,
            loc,
            format!("expected a union type, found {found}"),
        )
    }

    pub fn not_applicable(loc: Loc, found: &str) -> Self {
        Self::error(
            Phase::Check,
            loc,
            format!("cannot apply arguments to {found}"),
        )
    }

    pub fn not_a_process(loc: Loc, found: &str) -> Self {
        Self::error(
            Phase::Check,
            loc,
            format!("expected a process, found {found}"),
        )
    }

    pub fn arity_mismatch(loc: Loc, expected: usize, found: usize) -> Self {
        Self::error(
            Phase::Check,
            loc,
            format!("expected {expected} arguments, found {found}"),
        )
    }

    pub fn missing_tag(loc: Loc, tag: &str) -> Self {
        Self::error(
            Phase::Check,
            loc,
            format!("union select is missing a branch for `{tag}` and has no default"),
        )
    }

    pub fn unrecognized_tag(loc: Loc, tag: &str) -> Self {
        Self::error(Phase::Check, loc, format!("no such field: {tag}"))
    }

    pub fn vacuous_type(loc: Loc, name: &str) -> Self {
        Self::error(
            Phase::Check,
            loc,
            format!("definition of `{name}` is vacuous"),
        )
    }

    pub fn bad_literal_spec(loc: Loc) -> Self {
        Self::error(
            Phase::Check,
            loc,
            "literal spec must be a struct of single-character field names".to_string(),
        )
    }

    pub fn empty_literal_word(loc: Loc) -> Self {
        Self::error(Phase::Check, loc, "literal word must not be empty")
    }

    // --- Runtime errors (spec §7) ---

    pub fn union_access_wrong_tag(loc: Loc, expected: &str, found: &str) -> Self {
        Self::error(
            Phase::Runtime,
            loc,
            format!("union access expected tag `{expected}`, found `{found}`"),
        )
    }

    pub fn deadlock(loc: Loc) -> Self {
        Self::error(Phase::Runtime, loc, "deadlock: no runnable threads")
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sev = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{}: {}: {}", self.loc, sev, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_has_source_line_col_prefix() {
        let loc = Loc::new("foo.fble", 3, 7);
        let diag = Diagnostic::not_defined(loc, "x");
        assert_eq!(diag.to_string(), "foo.fble:3:7: error: variable not defined: x");
    }

    #[test]
    fn sink_tracks_errors_vs_warnings() {
        let mut sink = DiagnosticSink::new();
        assert!(!sink.has_errors());
        sink.push(Diagnostic::warning(Phase::Check, Loc::synthetic(), "unused variable"));
        assert!(!sink.has_errors());
        sink.push(Diagnostic::not_defined(Loc::synthetic(), "y"));
        assert!(sink.has_errors());
        assert_eq!(sink.diagnostics().len(), 2);
    }

    #[test]
    fn extend_merges_two_sinks() {
        let mut a = DiagnosticSink::new();
        a.push(Diagnostic::not_defined(Loc::synthetic(), "a"));
        let mut b = DiagnosticSink::new();
        b.push(Diagnostic::not_defined(Loc::synthetic(), "b"));
        a.extend(b);
        assert_eq!(a.diagnostics().len(), 2);
    }
}

/// Accumulates diagnostics during a compilation unit, per spec §4.C/§7:
/// type and load errors are accumulated, not returned eagerly.
#[derive(Default, Debug, Clone)]
pub struct DiagnosticSink {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diag: Diagnostic) {
        self.diagnostics.push(diag);
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    pub fn extend(&mut self, other: DiagnosticSink) {
        self.diagnostics.extend(other.diagnostics);
    }
}
