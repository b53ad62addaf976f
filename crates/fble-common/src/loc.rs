//! Source locations.
//!
//! A `Loc` is the unit every diagnostic and every type/Tc/instruction node
//! carries (spec.md §3.1-3.4: "Kinds carry a source location", "every
//! instruction optionally carries..."). Unlike a byte-range `Span`, fble
//! source locations are `file:line:col` triples (spec §7: diagnostics are
//! printed with a `source:line:col:` prefix), so that's what we store.

use std::fmt;

/// A source location: file name, 1-based line, 1-based column.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Loc {
    pub file: String,
    pub line: u32,
    pub col: u32,
}

impl Loc {
    pub fn new(file: impl Into<String>, line: u32, col: u32) -> Self {
        Loc {
            file: file.into(),
            line,
            col,
        }
    }

    /// A location used for synthesized nodes that have no source origin
    /// (e.g. the `TypeValue` placeholder a `Poly` value erases to).
    pub fn synthetic() -> Self {
        Loc {
            file: "<synthetic>".into(),
            line: 0,
            col: 0,
        }
    }
}

impl fmt::Display for Loc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.col)
    }
}
