//! Kinds, types, and the type-level operations of spec §3-§4.B: smart
//! constructors enforcing the graph invariants, substitution,
//! normalization, and structural equality up to substitution.

mod kind;
mod ty;

pub use kind::{Kind, KindData, kinds_equal};
pub use ty::{DataTag, TypeData, TypeId, TypeTable};
