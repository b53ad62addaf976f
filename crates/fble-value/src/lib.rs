//! Runtime values (spec §4.E, §3.5): a directed graph of struct/union/
//! closure/link/port/ref/type-witness nodes living in a
//! [`fble_heap::GraphHeap`], the same discipline `fble-types` uses for
//! compile-time types.
//!
//! The one case that needs particular care is [`ValueData::Ref`] (spec
//! §4.E): `fble-tc`'s `RefDef`/bytecode's `InstrKind::RefDef` tie the
//! knot by setting a previously-allocated ref's `value` for the first
//! time, which is the only way a value-level cycle ever closes — the
//! same `add_ref`-driven cycle detection `fble-types::TypeTable::assign_var`
//! relies on for recursive types applies here unchanged.

mod value;

pub use value::{FuncValue, PortId, ValueData, ValueId, ValueTable, ValueTag};
