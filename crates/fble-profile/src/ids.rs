//! Block ids and the name table behind them (spec §4.G: "a profile is
//! a directed weighted call graph keyed by block-id"). Block 0 is
//! reserved for the synthetic root every other block is reachable
//! from, seeded by [`BlockTable::new`] so every table starts non-empty.

use fble_common::define_id;

define_id! {
    pub struct BlockId;
}

pub const ROOT_BLOCK: BlockId = BlockId(0);

/// Interns block names to stable ids, the way [`crate::BlockTable`]'s
/// callers (the compiler, assigning a block per `Tc::Profile`/function
/// body; the profiler, reporting by name) both need. Names need not be
/// unique — two functions named `f` in different scopes get distinct
/// ids, matching the original's own per-definition (not per-name)
/// block allocation.
#[derive(Debug, Default)]
pub struct BlockTable {
    names: Vec<String>,
}

impl BlockTable {
    pub fn new() -> Self {
        BlockTable { names: vec!["root".to_string()] }
    }

    pub fn register(&mut self, name: impl Into<String>) -> BlockId {
        let id = BlockId::from_index(self.names.len());
        self.names.push(name.into());
        id
    }

    pub fn name(&self, id: BlockId) -> &str {
        &self.names[id.index()]
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_zero_is_reserved_for_root() {
        let table = BlockTable::new();
        assert_eq!(table.name(ROOT_BLOCK), "root");
    }

    #[test]
    fn registered_blocks_get_distinct_ids_even_with_the_same_name() {
        let mut table = BlockTable::new();
        let a = table.register("f");
        let b = table.register("f");
        assert_ne!(a, b);
        assert_eq!(table.name(a), "f");
        assert_eq!(table.name(b), "f");
    }
}
