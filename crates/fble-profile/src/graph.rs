//! The call graph a profile thread writes into and a finished program's
//! profile is computed from (spec §4.G).

use crate::ids::{BlockId, ROOT_BLOCK};
use rustc_hash::FxHashMap;

/// Count and accumulated time for one caller/callee pair, or one
/// block's totals (`fble-profile.h`'s `FbleCallData`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CallData {
    pub count: u64,
    pub time: u64,
}

/// A directed weighted call graph keyed by block id: `edges[caller]`
/// holds every callee it was ever seen calling, with a running
/// count/time (`profile.c`'s `FbleCallGraph`, an adjacency list rather
/// than a matrix since most blocks call only a handful of others).
#[derive(Clone, Debug)]
pub struct CallGraph {
    edges: Vec<FxHashMap<BlockId, CallData>>,
}

impl CallGraph {
    pub fn new(blockc: usize) -> Self {
        CallGraph { edges: vec![FxHashMap::default(); blockc] }
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub(crate) fn call_data_mut(&mut self, caller: BlockId, callee: BlockId) -> &mut CallData {
        self.edges[caller.index()].entry(callee).or_default()
    }

    /// Compute the finished profile: cycle time is zeroed out (spec
    /// §4.G: "for each strongly connected component... inter-member
    /// edge times are zeroed"), then every block's own totals and
    /// inverted caller lists are derived from the (now acyclic-weighted)
    /// edges.
    pub fn compute(&self) -> Profile {
        let mut graph = self.clone();
        fixup_cycles(&mut graph);

        let n = graph.len();
        let mut blocks: Vec<BlockProfile> = (0..n)
            .map(|i| BlockProfile {
                id: BlockId::from_index(i),
                block: CallData::default(),
                callers: Vec::new(),
                callees: Vec::new(),
            })
            .collect();

        for caller_idx in 0..n {
            let caller = BlockId::from_index(caller_idx);
            for (&callee, &data) in &graph.edges[caller_idx] {
                blocks[callee.index()].block.count += data.count;
                blocks[callee.index()].block.time += data.time;
                blocks[caller_idx].callees.push((callee, data));
                blocks[callee.index()].callers.push((caller, data));
            }
        }

        // Block 0 is never called into (spec §4.G: "block 0 is reserved
        // and represents root; it receives the sum of its outgoing
        // edges as its totals"), so its totals can't come from the
        // incoming-edge accumulation above.
        let root = ROOT_BLOCK.index();
        let (root_count, root_time) = blocks[root]
            .callees
            .iter()
            .fold((0u64, 0u64), |(c, t), (_, d)| (c + d.count, t + d.time));
        blocks[root].block.count += root_count;
        blocks[root].block.time += root_time;

        for bp in &mut blocks {
            bp.callers.sort_by_key(|(_, d)| d.time);
            bp.callees.sort_by_key(|(_, d)| std::cmp::Reverse(d.time));
        }
        blocks.sort_by_key(|bp| std::cmp::Reverse(bp.block.time));

        Profile { blocks }
    }
}

/// Per-block totals plus its inverted caller list and callee list, the
/// pieces a flat profile or call-graph report is printed from
/// (`fble-profile.h`'s `FbleBlockProfile`).
#[derive(Clone, Debug)]
pub struct BlockProfile {
    pub id: BlockId,
    pub block: CallData,
    pub callers: Vec<(BlockId, CallData)>,
    pub callees: Vec<(BlockId, CallData)>,
}

/// The computed profile for a finished program, sorted by the flat
/// profile's usual "hottest first" order (`profile.c` sorts the whole
/// `FbleCallGraph` and each block's caller/callee lists by time once
/// cycles are fixed up).
#[derive(Clone, Debug)]
pub struct Profile {
    pub blocks: Vec<BlockProfile>,
}

/// Walks the call graph depth-first from `root`; whenever the current
/// path revisits a block already on it, the path segment from that
/// block to here is a cycle, and every edge between any two blocks in
/// that segment has its time zeroed so the cycle's time isn't counted
/// once per loop iteration (`profile.c`'s `FixupCycles`, a path-based
/// cycle search rather than a full Tarjan SCC — cheaper, and sufficient
/// since only edges reachable from the designated root ever matter).
fn fixup_cycles(graph: &mut CallGraph) {
    let mut path = Vec::new();
    fixup_cycles_rec(graph, &mut path, ROOT_BLOCK);
}

fn fixup_cycles_rec(graph: &mut CallGraph, path: &mut Vec<BlockId>, root: BlockId) {
    if let Some(i) = path.iter().position(|&id| id == root) {
        for &x in &path[i..] {
            for &y in &path[i..] {
                if let Some(data) = graph.edges[x.index()].get_mut(&y) {
                    data.time = 0;
                }
            }
        }
        return;
    }

    path.push(root);
    let callees: Vec<BlockId> = graph.edges[root.index()].keys().copied().collect();
    for callee in callees {
        fixup_cycles_rec(graph, path, callee);
    }
    path.pop();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn totals_accumulate_from_incoming_edges() {
        let mut graph = CallGraph::new(3);
        let a = ROOT_BLOCK;
        let b = BlockId::from_index(1);
        let c = BlockId::from_index(2);
        graph.call_data_mut(a, b).count = 1;
        graph.call_data_mut(a, b).time = 10;
        graph.call_data_mut(b, c).count = 2;
        graph.call_data_mut(b, c).time = 20;

        let profile = graph.compute();
        let by_id = |id: BlockId| profile.blocks.iter().find(|bp| bp.id == id).unwrap();
        assert_eq!(by_id(b).block.time, 10);
        assert_eq!(by_id(c).block.time, 20);
        // root has no callers, so its totals come from its own callees.
        assert_eq!(by_id(a).block.time, 10);
    }

    #[test]
    fn self_recursive_edge_time_is_zeroed() {
        let mut graph = CallGraph::new(2);
        let f = BlockId::from_index(1);
        graph.call_data_mut(ROOT_BLOCK, f).time = 5;
        graph.call_data_mut(f, f).time = 100;

        let profile = graph.compute();
        let by_id = |id: BlockId| profile.blocks.iter().find(|bp| bp.id == id).unwrap();
        // the f -> f edge is a one-block cycle; its time must not
        // contribute to f's total.
        assert_eq!(by_id(f).block.time, 5);
    }
}
