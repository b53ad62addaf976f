//! A profile thread: the per-execution-thread stack of active blocks
//! the VM drives as it enters, samples, and exits calls (spec §4.G).

use crate::graph::CallGraph;
use crate::ids::{BlockId, ROOT_BLOCK};

/// One entry in a profile thread's stack. `edge` is the caller/callee
/// pair that pushed (or, for a tail call, most recently replaced) this
/// frame; it's what `exit` charges the frame's accumulated time
/// against. Plain data so a scheduler running many threads can park a
/// blocked thread's stack between turns without holding open the
/// [`ProfileThread`] borrow that produced it.
#[derive(Clone, Debug)]
pub struct ProfileFrame {
    id: BlockId,
    time: u64,
    auto_exit: bool,
    edge: (BlockId, BlockId),
}

impl ProfileFrame {
    fn root() -> Self {
        ProfileFrame { id: ROOT_BLOCK, time: 0, auto_exit: false, edge: (ROOT_BLOCK, ROOT_BLOCK) }
    }

    pub fn id(&self) -> BlockId {
        self.id
    }
}

/// Accumulates one thread's call/sample events into a shared
/// [`CallGraph`] (`fble-profile.h`'s `FbleProfileThread`). Only one
/// thread's events can be recorded at a time, since this borrows the
/// graph; a scheduler interleaving many threads suspends and resumes
/// one of these per turn rather than keeping several alive at once.
pub struct ProfileThread<'g> {
    graph: &'g mut CallGraph,
    stack: Vec<ProfileFrame>,
}

impl<'g> ProfileThread<'g> {
    pub fn new(graph: &'g mut CallGraph) -> Self {
        ProfileThread { graph, stack: vec![ProfileFrame::root()] }
    }

    /// A snapshot of the current stack's block ids, oldest first, for
    /// handing a forked child thread its starting profile context
    /// (spec §4.F: "child threads inherit a snapshot of the parent's
    /// profile stack but accrue samples independently").
    pub fn snapshot(&self) -> Vec<BlockId> {
        self.stack.iter().map(|f| f.id).collect()
    }

    /// Build a thread starting from an inherited stack snapshot rather
    /// than fresh at the root, for a forked child.
    pub fn from_snapshot(graph: &'g mut CallGraph, snapshot: &[BlockId]) -> Self {
        ProfileThread { graph, stack: frames_from_snapshot(snapshot) }
    }

    /// Hands back this thread's raw stack, dropping the borrow on
    /// `graph` so another thread can be resumed against it. The
    /// scheduler stores the result on its own `ThreadState` between
    /// turns.
    pub fn suspend(self) -> Vec<ProfileFrame> {
        self.stack
    }

    /// Resumes a thread from a stack previously handed back by
    /// [`ProfileThread::suspend`].
    pub fn resume(graph: &'g mut CallGraph, stack: Vec<ProfileFrame>) -> Self {
        ProfileThread { graph, stack }
    }

    fn top(&mut self) -> &mut ProfileFrame {
        self.stack.last_mut().expect("profile thread stack is never empty")
    }

    /// Record `n` units of time spent in the currently active block.
    pub fn sample(&mut self, n: u64) {
        self.top().time += n;
    }

    /// Call into `callee`: charges a call-edge from the current top,
    /// then either pushes a fresh frame or, if the previous instruction
    /// marked this frame for auto-exit, replaces the top in place so a
    /// tail-call chain never grows the stack.
    pub fn enter(&mut self, callee: BlockId) {
        let caller = self.stack.last().unwrap().id;
        self.graph.call_data_mut(caller, callee).count += 1;

        if self.stack.last().unwrap().auto_exit {
            let top = self.top();
            top.id = callee;
            top.auto_exit = false;
            top.edge = (caller, callee);
        } else {
            self.stack.push(ProfileFrame { id: callee, time: 0, auto_exit: false, edge: (caller, callee) });
        }
    }

    /// Marks the current frame to auto-exit on its next `enter`, then
    /// performs that enter (spec §4.F's tail `Call`: the callee's
    /// `ProfileOp::AutoExit` is exactly this).
    pub fn auto_exit_enter(&mut self, callee: BlockId) {
        self.top().auto_exit = true;
        self.enter(callee);
    }

    /// Pops the current frame, charging its accumulated time against
    /// the edge that pushed it and propagating that time to the new
    /// top (spec §4.G: "exit: pop; propagate the popped frame's total
    /// time to the corresponding caller-edge").
    pub fn exit(&mut self) {
        assert!(self.stack.len() > 1, "cannot exit a profile thread's root frame");
        let frame = self.stack.pop().unwrap();
        self.graph.call_data_mut(frame.edge.0, frame.edge.1).time += frame.time;
        self.top().time += frame.time;
    }
}

/// Fresh stack data for a new thread, for a scheduler spawning its
/// very first (root) thread without yet having a live `CallGraph`
/// borrow to build a [`ProfileThread`] against.
pub fn fresh_frames() -> Vec<ProfileFrame> {
    vec![ProfileFrame::root()]
}

/// Stack data for a forked child thread, seeded from its parent's
/// snapshot, without requiring a live `CallGraph` borrow.
pub fn frames_from_snapshot(snapshot: &[BlockId]) -> Vec<ProfileFrame> {
    snapshot.iter().map(|&id| ProfileFrame { id, time: 0, auto_exit: false, edge: (ROOT_BLOCK, id) }).collect()
}

/// The block-id stack a suspended thread's raw frames represent,
/// without needing to resume a [`ProfileThread`] against a `CallGraph`
/// just to read it back (a scheduler handing a fork's snapshot to its
/// children doesn't otherwise need the graph at all).
pub fn snapshot_of(frames: &[ProfileFrame]) -> Vec<BlockId> {
    frames.iter().map(ProfileFrame::id).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enter_then_exit_charges_the_edge() {
        let mut graph = CallGraph::new(2);
        let f = BlockId::from_index(1);
        {
            let mut thread = ProfileThread::new(&mut graph);
            thread.enter(f);
            thread.sample(7);
            thread.exit();
        }
        assert_eq!(graph.call_data_mut(ROOT_BLOCK, f).time, 7);
        assert_eq!(graph.call_data_mut(ROOT_BLOCK, f).count, 1);
    }

    #[test]
    fn auto_exit_replaces_top_without_growing_the_stack() {
        let mut graph = CallGraph::new(3);
        let f = BlockId::from_index(1);
        let g = BlockId::from_index(2);
        let mut thread = ProfileThread::new(&mut graph);
        thread.enter(f);
        assert_eq!(thread.stack.len(), 2);
        thread.auto_exit_enter(g);
        assert_eq!(thread.stack.len(), 2, "tail call must not grow the stack");
        assert_eq!(thread.stack.last().unwrap().id, g);
    }

    #[test]
    #[should_panic(expected = "root frame")]
    fn exiting_the_root_frame_panics() {
        let mut graph = CallGraph::new(1);
        let mut thread = ProfileThread::new(&mut graph);
        thread.exit();
    }

    #[test]
    fn suspend_then_resume_preserves_the_stack() {
        let mut graph = CallGraph::new(2);
        let f = BlockId::from_index(1);
        let saved = {
            let mut thread = ProfileThread::new(&mut graph);
            thread.enter(f);
            thread.sample(3);
            thread.suspend()
        };
        let mut thread = ProfileThread::resume(&mut graph, saved);
        assert_eq!(thread.snapshot(), vec![ROOT_BLOCK, f]);
        thread.exit();
        assert_eq!(graph.call_data_mut(ROOT_BLOCK, f).time, 3);
    }
}
