//! The graph heap itself.
//!
//! Every heap object gets a stable [`ObjId`] (its arena slot) and a
//! separate, mutable `id` field used for two things at once: cycle
//! detection here, and "equality up to substitution" in `fble-types`
//! (spec §3.2's Type `id`, and §4.A's cycle-detection id, are the same
//! number — a `Type` *is* a graph heap object).
//!
//! Design notes (documented deviation, see DESIGN.md): rather than the
//! textbook "sentinel one cycle member and let refcounts unravel
//! naturally" release described in spec §4.A, this collects a dead
//! cycle in one pass: once a cycle's external refcount reaches zero,
//! every member is freed together and only their edges leaving the
//! cycle are released individually. Both give the same observable
//! contract (spec §8 invariant #1, heap conservation) and a full-cycle
//! collection is far less fiddly to get right than the per-node
//! unraveling dance.

use fble_common::define_id;
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;
use std::mem;

define_id! {
    /// A stable handle into a [`GraphHeap`]; never reused while the
    /// object it names is live, reused (via the free list) once freed.
    pub struct ObjId;
}

/// Objects stored in a [`GraphHeap`] must be able to enumerate the
/// other heap objects they hold a reference to, so the heap can trace
/// reachability for freeing and cycle detection.
pub trait Traced {
    fn trace(&self, visit: &mut dyn FnMut(ObjId));
}

struct Slot<T> {
    data: Option<T>,
    id: u64,
    refcount: u32,
    cycle: Option<u32>,
}

struct Cycle {
    members: FxHashSet<ObjId>,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Stats {
    pub live: usize,
    pub max_live: usize,
}

/// A reference-counted arena with dynamic cycle detection (spec §4.A).
pub struct GraphHeap<T: Traced> {
    slots: Vec<Slot<T>>,
    free_list: Vec<u32>,
    next_id: u64,
    cycles: FxHashMap<u32, Cycle>,
    next_cycle_id: u32,
    on_free: Box<dyn FnMut(T)>,
    live: usize,
    max_live: usize,
}

impl<T: Traced> GraphHeap<T> {
    /// `on_free` is invoked once per object, in the order objects are
    /// actually reclaimed, mirroring `tsz-parser`'s arena `Drop` hooks
    /// but exposed explicitly since this heap's frees are driven by
    /// refcounts rather than Rust's own drop glue.
    pub fn new(on_free: impl FnMut(T) + 'static) -> Self {
        GraphHeap {
            slots: Vec::new(),
            free_list: Vec::new(),
            next_id: 0,
            cycles: FxHashMap::default(),
            next_cycle_id: 0,
            on_free: Box::new(on_free),
            live: 0,
            max_live: 0,
        }
    }

    pub fn alloc(&mut self, data: T) -> ObjId {
        let id = self.next_id;
        self.next_id += 1;
        let slot = Slot {
            data: Some(data),
            id,
            refcount: 1,
            cycle: None,
        };
        let obj = if let Some(index) = self.free_list.pop() {
            self.slots[index as usize] = slot;
            ObjId::from_index(index as usize)
        } else {
            self.slots.push(slot);
            ObjId::from_index(self.slots.len() - 1)
        };
        self.live += 1;
        self.max_live = self.max_live.max(self.live);
        obj
    }

    pub fn is_live(&self, obj: ObjId) -> bool {
        self.slots[obj.index()].data.is_some()
    }

    /// The id used for equality-up-to-substitution (`fble-types`) and,
    /// here, as the cycle-detection threshold. Lowered in place when
    /// `obj` is folded into a cycle.
    pub fn id(&self, obj: ObjId) -> u64 {
        self.slots[obj.index()].id
    }

    /// Force `obj`'s id. Spec §3.2/§4.B.3: derived types built by
    /// `Subst` inherit the id of their source node rather than getting
    /// a fresh one, so that `TypesEqual`'s "same id after normalization"
    /// shortcut still recognizes them.
    pub fn set_id(&mut self, obj: ObjId, id: u64) {
        self.slots[obj.index()].id = id;
    }

    pub fn get(&self, obj: ObjId) -> &T {
        self.slots[obj.index()]
            .data
            .as_ref()
            .expect("access to a freed heap object")
    }

    /// Mutable access, for the tie-the-knot pattern (spec §4.A/§4.C's
    /// `Var`/`RefDef`): build an object with a placeholder, then later
    /// mutate it to add the edge that closes a recursive reference.
    /// Callers that add a new outgoing edge this way must still call
    /// [`GraphHeap::add_ref`] so the heap's own bookkeeping sees it.
    pub fn get_mut(&mut self, obj: ObjId) -> &mut T {
        self.slots[obj.index()]
            .data
            .as_mut()
            .expect("access to a freed heap object")
    }

    pub fn stats(&self) -> Stats {
        Stats {
            live: self.live,
            max_live: self.max_live,
        }
    }

    /// Bump `obj`'s refcount: a plain, non-structural duplicate of an
    /// existing reference (e.g. `Copy`), never itself a source of new
    /// cycles since the edge already existed.
    pub fn retain(&mut self, obj: ObjId) {
        self.slots[obj.index()].refcount += 1;
    }

    /// Drop one reference to `obj`. Frees it (and, transitively, its
    /// only-reachable-through-it children) once nothing external holds
    /// it, whether `obj` is plain or part of a cycle.
    pub fn release(&mut self, obj: ObjId) {
        self.release_many(vec![obj]);
    }

    /// Record a new structural edge `src -> dst`, retaining `dst` and
    /// running cycle detection only when it's possible the edge closed
    /// a loop (spec §4.A: `src.id <= dst.id`; objects built in the
    /// usual leaves-first order always have `src.id > dst.id` and skip
    /// the expensive path entirely).
    pub fn add_ref(&mut self, src: ObjId, dst: ObjId) {
        self.retain(dst);
        if self.id(src) <= self.id(dst) {
            self.detect_and_merge_cycle(src, dst);
        }
    }

    fn detect_and_merge_cycle(&mut self, src: ObjId, dst: ObjId) {
        let threshold = self.id(src);

        // 1. Forward BFS from dst over nodes with id >= threshold,
        //    uniformly lowering their id to threshold and recording
        //    reverse edges as we go.
        let mut visited: FxHashSet<ObjId> = FxHashSet::default();
        let mut reverse: FxHashMap<ObjId, Vec<ObjId>> = FxHashMap::default();
        let mut queue: VecDeque<ObjId> = VecDeque::new();
        visited.insert(dst);
        queue.push_back(dst);

        while let Some(v) = queue.pop_front() {
            self.slots[v.index()].id = threshold;
            let mut children = Vec::new();
            if let Some(data) = &self.slots[v.index()].data {
                data.trace(&mut |w| children.push(w));
            }
            for w in children {
                if self.id(w) >= threshold {
                    reverse.entry(w).or_default().push(v);
                    if visited.insert(w) {
                        queue.push_back(w);
                    }
                }
            }
        }

        // 2. Walk backward from src along the recorded reverse edges:
        //    anything we reach was on some path dst -> ... -> src,
        //    i.e. is a member of the cycle the new edge just closed.
        let mut members: FxHashSet<ObjId> = FxHashSet::default();
        members.insert(src);
        let mut stack = vec![src];
        while let Some(v) = stack.pop() {
            if let Some(preds) = reverse.get(&v) {
                for &p in preds {
                    if members.insert(p) {
                        stack.push(p);
                    }
                }
            }
        }

        if members.len() > 1 {
            self.merge_cycle(members);
        }
    }

    /// Fold `members` into one cycle, absorbing whatever older cycles
    /// any of them already belonged to. Spec §4.A: nested cycles are
    /// not supported, so an old membership is simply dropped in favor
    /// of the new, merged one.
    fn merge_cycle(&mut self, members: FxHashSet<ObjId>) {
        let mut absorbed: FxHashSet<ObjId> = members.clone();
        for &m in &members {
            if let Some(old_cid) = self.slots[m.index()].cycle {
                if let Some(old) = self.cycles.remove(&old_cid) {
                    absorbed.extend(old.members);
                }
            }
        }

        let cid = self.next_cycle_id;
        self.next_cycle_id += 1;
        for &m in &absorbed {
            self.slots[m.index()].cycle = Some(cid);
        }
        self.cycles.insert(cid, Cycle { members: absorbed });
    }

    /// `sum(member refcounts) - (edges between members)`: a cycle with
    /// zero external refcount is unreachable from outside itself and
    /// can be collected as a unit. Recomputed on demand rather than
    /// tracked incrementally, since telling an internal edge-drop from
    /// an external one at `release` time would need per-edge source
    /// tracking this heap doesn't otherwise keep.
    fn cycle_ext_refcount(&self, cid: u32) -> i64 {
        let Some(cycle) = self.cycles.get(&cid) else {
            return 0;
        };
        let mut total: i64 = 0;
        let mut internal_edges: i64 = 0;
        for &m in &cycle.members {
            let slot = &self.slots[m.index()];
            total += i64::from(slot.refcount);
            if let Some(data) = &slot.data {
                data.trace(&mut |w| {
                    if cycle.members.contains(&w) {
                        internal_edges += 1;
                    }
                });
            }
        }
        total - internal_edges
    }

    fn release_many(&mut self, mut work: Vec<ObjId>) {
        while let Some(obj) = work.pop() {
            if !self.is_live(obj) {
                continue;
            }
            let slot = &mut self.slots[obj.index()];
            slot.refcount = slot.refcount.saturating_sub(1);
            let cycle = slot.cycle;
            if let Some(cid) = cycle {
                if self.cycle_ext_refcount(cid) <= 0 {
                    self.collect_cycle_into(cid, &mut work);
                }
            } else if self.slots[obj.index()].refcount == 0 {
                self.free_one_into(obj, &mut work);
            }
        }
    }

    fn free_one_into(&mut self, obj: ObjId, work: &mut Vec<ObjId>) {
        let slot = &mut self.slots[obj.index()];
        let data = slot.data.take().expect("double free in graph heap");
        data.trace(&mut |w| work.push(w));
        (self.on_free)(data);
        self.free_list.push(obj.index() as u32);
        self.live -= 1;
    }

    fn collect_cycle_into(&mut self, cid: u32, work: &mut Vec<ObjId>) {
        let Some(cycle) = self.cycles.remove(&cid) else {
            return;
        };
        for &m in &cycle.members {
            let slot = &mut self.slots[m.index()];
            slot.cycle = None;
            let Some(data) = slot.data.take() else {
                continue;
            };
            data.trace(&mut |w| {
                if !cycle.members.contains(&w) {
                    work.push(w);
                }
            });
            (self.on_free)(data);
            self.free_list.push(m.index() as u32);
            self.live -= 1;
        }
    }
}

impl<T: Traced> Drop for GraphHeap<T> {
    fn drop(&mut self) {
        // Run the on_free hook for anything still live when the heap
        // itself goes away, same as a real process exit would.
        let slots = mem::take(&mut self.slots);
        for mut slot in slots {
            if let Some(data) = slot.data.take() {
                (self.on_free)(data);
            }
        }
    }
}
