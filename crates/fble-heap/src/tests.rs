use crate::{GraphHeap, ObjId, Traced};
use std::cell::RefCell;
use std::rc::Rc;

/// A node that can optionally point at one other node, enough to build
/// both acyclic graphs and a self-referential knot.
struct Node {
    name: &'static str,
    edges: Vec<ObjId>,
}

impl Traced for Node {
    fn trace(&self, visit: &mut dyn FnMut(ObjId)) {
        for &e in &self.edges {
            visit(e);
        }
    }
}

fn heap_with_log() -> (GraphHeap<Node>, Rc<RefCell<Vec<&'static str>>>) {
    let freed = Rc::new(RefCell::new(Vec::new()));
    let log = freed.clone();
    let heap = GraphHeap::new(move |n: Node| log.borrow_mut().push(n.name));
    (heap, freed)
}

#[test]
fn acyclic_object_frees_when_refcount_hits_zero() {
    let (mut heap, freed) = heap_with_log();
    let leaf = heap.alloc(Node { name: "leaf", edges: vec![] });
    let root = heap.alloc(Node { name: "root", edges: vec![leaf] });
    heap.add_ref(root, leaf);
    heap.release(leaf); // the local binding's ownership transferred into `root`

    heap.release(root);
    assert_eq!(heap.stats().live, 0, "root and leaf should both be gone");
    assert!(freed.borrow().contains(&"leaf"));
    assert!(freed.borrow().contains(&"root"));
}

#[test]
fn shared_leaf_survives_until_both_parents_release_it() {
    let (mut heap, freed) = heap_with_log();
    let leaf = heap.alloc(Node { name: "leaf", edges: vec![] });
    let a = heap.alloc(Node { name: "a", edges: vec![leaf] });
    heap.add_ref(a, leaf);
    let b = heap.alloc(Node { name: "b", edges: vec![leaf] });
    heap.add_ref(b, leaf);
    heap.release(leaf); // drop the original local binding's ownership

    heap.release(a);
    assert!(!freed.borrow().contains(&"leaf"), "b still holds a reference");

    heap.release(b);
    assert!(freed.borrow().contains(&"leaf"));
}

#[test]
fn self_referential_knot_is_collected_once_unreachable() {
    // Models tying a recursive type's knot: allocate a placeholder,
    // then mutate it to reference a structure that refers back to it.
    let (mut heap, freed) = heap_with_log();
    let knot = heap.alloc(Node { name: "knot", edges: vec![] });
    let wrapper = heap.alloc(Node { name: "wrapper", edges: vec![knot] });
    heap.add_ref(wrapper, knot);
    heap.release(knot);

    // Now tie the knot: mutate knot's own edges to point at wrapper,
    // closing the cycle, and tell the heap about the new edge.
    heap.get_mut(knot).edges.push(wrapper);
    heap.add_ref(knot, wrapper);

    // Drop the external reference that `alloc` gave `wrapper`; the
    // cycle (knot <-> wrapper) should now have zero external refcount.
    heap.release(wrapper);

    assert_eq!(heap.stats().live, 0, "the cycle should be fully collected");
    assert!(freed.borrow().contains(&"knot"));
    assert!(freed.borrow().contains(&"wrapper"));
}

#[test]
fn cycle_kept_alive_by_external_reference() {
    let (mut heap, freed) = heap_with_log();
    let a = heap.alloc(Node { name: "a", edges: vec![] });
    let b = heap.alloc(Node { name: "b", edges: vec![a] });
    heap.add_ref(b, a);
    heap.get_mut(a).edges.push(b);
    heap.add_ref(a, b); // a -> b -> a cycle

    // a is still held by its own alloc() reference (never released),
    // so the cycle's external refcount is nonzero.
    heap.release(b);
    assert!(freed.borrow().is_empty(), "the external ref on `a` keeps the cycle alive");
}

#[test]
fn max_live_high_water_mark_does_not_shrink() {
    let (mut heap, _freed) = heap_with_log();
    let a = heap.alloc(Node { name: "a", edges: vec![] });
    let _b = heap.alloc(Node { name: "b", edges: vec![] });
    assert_eq!(heap.stats().max_live, 2);
    heap.release(a);
    assert_eq!(heap.stats().live, 1);
    assert_eq!(heap.stats().max_live, 2, "high-water mark must not shrink on release");
}

#[test]
fn freed_slot_is_reused_by_a_later_alloc() {
    let (mut heap, _freed) = heap_with_log();
    let a = heap.alloc(Node { name: "a", edges: vec![] });
    heap.release(a);
    let b = heap.alloc(Node { name: "b", edges: vec![] });
    assert_eq!(a.index(), b.index());
}
