//! Mark-and-sweep garbage collection.
//!
//! Collection is synchronous, stop-the-world and non-moving. It runs only
//! at allocation time or on an explicit [`Engine::gc`](crate::engine::Engine::gc)
//! call, so generated code may hold raw heap pointers between allocations as
//! long as everything live is rooted in the shadow stack before the next one.
//!
//! Roots are the five sigil boxes, the global root object, the current
//! activation frame (its trace hook covers the parent chain) and every
//! shadow-stack slot below the top.

use std::ptr::NonNull;

use crate::engine::EngineInner;
use crate::heap::{HeapData, HeapObject};

/// Statistics about the collector.
#[derive(Debug, Clone, Copy)]
pub struct GcStats {
    /// Objects currently in the live set.
    pub live_objects: usize,
    /// Completed collection cycles.
    pub collections: usize,
    /// Allocations since the last collection.
    pub allocations_since_gc: usize,
}

/// Run one full collection cycle. A no-op until the engine has finished
/// creating its sigil objects.
pub(crate) fn collect(inner: &mut EngineInner) {
    if !inner.ready_for_gc {
        return;
    }
    mark(inner);
    sweep(inner);
    inner.allocations_since_gc = 0;
    inner.collections += 1;
}

/// Mark phase: flood-fill the reachable graph from the roots. Uses an
/// explicit worklist rather than recursion so deep object graphs cannot
/// exhaust the native stack.
fn mark(inner: &mut EngineInner) {
    let mut worklist: Vec<NonNull<HeapObject>> = Vec::new();

    let sigils = inner.sigils();
    worklist.extend([
        sigils.undefined,
        sigils.null,
        sigils.deleted,
        sigils.false_,
        sigils.true_,
    ]);
    if let Some(root) = inner.root {
        worklist.push(root);
    }
    if let Some(frame) = inner.frame {
        worklist.push(frame);
    }
    for slot in inner.stack[..inner.stack_top].iter() {
        if let Some(ptr) = slot.get().heap_ptr() {
            worklist.push(ptr);
        }
    }

    while let Some(ptr) = worklist.pop() {
        let addr = ptr.as_ptr() as usize;
        if !inner.objects.contains_key(&addr) {
            // A reference escaped the live set: unrecoverable core bug.
            panic!("collector found a reference outside the live set: {addr:#x}");
        }
        // In the live set, so the allocation is valid.
        let object = unsafe { ptr.as_ref() };
        if object.marked() {
            continue;
        }
        object.set_marked(true);
        object.trace(&mut |value| {
            if let Some(target) = value.heap_ptr() {
                worklist.push(target);
            }
        });
    }
}

/// Sweep phase: free everything unmarked, then clear the mark on survivors.
/// The dead are collected into a list first so the live set is not mutated
/// while it is being scanned.
fn sweep(inner: &mut EngineInner) {
    let dead: Vec<usize> = inner
        .objects
        .iter()
        .filter(|(_, object)| !object.marked())
        .map(|(&addr, _)| addr)
        .collect();

    for addr in dead {
        if let Some(object) = inner.objects.remove(&addr) {
            if let HeapData::String(text) = object.data() {
                inner.interner.forget(text, addr);
            }
        }
    }

    for object in inner.objects.values() {
        object.set_marked(false);
    }
}
