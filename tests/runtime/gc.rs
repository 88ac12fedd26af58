//! Collection behavior observed through the public API.

use jsrun::{Engine, Local, Retained, Scope, Value};

#[test]
fn reachable_survives_and_garbage_is_reclaimed() {
    let engine = Engine::new();
    {
        let _scope = Scope::new(&engine);
        let kept = Retained::new(&engine, engine.new_object(None));
        let key = Local::new(&engine, engine.new_string("x").into());
        engine.global().set_prop(key.get(), kept.value());
    }
    let stray: Value = engine.new_object(None).into();
    assert!(engine.is_live(stray));

    engine.gc();

    let found = engine
        .global()
        .get_prop(&engine, engine.new_string("x").into());
    assert!(found.is_object());
    assert!(engine.is_live(found));
    assert!(!engine.is_live(stray));
}

#[test]
fn collecting_twice_changes_nothing() {
    let engine = Engine::new();
    let _scope = Scope::new(&engine);
    let _kept = Retained::new(&engine, engine.new_object(None));
    let _also = Retained::new(&engine, engine.new_string("still here"));
    engine.gc();
    let after_first = engine.gc_stats().live_objects;
    engine.gc();
    assert_eq!(engine.gc_stats().live_objects, after_first);
}

#[test]
fn shadow_stack_slots_are_scanned_as_roots() {
    let engine = Engine::new();
    let _scope = Scope::new(&engine);
    let local = Local::new(&engine, engine.new_string("rooted by slot").into());
    engine.gc();
    assert!(engine.is_live(local.get()));
    assert_eq!(local.get().as_string().as_str(), "rooted by slot");
}

#[test]
fn overwriting_a_slot_releases_the_old_referent() {
    let engine = Engine::new();
    let _scope = Scope::new(&engine);
    let local = Local::new(&engine, engine.new_string("first").into());
    let first = local.get();
    local.set(engine.new_string("second").into());
    engine.gc();
    assert!(!engine.is_live(first));
    assert!(engine.is_live(local.get()));
}

// Under force-gc the counter is reset inside every allocation.
#[cfg(not(feature = "force-gc"))]
#[test]
fn stats_track_the_allocation_counter() {
    let engine = Engine::new();
    engine.set_gc_threshold(0);
    let before = engine.gc_stats().allocations_since_gc;
    let _stray: Value = engine.new_object(None).into();
    assert_eq!(engine.gc_stats().allocations_since_gc, before + 1);
    engine.gc();
    assert_eq!(engine.gc_stats().allocations_since_gc, 0);
}

#[test]
fn maybe_gc_respects_the_threshold() {
    let engine = Engine::new();
    engine.set_gc_threshold(4);
    let collections = engine.gc_stats().collections;
    engine.maybe_gc();
    assert_eq!(engine.gc_stats().collections, collections);
    for _ in 0..4 {
        let _stray: Value = engine.new_object(None).into();
    }
    // The counter policy fired inside allocation.
    assert!(engine.gc_stats().collections > collections);
}

#[test]
fn dump_lists_the_world() {
    let engine = Engine::new();
    let _scope = Scope::new(&engine);
    let _name = Retained::new(&engine, engine.new_string("visible"));
    let listing = engine.dump();
    assert!(listing.starts_with("Engine(["));
    assert!(listing.contains("\"visible\""));
}
