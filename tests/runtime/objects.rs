//! Objects: property maps, prototype chains, deletion.

use jsrun::{Engine, Local, Retained, Scope, Value};

#[test]
fn set_then_get_returns_the_same_bits() {
    let engine = Engine::new();
    let _scope = Scope::new(&engine);
    let object = Retained::new(&engine, engine.new_object(None));
    let key = Local::new(&engine, engine.new_string("n").into());
    let value = engine.int32(9);
    object.get().set_prop(key.get(), value);
    assert_eq!(object.get().get_prop(&engine, key.get()).raw(), value.raw());
}

#[test]
fn lookup_falls_back_through_a_deep_prototype_chain() {
    let engine = Engine::new();
    let scope = Scope::new(&engine);
    let a = Retained::new(&engine, engine.new_object(None));
    let b = Retained::new(&engine, engine.new_object(Some(a.get())));
    let c = Retained::new(&engine, engine.new_object(Some(b.get())));
    let key = Local::new(&engine, engine.new_string("k").into());

    a.get().set_prop(key.get(), engine.int32(7));
    assert_eq!(c.get().get_prop(&engine, key.get()).as_int32(), 7);

    // Detach the middle link: the property disappears from c's view.
    b.get().set_prototype(None);
    assert!(c.get().get_prop(&engine, key.get()).is_undefined());

    // a is still rooted through its Retained slot, so it survives.
    let a_value = a.value();
    engine.gc();
    assert!(engine.is_live(a_value));

    drop(scope);
    engine.gc();
    assert!(!engine.is_live(a_value));
}

#[test]
fn lookup_with_a_fresh_key_instance_finds_the_property() {
    let engine = Engine::new();
    let _scope = Scope::new(&engine);
    let object = Retained::new(&engine, engine.new_object(None));
    let key = Local::new(&engine, engine.new_string("route").into());
    object.get().set_prop(key.get(), engine.int32(66));
    // Generated code builds a new string per site; lookup is by content.
    let fresh = Local::new(&engine, engine.new_string("route").into());
    assert_eq!(object.get().get_prop(&engine, fresh.get()).as_int32(), 66);
}

#[test]
fn deletion_hides_the_receiver_slot_only() {
    let engine = Engine::new();
    let _scope = Scope::new(&engine);
    let base = Retained::new(&engine, engine.new_object(None));
    let derived = Retained::new(&engine, engine.new_object(Some(base.get())));
    let key = Local::new(&engine, engine.new_string("setting").into());
    base.get().set_prop(key.get(), engine.int32(1));
    derived.get().set_prop(key.get(), engine.int32(2));

    derived.get().delete_prop(&engine, key.get());
    assert!(!derived.get().has_own_prop(key.get()));
    assert_eq!(derived.get().get_prop(&engine, key.get()).as_int32(), 1);
}

#[test]
fn property_values_keep_their_objects_alive() {
    let engine = Engine::new();
    let payload_value;
    {
        let _scope = Scope::new(&engine);
        let holder = Retained::new(&engine, engine.new_object(None));
        let key = Local::new(&engine, engine.new_string("kept").into());
        let payload = Retained::new(&engine, engine.new_object(None));
        holder.get().set_prop(key.get(), payload.value());
        payload_value = payload.value();
        // Root the holder globally so it outlives the scope.
        let global_key = Local::new(&engine, engine.new_string("holder").into());
        engine.global().set_prop(global_key.get(), holder.value());
    }
    engine.gc();
    assert!(engine.is_live(payload_value));
}

#[test]
fn symbols_key_by_identity() {
    let engine = Engine::new();
    let _scope = Scope::new(&engine);
    let object = Retained::new(&engine, engine.new_object(None));
    let tag = Retained::new(&engine, engine.new_symbol("tag"));
    let lookalike = Retained::new(&engine, engine.new_symbol("tag"));
    object.get().set_prop(tag.value(), engine.int32(1));
    assert_eq!(object.get().get_prop(&engine, tag.value()).as_int32(), 1);
    assert!(object
        .get()
        .get_prop(&engine, lookalike.value())
        .is_undefined());
    assert_eq!(tag.get().description(), "tag");
}

#[test]
fn keys_come_back_in_insertion_order() {
    let engine = Engine::new();
    let _scope = Scope::new(&engine);
    let object = Retained::new(&engine, engine.new_object(None));
    for name in ["one", "two", "three"] {
        let key = Local::new(&engine, engine.new_string(name).into());
        object.get().set_prop(key.get(), engine.int32(0));
    }
    let keys: Vec<String> = object
        .get()
        .keys()
        .into_iter()
        .map(|k: Value| k.as_string().as_str().to_string())
        .collect();
    assert_eq!(keys, ["one", "two", "three"]);
}
