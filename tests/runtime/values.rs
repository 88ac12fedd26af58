//! Value representation: predicates, round trips, equality, coercions.

use jsrun::{Engine, Local, Retained, Scope, Value};

#[test]
fn each_predicate_claims_only_its_own_value() {
    let engine = Engine::new();
    let _scope = Scope::new(&engine);
    let int = Local::new(&engine, engine.int32(42));
    let double = Local::new(&engine, engine.number(3.14));
    let boolean = Local::new(&engine, engine.boolean(true));
    let undefined = Local::new(&engine, engine.undefined());

    assert!(int.get().is_int32());
    assert!(!int.get().is_double());
    assert!(!int.get().is_bool());
    assert!(!int.get().is_undefined());

    assert!(double.get().is_double());
    assert!(!double.get().is_int32());
    assert!(!double.get().is_bool());
    assert!(!double.get().is_undefined());

    assert!(boolean.get().is_bool());
    assert!(!boolean.get().is_int32());
    assert!(!boolean.get().is_double());
    assert!(!boolean.get().is_undefined());

    assert!(undefined.get().is_undefined());
    assert!(!undefined.get().is_int32());
    assert!(!undefined.get().is_double());
    assert!(!undefined.get().is_bool());

    assert_eq!(int.get().as_int32(), 42);
    assert_eq!(double.get().as_double(), 3.14);
    assert!(boolean.get().as_bool());
}

#[test]
fn integer_extremes_round_trip() {
    let engine = Engine::new();
    let _scope = Scope::new(&engine);
    let min = Local::new(&engine, engine.int32(i32::MIN));
    let max = Local::new(&engine, engine.int32(i32::MAX));
    assert_eq!(min.get().as_int32(), i32::MIN);
    assert_eq!(max.get().as_int32(), i32::MAX);
    assert!(min.get().is_int32());
    assert!(max.get().is_int32());
}

#[test]
fn special_doubles_round_trip() {
    let engine = Engine::new();
    let _scope = Scope::new(&engine);
    let nan = Local::new(&engine, engine.number(f64::NAN));
    let pos = Local::new(&engine, engine.number(f64::INFINITY));
    let neg = Local::new(&engine, engine.number(f64::NEG_INFINITY));
    assert!(nan.get().as_double().is_nan());
    assert_eq!(pos.get().as_double(), f64::INFINITY);
    assert_eq!(neg.get().as_double(), f64::NEG_INFINITY);
    assert!(neg.get().is_double());
}

#[test]
fn singleton_equality_and_nan_inequality() {
    let engine = Engine::new();
    assert!(engine.undefined().strict_equals(engine.undefined()));
    assert!(engine.null().strict_equals(engine.null()));
    assert!(!engine.null().strict_equals(engine.undefined()));
    let _scope = Scope::new(&engine);
    let nan = Local::new(&engine, engine.number(f64::NAN));
    assert!(!nan.get().strict_equals(nan.get()));
}

#[test]
fn string_coercion_preserves_content() {
    let engine = Engine::new();
    let _scope = Scope::new(&engine);
    let original = Retained::new(&engine, engine.new_string("some content"));
    let coerced = engine.to_string(original.value());
    assert_eq!(coerced.get().as_str(), "some content");
    // A string coerces to itself, not to a copy.
    assert_eq!(coerced.value().raw(), original.value().raw());
}

#[test]
fn distinct_strings_with_equal_content_compare_equal() {
    let engine = Engine::new();
    let _scope = Scope::new(&engine);
    let first = Retained::new(&engine, engine.new_string("twin"));
    let second = Retained::new(&engine, engine.new_string("twin"));
    assert_ne!(first.value().raw(), second.value().raw());
    assert!(first.value().strict_equals(second.value()));
}

#[test]
fn function_coerces_to_bracketed_name() {
    use jsrun::{ArgList, JsFunction, ReturnScope};

    fn noop(engine: &Engine, _func: JsFunction, _this: Value, _args: &ArgList) -> Local {
        let scope = ReturnScope::new(engine);
        scope.escape(engine.undefined())
    }

    let engine = Engine::new();
    let _scope = Scope::new(&engine);
    let function = Retained::new(&engine, engine.new_function("greet", 0, &[], noop));
    assert_eq!(
        engine.to_string(function.value()).get().as_str(),
        "[Function: greet]"
    );
    assert_eq!(function.value().type_of(), "function");
}
