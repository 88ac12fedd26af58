//! Calls: argument padding, frames, return-value escape.

use jsrun::{ArgList, Engine, JsFunction, Local, Retained, ReturnScope, Scope, Value};

fn work_body(engine: &Engine, _func: JsFunction, _this: Value, _args: &ArgList) -> Local {
    let scope = ReturnScope::new(engine);
    scope.escape(engine.new_string("work").into())
}

fn play_body(engine: &Engine, _func: JsFunction, _this: Value, _args: &ArgList) -> Local {
    let scope = ReturnScope::new(engine);
    scope.escape(engine.new_string("play").into())
}

#[test]
fn escaped_return_values_survive_collection() {
    let engine = Engine::new();
    let _scope = Scope::new(&engine);
    let work = Retained::new(&engine, engine.new_function("work", 0, &[], work_body));
    let play = Retained::new(&engine, engine.new_function("play", 0, &[], play_body));

    let first = engine.call(work.value(), engine.null(), &[]);
    let second = engine.call(play.value(), engine.null(), &[]);
    let life = engine.add(first.get(), second.get());
    assert_eq!(life.get().as_string().as_str(), "workplay");

    // Both intermediate strings sit in the caller's region, so collection
    // must keep them.
    engine.gc();
    assert!(engine.is_live(first.get()));
    assert!(engine.is_live(second.get()));
    assert_eq!(life.get().as_string().as_str(), "workplay");
}

#[test]
fn a_call_leaves_exactly_one_slot_in_the_caller() {
    let engine = Engine::new();
    let _scope = Scope::new(&engine);
    let work = Retained::new(&engine, engine.new_function("work", 0, &[], work_body));
    let top = engine.stack_top();
    let _result = engine.call(work.value(), engine.null(), &[]);
    assert_eq!(engine.stack_top(), top + 1);
}

fn check_padding(engine: &Engine, _func: JsFunction, _this: Value, args: &ArgList) -> Local {
    let scope = ReturnScope::new(engine);
    assert_eq!(args.len(), 2);
    assert!(args.get(0).strict_equals(engine.int32(10)));
    assert!(args.get(1).strict_equals(engine.int32(20)));
    assert!(args.get(2).is_undefined());
    scope.escape(engine.boolean(true))
}

#[test]
fn missing_arguments_are_padded_with_undefined() {
    let engine = Engine::new();
    let _scope = Scope::new(&engine);
    let padded = Retained::new(
        &engine,
        engine.new_function("padded", 3, &[], check_padding),
    );
    let result = engine.call(
        padded.value(),
        engine.null(),
        &[engine.int32(10), engine.int32(20)],
    );
    assert!(result.get().as_bool());
}

fn return_this(engine: &Engine, _func: JsFunction, this: Value, _args: &ArgList) -> Local {
    let scope = ReturnScope::new(engine);
    scope.escape(this)
}

#[test]
fn this_is_forwarded_to_the_body() {
    let engine = Engine::new();
    let _scope = Scope::new(&engine);
    let receiver = Retained::new(&engine, engine.new_object(None));
    let method = Retained::new(&engine, engine.new_function("method", 0, &[], return_this));
    let result = engine.call(method.value(), receiver.value(), &[]);
    assert_eq!(result.get().raw(), receiver.value().raw());
}

fn sum_down(engine: &Engine, func: JsFunction, _this: Value, args: &ArgList) -> Local {
    let ret = ReturnScope::new(engine);
    let n = args.get(0).as_int32();
    if n <= 0 {
        return ret.escape(engine.int32(0));
    }
    let rest = engine.call(func.into(), engine.null(), &[engine.int32(n - 1)]);
    ret.escape(engine.add(rest.get(), engine.int32(n)).get())
}

#[test]
fn nested_activations_stack_and_unwind() {
    let engine = Engine::new();
    let _scope = Scope::new(&engine);
    let sum = Retained::new(&engine, engine.new_function("sumDown", 1, &[], sum_down));
    let top = engine.stack_top();
    let result = engine.call(sum.value(), engine.null(), &[engine.int32(5)]);
    assert_eq!(result.get().as_int32(), 15);
    assert_eq!(engine.stack_top(), top + 1);
}

#[test]
fn function_name_and_arity_are_observable() {
    let engine = Engine::new();
    let _scope = Scope::new(&engine);
    let padded = Retained::new(
        &engine,
        engine.new_function("padded", 3, &[], check_padding),
    );
    assert_eq!(padded.get().name(), "padded");
    assert_eq!(padded.get().arity(), 3);
    assert_eq!(padded.get().captures_len(), 0);
}
