//! Runtime core for ahead-of-time-compiled JavaScript.
//!
//! Compiled programs call this library directly: there is no parser, no
//! bytecode and no standard library here. The crate provides the pieces a
//! generated program needs at run time:
//!
//! - a one-word polymorphic [`Value`] (NaN-boxed by default, 31-bit tagged
//!   pointer behind the `tagged-pointer` feature),
//! - a mark-and-sweep heap of strings, symbols, objects, functions, cells
//!   and activation frames, owned by the [`Engine`],
//! - a shadow stack of rooted values with RAII scope tokens
//!   ([`Scope`], [`ReturnScope`], [`ArgList`]), since the native call stack
//!   is not scannable,
//! - closures built from heap [`JsCell`]s so an inner function can outlive
//!   and mutate its outer function's bindings.
//!
//! # Example
//!
//! ```
//! use jsrun::{Engine, Local, Scope};
//!
//! let engine = Engine::new();
//! let scope = Scope::new(&engine);
//!
//! let greeting = Local::new(&engine, engine.new_string("hello").into());
//! engine.gc();
//! assert!(engine.is_live(greeting.get()));
//! assert_eq!(greeting.get().as_string().as_str(), "hello");
//!
//! drop(scope);
//! engine.gc();
//! ```
//!
//! The engine is single-threaded and collection runs only at allocation
//! time (or on an explicit [`Engine::gc`] call): between allocations,
//! generated code may hold raw handles freely, but anything that must
//! survive an allocation has to sit in the shadow stack first.

pub mod engine;
pub mod error;
pub mod gc;
pub mod heap;
mod interner;
pub mod roots;
pub mod value;

pub use engine::{Engine, EngineConfig, NativeBody, DEFAULT_STACK_SLOTS};
pub use error::RuntimeError;
pub use gc::GcStats;
pub use heap::{HeapClass, JsCell, JsFunction, JsObject, JsString, JsSymbol, PropertyKey};
pub use roots::{ArgList, Local, Retained, ReturnScope, Scope, TypedReturnScope};
pub use value::Value;
