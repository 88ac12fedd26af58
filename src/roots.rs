//! Shadow-stack roots and scope tokens.
//!
//! The collector cannot scan the native call stack, so generated code must
//! deposit every heap-referencing local into the engine's shadow stack. The
//! tokens here make that discipline explicit:
//!
//! - [`Scope`] records the stack top on entry and pops back to it on drop.
//! - [`ReturnScope`] first reserves one slot in the *parent* region, then
//!   opens an inner scope; [`ReturnScope::escape`] copies the result into
//!   the reserved slot, which survives into the caller.
//! - [`TypedReturnScope`] is the same with a class-tagged result.
//! - [`Local`] is a reference to one stack slot: reads and writes go through
//!   the slot so an intervening collection always sees the latest value.
//! - [`Retained`] is a `Local` constrained to one heap class.
//! - [`ArgList`] owns the contiguous run of argument slots for one call and
//!   pops it on drop.
//!
//! A `Local` must never outlive the `Scope` whose region contains its slot,
//! and must never be stored in the heap; return values cross a scope
//! boundary only via `escape`.

use std::cell::{Cell, RefCell};
use std::marker::PhantomData;
use std::ptr::NonNull;
use std::rc::Weak;

use crate::engine::{Engine, EngineInner};
use crate::error::RuntimeError;
use crate::heap::{HeapClass, JsFunction};
use crate::value::Value;

// ============================================================================
// Local
// ============================================================================

/// A reference to one shadow-stack slot.
///
/// Copying a `Local` aliases the slot; assignment goes through [`set`].
///
/// [`set`]: Local::set
#[derive(Clone, Copy)]
pub struct Local {
    slot: NonNull<Cell<Value>>,
}

impl Local {
    /// Push `value` onto the shadow stack and return a reference to the new
    /// slot. The slot lives until the enclosing [`Scope`] exits.
    pub fn new(engine: &Engine, value: Value) -> Local {
        engine.push_local(value)
    }

    pub(crate) fn from_slot(slot: NonNull<Cell<Value>>) -> Local {
        Local { slot }
    }

    pub fn get(&self) -> Value {
        // The slot is pinned in the engine's stack buffer while this Local
        // is allowed to exist.
        unsafe { self.slot.as_ref() }.get()
    }

    pub fn set(&self, value: Value) {
        unsafe { self.slot.as_ref() }.set(value);
    }

    pub(crate) fn slot(&self) -> NonNull<Cell<Value>> {
        self.slot
    }
}

impl std::fmt::Debug for Local {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Local({})", self.get().dump())
    }
}

// ============================================================================
// Retained
// ============================================================================

/// A [`Local`] that holds a pointer of one heap class, with typed access.
#[derive(Clone, Copy)]
pub struct Retained<T: HeapClass> {
    local: Local,
    _marker: PhantomData<T>,
}

impl<T: HeapClass> Retained<T> {
    pub fn new(engine: &Engine, handle: T) -> Retained<T> {
        Retained {
            local: Local::new(engine, handle.to_value()),
            _marker: PhantomData,
        }
    }

    pub(crate) fn from_local(local: Local) -> Retained<T> {
        Retained {
            local,
            _marker: PhantomData,
        }
    }

    /// The typed handle. Panics if the slot no longer holds this class.
    pub fn get(&self) -> T {
        let value = self.local.get();
        T::from_value(value).unwrap_or_else(|| {
            panic!(
                "{}",
                RuntimeError::TypeMismatch {
                    expected: T::CLASS_NAME,
                    found: value.type_of(),
                }
            )
        })
    }

    pub fn set(&self, handle: T) {
        self.local.set(handle.to_value());
    }

    pub fn value(&self) -> Value {
        self.local.get()
    }

    pub fn as_local(&self) -> Local {
        self.local
    }
}

impl<T: HeapClass> std::fmt::Debug for Retained<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Retained({})", self.local.get().dump())
    }
}

// ============================================================================
// Scope
// ============================================================================

/// Pops every slot pushed during its lifetime when it drops.
///
/// Open one at the top of any function body that allocates locals.
pub struct Scope {
    inner: Weak<RefCell<EngineInner>>,
    base: usize,
}

impl Scope {
    pub fn new(engine: &Engine) -> Scope {
        Scope {
            inner: engine.weak_inner(),
            base: engine.stack_top(),
        }
    }
}

impl Drop for Scope {
    fn drop(&mut self) {
        // Engine already gone on teardown paths; nothing left to pop then.
        if let Some(inner) = self.inner.upgrade() {
            inner.borrow_mut().pop_to(self.base);
        }
    }
}

// ============================================================================
// ReturnScope / TypedReturnScope
// ============================================================================

/// Scope for a function body that returns a value.
///
/// Construction order matters: the return slot is reserved on the parent
/// region first, then the inner scope opens. On exit the inner scope pops
/// back to just above the reserved slot, leaving the parent's top exactly
/// one higher than on entry.
pub struct ReturnScope {
    slot: Local,
    _scope: Scope,
}

impl ReturnScope {
    pub fn new(engine: &Engine) -> ReturnScope {
        let slot = Local::new(engine, engine.undefined());
        let scope = Scope::new(engine);
        ReturnScope {
            slot,
            _scope: scope,
        }
    }

    /// Copy `value` into the reserved parent slot and return a handle to it.
    pub fn escape(&self, value: Value) -> Local {
        self.slot.set(value);
        self.slot
    }
}

/// [`ReturnScope`] whose result carries a heap class tag.
pub struct TypedReturnScope<T: HeapClass> {
    slot: Local,
    _scope: Scope,
    _marker: PhantomData<T>,
}

impl<T: HeapClass> TypedReturnScope<T> {
    pub fn new(engine: &Engine) -> TypedReturnScope<T> {
        let slot = Local::new(engine, engine.undefined());
        let scope = Scope::new(engine);
        TypedReturnScope {
            slot,
            _scope: scope,
            _marker: PhantomData,
        }
    }

    /// Copy `handle` into the reserved parent slot and return it retyped.
    pub fn escape(&self, handle: T) -> Retained<T> {
        self.slot.set(handle.to_value());
        Retained::from_local(self.slot)
    }
}

// ============================================================================
// ArgList
// ============================================================================

/// The contiguous run of argument slots for one call.
///
/// The caller's argument values are pushed as a block, padded with
/// `undefined` up to the callee's declared arity. The list owns the run and
/// pops it when dropped; inside the callee, argument `i` is addressed by
/// index.
pub struct ArgList {
    inner: Weak<RefCell<EngineInner>>,
    base: usize,
    first: Option<NonNull<Cell<Value>>>,
    slots: usize,
    count: usize,
}

impl ArgList {
    pub(crate) fn new(engine: &Engine, callee: JsFunction, argv: &[Value]) -> ArgList {
        let base = engine.stack_top();
        let mut first = None;
        for &arg in argv {
            let slot = engine.push_local(arg).slot();
            first.get_or_insert(slot);
        }
        let undefined = engine.undefined();
        for _ in argv.len()..callee.arity() {
            let slot = engine.push_local(undefined).slot();
            first.get_or_insert(slot);
        }
        ArgList {
            inner: engine.weak_inner(),
            base,
            first,
            slots: argv.len().max(callee.arity()),
            count: argv.len(),
        }
    }

    /// Number of arguments the caller actually passed (padding excluded).
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Argument `index`, valid up to the larger of the declared arity and
    /// the passed count.
    pub fn get(&self, index: usize) -> Value {
        self.local(index).get()
    }

    /// Slot handle for argument `index`; stable for the callee's duration.
    pub fn local(&self, index: usize) -> Local {
        assert!(
            index < self.slots,
            "argument index {index} out of range ({} slots)",
            self.slots
        );
        let first = self
            .first
            .unwrap_or_else(|| unreachable!("non-empty list with no slots"));
        // Slots are contiguous cells in the engine's stack buffer.
        let slot = unsafe { NonNull::new_unchecked(first.as_ptr().add(index)) };
        Local::from_slot(slot)
    }
}

impl Drop for ArgList {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.borrow_mut().pop_to(self.base);
        }
    }
}
