//! The engine: one JavaScript world.
//!
//! The engine owns the set of all live heap objects, the sigil singletons,
//! the global root object, the shadow stack of rooted values and the chain
//! of activation frames. Everything generated code does goes through it:
//! constructing values, allocating objects, rooting locals, calling
//! functions and requesting collection.
//!
//! `Engine` itself is a cheap-clone handle over shared state so that scope
//! tokens can hold a weak reference back to it for their drop hooks. The
//! runtime is single-threaded; nothing here is `Send` or `Sync`.
//!
//! Collection runs only inside allocation (or an explicit [`Engine::gc`]),
//! which makes every other operation safe ground for holding raw handles.
//! Any routine that allocates must root its live handles first.

use std::cell::{Cell, RefCell};
use std::ptr::NonNull;
use std::rc::{Rc, Weak};

use rustc_hash::FxHashMap;

use crate::error::RuntimeError;
use crate::gc::{self, GcStats};
use crate::heap::{
    FrameData, FunctionData, HeapClass, HeapData, HeapObject, JsCell, JsFunction, JsObject,
    JsString, JsSymbol, ObjectData,
};
use crate::interner::StringTable;
use crate::roots::{ArgList, Local, Retained, ReturnScope, TypedReturnScope};
use crate::value::Value;

/// Signature of a compiled function body.
///
/// Invoked with the engine, the callee (for capture access), the `this`
/// value and the argument list. Returns a [`Local`] rooted in a region that
/// outlives the call, normally produced by a [`ReturnScope::escape`].
pub type NativeBody = fn(&Engine, JsFunction, Value, &ArgList) -> Local;

/// Shadow-stack capacity in slots, unless configured otherwise.
pub const DEFAULT_STACK_SLOTS: usize = 256 * 1024;

/// Allocations between automatic collections, unless configured otherwise.
const DEFAULT_GC_THRESHOLD: usize = 100;

/// Construction-time knobs.
pub struct EngineConfig {
    /// Shadow-stack capacity in value slots.
    pub stack_slots: usize,
    /// Allocations between automatic collections; 0 disables the policy.
    pub gc_threshold: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            stack_slots: DEFAULT_STACK_SLOTS,
            gc_threshold: DEFAULT_GC_THRESHOLD,
        }
    }
}

/// The five pre-allocated sigil boxes.
pub(crate) struct Sigils {
    pub(crate) undefined: NonNull<HeapObject>,
    pub(crate) null: NonNull<HeapObject>,
    pub(crate) deleted: NonNull<HeapObject>,
    pub(crate) false_: NonNull<HeapObject>,
    pub(crate) true_: NonNull<HeapObject>,
}

/// Shared engine state behind the `Engine` handle.
pub(crate) struct EngineInner {
    /// False until the sigils and the root object exist; gates collection.
    pub(crate) ready_for_gc: bool,
    pub(crate) allocations_since_gc: usize,
    pub(crate) gc_threshold: usize,
    pub(crate) collections: usize,
    /// Every live allocation, keyed by address. Owning the box here is what
    /// keeps addresses stable; removal frees the object.
    pub(crate) objects: FxHashMap<usize, Box<HeapObject>>,
    sigils: Option<Sigils>,
    pub(crate) root: Option<NonNull<HeapObject>>,
    pub(crate) stack: Box<[Cell<Value>]>,
    pub(crate) stack_top: usize,
    pub(crate) frame: Option<NonNull<HeapObject>>,
    pub(crate) interner: StringTable,
}

impl EngineInner {
    pub(crate) fn sigils(&self) -> &Sigils {
        self.sigils
            .as_ref()
            .unwrap_or_else(|| panic!("engine used before sigil construction"))
    }

    pub(crate) fn pop_to(&mut self, base: usize) {
        assert!(
            base <= self.stack_top,
            "shadow stack popped above the current top"
        );
        self.stack_top = base;
    }
}

/// One JavaScript world. See the module docs.
#[derive(Clone)]
pub struct Engine {
    inner: Rc<RefCell<EngineInner>>,
}

impl Engine {
    pub fn new() -> Engine {
        Engine::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Engine {
        let inner = EngineInner {
            ready_for_gc: false,
            allocations_since_gc: 0,
            gc_threshold: config.gc_threshold,
            collections: 0,
            objects: FxHashMap::default(),
            sigils: None,
            root: None,
            stack: (0..config.stack_slots)
                .map(|_| Cell::new(Value::stack_fill()))
                .collect::<Vec<_>>()
                .into_boxed_slice(),
            stack_top: 0,
            frame: None,
            interner: StringTable::new(),
        };
        let engine = Engine {
            inner: Rc::new(RefCell::new(inner)),
        };

        // Sigils first: collection stays gated off until they exist.
        let sigils = Sigils {
            undefined: engine.alloc(HeapData::Undefined),
            null: engine.alloc(HeapData::Null),
            deleted: engine.alloc(HeapData::Deleted),
            false_: engine.alloc(HeapData::Bool(false)),
            true_: engine.alloc(HeapData::Bool(true)),
        };
        engine.inner.borrow_mut().sigils = Some(sigils);

        let root = engine.alloc(HeapData::Object(ObjectData::new(None)));
        {
            let mut inner = engine.inner.borrow_mut();
            inner.root = Some(root);
            inner.ready_for_gc = true;
        }
        engine
    }

    pub(crate) fn weak_inner(&self) -> Weak<RefCell<EngineInner>> {
        Rc::downgrade(&self.inner)
    }

    // ------------------------------------------------------------------
    // Allocation
    // ------------------------------------------------------------------

    /// Register a fresh allocation in the live set. May collect first, so
    /// callers must have rooted everything they still need; the object
    /// being created is safe until the next allocation.
    pub(crate) fn alloc(&self, data: HeapData) -> NonNull<HeapObject> {
        let mut inner = self.inner.borrow_mut();
        if inner.ready_for_gc {
            inner.allocations_since_gc += 1;
            #[cfg(feature = "force-gc")]
            gc::collect(&mut inner);
            #[cfg(not(feature = "force-gc"))]
            if inner.gc_threshold > 0 && inner.allocations_since_gc >= inner.gc_threshold {
                gc::collect(&mut inner);
            }
        }
        let object = Box::new(HeapObject::new(data));
        let ptr = NonNull::from(object.as_ref());
        inner.objects.insert(ptr.as_ptr() as usize, object);
        ptr
    }

    /// A fresh object, optionally chained to a prototype. The prototype,
    /// if any, must be rooted by the caller.
    pub fn new_object(&self, prototype: Option<JsObject>) -> JsObject {
        let data = ObjectData::new(prototype.map(|p| p.ptr()));
        JsObject::from_ptr(self.alloc(HeapData::Object(data)))
    }

    /// A fresh string with its own identity. See [`Engine::intern`] for the
    /// deduplicating variant.
    pub fn new_string(&self, text: &str) -> JsString {
        JsString::from_ptr(self.alloc(HeapData::String(text.into())))
    }

    /// A deduplicated string: repeated literals share one allocation while
    /// the first one stays alive.
    pub fn intern(&self, text: &str) -> JsString {
        if let Some(addr) = self.inner.borrow().interner.lookup(text) {
            if let Some(ptr) = NonNull::new(addr as *mut HeapObject) {
                return JsString::from_ptr(ptr);
            }
        }
        let string = self.new_string(text);
        self.inner
            .borrow_mut()
            .interner
            .insert(text, string.addr());
        string
    }

    pub fn new_symbol(&self, description: &str) -> JsSymbol {
        JsSymbol::from_ptr(self.alloc(HeapData::Symbol(description.into())))
    }

    /// A captured-variable cell holding `initial`. `initial`, if a heap
    /// reference, must be rooted by the caller.
    pub fn new_cell(&self, initial: Value) -> JsCell {
        JsCell::from_ptr(self.alloc(HeapData::Cell(Cell::new(initial))))
    }

    /// A function object. The capture cells must be rooted by the caller.
    pub fn new_function(
        &self,
        name: &str,
        arity: usize,
        captures: &[JsCell],
        body: NativeBody,
    ) -> JsFunction {
        let data = FunctionData {
            object: ObjectData::new(None),
            name: name.into(),
            arity,
            captures: captures.iter().map(|cell| cell.ptr()).collect(),
            body,
        };
        JsFunction::from_ptr(self.alloc(HeapData::Function(data)))
    }

    // ------------------------------------------------------------------
    // Value construction
    // ------------------------------------------------------------------

    pub fn undefined(&self) -> Value {
        Value::from_ptr(self.inner.borrow().sigils().undefined)
    }

    pub fn null(&self) -> Value {
        Value::from_ptr(self.inner.borrow().sigils().null)
    }

    /// The internal tombstone sigil. Never hand this to generated code.
    pub fn deleted(&self) -> Value {
        Value::from_ptr(self.inner.borrow().sigils().deleted)
    }

    pub fn boolean(&self, value: bool) -> Value {
        let inner = self.inner.borrow();
        let sigils = inner.sigils();
        Value::from_ptr(if value { sigils.true_ } else { sigils.false_ })
    }

    /// An int32 value, boxed when the encoding cannot hold it inline.
    pub fn int32(&self, value: i32) -> Value {
        match Value::try_from_i32(value) {
            Some(inline) => inline,
            None => Value::from_ptr(self.alloc(HeapData::Int32(value))),
        }
    }

    /// A double value, boxed when the encoding cannot hold it inline.
    pub fn number(&self, value: f64) -> Value {
        match Value::try_from_f64(value) {
            Some(inline) => inline,
            None => Value::from_ptr(self.alloc(HeapData::Double(value))),
        }
    }

    // ------------------------------------------------------------------
    // Roots
    // ------------------------------------------------------------------

    /// Push a value onto the shadow stack; the returned [`Local`] addresses
    /// the slot until it is popped.
    pub fn push_local(&self, value: Value) -> Local {
        let mut inner = self.inner.borrow_mut();
        if inner.stack_top == inner.stack.len() {
            panic!(
                "{}",
                RuntimeError::StackOverflow {
                    capacity: inner.stack.len()
                }
            );
        }
        let slot = &inner.stack[inner.stack_top];
        slot.set(value);
        let ptr = NonNull::from(slot);
        inner.stack_top += 1;
        Local::from_slot(ptr)
    }

    /// Reset the stack top; every slot above `base` is invalid from here on.
    pub fn pop_to(&self, base: usize) {
        self.inner.borrow_mut().pop_to(base);
    }

    pub fn stack_top(&self) -> usize {
        self.inner.borrow().stack_top
    }

    // ------------------------------------------------------------------
    // Global root
    // ------------------------------------------------------------------

    /// The global root object; always reachable.
    pub fn global(&self) -> JsObject {
        let inner = self.inner.borrow();
        let root = inner
            .root
            .unwrap_or_else(|| panic!("engine used before root construction"));
        JsObject::from_ptr(root)
    }

    // ------------------------------------------------------------------
    // Calls
    // ------------------------------------------------------------------

    /// Call `func` with `this` and `argv`. Panics if `func` is not a
    /// function. `func`, `this` and any heap-referencing arguments must be
    /// rooted by the caller; the returned [`Local`] lives in the caller's
    /// region.
    pub fn call(&self, func: Value, this: Value, argv: &[Value]) -> Local {
        self.try_call(func, this, argv)
            .unwrap_or_else(|err| panic!("{err}"))
    }

    /// Checked variant of [`Engine::call`] for host code.
    pub fn try_call(&self, func: Value, this: Value, argv: &[Value]) -> Result<Local, RuntimeError> {
        let callee = match JsFunction::from_value(func) {
            Some(callee) => callee,
            None => {
                return Err(RuntimeError::NotCallable {
                    type_of: func.type_of(),
                })
            }
        };

        // Reserve the return slot below the argument run so it survives the
        // argument pop.
        let ret = ReturnScope::new(self);
        let args = ArgList::new(self, callee, argv);

        let padded: Vec<Value> = (0..argv.len().max(callee.arity()))
            .map(|index| args.get(index))
            .collect();
        let parent = self.inner.borrow().frame;
        let frame = self.alloc(HeapData::Frame(FrameData {
            parent,
            callee: callee.ptr(),
            this,
            slots: padded.into_boxed_slice(),
        }));
        self.inner.borrow_mut().frame = Some(frame);

        let body = callee.body();
        let result = body(self, callee, this, &args);

        self.pop_frame();
        Ok(ret.escape(result.get()))
    }

    fn pop_frame(&self) {
        let mut inner = self.inner.borrow_mut();
        let current = inner
            .frame
            .unwrap_or_else(|| panic!("{}", RuntimeError::FrameUnderflow));
        // The frame is in the live set for the duration of the call.
        inner.frame = unsafe { current.as_ref() }.frame_parent();
    }

    // ------------------------------------------------------------------
    // Operators and coercions that allocate
    // ------------------------------------------------------------------

    /// JavaScript `+` for the covered subset: string concatenation when
    /// either side is a string, numeric addition otherwise (int32 kept
    /// exact where possible). Operands must be rooted by the caller.
    pub fn add(&self, lhs: Value, rhs: Value) -> Local {
        let ret = ReturnScope::new(self);
        if lhs.is_string() || rhs.is_string() {
            let left = self.to_string(lhs);
            let right = self.to_string(rhs);
            let mut joined = String::with_capacity(left.get().len() + right.get().len());
            joined.push_str(left.get().as_str());
            joined.push_str(right.get().as_str());
            let together = self.new_string(&joined);
            ret.escape(together.into())
        } else if lhs.is_int32() && rhs.is_int32() {
            let sum = i64::from(lhs.as_int32()) + i64::from(rhs.as_int32());
            match i32::try_from(sum) {
                Ok(exact) => ret.escape(self.int32(exact)),
                Err(_) => ret.escape(self.number(sum as f64)),
            }
        } else {
            ret.escape(self.number(lhs.to_number() + rhs.to_number()))
        }
    }

    /// String coercion: strings return themselves, boxed primitives their
    /// payload, objects `"[object Object]"`, functions `"[Function: name]"`.
    /// `value`, if a heap reference, must be rooted by the caller.
    pub fn to_string(&self, value: Value) -> Retained<JsString> {
        let scope = TypedReturnScope::<JsString>::new(self);
        if value.is_string() {
            return scope.escape(value.as_string());
        }
        let text = if value.is_int32() {
            value.as_int32().to_string()
        } else if value.is_double() {
            crate::value::format_number(value.as_double())
        } else if value.is_undefined() {
            "undefined".to_string()
        } else if value.is_null() {
            "null".to_string()
        } else if value.is_deleted() {
            "deleted".to_string()
        } else if value.is_bool() {
            (if value.as_bool() { "true" } else { "false" }).to_string()
        } else if value.is_symbol() {
            format!("Symbol({})", value.as_symbol().description())
        } else if value.is_function() {
            format!("[Function: {}]", value.as_function().name())
        } else if value.is_object() {
            "[object Object]".to_string()
        } else {
            value.dump()
        };
        scope.escape(self.new_string(&text))
    }

    // ------------------------------------------------------------------
    // Collection
    // ------------------------------------------------------------------

    /// Force a full collection cycle now.
    pub fn gc(&self) {
        gc::collect(&mut self.inner.borrow_mut());
    }

    /// Collect if the allocation counter has reached the threshold.
    pub fn maybe_gc(&self) {
        let mut inner = self.inner.borrow_mut();
        if inner.ready_for_gc
            && inner.gc_threshold > 0
            && inner.allocations_since_gc >= inner.gc_threshold
        {
            gc::collect(&mut inner);
        }
    }

    /// Allocations between automatic collections; 0 disables the policy.
    pub fn set_gc_threshold(&self, threshold: usize) {
        self.inner.borrow_mut().gc_threshold = threshold;
    }

    pub fn gc_stats(&self) -> GcStats {
        let inner = self.inner.borrow();
        GcStats {
            live_objects: inner.objects.len(),
            collections: inner.collections,
            allocations_since_gc: inner.allocations_since_gc,
        }
    }

    /// Whether `value` references an object currently in the live set.
    /// Never dereferences, so it is safe to ask about a collected value.
    pub fn is_live(&self, value: Value) -> bool {
        match value.heap_ptr() {
            Some(ptr) => self
                .inner
                .borrow()
                .objects
                .contains_key(&(ptr.as_ptr() as usize)),
            None => false,
        }
    }

    // ------------------------------------------------------------------
    // Diagnostics
    // ------------------------------------------------------------------

    /// Human-readable listing of the live set. Ordering is arbitrary.
    pub fn dump(&self) -> String {
        let inner = self.inner.borrow();
        let mut out = String::from("Engine([");
        for (index, object) in inner.objects.values().enumerate() {
            if index > 0 {
                out.push(',');
            }
            out.push_str(&object.dump_depth(3));
        }
        out.push_str("])");
        out
    }

    /// Milliseconds since the Unix epoch.
    pub fn now(&self) -> f64 {
        chrono::Utc::now().timestamp_millis() as f64
    }

    #[cfg(test)]
    pub(crate) fn all_marks_clear(&self) -> bool {
        self.inner
            .borrow()
            .objects
            .values()
            .all(|object| !object.marked())
    }

    #[cfg(test)]
    pub(crate) fn interner_len(&self) -> usize {
        self.inner.borrow().interner.len()
    }
}

impl Default for Engine {
    fn default() -> Self {
        Engine::new()
    }
}
