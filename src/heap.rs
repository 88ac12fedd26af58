//! Heap object hierarchy.
//!
//! Every garbage-collected allocation is a [`HeapObject`]: a mark bit plus a
//! [`HeapData`] variant for the concrete kind. Sigil boxes (`undefined`,
//! `null`, `deleted`, the two booleans) and overflow number boxes are
//! internal; strings, symbols, objects and functions are visible to
//! generated code; cells and frames are the closure and activation
//! machinery.
//!
//! Typed handles (`JsString`, `JsObject`, ...) are unrooted copies of a heap
//! pointer, the moral equivalent of a raw object pointer in the generated
//! code. They stay valid only while the object is reachable; root them in a
//! [`Local`](crate::roots::Local) or [`Retained`](crate::roots::Retained)
//! across any allocation.

use std::cell::{Cell, RefCell};
use std::hash::{Hash, Hasher};
use std::ptr::NonNull;

use indexmap::IndexMap;

use crate::engine::{Engine, NativeBody};
use crate::error::RuntimeError;
use crate::value::{format_number, Value};

// ============================================================================
// HeapObject
// ============================================================================

/// A garbage-collected allocation: mark bit plus kind-specific payload.
pub struct HeapObject {
    /// True only while a collection is marking; sweep clears it on survivors.
    marked: Cell<bool>,
    data: HeapData,
}

/// Concrete object kinds.
pub(crate) enum HeapData {
    Undefined,
    Null,
    /// Internal sigil written into property slots as a deletion tombstone.
    Deleted,
    Bool(bool),
    /// Boxed int32, used when the value encoding cannot hold it inline.
    Int32(i32),
    /// Boxed double, used when the value encoding cannot hold it inline.
    Double(f64),
    String(Box<str>),
    Symbol(Box<str>),
    /// A single mutable binding; the storage for a captured variable.
    Cell(Cell<Value>),
    Object(ObjectData),
    Function(FunctionData),
    Frame(FrameData),
}

impl HeapObject {
    pub(crate) fn new(data: HeapData) -> HeapObject {
        HeapObject {
            marked: Cell::new(false),
            data,
        }
    }

    pub(crate) fn data(&self) -> &HeapData {
        &self.data
    }

    pub(crate) fn marked(&self) -> bool {
        self.marked.get()
    }

    pub(crate) fn set_marked(&self, marked: bool) {
        self.marked.set(marked);
    }

    /// Property table, present on objects and functions.
    fn object_data(&self) -> Option<&ObjectData> {
        match &self.data {
            HeapData::Object(data) => Some(data),
            HeapData::Function(function) => Some(&function.object),
            _ => None,
        }
    }

    /// Visit every value this object holds an edge to.
    pub(crate) fn trace(&self, visit: &mut dyn FnMut(Value)) {
        match &self.data {
            HeapData::Cell(slot) => visit(slot.get()),
            HeapData::Object(data) => data.trace(visit),
            HeapData::Function(function) => {
                function.object.trace(visit);
                for capture in function.captures.iter() {
                    visit(Value::from_ptr(*capture));
                }
            }
            HeapData::Frame(frame) => {
                if let Some(parent) = frame.parent {
                    visit(Value::from_ptr(parent));
                }
                visit(Value::from_ptr(frame.callee));
                visit(frame.this);
                for &slot in frame.slots.iter() {
                    visit(slot);
                }
            }
            _ => {}
        }
    }

    /// `typeof` tag for pointer values. Internal kinds that never reach
    /// generated code report `"object"`.
    pub(crate) fn type_of(&self) -> &'static str {
        match &self.data {
            HeapData::Undefined | HeapData::Deleted => "undefined",
            HeapData::Null => "object",
            HeapData::Bool(_) => "boolean",
            HeapData::Int32(_) | HeapData::Double(_) => "number",
            HeapData::String(_) => "string",
            HeapData::Symbol(_) => "symbol",
            HeapData::Object(_) => "object",
            HeapData::Function(_) => "function",
            HeapData::Cell(_) | HeapData::Frame(_) => "object",
        }
    }

    pub(crate) fn dump_depth(&self, depth: usize) -> String {
        match &self.data {
            HeapData::Undefined => "undefined".to_string(),
            HeapData::Null => "null".to_string(),
            HeapData::Deleted => "deleted".to_string(),
            HeapData::Bool(true) => "true".to_string(),
            HeapData::Bool(false) => "false".to_string(),
            HeapData::Int32(value) => value.to_string(),
            HeapData::Double(value) => format_number(*value),
            HeapData::String(text) => format!("\"{}\"", text),
            HeapData::Symbol(description) => format!("Symbol(\"{}\")", description),
            HeapData::Cell(slot) => format!("Cell({})", slot.get().dump_depth(depth - 1)),
            HeapData::Object(data) => data.dump_depth(depth),
            HeapData::Function(function) => format!("Function(\"{}\")", function.name),
            HeapData::Frame(_) => "Frame(...)".to_string(),
        }
    }

    pub(crate) fn frame_parent(&self) -> Option<NonNull<HeapObject>> {
        match &self.data {
            HeapData::Frame(frame) => frame.parent,
            _ => panic!("current frame is not an activation record"),
        }
    }
}

// ============================================================================
// Object storage
// ============================================================================

/// Prototype link plus insertion-ordered property table.
pub(crate) struct ObjectData {
    prototype: Cell<Option<NonNull<HeapObject>>>,
    props: RefCell<IndexMap<PropertyKey, Value>>,
}

impl ObjectData {
    pub(crate) fn new(prototype: Option<NonNull<HeapObject>>) -> ObjectData {
        ObjectData {
            prototype: Cell::new(prototype),
            props: RefCell::new(IndexMap::new()),
        }
    }

    fn trace(&self, visit: &mut dyn FnMut(Value)) {
        if let Some(prototype) = self.prototype.get() {
            visit(Value::from_ptr(prototype));
        }
        for (key, value) in self.props.borrow().iter() {
            visit(key.value());
            visit(*value);
        }
    }

    fn dump_depth(&self, depth: usize) -> String {
        let mut out = String::from("Object({");
        let props = self.props.borrow();
        let mut first = true;
        for (key, value) in props.iter() {
            if value.is_deleted() {
                continue;
            }
            if !first {
                out.push(',');
            }
            first = false;
            out.push_str(&key.value().dump_depth(depth - 1));
            out.push(':');
            out.push_str(&value.dump_depth(depth - 1));
        }
        out.push_str("})");
        out
    }
}

/// Name, declared arity, captured cells and native body of a function.
/// Functions carry a property table of their own.
pub(crate) struct FunctionData {
    pub(crate) object: ObjectData,
    pub(crate) name: Box<str>,
    pub(crate) arity: usize,
    pub(crate) captures: Box<[NonNull<HeapObject>]>,
    pub(crate) body: NativeBody,
}

/// Activation record for an in-progress call.
pub(crate) struct FrameData {
    pub(crate) parent: Option<NonNull<HeapObject>>,
    pub(crate) callee: NonNull<HeapObject>,
    pub(crate) this: Value,
    /// Arguments padded to the declared arity.
    pub(crate) slots: Box<[Value]>,
}

// ============================================================================
// Property keys
// ============================================================================

/// A normalized property key: a string or a symbol.
///
/// Strings hash and compare by content, symbols by identity. Anything else
/// is rejected; generated code is expected to have coerced already.
#[derive(Clone, Copy)]
pub struct PropertyKey(Value);

impl PropertyKey {
    pub fn try_from_value(value: Value) -> Result<PropertyKey, RuntimeError> {
        if value.is_string() || value.is_symbol() {
            Ok(PropertyKey(value))
        } else {
            Err(RuntimeError::InvalidPropertyKey {
                type_of: value.type_of(),
            })
        }
    }

    pub(crate) fn from_value(value: Value) -> PropertyKey {
        Self::try_from_value(value).unwrap_or_else(|err| panic!("{err}"))
    }

    pub fn value(self) -> Value {
        self.0
    }

    fn as_str(&self) -> Option<&str> {
        self.0.string_data()
    }
}

impl PartialEq for PropertyKey {
    fn eq(&self, other: &Self) -> bool {
        match (self.as_str(), other.as_str()) {
            (Some(lhs), Some(rhs)) => lhs == rhs,
            _ => self.0.raw() == other.0.raw(),
        }
    }
}

impl Eq for PropertyKey {}

impl Hash for PropertyKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self.as_str() {
            Some(text) => text.hash(state),
            None => state.write_u64(self.0.raw() as u64),
        }
    }
}

impl std::fmt::Debug for PropertyKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.dump())
    }
}

// ============================================================================
// Typed handles
// ============================================================================

/// A heap handle class: knows how to check a value's kind and convert back.
pub trait HeapClass: Copy {
    const CLASS_NAME: &'static str;

    fn from_value(value: Value) -> Option<Self>;
    fn to_value(self) -> Value;
}

macro_rules! handle_common {
    ($name:ident) => {
        impl $name {
            pub(crate) fn from_ptr(ptr: NonNull<HeapObject>) -> $name {
                $name(ptr)
            }

            #[allow(dead_code)]
            pub(crate) fn ptr(self) -> NonNull<HeapObject> {
                self.0
            }

            #[allow(dead_code)]
            pub(crate) fn addr(self) -> usize {
                self.0.as_ptr() as usize
            }

            fn object(&self) -> &HeapObject {
                // Handles are only minted for objects in the live set.
                unsafe { self.0.as_ref() }
            }
        }

        impl From<$name> for Value {
            fn from(handle: $name) -> Value {
                Value::from_ptr(handle.0)
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", Value::from(*self).dump())
            }
        }
    };
}

/// An immutable byte-sequence string.
#[derive(Clone, Copy)]
pub struct JsString(NonNull<HeapObject>);

handle_common!(JsString);

impl JsString {
    pub fn as_str(&self) -> &str {
        match self.object().data() {
            HeapData::String(text) => text,
            _ => unreachable!("string handle over non-string object"),
        }
    }

    pub fn len(&self) -> usize {
        self.as_str().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_str().is_empty()
    }
}

impl HeapClass for JsString {
    const CLASS_NAME: &'static str = "String";

    fn from_value(value: Value) -> Option<JsString> {
        if value.is_string() {
            value.heap_ptr().map(JsString)
        } else {
            None
        }
    }

    fn to_value(self) -> Value {
        Value::from_ptr(self.0)
    }
}

/// A symbol: description plus address identity.
#[derive(Clone, Copy)]
pub struct JsSymbol(NonNull<HeapObject>);

handle_common!(JsSymbol);

impl JsSymbol {
    pub fn description(&self) -> &str {
        match self.object().data() {
            HeapData::Symbol(description) => description,
            _ => unreachable!("symbol handle over non-symbol object"),
        }
    }
}

impl HeapClass for JsSymbol {
    const CLASS_NAME: &'static str = "Symbol";

    fn from_value(value: Value) -> Option<JsSymbol> {
        if value.is_symbol() {
            value.heap_ptr().map(JsSymbol)
        } else {
            None
        }
    }

    fn to_value(self) -> Value {
        Value::from_ptr(self.0)
    }
}

/// An object with a property table and an optional prototype. Functions
/// qualify too; `JsObject` is the property-access view of either kind.
#[derive(Clone, Copy)]
pub struct JsObject(NonNull<HeapObject>);

handle_common!(JsObject);

impl JsObject {
    fn data(&self) -> &ObjectData {
        self.object()
            .object_data()
            .unwrap_or_else(|| unreachable!("object handle over non-object"))
    }

    /// Walk the prototype chain for `key`; `undefined` when absent.
    /// Deletion tombstones are skipped, falling through to the prototype.
    pub fn get_prop(&self, engine: &Engine, key: Value) -> Value {
        let key = PropertyKey::from_value(key);
        let mut current = Some(self.0);
        while let Some(ptr) = current {
            let object = unsafe { ptr.as_ref() };
            let data = object
                .object_data()
                .unwrap_or_else(|| unreachable!("prototype chain contains a non-object"));
            if let Some(value) = data.props.borrow().get(&key).copied() {
                if !value.is_deleted() {
                    return value;
                }
            }
            current = data.prototype.get();
        }
        engine.undefined()
    }

    /// Assign on the receiver only; prototypes are never written through.
    pub fn set_prop(&self, key: Value, value: Value) {
        let key = PropertyKey::from_value(key);
        self.data().props.borrow_mut().insert(key, value);
    }

    /// Overwrite an existing own property with the deletion tombstone.
    /// Absent keys are left untouched.
    pub fn delete_prop(&self, engine: &Engine, key: Value) {
        let key = PropertyKey::from_value(key);
        let mut props = self.data().props.borrow_mut();
        if let Some(slot) = props.get_mut(&key) {
            *slot = engine.deleted();
        }
    }

    pub fn has_own_prop(&self, key: Value) -> bool {
        let key = PropertyKey::from_value(key);
        matches!(
            self.data().props.borrow().get(&key),
            Some(value) if !value.is_deleted()
        )
    }

    /// Own property keys in insertion order, tombstones excluded.
    pub fn keys(&self) -> Vec<Value> {
        self.data()
            .props
            .borrow()
            .iter()
            .filter(|(_, value)| !value.is_deleted())
            .map(|(key, _)| key.value())
            .collect()
    }

    pub fn prototype(&self) -> Option<JsObject> {
        self.data().prototype.get().map(JsObject)
    }

    pub fn set_prototype(&self, prototype: Option<JsObject>) {
        self.data().prototype.set(prototype.map(|p| p.0));
    }
}

impl HeapClass for JsObject {
    const CLASS_NAME: &'static str = "Object";

    fn from_value(value: Value) -> Option<JsObject> {
        if value.is_object() || value.is_function() {
            value.heap_ptr().map(JsObject)
        } else {
            None
        }
    }

    fn to_value(self) -> Value {
        Value::from_ptr(self.0)
    }
}

/// A callable function object.
#[derive(Clone, Copy)]
pub struct JsFunction(NonNull<HeapObject>);

handle_common!(JsFunction);

impl JsFunction {
    fn data(&self) -> &FunctionData {
        match self.object().data() {
            HeapData::Function(function) => function,
            _ => unreachable!("function handle over non-function object"),
        }
    }

    pub fn name(&self) -> &str {
        &self.data().name
    }

    /// Number of declared arguments.
    pub fn arity(&self) -> usize {
        self.data().arity
    }

    pub fn captures_len(&self) -> usize {
        self.data().captures.len()
    }

    /// One of the captured variable cells.
    pub fn capture(&self, index: usize) -> JsCell {
        let captures = &self.data().captures;
        match captures.get(index) {
            Some(ptr) => JsCell(*ptr),
            None => panic!(
                "capture index {index} out of range for \"{}\" ({} captured)",
                self.name(),
                captures.len()
            ),
        }
    }

    pub(crate) fn body(&self) -> NativeBody {
        self.data().body
    }

    /// Property-access view of this function.
    pub fn as_object(self) -> JsObject {
        JsObject(self.0)
    }
}

impl HeapClass for JsFunction {
    const CLASS_NAME: &'static str = "Function";

    fn from_value(value: Value) -> Option<JsFunction> {
        if value.is_function() {
            value.heap_ptr().map(JsFunction)
        } else {
            None
        }
    }

    fn to_value(self) -> Value {
        Value::from_ptr(self.0)
    }
}

/// A captured-variable cell: one mutable binding on the heap. Every function
/// that captured the cell observes writes through any other.
#[derive(Clone, Copy)]
pub struct JsCell(NonNull<HeapObject>);

handle_common!(JsCell);

impl JsCell {
    fn slot(&self) -> &Cell<Value> {
        match self.object().data() {
            HeapData::Cell(slot) => slot,
            _ => unreachable!("cell handle over non-cell object"),
        }
    }

    pub fn get(&self) -> Value {
        self.slot().get()
    }

    pub fn set(&self, value: Value) {
        self.slot().set(value);
    }
}

impl HeapClass for JsCell {
    const CLASS_NAME: &'static str = "Cell";

    fn from_value(value: Value) -> Option<JsCell> {
        match value.heap_ptr() {
            Some(ptr) if matches!(unsafe { ptr.as_ref() }.data(), HeapData::Cell(_)) => {
                Some(JsCell(ptr))
            }
            _ => None,
        }
    }

    fn to_value(self) -> Value {
        Value::from_ptr(self.0)
    }
}
