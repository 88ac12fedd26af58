//! Polymorphic value representation.
//!
//! A `Value` is one machine word encoding exactly one of: a double, a 32-bit
//! integer, a boolean, `undefined`, `null`, the internal `deleted` sigil, or
//! a pointer to a heap object. Booleans and the singletons are pointers to
//! pre-allocated sigil boxes owned by the [`Engine`](crate::engine::Engine);
//! numbers are unboxed where the encoding allows and heap-boxed otherwise.
//!
//! Two encodings are selectable at build time:
//!
//! - **Shifted-NaN boxing** (default on 64-bit hosts). The raw word is a
//!   `u64`; every double is shifted by a tag constant so that real doubles
//!   occupy the tag ranges that NaN payloads would otherwise use. The high
//!   16 bits discriminate: `0x0000` is a pointer (low 48 bits are the
//!   address), `0xffff` is an int32 (low 32 bits are the payload), anything
//!   else is a shifted double. A double whose shifted bits would collide
//!   with the pointer or int32 tags (notably `-Infinity`) is demoted to a
//!   heap-boxed double.
//! - **31-bit tagged pointer** (the `tagged-pointer` feature, or any 32-bit
//!   target). The raw word is pointer-sized; the low bit selects between a
//!   31-bit signed integer (1) and an aligned heap pointer (0). Doubles and
//!   out-of-range int32s are heap-boxed.
//!
//! Values are `Copy`, hash by raw bits, and compare by raw bits except that
//! doubles compare numerically (`NaN != NaN`) and two distinct strings with
//! identical content compare equal.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::ptr::NonNull;

use crate::error::RuntimeError;
use crate::heap::{
    HeapClass, HeapData, HeapObject, JsCell, JsFunction, JsObject, JsString, JsSymbol,
};

/// Raw storage for a value word.
#[cfg(all(target_pointer_width = "64", not(feature = "tagged-pointer")))]
pub type RawValue = u64;

/// Raw storage for a value word.
#[cfg(any(not(target_pointer_width = "64"), feature = "tagged-pointer"))]
pub type RawValue = usize;

/// One machine word holding any runtime value.
#[derive(Clone, Copy)]
pub struct Value {
    raw: RawValue,
}

// ============================================================================
// Shifted-NaN-box encoding
// ============================================================================

#[cfg(all(target_pointer_width = "64", not(feature = "tagged-pointer")))]
mod encoding {
    use super::*;

    /// Added to every double so real doubles vacate the tag ranges.
    const DOUBLE_SHIFT: u64 = 0x0010_0000_0000_0000;
    const TAG_BITS: u32 = 48;
    const TAG_POINTER: u16 = 0x0000;
    const TAG_INT32: u16 = 0xffff;
    const POINTER_MASK: u64 = 0x0000_ffff_ffff_ffff;

    impl Value {
        fn tag(self) -> u16 {
            (self.raw >> TAG_BITS) as u16
        }

        pub(crate) fn from_ptr(ptr: NonNull<HeapObject>) -> Value {
            let addr = ptr.as_ptr() as u64;
            debug_assert_eq!(addr & !POINTER_MASK, 0, "heap address exceeds 48 bits");
            Value { raw: addr }
        }

        /// Inline encoding for an int32. Always succeeds under NaN boxing.
        pub(crate) fn try_from_i32(value: i32) -> Option<Value> {
            Some(Value {
                raw: u64::from(value as u32) | (u64::from(TAG_INT32) << TAG_BITS),
            })
        }

        /// Inline encoding for a double. `None` when the shifted bit pattern
        /// would collide with the pointer or int32 tags; the caller must box.
        pub(crate) fn try_from_f64(value: f64) -> Option<Value> {
            let shifted = value.to_bits().wrapping_add(DOUBLE_SHIFT);
            let tag = (shifted >> TAG_BITS) as u16;
            if tag == TAG_POINTER || tag == TAG_INT32 {
                None
            } else {
                Some(Value { raw: shifted })
            }
        }

        /// True when the word is a heap pointer (including sigil boxes).
        pub fn is_heap(self) -> bool {
            self.tag() == TAG_POINTER
        }

        pub(crate) fn unboxed_double(self) -> Option<f64> {
            let tag = self.tag();
            if tag == TAG_POINTER || tag == TAG_INT32 {
                None
            } else {
                Some(f64::from_bits(self.raw.wrapping_sub(DOUBLE_SHIFT)))
            }
        }

        pub(crate) fn unboxed_int32(self) -> Option<i32> {
            if self.tag() == TAG_INT32 {
                Some(self.raw as u32 as i32)
            } else {
                None
            }
        }

        pub(crate) fn addr(self) -> usize {
            debug_assert!(self.is_heap());
            self.raw as usize
        }

        /// Filler for unused shadow-stack slots: an inline zero.
        pub(crate) const fn stack_fill() -> Value {
            Value {
                raw: (TAG_INT32 as u64) << TAG_BITS,
            }
        }
    }
}

// ============================================================================
// 31-bit tagged-pointer encoding
// ============================================================================

#[cfg(any(not(target_pointer_width = "64"), feature = "tagged-pointer"))]
mod encoding {
    use super::*;

    const INT31_MIN: i32 = -(1 << 30);
    const INT31_MAX: i32 = (1 << 30) - 1;

    impl Value {
        pub(crate) fn from_ptr(ptr: NonNull<HeapObject>) -> Value {
            let addr = ptr.as_ptr() as usize;
            debug_assert_eq!(addr & 1, 0, "heap objects must be 2-byte aligned");
            Value { raw: addr }
        }

        /// Inline encoding for an int32. `None` outside the 31-bit range;
        /// the caller must box.
        pub(crate) fn try_from_i32(value: i32) -> Option<Value> {
            if (INT31_MIN..=INT31_MAX).contains(&value) {
                Some(Value {
                    raw: ((value as isize) << 1 | 1) as usize,
                })
            } else {
                None
            }
        }

        /// Doubles are never inline under the tagged-pointer encoding.
        pub(crate) fn try_from_f64(_value: f64) -> Option<Value> {
            None
        }

        /// True when the word is a heap pointer (including sigil boxes).
        pub fn is_heap(self) -> bool {
            self.raw & 1 == 0
        }

        pub(crate) fn unboxed_double(self) -> Option<f64> {
            None
        }

        pub(crate) fn unboxed_int32(self) -> Option<i32> {
            if self.raw & 1 == 1 {
                Some(((self.raw as isize) >> 1) as i32)
            } else {
                None
            }
        }

        pub(crate) fn addr(self) -> usize {
            debug_assert!(self.is_heap());
            self.raw
        }

        /// Filler for unused shadow-stack slots: an inline zero.
        pub(crate) const fn stack_fill() -> Value {
            Value { raw: 1 }
        }
    }
}

// ============================================================================
// Encoding-independent surface
// ============================================================================

impl Value {
    /// The raw bit pattern. Stable for the lifetime of the referenced object.
    pub fn raw(self) -> RawValue {
        self.raw
    }

    pub(crate) fn heap_ptr(self) -> Option<NonNull<HeapObject>> {
        if self.is_heap() {
            NonNull::new(self.addr() as *mut HeapObject)
        } else {
            None
        }
    }

    fn heap_object(&self) -> Option<&HeapObject> {
        if self.is_heap() {
            // The shadow-stack discipline keeps every referenced object in
            // the engine's live set while the value is observable.
            Some(unsafe { &*(self.addr() as *const HeapObject) })
        } else {
            None
        }
    }

    fn heap_data(&self) -> Option<&HeapData> {
        self.heap_object().map(|object| object.data())
    }

    pub(crate) fn string_data(&self) -> Option<&str> {
        match self.heap_data() {
            Some(HeapData::String(text)) => Some(text),
            _ => None,
        }
    }

    // ------------------------------------------------------------------
    // Predicates. All O(1): a tag test plus at most one kind load.
    // ------------------------------------------------------------------

    pub fn is_double(self) -> bool {
        self.unboxed_double().is_some() || matches!(self.heap_data(), Some(HeapData::Double(_)))
    }

    pub fn is_int32(self) -> bool {
        self.unboxed_int32().is_some() || matches!(self.heap_data(), Some(HeapData::Int32(_)))
    }

    pub fn is_bool(self) -> bool {
        matches!(self.heap_data(), Some(HeapData::Bool(_)))
    }

    pub fn is_undefined(self) -> bool {
        matches!(self.heap_data(), Some(HeapData::Undefined))
    }

    pub fn is_null(self) -> bool {
        matches!(self.heap_data(), Some(HeapData::Null))
    }

    pub fn is_deleted(self) -> bool {
        matches!(self.heap_data(), Some(HeapData::Deleted))
    }

    pub fn is_string(self) -> bool {
        matches!(self.heap_data(), Some(HeapData::String(_)))
    }

    pub fn is_symbol(self) -> bool {
        matches!(self.heap_data(), Some(HeapData::Symbol(_)))
    }

    /// True for plain objects only; functions answer [`is_function`].
    ///
    /// [`is_function`]: Value::is_function
    pub fn is_object(self) -> bool {
        matches!(self.heap_data(), Some(HeapData::Object(_)))
    }

    pub fn is_function(self) -> bool {
        matches!(self.heap_data(), Some(HeapData::Function(_)))
    }

    // ------------------------------------------------------------------
    // Unchecked accessors. Panic on a kind mismatch: well-formed generated
    // code tests before it extracts.
    // ------------------------------------------------------------------

    pub fn as_double(self) -> f64 {
        if let Some(value) = self.unboxed_double() {
            return value;
        }
        match self.heap_data() {
            Some(HeapData::Double(value)) => *value,
            _ => self.type_mismatch("number"),
        }
    }

    pub fn as_int32(self) -> i32 {
        if let Some(value) = self.unboxed_int32() {
            return value;
        }
        match self.heap_data() {
            Some(HeapData::Int32(value)) => *value,
            _ => self.type_mismatch("number"),
        }
    }

    pub fn as_bool(self) -> bool {
        match self.heap_data() {
            Some(HeapData::Bool(value)) => *value,
            _ => self.type_mismatch("boolean"),
        }
    }

    pub fn as_string(self) -> JsString {
        JsString::from_value(self).unwrap_or_else(|| self.type_mismatch("String"))
    }

    pub fn as_symbol(self) -> JsSymbol {
        JsSymbol::from_value(self).unwrap_or_else(|| self.type_mismatch("Symbol"))
    }

    /// Object view of this value. Accepts functions as well, since every
    /// function carries a property table.
    pub fn as_object(self) -> JsObject {
        JsObject::from_value(self).unwrap_or_else(|| self.type_mismatch("Object"))
    }

    pub fn as_function(self) -> JsFunction {
        JsFunction::from_value(self).unwrap_or_else(|| self.type_mismatch("Function"))
    }

    pub fn as_cell(self) -> JsCell {
        JsCell::from_value(self).unwrap_or_else(|| self.type_mismatch("Cell"))
    }

    fn type_mismatch(&self, expected: &'static str) -> ! {
        panic!(
            "{}",
            RuntimeError::TypeMismatch {
                expected,
                found: self.type_of(),
            }
        )
    }

    // ------------------------------------------------------------------
    // Conversions
    // ------------------------------------------------------------------

    /// The `typeof` string. Derived from the tag for unboxed numbers and
    /// delegated to the object kind for pointers.
    pub fn type_of(self) -> &'static str {
        if self.unboxed_double().is_some() || self.unboxed_int32().is_some() {
            return "number";
        }
        match self.heap_object() {
            Some(object) => object.type_of(),
            None => unreachable!("every raw word is a number or a pointer"),
        }
    }

    pub fn to_boolean(self) -> bool {
        if let Some(value) = self.unboxed_double() {
            return value != 0.0 && !value.is_nan();
        }
        if let Some(value) = self.unboxed_int32() {
            return value != 0;
        }
        match self.heap_data() {
            Some(HeapData::Undefined | HeapData::Null | HeapData::Deleted) => false,
            Some(HeapData::Bool(value)) => *value,
            Some(HeapData::Int32(value)) => *value != 0,
            Some(HeapData::Double(value)) => *value != 0.0 && !value.is_nan(),
            Some(HeapData::String(text)) => !text.is_empty(),
            Some(_) => true,
            None => unreachable!(),
        }
    }

    pub fn to_number(self) -> f64 {
        if let Some(value) = self.unboxed_double() {
            return value;
        }
        if let Some(value) = self.unboxed_int32() {
            return f64::from(value);
        }
        match self.heap_data() {
            Some(HeapData::Double(value)) => *value,
            Some(HeapData::Int32(value)) => f64::from(*value),
            Some(HeapData::Bool(true)) => 1.0,
            Some(HeapData::Bool(false)) => 0.0,
            Some(HeapData::Null) => 0.0,
            Some(HeapData::String(text)) => parse_number(text),
            _ => f64::NAN,
        }
    }

    /// Modular 32-bit truncation of [`to_number`](Value::to_number).
    pub fn to_int32(self) -> i32 {
        if let Some(value) = self.unboxed_int32() {
            return value;
        }
        let number = self.to_number();
        if !number.is_finite() {
            return 0;
        }
        let modulus = 4294967296.0;
        let mut wrapped = number.trunc() % modulus;
        if wrapped < 0.0 {
            wrapped += modulus;
        }
        wrapped as u32 as i32
    }

    // ------------------------------------------------------------------
    // Equality
    // ------------------------------------------------------------------

    /// Identical raw bits match, except that doubles compare numerically
    /// (so `NaN != NaN`) and two distinct strings with equal content match.
    pub fn strict_equals(self, other: Value) -> bool {
        if self.is_double() && other.is_double() {
            return self.as_double() == other.as_double();
        }
        if self.raw == other.raw {
            return true;
        }
        if let (Some(lhs), Some(rhs)) = (self.string_data(), other.string_data()) {
            return lhs == rhs;
        }
        false
    }

    // ------------------------------------------------------------------
    // Diagnostics
    // ------------------------------------------------------------------

    /// Human-readable description. Nesting is depth-limited so cyclic
    /// object graphs stay printable.
    pub fn dump(&self) -> String {
        self.dump_depth(4)
    }

    pub(crate) fn dump_depth(&self, depth: usize) -> String {
        if depth == 0 {
            return "…".to_string();
        }
        if let Some(value) = self.unboxed_double() {
            return format_number(value);
        }
        if let Some(value) = self.unboxed_int32() {
            return value.to_string();
        }
        match self.heap_object() {
            Some(object) => object.dump_depth(depth),
            None => unreachable!(),
        }
    }
}

/// Number formatting shared by `dump` and string coercion.
pub(crate) fn format_number(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value > 0.0 {
            "Infinity".to_string()
        } else {
            "-Infinity".to_string()
        }
    } else if value == 0.0 {
        "0".to_string()
    } else {
        value.to_string()
    }
}

fn parse_number(text: &str) -> f64 {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    trimmed.parse::<f64>().unwrap_or(f64::NAN)
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.strict_equals(*other)
    }
}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.raw as u64);
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.dump())
    }
}
