//! Error types for the runtime core.
//!
//! Misuse by generated code (calling a non-function, popping an empty frame
//! chain, indexing a bad property key) is not recoverable: the offending
//! entry points panic with the matching `RuntimeError` message. Host-facing
//! checked variants (`Engine::try_call`, `PropertyKey::try_from_value`)
//! return these values as `Err` instead.

use thiserror::Error;

/// Failures surfaced by the embedding API.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("TypeError: {type_of} is not a function")]
    NotCallable { type_of: &'static str },

    #[error("TypeError: {type_of} is not a valid property key")]
    InvalidPropertyKey { type_of: &'static str },

    #[error("shadow stack overflow: capacity {capacity} slots")]
    StackOverflow { capacity: usize },

    #[error("frame underflow: no activation record to pop")]
    FrameUnderflow,

    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },
}
