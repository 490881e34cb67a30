//! Errors of the embedding API and protocol error codes

use imbridge_backend::server::{InvalidId, ObjectId};

/// Error of the [`Core`](crate::Core) API
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The object does not implement the expected interface
    #[error("{object} is not a {expected}")]
    WrongInterface {
        /// the object
        object: ObjectId,
        /// name of the expected interface
        expected: &'static str,
    },
    /// The object or its client is gone
    #[error("{0} is not alive")]
    DeadObject(ObjectId),
    /// Low-level backend error
    #[error(transparent)]
    Backend(#[from] InvalidId),
}

/// Surrounding text offsets that do not point into the text
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SurroundingTextError {
    /// The offset is negative or past the end of the text
    #[error("offset {offset} is outside of the {len} bytes of text")]
    OutOfBounds {
        /// the offending offset
        offset: i64,
        /// length of the text in bytes
        len: usize,
    },
    /// The offset is in the middle of a UTF-8 sequence
    #[error("offset {offset} is not on a character boundary")]
    NotCharBoundary {
        /// the offending offset
        offset: usize,
    },
}

/// Protocol error codes sent about text input objects
#[repr(u32)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum TextInputError {
    /// surrounding text offsets out of bounds or not on a character boundary
    InvalidSurroundingText = 0,
}

impl From<TextInputError> for u32 {
    fn from(val: TextInputError) -> u32 {
        val as u32
    }
}

/// Protocol error codes sent about input method objects
///
/// `Role` has the value of `zwp_input_method_v2.error.roles`.
#[repr(u32)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum InputMethodError {
    /// the surface has another role
    Role = 0,
    /// another input method is bound
    AlreadyBound = 1,
    /// the input method already grabs the keyboard
    KeyboardGrabbed = 2,
    /// the modifiers map has more than 16 entries
    ModifiersMapTooLarge = 3,
}

impl From<InputMethodError> for u32 {
    fn from(val: InputMethodError) -> u32 {
        val as u32
    }
}

/// Protocol error codes sent about input panel objects
#[repr(u32)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum InputPanelError {
    /// the surface has another role
    Role = 0,
}

impl From<InputPanelError> for u32 {
    fn from(val: InputPanelError) -> u32 {
        val as u32
    }
}
