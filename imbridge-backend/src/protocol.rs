//! Wire-level vocabulary: argument types, interface descriptions and messages

use std::{ffi::CString, os::unix::io::AsRawFd};

/// Whether an argument may be null.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AllowNull {
    /// Null is accepted.
    Yes,
    /// Null is a protocol violation.
    No,
}

/// Type of a single argument as it appears in a message signature
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum ArgumentType {
    /// Signed 32 bit integer
    Int,
    /// Unsigned 32 bit integer
    Uint,
    /// Signed 24.8 fixed point number
    Fixed,
    /// Length-prefixed, NUL terminated string
    Str(AllowNull),
    /// Id of an existing object
    Object(AllowNull),
    /// Id of an object created by this message
    NewId,
    /// Length-prefixed byte array
    Array,
    /// File descriptor, carried out of band
    Fd,
}

impl ArgumentType {
    /// Compare two types, ignoring their nullability.
    pub fn same_type(self, other: Self) -> bool {
        std::mem::discriminant(&self) == std::mem::discriminant(&other)
    }
}

/// A decoded argument
#[derive(Debug, Clone)]
#[allow(clippy::box_collection)]
pub enum Argument<Id, Fd> {
    /// Signed 32 bit integer
    Int(i32),
    /// Unsigned 32 bit integer
    Uint(u32),
    /// Raw 24.8 fixed point value
    Fixed(i32),
    /// String, boxed to keep `Argument` small
    Str(Option<Box<CString>>),
    /// Id of an existing object
    Object(Id),
    /// Id of a newly created object
    NewId(Id),
    /// Byte array, boxed to keep `Argument` small
    Array(Box<Vec<u8>>),
    /// File descriptor
    Fd(Fd),
}

impl<Id, Fd> Argument<Id, Fd> {
    /// Type of this argument
    pub fn get_type(&self) -> ArgumentType {
        match *self {
            Self::Int(_) => ArgumentType::Int,
            Self::Uint(_) => ArgumentType::Uint,
            Self::Fixed(_) => ArgumentType::Fixed,
            Self::Str(_) => ArgumentType::Str(AllowNull::Yes),
            Self::Object(_) => ArgumentType::Object(AllowNull::Yes),
            Self::NewId(_) => ArgumentType::NewId,
            Self::Array(_) => ArgumentType::Array,
            Self::Fd(_) => ArgumentType::Fd,
        }
    }

    fn map_fd<T>(self, f: &mut impl FnMut(Fd) -> T) -> Argument<Id, T> {
        match self {
            Self::Int(val) => Argument::Int(val),
            Self::Uint(val) => Argument::Uint(val),
            Self::Fixed(val) => Argument::Fixed(val),
            Self::Str(val) => Argument::Str(val),
            Self::Object(val) => Argument::Object(val),
            Self::NewId(val) => Argument::NewId(val),
            Self::Array(val) => Argument::Array(val),
            Self::Fd(val) => Argument::Fd(f(val)),
        }
    }
}

impl<Id: PartialEq, Fd: AsRawFd> PartialEq for Argument<Id, Fd> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Uint(a), Self::Uint(b)) => a == b,
            (Self::Fixed(a), Self::Fixed(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => a == b,
            (Self::NewId(a), Self::NewId(b)) => a == b,
            (Self::Array(a), Self::Array(b)) => a == b,
            (Self::Fd(a), Self::Fd(b)) => a.as_raw_fd() == b.as_raw_fd(),
            _ => false,
        }
    }
}

impl<Id: Eq, Fd: AsRawFd> Eq for Argument<Id, Fd> {}

impl<Id: std::fmt::Display, Fd: AsRawFd> std::fmt::Display for Argument<Id, Fd> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Int(value) => write!(f, "{value}"),
            Self::Uint(value) => write!(f, "{value}"),
            Self::Fixed(value) => write!(f, "{:.4}", *value as f64 / 256.0),
            Self::Str(Some(value)) => write!(f, "{value:?}"),
            Self::Str(None) => f.write_str("nil"),
            Self::Object(value) => write!(f, "{value}"),
            Self::NewId(value) => write!(f, "new id {value}"),
            Self::Array(value) => write!(f, "array[{}]", value.len()),
            Self::Fd(value) => write!(f, "fd {}", value.as_raw_fd()),
        }
    }
}

/// Static description of an interface: its name, version and messages.
#[derive(Debug)]
pub struct Interface {
    /// Name of the interface, as advertised by the registry
    pub name: &'static str,
    /// Highest version this description covers
    pub version: u32,
    /// Requests, indexed by opcode
    pub requests: &'static [MessageDesc],
    /// Events, indexed by opcode
    pub events: &'static [MessageDesc],
}

impl std::fmt::Display for Interface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name)
    }
}

/// Description of one request or event
#[derive(Copy, Clone, Debug)]
pub struct MessageDesc {
    /// Name of the message
    pub name: &'static str,
    /// Argument types, in wire order
    pub signature: &'static [ArgumentType],
    /// Interface version that introduced this message
    pub since: u32,
    /// Whether the sender is destroyed by this message
    pub is_destructor: bool,
    /// Interface of the object created by the `NewId` argument, if any
    pub child_interface: Option<&'static Interface>,
    /// Interfaces of the `Object` arguments, in order
    pub arg_interfaces: &'static [&'static Interface],
}

/// Interface matching any object
pub static ANONYMOUS_INTERFACE: Interface =
    Interface { name: "<anonymous>", version: 0, requests: &[], events: &[] };

/// Protocol-level information of a live object
#[derive(Copy, Clone, Debug)]
pub struct ObjectInfo {
    /// Protocol id
    pub id: u32,
    /// Interface
    pub interface: &'static Interface,
    /// Version negotiated at creation
    pub version: u32,
}

/// A protocol error sent to a client
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProtocolError {
    /// Interface-specific error code
    pub code: u32,
    /// Protocol id of the object the error is about
    pub object_id: u32,
    /// Interface name of that object
    pub object_interface: String,
    /// Human readable description
    pub message: String,
}

impl std::error::Error for ProtocolError {}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut ::std::fmt::Formatter) -> Result<(), ::std::fmt::Error> {
        write!(
            f,
            "Protocol error {} on object {}@{}: {}",
            self.code, self.object_interface, self.object_id, self.message
        )
    }
}

/// Number of arguments stored inline in a [`Message`] before spilling to the heap
pub const INLINE_ARGS: usize = 4;

/// A request or an event
#[derive(Clone, Debug)]
pub struct Message<Id, Fd> {
    /// Object the message is addressed to (requests) or sent from (events)
    pub sender_id: Id,
    /// Opcode within the interface of the sender
    pub opcode: u16,
    /// Arguments
    pub args: smallvec::SmallVec<[Argument<Id, Fd>; INLINE_ARGS]>,
}

impl<Id, Fd> Message<Id, Fd> {
    /// Change the file descriptor representation of this message.
    pub fn map_fd<T>(self, mut f: impl FnMut(Fd) -> T) -> Message<Id, T> {
        Message {
            sender_id: self.sender_id,
            opcode: self.opcode,
            args: self.args.into_iter().map(move |arg| arg.map_fd(&mut f)).collect(),
        }
    }
}

impl<Id: PartialEq, Fd: AsRawFd> PartialEq for Message<Id, Fd> {
    fn eq(&self, other: &Self) -> bool {
        self.sender_id == other.sender_id && self.opcode == other.opcode && self.args == other.args
    }
}

impl<Id: Eq, Fd: AsRawFd> Eq for Message<Id, Fd> {}

/// Whether two descriptions designate the same interface.
#[inline]
pub fn same_interface(a: &'static Interface, b: &'static Interface) -> bool {
    std::ptr::eq(a, b) || a.name == b.name
}

pub(crate) fn check_for_signature<Id, Fd>(
    signature: &[ArgumentType],
    args: &[Argument<Id, Fd>],
) -> bool {
    signature.len() == args.len()
        && signature.iter().copied().zip(args.iter()).all(|(typ, arg)| arg.get_type().same_type(typ))
}

#[inline]
pub(crate) fn same_interface_or_anonymous(a: &'static Interface, b: &'static Interface) -> bool {
    same_interface(a, b) || same_interface(a, &ANONYMOUS_INTERFACE)
}

/// A protocol enum value that may be outside of the known variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WEnum<T> {
    /// A known variant
    Value(T),
    /// A raw value with no known meaning
    Unknown(u32),
}

/// Error for an unknown [`WEnum`] value
#[derive(Debug, Copy, Clone)]
pub struct WEnumError {
    typ: &'static str,
    value: u32,
}

impl std::error::Error for WEnumError {}

impl std::fmt::Display for WEnumError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Unknown numeric value {} for enum {}", self.value, self.typ)
    }
}

impl<T> WEnum<T> {
    /// Convert into a `Result`, failing on unknown values.
    #[inline]
    pub fn into_result(self) -> Result<T, WEnumError> {
        match self {
            Self::Value(v) => Ok(v),
            Self::Unknown(value) => Err(WEnumError { typ: std::any::type_name::<T>(), value }),
        }
    }
}

impl<T> From<WEnum<T>> for Result<T, WEnumError> {
    fn from(me: WEnum<T>) -> Self {
        me.into_result()
    }
}

impl<T: TryFrom<u32>> From<u32> for WEnum<T> {
    fn from(v: u32) -> Self {
        match T::try_from(v) {
            Ok(t) => Self::Value(t),
            Err(_) => Self::Unknown(v),
        }
    }
}

impl<T: Into<u32>> From<WEnum<T>> for u32 {
    fn from(enu: WEnum<T>) -> u32 {
        match enu {
            WEnum::Unknown(u) => u,
            WEnum::Value(t) => t.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::io::RawFd;

    #[derive(Debug, PartialEq, Eq)]
    enum Direction {
        Ltr,
        Rtl,
    }

    impl TryFrom<u32> for Direction {
        type Error = ();
        fn try_from(v: u32) -> Result<Self, ()> {
            match v {
                1 => Ok(Self::Ltr),
                2 => Ok(Self::Rtl),
                _ => Err(()),
            }
        }
    }

    #[test]
    fn wenum_keeps_unknown_values() {
        assert_eq!(WEnum::<Direction>::from(2), WEnum::Value(Direction::Rtl));
        let unknown = WEnum::<Direction>::from(7);
        assert_eq!(unknown, WEnum::Unknown(7));
        assert!(unknown.into_result().is_err());
    }

    #[test]
    fn signature_check_ignores_nullability() {
        let args: [Argument<u32, RawFd>; 2] =
            [Argument::Str(None), Argument::Object(0)];
        assert!(check_for_signature(
            &[ArgumentType::Str(AllowNull::No), ArgumentType::Object(AllowNull::Yes)],
            &args
        ));
        assert!(!check_for_signature(&[ArgumentType::Uint, ArgumentType::Object(AllowNull::No)], &args));
        assert!(!check_for_signature(&[ArgumentType::Uint], &args));
    }
}
