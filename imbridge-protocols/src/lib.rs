//! Protocols spoken by the input-method bridge
//!
//! Each interface gets a module holding its static
//! [`Interface`](imbridge_backend::protocol::Interface) description, its enums,
//! a `Request` enum decoded from incoming messages and an `Event` enum encoded
//! into outgoing ones.
//!
//! - [`core`]: the `wl_*` objects the bridge needs from the core protocol
//! - [`text_input`]: `zwp_text_input_v1`, `zwp_text_input_v2` and `zwp_text_input_v3`
//! - [`input_method`]: `zwp_input_method_v1` with its input panel, and `zwp_input_method_v2`

#![warn(missing_docs, missing_debug_implementations)]

use std::{ffi::CString, os::unix::io::OwnedFd};

use imbridge_backend::{
    protocol::{Argument, ArgumentType, Interface, Message, MessageDesc, INLINE_ARGS},
    server::ObjectId,
    smallvec,
};

pub use imbridge_backend;

pub mod core;
pub mod input_method;
pub mod text_input;

/// A request that does not match its interface
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// The opcode is unknown or an argument could not be decoded
    BadMessage {
        /// The object the request was sent to
        sender_id: ObjectId,
        /// Interface of that object
        interface: &'static str,
        /// Opcode of the request
        opcode: u16,
    },
}

impl std::error::Error for DispatchError {}

impl std::fmt::Display for DispatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            DispatchError::BadMessage { sender_id, interface, opcode } => {
                write!(f, "Bad message for object {interface}@{} on opcode {opcode}", sender_id.protocol_id())
            }
        }
    }
}

// Builders for the static message descriptions

pub(crate) const fn msg(name: &'static str, signature: &'static [ArgumentType]) -> MessageDesc {
    MessageDesc {
        name,
        signature,
        since: 1,
        is_destructor: false,
        child_interface: None,
        arg_interfaces: &[],
    }
}

pub(crate) const fn since(desc: MessageDesc, since: u32) -> MessageDesc {
    MessageDesc { since, ..desc }
}

pub(crate) const fn destructor(desc: MessageDesc) -> MessageDesc {
    MessageDesc { is_destructor: true, ..desc }
}

pub(crate) const fn creates(desc: MessageDesc, child: &'static Interface) -> MessageDesc {
    MessageDesc { child_interface: Some(child), ..desc }
}

pub(crate) const fn objects(
    desc: MessageDesc,
    arg_interfaces: &'static [&'static Interface],
) -> MessageDesc {
    MessageDesc { arg_interfaces, ..desc }
}

/// Sequential decoder of the arguments of a request
///
/// The backend already checked the argument types against the signature, a
/// mismatch here only comes from a description and a parser disagreeing.
pub(crate) struct Args {
    iter: smallvec::IntoIter<[Argument<ObjectId, OwnedFd>; INLINE_ARGS]>,
}

impl Args {
    pub(crate) fn new(msg: Message<ObjectId, OwnedFd>) -> (ObjectId, u16, Self) {
        (msg.sender_id, msg.opcode, Self { iter: msg.args.into_iter() })
    }

    pub(crate) fn uint(&mut self) -> Option<u32> {
        match self.iter.next()? {
            Argument::Uint(v) => Some(v),
            _ => None,
        }
    }

    pub(crate) fn int(&mut self) -> Option<i32> {
        match self.iter.next()? {
            Argument::Int(v) => Some(v),
            _ => None,
        }
    }

    /// A nullable string, `None` if it is not valid UTF-8
    pub(crate) fn opt_string(&mut self) -> Option<Option<String>> {
        match self.iter.next()? {
            Argument::Str(Some(s)) => s.into_string().ok().map(Some),
            Argument::Str(None) => Some(None),
            _ => None,
        }
    }

    pub(crate) fn string(&mut self) -> Option<String> {
        self.opt_string()?
    }

    pub(crate) fn object(&mut self) -> Option<ObjectId> {
        match self.iter.next()? {
            Argument::Object(id) => Some(id),
            _ => None,
        }
    }

    /// A nullable object argument
    pub(crate) fn opt_object(&mut self) -> Option<Option<ObjectId>> {
        self.object().map(|id| if id.is_null() { None } else { Some(id) })
    }

    pub(crate) fn new_id(&mut self) -> Option<ObjectId> {
        match self.iter.next()? {
            Argument::NewId(id) => Some(id),
            _ => None,
        }
    }

    pub(crate) fn array(&mut self) -> Option<Vec<u8>> {
        match self.iter.next()? {
            Argument::Array(a) => Some(*a),
            _ => None,
        }
    }
}

/// Decode a request with `parse`, reporting failures as [`DispatchError::BadMessage`]
pub(crate) fn parse_with<R>(
    msg: Message<ObjectId, OwnedFd>,
    interface: &'static Interface,
    parse: impl FnOnce(u16, &mut Args) -> Option<R>,
) -> Result<R, DispatchError> {
    let (sender_id, opcode, mut args) = Args::new(msg);
    parse(opcode, &mut args).ok_or(DispatchError::BadMessage {
        sender_id,
        interface: interface.name,
        opcode,
    })
}

pub(crate) fn string_arg<Id, Fd>(s: String) -> Argument<Id, Fd> {
    Argument::Str(Some(Box::new(to_cstring(s))))
}

pub(crate) fn opt_string_arg<Id, Fd>(s: Option<String>) -> Argument<Id, Fd> {
    Argument::Str(s.map(|s| Box::new(to_cstring(s))))
}

fn to_cstring(s: String) -> CString {
    let mut bytes = s.into_bytes();
    bytes.retain(|&b| b != 0);
    CString::new(bytes).unwrap_or_default()
}
