//! Server-side Wayland protocol transport
//!
//! This crate implements the part of a Wayland server that does not depend on
//! any particular protocol: reading requests from client sockets, checking them
//! against the static description of their interface, tracking the objects of
//! each client, advertising globals, and writing events back.
//!
//! Protocol logic lives in the [`ObjectData`](server::ObjectData) and
//! [`GlobalHandler`](server::GlobalHandler) implementations provided by the
//! crates built on top of it. Dispatch is single-threaded: every handler
//! receives a mutable [`Handle`](server::Handle) and the dispatch state.
//!
//! Handlers report invalid requests by returning a
//! [`RequestError`](server::RequestError): the error is sent to the client
//! and only the object it is about is destroyed, the connection survives.
//!
//! ## Logging
//!
//! This crate can generate some runtime error messages (notably when a protocol
//! error occurs). By default those messages are piped through the `log` crate.
//! If the `log` cargo feature is disabled, they are printed to stderr instead.
//!
//! Setting `WAYLAND_DEBUG=1` or `WAYLAND_DEBUG=server` in the environment of a
//! backend created with [`BackendConfig::from_env`](server::BackendConfig::from_env)
//! traces every request and event.

#![warn(missing_docs, missing_debug_implementations)]

/// Reexport of the `smallvec` crate, which is part of `imbridge-backend`'s public API.
pub extern crate smallvec;

/// Helper macro for quickly making a [`Message`][crate::protocol::Message]
#[macro_export]
macro_rules! message {
    ($sender_id: expr, $opcode: expr, [$($args: expr),* $(,)?] $(,)?) => {
        $crate::protocol::Message {
            sender_id: $sender_id,
            opcode: $opcode,
            args: $crate::smallvec::smallvec![$($args),*],
        }
    }
}

// internal imports for dispatching logging depending on the `log` feature
#[cfg(feature = "log")]
#[allow(unused_imports)]
use log::{debug as log_debug, error as log_error, info as log_info, warn as log_warn};
#[cfg(not(feature = "log"))]
#[allow(unused_imports)]
use std::{
    eprintln as log_error, eprintln as log_warn, eprintln as log_info, eprintln as log_debug,
};

pub mod core_interfaces;
mod debug;
mod map;
pub mod protocol;
pub mod server;
pub mod socket;
mod types;
pub mod wire;

#[cfg(test)]
mod test;
