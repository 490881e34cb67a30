//! Server side of the protocol
//!
//! A [`Backend`] owns the client connections. Requests are decoded, checked
//! against the interface descriptions and handed to the [`ObjectData`] of the
//! object they target, together with a [`Handle`] to send events and the
//! dispatch state `D` shared by all handlers.

use std::fmt;
use std::os::unix::io::OwnedFd;
use std::sync::Arc;

use crate::protocol::{same_interface, Interface, Message};

mod backend;
mod client;
mod handle;
mod registry;

pub use crate::types::{DisconnectReason, GlobalInfo, InitError, InvalidId, RequestError};
pub use backend::{Backend, BackendConfig};
pub use handle::Handle;

/// Handler of the requests sent to one object
///
/// Implementations hold no mutable state of their own, everything mutable lives
/// in the dispatch state `D`.
pub trait ObjectData<D>: downcast_rs::DowncastSync {
    /// Handle a request sent to the object.
    ///
    /// If the request creates an object, the handler returns the data of the new
    /// object. An `Err` is turned into a protocol error on the object named by
    /// the error, which is then destroyed.
    fn request(
        self: Arc<Self>,
        handle: &mut Handle<D>,
        data: &mut D,
        client_id: ClientId,
        msg: Message<ObjectId, OwnedFd>,
    ) -> Result<Option<Arc<dyn ObjectData<D>>>, RequestError>;

    /// The object was destroyed: by a destructor, by a protocol error, or
    /// because its client went away.
    fn destroyed(
        self: Arc<Self>,
        handle: &mut Handle<D>,
        data: &mut D,
        client_id: ClientId,
        object_id: ObjectId,
    );

    /// Debug representation of this data
    fn debug(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectData").finish_non_exhaustive()
    }
}

downcast_rs::impl_downcast!(sync ObjectData<D>);

impl<D: 'static> std::fmt::Debug for dyn ObjectData<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.debug(f)
    }
}

/// Handler of the binding of a global
pub trait GlobalHandler<D>: downcast_rs::DowncastSync {
    /// Whether the client may see and bind this global
    fn can_view(&self, _client_id: ClientId, _client_data: &Arc<dyn ClientData>) -> bool {
        true
    }

    /// A client bound the global, creating `object_id`.
    ///
    /// Returns the data of the new object.
    fn bind(
        self: Arc<Self>,
        handle: &mut Handle<D>,
        data: &mut D,
        client_id: ClientId,
        global_id: GlobalId,
        object_id: ObjectId,
    ) -> Arc<dyn ObjectData<D>>;

    /// Debug representation of this handler
    fn debug(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlobalHandler").finish_non_exhaustive()
    }
}

downcast_rs::impl_downcast!(sync GlobalHandler<D>);

impl<D: 'static> std::fmt::Debug for dyn GlobalHandler<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.debug(f)
    }
}

/// Data attached to a client connection
pub trait ClientData: downcast_rs::DowncastSync {
    /// The client was inserted in the backend
    fn initialized(&self, _client_id: ClientId) {}

    /// The client was disconnected
    fn disconnected(&self, _client_id: ClientId, _reason: DisconnectReason) {}

    /// Debug representation of this data
    fn debug(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientData").finish_non_exhaustive()
    }
}

downcast_rs::impl_downcast!(sync ClientData);

impl std::fmt::Debug for dyn ClientData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.debug(f)
    }
}

/// Id of an object of some client
///
/// Ids carry a serial: once the object is destroyed its id stays invalid even if
/// the client reuses the protocol id for another object.
#[derive(Clone)]
pub struct ObjectId {
    pub(crate) id: u32,
    pub(crate) serial: u32,
    pub(crate) client_id: ClientId,
    pub(crate) interface: &'static Interface,
}

impl ObjectId {
    /// Whether this is the null object
    pub fn is_null(&self) -> bool {
        self.id == 0
    }

    /// Interface of the object
    pub fn interface(&self) -> &'static Interface {
        self.interface
    }

    /// Whether both objects belong to the same client
    pub fn same_client_as(&self, other: &Self) -> bool {
        self.client_id == other.client_id
    }

    /// Client owning the object
    pub fn client_id(&self) -> ClientId {
        self.client_id.clone()
    }

    /// Protocol id of the object
    pub fn protocol_id(&self) -> u32 {
        self.id
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.interface.name, self.id)
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({}, {}, {})", self, self.serial, self.client_id.id)
    }
}

impl PartialEq for ObjectId {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.serial == other.serial
            && self.client_id == other.client_id
            && same_interface(self.interface, other.interface)
    }
}

impl Eq for ObjectId {}

impl std::hash::Hash for ObjectId {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
        self.serial.hash(state);
        self.client_id.hash(state);
    }
}

/// Id of a client connection
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ClientId {
    pub(crate) id: u32,
    pub(crate) serial: u32,
}

/// Id of a global
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct GlobalId {
    pub(crate) id: u32,
    pub(crate) serial: u32,
}

impl GlobalId {
    /// Name of the global in the registry
    pub fn name(&self) -> u32 {
        self.id
    }
}

#[derive(Debug)]
pub(crate) struct Data<D: 'static> {
    pub(crate) user_data: Arc<dyn ObjectData<D>>,
    pub(crate) serial: u32,
    /// Cleared when a protocol error killed the object
    pub(crate) alive: bool,
}

impl<D> Clone for Data<D> {
    fn clone(&self) -> Self {
        Self { user_data: self.user_data.clone(), serial: self.serial, alive: self.alive }
    }
}

/// Data of an object whose real data the handler has not provided yet
pub(crate) struct UninitObjectData;

impl<D> ObjectData<D> for UninitObjectData {
    fn request(
        self: Arc<Self>,
        _: &mut Handle<D>,
        _: &mut D,
        _: ClientId,
        msg: Message<ObjectId, OwnedFd>,
    ) -> Result<Option<Arc<dyn ObjectData<D>>>, RequestError> {
        panic!("Received a message on an uninitialized object: {msg:?}");
    }

    fn destroyed(self: Arc<Self>, _: &mut Handle<D>, _: &mut D, _: ClientId, _: ObjectId) {}

    fn debug(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UninitObjectData").finish()
    }
}

/// Data of objects that ignore everything: core objects, dead objects
pub(crate) struct InertObjectData;

impl<D> ObjectData<D> for InertObjectData {
    fn request(
        self: Arc<Self>,
        _: &mut Handle<D>,
        _: &mut D,
        _: ClientId,
        _: Message<ObjectId, OwnedFd>,
    ) -> Result<Option<Arc<dyn ObjectData<D>>>, RequestError> {
        Ok(None)
    }

    fn destroyed(self: Arc<Self>, _: &mut Handle<D>, _: &mut D, _: ClientId, _: ObjectId) {}

    fn debug(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InertObjectData").finish()
    }
}
