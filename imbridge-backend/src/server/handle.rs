use std::{os::unix::io::RawFd, sync::Arc};

use crate::{
    protocol::{same_interface, Interface, Message, ObjectInfo, ANONYMOUS_INTERFACE},
    types::{DisconnectReason, GlobalInfo, InvalidId},
};

use super::{
    client::{to_cstring, ClientStore},
    registry::Registry,
    ClientData, ClientId, GlobalHandler, GlobalId, ObjectData, ObjectId,
};

pub(crate) type PendingDestructor<D> = (Arc<dyn ObjectData<D>>, ClientId, ObjectId);

/// Access to the clients, objects and globals of a [`Backend`](super::Backend)
///
/// Handlers receive it mutably together with the dispatch state.
pub struct Handle<D: 'static> {
    pub(crate) clients: ClientStore<D>,
    pub(crate) registry: Registry<D>,
    pub(crate) pending_destructors: Vec<PendingDestructor<D>>,
}

impl<D> std::fmt::Debug for Handle<D> {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fmt.debug_struct("Handle")
            .field("pending_destructors", &self.pending_destructors.len())
            .finish_non_exhaustive()
    }
}

impl<D> Handle<D> {
    pub(crate) fn new(debug: bool) -> Self {
        Self {
            clients: ClientStore::new(debug),
            registry: Registry::new(),
            pending_destructors: Vec::new(),
        }
    }

    /// Run queued `destroyed` callbacks, including the ones they queue themselves.
    pub(crate) fn run_pending_destructors(&mut self, data: &mut D) {
        while !self.pending_destructors.is_empty() {
            let pending = std::mem::take(&mut self.pending_destructors);
            for (object_data, client_id, object_id) in pending {
                object_data.destroyed(self, data, client_id, object_id);
            }
        }
    }

    /// Drop killed clients and destroy all their objects.
    pub(crate) fn cleanup(&mut self, data: &mut D) {
        let dead_clients = self.clients.cleanup(&mut self.pending_destructors);
        self.registry.cleanup(&dead_clients);
        self.run_pending_destructors(data);
    }

    pub(crate) fn flush(&mut self, client: Option<ClientId>) -> std::io::Result<()> {
        if let Some(client) = client {
            match self.clients.get_client_mut(client) {
                Ok(client) => client.flush(),
                Err(InvalidId) => Ok(()),
            }
        } else {
            for client in self.clients.clients_mut() {
                let _ = client.flush();
            }
            Ok(())
        }
    }

    /// Protocol information of a live object
    pub fn object_info(&self, id: ObjectId) -> Result<ObjectInfo, InvalidId> {
        self.clients.get_client(id.client_id.clone())?.object_info(id)
    }

    /// Client owning a live object
    pub fn get_client(&self, id: ObjectId) -> Result<ClientId, InvalidId> {
        let client = self.clients.get_client(id.client_id.clone())?;
        client.object_info(id)?;
        Ok(client.id.clone())
    }

    /// Data attached to a client when it was inserted
    pub fn get_client_data(&self, id: ClientId) -> Result<Arc<dyn ClientData>, InvalidId> {
        Ok(self.clients.get_client(id)?.data.clone())
    }

    /// Ids of all connected clients
    pub fn all_clients(&self) -> impl Iterator<Item = ClientId> + '_ {
        self.clients.all_clients_id()
    }

    /// Ids of all live objects of a client
    pub fn all_objects_for(&self, client_id: ClientId) -> Result<Vec<ObjectId>, InvalidId> {
        Ok(self.clients.get_client(client_id)?.all_objects().collect())
    }

    /// Call `f` on every live object of `client_id` implementing `interface`.
    ///
    /// The objects are collected first, `f` may send events or destroy objects.
    pub fn for_each_resource_of(
        &mut self,
        client_id: ClientId,
        interface: &'static Interface,
        mut f: impl FnMut(&mut Self, ObjectId),
    ) -> Result<(), InvalidId> {
        let objects: Vec<ObjectId> = self
            .clients
            .get_client(client_id)?
            .all_objects()
            .filter(|id| same_interface(id.interface, interface))
            .collect();
        for id in objects {
            f(self, id);
        }
        Ok(())
    }

    /// Resolve a protocol id sent by a client
    pub fn object_for_protocol_id(
        &self,
        client_id: ClientId,
        interface: &'static Interface,
        protocol_id: u32,
    ) -> Result<ObjectId, InvalidId> {
        let object = self.clients.get_client(client_id)?.object_for_protocol_id(protocol_id)?;
        if same_interface(interface, object.interface) {
            Ok(object)
        } else {
            Err(InvalidId)
        }
    }

    /// Create a server-side object, to be sent to the client in a `new_id` event argument
    pub fn create_object(
        &mut self,
        client_id: ClientId,
        interface: &'static Interface,
        version: u32,
        data: Arc<dyn ObjectData<D>>,
    ) -> Result<ObjectId, InvalidId> {
        let client = self.clients.get_client_mut(client_id)?;
        Ok(client.create_object(interface, version, data))
    }

    /// The null object, for nullable object arguments
    pub fn null_id() -> ObjectId {
        ObjectId {
            id: 0,
            serial: 0,
            client_id: ClientId { id: 0, serial: 0 },
            interface: &ANONYMOUS_INTERFACE,
        }
    }

    /// Send an event.
    ///
    /// Events from objects that were destroyed or killed by a protocol error are
    /// dropped and reported as `Err(InvalidId)`.
    pub fn send_event(&mut self, msg: Message<ObjectId, RawFd>) -> Result<(), InvalidId> {
        self.clients
            .get_client_mut(msg.sender_id.client_id.clone())?
            .send_event(msg, Some(&mut self.pending_destructors))
    }

    /// Data of a live object
    pub fn get_object_data(&self, id: ObjectId) -> Result<Arc<dyn ObjectData<D>>, InvalidId> {
        self.clients.get_client(id.client_id.clone())?.get_object_data(id)
    }

    /// Replace the data of a live object
    pub fn set_object_data(
        &mut self,
        id: ObjectId,
        data: Arc<dyn ObjectData<D>>,
    ) -> Result<(), InvalidId> {
        self.clients.get_client_mut(id.client_id.clone())?.set_object_data(id, data)
    }

    /// Send a fatal protocol error and disconnect the client
    pub fn post_error(&mut self, object_id: ObjectId, error_code: u32, message: impl Into<String>) {
        if let Ok(client) = self.clients.get_client_mut(object_id.client_id.clone()) {
            client.post_error(object_id, error_code, to_cstring(message))
        }
    }

    /// Send a protocol error about one object and destroy that object.
    ///
    /// The client stays connected. Further requests to the object are ignored
    /// and its `destroyed` callback runs once the current request is handled.
    pub fn post_resource_error(
        &mut self,
        object_id: ObjectId,
        error_code: u32,
        message: impl Into<String>,
    ) {
        let message = message.into();
        crate::log_warn!("Protocol error {} on {}: {}", error_code, object_id, message);
        if let Ok(client) = self.clients.get_client_mut(object_id.client_id.clone()) {
            if let Some(pending) = client.post_resource_error(object_id, error_code, to_cstring(message)) {
                self.pending_destructors.push(pending);
            }
        }
    }

    /// Disconnect a client
    pub fn kill_client(&mut self, client_id: ClientId, reason: DisconnectReason) {
        if let Ok(client) = self.clients.get_client_mut(client_id) {
            client.kill(reason)
        }
    }

    /// Advertise a global
    pub fn create_global(
        &mut self,
        interface: &'static Interface,
        version: u32,
        handler: Arc<dyn GlobalHandler<D>>,
    ) -> GlobalId {
        self.registry.create_global(interface, version, handler, &mut self.clients)
    }

    /// Stop advertising a global, binds already in flight still succeed
    pub fn disable_global(&mut self, id: GlobalId) {
        self.registry.disable_global(&id, &mut self.clients)
    }

    /// Remove a global
    pub fn remove_global(&mut self, id: GlobalId) {
        self.registry.remove_global(&id, &mut self.clients)
    }

    /// Information about a global
    pub fn global_info(&self, id: GlobalId) -> Result<GlobalInfo, InvalidId> {
        self.registry.get_info(&id)
    }
}
