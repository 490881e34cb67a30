use std::{
    os::unix::{io::OwnedFd, net::UnixStream},
    sync::Arc,
};

use smallvec::SmallVec;

use super::{
    client::Client, ClientData, ClientId, Data, GlobalHandler, GlobalId, Handle, ObjectData,
    ObjectId,
};
use crate::{
    core_interfaces::{WL_DISPLAY_INTERFACE, WL_REGISTRY_INTERFACE},
    debug::has_debug_server_env,
    map::Object,
    protocol::{same_interface, Argument, Message, INLINE_ARGS},
    types::InitError,
};

/// Settings of a [`Backend`]
#[derive(Debug, Clone, Default)]
pub struct BackendConfig {
    /// Print every request and event to stderr
    pub debug: bool,
}

impl BackendConfig {
    /// Settings taken from the environment: `WAYLAND_DEBUG=1` or
    /// `WAYLAND_DEBUG=server` turns on message tracing.
    pub fn from_env() -> Self {
        Self { debug: has_debug_server_env() }
    }
}

/// A server: a set of client connections and the globals advertised to them
///
/// The backend does not poll. The embedding event loop calls
/// [`dispatch_client`](Backend::dispatch_client) when a client socket is
/// readable, or [`dispatch_all_clients`](Backend::dispatch_all_clients), then
/// [`flush`](Backend::flush).
#[derive(Debug)]
pub struct Backend<D: 'static> {
    handle: Handle<D>,
}

impl<D> Backend<D> {
    /// Create a backend with no clients and no globals
    pub fn new(config: BackendConfig) -> Self {
        Self { handle: Handle::new(config.debug) }
    }

    /// Add a client connected through `stream`
    pub fn insert_client(
        &mut self,
        stream: UnixStream,
        data: Arc<dyn ClientData>,
    ) -> Result<ClientId, InitError> {
        stream.set_nonblocking(true).map_err(InitError::Io)?;
        Ok(self.handle.clients.create_client(stream, data))
    }

    /// Access the clients, objects and globals
    pub fn handle(&mut self) -> &mut Handle<D> {
        &mut self.handle
    }

    /// Write the pending events of one client, or of all clients
    pub fn flush(&mut self, client: Option<ClientId>) -> std::io::Result<()> {
        self.handle.flush(client)
    }

    /// Dispatch every complete request a client has sent.
    ///
    /// Returns the number of requests dispatched, or `WouldBlock` if there was
    /// none. Other errors mean the client has been disconnected; its objects are
    /// destroyed before this returns.
    pub fn dispatch_client(&mut self, data: &mut D, client_id: ClientId) -> std::io::Result<usize> {
        let ret = self.dispatch_requests_for(data, client_id);
        self.handle.cleanup(data);
        ret
    }

    /// Dispatch the pending requests of all clients, then flush.
    ///
    /// Returns the total number of requests dispatched.
    pub fn dispatch_all_clients(&mut self, data: &mut D) -> usize {
        let clients: Vec<ClientId> = self.handle.all_clients().collect();
        let mut dispatched = 0;
        for client_id in clients {
            if let Ok(count) = self.dispatch_client(data, client_id) {
                dispatched += count;
            }
        }
        let _ = self.handle.flush(None);
        dispatched
    }

    fn dispatch_requests_for(&mut self, data: &mut D, client_id: ClientId) -> std::io::Result<usize> {
        let mut dispatched = 0;
        loop {
            let action = {
                let handle = &mut self.handle;
                let Ok(client) = handle.clients.get_client_mut(client_id.clone()) else {
                    return Err(std::io::Error::new(
                        std::io::ErrorKind::InvalidInput,
                        "Invalid client ID",
                    ));
                };
                let (message, object) = match client.next_request() {
                    Ok(v) => v,
                    Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                        if dispatched > 0 {
                            break;
                        } else {
                            return Err(e);
                        }
                    }
                    Err(e) => return Err(e),
                };
                dispatched += 1;
                if same_interface(object.interface, &WL_DISPLAY_INTERFACE) {
                    client.handle_display_request(message, &mut handle.registry);
                    continue;
                } else if same_interface(object.interface, &WL_REGISTRY_INTERFACE) {
                    match client.handle_registry_request(message, &mut handle.registry) {
                        Some((global, object, handler)) => {
                            DispatchAction::Bind { object, global, handler }
                        }
                        None => continue,
                    }
                } else {
                    if !client.check_since(&object, message.sender_id, message.opcode) {
                        continue;
                    }
                    let object_id = ObjectId {
                        id: message.sender_id,
                        serial: object.data.serial,
                        interface: object.interface,
                        client_id: client.id.clone(),
                    };
                    let opcode = message.opcode;
                    let Some((arguments, is_destructor, created_id)) =
                        client.process_request(&object, message)
                    else {
                        continue;
                    };
                    if !object.data.alive {
                        // killed by a protocol error, the client does not know yet
                        if let Some(child_id) = created_id {
                            client.mark_dead(&child_id);
                        }
                        if is_destructor {
                            client.send_delete_id(object_id);
                        }
                        continue;
                    }
                    DispatchAction::Request {
                        object,
                        object_id,
                        opcode,
                        arguments,
                        is_destructor,
                        created_id,
                    }
                }
            };
            match action {
                DispatchAction::Request {
                    object,
                    object_id,
                    opcode,
                    arguments,
                    is_destructor,
                    created_id,
                } => {
                    self.dispatch_request(
                        data,
                        &client_id,
                        object,
                        object_id,
                        opcode,
                        arguments,
                        is_destructor,
                        created_id,
                    );
                }
                DispatchAction::Bind { object, global, handler } => {
                    let child_data = handler.bind(
                        &mut self.handle,
                        data,
                        client_id.clone(),
                        global,
                        object.clone(),
                    );
                    if let Ok(client) = self.handle.clients.get_client_mut(client_id.clone()) {
                        set_data_if_alive(client, &object, child_data);
                    }
                }
            }
            self.handle.run_pending_destructors(data);
        }
        Ok(dispatched)
    }

    #[allow(clippy::too_many_arguments)]
    fn dispatch_request(
        &mut self,
        data: &mut D,
        client_id: &ClientId,
        object: Object<Data<D>>,
        object_id: ObjectId,
        opcode: u16,
        arguments: SmallVec<[Argument<ObjectId, OwnedFd>; INLINE_ARGS]>,
        is_destructor: bool,
        created_id: Option<ObjectId>,
    ) {
        let ret = object.data.user_data.clone().request(
            &mut self.handle,
            data,
            client_id.clone(),
            Message { sender_id: object_id.clone(), opcode, args: arguments },
        );

        let (child_data, failed) = match ret {
            Ok(child_data) => (child_data, false),
            Err(err) => {
                let target = err.object.clone().unwrap_or_else(|| object_id.clone());
                self.handle.post_resource_error(target, err.code, err.message);
                (None, true)
            }
        };

        // the handler may have killed its own object with a protocol error, its
        // destructor is queued already in that case
        let sender_alive = self.handle.object_info(object_id.clone()).is_ok();
        if is_destructor {
            if sender_alive {
                object.data.user_data.clone().destroyed(
                    &mut self.handle,
                    data,
                    client_id.clone(),
                    object_id.clone(),
                );
            }
            if let Ok(client) = self.handle.clients.get_client_mut(client_id.clone()) {
                client.send_delete_id(object_id);
            }
        }

        let Ok(client) = self.handle.clients.get_client_mut(client_id.clone()) else {
            return;
        };
        match (created_id, child_data) {
            (Some(child_id), Some(child_data)) => set_data_if_alive(client, &child_id, child_data),
            (None, None) => {}
            (Some(child_id), None) => {
                if !failed && !client.killed && sender_alive {
                    panic!("Callback creating object {child_id} did not provide any object data.");
                }
                client.mark_dead(&child_id);
            }
            (None, Some(_)) => {
                panic!("An object data was returned from a callback not creating any object");
            }
        }
    }
}

fn set_data_if_alive<D>(
    client: &mut Client<D>,
    id: &ObjectId,
    user_data: Arc<dyn ObjectData<D>>,
) {
    let _ = client.map.with(id.id, |obj| {
        if obj.data.alive && obj.data.serial == id.serial {
            obj.data.user_data = user_data;
        }
    });
}

enum DispatchAction<D: 'static> {
    Request {
        object: Object<Data<D>>,
        object_id: ObjectId,
        opcode: u16,
        arguments: SmallVec<[Argument<ObjectId, OwnedFd>; INLINE_ARGS]>,
        is_destructor: bool,
        created_id: Option<ObjectId>,
    },
    Bind {
        object: ObjectId,
        global: GlobalId,
        handler: Arc<dyn GlobalHandler<D>>,
    },
}
