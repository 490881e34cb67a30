use std::{
    ffi::CString,
    os::unix::{
        io::{AsFd, BorrowedFd, OwnedFd, RawFd},
        net::UnixStream,
    },
    sync::Arc,
};

use smallvec::SmallVec;

use crate::{
    core_interfaces::{WL_CALLBACK_INTERFACE, WL_DISPLAY_INTERFACE, WL_REGISTRY_INTERFACE},
    debug,
    map::{Object, ObjectMap, SERVER_ID_LIMIT},
    protocol::{
        check_for_signature, same_interface, same_interface_or_anonymous, AllowNull, Argument,
        ArgumentType, Interface, Message, ObjectInfo, ProtocolError, ANONYMOUS_INTERFACE,
        INLINE_ARGS,
    },
    socket::{BufferedSocket, Socket},
    types::{DisconnectReason, InvalidId},
    wire::MessageParseError,
};

use super::{
    handle::PendingDestructor, registry::Registry, ClientData, ClientId, Data, GlobalHandler,
    GlobalId, InertObjectData, ObjectData, ObjectId, UninitObjectData,
};

type ArgSmallVec<Fd> = SmallVec<[Argument<ObjectId, Fd>; INLINE_ARGS]>;

/// Error codes of `wl_display`
#[repr(u32)]
#[allow(dead_code)]
#[derive(Debug, Clone, Copy)]
pub(crate) enum DisplayError {
    InvalidObject = 0,
    InvalidMethod = 1,
    NoMemory = 2,
    Implementation = 3,
}

/// Build a C string, dropping interior NULs.
pub(crate) fn to_cstring(message: impl Into<String>) -> CString {
    let mut bytes = message.into().into_bytes();
    bytes.retain(|&b| b != 0);
    CString::new(bytes).unwrap_or_default()
}

#[derive(Debug)]
pub(crate) struct Client<D: 'static> {
    socket: BufferedSocket,
    pub(crate) map: ObjectMap<Data<D>>,
    debug: bool,
    last_serial: u32,
    pub(crate) id: ClientId,
    pub(crate) killed: bool,
    pub(crate) data: Arc<dyn ClientData>,
}

impl<D> Client<D> {
    pub(crate) fn new(
        stream: UnixStream,
        id: ClientId,
        debug: bool,
        data: Arc<dyn ClientData>,
    ) -> Self {
        let socket = BufferedSocket::new(Socket::from(stream));
        let mut map = ObjectMap::new();
        // id 1 is free in a fresh map
        let _ = map.insert_at(
            1,
            Object {
                interface: &WL_DISPLAY_INTERFACE,
                version: 1,
                data: Data { user_data: Arc::new(InertObjectData), serial: 0, alive: true },
            },
        );

        data.initialized(id.clone());

        Self { socket, map, debug, id, killed: false, last_serial: 0, data }
    }

    fn next_serial(&mut self) -> u32 {
        self.last_serial = self.last_serial.wrapping_add(1);
        self.last_serial
    }

    fn display_id(&self) -> ObjectId {
        ObjectId { id: 1, serial: 0, client_id: self.id.clone(), interface: &WL_DISPLAY_INTERFACE }
    }

    pub(crate) fn create_object(
        &mut self,
        interface: &'static Interface,
        version: u32,
        user_data: Arc<dyn ObjectData<D>>,
    ) -> ObjectId {
        let serial = self.next_serial();
        let id = self.map.server_insert_new(Object {
            interface,
            version,
            data: Data { serial, user_data, alive: true },
        });
        ObjectId { id, serial, client_id: self.id.clone(), interface }
    }

    pub(crate) fn object_info(&self, id: ObjectId) -> Result<ObjectInfo, InvalidId> {
        let object = self.get_object(id.clone())?;
        Ok(ObjectInfo { id: id.id, interface: object.interface, version: object.version })
    }

    /// Queue an event.
    ///
    /// Events from dead objects are dropped with `Err(InvalidId)`. An event that
    /// does not match its description is a bug of the caller and panics.
    pub(crate) fn send_event(
        &mut self,
        Message { sender_id: object_id, opcode, args }: Message<ObjectId, RawFd>,
        pending_destructors: Option<&mut Vec<PendingDestructor<D>>>,
    ) -> Result<(), InvalidId> {
        if self.killed {
            return Ok(());
        }
        let object = match self.get_object(object_id.clone()) {
            Ok(object) => object,
            Err(InvalidId) => {
                if self.debug {
                    if let Some(desc) = object_id.interface.events.get(opcode as usize) {
                        debug::print_send_message(
                            object_id.interface.name,
                            object_id.id,
                            desc.name,
                            &args,
                            true,
                        );
                    }
                }
                return Err(InvalidId);
            }
        };

        let message_desc = match object.interface.events.get(opcode as usize) {
            Some(msg) => msg,
            None => {
                panic!("Unknown opcode {} for object {}@{}.", opcode, object.interface.name, object_id.id);
            }
        };

        if !check_for_signature(message_desc.signature, &args) {
            panic!(
                "Unexpected signature for event {}@{}.{}: expected {:?}, got {:?}.",
                object.interface.name, object_id.id, message_desc.name, message_desc.signature, args
            );
        }

        if self.debug {
            debug::print_send_message(
                object.interface.name,
                object_id.id,
                message_desc.name,
                &args,
                false,
            );
        }

        let mut msg_args = SmallVec::with_capacity(args.len());
        let mut arg_interfaces = message_desc.arg_interfaces.iter();
        for (i, arg) in args.into_iter().enumerate() {
            msg_args.push(match arg {
                Argument::Array(a) => Argument::Array(a),
                Argument::Int(i) => Argument::Int(i),
                Argument::Uint(u) => Argument::Uint(u),
                Argument::Str(s) => Argument::Str(s),
                Argument::Fixed(f) => Argument::Fixed(f),
                Argument::Fd(f) => Argument::Fd(f),
                Argument::NewId(o) => {
                    if o.id != 0 {
                        if o.client_id != self.id {
                            panic!("Attempting to send an event with objects from wrong client.")
                        }
                        let created = self.get_object(o.clone())?;
                        match message_desc.child_interface {
                            Some(iface) if same_interface(iface, created.interface) => {}
                            _ => panic!(
                                "Event {}@{}.{} creates an object of the wrong interface {}.",
                                object.interface.name, object_id.id, message_desc.name, created.interface.name
                            ),
                        }
                    }
                    Argument::NewId(o.id)
                }
                Argument::Object(o) => {
                    let next_interface = arg_interfaces.next().copied().unwrap_or(&ANONYMOUS_INTERFACE);
                    if o.id != 0 {
                        if o.client_id != self.id {
                            panic!("Attempting to send an event with objects from wrong client.")
                        }
                        let arg_object = self.get_object(o.clone())?;
                        if !same_interface_or_anonymous(next_interface, arg_object.interface) {
                            panic!(
                                "Event {}@{}.{} expects an object argument of interface {} but {} was provided instead.",
                                object.interface.name, object_id.id, message_desc.name, next_interface.name, arg_object.interface.name
                            );
                        }
                    } else if !matches!(message_desc.signature[i], ArgumentType::Object(AllowNull::Yes)) {
                        panic!(
                            "Event {}@{}.{} expects a non-null object argument.",
                            object.interface.name, object_id.id, message_desc.name
                        );
                    }
                    Argument::Object(o.id)
                }
            });
        }

        let msg = Message { sender_id: object_id.id, opcode, args: msg_args };

        if self.socket.write_message(&msg).is_err() {
            self.kill(DisconnectReason::ConnectionClosed);
        }

        if message_desc.is_destructor {
            if let Some(vec) = pending_destructors {
                vec.push((object.data.user_data.clone(), self.id.clone(), object_id.clone()));
            }
            self.send_delete_id(object_id);
        }

        Ok(())
    }

    pub(crate) fn send_delete_id(&mut self, object_id: ObjectId) {
        // only client-allocated ids are acknowledged
        if object_id.id < SERVER_ID_LIMIT {
            let msg = message!(1, 1, [Argument::Uint(object_id.id)]);
            if self.socket.write_message(&msg).is_err() {
                self.kill(DisconnectReason::ConnectionClosed);
            }
        }
        self.map.remove(object_id.id);
    }

    pub(crate) fn get_object_data(&self, id: ObjectId) -> Result<Arc<dyn ObjectData<D>>, InvalidId> {
        let object = self.get_object(id)?;
        Ok(object.data.user_data)
    }

    pub(crate) fn set_object_data(
        &mut self,
        id: ObjectId,
        data: Arc<dyn ObjectData<D>>,
    ) -> Result<(), InvalidId> {
        self.map
            .with(id.id, |obj| {
                if obj.data.serial != id.serial || !obj.data.alive {
                    Err(InvalidId)
                } else {
                    obj.data.user_data = data;
                    Ok(())
                }
            })
            .unwrap_or(Err(InvalidId))
    }

    fn send_error_event(&mut self, object_id: &ObjectId, error_code: u32, message: CString) {
        let display = self.display_id();
        let msg = message!(
            1,
            0, // wl_display.error
            [
                Argument::Object(object_id.id),
                Argument::Uint(error_code),
                Argument::Str(Some(Box::new(message))),
            ],
        );
        if self.debug {
            debug::print_send_message::<u32, RawFd>(
                display.interface.name,
                display.id,
                "error",
                &msg.args,
                false,
            );
        }
        if self.socket.write_message(&msg).is_err() {
            self.kill(DisconnectReason::ConnectionClosed);
        }
    }

    pub(crate) fn post_display_error(&mut self, code: DisplayError, message: CString) {
        self.post_error(self.display_id(), code as u32, message)
    }

    /// Send a fatal error and disconnect the client
    pub(crate) fn post_error(&mut self, object_id: ObjectId, error_code: u32, message: CString) {
        let converted_message = message.to_string_lossy().into();
        self.send_error_event(&object_id, error_code, message);
        // the client is going away, flush errors do not matter
        let _ = self.flush();
        self.kill(DisconnectReason::ProtocolError(ProtocolError {
            code: error_code,
            object_id: object_id.id,
            object_interface: object_id.interface.name.into(),
            message: converted_message,
        }));
    }

    /// Send an error about one object and kill that object only.
    ///
    /// The object keeps its protocol id until the client destroys it, but is
    /// dead for the server. Returns the destructor to run, `None` if the object
    /// was already dead.
    pub(crate) fn post_resource_error(
        &mut self,
        object_id: ObjectId,
        error_code: u32,
        message: CString,
    ) -> Option<PendingDestructor<D>> {
        let object = self.get_object(object_id.clone()).ok()?;
        self.send_error_event(&object_id, error_code, message);
        let _ = self.map.with(object_id.id, |obj| {
            obj.data.alive = false;
            obj.data.user_data = Arc::new(InertObjectData);
        });
        Some((object.data.user_data, self.id.clone(), object_id))
    }

    pub(crate) fn kill(&mut self, reason: DisconnectReason) {
        if !self.killed {
            self.killed = true;
            self.data.disconnected(self.id.clone(), reason);
        }
    }

    pub(crate) fn flush(&mut self) -> std::io::Result<()> {
        self.socket.flush()
    }

    pub(crate) fn all_objects(&self) -> impl Iterator<Item = ObjectId> + '_ {
        let client_id = self.id.clone();
        self.map.all_objects().filter(|(_, obj)| obj.data.alive).map(move |(id, obj)| ObjectId {
            id,
            client_id: client_id.clone(),
            interface: obj.interface,
            serial: obj.data.serial,
        })
    }

    /// Read the next request, reading from the socket when needed.
    ///
    /// `WouldBlock` means no complete request is pending. Any other error means
    /// the client was killed.
    #[allow(clippy::type_complexity)]
    pub(crate) fn next_request(&mut self) -> std::io::Result<(Message<u32, OwnedFd>, Object<Data<D>>)> {
        if self.killed {
            return Err(rustix::io::Errno::PIPE.into());
        }
        loop {
            let map = &self.map;
            let msg = match self.socket.read_one_message(|id, opcode| {
                map.find(id)
                    .and_then(|o| o.interface.requests.get(opcode as usize))
                    .map(|desc| desc.signature)
            }) {
                Ok(msg) => msg,
                Err(MessageParseError::MissingData) | Err(MessageParseError::MissingFD) => {
                    if let Err(e) = self.socket.fill_incoming_buffers() {
                        if e.kind() != std::io::ErrorKind::WouldBlock {
                            self.kill(DisconnectReason::ConnectionClosed);
                        }
                        return Err(e);
                    }
                    continue;
                }
                Err(MessageParseError::Malformed) => {
                    self.post_display_error(
                        DisplayError::InvalidMethod,
                        to_cstring("malformed request, or request on an unknown object"),
                    );
                    return Err(rustix::io::Errno::PROTO.into());
                }
            };

            // the signature lookup above succeeded, so the object and opcode exist
            let Some(obj) = self.map.find(msg.sender_id) else {
                return Err(rustix::io::Errno::PROTO.into());
            };

            if self.debug {
                if let Some(desc) = obj.interface.requests.get(msg.opcode as usize) {
                    debug::print_dispatched_message(obj.interface.name, msg.sender_id, desc.name, &msg.args);
                }
            }

            return Ok((msg, obj));
        }
    }

    fn get_object(&self, id: ObjectId) -> Result<Object<Data<D>>, InvalidId> {
        let object = self.map.find(id.id).ok_or(InvalidId)?;
        if object.data.serial != id.serial || !object.data.alive {
            return Err(InvalidId);
        }
        Ok(object)
    }

    pub(crate) fn object_for_protocol_id(&self, pid: u32) -> Result<ObjectId, InvalidId> {
        let object = self.map.find(pid).filter(|o| o.data.alive).ok_or(InvalidId)?;
        Ok(ObjectId {
            id: pid,
            client_id: self.id.clone(),
            serial: object.data.serial,
            interface: object.interface,
        })
    }

    fn queue_all_destructors(&mut self, pending_destructors: &mut Vec<PendingDestructor<D>>) {
        pending_destructors.extend(self.map.all_objects().filter(|(_, obj)| obj.data.alive).map(
            |(id, obj)| {
                (
                    obj.data.user_data.clone(),
                    self.id.clone(),
                    ObjectId {
                        id,
                        serial: obj.data.serial,
                        client_id: self.id.clone(),
                        interface: obj.interface,
                    },
                )
            },
        ));
    }

    fn insert_new_id(&mut self, new_id: u32, object: Object<Data<D>>) -> bool {
        if self.map.insert_at(new_id, object).is_err() {
            self.post_display_error(
                DisplayError::InvalidObject,
                to_cstring(format!("Invalid new_id: {new_id}.")),
            );
            return false;
        }
        true
    }

    pub(crate) fn handle_display_request(
        &mut self,
        message: Message<u32, OwnedFd>,
        registry: &mut Registry<D>,
    ) {
        match (message.opcode, &message.args[..]) {
            // wl_display.sync(new id wl_callback)
            (0, &[Argument::NewId(new_id)]) => {
                let serial = self.next_serial();
                let callback = Object {
                    interface: &WL_CALLBACK_INTERFACE,
                    version: 1,
                    data: Data { user_data: Arc::new(InertObjectData), serial, alive: true },
                };
                if !self.insert_new_id(new_id, callback) {
                    return;
                }
                let cb_id = ObjectId {
                    id: new_id,
                    client_id: self.id.clone(),
                    serial,
                    interface: &WL_CALLBACK_INTERFACE,
                };
                // wl_callback.done, the callback has no destructor worth running
                let _ = self.send_event(message!(cb_id, 0, [Argument::Uint(0)]), None);
            }
            // wl_display.get_registry(new id wl_registry)
            (1, &[Argument::NewId(new_id)]) => {
                let serial = self.next_serial();
                let registry_obj = Object {
                    interface: &WL_REGISTRY_INTERFACE,
                    version: 1,
                    data: Data { user_data: Arc::new(InertObjectData), serial, alive: true },
                };
                if !self.insert_new_id(new_id, registry_obj) {
                    return;
                }
                let registry_id = ObjectId {
                    id: new_id,
                    serial,
                    client_id: self.id.clone(),
                    interface: &WL_REGISTRY_INTERFACE,
                };
                let _ = registry.new_registry(registry_id, self);
            }
            _ => {
                self.post_display_error(
                    DisplayError::InvalidMethod,
                    to_cstring(format!("Unknown opcode {} for interface wl_display.", message.opcode)),
                );
            }
        }
    }

    #[allow(clippy::type_complexity)]
    pub(crate) fn handle_registry_request(
        &mut self,
        message: Message<u32, OwnedFd>,
        registry: &mut Registry<D>,
    ) -> Option<(GlobalId, ObjectId, Arc<dyn GlobalHandler<D>>)> {
        // wl_registry.bind(uint name, str interface, uint version, new id)
        let (0, [Argument::Uint(name), Argument::Str(Some(interface_name)), Argument::Uint(version), Argument::NewId(new_id)]) =
            (message.opcode, &message.args[..])
        else {
            self.post_display_error(
                DisplayError::InvalidMethod,
                to_cstring(format!("Unknown opcode {} for interface wl_registry.", message.opcode)),
            );
            return None;
        };
        let (name, version, new_id) = (*name, *version, *new_id);

        let Some((interface, global_id, handler)) =
            registry.check_bind(self, name, interface_name, version)
        else {
            self.post_display_error(
                DisplayError::InvalidObject,
                to_cstring(format!(
                    "Invalid binding of {} version {} for global {}.",
                    interface_name.to_string_lossy(),
                    version,
                    name
                )),
            );
            return None;
        };

        let serial = self.next_serial();
        let object = Object {
            interface,
            version,
            data: Data { serial, user_data: Arc::new(UninitObjectData), alive: true },
        };
        if !self.insert_new_id(new_id, object) {
            return None;
        }
        Some((
            global_id,
            ObjectId { id: new_id, client_id: self.id.clone(), interface, serial },
            handler,
        ))
    }

    /// Resolve the object arguments of a request and create its new object.
    ///
    /// Returns `None` if the client was killed for sending an invalid request.
    pub(crate) fn process_request(
        &mut self,
        object: &Object<Data<D>>,
        message: Message<u32, OwnedFd>,
    ) -> Option<(ArgSmallVec<OwnedFd>, bool, Option<ObjectId>)> {
        let message_desc = object.interface.requests.get(message.opcode as usize)?;
        let mut new_args = SmallVec::with_capacity(message.args.len());
        let mut arg_interfaces = message_desc.arg_interfaces.iter();
        let mut created_id = None;
        for (i, arg) in message.args.into_iter().enumerate() {
            new_args.push(match arg {
                Argument::Array(a) => Argument::Array(a),
                Argument::Int(i) => Argument::Int(i),
                Argument::Uint(u) => Argument::Uint(u),
                Argument::Str(s) => Argument::Str(s),
                Argument::Fixed(f) => Argument::Fixed(f),
                Argument::Fd(f) => Argument::Fd(f),
                Argument::Object(o) => {
                    let next_interface = arg_interfaces.next();
                    if o != 0 {
                        let Some(obj) = self.map.find(o) else {
                            self.post_display_error(
                                DisplayError::InvalidObject,
                                to_cstring(format!("Unknown id: {o}.")),
                            );
                            return None;
                        };
                        if let Some(next_interface) = next_interface {
                            if !same_interface_or_anonymous(next_interface, obj.interface) {
                                self.post_display_error(
                                    DisplayError::InvalidObject,
                                    to_cstring(format!(
                                        "Invalid object {} in request {}.{}: expected {} but got {}.",
                                        o,
                                        object.interface.name,
                                        message_desc.name,
                                        next_interface.name,
                                        obj.interface.name,
                                    )),
                                );
                                return None;
                            }
                        }
                        Argument::Object(ObjectId {
                            id: o,
                            client_id: self.id.clone(),
                            serial: obj.data.serial,
                            interface: obj.interface,
                        })
                    } else if matches!(message_desc.signature[i], ArgumentType::Object(AllowNull::Yes)) {
                        Argument::Object(ObjectId {
                            id: 0,
                            client_id: self.id.clone(),
                            serial: 0,
                            interface: &ANONYMOUS_INTERFACE,
                        })
                    } else {
                        self.post_display_error(
                            DisplayError::InvalidObject,
                            to_cstring(format!(
                                "Invalid null object in request {}.{}.",
                                object.interface.name, message_desc.name,
                            )),
                        );
                        return None;
                    }
                }
                Argument::NewId(new_id) => {
                    let Some(child_interface) = message_desc.child_interface else {
                        panic!(
                            "Request {}@{}.{} creates an object without specifying its interface.",
                            object.interface.name, message.sender_id, message_desc.name
                        );
                    };

                    let serial = self.next_serial();
                    let child_obj = Object {
                        interface: child_interface,
                        version: object.version,
                        data: Data { user_data: Arc::new(UninitObjectData), serial, alive: true },
                    };
                    let child_id =
                        ObjectId { id: new_id, client_id: self.id.clone(), serial, interface: child_interface };
                    if !self.insert_new_id(new_id, child_obj) {
                        return None;
                    }
                    created_id = Some(child_id.clone());
                    Argument::NewId(child_id)
                }
            });
        }
        Some((new_args, message_desc.is_destructor, created_id))
    }

    /// Give an object created by a failed request or a dead object inert data
    pub(crate) fn mark_dead(&mut self, id: &ObjectId) {
        let _ = self.map.with(id.id, |obj| {
            if obj.data.serial == id.serial {
                obj.data.alive = false;
                obj.data.user_data = Arc::new(InertObjectData);
            }
        });
    }

    /// Check that a request about to be dispatched is allowed by the object's version
    pub(crate) fn check_since(&mut self, object: &Object<Data<D>>, sender_id: u32, opcode: u16) -> bool {
        match object.interface.requests.get(opcode as usize) {
            Some(desc) if desc.since <= object.version => true,
            Some(desc) => {
                self.post_display_error(
                    DisplayError::InvalidMethod,
                    to_cstring(format!(
                        "Request {}@{}.{} requires version {}, object has version {}.",
                        object.interface.name, sender_id, desc.name, desc.since, object.version
                    )),
                );
                false
            }
            None => false,
        }
    }
}

impl<D> AsFd for Client<D> {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.socket.as_fd()
    }
}

#[derive(Debug)]
pub(crate) struct ClientStore<D: 'static> {
    clients: Vec<Option<Client<D>>>,
    last_serial: u32,
    debug: bool,
}

impl<D> ClientStore<D> {
    pub(crate) fn new(debug: bool) -> Self {
        Self { clients: Vec::new(), last_serial: 0, debug }
    }

    pub(crate) fn create_client(&mut self, stream: UnixStream, data: Arc<dyn ClientData>) -> ClientId {
        self.last_serial = self.last_serial.wrapping_add(1);
        let serial = self.last_serial;
        let idx = match self.clients.iter().position(Option::is_none) {
            Some(idx) => idx,
            None => {
                self.clients.push(None);
                self.clients.len() - 1
            }
        };

        let id = ClientId { id: idx as u32, serial };
        self.clients[idx] = Some(Client::new(stream, id.clone(), self.debug, data));
        id
    }

    pub(crate) fn get_client(&self, id: ClientId) -> Result<&Client<D>, InvalidId> {
        match self.clients.get(id.id as usize) {
            Some(Some(client)) if client.id == id => Ok(client),
            _ => Err(InvalidId),
        }
    }

    pub(crate) fn get_client_mut(&mut self, id: ClientId) -> Result<&mut Client<D>, InvalidId> {
        match self.clients.get_mut(id.id as usize) {
            Some(Some(client)) if client.id == id => Ok(client),
            _ => Err(InvalidId),
        }
    }

    /// Remove killed clients, queueing the destructors of all their objects
    pub(crate) fn cleanup(
        &mut self,
        pending_destructors: &mut Vec<PendingDestructor<D>>,
    ) -> SmallVec<[Client<D>; 1]> {
        let mut cleaned = SmallVec::new();
        for place in &mut self.clients {
            if !place.as_ref().is_some_and(|client| client.killed) {
                continue;
            }
            if let Some(mut client) = place.take() {
                client.queue_all_destructors(pending_destructors);
                let _ = client.flush();
                cleaned.push(client);
            }
        }
        cleaned
    }

    pub(crate) fn clients_mut(&mut self) -> impl Iterator<Item = &mut Client<D>> {
        self.clients.iter_mut().flat_map(|o| o.as_mut()).filter(|c| !c.killed)
    }

    pub(crate) fn all_clients_id(&self) -> impl Iterator<Item = ClientId> + '_ {
        self.clients.iter().flat_map(|opt| opt.as_ref().filter(|c| !c.killed).map(|c| c.id.clone()))
    }
}
