#![allow(dead_code)]

use std::{
    collections::HashMap,
    os::unix::{
        io::{OwnedFd, RawFd},
        net::UnixStream,
    },
    sync::Arc,
};

use crate::{
    core_interfaces::{WL_CALLBACK_INTERFACE, WL_DISPLAY_INTERFACE, WL_REGISTRY_INTERFACE},
    protocol::{AllowNull, Argument, ArgumentType, Interface, Message, MessageDesc},
    server::{
        Backend, BackendConfig, ClientData, ClientId, GlobalHandler, GlobalId, Handle, ObjectData,
        ObjectId, RequestError,
    },
    socket::{BufferedSocket, Socket},
    wire::MessageParseError,
};

mod destructors;
mod globals;

/// `test_thing`: `poke(uint)`, `fail(uint)`, `spawn(new_id)`, `destroy()`; event `poked(uint)`
pub(crate) static TEST_THING_INTERFACE: Interface = Interface {
    name: "test_thing",
    version: 2,
    requests: &[
        MessageDesc {
            name: "poke",
            signature: &[ArgumentType::Uint],
            since: 1,
            is_destructor: false,
            child_interface: None,
            arg_interfaces: &[],
        },
        MessageDesc {
            name: "fail",
            signature: &[ArgumentType::Uint],
            since: 1,
            is_destructor: false,
            child_interface: None,
            arg_interfaces: &[],
        },
        MessageDesc {
            name: "spawn",
            signature: &[ArgumentType::NewId],
            since: 1,
            is_destructor: false,
            child_interface: Some(&TEST_THING_INTERFACE),
            arg_interfaces: &[],
        },
        MessageDesc {
            name: "destroy",
            signature: &[],
            since: 1,
            is_destructor: true,
            child_interface: None,
            arg_interfaces: &[],
        },
        MessageDesc {
            name: "poke_v2",
            signature: &[ArgumentType::Str(AllowNull::No)],
            since: 2,
            is_destructor: false,
            child_interface: None,
            arg_interfaces: &[],
        },
    ],
    events: &[MessageDesc {
        name: "poked",
        signature: &[ArgumentType::Uint],
        since: 1,
        is_destructor: false,
        child_interface: None,
        arg_interfaces: &[],
    }],
};

#[derive(Debug, Default)]
pub(crate) struct TestState {
    pub(crate) pokes: Vec<(u32, u32)>,
    pub(crate) destroyed: Vec<u32>,
    pub(crate) binds: u32,
}

pub(crate) struct DoNothingData;

impl ClientData for DoNothingData {}

/// Data of `test_thing` objects
pub(crate) struct Thing;

impl ObjectData<TestState> for Thing {
    fn request(
        self: Arc<Self>,
        handle: &mut Handle<TestState>,
        state: &mut TestState,
        _: ClientId,
        msg: Message<ObjectId, OwnedFd>,
    ) -> Result<Option<Arc<dyn ObjectData<TestState>>>, RequestError> {
        match (msg.opcode, &msg.args[..]) {
            (0, &[Argument::Uint(value)]) => {
                state.pokes.push((msg.sender_id.protocol_id(), value));
                let _ = handle.send_event(message!(msg.sender_id.clone(), 0, [Argument::Uint(value)]));
                Ok(None)
            }
            (1, &[Argument::Uint(code)]) => Err(RequestError::new(code, "asked to fail")),
            (2, _) => Ok(Some(Arc::new(Thing))),
            (3, _) => Ok(None),
            _ => Ok(None),
        }
    }

    fn destroyed(
        self: Arc<Self>,
        _: &mut Handle<TestState>,
        state: &mut TestState,
        _: ClientId,
        object_id: ObjectId,
    ) {
        state.destroyed.push(object_id.protocol_id());
    }
}

impl GlobalHandler<TestState> for Thing {
    fn bind(
        self: Arc<Self>,
        _: &mut Handle<TestState>,
        state: &mut TestState,
        _: ClientId,
        _: GlobalId,
        _: ObjectId,
    ) -> Arc<dyn ObjectData<TestState>> {
        state.binds += 1;
        self
    }
}

/// A raw client speaking the wire format directly
pub(crate) struct TestClient {
    socket: BufferedSocket,
    objects: HashMap<u32, &'static Interface>,
    next_id: u32,
}

impl TestClient {
    pub(crate) fn connect(backend: &mut Backend<TestState>) -> (Self, ClientId) {
        let (server, client) = UnixStream::pair().unwrap();
        let id = backend.insert_client(server, Arc::new(DoNothingData)).unwrap();
        client.set_nonblocking(true).unwrap();
        let mut objects = HashMap::new();
        objects.insert(1, &WL_DISPLAY_INTERFACE);
        (Self { socket: BufferedSocket::new(Socket::from(client)), objects, next_id: 2 }, id)
    }

    pub(crate) fn new_id(&mut self, interface: &'static Interface) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        self.objects.insert(id, interface);
        id
    }

    pub(crate) fn send(&mut self, msg: Message<u32, RawFd>) {
        self.socket.write_message(&msg).unwrap();
        self.socket.flush().unwrap();
    }

    pub(crate) fn get_registry(&mut self) -> u32 {
        let registry = self.new_id(&WL_REGISTRY_INTERFACE);
        self.send(message!(1, 1, [Argument::NewId(registry)]));
        registry
    }

    pub(crate) fn sync(&mut self) -> u32 {
        let callback = self.new_id(&WL_CALLBACK_INTERFACE);
        self.send(message!(1, 0, [Argument::NewId(callback)]));
        callback
    }

    pub(crate) fn bind(
        &mut self,
        registry: u32,
        name: u32,
        interface: &'static Interface,
        version: u32,
    ) -> u32 {
        let id = self.new_id(interface);
        self.send(message!(
            registry,
            0,
            [
                Argument::Uint(name),
                Argument::Str(Some(Box::new(std::ffi::CString::new(interface.name).unwrap()))),
                Argument::Uint(version),
                Argument::NewId(id),
            ],
        ));
        id
    }

    /// Read every event the server has written so far
    pub(crate) fn events(&mut self) -> Vec<Message<u32, OwnedFd>> {
        let mut events = Vec::new();
        loop {
            let objects = &self.objects;
            match self.socket.read_one_message(|id, opcode| {
                objects.get(&id).and_then(|i| i.events.get(opcode as usize)).map(|d| d.signature)
            }) {
                Ok(msg) => events.push(msg),
                Err(MessageParseError::MissingData) | Err(MessageParseError::MissingFD) => {
                    if self.socket.fill_incoming_buffers().is_err() {
                        break;
                    }
                }
                Err(MessageParseError::Malformed) => panic!("malformed event"),
            }
        }
        events
    }

    /// Whether the server closed the connection
    pub(crate) fn is_closed(&mut self) -> bool {
        let _ = self.events();
        matches!(
            self.socket.fill_incoming_buffers(),
            Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe
        )
    }
}

/// A backend with a single `test_thing` global, version 2
pub(crate) fn backend_with_thing() -> (Backend<TestState>, GlobalId) {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut backend = Backend::new(BackendConfig::default());
    let global = backend.handle().create_global(&TEST_THING_INTERFACE, 2, Arc::new(Thing));
    (backend, global)
}

pub(crate) fn display_error(events: &[Message<u32, OwnedFd>]) -> Option<(u32, u32)> {
    events.iter().find(|e| e.sender_id == 1 && e.opcode == 0).map(|e| match &e.args[..] {
        &[Argument::Object(object), Argument::Uint(code), _] => (object, code),
        _ => panic!("bad wl_display.error"),
    })
}

pub(crate) fn deleted_ids(events: &[Message<u32, OwnedFd>]) -> Vec<u32> {
    events
        .iter()
        .filter(|e| e.sender_id == 1 && e.opcode == 1)
        .filter_map(|e| match e.args[..] {
            [Argument::Uint(id)] => Some(id),
            _ => None,
        })
        .collect()
}
