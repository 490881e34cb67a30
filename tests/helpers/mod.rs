// This module contains helpers functions and types that
// are not test in themselves, but are used by several tests.

#![allow(dead_code)]

use std::{
    cell::RefCell,
    collections::HashMap,
    ffi::CString,
    os::unix::{
        io::{OwnedFd, RawFd},
        net::UnixStream,
    },
    rc::Rc,
    sync::Arc,
};

use imbridge::{
    Config, Core, KeyEvent, KeyboardSink, ModifiersState, OutputRef, PanelHandle, PanelPlacement,
    PanelRecord, SurfaceRef,
};
use imbridge_backend::{
    core_interfaces::{WL_CALLBACK_INTERFACE, WL_DISPLAY_INTERFACE, WL_REGISTRY_INTERFACE},
    protocol::{Argument, ArgumentType, Interface, Message},
    server::{Backend, BackendConfig, ClientData, ClientId},
    socket::{BufferedSocket, Socket},
    wire::MessageParseError,
};
use imbridge_protocols::{
    core::{WL_COMPOSITOR_INTERFACE, WL_OUTPUT_INTERFACE, WL_SEAT_INTERFACE, WL_SURFACE_INTERFACE},
    input_method::{
        v1::{ZWP_INPUT_METHOD_V1_INTERFACE, ZWP_INPUT_PANEL_V1_INTERFACE},
        v2::ZWP_INPUT_METHOD_MANAGER_V2_INTERFACE,
    },
    text_input::{
        v1::ZWP_TEXT_INPUT_MANAGER_V1_INTERFACE, v2::ZWP_TEXT_INPUT_MANAGER_V2_INTERFACE,
        v3::ZWP_TEXT_INPUT_MANAGER_V3_INTERFACE,
    },
};

pub type Arg = Argument<u32, RawFd>;

struct NoData;

impl ClientData for NoData {}

/// The bridge with a backend, dispatched synchronously
pub struct TestServer {
    pub backend: Backend<Core>,
    pub core: Core,
}

impl TestServer {
    pub fn new() -> TestServer {
        TestServer::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> TestServer {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut backend = Backend::new(BackendConfig::default());
        let mut core = Core::new(config);
        core.register_globals(backend.handle());
        TestServer { backend, core }
    }

    /// Connect a client and read the globals it is offered
    pub fn add_client(&mut self) -> TestClient {
        let (server, client) = UnixStream::pair().unwrap();
        let id = self.backend.insert_client(server, Arc::new(NoData)).unwrap();
        client.set_nonblocking(true).unwrap();
        let mut objects = HashMap::new();
        objects.insert(1, &WL_DISPLAY_INTERFACE);
        let mut client = TestClient {
            id,
            socket: BufferedSocket::new(Socket::from(client)),
            objects,
            next_id: 2,
            registry: 0,
            globals: Vec::new(),
            compositor: None,
            seat: None,
        };
        client.registry = client.new_id(&WL_REGISTRY_INTERFACE);
        client.send(Message {
            sender_id: 1,
            opcode: 1,
            args: [Argument::NewId(client.registry)].into_iter().collect(),
        });
        self.roundtrip(&mut client);
        client
    }

    pub fn dispatch(&mut self) {
        self.backend.dispatch_all_clients(&mut self.core);
    }

    /// Dispatch the requests of every client, then read the events of one
    pub fn roundtrip(&mut self, client: &mut TestClient) -> Vec<Event> {
        self.dispatch();
        client.events()
    }

    /// Push the events the embedding API queued
    pub fn flush(&mut self) {
        self.backend.flush(None).unwrap();
    }

    pub fn surface(&mut self, client: &TestClient, id: u32) -> SurfaceRef {
        let object = self
            .backend
            .handle()
            .object_for_protocol_id(client.id.clone(), &WL_SURFACE_INTERFACE, id)
            .unwrap();
        SurfaceRef::new(object).unwrap()
    }

    pub fn output(&mut self, client: &TestClient, id: u32) -> OutputRef {
        let object = self
            .backend
            .handle()
            .object_for_protocol_id(client.id.clone(), &WL_OUTPUT_INTERFACE, id)
            .unwrap();
        OutputRef::new(object).unwrap()
    }

    /// Move the keyboard focus to a surface of `client`, or nowhere
    pub fn focus(&mut self, client: &TestClient, surface: Option<u32>) {
        let surface = surface.map(|id| self.surface(client, id));
        self.core.set_focused_surface(self.backend.handle(), surface).unwrap();
        self.flush();
    }
}

/// An event read by a [`TestClient`]
#[derive(Debug)]
pub struct Event {
    pub sender: u32,
    pub interface: &'static str,
    pub name: &'static str,
    pub args: Vec<Argument<u32, OwnedFd>>,
}

impl Event {
    pub fn uint(&self, index: usize) -> u32 {
        match self.args[index] {
            Argument::Uint(value) => value,
            ref other => panic!("argument {index} of {} is {other:?}", self.name),
        }
    }

    pub fn int(&self, index: usize) -> i32 {
        match self.args[index] {
            Argument::Int(value) => value,
            ref other => panic!("argument {index} of {} is {other:?}", self.name),
        }
    }

    pub fn string(&self, index: usize) -> Option<String> {
        match &self.args[index] {
            Argument::Str(value) => value.as_ref().map(|s| s.to_string_lossy().into_owned()),
            other => panic!("argument {index} of {} is {other:?}", self.name),
        }
    }

    pub fn object(&self, index: usize) -> u32 {
        match self.args[index] {
            Argument::Object(id) | Argument::NewId(id) => id,
            ref other => panic!("argument {index} of {} is {other:?}", self.name),
        }
    }

    pub fn array(&self, index: usize) -> &[u8] {
        match &self.args[index] {
            Argument::Array(bytes) => bytes,
            other => panic!("argument {index} of {} is {other:?}", self.name),
        }
    }

    pub fn fd(&self, index: usize) -> &OwnedFd {
        match &self.args[index] {
            Argument::Fd(fd) => fd,
            other => panic!("argument {index} of {} is {other:?}", self.name),
        }
    }
}

/// Names of the events `sender` received, in order
pub fn names(events: &[Event], sender: u32) -> Vec<&'static str> {
    events.iter().filter(|e| e.sender == sender).map(|e| e.name).collect()
}

/// The events named `name` that `sender` received
pub fn find<'a>(events: &'a [Event], sender: u32, name: &str) -> Vec<&'a Event> {
    events.iter().filter(|e| e.sender == sender && e.name == name).collect()
}

/// Object and code of the `wl_display.error` in `events`
pub fn display_error(events: &[Event]) -> Option<(u32, u32)> {
    events.iter().find(|e| e.sender == 1 && e.name == "error").map(|e| (e.object(0), e.uint(1)))
}

pub fn uint(value: u32) -> Arg {
    Argument::Uint(value)
}

pub fn int(value: i32) -> Arg {
    Argument::Int(value)
}

pub fn text(value: &str) -> Arg {
    Argument::Str(Some(Box::new(CString::new(value).unwrap())))
}

pub fn object(id: u32) -> Arg {
    Argument::Object(id)
}

pub fn array(bytes: &[u8]) -> Arg {
    Argument::Array(Box::new(bytes.to_vec()))
}

/// A client speaking the wire format directly
///
/// Requests and events are named as in the protocol descriptions, the client
/// tracks the interface of every object to encode and decode them.
pub struct TestClient {
    pub id: ClientId,
    socket: BufferedSocket,
    objects: HashMap<u32, &'static Interface>,
    next_id: u32,
    registry: u32,
    globals: Vec<(u32, String, u32)>,
    compositor: Option<u32>,
    seat: Option<u32>,
}

impl TestClient {
    fn new_id(&mut self, interface: &'static Interface) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        self.objects.insert(id, interface);
        id
    }

    fn send(&mut self, msg: Message<u32, RawFd>) {
        self.socket.write_message(&msg).unwrap();
        self.socket.flush().unwrap();
    }

    fn opcode(&self, object: u32, name: &str) -> u16 {
        let interface = self.objects.get(&object).unwrap_or_else(|| panic!("unknown object {object}"));
        let opcode = interface
            .requests
            .iter()
            .position(|desc| desc.name == name)
            .unwrap_or_else(|| panic!("{} has no request {name}", interface.name));
        opcode as u16
    }

    /// Send a request that creates no object
    pub fn request(&mut self, object: u32, name: &str, args: Vec<Arg>) {
        let opcode = self.opcode(object, name);
        self.send(Message { sender_id: object, opcode, args: args.into_iter().collect() });
    }

    /// Send a request creating an object, `args` leave out the new id
    pub fn create(&mut self, object: u32, name: &str, mut args: Vec<Arg>) -> u32 {
        let opcode = self.opcode(object, name);
        let desc = &self.objects[&object].requests[opcode as usize];
        let child = desc.child_interface.unwrap();
        let position =
            desc.signature.iter().position(|arg| matches!(arg, ArgumentType::NewId)).unwrap();
        let id = self.new_id(child);
        args.insert(position, Argument::NewId(id));
        self.send(Message { sender_id: object, opcode, args: args.into_iter().collect() });
        id
    }

    /// Bind the global implementing `interface`
    pub fn bind(&mut self, interface: &'static Interface, version: u32) -> u32 {
        let name = self
            .globals
            .iter()
            .find(|(_, global, _)| global == interface.name)
            .map(|(name, _, _)| *name)
            .unwrap_or_else(|| panic!("no {} global", interface.name));
        let id = self.new_id(interface);
        let registry = self.registry;
        self.send(Message {
            sender_id: registry,
            opcode: 0,
            args: [uint(name), text(interface.name), uint(version), Argument::NewId(id)]
                .into_iter()
                .collect(),
        });
        id
    }

    pub fn has_global(&self, interface: &Interface) -> bool {
        self.globals.iter().any(|(_, name, _)| name == interface.name)
    }

    pub fn sync(&mut self) -> u32 {
        let callback = self.new_id(&WL_CALLBACK_INTERFACE);
        self.send(Message {
            sender_id: 1,
            opcode: 0,
            args: [Argument::NewId(callback)].into_iter().collect(),
        });
        callback
    }

    pub fn seat(&mut self) -> u32 {
        match self.seat {
            Some(seat) => seat,
            None => {
                let seat = self.bind(&WL_SEAT_INTERFACE, 1);
                self.seat = Some(seat);
                seat
            }
        }
    }

    fn compositor(&mut self) -> u32 {
        match self.compositor {
            Some(compositor) => compositor,
            None => {
                let compositor = self.bind(&WL_COMPOSITOR_INTERFACE, 1);
                self.compositor = Some(compositor);
                compositor
            }
        }
    }

    pub fn surface(&mut self) -> u32 {
        let compositor = self.compositor();
        self.create(compositor, "create_surface", vec![])
    }

    /// A region, usable where any object is accepted
    pub fn region(&mut self) -> u32 {
        let compositor = self.compositor();
        self.create(compositor, "create_region", vec![])
    }

    /// Attach a stand-in buffer, or none, and commit
    pub fn map_surface(&mut self, surface: u32, mapped: bool) {
        let buffer = if mapped { self.region() } else { 0 };
        self.request(surface, "attach", vec![object(buffer), int(0), int(0)]);
        self.request(surface, "commit", vec![]);
    }

    pub fn text_input_v1(&mut self) -> u32 {
        let manager = self.bind(&ZWP_TEXT_INPUT_MANAGER_V1_INTERFACE, 1);
        self.create(manager, "create_text_input", vec![])
    }

    pub fn text_input_v2(&mut self) -> u32 {
        let seat = self.seat();
        let manager = self.bind(&ZWP_TEXT_INPUT_MANAGER_V2_INTERFACE, 1);
        self.create(manager, "get_text_input", vec![object(seat)])
    }

    pub fn text_input_v3(&mut self) -> u32 {
        let seat = self.seat();
        let manager = self.bind(&ZWP_TEXT_INPUT_MANAGER_V3_INTERFACE, 1);
        self.create(manager, "get_text_input", vec![object(seat)])
    }

    pub fn input_method_v1(&mut self) -> u32 {
        self.bind(&ZWP_INPUT_METHOD_V1_INTERFACE, 1)
    }

    pub fn input_panel_v1(&mut self) -> u32 {
        self.bind(&ZWP_INPUT_PANEL_V1_INTERFACE, 1)
    }

    pub fn input_method_v2(&mut self) -> u32 {
        let seat = self.seat();
        let manager = self.bind(&ZWP_INPUT_METHOD_MANAGER_V2_INTERFACE, 1);
        self.create(manager, "get_input_method", vec![object(seat)])
    }

    /// Read every event the server has written so far
    pub fn events(&mut self) -> Vec<Event> {
        let mut events = Vec::new();
        loop {
            let objects = &self.objects;
            let msg = match self.socket.read_one_message(|id, opcode| {
                objects.get(&id).and_then(|i| i.events.get(opcode as usize)).map(|d| d.signature)
            }) {
                Ok(msg) => msg,
                Err(MessageParseError::MissingData) | Err(MessageParseError::MissingFD) => {
                    if self.socket.fill_incoming_buffers().is_err() {
                        break;
                    }
                    continue;
                }
                Err(MessageParseError::Malformed) => panic!("malformed event"),
            };
            let interface = self.objects[&msg.sender_id];
            let desc = &interface.events[msg.opcode as usize];
            let event = Event {
                sender: msg.sender_id,
                interface: interface.name,
                name: desc.name,
                args: msg.args.into_iter().collect(),
            };
            // objects created by the server
            for arg in &event.args {
                if let (Argument::NewId(id), Some(child)) = (arg, desc.child_interface) {
                    self.objects.insert(*id, child);
                }
            }
            match (event.interface, event.name) {
                ("wl_registry", "global") => {
                    let name = event.string(1).unwrap();
                    self.globals.push((event.uint(0), name, event.uint(2)));
                }
                ("wl_display", "delete_id") => {
                    self.objects.remove(&event.uint(0));
                }
                _ => {}
            }
            events.push(event);
        }
        events
    }

    /// Whether the server closed the connection
    pub fn is_closed(&mut self) -> bool {
        let _ = self.events();
        matches!(
            self.socket.fill_incoming_buffers(),
            Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe
        )
    }
}

/// A client with a v3 text input enabled on its focused surface
///
/// Returns the client, its surface and its text input, with every event read.
pub fn enabled_v3(server: &mut TestServer) -> (TestClient, u32, u32) {
    let mut app = server.add_client();
    let surface = app.surface();
    let text_input = app.text_input_v3();
    server.roundtrip(&mut app);
    server.focus(&app, Some(surface));
    app.request(text_input, "enable", vec![]);
    app.request(text_input, "commit", vec![]);
    server.roundtrip(&mut app);
    (app, surface, text_input)
}

/// What a [`Placement`] was told
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placed {
    Registered(PanelRecord),
    Updated(PanelRecord),
    Unregistered(PanelHandle),
}

/// Panel placement recording its calls
#[derive(Debug, Clone, Default)]
pub struct Placement(pub Rc<RefCell<Vec<Placed>>>);

impl Placement {
    pub fn take(&self) -> Vec<Placed> {
        std::mem::take(&mut *self.0.borrow_mut())
    }
}

impl PanelPlacement for Placement {
    fn panel_registered(&mut self, record: &PanelRecord) {
        self.0.borrow_mut().push(Placed::Registered(record.clone()));
    }

    fn panel_updated(&mut self, record: &PanelRecord) {
        self.0.borrow_mut().push(Placed::Updated(record.clone()));
    }

    fn panel_unregistered(&mut self, handle: PanelHandle) {
        self.0.borrow_mut().push(Placed::Unregistered(handle));
    }
}

/// Keyboard sink recording what the input method sends
#[derive(Debug, Clone, Default)]
pub struct Keyboard {
    pub keys: Rc<RefCell<Vec<KeyEvent>>>,
    pub modifiers: Rc<RefCell<Vec<ModifiersState>>>,
}

impl KeyboardSink for Keyboard {
    fn key(&mut self, event: KeyEvent) {
        self.keys.borrow_mut().push(event);
    }

    fn modifiers(&mut self, modifiers: ModifiersState) {
        self.modifiers.borrow_mut().push(modifiers);
    }
}
