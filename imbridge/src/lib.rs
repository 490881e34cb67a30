//! Text-input and input-method bridge for Wayland compositors
//!
//! This crate links the text fields of Wayland clients to an input method,
//! usually an on-screen keyboard or an IME process. It implements the server
//! side of:
//!
//! - `zwp_text_input_v1`, `zwp_text_input_v2` and `zwp_text_input_v3`, spoken
//!   by text clients
//! - `zwp_input_method_v1` with `zwp_input_panel_v1`, and
//!   `zwp_input_method_v2`, spoken by the input method
//!
//! and translates between them: any text-input version works with either
//! input-method version.
//!
//! ## Usage
//!
//! All the state lives in a [`Core`], which must be reachable from the dispatch
//! state of the [`Backend`](imbridge_backend::server::Backend) through
//! [`AsMut<Core>`]. The compositor advertises the globals with
//! [`Core::register_globals`] and drives the bridge with the focus and
//! keyboard methods of [`Core`]:
//!
//! ```no_run
//! use imbridge::{Config, Core};
//! use imbridge_backend::server::{Backend, BackendConfig};
//!
//! let mut backend = Backend::new(BackendConfig::from_env());
//! let mut core = Core::new(Config::default());
//! core.register_globals(backend.handle());
//! // for each client: backend.insert_client(stream, data)
//! loop {
//!     backend.dispatch_all_clients(&mut core);
//!     // core.set_focused_surface(backend.handle(), surface) when focus changes
//! }
//! ```
//!
//! Placement of the input method panels, translation of surface coordinates
//! and delivery of the keys the input method sends are left to the compositor,
//! through the [`PanelPlacement`], [`SurfaceGeometry`] and [`KeyboardSink`]
//! traits.
//!
//! ## Logging
//!
//! Bridge state transitions and dropped messages are logged through the `log`
//! crate at the `debug` level, protocol errors at the `warn` level.

#![warn(missing_docs, missing_debug_implementations)]

use std::{collections::HashMap, fmt, os::unix::io::RawFd, sync::Arc};

use imbridge_backend::{
    protocol::{Interface, Message},
    server::{GlobalHandler, GlobalId, Handle, ObjectId},
};
use imbridge_protocols::{
    core::{WL_COMPOSITOR_INTERFACE, WL_OUTPUT_INTERFACE, WL_SEAT_INTERFACE},
    input_method::{
        v1::{ZWP_INPUT_METHOD_V1_INTERFACE, ZWP_INPUT_PANEL_V1_INTERFACE},
        v2::ZWP_INPUT_METHOD_MANAGER_V2_INTERFACE,
    },
    text_input::{
        v1::ZWP_TEXT_INPUT_MANAGER_V1_INTERFACE, v2::ZWP_TEXT_INPUT_MANAGER_V2_INTERFACE,
        v3::ZWP_TEXT_INPUT_MANAGER_V3_INTERFACE,
    },
    DispatchError,
};

mod arena;
mod bridge;
mod compositor;
mod config;
mod error;
mod input_method;
mod panel;
mod state;
mod text_input;

pub use arena::Key;
pub use bridge::{BridgeState, InputPanelState};
pub use compositor::{KeyboardSink, OutputRef, SurfaceGeometry, SurfaceRef};
pub use config::{Config, Keymap, RepeatInfo};
pub use error::{Error, InputMethodError, InputPanelError, SurroundingTextError, TextInputError};
pub use input_method::{
    grab::{KeyEvent, KeyRouting, KeyState, ModifiersState},
    InputMethod, InputMethodId, InputMethodVersion, Preedit, PreeditStyling, Reply,
};
pub use panel::{PanelHandle, PanelPlacement, PanelPosition, PanelRecord, PanelRole};
pub use state::{ChangeCause, ContentHints, ContentPurpose, Rect, StateChanges, TextInputState};
pub use text_input::{TextInput, TextInputId, TextInputLike, TextInputVersion};

use arena::Arena;
use bridge::Bridge;
use compositor::SurfaceState;
use panel::Panel;
use state::PurposeMapper;

/// `wl_display.error.invalid_method`
const INVALID_METHOD: u32 = 1;

/// The bridge: every text input, the input method, the panels, and the focus
///
/// Handlers of the bridge objects reach it through the dispatch state, which
/// must implement `AsMut<Core>`.
pub struct Core {
    pub(crate) config: Config,
    pub(crate) text_inputs: Arena<TextInput>,
    pub(crate) input_methods: Arena<InputMethod>,
    pub(crate) panels: Arena<Panel>,
    pub(crate) surfaces: HashMap<SurfaceRef, SurfaceState>,
    pub(crate) bridge: Bridge,
    pub(crate) purposes: PurposeMapper,
    pub(crate) placement: Box<dyn PanelPlacement>,
    pub(crate) geometry: Box<dyn SurfaceGeometry>,
    pub(crate) keyboard: Box<dyn KeyboardSink>,
    globals: Vec<GlobalId>,
    next_seq: u64,
}

impl fmt::Debug for Core {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Core")
            .field("config", &self.config)
            .field("text_inputs", &self.text_inputs.len())
            .field("bridge", &self.bridge)
            .field("panels", &self.panels.len())
            .finish_non_exhaustive()
    }
}

impl AsMut<Core> for Core {
    fn as_mut(&mut self) -> &mut Core {
        self
    }
}

impl Core {
    /// A bridge with no clients, and collaborators that do nothing
    pub fn new(config: Config) -> Self {
        Self {
            config,
            text_inputs: Arena::new(),
            input_methods: Arena::new(),
            panels: Arena::new(),
            surfaces: HashMap::new(),
            bridge: Bridge::default(),
            purposes: PurposeMapper::default(),
            placement: Box::new(()),
            geometry: Box::new(()),
            keyboard: Box::new(()),
            globals: Vec::new(),
            next_seq: 0,
        }
    }

    /// Receive the panel records
    pub fn set_panel_placement(&mut self, placement: impl PanelPlacement + 'static) {
        self.placement = Box::new(placement);
    }

    /// Translate surface-local rectangles to global coordinates
    pub fn set_surface_geometry(&mut self, geometry: impl SurfaceGeometry + 'static) {
        self.geometry = Box::new(geometry);
    }

    /// Receive the keys the input method sends to the focused client
    pub fn set_keyboard_sink(&mut self, keyboard: impl KeyboardSink + 'static) {
        self.keyboard = Box::new(keyboard);
    }

    /// The settings the bridge was created with
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Globals created by [`register_globals`](Core::register_globals)
    pub fn globals(&self) -> &[GlobalId] {
        &self.globals
    }

    /// A text input, if it still exists
    pub fn text_input(&self, id: TextInputId) -> Option<&TextInput> {
        self.text_inputs.get(id)
    }

    /// All text inputs
    pub fn text_inputs(&self) -> impl Iterator<Item = (TextInputId, &TextInput)> {
        self.text_inputs.iter()
    }

    /// Advertise the globals enabled in the [`Config`]
    pub fn register_globals<D: AsMut<Core> + 'static>(&mut self, handle: &mut Handle<D>) {
        let mut globals = Vec::new();
        let mut add = |interface: &'static Interface,
                       version: Option<u32>,
                       handler: Arc<dyn GlobalHandler<D>>| {
            let Some(version) = version else { return };
            let version = version.clamp(1, interface.version);
            log::debug!("Advertising {} v{}", interface.name, version);
            globals.push(handle.create_global(interface, version, handler));
        };
        let config = &self.config;
        if config.core_globals {
            add(&WL_COMPOSITOR_INTERFACE, Some(1), Arc::new(compositor::CompositorGlobal));
            add(
                &WL_SEAT_INTERFACE,
                Some(WL_SEAT_INTERFACE.version),
                Arc::new(compositor::SeatGlobal { name: config.seat_name.clone() }),
            );
            add(&WL_OUTPUT_INTERFACE, Some(1), Arc::new(compositor::OutputGlobal));
        }
        add(
            &ZWP_TEXT_INPUT_MANAGER_V1_INTERFACE,
            config.text_input_v1,
            Arc::new(text_input::v1::ManagerGlobal),
        );
        add(
            &ZWP_TEXT_INPUT_MANAGER_V2_INTERFACE,
            config.text_input_v2,
            Arc::new(text_input::v2::ManagerGlobal),
        );
        add(
            &ZWP_TEXT_INPUT_MANAGER_V3_INTERFACE,
            config.text_input_v3,
            Arc::new(text_input::v3::ManagerGlobal),
        );
        add(
            &ZWP_INPUT_METHOD_V1_INTERFACE,
            config.input_method_v1,
            Arc::new(input_method::v1::InputMethodGlobal),
        );
        add(&ZWP_INPUT_PANEL_V1_INTERFACE, config.input_panel_v1, Arc::new(panel::InputPanelGlobal));
        add(
            &ZWP_INPUT_METHOD_MANAGER_V2_INTERFACE,
            config.input_method_v2,
            Arc::new(input_method::v2::ManagerGlobal),
        );
        self.globals.extend(globals);
    }

    pub(crate) fn next_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }
}

/// Send an event, dropping it if its object is gone
pub(crate) fn post_event<D>(handle: &mut Handle<D>, msg: Message<ObjectId, RawFd>) {
    let _ = handle.send_event(msg);
}

/// A request did not match its description: disconnect the client
pub(crate) fn bad_message<D>(handle: &mut Handle<D>, err: DispatchError) {
    let DispatchError::BadMessage { sender_id, interface, opcode } = err;
    handle.post_error(
        sender_id,
        INVALID_METHOD,
        format!("invalid arguments for opcode {opcode} of {interface}"),
    );
}
