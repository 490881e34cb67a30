//! The compositor objects the bridge relies on
//!
//! Surfaces, the seat and outputs are owned by the compositor. The bridge only
//! needs to name them and to know when surfaces are mapped or destroyed, so
//! this module provides a minimal server side of `wl_compositor`, `wl_surface`,
//! `wl_seat` and `wl_output`, and the traits through which the compositor
//! provides what the bridge cannot know.

use std::{os::unix::io::OwnedFd, sync::Arc};

use imbridge_backend::{
    protocol::{same_interface, Argument, Message},
    server::{
        ClientId, GlobalHandler, GlobalId, Handle, ObjectData, ObjectId, RequestError,
    },
};
use imbridge_protocols::core::{
    wl_compositor, wl_output, wl_seat, wl_surface, WL_OUTPUT_INTERFACE, WL_SURFACE_INTERFACE,
};

use crate::{
    bad_message,
    input_method::grab::{KeyEvent, ModifiersState},
    post_event,
    state::Rect,
    Core, Error,
};

/// A `wl_surface` of some client
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SurfaceRef(ObjectId);

impl SurfaceRef {
    /// Wrap a `wl_surface` object id
    pub fn new(id: ObjectId) -> Result<Self, Error> {
        if same_interface(id.interface(), &WL_SURFACE_INTERFACE) {
            Ok(Self(id))
        } else {
            Err(Error::WrongInterface { object: id, expected: WL_SURFACE_INTERFACE.name })
        }
    }

    /// The object id of the surface
    pub fn id(&self) -> &ObjectId {
        &self.0
    }

    /// The client owning the surface
    pub fn client_of(&self) -> ClientId {
        self.0.client_id()
    }

    /// Whether the surface was not destroyed yet
    pub fn is_alive<D>(&self, handle: &Handle<D>) -> bool {
        handle.object_info(self.0.clone()).is_ok()
    }

    pub(crate) fn same_client_as(&self, id: &ObjectId) -> bool {
        self.0.same_client_as(id)
    }
}

/// A `wl_output` of some client
///
/// Every client binds outputs separately, the compositor maps them to its own
/// notion of output.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OutputRef(ObjectId);

impl OutputRef {
    /// Wrap a `wl_output` object id
    pub fn new(id: ObjectId) -> Result<Self, Error> {
        if same_interface(id.interface(), &WL_OUTPUT_INTERFACE) {
            Ok(Self(id))
        } else {
            Err(Error::WrongInterface { object: id, expected: WL_OUTPUT_INTERFACE.name })
        }
    }

    /// The object id of the output
    pub fn id(&self) -> &ObjectId {
        &self.0
    }

    /// The client that bound the output
    pub fn client_of(&self) -> ClientId {
        self.0.client_id()
    }

    /// Whether the output object was not destroyed yet
    pub fn is_alive<D>(&self, handle: &Handle<D>) -> bool {
        handle.object_info(self.0.clone()).is_ok()
    }
}

/// Where surfaces are on screen
///
/// The unit implementation considers surface-local and global coordinates to
/// be the same.
pub trait SurfaceGeometry {
    /// Translate a rectangle local to `surface` into global coordinates.
    ///
    /// Returns `None` if the surface is not on screen.
    fn to_global(&self, surface: &SurfaceRef, rect: Rect) -> Option<Rect>;
}

impl SurfaceGeometry for () {
    fn to_global(&self, _surface: &SurfaceRef, rect: Rect) -> Option<Rect> {
        Some(rect)
    }
}

/// Receives the keyboard input an input method v1 sends back
///
/// The compositor forwards it to the focused client like keys of a real
/// keyboard. The unit implementation drops everything.
pub trait KeyboardSink {
    /// A key the input method did not consume, or generated
    fn key(&mut self, event: KeyEvent);

    /// Modifiers the input method wants the focused client to see
    fn modifiers(&mut self, modifiers: ModifiersState);
}

impl KeyboardSink for () {
    fn key(&mut self, _event: KeyEvent) {}

    fn modifiers(&mut self, _modifiers: ModifiersState) {}
}

/// Map state of a surface
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct SurfaceState {
    /// buffer attached since the last commit: `Some(true)` for a buffer, `Some(false)` for null
    pending_buffer: Option<bool>,
    pub(crate) mapped: bool,
}

impl Core {
    fn surface_committed(&mut self, surface: &SurfaceRef) {
        let Some(state) = self.surfaces.get_mut(surface) else { return };
        let Some(has_buffer) = state.pending_buffer.take() else { return };
        if state.mapped != has_buffer {
            state.mapped = has_buffer;
            log::debug!("{} {}", surface.id(), if has_buffer { "mapped" } else { "unmapped" });
            self.panel_surface_mapped(surface, has_buffer);
        }
    }

    fn surface_destroyed<D: AsMut<Core> + 'static>(
        &mut self,
        handle: &mut Handle<D>,
        surface: &SurfaceRef,
    ) {
        self.surfaces.remove(surface);
        if self.bridge.focused.as_ref() == Some(surface) {
            log::debug!("Focused surface {} destroyed", surface.id());
            self.change_focus(handle, None);
        }
        self.forget_surface(surface);
    }

    pub(crate) fn surface_mapped(&self, surface: &SurfaceRef) -> bool {
        self.surfaces.get(surface).map_or(false, |state| state.mapped)
    }
}

/// Data of objects with no behavior of their own
#[derive(Debug)]
pub(crate) struct Inert;

impl<D: 'static> ObjectData<D> for Inert {
    fn request(
        self: Arc<Self>,
        _: &mut Handle<D>,
        _: &mut D,
        _: ClientId,
        msg: Message<ObjectId, OwnedFd>,
    ) -> Result<Option<Arc<dyn ObjectData<D>>>, RequestError> {
        // objects created through an inert object are inert too
        let creates = msg.args.iter().any(|arg| matches!(arg, Argument::NewId(_)));
        Ok(creates.then(|| Arc::new(Inert) as Arc<dyn ObjectData<D>>))
    }

    fn destroyed(self: Arc<Self>, _: &mut Handle<D>, _: &mut D, _: ClientId, _: ObjectId) {}
}

pub(crate) struct CompositorGlobal;

impl<D: AsMut<Core> + 'static> GlobalHandler<D> for CompositorGlobal {
    fn bind(
        self: Arc<Self>,
        _: &mut Handle<D>,
        _: &mut D,
        _: ClientId,
        _: GlobalId,
        _: ObjectId,
    ) -> Arc<dyn ObjectData<D>> {
        Arc::new(CompositorData)
    }
}

struct CompositorData;

impl<D: AsMut<Core> + 'static> ObjectData<D> for CompositorData {
    fn request(
        self: Arc<Self>,
        handle: &mut Handle<D>,
        data: &mut D,
        _: ClientId,
        msg: Message<ObjectId, OwnedFd>,
    ) -> Result<Option<Arc<dyn ObjectData<D>>>, RequestError> {
        let request = match wl_compositor::Request::parse(msg) {
            Ok(request) => request,
            Err(err) => {
                bad_message(handle, err);
                return Ok(None);
            }
        };
        match request {
            wl_compositor::Request::CreateSurface { id } => {
                data.as_mut().surfaces.insert(SurfaceRef(id), SurfaceState::default());
                Ok(Some(Arc::new(SurfaceData)))
            }
            wl_compositor::Request::CreateRegion { .. } => Ok(Some(Arc::new(Inert))),
        }
    }

    fn destroyed(self: Arc<Self>, _: &mut Handle<D>, _: &mut D, _: ClientId, _: ObjectId) {}
}

struct SurfaceData;

impl<D: AsMut<Core> + 'static> ObjectData<D> for SurfaceData {
    fn request(
        self: Arc<Self>,
        handle: &mut Handle<D>,
        data: &mut D,
        _: ClientId,
        msg: Message<ObjectId, OwnedFd>,
    ) -> Result<Option<Arc<dyn ObjectData<D>>>, RequestError> {
        let surface = SurfaceRef(msg.sender_id.clone());
        let request = match wl_surface::Request::parse(msg) {
            Ok(request) => request,
            Err(err) => {
                bad_message(handle, err);
                return Ok(None);
            }
        };
        let core = data.as_mut();
        match request {
            wl_surface::Request::Attach { buffer, .. } => {
                if let Some(state) = core.surfaces.get_mut(&surface) {
                    state.pending_buffer = Some(buffer.is_some());
                }
            }
            wl_surface::Request::Commit => core.surface_committed(&surface),
            wl_surface::Request::Frame { .. } => return Ok(Some(Arc::new(Inert))),
            wl_surface::Request::Destroy
            | wl_surface::Request::Damage { .. }
            | wl_surface::Request::SetOpaqueRegion { .. }
            | wl_surface::Request::SetInputRegion { .. } => {}
        }
        Ok(None)
    }

    fn destroyed(
        self: Arc<Self>,
        handle: &mut Handle<D>,
        data: &mut D,
        _: ClientId,
        object_id: ObjectId,
    ) {
        data.as_mut().surface_destroyed(handle, &SurfaceRef(object_id));
    }
}

pub(crate) struct SeatGlobal {
    pub(crate) name: String,
}

impl<D: AsMut<Core> + 'static> GlobalHandler<D> for SeatGlobal {
    fn bind(
        self: Arc<Self>,
        handle: &mut Handle<D>,
        _: &mut D,
        _: ClientId,
        _: GlobalId,
        object_id: ObjectId,
    ) -> Arc<dyn ObjectData<D>> {
        let version = handle.object_info(object_id.clone()).map_or(1, |info| info.version);
        post_event(
            handle,
            wl_seat::Event::Capabilities { capabilities: wl_seat::Capability::Keyboard }
                .into_message(object_id.clone()),
        );
        if version >= wl_seat::EVT_NAME_SINCE {
            post_event(handle, wl_seat::Event::Name { name: self.name.clone() }.into_message(object_id));
        }
        Arc::new(Inert)
    }
}

pub(crate) struct OutputGlobal;

impl<D: AsMut<Core> + 'static> GlobalHandler<D> for OutputGlobal {
    fn bind(
        self: Arc<Self>,
        handle: &mut Handle<D>,
        _: &mut D,
        _: ClientId,
        _: GlobalId,
        object_id: ObjectId,
    ) -> Arc<dyn ObjectData<D>> {
        // geometry and modes belong to the compositor, only the object is needed here
        post_event(
            handle,
            wl_output::Event::Geometry {
                x: 0,
                y: 0,
                physical_width: 0,
                physical_height: 0,
                subpixel: 0,
                make: "unknown".into(),
                model: "unknown".into(),
                transform: 0,
            }
            .into_message(object_id.clone()),
        );
        post_event(
            handle,
            wl_output::Event::Mode { flags: 0x1, width: 0, height: 0, refresh: 0 }
                .into_message(object_id),
        );
        Arc::new(Inert)
    }
}
