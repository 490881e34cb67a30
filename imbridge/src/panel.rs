//! Input panel surfaces
//!
//! The input method shows its UI in surfaces of its own, promoted to panels
//! through `zwp_input_panel_v1` or `zwp_input_method_v2.get_input_popup_surface`.
//! The bridge does not move them: it describes each panel in a
//! [`PanelRecord`] and hands the records to the compositor's
//! [`PanelPlacement`] whenever they change.

use std::{os::unix::io::OwnedFd, sync::Arc};

use imbridge_backend::{
    protocol::{Message, WEnum},
    server::{ClientId, GlobalHandler, GlobalId, Handle, ObjectData, ObjectId, RequestError},
};
use imbridge_protocols::input_method::{
    v1::{zwp_input_panel_surface_v1, zwp_input_panel_v1},
    v2::zwp_input_popup_surface_v2,
};

use crate::{
    arena::Key,
    bad_message,
    compositor::{OutputRef, SurfaceRef},
    error::{InputMethodError, InputPanelError},
    input_method::InputMethodId,
    post_event,
    state::Rect,
    text_input::TextInputLike,
    Core,
};

/// Key of a panel
pub type PanelHandle = Key<Panel>;

/// Where a top-level panel goes on its output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelPosition {
    /// centered at the bottom
    CenterBottom,
}

/// How a panel is placed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelRole {
    /// next to the cursor of the active text input
    Overlay,
    /// a keyboard on an output
    TopLevel {
        /// the output
        output: OutputRef,
        /// where on the output
        position: PanelPosition,
    },
}

/// What the compositor needs to place a panel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelRecord {
    /// the panel
    pub handle: PanelHandle,
    /// the surface to place
    pub surface: SurfaceRef,
    /// how to place it
    pub role: PanelRole,
    /// cursor rectangle of the active text input in global coordinates, for
    /// overlays while a text input is active and on screen
    pub anchor: Option<Rect>,
    /// output of a top-level panel, or the focused output for overlays
    pub output: Option<OutputRef>,
    /// whether the surface has a buffer
    pub mapped: bool,
}

/// Receives the panel records
///
/// Every method does nothing by default.
pub trait PanelPlacement {
    /// A surface got a panel role
    fn panel_registered(&mut self, record: &PanelRecord) {
        let _ = record;
    }

    /// A panel moved, was mapped or unmapped, or changed role
    fn panel_updated(&mut self, record: &PanelRecord) {
        let _ = record;
    }

    /// The panel is gone
    fn panel_unregistered(&mut self, handle: PanelHandle) {
        let _ = handle;
    }
}

impl PanelPlacement for () {}

/// A surface promoted to a panel
#[derive(Debug)]
pub struct Panel {
    pub(crate) surface: SurfaceRef,
    /// `zwp_input_panel_surface_v1` or `zwp_input_popup_surface_v2`
    pub(crate) object: ObjectId,
    /// `None` until a v1 panel surface picks a role
    pub(crate) role: Option<PanelRole>,
    /// input method of a popup
    pub(crate) owner: Option<InputMethodId>,
    /// record last handed to the placement
    pub(crate) published: Option<PanelRecord>,
    /// rectangle last sent to a popup
    pub(crate) popup_rect: Option<Rect>,
}

impl Core {
    /// Records of the panels handed to the placement
    pub fn panels(&self) -> impl Iterator<Item = &PanelRecord> {
        self.panels.iter().filter_map(|(_, panel)| panel.published.as_ref())
    }

    fn add_panel(
        &mut self,
        surface: SurfaceRef,
        object: ObjectId,
        role: Option<PanelRole>,
        owner: Option<InputMethodId>,
    ) -> Result<PanelHandle, SurfaceRef> {
        if self.panels.iter().any(|(_, panel)| panel.surface == surface) {
            return Err(surface);
        }
        log::debug!("{} is a panel surface through {}", surface.id(), object);
        Ok(self.panels.insert(Panel {
            surface,
            object,
            role,
            owner,
            published: None,
            popup_rect: None,
        }))
    }

    /// `zwp_input_method_v2.get_input_popup_surface`
    pub(crate) fn create_popup<D>(
        &mut self,
        handle: &mut Handle<D>,
        im: InputMethodId,
        object: ObjectId,
        surface: ObjectId,
    ) -> Result<PanelHandle, RequestError> {
        let roles_error = |surface: &ObjectId| {
            RequestError::new(InputMethodError::Role.into(), format!("{surface} already has a role"))
        };
        let surface = SurfaceRef::new(surface.clone()).map_err(|_| roles_error(&surface))?;
        let key = self
            .add_panel(surface, object, Some(PanelRole::Overlay), Some(im))
            .map_err(|surface| roles_error(surface.id()))?;
        self.publish_panel(key);
        self.update_popups(handle);
        Ok(key)
    }

    fn set_panel_role(&mut self, key: PanelHandle, role: PanelRole) {
        let Some(panel) = self.panels.get_mut(key) else { return };
        log::debug!("{} is now {:?}", panel.object, role);
        panel.role = Some(role);
        self.publish_panel(key);
    }

    pub(crate) fn panel_destroyed(&mut self, key: PanelHandle) {
        if let Some(panel) = self.panels.remove(key) {
            log::debug!("Panel {} destroyed", panel.object);
            if panel.published.is_some() {
                self.placement.panel_unregistered(key);
            }
        }
    }

    pub(crate) fn panel_surface_mapped(&mut self, surface: &SurfaceRef, mapped: bool) {
        let keys = self.panels.keys_where(|panel| &panel.surface == surface);
        for key in keys {
            log::debug!("Panel {} {}", surface.id(), if mapped { "mapped" } else { "unmapped" });
            self.publish_panel(key);
        }
    }

    /// The surface was destroyed: text inputs stop referring to it and its
    /// panels are removed
    pub(crate) fn forget_surface(&mut self, surface: &SurfaceRef) {
        for (_, text_input) in self.text_inputs.iter_mut() {
            text_input.forget_surface(surface);
        }
        for key in self.panels.keys_where(|panel| &panel.surface == surface) {
            self.panel_destroyed(key);
        }
    }

    /// The input method is gone, and its popups with it
    pub(crate) fn forget_popups(&mut self, im: InputMethodId) {
        for key in self.panels.keys_where(|panel| panel.owner == Some(im)) {
            self.panel_destroyed(key);
        }
    }

    /// Publish the panels again and tell popups where the cursor is, after
    /// the active text input, its cursor rectangle or the focused output changed
    pub(crate) fn update_panels<D>(&mut self, handle: &mut Handle<D>) {
        for key in self.panels.keys_where(|_| true) {
            self.publish_panel(key);
        }
        self.update_popups(handle);
    }

    fn update_popups<D>(&mut self, handle: &mut Handle<D>) {
        let Some(rect) = self.active_text_input().map(|text_input| text_input.current.cursor_rectangle)
        else {
            // the next text input gets the rectangle again
            for (_, panel) in self.panels.iter_mut() {
                panel.popup_rect = None;
            }
            return;
        };
        for (_, panel) in self.panels.iter_mut() {
            if panel.owner.is_none() || panel.popup_rect == Some(rect) {
                continue;
            }
            post_event(
                handle,
                zwp_input_popup_surface_v2::Event::TextInputRectangle {
                    x: rect.x,
                    y: rect.y,
                    width: rect.width,
                    height: rect.height,
                }
                .into_message(panel.object.clone()),
            );
            panel.popup_rect = Some(rect);
        }
    }

    /// Cursor rectangle of the active text input, in global coordinates
    fn cursor_anchor(&self) -> Option<Rect> {
        let text_input = self.active_text_input()?;
        let surface = text_input.enabled_surface()?;
        self.geometry.to_global(surface, text_input.current_state().cursor_rectangle)
    }

    fn panel_record(&self, key: PanelHandle) -> Option<PanelRecord> {
        let panel = self.panels.get(key)?;
        let role = panel.role.clone()?;
        let (anchor, output) = match &role {
            PanelRole::Overlay => (self.cursor_anchor(), self.bridge.focused_output.clone()),
            PanelRole::TopLevel { output, .. } => (None, Some(output.clone())),
        };
        Some(PanelRecord {
            handle: key,
            surface: panel.surface.clone(),
            role,
            anchor,
            output,
            mapped: self.surface_mapped(&panel.surface),
        })
    }

    /// Hand the panel record to the placement if it changed
    fn publish_panel(&mut self, key: PanelHandle) {
        let Some(record) = self.panel_record(key) else { return };
        let Some(panel) = self.panels.get_mut(key) else { return };
        match &panel.published {
            None => self.placement.panel_registered(&record),
            Some(published) if *published != record => self.placement.panel_updated(&record),
            Some(_) => return,
        }
        panel.published = Some(record);
    }
}

pub(crate) struct InputPanelGlobal;

impl<D: AsMut<Core> + 'static> GlobalHandler<D> for InputPanelGlobal {
    fn bind(
        self: Arc<Self>,
        _: &mut Handle<D>,
        _: &mut D,
        _: ClientId,
        _: GlobalId,
        _: ObjectId,
    ) -> Arc<dyn ObjectData<D>> {
        Arc::new(InputPanelData)
    }
}

/// `zwp_input_panel_v1`
struct InputPanelData;

impl<D: AsMut<Core> + 'static> ObjectData<D> for InputPanelData {
    fn request(
        self: Arc<Self>,
        handle: &mut Handle<D>,
        data: &mut D,
        _: ClientId,
        msg: Message<ObjectId, OwnedFd>,
    ) -> Result<Option<Arc<dyn ObjectData<D>>>, RequestError> {
        match zwp_input_panel_v1::Request::parse(msg) {
            Ok(zwp_input_panel_v1::Request::GetInputPanelSurface { id, surface }) => {
                let roles_error = |surface: &ObjectId| {
                    RequestError::new(
                        InputPanelError::Role.into(),
                        format!("{surface} already has a role"),
                    )
                };
                let surface = SurfaceRef::new(surface.clone()).map_err(|_| roles_error(&surface))?;
                let panel = data
                    .as_mut()
                    .add_panel(surface, id, None, None)
                    .map_err(|surface| roles_error(surface.id()))?;
                Ok(Some(Arc::new(PanelSurfaceData { panel })))
            }
            Err(err) => {
                bad_message(handle, err);
                Ok(None)
            }
        }
    }

    fn destroyed(self: Arc<Self>, _: &mut Handle<D>, _: &mut D, _: ClientId, _: ObjectId) {}
}

/// `zwp_input_panel_surface_v1`
struct PanelSurfaceData {
    panel: PanelHandle,
}

impl<D: AsMut<Core> + 'static> ObjectData<D> for PanelSurfaceData {
    fn request(
        self: Arc<Self>,
        handle: &mut Handle<D>,
        data: &mut D,
        _: ClientId,
        msg: Message<ObjectId, OwnedFd>,
    ) -> Result<Option<Arc<dyn ObjectData<D>>>, RequestError> {
        use zwp_input_panel_surface_v1::{Position, Request};

        let role = match Request::parse(msg) {
            Ok(Request::SetToplevel { output, position }) => {
                let output = match OutputRef::new(output) {
                    Ok(output) => output,
                    Err(err) => {
                        log::warn!("Ignoring top-level panel: {err}");
                        return Ok(None);
                    }
                };
                let position = match position {
                    WEnum::Value(Position::CenterBottom) => PanelPosition::CenterBottom,
                    other => {
                        log::debug!("Unknown panel position {}, using center_bottom", u32::from(other));
                        PanelPosition::CenterBottom
                    }
                };
                PanelRole::TopLevel { output, position }
            }
            Ok(Request::SetOverlayPanel) => PanelRole::Overlay,
            Err(err) => {
                bad_message(handle, err);
                return Ok(None);
            }
        };
        data.as_mut().set_panel_role(self.panel, role);
        Ok(None)
    }

    fn destroyed(self: Arc<Self>, _: &mut Handle<D>, data: &mut D, _: ClientId, _: ObjectId) {
        data.as_mut().panel_destroyed(self.panel);
    }
}

/// `zwp_input_popup_surface_v2`
pub(crate) struct PopupData {
    pub(crate) panel: PanelHandle,
}

impl<D: AsMut<Core> + 'static> ObjectData<D> for PopupData {
    fn request(
        self: Arc<Self>,
        handle: &mut Handle<D>,
        _: &mut D,
        _: ClientId,
        msg: Message<ObjectId, OwnedFd>,
    ) -> Result<Option<Arc<dyn ObjectData<D>>>, RequestError> {
        match zwp_input_popup_surface_v2::Request::parse(msg) {
            Ok(zwp_input_popup_surface_v2::Request::Destroy) => {}
            Err(err) => bad_message(handle, err),
        }
        Ok(None)
    }

    fn destroyed(self: Arc<Self>, _: &mut Handle<D>, data: &mut D, _: ClientId, _: ObjectId) {
        data.as_mut().panel_destroyed(self.panel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{arena::Arena, compositor::tests::null_surface};

    #[derive(Default)]
    struct Recorder {
        unregistered: Vec<PanelHandle>,
    }

    impl PanelPlacement for Recorder {
        fn panel_unregistered(&mut self, handle: PanelHandle) {
            self.unregistered.push(handle);
        }
    }

    #[test]
    fn placement_methods_default_to_nothing() {
        let mut arena = Arena::new();
        let key = arena.insert(Panel {
            surface: null_surface(),
            object: Handle::<Core>::null_id(),
            role: None,
            owner: None,
            published: None,
            popup_rect: None,
        });
        let record = PanelRecord {
            handle: key,
            surface: null_surface(),
            role: PanelRole::Overlay,
            anchor: None,
            output: None,
            mapped: false,
        };
        let mut recorder = Recorder::default();
        recorder.panel_registered(&record);
        recorder.panel_updated(&record);
        recorder.panel_unregistered(key);
        assert_eq!(recorder.unregistered, [key]);
    }
}
