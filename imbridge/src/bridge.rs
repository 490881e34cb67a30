//! Focus and selection of the active text input
//!
//! The bridge follows the focused surface given by the compositor. Among the
//! text inputs enabled on that surface it picks the most recently enabled
//! one, and keeps the bound input method activated on it:
//!
//! ```text
//!  Idle ── focus on a client with text inputs ──> FocusedDisabled
//!                                                   │        ^
//!                                            enable │        │ disable, focus change
//!                                                   v        │
//!                   FocusedEnabledWithIm <── bind ── FocusedEnabled
//!                                        ── unbind ─>
//! ```
//!
//! Every change of the active text input deactivates the input method first,
//! then activates it again with a snapshot of the new text input's state.

use imbridge_backend::{protocol::Interface, server::Handle};
use imbridge_protocols::text_input::{
    v1::ZWP_TEXT_INPUT_V1_INTERFACE, v2::ZWP_TEXT_INPUT_V2_INTERFACE, v3::ZWP_TEXT_INPUT_V3_INTERFACE,
};

use crate::{
    compositor::{OutputRef, SurfaceRef},
    input_method::{grab::ModifiersState, ImEvent, InputMethodId},
    state::{Rect, StateChanges, TextInputState},
    text_input::{TextInputId, TextInputLike},
    Core, Error,
};

static TEXT_INPUT_INTERFACES: [&Interface; 3] =
    [&ZWP_TEXT_INPUT_V1_INTERFACE, &ZWP_TEXT_INPUT_V2_INTERFACE, &ZWP_TEXT_INPUT_V3_INTERFACE];

/// State of the active text-input slot
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    /// nothing focused, or the focused client has no text input
    #[default]
    Idle,
    /// the focused client has text inputs, none enabled
    FocusedDisabled,
    /// a text input of the focused client is enabled, no input method serves it
    FocusedEnabled,
    /// the input method is activated on the enabled text input
    FocusedEnabledWithIm,
}

/// Input panel state reported to v1 and v2 text inputs
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct InputPanelState {
    /// whether the panel is shown
    pub visible: bool,
    /// area of the focused surface the panel covers
    pub rect: Rect,
}

/// How a text input state reaches the input method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Forward {
    /// fields changed since the last state sent
    Diff,
    /// every field
    Full,
    /// every field, after telling the input method to start over
    Reset,
}

/// Fields the input method knows about
const FORWARDED: StateChanges = StateChanges::SURROUNDING_TEXT
    .union(StateChanges::CHANGE_CAUSE)
    .union(StateChanges::CONTENT_TYPE)
    .union(StateChanges::PREFERRED_LANGUAGE);

#[derive(Debug, Default)]
pub(crate) struct Bridge {
    pub(crate) focused: Option<SurfaceRef>,
    pub(crate) focused_output: Option<OutputRef>,
    pub(crate) active: Option<TextInputId>,
    pub(crate) input_method: Option<InputMethodId>,
    /// last state sent to the input method
    pub(crate) sent: Option<TextInputState>,
    pub(crate) state: BridgeState,
    pub(crate) modifiers: ModifiersState,
    pub(crate) panel: InputPanelState,
}

impl Core {
    /// Move the keyboard focus.
    ///
    /// Text inputs of the previously focused client get `leave`, those of the
    /// newly focused client get `enter`. Focusing the already focused surface
    /// does nothing.
    pub fn set_focused_surface<D: AsMut<Core> + 'static>(
        &mut self,
        handle: &mut Handle<D>,
        surface: Option<SurfaceRef>,
    ) -> Result<(), Error> {
        if let Some(surface) = &surface {
            if !surface.is_alive(handle) {
                return Err(Error::DeadObject(surface.id().clone()));
            }
        }
        self.change_focus(handle, surface);
        Ok(())
    }

    /// The focused surface
    pub fn focused_surface(&self) -> Option<&SurfaceRef> {
        self.bridge.focused.as_ref()
    }

    /// Set the output top-level panels go to when they did not name one
    pub fn set_focused_output<D>(&mut self, handle: &mut Handle<D>, output: Option<OutputRef>) {
        if self.bridge.focused_output != output {
            self.bridge.focused_output = output;
            self.update_panels(handle);
        }
    }

    /// The output set by [`set_focused_output`](Core::set_focused_output)
    pub fn focused_output(&self) -> Option<&OutputRef> {
        self.bridge.focused_output.as_ref()
    }

    /// State of the active text-input slot
    pub fn bridge_state(&self) -> BridgeState {
        self.bridge.state
    }

    /// Tell the active text input whether the input panel is shown and what it
    /// covers, for v1 and v2 text inputs
    pub fn update_input_panel_state<D>(&mut self, handle: &mut Handle<D>, visible: bool, rect: Rect) {
        self.bridge.panel = InputPanelState { visible, rect };
        if let Some(text_input) = self.active_text_input() {
            text_input.send_input_panel_state(handle, visible, rect);
        }
    }

    /// The last state given to [`update_input_panel_state`](Core::update_input_panel_state)
    pub fn input_panel_state(&self) -> InputPanelState {
        self.bridge.panel
    }

    /// Whether the active text input asked for the input panel (v1 and v2)
    pub fn input_panel_wanted(&self) -> bool {
        self.active_text_input().map_or(false, |text_input| text_input.panel_requested)
    }

    pub(crate) fn change_focus<D: AsMut<Core> + 'static>(
        &mut self,
        handle: &mut Handle<D>,
        focused: Option<SurfaceRef>,
    ) {
        if self.bridge.focused == focused {
            return;
        }
        log::debug!(
            "Focus {:?} -> {:?}",
            self.bridge.focused.as_ref().map(SurfaceRef::id),
            focused.as_ref().map(SurfaceRef::id)
        );
        // the active text input is enabled on the old surface, it cannot stay
        if self.bridge.active.take().is_some() {
            self.deactivate_input_method(handle);
        }
        let previous = std::mem::replace(&mut self.bridge.focused, focused.clone());
        if let Some(previous) = &previous {
            for (_, text_input) in self.text_inputs.iter_mut() {
                if text_input.entered.as_ref() == Some(previous) {
                    text_input.send_leave(handle);
                }
            }
        }
        if let Some(focused) = &focused {
            let text_inputs = &mut self.text_inputs;
            for interface in TEXT_INPUT_INTERFACES {
                // a dead client has nothing left to enter
                let _ = handle.for_each_resource_of(focused.client_of(), interface, |handle, id| {
                    let Some((_, text_input)) =
                        text_inputs.iter_mut().find(|(_, text_input)| text_input.resource == id)
                    else {
                        return;
                    };
                    if text_input.wants_enter(focused) {
                        text_input.send_enter(handle, focused);
                    }
                });
            }
        }
        self.refresh(handle);
    }

    /// Send `enter` or `leave` to a text input whose interest in the focused
    /// surface changed
    pub(crate) fn sync_enter<D>(&mut self, handle: &mut Handle<D>, key: TextInputId) {
        let focused = self.bridge.focused.clone();
        let Some(text_input) = self.text_inputs.get_mut(key) else { return };
        match focused {
            Some(focused) if text_input.wants_enter(&focused) => {
                if text_input.entered.as_ref() != Some(&focused) {
                    text_input.send_enter(handle, &focused);
                }
            }
            _ => text_input.send_leave(handle),
        }
    }

    /// Select the active text input again, moving the input method along
    pub(crate) fn refresh<D: AsMut<Core> + 'static>(&mut self, handle: &mut Handle<D>) {
        let selected = self.select_active();
        if selected != self.bridge.active {
            log::debug!(
                "Active text input {:?} -> {:?}",
                self.active_text_input().map(|text_input| text_input.resource.clone()),
                selected.and_then(|key| self.text_inputs.get(key)).map(|text_input| text_input.resource.clone())
            );
            self.deactivate_input_method(handle);
            self.bridge.active = selected;
            self.activate_input_method(handle);
            self.update_panels(handle);
        }
        self.update_bridge_state();
    }

    /// The text input enabled on the focused surface that was enabled last
    fn select_active(&self) -> Option<TextInputId> {
        let focused = self.bridge.focused.as_ref()?;
        self.text_inputs
            .iter()
            .filter(|(_, text_input)| text_input.enabled_surface() == Some(focused))
            .max_by_key(|(_, text_input)| (text_input.enable_seq, text_input.created))
            .map(|(key, _)| key)
    }

    /// Activate the bound input method on the active text input, if both exist
    pub(crate) fn activate_input_method<D: AsMut<Core> + 'static>(&mut self, handle: &mut Handle<D>) {
        let Some(active) = self.bridge.active else { return };
        let Some(im_key) = self.bridge.input_method else { return };
        let Some(state) = self.text_inputs.get(active).map(|text_input| text_input.current.clone())
        else {
            return;
        };
        let Some(im) = self.input_methods.get_mut(im_key) else { return };
        im.deactivate(handle);
        im.activate(im_key, handle, &state, &mut self.purposes);
        let map = im.modifiers_map.clone();
        self.bridge.sent = Some(state);
        if let Some(map) = map {
            if let Some(text_input) = self.text_inputs.get_mut(active) {
                text_input.send_im_event(handle, ImEvent::ModifiersMap(map));
            }
        }
    }

    fn deactivate_input_method<D>(&mut self, handle: &mut Handle<D>) {
        if let Some(im) = self.bridge.input_method.and_then(|key| self.input_methods.get_mut(key)) {
            im.deactivate(handle);
        }
        self.bridge.sent = None;
    }

    /// Send the active text input's state to the input method
    pub(crate) fn forward_state<D>(&mut self, handle: &mut Handle<D>, forward: Forward) {
        let Some(text_input) = self.active_text_input() else { return };
        let state = text_input.current.clone();
        let Some(im_key) = self.bridge.input_method.filter(|key| self.input_methods.contains(*key))
        else {
            log::debug!("No input method, dropping state of {}", text_input.resource);
            return;
        };
        let Some(im) = self.input_methods.get_mut(im_key) else { return };
        match forward {
            Forward::Diff => {
                let changes = match &self.bridge.sent {
                    Some(sent) => state.changes_from(sent) & FORWARDED,
                    None => FORWARDED,
                };
                if changes.is_empty() {
                    return;
                }
                im.send_state(handle, &state, changes, &mut self.purposes);
            }
            Forward::Full => im.send_state(handle, &state, StateChanges::all(), &mut self.purposes),
            Forward::Reset => im.reset(handle, &state, &mut self.purposes),
        }
        self.bridge.sent = Some(state);
    }

    /// A v1 or v2 text input asked the input method to start over
    pub(crate) fn text_input_reset<D>(&mut self, handle: &mut Handle<D>, key: TextInputId) {
        if self.bridge.active == Some(key) {
            self.forward_state(handle, Forward::Reset);
        }
    }

    /// Action on the pre-edit of a v1 text input, for a v1 input method
    pub(crate) fn invoke_action<D>(
        &mut self,
        handle: &mut Handle<D>,
        key: TextInputId,
        button: u32,
        index: u32,
    ) {
        if self.bridge.active != Some(key) {
            return;
        }
        if let Some(im) = self.input_method() {
            im.invoke_action(handle, button, index);
        }
    }

    /// Recompute the bridge state, logging transitions
    pub(crate) fn update_bridge_state(&mut self) {
        let state = match (&self.bridge.focused, self.bridge.active) {
            (None, _) => BridgeState::Idle,
            (Some(focused), None) => {
                let client = focused.client_of();
                if self.text_inputs.iter().any(|(_, text_input)| text_input.client() == client) {
                    BridgeState::FocusedDisabled
                } else {
                    BridgeState::Idle
                }
            }
            (Some(_), Some(_)) => match self.input_method() {
                Some(im) if im.is_active() => BridgeState::FocusedEnabledWithIm,
                _ => BridgeState::FocusedEnabled,
            },
        };
        if state != self.bridge.state {
            log::debug!("Bridge {:?} -> {:?}", self.bridge.state, state);
            self.bridge.state = state;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rectangle_and_enabled_are_not_forwarded() {
        assert!(!FORWARDED.contains(StateChanges::CURSOR_RECTANGLE));
        assert!(!FORWARDED.contains(StateChanges::ENABLED));
        assert!(FORWARDED.contains(StateChanges::SURROUNDING_TEXT | StateChanges::CONTENT_TYPE));
    }

    #[test]
    fn fresh_bridge_is_idle() {
        let core = Core::new(crate::Config::default());
        assert_eq!(core.bridge_state(), BridgeState::Idle);
        assert!(core.focused_surface().is_none());
        assert!(core.active_text_input().is_none());
        assert_eq!(core.input_panel_state(), InputPanelState::default());
    }
}
