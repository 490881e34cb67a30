//! Text inputs of all protocol versions
//!
//! A [`TextInput`] is one text-input object of a client, whichever version of
//! the protocol created it. The versions share the state they publish
//! ([`TextInputState`]) and differ in how it is buffered:
//!
//! - v3 setters change a pending state that `commit` applies at once
//! - v1 and v2 setters apply immediately, and a separate request
//!   (`commit_state` or `update_state`) tells when to forward the state to the
//!   input method
//!
//! Events going back to the client, `enter`/`leave` and input method replies,
//! are encoded per version here as well.

use std::os::unix::io::RawFd;

use imbridge_backend::{
    protocol::Message,
    server::{ClientId, Handle, ObjectId},
};
use imbridge_protocols::text_input::{
    v1::zwp_text_input_v1,
    v2::zwp_text_input_v2,
    v3::zwp_text_input_v3,
};

use crate::{
    arena::Key,
    bridge::Forward,
    compositor::SurfaceRef,
    input_method::{ImEvent, Preedit, Reply},
    post_event,
    state::{Rect, StateChanges, TextInputState},
    Core,
};

pub(crate) mod v1;
pub(crate) mod v2;
pub(crate) mod v3;

/// Key of a [`TextInput`]
pub type TextInputId = Key<TextInput>;

/// Protocol version of a text input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextInputVersion {
    /// `zwp_text_input_v1`
    V1,
    /// `zwp_text_input_v2`
    V2,
    /// `zwp_text_input_v3`
    V3,
}

/// What the bridge needs from a text input, whatever its version
pub trait TextInputLike {
    /// Protocol version of the object
    fn version(&self) -> TextInputVersion;

    /// Ask for input method support from the next commit on
    fn enable(&mut self);

    /// Stop input method support from the next commit on
    fn disable(&mut self);

    /// Apply the pending state, returning what changed
    fn commit(&mut self) -> StateChanges;

    /// The applied state
    fn current_state(&self) -> &TextInputState;

    /// The surface the text input is enabled on, if it is enabled
    fn enabled_surface(&self) -> Option<&SurfaceRef>;
}

#[derive(Debug)]
pub(crate) enum Protocol {
    V1 {
        /// surface of the last `activate`
        surface: Option<SurfaceRef>,
        /// serial of the last `commit_state`, echoed in events
        commit_serial: u32,
    },
    V2 {
        /// surface of the last `enable`
        surface: Option<SurfaceRef>,
        /// serial of the last `enter` or `leave`
        serial: u32,
    },
    V3 {
        commit_count: u32,
        /// pre-edit shown by the client, sent again with commit acknowledgements
        preedit: Option<Preedit>,
    },
}

/// A text-input object of some client
#[derive(Debug)]
pub struct TextInput {
    pub(crate) resource: ObjectId,
    pub(crate) protocol: Protocol,
    pub(crate) pending: TextInputState,
    pub(crate) current: TextInputState,
    /// surface `enter` was last sent for, cleared by `leave`
    pub(crate) entered: Option<SurfaceRef>,
    /// when the text input was last enabled, 0 if never
    pub(crate) enable_seq: u64,
    /// when the text input was created
    pub(crate) created: u64,
    pub(crate) panel_requested: bool,
    pub(crate) done_serial: u32,
}

impl TextInput {
    pub(crate) fn new(resource: ObjectId, version: TextInputVersion, created: u64) -> Self {
        let protocol = match version {
            TextInputVersion::V1 => Protocol::V1 { surface: None, commit_serial: 0 },
            TextInputVersion::V2 => Protocol::V2 { surface: None, serial: 0 },
            TextInputVersion::V3 => Protocol::V3 { commit_count: 0, preedit: None },
        };
        Self {
            resource,
            protocol,
            pending: TextInputState::default(),
            current: TextInputState::default(),
            entered: None,
            enable_seq: 0,
            created,
            panel_requested: false,
            done_serial: 0,
        }
    }

    /// The text-input object
    pub fn resource(&self) -> &ObjectId {
        &self.resource
    }

    /// The surface the text input last received `enter` for
    pub fn entered(&self) -> Option<&SurfaceRef> {
        self.entered.as_ref()
    }

    /// Number of commits for v3, last `commit_state` serial for v1, last
    /// `enter`/`leave` serial for v2
    pub fn commit_serial(&self) -> u32 {
        match self.protocol {
            Protocol::V1 { commit_serial, .. } => commit_serial,
            Protocol::V2 { serial, .. } => serial,
            Protocol::V3 { commit_count, .. } => commit_count,
        }
    }

    /// Serial of the last `done` sent, v3 only
    pub fn done_serial(&self) -> u32 {
        self.done_serial
    }

    /// Whether the client asked for the input panel to be shown (v1 and v2)
    pub fn input_panel_requested(&self) -> bool {
        self.panel_requested
    }

    pub(crate) fn client(&self) -> ClientId {
        self.resource.client_id()
    }

    /// Set the surface of v1 `activate` or v2 `enable`
    pub(crate) fn set_surface(&mut self, new: Option<SurfaceRef>) {
        match &mut self.protocol {
            Protocol::V1 { surface, .. } | Protocol::V2 { surface, .. } => *surface = new,
            Protocol::V3 { .. } => {}
        }
    }

    /// The surface is gone, forget about it
    pub(crate) fn forget_surface(&mut self, gone: &SurfaceRef) {
        if let Protocol::V1 { surface, .. } | Protocol::V2 { surface, .. } = &mut self.protocol {
            if surface.as_ref() == Some(gone) {
                *surface = None;
            }
        }
        if self.entered.as_ref() == Some(gone) {
            self.entered = None;
        }
    }

    /// Whether the text input gets `enter` when focus moves to `surface`
    pub(crate) fn wants_enter(&self, surface: &SurfaceRef) -> bool {
        if !surface.same_client_as(&self.resource) {
            return false;
        }
        match &self.protocol {
            // v1 only sees the surface it was activated on
            Protocol::V1 { surface: activated, .. } => activated.as_ref() == Some(surface),
            Protocol::V2 { .. } | Protocol::V3 { .. } => true,
        }
    }

    pub(crate) fn send_enter<D>(&mut self, handle: &mut Handle<D>, surface: &SurfaceRef) {
        if self.entered.is_some() {
            self.send_leave(handle);
        }
        let msg = self.enter_message(surface);
        post_event(handle, msg);
        self.entered = Some(surface.clone());
    }

    pub(crate) fn send_leave<D>(&mut self, handle: &mut Handle<D>) {
        let Some(surface) = self.entered.take() else { return };
        if let Protocol::V3 { preedit, .. } = &mut self.protocol {
            // the client must enable again after the next enter
            self.current.enabled = false;
            self.pending.enabled = false;
            *preedit = None;
        }
        let msg = self.leave_message(&surface);
        post_event(handle, msg);
    }

    /// Send a `leave`/`enter` pair for the entered surface, keeping the state
    pub(crate) fn reenter<D>(&mut self, handle: &mut Handle<D>) {
        let Some(surface) = self.entered.clone() else { return };
        let leave = self.leave_message(&surface);
        post_event(handle, leave);
        let enter = self.enter_message(&surface);
        post_event(handle, enter);
    }

    fn enter_message(&mut self, surface: &SurfaceRef) -> Message<ObjectId, RawFd> {
        match &mut self.protocol {
            Protocol::V1 { .. } => zwp_text_input_v1::Event::Enter { surface: surface.id().clone() }
                .into_message(self.resource.clone()),
            Protocol::V2 { serial, .. } => {
                *serial = serial.wrapping_add(1);
                zwp_text_input_v2::Event::Enter { serial: *serial, surface: surface.id().clone() }
                    .into_message(self.resource.clone())
            }
            Protocol::V3 { .. } => zwp_text_input_v3::Event::Enter { surface: surface.id().clone() }
                .into_message(self.resource.clone()),
        }
    }

    fn leave_message(&mut self, surface: &SurfaceRef) -> Message<ObjectId, RawFd> {
        match &mut self.protocol {
            Protocol::V1 { .. } => zwp_text_input_v1::Event::Leave.into_message(self.resource.clone()),
            Protocol::V2 { serial, .. } => {
                *serial = serial.wrapping_add(1);
                zwp_text_input_v2::Event::Leave { serial: *serial, surface: surface.id().clone() }
                    .into_message(self.resource.clone())
            }
            Protocol::V3 { .. } => zwp_text_input_v3::Event::Leave { surface: surface.id().clone() }
                .into_message(self.resource.clone()),
        }
    }

    /// Apply an input method reply
    pub(crate) fn deliver<D>(&mut self, handle: &mut Handle<D>, reply: &Reply) {
        match &mut self.protocol {
            Protocol::V1 { commit_serial, .. } => {
                use zwp_text_input_v1::Event;
                let serial = *commit_serial;
                let resource = &self.resource;
                let mut send = |event: Event| post_event(handle, event.into_message(resource.clone()));
                if let Some((before, after)) = reply.delete {
                    // the index is signed, longer spans are cut to what it can hold
                    let before = before.min(i32::MAX as u32);
                    send(Event::DeleteSurroundingText {
                        index: -(before as i32),
                        length: before.saturating_add(after),
                    });
                }
                if let Some(text) = &reply.commit {
                    send(Event::CommitString { serial, text: text.clone() });
                }
                if let Some(preedit) = &reply.preedit {
                    for styling in &preedit.styling {
                        send(Event::PreeditStyling {
                            index: styling.index,
                            length: styling.length,
                            style: styling.style.into(),
                        });
                    }
                    send(Event::PreeditCursor { index: preedit.cursor_begin });
                    send(Event::PreeditString {
                        serial,
                        text: preedit.text.clone(),
                        commit: preedit.commit.clone(),
                    });
                }
            }
            Protocol::V2 { .. } => {
                use zwp_text_input_v2::Event;
                let resource = &self.resource;
                let mut send = |event: Event| post_event(handle, event.into_message(resource.clone()));
                if let Some((before_length, after_length)) = reply.delete {
                    send(Event::DeleteSurroundingText { before_length, after_length });
                }
                if let Some(text) = &reply.commit {
                    send(Event::CommitString { text: text.clone() });
                }
                if let Some(preedit) = &reply.preedit {
                    for styling in &preedit.styling {
                        send(Event::PreeditStyling {
                            index: styling.index,
                            length: styling.length,
                            style: styling.style,
                        });
                    }
                    send(Event::PreeditCursor { index: preedit.cursor_begin });
                    send(Event::PreeditString {
                        text: preedit.text.clone(),
                        commit: preedit.commit.clone(),
                    });
                }
            }
            Protocol::V3 { preedit, .. } => {
                use zwp_text_input_v3::Event;
                let resource = &self.resource;
                let mut send = |event: Event| post_event(handle, event.into_message(resource.clone()));
                if let Some((before_length, after_length)) = reply.delete {
                    send(Event::DeleteSurroundingText { before_length, after_length });
                }
                if let Some(text) = &reply.commit {
                    send(Event::CommitString { text: Some(text.clone()) });
                }
                if let Some(new) = &reply.preedit {
                    send(Event::PreeditString {
                        text: Some(new.text.clone()),
                        cursor_begin: new.cursor_begin,
                        cursor_end: new.cursor_end,
                    });
                }
                // a done without pre-edit, or with an empty one, clears it on the client
                *preedit = reply.preedit.clone().filter(|preedit| !preedit.text.is_empty());
                self.send_done(handle);
            }
        }
    }

    /// v3: acknowledge a commit, keeping the pre-edit the client shows
    pub(crate) fn acknowledge_commit<D>(&mut self, handle: &mut Handle<D>) {
        let Protocol::V3 { preedit: Some(preedit), .. } = &self.protocol else {
            self.send_done(handle);
            return;
        };
        post_event(
            handle,
            zwp_text_input_v3::Event::PreeditString {
                text: Some(preedit.text.clone()),
                cursor_begin: preedit.cursor_begin,
                cursor_end: preedit.cursor_end,
            }
            .into_message(self.resource.clone()),
        );
        self.send_done(handle);
    }

    fn send_done<D>(&mut self, handle: &mut Handle<D>) {
        self.done_serial = self.done_serial.wrapping_add(1);
        post_event(
            handle,
            zwp_text_input_v3::Event::Done { serial: self.done_serial }
                .into_message(self.resource.clone()),
        );
    }

    /// Forward an input method event v3 has no equivalent for
    pub(crate) fn send_im_event<D>(&mut self, handle: &mut Handle<D>, event: ImEvent) {
        let msg = match (&self.protocol, event) {
            (Protocol::V3 { .. }, event) => {
                log::debug!("Dropping {:?} for text input v3 {}", event, self.resource);
                return;
            }
            (Protocol::V1 { commit_serial, .. }, event) => {
                use zwp_text_input_v1::Event;
                let serial = *commit_serial;
                match event {
                    ImEvent::CursorPosition { index, anchor } => {
                        Event::CursorPosition { index, anchor }
                    }
                    ImEvent::Keysym { time, sym, state, modifiers } => {
                        Event::Keysym { serial, time, sym, state, modifiers }
                    }
                    ImEvent::Language(language) => Event::Language { serial, language },
                    ImEvent::TextDirection(direction) => {
                        Event::TextDirection { serial, direction: direction.into() }
                    }
                    ImEvent::ModifiersMap(map) => Event::ModifiersMap { map },
                }
                .into_message(self.resource.clone())
            }
            (Protocol::V2 { .. }, event) => {
                use zwp_text_input_v2::Event;
                match event {
                    ImEvent::CursorPosition { index, anchor } => {
                        Event::CursorPosition { index, anchor }
                    }
                    ImEvent::Keysym { time, sym, state, modifiers } => {
                        Event::Keysym { time, sym, state, modifiers }
                    }
                    ImEvent::Language(language) => Event::Language { language },
                    ImEvent::TextDirection(direction) => Event::TextDirection { direction },
                    ImEvent::ModifiersMap(map) => Event::ModifiersMap { map },
                }
                .into_message(self.resource.clone())
            }
        };
        post_event(handle, msg);
    }

    /// Visibility and occluded area of the input panel, v1 and v2
    pub(crate) fn send_input_panel_state<D>(&self, handle: &mut Handle<D>, visible: bool, rect: Rect) {
        let msg = match self.protocol {
            Protocol::V1 { .. } => zwp_text_input_v1::Event::InputPanelState { state: visible as u32 }
                .into_message(self.resource.clone()),
            Protocol::V2 { .. } => zwp_text_input_v2::Event::InputPanelState {
                state: if visible {
                    zwp_text_input_v2::InputPanelVisibility::Visible
                } else {
                    zwp_text_input_v2::InputPanelVisibility::Hidden
                },
                x: rect.x,
                y: rect.y,
                width: rect.width,
                height: rect.height,
            }
            .into_message(self.resource.clone()),
            Protocol::V3 { .. } => return,
        };
        post_event(handle, msg);
    }
}

impl TextInputLike for TextInput {
    fn version(&self) -> TextInputVersion {
        match self.protocol {
            Protocol::V1 { .. } => TextInputVersion::V1,
            Protocol::V2 { .. } => TextInputVersion::V2,
            Protocol::V3 { .. } => TextInputVersion::V3,
        }
    }

    fn enable(&mut self) {
        match self.protocol {
            // enabling starts from a clean state
            Protocol::V3 { .. } => {
                self.pending = TextInputState { enabled: true, ..Default::default() };
            }
            Protocol::V1 { .. } | Protocol::V2 { .. } => self.pending.enabled = true,
        }
    }

    fn disable(&mut self) {
        self.pending.enabled = false;
    }

    fn commit(&mut self) -> StateChanges {
        let changes = self.pending.changes_from(&self.current);
        self.current = self.pending.clone();
        if let Protocol::V3 { commit_count, .. } = &mut self.protocol {
            *commit_count = commit_count.wrapping_add(1);
        }
        changes
    }

    fn current_state(&self) -> &TextInputState {
        &self.current
    }

    fn enabled_surface(&self) -> Option<&SurfaceRef> {
        if !self.current.enabled {
            return None;
        }
        match &self.protocol {
            Protocol::V1 { surface, .. } | Protocol::V2 { surface, .. } => surface.as_ref(),
            Protocol::V3 { .. } => self.entered.as_ref(),
        }
    }
}

impl Core {
    /// The text input the input method serves
    pub fn active_text_input(&self) -> Option<&TextInput> {
        self.bridge.active.and_then(|key| self.text_inputs.get(key))
    }

    /// Key of the text input the input method serves
    pub fn active_text_input_id(&self) -> Option<TextInputId> {
        self.bridge.active
    }

    /// Register a new text input, sending `enter` if its client has the focus
    pub(crate) fn create_text_input<D>(
        &mut self,
        handle: &mut Handle<D>,
        resource: ObjectId,
        version: TextInputVersion,
    ) -> TextInputId {
        let created = self.next_seq();
        let key = self.text_inputs.insert(TextInput::new(resource, version, created));
        if let Some(focused) = self.bridge.focused.clone() {
            if let Some(text_input) = self.text_inputs.get_mut(key) {
                if text_input.wants_enter(&focused) {
                    text_input.send_enter(handle, &focused);
                }
            }
        }
        self.update_bridge_state();
        key
    }

    pub(crate) fn text_input_destroyed<D: AsMut<Core> + 'static>(
        &mut self,
        handle: &mut Handle<D>,
        key: TextInputId,
    ) {
        if let Some(text_input) = self.text_inputs.remove(key) {
            log::debug!("Text input {} gone", text_input.resource);
            self.refresh(handle);
        }
    }

    /// The text input changed its state.
    ///
    /// Selects the active text input again, then forwards the state to the
    /// input method if the text input stayed active.
    pub(crate) fn text_input_changed<D: AsMut<Core> + 'static>(
        &mut self,
        handle: &mut Handle<D>,
        key: TextInputId,
        changes: StateChanges,
        forward: Option<Forward>,
    ) {
        let Some(text_input) = self.text_inputs.get(key) else { return };
        if changes.contains(StateChanges::ENABLED)
            && text_input.current.enabled
            && self.mark_enabled(key)
        {
            // another text input of the client lost its place, start over
            if let Some(text_input) = self.text_inputs.get_mut(key) {
                text_input.reenter(handle);
            }
        }
        let was_active = self.bridge.active == Some(key);
        self.refresh(handle);
        if was_active && self.bridge.active == Some(key) {
            if let Some(forward) = forward {
                self.forward_state(handle, forward);
            }
        }
        if changes.contains(StateChanges::CURSOR_RECTANGLE) {
            self.update_panels(handle);
        }
    }

    /// A text input was enabled: it wins over the other text inputs of its client.
    ///
    /// Returns whether some other text input was disabled for it.
    fn mark_enabled(&mut self, key: TextInputId) -> bool {
        let seq = self.next_seq();
        let Some(text_input) = self.text_inputs.get_mut(key) else { return false };
        text_input.enable_seq = seq;
        let client = text_input.client();
        let others =
            self.text_inputs.keys_where(|other| other.client() == client && other.current.enabled);
        let mut displaced = false;
        for other in others.into_iter().filter(|other| *other != key) {
            if let Some(other) = self.text_inputs.get_mut(other) {
                log::debug!("Text input {} implicitly disabled", other.resource);
                other.current.enabled = false;
                other.pending.enabled = false;
                displaced = true;
            }
        }
        displaced
    }

    /// The client asked to show or hide the input panel
    pub(crate) fn input_panel_requested(&mut self, key: TextInputId, visible: bool) {
        if let Some(text_input) = self.text_inputs.get_mut(key) {
            log::debug!(
                "Text input {} asks to {} the input panel",
                text_input.resource,
                if visible { "show" } else { "hide" }
            );
            text_input.panel_requested = visible;
        }
    }
}
