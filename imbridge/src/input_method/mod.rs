//! The input method and its replies
//!
//! At most one input method is bound at a time, through either
//! `zwp_input_method_v1` or `zwp_input_method_manager_v2`. It is activated
//! while a text input is active, receives that text input's state, and sends
//! back replies: text to commit, a pre-edit, and text to delete around the
//! cursor.

use std::sync::Arc;

use imbridge_backend::server::{Handle, ObjectData, ObjectId, RequestError};
use imbridge_protocols::{
    input_method::{
        v1::{zwp_input_method_context_v1, zwp_input_method_v1, ZWP_INPUT_METHOD_CONTEXT_V1_INTERFACE},
        v2::zwp_input_method_v2,
    },
    text_input::v3::zwp_text_input_v3::ContentHint,
};

use crate::{
    arena::Key,
    error::InputMethodError,
    post_event,
    state::{PurposeMapper, StateChanges, TextInputState},
    Core,
};

pub(crate) mod grab;
pub(crate) mod v1;
pub(crate) mod v2;

use grab::{GrabKind, KeyEvent, KeyRouting, KeyboardGrab, ModifiersState};

/// Key of an [`InputMethod`]
pub type InputMethodId = Key<InputMethod>;

/// Most names a modifiers map may hold
const MAX_MODIFIERS: usize = 16;

/// Protocol spoken by an input method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMethodVersion {
    /// `zwp_input_method_v1`, one context object per activation
    V1,
    /// `zwp_input_method_v2`
    V2,
}

#[derive(Debug)]
pub(crate) enum ImProtocol {
    V1 {
        /// context of the current activation
        context: Option<ObjectId>,
        /// next `commit_state` serial of the context
        serial: u32,
    },
    V2 {
        /// number of `done` events sent
        done_count: u32,
    },
}

/// Styling of a span of the pre-edit, as `zwp_text_input_v1.preedit_style`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreeditStyling {
    /// start of the span, in bytes
    pub index: u32,
    /// length of the span, in bytes
    pub length: u32,
    /// the style
    pub style: u32,
}

/// Text being composed by the input method
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Preedit {
    /// the text
    pub text: String,
    /// start of the cursor span, in bytes, -1 to hide the cursor
    pub cursor_begin: i32,
    /// end of the cursor span, in bytes
    pub cursor_end: i32,
    /// text to commit if the composition is interrupted (v1 and v2 text inputs)
    pub commit: String,
    /// styling of spans of the text (v1 and v2 text inputs)
    pub styling: Vec<PreeditStyling>,
}

/// What an input method sends the active text input in one go
///
/// Text inputs apply the parts in a fixed order: deletion, then the commit
/// string, then the pre-edit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reply {
    /// bytes to delete before and after the cursor
    pub delete: Option<(u32, u32)>,
    /// text to insert
    pub commit: Option<String>,
    /// new pre-edit, none clears it
    pub preedit: Option<Preedit>,
}

/// Reply parts received but not applied yet
#[derive(Debug, Default)]
pub(crate) struct ReplyDraft {
    delete: Option<(u32, u32)>,
    commit: Option<String>,
    preedit: Option<Preedit>,
    /// v1 styling and cursor apply to the next pre-edit
    styling: Vec<PreeditStyling>,
    cursor: Option<i32>,
}

impl ReplyDraft {
    fn take_reply(&mut self) -> Reply {
        let draft = std::mem::take(self);
        Reply { delete: draft.delete, commit: draft.commit, preedit: draft.preedit }
    }

    /// `zwp_input_method_context_v1.delete_surrounding_text` counts from `index`
    /// relative to the cursor, only spans around the cursor can be expressed
    fn set_delete_v1(&mut self, index: i32, length: u32) {
        if index > 0 {
            log::debug!("Ignoring deletion starting {index} bytes after the cursor");
            return;
        }
        let before = index.unsigned_abs();
        match length.checked_sub(before) {
            Some(after) => self.delete = Some((before, after)),
            None => log::debug!("Ignoring deletion of {length} bytes ending before the cursor"),
        }
    }

    fn commit_v1(&mut self, text: String) -> Reply {
        Reply { delete: self.delete.take(), commit: Some(text), preedit: None }
    }

    fn preedit_v1(&mut self, text: String, commit: String) -> Reply {
        let cursor = self.cursor.take().unwrap_or(text.len() as i32);
        let preedit = Preedit {
            text,
            cursor_begin: cursor,
            cursor_end: cursor,
            commit,
            styling: std::mem::take(&mut self.styling),
        };
        Reply { delete: None, commit: None, preedit: Some(preedit) }
    }
}

/// Input method requests that text inputs v1 and v2 have an event for
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ImEvent {
    CursorPosition { index: i32, anchor: i32 },
    Keysym { time: u32, sym: u32, state: u32, modifiers: u32 },
    Language(String),
    TextDirection(u32),
    ModifiersMap(Vec<u8>),
}

/// The bound input method
#[derive(Debug)]
pub struct InputMethod {
    pub(crate) resource: ObjectId,
    pub(crate) protocol: ImProtocol,
    pub(crate) active: bool,
    pub(crate) draft: ReplyDraft,
    pub(crate) modifiers_map: Option<Vec<u8>>,
    pub(crate) grab: Option<KeyboardGrab>,
}

impl InputMethod {
    pub(crate) fn new(resource: ObjectId, version: InputMethodVersion) -> Self {
        let protocol = match version {
            InputMethodVersion::V1 => ImProtocol::V1 { context: None, serial: 0 },
            InputMethodVersion::V2 => ImProtocol::V2 { done_count: 0 },
        };
        Self {
            resource,
            protocol,
            active: false,
            draft: ReplyDraft::default(),
            modifiers_map: None,
            grab: None,
        }
    }

    /// The `zwp_input_method_v1` or `zwp_input_method_v2` object
    pub fn resource(&self) -> &ObjectId {
        &self.resource
    }

    /// Protocol spoken by the input method
    pub fn version(&self) -> InputMethodVersion {
        match self.protocol {
            ImProtocol::V1 { .. } => InputMethodVersion::V1,
            ImProtocol::V2 { .. } => InputMethodVersion::V2,
        }
    }

    /// Whether the input method serves a text input
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Whether the input method grabs the keyboard
    pub fn has_keyboard_grab(&self) -> bool {
        self.grab.is_some()
    }

    /// Number of `done` events sent (v2), or of `commit_state` events sent to
    /// the current context (v1)
    pub fn serial(&self) -> u32 {
        match self.protocol {
            ImProtocol::V1 { serial, .. } => serial,
            ImProtocol::V2 { done_count } => done_count,
        }
    }

    /// The context of the current activation, for v1
    pub fn context(&self) -> Option<&ObjectId> {
        match &self.protocol {
            ImProtocol::V1 { context, .. } => context.as_ref(),
            ImProtocol::V2 { .. } => None,
        }
    }

    pub(crate) fn activate<D: AsMut<Core> + 'static>(
        &mut self,
        key: InputMethodId,
        handle: &mut Handle<D>,
        state: &TextInputState,
        purposes: &mut PurposeMapper,
    ) {
        self.draft = ReplyDraft::default();
        match &mut self.protocol {
            ImProtocol::V1 { context, serial } => {
                let data: Arc<dyn ObjectData<D>> = Arc::new(v1::ContextData { im: key });
                let Ok(id) = handle.create_object(
                    self.resource.client_id(),
                    &ZWP_INPUT_METHOD_CONTEXT_V1_INTERFACE,
                    1,
                    data,
                ) else {
                    return;
                };
                post_event(
                    handle,
                    zwp_input_method_v1::Event::Activate { id: id.clone() }
                        .into_message(self.resource.clone()),
                );
                *context = Some(id);
                *serial = 0;
            }
            ImProtocol::V2 { .. } => post_event(
                handle,
                zwp_input_method_v2::Event::Activate.into_message(self.resource.clone()),
            ),
        }
        self.active = true;
        self.send_state(handle, state, StateChanges::all(), purposes);
    }

    pub(crate) fn deactivate<D>(&mut self, handle: &mut Handle<D>) {
        if !self.active {
            return;
        }
        self.active = false;
        self.draft = ReplyDraft::default();
        match &mut self.protocol {
            ImProtocol::V1 { context, .. } => {
                if let Some(context) = context.take() {
                    post_event(
                        handle,
                        zwp_input_method_v1::Event::Deactivate { context }
                            .into_message(self.resource.clone()),
                    );
                }
            }
            ImProtocol::V2 { done_count } => {
                post_event(
                    handle,
                    zwp_input_method_v2::Event::Deactivate.into_message(self.resource.clone()),
                );
                post_event(handle, zwp_input_method_v2::Event::Done.into_message(self.resource.clone()));
                *done_count += 1;
            }
        }
    }

    /// Send the fields named by `changes`, closed by `commit_state` or `done`
    pub(crate) fn send_state<D>(
        &mut self,
        handle: &mut Handle<D>,
        state: &TextInputState,
        changes: StateChanges,
        purposes: &mut PurposeMapper,
    ) {
        if !self.active {
            return;
        }
        match &mut self.protocol {
            ImProtocol::V1 { context: None, .. } => {}
            ImProtocol::V1 { context: Some(context), serial } => {
                use zwp_input_method_context_v1::Event;
                let mut send = |event: Event| post_event(handle, event.into_message(context.clone()));
                if changes.contains(StateChanges::SURROUNDING_TEXT) {
                    send(Event::SurroundingText {
                        text: state.surrounding_text.clone(),
                        cursor: state.cursor as u32,
                        anchor: state.anchor as u32,
                    });
                }
                if changes.contains(StateChanges::CONTENT_TYPE) {
                    send(Event::ContentType {
                        hint: state.content_hints.bits(),
                        purpose: purposes.legacy(state.content_purpose),
                    });
                }
                if changes.contains(StateChanges::PREFERRED_LANGUAGE) {
                    send(Event::PreferredLanguage { language: state.preferred_language.clone() });
                }
                send(Event::CommitState { serial: *serial });
                *serial = serial.wrapping_add(1);
            }
            ImProtocol::V2 { done_count } => {
                use zwp_input_method_v2::Event;
                let resource = &self.resource;
                let mut send = |event: Event| post_event(handle, event.into_message(resource.clone()));
                if changes.contains(StateChanges::SURROUNDING_TEXT) {
                    send(Event::SurroundingText {
                        text: state.surrounding_text.clone(),
                        cursor: state.cursor as u32,
                        anchor: state.anchor as u32,
                    });
                }
                if changes.intersects(StateChanges::SURROUNDING_TEXT | StateChanges::CHANGE_CAUSE) {
                    send(Event::TextChangeCause { cause: state.change_cause.to_v3() });
                }
                if changes.contains(StateChanges::CONTENT_TYPE) {
                    send(Event::ContentType {
                        hint: ContentHint::from_bits_truncate(state.content_hints.bits()),
                        purpose: state.content_purpose.to_v3(),
                    });
                }
                send(Event::Done);
                *done_count += 1;
            }
        }
    }

    /// The text input asked to start over: v1 gets `reset`, both get the full state
    pub(crate) fn reset<D>(
        &mut self,
        handle: &mut Handle<D>,
        state: &TextInputState,
        purposes: &mut PurposeMapper,
    ) {
        if !self.active {
            return;
        }
        if let ImProtocol::V1 { context: Some(context), .. } = &self.protocol {
            post_event(
                handle,
                zwp_input_method_context_v1::Event::Reset.into_message(context.clone()),
            );
        }
        self.send_state(handle, state, StateChanges::all(), purposes);
    }

    pub(crate) fn invoke_action<D>(&self, handle: &mut Handle<D>, button: u32, index: u32) {
        if let ImProtocol::V1 { context: Some(context), .. } = &self.protocol {
            post_event(
                handle,
                zwp_input_method_context_v1::Event::InvokeAction { button, index }
                    .into_message(context.clone()),
            );
        }
    }
}

/// Number of modifier names in a `modifiers_map` array
fn modifier_count(map: &[u8]) -> usize {
    map.split(|byte| *byte == 0).filter(|name| !name.is_empty()).count()
}

impl Core {
    /// The bound input method
    pub fn input_method(&self) -> Option<&InputMethod> {
        self.bridge.input_method.and_then(|key| self.input_methods.get(key))
    }

    /// Whether key events must go to the input method instead of the focused client
    pub fn has_active_im_grab(&self) -> bool {
        self.active_grab().is_some()
    }

    /// Hand a key event to the input method if it grabs the keyboard
    pub fn route_key<D>(&mut self, handle: &mut Handle<D>, event: KeyEvent) -> KeyRouting {
        match self.active_grab() {
            Some(grab) => {
                grab.send_key(handle, event);
                KeyRouting::Grabbed
            }
            None => KeyRouting::Passthrough,
        }
    }

    /// Record the modifier state and hand it to the input method if it grabs
    /// the keyboard
    pub fn route_modifiers<D>(
        &mut self,
        handle: &mut Handle<D>,
        modifiers: ModifiersState,
    ) -> KeyRouting {
        self.bridge.modifiers = modifiers;
        let active = self.has_active_im_grab();
        if let Some(grab) = self.input_method().and_then(|im| im.grab.as_ref()) {
            grab.send_modifiers(handle, modifiers);
        }
        if active {
            KeyRouting::Grabbed
        } else {
            KeyRouting::Passthrough
        }
    }

    fn active_grab(&self) -> Option<&KeyboardGrab> {
        self.input_method().filter(|im| im.active).and_then(|im| im.grab.as_ref())
    }

    /// Bind a new input method, `None` if one is bound already
    pub(crate) fn bind_input_method<D: AsMut<Core> + 'static>(
        &mut self,
        handle: &mut Handle<D>,
        resource: ObjectId,
        version: InputMethodVersion,
    ) -> Option<InputMethodId> {
        if let Some(bound) = self.input_method() {
            log::debug!("{} refused, {} is bound", resource, bound.resource);
            return None;
        }
        log::debug!("Input method {} bound", resource);
        let key = self.input_methods.insert(InputMethod::new(resource, version));
        self.bridge.input_method = Some(key);
        self.activate_input_method(handle);
        self.update_bridge_state();
        Some(key)
    }

    pub(crate) fn input_method_destroyed(&mut self, key: InputMethodId) {
        let Some(im) = self.input_methods.remove(key) else { return };
        log::debug!("Input method {} gone", im.resource);
        if self.bridge.input_method == Some(key) {
            self.bridge.input_method = None;
            self.bridge.sent = None;
        }
        self.forget_popups(key);
        self.update_bridge_state();
    }

    /// The v1 context was destroyed by the input method
    pub(crate) fn context_destroyed(&mut self, key: InputMethodId, id: &ObjectId) {
        if let Some(InputMethod { protocol: ImProtocol::V1 { context, .. }, .. }) =
            self.input_methods.get_mut(key)
        {
            if context.as_ref() == Some(id) {
                *context = None;
            }
        }
    }

    /// The bound and active input method with this key
    fn serving_input_method(&self, key: InputMethodId) -> Option<&InputMethod> {
        if self.bridge.input_method != Some(key) {
            return None;
        }
        self.input_methods.get(key).filter(|im| im.active)
    }

    /// Hand a reply to the active text input
    pub(crate) fn deliver_reply<D>(&mut self, handle: &mut Handle<D>, key: InputMethodId, reply: Reply) {
        if self.serving_input_method(key).is_none() {
            log::debug!("Dropping reply of inactive input method: {:?}", reply);
            return;
        }
        match self.bridge.active.and_then(|active| self.text_inputs.get_mut(active)) {
            Some(text_input) => text_input.deliver(handle, &reply),
            None => log::debug!("Dropping reply, no active text input: {:?}", reply),
        }
    }

    pub(crate) fn forward_im_event<D>(&mut self, handle: &mut Handle<D>, key: InputMethodId, event: ImEvent) {
        if self.serving_input_method(key).is_none() {
            log::debug!("Dropping {:?} of inactive input method", event);
            return;
        }
        if let Some(text_input) = self.bridge.active.and_then(|active| self.text_inputs.get_mut(active)) {
            text_input.send_im_event(handle, event);
        }
    }

    /// Store and forward a modifiers map of the input method.
    ///
    /// A map with too many names is an error about the input method object.
    pub(crate) fn set_modifiers_map<D>(
        &mut self,
        handle: &mut Handle<D>,
        key: InputMethodId,
        map: Vec<u8>,
    ) -> Result<(), RequestError> {
        let Some(im) = self.input_methods.get_mut(key) else { return Ok(()) };
        let count = modifier_count(&map);
        if count > MAX_MODIFIERS {
            return Err(RequestError::on(
                im.resource.clone(),
                InputMethodError::ModifiersMapTooLarge.into(),
                format!("modifiers map has {count} entries, at most {MAX_MODIFIERS} are allowed"),
            ));
        }
        im.modifiers_map = Some(map.clone());
        self.forward_im_event(handle, key, ImEvent::ModifiersMap(map));
        Ok(())
    }

    /// Give the input method a keyboard grab, one at most
    pub(crate) fn grab_keyboard<D>(
        &mut self,
        handle: &mut Handle<D>,
        key: InputMethodId,
        object: ObjectId,
        kind: GrabKind,
    ) -> Result<(), RequestError> {
        let modifiers = self.bridge.modifiers;
        let Some(im) = self.input_methods.get_mut(key) else { return Ok(()) };
        if let Some(grab) = &im.grab {
            return Err(RequestError::on(
                object,
                InputMethodError::KeyboardGrabbed.into(),
                format!("the input method already grabs the keyboard through {}", grab.object),
            ));
        }
        let grab = KeyboardGrab { object, kind };
        grab.send_setup(handle, &self.config, modifiers);
        log::debug!("{} grabs the keyboard through {}", im.resource, grab.object);
        im.grab = Some(grab);
        Ok(())
    }

    pub(crate) fn keyboard_grab_released(&mut self, key: InputMethodId, object: &ObjectId) {
        if let Some(im) = self.input_methods.get_mut(key) {
            if im.grab.as_ref().map_or(false, |grab| &grab.object == object) {
                log::debug!("{} released the keyboard", im.resource);
                im.grab = None;
            }
        }
    }

    pub(crate) fn input_method_mut(&mut self, key: InputMethodId) -> Option<&mut InputMethod> {
        self.input_methods.get_mut(key)
    }
}
