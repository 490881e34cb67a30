//! `zwp_input_method_v1` and its contexts

use std::{os::unix::io::OwnedFd, sync::Arc};

use imbridge_backend::{
    protocol::Message,
    server::{ClientId, GlobalHandler, GlobalId, Handle, ObjectData, ObjectId, RequestError},
};
use imbridge_protocols::{core::wl_keyboard, input_method::v1::zwp_input_method_context_v1::Request};

use super::{grab::GrabKind, ImEvent, InputMethodId, InputMethodVersion, PreeditStyling};
use crate::{
    bad_message,
    error::InputMethodError,
    input_method::grab::{KeyEvent, KeyState, ModifiersState},
    Core,
};

pub(crate) struct InputMethodGlobal;

impl<D: AsMut<Core> + 'static> GlobalHandler<D> for InputMethodGlobal {
    fn bind(
        self: Arc<Self>,
        handle: &mut Handle<D>,
        data: &mut D,
        _: ClientId,
        _: GlobalId,
        object_id: ObjectId,
    ) -> Arc<dyn ObjectData<D>> {
        let im = data.as_mut().bind_input_method(handle, object_id.clone(), InputMethodVersion::V1);
        if im.is_none() {
            handle.post_resource_error(
                object_id,
                InputMethodError::AlreadyBound.into(),
                "an input method is already bound",
            );
        }
        Arc::new(InputMethodData { im })
    }
}

/// `zwp_input_method_v1`, `None` for refused binds
struct InputMethodData {
    im: Option<InputMethodId>,
}

impl<D: AsMut<Core> + 'static> ObjectData<D> for InputMethodData {
    fn request(
        self: Arc<Self>,
        _: &mut Handle<D>,
        _: &mut D,
        _: ClientId,
        _: Message<ObjectId, OwnedFd>,
    ) -> Result<Option<Arc<dyn ObjectData<D>>>, RequestError> {
        // the interface has no requests, the backend rejects any opcode
        Ok(None)
    }

    fn destroyed(self: Arc<Self>, _: &mut Handle<D>, data: &mut D, _: ClientId, _: ObjectId) {
        if let Some(im) = self.im {
            data.as_mut().input_method_destroyed(im);
        }
    }
}

/// `zwp_input_method_context_v1`, one per activation
pub(crate) struct ContextData {
    pub(crate) im: InputMethodId,
}

impl<D: AsMut<Core> + 'static> ObjectData<D> for ContextData {
    fn request(
        self: Arc<Self>,
        handle: &mut Handle<D>,
        data: &mut D,
        _: ClientId,
        msg: Message<ObjectId, OwnedFd>,
    ) -> Result<Option<Arc<dyn ObjectData<D>>>, RequestError> {
        let context = msg.sender_id.clone();
        let request = match Request::parse(msg) {
            Ok(request) => request,
            Err(err) => {
                bad_message(handle, err);
                return Ok(None);
            }
        };
        let core = data.as_mut();
        let current = core.input_methods.get(self.im).and_then(|im| im.context()) == Some(&context);
        match request {
            Request::Destroy => {}
            Request::GrabKeyboard { keyboard } => {
                core.grab_keyboard(handle, self.im, keyboard, GrabKind::Keyboard)?;
                return Ok(Some(Arc::new(KeyboardGrabData { im: self.im })));
            }
            // keys and modifiers do not depend on the activation
            Request::Key { serial, time, key, state } => {
                core.keyboard.key(KeyEvent { serial, time, key, state: KeyState::from_wire(state) });
            }
            Request::Modifiers { serial, mods_depressed, mods_latched, mods_locked, group } => {
                core.keyboard.modifiers(ModifiersState {
                    serial,
                    depressed: mods_depressed,
                    latched: mods_latched,
                    locked: mods_locked,
                    group,
                });
            }
            request if !current => {
                log::debug!("Dropping {:?} from stale context {}", request, context);
            }
            Request::CommitString { text, .. } => {
                if let Some(im) = core.input_method_mut(self.im) {
                    let reply = im.draft.commit_v1(text);
                    core.deliver_reply(handle, self.im, reply);
                }
            }
            Request::PreeditString { text, commit, .. } => {
                if let Some(im) = core.input_method_mut(self.im) {
                    let reply = im.draft.preedit_v1(text, commit);
                    core.deliver_reply(handle, self.im, reply);
                }
            }
            Request::PreeditStyling { index, length, style } => {
                if let Some(im) = core.input_method_mut(self.im) {
                    im.draft.styling.push(PreeditStyling { index, length, style });
                }
            }
            Request::PreeditCursor { index } => {
                if let Some(im) = core.input_method_mut(self.im) {
                    im.draft.cursor = Some(index);
                }
            }
            Request::DeleteSurroundingText { index, length } => {
                if let Some(im) = core.input_method_mut(self.im) {
                    im.draft.set_delete_v1(index, length);
                }
            }
            Request::CursorPosition { index, anchor } => {
                core.forward_im_event(handle, self.im, ImEvent::CursorPosition { index, anchor })
            }
            Request::ModifiersMap { map } => core.set_modifiers_map(handle, self.im, map)?,
            Request::Keysym { time, sym, state, modifiers, .. } => core.forward_im_event(
                handle,
                self.im,
                ImEvent::Keysym { time, sym, state, modifiers },
            ),
            Request::Language { language, .. } => {
                core.forward_im_event(handle, self.im, ImEvent::Language(language))
            }
            Request::TextDirection { direction, .. } => {
                core.forward_im_event(handle, self.im, ImEvent::TextDirection(direction))
            }
        }
        Ok(None)
    }

    fn destroyed(
        self: Arc<Self>,
        _: &mut Handle<D>,
        data: &mut D,
        _: ClientId,
        object_id: ObjectId,
    ) {
        data.as_mut().context_destroyed(self.im, &object_id);
    }
}

/// `wl_keyboard` created by `grab_keyboard`
struct KeyboardGrabData {
    im: InputMethodId,
}

impl<D: AsMut<Core> + 'static> ObjectData<D> for KeyboardGrabData {
    fn request(
        self: Arc<Self>,
        handle: &mut Handle<D>,
        _: &mut D,
        _: ClientId,
        msg: Message<ObjectId, OwnedFd>,
    ) -> Result<Option<Arc<dyn ObjectData<D>>>, RequestError> {
        match wl_keyboard::Request::parse(msg) {
            // release is a destructor
            Ok(wl_keyboard::Request::Release) => Ok(None),
            Err(err) => {
                bad_message(handle, err);
                Ok(None)
            }
        }
    }

    fn destroyed(
        self: Arc<Self>,
        _: &mut Handle<D>,
        data: &mut D,
        _: ClientId,
        object_id: ObjectId,
    ) {
        data.as_mut().keyboard_grab_released(self.im, &object_id);
    }
}
