//! `zwp_input_method_manager_v2` and the objects it creates

use std::{os::unix::io::OwnedFd, sync::Arc};

use imbridge_backend::{
    protocol::Message,
    server::{ClientId, GlobalHandler, GlobalId, Handle, ObjectData, ObjectId, RequestError},
};
use imbridge_protocols::input_method::v2::{
    zwp_input_method_keyboard_grab_v2, zwp_input_method_manager_v2, zwp_input_method_v2,
};

use super::{grab::GrabKind, ImProtocol, InputMethodId, InputMethodVersion, Preedit};
use crate::{bad_message, compositor::Inert, panel::PopupData, post_event, Core};

pub(crate) struct ManagerGlobal;

impl<D: AsMut<Core> + 'static> GlobalHandler<D> for ManagerGlobal {
    fn bind(
        self: Arc<Self>,
        _: &mut Handle<D>,
        _: &mut D,
        _: ClientId,
        _: GlobalId,
        _: ObjectId,
    ) -> Arc<dyn ObjectData<D>> {
        Arc::new(ManagerData)
    }
}

struct ManagerData;

impl<D: AsMut<Core> + 'static> ObjectData<D> for ManagerData {
    fn request(
        self: Arc<Self>,
        handle: &mut Handle<D>,
        data: &mut D,
        _: ClientId,
        msg: Message<ObjectId, OwnedFd>,
    ) -> Result<Option<Arc<dyn ObjectData<D>>>, RequestError> {
        match zwp_input_method_manager_v2::Request::parse(msg) {
            Ok(zwp_input_method_manager_v2::Request::GetInputMethod { input_method, .. }) => {
                let im = data.as_mut().bind_input_method(
                    handle,
                    input_method.clone(),
                    InputMethodVersion::V2,
                );
                if im.is_none() {
                    post_event(
                        handle,
                        zwp_input_method_v2::Event::Unavailable.into_message(input_method),
                    );
                }
                Ok(Some(Arc::new(InputMethodData { im })))
            }
            Ok(zwp_input_method_manager_v2::Request::Destroy) => Ok(None),
            Err(err) => {
                bad_message(handle, err);
                Ok(None)
            }
        }
    }

    fn destroyed(self: Arc<Self>, _: &mut Handle<D>, _: &mut D, _: ClientId, _: ObjectId) {}
}

/// `zwp_input_method_v2`, `None` once it was found unavailable
struct InputMethodData {
    im: Option<InputMethodId>,
}

impl<D: AsMut<Core> + 'static> ObjectData<D> for InputMethodData {
    fn request(
        self: Arc<Self>,
        handle: &mut Handle<D>,
        data: &mut D,
        _: ClientId,
        msg: Message<ObjectId, OwnedFd>,
    ) -> Result<Option<Arc<dyn ObjectData<D>>>, RequestError> {
        use zwp_input_method_v2::Request;

        let request = match Request::parse(msg) {
            Ok(request) => request,
            Err(err) => {
                bad_message(handle, err);
                return Ok(None);
            }
        };
        let Some(key) = self.im else {
            return Ok(match request {
                Request::GetInputPopupSurface { .. } | Request::GrabKeyboard { .. } => {
                    Some(Arc::new(Inert))
                }
                _ => None,
            });
        };
        let core = data.as_mut();
        match request {
            Request::CommitString { text } => {
                if let Some(im) = core.input_method_mut(key) {
                    im.draft.commit = Some(text);
                }
            }
            Request::SetPreeditString { text, cursor_begin, cursor_end } => {
                if let Some(im) = core.input_method_mut(key) {
                    im.draft.preedit = Some(Preedit {
                        text,
                        cursor_begin,
                        cursor_end,
                        ..Default::default()
                    });
                }
            }
            Request::DeleteSurroundingText { before_length, after_length } => {
                if let Some(im) = core.input_method_mut(key) {
                    im.draft.delete = Some((before_length, after_length));
                }
            }
            Request::Commit { serial } => core.commit_input_method(handle, key, serial),
            Request::GetInputPopupSurface { id, surface } => {
                let panel = core.create_popup(handle, key, id, surface)?;
                return Ok(Some(Arc::new(PopupData { panel })));
            }
            Request::GrabKeyboard { keyboard } => {
                core.grab_keyboard(handle, key, keyboard, GrabKind::GrabV2)?;
                return Ok(Some(Arc::new(KeyboardGrabData { im: key })));
            }
            Request::Destroy => {}
        }
        Ok(None)
    }

    fn destroyed(self: Arc<Self>, _: &mut Handle<D>, data: &mut D, _: ClientId, _: ObjectId) {
        if let Some(im) = self.im {
            data.as_mut().input_method_destroyed(im);
        }
    }
}

impl Core {
    /// Apply the pending reply if the input method saw every state sent so far
    fn commit_input_method<D>(&mut self, handle: &mut Handle<D>, key: InputMethodId, serial: u32) {
        let Some(im) = self.input_method_mut(key) else { return };
        let reply = im.draft.take_reply();
        let ImProtocol::V2 { done_count } = im.protocol else { return };
        if serial != done_count {
            log::debug!("Discarding commit {serial} of {}, {done_count} done sent", im.resource);
            return;
        }
        self.deliver_reply(handle, key, reply);
    }
}

/// `zwp_input_method_keyboard_grab_v2`
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
        match zwp_input_method_keyboard_grab_v2::Request::parse(msg) {
            Ok(zwp_input_method_keyboard_grab_v2::Request::Release) => Ok(None),
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
