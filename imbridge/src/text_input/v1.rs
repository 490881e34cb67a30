//! `zwp_text_input_manager_v1` and `zwp_text_input_v1`
//!
//! A v1 text input is activated on one surface and only ever enters that
//! surface. State requests apply at once, `commit_state` hands the batch to
//! the input method.

use std::{os::unix::io::OwnedFd, sync::Arc};

use imbridge_backend::{
    protocol::Message,
    server::{ClientId, GlobalHandler, GlobalId, Handle, ObjectData, ObjectId, RequestError},
};
use imbridge_protocols::text_input::v1::{zwp_text_input_manager_v1, zwp_text_input_v1::Request};

use super::{Protocol, TextInputId, TextInputLike, TextInputVersion};
use crate::{
    bad_message,
    bridge::Forward,
    compositor::SurfaceRef,
    error::TextInputError,
    state::{ContentHints, ContentPurpose, Rect, StateChanges},
    Core,
};

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
        match zwp_text_input_manager_v1::Request::parse(msg) {
            Ok(zwp_text_input_manager_v1::Request::CreateTextInput { id }) => {
                let key = data.as_mut().create_text_input(handle, id, TextInputVersion::V1);
                Ok(Some(Arc::new(TextInputData { key })))
            }
            Err(err) => {
                bad_message(handle, err);
                Ok(None)
            }
        }
    }

    fn destroyed(self: Arc<Self>, _: &mut Handle<D>, _: &mut D, _: ClientId, _: ObjectId) {}
}

struct TextInputData {
    key: TextInputId,
}

impl<D: AsMut<Core> + 'static> ObjectData<D> for TextInputData {
    fn request(
        self: Arc<Self>,
        handle: &mut Handle<D>,
        data: &mut D,
        _: ClientId,
        msg: Message<ObjectId, OwnedFd>,
    ) -> Result<Option<Arc<dyn ObjectData<D>>>, RequestError> {
        let request = match Request::parse(msg) {
            Ok(request) => request,
            Err(err) => {
                bad_message(handle, err);
                return Ok(None);
            }
        };
        let core = data.as_mut();
        let Some(text_input) = core.text_inputs.get_mut(self.key) else { return Ok(None) };
        match request {
            Request::Activate { surface, .. } => {
                let Ok(surface) = SurfaceRef::new(surface) else { return Ok(None) };
                text_input.set_surface(Some(surface));
                text_input.enable();
                let changes = text_input.commit() | StateChanges::ENABLED;
                core.sync_enter(handle, self.key);
                core.text_input_changed(handle, self.key, changes, None);
                return Ok(None);
            }
            Request::Deactivate { .. } => {
                text_input.disable();
                text_input.set_surface(None);
                let changes = text_input.commit();
                core.sync_enter(handle, self.key);
                core.text_input_changed(handle, self.key, changes, None);
                return Ok(None);
            }
            Request::ShowInputPanel => {
                core.input_panel_requested(self.key, true);
                return Ok(None);
            }
            Request::HideInputPanel => {
                core.input_panel_requested(self.key, false);
                return Ok(None);
            }
            Request::Reset => {
                core.text_input_reset(handle, self.key);
                return Ok(None);
            }
            Request::InvokeAction { button, index } => {
                core.invoke_action(handle, self.key, button, index);
                return Ok(None);
            }
            Request::CommitState { serial } => {
                if let Protocol::V1 { commit_serial, .. } = &mut text_input.protocol {
                    *commit_serial = serial;
                }
                core.text_input_changed(handle, self.key, StateChanges::empty(), Some(Forward::Diff));
                return Ok(None);
            }
            Request::SetSurroundingText { text, cursor, anchor } => text_input
                .pending
                .set_surrounding_text(text, cursor.into(), anchor.into())
                .map_err(|err| {
                    RequestError::new(TextInputError::InvalidSurroundingText.into(), err.to_string())
                })?,
            Request::SetContentType { hint, purpose } => {
                text_input.pending.content_hints = ContentHints::from_wire(hint.into());
                text_input.pending.content_purpose = ContentPurpose::from_legacy(purpose.into());
            }
            Request::SetCursorRectangle { x, y, width, height } => {
                text_input.pending.cursor_rectangle = Rect::new(x, y, width, height);
            }
            Request::SetPreferredLanguage { language } => {
                text_input.pending.preferred_language = language;
            }
        }
        let changes = text_input.commit();
        core.text_input_changed(handle, self.key, changes, None);
        Ok(None)
    }

    fn destroyed(self: Arc<Self>, handle: &mut Handle<D>, data: &mut D, _: ClientId, _: ObjectId) {
        data.as_mut().text_input_destroyed(handle, self.key);
    }
}
