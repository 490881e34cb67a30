//! `zwp_text_input_manager_v3` and `zwp_text_input_v3`

use std::{os::unix::io::OwnedFd, sync::Arc};

use imbridge_backend::{
    protocol::Message,
    server::{ClientId, GlobalHandler, GlobalId, Handle, ObjectData, ObjectId, RequestError},
};
use imbridge_protocols::text_input::v3::{zwp_text_input_manager_v3, zwp_text_input_v3::Request};

use super::{TextInputId, TextInputLike, TextInputVersion};
use crate::{
    bad_message,
    bridge::Forward,
    error::TextInputError,
    state::{ChangeCause, ContentHints, ContentPurpose, Rect},
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
        match zwp_text_input_manager_v3::Request::parse(msg) {
            Ok(zwp_text_input_manager_v3::Request::GetTextInput { id, .. }) => {
                let key = data.as_mut().create_text_input(handle, id, TextInputVersion::V3);
                Ok(Some(Arc::new(TextInputData { key })))
            }
            Ok(zwp_text_input_manager_v3::Request::Destroy) => Ok(None),
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
            Request::Destroy => {}
            Request::Enable => text_input.enable(),
            Request::Disable => text_input.disable(),
            Request::SetSurroundingText { text, cursor, anchor } => text_input
                .pending
                .set_surrounding_text(text, cursor.into(), anchor.into())
                .map_err(|err| {
                    RequestError::new(TextInputError::InvalidSurroundingText.into(), err.to_string())
                })?,
            Request::SetTextChangeCause { cause } => {
                text_input.pending.change_cause = ChangeCause::from_v3(cause.into());
            }
            Request::SetContentType { hint, purpose } => {
                text_input.pending.content_hints = ContentHints::from_wire(hint.into());
                text_input.pending.content_purpose = ContentPurpose::from_v3(purpose.into());
            }
            Request::SetCursorRectangle { x, y, width, height } => {
                text_input.pending.cursor_rectangle = Rect::new(x, y, width, height);
            }
            Request::Commit => {
                let changes = text_input.commit();
                core.text_input_changed(handle, self.key, changes, Some(Forward::Diff));
                if let Some(text_input) = core.text_inputs.get_mut(self.key) {
                    text_input.acknowledge_commit(handle);
                }
            }
        }
        Ok(None)
    }

    fn destroyed(self: Arc<Self>, handle: &mut Handle<D>, data: &mut D, _: ClientId, _: ObjectId) {
        data.as_mut().text_input_destroyed(handle, self.key);
    }
}
