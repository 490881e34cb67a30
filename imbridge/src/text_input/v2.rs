//! `zwp_text_input_manager_v2` and `zwp_text_input_v2`
//!
//! State requests apply at once. `update_state` tells the compositor the
//! client is done with a batch, and is ignored when it answers an older
//! `enter` or `leave` than the last one sent.

use std::{os::unix::io::OwnedFd, sync::Arc};

use imbridge_backend::{
    protocol::{Message, WEnum},
    server::{ClientId, GlobalHandler, GlobalId, Handle, ObjectData, ObjectId, RequestError},
};
use imbridge_protocols::text_input::v2::{
    zwp_text_input_manager_v2,
    zwp_text_input_v2::{Request, UpdateState},
};

use super::{TextInputId, TextInputLike, TextInputVersion};
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
        match zwp_text_input_manager_v2::Request::parse(msg) {
            Ok(zwp_text_input_manager_v2::Request::GetTextInput { id, .. }) => {
                let key = data.as_mut().create_text_input(handle, id, TextInputVersion::V2);
                Ok(Some(Arc::new(TextInputData { key })))
            }
            Ok(zwp_text_input_manager_v2::Request::Destroy) => Ok(None),
            Err(err) => {
                bad_message(handle, err);
                Ok(None)
            }
        }
    }

    fn destroyed(self: Arc<Self>, _: &mut Handle<D>, _: &mut D, _: ClientId, _: ObjectId) {}
}

/// How an `update_state` reason is forwarded to the input method
fn forward_for(reason: WEnum<UpdateState>) -> Forward {
    match reason {
        WEnum::Value(UpdateState::Change) => Forward::Diff,
        WEnum::Value(UpdateState::Full) => Forward::Full,
        // switching widgets starts a new composition, like a reset
        WEnum::Value(UpdateState::Reset) | WEnum::Value(UpdateState::Enter) => Forward::Reset,
        WEnum::Value(_) | WEnum::Unknown(_) => Forward::Full,
    }
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
            Request::Destroy => return Ok(None),
            Request::Enable { surface } => {
                let Ok(surface) = SurfaceRef::new(surface) else { return Ok(None) };
                text_input.set_surface(Some(surface));
                text_input.enable();
                // enabling again on another surface also counts
                let changes = text_input.commit() | StateChanges::ENABLED;
                core.text_input_changed(handle, self.key, changes, None);
                return Ok(None);
            }
            Request::Disable { .. } => text_input.disable(),
            Request::ShowInputPanel => {
                core.input_panel_requested(self.key, true);
                return Ok(None);
            }
            Request::HideInputPanel => {
                core.input_panel_requested(self.key, false);
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
            Request::UpdateState { serial, reason } => {
                let last = text_input.commit_serial();
                if serial != last {
                    log::debug!(
                        "Discarding update_state {serial} of {}, last serial is {last}",
                        text_input.resource
                    );
                    return Ok(None);
                }
                core.text_input_changed(
                    handle,
                    self.key,
                    StateChanges::empty(),
                    Some(forward_for(reason)),
                );
                return Ok(None);
            }
        }
        // setters apply right away
        let changes = text_input.commit();
        core.text_input_changed(handle, self.key, changes, None);
        Ok(None)
    }

    fn destroyed(self: Arc<Self>, handle: &mut Handle<D>, data: &mut D, _: ClientId, _: ObjectId) {
        data.as_mut().text_input_destroyed(handle, self.key);
    }
}
