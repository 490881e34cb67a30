//! Keyboard grabs of the input method
//!
//! While an input method holds a grab and is active, the compositor hands it
//! the keys of the seat instead of sending them to the focused client.

use std::os::unix::io::AsRawFd;

use imbridge_backend::server::{Handle, ObjectId};
use imbridge_protocols::{
    core::wl_keyboard::{self, KeymapFormat},
    input_method::v2::zwp_input_method_keyboard_grab_v2,
};

use crate::{config::Config, post_event};

/// State of a key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyState {
    /// the key is not pressed
    Released,
    /// the key is pressed
    Pressed,
}

impl KeyState {
    pub(crate) fn from_wire(raw: u32) -> Self {
        if raw == 0 {
            KeyState::Released
        } else {
            KeyState::Pressed
        }
    }

    fn to_wire(self) -> u32 {
        match self {
            KeyState::Released => 0,
            KeyState::Pressed => 1,
        }
    }
}

/// A key press or release
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    /// serial of the event
    pub serial: u32,
    /// timestamp in milliseconds
    pub time: u32,
    /// evdev key code
    pub key: u32,
    /// pressed or released
    pub state: KeyState,
}

/// XKB modifier state
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ModifiersState {
    /// serial of the event
    pub serial: u32,
    /// physically pressed modifiers
    pub depressed: u32,
    /// latched modifiers
    pub latched: u32,
    /// locked modifiers
    pub locked: u32,
    /// keyboard layout
    pub group: u32,
}

/// Outcome of [`Core::route_key`](crate::Core::route_key)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyRouting {
    /// the input method received the event, the focused client must not
    Grabbed,
    /// no grab, the compositor delivers the event as usual
    Passthrough,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum GrabKind {
    /// `wl_keyboard` from `zwp_input_method_context_v1.grab_keyboard`
    Keyboard,
    /// `zwp_input_method_keyboard_grab_v2`
    GrabV2,
}

/// A grab object of the bound input method
#[derive(Debug)]
pub(crate) struct KeyboardGrab {
    pub(crate) object: ObjectId,
    pub(crate) kind: GrabKind,
}

impl KeyboardGrab {
    /// Send the keymap, repeat info and modifiers the grab starts with
    pub(crate) fn send_setup<D>(
        &self,
        handle: &mut Handle<D>,
        config: &Config,
        modifiers: ModifiersState,
    ) {
        let version = handle.object_info(self.object.clone()).map_or(1, |info| info.version);
        if let Some(keymap) = &config.keymap {
            let (fd, size) = (keymap.fd().as_raw_fd(), keymap.size());
            let msg = match self.kind {
                GrabKind::Keyboard => wl_keyboard::Event::Keymap {
                    format: KeymapFormat::XkbV1,
                    fd,
                    size,
                }
                .into_message(self.object.clone()),
                GrabKind::GrabV2 => zwp_input_method_keyboard_grab_v2::Event::Keymap {
                    format: KeymapFormat::XkbV1,
                    fd,
                    size,
                }
                .into_message(self.object.clone()),
            };
            post_event(handle, msg);
        }
        let repeat = config.repeat_info;
        match self.kind {
            GrabKind::Keyboard if version >= wl_keyboard::EVT_REPEAT_INFO_SINCE => post_event(
                handle,
                wl_keyboard::Event::RepeatInfo { rate: repeat.rate, delay: repeat.delay }
                    .into_message(self.object.clone()),
            ),
            GrabKind::Keyboard => {}
            GrabKind::GrabV2 => post_event(
                handle,
                zwp_input_method_keyboard_grab_v2::Event::RepeatInfo {
                    rate: repeat.rate,
                    delay: repeat.delay,
                }
                .into_message(self.object.clone()),
            ),
        }
        self.send_modifiers(handle, modifiers);
    }

    pub(crate) fn send_key<D>(&self, handle: &mut Handle<D>, event: KeyEvent) {
        let KeyEvent { serial, time, key, state } = event;
        let state = state.to_wire();
        let msg = match self.kind {
            GrabKind::Keyboard => wl_keyboard::Event::Key { serial, time, key, state }
                .into_message(self.object.clone()),
            GrabKind::GrabV2 => {
                zwp_input_method_keyboard_grab_v2::Event::Key { serial, time, key, state }
                    .into_message(self.object.clone())
            }
        };
        post_event(handle, msg);
    }

    pub(crate) fn send_modifiers<D>(&self, handle: &mut Handle<D>, modifiers: ModifiersState) {
        let ModifiersState { serial, depressed, latched, locked, group } = modifiers;
        let msg = match self.kind {
            GrabKind::Keyboard => wl_keyboard::Event::Modifiers {
                serial,
                mods_depressed: depressed,
                mods_latched: latched,
                mods_locked: locked,
                group,
            }
            .into_message(self.object.clone()),
            GrabKind::GrabV2 => zwp_input_method_keyboard_grab_v2::Event::Modifiers {
                serial,
                mods_depressed: depressed,
                mods_latched: latched,
                mods_locked: locked,
                group,
            }
            .into_message(self.object.clone()),
        };
        post_event(handle, msg);
    }
}
