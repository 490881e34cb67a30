//! `input-method-unstable-v1`

use imbridge_backend::protocol::{
    AllowNull::No,
    ArgumentType::*,
    Interface,
};

use crate::{
    core::{WL_KEYBOARD_INTERFACE, WL_OUTPUT_INTERFACE, WL_SURFACE_INTERFACE},
    creates, destructor, msg, objects,
};

/// `zwp_input_method_context_v1`
pub static ZWP_INPUT_METHOD_CONTEXT_V1_INTERFACE: Interface = Interface {
    name: "zwp_input_method_context_v1",
    version: 1,
    requests: &[
        destructor(msg("destroy", &[])),
        msg("commit_string", &[Uint, Str(No)]),
        msg("preedit_string", &[Uint, Str(No), Str(No)]),
        msg("preedit_styling", &[Uint, Uint, Uint]),
        msg("preedit_cursor", &[Int]),
        msg("delete_surrounding_text", &[Int, Uint]),
        msg("cursor_position", &[Int, Int]),
        msg("modifiers_map", &[Array]),
        msg("keysym", &[Uint, Uint, Uint, Uint, Uint]),
        creates(msg("grab_keyboard", &[NewId]), &WL_KEYBOARD_INTERFACE),
        msg("key", &[Uint, Uint, Uint, Uint]),
        msg("modifiers", &[Uint, Uint, Uint, Uint, Uint]),
        msg("language", &[Uint, Str(No)]),
        msg("text_direction", &[Uint, Uint]),
    ],
    events: &[
        msg("surrounding_text", &[Str(No), Uint, Uint]),
        msg("reset", &[]),
        msg("content_type", &[Uint, Uint]),
        msg("invoke_action", &[Uint, Uint]),
        msg("commit_state", &[Uint]),
        msg("preferred_language", &[Str(No)]),
    ],
};

/// `zwp_input_method_v1`
pub static ZWP_INPUT_METHOD_V1_INTERFACE: Interface = Interface {
    name: "zwp_input_method_v1",
    version: 1,
    requests: &[],
    events: &[
        creates(msg("activate", &[NewId]), &ZWP_INPUT_METHOD_CONTEXT_V1_INTERFACE),
        objects(msg("deactivate", &[Object(No)]), &[&ZWP_INPUT_METHOD_CONTEXT_V1_INTERFACE]),
    ],
};

/// `zwp_input_panel_v1`
pub static ZWP_INPUT_PANEL_V1_INTERFACE: Interface = Interface {
    name: "zwp_input_panel_v1",
    version: 1,
    requests: &[objects(
        creates(msg("get_input_panel_surface", &[NewId, Object(No)]), &ZWP_INPUT_PANEL_SURFACE_V1_INTERFACE),
        &[&WL_SURFACE_INTERFACE],
    )],
    events: &[],
};

/// `zwp_input_panel_surface_v1`
pub static ZWP_INPUT_PANEL_SURFACE_V1_INTERFACE: Interface = Interface {
    name: "zwp_input_panel_surface_v1",
    version: 1,
    requests: &[
        objects(msg("set_toplevel", &[Object(No), Uint]), &[&WL_OUTPUT_INTERFACE]),
        msg("set_overlay_panel", &[]),
    ],
    events: &[],
};

/// Context of one activation of the input method
///
/// Created by the compositor in `zwp_input_method_v1.activate`. Every request
/// carrying a serial must use the one of the last `commit_state` event.
pub mod zwp_input_method_context_v1 {
    use std::os::unix::io::{OwnedFd, RawFd};

    use imbridge_backend::{
        message,
        protocol::{Argument, Message},
        server::ObjectId,
    };

    use crate::{parse_with, string_arg, DispatchError};

    /// Requests of `zwp_input_method_context_v1`
    #[derive(Debug)]
    pub enum Request {
        /// Destroy the context
        Destroy,
        /// Text to insert
        CommitString {
            /// serial of the last `commit_state`
            serial: u32,
            /// the text
            text: String,
        },
        /// Pre-edit string
        PreeditString {
            /// serial of the last `commit_state`
            serial: u32,
            /// the text
            text: String,
            /// text to commit if the pre-edit is interrupted
            commit: String,
        },
        /// Styling of the next pre-edit string
        PreeditStyling {
            /// byte index
            index: u32,
            /// byte length
            length: u32,
            /// style, as `zwp_text_input_v1.preedit_style`
            style: u32,
        },
        /// Cursor of the next pre-edit string
        PreeditCursor {
            /// byte index
            index: i32,
        },
        /// Delete text around the cursor
        DeleteSurroundingText {
            /// start of the deletion relative to the cursor
            index: i32,
            /// bytes to delete
            length: u32,
        },
        /// Cursor and anchor after the next commit
        CursorPosition {
            /// cursor byte index
            index: i32,
            /// anchor byte index
            anchor: i32,
        },
        /// Keysym to modifier mapping
        ModifiersMap {
            /// null-separated modifier names
            map: Vec<u8>,
        },
        /// Key event as a keysym
        Keysym {
            /// serial of the last `commit_state`
            serial: u32,
            /// timestamp
            time: u32,
            /// the keysym
            sym: u32,
            /// pressed or released
            state: u32,
            /// modifier mask
            modifiers: u32,
        },
        /// Grab the hardware keyboard
        GrabKeyboard {
            /// the keyboard receiving the grabbed keys
            keyboard: ObjectId,
        },
        /// Forward a grabbed key to the focused client
        Key {
            /// serial of the key event
            serial: u32,
            /// timestamp
            time: u32,
            /// the key
            key: u32,
            /// pressed or released
            state: u32,
        },
        /// Forward grabbed modifiers to the focused client
        Modifiers {
            /// serial of the modifiers event
            serial: u32,
            /// depressed modifiers
            mods_depressed: u32,
            /// latched modifiers
            mods_latched: u32,
            /// locked modifiers
            mods_locked: u32,
            /// keyboard layout
            group: u32,
        },
        /// Language of the input
        Language {
            /// serial of the last `commit_state`
            serial: u32,
            /// RFC-3066 tag
            language: String,
        },
        /// Text direction of the input
        TextDirection {
            /// serial of the last `commit_state`
            serial: u32,
            /// auto 0, ltr 1, rtl 2
            direction: u32,
        },
    }

    impl Request {
        /// Decode a request
        pub fn parse(msg: Message<ObjectId, OwnedFd>) -> Result<Self, DispatchError> {
            parse_with(msg, &super::ZWP_INPUT_METHOD_CONTEXT_V1_INTERFACE, |opcode, args| {
                match opcode {
                    0 => Some(Request::Destroy),
                    1 => Some(Request::CommitString { serial: args.uint()?, text: args.string()? }),
                    2 => Some(Request::PreeditString {
                        serial: args.uint()?,
                        text: args.string()?,
                        commit: args.string()?,
                    }),
                    3 => Some(Request::PreeditStyling {
                        index: args.uint()?,
                        length: args.uint()?,
                        style: args.uint()?,
                    }),
                    4 => Some(Request::PreeditCursor { index: args.int()? }),
                    5 => Some(Request::DeleteSurroundingText {
                        index: args.int()?,
                        length: args.uint()?,
                    }),
                    6 => Some(Request::CursorPosition { index: args.int()?, anchor: args.int()? }),
                    7 => Some(Request::ModifiersMap { map: args.array()? }),
                    8 => Some(Request::Keysym {
                        serial: args.uint()?,
                        time: args.uint()?,
                        sym: args.uint()?,
                        state: args.uint()?,
                        modifiers: args.uint()?,
                    }),
                    9 => Some(Request::GrabKeyboard { keyboard: args.new_id()? }),
                    10 => Some(Request::Key {
                        serial: args.uint()?,
                        time: args.uint()?,
                        key: args.uint()?,
                        state: args.uint()?,
                    }),
                    11 => Some(Request::Modifiers {
                        serial: args.uint()?,
                        mods_depressed: args.uint()?,
                        mods_latched: args.uint()?,
                        mods_locked: args.uint()?,
                        group: args.uint()?,
                    }),
                    12 => Some(Request::Language { serial: args.uint()?, language: args.string()? }),
                    13 => Some(Request::TextDirection {
                        serial: args.uint()?,
                        direction: args.uint()?,
                    }),
                    _ => None,
                }
            })
        }
    }

    /// Events of `zwp_input_method_context_v1`
    #[derive(Debug)]
    pub enum Event {
        /// Surrounding text of the text input
        SurroundingText {
            /// the text
            text: String,
            /// byte offset of the cursor
            cursor: u32,
            /// byte offset of the selection anchor
            anchor: u32,
        },
        /// The text input was reset
        Reset,
        /// Content hint and purpose of the text input, with `zwp_text_input_v1` values
        ContentType {
            /// the hint
            hint: u32,
            /// the purpose
            purpose: u32,
        },
        /// Action on the pre-edit text
        InvokeAction {
            /// button
            button: u32,
            /// byte index in the pre-edit text
            index: u32,
        },
        /// End of a batch of state events
        CommitState {
            /// serial to use in the following requests
            serial: u32,
        },
        /// Preferred language of the text input
        PreferredLanguage {
            /// RFC-3066 tag
            language: String,
        },
    }

    impl Event {
        /// Encode the event as sent by `sender_id`
        pub fn into_message(self, sender_id: ObjectId) -> Message<ObjectId, RawFd> {
            match self {
                Event::SurroundingText { text, cursor, anchor } => message!(
                    sender_id,
                    0,
                    [string_arg(text), Argument::Uint(cursor), Argument::Uint(anchor)]
                ),
                Event::Reset => message!(sender_id, 1, []),
                Event::ContentType { hint, purpose } => {
                    message!(sender_id, 2, [Argument::Uint(hint), Argument::Uint(purpose)])
                }
                Event::InvokeAction { button, index } => {
                    message!(sender_id, 3, [Argument::Uint(button), Argument::Uint(index)])
                }
                Event::CommitState { serial } => message!(sender_id, 4, [Argument::Uint(serial)]),
                Event::PreferredLanguage { language } => {
                    message!(sender_id, 5, [string_arg(language)])
                }
            }
        }
    }
}

/// The input method, bound by the input method client
pub mod zwp_input_method_v1 {
    use std::os::unix::io::RawFd;

    use imbridge_backend::{
        message,
        protocol::{Argument, Message},
        server::ObjectId,
    };

    /// Events of `zwp_input_method_v1`
    #[derive(Debug)]
    pub enum Event {
        /// A text input was activated
        Activate {
            /// the new context, created with
            /// [`Handle::create_object`](imbridge_backend::server::Handle::create_object)
            id: ObjectId,
        },
        /// The text input of a context was deactivated
        Deactivate {
            /// the context
            context: ObjectId,
        },
    }

    impl Event {
        /// Encode the event as sent by `sender_id`
        pub fn into_message(self, sender_id: ObjectId) -> Message<ObjectId, RawFd> {
            match self {
                Event::Activate { id } => message!(sender_id, 0, [Argument::NewId(id)]),
                Event::Deactivate { context } => message!(sender_id, 1, [Argument::Object(context)]),
            }
        }
    }
}

/// Factory of panel surfaces
pub mod zwp_input_panel_v1 {
    use std::os::unix::io::OwnedFd;

    use imbridge_backend::{protocol::Message, server::ObjectId};

    use crate::{parse_with, DispatchError};

    /// Requests of `zwp_input_panel_v1`
    #[derive(Debug)]
    pub enum Request {
        /// Give the panel role to a surface
        GetInputPanelSurface {
            /// the new panel surface
            id: ObjectId,
            /// the surface
            surface: ObjectId,
        },
    }

    impl Request {
        /// Decode a request
        pub fn parse(msg: Message<ObjectId, OwnedFd>) -> Result<Self, DispatchError> {
            parse_with(msg, &super::ZWP_INPUT_PANEL_V1_INTERFACE, |opcode, args| match opcode {
                0 => Some(Request::GetInputPanelSurface {
                    id: args.new_id()?,
                    surface: args.object()?,
                }),
                _ => None,
            })
        }
    }
}

/// Surface with the input panel role
pub mod zwp_input_panel_surface_v1 {
    use std::os::unix::io::OwnedFd;

    use imbridge_backend::{
        protocol::{Message, WEnum},
        server::ObjectId,
    };

    use crate::{parse_with, DispatchError};

    /// Position of a top-level panel
    #[repr(u32)]
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    #[non_exhaustive]
    pub enum Position {
        /// centered at the bottom of the output
        CenterBottom = 0,
    }

    impl std::convert::TryFrom<u32> for Position {
        type Error = ();
        fn try_from(val: u32) -> Result<Position, ()> {
            match val {
                0 => Ok(Position::CenterBottom),
                _ => Err(()),
            }
        }
    }

    impl std::convert::From<Position> for u32 {
        fn from(val: Position) -> u32 {
            val as u32
        }
    }

    /// Requests of `zwp_input_panel_surface_v1`
    #[derive(Debug)]
    pub enum Request {
        /// Show the surface as a keyboard on an output
        SetToplevel {
            /// the output
            output: ObjectId,
            /// where on the output
            position: WEnum<Position>,
        },
        /// Show the surface next to the cursor of the text input
        SetOverlayPanel,
    }

    impl Request {
        /// Decode a request
        pub fn parse(msg: Message<ObjectId, OwnedFd>) -> Result<Self, DispatchError> {
            parse_with(msg, &super::ZWP_INPUT_PANEL_SURFACE_V1_INTERFACE, |opcode, args| {
                match opcode {
                    0 => Some(Request::SetToplevel {
                        output: args.object()?,
                        position: args.uint()?.into(),
                    }),
                    1 => Some(Request::SetOverlayPanel),
                    _ => None,
                }
            })
        }
    }
}
