//! `input-method-unstable-v2`

use imbridge_backend::protocol::{
    AllowNull::No,
    ArgumentType::*,
    Interface,
};

use crate::{
    core::{WL_SEAT_INTERFACE, WL_SURFACE_INTERFACE},
    creates, destructor, msg, objects,
};

/// `zwp_input_method_manager_v2`
pub static ZWP_INPUT_METHOD_MANAGER_V2_INTERFACE: Interface = Interface {
    name: "zwp_input_method_manager_v2",
    version: 1,
    requests: &[
        objects(
            creates(msg("get_input_method", &[Object(No), NewId]), &ZWP_INPUT_METHOD_V2_INTERFACE),
            &[&WL_SEAT_INTERFACE],
        ),
        destructor(msg("destroy", &[])),
    ],
    events: &[],
};

/// `zwp_input_method_v2`
pub static ZWP_INPUT_METHOD_V2_INTERFACE: Interface = Interface {
    name: "zwp_input_method_v2",
    version: 1,
    requests: &[
        msg("commit_string", &[Str(No)]),
        msg("set_preedit_string", &[Str(No), Int, Int]),
        msg("delete_surrounding_text", &[Uint, Uint]),
        msg("commit", &[Uint]),
        objects(
            creates(
                msg("get_input_popup_surface", &[NewId, Object(No)]),
                &ZWP_INPUT_POPUP_SURFACE_V2_INTERFACE,
            ),
            &[&WL_SURFACE_INTERFACE],
        ),
        creates(msg("grab_keyboard", &[NewId]), &ZWP_INPUT_METHOD_KEYBOARD_GRAB_V2_INTERFACE),
        destructor(msg("destroy", &[])),
    ],
    events: &[
        msg("activate", &[]),
        msg("deactivate", &[]),
        msg("surrounding_text", &[Str(No), Uint, Uint]),
        msg("text_change_cause", &[Uint]),
        msg("content_type", &[Uint, Uint]),
        msg("done", &[]),
        msg("unavailable", &[]),
    ],
};

/// `zwp_input_popup_surface_v2`
pub static ZWP_INPUT_POPUP_SURFACE_V2_INTERFACE: Interface = Interface {
    name: "zwp_input_popup_surface_v2",
    version: 1,
    requests: &[destructor(msg("destroy", &[]))],
    events: &[msg("text_input_rectangle", &[Int, Int, Int, Int])],
};

/// `zwp_input_method_keyboard_grab_v2`
pub static ZWP_INPUT_METHOD_KEYBOARD_GRAB_V2_INTERFACE: Interface = Interface {
    name: "zwp_input_method_keyboard_grab_v2",
    version: 1,
    requests: &[destructor(msg("release", &[]))],
    events: &[
        msg("keymap", &[Uint, Fd, Uint]),
        msg("key", &[Uint, Uint, Uint, Uint]),
        msg("modifiers", &[Uint, Uint, Uint, Uint, Uint]),
        msg("repeat_info", &[Int, Int]),
    ],
};

/// Input method objects factory
pub mod zwp_input_method_manager_v2 {
    use std::os::unix::io::OwnedFd;

    use imbridge_backend::{protocol::Message, server::ObjectId};

    use crate::{parse_with, DispatchError};

    /// Requests of `zwp_input_method_manager_v2`
    #[derive(Debug)]
    pub enum Request {
        /// Request an input method object for a seat
        GetInputMethod {
            /// the seat
            seat: ObjectId,
            /// the new input method
            input_method: ObjectId,
        },
        /// Destroy the manager
        Destroy,
    }

    impl Request {
        /// Decode a request
        pub fn parse(msg: Message<ObjectId, OwnedFd>) -> Result<Self, DispatchError> {
            parse_with(msg, &super::ZWP_INPUT_METHOD_MANAGER_V2_INTERFACE, |opcode, args| {
                match opcode {
                    0 => Some(Request::GetInputMethod {
                        seat: args.object()?,
                        input_method: args.new_id()?,
                    }),
                    1 => Some(Request::Destroy),
                    _ => None,
                }
            })
        }
    }
}

/// Input method with double-buffered replies
///
/// `commit_string`, `set_preedit_string` and `delete_surrounding_text` are
/// pending until `commit`, whose serial is the number of `done` events the
/// input method received.
pub mod zwp_input_method_v2 {
    use std::os::unix::io::{OwnedFd, RawFd};

    use imbridge_backend::{
        message,
        protocol::{Argument, Message},
        server::ObjectId,
    };

    use crate::{
        parse_with, string_arg,
        text_input::v3::zwp_text_input_v3::{ChangeCause, ContentHint, ContentPurpose},
        DispatchError,
    };

    /// Errors of `zwp_input_method_v2`
    #[repr(u32)]
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    #[non_exhaustive]
    pub enum Error {
        /// wl_surface has another role
        Roles = 0,
    }

    impl std::convert::TryFrom<u32> for Error {
        type Error = ();
        fn try_from(val: u32) -> Result<Error, ()> {
            match val {
                0 => Ok(Error::Roles),
                _ => Err(()),
            }
        }
    }

    impl std::convert::From<Error> for u32 {
        fn from(val: Error) -> u32 {
            val as u32
        }
    }

    /// Requests of `zwp_input_method_v2`
    #[derive(Debug)]
    pub enum Request {
        /// Pending text to insert
        CommitString {
            /// the text
            text: String,
        },
        /// Pending pre-edit string, with its cursor as byte offsets
        SetPreeditString {
            /// the text
            text: String,
            /// start of the cursor span
            cursor_begin: i32,
            /// end of the cursor span
            cursor_end: i32,
        },
        /// Pending deletion around the cursor, in bytes
        DeleteSurroundingText {
            /// bytes before the cursor
            before_length: u32,
            /// bytes after the cursor
            after_length: u32,
        },
        /// Apply the pending reply
        Commit {
            /// number of `done` events received
            serial: u32,
        },
        /// Give the popup role to a surface
        GetInputPopupSurface {
            /// the new popup surface
            id: ObjectId,
            /// the surface
            surface: ObjectId,
        },
        /// Grab the hardware keyboard
        GrabKeyboard {
            /// the new grab
            keyboard: ObjectId,
        },
        /// Destroy the input method
        Destroy,
    }

    impl Request {
        /// Decode a request
        pub fn parse(msg: Message<ObjectId, OwnedFd>) -> Result<Self, DispatchError> {
            parse_with(msg, &super::ZWP_INPUT_METHOD_V2_INTERFACE, |opcode, args| match opcode {
                0 => Some(Request::CommitString { text: args.string()? }),
                1 => Some(Request::SetPreeditString {
                    text: args.string()?,
                    cursor_begin: args.int()?,
                    cursor_end: args.int()?,
                }),
                2 => Some(Request::DeleteSurroundingText {
                    before_length: args.uint()?,
                    after_length: args.uint()?,
                }),
                3 => Some(Request::Commit { serial: args.uint()? }),
                4 => Some(Request::GetInputPopupSurface {
                    id: args.new_id()?,
                    surface: args.object()?,
                }),
                5 => Some(Request::GrabKeyboard { keyboard: args.new_id()? }),
                6 => Some(Request::Destroy),
                _ => None,
            })
        }
    }

    /// Events of `zwp_input_method_v2`
    #[derive(Debug)]
    pub enum Event {
        /// A text input was enabled
        Activate,
        /// The text input was disabled or lost focus
        Deactivate,
        /// Surrounding text of the text input
        SurroundingText {
            /// the text
            text: String,
            /// byte offset of the cursor
            cursor: u32,
            /// byte offset of the selection anchor
            anchor: u32,
        },
        /// Cause of the last surrounding text change
        TextChangeCause {
            /// the cause
            cause: ChangeCause,
        },
        /// Content hint and purpose of the text input
        ContentType {
            /// the hint
            hint: ContentHint,
            /// the purpose
            purpose: ContentPurpose,
        },
        /// Apply the state sent since the last `done`
        Done,
        /// Another input method is bound already
        Unavailable,
    }

    impl Event {
        /// Encode the event as sent by `sender_id`
        pub fn into_message(self, sender_id: ObjectId) -> Message<ObjectId, RawFd> {
            match self {
                Event::Activate => message!(sender_id, 0, []),
                Event::Deactivate => message!(sender_id, 1, []),
                Event::SurroundingText { text, cursor, anchor } => message!(
                    sender_id,
                    2,
                    [string_arg(text), Argument::Uint(cursor), Argument::Uint(anchor)]
                ),
                Event::TextChangeCause { cause } => {
                    message!(sender_id, 3, [Argument::Uint(cause.into())])
                }
                Event::ContentType { hint, purpose } => message!(
                    sender_id,
                    4,
                    [Argument::Uint(hint.into()), Argument::Uint(purpose.into())]
                ),
                Event::Done => message!(sender_id, 5, []),
                Event::Unavailable => message!(sender_id, 6, []),
            }
        }
    }
}

/// Popup surface of the input method
pub mod zwp_input_popup_surface_v2 {
    use std::os::unix::io::{OwnedFd, RawFd};

    use imbridge_backend::{
        message,
        protocol::{Argument, Message},
        server::ObjectId,
    };

    use crate::{parse_with, DispatchError};

    /// Requests of `zwp_input_popup_surface_v2`
    #[derive(Debug)]
    pub enum Request {
        /// Remove the popup role
        Destroy,
    }

    impl Request {
        /// Decode a request
        pub fn parse(msg: Message<ObjectId, OwnedFd>) -> Result<Self, DispatchError> {
            parse_with(msg, &super::ZWP_INPUT_POPUP_SURFACE_V2_INTERFACE, |opcode, _| match opcode {
                0 => Some(Request::Destroy),
                _ => None,
            })
        }
    }

    /// Events of `zwp_input_popup_surface_v2`
    #[derive(Debug)]
    pub enum Event {
        /// Cursor rectangle of the text input, relative to the popup
        TextInputRectangle {
            /// x
            x: i32,
            /// y
            y: i32,
            /// width
            width: i32,
            /// height
            height: i32,
        },
    }

    impl Event {
        /// Encode the event as sent by `sender_id`
        pub fn into_message(self, sender_id: ObjectId) -> Message<ObjectId, RawFd> {
            match self {
                Event::TextInputRectangle { x, y, width, height } => message!(
                    sender_id,
                    0,
                    [Argument::Int(x), Argument::Int(y), Argument::Int(width), Argument::Int(height)]
                ),
            }
        }
    }
}

/// Keyboard grab of the input method
pub mod zwp_input_method_keyboard_grab_v2 {
    use std::os::unix::io::{OwnedFd, RawFd};

    use imbridge_backend::{
        message,
        protocol::{Argument, Message},
        server::ObjectId,
    };

    use crate::{core::wl_keyboard::KeymapFormat, parse_with, DispatchError};

    /// Requests of `zwp_input_method_keyboard_grab_v2`
    #[derive(Debug)]
    pub enum Request {
        /// Release the grab
        Release,
    }

    impl Request {
        /// Decode a request
        pub fn parse(msg: Message<ObjectId, OwnedFd>) -> Result<Self, DispatchError> {
            parse_with(msg, &super::ZWP_INPUT_METHOD_KEYBOARD_GRAB_V2_INTERFACE, |opcode, _| {
                match opcode {
                    0 => Some(Request::Release),
                    _ => None,
                }
            })
        }
    }

    /// Events of `zwp_input_method_keyboard_grab_v2`, as those of `wl_keyboard`
    #[derive(Debug)]
    pub enum Event {
        /// Keyboard mapping
        Keymap {
            /// keymap format
            format: KeymapFormat,
            /// keymap file descriptor
            fd: RawFd,
            /// keymap size, in bytes
            size: u32,
        },
        /// Key event
        Key {
            /// serial number of the key event
            serial: u32,
            /// timestamp
            time: u32,
            /// the key
            key: u32,
            /// pressed or released
            state: u32,
        },
        /// Modifier and group state
        Modifiers {
            /// serial number of the modifiers event
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
        /// Repeat rate and delay
        RepeatInfo {
            /// characters per second
            rate: i32,
            /// milliseconds before repeating starts
            delay: i32,
        },
    }

    impl Event {
        /// Encode the event as sent by `sender_id`
        pub fn into_message(self, sender_id: ObjectId) -> Message<ObjectId, RawFd> {
            match self {
                Event::Keymap { format, fd, size } => message!(
                    sender_id,
                    0,
                    [Argument::Uint(format.into()), Argument::Fd(fd), Argument::Uint(size)]
                ),
                Event::Key { serial, time, key, state } => message!(
                    sender_id,
                    1,
                    [
                        Argument::Uint(serial),
                        Argument::Uint(time),
                        Argument::Uint(key),
                        Argument::Uint(state)
                    ]
                ),
                Event::Modifiers { serial, mods_depressed, mods_latched, mods_locked, group } => {
                    message!(
                        sender_id,
                        2,
                        [
                            Argument::Uint(serial),
                            Argument::Uint(mods_depressed),
                            Argument::Uint(mods_latched),
                            Argument::Uint(mods_locked),
                            Argument::Uint(group)
                        ]
                    )
                }
                Event::RepeatInfo { rate, delay } => {
                    message!(sender_id, 3, [Argument::Int(rate), Argument::Int(delay)])
                }
            }
        }
    }
}
