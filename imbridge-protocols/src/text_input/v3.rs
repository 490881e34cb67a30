//! `text-input-unstable-v3`

use imbridge_backend::protocol::{
    AllowNull::{No, Yes},
    ArgumentType::*,
    Interface,
};

use crate::{
    core::{WL_SEAT_INTERFACE, WL_SURFACE_INTERFACE},
    creates, destructor, msg, objects,
};

/// `zwp_text_input_manager_v3`
pub static ZWP_TEXT_INPUT_MANAGER_V3_INTERFACE: Interface = Interface {
    name: "zwp_text_input_manager_v3",
    version: 1,
    requests: &[
        destructor(msg("destroy", &[])),
        objects(
            creates(msg("get_text_input", &[NewId, Object(No)]), &ZWP_TEXT_INPUT_V3_INTERFACE),
            &[&WL_SEAT_INTERFACE],
        ),
    ],
    events: &[],
};

/// `zwp_text_input_v3`
pub static ZWP_TEXT_INPUT_V3_INTERFACE: Interface = Interface {
    name: "zwp_text_input_v3",
    version: 1,
    requests: &[
        destructor(msg("destroy", &[])),
        msg("enable", &[]),
        msg("disable", &[]),
        msg("set_surrounding_text", &[Str(No), Int, Int]),
        msg("set_text_change_cause", &[Uint]),
        msg("set_content_type", &[Uint, Uint]),
        msg("set_cursor_rectangle", &[Int, Int, Int, Int]),
        msg("commit", &[]),
    ],
    events: &[
        objects(msg("enter", &[Object(No)]), &[&WL_SURFACE_INTERFACE]),
        objects(msg("leave", &[Object(No)]), &[&WL_SURFACE_INTERFACE]),
        msg("preedit_string", &[Str(Yes), Int, Int]),
        msg("commit_string", &[Str(Yes)]),
        msg("delete_surrounding_text", &[Uint, Uint]),
        msg("done", &[Uint]),
    ],
};

/// Text input objects factory
pub mod zwp_text_input_manager_v3 {
    use std::os::unix::io::OwnedFd;

    use imbridge_backend::{protocol::Message, server::ObjectId};

    use crate::{parse_with, DispatchError};

    /// Requests of `zwp_text_input_manager_v3`
    #[derive(Debug)]
    pub enum Request {
        /// Destroy the manager, existing text inputs are unaffected
        Destroy,
        /// Create a text input for a seat
        GetTextInput {
            /// the new text input
            id: ObjectId,
            /// the seat
            seat: ObjectId,
        },
    }

    impl Request {
        /// Decode a request
        pub fn parse(msg: Message<ObjectId, OwnedFd>) -> Result<Self, DispatchError> {
            parse_with(msg, &super::ZWP_TEXT_INPUT_MANAGER_V3_INTERFACE, |opcode, args| {
                match opcode {
                    0 => Some(Request::Destroy),
                    1 => Some(Request::GetTextInput { id: args.new_id()?, seat: args.object()? }),
                    _ => None,
                }
            })
        }
    }
}

/// Double-buffered text input
///
/// Every state request only changes the pending state, `commit` applies it.
/// The compositor answers each commit with a `done` event carrying the
/// number of commits received so far.
pub mod zwp_text_input_v3 {
    use std::os::unix::io::{OwnedFd, RawFd};

    use imbridge_backend::{
        message,
        protocol::{Argument, Message, WEnum},
        server::ObjectId,
    };

    use crate::{opt_string_arg, parse_with, DispatchError};

    /// Reason for the change of surrounding text or cursor position
    #[repr(u32)]
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    #[non_exhaustive]
    pub enum ChangeCause {
        /// input method caused the change
        InputMethod = 0,
        /// something else than the input method caused the change
        Other = 1,
    }

    impl std::convert::TryFrom<u32> for ChangeCause {
        type Error = ();
        fn try_from(val: u32) -> Result<ChangeCause, ()> {
            match val {
                0 => Ok(ChangeCause::InputMethod),
                1 => Ok(ChangeCause::Other),
                _ => Err(()),
            }
        }
    }

    impl std::convert::From<ChangeCause> for u32 {
        fn from(val: ChangeCause) -> u32 {
            val as u32
        }
    }

    bitflags::bitflags! {
        /// Content hint
        ///
        /// Modifies the behavior of the input method.
        #[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
        pub struct ContentHint: u32 {
            /// suggest word completions
            const Completion = 0x1;
            /// suggest word corrections
            const Spellcheck = 0x2;
            /// switch to uppercase letters at the start of a sentence
            const AutoCapitalization = 0x4;
            /// prefer lowercase letters
            const Lowercase = 0x8;
            /// prefer uppercase letters
            const Uppercase = 0x10;
            /// prefer casing for titles and headings
            const Titlecase = 0x20;
            /// characters should be hidden
            const HiddenText = 0x40;
            /// typed text should not be stored
            const SensitiveData = 0x80;
            /// just Latin characters should be entered
            const Latin = 0x100;
            /// the text input is multiline
            const Multiline = 0x200;
        }
    }

    impl std::convert::TryFrom<u32> for ContentHint {
        type Error = ();
        fn try_from(val: u32) -> Result<ContentHint, ()> {
            Self::from_bits(val).ok_or(())
        }
    }

    impl std::convert::From<ContentHint> for u32 {
        fn from(val: ContentHint) -> u32 {
            val.bits()
        }
    }

    /// Content purpose
    ///
    /// The input method may adapt its layout to the purpose.
    #[repr(u32)]
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    #[non_exhaustive]
    pub enum ContentPurpose {
        /// default input, allowing all characters
        Normal = 0,
        /// allow only alphabetic characters
        Alpha = 1,
        /// allow only digits
        Digits = 2,
        /// input a number (including decimal separator and sign)
        Number = 3,
        /// input a phone number
        Phone = 4,
        /// input an URL
        Url = 5,
        /// input an email address
        Email = 6,
        /// input a name of a person
        Name = 7,
        /// input a password (combine with sensitive_data hint)
        Password = 8,
        /// input is a numeric password (combine with sensitive_data hint)
        Pin = 9,
        /// input a date
        Date = 10,
        /// input a time
        Time = 11,
        /// input a date and time
        Datetime = 12,
        /// input for a terminal
        Terminal = 13,
    }

    impl std::convert::TryFrom<u32> for ContentPurpose {
        type Error = ();
        fn try_from(val: u32) -> Result<ContentPurpose, ()> {
            match val {
                0 => Ok(ContentPurpose::Normal),
                1 => Ok(ContentPurpose::Alpha),
                2 => Ok(ContentPurpose::Digits),
                3 => Ok(ContentPurpose::Number),
                4 => Ok(ContentPurpose::Phone),
                5 => Ok(ContentPurpose::Url),
                6 => Ok(ContentPurpose::Email),
                7 => Ok(ContentPurpose::Name),
                8 => Ok(ContentPurpose::Password),
                9 => Ok(ContentPurpose::Pin),
                10 => Ok(ContentPurpose::Date),
                11 => Ok(ContentPurpose::Time),
                12 => Ok(ContentPurpose::Datetime),
                13 => Ok(ContentPurpose::Terminal),
                _ => Err(()),
            }
        }
    }

    impl std::convert::From<ContentPurpose> for u32 {
        fn from(val: ContentPurpose) -> u32 {
            val as u32
        }
    }

    /// Requests of `zwp_text_input_v3`
    #[derive(Debug)]
    pub enum Request {
        /// Destroy the text input
        Destroy,
        /// Request text input to be enabled
        Enable,
        /// Disable text input on a surface
        Disable,
        /// Set the surrounding text, offsets are in bytes
        SetSurroundingText {
            /// text around the cursor
            text: String,
            /// byte offset of the cursor
            cursor: i32,
            /// byte offset of the selection anchor
            anchor: i32,
        },
        /// Indicate the cause of the surrounding text change
        SetTextChangeCause {
            /// cause of the change
            cause: WEnum<ChangeCause>,
        },
        /// Set content purpose and hint
        SetContentType {
            /// the hint
            hint: WEnum<ContentHint>,
            /// the purpose
            purpose: WEnum<ContentPurpose>,
        },
        /// Set the cursor rectangle, in surface-local coordinates
        SetCursorRectangle {
            /// x
            x: i32,
            /// y
            y: i32,
            /// width
            width: i32,
            /// height
            height: i32,
        },
        /// Apply the pending state
        Commit,
    }

    impl Request {
        /// Decode a request
        pub fn parse(msg: Message<ObjectId, OwnedFd>) -> Result<Self, DispatchError> {
            parse_with(msg, &super::ZWP_TEXT_INPUT_V3_INTERFACE, |opcode, args| match opcode {
                0 => Some(Request::Destroy),
                1 => Some(Request::Enable),
                2 => Some(Request::Disable),
                3 => Some(Request::SetSurroundingText {
                    text: args.string()?,
                    cursor: args.int()?,
                    anchor: args.int()?,
                }),
                4 => Some(Request::SetTextChangeCause { cause: args.uint()?.into() }),
                5 => Some(Request::SetContentType {
                    hint: args.uint()?.into(),
                    purpose: args.uint()?.into(),
                }),
                6 => Some(Request::SetCursorRectangle {
                    x: args.int()?,
                    y: args.int()?,
                    width: args.int()?,
                    height: args.int()?,
                }),
                7 => Some(Request::Commit),
                _ => None,
            })
        }
    }

    /// Events of `zwp_text_input_v3`
    #[derive(Debug)]
    pub enum Event {
        /// Focus entered a surface of the client
        Enter {
            /// the surface
            surface: ObjectId,
        },
        /// Focus left a surface
        Leave {
            /// the surface
            surface: ObjectId,
        },
        /// Pending pre-edit string, with its cursor as byte offsets
        PreeditString {
            /// the pre-edit text
            text: Option<String>,
            /// start of the cursor span
            cursor_begin: i32,
            /// end of the cursor span
            cursor_end: i32,
        },
        /// Pending text to insert
        CommitString {
            /// the text
            text: Option<String>,
        },
        /// Pending deletion around the cursor, in bytes
        DeleteSurroundingText {
            /// bytes before the cursor
            before_length: u32,
            /// bytes after the cursor
            after_length: u32,
        },
        /// Apply the pending changes
        Done {
            /// number of commits received
            serial: u32,
        },
    }

    impl Event {
        /// Encode the event as sent by `sender_id`
        pub fn into_message(self, sender_id: ObjectId) -> Message<ObjectId, RawFd> {
            match self {
                Event::Enter { surface } => message!(sender_id, 0, [Argument::Object(surface)]),
                Event::Leave { surface } => message!(sender_id, 1, [Argument::Object(surface)]),
                Event::PreeditString { text, cursor_begin, cursor_end } => message!(
                    sender_id,
                    2,
                    [opt_string_arg(text), Argument::Int(cursor_begin), Argument::Int(cursor_end)]
                ),
                Event::CommitString { text } => message!(sender_id, 3, [opt_string_arg(text)]),
                Event::DeleteSurroundingText { before_length, after_length } => message!(
                    sender_id,
                    4,
                    [Argument::Uint(before_length), Argument::Uint(after_length)]
                ),
                Event::Done { serial } => message!(sender_id, 5, [Argument::Uint(serial)]),
            }
        }
    }
}
