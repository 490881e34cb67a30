//! `text-input-unstable-v1`

use imbridge_backend::protocol::{
    AllowNull::No,
    ArgumentType::*,
    Interface,
};

use crate::{
    core::{WL_SEAT_INTERFACE, WL_SURFACE_INTERFACE},
    creates, msg, objects,
};

/// `zwp_text_input_manager_v1`
pub static ZWP_TEXT_INPUT_MANAGER_V1_INTERFACE: Interface = Interface {
    name: "zwp_text_input_manager_v1",
    version: 1,
    requests: &[creates(msg("create_text_input", &[NewId]), &ZWP_TEXT_INPUT_V1_INTERFACE)],
    events: &[],
};

/// `zwp_text_input_v1`
pub static ZWP_TEXT_INPUT_V1_INTERFACE: Interface = Interface {
    name: "zwp_text_input_v1",
    version: 1,
    requests: &[
        objects(
            msg("activate", &[Object(No), Object(No)]),
            &[&WL_SEAT_INTERFACE, &WL_SURFACE_INTERFACE],
        ),
        objects(msg("deactivate", &[Object(No)]), &[&WL_SEAT_INTERFACE]),
        msg("show_input_panel", &[]),
        msg("hide_input_panel", &[]),
        msg("reset", &[]),
        msg("set_surrounding_text", &[Str(No), Uint, Uint]),
        msg("set_content_type", &[Uint, Uint]),
        msg("set_cursor_rectangle", &[Int, Int, Int, Int]),
        msg("set_preferred_language", &[Str(No)]),
        msg("commit_state", &[Uint]),
        msg("invoke_action", &[Uint, Uint]),
    ],
    events: &[
        objects(msg("enter", &[Object(No)]), &[&WL_SURFACE_INTERFACE]),
        msg("leave", &[]),
        msg("modifiers_map", &[Array]),
        msg("input_panel_state", &[Uint]),
        msg("preedit_string", &[Uint, Str(No), Str(No)]),
        msg("preedit_styling", &[Uint, Uint, Uint]),
        msg("preedit_cursor", &[Int]),
        msg("commit_string", &[Uint, Str(No)]),
        msg("cursor_position", &[Int, Int]),
        msg("delete_surrounding_text", &[Int, Uint]),
        msg("keysym", &[Uint, Uint, Uint, Uint, Uint]),
        msg("language", &[Uint, Str(No)]),
        msg("text_direction", &[Uint, Uint]),
    ],
};

/// Text input objects factory
pub mod zwp_text_input_manager_v1 {
    use std::os::unix::io::OwnedFd;

    use imbridge_backend::{protocol::Message, server::ObjectId};

    use crate::{parse_with, DispatchError};

    /// Requests of `zwp_text_input_manager_v1`
    #[derive(Debug)]
    pub enum Request {
        /// Create a text input
        CreateTextInput {
            /// the new text input
            id: ObjectId,
        },
    }

    impl Request {
        /// Decode a request
        pub fn parse(msg: Message<ObjectId, OwnedFd>) -> Result<Self, DispatchError> {
            parse_with(msg, &super::ZWP_TEXT_INPUT_MANAGER_V1_INTERFACE, |opcode, args| {
                match opcode {
                    0 => Some(Request::CreateTextInput { id: args.new_id()? }),
                    _ => None,
                }
            })
        }
    }
}

/// Text input activated on a surface
///
/// The object has no destructor: it lives as long as its client.
pub mod zwp_text_input_v1 {
    use std::os::unix::io::{OwnedFd, RawFd};

    use imbridge_backend::{
        message,
        protocol::{Argument, Message, WEnum},
        server::ObjectId,
    };

    use crate::{parse_with, string_arg, DispatchError};

    bitflags::bitflags! {
        /// Content hint
        #[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
        pub struct ContentHint: u32 {
            /// auto completion, correction and capitalization
            const Default = 0x7;
            /// hidden and sensitive text
            const Password = 0xc0;
            /// suggest word completions
            const AutoCompletion = 0x1;
            /// suggest word corrections
            const AutoCorrection = 0x2;
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
            /// just latin characters should be entered
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
        /// input a password (combine with password or sensitive_data hint)
        Password = 8,
        /// input a date
        Date = 9,
        /// input a time
        Time = 10,
        /// input a date and time
        Datetime = 11,
        /// input for a terminal
        Terminal = 12,
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
                9 => Ok(ContentPurpose::Date),
                10 => Ok(ContentPurpose::Time),
                11 => Ok(ContentPurpose::Datetime),
                12 => Ok(ContentPurpose::Terminal),
                _ => Err(()),
            }
        }
    }

    impl std::convert::From<ContentPurpose> for u32 {
        fn from(val: ContentPurpose) -> u32 {
            val as u32
        }
    }

    /// Pre-edit styling
    #[repr(u32)]
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    #[non_exhaustive]
    pub enum PreeditStyle {
        /// default style for composing text
        Default = 0,
        /// style should be the same as in non-composing text
        None = 1,
        /// active part of the composition
        Active = 2,
        /// inactive part of the composition
        Inactive = 3,
        /// highlighted part
        Highlight = 4,
        /// underlined part
        Underline = 5,
        /// selected part
        Selection = 6,
        /// incorrect part
        Incorrect = 7,
    }

    impl std::convert::TryFrom<u32> for PreeditStyle {
        type Error = ();
        fn try_from(val: u32) -> Result<PreeditStyle, ()> {
            match val {
                0 => Ok(PreeditStyle::Default),
                1 => Ok(PreeditStyle::None),
                2 => Ok(PreeditStyle::Active),
                3 => Ok(PreeditStyle::Inactive),
                4 => Ok(PreeditStyle::Highlight),
                5 => Ok(PreeditStyle::Underline),
                6 => Ok(PreeditStyle::Selection),
                7 => Ok(PreeditStyle::Incorrect),
                _ => Err(()),
            }
        }
    }

    impl std::convert::From<PreeditStyle> for u32 {
        fn from(val: PreeditStyle) -> u32 {
            val as u32
        }
    }

    /// Text direction
    #[repr(u32)]
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    #[non_exhaustive]
    pub enum TextDirection {
        /// automatic text direction based on text and language
        Auto = 0,
        /// left-to-right
        Ltr = 1,
        /// right-to-left
        Rtl = 2,
    }

    impl std::convert::TryFrom<u32> for TextDirection {
        type Error = ();
        fn try_from(val: u32) -> Result<TextDirection, ()> {
            match val {
                0 => Ok(TextDirection::Auto),
                1 => Ok(TextDirection::Ltr),
                2 => Ok(TextDirection::Rtl),
                _ => Err(()),
            }
        }
    }

    impl std::convert::From<TextDirection> for u32 {
        fn from(val: TextDirection) -> u32 {
            val as u32
        }
    }

    /// Requests of `zwp_text_input_v1`
    #[derive(Debug)]
    pub enum Request {
        /// Request activation on a surface
        Activate {
            /// the seat
            seat: ObjectId,
            /// the surface
            surface: ObjectId,
        },
        /// Request deactivation
        Deactivate {
            /// the seat
            seat: ObjectId,
        },
        /// Request the input panel to be shown
        ShowInputPanel,
        /// Request the input panel to be hidden
        HideInputPanel,
        /// Reset the input method state
        Reset,
        /// Set the surrounding text, offsets are in bytes
        SetSurroundingText {
            /// text around the cursor
            text: String,
            /// byte offset of the cursor
            cursor: u32,
            /// byte offset of the selection anchor
            anchor: u32,
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
        /// Set the preferred language, as a RFC-3066 tag
        SetPreferredLanguage {
            /// the language
            language: String,
        },
        /// Mark the end of a batch of state requests
        CommitState {
            /// serial echoed in the following events
            serial: u32,
        },
        /// Action on the pre-edit text, like a click
        InvokeAction {
            /// button
            button: u32,
            /// byte index in the pre-edit text
            index: u32,
        },
    }

    impl Request {
        /// Decode a request
        pub fn parse(msg: Message<ObjectId, OwnedFd>) -> Result<Self, DispatchError> {
            parse_with(msg, &super::ZWP_TEXT_INPUT_V1_INTERFACE, |opcode, args| match opcode {
                0 => Some(Request::Activate { seat: args.object()?, surface: args.object()? }),
                1 => Some(Request::Deactivate { seat: args.object()? }),
                2 => Some(Request::ShowInputPanel),
                3 => Some(Request::HideInputPanel),
                4 => Some(Request::Reset),
                5 => Some(Request::SetSurroundingText {
                    text: args.string()?,
                    cursor: args.uint()?,
                    anchor: args.uint()?,
                }),
                6 => Some(Request::SetContentType {
                    hint: args.uint()?.into(),
                    purpose: args.uint()?.into(),
                }),
                7 => Some(Request::SetCursorRectangle {
                    x: args.int()?,
                    y: args.int()?,
                    width: args.int()?,
                    height: args.int()?,
                }),
                8 => Some(Request::SetPreferredLanguage { language: args.string()? }),
                9 => Some(Request::CommitState { serial: args.uint()? }),
                10 => Some(Request::InvokeAction { button: args.uint()?, index: args.uint()? }),
                _ => None,
            })
        }
    }

    /// Events of `zwp_text_input_v1`
    #[derive(Debug)]
    pub enum Event {
        /// The text input was activated on a surface
        Enter {
            /// the surface
            surface: ObjectId,
        },
        /// The text input was deactivated
        Leave,
        /// Keysym to modifier mapping
        ModifiersMap {
            /// null-separated modifier names
            map: Vec<u8>,
        },
        /// Visibility of the input panel
        InputPanelState {
            /// visibility
            state: u32,
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
        /// Pre-edit styling
        PreeditStyling {
            /// byte index
            index: u32,
            /// byte length
            length: u32,
            /// style
            style: WEnum<PreeditStyle>,
        },
        /// Pre-edit cursor
        PreeditCursor {
            /// byte index
            index: i32,
        },
        /// Text to insert
        CommitString {
            /// serial of the last `commit_state`
            serial: u32,
            /// the text
            text: String,
        },
        /// Cursor and anchor after the next commit
        CursorPosition {
            /// cursor byte index
            index: i32,
            /// anchor byte index
            anchor: i32,
        },
        /// Deletion around the cursor, relative byte index and length
        DeleteSurroundingText {
            /// start of the deletion relative to the cursor
            index: i32,
            /// bytes to delete
            length: u32,
        },
        /// Key event
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
            /// the direction
            direction: WEnum<TextDirection>,
        },
    }

    impl Event {
        /// Encode the event as sent by `sender_id`
        pub fn into_message(self, sender_id: ObjectId) -> Message<ObjectId, RawFd> {
            match self {
                Event::Enter { surface } => message!(sender_id, 0, [Argument::Object(surface)]),
                Event::Leave => message!(sender_id, 1, []),
                Event::ModifiersMap { map } => {
                    message!(sender_id, 2, [Argument::Array(Box::new(map))])
                }
                Event::InputPanelState { state } => message!(sender_id, 3, [Argument::Uint(state)]),
                Event::PreeditString { serial, text, commit } => message!(
                    sender_id,
                    4,
                    [Argument::Uint(serial), string_arg(text), string_arg(commit)]
                ),
                Event::PreeditStyling { index, length, style } => message!(
                    sender_id,
                    5,
                    [Argument::Uint(index), Argument::Uint(length), Argument::Uint(style.into())]
                ),
                Event::PreeditCursor { index } => message!(sender_id, 6, [Argument::Int(index)]),
                Event::CommitString { serial, text } => {
                    message!(sender_id, 7, [Argument::Uint(serial), string_arg(text)])
                }
                Event::CursorPosition { index, anchor } => {
                    message!(sender_id, 8, [Argument::Int(index), Argument::Int(anchor)])
                }
                Event::DeleteSurroundingText { index, length } => {
                    message!(sender_id, 9, [Argument::Int(index), Argument::Uint(length)])
                }
                Event::Keysym { serial, time, sym, state, modifiers } => message!(
                    sender_id,
                    10,
                    [
                        Argument::Uint(serial),
                        Argument::Uint(time),
                        Argument::Uint(sym),
                        Argument::Uint(state),
                        Argument::Uint(modifiers)
                    ]
                ),
                Event::Language { serial, language } => {
                    message!(sender_id, 11, [Argument::Uint(serial), string_arg(language)])
                }
                Event::TextDirection { serial, direction } => {
                    message!(sender_id, 12, [Argument::Uint(serial), Argument::Uint(direction.into())])
                }
            }
        }
    }
}
