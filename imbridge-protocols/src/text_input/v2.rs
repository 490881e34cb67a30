//! `text-input-unstable-v2`

use imbridge_backend::protocol::{
    AllowNull::No,
    ArgumentType::*,
    Interface,
};

use crate::{
    core::{WL_SEAT_INTERFACE, WL_SURFACE_INTERFACE},
    creates, destructor, msg, objects,
};

/// `zwp_text_input_manager_v2`
pub static ZWP_TEXT_INPUT_MANAGER_V2_INTERFACE: Interface = Interface {
    name: "zwp_text_input_manager_v2",
    version: 1,
    requests: &[
        destructor(msg("destroy", &[])),
        objects(
            creates(msg("get_text_input", &[NewId, Object(No)]), &ZWP_TEXT_INPUT_V2_INTERFACE),
            &[&WL_SEAT_INTERFACE],
        ),
    ],
    events: &[],
};

/// `zwp_text_input_v2`
pub static ZWP_TEXT_INPUT_V2_INTERFACE: Interface = Interface {
    name: "zwp_text_input_v2",
    version: 1,
    requests: &[
        destructor(msg("destroy", &[])),
        objects(msg("enable", &[Object(No)]), &[&WL_SURFACE_INTERFACE]),
        objects(msg("disable", &[Object(No)]), &[&WL_SURFACE_INTERFACE]),
        msg("show_input_panel", &[]),
        msg("hide_input_panel", &[]),
        msg("set_surrounding_text", &[Str(No), Int, Int]),
        msg("set_content_type", &[Uint, Uint]),
        msg("set_cursor_rectangle", &[Int, Int, Int, Int]),
        msg("set_preferred_language", &[Str(No)]),
        msg("update_state", &[Uint, Uint]),
    ],
    events: &[
        objects(msg("enter", &[Uint, Object(No)]), &[&WL_SURFACE_INTERFACE]),
        objects(msg("leave", &[Uint, Object(No)]), &[&WL_SURFACE_INTERFACE]),
        msg("input_panel_state", &[Uint, Int, Int, Int, Int]),
        msg("preedit_string", &[Str(No), Str(No)]),
        msg("preedit_styling", &[Uint, Uint, Uint]),
        msg("preedit_cursor", &[Int]),
        msg("commit_string", &[Str(No)]),
        msg("cursor_position", &[Int, Int]),
        msg("delete_surrounding_text", &[Uint, Uint]),
        msg("modifiers_map", &[Array]),
        msg("keysym", &[Uint, Uint, Uint, Uint]),
        msg("language", &[Str(No)]),
        msg("text_direction", &[Uint]),
        msg("configure_surrounding_text", &[Int, Int]),
        msg("input_method_changed", &[Uint, Uint]),
    ],
};

/// Text input objects factory
pub mod zwp_text_input_manager_v2 {
    use std::os::unix::io::OwnedFd;

    use imbridge_backend::{protocol::Message, server::ObjectId};

    use crate::{parse_with, DispatchError};

    /// Requests of `zwp_text_input_manager_v2`
    #[derive(Debug)]
    pub enum Request {
        /// Destroy the manager
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
            parse_with(msg, &super::ZWP_TEXT_INPUT_MANAGER_V2_INTERFACE, |opcode, args| {
                match opcode {
                    0 => Some(Request::Destroy),
                    1 => Some(Request::GetTextInput { id: args.new_id()?, seat: args.object()? }),
                    _ => None,
                }
            })
        }
    }
}

/// Text input enabled per surface
///
/// State requests apply immediately, `update_state` tells the compositor why
/// they were sent. Its serial must be the one of the last `enter` or `leave`.
pub mod zwp_text_input_v2 {
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
            /// the text input is multi line
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
        /// input a password
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

    /// Visibility of the input panel
    #[repr(u32)]
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    #[non_exhaustive]
    pub enum InputPanelVisibility {
        /// the input panel is hidden
        Hidden = 0,
        /// the input panel is visible
        Visible = 1,
    }

    impl std::convert::TryFrom<u32> for InputPanelVisibility {
        type Error = ();
        fn try_from(val: u32) -> Result<InputPanelVisibility, ()> {
            match val {
                0 => Ok(InputPanelVisibility::Hidden),
                1 => Ok(InputPanelVisibility::Visible),
                _ => Err(()),
            }
        }
    }

    impl std::convert::From<InputPanelVisibility> for u32 {
        fn from(val: InputPanelVisibility) -> u32 {
            val as u32
        }
    }

    /// Reason of an `update_state` request
    #[repr(u32)]
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    #[non_exhaustive]
    pub enum UpdateState {
        /// updated state because it changed
        Change = 0,
        /// full state after enter or input_method_changed event
        Full = 1,
        /// full state after reset
        Reset = 2,
        /// full state after switching focus to a different widget on client side
        Enter = 3,
    }

    impl std::convert::TryFrom<u32> for UpdateState {
        type Error = ();
        fn try_from(val: u32) -> Result<UpdateState, ()> {
            match val {
                0 => Ok(UpdateState::Change),
                1 => Ok(UpdateState::Full),
                2 => Ok(UpdateState::Reset),
                3 => Ok(UpdateState::Enter),
                _ => Err(()),
            }
        }
    }

    impl std::convert::From<UpdateState> for u32 {
        fn from(val: UpdateState) -> u32 {
            val as u32
        }
    }

    /// Requests of `zwp_text_input_v2`
    #[derive(Debug)]
    pub enum Request {
        /// Destroy the text input
        Destroy,
        /// Enable text input on a surface
        Enable {
            /// the surface
            surface: ObjectId,
        },
        /// Disable text input on a surface
        Disable {
            /// the surface
            surface: ObjectId,
        },
        /// Request the input panel to be shown
        ShowInputPanel,
        /// Request the input panel to be hidden
        HideInputPanel,
        /// Set the surrounding text, offsets are in bytes
        SetSurroundingText {
            /// text around the cursor
            text: String,
            /// byte offset of the cursor
            cursor: i32,
            /// byte offset of the selection anchor
            anchor: i32,
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
        /// Tell the compositor the state requests were sent
        UpdateState {
            /// serial of the last `enter` or `leave`
            serial: u32,
            /// why the state was sent
            reason: WEnum<UpdateState>,
        },
    }

    impl Request {
        /// Decode a request
        pub fn parse(msg: Message<ObjectId, OwnedFd>) -> Result<Self, DispatchError> {
            parse_with(msg, &super::ZWP_TEXT_INPUT_V2_INTERFACE, |opcode, args| match opcode {
                0 => Some(Request::Destroy),
                1 => Some(Request::Enable { surface: args.object()? }),
                2 => Some(Request::Disable { surface: args.object()? }),
                3 => Some(Request::ShowInputPanel),
                4 => Some(Request::HideInputPanel),
                5 => Some(Request::SetSurroundingText {
                    text: args.string()?,
                    cursor: args.int()?,
                    anchor: args.int()?,
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
                9 => Some(Request::UpdateState { serial: args.uint()?, reason: args.uint()?.into() }),
                _ => None,
            })
        }
    }

    /// Events of `zwp_text_input_v2`
    #[derive(Debug)]
    pub enum Event {
        /// Focus entered a surface
        Enter {
            /// serial to echo in `update_state`
            serial: u32,
            /// the surface
            surface: ObjectId,
        },
        /// Focus left a surface
        Leave {
            /// serial to echo in `update_state`
            serial: u32,
            /// the surface
            surface: ObjectId,
        },
        /// Visibility and position of the input panel
        InputPanelState {
            /// visibility
            state: InputPanelVisibility,
            /// x of the occluded area
            x: i32,
            /// y of the occluded area
            y: i32,
            /// width of the occluded area
            width: i32,
            /// height of the occluded area
            height: i32,
        },
        /// Pre-edit string
        PreeditString {
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
            /// style, as `zwp_text_input_v1.preedit_style`
            style: u32,
        },
        /// Pre-edit cursor
        PreeditCursor {
            /// byte index
            index: i32,
        },
        /// Text to insert
        CommitString {
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
        /// Deletion around the cursor, in bytes
        DeleteSurroundingText {
            /// bytes before the cursor
            before_length: u32,
            /// bytes after the cursor
            after_length: u32,
        },
        /// Keysym to modifier mapping
        ModifiersMap {
            /// null-separated modifier names
            map: Vec<u8>,
        },
        /// Key event
        Keysym {
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
            /// RFC-3066 tag
            language: String,
        },
        /// Text direction of the input
        TextDirection {
            /// auto 0, ltr 1, rtl 2
            direction: u32,
        },
        /// Amount of surrounding text the input method wants
        ConfigureSurroundingText {
            /// bytes before the cursor
            before_cursor: i32,
            /// bytes after the cursor
            after_cursor: i32,
        },
        /// The input method changed
        InputMethodChanged {
            /// serial to echo in `update_state`
            serial: u32,
            /// reserved
            flags: u32,
        },
    }

    impl Event {
        /// Encode the event as sent by `sender_id`
        pub fn into_message(self, sender_id: ObjectId) -> Message<ObjectId, RawFd> {
            match self {
                Event::Enter { serial, surface } => {
                    message!(sender_id, 0, [Argument::Uint(serial), Argument::Object(surface)])
                }
                Event::Leave { serial, surface } => {
                    message!(sender_id, 1, [Argument::Uint(serial), Argument::Object(surface)])
                }
                Event::InputPanelState { state, x, y, width, height } => message!(
                    sender_id,
                    2,
                    [
                        Argument::Uint(state.into()),
                        Argument::Int(x),
                        Argument::Int(y),
                        Argument::Int(width),
                        Argument::Int(height)
                    ]
                ),
                Event::PreeditString { text, commit } => {
                    message!(sender_id, 3, [string_arg(text), string_arg(commit)])
                }
                Event::PreeditStyling { index, length, style } => message!(
                    sender_id,
                    4,
                    [Argument::Uint(index), Argument::Uint(length), Argument::Uint(style)]
                ),
                Event::PreeditCursor { index } => message!(sender_id, 5, [Argument::Int(index)]),
                Event::CommitString { text } => message!(sender_id, 6, [string_arg(text)]),
                Event::CursorPosition { index, anchor } => {
                    message!(sender_id, 7, [Argument::Int(index), Argument::Int(anchor)])
                }
                Event::DeleteSurroundingText { before_length, after_length } => message!(
                    sender_id,
                    8,
                    [Argument::Uint(before_length), Argument::Uint(after_length)]
                ),
                Event::ModifiersMap { map } => {
                    message!(sender_id, 9, [Argument::Array(Box::new(map))])
                }
                Event::Keysym { time, sym, state, modifiers } => message!(
                    sender_id,
                    10,
                    [
                        Argument::Uint(time),
                        Argument::Uint(sym),
                        Argument::Uint(state),
                        Argument::Uint(modifiers)
                    ]
                ),
                Event::Language { language } => message!(sender_id, 11, [string_arg(language)]),
                Event::TextDirection { direction } => {
                    message!(sender_id, 12, [Argument::Uint(direction)])
                }
                Event::ConfigureSurroundingText { before_cursor, after_cursor } => message!(
                    sender_id,
                    13,
                    [Argument::Int(before_cursor), Argument::Int(after_cursor)]
                ),
                Event::InputMethodChanged { serial, flags } => {
                    message!(sender_id, 14, [Argument::Uint(serial), Argument::Uint(flags)])
                }
            }
        }
    }
}
