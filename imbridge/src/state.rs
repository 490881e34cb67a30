//! State published by text inputs
//!
//! The values here are protocol-version neutral. Conversions from and to the
//! wire values of each version live next to the types.

use imbridge_protocols::text_input::v3::zwp_text_input_v3;

use crate::error::SurroundingTextError;

/// A rectangle in surface-local or global coordinates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Rect {
    /// left edge
    pub x: i32,
    /// top edge
    pub y: i32,
    /// width
    pub width: i32,
    /// height
    pub height: i32,
}

impl Rect {
    /// Build a rectangle
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }
}

/// What caused the last change of the surrounding text
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChangeCause {
    /// the input method, through a reply
    #[default]
    InputMethod,
    /// anything else, like the user typing or clicking
    Other,
}

impl ChangeCause {
    pub(crate) fn from_v3(raw: u32) -> Self {
        match zwp_text_input_v3::ChangeCause::try_from(raw) {
            Ok(zwp_text_input_v3::ChangeCause::InputMethod) => ChangeCause::InputMethod,
            _ => ChangeCause::Other,
        }
    }

    pub(crate) fn to_v3(self) -> zwp_text_input_v3::ChangeCause {
        match self {
            ChangeCause::InputMethod => zwp_text_input_v3::ChangeCause::InputMethod,
            ChangeCause::Other => zwp_text_input_v3::ChangeCause::Other,
        }
    }
}

bitflags::bitflags! {
    /// Content hints
    ///
    /// The bits have the same values in every version of the protocols.
    #[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
    pub struct ContentHints: u32 {
        /// suggest word completions
        const COMPLETION = 0x1;
        /// suggest word corrections
        const SPELLCHECK = 0x2;
        /// switch to uppercase letters at the start of a sentence
        const AUTO_CAPITALIZATION = 0x4;
        /// prefer lowercase letters
        const LOWERCASE = 0x8;
        /// prefer uppercase letters
        const UPPERCASE = 0x10;
        /// prefer casing for titles and headings
        const TITLECASE = 0x20;
        /// characters should be hidden
        const HIDDEN_TEXT = 0x40;
        /// typed text should not be stored
        const SENSITIVE_DATA = 0x80;
        /// just Latin characters should be entered
        const LATIN = 0x100;
        /// the text input is multiline
        const MULTILINE = 0x200;
    }
}

impl ContentHints {
    /// Hints from a wire value of any version, unknown bits are dropped
    pub fn from_wire(raw: u32) -> Self {
        Self::from_bits_truncate(raw)
    }
}

/// Content purpose
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ContentPurpose {
    /// default input, allowing all characters
    #[default]
    Normal,
    /// allow only alphabetic characters
    Alpha,
    /// allow only digits
    Digits,
    /// input a number
    Number,
    /// input a phone number
    Phone,
    /// input an URL
    Url,
    /// input an email address
    Email,
    /// input a name of a person
    Name,
    /// input a password
    Password,
    /// input a numeric password, only known to text-input v3
    Pin,
    /// input a date
    Date,
    /// input a time
    Time,
    /// input a date and time
    Datetime,
    /// input for a terminal
    Terminal,
}

impl ContentPurpose {
    /// Purpose from a text-input v3 value, unknown values are `Normal`
    pub fn from_v3(raw: u32) -> Self {
        use zwp_text_input_v3::ContentPurpose as P;
        match P::try_from(raw) {
            Ok(P::Alpha) => Self::Alpha,
            Ok(P::Digits) => Self::Digits,
            Ok(P::Number) => Self::Number,
            Ok(P::Phone) => Self::Phone,
            Ok(P::Url) => Self::Url,
            Ok(P::Email) => Self::Email,
            Ok(P::Name) => Self::Name,
            Ok(P::Password) => Self::Password,
            Ok(P::Pin) => Self::Pin,
            Ok(P::Date) => Self::Date,
            Ok(P::Time) => Self::Time,
            Ok(P::Datetime) => Self::Datetime,
            Ok(P::Terminal) => Self::Terminal,
            _ => Self::Normal,
        }
    }

    /// Purpose from a text-input v1 or v2 value, unknown values are `Normal`
    pub fn from_legacy(raw: u32) -> Self {
        match raw {
            1 => Self::Alpha,
            2 => Self::Digits,
            3 => Self::Number,
            4 => Self::Phone,
            5 => Self::Url,
            6 => Self::Email,
            7 => Self::Name,
            8 => Self::Password,
            9 => Self::Date,
            10 => Self::Time,
            11 => Self::Datetime,
            12 => Self::Terminal,
            _ => Self::Normal,
        }
    }

    /// The text-input v3 value
    pub fn to_v3(self) -> zwp_text_input_v3::ContentPurpose {
        use zwp_text_input_v3::ContentPurpose as P;
        match self {
            Self::Normal => P::Normal,
            Self::Alpha => P::Alpha,
            Self::Digits => P::Digits,
            Self::Number => P::Number,
            Self::Phone => P::Phone,
            Self::Url => P::Url,
            Self::Email => P::Email,
            Self::Name => P::Name,
            Self::Password => P::Password,
            Self::Pin => P::Pin,
            Self::Date => P::Date,
            Self::Time => P::Time,
            Self::Datetime => P::Datetime,
            Self::Terminal => P::Terminal,
        }
    }

    /// The text-input v1 and v2 value
    ///
    /// `Pin` does not exist there and becomes `Password`, the second member of
    /// the pair is `true` in that case.
    pub fn to_legacy(self) -> (u32, bool) {
        match self {
            Self::Normal => (0, false),
            Self::Alpha => (1, false),
            Self::Digits => (2, false),
            Self::Number => (3, false),
            Self::Phone => (4, false),
            Self::Url => (5, false),
            Self::Email => (6, false),
            Self::Name => (7, false),
            Self::Password => (8, false),
            Self::Pin => (8, true),
            Self::Date => (9, false),
            Self::Time => (10, false),
            Self::Datetime => (11, false),
            Self::Terminal => (12, false),
        }
    }
}

/// Converts purposes for v1 and v2 peers, warning once about lossy conversions
#[derive(Debug, Default)]
pub(crate) struct PurposeMapper {
    warned: bool,
}

impl PurposeMapper {
    pub(crate) fn legacy(&mut self, purpose: ContentPurpose) -> u32 {
        let (raw, lossy) = purpose.to_legacy();
        if lossy && !self.warned {
            log::warn!("Content purpose {:?} is unknown to v1 input methods, sending Password", purpose);
            self.warned = true;
        }
        raw
    }
}

bitflags::bitflags! {
    /// Fields of a [`TextInputState`] that differ between two states
    #[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
    pub struct StateChanges: u32 {
        /// `enabled`
        const ENABLED = 0x1;
        /// `surrounding_text`, `cursor` or `anchor`
        const SURROUNDING_TEXT = 0x2;
        /// `change_cause`
        const CHANGE_CAUSE = 0x4;
        /// `content_hints` or `content_purpose`
        const CONTENT_TYPE = 0x8;
        /// `cursor_rectangle`
        const CURSOR_RECTANGLE = 0x10;
        /// `preferred_language`
        const PREFERRED_LANGUAGE = 0x20;
    }
}

/// State of a text input
///
/// Offsets are in bytes into `surrounding_text` and always fall on character
/// boundaries. When `enabled` is false the other fields carry no meaning.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextInputState {
    /// the text input wants input method support
    pub enabled: bool,
    /// text around the cursor
    pub surrounding_text: String,
    /// cursor offset
    pub cursor: i32,
    /// selection anchor offset, equal to `cursor` without selection
    pub anchor: i32,
    /// content hints
    pub content_hints: ContentHints,
    /// content purpose
    pub content_purpose: ContentPurpose,
    /// cursor rectangle, surface-local
    pub cursor_rectangle: Rect,
    /// preferred language, as a RFC-3066 tag, empty if unset
    pub preferred_language: String,
    /// cause of the last surrounding text change
    pub change_cause: ChangeCause,
}

impl TextInputState {
    /// Fields of `self` that differ from `previous`
    pub fn changes_from(&self, previous: &TextInputState) -> StateChanges {
        let mut changes = StateChanges::empty();
        if self.enabled != previous.enabled {
            changes |= StateChanges::ENABLED;
        }
        if self.surrounding_text != previous.surrounding_text
            || self.cursor != previous.cursor
            || self.anchor != previous.anchor
        {
            changes |= StateChanges::SURROUNDING_TEXT;
        }
        if self.change_cause != previous.change_cause {
            changes |= StateChanges::CHANGE_CAUSE;
        }
        if self.content_hints != previous.content_hints
            || self.content_purpose != previous.content_purpose
        {
            changes |= StateChanges::CONTENT_TYPE;
        }
        if self.cursor_rectangle != previous.cursor_rectangle {
            changes |= StateChanges::CURSOR_RECTANGLE;
        }
        if self.preferred_language != previous.preferred_language {
            changes |= StateChanges::PREFERRED_LANGUAGE;
        }
        changes
    }

    /// Set the surrounding text after checking the offsets
    pub fn set_surrounding_text(
        &mut self,
        text: String,
        cursor: i64,
        anchor: i64,
    ) -> Result<(), SurroundingTextError> {
        let cursor = check_offset(&text, cursor)?;
        let anchor = check_offset(&text, anchor)?;
        self.surrounding_text = text;
        self.cursor = cursor;
        self.anchor = anchor;
        Ok(())
    }
}

/// Check that `offset` is a character boundary of `text`
fn check_offset(text: &str, offset: i64) -> Result<i32, SurroundingTextError> {
    let out_of_bounds = SurroundingTextError::OutOfBounds { offset, len: text.len() };
    let index = usize::try_from(offset).map_err(|_| out_of_bounds.clone())?;
    if index > text.len() {
        return Err(out_of_bounds);
    }
    if !text.is_char_boundary(index) {
        return Err(SurroundingTextError::NotCharBoundary { offset: index });
    }
    i32::try_from(index).map_err(|_| out_of_bounds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_inside_a_character_are_rejected() {
        let mut state = TextInputState::default();
        // 68 C3 A9 6C 6C 6F
        let ret = state.set_surrounding_text("héllo".into(), 2, 2);
        assert_eq!(ret, Err(SurroundingTextError::NotCharBoundary { offset: 2 }));
        assert_eq!(state.surrounding_text, "");
        assert!(state.set_surrounding_text("héllo".into(), 3, 1).is_ok());
        assert_eq!((state.cursor, state.anchor), (3, 1));
    }

    #[test]
    fn both_ends_of_the_text_are_valid() {
        let mut state = TextInputState::default();
        assert!(state.set_surrounding_text("abc".into(), 0, 3).is_ok());
        assert!(state.set_surrounding_text(String::new(), 0, 0).is_ok());
        assert_eq!(
            state.set_surrounding_text("abc".into(), 4, 0),
            Err(SurroundingTextError::OutOfBounds { offset: 4, len: 3 })
        );
        assert_eq!(
            state.set_surrounding_text("abc".into(), 0, -1),
            Err(SurroundingTextError::OutOfBounds { offset: -1, len: 3 })
        );
    }

    #[test]
    fn identical_states_have_no_changes() {
        let mut state = TextInputState { enabled: true, ..Default::default() };
        assert_eq!(state.changes_from(&state.clone()), StateChanges::empty());
        let before = state.clone();
        state.content_purpose = ContentPurpose::Email;
        state.cursor_rectangle = Rect::new(1, 2, 3, 4);
        assert_eq!(
            state.changes_from(&before),
            StateChanges::CONTENT_TYPE | StateChanges::CURSOR_RECTANGLE
        );
    }

    #[test]
    fn pin_is_only_lossy_purpose() {
        for raw in 0..=12 {
            let purpose = ContentPurpose::from_legacy(raw);
            assert_eq!(purpose.to_legacy(), (raw, false));
            assert_eq!(ContentPurpose::from_v3(purpose.to_v3().into()), purpose);
        }
        assert_eq!(ContentPurpose::from_v3(9), ContentPurpose::Pin);
        assert_eq!(ContentPurpose::Pin.to_legacy(), (8, true));
    }

    #[test]
    fn lossy_purposes_still_convert_after_the_warning() {
        let mut purposes = PurposeMapper::default();
        assert_eq!(purposes.legacy(ContentPurpose::Pin), 8);
        assert!(purposes.warned);
        assert_eq!(purposes.legacy(ContentPurpose::Pin), 8);
        assert_eq!(purposes.legacy(ContentPurpose::Terminal), 12);
    }

    #[test]
    fn unknown_hint_bits_are_dropped() {
        let hints = ContentHints::from_wire(0x7 | 0x8000);
        assert_eq!(
            hints,
            ContentHints::COMPLETION | ContentHints::SPELLCHECK | ContentHints::AUTO_CAPITALIZATION
        );
    }
}
