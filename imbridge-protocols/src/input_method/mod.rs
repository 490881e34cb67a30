//! Input method protocols
//!
//! The input method is a privileged client, typically an on-screen keyboard.
//! The compositor tells it about the focused text input and receives the text
//! it composes.
//!
//! - [`v1`]: one context object created by the compositor per activation, and
//!   the input panel interface to turn surfaces into keyboards or overlays
//! - [`v2`]: a single object per seat with double-buffered replies, popup
//!   surfaces and keyboard grabs
//!
//! At most one input method is bound at a time.

pub mod v1;
pub mod v2;
