//! Text input protocols
//!
//! A text input object represents the text field of a client. The compositor
//! forwards its state to the input method and delivers the text the input
//! method produces back to it.
//!
//! The three versions are incompatible on the wire and coexist: toolkits of
//! different ages speak different ones.
//!
//! - [`v1`]: objects activated explicitly on a surface, `commit_state` serials
//! - [`v2`]: `enable`/`disable` per surface, serials on `enter`/`leave`/`update_state`
//! - [`v3`]: double-buffered state applied by `commit`, `done` events counting commits

pub mod v1;
pub mod v2;
pub mod v3;
