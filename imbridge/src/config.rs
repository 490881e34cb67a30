//! Settings of the bridge

use std::{
    os::unix::io::{AsFd, BorrowedFd, OwnedFd},
    sync::Arc,
};

/// XKB keymap sent to keyboard grabs
#[derive(Debug, Clone)]
pub struct Keymap {
    fd: Arc<OwnedFd>,
    size: u32,
}

impl Keymap {
    /// A keymap stored in `fd`, a file of `size` bytes in the `xkb_v1` format
    pub fn new(fd: OwnedFd, size: u32) -> Self {
        Self { fd: Arc::new(fd), size }
    }

    /// The file holding the keymap
    pub fn fd(&self) -> BorrowedFd<'_> {
        self.fd.as_fd()
    }

    /// Size of the keymap in bytes
    pub fn size(&self) -> u32 {
        self.size
    }
}

/// Key repetition sent to keyboard grabs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepeatInfo {
    /// characters per second, 0 disables repetition
    pub rate: i32,
    /// milliseconds before repetition starts
    pub delay: i32,
}

impl Default for RepeatInfo {
    fn default() -> Self {
        Self { rate: 25, delay: 600 }
    }
}

/// Which globals the bridge advertises, and the data it hands to input methods
///
/// Versions are clamped to what the bridge implements. `None` leaves a global
/// out.
///
/// ```
/// use imbridge::Config;
///
/// let config = Config::default().text_input_v1(None).seat_name("seat1");
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    pub(crate) text_input_v1: Option<u32>,
    pub(crate) text_input_v2: Option<u32>,
    pub(crate) text_input_v3: Option<u32>,
    pub(crate) input_method_v1: Option<u32>,
    pub(crate) input_panel_v1: Option<u32>,
    pub(crate) input_method_v2: Option<u32>,
    pub(crate) core_globals: bool,
    pub(crate) seat_name: String,
    pub(crate) keymap: Option<Keymap>,
    pub(crate) repeat_info: RepeatInfo,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            text_input_v1: Some(1),
            text_input_v2: Some(1),
            text_input_v3: Some(1),
            input_method_v1: Some(1),
            input_panel_v1: Some(1),
            input_method_v2: Some(1),
            core_globals: true,
            seat_name: "seat0".into(),
            keymap: None,
            repeat_info: RepeatInfo::default(),
        }
    }
}

impl Config {
    /// Version of `zwp_text_input_manager_v1`
    pub fn text_input_v1(mut self, version: Option<u32>) -> Self {
        self.text_input_v1 = version;
        self
    }

    /// Version of `zwp_text_input_manager_v2`
    pub fn text_input_v2(mut self, version: Option<u32>) -> Self {
        self.text_input_v2 = version;
        self
    }

    /// Version of `zwp_text_input_manager_v3`
    pub fn text_input_v3(mut self, version: Option<u32>) -> Self {
        self.text_input_v3 = version;
        self
    }

    /// Version of `zwp_input_method_v1`
    pub fn input_method_v1(mut self, version: Option<u32>) -> Self {
        self.input_method_v1 = version;
        self
    }

    /// Version of `zwp_input_panel_v1`
    pub fn input_panel_v1(mut self, version: Option<u32>) -> Self {
        self.input_panel_v1 = version;
        self
    }

    /// Version of `zwp_input_method_manager_v2`
    pub fn input_method_v2(mut self, version: Option<u32>) -> Self {
        self.input_method_v2 = version;
        self
    }

    /// Whether to advertise `wl_compositor`, `wl_seat` and `wl_output`.
    ///
    /// Turn this off when the compositor provides them itself.
    pub fn core_globals(mut self, enabled: bool) -> Self {
        self.core_globals = enabled;
        self
    }

    /// Name sent in `wl_seat.name`
    pub fn seat_name(mut self, name: impl Into<String>) -> Self {
        self.seat_name = name.into();
        self
    }

    /// Keymap sent to keyboard grabs
    pub fn keymap(mut self, keymap: Keymap) -> Self {
        self.keymap = Some(keymap);
        self
    }

    /// Key repetition sent to keyboard grabs
    pub fn repeat_info(mut self, rate: i32, delay: i32) -> Self {
        self.repeat_info = RepeatInfo { rate, delay };
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builders_override_defaults() {
        let config = Config::default()
            .text_input_v2(None)
            .input_method_v2(Some(3))
            .repeat_info(40, 200)
            .core_globals(false);
        assert_eq!(config.text_input_v1, Some(1));
        assert_eq!(config.text_input_v2, None);
        assert_eq!(config.input_method_v2, Some(3));
        assert_eq!(config.repeat_info, RepeatInfo { rate: 40, delay: 200 });
        assert!(!config.core_globals);
        assert_eq!(config.seat_name, "seat0");
    }
}
