//! Core protocol objects referenced by the text-input and input-method protocols
//!
//! Only the parts a compositor needs to host text clients and an input method
//! are described: surfaces and their regions, the seat and its devices, and
//! outputs. `wl_callback` is described by the backend.

use imbridge_backend::{
    core_interfaces::WL_CALLBACK_INTERFACE,
    protocol::{
        AllowNull::{No, Yes},
        ArgumentType::*,
        Interface, ANONYMOUS_INTERFACE,
    },
};

use crate::{creates, destructor, msg, objects, since};

/// `wl_compositor`
pub static WL_COMPOSITOR_INTERFACE: Interface = Interface {
    name: "wl_compositor",
    version: 1,
    requests: &[
        creates(msg("create_surface", &[NewId]), &WL_SURFACE_INTERFACE),
        creates(msg("create_region", &[NewId]), &WL_REGION_INTERFACE),
    ],
    events: &[],
};

/// `wl_surface`
///
/// Buffers are created by the embedding compositor's own globals, so `attach`
/// accepts any object.
pub static WL_SURFACE_INTERFACE: Interface = Interface {
    name: "wl_surface",
    version: 1,
    requests: &[
        destructor(msg("destroy", &[])),
        objects(msg("attach", &[Object(Yes), Int, Int]), &[&ANONYMOUS_INTERFACE]),
        msg("damage", &[Int, Int, Int, Int]),
        creates(msg("frame", &[NewId]), &WL_CALLBACK_INTERFACE),
        objects(msg("set_opaque_region", &[Object(Yes)]), &[&WL_REGION_INTERFACE]),
        objects(msg("set_input_region", &[Object(Yes)]), &[&WL_REGION_INTERFACE]),
        msg("commit", &[]),
    ],
    events: &[
        objects(msg("enter", &[Object(No)]), &[&WL_OUTPUT_INTERFACE]),
        objects(msg("leave", &[Object(No)]), &[&WL_OUTPUT_INTERFACE]),
    ],
};

/// `wl_region`
pub static WL_REGION_INTERFACE: Interface = Interface {
    name: "wl_region",
    version: 1,
    requests: &[
        destructor(msg("destroy", &[])),
        msg("add", &[Int, Int, Int, Int]),
        msg("subtract", &[Int, Int, Int, Int]),
    ],
    events: &[],
};

/// `wl_seat`
pub static WL_SEAT_INTERFACE: Interface = Interface {
    name: "wl_seat",
    version: 4,
    requests: &[
        creates(msg("get_pointer", &[NewId]), &WL_POINTER_INTERFACE),
        creates(msg("get_keyboard", &[NewId]), &WL_KEYBOARD_INTERFACE),
        creates(msg("get_touch", &[NewId]), &WL_TOUCH_INTERFACE),
    ],
    events: &[msg("capabilities", &[Uint]), since(msg("name", &[Str(No)]), 2)],
};

/// `wl_pointer`
pub static WL_POINTER_INTERFACE: Interface = Interface {
    name: "wl_pointer",
    version: 4,
    requests: &[
        objects(msg("set_cursor", &[Uint, Object(Yes), Int, Int]), &[&WL_SURFACE_INTERFACE]),
        since(destructor(msg("release", &[])), 3),
    ],
    events: &[
        objects(msg("enter", &[Uint, Object(No), Fixed, Fixed]), &[&WL_SURFACE_INTERFACE]),
        objects(msg("leave", &[Uint, Object(No)]), &[&WL_SURFACE_INTERFACE]),
        msg("motion", &[Uint, Fixed, Fixed]),
        msg("button", &[Uint, Uint, Uint, Uint]),
        msg("axis", &[Uint, Uint, Fixed]),
    ],
};

/// `wl_keyboard`
pub static WL_KEYBOARD_INTERFACE: Interface = Interface {
    name: "wl_keyboard",
    version: 4,
    requests: &[since(destructor(msg("release", &[])), 3)],
    events: &[
        msg("keymap", &[Uint, Fd, Uint]),
        objects(msg("enter", &[Uint, Object(No), Array]), &[&WL_SURFACE_INTERFACE]),
        objects(msg("leave", &[Uint, Object(No)]), &[&WL_SURFACE_INTERFACE]),
        msg("key", &[Uint, Uint, Uint, Uint]),
        msg("modifiers", &[Uint, Uint, Uint, Uint, Uint]),
        since(msg("repeat_info", &[Int, Int]), 4),
    ],
};

/// `wl_touch`
pub static WL_TOUCH_INTERFACE: Interface = Interface {
    name: "wl_touch",
    version: 4,
    requests: &[since(destructor(msg("release", &[])), 3)],
    events: &[
        objects(msg("down", &[Uint, Uint, Object(No), Int, Fixed, Fixed]), &[&WL_SURFACE_INTERFACE]),
        msg("up", &[Uint, Uint, Int]),
        msg("motion", &[Uint, Int, Fixed, Fixed]),
        msg("frame", &[]),
        msg("cancel", &[]),
    ],
};

/// `wl_output`
pub static WL_OUTPUT_INTERFACE: Interface = Interface {
    name: "wl_output",
    version: 1,
    requests: &[],
    events: &[
        msg("geometry", &[Int, Int, Int, Int, Int, Str(No), Str(No), Int]),
        msg("mode", &[Uint, Int, Int, Int]),
    ],
};

/// Surface creation
pub mod wl_compositor {
    use std::os::unix::io::OwnedFd;

    use imbridge_backend::{protocol::Message, server::ObjectId};

    use crate::{parse_with, DispatchError};

    /// Requests of `wl_compositor`
    #[derive(Debug)]
    pub enum Request {
        /// Create a `wl_surface`
        CreateSurface {
            /// the new surface
            id: ObjectId,
        },
        /// Create a `wl_region`
        CreateRegion {
            /// the new region
            id: ObjectId,
        },
    }

    impl Request {
        /// Decode a request
        pub fn parse(msg: Message<ObjectId, OwnedFd>) -> Result<Self, DispatchError> {
            parse_with(msg, &super::WL_COMPOSITOR_INTERFACE, |opcode, args| match opcode {
                0 => Some(Request::CreateSurface { id: args.new_id()? }),
                1 => Some(Request::CreateRegion { id: args.new_id()? }),
                _ => None,
            })
        }
    }
}

/// A rectangular area that can be displayed
pub mod wl_surface {
    use std::os::unix::io::{OwnedFd, RawFd};

    use imbridge_backend::{
        message,
        protocol::{Argument, Message},
        server::ObjectId,
    };

    use crate::{parse_with, DispatchError};

    /// Requests of `wl_surface`
    #[derive(Debug)]
    pub enum Request {
        /// Delete the surface
        Destroy,
        /// Set the pending buffer, `None` unmaps the surface on commit
        Attach {
            /// buffer of the surface content
            buffer: Option<ObjectId>,
            /// surface-local x offset
            x: i32,
            /// surface-local y offset
            y: i32,
        },
        /// Mark part of the surface damaged
        Damage {
            /// x of the damaged area
            x: i32,
            /// y of the damaged area
            y: i32,
            /// width of the damaged area
            width: i32,
            /// height of the damaged area
            height: i32,
        },
        /// Request a frame callback
        Frame {
            /// the callback
            callback: ObjectId,
        },
        /// Set the opaque region
        SetOpaqueRegion {
            /// the region, `None` for empty
            region: Option<ObjectId>,
        },
        /// Set the input region
        SetInputRegion {
            /// the region, `None` for infinite
            region: Option<ObjectId>,
        },
        /// Apply the pending state
        Commit,
    }

    impl Request {
        /// Decode a request
        pub fn parse(msg: Message<ObjectId, OwnedFd>) -> Result<Self, DispatchError> {
            parse_with(msg, &super::WL_SURFACE_INTERFACE, |opcode, args| match opcode {
                0 => Some(Request::Destroy),
                1 => Some(Request::Attach { buffer: args.opt_object()?, x: args.int()?, y: args.int()? }),
                2 => Some(Request::Damage {
                    x: args.int()?,
                    y: args.int()?,
                    width: args.int()?,
                    height: args.int()?,
                }),
                3 => Some(Request::Frame { callback: args.new_id()? }),
                4 => Some(Request::SetOpaqueRegion { region: args.opt_object()? }),
                5 => Some(Request::SetInputRegion { region: args.opt_object()? }),
                6 => Some(Request::Commit),
                _ => None,
            })
        }
    }

    /// Events of `wl_surface`
    #[derive(Debug)]
    pub enum Event {
        /// The surface entered an output
        Enter {
            /// the output
            output: ObjectId,
        },
        /// The surface left an output
        Leave {
            /// the output
            output: ObjectId,
        },
    }

    impl Event {
        /// Encode the event as sent by `sender_id`
        pub fn into_message(self, sender_id: ObjectId) -> Message<ObjectId, RawFd> {
            match self {
                Event::Enter { output } => message!(sender_id, 0, [Argument::Object(output)]),
                Event::Leave { output } => message!(sender_id, 1, [Argument::Object(output)]),
            }
        }
    }
}

/// Region description
pub mod wl_region {
    use std::os::unix::io::OwnedFd;

    use imbridge_backend::{protocol::Message, server::ObjectId};

    use crate::{parse_with, DispatchError};

    /// Requests of `wl_region`
    #[derive(Debug)]
    pub enum Request {
        /// Destroy the region
        Destroy,
        /// Add a rectangle
        Add {
            /// x
            x: i32,
            /// y
            y: i32,
            /// width
            width: i32,
            /// height
            height: i32,
        },
        /// Subtract a rectangle
        Subtract {
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

    impl Request {
        /// Decode a request
        pub fn parse(msg: Message<ObjectId, OwnedFd>) -> Result<Self, DispatchError> {
            parse_with(msg, &super::WL_REGION_INTERFACE, |opcode, args| match opcode {
                0 => Some(Request::Destroy),
                1 => Some(Request::Add {
                    x: args.int()?,
                    y: args.int()?,
                    width: args.int()?,
                    height: args.int()?,
                }),
                2 => Some(Request::Subtract {
                    x: args.int()?,
                    y: args.int()?,
                    width: args.int()?,
                    height: args.int()?,
                }),
                _ => None,
            })
        }
    }
}

/// Group of input devices
pub mod wl_seat {
    use std::os::unix::io::{OwnedFd, RawFd};

    use imbridge_backend::{
        message,
        protocol::{Argument, Message},
        server::ObjectId,
    };

    use crate::{parse_with, string_arg, DispatchError};

    bitflags::bitflags! {
        /// Seat capability bitmask
        #[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
        pub struct Capability: u32 {
            /// the seat has pointer devices
            const Pointer = 1;
            /// the seat has one or more keyboards
            const Keyboard = 2;
            /// the seat has touch devices
            const Touch = 4;
        }
    }

    /// The minimal object version supporting the `name` event
    pub const EVT_NAME_SINCE: u32 = 2;

    /// Requests of `wl_seat`
    #[derive(Debug)]
    pub enum Request {
        /// Create a `wl_pointer`
        GetPointer {
            /// the new pointer
            id: ObjectId,
        },
        /// Create a `wl_keyboard`
        GetKeyboard {
            /// the new keyboard
            id: ObjectId,
        },
        /// Create a `wl_touch`
        GetTouch {
            /// the new touch object
            id: ObjectId,
        },
    }

    impl Request {
        /// Decode a request
        pub fn parse(msg: Message<ObjectId, OwnedFd>) -> Result<Self, DispatchError> {
            parse_with(msg, &super::WL_SEAT_INTERFACE, |opcode, args| match opcode {
                0 => Some(Request::GetPointer { id: args.new_id()? }),
                1 => Some(Request::GetKeyboard { id: args.new_id()? }),
                2 => Some(Request::GetTouch { id: args.new_id()? }),
                _ => None,
            })
        }
    }

    /// Events of `wl_seat`
    #[derive(Debug)]
    pub enum Event {
        /// Devices available in the seat
        Capabilities {
            /// capabilities of the seat
            capabilities: Capability,
        },
        /// Name of the seat
        Name {
            /// seat identifier
            name: String,
        },
    }

    impl Event {
        /// Encode the event as sent by `sender_id`
        pub fn into_message(self, sender_id: ObjectId) -> Message<ObjectId, RawFd> {
            match self {
                Event::Capabilities { capabilities } => {
                    message!(sender_id, 0, [Argument::Uint(capabilities.bits())])
                }
                Event::Name { name } => message!(sender_id, 1, [string_arg(name)]),
            }
        }
    }
}

/// Pointer input device
pub mod wl_pointer {
    use std::os::unix::io::OwnedFd;

    use imbridge_backend::{protocol::Message, server::ObjectId};

    use crate::{parse_with, DispatchError};

    /// Requests of `wl_pointer`
    #[derive(Debug)]
    pub enum Request {
        /// Set the pointer surface
        SetCursor {
            /// serial of the enter event
            serial: u32,
            /// the cursor surface
            surface: Option<ObjectId>,
            /// hotspot x
            hotspot_x: i32,
            /// hotspot y
            hotspot_y: i32,
        },
        /// Release the pointer object
        Release,
    }

    impl Request {
        /// Decode a request
        pub fn parse(msg: Message<ObjectId, OwnedFd>) -> Result<Self, DispatchError> {
            parse_with(msg, &super::WL_POINTER_INTERFACE, |opcode, args| match opcode {
                0 => Some(Request::SetCursor {
                    serial: args.uint()?,
                    surface: args.opt_object()?,
                    hotspot_x: args.int()?,
                    hotspot_y: args.int()?,
                }),
                1 => Some(Request::Release),
                _ => None,
            })
        }
    }
}

/// Keyboard input device
pub mod wl_keyboard {
    use std::os::unix::io::{OwnedFd, RawFd};

    use imbridge_backend::{
        message,
        protocol::{Argument, Message},
        server::ObjectId,
    };

    use crate::{parse_with, DispatchError};

    /// Keyboard mapping format
    #[repr(u32)]
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub enum KeymapFormat {
        /// no keymap, the client should use its own
        NoKeymap = 0,
        /// libxkbcommon compatible, null-terminated string
        XkbV1 = 1,
    }

    impl std::convert::TryFrom<u32> for KeymapFormat {
        type Error = ();
        fn try_from(val: u32) -> Result<KeymapFormat, ()> {
            match val {
                0 => Ok(KeymapFormat::NoKeymap),
                1 => Ok(KeymapFormat::XkbV1),
                _ => Err(()),
            }
        }
    }

    impl std::convert::From<KeymapFormat> for u32 {
        fn from(val: KeymapFormat) -> u32 {
            val as u32
        }
    }

    /// Physical key state
    #[repr(u32)]
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub enum KeyState {
        /// key is not pressed
        Released = 0,
        /// key is pressed
        Pressed = 1,
    }

    impl std::convert::TryFrom<u32> for KeyState {
        type Error = ();
        fn try_from(val: u32) -> Result<KeyState, ()> {
            match val {
                0 => Ok(KeyState::Released),
                1 => Ok(KeyState::Pressed),
                _ => Err(()),
            }
        }
    }

    impl std::convert::From<KeyState> for u32 {
        fn from(val: KeyState) -> u32 {
            val as u32
        }
    }

    /// The minimal object version supporting the `release` request
    pub const REQ_RELEASE_SINCE: u32 = 3;
    /// The minimal object version supporting the `repeat_info` event
    pub const EVT_REPEAT_INFO_SINCE: u32 = 4;

    /// Requests of `wl_keyboard`
    #[derive(Debug)]
    pub enum Request {
        /// Release the keyboard object
        Release,
    }

    impl Request {
        /// Decode a request
        pub fn parse(msg: Message<ObjectId, OwnedFd>) -> Result<Self, DispatchError> {
            parse_with(msg, &super::WL_KEYBOARD_INTERFACE, |opcode, _| match opcode {
                0 => Some(Request::Release),
                _ => None,
            })
        }
    }

    /// Events of `wl_keyboard`
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
        /// Keyboard focus entered a surface
        Enter {
            /// serial number of the enter event
            serial: u32,
            /// surface gaining keyboard focus
            surface: ObjectId,
            /// the currently pressed keys, as native endian u32
            keys: Vec<u8>,
        },
        /// Keyboard focus left a surface
        Leave {
            /// serial number of the leave event
            serial: u32,
            /// surface that lost keyboard focus
            surface: ObjectId,
        },
        /// Key event
        Key {
            /// serial number of the key event
            serial: u32,
            /// timestamp with millisecond granularity
            time: u32,
            /// key that produced the event
            key: u32,
            /// physical state of the key
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
            /// the rate of repeating keys in characters per second
            rate: i32,
            /// delay in milliseconds since key down until repeating starts
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
                Event::Enter { serial, surface, keys } => message!(
                    sender_id,
                    1,
                    [
                        Argument::Uint(serial),
                        Argument::Object(surface),
                        Argument::Array(Box::new(keys))
                    ]
                ),
                Event::Leave { serial, surface } => {
                    message!(sender_id, 2, [Argument::Uint(serial), Argument::Object(surface)])
                }
                Event::Key { serial, time, key, state } => message!(
                    sender_id,
                    3,
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
                        4,
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
                    message!(sender_id, 5, [Argument::Int(rate), Argument::Int(delay)])
                }
            }
        }
    }
}

/// Touchscreen input device
pub mod wl_touch {
    use std::os::unix::io::OwnedFd;

    use imbridge_backend::{protocol::Message, server::ObjectId};

    use crate::{parse_with, DispatchError};

    /// Requests of `wl_touch`
    #[derive(Debug)]
    pub enum Request {
        /// Release the touch object
        Release,
    }

    impl Request {
        /// Decode a request
        pub fn parse(msg: Message<ObjectId, OwnedFd>) -> Result<Self, DispatchError> {
            parse_with(msg, &super::WL_TOUCH_INTERFACE, |opcode, _| match opcode {
                0 => Some(Request::Release),
                _ => None,
            })
        }
    }
}

/// Compositor output region
pub mod wl_output {
    use std::os::unix::io::RawFd;

    use imbridge_backend::{
        message,
        protocol::{Argument, Message},
        server::ObjectId,
    };

    use crate::string_arg;

    /// Events of `wl_output`
    #[derive(Debug)]
    pub enum Event {
        /// Properties of the output
        Geometry {
            /// x position within the global compositor space
            x: i32,
            /// y position within the global compositor space
            y: i32,
            /// width in millimeters of the output
            physical_width: i32,
            /// height in millimeters of the output
            physical_height: i32,
            /// subpixel orientation, as `wl_output.subpixel`
            subpixel: i32,
            /// textual description of the manufacturer
            make: String,
            /// textual description of the model
            model: String,
            /// transform, as `wl_output.transform`
            transform: i32,
        },
        /// Advertise available modes for the output
        Mode {
            /// bitfield of mode flags, 1 is current
            flags: u32,
            /// width of the mode in hardware units
            width: i32,
            /// height of the mode in hardware units
            height: i32,
            /// vertical refresh rate in mHz
            refresh: i32,
        },
    }

    impl Event {
        /// Encode the event as sent by `sender_id`
        pub fn into_message(self, sender_id: ObjectId) -> Message<ObjectId, RawFd> {
            match self {
                Event::Geometry {
                    x,
                    y,
                    physical_width,
                    physical_height,
                    subpixel,
                    make,
                    model,
                    transform,
                } => message!(
                    sender_id,
                    0,
                    [
                        Argument::Int(x),
                        Argument::Int(y),
                        Argument::Int(physical_width),
                        Argument::Int(physical_height),
                        Argument::Int(subpixel),
                        string_arg(make),
                        string_arg(model),
                        Argument::Int(transform)
                    ]
                ),
                Event::Mode { flags, width, height, refresh } => message!(
                    sender_id,
                    1,
                    [
                        Argument::Uint(flags),
                        Argument::Int(width),
                        Argument::Int(height),
                        Argument::Int(refresh)
                    ]
                ),
            }
        }
    }
}
