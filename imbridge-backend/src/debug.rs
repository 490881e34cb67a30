//! `WAYLAND_DEBUG` tracing, in the same format as libwayland

use std::{
    fmt::Display,
    os::unix::io::AsRawFd,
    time::{SystemTime, UNIX_EPOCH},
};

use crate::protocol::Argument;

/// Whether `WAYLAND_DEBUG` asks for server side tracing
pub fn has_debug_server_env() -> bool {
    matches!(std::env::var_os("WAYLAND_DEBUG"), Some(str) if str == "1" || str == "server")
}

/// Trace a request as it is dispatched:
///
/// `[timestamp] <- interface@id.msg_name(args)`
pub fn print_dispatched_message<Id: Display, Fd: AsRawFd>(
    interface: &str,
    id: u32,
    msg_name: &str,
    args: &[Argument<Id, Fd>],
) {
    eprintln!("{} <- {}@{}.{}({})", Timestamp, interface, id, msg_name, DisplaySlice(args));
}

/// Trace an event as it is sent:
///
/// `[timestamp] -> interface@id.msg_name(args)`
///
/// Events aimed at dead objects are dropped and marked `[discarded]`.
pub fn print_send_message<Id: Display, Fd: AsRawFd>(
    interface: &str,
    id: u32,
    msg_name: &str,
    args: &[Argument<Id, Fd>],
    discarded: bool,
) {
    eprintln!(
        "{}{} -> {}@{}.{}({})",
        Timestamp,
        if discarded { "[discarded]" } else { "" },
        interface,
        id,
        msg_name,
        DisplaySlice(args)
    );
}

pub(crate) struct DisplaySlice<'a, D>(pub &'a [D]);

impl<D: Display> Display for DisplaySlice<'_, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut it = self.0.iter();
        if let Some(val) = it.next() {
            write!(f, "{val}")?;
        }
        for val in it {
            write!(f, ", {val}")?;
        }
        Ok(())
    }
}

/// Milliseconds with microsecond precision, truncated like libwayland does.
struct Timestamp;

impl Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(timestamp) => {
                let time =
                    (timestamp.as_secs() * 1000000 + timestamp.subsec_nanos() as u64 / 1000) as u32;
                write!(f, "[{:7}.{:03}]", time / 1000, time % 1000)
            }
            Err(_) => Ok(()),
        }
    }
}
