//! Encoding and decoding of messages in the wire format
//!
//! A message is a header of two 32 bit words (sender id, then `size << 16 | opcode`)
//! followed by the arguments, each padded to a multiple of 4 bytes. File descriptors
//! are not part of the payload, they travel as ancillary data.

use std::collections::VecDeque;
use std::ffi::CStr;
use std::os::unix::io::{BorrowedFd, OwnedFd, RawFd};

use smallvec::SmallVec;

use crate::protocol::{AllowNull, Argument, ArgumentType, Message};

/// Error while serializing a message
#[derive(Debug)]
pub enum MessageWriteError {
    /// Not enough room left in the buffer
    BufferTooSmall,
    /// A file descriptor of the message could not be duplicated
    DupFdFailed(std::io::Error),
}

impl std::error::Error for MessageWriteError {}

impl std::fmt::Display for MessageWriteError {
    fn fmt(&self, f: &mut ::std::fmt::Formatter) -> Result<(), ::std::fmt::Error> {
        match self {
            Self::BufferTooSmall => {
                f.write_str("The provided buffer is too small to hold message content.")
            }
            Self::DupFdFailed(e) => {
                write!(f, "The message contains a file descriptor that could not be dup()-ed ({e}).")
            }
        }
    }
}

/// Error while deserializing a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageParseError {
    /// The message needs more file descriptors than were received
    MissingFD,
    /// The buffer holds only part of the message
    MissingData,
    /// The message cannot be decoded
    Malformed,
}

impl std::error::Error for MessageParseError {}

impl std::fmt::Display for MessageParseError {
    fn fmt(&self, f: &mut ::std::fmt::Formatter) -> Result<(), ::std::fmt::Error> {
        match *self {
            Self::MissingFD => {
                f.write_str("The message references a FD but the buffer FD is empty.")
            }
            Self::MissingData => f.write_str("More data is needed to deserialize the message"),
            Self::Malformed => f.write_str("The message is malformed and cannot be parsed"),
        }
    }
}

#[inline]
fn padded(len: usize) -> usize {
    (len + 3) & !3
}

fn encoded_len(args: &[Argument<u32, RawFd>]) -> usize {
    8 + args
        .iter()
        .map(|arg| match arg {
            Argument::Str(Some(s)) => 4 + padded(s.as_bytes_with_nul().len()),
            Argument::Str(None) => 4,
            Argument::Array(a) => 4 + padded(a.len()),
            Argument::Fd(_) => 0,
            _ => 4,
        })
        .sum::<usize>()
}

/// Serialize a message into `payload`, appending duplicated fds to `fds`.
///
/// Returns the number of bytes written. On error nothing is written.
pub fn write_to_buffers(
    msg: &Message<u32, RawFd>,
    payload: &mut [u8],
    fds: &mut Vec<OwnedFd>,
) -> Result<usize, MessageWriteError> {
    let len = encoded_len(&msg.args);
    if len > payload.len() || len > u16::MAX as usize {
        return Err(MessageWriteError::BufferTooSmall);
    }

    // dup the fds first, so that a failure leaves the buffers untouched
    let mut new_fds = SmallVec::<[OwnedFd; 2]>::new();
    for arg in &msg.args {
        if let Argument::Fd(fd) = *arg {
            let fd = unsafe { BorrowedFd::borrow_raw(fd) };
            let dup = rustix::io::fcntl_dupfd_cloexec(fd, 0)
                .map_err(|e| MessageWriteError::DupFdFailed(e.into()))?;
            new_fds.push(dup);
        }
    }

    payload[0..4].copy_from_slice(&msg.sender_id.to_ne_bytes());
    payload[4..8].copy_from_slice(&(((len as u32) << 16) | msg.opcode as u32).to_ne_bytes());

    let mut offset = 8;
    for arg in &msg.args {
        match arg {
            Argument::Int(i) | Argument::Fixed(i) => {
                payload[offset..offset + 4].copy_from_slice(&i.to_ne_bytes());
                offset += 4;
            }
            Argument::Uint(u) | Argument::Object(u) | Argument::NewId(u) => {
                payload[offset..offset + 4].copy_from_slice(&u.to_ne_bytes());
                offset += 4;
            }
            Argument::Str(None) => {
                payload[offset..offset + 4].copy_from_slice(&0u32.to_ne_bytes());
                offset += 4;
            }
            Argument::Str(Some(s)) => {
                offset = write_bytes(payload, offset, s.as_bytes_with_nul());
            }
            Argument::Array(a) => {
                offset = write_bytes(payload, offset, a);
            }
            Argument::Fd(_) => {}
        }
    }
    debug_assert_eq!(offset, len);

    fds.extend(new_fds);
    Ok(len)
}

fn write_bytes(payload: &mut [u8], offset: usize, bytes: &[u8]) -> usize {
    payload[offset..offset + 4].copy_from_slice(&(bytes.len() as u32).to_ne_bytes());
    let start = offset + 4;
    payload[start..start + bytes.len()].copy_from_slice(bytes);
    let end = start + padded(bytes.len());
    payload[start + bytes.len()..end].fill(0);
    end
}

/// Decode one message from the front of `raw`, given the signature of its opcode.
///
/// Returns the message and the unconsumed remainder of `raw`. File descriptors are
/// taken from the front of `fds`.
pub fn parse_message<'a>(
    raw: &'a [u8],
    signature: &[ArgumentType],
    fds: &mut VecDeque<OwnedFd>,
) -> Result<(Message<u32, OwnedFd>, &'a [u8]), MessageParseError> {
    if raw.len() < 8 {
        return Err(MessageParseError::MissingData);
    }
    let sender_id = read_u32(raw, 0);
    let word_2 = read_u32(raw, 4);
    let opcode = (word_2 & 0x0000_FFFF) as u16;
    let len = (word_2 >> 16) as usize;

    if len < 8 || len % 4 != 0 {
        return Err(MessageParseError::Malformed);
    }
    if raw.len() < len {
        return Err(MessageParseError::MissingData);
    }
    let fd_count = signature.iter().filter(|t| matches!(t, ArgumentType::Fd)).count();
    if fds.len() < fd_count {
        return Err(MessageParseError::MissingFD);
    }

    let (body, rest) = raw.split_at(len);
    let mut offset = 8;
    let mut args = SmallVec::with_capacity(signature.len());
    for typ in signature {
        let arg = match *typ {
            ArgumentType::Fd => {
                // checked above
                let fd = fds.pop_front().ok_or(MessageParseError::MissingFD)?;
                args.push(Argument::Fd(fd));
                continue;
            }
            _ if body.len() < offset + 4 => return Err(MessageParseError::Malformed),
            ArgumentType::Int => Argument::Int(read_u32(body, offset) as i32),
            ArgumentType::Fixed => Argument::Fixed(read_u32(body, offset) as i32),
            ArgumentType::Uint => Argument::Uint(read_u32(body, offset)),
            ArgumentType::Object(_) => Argument::Object(read_u32(body, offset)),
            ArgumentType::NewId => Argument::NewId(read_u32(body, offset)),
            ArgumentType::Str(allow_null) => {
                let (bytes, next) = read_bytes(body, offset)?;
                offset = next;
                if bytes.is_empty() {
                    if allow_null == AllowNull::No {
                        return Err(MessageParseError::Malformed);
                    }
                    args.push(Argument::Str(None));
                } else {
                    let s = CStr::from_bytes_with_nul(bytes)
                        .map_err(|_| MessageParseError::Malformed)?;
                    args.push(Argument::Str(Some(Box::new(s.into()))));
                }
                continue;
            }
            ArgumentType::Array => {
                let (bytes, next) = read_bytes(body, offset)?;
                offset = next;
                args.push(Argument::Array(Box::new(bytes.to_vec())));
                continue;
            }
        };
        offset += 4;
        args.push(arg);
    }
    if offset != len {
        return Err(MessageParseError::Malformed);
    }

    Ok((Message { sender_id, opcode, args }, rest))
}

#[inline]
fn read_u32(raw: &[u8], offset: usize) -> u32 {
    u32::from_ne_bytes([raw[offset], raw[offset + 1], raw[offset + 2], raw[offset + 3]])
}

fn read_bytes(body: &[u8], offset: usize) -> Result<(&[u8], usize), MessageParseError> {
    let len = read_u32(body, offset) as usize;
    let start = offset + 4;
    let end = start.checked_add(padded(len)).ok_or(MessageParseError::Malformed)?;
    if end > body.len() {
        return Err(MessageParseError::Malformed);
    }
    Ok((&body[start..start + len], end))
}
