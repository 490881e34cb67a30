//! Buffered, non-blocking unix socket carrying wire messages

use std::collections::VecDeque;
use std::io::{ErrorKind, IoSlice, IoSliceMut, Result as IoResult};
use std::mem::MaybeUninit;
use std::os::unix::io::{AsFd, AsRawFd, BorrowedFd, OwnedFd, RawFd};
use std::os::unix::net::UnixStream;
use std::slice;

use rustix::io::retry_on_intr;
use rustix::net::{
    recvmsg, send, sendmsg, RecvAncillaryBuffer, RecvAncillaryMessage, RecvFlags,
    SendAncillaryBuffer, SendAncillaryMessage, SendFlags,
};

use crate::protocol::{ArgumentType, Message};
use crate::wire::{parse_message, write_to_buffers, MessageParseError, MessageWriteError};

/// Most fds a single `sendmsg` may carry
pub const MAX_FDS_OUT: usize = 28;
/// Most bytes a single `sendmsg` may carry
pub const MAX_BYTES_OUT: usize = 4096;
/// Most bytes queued for a peer that does not read
pub const MAX_BUFFERED_OUT: usize = 1024 * 1024;

/// A unix stream used with `MSG_DONTWAIT` on every call
#[derive(Debug)]
pub struct Socket {
    stream: UnixStream,
}

impl Socket {
    /// Send bytes and fds in one socket message.
    ///
    /// `bytes` must not exceed [`MAX_BYTES_OUT`] nor `fds` [`MAX_FDS_OUT`].
    pub fn send_msg(&self, bytes: &[u8], fds: &[OwnedFd]) -> IoResult<usize> {
        let flags = SendFlags::DONTWAIT | SendFlags::NOSIGNAL;

        if fds.is_empty() {
            return Ok(retry_on_intr(|| send(self, bytes, flags))?);
        }
        let iov = [IoSlice::new(bytes)];
        let mut cmsg_space = vec![MaybeUninit::uninit(); rustix::cmsg_space!(ScmRights(fds.len()))];
        let mut cmsg_buffer = SendAncillaryBuffer::new(&mut cmsg_space);
        // OwnedFd and BorrowedFd share their representation
        let fds = unsafe { slice::from_raw_parts(fds.as_ptr() as *const BorrowedFd, fds.len()) };
        cmsg_buffer.push(SendAncillaryMessage::ScmRights(fds));
        Ok(retry_on_intr(|| sendmsg(self, &iov, &mut cmsg_buffer, flags))?)
    }

    /// Receive one socket message into `buffer`, queueing received fds.
    ///
    /// Returns the number of bytes read, fails with `WouldBlock` when nothing is pending.
    pub fn rcv_msg(&self, buffer: &mut [u8], fds: &mut VecDeque<OwnedFd>) -> IoResult<usize> {
        let flags = RecvFlags::DONTWAIT | RecvFlags::CMSG_CLOEXEC;

        let mut cmsg_space = [MaybeUninit::uninit(); rustix::cmsg_space!(ScmRights(MAX_FDS_OUT))];
        let mut cmsg_buffer = RecvAncillaryBuffer::new(&mut cmsg_space);
        let mut iov = [IoSliceMut::new(buffer)];
        let msg = retry_on_intr(|| recvmsg(&self.stream, &mut iov[..], &mut cmsg_buffer, flags))?;

        fds.extend(
            cmsg_buffer
                .drain()
                .filter_map(|cmsg| match cmsg {
                    RecvAncillaryMessage::ScmRights(fds) => Some(fds),
                    _ => None,
                })
                .flatten(),
        );
        Ok(msg.bytes)
    }
}

impl From<UnixStream> for Socket {
    fn from(stream: UnixStream) -> Self {
        Self { stream }
    }
}

impl AsFd for Socket {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.stream.as_fd()
    }
}

impl AsRawFd for Socket {
    fn as_raw_fd(&self) -> RawFd {
        self.stream.as_raw_fd()
    }
}

/// A [`Socket`] with incoming and outgoing buffers, speaking in [`Message`]s
///
/// Outgoing messages are only queued, [`BufferedSocket::flush`] pushes them to the
/// socket. Nothing in here ever blocks.
#[derive(Debug)]
pub struct BufferedSocket {
    socket: Socket,
    in_data: Buffer<u8>,
    in_fds: VecDeque<OwnedFd>,
    out_data: Buffer<u8>,
    out_fds: Vec<OwnedFd>,
}

impl BufferedSocket {
    /// Wrap a socket
    pub fn new(socket: Socket) -> Self {
        Self {
            socket,
            // room for a full socket message plus a partially parsed leftover
            in_data: Buffer::new(2 * MAX_BYTES_OUT),
            in_fds: VecDeque::new(),
            out_data: Buffer::new(MAX_BYTES_OUT),
            out_fds: Vec::new(),
        }
    }

    /// Whether queued outgoing data is waiting for a flush
    pub fn has_pending_output(&self) -> bool {
        !self.out_data.get_contents().is_empty()
    }

    /// Push as much of the outgoing buffer as the socket accepts.
    ///
    /// Fails with `WouldBlock` if the peer is not reading, the rest of the data
    /// stays queued.
    pub fn flush(&mut self) -> IoResult<()> {
        let bytes = self.out_data.get_contents();
        let mut written_bytes = 0;
        let mut written_fds = 0;
        let mut ret = Ok(());
        while written_bytes < bytes.len() {
            let mut chunk = &bytes[written_bytes..];
            let mut chunk_fds = &self.out_fds[written_fds..];
            if chunk_fds.len() > MAX_FDS_OUT {
                // attach overflowing fds to single bytes, like libwayland does
                chunk = &chunk[..1];
                chunk_fds = &chunk_fds[..MAX_FDS_OUT];
            }
            if chunk.len() > MAX_BYTES_OUT {
                chunk = &chunk[..MAX_BYTES_OUT];
            }
            match self.socket.send_msg(chunk, chunk_fds) {
                Ok(count) => {
                    written_bytes += count;
                    written_fds += chunk_fds.len();
                    if count == 0 {
                        break;
                    }
                }
                Err(error) => {
                    ret = Err(error);
                    break;
                }
            }
        }
        self.out_data.offset(written_bytes);
        self.out_data.move_to_front();
        self.out_fds.drain(..written_fds);
        ret
    }

    fn attempt_write_message(&mut self, msg: &Message<u32, RawFd>) -> IoResult<bool> {
        match write_to_buffers(msg, self.out_data.get_writable_storage(), &mut self.out_fds) {
            Ok(bytes_out) => {
                self.out_data.advance(bytes_out);
                Ok(true)
            }
            Err(MessageWriteError::BufferTooSmall) => Ok(false),
            Err(MessageWriteError::DupFdFailed(e)) => Err(e),
        }
    }

    /// Queue a message, flushing first if the outgoing buffer is full.
    ///
    /// A peer that does not read is not an error here: the buffer grows up to
    /// [`MAX_BUFFERED_OUT`] bytes, past that the message is refused with `E2BIG`.
    pub fn write_message(&mut self, msg: &Message<u32, RawFd>) -> IoResult<()> {
        if self.attempt_write_message(msg)? {
            return Ok(());
        }
        if let Err(e) = self.flush() {
            if e.kind() != ErrorKind::WouldBlock {
                return Err(e);
            }
        }
        while !self.attempt_write_message(msg)? {
            // the peer is slow, keep its events queued instead of waiting on it
            if self.out_data.capacity() >= MAX_BUFFERED_OUT {
                return Err(rustix::io::Errno::TOOBIG.into());
            }
            self.out_data.grow(MAX_BYTES_OUT);
        }
        Ok(())
    }

    /// Read whatever the socket has into the incoming buffers.
    ///
    /// A closed peer is reported as `EPIPE`.
    pub fn fill_incoming_buffers(&mut self) -> IoResult<()> {
        self.in_data.move_to_front();
        let in_bytes = self.socket.rcv_msg(self.in_data.get_writable_storage(), &mut self.in_fds)?;
        if in_bytes == 0 {
            return Err(rustix::io::Errno::PIPE.into());
        }
        self.in_data.advance(in_bytes);
        Ok(())
    }

    /// Decode the next buffered message.
    ///
    /// `signature` maps a sender id and opcode to the argument types of that
    /// message, `None` marks the message as malformed.
    pub fn read_one_message<F>(
        &mut self,
        mut signature: F,
    ) -> Result<Message<u32, OwnedFd>, MessageParseError>
    where
        F: FnMut(u32, u16) -> Option<&'static [ArgumentType]>,
    {
        let data = self.in_data.get_contents();
        if data.len() < 8 {
            return Err(MessageParseError::MissingData);
        }
        let object_id = u32::from_ne_bytes([data[0], data[1], data[2], data[3]]);
        let word_2 = u32::from_ne_bytes([data[4], data[5], data[6], data[7]]);
        let opcode = (word_2 & 0x0000_FFFF) as u16;
        let sig = signature(object_id, opcode).ok_or(MessageParseError::Malformed)?;
        let (msg, rest) = parse_message(data, sig, &mut self.in_fds)?;
        let consumed = data.len() - rest.len();
        self.in_data.offset(consumed);
        Ok(msg)
    }
}

impl AsRawFd for BufferedSocket {
    fn as_raw_fd(&self) -> RawFd {
        self.socket.as_raw_fd()
    }
}

impl AsFd for BufferedSocket {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.socket.as_fd()
    }
}

#[derive(Debug)]
struct Buffer<T: Copy> {
    storage: Vec<T>,
    occupied: usize,
    offset: usize,
}

impl<T: Copy + Default> Buffer<T> {
    fn new(size: usize) -> Self {
        Self { storage: vec![T::default(); size], occupied: 0, offset: 0 }
    }

    /// Mark `count` more elements as written
    fn advance(&mut self, count: usize) {
        self.occupied += count;
    }

    /// Mark `count` more elements as read
    fn offset(&mut self, count: usize) {
        self.offset += count;
    }

    /// Written but not yet read elements
    fn get_contents(&self) -> &[T] {
        &self.storage[self.offset..self.occupied]
    }

    fn capacity(&self) -> usize {
        self.storage.len()
    }

    fn grow(&mut self, additional: usize) {
        self.storage.resize(self.storage.len() + additional, T::default());
    }

    fn get_writable_storage(&mut self) -> &mut [T] {
        &mut self.storage[self.occupied..]
    }

    /// Move unread contents to the start of the storage
    fn move_to_front(&mut self) {
        if self.occupied > self.offset {
            self.storage.copy_within(self.offset..self.occupied, 0)
        }
        self.occupied -= self.offset;
        self.offset = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message;
    use crate::protocol::{AllowNull, Argument};
    use std::ffi::CString;

    fn pair() -> (BufferedSocket, BufferedSocket) {
        let (a, b) = UnixStream::pair().unwrap();
        (BufferedSocket::new(Socket::from(a)), BufferedSocket::new(Socket::from(b)))
    }

    const SIG: &[ArgumentType] = &[ArgumentType::Uint, ArgumentType::Str(AllowNull::No)];

    #[test]
    fn write_read_cycle() {
        let (mut client, mut server) = pair();
        for i in 0..3u32 {
            let msg: Message<u32, RawFd> = message!(
                7,
                1,
                [Argument::Uint(i), Argument::Str(Some(Box::new(CString::new("日本語").unwrap())))],
            );
            client.write_message(&msg).unwrap();
        }
        assert!(client.has_pending_output());
        client.flush().unwrap();
        assert!(!client.has_pending_output());

        server.fill_incoming_buffers().unwrap();
        for i in 0..3u32 {
            let msg = server.read_one_message(|_, _| Some(SIG)).unwrap();
            assert_eq!(msg.sender_id, 7);
            assert_eq!(msg.opcode, 1);
            assert_eq!(msg.args[0], Argument::Uint(i));
        }
        assert_eq!(server.read_one_message(|_, _| Some(SIG)).unwrap_err(), MessageParseError::MissingData);
    }

    #[test]
    fn empty_socket_would_block() {
        let (_client, mut server) = pair();
        let err = server.fill_incoming_buffers().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WouldBlock);
    }

    #[test]
    fn closed_peer_is_epipe() {
        let (client, mut server) = pair();
        drop(client);
        let err = server.fill_incoming_buffers().unwrap_err();
        assert_eq!(err.raw_os_error(), Some(rustix::io::Errno::PIPE.raw_os_error()));
    }

    #[test]
    fn unknown_signature_is_malformed() {
        let (mut client, mut server) = pair();
        let msg: Message<u32, RawFd> = message!(7, 3, [Argument::Uint(1)]);
        client.write_message(&msg).unwrap();
        client.flush().unwrap();
        server.fill_incoming_buffers().unwrap();
        assert_eq!(server.read_one_message(|_, _| None).unwrap_err(), MessageParseError::Malformed);
    }

    #[test]
    fn writes_never_block_on_a_stalled_peer() {
        let (mut server, _client) = pair();
        let payload = CString::new("x".repeat(1000)).unwrap();
        // more than the kernel socket buffer, the peer never reads
        for _ in 0..600 {
            let msg: Message<u32, RawFd> =
                message!(1, 0, [Argument::Uint(0), Argument::Str(Some(Box::new(payload.clone())))]);
            server.write_message(&msg).unwrap();
        }
        assert_eq!(server.flush().unwrap_err().kind(), ErrorKind::WouldBlock);
        assert!(server.has_pending_output());
    }
}
