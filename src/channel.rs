//! Thin wrapper over a single pipe descriptor: blocking, chunked read/write
//! bounded by [`CHANNEL_BUF_SIZE`](crate::wire::CHANNEL_BUF_SIZE).
//!
//! The launcher contract (spec §6) only promises "a reliable, ordered
//! byte-stream channel with blocking read/write and a fixed atomic buffer
//! capacity" — this module is the one place that assumption about the
//! underlying descriptor lives, so nothing above it needs to know the peer
//! is a pipe rather than, say, a socket.

use std::io;
use std::os::fd::{BorrowedFd, RawFd};

use crate::wire::{Header, Tag, CHANNEL_BUF_SIZE, HEADER_LEN};

fn nix_to_io(e: nix::Error) -> io::Error {
    io::Error::from_raw_os_error(e as i32)
}

fn borrow(fd: RawFd) -> BorrowedFd<'static> {
    // SAFETY: every RawFd handed to this module is owned by the `World` (or
    // by `mimpirun`) for the lifetime of the process and is only closed
    // explicitly during finalize/teardown, well after the last read/write.
    unsafe { BorrowedFd::borrow_raw(fd) }
}

/// Read end of a pipe to one peer.
#[derive(Debug)]
pub struct PipeReader(pub RawFd);

/// Write end of a pipe to one peer.
#[derive(Debug)]
pub struct PipeWriter(pub RawFd);

impl PipeReader {
    /// Reads the 8-byte metadata frame. Returns `Ok(None)` on a clean
    /// end-of-stream (zero bytes read before any byte of the frame arrived);
    /// an EOF partway through the frame is an error, not a clean close.
    pub fn read_header(&self) -> io::Result<Option<Header>> {
        let mut buf = [0u8; HEADER_LEN];
        let mut filled = 0;
        while filled < buf.len() {
            let n = nix::unistd::read(borrow(self.0), &mut buf[filled..]).map_err(nix_to_io)?;
            if n == 0 {
                if filled == 0 {
                    return Ok(None);
                }
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "pipe closed mid-frame",
                ));
            }
            filled += n;
        }
        Ok(Some(Header::decode(&buf)?))
    }

    /// Reads exactly `count` bytes of payload, in chunks bounded by the
    /// channel buffer size. An EOF before `count` bytes have arrived is a
    /// mid-payload close and is reported as an error.
    pub fn read_payload(&self, count: usize) -> io::Result<Vec<u8>> {
        let mut payload = vec![0u8; count];
        let mut filled = 0;
        while filled < count {
            let end = (filled + CHANNEL_BUF_SIZE).min(count);
            let n = nix::unistd::read(borrow(self.0), &mut payload[filled..end]).map_err(nix_to_io)?;
            if n == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "pipe closed mid-payload",
                ));
            }
            filled += n;
        }
        Ok(payload)
    }
}

impl PipeWriter {
    /// Writes a full frame (header + payload), chunked so no single write
    /// exceeds the channel buffer size.
    pub fn write_frame(&self, tag: Tag, payload: &[u8]) -> io::Result<()> {
        let header = Header { tag, count: payload.len() as i32 }.encode();
        self.write_all_chunked(&header)?;
        self.write_all_chunked(payload)
    }

    fn write_all_chunked(&self, mut buf: &[u8]) -> io::Result<()> {
        while !buf.is_empty() {
            let chunk_len = buf.len().min(CHANNEL_BUF_SIZE);
            let n = nix::unistd::write(borrow(self.0), &buf[..chunk_len]).map_err(nix_to_io)?;
            if n == 0 {
                return Err(io::Error::new(io::ErrorKind::WriteZero, "pipe accepted zero bytes"));
            }
            buf = &buf[n..];
        }
        Ok(())
    }
}
