//! Frame format shared by every pipe: a 4-byte signed tag, a 4-byte signed
//! count, then `count` bytes of payload, all little-endian.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Cursor};

/// Rank of a worker within a world, 0-based.
pub type Rank = i32;
/// User-assigned message label. `>= 0` are user tags, `0` is the receive-side
/// wildcard, negative values are reserved for protocol control.
pub type Tag = i32;

/// The channel's atomic write capacity. Sends and receives chunk large
/// payloads to this size, matching the `MIMPI_CHANNEL_BUF` constant the
/// original implementation pins.
pub const CHANNEL_BUF_SIZE: usize = 512;

pub const GROUP_BEGIN: Tag = -2;
pub const GROUP_END: Tag = -3;
pub const GROUP_FAIL: Tag = -8;
pub const FINALIZE_BEGIN: Tag = -1984;
pub const FINALIZE_END: Tag = -4891;
pub const PEER_LEAVING: Tag = -7;
pub const TERMINATE_RECEIVER: Tag = -1;

/// Wildcard tag on the receive side: matches any strictly positive send tag.
pub const ANY_TAG: Tag = 0;

pub const HEADER_LEN: usize = 8;

/// A decoded 8-byte metadata frame (tag, count).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub tag: Tag,
    pub count: i32,
}

impl Header {
    pub fn encode(self) -> [u8; HEADER_LEN] {
        let mut buf = [0u8; HEADER_LEN];
        {
            let mut cur = Cursor::new(&mut buf[..]);
            cur.write_i32::<LittleEndian>(self.tag).expect("write into fixed buffer");
            cur.write_i32::<LittleEndian>(self.count).expect("write into fixed buffer");
        }
        buf
    }

    pub fn decode(buf: &[u8; HEADER_LEN]) -> io::Result<Header> {
        let mut cur = Cursor::new(&buf[..]);
        let tag = cur.read_i32::<LittleEndian>()?;
        let count = cur.read_i32::<LittleEndian>()?;
        Ok(Header { tag, count })
    }

    pub fn is_control(self) -> bool {
        self.tag < 0
    }
}
