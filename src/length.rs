//! The 1-byte / 4-byte length prefix in front of every name and value in a params stream.
//!
//! Lengths up to 127 take one byte. Anything longer takes four big-endian bytes with the top bit
//! of the first one set, leaving 31 bits for the length itself.

use super::error::{FastcgiError, Result};

use byteorder::{ByteOrder, NetworkEndian};
use bytes::{Buf, BufMut, BytesMut};

pub const MAX_PARAM_LENGTH: u64 = 0x7FFF_FFFF;

const LONG_FLAG: u32 = 0x8000_0000;

/// Number of bytes `write_len` will use for the given length.
pub fn encoded_len(len: usize) -> usize {
    if len < 0x80 {
        1
    } else {
        4
    }
}

pub fn check_len(len: usize) -> Result<()> {
    if len as u64 > MAX_PARAM_LENGTH {
        error!("un-encodable name-value pair length: {:#x}", len);
        return Err(FastcgiError::MalformedLength(len as u64));
    }
    Ok(())
}

pub fn write_len(buf: &mut BytesMut, len: usize) -> Result<()> {
    check_len(len)?;
    if len < 0x80 {
        buf.put_u8(len as u8);
    } else {
        let mut bytes = [0u8; 4];
        NetworkEndian::write_u32(&mut bytes, len as u32 | LONG_FLAG);
        buf.extend_from_slice(&bytes);
    }
    Ok(())
}

/// Consume one length prefix from the front of the buffer.
pub fn read_len(buf: &mut BytesMut) -> Result<usize> {
    let first_byte = match buf.first() {
        Some(b) => *b,
        None => return Err(FastcgiError::IncompleteRead),
    };
    if first_byte < 0x80 {
        buf.advance(1);
        Ok(first_byte as usize)
    } else if buf.len() < 4 {
        debug!("truncated 4-byte length: {} bytes left", buf.len());
        Err(FastcgiError::IncompleteRead)
    } else {
        let len = NetworkEndian::read_u32(&buf[..4]) & !LONG_FLAG;
        buf.advance(4);
        Ok(len as usize)
    }
}
