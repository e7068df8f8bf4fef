//! Handshake message header: one type byte and a 24-bit body length.

use bytes::Bytes;

use crate::{
    errors::Result,
    wire::{WireReader, WireWriter},
};

/// Size of the handshake header on the wire.
pub const HANDSHAKE_HEADER_LENGTH: usize = 4;

/// Decoded handshake header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandshakeHeader {
    /// Handshake type byte
    pub msg_type: u8,
    /// Declared body length
    pub length: u32,
}

impl HandshakeHeader {
    /// Read a header from the reader's current position.
    pub fn parse(reader: &mut WireReader<'_>) -> Result<Self> {
        let msg_type = reader.read_u8()?;
        let length = reader.read_u24()?;
        Ok(Self { msg_type, length })
    }

    /// Decode a header at `pos` without consuming anything.
    pub fn peek(buf: &[u8], pos: usize) -> Option<Self> {
        Self::parse(&mut WireReader::at(buf, pos)).ok()
    }

    /// Header plus declared body length.
    pub fn total_length(&self) -> usize {
        HANDSHAKE_HEADER_LENGTH + self.length as usize
    }

    /// True if `available` bytes hold the whole message.
    pub fn is_complete_in(&self, available: usize) -> bool {
        available >= self.total_length()
    }
}

/// Frame `body` as a handshake message with the given type and length.
///
/// `length` is written as given so callers can emit a deliberately wrong
/// value.
pub fn wrap_handshake(msg_type: u8, length: u32, body: &[u8]) -> Result<Bytes> {
    let mut writer = WireWriter::with_capacity(HANDSHAKE_HEADER_LENGTH + body.len());
    writer.put_u8(msg_type);
    writer.put_u24(length)?;
    writer.put_bytes(body);
    Ok(writer.freeze())
}

/// Split a byte stream into whole handshake messages.
///
/// Returns the complete messages and the number of bytes they cover. An
/// incomplete trailing message is left unconsumed.
pub fn split_messages(buf: &[u8]) -> (Vec<&[u8]>, usize) {
    let mut messages = Vec::new();
    let mut pos = 0;
    while let Some(header) = HandshakeHeader::peek(buf, pos) {
        if !header.is_complete_in(buf.len() - pos) {
            break;
        }
        let end = pos + header.total_length();
        messages.push(&buf[pos..end]);
        pos = end;
    }
    (messages, pos)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peek_needs_four_bytes() {
        assert_eq!(HandshakeHeader::peek(&[0x01, 0x00, 0x00], 0), None);
        assert_eq!(
            HandshakeHeader::peek(&[0xFF, 0x0E, 0x00, 0x00, 0x02], 1),
            Some(HandshakeHeader { msg_type: 0x0E, length: 2 })
        );
    }

    #[test]
    fn wrap_keeps_declared_length() {
        let wrapped = wrap_handshake(20, 99, &[1, 2, 3]).expect("length fits");
        assert_eq!(wrapped.as_ref(), &[20, 0, 0, 99, 1, 2, 3]);
    }

    #[test]
    fn split_leaves_partial_tail() {
        let stream = [14, 0, 0, 0, 20, 0, 0, 2, 0xAA, 0xBB, 16, 0, 0, 5, 0x01];
        let (messages, consumed) = split_messages(&stream);

        assert_eq!(messages, vec![&stream[0..4], &stream[4..10]]);
        assert_eq!(consumed, 10);
    }
}
