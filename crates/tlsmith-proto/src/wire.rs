//! Bounds-checked big-endian readers and writers.

use bytes::{BufMut, Bytes, BytesMut};

use crate::errors::{ProtocolError, Result};

/// Cursor over a borrowed byte slice.
///
/// Reads never panic. A read past the end returns
/// [`ProtocolError::Truncated`] and leaves the cursor where it was.
#[derive(Debug, Clone)]
pub struct WireReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    /// Reader positioned at the start of `buf`.
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Reader positioned at `pos`, clamped to the buffer length.
    pub fn at(buf: &'a [u8], pos: usize) -> Self {
        Self { buf, pos: pos.min(buf.len()) }
    }

    /// Absolute offset into the underlying buffer.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left to read.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// The underlying buffer.
    pub fn buffer(&self) -> &'a [u8] {
        self.buf
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let available = self.remaining();
        if n > available {
            return Err(ProtocolError::Truncated { needed: n, available });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    /// Next byte without consuming it.
    pub fn peek_u8(&self) -> Option<u8> {
        self.buf.get(self.pos).copied()
    }

    /// Read one byte.
    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    /// Read a big-endian u16.
    pub fn read_u16(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    /// Read a big-endian 24-bit integer.
    pub fn read_u24(&mut self) -> Result<u32> {
        let b = self.take(3)?;
        Ok(u32::from_be_bytes([0, b[0], b[1], b[2]]))
    }

    /// Read a big-endian u32.
    pub fn read_u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Read exactly `n` bytes.
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        self.take(n)
    }

    /// Read everything that is left.
    pub fn read_rest(&mut self) -> &'a [u8] {
        let rest = &self.buf[self.pos..];
        self.pos = self.buf.len();
        rest
    }
}

/// Growable big-endian writer.
#[derive(Debug, Default)]
pub struct WireWriter {
    buf: BytesMut,
}

impl WireWriter {
    /// Empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty writer with room for `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self { buf: BytesMut::with_capacity(capacity) }
    }

    /// Append one byte.
    pub fn put_u8(&mut self, value: u8) {
        self.buf.put_u8(value);
    }

    /// Append a big-endian u16.
    pub fn put_u16(&mut self, value: u16) {
        self.buf.put_u16(value);
    }

    /// Append a big-endian 24-bit integer.
    pub fn put_u24(&mut self, value: u32) -> Result<()> {
        if value > 0x00FF_FFFF {
            return Err(ProtocolError::LengthOverflow { value: value as usize, bits: 24 });
        }
        self.buf.put_slice(&value.to_be_bytes()[1..]);
        Ok(())
    }

    /// Append a big-endian u32.
    pub fn put_u32(&mut self, value: u32) {
        self.buf.put_u32(value);
    }

    /// Append raw bytes.
    pub fn put_bytes(&mut self, value: &[u8]) {
        self.buf.put_slice(value);
    }

    /// Bytes written so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// True if nothing was written.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Finish writing.
    pub fn freeze(self) -> Bytes {
        self.buf.freeze()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_are_big_endian() {
        let data = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0A];
        let mut reader = WireReader::new(&data);

        assert_eq!(reader.read_u8(), Ok(0x01));
        assert_eq!(reader.read_u16(), Ok(0x0203));
        assert_eq!(reader.read_u24(), Ok(0x04_0506));
        assert_eq!(reader.read_u32(), Ok(0x0708_090A));
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn truncated_read_keeps_position() {
        let data = [0xAA, 0xBB];
        let mut reader = WireReader::new(&data);
        reader.read_u8().expect("one byte available");

        assert_eq!(reader.read_u16(), Err(ProtocolError::Truncated { needed: 2, available: 1 }));
        assert_eq!(reader.position(), 1);
        assert_eq!(reader.read_rest(), &[0xBB]);
    }

    #[test]
    fn u24_rejects_wide_values() {
        let mut writer = WireWriter::new();
        writer.put_u24(0x00AB_CDEF).expect("fits in 24 bits");
        assert_eq!(writer.put_u24(0x0100_0000), Err(ProtocolError::LengthOverflow {
            value: 0x0100_0000,
            bits: 24
        }));
        assert_eq!(writer.freeze().as_ref(), &[0xAB, 0xCD, 0xEF]);
    }
}
