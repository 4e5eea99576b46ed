//! Little-endian primitive reader and writer.

use crate::CodecError;
use gridwire_core::Guid;

/// Append-only buffer with back-patching for length prefixes.
#[derive(Debug, Default)]
pub struct ByteWriter {
    buf: Vec<u8>,
}

impl ByteWriter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn position(&self) -> usize {
        self.buf.len()
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn write_bool(&mut self, value: bool) {
        self.buf.push(u8::from(value));
    }

    pub fn write_i32(&mut self, value: i32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Write a collection length as an `int32`.
    pub fn write_len(&mut self, len: usize) {
        self.write_i32(i32::try_from(len).unwrap_or(i32::MAX));
    }

    pub fn write_guid(&mut self, value: Guid) {
        self.buf.extend_from_slice(value.as_bytes());
    }

    /// 7-bit variable-length byte count followed by UTF-8.
    pub fn write_string(&mut self, value: &str) {
        let mut len = value.len();
        loop {
            let byte = (len & 0x7f) as u8;
            len >>= 7;
            if len == 0 {
                self.buf.push(byte);
                break;
            }
            self.buf.push(byte | 0x80);
        }
        self.buf.extend_from_slice(value.as_bytes());
    }

    /// Overwrite the `int32` previously written at `at`.
    pub fn patch_i32(&mut self, at: usize, value: i32) {
        if let Some(slot) = self.buf.get_mut(at..at + 4) {
            slot.copy_from_slice(&value.to_le_bytes());
        }
    }

    #[must_use]
    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}

/// Cursor over an encoded document.
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    #[must_use]
    pub fn position(&self) -> usize {
        self.pos
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], CodecError> {
        if self.remaining() < len {
            return Err(CodecError::Truncated {
                offset: self.pos,
                wanted: len,
            });
        }
        let bytes = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_bool(&mut self) -> Result<bool, CodecError> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_i32(&mut self) -> Result<i32, CodecError> {
        Ok(i32::from_le_bytes(self.read_array()?))
    }

    /// Non-negative `int32` count; a negative value is malformed.
    pub fn read_len(&mut self) -> Result<usize, CodecError> {
        let value = self.read_i32()?;
        usize::try_from(value).map_err(|_| CodecError::Malformed("negative length"))
    }

    pub fn read_guid(&mut self) -> Result<Guid, CodecError> {
        Ok(Guid::from_bytes(self.read_array()?))
    }

    pub fn read_string(&mut self) -> Result<String, CodecError> {
        let mut len = 0usize;
        let mut shift = 0u32;
        loop {
            if shift > 28 {
                return Err(CodecError::Malformed("string length prefix too long"));
            }
            let byte = self.read_u8()?;
            len |= usize::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                break;
            }
            shift += 7;
        }
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| CodecError::Malformed("invalid utf-8"))
    }

    /// Advance past `len` bytes.
    pub fn skip(&mut self, len: usize) -> Result<(), CodecError> {
        self.take(len).map(|_| ())
    }

    /// Jump to an absolute offset inside the buffer.
    pub fn seek(&mut self, pos: usize) -> Result<(), CodecError> {
        if pos > self.data.len() {
            return Err(CodecError::Truncated {
                offset: self.pos,
                wanted: pos - self.pos,
            });
        }
        self.pos = pos;
        Ok(())
    }
}
