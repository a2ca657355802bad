//! Buffer primitives for view payloads
//!
//! Integers are big-endian. Strings are UTF-8 prefixed with their byte length
//! as a base-128 varint (at most 3 bytes), matching the client's buffer codec.

/// Longest string accepted on either side of the wire (bytes)
pub const MAX_STRING_BYTES: usize = 32_767;

/// Varint length prefixes never exceed this many bytes
const MAX_VARINT_BYTES: usize = 3;

/// Errors that can occur while reading a payload
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WireError {
    #[error("Unexpected end of buffer: needed {needed} bytes, {remaining} remaining")]
    UnexpectedEof { needed: usize, remaining: usize },
    #[error("String is not valid UTF-8")]
    InvalidUtf8,
    #[error("String too long: {0} bytes (max 32767)")]
    StringTooLong(usize),
    #[error("Varint longer than 3 bytes")]
    VarIntTooLong,
    #[error("Unknown ordinal {0}")]
    UnknownOrdinal(i32),
}

/// Growable output buffer
#[derive(Debug, Default, Clone)]
pub struct WireWriter {
    buffer: Vec<u8>,
}

impl WireWriter {
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(64),
        }
    }

    pub fn write_i32(&mut self, value: i32) -> &mut Self {
        self.buffer.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub fn write_varint(&mut self, value: u32) -> &mut Self {
        let mut value = value;
        loop {
            if value & !0x7F == 0 {
                self.buffer.push(value as u8);
                return self;
            }
            self.buffer.push((value as u8 & 0x7F) | 0x80);
            value >>= 7;
        }
    }

    /// Write a length-prefixed UTF-8 string, truncated at a char boundary
    /// when it exceeds [`MAX_STRING_BYTES`]
    pub fn write_utf8(&mut self, value: &str) -> &mut Self {
        let mut end = value.len().min(MAX_STRING_BYTES);
        while !value.is_char_boundary(end) {
            end -= 1;
        }
        let bytes = &value.as_bytes()[..end];
        self.write_varint(bytes.len() as u32);
        self.buffer.extend_from_slice(bytes);
        self
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }
}

/// Cursor over a received payload
pub struct WireReader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> WireReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    fn read(&mut self, n: usize) -> Result<&'a [u8], WireError> {
        let remaining = self.data.len() - self.position;
        if n > remaining {
            return Err(WireError::UnexpectedEof { needed: n, remaining });
        }
        let slice = &self.data[self.position..self.position + n];
        self.position += n;
        Ok(slice)
    }

    pub fn read_i32(&mut self) -> Result<i32, WireError> {
        self.read(4)
            .map(|b| i32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_varint(&mut self) -> Result<u32, WireError> {
        let mut value = 0u32;
        for i in 0..MAX_VARINT_BYTES {
            let byte = self.read(1)?[0];
            value |= ((byte & 0x7F) as u32) << (7 * i);
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(WireError::VarIntTooLong)
    }

    pub fn read_utf8(&mut self) -> Result<String, WireError> {
        let len = self.read_varint()? as usize;
        if len > MAX_STRING_BYTES {
            return Err(WireError::StringTooLong(len));
        }
        let bytes = self.read(len)?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| WireError::InvalidUtf8)
    }

    pub fn has_remaining(&self) -> bool {
        self.position < self.data.len()
    }

    pub fn position(&self) -> usize {
        self.position
    }
}
