//! Cursor-backed parser for SML type-length (TL) encoded elements.
//!
//! Every read is bounds-checked and every length is validated against the
//! remaining input, so malformed data surfaces as a [`ParseError`] rather
//! than a panic. No parser requires backtracking; lookahead is limited to
//! [`Buffer::next_type`] and [`Buffer::optional_is_skipped`].

use crate::message::structs::{OctetString, Time, Value};
use thiserror::Error;

/// Type family bits of a TL byte.
pub const TYPE_OCTET_STRING: u8 = 0x00;
pub const TYPE_BOOLEAN: u8 = 0x40;
pub const TYPE_INTEGER: u8 = 0x50;
pub const TYPE_UNSIGNED: u8 = 0x60;
pub const TYPE_LIST: u8 = 0x70;

/// Mask selecting the type family of a TL byte.
pub const TYPE_FIELD: u8 = 0x70;
/// Mask selecting the four length bits of a TL byte.
pub const LENGTH_FIELD: u8 = 0x0F;
/// Set when the length field continues into the next TL byte.
pub const ANOTHER_TL: u8 = 0x80;

/// Single-byte sentinel for an absent optional element.
pub const OPTIONAL_SKIPPED: u8 = 0x01;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ParseError {
    #[error("unexpected end of buffer at offset {0}")]
    UnexpectedEnd(usize),
    #[error("type mismatch: expected 0x{expected:02x}, found 0x{found:02x}")]
    TypeMismatch { expected: u8, found: u8 },
    #[error("corrupt length field")]
    InvalidLength,
    #[error("unexpected length: expected {expected}, found {found}")]
    UnexpectedLength { expected: usize, found: usize },
    #[error("missing end-of-message marker")]
    MissingEndOfMessage,
}

/// A byte slice with a parse cursor. All parsers advance the cursor past
/// exactly the bytes they consume.
pub struct Buffer<'a> {
    bytes: &'a [u8],
    cursor: usize,
}

impl<'a> Buffer<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, cursor: 0 }
    }

    pub fn position(&self) -> usize {
        self.cursor
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.cursor
    }

    pub fn is_empty(&self) -> bool {
        self.cursor >= self.bytes.len()
    }

    /// Current byte without advancing.
    pub fn peek(&self) -> Result<u8, ParseError> {
        self.bytes
            .get(self.cursor)
            .copied()
            .ok_or(ParseError::UnexpectedEnd(self.cursor))
    }

    /// Consume and return the current byte.
    pub fn take_byte(&mut self) -> Result<u8, ParseError> {
        let byte = self.peek()?;
        self.cursor += 1;
        Ok(byte)
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], ParseError> {
        let end = self.cursor.checked_add(n).ok_or(ParseError::InvalidLength)?;
        let slice = self
            .bytes
            .get(self.cursor..end)
            .ok_or(ParseError::UnexpectedEnd(self.cursor))?;
        self.cursor = end;
        Ok(slice)
    }

    /// Type family of the next element, without advancing.
    pub fn next_type(&self) -> Result<u8, ParseError> {
        Ok(self.peek()? & TYPE_FIELD)
    }

    /// Consume the optional-skipped sentinel if the next byte is one.
    pub fn optional_is_skipped(&mut self) -> bool {
        if self.peek() == Ok(OPTIONAL_SKIPPED) {
            self.cursor += 1;
            true
        } else {
            false
        }
    }

    /// Parse a type-length prefix. Returns the family bits of the first TL
    /// byte and the data byte count, or the element count for a list.
    ///
    /// The length nibbles of continued TL bytes concatenate big-endian. For
    /// the non-list families the encoded length covers the TL bytes
    /// themselves and is reduced to the payload length here.
    pub fn parse_type_length(&mut self) -> Result<(u8, usize), ParseError> {
        let family = self.peek()? & TYPE_FIELD;
        let mut length: usize = 0;
        let mut tl_bytes: usize = 0;

        loop {
            let byte = self.take_byte()?;
            tl_bytes += 1;
            if tl_bytes > 8 {
                return Err(ParseError::InvalidLength);
            }
            length = (length << 4) | usize::from(byte & LENGTH_FIELD);
            if byte & ANOTHER_TL == 0 {
                break;
            }
        }

        if family == TYPE_LIST {
            Ok((family, length))
        } else {
            length
                .checked_sub(tl_bytes)
                .map(|data_len| (family, data_len))
                .ok_or(ParseError::InvalidLength)
        }
    }

    /// Assert that the next element has exactly the given family and
    /// length (element count for lists).
    pub fn expect(&mut self, family: u8, length: usize) -> Result<(), ParseError> {
        let (found_family, found_length) = self.parse_type_length()?;
        if found_family != family {
            return Err(ParseError::TypeMismatch {
                expected: family,
                found: found_family,
            });
        }
        if found_length != length {
            return Err(ParseError::UnexpectedLength {
                expected: length,
                found: found_length,
            });
        }
        Ok(())
    }

    fn accumulate(&mut self, len: usize, max_size: usize) -> Result<u64, ParseError> {
        if len > max_size {
            return Err(ParseError::UnexpectedLength {
                expected: max_size,
                found: len,
            });
        }
        let mut value: u64 = 0;
        for &byte in self.take(len)? {
            value = (value << 8) | u64::from(byte);
        }
        Ok(value)
    }

    /// Read a number of the given family, encoded in at most `max_size`
    /// data bytes. Meters routinely encode fewer bytes than the nominal
    /// width; the value is widened here.
    fn number(&mut self, family: u8, max_size: usize) -> Result<(u64, usize), ParseError> {
        let (found, len) = self.parse_type_length()?;
        if found != family {
            return Err(ParseError::TypeMismatch {
                expected: family,
                found,
            });
        }
        let value = self.accumulate(len, max_size)?;
        Ok((value, len))
    }

    fn unsigned(&mut self, max_size: usize) -> Result<u64, ParseError> {
        if self.optional_is_skipped() {
            return Ok(0);
        }
        Ok(self.number(TYPE_UNSIGNED, max_size)?.0)
    }

    fn signed(&mut self, max_size: usize) -> Result<i64, ParseError> {
        if self.optional_is_skipped() {
            return Ok(0);
        }
        let (raw, len) = self.number(TYPE_INTEGER, max_size)?;
        Ok(sign_extend(raw, len))
    }

    pub fn parse_u8(&mut self) -> Result<u8, ParseError> {
        Ok(self.unsigned(1)? as u8)
    }

    pub fn parse_u16(&mut self) -> Result<u16, ParseError> {
        Ok(self.unsigned(2)? as u16)
    }

    pub fn parse_u32(&mut self) -> Result<u32, ParseError> {
        Ok(self.unsigned(4)? as u32)
    }

    pub fn parse_u64(&mut self) -> Result<u64, ParseError> {
        self.unsigned(8)
    }

    pub fn parse_i8(&mut self) -> Result<i8, ParseError> {
        Ok(self.signed(1)? as i8)
    }

    pub fn parse_i16(&mut self) -> Result<i16, ParseError> {
        Ok(self.signed(2)? as i16)
    }

    pub fn parse_i32(&mut self) -> Result<i32, ParseError> {
        Ok(self.signed(4)? as i32)
    }

    pub fn parse_i64(&mut self) -> Result<i64, ParseError> {
        self.signed(8)
    }

    pub fn parse_bool(&mut self) -> Result<bool, ParseError> {
        if self.optional_is_skipped() {
            return Ok(false);
        }
        let (family, len) = self.parse_type_length()?;
        if family != TYPE_BOOLEAN {
            return Err(ParseError::TypeMismatch {
                expected: TYPE_BOOLEAN,
                found: family,
            });
        }
        if len != 1 {
            return Err(ParseError::UnexpectedLength {
                expected: 1,
                found: len,
            });
        }
        Ok(self.take_byte()? != 0)
    }

    /// Parse an octet string; an absent optional yields an empty string.
    pub fn parse_octet_string(&mut self) -> Result<OctetString, ParseError> {
        if self.optional_is_skipped() {
            return Ok(OctetString::new());
        }
        let (family, len) = self.parse_type_length()?;
        if family != TYPE_OCTET_STRING {
            return Err(ParseError::TypeMismatch {
                expected: TYPE_OCTET_STRING,
                found: family,
            });
        }
        Ok(self.take(len)?.to_vec())
    }

    /// Parse an SML value of whatever family the stream carries, keeping
    /// the original family and width.
    pub fn parse_value(&mut self) -> Result<Value, ParseError> {
        if self.optional_is_skipped() {
            return Ok(Value::default());
        }
        let (family, len) = self.parse_type_length()?;
        match family {
            TYPE_OCTET_STRING => Ok(Value::Bytes(self.take(len)?.to_vec())),
            TYPE_BOOLEAN => {
                if len != 1 {
                    return Err(ParseError::UnexpectedLength {
                        expected: 1,
                        found: len,
                    });
                }
                Ok(Value::Bool(self.take_byte()? != 0))
            }
            TYPE_INTEGER => {
                let value = sign_extend(self.accumulate(len, 8)?, len);
                Ok(match len {
                    1 => Value::I8(value as i8),
                    2 => Value::I16(value as i16),
                    3 | 4 => Value::I32(value as i32),
                    _ => Value::I64(value),
                })
            }
            TYPE_UNSIGNED => {
                let value = self.accumulate(len, 8)?;
                Ok(match len {
                    1 => Value::U8(value as u8),
                    2 => Value::U16(value as u16),
                    3 | 4 => Value::U32(value as u32),
                    _ => Value::U64(value),
                })
            }
            found => Err(ParseError::TypeMismatch {
                expected: TYPE_OCTET_STRING,
                found,
            }),
        }
    }

    /// Parse an SML time: a choice of `{tag, u32}`. Some meters omit the
    /// choice wrapper and emit a bare unsigned, which the reference
    /// implementation accepts; an absent optional yields zero.
    pub fn parse_time(&mut self) -> Result<Time, ParseError> {
        if self.optional_is_skipped() {
            return Ok(0);
        }
        match self.next_type()? {
            TYPE_LIST => {
                self.expect(TYPE_LIST, 2)?;
                let _choice_tag = self.parse_u8()?;
                self.parse_u32()
            }
            TYPE_UNSIGNED => self.parse_u32(),
            found => Err(ParseError::TypeMismatch {
                expected: TYPE_LIST,
                found,
            }),
        }
    }

    /// Meter status bits: unsigned of any width up to eight bytes.
    pub fn parse_status(&mut self) -> Result<i64, ParseError> {
        Ok(self.unsigned(8)? as i64)
    }

    /// Skip one element of any shape, descending into lists.
    pub fn skip_element(&mut self) -> Result<(), ParseError> {
        let (family, len) = self.parse_type_length()?;
        if family == TYPE_LIST {
            for _ in 0..len {
                self.skip_element()?;
            }
        } else {
            self.take(len)?;
        }
        Ok(())
    }

    /// Skip one element and return its raw encoded bytes, TL included.
    pub fn skip_element_raw(&mut self) -> Result<&'a [u8], ParseError> {
        let start = self.cursor;
        self.skip_element()?;
        Ok(&self.bytes[start..self.cursor])
    }
}

fn sign_extend(raw: u64, len: usize) -> i64 {
    if len == 0 || len >= 8 {
        return raw as i64;
    }
    let shift = 64 - 8 * len as u32;
    ((raw << shift) as i64) >> shift
}
