// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Small cursor helpers for reading/writing the length-prefixed payload
//! shapes used by every message body. Generalizes the field-by-field
//! encode/decode style the teacher crate used for fixed BHS structs
//! (`models/login/request.rs`) to the protocol's variable-length strings
//! and blobs.

use crate::error::DecodeError;

/// Raised internally while reading a payload; callers convert it into
/// [`crate::wire::codec::DecodeOutcome::NeedMore`] or
/// [`DecodeError::Malformed`] depending on context.
#[derive(Debug)]
pub struct Eof {
    /// How many additional bytes would be needed to satisfy the read that
    /// failed. This is a lower bound: later fields in the same payload may
    /// need still more bytes once this one is satisfied.
    pub needed_additional: usize,
}

pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn require(&self, n: usize) -> Result<(), Eof> {
        if self.remaining() < n {
            Err(Eof {
                needed_additional: n - self.remaining(),
            })
        } else {
            Ok(())
        }
    }

    pub fn read_u8(&mut self) -> Result<u8, Eof> {
        self.require(1)?;
        let v = self.buf[self.pos];
        self.pos += 1;
        Ok(v)
    }

    pub fn read_bool(&mut self) -> Result<bool, Eof> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_u16(&mut self) -> Result<u16, Eof> {
        self.require(2)?;
        let v = u16::from_be_bytes([self.buf[self.pos], self.buf[self.pos + 1]]);
        self.pos += 2;
        Ok(v)
    }

    pub fn read_u32(&mut self) -> Result<u32, Eof> {
        self.require(4)?;
        let v = u32::from_be_bytes([
            self.buf[self.pos],
            self.buf[self.pos + 1],
            self.buf[self.pos + 2],
            self.buf[self.pos + 3],
        ]);
        self.pos += 4;
        Ok(v)
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], Eof> {
        self.require(n)?;
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    /// Reads a `u8`-length-prefixed UTF-8 string.
    pub fn read_string_u8(&mut self) -> Result<String, ReadError> {
        let len = self.read_u8()? as usize;
        let bytes = self.read_bytes(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| ReadError::Malformed(format!("invalid UTF-8 string: {e}")))
    }

    /// Reads a `u8`-length-prefixed string, treating length `0` as absent.
    pub fn read_optional_string_u8(&mut self) -> Result<Option<String>, ReadError> {
        let s = self.read_string_u8()?;
        Ok(if s.is_empty() { None } else { Some(s) })
    }
}

/// Unifies the two failure modes a field-level read can produce: running
/// out of bytes (handled by the framing layer as "need more") or bytes that
/// are present but semantically invalid (a hard decode failure).
#[derive(Debug)]
pub enum ReadError {
    Eof(Eof),
    Malformed(String),
}

impl From<Eof> for ReadError {
    fn from(e: Eof) -> Self {
        ReadError::Eof(e)
    }
}

impl ReadError {
    pub fn into_decode_error(self) -> Result<Eof, DecodeError> {
        match self {
            ReadError::Eof(e) => Ok(e),
            ReadError::Malformed(m) => Err(DecodeError::Malformed(m)),
        }
    }
}

#[derive(Default)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn write_bool(&mut self, v: bool) {
        self.write_u8(v as u8);
    }

    pub fn write_u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn write_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Writes a `u8`-length-prefixed string. Fails if the string is longer
    /// than 255 bytes, which cannot be represented by the wire format.
    pub fn write_string_u8(&mut self, s: &str) -> Result<(), crate::error::EncodeError> {
        if s.len() > u8::MAX as usize {
            return Err(crate::error::EncodeError::StringTooLong(s.len()));
        }
        self.write_u8(s.len() as u8);
        self.write_bytes(s.as_bytes());
        Ok(())
    }

    pub fn write_optional_string_u8(
        &mut self,
        s: Option<&str>,
    ) -> Result<(), crate::error::EncodeError> {
        self.write_string_u8(s.unwrap_or(""))
    }
}
