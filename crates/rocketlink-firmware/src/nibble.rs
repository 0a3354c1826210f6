//! ASCII-safe nibble encoding of the firmware's byte stream.
//!
//! Each byte travels as two characters in `'A'..='P'`, high nibble first, so
//! no byte on the pipe is ever a line ending.

use std::io::{self, Read, Write};

use crate::error::FirmwareError;

/// Character for nibble value 0.
pub const NIBBLE_OFFSET: u8 = b'A';

/// Encode `data` as nibble characters.
pub fn encode(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() * 2);
    for &byte in data {
        out.push(NIBBLE_OFFSET + (byte >> 4));
        out.push(NIBBLE_OFFSET + (byte & 0x0F));
    }
    out
}

/// Value of one nibble character.
pub fn nibble_value(c: u8) -> Result<u8, FirmwareError> {
    match c.checked_sub(NIBBLE_OFFSET) {
        Some(v) if v < 16 => Ok(v),
        _ => Err(FirmwareError::InvalidNibble(c)),
    }
}

/// Decode a complete nibble string.
pub fn decode(text: &[u8]) -> Result<Vec<u8>, FirmwareError> {
    text.chunks(2)
        .map(|pair| match pair {
            [hi, lo] => Ok((nibble_value(*hi)? << 4) | nibble_value(*lo)?),
            _ => Err(FirmwareError::Io(io::ErrorKind::UnexpectedEof.into())),
        })
        .collect()
}

/// [`Read`] adapter that decodes nibble characters.
///
/// Carriage returns and line feeds between characters are skipped.
pub struct NibbleReader<R> {
    inner: R,
}

impl<R: Read> NibbleReader<R> {
    pub fn new(inner: R) -> Self {
        NibbleReader { inner }
    }

    fn next_char(&mut self) -> io::Result<Option<u8>> {
        let mut buf = [0u8; 1];
        loop {
            match self.inner.read(&mut buf) {
                Ok(0) => return Ok(None),
                Ok(_) if matches!(buf[0], b'\r' | b'\n') => continue,
                Ok(_) => return Ok(Some(buf[0])),
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            }
        }
    }

    /// Read one decoded byte; `None` at a clean end of stream.
    pub fn read_byte(&mut self) -> Result<Option<u8>, FirmwareError> {
        let Some(hi) = self.next_char()? else {
            return Ok(None);
        };
        let lo = self
            .next_char()?
            .ok_or_else(|| FirmwareError::Io(io::ErrorKind::UnexpectedEof.into()))?;
        Ok(Some((nibble_value(hi)? << 4) | nibble_value(lo)?))
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Read for NibbleReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        // One byte at a time: a second byte might block on the pipe
        match self.read_byte() {
            Ok(Some(byte)) => {
                buf[0] = byte;
                Ok(1)
            }
            Ok(None) => Ok(0),
            Err(FirmwareError::Io(err)) => Err(err),
            Err(err) => Err(io::Error::new(io::ErrorKind::InvalidData, err.to_string())),
        }
    }
}

/// [`Write`] adapter that encodes bytes as nibble characters.
pub struct NibbleWriter<W> {
    inner: W,
}

impl<W: Write> NibbleWriter<W> {
    pub fn new(inner: W) -> Self {
        NibbleWriter { inner }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for NibbleWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write_all(&encode(buf))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
