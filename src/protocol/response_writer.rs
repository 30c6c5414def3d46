#[cfg(feature = "trace-pkt")]
use alloc::vec::Vec;

use num_traits::PrimInt;

use super::{SEPARATOR, TERMINATOR};
use crate::conn::Connection;

/// Newtype around a Connection error. Having a newtype allows implementing a
/// `From<ResponseWriterError<C>> for RdbStubError<C>`, which greatly
/// simplifies the error handling in the stub.
#[derive(Debug, Clone)]
pub struct Error<C>(pub C);

/// Writes responses and notifications into a bounded send buffer, only
/// touching the [`Connection`] when the buffer fills up or when explicitly
/// flushed.
pub struct ResponseWriter<'a, C: Connection> {
    inner: &'a mut C,
    buf: &'a mut [u8],
    pos: usize,

    // buffer to log outgoing frames. only allocates if logging is enabled.
    #[cfg(feature = "trace-pkt")]
    msg: Vec<u8>,
}

impl<'a, C: Connection + 'a> ResponseWriter<'a, C> {
    /// Creates a new ResponseWriter which stages data in `buf`.
    pub fn new(inner: &'a mut C, buf: &'a mut [u8]) -> Self {
        Self {
            inner,
            buf,
            pos: 0,

            #[cfg(feature = "trace-pkt")]
            msg: Vec::new(),
        }
    }

    /// Number of bytes staged but not yet handed to the connection.
    #[cfg(test)]
    fn pending(&self) -> usize {
        self.pos
    }

    fn drain(&mut self) -> Result<(), Error<C::Error>> {
        if self.pos != 0 {
            let pos = self.pos;
            self.pos = 0;
            self.inner.write_all(&self.buf[..pos]).map_err(Error)?;
        }
        Ok(())
    }

    /// Hand every staged byte to the connection, and flush it.
    pub fn flush(&mut self) -> Result<(), Error<C::Error>> {
        self.drain()?;
        self.inner.flush().map_err(Error)
    }

    fn write(&mut self, byte: u8) -> Result<(), Error<C::Error>> {
        #[cfg(feature = "trace-pkt")]
        if log::log_enabled!(log::Level::Trace) {
            if byte == TERMINATOR {
                // captured output includes our own trace output, so echoing
                // `!log` frames would feed back into the capture
                if !self.msg.starts_with(b"!log") {
                    log::trace!("--> {}", super::display_frame(&self.msg));
                }
                self.msg.clear();
            } else {
                self.msg.push(byte)
            }
        }

        if self.buf.is_empty() {
            return self.inner.write(byte).map_err(Error);
        }

        if self.pos == self.buf.len() {
            self.drain()?;
        }
        self.buf[self.pos] = byte;
        self.pos += 1;
        Ok(())
    }

    /// Write an entire string.
    pub fn write_str(&mut self, s: &str) -> Result<(), Error<C::Error>> {
        self.write_bytes(s.as_bytes())
    }

    /// Write raw bytes, which must not contain a terminator.
    pub fn write_bytes(&mut self, data: &[u8]) -> Result<(), Error<C::Error>> {
        for b in data.iter() {
            self.write(*b)?;
        }
        Ok(())
    }

    /// Write a single raw byte.
    pub fn write_char(&mut self, c: u8) -> Result<(), Error<C::Error>> {
        self.write(c)
    }

    /// Write a boolean as `1` or `0`.
    pub fn write_bool(&mut self, val: bool) -> Result<(), Error<C::Error>> {
        self.write(if val { b'1' } else { b'0' })
    }

    /// Write the field separator.
    pub fn write_sep(&mut self) -> Result<(), Error<C::Error>> {
        self.write(SEPARATOR)
    }

    /// Write the frame terminator.
    pub fn write_term(&mut self) -> Result<(), Error<C::Error>> {
        self.write(TERMINATOR)
    }

    /// Write a number as an uppercase hex string using the most compact
    /// representation possible (i.e: trimming leading zeros).
    pub fn write_num<D: PrimInt>(&mut self, digit: D) -> Result<(), Error<C::Error>> {
        let digit = digit.to_u64().unwrap_or(0);
        if digit == 0 {
            return self.write(b'0');
        }

        let nibbles = 16 - (digit.leading_zeros() as usize / 4);
        for i in (0..nibbles).rev() {
            let nibble = ((digit >> (i * 4)) & 0xf) as u8;
            let c = match nibble {
                0..=9 => b'0' + nibble,
                _ => b'A' + nibble - 10,
            };
            self.write(c)?;
        }
        Ok(())
    }

    /// Write `<sep><key><sep><hex value>`, the layout used for register
    /// dumps.
    pub fn write_key_value(&mut self, key: &str, val: u32) -> Result<(), Error<C::Error>> {
        self.write_sep()?;
        self.write_str(key)?;
        self.write_sep()?;
        self.write_num(val)
    }

    /// Flush anything staged, then send `data` straight to the connection,
    /// bypassing the send buffer. The data is not expected to contain a
    /// terminator.
    pub fn write_unbuffered(&mut self, data: &[u8]) -> Result<(), Error<C::Error>> {
        #[cfg(feature = "trace-pkt")]
        if log::log_enabled!(log::Level::Trace) {
            self.msg.extend_from_slice(data);
        }

        self.drain()?;
        self.inner.write_all(data).map_err(Error)
    }
}
