use core::fmt::{self, Display};
use core::marker::PhantomData;
use std::net::Ipv4Addr;
use std::time::Duration;

use managed::ManagedSlice;

use crate::target::Target;

use super::capture::OutputCapture;
use super::RdbStub;

/// Default size of the send buffer.
pub const DEFAULT_SEND_BUFFER_SIZE: usize = 512;
/// Default number of bytes read from the connection at a time.
pub const DEFAULT_RECV_CHUNK_SIZE: usize = 300;
/// Default wait for connection activity inside the break loop.
pub const DEFAULT_SELECT_TIMEOUT: Duration = Duration::from_millis(500);

/// An error which may occur when building an [`RdbStub`].
#[derive(Debug)]
pub enum RdbStubBuilderError {
    /// Custom send buffer size is larger than the provided buffer's length.
    SendBufSizeMismatch,
    /// The send buffer must hold at least one byte.
    ZeroSendBuffer,
}

impl Display for RdbStubBuilderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use self::RdbStubBuilderError::*;
        match self {
            SendBufSizeMismatch => write!(
                f,
                "`send_buffer_size` is larger than `with_send_buffer`'s size."
            ),
            ZeroSendBuffer => write!(f, "The send buffer cannot be empty."),
        }
    }
}

impl std::error::Error for RdbStubBuilderError {}

/// Transport settings, fixed once the stub is built.
#[derive(Debug, Clone)]
pub(crate) struct StubConfig {
    pub port: u16,
    pub bind_addr: Ipv4Addr,
    pub select_timeout: Duration,
    pub recv_chunk_size: usize,
}

/// Helper to construct and customize [`RdbStub`].
pub struct RdbStubBuilder<'a, T: Target> {
    port: u16,
    bind_addr: Ipv4Addr,
    send_buffer: Option<&'a mut [u8]>,
    send_buffer_size: Option<usize>,
    select_timeout: Duration,
    recv_chunk_size: usize,
    capture: Option<Box<dyn OutputCapture + 'a>>,

    _target: PhantomData<T>,
}

impl<'a, T: Target> RdbStubBuilder<'a, T> {
    /// Create a new `RdbStubBuilder` with the default settings.
    pub fn new() -> RdbStubBuilder<'a, T> {
        RdbStubBuilder {
            port: crate::DEFAULT_PORT,
            bind_addr: Ipv4Addr::LOCALHOST,
            send_buffer: None,
            send_buffer_size: None,
            select_timeout: DEFAULT_SELECT_TIMEOUT,
            recv_chunk_size: DEFAULT_RECV_CHUNK_SIZE,
            capture: None,

            _target: PhantomData,
        }
    }

    /// TCP port to listen on. Defaults to [`DEFAULT_PORT`](crate::DEFAULT_PORT).
    ///
    /// Port `0` picks an ephemeral port, which can then be queried with
    /// [`RdbStub::local_addr`].
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Address to listen on. Defaults to the loopback address.
    pub fn bind_addr(mut self, addr: Ipv4Addr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Use a pre-allocated send buffer (instead of heap-allocating).
    pub fn with_send_buffer(mut self, send_buffer: &'a mut [u8]) -> Self {
        self.send_buffer = Some(send_buffer);
        self
    }

    /// Specify a custom size for the send buffer. Defaults to 512 bytes.
    ///
    /// When used alongside `with_send_buffer`, the provided `size` must be
    /// less than or equal to the length of the send buffer.
    pub fn send_buffer_size(mut self, size: usize) -> Self {
        self.send_buffer_size = Some(size);
        self
    }

    /// How long the break loop waits for connection activity before handing
    /// control back to the host's event loop. Defaults to 500ms.
    pub fn select_timeout(mut self, timeout: Duration) -> Self {
        self.select_timeout = timeout;
        self
    }

    /// Maximum number of bytes read from the connection at a time. Defaults
    /// to 300.
    pub fn recv_chunk_size(mut self, size: usize) -> Self {
        self.recv_chunk_size = size.max(1);
        self
    }

    /// Forward output captured by `capture` as `!log` notifications.
    pub fn with_output_capture(mut self, capture: Box<dyn OutputCapture + 'a>) -> Self {
        self.capture = Some(capture);
        self
    }

    /// Build the RdbStub, returning an error if something went wrong.
    ///
    /// The stub is not listening yet: call [`RdbStub::listen`].
    pub fn build(self) -> Result<RdbStub<'a, T>, RdbStubBuilderError> {
        let send_buffer = match self.send_buffer {
            Some(buf) => {
                let buf = match self.send_buffer_size {
                    Some(custom_len) => {
                        if custom_len > buf.len() {
                            return Err(RdbStubBuilderError::SendBufSizeMismatch);
                        } else {
                            &mut buf[..custom_len]
                        }
                    }
                    None => buf,
                };
                ManagedSlice::Borrowed(buf)
            }
            None => {
                let len = self.send_buffer_size.unwrap_or(DEFAULT_SEND_BUFFER_SIZE);
                ManagedSlice::Owned(vec![0; len])
            }
        };

        if send_buffer.is_empty() {
            return Err(RdbStubBuilderError::ZeroSendBuffer);
        }

        let config = StubConfig {
            port: self.port,
            bind_addr: self.bind_addr,
            select_timeout: self.select_timeout,
            recv_chunk_size: self.recv_chunk_size,
        };

        Ok(RdbStub::from_parts(config, send_buffer, self.capture))
    }
}

impl<'a, T: Target> Default for RdbStubBuilder<'a, T> {
    fn default() -> Self {
        RdbStubBuilder::new()
    }
}
