//! Traits to perform in-order, serial, byte-wise output.

mod impls;

/// A trait to perform in-order, serial, byte-wise output.
///
/// Both halves of the protocol write through this trait: the stub sends
/// responses and notifications, and the client sends commands. Reading is
/// left to the owner of the transport, which feeds received bytes in.
///
/// This trait is implemented for [`TcpStream`](std::net::TcpStream),
/// `Vec<u8>` (handy for capturing output in tests) and boxed trait objects.
pub trait Connection {
    /// Transport-specific error type.
    type Error;

    /// Write a single byte.
    fn write(&mut self, byte: u8) -> Result<(), Self::Error>;

    /// Write the entire buffer, blocking until complete.
    ///
    /// This method's default implementation calls `self.write()` on each byte
    /// in the buffer. This can be quite inefficient, so if a more efficient
    /// implementation exists (such as calling `write_all()` on an underlying
    /// `std::io::Write` object), this method should be overwritten.
    fn write_all(&mut self, buf: &[u8]) -> Result<(), Self::Error> {
        for b in buf {
            self.write(*b)?;
        }
        Ok(())
    }

    /// Flush this Connection, ensuring that all intermediately buffered
    /// contents reach their destination.
    fn flush(&mut self) -> Result<(), Self::Error>;

    /// Called when a session starts, before any frame has been exchanged.
    ///
    /// This method's default implementation is a no-op.
    ///
    /// # Example
    ///
    /// The `on_session_start` implementation for `TcpStream` ensures that
    /// [`set_nodelay(true)`](std::net::TcpStream::set_nodelay) is called. The
    /// protocol exchanges many small frames, so leaving Nagle's algorithm on
    /// makes every round-trip noticeably slower.
    fn on_session_start(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}
