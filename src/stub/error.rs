use core::fmt::{self, Display};
use std::io;

/// An error which may occur while running an [`RdbStub`](super::RdbStub).
///
/// Connection errors never stop the stub: the connection is dropped, and the
/// stub goes back to listening.
#[derive(Debug)]
#[non_exhaustive]
pub enum RdbStubError {
    /// Could not bind the listening socket.
    Bind(io::Error),
    /// Could not configure the listening socket.
    Listen(io::Error),
    /// Connection Error while reading a command.
    ConnectionRead(io::Error),
    /// Connection Error while writing a response.
    ConnectionWrite(io::Error),
    /// The stub is not listening, either because `listen` was never called,
    /// or because it failed.
    NotListening,
}

impl Display for RdbStubError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use self::RdbStubError::*;
        match self {
            Bind(e) => write!(f, "Failed to bind the listening socket: {}", e),
            Listen(e) => write!(f, "Failed to listen on the socket: {}", e),
            ConnectionRead(e) => write!(f, "Connection Error while reading command: {}", e),
            ConnectionWrite(e) => write!(f, "Connection Error while writing response: {}", e),
            NotListening => write!(f, "The stub is not listening."),
        }
    }
}

impl std::error::Error for RdbStubError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        use self::RdbStubError::*;
        match self {
            Bind(e) | Listen(e) | ConnectionRead(e) | ConnectionWrite(e) => Some(e),
            NotListening => None,
        }
    }
}
