//! An implementation of a zero-terminated, text based remote debugging
//! protocol between an emulator and a debugger.
//!
//! Both halves of the protocol live in this crate:
//!
//! - [`stub`]: the target side. An [`RdbStub`](stub::RdbStub) owns a
//!   listening TCP socket, accepts a single client at a time, and dispatches
//!   its commands to a user-provided [`Target`](target::Target).
//! - [`client`]: the debugger side. A [`Dispatcher`](client::Dispatcher)
//!   frames outgoing commands, correlates responses with requests, and
//!   reports notifications to an [`Observer`](client::Observer).
//!
//! The wire format, expression evaluator and memory packing codec are shared
//! by both sides, and live in [`protocol`] and [`expr`].
//!
//! ## Features
//!
//! - `trace-pkt`: log every incoming command and outgoing frame at `trace!`
//!   level.

extern crate alloc;

pub mod client;
pub mod conn;
pub mod expr;
pub mod protocol;
pub mod stub;
pub mod target;

mod util;

/// Identifier exchanged in the `!connected` handshake. A client should only
/// trust a target announcing the same identifier.
pub const PROTOCOL_ID: u32 = 0x1005;

/// Default TCP port the stub listens on.
pub const DEFAULT_PORT: u16 = 56001;
