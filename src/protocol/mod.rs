//! Wire-level building blocks shared by the stub and the client.
//!
//! Every frame on the wire is a run of printable bytes terminated by a single
//! zero byte. Inside responses and notifications, fields are separated by the
//! non-printable byte `0x01`. Notifications start with `!`. Numbers are
//! written as uppercase hex without leading zeros.

mod commands;
mod hex;
mod mem_flags;
mod notification;
mod response_writer;

pub mod mem_codec;

pub use commands::{Args, ArgPolicy, CommandKind, CommandParseError, ParsedCommand, MAX_ARGS};
pub use hex::{atoi, decode_hex, decode_hex_pairs, encode_hex, read_hex_char, DecodeHexError};
pub use mem_flags::MemFlags;
pub use notification::{Notification, NotificationParseError, ProfileEntry};
pub use response_writer::{Error as ResponseWriterError, ResponseWriter};

/// Ends every frame.
pub const TERMINATOR: u8 = 0;
/// Separates fields inside a response or notification.
pub const SEPARATOR: u8 = 1;
/// First byte of every notification.
pub const NOTIFY_MARKER: u8 = b'!';

/// Leading field of every successful response.
pub const OK: &str = "OK";
/// The whole of a failed response.
pub const NG: &str = "NG";

/// Split a frame (without its terminator) into its separator-delimited
/// fields.
pub fn fields(frame: &[u8]) -> impl Iterator<Item = &[u8]> {
    frame.split(|&b| b == SEPARATOR)
}

/// Whether a frame (without its terminator) is a notification.
pub fn is_notification(frame: &[u8]) -> bool {
    frame.first() == Some(&NOTIFY_MARKER)
}

/// Render a frame for logging, with separators shown as `,`.
#[cfg(feature = "trace-pkt")]
pub(crate) fn display_frame(frame: &[u8]) -> String {
    frame
        .iter()
        .map(|&b| match b {
            SEPARATOR => ',',
            TERMINATOR => '$',
            b if b.is_ascii_graphic() || b == b' ' => b as char,
            _ => '.',
        })
        .collect()
}
