use std::fmt::{self, Display};

use super::{decode_hex, fields, NOTIFY_MARKER, SEPARATOR};

/// One line of CPU profile data, with its address already rebuilt from the
/// on-wire delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProfileEntry {
    pub addr: u32,
    pub count: u32,
    pub cycles: u32,
}

/// An unsolicited frame sent by the target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// `!connected` handshake, sent once per accepted connection.
    Connected { protocol_id: u32 },
    /// `!status`: execution state.
    Status { running: bool, pc: u32, ffwd: bool },
    /// `!config`: machine configuration.
    Config {
        machine_type: u32,
        cpu_level: u32,
        st_ram_end: u32,
    },
    /// `!profile`: profiler state, and every profile line with a non-zero
    /// hit count.
    Profile {
        enabled: bool,
        entries: Vec<ProfileEntry>,
    },
    /// `!log`: captured console output.
    Log(String),
}

impl Notification {
    pub const CONNECTED: &'static str = "!connected";
    pub const STATUS: &'static str = "!status";
    pub const CONFIG: &'static str = "!config";
    pub const PROFILE: &'static str = "!profile";
    pub const LOG: &'static str = "!log";
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationParseError {
    /// Frame doesn't start with `!`.
    NotNotification,
    UnknownTag(String),
    MissingField(&'static str),
    BadNumber(&'static str),
}

impl Display for NotificationParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use self::NotificationParseError::*;
        match self {
            NotNotification => write!(f, "frame is not a notification"),
            UnknownTag(tag) => write!(f, "unknown notification tag `{}`", tag),
            MissingField(name) => write!(f, "notification is missing the `{}` field", name),
            BadNumber(name) => write!(f, "notification field `{}` is not a hex number", name),
        }
    }
}

impl std::error::Error for NotificationParseError {}

struct Fields<I>(I);

impl<'a, I: Iterator<Item = &'a [u8]>> Fields<I> {
    fn num(&mut self, name: &'static str) -> Result<u32, NotificationParseError> {
        let field = self
            .0
            .next()
            .ok_or(NotificationParseError::MissingField(name))?;
        decode_hex(field).map_err(|_| NotificationParseError::BadNumber(name))
    }

    fn flag(&mut self, name: &'static str) -> Result<bool, NotificationParseError> {
        Ok(self.num(name)? != 0)
    }
}

impl Notification {
    /// Parse a notification frame (without its terminator).
    pub fn parse(frame: &[u8]) -> Result<Notification, NotificationParseError> {
        if frame.first() != Some(&NOTIFY_MARKER) {
            return Err(NotificationParseError::NotNotification);
        }

        let mut it = fields(frame);
        let tag = it.next().unwrap_or_default();
        let mut f = Fields(it);

        let notification = match tag {
            b"!connected" => Notification::Connected {
                protocol_id: f.num("protocol id")?,
            },
            b"!status" => Notification::Status {
                running: f.flag("running")?,
                pc: f.num("pc")?,
                ffwd: f.flag("ffwd")?,
            },
            b"!config" => Notification::Config {
                machine_type: f.num("machine type")?,
                cpu_level: f.num("cpu level")?,
                st_ram_end: f.num("st ram end")?,
            },
            b"!profile" => {
                let enabled = f.flag("enabled")?;
                let mut entries = Vec::new();
                let mut addr = 0u32;
                loop {
                    // the list ends with an empty field after the last
                    // separator
                    match f.0.next() {
                        None | Some(b"") => break,
                        Some(delta) => {
                            let delta: u32 = decode_hex(delta)
                                .map_err(|_| NotificationParseError::BadNumber("addr delta"))?;
                            addr = addr.wrapping_add(delta);
                        }
                    }
                    entries.push(ProfileEntry {
                        addr,
                        count: f.num("count")?,
                        cycles: f.num("cycles")?,
                    });
                }
                Notification::Profile { enabled, entries }
            }
            b"!log" => {
                // the text is everything after the first separator
                let start = frame
                    .iter()
                    .position(|&b| b == SEPARATOR)
                    .map(|i| i + 1)
                    .unwrap_or(frame.len());
                Notification::Log(String::from_utf8_lossy(&frame[start..]).into_owned())
            }
            other => {
                return Err(NotificationParseError::UnknownTag(
                    String::from_utf8_lossy(other).into_owned(),
                ))
            }
        };

        Ok(notification)
    }
}
