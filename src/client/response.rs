use std::fmt::{self, Display};

use crate::expr::{Register, Registers};
use crate::protocol::{decode_hex, fields, mem_codec, NG, OK};
use crate::target::ext::breakpoints::BreakpointInfo;
use crate::target::ext::symbols::Symbol;

use super::request::{MemorySlot, RequestKind};

/// Register values from a `regs` response.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RegisterDump {
    pub regs: Registers,
    /// Pairs whose name isn't in the register table, in arrival order.
    pub extra: Vec<(String, u32)>,
}

/// Memory contents from a `mem` response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryBlock {
    pub slot: MemorySlot,
    pub addr: u32,
    pub data: Vec<u8>,
}

/// A successfully parsed response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// A bare `OK`.
    Ok,
    /// Completion of a `Dispatcher::insert_flush` marker.
    Flush,
    Status { running: bool, pc: u32 },
    Registers(RegisterDump),
    Memory(MemoryBlock),
    /// The range a `memset` changed.
    MemoryWritten { addr: u32, size: u32 },
    Breakpoints(Vec<BreakpointInfo>),
    Symbols(Vec<Symbol>),
    ExceptionMask(u32),
    InfoYm([u8; 16]),
    /// Profiler state after a `profile` command.
    Profile(bool),
    /// Fast-forward state after a `ffwd` command.
    FastForward(bool),
    /// Address of the first match, if any.
    MemFind(Option<u32>),
    /// The whole response frame, for raw commands.
    Raw(Vec<u8>),
}

/// Why a response couldn't be turned into a [`Response`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseError {
    /// The target answered `NG`.
    Failed,
    /// The response didn't have the expected layout.
    Malformed(&'static str),
}

impl Display for ResponseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseError::Failed => write!(f, "target reported failure"),
            ResponseError::Malformed(what) => write!(f, "malformed response: {}", what),
        }
    }
}

impl std::error::Error for ResponseError {}

struct Fields<I>(I);

impl<'a, I: Iterator<Item = &'a [u8]>> Fields<I> {
    fn raw(&mut self, name: &'static str) -> Result<&'a [u8], ResponseError> {
        self.0.next().ok_or(ResponseError::Malformed(name))
    }

    fn num(&mut self, name: &'static str) -> Result<u32, ResponseError> {
        decode_hex(self.raw(name)?).map_err(|_| ResponseError::Malformed(name))
    }

    fn flag(&mut self, name: &'static str) -> Result<bool, ResponseError> {
        Ok(self.num(name)? != 0)
    }

    fn text(&mut self, name: &'static str) -> Result<String, ResponseError> {
        Ok(String::from_utf8_lossy(self.raw(name)?).into_owned())
    }
}

/// Parse a response frame (without its terminator), sent in answer to a
/// request of the given kind.
pub fn parse(kind: RequestKind, frame: &[u8]) -> Result<Response, ResponseError> {
    if frame == NG.as_bytes() {
        return Err(ResponseError::Failed);
    }
    if kind == RequestKind::Raw {
        return Ok(Response::Raw(frame.to_vec()));
    }

    let mut f = Fields(fields(frame));
    if f.raw("status")? != OK.as_bytes() {
        return Err(ResponseError::Malformed("status"));
    }

    let response = match kind {
        RequestKind::Control => Response::Ok,
        RequestKind::Flush => Response::Flush,
        RequestKind::Status => Response::Status {
            running: f.flag("running")?,
            pc: f.num("pc")?,
        },
        RequestKind::Registers => {
            // the list starts with an empty field
            f.raw("registers")?;
            let mut dump = RegisterDump::default();
            while let Some(name) = f.0.next() {
                let name = String::from_utf8_lossy(name);
                let val = f.num("register value")?;
                match Register::from_name(&name) {
                    Some(reg) => dump.regs.set(reg, val),
                    None => dump.extra.push((name.into_owned(), val)),
                }
            }
            Response::Registers(dump)
        }
        RequestKind::Memory(slot) => {
            let addr = f.num("address")?;
            let size = f.num("size")?;
            let chars = f.0.next().unwrap_or_default();
            let data = mem_codec::decode(chars, size as usize)
                .map_err(|_| ResponseError::Malformed("memory data"))?;
            Response::Memory(MemoryBlock { slot, addr, data })
        }
        RequestKind::WriteMemory => Response::MemoryWritten {
            addr: f.num("address")?,
            size: f.num("size")?,
        },
        RequestKind::Breakpoints => {
            let count = f.num("count")?;
            let mut bps = Vec::new();
            for _ in 0..count {
                bps.push(BreakpointInfo {
                    expression: f.text("expression")?,
                    ccount: f.num("condition count")?,
                    hits: f.num("hits")?,
                    once: f.flag("once")?,
                    quiet: f.flag("quiet")?,
                    trace: f.flag("trace")?,
                });
            }
            Response::Breakpoints(bps)
        }
        RequestKind::Symbols => {
            let count = f.num("count")?;
            let mut syms = Vec::new();
            for _ in 0..count {
                syms.push(Symbol {
                    name: f.text("name")?,
                    address: f.num("address")?,
                    kind: f.raw("type")?.first().copied().unwrap_or(b' '),
                });
            }
            Response::Symbols(syms)
        }
        RequestKind::ExceptionMask => Response::ExceptionMask(f.num("mask")?),
        RequestKind::InfoYm => {
            let mut regs = [0; 16];
            for reg in regs.iter_mut() {
                *reg = decode_hex(f.raw("ym register")?)
                    .map_err(|_| ResponseError::Malformed("ym register"))?;
            }
            Response::InfoYm(regs)
        }
        RequestKind::Profile => Response::Profile(f.flag("enabled")?),
        RequestKind::FastForward => Response::FastForward(f.flag("enabled")?),
        RequestKind::MemFind => match f.0.next() {
            None => Response::MemFind(None),
            Some(addr) => Response::MemFind(Some(
                decode_hex(addr).map_err(|_| ResponseError::Malformed("address"))?,
            )),
        },
        RequestKind::Raw => Response::Raw(frame.to_vec()),
    };

    Ok(response)
}
