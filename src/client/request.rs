//! Formatting of outgoing commands.
//!
//! Numeric arguments are always sent as `$`-prefixed hex literals, which the
//! target's expression evaluator reads back unchanged.

use std::fmt::Write;

use crate::expr::Register;
use crate::protocol::{encode_hex, CommandKind, MemFlags};

/// A caller-chosen tag attached to a memory read, and handed back with its
/// result. Lets several views keep separate copies of target memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct MemorySlot(pub u32);

bitflags::bitflags! {
    /// Options appended to a breakpoint condition.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct BpFlags: u32 {
        /// Remove the breakpoint once it has triggered.
        const ONCE = 1 << 0;
        /// Print a trace line instead of stopping.
        const TRACE = 1 << 1;
    }
}

/// What a pending command expects back. Decides how its response is parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Status,
    /// A `status` round-trip marking the end of a batch of requests.
    Flush,
    Registers,
    Memory(MemorySlot),
    WriteMemory,
    Breakpoints,
    Symbols,
    ExceptionMask,
    InfoYm,
    Profile,
    FastForward,
    MemFind,
    /// Commands answering with a bare `OK`.
    Control,
    /// Anything sent through `send_raw_command`. The response is kept as-is.
    Raw,
}

/// A command ready to go on the wire (without its terminator).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub kind: RequestKind,
    pub text: String,
}

impl Request {
    fn new(kind: RequestKind, cmd: CommandKind) -> Request {
        Request {
            kind,
            text: cmd.name().to_string(),
        }
    }

    /// Append a space and a hex literal.
    fn num(mut self, val: u32) -> Request {
        let _ = write!(self.text, " ${:X}", val);
        self
    }

    /// Append a space and some verbatim text.
    fn arg(mut self, s: &str) -> Request {
        self.text.push(' ');
        self.text.push_str(s);
        self
    }

    pub fn status() -> Request {
        Request::new(RequestKind::Status, CommandKind::Status)
    }

    pub fn flush() -> Request {
        Request::new(RequestKind::Flush, CommandKind::Status)
    }

    pub fn read_registers() -> Request {
        Request::new(RequestKind::Registers, CommandKind::Regs)
    }

    pub fn read_memory(slot: MemorySlot, addr: u32, size: u32, flags: MemFlags) -> Request {
        Request::new(RequestKind::Memory(slot), CommandKind::Mem)
            .num(addr)
            .num(size)
            .num(flags.bits())
    }

    pub fn write_memory(addr: u32, data: &[u8], flags: MemFlags) -> Request {
        Request::new(RequestKind::WriteMemory, CommandKind::MemSet)
            .num(addr)
            .num(data.len() as u32)
            .num(flags.bits())
            .arg(&encode_hex(data))
    }

    pub fn read_breakpoints() -> Request {
        Request::new(RequestKind::Breakpoints, CommandKind::BpList)
    }

    pub fn read_symbols() -> Request {
        Request::new(RequestKind::Symbols, CommandKind::SymList)
    }

    pub fn read_exception_mask() -> Request {
        Request::new(RequestKind::ExceptionMask, CommandKind::ExMask)
    }

    pub fn set_exception_mask(mask: u32) -> Request {
        Request::new(RequestKind::ExceptionMask, CommandKind::ExMask).num(mask)
    }

    pub fn read_info_ym() -> Request {
        Request::new(RequestKind::InfoYm, CommandKind::InfoYm)
    }

    pub fn reset_warm() -> Request {
        Request::new(RequestKind::Control, CommandKind::ResetWarm)
    }

    pub fn reset_cold() -> Request {
        Request::new(RequestKind::Control, CommandKind::ResetCold)
    }

    pub fn break_() -> Request {
        Request::new(RequestKind::Control, CommandKind::Break)
    }

    pub fn run() -> Request {
        Request::new(RequestKind::Control, CommandKind::Run)
    }

    pub fn step() -> Request {
        Request::new(RequestKind::Control, CommandKind::Step)
    }

    /// `bp <expression>`, followed by one ` : <option>` per flag.
    pub fn set_breakpoint(expression: &str, flags: BpFlags) -> Request {
        let mut req = Request::new(RequestKind::Control, CommandKind::Bp).arg(expression);
        if flags.contains(BpFlags::ONCE) {
            req = req.arg(": once");
        }
        if flags.contains(BpFlags::TRACE) {
            req = req.arg(": trace");
        }
        req
    }

    /// Breakpoints are numbered from 1, in `bplist` order.
    pub fn delete_breakpoint(index: u32) -> Request {
        Request::new(RequestKind::Control, CommandKind::BpDel).num(index)
    }

    /// Registers are written through the console's `r` command.
    pub fn set_register(reg: Register, val: u32) -> Request {
        let line = format!("r {}=${:X}", reg.name(), val);
        Request::console(&line)
    }

    pub fn set_profile_enable(enable: bool) -> Request {
        Request::new(RequestKind::Profile, CommandKind::Profile).arg(if enable { "1" } else { "0" })
    }

    pub fn set_fast_forward(enable: bool) -> Request {
        Request::new(RequestKind::FastForward, CommandKind::Ffwd).arg(if enable { "1" } else { "0" })
    }

    pub fn console(line: &str) -> Request {
        Request::new(RequestKind::Control, CommandKind::Console).arg(line)
    }

    /// Search `[start, end)` for `pattern`, a list of `(mask, value)` byte
    /// pairs.
    pub fn mem_find(pattern: &[(u8, u8)], start: u32, end: u32) -> Request {
        let bytes: Vec<u8> = pattern.iter().flat_map(|&(mask, val)| [mask, val]).collect();
        Request::new(RequestKind::MemFind, CommandKind::MemFind)
            .num(start)
            .num(end.wrapping_sub(start))
            .arg(&encode_hex(&bytes))
    }

    pub fn raw(text: &str) -> Request {
        Request {
            kind: RequestKind::Raw,
            text: text.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_requests() {
        let req = Request::read_memory(MemorySlot(2), 0xe00030, 0x40, MemFlags::default());
        assert_eq!(req.text, "mem $E00030 $40 $9");
        assert_eq!(req.kind, RequestKind::Memory(MemorySlot(2)));

        let req = Request::write_memory(0x100, &[0xde, 0xad, 0x01], MemFlags::PHYSICAL);
        assert_eq!(req.text, "memset $100 $3 $0 DEAD01");

        let req = Request::mem_find(&[(0xff, 0x4e), (0xf0, 0x70)], 0x1000, 0x2000);
        assert_eq!(req.text, "memfind $1000 $1000 FF4EF070");
    }

    #[test]
    fn breakpoint_requests() {
        assert_eq!(
            Request::set_breakpoint("pc = $e00030", BpFlags::empty()).text,
            "bp pc = $e00030"
        );
        assert_eq!(
            Request::set_breakpoint("d0 = 1", BpFlags::ONCE | BpFlags::TRACE).text,
            "bp d0 = 1 : once : trace"
        );
        assert_eq!(Request::delete_breakpoint(10).text, "bpdel $A");
    }

    #[test]
    fn control_requests() {
        assert_eq!(Request::set_register(Register::A7, 0x7fffe).text, "console r A7=$7FFFE");
        assert_eq!(Request::set_fast_forward(true).text, "ffwd 1");
        assert_eq!(Request::set_profile_enable(false).text, "profile 0");
        assert_eq!(Request::set_exception_mask(0x3f).text, "exmask $3F");
        assert_eq!(Request::flush().text, "status");
        assert_eq!(Request::flush().kind, RequestKind::Flush);
        assert_eq!(Request::reset_cold().text, "resetcold");
    }
}
