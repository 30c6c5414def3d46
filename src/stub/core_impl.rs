use core::fmt::Display;
use core::marker::PhantomData;

use log::*;

use crate::conn::Connection;
use crate::protocol::{CommandKind, ParsedCommand, ResponseWriter, NG, OK};
use crate::stub::capture::OutputCapture;
use crate::target::Target;

/// Common imports used by >50% of all handlers.
///
/// Do not clutter this prelude with types only used by a few handlers.
mod prelude {
    pub(super) use crate::conn::Connection;
    pub(super) use crate::protocol::{Args, ResponseWriter};
    pub(super) use crate::stub::core_impl::HandlerStatus;
    pub(super) use crate::stub::core_impl::InternalError as Error;
    pub(super) use crate::stub::core_impl::RdbStubImpl;
    pub(super) use crate::target::{Target, TargetEval};
}

mod base;
mod breakpoints;
mod console;
mod memory;
mod notify;
mod symbols;
mod system;

/// Errors raised while handling a single command.
#[derive(Debug)]
pub(crate) enum InternalError<C> {
    /// The response could not be written. Fatal to the connection.
    ConnectionWrite(C),
    /// The command was malformed, or the target refused it. Reported to the
    /// client as `NG`.
    Rejected,
}

impl<C> From<crate::protocol::ResponseWriterError<C>> for InternalError<C> {
    fn from(e: crate::protocol::ResponseWriterError<C>) -> Self {
        InternalError::ConnectionWrite(e.0)
    }
}

impl<C> From<crate::expr::EvalError> for InternalError<C> {
    fn from(e: crate::expr::EvalError) -> Self {
        InternalError::reject(e)
    }
}

impl<C> InternalError<C> {
    pub fn reject(reason: impl Display) -> Self {
        debug!("command rejected: {}", reason);
        InternalError::Rejected
    }
}

pub(crate) enum HandlerStatus {
    /// The handler wrote its own response.
    Handled,
    /// The handler succeeded, and the response is a plain `OK`.
    NeedsOk,
}

/// The state shared by every command handler: the break flags, and the
/// source of captured output.
pub(crate) struct RdbStubImpl<'a, T: Target, C: Connection> {
    _target: PhantomData<T>,
    _connection: PhantomData<C>,

    /// Execution is halted and the break loop is servicing the connection.
    pub break_active: bool,
    /// The client asked for a break while the target was running.
    pub break_requested: bool,

    capture: Option<Box<dyn OutputCapture + 'a>>,
}

impl<'a, T: Target, C: Connection> RdbStubImpl<'a, T, C> {
    pub fn new(capture: Option<Box<dyn OutputCapture + 'a>>) -> RdbStubImpl<'a, T, C> {
        RdbStubImpl {
            _target: PhantomData,
            _connection: PhantomData,

            break_active: false,
            break_requested: false,

            capture,
        }
    }

    pub fn capture_mut(&mut self) -> Option<&mut (dyn OutputCapture + 'a)> {
        self.capture.as_deref_mut()
    }

    /// Handle one complete command line (without its terminator), writing
    /// a complete, terminated response.
    ///
    /// Nothing is flushed: the caller flushes once it has drained every
    /// buffered command.
    pub fn handle_frame(
        &mut self,
        res: &mut ResponseWriter<'_, C>,
        target: &mut T,
        frame: &[u8],
    ) -> Result<(), InternalError<C::Error>> {
        #[cfg(feature = "trace-pkt")]
        trace!("<-- {}", crate::protocol::display_frame(frame));

        let status = match ParsedCommand::parse(frame) {
            Ok(cmd) => self.handle_command(res, target, cmd),
            Err(e) => {
                warn!("could not dispatch command: {}", e);
                Err(InternalError::Rejected)
            }
        };

        match status {
            Ok(HandlerStatus::Handled) => {}
            Ok(HandlerStatus::NeedsOk) => res.write_str(OK)?,
            Err(InternalError::Rejected) => res.write_str(NG)?,
            Err(e) => return Err(e),
        }

        res.write_term()?;
        Ok(())
    }

    fn handle_command(
        &mut self,
        res: &mut ResponseWriter<'_, C>,
        target: &mut T,
        cmd: ParsedCommand<'_>,
    ) -> Result<HandlerStatus, InternalError<C::Error>> {
        use CommandKind::*;

        let args = &cmd.args;
        match cmd.kind {
            // `handle_X` methods are defined in the submodules
            Status => self.handle_status(res, target),
            Break => self.handle_break(),
            Step => self.handle_step(target),
            Run => self.handle_run(),
            Regs => self.handle_regs(res, target),
            Mem => self.handle_mem(res, target, args),
            MemSet => self.handle_memset(res, target, args),
            MemFind => self.handle_memfind(res, target, args),
            Bp => self.handle_bp(target, args),
            BpList => self.handle_bplist(res, target),
            BpDel => self.handle_bpdel(target, args),
            SymList => self.handle_symlist(res, target),
            ExMask => self.handle_exmask(res, target, args),
            Console => self.handle_console(res, target, args),
            InfoYm => self.handle_infoym(res, target),
            Profile => self.handle_profile(res, target, args),
            ResetWarm => self.handle_reset(target, false),
            ResetCold => self.handle_reset(target, true),
            Ffwd => self.handle_ffwd(res, target, args),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    //! A scripted target, shared by the handler tests.

    use super::*;
    use crate::expr::Register;
    use crate::protocol::MemFlags;
    use crate::target::ext::breakpoints::{BreakpointInfo, Breakpoints, BreakpointsOps};
    use crate::target::ext::console::{Console, ConsoleOps, ConsoleOutcome};
    use crate::target::ext::exception_mask::{ExceptionMask, ExceptionMaskOps};
    use crate::target::ext::info_ym::{InfoYm, InfoYmOps};
    use crate::target::ext::profiler::{ProfileLine, Profiler, ProfilerOps};
    use crate::target::ext::reset::{Reset, ResetOps};
    use crate::target::ext::symbols::{Symbol, Symbols, SymbolsOps};
    use crate::target::{CpuModel, MachineConfig};

    pub struct MockTarget {
        pub regs: crate::expr::Registers,
        pub mem: Vec<u8>,
        pub last_flags: Option<MemFlags>,
        pub cpu: CpuModel,
        pub ffwd: bool,
        pub steps: usize,
        pub breakpoints: Vec<String>,
        pub symbols: Vec<Symbol>,
        pub exmask: u32,
        pub profiling: bool,
        pub console_lines: Vec<String>,
        pub resets: Vec<bool>,
        // entries the extension counts but cannot produce
        pub overcount: usize,
    }

    impl MockTarget {
        pub fn new() -> MockTarget {
            let mut regs = crate::expr::Registers::new();
            regs.set(Register::Pc, 0x00e0_0030);
            regs.set(Register::A7, 0x0007_fffe);
            regs.set(Register::Sr, 0x2700);
            regs.set(Register::Hbl, 0x1234);

            MockTarget {
                regs,
                mem: (0..=255u8).collect(),
                last_flags: None,
                cpu: CpuModel {
                    cpu: 68000,
                    mmu: 0,
                },
                ffwd: false,
                steps: 0,
                breakpoints: Vec::new(),
                symbols: vec![Symbol {
                    name: "main".into(),
                    address: 0x10,
                    kind: b'T',
                }],
                exmask: 0,
                profiling: false,
                console_lines: Vec::new(),
                resets: Vec::new(),
                overcount: 0,
            }
        }
    }

    impl Target for MockTarget {
        fn read_register(&self, reg: Register) -> u32 {
            use crate::expr::RegisterSnapshot;
            self.regs.get(reg)
        }

        fn for_each_variable(&self, f: &mut dyn FnMut(&str, u32)) {
            use crate::expr::RegisterSnapshot;
            f("HBL", self.regs.get(Register::Hbl));
            f("VBL", self.regs.get(Register::Vbl));
        }

        fn cpu_model(&self) -> CpuModel {
            self.cpu
        }

        fn machine_config(&self) -> MachineConfig {
            MachineConfig {
                machine_type: 0,
                cpu_level: 0,
                st_ram_end: 0x8_0000,
            }
        }

        fn read_byte(&mut self, flags: MemFlags, addr: u32) -> u8 {
            self.last_flags = Some(flags);
            self.mem.get(addr as usize).copied().unwrap_or(0)
        }

        fn write_byte(&mut self, flags: MemFlags, addr: u32, val: u8) {
            self.last_flags = Some(flags);
            if let Some(b) = self.mem.get_mut(addr as usize) {
                *b = val;
            }
        }

        fn fast_forward(&self) -> bool {
            self.ffwd
        }

        fn set_fast_forward(&mut self, enabled: bool) {
            self.ffwd = enabled
        }

        fn request_single_step(&mut self) {
            self.steps += 1;
        }

        fn support_breakpoints(&mut self) -> Option<BreakpointsOps<'_>> {
            Some(self)
        }

        fn support_symbols(&mut self) -> Option<SymbolsOps<'_>> {
            Some(self)
        }

        fn support_console(&mut self) -> Option<ConsoleOps<'_>> {
            Some(self)
        }

        fn support_exception_mask(&mut self) -> Option<ExceptionMaskOps<'_>> {
            Some(self)
        }

        fn support_info_ym(&mut self) -> Option<InfoYmOps<'_>> {
            Some(self)
        }

        fn support_profiler(&mut self) -> Option<ProfilerOps<'_>> {
            Some(self)
        }

        fn support_reset(&mut self) -> Option<ResetOps<'_>> {
            Some(self)
        }
    }

    impl Breakpoints for MockTarget {
        fn add(&mut self, expression: &str) -> bool {
            if expression.trim().is_empty() {
                return false;
            }
            self.breakpoints.push(expression.to_string());
            true
        }

        fn count(&self) -> usize {
            self.breakpoints.len() + self.overcount
        }

        fn info(&self, index: usize) -> Option<BreakpointInfo> {
            let expression = self.breakpoints.get(index.checked_sub(1)?)?.clone();
            Some(BreakpointInfo {
                once: expression.contains(": once"),
                expression,
                ccount: 0,
                hits: 2,
                quiet: false,
                trace: false,
            })
        }

        fn remove(&mut self, index: usize) -> bool {
            match index.checked_sub(1) {
                Some(i) if i < self.breakpoints.len() => {
                    self.breakpoints.remove(i);
                    true
                }
                _ => false,
            }
        }
    }

    impl Symbols for MockTarget {
        fn count(&self) -> usize {
            self.symbols.len() + self.overcount
        }

        fn symbol(&self, index: usize) -> Option<Symbol> {
            self.symbols.get(index).cloned()
        }
    }

    impl Console for MockTarget {
        fn parse(&mut self, line: &str) -> ConsoleOutcome {
            self.console_lines.push(line.to_string());
            if line.trim() == "c" {
                ConsoleOutcome::EndSession
            } else {
                ConsoleOutcome::Continue
            }
        }
    }

    impl ExceptionMask for MockTarget {
        fn exception_mask(&self) -> u32 {
            self.exmask
        }

        fn set_exception_mask(&mut self, mask: u32) {
            self.exmask = mask
        }
    }

    impl InfoYm for MockTarget {
        fn ym_registers(&self) -> [u8; 16] {
            let mut regs = [0; 16];
            regs[7] = 0x3f;
            regs[15] = 0xa5;
            regs
        }
    }

    impl Profiler for MockTarget {
        fn profiler_enabled(&self) -> bool {
            self.profiling
        }

        fn set_profiler_enabled(&mut self, enabled: bool) {
            self.profiling = enabled
        }

        fn for_each_line(&self, f: &mut dyn FnMut(ProfileLine)) {
            f(ProfileLine {
                addr: 0xe0_0000,
                count: 3,
                cycles: 0x10,
            });
            f(ProfileLine {
                addr: 0xe0_0002,
                count: 0,
                cycles: 0,
            });
            f(ProfileLine {
                addr: 0xe0_0004,
                count: 1,
                cycles: 8,
            });
        }
    }

    impl Reset for MockTarget {
        fn reset_warm(&mut self) -> bool {
            self.resets.push(false);
            true
        }

        fn reset_cold(&mut self) -> bool {
            self.resets.push(true);
            true
        }
    }

    /// Feeds captured output from a fixed script.
    pub struct ScriptedCapture(pub Vec<u8>);

    impl OutputCapture for ScriptedCapture {
        fn begin(&mut self) -> std::io::Result<crate::stub::capture::CaptureGuard> {
            Ok(crate::stub::capture::CaptureGuard::noop())
        }

        fn read_pending(&mut self, buf: &mut [u8]) -> usize {
            let n = buf.len().min(self.0.len());
            buf[..n].copy_from_slice(&self.0[..n]);
            self.0.drain(..n);
            n
        }
    }

    pub type TestStub = RdbStubImpl<'static, MockTarget, Vec<u8>>;

    /// Run one command line through a fresh send buffer, returning every
    /// byte written.
    pub fn run(stub: &mut TestStub, target: &mut MockTarget, line: &str) -> Vec<u8> {
        let mut out = Vec::new();
        let mut buf = [0; 512];
        {
            let mut res = ResponseWriter::new(&mut out, &mut buf);
            match stub.handle_frame(&mut res, target, line.as_bytes()) {
                Ok(()) => {}
                Err(InternalError::ConnectionWrite(e)) => match e {},
                Err(InternalError::Rejected) => unreachable!(),
            }
            res.flush().unwrap();
        }
        out
    }

    pub fn stub() -> TestStub {
        RdbStubImpl::new(None)
    }

    #[test]
    fn unknown_and_empty_commands_fail() {
        let mut target = MockTarget::new();
        let mut stub = stub();
        assert_eq!(run(&mut stub, &mut target, "frobnicate"), b"NG\0");
        assert_eq!(run(&mut stub, &mut target, ""), b"NG\0");
        assert_eq!(run(&mut stub, &mut target, "STATUS"), b"NG\0");
    }
}
