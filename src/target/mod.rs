//! The core [`Target`] trait, and all its various protocol extension traits.
//!
//! The [`Target`] trait describes everything the stub needs from the emulator
//! it is attached to: CPU registers, byte-level memory access, machine
//! configuration, and execution control. Everything else (breakpoints,
//! symbols, the command-line console, profiling...) is optional, and exposed
//! through "extension" traits.
//!
//! # Target Extensions
//!
//! Each extension is a separate trait, and the [`Target`] trait has a
//! matching `support_<ext>` method returning `Option<<ext>Ops<'_>>`. The
//! default implementation returns `None`, in which case the commands backed
//! by that extension reply with a failure. Enabling an extension is a matter
//! of implementing its trait and overriding the method:
//!
//! ```rust,ignore
//! impl Target for MyEmu {
//!     // ...
//!
//!     fn support_breakpoints(&mut self) -> Option<BreakpointsOps<'_>> {
//!         Some(self)
//!     }
//! }
//!
//! impl Breakpoints for MyEmu {
//!     // ...
//! }
//! ```

use core::cell::RefCell;

use crate::expr::{EvalError, Register, RegisterSnapshot, SymbolTable};
use crate::protocol::MemFlags;

pub mod ext;

use ext::breakpoints::BreakpointsOps;
use ext::console::ConsoleOps;
use ext::exception_mask::ExceptionMaskOps;
use ext::info_ym::InfoYmOps;
use ext::profiler::ProfilerOps;
use ext::reset::ResetOps;
use ext::symbols::SymbolsOps;

/// CPU and MMU models, as 680x0 part numbers (e.g: `68000`, `68030`).
///
/// An `mmu` of `0` means there is no MMU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuModel {
    pub cpu: u32,
    pub mmu: u32,
}

/// Machine configuration, as reported in `!config` notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MachineConfig {
    pub machine_type: u32,
    pub cpu_level: u32,
    /// One past the last byte of ST RAM.
    pub st_ram_end: u32,
}

/// Describes an emulated machine which can be debugged over the protocol.
///
/// None of these methods can fail: the emulator is expected to answer with
/// whatever its current state is. Reads of registers the emulated CPU doesn't
/// have should return `0`.
pub trait Target {
    /// Current value of a register or pseudo-variable.
    fn read_register(&self, reg: Register) -> u32;

    /// Visit every emulator pseudo-variable, in the order they should be
    /// reported to the client.
    fn for_each_variable(&self, f: &mut dyn FnMut(&str, u32));

    fn cpu_model(&self) -> CpuModel;

    fn machine_config(&self) -> MachineConfig;

    /// Current program counter.
    fn pc(&self) -> u32 {
        self.read_register(Register::Pc)
    }

    /// Read a byte from the emulated address space, translated according to
    /// `flags`.
    fn read_byte(&mut self, flags: MemFlags, addr: u32) -> u8;

    /// Write a byte to the emulated address space, translated according to
    /// `flags`.
    fn write_byte(&mut self, flags: MemFlags, addr: u32, val: u8);

    fn fast_forward(&self) -> bool;

    fn set_fast_forward(&mut self, enabled: bool);

    /// Execute exactly one instruction the next time execution resumes.
    fn request_single_step(&mut self);

    /// Bring any lazily updated state (shadow registers, hardware
    /// registers...) up to date before it gets inspected.
    ///
    /// Called every time the stub enters its break loop. The default
    /// implementation does nothing.
    fn sync_hardware(&mut self) {}

    /// Support breakpoint management.
    #[inline(always)]
    fn support_breakpoints(&mut self) -> Option<BreakpointsOps<'_>> {
        None
    }

    /// Support symbol listing and symbol lookup in expressions.
    #[inline(always)]
    fn support_symbols(&mut self) -> Option<SymbolsOps<'_>> {
        None
    }

    /// Support forwarding free-form lines to a command-line console.
    #[inline(always)]
    fn support_console(&mut self) -> Option<ConsoleOps<'_>> {
        None
    }

    /// Support reading/writing the exception catch mask.
    #[inline(always)]
    fn support_exception_mask(&mut self) -> Option<ExceptionMaskOps<'_>> {
        None
    }

    /// Support dumping the sound chip registers.
    #[inline(always)]
    fn support_info_ym(&mut self) -> Option<InfoYmOps<'_>> {
        None
    }

    /// Support the CPU profiler.
    #[inline(always)]
    fn support_profiler(&mut self) -> Option<ProfilerOps<'_>> {
        None
    }

    /// Support warm/cold machine resets.
    #[inline(always)]
    fn support_reset(&mut self) -> Option<ResetOps<'_>> {
        None
    }

    /// Look up a symbol by name, for expression evaluation.
    ///
    /// The default implementation walks the [`Symbols`](ext::symbols::Symbols)
    /// extension, if any.
    fn symbol_address(&mut self, name: &str) -> Option<u32> {
        let syms = self.support_symbols()?;
        (0..syms.count())
            .filter_map(|i| syms.symbol(i))
            .find(|s| s.name == name)
            .map(|s| s.address)
    }
}

/// Evaluates expressions received from the client against the live target.
pub(crate) struct TargetEval<'a, T: ?Sized>(RefCell<&'a mut T>);

impl<'a, T: Target + ?Sized> TargetEval<'a, T> {
    pub fn new(target: &'a mut T) -> Self {
        TargetEval(RefCell::new(target))
    }

    pub fn eval(&self, text: &str) -> Result<u32, EvalError> {
        crate::expr::evaluate(text, self, self)
    }
}

impl<T: Target + ?Sized> SymbolTable for TargetEval<'_, T> {
    fn lookup(&self, name: &str) -> Option<u32> {
        self.0.borrow_mut().symbol_address(name)
    }
}

impl<T: Target + ?Sized> RegisterSnapshot for TargetEval<'_, T> {
    fn get(&self, reg: Register) -> u32 {
        self.0.borrow().read_register(reg)
    }
}
