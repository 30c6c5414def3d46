use rdbstub::expr::{Register, RegisterSnapshot};
use rdbstub::protocol::MemFlags;
use rdbstub::stub::HostEventLoop;
use rdbstub::target::ext::breakpoints::{BreakpointInfo, Breakpoints, BreakpointsOps};
use rdbstub::target::ext::console::{Console, ConsoleOps, ConsoleOutcome};
use rdbstub::target::ext::exception_mask::{ExceptionMask, ExceptionMaskOps};
use rdbstub::target::ext::profiler::{ProfileLine, Profiler, ProfilerOps};
use rdbstub::target::ext::reset::{Reset, ResetOps};
use rdbstub::target::ext::symbols::{Symbol, Symbols, SymbolsOps};
use rdbstub::target::{CpuModel, MachineConfig, Target};

use crate::emu::{Emu, RAM_SIZE, ROM_BASE};

impl Target for Emu {
    fn read_register(&self, reg: Register) -> u32 {
        self.regs.get(reg)
    }

    fn for_each_variable(&self, f: &mut dyn FnMut(&str, u32)) {
        for reg in [Register::CycleCounter, Register::Vbl].iter() {
            f(reg.name(), self.regs.get(*reg));
        }
    }

    fn cpu_model(&self) -> CpuModel {
        CpuModel { cpu: 68000, mmu: 0 }
    }

    fn machine_config(&self) -> MachineConfig {
        MachineConfig {
            machine_type: 0,
            cpu_level: 0,
            st_ram_end: RAM_SIZE as u32,
        }
    }

    // no MMU, so every access is physical
    fn read_byte(&mut self, _flags: MemFlags, addr: u32) -> u8 {
        let addr = addr & 0xff_ffff;
        match addr as usize {
            a if a < RAM_SIZE => self.ram[a],
            // ROM holds `nop`s
            _ if addr >= ROM_BASE => [0x4e, 0x71][addr as usize & 1],
            _ => 0xff,
        }
    }

    fn write_byte(&mut self, _flags: MemFlags, addr: u32, val: u8) {
        if let Some(b) = self.ram.get_mut((addr & 0xff_ffff) as usize) {
            *b = val;
        }
    }

    fn fast_forward(&self) -> bool {
        self.ffwd
    }

    fn set_fast_forward(&mut self, enabled: bool) {
        self.ffwd = enabled;
    }

    fn request_single_step(&mut self) {
        self.single_step = true;
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

    fn support_profiler(&mut self) -> Option<ProfilerOps<'_>> {
        Some(self)
    }

    fn support_reset(&mut self) -> Option<ResetOps<'_>> {
        Some(self)
    }
}

impl Breakpoints for Emu {
    fn add(&mut self, expression: &str) -> bool {
        self.add_breakpoint(expression)
    }

    fn count(&self) -> usize {
        self.breakpoints.len()
    }

    fn info(&self, index: usize) -> Option<BreakpointInfo> {
        let bp = self.breakpoints.get(index.checked_sub(1)?)?;
        Some(BreakpointInfo {
            expression: bp.expression.clone(),
            ccount: 0,
            hits: bp.hits,
            once: bp.once,
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

impl Symbols for Emu {
    fn count(&self) -> usize {
        self.symbols.len()
    }

    fn symbol(&self, index: usize) -> Option<Symbol> {
        self.symbols.get(index).cloned()
    }
}

impl Console for Emu {
    fn parse(&mut self, line: &str) -> ConsoleOutcome {
        let mut words = line.trim().splitn(2, ' ');
        match (words.next(), words.next()) {
            (Some("r"), Some(assign)) => {
                let mut parts = assign.splitn(2, '=');
                let reg = parts.next().and_then(Register::from_name);
                let val = parts
                    .next()
                    .and_then(|v| u32::from_str_radix(v.trim().trim_start_matches('$'), 16).ok());
                match (reg, val) {
                    (Some(reg), Some(val)) => {
                        self.regs.set(reg, val);
                        println!("{} = ${:x}", reg, val);
                    }
                    _ => println!("usage: r <reg>=$<hex>"),
                }
            }
            (Some("r"), None) => {
                for (reg, val) in self.regs.iter().filter(|(r, _)| !r.is_variable()) {
                    println!("{}: ${:08x}", reg, val);
                }
            }
            (Some("c"), _) => return ConsoleOutcome::EndSession,
            (Some(cmd), _) => println!("unknown command `{}`", cmd),
            (None, _) => {}
        }
        ConsoleOutcome::Continue
    }
}

impl ExceptionMask for Emu {
    fn exception_mask(&self) -> u32 {
        self.exception_mask
    }

    fn set_exception_mask(&mut self, mask: u32) {
        self.exception_mask = mask;
    }
}

impl Profiler for Emu {
    fn profiler_enabled(&self) -> bool {
        self.profiling
    }

    fn set_profiler_enabled(&mut self, enabled: bool) {
        self.profiling = enabled;
    }

    fn for_each_line(&self, f: &mut dyn FnMut(ProfileLine)) {
        for (&addr, &(count, cycles)) in self.profile.iter() {
            f(ProfileLine {
                addr,
                count,
                cycles,
            })
        }
    }
}

impl Reset for Emu {
    fn reset_warm(&mut self) -> bool {
        self.reset(false);
        true
    }

    fn reset_cold(&mut self) -> bool {
        self.reset(true);
        true
    }
}

/// Hooks the stub calls while execution is halted.
pub enum EmuEvents {}

impl HostEventLoop for EmuEvents {
    type Target = Emu;

    fn process_events(_emu: &mut Emu) {}

    fn quit_requested(emu: &Emu) -> bool {
        emu.quit
    }

    fn connection_status(_emu: &mut Emu, connected: bool) {
        if connected {
            eprintln!("connected -- debugging");
        } else {
            eprintln!("waiting for debugger");
        }
    }
}
