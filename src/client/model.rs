//! A mirror of the target's state, kept up to date from responses and
//! notifications.

use std::collections::BTreeMap;

use crate::expr::{self, EvalError, Registers};
use crate::protocol::Notification;
use crate::target::ext::breakpoints::BreakpointInfo;
use crate::target::ext::symbols::Symbol;
use crate::target::MachineConfig;

use super::request::MemorySlot;
use super::response::{MemoryBlock, Response, ResponseError};
use super::Observer;

bitflags::bitflags! {
    /// What changed since the last flush marker completed.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Changed: u32 {
        const PC = 1 << 0;
        const REGS = 1 << 1;
        const BREAKPOINTS = 1 << 2;
        const SYMBOLS = 1 << 3;
        const EXCEPTION_MASK = 1 << 4;
        /// A `memset` changed memory outside of any fetched slot.
        const OTHER_MEMORY = 1 << 5;
        const MEMORY = 1 << 6;
        const YM = 1 << 7;
        const PROFILE = 1 << 8;
        const SEARCH = 1 << 9;
    }
}

/// Outcome of the latest `memfind`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchResults {
    /// Uid of the command which produced these results.
    pub uid: u64,
    pub addresses: Vec<u32>,
}

/// Profiler hits accumulated for one address.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProfileCounts {
    pub count: u32,
    pub cycles: u32,
}

/// An [`Observer`] mirroring everything the target has reported.
#[derive(Debug, Default)]
pub struct TargetModel {
    connected: bool,
    running: bool,
    pc: u32,
    ffwd: bool,
    config: MachineConfig,

    regs: Registers,
    variables: Vec<(String, u32)>,
    memory: BTreeMap<MemorySlot, MemoryBlock>,
    breakpoints: Vec<BreakpointInfo>,
    symbols: Vec<Symbol>,
    symbol_map: BTreeMap<String, u32>,
    exception_mask: u32,
    ym: [u8; 16],

    profile_enabled: bool,
    profile: BTreeMap<u32, ProfileCounts>,

    search: SearchResults,
    last_write: Option<(u32, u32)>,
    log: String,

    changed: Changed,
    last_flush: Option<(u64, Changed)>,
}

impl TargetModel {
    pub fn new() -> TargetModel {
        TargetModel::default()
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// PC from the latest status. Stale while the target runs.
    pub fn pc(&self) -> u32 {
        self.pc
    }

    pub fn is_fast_forward(&self) -> bool {
        self.ffwd
    }

    pub fn machine_config(&self) -> MachineConfig {
        self.config
    }

    /// 24 bit addressing on a plain 68000, 32 bit otherwise.
    pub fn address_mask(&self) -> u32 {
        if self.config.cpu_level > 0 {
            0xffff_ffff
        } else {
            0x00ff_ffff
        }
    }

    pub fn registers(&self) -> &Registers {
        &self.regs
    }

    /// Values reported under names the register table doesn't know.
    pub fn variables(&self) -> &[(String, u32)] {
        &self.variables
    }

    pub fn memory(&self, slot: MemorySlot) -> Option<&MemoryBlock> {
        self.memory.get(&slot)
    }

    pub fn breakpoints(&self) -> &[BreakpointInfo] {
        &self.breakpoints
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    pub fn exception_mask(&self) -> u32 {
        self.exception_mask
    }

    pub fn ym_registers(&self) -> [u8; 16] {
        self.ym
    }

    pub fn is_profile_enabled(&self) -> bool {
        self.profile_enabled
    }

    pub fn profile_counts(&self, addr: u32) -> ProfileCounts {
        self.profile.get(&addr).copied().unwrap_or_default()
    }

    /// Forget every accumulated profile count.
    pub fn profile_reset(&mut self) {
        self.profile.clear();
        self.changed |= Changed::PROFILE;
    }

    pub fn search_results(&self) -> &SearchResults {
        &self.search
    }

    /// Range changed by the latest `memset`.
    pub fn last_write(&self) -> Option<(u32, u32)> {
        self.last_write
    }

    /// Take the log text received so far.
    pub fn take_log(&mut self) -> String {
        core::mem::take(&mut self.log)
    }

    /// Uid of the latest completed flush marker, and what changed in the
    /// batch it closed.
    pub fn last_flush(&self) -> Option<(u64, Changed)> {
        self.last_flush
    }

    /// Evaluate an expression against the mirrored registers and symbols.
    pub fn evaluate(&self, text: &str) -> Result<u32, EvalError> {
        expr::evaluate(text, &self.symbol_map, &self.regs)
    }

    fn apply_response(&mut self, uid: u64, response: Response) {
        match response {
            Response::Ok | Response::Raw(_) => {}
            Response::Flush => {
                self.last_flush = Some((uid, self.changed));
                self.changed = Changed::empty();
            }
            Response::Status { running, pc } => {
                self.running = running;
                self.pc = pc;
                self.changed |= Changed::PC;
            }
            Response::Registers(dump) => {
                self.regs = dump.regs;
                self.variables = dump.extra;
                self.changed |= Changed::REGS;
            }
            Response::Memory(block) => {
                self.memory.insert(block.slot, block);
                self.changed |= Changed::MEMORY;
            }
            Response::MemoryWritten { addr, size } => {
                self.last_write = Some((addr, size));
                self.changed |= Changed::OTHER_MEMORY;
            }
            Response::Breakpoints(bps) => {
                self.breakpoints = bps;
                self.changed |= Changed::BREAKPOINTS;
            }
            Response::Symbols(syms) => {
                self.symbol_map = syms.iter().map(|s| (s.name.clone(), s.address)).collect();
                self.symbols = syms;
                self.changed |= Changed::SYMBOLS;
            }
            Response::ExceptionMask(mask) => {
                self.exception_mask = mask;
                self.changed |= Changed::EXCEPTION_MASK;
            }
            Response::InfoYm(regs) => {
                self.ym = regs;
                self.changed |= Changed::YM;
            }
            Response::Profile(enabled) => {
                self.profile_enabled = enabled;
                self.changed |= Changed::PROFILE;
            }
            Response::FastForward(ffwd) => self.ffwd = ffwd,
            Response::MemFind(found) => {
                self.search = SearchResults {
                    uid,
                    addresses: found.into_iter().collect(),
                };
                self.changed |= Changed::SEARCH;
            }
        }
    }
}

impl Observer for TargetModel {
    fn connection_changed(&mut self, connected: bool) {
        self.connected = connected;
        if !connected {
            self.running = false;
        }
    }

    fn notification(&mut self, notification: &Notification) {
        match notification {
            Notification::Connected { .. } => {}
            Notification::Status { running, pc, ffwd } => {
                self.running = *running;
                self.pc = *pc;
                self.ffwd = *ffwd;
                self.changed |= Changed::PC;
            }
            Notification::Config {
                machine_type,
                cpu_level,
                st_ram_end,
            } => {
                self.config = MachineConfig {
                    machine_type: *machine_type,
                    cpu_level: *cpu_level,
                    st_ram_end: *st_ram_end,
                }
            }
            Notification::Profile { enabled, entries } => {
                self.profile_enabled = *enabled;
                for e in entries {
                    let counts = self.profile.entry(e.addr).or_default();
                    counts.count = counts.count.wrapping_add(e.count);
                    counts.cycles = counts.cycles.wrapping_add(e.cycles);
                }
                self.changed |= Changed::PROFILE;
            }
            Notification::Log(text) => self.log.push_str(text),
        }
    }

    fn response(&mut self, uid: u64, _command: &str, response: Result<Response, ResponseError>) {
        if let Ok(response) = response {
            self.apply_response(uid, response);
        }
    }
}
