use std::collections::BTreeMap;

use rdbstub::expr::{self, Register, RegisterSnapshot, Registers};
use rdbstub::target::ext::symbols::Symbol;

pub const RAM_SIZE: usize = 512 * 1024;
pub const ROM_BASE: u32 = 0xe0_0000;
pub const ENTRY: u32 = ROM_BASE + 0x30;

/// Instructions executed per emulated video frame.
const INSTRS_PER_FRAME: u32 = 2000;

pub enum Event {
    Break,
    Step,
}

pub struct Breakpoint {
    pub expression: String,
    pub pc: u32,
    pub hits: u32,
    pub once: bool,
}

/// A pretend 68000: every instruction is 2 bytes long, takes 4 cycles, and
/// decrements D0. The program loops over a 32 byte window of ROM.
pub struct Emu {
    pub regs: Registers,
    pub ram: Vec<u8>,
    pub ffwd: bool,
    pub single_step: bool,
    pub quit: bool,

    pub breakpoints: Vec<Breakpoint>,
    pub symbols: Vec<Symbol>,
    pub exception_mask: u32,

    pub profiling: bool,
    pub profile: BTreeMap<u32, (u32, u32)>,
}

impl Emu {
    pub fn new() -> Emu {
        let mut emu = Emu {
            regs: Registers::new(),
            ram: vec![0; RAM_SIZE],
            ffwd: false,
            single_step: false,
            quit: false,

            breakpoints: Vec::new(),
            symbols: vec![
                Symbol {
                    name: "_start".into(),
                    address: ENTRY,
                    kind: b'T',
                },
                Symbol {
                    name: "loop".into(),
                    address: ENTRY + 0x10,
                    kind: b'T',
                },
                Symbol {
                    name: "counter".into(),
                    address: 0x1000,
                    kind: b'B',
                },
            ],
            exception_mask: 0,

            profiling: false,
            profile: BTreeMap::new(),
        };
        emu.reset(true);
        emu
    }

    pub fn reset(&mut self, cold: bool) {
        if cold {
            self.ram.iter_mut().for_each(|b| *b = 0);
        }
        self.regs = Registers::new();
        self.regs.set(Register::Pc, ENTRY);
        self.regs.set(Register::Sr, 0x2700);
        self.regs.set(Register::A7, RAM_SIZE as u32 - 2);
    }

    /// Execute a single instruction.
    pub fn step(&mut self) -> Option<Event> {
        let pc = self.regs.get(Register::Pc);
        let next = ENTRY + (pc.wrapping_sub(ENTRY).wrapping_add(2) & 0x1f);
        self.regs.set(Register::Pc, next);
        self.regs.set(Register::D0, self.regs.get(Register::D0).wrapping_sub(1));
        self.regs.set(
            Register::CycleCounter,
            self.regs.get(Register::CycleCounter).wrapping_add(4),
        );

        // `counter` lives in RAM, so the client can watch it move
        let counter = self.regs.get(Register::D0).to_be_bytes();
        self.ram[0x1000..0x1004].copy_from_slice(&counter);

        if self.profiling {
            let entry = self.profile.entry(pc).or_insert((0, 0));
            entry.0 += 1;
            entry.1 += 4;
        }

        let hit = self.breakpoints.iter().position(|bp| bp.pc == next);
        if let Some(i) = hit {
            self.breakpoints[i].hits += 1;
            if self.breakpoints[i].once {
                self.breakpoints.remove(i);
            }
            println!("breakpoint hit at ${:x}", next);
            return Some(Event::Break);
        }

        None
    }

    /// Run one video frame worth of instructions, stopping early on a
    /// breakpoint or after a requested single step.
    pub fn run_frame(&mut self) -> Option<Event> {
        let count = if self.ffwd { INSTRS_PER_FRAME * 8 } else { INSTRS_PER_FRAME };
        for _ in 0..count {
            if let Some(event) = self.step() {
                self.single_step = false;
                return Some(event);
            }
            if self.single_step {
                self.single_step = false;
                return Some(Event::Step);
            }
        }

        self.regs.set(Register::Vbl, self.regs.get(Register::Vbl).wrapping_add(1));
        None
    }

    /// Parse `pc = <expr> [: once]`.
    pub fn add_breakpoint(&mut self, expression: &str) -> bool {
        let mut parts = expression.split(':');
        let cond = parts.next().unwrap_or_default();
        let once = parts.any(|opt| opt.trim() == "once");

        let mut cond = cond.splitn(2, '=');
        let (lhs, rhs) = match (cond.next(), cond.next()) {
            (Some(lhs), Some(rhs)) => (lhs.trim(), rhs.trim()),
            _ => return false,
        };
        if !lhs.eq_ignore_ascii_case("pc") {
            return false;
        }

        let syms: BTreeMap<String, u32> = self
            .symbols
            .iter()
            .map(|s| (s.name.clone(), s.address))
            .collect();
        let pc = match expr::evaluate(rhs, &syms, &self.regs) {
            Ok(pc) => pc,
            Err(e) => {
                println!("bad breakpoint `{}`: {}", expression, e);
                return false;
            }
        };

        self.breakpoints.push(Breakpoint {
            expression: expression.to_string(),
            pc,
            hits: 0,
            once,
        });
        println!("breakpoint {} at ${:x}", self.breakpoints.len(), pc);
        true
    }
}
