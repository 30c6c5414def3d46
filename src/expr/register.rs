macro_rules! registers {
    ($($variant:ident => $name:literal,)*) => {
        /// Every name the expression evaluator resolves as a register.
        ///
        /// The table covers the data/address registers, the extended CPU and
        /// MMU registers, and the emulator's pseudo-variables (which the
        /// target reports alongside real registers). Declaration order is the
        /// order of the table, and is significant: it is the index used by
        /// [`Registers`].
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum Register {
            $($variant,)*
        }

        impl Register {
            /// All registers, in table order.
            pub const ALL: &'static [Register] = &[$(Register::$variant,)*];

            /// Name as it appears on the wire (and in expressions).
            pub fn name(self) -> &'static str {
                match self {
                    $(Register::$variant => $name,)*
                }
            }
        }
    };
}

registers! {
    D0 => "D0",
    D1 => "D1",
    D2 => "D2",
    D3 => "D3",
    D4 => "D4",
    D5 => "D5",
    D6 => "D6",
    D7 => "D7",
    A0 => "A0",
    A1 => "A1",
    A2 => "A2",
    A3 => "A3",
    A4 => "A4",
    A5 => "A5",
    A6 => "A6",
    A7 => "A7",
    Pc => "PC",
    Sr => "SR",
    Usp => "USP",
    Isp => "ISP",
    Caar => "CAAR",
    Cacr => "CACR",
    Dfc => "DFC",
    Msp => "MSP",
    Sfc => "SFC",
    Vbr => "VBR",
    Ex => "EX",
    Crp => "CRP",
    Urp => "URP",
    Srp => "SRP",
    Srph => "SRPH",
    Tc => "TC",
    Dtt0 => "DTT0",
    Dtt1 => "DTT1",
    Itt0 => "ITT0",
    Itt1 => "ITT1",
    Mmusr => "MMUSR",
    Buscr => "BUSCR",
    // pseudo-variables
    AesOpcode => "AesOpcode",
    Basepage => "Basepage",
    BiosOpcode => "BiosOpcode",
    Bss => "BSS",
    CpuInstr => "CpuInstr",
    CpuOpcodeType => "CpuOpcodeType",
    CycleCounter => "CycleCounter",
    Data => "DATA",
    DspInstr => "DspInstr",
    DspOpcodeType => "DspOpcodeType",
    FrameCycles => "FrameCycles",
    GemdosOpcode => "GemdosOpcode",
    Hbl => "HBL",
    LineAOpcode => "LineAOpcode",
    LineCycles => "LineCycles",
    LineFOpcode => "LineFOpcode",
    NextPc => "NextPC",
    OsCallParam => "OsCallParam",
    Text => "TEXT",
    TextEnd => "TEXTEnd",
    Vbl => "VBL",
    VdiOpcode => "VdiOpcode",
    XbiosOpcode => "XbiosOpcode",
}

/// The data and address registers, in the order the target reports them.
pub const CORE_REGISTERS: [Register; 16] = [
    Register::D0,
    Register::D1,
    Register::D2,
    Register::D3,
    Register::D4,
    Register::D5,
    Register::D6,
    Register::D7,
    Register::A0,
    Register::A1,
    Register::A2,
    Register::A3,
    Register::A4,
    Register::A5,
    Register::A6,
    Register::A7,
];

impl Register {
    /// Number of entries in the register table.
    pub const COUNT: usize = Register::ALL.len();

    /// Case-insensitive lookup by name.
    pub fn from_name(name: &str) -> Option<Register> {
        Register::ALL
            .iter()
            .copied()
            .find(|r| r.name().eq_ignore_ascii_case(name))
    }

    /// Position of the register in the table.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Whether this entry is an emulator pseudo-variable rather than a CPU
    /// register.
    pub fn is_variable(self) -> bool {
        self >= Register::AesOpcode
    }
}

impl core::fmt::Display for Register {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

/// A source of register values for expression evaluation.
pub trait RegisterSnapshot {
    /// Current value of `reg`. Registers the source knows nothing about read
    /// as zero.
    fn get(&self, reg: Register) -> u32;
}

/// A plain snapshot of every register in the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registers {
    values: [u32; Register::COUNT],
}

impl Default for Registers {
    fn default() -> Self {
        Registers {
            values: [0; Register::COUNT],
        }
    }
}

impl Registers {
    pub fn new() -> Registers {
        Registers::default()
    }

    pub fn set(&mut self, reg: Register, value: u32) {
        self.values[reg.index()] = value;
    }

    /// Iterate over `(register, value)` pairs in table order.
    pub fn iter(&self) -> impl Iterator<Item = (Register, u32)> + '_ {
        Register::ALL.iter().map(move |&r| (r, self.values[r.index()]))
    }
}

impl RegisterSnapshot for Registers {
    fn get(&self, reg: Register) -> u32 {
        self.values[reg.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive() {
        assert_eq!(Register::from_name("a7"), Some(Register::A7));
        assert_eq!(Register::from_name("Pc"), Some(Register::Pc));
        assert_eq!(Register::from_name("text"), Some(Register::Text));
        assert_eq!(Register::from_name("main"), None);
    }

    #[test]
    fn table_order() {
        assert_eq!(Register::ALL[0], Register::D0);
        assert_eq!(Register::ALL[16], Register::Pc);
        assert_eq!(Register::ALL[Register::COUNT - 1], Register::XbiosOpcode);
        assert!(Register::Hbl.is_variable());
        assert!(!Register::Buscr.is_variable());
    }

    #[test]
    fn snapshot_roundtrip() {
        let mut regs = Registers::new();
        regs.set(Register::Sr, 0x2700);
        assert_eq!(regs.get(Register::Sr), 0x2700);
        assert_eq!(regs.get(Register::D0), 0);
        assert_eq!(regs.iter().count(), Register::COUNT);
    }
}
