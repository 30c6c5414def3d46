bitflags::bitflags! {
    /// How a memory access address should be interpreted by the target.
    ///
    /// An empty set means a physical address. With `LOGICAL`, the target
    /// translates through its MMU (when it has one) using the remaining bits
    /// to pick the address space: `SUPER`/`USER` override the current CPU
    /// mode, and `PROGRAM` selects the program space instead of data.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MemFlags: u32 {
        const LOGICAL = 1 << 0;
        const SUPER = 1 << 1;
        const USER = 1 << 2;
        const DATA = 1 << 3;
        const PROGRAM = 1 << 4;
    }
}

impl MemFlags {
    pub const PHYSICAL: MemFlags = MemFlags::empty();

    /// Whether a logical access should use supervisor space. `cpu_super` is
    /// the CPU's current mode, used when neither `SUPER` nor `USER` is set.
    pub fn is_super(self, cpu_super: bool) -> bool {
        if self.contains(MemFlags::SUPER) {
            true
        } else if self.contains(MemFlags::USER) {
            false
        } else {
            cpu_super
        }
    }

    /// Whether a logical access targets data space.
    pub fn is_data(self) -> bool {
        !self.contains(MemFlags::PROGRAM)
    }
}

impl Default for MemFlags {
    /// What the client requests unless told otherwise.
    fn default() -> Self {
        MemFlags::LOGICAL | MemFlags::DATA
    }
}
