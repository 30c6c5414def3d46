//! Inspect the YM2149 sound chip.

/// Target Extension - Read the 16 YM/PSG registers.
pub trait InfoYm {
    fn ym_registers(&self) -> [u8; 16];
}

define_ext!(InfoYmOps, InfoYm);
