//! Reset the emulated machine.

/// Target Extension - Warm and cold resets.
pub trait Reset {
    /// Return `false` if the reset failed.
    fn reset_warm(&mut self) -> bool;

    /// Return `false` if the reset failed.
    fn reset_cold(&mut self) -> bool;
}

define_ext!(ResetOps, Reset);
