//! Choose which CPU exceptions stop execution.

/// Target Extension - Read/write the exception catch mask.
pub trait ExceptionMask {
    fn exception_mask(&self) -> u32;

    fn set_exception_mask(&mut self, mask: u32);
}

define_ext!(ExceptionMaskOps, ExceptionMask);
