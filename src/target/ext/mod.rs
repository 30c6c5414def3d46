//! Extensions to [`Target`](super::Target) which add support for various
//! subsets of the command set.
//!
//! Each extension is exposed through a `support_<ext>` method on `Target`.
//! See the [`target`](super) module documentation for how to opt in.

macro_rules! define_ext {
    ($extname:ident, $exttrait:ident) => {
        #[doc = concat!("See [`", stringify!($exttrait), "`].")]
        pub type $extname<'a> = &'a mut dyn $exttrait;
    };
}

pub mod breakpoints;
pub mod console;
pub mod exception_mask;
pub mod info_ym;
pub mod profiler;
pub mod reset;
pub mod symbols;
