//! Control the CPU profiler, and report what it collected.

/// Accumulated statistics for a single instruction address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProfileLine {
    pub addr: u32,
    pub count: u32,
    pub cycles: u32,
}

/// Target Extension - CPU profiling.
pub trait Profiler {
    fn profiler_enabled(&self) -> bool;

    fn set_profiler_enabled(&mut self, enabled: bool);

    /// Visit every profiled address, in increasing address order. Lines with
    /// a zero hit count may be included; they are skipped by the stub.
    fn for_each_line(&self, f: &mut dyn FnMut(ProfileLine));
}

define_ext!(ProfilerOps, Profiler);
