//! Add, list and remove breakpoints.

/// Everything the client is told about a single breakpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakpointInfo {
    /// The condition expression, as originally given.
    pub expression: String,
    /// Number of times the condition must be met before breaking.
    pub ccount: u32,
    /// Number of times the breakpoint has been hit.
    pub hits: u32,
    /// Removed after it first triggers.
    pub once: bool,
    /// Triggers without notifying.
    pub quiet: bool,
    /// Traces instead of breaking.
    pub trace: bool,
}

/// Target Extension - Manage conditional breakpoints.
///
/// Breakpoints are identified by their 1-based position in the list.
pub trait Breakpoints {
    /// Add a breakpoint from a condition expression such as
    /// `pc = $e00030 : once`. Return `false` if the expression was rejected.
    fn add(&mut self, expression: &str) -> bool;

    /// Number of breakpoints.
    fn count(&self) -> usize;

    /// Information about breakpoint `index` (1-based).
    fn info(&self, index: usize) -> Option<BreakpointInfo>;

    /// Remove breakpoint `index` (1-based). Return `false` if there was no
    /// such breakpoint.
    fn remove(&mut self, index: usize) -> bool;
}

define_ext!(BreakpointsOps, Breakpoints);
