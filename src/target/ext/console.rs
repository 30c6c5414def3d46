//! Forward free-form lines to the emulator's command-line debugger.

/// What the console wants to happen once it has handled a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleOutcome {
    /// Stay stopped.
    Continue,
    /// The line ended the debugging session: execution should resume.
    EndSession,
}

/// Target Extension - Execute command-line debugger commands.
///
/// Anything the console prints to stdout/stderr is forwarded to the client
/// as log output, provided output capture is enabled on the stub.
pub trait Console {
    fn parse(&mut self, line: &str) -> ConsoleOutcome;
}

define_ext!(ConsoleOps, Console);
