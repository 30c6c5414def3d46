//! List the symbols loaded for the emulated program.

/// A single symbol table entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub address: u32,
    /// Symbol type, as a single character (e.g: `T` for text, `D` for data,
    /// `B` for bss).
    pub kind: u8,
}

/// Target Extension - Enumerate CPU symbols.
///
/// Symbols are identified by their 0-based position in the table.
pub trait Symbols {
    fn count(&self) -> usize;

    fn symbol(&self, index: usize) -> Option<Symbol>;
}

define_ext!(SymbolsOps, Symbols);
