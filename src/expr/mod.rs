//! Arithmetic expressions over literals, registers, and symbols.
//!
//! Every address-like argument exchanged over the protocol is an expression,
//! evaluated by the same code on both ends of the connection:
//!
//! - `$` introduces a hex literal, bare digits are decimal
//! - identifiers resolve first against the [`Register`] table
//!   (case-insensitive), then against a [`SymbolTable`] (case-sensitive)
//! - `+ - * /` with the usual precedence, and `( )` for grouping
//!
//! Arithmetic wraps at 64 bits and the final value is truncated to 32 bits.

use std::collections::{BTreeMap, HashMap};
use std::fmt::{self, Display};

mod register;
mod token;

pub use register::{Register, RegisterSnapshot, Registers, CORE_REGISTERS};

use token::{Op, Token};

/// A name → address mapping used to resolve identifiers which aren't
/// registers.
pub trait SymbolTable {
    /// Look up `name`. Matching is case-sensitive.
    fn lookup(&self, name: &str) -> Option<u32>;
}

/// An empty [`SymbolTable`].
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSymbols;

impl SymbolTable for NoSymbols {
    fn lookup(&self, _name: &str) -> Option<u32> {
        None
    }
}

impl SymbolTable for HashMap<String, u32> {
    fn lookup(&self, name: &str) -> Option<u32> {
        self.get(name).copied()
    }
}

impl SymbolTable for BTreeMap<String, u32> {
    fn lookup(&self, name: &str) -> Option<u32> {
        self.get(name).copied()
    }
}

/// An error which may occur while evaluating an expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvalError {
    /// Nothing but whitespace.
    Empty,
    /// A character which cannot start any token.
    UnexpectedChar(char),
    /// An identifier matching neither a register nor a symbol.
    UnknownSymbol(String),
    /// `$` without any hex digits after it.
    MissingHexDigits,
    /// A literal which doesn't fit in 64 bits.
    LiteralOverflow,
    /// An operator without enough operands.
    MissingOperand,
    /// Unmatched `(` or `)`.
    UnbalancedParens,
    /// Two operands without an operator between them.
    TrailingOperand,
    DivideByZero,
}

impl Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use self::EvalError::*;
        match self {
            Empty => write!(f, "empty expression"),
            UnexpectedChar(c) => write!(f, "unexpected character {:?}", c),
            UnknownSymbol(name) => write!(f, "unknown symbol `{}`", name),
            MissingHexDigits => write!(f, "`$` must be followed by hex digits"),
            LiteralOverflow => write!(f, "numeric literal too large"),
            MissingOperand => write!(f, "operator is missing an operand"),
            UnbalancedParens => write!(f, "unbalanced parentheses"),
            TrailingOperand => write!(f, "operand without an operator"),
            DivideByZero => write!(f, "division by zero"),
        }
    }
}

impl std::error::Error for EvalError {}

enum Pending {
    Op(Op),
    LeftParen,
}

fn reduce(values: &mut Vec<u64>, op: Op) -> Result<(), EvalError> {
    let rhs = values.pop().ok_or(EvalError::MissingOperand)?;
    let lhs = values.pop().ok_or(EvalError::MissingOperand)?;
    values.push(op.apply(lhs, rhs)?);
    Ok(())
}

/// Evaluate `text`, resolving identifiers against `regs` and `symbols`.
pub fn evaluate(
    text: &str,
    symbols: &dyn SymbolTable,
    regs: &dyn RegisterSnapshot,
) -> Result<u32, EvalError> {
    let tokens = token::tokenize(text, symbols, regs)?;
    if tokens.is_empty() {
        return Err(EvalError::Empty);
    }

    let mut values: Vec<u64> = Vec::new();
    let mut ops: Vec<Pending> = Vec::new();

    for token in tokens {
        match token {
            Token::Constant(val) => values.push(val),
            Token::LeftParen => ops.push(Pending::LeftParen),
            Token::RightParen => loop {
                match ops.pop() {
                    Some(Pending::Op(op)) => reduce(&mut values, op)?,
                    Some(Pending::LeftParen) => break,
                    None => return Err(EvalError::UnbalancedParens),
                }
            },
            Token::Op(op) => {
                while let Some(Pending::Op(top)) = ops.last() {
                    if top.precedence() < op.precedence() {
                        break;
                    }
                    let top = *top;
                    ops.pop();
                    reduce(&mut values, top)?;
                }
                ops.push(Pending::Op(op));
            }
        }
    }

    while let Some(pending) = ops.pop() {
        match pending {
            Pending::Op(op) => reduce(&mut values, op)?,
            Pending::LeftParen => return Err(EvalError::UnbalancedParens),
        }
    }

    match values.as_slice() {
        [val] => Ok(*val as u32),
        [] => Err(EvalError::MissingOperand),
        _ => Err(EvalError::TrailingOperand),
    }
}
