use super::{EvalError, RegisterSnapshot, SymbolTable};
use crate::expr::Register;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Op {
    Add,
    Sub,
    Mul,
    Div,
}

impl Op {
    pub fn precedence(self) -> u8 {
        match self {
            Op::Add | Op::Sub => 1,
            Op::Mul | Op::Div => 2,
        }
    }

    pub fn apply(self, lhs: u64, rhs: u64) -> Result<u64, EvalError> {
        Ok(match self {
            Op::Add => lhs.wrapping_add(rhs),
            Op::Sub => lhs.wrapping_sub(rhs),
            Op::Mul => lhs.wrapping_mul(rhs),
            Op::Div => lhs.checked_div(rhs).ok_or(EvalError::DivideByZero)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Token {
    Constant(u64),
    Op(Op),
    LeftParen,
    RightParen,
}

fn is_ident_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_'
}

fn is_ident_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_'
}

/// Split `text` into tokens, resolving identifiers to constants as they are
/// encountered.
pub(crate) fn tokenize(
    text: &str,
    symbols: &dyn SymbolTable,
    regs: &dyn RegisterSnapshot,
) -> Result<Vec<Token>, EvalError> {
    let buf = text.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < buf.len() {
        let c = buf[i];
        let token = match c {
            b' ' | b'\t' => {
                i += 1;
                continue;
            }
            b'+' => Token::Op(Op::Add),
            b'-' => Token::Op(Op::Sub),
            b'*' => Token::Op(Op::Mul),
            b'/' => Token::Op(Op::Div),
            b'(' => Token::LeftParen,
            b')' => Token::RightParen,
            b'$' => {
                let start = i + 1;
                let end = start
                    + buf[start..]
                        .iter()
                        .take_while(|c| c.is_ascii_hexdigit())
                        .count();
                if end == start {
                    return Err(EvalError::MissingHexDigits);
                }
                let val = parse_radix(&buf[start..end], 16)?;
                i = end;
                tokens.push(Token::Constant(val));
                continue;
            }
            b'0'..=b'9' => {
                let end = i + buf[i..].iter().take_while(|c| c.is_ascii_digit()).count();
                let val = parse_radix(&buf[i..end], 10)?;
                i = end;
                tokens.push(Token::Constant(val));
                continue;
            }
            c if is_ident_start(c) => {
                let end = i + buf[i..].iter().take_while(|&&c| is_ident_char(c)).count();
                // identifier bytes are ascii, so slicing stays on char boundaries
                let name = &text[i..end];
                let val = match Register::from_name(name) {
                    Some(reg) => regs.get(reg),
                    None => symbols
                        .lookup(name)
                        .ok_or_else(|| EvalError::UnknownSymbol(name.into()))?,
                };
                i = end;
                tokens.push(Token::Constant(val as u64));
                continue;
            }
            _ => {
                let bad = text[i..].chars().next().unwrap_or('\0');
                return Err(EvalError::UnexpectedChar(bad));
            }
        };

        tokens.push(token);
        i += 1;
    }

    Ok(tokens)
}

fn parse_radix(digits: &[u8], radix: u64) -> Result<u64, EvalError> {
    let mut val: u64 = 0;
    for &d in digits {
        let d = (d as char).to_digit(radix as u32).unwrap_or(0) as u64;
        val = val
            .checked_mul(radix)
            .and_then(|v| v.checked_add(d))
            .ok_or(EvalError::LiteralOverflow)?;
    }
    Ok(val)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{NoSymbols, Registers};

    #[test]
    fn literals_and_operators() {
        let regs = Registers::new();
        let tokens = tokenize("$1F + 10*(2)", &NoSymbols, &regs).unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Constant(0x1f),
                Token::Op(Op::Add),
                Token::Constant(10),
                Token::Op(Op::Mul),
                Token::LeftParen,
                Token::Constant(2),
                Token::RightParen,
            ]
        );
    }

    #[test]
    fn bad_input() {
        let regs = Registers::new();
        assert_eq!(
            tokenize("1 % 2", &NoSymbols, &regs),
            Err(EvalError::UnexpectedChar('%'))
        );
        assert_eq!(
            tokenize("$", &NoSymbols, &regs),
            Err(EvalError::MissingHexDigits)
        );
        assert_eq!(
            tokenize("$10000000000000000", &NoSymbols, &regs),
            Err(EvalError::LiteralOverflow)
        );
        assert_eq!(
            tokenize("main", &NoSymbols, &regs),
            Err(EvalError::UnknownSymbol("main".into()))
        );
    }
}
