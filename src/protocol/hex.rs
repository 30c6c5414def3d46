use num_traits::{CheckedAdd, CheckedMul, FromPrimitive, Zero};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeHexError {
    NotAscii,
    Empty,
    Overflow,
    InvalidOutput,
}

/// Decode a hex string (as found in response fields) into the specified
/// integer.
pub fn decode_hex<I>(buf: &[u8]) -> Result<I, DecodeHexError>
where
    I: FromPrimitive + Zero + CheckedAdd + CheckedMul,
{
    use DecodeHexError::*;

    let radix = I::from_u8(16).ok_or(InvalidOutput)?;

    if buf.is_empty() {
        return Err(Empty);
    }

    let mut result = I::zero();

    for &digit in buf {
        let x = I::from_u8(read_hex_char(digit).ok_or(NotAscii)?).ok_or(InvalidOutput)?;
        result = result.checked_mul(&radix).ok_or(Overflow)?;
        result = result.checked_add(&x).ok_or(Overflow)?
    }

    Ok(result)
}

/// Value of a single hex digit.
pub fn read_hex_char(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

/// Decode leading pairs of hex digits into bytes, stopping at the first pair
/// which isn't fully made of hex digits.
pub fn decode_hex_pairs(buf: &[u8]) -> Vec<u8> {
    buf.chunks_exact(2)
        .map_while(|pair| Some(read_hex_char(pair[0])? << 4 | read_hex_char(pair[1])?))
        .collect()
}

/// Encode bytes as pairs of uppercase hex digits.
pub fn encode_hex(data: &[u8]) -> String {
    use std::fmt::Write;

    let mut s = String::with_capacity(data.len() * 2);
    for b in data {
        let _ = write!(s, "{:02X}", b);
    }
    s
}

/// Parse a leading decimal integer the way C's `atoi` does: leading
/// whitespace and a sign are accepted, parsing stops at the first non-digit,
/// and no digits at all yields zero.
pub fn atoi(s: &str) -> i32 {
    let s = s.trim_start_matches(|c: char| c.is_ascii_whitespace());
    let (neg, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };

    let mut val: i32 = 0;
    for d in digits.bytes().take_while(u8::is_ascii_digit) {
        val = val.wrapping_mul(10).wrapping_add((d - b'0') as i32);
    }

    if neg {
        val.wrapping_neg()
    } else {
        val
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_numbers() {
        assert_eq!(decode_hex::<u32>(b"E00030"), Ok(0xe0_0030));
        assert_eq!(decode_hex::<u32>(b"0"), Ok(0));
        assert_eq!(decode_hex::<u8>(b"100"), Err(DecodeHexError::Overflow));
        assert_eq!(decode_hex::<u32>(b""), Err(DecodeHexError::Empty));
        assert_eq!(decode_hex::<u32>(b"12G"), Err(DecodeHexError::NotAscii));
    }

    #[test]
    fn hex_pairs() {
        assert_eq!(decode_hex_pairs(b"FF41ff61"), vec![0xff, 0x41, 0xff, 0x61]);
        assert_eq!(decode_hex_pairs(b"FF4"), vec![0xff]);
        assert_eq!(decode_hex_pairs(b"FFz1AB"), vec![0xff]);
        assert_eq!(encode_hex(&[0xde, 0xad, 0x01]), "DEAD01");
    }

    #[test]
    fn atoi_semantics() {
        assert_eq!(atoi("1"), 1);
        assert_eq!(atoi("  42abc"), 42);
        assert_eq!(atoi("-3"), -3);
        assert_eq!(atoi("on"), 0);
        assert_eq!(atoi(""), 0);
    }
}
