//! The 3→4 packing used to stream memory contents.
//!
//! Each group of 3 source bytes is read as a 24 bit big-endian value, split
//! into four 6 bit fields, and each field is offset by 32 so every output
//! character lands in the printable range `32..=95`. A short final group is
//! padded with zero bytes, so the output is always a multiple of 4
//! characters.

/// Offset added to every 6 bit field.
pub const CHAR_BASE: u8 = 32;

/// Number of packed characters streamed per socket write.
pub const BLOCK_CHARS: usize = 2048 * 4;

/// Number of packed characters needed for `len` source bytes.
pub fn encoded_len(len: usize) -> usize {
    (len + 2) / 3 * 4
}

/// Pack one group of 3 bytes.
pub fn pack_group(group: [u8; 3]) -> [u8; 4] {
    let accum = (group[0] as u32) << 16 | (group[1] as u32) << 8 | group[2] as u32;
    [
        CHAR_BASE + ((accum >> 18) & 0x3f) as u8,
        CHAR_BASE + ((accum >> 12) & 0x3f) as u8,
        CHAR_BASE + ((accum >> 6) & 0x3f) as u8,
        CHAR_BASE + (accum & 0x3f) as u8,
    ]
}

/// Pack `data`, appending the characters to `out`.
pub fn encode_into(data: &[u8], out: &mut Vec<u8>) {
    out.reserve(encoded_len(data.len()));
    for chunk in data.chunks(3) {
        let mut group = [0; 3];
        group[..chunk.len()].copy_from_slice(chunk);
        out.extend_from_slice(&pack_group(group));
    }
}

pub fn encode(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    encode_into(data, &mut out);
    out
}

/// An error which may occur while unpacking memory contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Fewer characters than needed for the expected byte count.
    Truncated,
    /// A character outside `32..=95`.
    BadChar(u8),
}

/// Unpack `chars`, keeping the first `size` bytes and discarding the
/// padding of the final group.
pub fn decode(chars: &[u8], size: usize) -> Result<Vec<u8>, DecodeError> {
    if chars.len() < encoded_len(size) {
        return Err(DecodeError::Truncated);
    }

    let mut out = Vec::with_capacity(size + 2);
    for quad in chars[..encoded_len(size)].chunks_exact(4) {
        let mut accum = 0u32;
        for &c in quad {
            let field = c.wrapping_sub(CHAR_BASE);
            if field > 0x3f {
                return Err(DecodeError::BadChar(c));
            }
            accum = accum << 6 | field as u32;
        }
        out.extend_from_slice(&[(accum >> 16) as u8, (accum >> 8) as u8, accum as u8]);
    }

    out.truncate(size);
    Ok(out)
}
