// UPS variable-length integer encoding.
//
// Little-endian 7-bit groups. Unlike VCDIFF, the high bit marks the FINAL
// byte. After every non-final byte the next group's weight is added to the
// value, which makes each integer's encoding unique: `0x80` is 0, `0x00 0x80`
// is 128, and there is no way to spell 0 in two bytes.

/// Longest encoding of a `u64`.
pub const MAX_VARINT_LEN: usize = 10;

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Append the encoding of `value` to `out`. Returns the number of bytes written.
pub fn encode(mut value: u64, out: &mut Vec<u8>) -> usize {
    let start = out.len();
    loop {
        let group = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            out.push(group | 0x80);
            break;
        }
        out.push(group);
        value -= 1;
    }
    out.len() - start
}

/// Encoded byte-length of `value`.
pub fn encoded_len(value: u64) -> usize {
    let mut buf = Vec::with_capacity(MAX_VARINT_LEN);
    encode(value, &mut buf)
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Decode one integer from a byte source.
/// Returns `(value, bytes_consumed)`.
pub fn decode_from<I: IntoIterator<Item = u8>>(bytes: I) -> Result<(u64, usize), VarIntError> {
    let mut value: u64 = 0;
    let mut shift: u64 = 1;
    for (i, byte) in bytes.into_iter().enumerate() {
        value = u64::from(byte & 0x7F)
            .checked_mul(shift)
            .and_then(|group| value.checked_add(group))
            .ok_or(VarIntError::Overflow)?;
        if byte & 0x80 != 0 {
            return Ok((value, i + 1));
        }
        shift = shift.checked_mul(0x80).ok_or(VarIntError::Overflow)?;
        value = value.checked_add(shift).ok_or(VarIntError::Overflow)?;
    }
    Err(VarIntError::Underflow)
}

/// Decode one integer from the start of `data`.
pub fn decode(data: &[u8]) -> Result<(u64, usize), VarIntError> {
    decode_from(data.iter().copied())
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum VarIntError {
    /// Input ended before the final byte.
    #[error("varint underflow (truncated input)")]
    Underflow,
    /// Value does not fit in a `u64`.
    #[error("varint overflow")]
    Overflow,
}

impl From<VarIntError> for crate::error::PatchDefect {
    fn from(e: VarIntError) -> Self {
        match e {
            VarIntError::Underflow => Self::UnexpectedEnd,
            VarIntError::Overflow => Self::VarintOverflow,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
