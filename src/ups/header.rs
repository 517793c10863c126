// UPS header and trailer.
//
//   "UPS1" source_len:varint target_len:varint body...
//   source_crc:u32le target_crc:u32le patch_crc:u32le

use crate::error::{PatchError, Result, SourceMismatch};
use crate::format::PatchFormat;

use super::varint;
use super::{MAGIC, MIN_PATCH_LEN, TRAILER_LEN};

/// Which way a patch is being applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Source in, target out.
    Forward,
    /// Target in, source out.
    Reverse,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Forward => "forward",
            Self::Reverse => "reverse",
        })
    }
}

/// Fixed fields of a UPS patch, read without applying it.
///
/// The stored checksums are reported as found; nothing here is verified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub source_len: u64,
    pub target_len: u64,
    pub source_crc: u32,
    pub target_crc: u32,
    pub patch_crc: u32,
    /// Offset of the first record.
    pub body_offset: usize,
}

impl Header {
    /// Check size and magic, then read the declared lengths and the trailer.
    pub fn parse(patch: &[u8]) -> Result<Self> {
        if patch.len() < MIN_PATCH_LEN {
            return Err(PatchError::PatchTooSmall {
                format: PatchFormat::Ups,
                minimum: MIN_PATCH_LEN,
                actual: patch.len(),
            });
        }
        if !patch.starts_with(MAGIC) {
            return Err(PatchError::InvalidPatchHeader {
                format: PatchFormat::Ups,
            });
        }

        let mut offset = MAGIC.len();
        let next_len = |offset: &mut usize| {
            let (value, used) = varint::decode(&patch[*offset..])
                .map_err(|e| PatchError::invalid_patch(*offset, e.into()))?;
            *offset += used;
            Ok::<_, PatchError>(value)
        };
        let source_len = next_len(&mut offset)?;
        let target_len = next_len(&mut offset)?;

        let trailer = &patch[patch.len() - TRAILER_LEN..];
        let word = |i: usize| {
            u32::from_le_bytes([trailer[i], trailer[i + 1], trailer[i + 2], trailer[i + 3]])
        };

        Ok(Self {
            source_len,
            target_len,
            source_crc: word(0),
            target_crc: word(4),
            patch_crc: word(8),
            body_offset: offset,
        })
    }

    /// Pick the direction from the length of the buffer being patched.
    ///
    /// When both declared lengths are equal the patch is taken as forward;
    /// checksum verification still accepts a reverse application then.
    pub fn direction(&self, input_len: usize) -> Result<Direction> {
        let len = input_len as u64;
        if len == self.source_len {
            Ok(Direction::Forward)
        } else if len == self.target_len {
            Ok(Direction::Reverse)
        } else {
            Err(PatchError::InvalidSource {
                mismatch: SourceMismatch::Length {
                    actual: input_len,
                    source_len: self.source_len,
                    target_len: self.target_len,
                },
            })
        }
    }

    /// Declared length of the output for `direction`.
    pub fn output_len(&self, direction: Direction) -> u64 {
        match direction {
            Direction::Forward => self.target_len,
            Direction::Reverse => self.source_len,
        }
    }
}
