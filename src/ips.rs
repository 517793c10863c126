// IPS patch codec.
//
// Layout: "PATCH", then records, then "EOF" optionally followed by a 3-byte
// big-endian target size.
//
//   record = address:u24be length:u16be data[length]          (copy)
//          | address:u24be 0x0000 count:u16be value:u8          (RLE)
//
// Application runs in two passes over the same `Records` iterator: the first
// sizes the target without writing, the second allocates it once and writes.
// The target never grows while records are being applied.

use log::{debug, trace};

use crate::error::{PatchDefect, PatchError, Result};
use crate::format::PatchFormat;

/// IPS magic.
pub const MAGIC: &[u8] = b"PATCH";

/// Magic plus a bare `EOF` terminator.
pub const MIN_PATCH_LEN: usize = 8;

/// The address value that doubles as the terminator ("EOF").
pub const EOF_ADDRESS: usize = 0x45_4F_46;

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// One decoded IPS instruction, borrowing its payload from the patch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Record<'a> {
    /// Write `data` starting at `address`.
    Copy { address: usize, data: &'a [u8] },
    /// Write `value` `len` times starting at `address`.
    Rle {
        address: usize,
        len: usize,
        value: u8,
    },
    /// Terminator, with the optional explicit target size.
    End { truncate: Option<usize> },
}

impl Record<'_> {
    /// One past the last address a data record writes; `None` for `End`.
    pub fn end(&self) -> Option<usize> {
        match *self {
            Record::Copy { address, data } => Some(address + data.len()),
            Record::Rle { address, len, .. } => Some(address + len),
            Record::End { .. } => None,
        }
    }
}

/// Iterator over the records of an IPS patch.
///
/// Yields data records, then exactly one of `Ok(Record::End { .. })` or an
/// error, then `None`.
#[derive(Debug, Clone)]
pub struct Records<'a> {
    patch: &'a [u8],
    offset: usize,
    finished: bool,
}

impl<'a> Records<'a> {
    fn new(patch: &'a [u8]) -> Self {
        Self {
            patch,
            offset: MAGIC.len(),
            finished: false,
        }
    }

    /// Current read position in the patch.
    pub fn offset(&self) -> usize {
        self.offset
    }

    fn remaining(&self) -> usize {
        self.patch.len() - self.offset
    }

    fn take(&mut self, n: usize) -> Option<&'a [u8]> {
        let bytes = self.patch.get(self.offset..self.offset.checked_add(n)?)?;
        self.offset += n;
        Some(bytes)
    }

    fn read_u16(&mut self) -> Option<usize> {
        self.take(2)
            .map(|b| usize::from(u16::from_be_bytes([b[0], b[1]])))
    }

    fn read_u24(&mut self) -> Option<usize> {
        self.take(3)
            .map(|b| (usize::from(b[0]) << 16) | (usize::from(b[1]) << 8) | usize::from(b[2]))
    }

    fn next_record(&mut self) -> Result<Record<'a>> {
        let start = self.offset;
        let truncated = || PatchError::invalid_patch(start, PatchDefect::TruncatedRecord);

        if self.remaining() == 0 {
            return Err(PatchError::invalid_patch(
                start,
                PatchDefect::MissingTerminator,
            ));
        }
        let address = self.read_u24().ok_or_else(truncated)?;

        // "EOF" is only a terminator in final position; anywhere else it is
        // an ordinary record address.
        if address == EOF_ADDRESS {
            match self.remaining() {
                0 => return Ok(Record::End { truncate: None }),
                3 => {
                    let size = self.read_u24().ok_or_else(truncated)?;
                    return Ok(Record::End {
                        truncate: Some(size),
                    });
                }
                _ => {}
            }
        }

        let length = self.read_u16().ok_or_else(truncated)?;
        if length > 0 {
            let data = self.take(length).ok_or_else(truncated)?;
            return Ok(Record::Copy { address, data });
        }

        if self.remaining() < 3 {
            return Err(truncated());
        }
        let len = self.read_u16().ok_or_else(truncated)?;
        if len == 0 {
            return Err(PatchError::invalid_patch(start, PatchDefect::ZeroLengthRun));
        }
        let value = self.take(1).ok_or_else(truncated)?[0];
        Ok(Record::Rle {
            address,
            len,
            value,
        })
    }
}

impl<'a> Iterator for Records<'a> {
    type Item = Result<Record<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let record = self.next_record();
        if !matches!(
            record,
            Ok(Record::Copy { .. } | Record::Rle { .. })
        ) {
            self.finished = true;
        }
        Some(record)
    }
}

/// Validate the patch size and header, then iterate its records.
pub fn records(patch: &[u8]) -> Result<Records<'_>> {
    if patch.len() < MIN_PATCH_LEN {
        return Err(PatchError::PatchTooSmall {
            format: PatchFormat::Ips,
            minimum: MIN_PATCH_LEN,
            actual: patch.len(),
        });
    }
    if !patch.starts_with(MAGIC) {
        return Err(PatchError::InvalidPatchHeader {
            format: PatchFormat::Ips,
        });
    }
    Ok(Records::new(patch))
}

// ---------------------------------------------------------------------------
// Pass 1: sizing
// ---------------------------------------------------------------------------

/// Result of the sizing pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Plan {
    /// Exact length of the target buffer.
    pub target_len: usize,
    /// Number of data records before the terminator.
    pub records: usize,
    /// Explicit target size from the terminator, if present.
    pub truncate: Option<usize>,
}

/// Walk every record without writing and compute the target size.
///
/// The target is at least as long as the source and grows to cover the
/// highest address any record touches, unless the terminator overrides it.
pub fn plan(patch: &[u8], source_len: usize) -> Result<Plan> {
    let mut target_len = source_len;
    let mut count = 0;

    for record in records(patch)? {
        let record = record?;
        if let Record::End { truncate } = record {
            return Ok(Plan {
                target_len: truncate.unwrap_or(target_len),
                records: count,
                truncate,
            });
        }
        if let Some(end) = record.end() {
            target_len = target_len.max(end);
        }
        count += 1;
    }

    Err(PatchError::invalid_patch(
        patch.len(),
        PatchDefect::MissingTerminator,
    ))
}

// ---------------------------------------------------------------------------
// Pass 2: application
// ---------------------------------------------------------------------------

/// The part of `target` covering `address..address + len`, clipped to its end.
///
/// Clipping only bites when the terminator truncates the target below a
/// record's reach.
fn span(target: &mut [u8], address: usize, len: usize) -> &mut [u8] {
    let start = address.min(target.len());
    let end = address.saturating_add(len).min(target.len());
    &mut target[start..end]
}

/// Apply an IPS patch to `source`, returning the reconstructed target.
///
/// Bytes past the end of the source that no record writes are zero.
pub fn apply(patch: &[u8], source: &[u8]) -> Result<Vec<u8>> {
    let plan = plan(patch, source.len())?;
    debug!(
        "IPS: {} records, {} -> {} bytes{}",
        plan.records,
        source.len(),
        plan.target_len,
        if plan.truncate.is_some() { " (explicit size)" } else { "" }
    );

    let mut target = vec![0u8; plan.target_len];
    let prefix = source.len().min(target.len());
    target[..prefix].copy_from_slice(&source[..prefix]);

    let mut applied = 0;
    for record in records(patch)? {
        match record? {
            Record::Copy { address, data } => {
                trace!("IPS copy: {} bytes at {address:#08x}", data.len());
                let dst = span(&mut target, address, data.len());
                let n = dst.len();
                dst.copy_from_slice(&data[..n]);
            }
            Record::Rle {
                address,
                len,
                value,
            } => {
                trace!("IPS rle: {len} x {value:#04x} at {address:#08x}");
                span(&mut target, address, len).fill(value);
            }
            Record::End { .. } => break,
        }
        applied += 1;
    }

    assert_eq!(
        applied, plan.records,
        "IPS sizing and write passes decoded different record counts"
    );
    Ok(target)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
