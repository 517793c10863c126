// UPS patch codec.
//
// A UPS body is a sequence of records, each a skip length followed by an
// XOR run:
//
//   record = skip:varint xor:u8* 0x00
//
// `skip` bytes are copied unchanged from source to target, then each XOR
// byte is combined with the next source byte. The closing 0x00 also writes
// one (unchanged) byte. Whatever the records leave untouched is copied from
// the rest of the source, then zero-filled up to the declared length.
//
// Patch, source and target each keep a rolling CRC-32 (see `stream`), checked
// against the trailer once the body is applied. XOR is its own inverse, so
// the same patch also turns the target back into the source.
//
// # Modules
//
// - `varint` - UPS variable-length integers
// - `stream` - checksummed read/write cursors
// - `header` - declared lengths, trailer, direction

pub mod header;
pub mod stream;
pub mod varint;

pub use header::{Direction, Header};

use log::{debug, trace};

use crate::error::{PatchDefect, PatchError, Result, SourceMismatch};

use self::stream::{Reader, Writer};

/// UPS magic.
pub const MAGIC: &[u8] = b"UPS1";

/// Size of the three trailing CRC-32 fields.
pub const TRAILER_LEN: usize = 12;

/// Magic, two one-byte lengths and the trailer.
pub const MIN_PATCH_LEN: usize = 18;

/// Apply a UPS patch to `source`, in whichever direction its length selects.
///
/// The result is returned only if the patch, source and target checksums all
/// verify.
pub fn apply(patch: &[u8], source: &[u8]) -> Result<Vec<u8>> {
    let header = Header::parse(patch)?;
    let direction = header.direction(source.len())?;
    let declared = header.output_len(direction);
    let output_len = usize::try_from(declared).map_err(|_| {
        PatchError::invalid_patch(MAGIC.len(), PatchDefect::LengthOverflow(declared))
    })?;
    debug!("UPS: {direction}, {} -> {output_len} bytes", source.len());

    let mut patch_in = Reader::new(patch);
    let mut source_in = Reader::new(source);
    let mut target = Writer::new(output_len);

    // Header bytes count toward the patch checksum.
    patch_in.read_slice(header.body_offset);

    let body_end = patch.len() - TRAILER_LEN;
    let mut records = 0usize;
    while patch_in.pos() < body_end {
        let at = patch_in.pos();
        let skip = patch_in
            .read_varint()
            .map_err(|e| PatchError::invalid_patch(at, e.into()))?;
        copy_unchanged(&mut source_in, &mut target, skip);

        let mut run = 0usize;
        loop {
            let at = patch_in.pos();
            let xor = patch_in
                .read_byte()
                .ok_or_else(|| PatchError::invalid_patch(at, PatchDefect::UnexpectedEnd))?;
            target.write_byte(xor ^ source_in.read_byte_or_zero());
            run += 1;
            if xor == 0 {
                break;
            }
        }
        trace!("UPS record: skip {skip}, xor run {run}");
        records += 1;
    }

    // Tail: rest of the source, then zeros.
    let rest = source_in.read_rest();
    target.write_slice(rest);
    target.write_zeros(target.remaining());
    debug!("UPS: {records} records applied");

    verify(&mut patch_in, &source_in, &target, &header)?;
    Ok(target.into_inner())
}

/// Copy `n` bytes from source to target as if by `n` single-byte moves;
/// past the end of the source the moved bytes are zero.
fn copy_unchanged(source: &mut Reader<'_>, target: &mut Writer, n: u64) {
    let n = usize::try_from(n).unwrap_or(usize::MAX);
    let bytes = source.read_slice(n);
    target.write_slice(bytes);
    target.write_zeros(n - bytes.len());
}

/// Read the trailer and check all three checksums.
fn verify(
    patch: &mut Reader<'_>,
    source: &Reader<'_>,
    target: &Writer,
    header: &Header,
) -> Result<()> {
    let patch_len = patch.len();
    let end = || PatchError::invalid_patch(patch_len, PatchDefect::UnexpectedEnd);
    let source_crc = patch.read_u32_le().ok_or_else(end)?;
    let target_crc = patch.read_u32_le().ok_or_else(end)?;
    let patch_actual = patch.checksum();
    let at = patch.pos();
    let patch_crc = patch.read_u32_le().ok_or_else(end)?;

    if patch_actual != patch_crc {
        return Err(PatchError::invalid_patch(
            at,
            PatchDefect::ChecksumMismatch {
                expected: patch_crc,
                actual: patch_actual,
            },
        ));
    }

    let source_actual = source.checksum();
    let target_actual = target.checksum();
    let source_len = source.len() as u64;
    let target_len = target.len() as u64;

    let (expected, expected_len) =
        if source_actual == source_crc && source_len == header.source_len {
            (target_crc, header.target_len)
        } else if source_actual == target_crc && source_len == header.target_len {
            (source_crc, header.source_len)
        } else {
            return Err(PatchError::InvalidSource {
                mismatch: SourceMismatch::Checksum {
                    actual: source_actual,
                    source_crc,
                    target_crc,
                },
            });
        };

    if target_actual != expected || target_len != expected_len {
        return Err(PatchError::InvalidTarget {
            expected,
            actual: target_actual,
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
