// Test-only patch builders.
//
// The library only applies patches; these produce valid IPS and UPS patches
// from a (source, target) pair so integration tests can exercise real
// round trips.

#![allow(dead_code)]

use flate2::Crc;
use oxipatch::ups::varint;

pub fn crc32(bytes: &[u8]) -> u32 {
    let mut crc = Crc::new();
    crc.update(bytes);
    crc.sum()
}

/// Deterministic pseudo-random bytes.
pub fn gen_data(size: usize, seed: u64) -> Vec<u8> {
    let mut s = seed;
    let mut out = Vec::with_capacity(size);
    for _ in 0..size {
        s = s.wrapping_mul(6364136223846793005).wrapping_add(1);
        out.push((s >> 33) as u8);
    }
    out
}

/// Bump every `stride`-th byte.
pub fn mutate(base: &[u8], stride: usize) -> Vec<u8> {
    let mut out = base.to_vec();
    for i in (0..out.len()).step_by(stride.max(1)) {
        out[i] = out[i].wrapping_add(1);
    }
    out
}

// ---------------------------------------------------------------------------
// IPS
// ---------------------------------------------------------------------------

pub fn ips_copy(out: &mut Vec<u8>, address: usize, data: &[u8]) {
    out.extend_from_slice(&(address as u32).to_be_bytes()[1..]);
    out.extend_from_slice(&(data.len() as u16).to_be_bytes());
    out.extend_from_slice(data);
}

pub fn ips_rle(out: &mut Vec<u8>, address: usize, len: usize, value: u8) {
    out.extend_from_slice(&(address as u32).to_be_bytes()[1..]);
    out.extend_from_slice(&[0, 0]);
    out.extend_from_slice(&(len as u16).to_be_bytes());
    out.push(value);
}

/// An IPS patch turning `source` into `target`.
///
/// Runs of one repeated byte become RLE records, everything else copy
/// records. An explicit size is appended when the records alone would not
/// produce `target.len()`.
pub fn create_ips(source: &[u8], target: &[u8]) -> Vec<u8> {
    let initial = |i: usize| source.get(i).copied().unwrap_or(0);
    let mut out = b"PATCH".to_vec();
    let mut high_water = source.len();

    let mut i = 0;
    while i < target.len() {
        if target[i] == initial(i) {
            i += 1;
            continue;
        }
        let start = i;
        while i < target.len() && target[i] != initial(i) && i - start < 0xFFFF {
            i += 1;
        }
        let run = &target[start..i];
        if run.len() >= 3 && run.iter().all(|&b| b == run[0]) {
            ips_rle(&mut out, start, run.len(), run[0]);
        } else {
            ips_copy(&mut out, start, run);
        }
        high_water = high_water.max(i);
    }

    out.extend_from_slice(b"EOF");
    if high_water != target.len() {
        out.extend_from_slice(&(target.len() as u32).to_be_bytes()[1..]);
    }
    out
}

// ---------------------------------------------------------------------------
// UPS
// ---------------------------------------------------------------------------

/// Append the three trailing checksums.
pub fn ups_seal(mut patch: Vec<u8>, source: &[u8], target: &[u8]) -> Vec<u8> {
    patch.extend_from_slice(&crc32(source).to_le_bytes());
    patch.extend_from_slice(&crc32(target).to_le_bytes());
    let patch_crc = crc32(&patch);
    patch.extend_from_slice(&patch_crc.to_le_bytes());
    patch
}

/// Recompute the patch self-checksum after editing a patch in place.
pub fn ups_reseal(patch: &mut [u8]) {
    let n = patch.len() - 4;
    let crc = crc32(&patch[..n]);
    patch[n..].copy_from_slice(&crc.to_le_bytes());
}

/// A UPS patch turning `source` into `target` (and back).
pub fn create_ups(source: &[u8], target: &[u8]) -> Vec<u8> {
    let byte = |buf: &[u8], i: usize| buf.get(i).copied().unwrap_or(0);
    let mut out = b"UPS1".to_vec();
    varint::encode(source.len() as u64, &mut out);
    varint::encode(target.len() as u64, &mut out);

    let end = source.len().max(target.len());
    let mut pos = 0;
    let mut last = 0;
    while pos < end {
        if byte(source, pos) == byte(target, pos) {
            pos += 1;
            continue;
        }
        varint::encode((pos - last) as u64, &mut out);
        loop {
            let x = byte(source, pos);
            let y = byte(target, pos);
            pos += 1;
            out.push(x ^ y);
            if x == y {
                break;
            }
        }
        last = pos;
    }

    ups_seal(out, source, target)
}
