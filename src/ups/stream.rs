// Checksummed cursors over the three UPS streams.
//
// Every byte read from the patch or source, and every byte written to the
// target, feeds that stream's own running CRC-32. Bytes beyond the end of a
// buffer are never hashed: reads there yield nothing, writes there are
// dropped. The bulk helpers behave exactly like repeated single-byte calls.

use flate2::Crc;

use super::varint::{self, VarIntError};

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

/// Forward-only read cursor with a rolling CRC-32.
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
    crc: Crc,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            crc: Crc::new(),
        }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// CRC-32 of every byte read so far.
    pub fn checksum(&self) -> u32 {
        self.crc.sum()
    }

    /// Next byte, or `None` at the end of the buffer.
    pub fn read_byte(&mut self) -> Option<u8> {
        let byte = *self.data.get(self.pos)?;
        self.pos += 1;
        self.crc.update(&[byte]);
        Some(byte)
    }

    /// Next byte, or zero at the end of the buffer.
    pub fn read_byte_or_zero(&mut self) -> u8 {
        self.read_byte().unwrap_or(0)
    }

    /// Up to `n` bytes, fewer if the buffer ends first.
    pub fn read_slice(&mut self, n: usize) -> &'a [u8] {
        let n = n.min(self.remaining());
        let bytes = &self.data[self.pos..self.pos + n];
        self.pos += n;
        self.crc.update(bytes);
        bytes
    }

    /// Everything not yet read.
    pub fn read_rest(&mut self) -> &'a [u8] {
        self.read_slice(self.remaining())
    }

    /// Little-endian `u32`, or `None` if fewer than four bytes remain.
    pub fn read_u32_le(&mut self) -> Option<u32> {
        if self.remaining() < 4 {
            return None;
        }
        let b = self.read_slice(4);
        Some(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// One UPS varint.
    pub fn read_varint(&mut self) -> Result<u64, VarIntError> {
        varint::decode_from(std::iter::from_fn(|| self.read_byte())).map(|(value, _)| value)
    }
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

/// Write cursor over a fixed-size, zero-initialised buffer with a rolling
/// CRC-32. The buffer never grows.
pub struct Writer {
    data: Vec<u8>,
    pos: usize,
    crc: Crc,
}

impl Writer {
    pub fn new(len: usize) -> Self {
        Self {
            data: vec![0; len],
            pos: 0,
            crc: Crc::new(),
        }
    }

    /// Logical write position; may run past `len()`.
    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Bytes left before the end of the buffer.
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    /// CRC-32 of every byte stored so far.
    pub fn checksum(&self) -> u32 {
        self.crc.sum()
    }

    pub fn write_byte(&mut self, byte: u8) {
        if let Some(slot) = self.data.get_mut(self.pos) {
            *slot = byte;
            self.crc.update(&[byte]);
        }
        self.pos = self.pos.saturating_add(1);
    }

    pub fn write_slice(&mut self, bytes: &[u8]) {
        let n = bytes.len().min(self.remaining());
        if n > 0 {
            self.data[self.pos..self.pos + n].copy_from_slice(&bytes[..n]);
            self.crc.update(&bytes[..n]);
        }
        self.pos = self.pos.saturating_add(bytes.len());
    }

    /// Write `n` zero bytes. The buffer is already zeroed, so only the
    /// checksum and position move.
    pub fn write_zeros(&mut self, n: usize) {
        const ZEROS: [u8; 256] = [0; 256];
        let mut left = n.min(self.remaining());
        while left > 0 {
            let chunk = left.min(ZEROS.len());
            self.crc.update(&ZEROS[..chunk]);
            left -= chunk;
        }
        self.pos = self.pos.saturating_add(n);
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }
}
