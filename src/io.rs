// File-level helpers for applying patches.
//
// Patch and source are read fully into memory (both codecs need the whole
// buffer), checked against configurable size limits, dispatched on the patch
// extension or magic, and the result is written through a `BufWriter`.
// Optionally computes a SHA-256 of the output (feature-gated behind
// `file-io`).
//
// Also provides soft-patching: finding a `.ups`/`.ips` file next to a ROM
// and applying it in memory without touching the ROM on disk.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use log::{debug, info};
use thiserror::Error;

use crate::error::PatchError;
use crate::format::PatchFormat;
use crate::{ips, ups};

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Limits and overrides for file-level patching.
#[derive(Debug, Clone)]
pub struct ApplyOptions {
    /// Force a format instead of using the extension or magic.
    pub format: Option<PatchFormat>,
    /// Largest patch file accepted, in bytes.
    pub max_patch_size: u64,
    /// Largest source file accepted, in bytes.
    pub max_source_size: u64,
    /// Largest output the patch may declare or grow to, in bytes.
    pub max_output_size: u64,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self {
            format: None,
            max_patch_size: 16 << 20,   // 16 MiB
            max_source_size: 512 << 20, // 512 MiB
            max_output_size: 512 << 20, // 512 MiB
        }
    }
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Statistics returned by `apply_file()`.
#[derive(Debug, Clone)]
pub struct ApplyStats {
    /// Format the patch was applied as.
    pub format: PatchFormat,
    /// Patch file size in bytes.
    pub patch_size: u64,
    /// Source file size in bytes.
    pub source_size: u64,
    /// Reconstructed output size in bytes.
    pub output_size: u64,
    /// SHA-256 of the output (if `file-io` feature is enabled).
    pub output_sha256: Option<[u8; 32]>,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Error type for file-level operations.
#[derive(Debug, Error)]
pub enum IoError {
    /// I/O error (file open, read, write).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// The patch itself failed to apply.
    #[error("patch error: {0}")]
    Patch(#[from] PatchError),
    /// Neither the extension nor the contents identify the patch format.
    #[error("unknown patch format: {}", .0.display())]
    UnknownFormat(PathBuf),
    /// An input, or the output the patch declares, exceeds its limit.
    #[error("{what} is {size} bytes, limit is {limit}")]
    TooLarge {
        what: &'static str,
        size: u64,
        limit: u64,
    },
}

// ---------------------------------------------------------------------------
// Default buffer size
// ---------------------------------------------------------------------------

const BUF_SIZE: usize = 64 * 1024; // 64 KiB

// ---------------------------------------------------------------------------
// In-memory application with limits
// ---------------------------------------------------------------------------

fn check_limit(what: &'static str, size: u64, limit: u64) -> Result<(), IoError> {
    if size > limit {
        return Err(IoError::TooLarge { what, size, limit });
    }
    Ok(())
}

/// Size of the output `patch` would produce from a `source_len`-byte source,
/// computed without allocating it.
pub fn planned_output_len(
    format: PatchFormat,
    patch: &[u8],
    source_len: usize,
) -> Result<u64, PatchError> {
    match format {
        PatchFormat::Ips => Ok(ips::plan(patch, source_len)?.target_len as u64),
        PatchFormat::Ups => {
            let header = ups::Header::parse(patch)?;
            Ok(header.output_len(header.direction(source_len)?))
        }
    }
}

/// Apply `patch` to `source` after checking them, and the declared output
/// size, against `opts`.
pub fn apply_bytes(
    format: PatchFormat,
    patch: &[u8],
    source: &[u8],
    opts: &ApplyOptions,
) -> Result<Vec<u8>, IoError> {
    check_limit("patch", patch.len() as u64, opts.max_patch_size)?;
    check_limit("source", source.len() as u64, opts.max_source_size)?;
    let output_len = planned_output_len(format, patch, source.len())?;
    check_limit("output", output_len, opts.max_output_size)?;

    Ok(format.apply(patch, source)?)
}

/// Pick the format for `patch`: explicit override, then extension, then magic.
pub fn resolve_format(
    patch_path: &Path,
    patch: &[u8],
    opts: &ApplyOptions,
) -> Result<PatchFormat, IoError> {
    opts.format
        .or_else(|| PatchFormat::from_path(patch_path))
        .or_else(|| PatchFormat::detect(patch))
        .ok_or_else(|| IoError::UnknownFormat(patch_path.to_path_buf()))
}

/// Read a whole file, refusing it up front if it exceeds `limit`.
pub fn read_limited(path: &Path, what: &'static str, limit: u64) -> Result<Vec<u8>, IoError> {
    let size = std::fs::metadata(path)?.len();
    check_limit(what, size, limit)?;
    Ok(std::fs::read(path)?)
}

// ---------------------------------------------------------------------------
// apply_file
// ---------------------------------------------------------------------------

/// Apply the patch at `patch_path` to the file at `source_path`, writing the
/// result to `output_path`.
///
/// Nothing is created at `output_path` unless the patch applies cleanly.
/// When the `file-io` feature is enabled, a SHA-256 checksum of the output
/// is computed as it is written.
pub fn apply_file(
    patch_path: &Path,
    source_path: &Path,
    output_path: &Path,
    opts: &ApplyOptions,
) -> Result<ApplyStats, IoError> {
    let patch = read_limited(patch_path, "patch", opts.max_patch_size)?;
    let source = read_limited(source_path, "source", opts.max_source_size)?;
    let format = resolve_format(patch_path, &patch, opts)?;
    debug!(
        "applying {format} patch {} to {}",
        patch_path.display(),
        source_path.display()
    );

    let target = apply_bytes(format, &patch, &source, opts)?;

    let mut output_writer = BufWriter::with_capacity(BUF_SIZE, File::create(output_path)?);

    #[cfg(feature = "file-io")]
    let output_sha256 = {
        let mut output_hasher = <sha2::Sha256 as sha2::Digest>::new();
        let mut hashing_writer = HashingWriter {
            inner: &mut output_writer,
            hasher: &mut output_hasher,
        };
        hashing_writer.write_all(&target)?;
        Some(sha2::Digest::finalize(output_hasher).into())
    };

    #[cfg(not(feature = "file-io"))]
    let output_sha256: Option<[u8; 32]> = {
        output_writer.write_all(&target)?;
        None
    };

    output_writer.flush()?;

    Ok(ApplyStats {
        format,
        patch_size: patch.len() as u64,
        source_size: source.len() as u64,
        output_size: target.len() as u64,
        output_sha256,
    })
}

// ---------------------------------------------------------------------------
// Soft-patching
// ---------------------------------------------------------------------------

/// Find a patch next to `rom_path` with the same stem (`game.ups`, then
/// `game.ips` for `game.sfc`).
pub fn find_patch(rom_path: &Path) -> Option<(PathBuf, PatchFormat)> {
    PatchFormat::ALL.into_iter().find_map(|format| {
        let candidate = rom_path.with_extension(format.extension());
        (candidate != rom_path && candidate.is_file()).then_some((candidate, format))
    })
}

/// Patch a ROM in memory if a sibling patch exists.
///
/// Returns `Ok(None)` when there is no patch to apply. The ROM file on disk
/// is never modified.
pub fn soft_patch(
    rom_path: &Path,
    rom: &[u8],
    opts: &ApplyOptions,
) -> Result<Option<(PatchFormat, Vec<u8>)>, IoError> {
    let Some((patch_path, format)) = find_patch(rom_path) else {
        return Ok(None);
    };
    info!("soft-patching {} with {}", rom_path.display(), patch_path.display());

    let patch = read_limited(&patch_path, "patch", opts.max_patch_size)?;
    let format = opts.format.unwrap_or(format);
    let target = apply_bytes(format, &patch, rom, opts)?;
    Ok(Some((format, target)))
}

// ---------------------------------------------------------------------------
// Hashing writer (used with file-io feature)
// ---------------------------------------------------------------------------

#[cfg(feature = "file-io")]
struct HashingWriter<'a, W: Write> {
    inner: &'a mut W,
    hasher: &'a mut sha2::Sha256,
}

#[cfg(feature = "file-io")]
impl<W: Write> Write for HashingWriter<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        use sha2::Digest;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
