//! Oxipatch: IPS and UPS binary patch application.
//!
//! The crate provides:
//! - An IPS codec (`ips`): two-pass copy/RLE record application
//! - A UPS codec (`ups`): XOR-run records with CRC-32 self-verification,
//!   applicable in either direction
//! - Format selection by extension or magic (`format`)
//! - File-oriented helpers and soft-patching (`io`)
//! - An optional CLI (`cli` feature)
//!
//! Both codecs are pure functions of `(patch, source)`: they never touch the
//! filesystem and never log errors, they return them.
//!
//! # Quick Start
//!
//! ```
//! use oxipatch::PatchFormat;
//!
//! // Write 0xFF at offset 1, growing a one-byte source.
//! let patch = b"PATCH\x00\x00\x01\x00\x01\xFFEOF";
//! let target = oxipatch::apply(PatchFormat::Ips, patch, &[0x00]).unwrap();
//! assert_eq!(target, [0x00, 0xFF]);
//! ```

pub mod error;
pub mod format;
pub mod io;
pub mod ips;
pub mod ups;

#[cfg(feature = "cli")]
pub mod cli;

pub use error::{ErrorKind, PatchDefect, PatchError, SourceMismatch};
pub use format::PatchFormat;

/// Apply `patch` to `source` using `format`'s codec.
pub fn apply(format: PatchFormat, patch: &[u8], source: &[u8]) -> error::Result<Vec<u8>> {
    format.apply(patch, source)
}

/// Apply `patch` to `source`, identifying the format by its magic bytes.
///
/// Patches with no known magic are handed to the IPS codec, which rejects them.
pub fn apply_detected(patch: &[u8], source: &[u8]) -> error::Result<Vec<u8>> {
    PatchFormat::detect(patch)
        .unwrap_or(PatchFormat::Ips)
        .apply(patch, source)
}
