// Patch format selection and dispatch.
//
// Callers usually pick the format from the patch file's extension; when that
// is unavailable the magic bytes are enough to tell IPS and UPS apart.

use std::path::Path;

use crate::error::Result;
use crate::{ips, ups};

/// A supported patch format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatchFormat {
    /// International Patching System (`PATCH` ... `EOF`).
    Ips,
    /// UPS (`UPS1`), XOR runs with CRC-32 verification.
    Ups,
}

impl PatchFormat {
    /// Every supported format, in soft-patch lookup order.
    pub const ALL: [PatchFormat; 2] = [PatchFormat::Ups, PatchFormat::Ips];

    /// Format magic at the start of the patch.
    pub fn magic(self) -> &'static [u8] {
        match self {
            Self::Ips => ips::MAGIC,
            Self::Ups => ups::MAGIC,
        }
    }

    /// Smallest patch the format can describe.
    pub fn min_patch_len(self) -> usize {
        match self {
            Self::Ips => ips::MIN_PATCH_LEN,
            Self::Ups => ups::MIN_PATCH_LEN,
        }
    }

    /// Conventional file extension (lowercase, no dot).
    pub fn extension(self) -> &'static str {
        match self {
            Self::Ips => "ips",
            Self::Ups => "ups",
        }
    }

    /// Map a file extension (case-insensitive, no dot) to a format.
    pub fn from_extension(ext: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|f| ext.eq_ignore_ascii_case(f.extension()))
    }

    /// Map a patch file path to a format by its extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    /// Identify a patch by its magic bytes.
    pub fn detect(patch: &[u8]) -> Option<Self> {
        Self::ALL.into_iter().find(|f| patch.starts_with(f.magic()))
    }

    /// Apply `patch` to `source` with this format's codec.
    pub fn apply(self, patch: &[u8], source: &[u8]) -> Result<Vec<u8>> {
        match self {
            Self::Ips => ips::apply(patch, source),
            Self::Ups => ups::apply(patch, source),
        }
    }
}

impl std::fmt::Display for PatchFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Ips => "IPS",
            Self::Ups => "UPS",
        })
    }
}
