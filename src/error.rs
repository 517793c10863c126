// Patch application errors.
//
// One closed enum for every failure either codec can report. Each variant
// carries enough context for diagnostics; turning it into a user-facing
// message is the caller's job (see `ErrorKind::as_str`).

use thiserror::Error;

use crate::format::PatchFormat;

/// Result alias used throughout the codecs.
pub type Result<T> = std::result::Result<T, PatchError>;

// ---------------------------------------------------------------------------
// PatchError
// ---------------------------------------------------------------------------

/// Every way applying a patch can fail.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatchError {
    /// Patch is shorter than the format's fixed minimum.
    #[error("{format} patch too small: {actual} bytes, need at least {minimum}")]
    PatchTooSmall {
        format: PatchFormat,
        minimum: usize,
        actual: usize,
    },

    /// Magic bytes do not match the format.
    #[error("invalid {format} patch header")]
    InvalidPatchHeader { format: PatchFormat },

    /// The record stream is malformed, or the patch's own checksum failed.
    #[error("invalid patch at offset {offset}: {defect}")]
    InvalidPatch { offset: usize, defect: PatchDefect },

    /// The source buffer is not the one this patch was built for.
    #[error("invalid source: {mismatch}")]
    InvalidSource { mismatch: SourceMismatch },

    /// The source was accepted but the reconstructed target failed verification.
    #[error("invalid target: expected crc32 {expected:#010x}, got {actual:#010x}")]
    InvalidTarget { expected: u32, actual: u32 },
}

impl PatchError {
    pub(crate) fn invalid_patch(offset: usize, defect: PatchDefect) -> Self {
        Self::InvalidPatch { offset, defect }
    }

    /// The variant tag, without its context.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::PatchTooSmall { .. } => ErrorKind::PatchTooSmall,
            Self::InvalidPatchHeader { .. } => ErrorKind::InvalidPatchHeader,
            Self::InvalidPatch { .. } => ErrorKind::InvalidPatch,
            Self::InvalidSource { .. } => ErrorKind::InvalidSource,
            Self::InvalidTarget { .. } => ErrorKind::InvalidTarget,
        }
    }
}

// ---------------------------------------------------------------------------
// Context types
// ---------------------------------------------------------------------------

/// What exactly is wrong with a malformed patch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PatchDefect {
    /// A record's header or payload runs past the end of the patch.
    #[error("record truncated")]
    TruncatedRecord,
    /// An IPS RLE record with a repeat count of zero.
    #[error("zero-length RLE run")]
    ZeroLengthRun,
    /// The patch ended without an IPS `EOF` terminator.
    #[error("missing EOF terminator")]
    MissingTerminator,
    /// A UPS varint does not fit in 64 bits.
    #[error("varint overflow")]
    VarintOverflow,
    /// A UPS read ran past the end of the patch.
    #[error("unexpected end of patch")]
    UnexpectedEnd,
    /// A declared length does not fit in this platform's address space.
    #[error("declared length {0} is too large")]
    LengthOverflow(u64),
    /// The patch's trailing self-checksum does not match its contents.
    #[error("patch checksum mismatch: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch { expected: u32, actual: u32 },
}

/// Why a source buffer was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SourceMismatch {
    /// The source length matches neither length the patch declares.
    #[error("length {actual} matches neither declared length ({source_len} or {target_len})")]
    Length {
        actual: usize,
        source_len: u64,
        target_len: u64,
    },
    /// The source checksum matches neither checksum the patch stores.
    #[error("crc32 {actual:#010x} matches neither stored checksum ({source_crc:#010x} or {target_crc:#010x})")]
    Checksum {
        actual: u32,
        source_crc: u32,
        target_crc: u32,
    },
}

// ---------------------------------------------------------------------------
// ErrorKind
// ---------------------------------------------------------------------------

/// Context-free error tag, one per `PatchError` variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    PatchTooSmall,
    InvalidPatchHeader,
    InvalidPatch,
    InvalidSource,
    InvalidTarget,
}

impl ErrorKind {
    /// Stable identifier, suitable as a message-catalog key.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PatchTooSmall => "PatchTooSmall",
            Self::InvalidPatchHeader => "InvalidPatchHeader",
            Self::InvalidPatch => "InvalidPatch",
            Self::InvalidSource => "InvalidSource",
            Self::InvalidTarget => "InvalidTarget",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
