//! Save/load persistence with integrity verification
//!
//! Features:
//! - Versioned binary envelope (legacy headerless files are migrated on load)
//! - BLAKE3 integrity digest
//! - Backup rotation (tmp → save, old save → backup)
//! - Corruption detection and recovery (backup, then blank canvas)

pub mod format;
pub mod manager;

use std::path::PathBuf;

pub use format::{Decoded, FORMAT_VERSION, LEGACY_VERSION};
pub use manager::{Flush, LoadOrigin, Loaded, PersistenceManager, read_file};

/// Why a snapshot could not be read or written
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("unrecognized snapshot file ({len} bytes)")]
    Unrecognized { len: usize },

    #[error("unsupported snapshot version {0}")]
    UnsupportedVersion(u32),

    #[error("snapshot length {actual} does not match expected {expected}")]
    Length { expected: usize, actual: usize },

    #[error("snapshot digest mismatch")]
    DigestMismatch,

    #[error("invalid canvas size {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
}

impl PersistError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PersistError::Io {
            path: path.into(),
            source,
        }
    }

    /// True when the file simply does not exist (a fresh start, not corruption)
    pub fn is_not_found(&self) -> bool {
        matches!(self, PersistError::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}
