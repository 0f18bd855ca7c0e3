//! Snapshot file format
//!
//! Version 1 layout (all integers little-endian):
//!
//! ```text
//! magic "PXCV" | version u32 | width u32 | height u32 | colors [u32; w*h] | blake3 [u8; 32]
//! ```
//!
//! The digest covers everything before it. Version 0 is the legacy headerless
//! layout (`width | height | colors`) and is accepted on read only.

use bytemuck::{Pod, Zeroable};

use super::PersistError;
use crate::canvas::Snapshot;
use crate::consts::MAX_CELLS;

pub const MAGIC: [u8; 4] = *b"PXCV";
/// Version written by `encode`
pub const FORMAT_VERSION: u32 = 1;
/// Headerless layout from before the envelope existed
pub const LEGACY_VERSION: u32 = 0;

const HEADER_LEN: usize = std::mem::size_of::<FileHeader>();
const LEGACY_HEADER_LEN: usize = 8;
const DIGEST_LEN: usize = blake3::OUT_LEN;

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct FileHeader {
    magic: [u8; 4],
    version: u32,
    width: u32,
    height: u32,
}

/// A decoded file and the format version it was stored in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub snapshot: Snapshot,
    pub version: u32,
}

/// Serialize a snapshot in the current format
pub fn encode(snapshot: &Snapshot) -> Result<Vec<u8>, PersistError> {
    let cells = checked_cells(snapshot.width, snapshot.height)?;
    if snapshot.colors.len() != cells {
        return Err(PersistError::Length {
            expected: cells,
            actual: snapshot.colors.len(),
        });
    }

    let header = FileHeader {
        magic: MAGIC,
        version: FORMAT_VERSION.to_le(),
        width: snapshot.width.to_le(),
        height: snapshot.height.to_le(),
    };
    let colors: Vec<u32> = snapshot.colors.iter().map(|c| c.to_le()).collect();

    let mut bytes = Vec::with_capacity(HEADER_LEN + cells * 4 + DIGEST_LEN);
    bytes.extend_from_slice(bytemuck::bytes_of(&header));
    bytes.extend_from_slice(bytemuck::cast_slice(&colors));
    let digest = blake3::hash(&bytes);
    bytes.extend_from_slice(digest.as_bytes());
    Ok(bytes)
}

/// Parse a snapshot file in any supported version
pub fn decode(bytes: &[u8]) -> Result<Decoded, PersistError> {
    if bytes.starts_with(&MAGIC) {
        decode_current(bytes)
    } else {
        decode_legacy(bytes)
    }
}

fn decode_current(bytes: &[u8]) -> Result<Decoded, PersistError> {
    if bytes.len() < HEADER_LEN {
        return Err(PersistError::Length {
            expected: HEADER_LEN,
            actual: bytes.len(),
        });
    }
    let header: FileHeader = bytemuck::pod_read_unaligned(&bytes[..HEADER_LEN]);
    let version = u32::from_le(header.version);
    if version != FORMAT_VERSION {
        return Err(PersistError::UnsupportedVersion(version));
    }

    let (width, height) = (u32::from_le(header.width), u32::from_le(header.height));
    let cells = checked_cells(width, height)?;
    let body_end = HEADER_LEN + cells * 4;
    if bytes.len() != body_end + DIGEST_LEN {
        return Err(PersistError::Length {
            expected: body_end + DIGEST_LEN,
            actual: bytes.len(),
        });
    }
    if blake3::hash(&bytes[..body_end]).as_bytes()[..] != bytes[body_end..] {
        return Err(PersistError::DigestMismatch);
    }

    Ok(Decoded {
        snapshot: Snapshot {
            width,
            height,
            colors: read_colors(&bytes[HEADER_LEN..body_end]),
        },
        version,
    })
}

fn decode_legacy(bytes: &[u8]) -> Result<Decoded, PersistError> {
    let unrecognized = PersistError::Unrecognized { len: bytes.len() };
    if bytes.len() < LEGACY_HEADER_LEN {
        return Err(unrecognized);
    }
    let width = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    let height = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    // Without a tag, only an exact length match counts as a legacy file.
    let Ok(cells) = checked_cells(width, height) else {
        return Err(unrecognized);
    };
    if bytes.len() != LEGACY_HEADER_LEN + cells * 4 {
        return Err(unrecognized);
    }

    Ok(Decoded {
        snapshot: Snapshot {
            width,
            height,
            colors: read_colors(&bytes[LEGACY_HEADER_LEN..]),
        },
        version: LEGACY_VERSION,
    })
}

fn read_colors(bytes: &[u8]) -> Vec<u32> {
    bytemuck::pod_collect_to_vec::<u8, u32>(bytes)
        .into_iter()
        .map(u32::from_le)
        .collect()
}

fn checked_cells(width: u32, height: u32) -> Result<usize, PersistError> {
    let cells = width as u64 * height as u64;
    if cells == 0 || cells > MAX_CELLS {
        return Err(PersistError::InvalidDimensions { width, height });
    }
    Ok(cells as usize)
}
