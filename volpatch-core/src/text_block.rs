//! Locating the patchable text payload inside a view record.
//!
//! Record layout relative to the resource start:
//!
//! - byte 7: tag byte, always present, ignored here
//! - bytes 8..10: big-endian pointer to the text block
//! - at `pointer + 3`: 2-byte length prefix, then the payload up to the end
//!   of the resource
//!
//! The length prefix is not a usable bound. Capacity always comes from the
//! enclosing resource span.

use byteorder::{BigEndian, ByteOrder};
use serde::Serialize;
use std::io::{Read, Seek};
use tracing::{debug, warn};

use crate::span::ResourceSpan;
use crate::store::{buffer_len, ResourceStore};
use crate::{PatchError, Result};

pub const POINTER_FIELD_OFFSET: u64 = 8;
pub const BLOCK_SUBHEADER_LEN: u64 = 3;
pub const LENGTH_PREFIX_LEN: u64 = 2;
pub const TERMINATOR: u8 = 0x00;

/// Which reading of the pointer field produced the text offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PointerSource {
    Full,
    LowByte,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextBlockRegion {
    pub payload_start: u64,
    pub capacity: usize,
    pub has_trailing_terminator: bool,
    pub text_offset: u16,
    pub pointer: PointerSource,
}

impl TextBlockRegion {
    /// Bytes available for text once a trailing terminator is reserved.
    pub fn content_capacity(&self) -> usize {
        if self.has_trailing_terminator {
            self.capacity - 1
        } else {
            self.capacity
        }
    }
}

/// Picks the text offset out of the raw pointer field.
///
/// The full big-endian value is tried first. Some records carry noise in the
/// high byte, so an out-of-bounds value is retried with the low byte alone.
pub fn resolve_text_offset(field: [u8; 2], size: u64) -> Result<(u16, PointerSource)> {
    let full = BigEndian::read_u16(&field);
    if u64::from(full) <= size {
        return Ok((full, PointerSource::Full));
    }

    let low = field[1];
    debug!(full, low, size, "text pointer out of bounds, retrying with low byte");
    if u64::from(low) <= size {
        return Ok((u16::from(low), PointerSource::LowByte));
    }

    Err(PatchError::TextOffsetOutOfBounds { full, low, size })
}

pub fn locate<S: Read + Seek>(
    store: &mut ResourceStore<S>,
    span: &ResourceSpan,
) -> Result<TextBlockRegion> {
    let field_pos = span.offset + POINTER_FIELD_OFFSET;
    let field: [u8; 2] = store
        .read_at(field_pos, 2)?
        .as_slice()
        .try_into()
        .map_err(|_| PatchError::InsufficientData {
            what: "2-byte text pointer",
            at: field_pos,
        })?;

    let (text_offset, pointer) = resolve_text_offset(field, span.size)?;
    if pointer == PointerSource::LowByte {
        warn!(
            offset = span.offset,
            high = field[0],
            low = field[1],
            text_offset,
            "using low byte of text pointer"
        );
    }

    let block_start = span.offset + u64::from(text_offset) + BLOCK_SUBHEADER_LEN;
    if block_start + LENGTH_PREFIX_LEN > span.end() {
        return Err(PatchError::InsufficientData {
            what: "2-byte text length",
            at: block_start,
        });
    }

    let payload_start = block_start + LENGTH_PREFIX_LEN;
    let capacity = span.size - (payload_start - span.offset);
    if capacity == 0 {
        return Err(PatchError::NoCapacity { payload_start });
    }
    let capacity = buffer_len("text payload", capacity)?;

    let current = store.read_at(payload_start, capacity)?;
    if current.len() != capacity {
        return Err(PatchError::InsufficientData {
            what: "text payload",
            at: payload_start,
        });
    }
    let has_trailing_terminator = current.last() == Some(&TERMINATOR);

    debug!(
        offset = span.offset,
        size = span.size,
        text_offset,
        payload_start,
        capacity,
        has_trailing_terminator,
        "located text block"
    );

    Ok(TextBlockRegion {
        payload_start,
        capacity,
        has_trailing_terminator,
        text_offset,
        pointer,
    })
}

/// Current payload bytes of `region`.
pub fn read_payload<S: Read + Seek>(
    store: &mut ResourceStore<S>,
    region: &TextBlockRegion,
) -> Result<Vec<u8>> {
    let payload = store.read_at(region.payload_start, region.capacity)?;
    if payload.len() != region.capacity {
        return Err(PatchError::InsufficientData {
            what: "text payload",
            at: region.payload_start,
        });
    }
    Ok(payload)
}
