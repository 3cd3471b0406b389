use serde::Serialize;

use crate::directory::{Directory, ABSENT};
use crate::{PatchError, Result};

/// Byte range `[offset, offset + size)` of one resource record in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResourceSpan {
    pub offset: u64,
    pub size: u64,
}

impl ResourceSpan {
    pub fn end(&self) -> u64 {
        self.offset + self.size
    }
}

/// Derives the span of resource `index`.
///
/// The archive stores no per-resource length, so the size runs up to the
/// next present directory entry, or to the end of the store for the last
/// one. Absent slots between present ones are skipped.
pub fn resolve(directory: &Directory, index: usize, store_len: u64) -> Result<ResourceSpan> {
    let current = directory.read(index)?;
    if current == ABSENT {
        return Err(PatchError::AbsentResource { index });
    }

    let offset = u64::from(current);
    let end = match directory.next_present(index) {
        Some((_, next)) => u64::from(next),
        None => store_len,
    };

    // A next entry below this one, or a store shorter than the offset,
    // clamps to zero and is rejected.
    let size = end.saturating_sub(offset);
    if size == 0 {
        return Err(PatchError::InvalidSpan { index, offset, end });
    }

    Ok(ResourceSpan { offset, size })
}
