//! Fixed-length, in-place text writes.
//!
//! Every write covers the whole payload region: text, then space padding,
//! then the terminator byte when the region ended in one. The store never
//! changes length.

use serde::{Deserialize, Serialize};
use std::io::{Seek, Write};

use crate::store::ResourceStore;
use crate::text_block::{TextBlockRegion, TERMINATOR};
use crate::{PatchError, Result};

pub const PAD: u8 = b' ';

/// Order in which replacement bytes are laid down in the payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteOrder {
    #[default]
    AsGiven,
    Reversed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PatchOptions {
    pub dry_run: bool,
    pub order: WriteOrder,
}

/// What a write did, or would do on a dry run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatchPlan {
    pub payload_start: u64,
    pub capacity: usize,
    pub content_capacity: usize,
    pub text_len: usize,
    pub padding: usize,
    pub trailing_terminator: bool,
    pub dry_run: bool,
}

/// Builds the full-capacity buffer for `text`, rejecting text that does not
/// fit. Text is never truncated.
pub fn build_buffer(
    region: &TextBlockRegion,
    text: &[u8],
    order: WriteOrder,
) -> Result<(Vec<u8>, PatchPlan)> {
    let content_capacity = region.content_capacity();
    if text.len() > content_capacity {
        return Err(PatchError::TextTooLong {
            len: text.len(),
            content_capacity,
            capacity: region.capacity,
            trailing_terminator: region.has_trailing_terminator,
        });
    }

    let mut buf = Vec::with_capacity(region.capacity);
    match order {
        WriteOrder::AsGiven => buf.extend_from_slice(text),
        WriteOrder::Reversed => buf.extend(text.iter().rev()),
    }
    let padding = content_capacity - text.len();
    buf.resize(content_capacity, PAD);
    if region.has_trailing_terminator {
        buf.push(TERMINATOR);
    }

    let plan = PatchPlan {
        payload_start: region.payload_start,
        capacity: region.capacity,
        content_capacity,
        text_len: text.len(),
        padding,
        trailing_terminator: region.has_trailing_terminator,
        dry_run: false,
    };
    Ok((buf, plan))
}

pub fn write<S: Write + Seek>(
    store: &mut ResourceStore<S>,
    region: &TextBlockRegion,
    text: &[u8],
    options: PatchOptions,
) -> Result<PatchPlan> {
    let (buf, mut plan) = build_buffer(region, text, options.order)?;
    if options.dry_run {
        plan.dry_run = true;
        return Ok(plan);
    }

    let wrote = store.write_at(region.payload_start, &buf)?;
    if wrote != buf.len() {
        return Err(PatchError::ShortWrite {
            expected: buf.len(),
            wrote,
        });
    }
    Ok(plan)
}
