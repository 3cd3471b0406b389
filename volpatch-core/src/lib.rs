use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

mod archive;
pub mod batch;
pub mod directory;
pub mod listing;
mod span;
mod store;
pub mod text_block;
pub mod writer;

#[cfg(test)]
pub(crate) mod test_support;

pub use archive::{Archive, DIRECTORY_CANDIDATES, STORE_CANDIDATES};
pub use batch::{
    apply_all, parse_batch, BatchInput, BatchLine, BatchReport, IndexRange, ParsedBatch,
    PatchOutcome, PatchStatus, SkippedLine, UpdateRequest,
};
pub use directory::{Directory, ABSENT};
pub use span::{resolve, ResourceSpan};
pub use store::{OpenMode, ResourceStore};
pub use text_block::{locate, PointerSource, TextBlockRegion};
pub use writer::{PatchOptions, PatchPlan, WriteOrder};

/// Configuration of one batch run against an archive directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatchSettings {
    pub source_dir: PathBuf,
    pub input_path: PathBuf,
    pub dry_run: bool,
    pub start_index: Option<usize>,
    pub end_index: Option<usize>,
    pub order: WriteOrder,
}

impl PatchSettings {
    pub fn range(&self) -> IndexRange {
        IndexRange {
            start: self.start_index,
            end: self.end_index,
        }
    }

    pub fn options(&self) -> PatchOptions {
        PatchOptions {
            dry_run: self.dry_run,
            order: self.order,
        }
    }
}

#[derive(Debug, Error)]
pub enum PatchError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{what} not found at {}", path.display())]
    NotFound { what: &'static str, path: PathBuf },

    #[error("index {index} out of range (directory has {count} entries)")]
    IndexOutOfRange { index: usize, count: usize },

    #[error("index {index} has no resource (offset=0xFFFFFF)")]
    AbsentResource { index: usize },

    #[error("computed non-positive resource size for index {index} (offset {offset}, end {end})")]
    InvalidSpan { index: usize, offset: u64, end: u64 },

    #[error("text pointer out of bounds for resource size {size} (full {full}, low byte {low})")]
    TextOffsetOutOfBounds { full: u16, low: u8, size: u64 },

    #[error("insufficient data for {what} at byte {at}")]
    InsufficientData { what: &'static str, at: u64 },

    #[error("no capacity for text payload at byte {payload_start}")]
    NoCapacity { payload_start: u64 },

    #[error(
        "message too long: {len} bytes (capacity {content_capacity}; total payload {capacity} incl. trailing NUL={trailing_terminator})"
    )]
    TextTooLong {
        len: usize,
        content_capacity: usize,
        capacity: usize,
        trailing_terminator: bool,
    },

    #[error("short write: expected {expected} wrote {wrote}")]
    ShortWrite { expected: usize, wrote: usize },

    #[error("{what} of {len} bytes does not fit in memory")]
    TooLarge { what: &'static str, len: u64 },

    #[error("directory entry {value:#X} does not fit in 24 bits")]
    EntryTooLarge { value: u32 },

    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, PatchError>;

/// Opens the archive under `settings.source_dir` and applies every request
/// of `input` to it.
///
/// A dry run opens the store read-only. Missing archive files are the only
/// failures reported through the returned `Result`; per-index problems are
/// collected in the [`BatchReport`].
pub fn run(settings: &PatchSettings, input: &BatchInput) -> Result<BatchReport> {
    let mode = if settings.dry_run {
        OpenMode::ReadOnly
    } else {
        OpenMode::ReadWrite
    };
    let mut archive = Archive::open(&settings.source_dir, mode)?;

    tracing::info!(
        source = %settings.source_dir.display(),
        entries = archive.directory().entry_count(),
        store_len = archive.store_len(),
        dry_run = settings.dry_run,
        "opened archive"
    );

    Ok(apply_all(
        &mut archive,
        input,
        settings.range(),
        settings.options(),
    ))
}
