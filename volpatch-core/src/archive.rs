use std::fs::File;
use std::io::{Read, Seek, Write};
use std::path::{Path, PathBuf};

use crate::directory::Directory;
use crate::span::{self, ResourceSpan};
use crate::store::{buffer_len, OpenMode, ResourceStore};
use crate::text_block::{self, TextBlockRegion};
use crate::writer::{self, PatchOptions, PatchPlan};
use crate::{PatchError, Result};

pub const DIRECTORY_CANDIDATES: &[&str] = &["VIEWDIR", "viewdir"];
pub const STORE_CANDIDATES: &[&str] = &["VOL.0", "vol.0"];

/// Bytes at the start of every resource that a full-resource dump skips.
const RESOURCE_HEADER_SKIP: u64 = 3;

fn find_first_existing(base: &Path, candidates: &[&str]) -> Option<PathBuf> {
    candidates
        .iter()
        .map(|candidate| base.join(candidate))
        .find(|path| path.exists())
}

/// A directory table together with the store it indexes.
#[derive(Debug)]
pub struct Archive<S> {
    directory: Directory,
    store: ResourceStore<S>,
}

impl Archive<File> {
    /// Opens `VIEWDIR` and `VOL.0` under `source_dir`.
    pub fn open(source_dir: &Path, mode: OpenMode) -> Result<Self> {
        if !source_dir.exists() {
            return Err(PatchError::NotFound {
                what: "source directory",
                path: source_dir.to_path_buf(),
            });
        }

        let directory_path = find_first_existing(source_dir, DIRECTORY_CANDIDATES).ok_or_else(
            || PatchError::NotFound {
                what: "directory table",
                path: source_dir.join(DIRECTORY_CANDIDATES[0]),
            },
        )?;
        let store_path = find_first_existing(source_dir, STORE_CANDIDATES).ok_or_else(|| {
            PatchError::NotFound {
                what: "resource store",
                path: source_dir.join(STORE_CANDIDATES[0]),
            }
        })?;

        let directory = Directory::load(&directory_path)?;
        let store = ResourceStore::open(&store_path, mode)?;
        Ok(Self { directory, store })
    }
}

impl<S: Seek> Archive<S> {
    pub fn new(directory: Directory, store: S) -> Result<Self> {
        Ok(Self {
            directory,
            store: ResourceStore::new(store)?,
        })
    }

    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    pub fn store_len(&self) -> u64 {
        self.store.len()
    }

    pub fn resolve(&self, index: usize) -> Result<ResourceSpan> {
        span::resolve(&self.directory, index, self.store.len())
    }

    pub fn into_parts(self) -> (Directory, S) {
        (self.directory, self.store.into_inner())
    }
}

impl<S: Read + Seek> Archive<S> {
    pub fn locate(&mut self, index: usize) -> Result<(ResourceSpan, TextBlockRegion)> {
        let span = self.resolve(index)?;
        let region = text_block::locate(&mut self.store, &span)?;
        Ok((span, region))
    }

    /// Current payload bytes of resource `index`, terminator included.
    pub fn payload(&mut self, index: usize) -> Result<Vec<u8>> {
        let (_, region) = self.locate(index)?;
        text_block::read_payload(&mut self.store, &region)
    }

    /// Resource bytes after the 3-byte resource header.
    pub fn resource_body(&mut self, index: usize) -> Result<Vec<u8>> {
        let span = self.resolve(index)?;
        let start = span.offset + RESOURCE_HEADER_SKIP;
        let len = span.size.checked_sub(RESOURCE_HEADER_SKIP).ok_or(
            PatchError::InsufficientData {
                what: "resource header",
                at: span.offset,
            },
        )?;
        let len = buffer_len("resource body", len)?;

        let body = self.store.read_at(start, len)?;
        if body.len() != len {
            return Err(PatchError::InsufficientData {
                what: "resource body",
                at: start,
            });
        }
        Ok(body)
    }
}

impl<S: Read + Write + Seek> Archive<S> {
    /// Resolves, locates and overwrites the text of resource `index`.
    pub fn patch(&mut self, index: usize, text: &[u8], options: PatchOptions) -> Result<PatchPlan> {
        let (_, region) = self.locate(index)?;
        writer::write(&mut self.store, &region, text, options)
    }
}
