//! The directory table: one big-endian u24 offset per resource slot.

use byteorder::{BigEndian, ByteOrder, WriteBytesExt};
use std::fs;
use std::path::Path;

use crate::{PatchError, Result};

/// Width of one directory entry in bytes.
pub const ENTRY_SIZE: usize = 3;

/// Entry value marking an empty resource slot.
pub const ABSENT: u32 = 0xFF_FFFF;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directory {
    raw: Vec<u8>,
}

impl Directory {
    /// Wraps raw table bytes. A trailing partial entry is ignored.
    pub fn from_bytes(raw: Vec<u8>) -> Self {
        Self { raw }
    }

    pub fn from_entries(entries: &[u32]) -> Result<Self> {
        Ok(Self {
            raw: encode_entries(entries)?,
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(PatchError::NotFound {
                what: "directory table",
                path: path.to_path_buf(),
            });
        }
        Ok(Self::from_bytes(fs::read(path)?))
    }

    pub fn entry_count(&self) -> usize {
        self.raw.len() / ENTRY_SIZE
    }

    pub fn read(&self, index: usize) -> Result<u32> {
        let count = self.entry_count();
        if index >= count {
            return Err(PatchError::IndexOutOfRange { index, count });
        }
        let base = index * ENTRY_SIZE;
        Ok(BigEndian::read_u24(&self.raw[base..base + ENTRY_SIZE]))
    }

    pub fn is_absent(&self, index: usize) -> Result<bool> {
        Ok(self.read(index)? == ABSENT)
    }

    /// All `(index, value)` pairs, absent slots included.
    pub fn entries(&self) -> impl Iterator<Item = (usize, u32)> + '_ {
        self.raw
            .chunks_exact(ENTRY_SIZE)
            .map(BigEndian::read_u24)
            .enumerate()
    }

    /// First present entry strictly after `index`.
    pub fn next_present(&self, index: usize) -> Option<(usize, u32)> {
        self.entries()
            .skip(index.saturating_add(1))
            .find(|&(_, value)| value != ABSENT)
    }

    /// Table bytes covering exactly `entry_count` entries.
    pub fn encode(&self) -> Vec<u8> {
        self.raw[..self.entry_count() * ENTRY_SIZE].to_vec()
    }
}

pub fn encode_entries(entries: &[u32]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(entries.len() * ENTRY_SIZE);
    for &value in entries {
        if value > ABSENT {
            return Err(PatchError::EntryTooLarge { value });
        }
        out.write_u24::<BigEndian>(value)?;
    }
    Ok(out)
}
