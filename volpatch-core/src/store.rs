use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::{PatchError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    ReadOnly,
    ReadWrite,
}

/// Random-access handle over the resource blob.
///
/// The store is opened once and released when the handle is dropped. Its
/// length is captured at open time; writes through this handle never extend
/// the blob, so the cached length stays valid.
#[derive(Debug)]
pub struct ResourceStore<S> {
    inner: S,
    len: u64,
}

impl ResourceStore<File> {
    pub fn open(path: &Path, mode: OpenMode) -> Result<Self> {
        if !path.exists() {
            return Err(PatchError::NotFound {
                what: "resource store",
                path: path.to_path_buf(),
            });
        }
        let file = OpenOptions::new()
            .read(true)
            .write(mode == OpenMode::ReadWrite)
            .open(path)?;
        Self::new(file)
    }
}

impl<S: Seek> ResourceStore<S> {
    pub fn new(mut inner: S) -> Result<Self> {
        let len = inner.seek(SeekFrom::End(0))?;
        Ok(Self { inner, len })
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

/// Converts a byte count from the store into an in-memory buffer length.
pub(crate) fn buffer_len(what: &'static str, len: u64) -> Result<usize> {
    usize::try_from(len).map_err(|_| PatchError::TooLarge { what, len })
}

impl<S: Read + Seek> ResourceStore<S> {
    /// Reads up to `len` bytes at `pos`; the result is shorter only when the
    /// store ends first.
    pub fn read_at(&mut self, pos: u64, len: usize) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(len);
        if pos >= self.len {
            return Ok(out);
        }
        self.inner.seek(SeekFrom::Start(pos))?;
        (&mut self.inner).take(len as u64).read_to_end(&mut out)?;
        Ok(out)
    }
}

impl<S: Write + Seek> ResourceStore<S> {
    /// Issues a single write of `buf` at `pos` and returns the byte count the
    /// backend accepted.
    pub fn write_at(&mut self, pos: u64, buf: &[u8]) -> Result<usize> {
        self.inner.seek(SeekFrom::Start(pos))?;
        let wrote = self.inner.write(buf)?;
        self.inner.flush()?;
        Ok(wrote)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn length_is_taken_from_backend() {
        let store = ResourceStore::new(Cursor::new(vec![0u8; 0x60])).unwrap();
        assert_eq!(store.len(), 0x60);
        assert!(!store.is_empty());
    }

    #[test]
    fn read_at_stops_at_end_of_store() {
        let mut store = ResourceStore::new(Cursor::new(vec![1, 2, 3, 4, 5])).unwrap();
        assert_eq!(store.read_at(1, 2).unwrap(), vec![2, 3]);
        assert_eq!(store.read_at(3, 10).unwrap(), vec![4, 5]);
        assert!(store.read_at(9, 2).unwrap().is_empty());
    }

    #[test]
    fn buffer_len_names_what_was_too_large() {
        assert_eq!(buffer_len("text payload", 0x40).unwrap(), 0x40);
        let err = PatchError::TooLarge {
            what: "resource body",
            len: u64::MAX,
        };
        assert_eq!(
            err.to_string(),
            "resource body of 18446744073709551615 bytes does not fit in memory"
        );
    }

    #[cfg(target_pointer_width = "32")]
    #[test]
    fn buffer_len_rejects_lengths_past_usize() {
        assert!(matches!(
            buffer_len("text payload", u64::from(u32::MAX) + 1),
            Err(PatchError::TooLarge { what: "text payload", .. })
        ));
    }

    #[test]
    fn write_at_overwrites_in_place() {
        let mut store = ResourceStore::new(Cursor::new(vec![0u8; 6])).unwrap();
        assert_eq!(store.write_at(2, &[9, 9]).unwrap(), 2);
        assert_eq!(store.into_inner().into_inner(), vec![0, 0, 9, 9, 0, 0]);
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("VOL.0");
        match ResourceStore::open(&path, OpenMode::ReadOnly) {
            Err(PatchError::NotFound { what: "resource store", .. }) => {}
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
