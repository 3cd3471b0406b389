//! Builders for small in-memory archives used across unit tests.

use std::io::Cursor;

use crate::directory::{Directory, ABSENT};
use crate::Archive;

/// Store bytes preceding the first record, so offsets start above zero.
pub(crate) const LEAD: usize = 0x10;

/// A view record whose text pointer is `pointer` and whose payload is
/// `payload`. The record is `pointer + 5 + payload.len()` bytes long.
pub(crate) fn record(pointer: u16, payload: &[u8]) -> Vec<u8> {
    record_with_field(pointer.to_be_bytes(), usize::from(pointer), payload)
}

/// A record whose pointer field holds `field` verbatim while the text block
/// actually sits at `block_pointer`.
pub(crate) fn record_with_field(field: [u8; 2], block_pointer: usize, payload: &[u8]) -> Vec<u8> {
    assert!(block_pointer >= 7, "text block would overlap the pointer field");

    let mut out = vec![0xAA; block_pointer + 3];
    out[..7].copy_from_slice(&[0x12, 0x34, 0x01, 0x00, 0x02, 0x00, 0x00]);
    out[7] = 0x54;
    out[8..10].copy_from_slice(&field);

    // Length prefix is off by 0x100; sizing must never read it.
    let bogus_len = (payload.len() as u16).wrapping_add(0x0100);
    out.extend_from_slice(&bogus_len.to_le_bytes());
    out.extend_from_slice(payload);
    out
}

/// Lays `records` back to back after [`LEAD`] bytes; `None` slots become
/// absent directory entries.
pub(crate) fn layout(records: &[Option<Vec<u8>>]) -> (Directory, Vec<u8>) {
    let mut store = vec![0xEE; LEAD];
    let mut entries = Vec::with_capacity(records.len());
    for rec in records {
        match rec {
            Some(bytes) => {
                entries.push(store.len() as u32);
                store.extend_from_slice(bytes);
            }
            None => entries.push(ABSENT),
        }
    }
    let directory = Directory::from_entries(&entries).expect("fixture offsets fit in 24 bits");
    (directory, store)
}

pub(crate) fn archive(records: &[Option<Vec<u8>>]) -> Archive<Cursor<Vec<u8>>> {
    let (directory, store) = layout(records);
    Archive::new(directory, Cursor::new(store)).expect("in-memory store")
}
