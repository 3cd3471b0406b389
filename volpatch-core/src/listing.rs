//! Read-only views of an archive: directory dumps and `index|text` listings.

use std::io::{Read, Seek, Write};

use crate::archive::Archive;
use crate::directory::Directory;
use crate::text_block::TERMINATOR;
use crate::{PatchError, Result};

/// Maps payload bytes one-to-one onto code points U+0000..U+00FF, stopping
/// at the first NUL.
pub fn decode_text(payload: &[u8]) -> String {
    payload
        .iter()
        .take_while(|&&b| b != TERMINATOR)
        .map(|&b| char::from(b))
        .collect()
}

/// Writes `index:value` for every directory entry.
pub fn write_entries<W: Write>(directory: &Directory, out: &mut W) -> Result<()> {
    for (index, value) in directory.entries() {
        writeln!(out, "{index}:{value}")?;
    }
    Ok(())
}

/// Decoded text of resource `index`.
pub fn read_text<S: Read + Seek>(archive: &mut Archive<S>, index: usize) -> Result<String> {
    Ok(decode_text(&archive.payload(index)?))
}

/// Writes `index|text` for every index in `[start, end]`.
///
/// Bounds default to the whole directory. Absent or unreadable resources are
/// listed with empty text. Returns the number of lines written.
pub fn list_texts<S: Read + Seek, W: Write>(
    archive: &mut Archive<S>,
    start: Option<usize>,
    end: Option<usize>,
    out: &mut W,
) -> Result<usize> {
    let count = archive.directory().entry_count();
    let start = start.unwrap_or(0);
    let end = match end {
        Some(end) => end,
        None => count
            .checked_sub(1)
            .ok_or(PatchError::IndexOutOfRange { index: start, count })?,
    };
    for index in [start, end] {
        if index >= count {
            return Err(PatchError::IndexOutOfRange { index, count });
        }
    }
    if start > end {
        return Err(PatchError::Config(format!(
            "start ({start}) cannot be greater than end ({end})"
        )));
    }

    for index in start..=end {
        let text = match read_text(archive, index) {
            Ok(text) => text,
            Err(PatchError::AbsentResource { .. }) => String::new(),
            Err(err) => {
                tracing::debug!("index {index}: {err}");
                String::new()
            }
        };
        writeln!(out, "{index}|{text}")?;
    }

    Ok(end - start + 1)
}
