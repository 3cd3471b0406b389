//! Codepage handling for batch input. The core only ever sees encoded bytes.

use encoding_rs::WINDOWS_1255;
use std::fs;
use std::io;
use std::path::Path;

/// Reads a batch file as UTF-8, falling back to Windows-1255.
pub fn read_input(path: &Path) -> io::Result<String> {
    let bytes = fs::read(path)?;
    match String::from_utf8(bytes) {
        Ok(text) => Ok(match text.strip_prefix('\u{feff}') {
            Some(rest) => rest.to_string(),
            None => text,
        }),
        Err(err) => {
            tracing::debug!(path = %path.display(), "input is not UTF-8, decoding as Windows-1255");
            let (text, _) = WINDOWS_1255.decode_without_bom_handling(err.as_bytes());
            Ok(text.into_owned())
        }
    }
}

/// Encodes `text` to Windows-1255, refusing characters the codepage lacks.
pub fn encode_cp1255(text: &str) -> Result<Vec<u8>, String> {
    let (bytes, _, had_errors) = WINDOWS_1255.encode(text);
    if had_errors {
        let bad = text
            .chars()
            .find(|c| WINDOWS_1255.encode(c.encode_utf8(&mut [0; 4])).2)
            .unwrap_or(char::REPLACEMENT_CHARACTER);
        return Err(format!("character {bad:?} (U+{:04X}) has no Windows-1255 mapping", bad as u32));
    }
    Ok(bytes.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn hebrew_letters_map_to_single_bytes() {
        // Alef, bet, space, tav.
        assert_eq!(encode_cp1255("אב ת").unwrap(), vec![0xE0, 0xE1, 0x20, 0xFA]);
        assert_eq!(encode_cp1255("DOOR").unwrap(), b"DOOR".to_vec());
    }

    #[test]
    fn unmappable_characters_are_rejected() {
        let err = encode_cp1255("a\u{4E2D}b").unwrap_err();
        assert!(err.contains("U+4E2D"), "{err}");
    }

    #[test]
    fn falls_back_to_windows_1255_for_non_utf8_input() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("texts.txt");
        std::fs::write(&path, [b'1', b'|', 0xE0, 0xE1]).unwrap();
        assert_eq!(read_input(&path).unwrap(), "1|אב");

        std::fs::write(&path, "\u{feff}2|שלום".as_bytes()).unwrap();
        assert_eq!(read_input(&path).unwrap(), "2|שלום");
    }
}
