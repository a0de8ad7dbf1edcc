//! Byte-to-text decoding with encoding detection.
//!
//! Raw corpus files arrive in whatever encoding the source site or scanner
//! produced: mostly UTF-8, a fair amount of Shift_JIS, the odd EUC-JP file,
//! and the occasional Latin-1 export. Detection is a fixed cascade:
//!
//! 1. byte-order mark (UTF-8, UTF-16LE, UTF-16BE);
//! 2. strict UTF-8;
//! 3. UTF-8 where only a small share of the non-ASCII bytes is broken; the
//!    broken bytes are dropped;
//! 4. the first of Shift_JIS and EUC-JP that decodes without errors;
//! 5. windows-1252, which maps every byte and therefore never fails.

use encoding_rs::{Encoding, EUC_JP, SHIFT_JIS, UTF_8, WINDOWS_1252};

/// Maximum share of invalid bytes, in percent of the non-ASCII bytes, for a
/// file to still be treated as UTF-8. Measured against non-ASCII bytes so a
/// mostly-ASCII Shift_JIS file is not mistaken for damaged UTF-8.
const MAX_INVALID_UTF8_PERCENT: usize = 1;

const LEGACY_CANDIDATES: [&Encoding; 2] = [SHIFT_JIS, EUC_JP];

#[derive(Debug, Clone)]
pub struct Decoded {
    pub text: String,
    pub encoding: &'static Encoding,
    /// Number of bytes that could not be decoded and were dropped.
    pub dropped_bytes: usize,
}

pub fn decode_bytes(raw: &[u8]) -> Decoded {
    if let Some((encoding, bom_len)) = Encoding::for_bom(raw) {
        let (text, _) = encoding.decode_without_bom_handling(&raw[bom_len..]);
        return Decoded {
            text: text.into_owned(),
            encoding,
            dropped_bytes: 0,
        };
    }

    if let Ok(text) = std::str::from_utf8(raw) {
        return Decoded {
            text: text.to_string(),
            encoding: UTF_8,
            dropped_bytes: 0,
        };
    }

    let (text, invalid) = utf8_ignoring_errors(raw);
    let non_ascii = raw.iter().filter(|b| !b.is_ascii()).count();
    if invalid * 100 <= non_ascii * MAX_INVALID_UTF8_PERCENT {
        return Decoded {
            text,
            encoding: UTF_8,
            dropped_bytes: invalid,
        };
    }

    for encoding in LEGACY_CANDIDATES {
        if let Some(text) = encoding.decode_without_bom_handling_and_without_replacement(raw) {
            return Decoded {
                text: text.into_owned(),
                encoding,
                dropped_bytes: 0,
            };
        }
    }

    let (text, _) = WINDOWS_1252.decode_without_bom_handling(raw);
    Decoded {
        text: text.into_owned(),
        encoding: WINDOWS_1252,
        dropped_bytes: 0,
    }
}

/// Decodes as UTF-8, skipping invalid sequences. Returns the text and the
/// number of skipped bytes.
fn utf8_ignoring_errors(raw: &[u8]) -> (String, usize) {
    let mut text = String::with_capacity(raw.len());
    let mut invalid = 0;
    for chunk in raw.utf8_chunks() {
        text.push_str(chunk.valid());
        invalid += chunk.invalid().len();
    }
    (text, invalid)
}
