//! Repairs for text that went through one too many encoders.
//!
//! [`TextFixer`] runs a fixed sequence of passes, each toggled by
//! [`TextFixConfig`]:
//!
//! | Pass | Example |
//! |------|---------|
//! | mojibake | `å\u{9d}‚æœ¬` → `坂本` |
//! | entities | `&amp;` → `&` (only when the text has no markup) |
//! | quotes | `“quoted”` → `"quoted"` |
//! | ligatures | `ﬁle` → `file` |
//! | width | `ＡＢＣ１２３` → `ABC123`, `ｶﾞ` → `ガ` |
//! | NFC | `か\u{3099}` → `が` |
//!
//! Byte-order marks and interlinear annotation characters are always removed.

use encoding_rs::WINDOWS_1252;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use unicode_normalization::UnicodeNormalization;

use crate::config::TextFixConfig;

/// A UTF-8 lead byte read as windows-1252 followed by a continuation byte
/// read the same way. Each match is one likely mis-decoded character.
static MOJIBAKE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"[\x{C2}-\x{F4}]",
        r"[\x{80}-\x{BF}\x{20AC}\x{201A}\x{0192}\x{201E}\x{2026}\x{2020}\x{2021}\x{02C6}",
        r"\x{2030}\x{0160}\x{2039}\x{0152}\x{017D}\x{2018}\x{2019}\x{201C}\x{201D}\x{2022}",
        r"\x{2013}\x{2014}\x{02DC}\x{2122}\x{0161}\x{203A}\x{0153}\x{017E}\x{0178}]",
    ))
    .expect("mojibake pattern is valid")
});

static ENTITY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"&(#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6}|[a-zA-Z]{2,8});")
        .expect("entity pattern is valid")
});

/// Half-width and full-width forms plus the ideographic space.
static WIDTH_RUN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[\x{3000}\x{FF01}-\x{FF5E}\x{FF61}-\x{FF9F}\x{FFE0}-\x{FFE6}\x{FFE8}-\x{FFEE}]+")
        .expect("width pattern is valid")
});

pub struct TextFixer {
    options: TextFixConfig,
}

impl TextFixer {
    pub fn new(options: TextFixConfig) -> Self {
        Self { options }
    }

    pub fn fix(&self, text: &str) -> String {
        let mut fixed = remove_invisible(text);

        if self.options.fix_mojibake {
            fixed = fix_mojibake(&fixed);
        }
        if self.options.fix_entities {
            fixed = unescape_entities(&fixed);
        }
        if self.options.uncurl_quotes {
            fixed = uncurl_quotes(&fixed);
        }
        if self.options.fix_ligatures {
            fixed = expand_ligatures(&fixed);
        }
        if self.options.fix_width {
            fixed = fix_width(&fixed);
        }
        if self.options.normalize_nfc {
            fixed = fixed.nfc().collect();
        }

        fixed
    }
}

impl Default for TextFixer {
    fn default() -> Self {
        Self::new(TextFixConfig::default())
    }
}

fn remove_invisible(text: &str) -> String {
    text.chars()
        .filter(|c| !matches!(c, '\u{FEFF}' | '\u{FFF9}'..='\u{FFFB}'))
        .collect()
}

fn mojibake_score(text: &str) -> usize {
    MOJIBAKE.find_iter(text).count()
}

/// Line by line, undoes a UTF-8 → windows-1252 mis-decode when doing so
/// strictly lowers the number of mojibake markers. Lines mixing mojibake with
/// characters windows-1252 cannot represent are left alone.
pub fn fix_mojibake(text: &str) -> String {
    if mojibake_score(text) == 0 {
        return text.to_string();
    }

    text.split('\n')
        .map(|line| fix_mojibake_line(line).unwrap_or_else(|| line.to_string()))
        .collect::<Vec<_>>()
        .join("\n")
}

fn fix_mojibake_line(line: &str) -> Option<String> {
    let before = mojibake_score(line);
    if before == 0 {
        return None;
    }

    let (bytes, _, unmappable) = WINDOWS_1252.encode(line);
    if unmappable {
        return None;
    }

    let candidate = String::from_utf8(bytes.into_owned()).ok()?;
    if mojibake_score(&candidate) < before {
        Some(candidate)
    } else {
        None
    }
}

/// Unescapes HTML entities unless the text looks like markup.
pub fn unescape_entities(text: &str) -> String {
    if !text.contains('&') || text.contains('<') || text.contains('>') {
        return text.to_string();
    }

    ENTITY
        .replace_all(text, |caps: &Captures| {
            let body = &caps[1];
            decode_entity(body).unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

fn decode_entity(body: &str) -> Option<String> {
    if let Some(num) = body.strip_prefix('#') {
        let code = match num.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => num.parse::<u32>().ok()?,
        };
        let c = char::from_u32(code)?;
        if c.is_control() && !matches!(c, '\n' | '\t') {
            return None;
        }
        return Some(c.to_string());
    }

    let named = match body {
        "amp" => "&",
        "lt" => "<",
        "gt" => ">",
        "quot" => "\"",
        "apos" => "'",
        "nbsp" => "\u{00A0}",
        "hellip" => "…",
        "mdash" => "—",
        "ndash" => "–",
        "copy" => "©",
        _ => return None,
    };
    Some(named.to_string())
}

pub fn uncurl_quotes(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}' => '\'',
            '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{201F}' => '"',
            other => other,
        })
        .collect()
}

pub fn expand_ligatures(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\u{FB00}' => out.push_str("ff"),
            '\u{FB01}' => out.push_str("fi"),
            '\u{FB02}' => out.push_str("fl"),
            '\u{FB03}' => out.push_str("ffi"),
            '\u{FB04}' => out.push_str("ffl"),
            '\u{FB05}' | '\u{FB06}' => out.push_str("st"),
            '\u{0132}' => out.push_str("IJ"),
            '\u{0133}' => out.push_str("ij"),
            other => out.push(other),
        }
    }
    out
}

/// NFKC-folds runs of width variants: full-width ASCII becomes ASCII,
/// half-width katakana becomes full-width (with voiced marks composed).
pub fn fix_width(text: &str) -> String {
    WIDTH_RUN
        .replace_all(text, |caps: &Captures| caps[0].nfkc().collect::<String>())
        .into_owned()
}
