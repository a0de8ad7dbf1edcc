//! Normalization applied to every decoded document before hashing.
//!
//! The SHA-256 used for deduplication is taken over the output of
//! [`Normalizer::normalize`], so two raw files that differ only in line
//! endings, stray control bytes, encoding damage or trailing blank lines
//! collapse to the same document.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::TextFixConfig;
use crate::textfix::TextFixer;

static CONTROL_CHARS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[\x00-\x08\x0B\x0C\x0E-\x1F]").expect("control pattern is valid")
});

static BLANK_RUNS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n{3,}").expect("blank-run pattern is valid"));

pub struct Normalizer {
    fixer: TextFixer,
}

impl Normalizer {
    pub fn new(options: TextFixConfig) -> Self {
        Self {
            fixer: TextFixer::new(options),
        }
    }

    /// Control characters out, `\n` line endings, text repair, outer
    /// whitespace trimmed, and at most one blank line between paragraphs.
    pub fn normalize(&self, text: &str) -> String {
        let text = CONTROL_CHARS.replace_all(text, "");
        let text = text.replace("\r\n", "\n").replace('\r', "\n");
        let text = self.fixer.fix(&text);
        BLANK_RUNS.replace_all(text.trim(), "\n\n").into_owned()
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(TextFixConfig::default())
    }
}
