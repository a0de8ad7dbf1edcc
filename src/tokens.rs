//! Token count estimation for cleaned documents.
//!
//! The numbers only feed the manifest (so later chunking and cost estimates
//! have something to go on); they do not need to match any particular model
//! exactly.

use anyhow::{bail, Result};
use tiktoken_rs::CoreBPE;

/// Approximate chars-per-token ratio for non-CJK text in the `chars` mode.
const CHARS_PER_TOKEN: usize = 4;

pub enum TokenEstimator {
    /// Exact cl100k BPE count.
    Cl100k(Box<CoreBPE>),
    /// One token per CJK/kana character, one per four characters otherwise.
    Chars,
}

impl TokenEstimator {
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "cl100k_base" => Ok(TokenEstimator::Cl100k(Box::new(tiktoken_rs::cl100k_base()?))),
            "chars" => Ok(TokenEstimator::Chars),
            other => bail!("Unknown tokenizer: '{}'", other),
        }
    }

    pub fn estimate(&self, text: &str) -> usize {
        match self {
            // Special-token strings in the corpus are counted as plain text.
            TokenEstimator::Cl100k(bpe) => bpe.encode_ordinary(text).len(),
            TokenEstimator::Chars => estimate_by_chars(text),
        }
    }
}

fn estimate_by_chars(text: &str) -> usize {
    let mut wide: usize = 0;
    let mut narrow: usize = 0;
    for c in text.chars() {
        if is_cjk(c) {
            wide += 1;
        } else {
            narrow += 1;
        }
    }
    wide + narrow.div_ceil(CHARS_PER_TOKEN)
}

fn is_cjk(c: char) -> bool {
    matches!(c,
        '\u{3040}'..='\u{30FF}'   // hiragana, katakana
        | '\u{3400}'..='\u{4DBF}' // CJK extension A
        | '\u{4E00}'..='\u{9FFF}' // CJK unified
        | '\u{F900}'..='\u{FAFF}' // compatibility ideographs
        | '\u{AC00}'..='\u{D7AF}' // hangul
        | '\u{20000}'..='\u{2FA1F}')
}
