//! Loader for the hand-maintained source log CSV.
//!
//! The CSV is edited by people in spreadsheet tools, so header spelling is
//! loose: `Title`, ` title `, `作品名` and `NAME` all need to work. Headers
//! are normalized (ideographic space → space, trimmed, lowercased, inner
//! whitespace collapsed) and the title column is the first configured key
//! that appears. `url` and `license` columns are optional.

use csv::ReaderBuilder;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

use crate::error::{CorpusError, Result};
use crate::models::SourceEntry;

static WHITESPACE_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

/// Title → metadata, iterated in first-seen CSV order.
///
/// A repeated title replaces the earlier entry's value but keeps its
/// position, which matters for prefix matching.
#[derive(Debug, Default, Clone)]
pub struct SourceMap {
    entries: Vec<(String, SourceEntry)>,
    index: HashMap<String, usize>,
}

impl SourceMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, title: String, entry: SourceEntry) {
        match self.index.get(&title) {
            Some(&pos) => self.entries[pos].1 = entry,
            None => {
                self.index.insert(title.clone(), self.entries.len());
                self.entries.push((title, entry));
            }
        }
    }

    pub fn get(&self, title: &str) -> Option<&SourceEntry> {
        self.index.get(title).map(|&pos| &self.entries[pos].1)
    }

    /// First entry whose leading `prefix_chars` characters start `key`.
    pub fn prefix_match(&self, key: &str, prefix_chars: usize) -> Option<&SourceEntry> {
        self.entries
            .iter()
            .filter(|(title, _)| !title.is_empty())
            .find(|(title, _)| key.starts_with(char_prefix(title, prefix_chars)))
            .map(|(_, entry)| entry)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SourceEntry)> {
        self.entries.iter().map(|(t, e)| (t.as_str(), e))
    }
}

/// The first `n` characters of `s` (all of it when shorter).
fn char_prefix(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((byte_idx, _)) => &s[..byte_idx],
        None => s,
    }
}

pub fn normalize_header(name: &str) -> String {
    let name = name.replace('\u{3000}', " ");
    let name = name.trim().to_lowercase();
    WHITESPACE_RUN.replace_all(&name, " ").into_owned()
}

pub fn load_source_map(path: &Path, title_keys: &[String]) -> Result<SourceMap> {
    if !path.exists() {
        return Err(CorpusError::CsvNotFound(path.to_path_buf()));
    }

    let bytes = std::fs::read(path).map_err(|e| CorpusError::io(path, e))?;
    let content = String::from_utf8(bytes).map_err(|_| CorpusError::NotUtf8(path.to_path_buf()))?;
    parse_source_log(&content, title_keys, path)
}

/// Parses CSV text; `origin` only labels errors.
pub fn parse_source_log(content: &str, title_keys: &[String], origin: &Path) -> Result<SourceMap> {
    let content = content.strip_prefix('\u{FEFF}').unwrap_or(content);
    let csv_error = |source| CorpusError::Csv {
        path: origin.to_path_buf(),
        source,
    };

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(content.as_bytes());

    let raw_headers = reader.headers().map_err(csv_error)?.clone();
    if raw_headers.is_empty() {
        return Err(CorpusError::CsvEmpty(origin.to_path_buf()));
    }
    let headers: Vec<String> = raw_headers.iter().map(normalize_header).collect();

    let title_key = title_keys
        .iter()
        .map(|k| normalize_header(k))
        .find(|k| headers.contains(k))
        .ok_or_else(|| CorpusError::NoTitleColumn(headers.clone()))?;

    let has_url = headers.iter().any(|h| h == "url");
    let has_license = headers.iter().any(|h| h == "license");
    debug!(
        "source log columns: title='{}' url={} license={}",
        title_key, has_url, has_license
    );

    let mut map = SourceMap::new();
    for result in reader.records() {
        let record = result.map_err(csv_error)?;

        // Later columns win when a header name repeats.
        let row: HashMap<&str, &str> = headers
            .iter()
            .map(String::as_str)
            .zip(record.iter())
            .collect();

        let title = row.get(title_key.as_str()).map(|t| t.trim()).unwrap_or("");
        if title.is_empty() {
            continue;
        }

        let entry = SourceEntry {
            url: has_url.then(|| row.get("url").map(|v| v.to_string())).flatten(),
            license: has_license
                .then(|| row.get("license").map(|v| v.to_string()))
                .flatten(),
        };
        map.insert(title.to_string(), entry);
    }

    Ok(map)
}
