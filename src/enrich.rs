//! The enrich stage: joins source log metadata onto the local manifest.
//!
//! Each manifest record is matched by its trimmed title, first exactly and
//! then by prefix: the first source log title (in CSV order) whose leading
//! `fuzzy_prefix_chars` characters start the record's title. A hit copies a
//! non-empty `url` into `source` and a non-empty `license` into `license`;
//! everything else on the record, including key order, nulls and keys this
//! crate does not know, is written back as read.

use anyhow::{Context, Result};
use serde_json::Value;
use std::path::PathBuf;
use tracing::{debug, info};

use crate::config::Config;
use crate::manifest::{read_manifest, write_manifest};
use crate::models::{ManifestDoc, SourceEntry};
use crate::source_log::{load_source_map, SourceMap};

/// Path overrides for a single run; `None` falls back to the config.
#[derive(Debug, Clone, Default)]
pub struct EnrichOptions {
    pub csv: Option<PathBuf>,
    pub input: Option<PathBuf>,
    pub output: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchCounts {
    pub exact: usize,
    pub fuzzy: usize,
    pub missing: usize,
}

#[derive(Debug)]
pub struct EnrichReport {
    pub counts: MatchCounts,
    pub records: Vec<ManifestDoc>,
    pub output_path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    Exact,
    Fuzzy,
}

pub fn run_enrich(config: &Config, options: &EnrichOptions) -> Result<EnrichReport> {
    let csv_path = options
        .csv
        .clone()
        .unwrap_or_else(|| config.source_csv_path());
    let input = options
        .input
        .clone()
        .unwrap_or_else(|| config.manifest_local_path());
    let output = options
        .output
        .clone()
        .unwrap_or_else(|| config.manifest_enriched_path());

    let source_map = load_source_map(&csv_path, &config.enrich.title_keys)?;
    info!(
        "Loaded {} source entries from {}",
        source_map.len(),
        csv_path.display()
    );

    let mut records: Vec<ManifestDoc> = read_manifest(&input)
        .with_context(|| format!("Failed to read manifest: {}", input.display()))?;

    let counts = enrich_records(
        &mut records,
        &source_map,
        config.enrich.fuzzy_prefix_chars,
    );

    write_manifest(&output, &records)
        .with_context(|| format!("Failed to write manifest: {}", output.display()))?;

    Ok(EnrichReport {
        counts,
        records,
        output_path: output,
    })
}

/// Enriches `records` in place and returns how each one matched.
pub fn enrich_records(
    records: &mut [ManifestDoc],
    source_map: &SourceMap,
    prefix_chars: usize,
) -> MatchCounts {
    let mut counts = MatchCounts::default();

    for record in records.iter_mut() {
        let title = doc_title(record).to_string();
        match find_source(&title, source_map, prefix_chars) {
            Some((kind, entry)) => {
                debug!("{:?} match for '{}'", kind, title);
                match kind {
                    MatchKind::Exact => counts.exact += 1,
                    MatchKind::Fuzzy => counts.fuzzy += 1,
                }
                apply_entry(record, entry);
            }
            None => {
                debug!("No source entry for '{}'", title);
                counts.missing += 1;
            }
        }
    }

    counts
}

pub fn find_source<'m>(
    title: &str,
    source_map: &'m SourceMap,
    prefix_chars: usize,
) -> Option<(MatchKind, &'m SourceEntry)> {
    let key = title.trim();

    if let Some(entry) = source_map.get(key) {
        return Some((MatchKind::Exact, entry));
    }

    if key.is_empty() {
        return None;
    }

    source_map
        .prefix_match(key, prefix_chars)
        .map(|entry| (MatchKind::Fuzzy, entry))
}

/// The record's `title`; missing, null and non-string titles read as empty.
fn doc_title(record: &ManifestDoc) -> &str {
    record.get("title").and_then(Value::as_str).unwrap_or("")
}

fn apply_entry(record: &mut ManifestDoc, entry: &SourceEntry) {
    if let Some(url) = entry.url.as_deref().filter(|u| !u.is_empty()) {
        record.insert("source".to_string(), Value::from(url));
    }
    if let Some(license) = entry.license.as_deref().filter(|l| !l.is_empty()) {
        record.insert("license".to_string(), Value::from(license));
    }
}
