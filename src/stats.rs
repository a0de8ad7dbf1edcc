//! Manifest statistics.
//!
//! Gives a quick overview of what the corpus pipeline has produced: document
//! counts, text volume, token totals, and per-license / per-source
//! breakdowns. Used by `ryoma stats` to check that a clean or enrich run did
//! what was expected.

use anyhow::{Context, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::manifest::read_manifest;
use crate::models::ManifestDoc;

#[derive(Debug, Default, PartialEq, Eq)]
pub struct ManifestStats {
    pub documents: usize,
    pub total_chars: usize,
    pub total_tokens: usize,
    /// `(license, documents)`, most documents first.
    pub by_license: Vec<(String, usize)>,
    /// `(source, documents)`, most documents first.
    pub by_source: Vec<(String, usize)>,
}

/// Missing, null or non-numeric counts add nothing; missing or non-string
/// labels are grouped under `(none)`.
pub fn summarize(records: &[ManifestDoc]) -> ManifestStats {
    let mut licenses: HashMap<&str, usize> = HashMap::new();
    let mut sources: HashMap<&str, usize> = HashMap::new();
    let mut stats = ManifestStats::default();

    for record in records {
        stats.documents += 1;
        stats.total_chars += count_field(record, "char_count");
        stats.total_tokens += count_field(record, "token_estimate");
        *licenses.entry(label_field(record, "license")).or_default() += 1;
        *sources.entry(label_field(record, "source")).or_default() += 1;
    }

    stats.by_license = ranked(licenses);
    stats.by_source = ranked(sources);
    stats
}

fn count_field(record: &ManifestDoc, key: &str) -> usize {
    record
        .get(key)
        .and_then(Value::as_u64)
        .and_then(|n| usize::try_from(n).ok())
        .unwrap_or(0)
}

fn label_field<'r>(record: &'r ManifestDoc, key: &str) -> &'r str {
    match record.get(key).and_then(Value::as_str) {
        Some(value) if !value.is_empty() => value,
        _ => "(none)",
    }
}

fn ranked(counts: HashMap<&str, usize>) -> Vec<(String, usize)> {
    let mut rows: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
    rows.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    rows
}

/// The enriched manifest when it exists, otherwise the local one.
pub fn default_manifest_path(config: &Config) -> PathBuf {
    let enriched = config.manifest_enriched_path();
    if enriched.exists() {
        enriched
    } else {
        config.manifest_local_path()
    }
}

/// Run the stats command: read the manifest and print a summary.
pub fn run_stats(config: &Config, manifest: Option<&Path>) -> Result<()> {
    let path = manifest
        .map(Path::to_path_buf)
        .unwrap_or_else(|| default_manifest_path(config));

    let records: Vec<ManifestDoc> = read_manifest(&path)
        .with_context(|| format!("Failed to read manifest: {}", path.display()))?;
    let stats = summarize(&records);

    println!("Ryoma Corpus — Manifest Stats");
    println!("=============================");
    println!();
    println!("  Manifest:    {}", path.display());
    println!("  Documents:   {}", stats.documents);
    println!("  Characters:  {}", stats.total_chars);
    println!("  Tokens:      {}", stats.total_tokens);

    print_breakdown("LICENSE", &stats.by_license);
    print_breakdown("SOURCE", &stats.by_source);

    println!();
    Ok(())
}

fn print_breakdown(heading: &str, rows: &[(String, usize)]) {
    if rows.is_empty() {
        return;
    }
    println!();
    println!("  {:<48} {:>6}", heading, "DOCS");
    println!("  {}", "-".repeat(55));
    for (name, count) in rows {
        println!("  {:<48} {:>6}", name, count);
    }
}
