//! Core data types that flow through the clean and enrich stages.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;

/// A file discovered under the raw directory, before any decoding.
#[derive(Debug, Clone)]
pub struct RawFile {
    pub path: PathBuf,
    /// Path relative to the raw directory, `/`-separated on every platform.
    pub relative_path: String,
    /// File name without its last extension.
    pub stem: String,
}

/// One line of `manifest_local.jsonl` as written by the clean stage.
///
/// Fields missing from an input line default to empty values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManifestRecord {
    #[serde(default)]
    pub doc_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub lang: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub license: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub hash: String,
    #[serde(default)]
    pub local_path: String,
    #[serde(default)]
    pub char_count: usize,
    #[serde(default)]
    pub token_estimate: usize,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// A manifest line as a plain JSON object, key order preserved. Used by
/// stages that must write records back without reshaping them.
pub type ManifestDoc = Map<String, Value>;

/// Metadata for one title in the source log CSV.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceEntry {
    pub url: Option<String>,
    pub license: Option<String>,
}
