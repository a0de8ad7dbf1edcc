//! JSON Lines manifest reading and writing.
//!
//! The clean stage writes typed [`ManifestRecord`](crate::models::ManifestRecord)s;
//! enrich and stats read lines back as loose [`ManifestDoc`](crate::models::ManifestDoc)
//! objects so hand-edited manifests (nulls, missing keys, extra keys) pass
//! through untouched.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::{CorpusError, Result};

/// Reads a manifest, tolerating a leading BOM and blank lines.
pub fn read_manifest<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let content = fs::read_to_string(path).map_err(|e| CorpusError::io(path, e))?;
    let content = content.strip_prefix('\u{FEFF}').unwrap_or(&content);

    let mut records = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(line).map_err(|source| CorpusError::ManifestLine {
            path: path.to_path_buf(),
            line: idx + 1,
            source,
        })?;
        records.push(record);
    }

    Ok(records)
}

/// Writes (truncating) one compact JSON object per line.
pub fn write_manifest<T: Serialize>(path: &Path, records: &[T]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| CorpusError::io(parent, e))?;
    }

    let file = File::create(path).map_err(|e| CorpusError::io(path, e))?;
    let mut out = BufWriter::new(file);
    for record in records {
        serde_json::to_writer(&mut out, record)?;
        out.write_all(b"\n").map_err(|e| CorpusError::io(path, e))?;
    }
    out.flush().map_err(|e| CorpusError::io(path, e))?;

    Ok(())
}
