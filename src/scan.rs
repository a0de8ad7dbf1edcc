use anyhow::{bail, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::config::CleanConfig;
use crate::models::RawFile;

/// Result of walking the raw directory.
#[derive(Debug, Default)]
pub struct RawScan {
    /// Accepted files, sorted by relative path.
    pub files: Vec<RawFile>,
    /// Entries the walk could not read; the rest of the tree is still
    /// scanned.
    pub failures: Vec<ScanFailure>,
}

#[derive(Debug)]
pub struct ScanFailure {
    pub path: PathBuf,
    pub message: String,
}

/// Walks `root` and returns every file accepted by the include and exclude
/// globs. Symlinks to files are always taken; `follow_symlinks` only decides
/// whether symlinked directories are descended into.
pub fn scan_raw_dir(root: &Path, config: &CleanConfig) -> Result<RawScan> {
    if !root.exists() {
        bail!("Raw directory does not exist: {}", root.display());
    }

    let include_set = build_globset(&config.include_globs)?;
    let exclude_set = build_globset(&config.exclude_globs)?;

    let mut files = Vec::new();
    let mut failures = Vec::new();

    let walker = WalkDir::new(root).follow_links(config.follow_symlinks);
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                let path = err.path().unwrap_or(root).to_path_buf();
                warn!("Skipping unreadable entry {}: {}", path.display(), err);
                failures.push(ScanFailure {
                    path,
                    message: err.to_string(),
                });
                continue;
            }
        };
        if !entry.path().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        if exclude_set.is_match(&rel_str) {
            debug!("Excluded: {}", rel_str);
            continue;
        }

        if !include_set.is_match(&rel_str) {
            debug!("Not included: {}", rel_str);
            continue;
        }

        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();

        files.push(RawFile {
            path: path.to_path_buf(),
            relative_path: rel_str,
            stem,
        });
    }

    files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));

    Ok(RawScan { files, failures })
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
