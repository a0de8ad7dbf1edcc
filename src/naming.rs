//! Output filenames for cleaned documents.

use std::path::{Path, PathBuf};

const FALLBACK_SLUG: &str = "doc";

/// ASCII slug for a raw file stem: transliterated, lowercased, with runs of
/// anything else collapsed to `-`. Returns `doc` when nothing survives.
pub fn slug_for(stem: &str) -> String {
    let slug = slug::slugify(stem);
    if slug.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        slug
    }
}

/// First free path among `<slug>.txt`, `<slug>-1.txt`, `<slug>-2.txt`, …
/// in `dir`. Files left over from earlier runs count as taken.
pub fn unique_output_path(dir: &Path, slug: &str) -> PathBuf {
    unique_path_with(dir, slug, |p| p.exists())
}

/// Same as [`unique_output_path`] with a caller-supplied existence check,
/// used by dry runs that never touch the disk.
pub fn unique_path_with<F>(dir: &Path, slug: &str, taken: F) -> PathBuf
where
    F: Fn(&Path) -> bool,
{
    let mut candidate = dir.join(format!("{}.txt", slug));
    let mut i = 1;
    while taken(&candidate) {
        candidate = dir.join(format!("{}-{}.txt", slug, i));
        i += 1;
    }
    candidate
}
