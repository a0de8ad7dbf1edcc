//! The clean stage: raw files in, deduplicated UTF-8 text and a local
//! manifest out.
//!
//! ```text
//! data/raw/**  ──▶ decode ──▶ normalize ──▶ hash ──▶ dedup ──▶ data/cleaned/<slug>.txt
//!                                                        └──▶ data/metadata/manifest_local.jsonl
//! ```
//!
//! Files are processed one at a time in path order. A failure on one file is
//! appended to `clean_errors.log` and the run carries on; only setup problems
//! (missing raw directory, unwritable output directories, the manifest write
//! itself) abort the run.

use anyhow::{Context, Result};
use chrono::{FixedOffset, SecondsFormat, Utc};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::decode::decode_bytes;
use crate::manifest::write_manifest;
use crate::models::{ManifestRecord, RawFile};
use crate::naming::{slug_for, unique_path_with};
use crate::normalize::Normalizer;
use crate::progress::{ProgressEvent, ProgressReporter};
use crate::scan::scan_raw_dir;
use crate::tokens::TokenEstimator;

/// Length of the hash prefix used as `doc_id`.
const DOC_ID_LEN: usize = 16;

#[derive(Debug, Clone, Default)]
pub struct CleanOptions {
    /// Count everything, write nothing.
    pub dry_run: bool,
    /// Process at most this many scanned files.
    pub limit: Option<usize>,
}

#[derive(Debug, Default)]
pub struct CleanReport {
    pub scanned: usize,
    pub written: usize,
    pub duplicates: usize,
    pub empty: usize,
    pub failed: usize,
    pub records: Vec<ManifestRecord>,
    pub manifest_path: PathBuf,
}

enum Outcome {
    Kept(Box<ManifestRecord>),
    Duplicate(String),
    Empty,
}

pub fn run_clean(
    config: &Config,
    options: &CleanOptions,
    progress: &dyn ProgressReporter,
) -> Result<CleanReport> {
    let raw_dir = &config.paths.raw_dir;

    progress.report(ProgressEvent::Scanning {
        dir: raw_dir.display().to_string(),
    });
    let scan = scan_raw_dir(raw_dir, &config.clean)?;
    let mut files = scan.files;
    if let Some(limit) = options.limit {
        files.truncate(limit);
    }
    info!("Found {} raw files under {}", files.len(), raw_dir.display());

    if !options.dry_run {
        fs::create_dir_all(&config.paths.cleaned_dir).with_context(|| {
            format!(
                "Failed to create cleaned directory: {}",
                config.paths.cleaned_dir.display()
            )
        })?;
        fs::create_dir_all(&config.paths.metadata_dir).with_context(|| {
            format!(
                "Failed to create metadata directory: {}",
                config.paths.metadata_dir.display()
            )
        })?;
    }

    let mut cleaner = Cleaner::new(config, options.dry_run)?;
    let error_log = ErrorLog::new(config.error_log_path(), options.dry_run);

    let mut report = CleanReport {
        scanned: files.len(),
        manifest_path: config.manifest_local_path(),
        ..Default::default()
    };

    for failure in &scan.failures {
        report.failed += 1;
        error_log.append(&failure.path, &failure.message);
    }

    let total = files.len() as u64;
    for (i, file) in files.iter().enumerate() {
        match cleaner.clean_file(file) {
            Ok(Outcome::Kept(record)) => {
                debug!("Kept {} -> {}", file.relative_path, record.local_path);
                report.written += 1;
                report.records.push(*record);
            }
            Ok(Outcome::Duplicate(hash)) => {
                debug!("Duplicate {} (hash {})", file.relative_path, hash);
                report.duplicates += 1;
            }
            Ok(Outcome::Empty) => {
                debug!("Empty after normalization: {}", file.relative_path);
                report.empty += 1;
            }
            Err(e) => {
                warn!("Failed to clean {}: {:#}", file.path.display(), e);
                report.failed += 1;
                error_log.append(&file.path, &format!("{:#}", e));
            }
        }
        progress.report(ProgressEvent::Cleaning {
            n: i as u64 + 1,
            total,
        });
    }

    if !options.dry_run {
        write_manifest(&report.manifest_path, &report.records).with_context(|| {
            format!(
                "Failed to write manifest: {}",
                report.manifest_path.display()
            )
        })?;
    }

    Ok(report)
}

struct Cleaner<'a> {
    config: &'a Config,
    dry_run: bool,
    normalizer: Normalizer,
    estimator: TokenEstimator,
    offset: FixedOffset,
    seen_hashes: HashSet<String>,
    /// Output paths handed out in this run (dry runs never create them).
    claimed: HashSet<PathBuf>,
}

impl<'a> Cleaner<'a> {
    fn new(config: &'a Config, dry_run: bool) -> Result<Self> {
        let offset = config.utc_offset()?;

        Ok(Self {
            config,
            dry_run,
            normalizer: Normalizer::new(config.clean.text.clone()),
            estimator: TokenEstimator::from_name(&config.clean.tokenizer)?,
            offset,
            seen_hashes: HashSet::new(),
            claimed: HashSet::new(),
        })
    }

    fn clean_file(&mut self, file: &RawFile) -> Result<Outcome> {
        let raw = fs::read(&file.path)
            .with_context(|| format!("Failed to read {}", file.path.display()))?;

        let decoded = decode_bytes(&raw);
        debug!(
            "Decoded {} as {}",
            file.relative_path,
            decoded.encoding.name()
        );
        if decoded.dropped_bytes > 0 {
            warn!(
                "Dropped {} undecodable bytes from {}",
                decoded.dropped_bytes, file.relative_path
            );
        }

        let text = self.normalizer.normalize(&decoded.text);
        if text.is_empty() {
            return Ok(Outcome::Empty);
        }

        let hash = sha256_hex(&text);
        if self.seen_hashes.contains(&hash) {
            return Ok(Outcome::Duplicate(hash));
        }

        let out_path = self.next_output_path(&file.stem);
        if !self.dry_run {
            fs::write(&out_path, &text)
                .with_context(|| format!("Failed to write {}", out_path.display()))?;
        }
        self.claimed.insert(out_path.clone());
        self.seen_hashes.insert(hash.clone());

        let clean = &self.config.clean;
        let record = ManifestRecord {
            doc_id: hash[..DOC_ID_LEN].to_string(),
            title: file.stem.clone(),
            lang: clean.lang.clone(),
            source: clean.default_source.clone(),
            license: clean.default_license.clone(),
            created_at: Utc::now()
                .with_timezone(&self.offset)
                .to_rfc3339_opts(SecondsFormat::Micros, false),
            hash,
            local_path: out_path.display().to_string(),
            char_count: text.chars().count(),
            token_estimate: self.estimator.estimate(&text),
            tags: clean.tags.clone(),
        };

        Ok(Outcome::Kept(Box::new(record)))
    }

    fn next_output_path(&self, stem: &str) -> PathBuf {
        let slug = slug_for(stem);
        unique_path_with(&self.config.paths.cleaned_dir, &slug, |p| {
            self.claimed.contains(p) || p.exists()
        })
    }
}

/// Lowercase hex SHA-256 of the text's UTF-8 bytes.
pub fn sha256_hex(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Append-only `<path>\t<error>` log. Best effort: a failure to log is
/// itself only logged.
struct ErrorLog {
    path: PathBuf,
    dry_run: bool,
}

impl ErrorLog {
    fn new(path: PathBuf, dry_run: bool) -> Self {
        Self { path, dry_run }
    }

    fn append(&self, file: &Path, message: &str) {
        if self.dry_run {
            return;
        }
        let line = format!("{}\t{}\n", file.display(), message).replace('\r', " ");
        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut f| f.write_all(line.as_bytes()));
        if let Err(e) = result {
            warn!(
                "Could not write to error log {}: {}",
                self.path.display(),
                e
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::read_manifest;
    use crate::progress::NoProgress;
    use tempfile::TempDir;

    fn test_config(root: &Path) -> Config {
        let mut config = Config::default();
        config.paths.raw_dir = root.join("raw");
        config.paths.cleaned_dir = root.join("cleaned");
        config.paths.metadata_dir = root.join("metadata");
        config.clean.tokenizer = "chars".to_string();
        fs::create_dir_all(&config.paths.raw_dir).unwrap();
        config
    }

    fn write_raw(config: &Config, rel: &str, bytes: &[u8]) {
        let path = config.paths.raw_dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, bytes).unwrap();
    }

    fn clean(config: &Config) -> CleanReport {
        run_clean(config, &CleanOptions::default(), &NoProgress).unwrap()
    }

    #[test]
    fn test_sha256_hex() {
        assert_eq!(
            sha256_hex("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_clean_writes_text_and_manifest() {
        let tmp = TempDir::new().unwrap();
        let config = test_config(tmp.path());
        write_raw(&config, "Ryoma Letters.txt", "  手紙\r\n\r\n\r\n\r\n本文  ".as_bytes());

        let report = clean(&config);
        assert_eq!(report.scanned, 1);
        assert_eq!(report.written, 1);

        let rec = &report.records[0];
        assert_eq!(rec.title, "Ryoma Letters");
        assert_eq!(rec.lang, "ja");
        assert_eq!(rec.source, "unknown");
        assert_eq!(rec.license, "unknown");
        assert_eq!(rec.tags, vec!["ryoma", "bakumatsu"]);
        assert_eq!(rec.hash, sha256_hex("手紙\n\n本文"));
        assert_eq!(rec.doc_id, &rec.hash[..16]);
        assert_eq!(rec.char_count, 6);
        assert_eq!(rec.token_estimate, 4 + 1);
        assert!(rec.created_at.ends_with("+09:00"), "{}", rec.created_at);

        let out = config.paths.cleaned_dir.join("ryoma-letters.txt");
        assert_eq!(rec.local_path, out.display().to_string());
        assert_eq!(fs::read_to_string(out).unwrap(), "手紙\n\n本文");

        let manifest: Vec<ManifestRecord> = read_manifest(&config.manifest_local_path()).unwrap();
        assert_eq!(manifest, report.records);
    }

    #[test]
    fn test_duplicates_skipped_after_normalization() {
        let tmp = TempDir::new().unwrap();
        let config = test_config(tmp.path());
        write_raw(&config, "a.txt", b"same text\n");
        write_raw(&config, "b.txt", b"same text\r\n\r\n\r\n");
        write_raw(&config, "c.txt", b"other text");

        let report = clean(&config);
        assert_eq!(report.written, 2);
        assert_eq!(report.duplicates, 1);
        let titles: Vec<&str> = report.records.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["a", "c"]);
    }

    #[test]
    fn test_empty_files_skipped() {
        let tmp = TempDir::new().unwrap();
        let config = test_config(tmp.path());
        write_raw(&config, "blank.txt", b" \n\x00\x01\r\n ");

        let report = clean(&config);
        assert_eq!(report.empty, 1);
        assert_eq!(report.written, 0);
        assert_eq!(fs::read_to_string(config.manifest_local_path()).unwrap(), "");
    }

    #[test]
    fn test_slug_collisions_within_run() {
        let tmp = TempDir::new().unwrap();
        let config = test_config(tmp.path());
        write_raw(&config, "x/Notes.txt", b"one");
        write_raw(&config, "y/notes.md", b"two");
        write_raw(&config, "z/NOTES.txt", b"three");

        let report = clean(&config);
        let paths: Vec<String> = report.records.iter().map(|r| r.local_path.clone()).collect();
        let dir = &config.paths.cleaned_dir;
        assert_eq!(
            paths,
            vec![
                dir.join("notes.txt").display().to_string(),
                dir.join("notes-1.txt").display().to_string(),
                dir.join("notes-2.txt").display().to_string(),
            ]
        );
    }

    #[test]
    fn test_unsluggable_stem_falls_back_to_doc() {
        let tmp = TempDir::new().unwrap();
        let config = test_config(tmp.path());
        write_raw(&config, "！！.txt", b"body");

        let report = clean(&config);
        assert_eq!(report.records[0].title, "！！");
        assert!(report.records[0].local_path.ends_with("doc.txt"));
    }

    #[test]
    fn test_shift_jis_input_decoded() {
        let tmp = TempDir::new().unwrap();
        let config = test_config(tmp.path());
        let (bytes, _, _) = encoding_rs::SHIFT_JIS.encode("薩長同盟を仲介した");
        write_raw(&config, "sjis.txt", &bytes);

        let report = clean(&config);
        let text = fs::read_to_string(&report.records[0].local_path).unwrap();
        assert_eq!(text, "薩長同盟を仲介した");
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let tmp = TempDir::new().unwrap();
        let config = test_config(tmp.path());
        write_raw(&config, "a.txt", b"alpha");
        write_raw(&config, "b.txt", b"beta");

        let options = CleanOptions {
            dry_run: true,
            limit: None,
        };
        let report = run_clean(&config, &options, &NoProgress).unwrap();
        assert_eq!(report.written, 2);
        assert!(!config.paths.cleaned_dir.exists());
        assert!(!config.manifest_local_path().exists());
    }

    #[test]
    fn test_limit() {
        let tmp = TempDir::new().unwrap();
        let config = test_config(tmp.path());
        write_raw(&config, "a.txt", b"alpha");
        write_raw(&config, "b.txt", b"beta");

        let options = CleanOptions {
            dry_run: false,
            limit: Some(1),
        };
        let report = run_clean(&config, &options, &NoProgress).unwrap();
        assert_eq!(report.scanned, 1);
        assert_eq!(report.records[0].title, "a");
    }

    #[test]
    fn test_rerun_does_not_overwrite_previous_output() {
        let tmp = TempDir::new().unwrap();
        let config = test_config(tmp.path());
        write_raw(&config, "a.txt", b"alpha");

        clean(&config);
        let second = clean(&config);
        assert!(second.records[0].local_path.ends_with("a-1.txt"));
    }

    #[test]
    fn test_write_failure_logged_and_run_continues() {
        let tmp = TempDir::new().unwrap();
        let config = test_config(tmp.path());
        // Fits as a raw name, but its transliterated slug exceeds NAME_MAX.
        let long_stem = "龍".repeat(80);
        write_raw(&config, &format!("{}.txt", long_stem), b"too long to write");
        write_raw(&config, "ok.txt", b"fine");

        let report = clean(&config);
        assert_eq!(report.failed, 1);
        assert_eq!(report.written, 1);
        assert_eq!(report.records[0].title, "ok");

        let log = fs::read_to_string(config.error_log_path()).unwrap();
        assert_eq!(log.lines().count(), 1);
        let (path, message) = log.trim_end().split_once('\t').unwrap();
        assert!(path.ends_with(&format!("{}.txt", long_stem)));
        assert!(message.contains("Failed to write"));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_raw_file_is_cleaned() {
        let tmp = TempDir::new().unwrap();
        let config = test_config(tmp.path());
        let target = tmp.path().join("elsewhere.txt");
        fs::write(&target, "本文").unwrap();
        std::os::unix::fs::symlink(&target, config.paths.raw_dir.join("link.txt")).unwrap();

        let report = clean(&config);
        assert_eq!(report.scanned, 1);
        assert_eq!(report.written, 1);
        assert_eq!(report.records[0].title, "link");
    }

    #[cfg(unix)]
    #[test]
    fn test_walk_error_logged_and_run_continues() {
        let tmp = TempDir::new().unwrap();
        let mut config = test_config(tmp.path());
        config.clean.follow_symlinks = true;
        write_raw(&config, "ok.txt", b"fine");
        fs::create_dir_all(config.paths.raw_dir.join("sub")).unwrap();
        std::os::unix::fs::symlink(&config.paths.raw_dir, config.paths.raw_dir.join("sub/loop"))
            .unwrap();

        let report = clean(&config);
        assert_eq!(report.failed, 1);
        assert_eq!(report.written, 1);

        let log = fs::read_to_string(config.error_log_path()).unwrap();
        assert_eq!(log.lines().count(), 1);
        let (path, message) = log.trim_end().split_once('\t').unwrap();
        assert!(path.ends_with("sub/loop"), "{}", path);
        assert!(message.contains("loop"), "{}", message);
    }

    #[test]
    fn test_missing_raw_dir_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let mut config = test_config(tmp.path());
        config.paths.raw_dir = tmp.path().join("nope");
        assert!(run_clean(&config, &CleanOptions::default(), &NoProgress).is_err());
    }
}
