//! TOML configuration for the corpus pipeline and the HTTP server.
//!
//! Every field has a default, so an empty file (or no file at all) yields a
//! working configuration pointing at `data/raw`, `data/cleaned` and
//! `data/metadata`. A handful of server settings can be overridden from the
//! environment (after loading `.env`), see [`apply_env_overrides`].

use anyhow::{Context, Result};
use chrono::FixedOffset;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub clean: CleanConfig,
    #[serde(default)]
    pub enrich: EnrichConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PathsConfig {
    #[serde(default = "default_raw_dir")]
    pub raw_dir: PathBuf,
    #[serde(default = "default_cleaned_dir")]
    pub cleaned_dir: PathBuf,
    #[serde(default = "default_metadata_dir")]
    pub metadata_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            raw_dir: default_raw_dir(),
            cleaned_dir: default_cleaned_dir(),
            metadata_dir: default_metadata_dir(),
        }
    }
}

fn default_raw_dir() -> PathBuf {
    PathBuf::from("data/raw")
}
fn default_cleaned_dir() -> PathBuf {
    PathBuf::from("data/cleaned")
}
fn default_metadata_dir() -> PathBuf {
    PathBuf::from("data/metadata")
}

#[derive(Debug, Deserialize, Clone)]
pub struct CleanConfig {
    #[serde(default = "default_lang")]
    pub lang: String,
    #[serde(default = "default_unknown")]
    pub default_source: String,
    #[serde(default = "default_unknown")]
    pub default_license: String,
    #[serde(default = "default_tags")]
    pub tags: Vec<String>,
    /// Offset applied to `created_at` timestamps. JST by default.
    #[serde(default = "default_utc_offset_hours")]
    pub utc_offset_hours: i32,
    /// `cl100k_base` or `chars`.
    #[serde(default = "default_tokenizer")]
    pub tokenizer: String,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
    #[serde(default)]
    pub text: TextFixConfig,
}

impl Default for CleanConfig {
    fn default() -> Self {
        Self {
            lang: default_lang(),
            default_source: default_unknown(),
            default_license: default_unknown(),
            tags: default_tags(),
            utc_offset_hours: default_utc_offset_hours(),
            tokenizer: default_tokenizer(),
            include_globs: default_include_globs(),
            exclude_globs: Vec::new(),
            follow_symlinks: false,
            text: TextFixConfig::default(),
        }
    }
}

fn default_lang() -> String {
    "ja".to_string()
}
fn default_unknown() -> String {
    "unknown".to_string()
}
fn default_tags() -> Vec<String> {
    vec!["ryoma".to_string(), "bakumatsu".to_string()]
}
fn default_utc_offset_hours() -> i32 {
    9
}
fn default_tokenizer() -> String {
    "cl100k_base".to_string()
}
fn default_include_globs() -> Vec<String> {
    vec!["**/*".to_string()]
}

/// Toggles for the individual text repair passes.
#[derive(Debug, Deserialize, Clone)]
pub struct TextFixConfig {
    #[serde(default = "default_true")]
    pub fix_mojibake: bool,
    #[serde(default = "default_true")]
    pub fix_entities: bool,
    #[serde(default = "default_true")]
    pub uncurl_quotes: bool,
    #[serde(default = "default_true")]
    pub fix_ligatures: bool,
    #[serde(default = "default_true")]
    pub fix_width: bool,
    #[serde(default = "default_true")]
    pub normalize_nfc: bool,
}

impl Default for TextFixConfig {
    fn default() -> Self {
        Self {
            fix_mojibake: true,
            fix_entities: true,
            uncurl_quotes: true,
            fix_ligatures: true,
            fix_width: true,
            normalize_nfc: true,
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct EnrichConfig {
    /// Resolved against `paths.metadata_dir` when relative.
    #[serde(default = "default_source_csv")]
    pub source_csv: PathBuf,
    #[serde(default = "default_title_keys")]
    pub title_keys: Vec<String>,
    #[serde(default = "default_fuzzy_prefix_chars")]
    pub fuzzy_prefix_chars: usize,
}

impl Default for EnrichConfig {
    fn default() -> Self {
        Self {
            source_csv: default_source_csv(),
            title_keys: default_title_keys(),
            fuzzy_prefix_chars: default_fuzzy_prefix_chars(),
        }
    }
}

fn default_source_csv() -> PathBuf {
    PathBuf::from("source_log.csv")
}
fn default_title_keys() -> Vec<String> {
    ["title", "name", "作品名", "Title"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_fuzzy_prefix_chars() -> usize {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Empty means no CORS headers at all; `"*"` allows any origin.
    #[serde(default)]
    pub cors_origins: Vec<String>,
    /// Empty allows every `Host`.
    #[serde(default)]
    pub allowed_hosts: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            cors_origins: Vec::new(),
            allowed_hosts: Vec::new(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

impl Config {
    pub fn manifest_local_path(&self) -> PathBuf {
        self.paths.metadata_dir.join("manifest_local.jsonl")
    }

    pub fn manifest_enriched_path(&self) -> PathBuf {
        self.paths.metadata_dir.join("manifest_enriched.jsonl")
    }

    pub fn error_log_path(&self) -> PathBuf {
        self.paths.metadata_dir.join("clean_errors.log")
    }

    /// Offset used for manifest `created_at` and the `/health` timestamp.
    pub fn utc_offset(&self) -> Result<FixedOffset> {
        FixedOffset::east_opt(self.clean.utc_offset_hours * 3600).with_context(|| {
            format!(
                "Invalid UTC offset: {} hours",
                self.clean.utc_offset_hours
            )
        })
    }

    pub fn source_csv_path(&self) -> PathBuf {
        if self.enrich.source_csv.is_absolute() {
            self.enrich.source_csv.clone()
        } else {
            self.paths.metadata_dir.join(&self.enrich.source_csv)
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;
    Ok(config)
}

/// Loads `path` if it exists, otherwise falls back to defaults. Environment
/// overrides are applied in both cases.
pub fn load_or_default(path: &Path) -> Result<Config> {
    dotenvy::dotenv().ok();

    let mut config = if path.exists() {
        load_config(path)?
    } else {
        warn!(
            "Config file {} not found, using built-in defaults",
            path.display()
        );
        Config::default()
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    validate(&config)?;
    Ok(config)
}

/// Applies `RYOMA_BIND`, `RYOMA_CORS_ORIGINS` and `RYOMA_ALLOWED_HOSTS`.
///
/// The list variables are comma-separated; blank entries are dropped.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(bind) = lookup("RYOMA_BIND") {
        config.server.bind = bind.trim().to_string();
    }
    if let Some(origins) = lookup("RYOMA_CORS_ORIGINS") {
        config.server.cors_origins = split_list(&origins);
    }
    if let Some(hosts) = lookup("RYOMA_ALLOWED_HOSTS") {
        config.server.allowed_hosts = split_list(&hosts);
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn validate(config: &Config) -> Result<()> {
    if !(-23..=23).contains(&config.clean.utc_offset_hours) {
        anyhow::bail!("clean.utc_offset_hours must be in [-23, 23]");
    }

    match config.clean.tokenizer.as_str() {
        "cl100k_base" | "chars" => {}
        other => anyhow::bail!(
            "Unknown tokenizer: '{}'. Must be cl100k_base or chars.",
            other
        ),
    }

    if config.enrich.fuzzy_prefix_chars == 0 {
        anyhow::bail!("enrich.fuzzy_prefix_chars must be > 0");
    }

    if config.enrich.title_keys.is_empty() {
        anyhow::bail!("enrich.title_keys must not be empty");
    }

    if config.server.bind.trim().is_empty() {
        anyhow::bail!("server.bind must not be empty");
    }

    Ok(())
}
