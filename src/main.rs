//! # Ryoma CLI (`ryoma`)
//!
//! Runs the corpus pipeline stages and the HTTP API.
//!
//! ## Usage
//!
//! ```bash
//! ryoma --config ./config/ryoma.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ryoma clean` | Decode, normalize and deduplicate raw files into the cleaned corpus |
//! | `ryoma enrich` | Fill `source` / `license` from the source log CSV |
//! | `ryoma stats` | Summarize a manifest |
//! | `ryoma serve` | Start the HTTP server |
//!
//! ## Examples
//!
//! ```bash
//! # Preview a clean run without writing anything
//! ryoma clean --dry-run
//!
//! # Enrich using a CSV kept outside the metadata directory
//! ryoma enrich --csv ~/sheets/source_log.csv
//!
//! # Start the API with debug logging
//! ryoma --verbose serve
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use ryoma_backend::clean::{run_clean, CleanOptions};
use ryoma_backend::config;
use ryoma_backend::enrich::{run_enrich, EnrichOptions};
use ryoma_backend::logging::init_logger;
use ryoma_backend::progress::ProgressMode;
use ryoma_backend::server;
use ryoma_backend::stats::run_stats;

/// Ryoma backend CLI — corpus preparation and HTTP API for the Ryoma-style
/// assistant.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/ryoma.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "ryoma",
    about = "Ryoma backend — corpus preparation pipeline and HTTP API",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/ryoma.toml`; built-in defaults are used when the
    /// file does not exist.
    #[arg(long, global = true, default_value = "./config/ryoma.toml")]
    config: PathBuf,

    /// Enable debug logging (overridden by `RUST_LOG`).
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Clean raw text files into the cleaned corpus.
    ///
    /// Decodes each file under `[paths].raw_dir`, normalizes the text, skips
    /// empty files and exact duplicates, writes `<slug>.txt` files and the
    /// local manifest.
    Clean {
        /// Process files and print counts without writing anything.
        #[arg(long)]
        dry_run: bool,

        /// Maximum number of files to process.
        #[arg(long)]
        limit: Option<usize>,

        /// Progress output on stderr: `off`, `human`, or `json`.
        #[arg(long, default_value = "off", value_parser = ProgressMode::parse)]
        progress: ProgressMode,
    },

    /// Enrich the local manifest from the source log CSV.
    Enrich {
        /// Source log CSV (default: `[enrich].source_csv`).
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Input manifest (default: `manifest_local.jsonl`).
        #[arg(long)]
        input: Option<PathBuf>,

        /// Output manifest (default: `manifest_enriched.jsonl`).
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Print a summary of a manifest.
    Stats {
        /// Manifest to read (default: enriched if present, else local).
        #[arg(long)]
        manifest: Option<PathBuf>,
    },

    /// Start the HTTP server on `[server].bind`.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logger(cli.verbose);

    let cfg = config::load_or_default(&cli.config)?;

    match cli.command {
        Commands::Clean {
            dry_run,
            limit,
            progress,
        } => {
            let options = CleanOptions { dry_run, limit };
            let reporter = progress.reporter();
            let report = run_clean(&cfg, &options, reporter.as_ref())?;

            println!("clean {}", cfg.paths.raw_dir.display());
            println!("  scanned: {} files", report.scanned);
            println!("  written: {} documents", report.written);
            println!("  duplicates skipped: {}", report.duplicates);
            println!("  empty skipped: {}", report.empty);
            println!("  errors: {}", report.failed);
            if dry_run {
                println!("  manifest: (dry run, not written)");
            } else {
                println!("  manifest: {}", report.manifest_path.display());
            }
            println!("ok");
        }
        Commands::Enrich { csv, input, output } => {
            let options = EnrichOptions { csv, input, output };
            let report = run_enrich(&cfg, &options)?;

            println!("enrich");
            println!("  exact: {}", report.counts.exact);
            println!("  fuzzy: {}", report.counts.fuzzy);
            println!("  missing: {}", report.counts.missing);
            println!("  wrote: {}", report.output_path.display());
            println!("ok");
        }
        Commands::Stats { manifest } => {
            run_stats(&cfg, manifest.as_deref())?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
