//! # Ryoma Backend
//!
//! Corpus preparation pipeline and HTTP API for the Ryoma-style assistant.
//!
//! Raw Japanese text files are decoded, normalized, deduplicated and written
//! as a cleaned corpus with a JSON Lines manifest. A hand-maintained source
//! log CSV then fills in provenance (`source`, `license`) for each manifest
//! record. A small JSON HTTP service exposes health, version and a stub
//! question endpoint.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌────────────────────┐
//! │ raw/*.txt│──▶│    clean     │──▶│ cleaned/ + manifest │
//! └──────────┘   │ decode+normal│   └─────────┬──────────┘
//!                └──────────────┘             │
//!                 ┌──────────────┐            ▼
//!                 │source_log.csv│──▶┌──────────────┐
//!                 └──────────────┘   │    enrich    │──▶ manifest_enriched
//!                                    └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! ryoma clean                   # raw/ → cleaned/ + manifest_local.jsonl
//! ryoma enrich                  # join source_log.csv → manifest_enriched.jsonl
//! ryoma stats                   # summarize the manifest
//! ryoma serve                   # start HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and environment overrides |
//! | [`models`] | Core data types |
//! | [`error`] | Typed loader errors |
//! | [`scan`] | Raw directory discovery |
//! | [`decode`] | Encoding detection and decoding |
//! | [`textfix`] | Mojibake and typography repair |
//! | [`normalize`] | Whitespace and control-character normalization |
//! | [`naming`] | Output file naming |
//! | [`tokens`] | Token estimation |
//! | [`manifest`] | JSONL manifest I/O |
//! | [`source_log`] | Source log CSV loader |
//! | [`clean`] | The clean stage |
//! | [`enrich`] | The enrich stage |
//! | [`stats`] | Manifest summary |
//! | [`progress`] | Progress reporting |
//! | [`server`] | HTTP API |
//! | [`logging`] | Tracing subscriber setup |

pub mod clean;
pub mod config;
pub mod decode;
pub mod enrich;
pub mod error;
pub mod logging;
pub mod manifest;
pub mod models;
pub mod naming;
pub mod normalize;
pub mod progress;
pub mod scan;
pub mod server;
pub mod source_log;
pub mod stats;
pub mod textfix;
pub mod tokens;
