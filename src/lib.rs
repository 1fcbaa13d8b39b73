//! # docsum
//!
//! Batch document summarization: collect documents from a local folder or
//! Google Drive, extract their text, ask an OpenRouter-hosted model for a
//! summary of each, then synthesize a master summary and write a JSON report.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌────────────┐   ┌────────────┐   ┌────────────┐
//! │   Sources    │──▶│  Extract   │──▶│ Summarize  │──▶│ Aggregate  │──▶ report.json
//! │ FS / Drive   │   │  registry  │   │ per doc    │   │  master    │
//! └──────────────┘   └────────────┘   └────────────┘   └────────────┘
//! ```
//!
//! A failure on one document never stops the batch: parsers return a
//! placeholder, summaries record an error status, and the master summary is
//! built from whatever succeeded.
//!
//! ## Quick Start
//!
//! ```bash
//! export OPENROUTER_API_KEY=sk-or-...
//! docsum local --folder ./downloaded_files
//! docsum download --file-ids 1AbC... 1XyZ... --keep-downloads
//! docsum drive --folder https://drive.google.com/drive/folders/<ID>
//! docsum parse ./notes.docx
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`traits`] | `Parser` / `Source` traits and the parser registry |
//! | [`extract`] | Built-in format extractors |
//! | [`rtf`] | RTF to plain text |
//! | [`connector_fs`] | Local folder source |
//! | [`connector_drive`] | Drive API and explicit file id sources |
//! | [`connector_public`] | Public Drive folder scraping |
//! | [`download`] | Remote fetch and type detection |
//! | [`llm`] | OpenRouter chat completion client |
//! | [`summarize`] | Per-document summaries |
//! | [`aggregate`] | Master summary and statistics |
//! | [`ingest`] | Pipeline orchestration |
//! | [`progress`] | Progress reporting |
//! | [`report`] | JSON report and console rendering |

pub mod aggregate;
pub mod config;
pub mod connector_drive;
pub mod connector_fs;
pub mod connector_public;
pub mod download;
pub mod extract;
pub mod ingest;
pub mod llm;
pub mod models;
pub mod progress;
pub mod report;
pub mod rtf;
pub mod summarize;
pub mod traits;
