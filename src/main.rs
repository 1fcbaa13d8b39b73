//! # docsum CLI
//!
//! The `docsum` binary runs one summarization batch per invocation and
//! writes a JSON report plus a console summary.
//!
//! ## Usage
//!
//! ```bash
//! docsum --config ./config/docsum.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docsum local` | Summarize the files in a local folder |
//! | `docsum download` | Download Drive files by id, then summarize them |
//! | `docsum drive` | List a Drive folder through the API and summarize it |
//! | `docsum public` | Scrape a public Drive folder and summarize what it finds |
//! | `docsum urls` | Let the model read Drive files by URL, no download |
//! | `docsum parse` | Extract one file and print its text |
//!
//! ## Exit codes
//!
//! `0` on success, including runs where some documents failed; `1` for
//! configuration errors, empty batches and other fatal errors; `130` when
//! interrupted with Ctrl-C.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use docsum::aggregate::Aggregator;
use docsum::config::{self, Config};
use docsum::connector_drive::{DriveApiSource, FileIdSource};
use docsum::connector_fs::LocalFolderSource;
use docsum::connector_public::PublicFolderSource;
use docsum::download::Downloader;
use docsum::ingest::{self, Extractor, RunOptions};
use docsum::llm::{CompletionClient, OpenRouterClient};
use docsum::models::{Method, ParseStatus};
use docsum::progress::{format_number, ProgressMode};
use docsum::report;
use docsum::summarize::{Input, Summarizer};
use docsum::traits::{ParserRegistry, Source};

/// docsum: batch document summarization over OpenRouter.
///
/// Every command except `parse` needs an OpenRouter API key, read from
/// `--api-key`, `llm.api_key` in the config file, or `OPENROUTER_API_KEY`.
#[derive(Parser)]
#[command(
    name = "docsum",
    about = "Summarize a batch of documents and build a master summary",
    version,
    long_about = "docsum collects documents from a local folder or Google Drive, extracts their \
    text (PDF, Word, Excel, HTML, RTF, plain text), summarizes each one with an OpenRouter-hosted \
    model, and synthesizes a master summary into a JSON report."
)]
struct Cli {
    /// Path to configuration file (TOML). Missing file means all defaults.
    #[arg(long, global = true, default_value = "./config/docsum.toml")]
    config: PathBuf,

    /// OpenRouter API key. Overrides the config file and environment.
    #[arg(long, global = true)]
    api_key: Option<String>,

    /// Model used for text summaries and the master summary.
    #[arg(long, global = true)]
    model: Option<String>,

    /// Where to write the JSON report.
    #[arg(long, global = true)]
    output: Option<PathBuf>,

    /// Print the report but do not write the JSON file.
    #[arg(long, global = true)]
    no_save: bool,

    /// Progress output on stderr.
    #[arg(long, global = true, value_enum, default_value = "auto")]
    progress: ProgressMode,

    /// Documents summarized at once.
    #[arg(long, global = true)]
    concurrency: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarize every file in a local folder (non-recursive).
    Local {
        /// Folder to scan. Defaults to `local.folder` from the config.
        #[arg(long)]
        folder: Option<PathBuf>,
    },

    /// Download Drive files by id, extract their text and summarize them.
    Download {
        #[command(flatten)]
        ids: FileIds,

        /// Also save the downloaded files to `drive.download_dir`.
        #[arg(long)]
        keep_downloads: bool,
    },

    /// List a Drive folder with the Drive API and summarize its files.
    Drive {
        /// Folder URL (`.../folders/<ID>` or `...?id=<ID>`).
        #[arg(long)]
        folder: String,

        /// OAuth access token. Defaults to `GOOGLE_DRIVE_ACCESS_TOKEN`.
        #[arg(long)]
        access_token: Option<String>,

        #[arg(long, value_enum, default_value = "download")]
        via: Via,
    },

    /// Scrape a public ("anyone with the link") folder page for file ids.
    ///
    /// Best effort: the page may not list every file.
    Public {
        #[arg(long)]
        folder: String,

        #[arg(long, value_enum, default_value = "download")]
        via: Via,
    },

    /// Summarize Drive files by handing their URLs to the model.
    Urls {
        #[command(flatten)]
        ids: FileIds,
    },

    /// Extract a single file and print the text. No API key needed.
    Parse {
        path: PathBuf,
    },
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct FileIds {
    /// Drive file ids.
    #[arg(long, num_args = 1..)]
    file_ids: Vec<String>,

    /// File with one Drive file id per line (`#` comments allowed).
    #[arg(long)]
    file_list: Option<PathBuf>,
}

impl FileIds {
    fn into_source(self, config: &Config) -> Result<FileIdSource> {
        match self.file_list {
            Some(path) => FileIdSource::from_file(&path, &config.drive),
            None => Ok(FileIdSource::new(self.file_ids, &config.drive)),
        }
    }
}

/// How remote files reach the model.
#[derive(Clone, Copy, ValueEnum)]
enum Via {
    /// Download, extract text locally, summarize the text.
    Download,
    /// Pass the file URL to a document-capable model.
    Url,
}

impl Via {
    fn input(self) -> Input {
        match self {
            Via::Download => Input::Content,
            Via::Url => Input::Url,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("docsum=info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    tokio::select! {
        result = run(cli) => match result {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("Error: {:#}", e);
                ExitCode::from(1)
            }
        },
        Ok(()) = tokio::signal::ctrl_c() => {
            eprintln!("\nInterrupted.");
            ExitCode::from(130)
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    if let Commands::Parse { path } = &cli.command {
        return parse_file(path);
    }

    let mut cfg = config::load_or_default(&cli.config)?;
    apply_overrides(&mut cfg, &cli);
    cfg.validate()?;

    // Everything that can be misconfigured is checked before the first request.
    let api_key = cfg.llm.resolve_api_key()?;
    let registry = ParserRegistry::with_builtins();

    let (source, extractor, options): (Box<dyn Source>, Extractor, RunOptions) = match cli.command
    {
        Commands::Local { .. } => (
            Box::new(LocalFolderSource::new(cfg.local.folder.clone(), &cfg.local)?),
            Extractor::new(registry),
            RunOptions {
                method: Method::LocalFolder,
                input: Input::Content,
            },
        ),
        Commands::Download {
            ids,
            keep_downloads,
        } => {
            let mut extractor =
                Extractor::new(registry).with_downloader(Downloader::new(&cfg.drive)?);
            if keep_downloads {
                extractor = extractor.keep_downloads_in(cfg.drive.download_dir.clone());
            }
            (
                Box::new(ids.into_source(&cfg)?),
                extractor,
                RunOptions {
                    method: Method::DownloadAndParse,
                    input: Input::Content,
                },
            )
        }
        Commands::Drive { folder, via, .. } => {
            let token = cfg.drive.resolve_access_token()?;
            (
                Box::new(DriveApiSource::new(&folder, token, &cfg.drive)?),
                Extractor::new(registry).with_downloader(Downloader::new(&cfg.drive)?),
                RunOptions {
                    method: Method::GoogleDriveApi,
                    input: via.input(),
                },
            )
        }
        Commands::Public { folder, via } => (
            Box::new(PublicFolderSource::new(&folder, &cfg.drive)?),
            Extractor::new(registry).with_downloader(Downloader::new(&cfg.drive)?),
            RunOptions {
                method: Method::PublicFolderAuto,
                input: via.input(),
            },
        ),
        Commands::Urls { ids } => (
            Box::new(ids.into_source(&cfg)?),
            Extractor::new(registry),
            RunOptions {
                method: Method::DirectFileIds,
                input: Input::Url,
            },
        ),
        Commands::Parse { path } => return parse_file(&path),
    };

    let client: Arc<dyn CompletionClient> = Arc::new(OpenRouterClient::new(&cfg.llm, api_key)?);
    let summarizer = Summarizer::new(client.clone(), &cfg);
    let aggregator = Aggregator::new(client, &cfg);
    let progress = cli.progress.reporter();

    let report = ingest::run_pipeline(
        source.as_ref(),
        &extractor,
        &summarizer,
        &aggregator,
        &options,
        progress.as_ref(),
    )
    .await?;

    if !cli.no_save {
        report::write_report(&report, &cfg.output.path)?;
    }
    report::print_report(&report);

    Ok(())
}

/// CLI flags win over the config file, which wins over the environment.
fn apply_overrides(cfg: &mut Config, cli: &Cli) {
    if let Some(key) = &cli.api_key {
        cfg.llm.api_key = Some(key.clone());
    }
    if let Some(model) = &cli.model {
        cfg.llm.model = model.clone();
    }
    if let Some(output) = &cli.output {
        cfg.output.path = output.clone();
    }
    if let Some(concurrency) = cli.concurrency {
        cfg.summarize.concurrency = concurrency;
    }
    match &cli.command {
        Commands::Local {
            folder: Some(folder),
        } => cfg.local.folder = folder.clone(),
        Commands::Drive {
            access_token: Some(token),
            ..
        } => cfg.drive.access_token = Some(token.clone()),
        _ => {}
    }
}

fn parse_file(path: &Path) -> Result<()> {
    let registry = ParserRegistry::with_builtins();
    let parser = registry.resolve(path);
    let outcome = parser
        .extract_file(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let (content, status) = outcome.into_content();

    let status = match status {
        ParseStatus::Ok => "ok",
        ParseStatus::Warning => "warning",
    };
    eprintln!(
        "{}: parser={} status={} chars={}",
        path.display(),
        parser.name(),
        status,
        format_number(content.chars().count() as u64)
    );
    println!("{}", content);
    Ok(())
}
