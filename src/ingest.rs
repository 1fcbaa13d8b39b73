//! Pipeline orchestration.
//!
//! Coordinates the full run: source → extraction → per-document summary →
//! master summary → report. Extraction and summarization both isolate
//! failures per item; only listing errors and an empty batch stop a run.

use anyhow::{anyhow, bail, Context, Result};
use std::path::{Path, PathBuf};

use crate::aggregate::Aggregator;
use crate::download::{detect_extension, Downloader};
use crate::models::{extension_of, Access, Document, Method, ReportMetadata, RetrievableItem, SummaryReport};
use crate::progress::{ProgressEvent, ProgressReporter};
use crate::summarize::{Input, Summarizer};
use crate::traits::{ParserRegistry, Source};

/// Turns [`RetrievableItem`]s into [`Document`]s.
pub struct Extractor {
    registry: ParserRegistry,
    downloader: Option<Downloader>,
    keep_downloads: Option<PathBuf>,
}

impl Extractor {
    /// Local files only.
    pub fn new(registry: ParserRegistry) -> Self {
        Self {
            registry,
            downloader: None,
            keep_downloads: None,
        }
    }

    pub fn with_downloader(mut self, downloader: Downloader) -> Self {
        self.downloader = Some(downloader);
        self
    }

    /// Also write every downloaded blob into `dir`.
    pub fn keep_downloads_in(mut self, dir: PathBuf) -> Self {
        self.keep_downloads = Some(dir);
        self
    }

    pub fn registry(&self) -> &ParserRegistry {
        &self.registry
    }

    /// One document per readable item, in input order. Items that cannot be
    /// read or fetched are logged and left out.
    pub async fn extract_all(
        &self,
        items: &[RetrievableItem],
        progress: &dyn ProgressReporter,
    ) -> Vec<Document> {
        let total = items.len();
        let mut docs = Vec::with_capacity(total);

        for (i, item) in items.iter().enumerate() {
            progress.report(ProgressEvent::Extracting {
                n: i + 1,
                total,
                name: item.display_name.clone(),
            });
            match self.extract_one(item).await {
                Ok(doc) => {
                    progress.report(ProgressEvent::Extracted {
                        name: doc.filename.clone(),
                        chars: doc.content.chars().count(),
                        warning: doc.parse_status == crate::models::ParseStatus::Warning,
                    });
                    docs.push(doc);
                }
                Err(e) => {
                    tracing::warn!(item = %item.identifier, error = %format!("{:#}", e), "skipping unreadable item");
                }
            }
        }

        docs
    }

    pub async fn extract_one(&self, item: &RetrievableItem) -> Result<Document> {
        match &item.access {
            Access::LocalPath(path) => self.extract_local(item, path),
            Access::RemoteUrl(url) => self.extract_remote(item, url).await,
        }
    }

    fn extract_local(&self, item: &RetrievableItem, path: &Path) -> Result<Document> {
        let size = std::fs::metadata(path)
            .with_context(|| format!("Failed to stat {}", path.display()))?
            .len();
        let parser = self.registry.resolve(path);
        let outcome = parser
            .extract_file(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        tracing::debug!(file = %path.display(), parser = parser.name(), "extracted");

        let (content, status) = outcome.into_content();
        let mut doc = Document::new(&item.display_name, content, size);
        doc.parse_status = status;
        Ok(doc)
    }

    async fn extract_remote(&self, item: &RetrievableItem, url: &str) -> Result<Document> {
        let downloader = self
            .downloader
            .as_ref()
            .ok_or_else(|| anyhow!("remote item {} but downloads are not enabled", item.identifier))?;
        let fetched = downloader.fetch(url, &item.identifier).await?;

        let extension = detect_extension(&self.registry, item.mime_type.as_deref(), &fetched);
        let display_name = plain_file_name(&item.display_name)
            .unwrap_or_else(|| format!("file_{}", item.identifier));
        let filename = if !extension_of(&display_name).is_empty() {
            display_name
        } else if let Some(name) = fetched
            .filename
            .as_deref()
            .and_then(plain_file_name)
            .filter(|n| !extension_of(n).is_empty())
        {
            name
        } else {
            format!("{}{}", display_name, extension)
        };

        if let Some(dir) = &self.keep_downloads {
            if let Err(e) = save_download(dir, &filename, &fetched.bytes) {
                tracing::warn!(file = %filename, error = %format!("{:#}", e), "could not save download");
            }
        }

        let (content, status) = self
            .registry
            .extract_bytes(&extension, &fetched.bytes)
            .into_content();
        let mut doc = Document::new(filename, content, fetched.bytes.len() as u64);
        doc.extension = extension;
        doc.parse_status = status;
        doc.file_id = Some(item.identifier.clone());
        doc.source_url = Some(url.to_string());
        doc.mime_type = item.mime_type.clone().or(fetched.content_type);
        Ok(doc)
    }
}

/// Final path component of a server- or source-reported name. `None` when
/// nothing usable is left (empty, `.` or `..`).
fn plain_file_name(name: &str) -> Option<String> {
    let last = name.rsplit(['/', '\\']).next().unwrap_or_default().trim();
    match last {
        "" | "." | ".." => None,
        other => Some(other.to_string()),
    }
}

fn save_download(dir: &Path, filename: &str, bytes: &[u8]) -> Result<()> {
    std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    let target = dir.join(filename);
    std::fs::write(&target, bytes).with_context(|| format!("Failed to write {}", target.display()))?;
    tracing::info!(file = %target.display(), "saved download");
    Ok(())
}

/// Documents for URL-mode summarization; nothing is fetched.
pub fn remote_documents(items: &[RetrievableItem]) -> Result<Vec<Document>> {
    items
        .iter()
        .map(|item| match &item.access {
            Access::RemoteUrl(url) => Ok(Document::from_remote(item, url)),
            Access::LocalPath(path) => bail!(
                "{} is a local file; URL summarization needs a remote item",
                path.display()
            ),
        })
        .collect()
}

/// How a run should treat the listed items.
pub struct RunOptions {
    pub method: Method,
    pub input: Input,
}

/// Run every stage for one source and assemble the report.
///
/// Fails when listing fails or when no document survives extraction; every
/// later failure is recorded in the report instead.
pub async fn run_pipeline(
    source: &dyn Source,
    extractor: &Extractor,
    summarizer: &Summarizer,
    aggregator: &Aggregator,
    options: &RunOptions,
    progress: &dyn ProgressReporter,
) -> Result<SummaryReport> {
    progress.report(ProgressEvent::Discovering {
        source: format!("{}:{}", source.kind(), source.location()),
    });
    let items = source
        .list()
        .await
        .with_context(|| format!("Failed to list {}", source.location()))?;
    tracing::info!(source = source.kind(), items = items.len(), "listed items");
    if items.is_empty() {
        bail!("No files found in {}", source.location());
    }

    let docs = match options.input {
        Input::Content => extractor.extract_all(&items, progress).await,
        Input::Url => remote_documents(&items)?,
    };
    if docs.is_empty() {
        bail!("No documents could be extracted from {}", source.location());
    }

    let docs = summarizer.summarize_all(docs, options.input, progress).await;

    progress.report(ProgressEvent::Aggregating {
        documents: docs.iter().filter(|d| d.is_summarized()).count(),
    });
    let synthesis = aggregator.aggregate(docs).await;

    let model_used = match options.input {
        Input::Content => summarizer.model(),
        Input::Url => summarizer.url_model(),
    };
    Ok(synthesis.into_report(ReportMetadata {
        generated_at: chrono::Local::now(),
        model_used: model_used.to_string(),
        method: options.method,
        source: Some(source.location()),
        total_items: Some(items.len()),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::connector_fs::LocalFolderSource;
    use crate::llm::scripted::ScriptedClient;
    use crate::models::{ParseStatus, SummaryStatus};
    use crate::progress::NoProgress;
    use std::sync::Arc;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn serve_blob(server: &MockServer, route: &str, disposition: &str) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/plain")
                    .insert_header("content-disposition", disposition)
                    .set_body_string("downloaded body"),
            )
            .mount(server)
            .await;
    }

    fn downloading_extractor(server: &MockServer) -> Extractor {
        let mut drive = Config::minimal().drive;
        drive.download_base = server.uri();
        Extractor::new(ParserRegistry::with_builtins())
            .with_downloader(Downloader::new(&drive).unwrap())
    }

    #[test]
    fn reported_names_lose_directory_parts() {
        assert_eq!(plain_file_name("../escaped.txt").as_deref(), Some("escaped.txt"));
        assert_eq!(plain_file_name("reports/q1.pdf").as_deref(), Some("q1.pdf"));
        assert_eq!(plain_file_name(r"C:\tmp\a.docx").as_deref(), Some("a.docx"));
        assert_eq!(plain_file_name(".."), None);
        assert_eq!(plain_file_name("a/"), None);
        assert_eq!(plain_file_name("  "), None);
    }

    #[tokio::test]
    async fn kept_downloads_stay_inside_the_download_dir() {
        let server = MockServer::start().await;
        serve_blob(&server, "/blob/esc", r#"attachment; filename="../escaped.txt""#).await;
        serve_blob(&server, "/blob/nested", r#"attachment; filename="x.txt""#).await;

        let root = tempfile::tempdir().unwrap();
        let downloads = root.path().join("downloads");
        let extractor = downloading_extractor(&server).keep_downloads_in(downloads.clone());
        let items = vec![
            RetrievableItem::remote("esc", format!("{}/blob/esc", server.uri()), "file_esc"),
            RetrievableItem::remote("nested", format!("{}/blob/nested", server.uri()), "reports/q1.txt"),
        ];
        let docs = extractor.extract_all(&items, &NoProgress).await;

        let names: Vec<_> = docs.iter().map(|d| d.filename.as_str()).collect();
        assert_eq!(names, ["escaped.txt", "q1.txt"]);
        assert!(downloads.join("escaped.txt").exists());
        assert!(downloads.join("q1.txt").exists());
        assert!(!root.path().join("escaped.txt").exists());
        assert_eq!(docs[0].content, "downloaded body");
    }

    #[tokio::test]
    async fn failed_save_keeps_the_document() {
        let server = MockServer::start().await;
        serve_blob(&server, "/blob/a", r#"attachment; filename="a.txt""#).await;

        let root = tempfile::tempdir().unwrap();
        let blocker = root.path().join("not_a_dir");
        std::fs::write(&blocker, "file in the way").unwrap();
        let extractor = downloading_extractor(&server).keep_downloads_in(blocker);
        let item = RetrievableItem::remote("a", format!("{}/blob/a", server.uri()), "file_a");
        let docs = extractor.extract_all(&[item], &NoProgress).await;

        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].filename, "a.txt");
        assert_eq!(docs[0].parse_status, ParseStatus::Ok);
    }

    #[tokio::test]
    async fn unreadable_items_are_skipped_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.txt");
        let c = dir.path().join("c.md");
        std::fs::write(&a, "alpha").unwrap();
        std::fs::write(&c, "gamma").unwrap();
        let items = vec![
            RetrievableItem::local(&a, "a.txt"),
            RetrievableItem::local(&dir.path().join("gone.txt"), "gone.txt"),
            RetrievableItem::local(&c, "c.md"),
        ];

        let extractor = Extractor::new(ParserRegistry::with_builtins());
        let docs = extractor.extract_all(&items, &NoProgress).await;

        let names: Vec<_> = docs.iter().map(|d| d.filename.as_str()).collect();
        assert_eq!(names, ["a.txt", "c.md"]);
        assert_eq!(docs[0].content, "alpha");
        assert_eq!(docs[0].size_bytes, 5);
        assert_eq!(docs[1].extension, ".md");
    }

    #[tokio::test]
    async fn parse_failures_keep_a_placeholder_document() {
        let dir = tempfile::tempdir().unwrap();
        let bad = dir.path().join("broken.docx");
        std::fs::write(&bad, "definitely not a zip").unwrap();

        let extractor = Extractor::new(ParserRegistry::with_builtins());
        let docs = extractor
            .extract_all(&[RetrievableItem::local(&bad, "broken.docx")], &NoProgress)
            .await;

        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].parse_status, ParseStatus::Warning);
        assert!(docs[0].content.starts_with("Error"));
    }

    #[tokio::test]
    async fn remote_items_without_downloader_are_skipped() {
        let extractor = Extractor::new(ParserRegistry::with_builtins());
        let item = RetrievableItem::remote("id", "https://example.invalid/uc?id=id", "file_id");
        assert!(extractor.extract_all(&[item], &NoProgress).await.is_empty());
    }

    #[test]
    fn url_documents_carry_source_url() {
        let item = RetrievableItem::remote("abc", "https://d/uc?id=abc", "file_abc")
            .with_mime_type(Some("application/pdf".into()));
        let docs = remote_documents(&[item]).unwrap();
        assert_eq!(docs[0].source_url.as_deref(), Some("https://d/uc?id=abc"));
        assert_eq!(docs[0].file_id.as_deref(), Some("abc"));
        assert_eq!(docs[0].content, "");
        assert_eq!(docs[0].parse_status, ParseStatus::Ok);
    }

    #[tokio::test]
    async fn full_run_over_a_folder() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("one.txt"), "first document body").unwrap();
        std::fs::write(dir.path().join("two.md"), "").unwrap();
        std::fs::write(dir.path().join("three.html"), "<p>third</p>").unwrap();

        let config = Config::minimal();
        let client = ScriptedClient::replying("summary text");
        let source = LocalFolderSource::new(dir.path().to_path_buf(), &config.local).unwrap();
        let extractor = Extractor::new(ParserRegistry::with_builtins());
        let summarizer = Summarizer::new(client.clone(), &config);
        let aggregator = Aggregator::new(client.clone(), &config);
        let options = RunOptions {
            method: Method::LocalFolder,
            input: Input::Content,
        };

        let report = run_pipeline(&source, &extractor, &summarizer, &aggregator, &options, &NoProgress)
            .await
            .unwrap();

        let names: Vec<_> = report
            .individual_summaries
            .iter()
            .map(|d| d.filename.as_str())
            .collect();
        assert_eq!(names, ["one.txt", "three.html", "two.md"]);
        assert_eq!(report.individual_summaries[2].summary.as_deref(), Some("No content to summarize"));
        assert!(report
            .individual_summaries
            .iter()
            .all(|d| d.summary_status == Some(SummaryStatus::Success)));
        assert_eq!(report.master_summary, "summary text");
        assert_eq!(report.statistics.total_documents, 3);
        assert_eq!(report.metadata.total_items, Some(3));
        // two document summaries plus the master summary
        assert_eq!(client.calls(), 3);
    }

    #[tokio::test]
    async fn empty_folder_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::minimal();
        let client: Arc<ScriptedClient> = ScriptedClient::replying("x");
        let source = LocalFolderSource::new(dir.path().to_path_buf(), &config.local).unwrap();
        let result = run_pipeline(
            &source,
            &Extractor::new(ParserRegistry::with_builtins()),
            &Summarizer::new(client.clone(), &config),
            &Aggregator::new(client.clone(), &config),
            &RunOptions {
                method: Method::LocalFolder,
                input: Input::Content,
            },
            &NoProgress,
        )
        .await;
        assert!(result.is_err());
        assert_eq!(client.calls(), 0);
    }
}
