//! Core data models used throughout docsum.
//!
//! These types represent the items, documents, and reports that flow through
//! the retrieval → extraction → summarization → aggregation pipeline.

use chrono::{DateTime, Local};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Where the bytes of a [`RetrievableItem`] live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    /// A file on the local filesystem.
    LocalPath(PathBuf),
    /// A URL that can be fetched (or handed to a document-capable model).
    RemoteUrl(String),
}

/// Raw item produced by a retrieval source before extraction.
#[derive(Debug, Clone)]
pub struct RetrievableItem {
    /// Stable identifier (relative path for local files, file ID for Drive).
    pub identifier: String,
    pub access: Access,
    /// Display name; not guaranteed unique and may lack an extension.
    pub display_name: String,
    /// MIME type reported by the source, when it knows one.
    pub mime_type: Option<String>,
    /// Size reported by the source, when it knows one.
    pub size_bytes: Option<u64>,
}

impl RetrievableItem {
    pub fn local(path: &Path, identifier: impl Into<String>) -> Self {
        let display_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        Self {
            identifier: identifier.into(),
            access: Access::LocalPath(path.to_path_buf()),
            display_name,
            mime_type: None,
            size_bytes: None,
        }
    }

    pub fn remote(
        identifier: impl Into<String>,
        url: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            access: Access::RemoteUrl(url.into()),
            display_name: display_name.into(),
            mime_type: None,
            size_bytes: None,
        }
    }

    pub fn with_mime_type(mut self, mime_type: Option<String>) -> Self {
        self.mime_type = mime_type;
        self
    }

    pub fn with_size(mut self, size_bytes: Option<u64>) -> Self {
        self.size_bytes = size_bytes;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseStatus {
    Ok,
    /// Extraction failed and `content` holds a placeholder.
    Warning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryStatus {
    Success,
    Error,
}

/// Normalized record for one source file.
///
/// Created by extraction, filled in once by the summarizer, read-only after
/// that. `content` is always a string; when `parse_status` is
/// [`ParseStatus::Warning`] it is a human-readable placeholder, and the status
/// field is the only thing callers should inspect to tell the two apart.
#[derive(Debug, Clone, Serialize)]
pub struct Document {
    pub filename: String,
    /// Lower-cased, with leading dot (`".pdf"`), or empty when unknown.
    pub extension: String,
    pub content: String,
    pub size_bytes: u64,
    pub parse_status: ParseStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    pub summary: Option<String>,
    pub summary_status: Option<SummaryStatus>,
}

impl Document {
    pub fn new(filename: impl Into<String>, content: impl Into<String>, size_bytes: u64) -> Self {
        let filename = filename.into();
        let extension = extension_of(&filename);
        Self {
            filename,
            extension,
            content: content.into(),
            size_bytes,
            parse_status: ParseStatus::Ok,
            file_id: None,
            source_url: None,
            mime_type: None,
            summary: None,
            summary_status: None,
        }
    }

    /// A document whose text never went through a parser; the model reads it
    /// straight from `url`.
    pub fn from_remote(item: &RetrievableItem, url: &str) -> Self {
        let mut doc = Document::new(&item.display_name, "", item.size_bytes.unwrap_or(0));
        doc.file_id = Some(item.identifier.clone());
        doc.source_url = Some(url.to_string());
        doc.mime_type = item.mime_type.clone();
        doc
    }

    pub fn is_summarized(&self) -> bool {
        self.summary_status == Some(SummaryStatus::Success)
    }

    pub fn set_summary(&mut self, summary: impl Into<String>, status: SummaryStatus) {
        self.summary = Some(summary.into());
        self.summary_status = Some(status);
    }
}

/// Lower-cased extension of a file name including the leading dot, or `""`.
pub fn extension_of(name: &str) -> String {
    Path::new(name)
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
        .unwrap_or_default()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Statistics {
    pub total_documents: usize,
    pub successful_summaries: usize,
    pub failed_summaries: usize,
    pub total_size_bytes: u64,
    pub file_types: BTreeMap<String, usize>,
}

impl Statistics {
    pub fn from_documents(docs: &[Document]) -> Self {
        let total_documents = docs.len();
        let successful_summaries = docs.iter().filter(|d| d.is_summarized()).count();
        let mut file_types = BTreeMap::new();
        for doc in docs {
            *file_types.entry(doc.extension.clone()).or_insert(0) += 1;
        }
        Self {
            total_documents,
            successful_summaries,
            failed_summaries: total_documents - successful_summaries,
            total_size_bytes: docs.iter().map(|d| d.size_bytes).sum(),
            file_types,
        }
    }
}

/// How a run obtained its documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    LocalFolder,
    DownloadAndParse,
    GoogleDriveApi,
    PublicFolderAuto,
    DirectFileIds,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportMetadata {
    pub generated_at: DateTime<Local>,
    pub model_used: String,
    pub method: Method,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_items: Option<usize>,
}

/// The terminal artifact of a run. Built once, written once.
#[derive(Debug, Clone, Serialize)]
pub struct SummaryReport {
    pub master_summary: String,
    pub statistics: Statistics,
    pub individual_summaries: Vec<Document>,
    pub metadata: ReportMetadata,
}
