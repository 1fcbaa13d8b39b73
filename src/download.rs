//! Fetching remote items and deciding what they are.
//!
//! Drive serves a "can't scan this file for viruses" interstitial for large
//! files; it sets a `download_warning*` cookie whose value must be sent back
//! as `confirm=` to get the real bytes.

use regex::Regex;
use std::sync::LazyLock;

use crate::config::DriveConfig;
use crate::extract::ParseOutcome;
use crate::models::extension_of;
use crate::traits::ParserRegistry;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("download failed with status {status}: {url}")]
    Status { status: u16, url: String },
    #[error("download request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// A fetched blob and whatever the server said about it.
#[derive(Debug, Clone)]
pub struct Fetched {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
    /// File name from `Content-Disposition`, when present.
    pub filename: Option<String>,
}

static DISPOSITION_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)filename\*?=(?:UTF-8'')?"?([^";]+)"?"#).expect("valid regex")
});

pub struct Downloader {
    client: reqwest::Client,
    download_base: String,
}

impl Downloader {
    pub fn new(config: &DriveConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .build()?;
        Ok(Self {
            client,
            download_base: config.download_base.trim_end_matches('/').to_string(),
        })
    }

    /// GET `url` for the Drive file `file_id`, confirming the large-file
    /// interstitial when Drive asks for it.
    pub async fn fetch(&self, url: &str, file_id: &str) -> Result<Fetched, FetchError> {
        let mut resp = self.client.get(url).send().await?;

        if let Some(token) = download_warning_token(resp.headers()) {
            tracing::debug!(file_id, "confirming large-file download");
            resp = self
                .client
                .get(format!("{}/uc", self.download_base))
                .query(&[
                    ("id", file_id),
                    ("confirm", token.as_str()),
                    ("export", "download"),
                ])
                .send()
                .await?;
        }

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let headers = resp.headers();
        let content_type = headers
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());
        let filename = headers
            .get(reqwest::header::CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(disposition_filename);

        let bytes = resp.bytes().await?.to_vec();
        Ok(Fetched {
            bytes,
            content_type,
            filename,
        })
    }
}

/// Value of the first `download_warning*` cookie in the response.
fn download_warning_token(headers: &reqwest::header::HeaderMap) -> Option<String> {
    headers
        .get_all(reqwest::header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|cookie| cookie.split(';').next())
        .filter_map(|pair| pair.split_once('='))
        .find(|(name, _)| name.trim().starts_with("download_warning"))
        .map(|(_, value)| value.trim().to_string())
}

fn disposition_filename(header: &str) -> Option<String> {
    DISPOSITION_NAME_RE
        .captures(header)
        .map(|caps| caps[1].trim().to_string())
        .filter(|name| !name.is_empty())
}

/// Extension for a MIME type, `""` when unknown. Parameters are ignored.
pub fn extension_for_mime(mime: &str) -> &'static str {
    let essence = mime.split(';').next().unwrap_or_default().trim();
    match essence.to_ascii_lowercase().as_str() {
        "application/pdf" => ".pdf",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => ".docx",
        "application/msword" => ".doc",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => ".xlsx",
        "application/vnd.ms-excel" => ".xls",
        "text/html" => ".html",
        "application/rtf" | "text/rtf" => ".rtf",
        "text/markdown" => ".md",
        "text/csv" => ".csv",
        "text/plain" => ".txt",
        _ => "",
    }
}

/// Formats tried, in order, when nothing names the type.
const GUESS_ORDER: [&str; 5] = [".pdf", ".docx", ".txt", ".html", ".xlsx"];
/// A guess only counts when it produces more text than this.
const MIN_GUESS_CHARS: usize = 50;

/// Extension for a fetched blob: source MIME type, response content type,
/// `Content-Disposition` name, then trial extraction; plain text last.
pub fn detect_extension(
    registry: &ParserRegistry,
    source_mime: Option<&str>,
    fetched: &Fetched,
) -> String {
    let named = source_mime
        .map(extension_for_mime)
        .filter(|e| !e.is_empty())
        .or_else(|| {
            fetched
                .content_type
                .as_deref()
                .map(extension_for_mime)
                .filter(|e| !e.is_empty())
        })
        .map(str::to_string)
        .or_else(|| {
            fetched
                .filename
                .as_deref()
                .map(extension_of)
                .filter(|e| !e.is_empty())
        });
    if let Some(extension) = named {
        return extension;
    }

    GUESS_ORDER
        .iter()
        .find(|ext| {
            matches!(
                registry.extract_bytes(ext, &fetched.bytes),
                ParseOutcome::Text(ref text) if text.trim().chars().count() > MIN_GUESS_CHARS
            )
        })
        .unwrap_or(&".txt")
        .to_string()
}
