//! Google Drive retrieval.
//!
//! - [`DriveApiSource`] lists a folder through the Drive v3 REST API with a
//!   bearer token, following `nextPageToken` until the listing is complete.
//! - [`FileIdSource`] turns caller-supplied file ids into items; nothing is
//!   discovered.
//!
//! Both produce [`RetrievableItem`]s whose access is the direct-download URL
//! `{download_base}/uc?id=<ID>&export=download`.
//!
//! # Configuration
//!
//! ```toml
//! [drive]
//! page_size = 100
//! # access_token = "ya29..."   # or GOOGLE_DRIVE_ACCESS_TOKEN
//! ```

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use std::path::Path;
use std::sync::LazyLock;

use crate::config::{ConfigError, DriveConfig};
use crate::models::RetrievableItem;
use crate::traits::Source;

static FOLDER_PATH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"folders/([a-zA-Z0-9_-]+)").expect("valid regex"));
static ID_PARAM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"id=([a-zA-Z0-9_-]+)").expect("valid regex"));

const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Folder id from a `.../folders/<ID>` or `...?id=<ID>` URL. The path form
/// wins when both are present.
pub fn extract_folder_id(url: &str) -> Result<String, ConfigError> {
    [&*FOLDER_PATH_RE, &*ID_PARAM_RE]
        .iter()
        .find_map(|re| re.captures(url))
        .map(|caps| caps[1].to_string())
        .ok_or_else(|| ConfigError::InvalidDriveUrl(url.to_string()))
}

pub fn download_url(download_base: &str, file_id: &str) -> String {
    format!(
        "{}/uc?id={}&export=download",
        download_base.trim_end_matches('/'),
        file_id
    )
}

pub fn view_url(download_base: &str, file_id: &str) -> String {
    format!(
        "{}/file/d/{}/view",
        download_base.trim_end_matches('/'),
        file_id
    )
}

// ═══════════════════════════════════════════════════════════════════════
// Authenticated listing
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    id: String,
    name: String,
    mime_type: Option<String>,
    /// The API reports sizes as decimal strings.
    size: Option<String>,
}

pub struct DriveApiSource {
    folder_url: String,
    folder_id: String,
    access_token: String,
    config: DriveConfig,
    client: reqwest::Client,
}

impl DriveApiSource {
    pub fn new(folder_url: &str, access_token: String, config: &DriveConfig) -> Result<Self> {
        let folder_id = extract_folder_id(folder_url)?;
        Ok(Self {
            folder_url: folder_url.to_string(),
            folder_id,
            access_token,
            config: config.clone(),
            client: reqwest::Client::new(),
        })
    }

    pub fn folder_id(&self) -> &str {
        &self.folder_id
    }

    async fn list_page(&self, page_token: Option<&str>) -> Result<FileList> {
        let query = format!("'{}' in parents and trashed=false", self.folder_id);
        let page_size = self.config.page_size.to_string();
        let mut params = vec![
            ("q", query.as_str()),
            ("pageSize", page_size.as_str()),
            ("fields", "nextPageToken,files(id,name,mimeType,size)"),
        ];
        if let Some(token) = page_token {
            params.push(("pageToken", token));
        }

        let resp = self
            .client
            .get(format!("{}/files", self.config.api_base.trim_end_matches('/')))
            .bearer_auth(&self.access_token)
            .query(&params)
            .send()
            .await
            .context("Drive files.list request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!("Drive API error {}: {}", status, body);
        }

        resp.json::<FileList>()
            .await
            .context("Invalid Drive files.list response")
    }
}

#[async_trait]
impl Source for DriveApiSource {
    fn kind(&self) -> &str {
        "drive"
    }

    fn location(&self) -> String {
        self.folder_url.clone()
    }

    async fn list(&self) -> Result<Vec<RetrievableItem>> {
        let mut items = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page = self.list_page(page_token.as_deref()).await?;
            for file in page.files {
                if file.mime_type.as_deref() == Some(FOLDER_MIME_TYPE) {
                    tracing::debug!(name = %file.name, "skipping subfolder");
                    continue;
                }
                let url = download_url(&self.config.download_base, &file.id);
                let size = file.size.and_then(|s| s.parse::<u64>().ok());
                items.push(
                    RetrievableItem::remote(file.id, url, file.name)
                        .with_mime_type(file.mime_type)
                        .with_size(size),
                );
            }

            page_token = page.next_page_token.filter(|t| !t.is_empty());
            if page_token.is_none() {
                break;
            }
        }

        tracing::info!(folder = %self.folder_id, files = items.len(), "listed Drive folder");
        Ok(items)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Explicit ids
// ═══════════════════════════════════════════════════════════════════════

pub struct FileIdSource {
    ids: Vec<String>,
    download_base: String,
}

impl FileIdSource {
    pub fn new(ids: Vec<String>, config: &DriveConfig) -> Self {
        Self {
            ids,
            download_base: config.download_base.clone(),
        }
    }

    /// One id per line; blank lines and `#` comments are ignored.
    pub fn from_file(path: &Path, config: &DriveConfig) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read file id list: {}", path.display()))?;
        Ok(Self::new(parse_id_list(&content), config))
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }
}

pub fn parse_id_list(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

#[async_trait]
impl Source for FileIdSource {
    fn kind(&self) -> &str {
        "file-ids"
    }

    fn location(&self) -> String {
        format!("{} file ids", self.ids.len())
    }

    async fn list(&self) -> Result<Vec<RetrievableItem>> {
        Ok(self
            .ids
            .iter()
            .map(|id| {
                RetrievableItem::remote(
                    id.clone(),
                    download_url(&self.download_base, id),
                    format!("file_{}", id),
                )
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Access;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn folder_id_patterns() {
        assert_eq!(
            extract_folder_id("https://drive.google.com/drive/folders/1AbC_d-E?usp=sharing").unwrap(),
            "1AbC_d-E"
        );
        assert_eq!(
            extract_folder_id("https://drive.google.com/open?id=XyZ_123").unwrap(),
            "XyZ_123"
        );
        assert_eq!(
            extract_folder_id("https://x/folders/PATH?id=QUERY").unwrap(),
            "PATH"
        );
        assert!(matches!(
            extract_folder_id("https://example.com/nothing"),
            Err(ConfigError::InvalidDriveUrl(_))
        ));
    }

    #[test]
    fn url_shapes() {
        assert_eq!(
            download_url("https://drive.google.com/", "abc"),
            "https://drive.google.com/uc?id=abc&export=download"
        );
        assert_eq!(
            view_url("https://drive.google.com", "abc"),
            "https://drive.google.com/file/d/abc/view"
        );
    }

    #[test]
    fn id_list_skips_blanks_and_comments() {
        let ids = parse_id_list("# ids\nabc\n\n  def  \n#ghi\n");
        assert_eq!(ids, ["abc", "def"]);
    }

    #[tokio::test]
    async fn file_ids_become_download_items() {
        let source = FileIdSource::new(vec!["abc".into()], &DriveConfig::default());
        let items = source.list().await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].display_name, "file_abc");
        assert_eq!(
            items[0].access,
            Access::RemoteUrl("https://drive.google.com/uc?id=abc&export=download".into())
        );
    }

    #[tokio::test]
    async fn api_listing_follows_pages_and_skips_folders() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/drive/v3/files"))
            .and(header("authorization", "Bearer tok"))
            .and(query_param("pageToken", "p2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "files": [{ "id": "id3", "name": "c.txt", "mimeType": "text/plain" }]
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/drive/v3/files"))
            .and(query_param("q", "'FOLDER' in parents and trashed=false"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "nextPageToken": "p2",
                "files": [
                    { "id": "id1", "name": "a.pdf", "mimeType": "application/pdf", "size": "2048" },
                    { "id": "sub", "name": "nested", "mimeType": "application/vnd.google-apps.folder" }
                ]
            })))
            .mount(&server)
            .await;

        let config = DriveConfig {
            api_base: format!("{}/drive/v3", server.uri()),
            ..DriveConfig::default()
        };
        let source = DriveApiSource::new(
            "https://drive.google.com/drive/folders/FOLDER",
            "tok".to_string(),
            &config,
        )
        .unwrap();
        let items = source.list().await.unwrap();

        let names: Vec<_> = items.iter().map(|i| i.display_name.as_str()).collect();
        assert_eq!(names, ["a.pdf", "c.txt"]);
        assert_eq!(items[0].mime_type.as_deref(), Some("application/pdf"));
        assert_eq!(items[0].size_bytes, Some(2048));
    }

    #[tokio::test]
    async fn api_error_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid credentials"))
            .mount(&server)
            .await;
        let config = DriveConfig {
            api_base: server.uri(),
            ..DriveConfig::default()
        };
        let source =
            DriveApiSource::new("https://x/folders/F", "bad".to_string(), &config).unwrap();
        let err = source.list().await.unwrap_err();
        assert!(err.to_string().contains("401"));
    }
}
