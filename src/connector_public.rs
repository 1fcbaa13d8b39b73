//! Best-effort listing of a public ("anyone with the link") Drive folder.
//!
//! There is no API here: the folder page is fetched like a browser would and
//! every quoted token that looks like a Drive id is taken as a file. The
//! result can miss files or include ids that are not files at all, and an
//! unreachable page yields zero items with a warning rather than an error.

use anyhow::Result;
use async_trait::async_trait;
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

use crate::config::DriveConfig;
use crate::connector_drive::{download_url, extract_folder_id};
use crate::models::RetrievableItem;
use crate::traits::Source;

static QUOTED_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""([a-zA-Z0-9_-]{25,})""#).expect("valid regex"));

const MIN_ID_LEN: usize = 25;
const MAX_ID_LEN: usize = 50;

pub struct PublicFolderSource {
    folder_url: String,
    folder_id: String,
    config: DriveConfig,
}

impl PublicFolderSource {
    pub fn new(folder_url: &str, config: &DriveConfig) -> Result<Self> {
        Ok(Self {
            folder_url: folder_url.to_string(),
            folder_id: extract_folder_id(folder_url)?,
            config: config.clone(),
        })
    }

    async fn fetch_page(&self) -> Result<String> {
        let client = reqwest::Client::builder()
            .user_agent(&self.config.user_agent)
            .build()?;
        let url = format!(
            "{}/drive/folders/{}",
            self.config.download_base.trim_end_matches('/'),
            self.folder_id
        );
        let resp = client.get(&url).send().await?.error_for_status()?;
        Ok(resp.text().await?)
    }
}

/// Candidate file ids in first-seen order, without the folder's own id.
pub fn scrape_file_ids(html: &str, folder_id: &str, limit: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    QUOTED_ID_RE
        .captures_iter(html)
        .map(|caps| caps[1].to_string())
        .filter(|id| (MIN_ID_LEN..=MAX_ID_LEN).contains(&id.len()) && id != folder_id)
        .filter(|id| seen.insert(id.clone()))
        .take(limit)
        .collect()
}

#[async_trait]
impl Source for PublicFolderSource {
    fn kind(&self) -> &str {
        "public"
    }

    fn location(&self) -> String {
        self.folder_url.clone()
    }

    async fn list(&self) -> Result<Vec<RetrievableItem>> {
        let html = match self.fetch_page().await {
            Ok(html) => html,
            Err(e) => {
                tracing::warn!(
                    folder = %self.folder_id,
                    error = %e,
                    "could not load public folder; make sure link sharing is enabled"
                );
                return Ok(Vec::new());
            }
        };

        let ids = scrape_file_ids(&html, &self.folder_id, self.config.scrape_limit);
        if ids.is_empty() {
            tracing::warn!(
                folder = %self.folder_id,
                "no file ids found on the folder page; pass ids explicitly with `docsum download --file-ids`"
            );
        }

        Ok(ids
            .into_iter()
            .map(|id| {
                let name = format!("file_{}", &id[..8]);
                let url = download_url(&self.config.download_base, &id);
                RetrievableItem::remote(id, url, name)
            })
            .collect())
    }
}
