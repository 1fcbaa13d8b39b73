use anyhow::Result;
use async_trait::async_trait;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::LocalConfig;
use crate::models::RetrievableItem;
use crate::traits::Source;

/// Regular, non-hidden files directly inside one folder.
pub struct LocalFolderSource {
    folder: PathBuf,
    include: GlobSet,
    exclude: GlobSet,
}

impl LocalFolderSource {
    pub fn new(folder: PathBuf, config: &LocalConfig) -> Result<Self> {
        Ok(Self {
            folder,
            include: build_globset(&config.include_globs)?,
            exclude: build_globset(&config.exclude_globs)?,
        })
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    fn scan(&self) -> Result<Vec<RetrievableItem>> {
        if !self.folder.is_dir() {
            tracing::warn!(folder = %self.folder.display(), "folder does not exist");
            return Ok(Vec::new());
        }

        let mut items = Vec::new();
        let walker = WalkDir::new(&self.folder).min_depth(1).max_depth(1);
        for entry in walker {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }

            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with('.') {
                continue;
            }
            if self.exclude.is_match(&name) || !self.include.is_match(&name) {
                continue;
            }

            let size = entry.metadata().ok().map(|m| m.len());
            items.push(RetrievableItem::local(entry.path(), name.clone()).with_size(size));
        }

        // Sort for deterministic ordering
        items.sort_by(|a, b| a.identifier.cmp(&b.identifier));

        Ok(items)
    }
}

#[async_trait]
impl Source for LocalFolderSource {
    fn kind(&self) -> &str {
        "local"
    }

    fn location(&self) -> String {
        self.folder.display().to_string()
    }

    async fn list(&self) -> Result<Vec<RetrievableItem>> {
        self.scan()
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
