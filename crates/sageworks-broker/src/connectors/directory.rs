//! Local directory connector
//!
//! Lists a directory tree the way an object-store listing looks: one entry
//! per file, keyed by its `/`-separated path relative to the root, carrying
//! `Key`, `ContentLength` and `LastModified`.

use crate::connector::Connector;
use crate::error::ConnectorError;
use crate::snapshot::Metadata;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use std::path::{Path, PathBuf};

/// Connector over a local directory tree
#[derive(Debug, Clone)]
pub struct DirectoryConnector {
    name: String,
    root: PathBuf,
    scope: Option<Vec<String>>,
}

impl DirectoryConnector {
    /// Create connector listing everything under `root`
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
            scope: None,
        }
    }

    /// Only list the named top-level subdirectories
    #[must_use]
    pub fn with_scope(mut self, scope: Vec<String>) -> Self {
        self.scope = Some(scope);
        self
    }

    /// Root directory
    #[inline]
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn in_scope(&self, top_level: &str) -> bool {
        self.scope
            .as_ref()
            .map_or(true, |scope| scope.iter().any(|s| s == top_level))
    }
}

#[async_trait]
impl Connector for DirectoryConnector {
    fn name(&self) -> &str {
        &self.name
    }

    async fn check(&self) -> bool {
        match tokio::fs::metadata(&self.root).await {
            Ok(meta) => meta.is_dir(),
            Err(_) => {
                tracing::error!(root = %self.root.display(), "could not reach {}", self.name);
                false
            }
        }
    }

    async fn refresh(&self) -> Result<Metadata, ConnectorError> {
        tracing::info!(root = %self.root.display(), "listing {}", self.name);
        let mut entries = Metadata::new();

        if !tokio::fs::try_exists(&self.root)
            .await
            .map_err(|e| ConnectorError::io_error(&self.root, e))?
        {
            // A missing root lists as empty, like a bucket prefix with no objects
            tracing::warn!(root = %self.root.display(), "root does not exist");
            return Ok(entries);
        }

        let mut pending = vec![self.root.clone()];
        while let Some(dir) = pending.pop() {
            let mut reader = tokio::fs::read_dir(&dir)
                .await
                .map_err(|e| ConnectorError::io_error(&dir, e))?;

            while let Some(entry) = reader
                .next_entry()
                .await
                .map_err(|e| ConnectorError::io_error(&dir, e))?
            {
                let path = entry.path();
                let meta = entry
                    .metadata()
                    .await
                    .map_err(|e| ConnectorError::io_error(&path, e))?;
                let key = relative_key(&self.root, &path)?;

                let top_level = key.split('/').next().unwrap_or_default();
                if !self.in_scope(top_level) {
                    continue;
                }

                if meta.is_dir() {
                    pending.push(path);
                } else if meta.is_file() {
                    let modified = meta
                        .modified()
                        .map(|t| DateTime::<Utc>::from(t).to_rfc3339())
                        .ok();
                    entries.insert(
                        key.clone(),
                        json!({
                            "Key": key,
                            "ContentLength": meta.len(),
                            "LastModified": modified,
                        }),
                    );
                }
            }
        }

        Ok(entries)
    }
}

fn relative_key(root: &Path, path: &Path) -> Result<String, ConnectorError> {
    let relative = path
        .strip_prefix(root)
        .map_err(|_| ConnectorError::Malformed(format!("{} escapes root", path.display())))?;
    let parts: Vec<_> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Ok(parts.join("/"))
}
