// src/catalog.rs
use anyhow::Context;
use futures::future::try_join_all;
use std::{
    path::{Path, PathBuf},
    time::Duration,
};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::{
    config::DataConfig,
    error::{DashboardError, Result},
    process::{self, RunTable},
};

/// Parameters of a `/runs_info` request after defaults are applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunsQuery {
    pub path: Option<PathBuf>,
    pub read_last: Option<usize>,
    pub recursive: bool,
}

/// Lists runs from stats files: discover → read → normalize → merge.
#[derive(Debug, Clone)]
pub struct RunCatalog {
    config: DataConfig,
}

impl RunCatalog {
    pub fn new(config: DataConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DataConfig {
        &self.config
    }

    /// Resolve the data path a request refers to, applying the default and
    /// the optional allow-listed root.
    pub async fn resolve_path(&self, requested: Option<&Path>) -> Result<PathBuf> {
        let path = requested
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.config.default_path.clone());
        self.confine(path).await
    }

    /// Check `path` against `allowed_root`, returning it canonicalized.
    /// Without a root every path is accepted unchanged.
    pub async fn confine(&self, path: PathBuf) -> Result<PathBuf> {
        let Some(root) = &self.config.allowed_root else {
            return Ok(path);
        };
        let root = tokio::fs::canonicalize(root)
            .await
            .with_context(|| format!("canonicalizing allowed root {}", root.display()))?;
        // a missing path is reported as not found downstream, not as a violation
        let Ok(resolved) = tokio::fs::canonicalize(&path).await else {
            return Ok(path);
        };
        if !resolved.starts_with(&root) {
            return Err(DashboardError::Validation(format!(
                "path {} is outside of {}",
                path.display(),
                root.display()
            )));
        }
        Ok(resolved)
    }

    /// Read, normalize and merge every stats file `query` refers to.
    ///
    /// `read_last` bounds the rows read per file, not the rows returned.
    #[tracing::instrument(level = "info", skip(self))]
    pub async fn list_runs(&self, query: RunsQuery) -> Result<RunTable> {
        let start = Instant::now();
        let data_path = self.resolve_path(query.path.as_deref()).await?;
        let read_last = query.read_last.unwrap_or(self.config.default_runs_to_read);
        info!(
            path = %data_path.display(),
            read_last,
            recursive = query.recursive,
            "reading runs"
        );

        let work = self.read_all(data_path, read_last, query.recursive);
        let table = match self.config.read_timeout_secs {
            Some(secs) => tokio::time::timeout(Duration::from_secs(secs), work)
                .await
                .map_err(|_| anyhow::anyhow!("reading runs timed out after {}s", secs))??,
            None => work.await?,
        };

        info!(runs = table.len(), elapsed = ?start.elapsed(), "found runs");
        Ok(table)
    }

    async fn read_all(&self, data_path: PathBuf, read_last: usize, recursive: bool) -> Result<RunTable> {
        let files = {
            let pattern = self.config.stats.clone();
            tokio::task::spawn_blocking(move || {
                process::discover_stats_files(&data_path, &pattern, recursive)
            })
            .await
            .context("stats file discovery panicked")??
        };
        debug!(files = files.len(), "discovered stats files");

        let tables = try_join_all(files.into_iter().map(|file| async move {
            tokio::task::spawn_blocking(move || {
                let table = process::read_stats_file(&file, read_last)?;
                process::normalize(table, &file)
            })
            .await
            .context("stats file reader panicked")?
        }))
        .await?;

        let mut merged = RunTable::default();
        for table in tables {
            merged.append(table);
        }
        Ok(merged)
    }
}
