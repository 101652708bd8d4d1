//! Directory exporter
//!
//! Saves artifacts into a fixed directory under their suggested names.

use super::types::{ArtifactConsumer, ExportError, ExportReceipt, ExportResult};
use crate::capture::Artifact;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

pub struct DirectoryExporter {
    dir: PathBuf,
    create_dir: bool,
}

impl DirectoryExporter {
    /// Export into `dir`, which must already exist
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            create_dir: false,
        }
    }

    /// Create the directory on first export if it is missing
    pub fn creating(dir: impl Into<PathBuf>) -> Self {
        Self {
            create_dir: true,
            ..Self::new(dir)
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// First free path for `name`, suffixing `-1`, `-2`... on collision
    async fn free_path(&self, artifact: &Artifact) -> ExportResult<PathBuf> {
        let name = artifact.suggested_name();
        let candidate = self.dir.join(&name);
        if !tokio::fs::try_exists(&candidate).await? {
            return Ok(candidate);
        }

        let stem = name.trim_end_matches(&format!(".{}", artifact.extension())).to_string();
        for n in 1.. {
            let candidate = self.dir.join(format!("{}-{}.{}", stem, n, artifact.extension()));
            if !tokio::fs::try_exists(&candidate).await? {
                return Ok(candidate);
            }
        }
        Err(ExportError::Rejected(format!("no free file name for {}", name)))
    }
}

#[async_trait]
impl ArtifactConsumer for DirectoryExporter {
    async fn consume(&self, artifact: Artifact) -> ExportResult<ExportReceipt> {
        if !tokio::fs::try_exists(&self.dir).await? {
            if !self.create_dir {
                return Err(ExportError::DirectoryNotFound(self.dir.display().to_string()));
            }
            tokio::fs::create_dir_all(&self.dir).await?;
        }

        let path = self.free_path(&artifact).await?;
        let mime_type = artifact.mime_type().to_string();
        let bytes = artifact.len();
        tokio::fs::write(&path, artifact.into_bytes()).await?;

        tracing::info!("Exported {} bytes to {:?}", bytes, path);
        Ok(ExportReceipt {
            path,
            bytes,
            mime_type,
        })
    }
}
