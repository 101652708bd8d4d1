//! Export types
//!
//! Defines the artifact consumer boundary, its receipt, and export errors.

use crate::capture::Artifact;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Record of a completed export
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportReceipt {
    /// Where the artifact ended up
    pub path: PathBuf,
    pub bytes: usize,
    pub mime_type: String,
}

/// Terminal consumer of a finalized artifact.
///
/// Ownership of the artifact moves into the consumer; nothing is kept
/// behind when it fails.
#[async_trait]
pub trait ArtifactConsumer: Send + Sync {
    async fn consume(&self, artifact: Artifact) -> ExportResult<ExportReceipt>;
}

/// Export errors
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Output directory not found: {0}")]
    DirectoryNotFound(String),

    #[error("Export rejected: {0}")]
    Rejected(String),
}

impl From<ExportError> for String {
    fn from(e: ExportError) -> String {
        e.to_string()
    }
}

pub type ExportResult<T> = Result<T, ExportError>;
