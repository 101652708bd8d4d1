//! Artifact export
//!
//! The consumer boundary that receives a reviewed artifact, and an exporter
//! that saves it into a directory.

pub mod directory;
pub mod types;

pub use directory::DirectoryExporter;
pub use types::{ArtifactConsumer, ExportError, ExportReceipt, ExportResult};
