//! Finalized recordings

use super::traits::MediaChunk;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Prefix of exported file names
pub const ARTIFACT_NAME_PREFIX: &str = "stasis-ai";

/// An immutable recorded payload
#[derive(Debug, PartialEq, Eq)]
pub struct Artifact {
    id: Uuid,
    data: Vec<u8>,
    mime_type: String,
    created_at: DateTime<Utc>,
}

impl Artifact {
    /// Concatenate chunks, in order, into one payload
    pub fn from_chunks(chunks: Vec<MediaChunk>, mime_type: &str) -> Self {
        let total: usize = chunks.iter().map(MediaChunk::len).sum();
        let mut data = Vec::with_capacity(total);
        for chunk in chunks {
            data.extend_from_slice(&chunk.data);
        }
        Self {
            id: Uuid::new_v4(),
            data,
            mime_type: mime_type.to_string(),
            created_at: Utc::now(),
        }
    }

    /// The artifact produced by stopping an inactive session
    pub fn empty() -> Self {
        Self::from_chunks(Vec::new(), "")
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// File extension matching the container
    pub fn extension(&self) -> &'static str {
        let container = self
            .mime_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim();
        match container {
            "video/webm" | "audio/webm" => "webm",
            "video/mp4" | "audio/mp4" => "mp4",
            "video/x-matroska" => "mkv",
            _ => "bin",
        }
    }

    /// File name for downloads, e.g. `stasis-ai-2024-05-01T10-20-30.123Z.webm`
    pub fn suggested_name(&self) -> String {
        format!(
            "{}-{}.{}",
            ARTIFACT_NAME_PREFIX,
            self.created_at.format("%Y-%m-%dT%H-%M-%S%.3fZ"),
            self.extension()
        )
    }
}
