//! Capture session
//!
//! Buffers the encoded chunks of one live source between `start()` and
//! `stop()`, then finalizes them into an [`Artifact`].

use super::artifact::Artifact;
use super::traits::{CaptureError, CaptureResult, MediaChunk, MediaEncoder, MediaSource};
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Preferred recording format
pub const DEFAULT_PREFERRED_MIME_TYPE: &str = "video/webm; codecs=vp9";

pub struct CaptureSession {
    id: Uuid,
    source: Arc<dyn MediaSource>,
    encoder: Box<dyn MediaEncoder>,
    receiver: Option<mpsc::UnboundedReceiver<MediaChunk>>,
    chunks: Vec<MediaChunk>,
    active: bool,
}

impl CaptureSession {
    /// Attach to `source`, probing for the preferred codec first.
    ///
    /// An unsupported preferred codec falls back to the source's default
    /// encoder; only a missing default encoder is fatal.
    pub fn new(
        source: Arc<dyn MediaSource>,
        preferred_mime_type: Option<&str>,
    ) -> CaptureResult<Self> {
        let encoder = match preferred_mime_type {
            Some(mime_type) => match source.create_encoder(Some(mime_type)) {
                Ok(encoder) => encoder,
                Err(CaptureError::UnsupportedCodec(codec)) => {
                    tracing::warn!(
                        "Codec '{}' not supported, falling back to default encoder",
                        codec
                    );
                    Self::default_encoder(source.as_ref())?
                }
                Err(e) => return Err(e),
            },
            None => Self::default_encoder(source.as_ref())?,
        };

        let session = Self {
            id: Uuid::new_v4(),
            source,
            encoder,
            receiver: None,
            chunks: Vec::new(),
            active: false,
        };
        tracing::info!(
            "Capture session {} attached to '{}' ({})",
            session.id,
            session.source.label(),
            session.encoder.mime_type()
        );
        Ok(session)
    }

    fn default_encoder(source: &dyn MediaSource) -> CaptureResult<Box<dyn MediaEncoder>> {
        source.create_encoder(None).map_err(|e| match e {
            CaptureError::UnsupportedCodec(detail) => CaptureError::NoEncoder(detail),
            other => other,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn source(&self) -> &Arc<dyn MediaSource> {
        &self.source
    }

    pub fn mime_type(&self) -> &str {
        self.encoder.mime_type()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn buffered_bytes(&self) -> usize {
        self.chunks.iter().map(MediaChunk::len).sum()
    }

    /// Start buffering. Does nothing when already active.
    pub fn start(&mut self) -> CaptureResult<()> {
        if self.active {
            return Ok(());
        }

        self.chunks.clear();
        let (sink, receiver) = mpsc::unbounded_channel();
        self.encoder.start(sink)?;
        self.receiver = Some(receiver);
        self.active = true;

        tracing::info!("Recording started (session {})", self.id);
        Ok(())
    }

    /// Move delivered chunks into the buffer. Returns how many were moved.
    pub fn pump(&mut self) -> usize {
        let Some(receiver) = self.receiver.as_mut() else {
            return 0;
        };
        let mut moved = 0;
        while let Ok(chunk) = receiver.try_recv() {
            if !chunk.is_empty() {
                self.chunks.push(chunk);
                moved += 1;
            }
        }
        moved
    }

    /// Stop and finalize the buffered chunks.
    ///
    /// Stopping an inactive session is not an error: it resolves with an
    /// empty artifact.
    pub async fn stop(&mut self) -> CaptureResult<Artifact> {
        if !self.active {
            return Ok(Artifact::empty());
        }
        self.active = false;

        let stopped = self.encoder.stop().await;
        self.pump();
        self.receiver = None;
        let chunks = std::mem::take(&mut self.chunks);
        stopped?;

        let artifact = Artifact::from_chunks(chunks, self.encoder.mime_type());
        tracing::info!(
            "Recording stopped (session {}). Artifact size: {} bytes",
            self.id,
            artifact.len()
        );
        Ok(artifact)
    }

    /// Tear down without producing an artifact; buffered chunks are dropped
    pub fn abort(&mut self) {
        if self.active {
            self.encoder.abort();
            self.active = false;
            tracing::debug!(
                "Capture session {} aborted with {} chunks buffered",
                self.id,
                self.chunks.len()
            );
        }
        self.receiver = None;
        self.chunks = Vec::new();
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.abort();
    }
}
