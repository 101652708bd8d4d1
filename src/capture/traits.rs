//! Capture trait definitions
//!
//! Platform-agnostic boundary for live media sources. Device selection and
//! permission prompts happen behind [`MediaProvider`]; the recorder only ever
//! sees an already-live [`MediaSource`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

/// Capture errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("Failed to acquire media source: {0}")]
    Acquisition(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Codec not supported: {0}")]
    UnsupportedCodec(String),

    #[error("No encoder available: {0}")]
    NoEncoder(String),

    #[error("Media source failed: {0}")]
    SourceFailed(String),

    #[error("Encoder error: {0}")]
    Encoder(String),
}

pub type CaptureResult<T> = Result<T, CaptureError>;

/// Requested capture format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoConstraints {
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
}

impl Default for VideoConstraints {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            frame_rate: 60,
        }
    }
}

/// A decoded video frame handed to the pose estimator
#[derive(Debug, Clone, PartialEq)]
pub struct VideoFrame {
    /// Monotonic frame counter; a new value means a fresh frame
    pub sequence: u64,
    /// Capture time in milliseconds since the source went live
    pub timestamp_ms: f64,
    pub width: u32,
    pub height: u32,
    pub data: Arc<[u8]>,
}

impl VideoFrame {
    pub fn new(sequence: u64, timestamp_ms: f64, width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            sequence,
            timestamp_ms,
            width,
            height,
            data: data.into(),
        }
    }
}

/// One encoded slice of the recording, in emission order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaChunk {
    pub data: Vec<u8>,
}

impl MediaChunk {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Where an encoder delivers its chunks
pub type ChunkSink = mpsc::UnboundedSender<MediaChunk>;

/// Health of a live source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceStatus {
    Live,
    /// Released or the device went away cleanly
    Ended,
    Failed(String),
}

/// Encoder attached to a media source
#[async_trait]
pub trait MediaEncoder: Send {
    /// Container/codec of the produced chunks
    fn mime_type(&self) -> &str;

    /// Begin emitting chunks into `sink`
    fn start(&mut self, sink: ChunkSink) -> CaptureResult<()>;

    /// Flush and stop. Every chunk has been sent to the sink by the time this
    /// resolves, and the sink is dropped.
    async fn stop(&mut self) -> CaptureResult<()>;

    /// Stop immediately without flushing
    fn abort(&mut self);
}

/// A live, continuous media stream
pub trait MediaSource: Send + Sync {
    /// Unique source identifier
    fn id(&self) -> &str;

    /// Human readable device label
    fn label(&self) -> &str;

    fn status(&self) -> SourceStatus;

    /// Most recent frame, if any has arrived
    fn latest_frame(&self) -> Option<VideoFrame>;

    /// Create an encoder for `mime_type`, or the source's default encoder
    /// when `None`. Fails with [`CaptureError::UnsupportedCodec`] when the
    /// requested type is refused.
    fn create_encoder(&self, mime_type: Option<&str>) -> CaptureResult<Box<dyn MediaEncoder>>;

    /// Stop the underlying tracks
    fn release(&self);
}

/// Hands out live media sources
#[async_trait]
pub trait MediaProvider: Send + Sync {
    async fn acquire(&self, constraints: &VideoConstraints) -> CaptureResult<Arc<dyn MediaSource>>;
}
