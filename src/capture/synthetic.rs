//! Synthetic media source
//!
//! An in-process source that emits generated frames, either pushed by hand
//! or by a background feeder at a fixed frame rate. Every frame pushed while
//! an encoder is running is also delivered to that encoder as one chunk.

use super::traits::{
    CaptureError, CaptureResult, ChunkSink, MediaChunk, MediaEncoder, MediaProvider, MediaSource,
    SourceStatus, VideoConstraints, VideoFrame,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Size of generated frame payloads
const SYNTHETIC_FRAME_BYTES: usize = 64;

struct SourceInner {
    status: SourceStatus,
    latest: Option<VideoFrame>,
    next_sequence: u64,
    sink: Option<ChunkSink>,
}

struct Shared {
    inner: Mutex<SourceInner>,
    encoders_created: AtomicUsize,
    releases: AtomicUsize,
}

pub struct SyntheticSource {
    id: String,
    label: String,
    width: u32,
    height: u32,
    supported_mime_types: Vec<String>,
    default_mime_type: Option<String>,
    started_at: Instant,
    shared: Arc<Shared>,
}

impl SyntheticSource {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            label: format!("Synthetic camera ({id})"),
            width: 1280,
            height: 720,
            supported_mime_types: vec![
                "video/webm; codecs=vp9".to_string(),
                "video/webm".to_string(),
            ],
            default_mime_type: Some("video/webm".to_string()),
            started_at: Instant::now(),
            shared: Arc::new(Shared {
                inner: Mutex::new(SourceInner {
                    status: SourceStatus::Live,
                    latest: None,
                    next_sequence: 1,
                    sink: None,
                }),
                encoders_created: AtomicUsize::new(0),
                releases: AtomicUsize::new(0),
            }),
        }
    }

    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Restrict which explicit mime types `create_encoder` accepts
    pub fn with_supported_mime_types(mut self, mime_types: &[&str]) -> Self {
        self.supported_mime_types = mime_types.iter().map(|m| m.to_string()).collect();
        self
    }

    /// Refuse every encoder, including the default one
    pub fn without_encoders(mut self) -> Self {
        self.supported_mime_types.clear();
        self.default_mime_type = None;
        self
    }

    /// Publish a new frame and, while recording, one chunk with its bytes
    pub fn push_frame(&self, data: Vec<u8>) -> Option<u64> {
        let mut inner = self.shared.inner.lock();
        if inner.status != SourceStatus::Live {
            return None;
        }
        let sequence = inner.next_sequence;
        inner.next_sequence += 1;

        if let Some(sink) = inner.sink.as_ref() {
            if sink.send(MediaChunk::new(data.clone())).is_err() {
                inner.sink = None;
            }
        }

        let timestamp_ms = self.started_at.elapsed().as_secs_f64() * 1000.0;
        inner.latest = Some(VideoFrame::new(sequence, timestamp_ms, self.width, self.height, data));
        Some(sequence)
    }

    /// Simulate the device failing mid-stream
    pub fn fail(&self, reason: &str) {
        let mut inner = self.shared.inner.lock();
        inner.status = SourceStatus::Failed(reason.to_string());
        inner.sink = None;
    }

    pub fn release_count(&self) -> usize {
        self.shared.releases.load(Ordering::SeqCst)
    }

    pub fn encoders_created(&self) -> usize {
        self.shared.encoders_created.load(Ordering::SeqCst)
    }

    /// Push generated frames at `frame_rate` until the source stops being live
    pub fn spawn_feeder(self: &Arc<Self>, frame_rate: u32) -> tokio::task::JoinHandle<()> {
        let source = Arc::clone(self);
        let period = Duration::from_secs_f64(1.0 / f64::from(frame_rate.max(1)));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                let fill = (source.shared.inner.lock().next_sequence % 251) as u8;
                if source.push_frame(vec![fill; SYNTHETIC_FRAME_BYTES]).is_none() {
                    tracing::debug!("Synthetic feeder for '{}' stopped", source.id);
                    break;
                }
            }
        })
    }
}

impl MediaSource for SyntheticSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn status(&self) -> SourceStatus {
        self.shared.inner.lock().status.clone()
    }

    fn latest_frame(&self) -> Option<VideoFrame> {
        self.shared.inner.lock().latest.clone()
    }

    fn create_encoder(&self, mime_type: Option<&str>) -> CaptureResult<Box<dyn MediaEncoder>> {
        let mime_type = match mime_type {
            Some(requested) => {
                if !self.supported_mime_types.iter().any(|m| m == requested) {
                    return Err(CaptureError::UnsupportedCodec(requested.to_string()));
                }
                requested.to_string()
            }
            None => self
                .default_mime_type
                .clone()
                .ok_or_else(|| {
                    CaptureError::NoEncoder(format!("source '{}' has no encoder", self.id))
                })?,
        };

        self.shared.encoders_created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(SyntheticEncoder {
            mime_type,
            shared: self.shared.clone(),
            running: false,
        }))
    }

    fn release(&self) {
        let mut inner = self.shared.inner.lock();
        inner.sink = None;
        if inner.status == SourceStatus::Live {
            inner.status = SourceStatus::Ended;
        }
        self.shared.releases.fetch_add(1, Ordering::SeqCst);
        tracing::debug!("Synthetic source '{}' released", self.id);
    }
}

struct SyntheticEncoder {
    mime_type: String,
    shared: Arc<Shared>,
    running: bool,
}

#[async_trait]
impl MediaEncoder for SyntheticEncoder {
    fn mime_type(&self) -> &str {
        &self.mime_type
    }

    fn start(&mut self, sink: ChunkSink) -> CaptureResult<()> {
        let mut inner = self.shared.inner.lock();
        if let SourceStatus::Failed(reason) = &inner.status {
            return Err(CaptureError::SourceFailed(reason.clone()));
        }
        inner.sink = Some(sink);
        self.running = true;
        Ok(())
    }

    async fn stop(&mut self) -> CaptureResult<()> {
        // Chunks are delivered as frames arrive, so there is nothing to flush.
        self.shared.inner.lock().sink = None;
        self.running = false;
        Ok(())
    }

    fn abort(&mut self) {
        if self.running {
            self.shared.inner.lock().sink = None;
            self.running = false;
        }
    }
}

/// Provider handing out a fresh [`SyntheticSource`] per acquisition.
///
/// Only the latest source is remembered unless built with
/// [`SyntheticProvider::keeping_history`], which tests use to audit every
/// source handed out.
pub struct SyntheticProvider {
    feed: bool,
    keep_history: bool,
    failure: Option<CaptureError>,
    acquisitions: AtomicUsize,
    acquired: Mutex<Vec<Arc<SyntheticSource>>>,
}

impl SyntheticProvider {
    /// Sources without a feeder; frames are pushed by hand
    pub fn manual() -> Self {
        Self {
            feed: false,
            keep_history: false,
            failure: None,
            acquisitions: AtomicUsize::new(0),
            acquired: Mutex::new(Vec::new()),
        }
    }

    /// Sources fed at the requested frame rate
    pub fn feeding() -> Self {
        Self {
            feed: true,
            ..Self::manual()
        }
    }

    pub fn failing(error: CaptureError) -> Self {
        Self {
            failure: Some(error),
            ..Self::manual()
        }
    }

    /// Remember every source handed out, not just the latest
    pub fn keeping_history(mut self) -> Self {
        self.keep_history = true;
        self
    }

    /// Remembered sources, oldest first
    pub fn sources(&self) -> Vec<Arc<SyntheticSource>> {
        self.acquired.lock().clone()
    }

    pub fn latest(&self) -> Option<Arc<SyntheticSource>> {
        self.acquired.lock().last().cloned()
    }
}

#[async_trait]
impl MediaProvider for SyntheticProvider {
    async fn acquire(
        &self,
        constraints: &VideoConstraints,
    ) -> CaptureResult<Arc<dyn MediaSource>> {
        if let Some(error) = &self.failure {
            return Err(error.clone());
        }

        let id = format!("synthetic-{}", self.acquisitions.fetch_add(1, Ordering::SeqCst));
        let source = Arc::new(
            SyntheticSource::new(&id).with_dimensions(constraints.width, constraints.height),
        );
        if self.feed {
            source.spawn_feeder(constraints.frame_rate);
        }

        let mut acquired = self.acquired.lock();
        if !self.keep_history {
            acquired.clear();
        }
        acquired.push(source.clone());
        Ok(source)
    }
}
