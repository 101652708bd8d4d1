//! Media capture
//!
//! This module provides the capture session that turns a live media source
//! into a finalized artifact, plus an in-process synthetic source.

pub mod artifact;
pub mod session;
pub mod synthetic;
pub mod traits;

pub use artifact::Artifact;
pub use session::{CaptureSession, DEFAULT_PREFERRED_MIME_TYPE};
pub use synthetic::{SyntheticProvider, SyntheticSource};
pub use traits::{
    CaptureError, CaptureResult, ChunkSink, MediaChunk, MediaEncoder, MediaProvider, MediaSource,
    SourceStatus, VideoConstraints, VideoFrame,
};
