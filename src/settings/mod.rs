//! Application settings
//!
//! JSON-backed settings that produce the recorder's trigger configuration.

pub mod schema;
pub mod store;

pub use schema::{AiSettings, AppSettings, RecordingSettings, VideoSettings};
pub use store::{read_settings, write_settings};
