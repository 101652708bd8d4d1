//! Settings persistence

use super::schema::AppSettings;
use crate::utils::error::{AppError, AppResult};
use std::fs;
use std::path::Path;

/// Read settings from `path`; a missing file yields the defaults
pub fn read_settings(path: &Path) -> AppResult<AppSettings> {
    if !path.exists() {
        tracing::debug!("No settings at {:?}, using defaults", path);
        return Ok(AppSettings::default());
    }

    let content = fs::read_to_string(path)?;
    let settings: AppSettings = serde_json::from_str(&content)?;
    validate(&settings)?;
    Ok(settings)
}

/// Write settings to `path` as pretty JSON, creating parent directories
pub fn write_settings(path: &Path, settings: &AppSettings) -> AppResult<()> {
    validate(settings)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let content = serde_json::to_string_pretty(settings)?;
    fs::write(path, content)?;
    tracing::info!("Saved settings to {:?}", path);
    Ok(())
}

fn validate(settings: &AppSettings) -> AppResult<()> {
    let ai = &settings.ai;
    if !(ai.proximity_ratio > 0.0 && ai.alignment_ratio > 0.0) {
        return Err(AppError::Settings(format!(
            "ratios must be positive (proximity {}, alignment {})",
            ai.proximity_ratio, ai.alignment_ratio
        )));
    }
    if settings.video.frame_rate == 0 {
        return Err(AppError::Settings("frame rate must be at least 1".to_string()));
    }
    Ok(())
}
