use std::future::Future;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use tempfile::NamedTempFile;
use tracing::info;

use crate::error::NotationError;

use super::types::ProjectData;

/// Destination of project saves.
pub trait ProjectSink: Send + Sync + 'static {
    fn save(&self, path: &Path, data: &ProjectData) -> impl Future<Output = Result<(), NotationError>> + Send;
}

/// Writes pretty JSON next to the target and renames it into place, so an
/// interrupted save never leaves a truncated project.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonFileSink;

impl ProjectSink for JsonFileSink {
    /// Runs the write on the blocking pool.
    async fn save(&self, path: &Path, data: &ProjectData) -> Result<(), NotationError> {
        let data = data.clone();
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || write_project_atomic(&data, &path))
            .await
            .map_err(|e| std::io::Error::other(format!("Project save task failed: {e}")))?
    }
}

pub fn write_project_atomic(data: &ProjectData, target_path: &Path) -> Result<(), NotationError> {
    let json = serde_json::to_string_pretty(data)?;

    let parent = match target_path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)?;

    let mut temp = NamedTempFile::new_in(parent)?;
    temp.write_all(json.as_bytes())?;
    temp.flush()?;
    temp.persist(target_path).map_err(|e| e.error)?;

    info!("Saved project to {:?}", target_path);
    Ok(())
}

pub fn load_project_file(path: &Path) -> Result<ProjectData> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read project file {:?}", path))?;
    let data: ProjectData =
        serde_json::from_str(&content).with_context(|| format!("Failed to parse project file {:?}", path))?;
    info!("Loaded project file {:?}", path);
    Ok(data)
}

/// Raw JSON of any project file, for importing another judge's notes.
pub fn load_project_value(path: &Path) -> Result<serde_json::Value> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read project file {:?}", path))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse project file {:?}", path))
}
