//! Directory inboxes feeding the pipeline.
//!
//! Upstream pollers drop one JSON file per lock poll into the poll inbox;
//! cameras drop image files into the camera inbox. Files are handed over
//! in name order and removed once queued. Dot-files are skipped so a
//! writer can stage `.name.tmp` and rename it into place.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::debug;

use doorwatch_core::{CameraFrame, Pipeline};

use crate::error::CliError;

const POLL_EXTENSIONS: &[&str] = &["json"];
const FRAME_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// How many files one scan handed to the pipeline.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScanCounts {
    pub polls: usize,
    pub frames: usize,
}

/// Queue every poll, wait for the poll stage to apply them, then queue
/// every frame. Frames from this scan are gated against the lock state of
/// this scan's polls.
pub async fn scan(
    pipeline: &Pipeline,
    poll_dir: &Path,
    frame_dir: &Path,
) -> Result<ScanCounts, CliError> {
    let baseline = pipeline.polls_processed();
    let polls = submit_polls(pipeline, poll_dir).await?;
    pipeline
        .wait_for_polls(baseline.saturating_add(u64::try_from(polls).unwrap_or(u64::MAX)))
        .await;

    let frames = submit_frames(pipeline, frame_dir).await?;
    Ok(ScanCounts { polls, frames })
}

async fn submit_polls(pipeline: &Pipeline, dir: &Path) -> Result<usize, CliError> {
    let files = list_files(dir, POLL_EXTENSIONS).await?;
    for path in &files {
        let body = fs::read_to_string(path).await.map_err(CliError::io(path))?;
        pipeline.submit_poll(body).await?;
        fs::remove_file(path).await.map_err(CliError::io(path))?;
        debug!(file = %path.display(), "poll queued");
    }
    Ok(files.len())
}

async fn submit_frames(pipeline: &Pipeline, dir: &Path) -> Result<usize, CliError> {
    let files = list_files(dir, FRAME_EXTENSIONS).await?;
    for path in &files {
        let image = fs::read(path).await.map_err(CliError::io(path))?;
        let key = file_name(path);
        pipeline.submit_frame(CameraFrame::new(key, image)).await?;
        fs::remove_file(path).await.map_err(CliError::io(path))?;
        debug!(file = %path.display(), "frame queued");
    }
    Ok(files.len())
}

/// Regular files in `dir` with one of `extensions` (case-insensitive),
/// sorted by name.
async fn list_files(dir: &Path, extensions: &[&str]) -> Result<Vec<PathBuf>, CliError> {
    let mut entries = fs::read_dir(dir).await.map_err(CliError::io(dir))?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(CliError::io(dir))? {
        let path = entry.path();
        let file_type = entry.file_type().await.map_err(CliError::io(&path))?;
        if file_type.is_file() && !file_name(&path).starts_with('.') && has_extension(&path, extensions)
        {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}
