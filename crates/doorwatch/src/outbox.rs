//! Alert delivery to an outbox directory.
//!
//! Every alert becomes one line in `alerts.jsonl`. Photo alerts also
//! write their image under `photos/`, and the line points at it.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tracing::{error, info};

use doorwatch_core::AlertMessage;

use crate::error::CliError;

pub const ALERTS_FILE: &str = "alerts.jsonl";
pub const PHOTOS_DIR: &str = "photos";

#[derive(Debug, Serialize)]
struct OutboxEntry<'a> {
    written_at: DateTime<Utc>,
    kind: &'static str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    photo: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Outbox {
    dir: PathBuf,
}

impl Outbox {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write one alert. Returns the path of the stored photo, if any.
    pub async fn write(&self, alert: &AlertMessage) -> Result<Option<PathBuf>, CliError> {
        let written_at = Utc::now();
        let photo = match alert {
            AlertMessage::Photo(p) => Some(self.store_photo(&p.filename, &p.image, written_at).await?),
            AlertMessage::Text(_) => None,
        };

        let entry = OutboxEntry {
            written_at,
            kind: alert.kind(),
            text: alert.summary(),
            photo: photo.as_ref().map(|p| p.display().to_string()),
        };
        let mut line = serde_json::to_string(&entry).map_err(|e| CliError::Internal {
            message: format!("failed to encode alert: {e}"),
        })?;
        line.push('\n');

        let path = self.dir.join(ALERTS_FILE);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(CliError::io(&path))?;
        file.write_all(line.as_bytes()).await.map_err(CliError::io(&path))?;
        file.flush().await.map_err(CliError::io(&path))?;
        Ok(photo)
    }

    async fn store_photo(
        &self,
        filename: &str,
        image: &[u8],
        at: DateTime<Utc>,
    ) -> Result<PathBuf, CliError> {
        let dir = self.dir.join(PHOTOS_DIR);
        fs::create_dir_all(&dir).await.map_err(CliError::io(&dir))?;

        // Frame keys come from outside; keep only the final component.
        let base = Path::new(filename)
            .file_name()
            .map_or_else(|| "frame".to_owned(), |n| n.to_string_lossy().into_owned());
        let path = dir.join(format!("{}-{base}", at.format("%Y%m%dT%H%M%S%.3fZ")));
        fs::write(&path, image).await.map_err(CliError::io(&path))?;
        Ok(path)
    }
}

/// Drain the alert channel into `outbox` until the pipeline closes it.
/// A failed write is logged and the alert skipped. Returns the number of
/// alerts written.
pub async fn deliver(outbox: Outbox, mut alerts: mpsc::Receiver<AlertMessage>) -> usize {
    let mut written = 0;
    while let Some(alert) = alerts.recv().await {
        match outbox.write(&alert).await {
            Ok(_) => written += 1,
            Err(e) => error!(error = %e, kind = alert.kind(), "failed to write alert to outbox"),
        }
    }
    info!(written, dir = %outbox.dir().display(), "outbox writer stopped");
    written
}
