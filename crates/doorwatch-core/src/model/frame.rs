// ── Camera frame and classification types ──

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One still image from a camera. `key` is the upstream file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraFrame {
    pub key: String,
    pub image: Bytes,
    pub received_at: DateTime<Utc>,
}

impl CameraFrame {
    pub fn new(key: impl Into<String>, image: impl Into<Bytes>) -> Self {
        Self {
            key: key.into(),
            image: image.into(),
            received_at: Utc::now(),
        }
    }
}

/// Best-matching label for one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub frame_key: String,
    pub label: String,
    pub label_index: usize,
    /// Classifier probability in `0.0..=1.0`.
    pub probability: f32,
}

impl ClassificationResult {
    pub fn percent(&self) -> f32 {
        self.probability * 100.0
    }
}
