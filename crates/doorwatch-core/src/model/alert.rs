// ── Outbound alert messages ──
//
// The pipeline's only output. Delivery (chat bot, outbox directory) is
// the consumer's concern.

use bytes::Bytes;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextAlert {
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhotoAlert {
    #[serde(skip)]
    pub image: Bytes,
    pub filename: String,
    pub caption: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AlertMessage {
    Text(TextAlert),
    Photo(PhotoAlert),
}

impl AlertMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Photo(_) => "photo",
        }
    }

    /// Body text for text alerts, caption for photos.
    pub fn summary(&self) -> &str {
        match self {
            Self::Text(t) => &t.body,
            Self::Photo(p) => &p.caption,
        }
    }
}

impl From<TextAlert> for AlertMessage {
    fn from(alert: TextAlert) -> Self {
        Self::Text(alert)
    }
}

impl From<PhotoAlert> for AlertMessage {
    fn from(alert: PhotoAlert) -> Self {
        Self::Photo(alert)
    }
}
