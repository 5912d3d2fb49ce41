// Nuki smart-lock poll payloads
//
// A poller drops the raw body of a `/smartlock` listing onto the pipeline.
// Bodies arrive with stray framing around the JSON (log prefixes, trailing
// newlines) and occasionally as a single object instead of a list, so the
// parser is tolerant about both.

pub mod models;

pub use models::{SmartLock, SmartLockAdvancedConfig, SmartLockConfig, SmartLockState};

use serde::Deserialize;
use tracing::trace;

use crate::error::Error;

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    Many(Vec<SmartLock>),
    One(Box<SmartLock>),
}

/// Parse a raw poll body into smart-lock records.
///
/// Tries the body as-is first (list or single object). Failing that, the
/// outermost `[...]` slice is parsed as a list.
pub fn parse_locks_payload(raw: &str) -> Result<Vec<SmartLock>, Error> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(Error::MalformedPayload {
            message: "empty payload".into(),
        });
    }

    match serde_json::from_str::<OneOrMany>(trimmed) {
        Ok(OneOrMany::Many(locks)) => return Ok(locks),
        Ok(OneOrMany::One(lock)) => return Ok(vec![*lock]),
        Err(e) => trace!(error = %e, "payload is not bare JSON, trying bracket slice"),
    }

    let (Some(start), Some(end)) = (trimmed.find('['), trimmed.rfind(']')) else {
        return Err(Error::MalformedPayload {
            message: "no JSON array found in payload".into(),
        });
    };
    if end < start {
        return Err(Error::MalformedPayload {
            message: "unbalanced brackets in payload".into(),
        });
    }

    serde_json::from_str::<Vec<SmartLock>>(&trimmed[start..=end]).map_err(|e| {
        Error::MalformedPayload {
            message: e.to_string(),
        }
    })
}
