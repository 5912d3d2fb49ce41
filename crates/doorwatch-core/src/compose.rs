// ── Alert message composition ──
//
// Renders lock transitions and classification results as the human
// readable messages the alert sink delivers.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::model::{
    CameraFrame, ClassificationResult, LockTransition, PhotoAlert, TextAlert,
};

#[derive(Debug, Clone, Copy)]
pub struct AlertMessageComposer {
    zone: Tz,
}

impl AlertMessageComposer {
    pub fn new(zone: Tz) -> Self {
        Self { zone }
    }

    /// `SmartLock {site}/{lock} ({name}) updated at {local time}, new state = {STATE}`
    pub fn from_transition(&self, transition: &LockTransition) -> TextAlert {
        let s = &transition.snapshot;
        TextAlert {
            body: format!(
                "SmartLock {}/{} ({}) updated at {}, new state = {}",
                s.site_id,
                s.lock_id,
                s.name,
                self.local_time(s.updated_at),
                s.state
            ),
        }
    }

    /// Photo alert carrying the frame's image, captioned with the best match.
    pub fn from_classification(
        &self,
        result: &ClassificationResult,
        frame: CameraFrame,
    ) -> PhotoAlert {
        PhotoAlert {
            caption: format!(
                "BEST MATCH: for image {} was {} ({:.2}% likely)",
                frame.key,
                result.label,
                result.percent()
            ),
            filename: frame.key,
            image: frame.image,
        }
    }

    fn local_time(&self, at: DateTime<Utc>) -> String {
        let local = at.with_timezone(&self.zone);
        format!("{}[{}]", local.format("%Y-%m-%dT%H:%M:%S%:z"), self.zone.name())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::config::DEFAULT_TIMEZONE;
    use crate::model::{LockId, LockSnapshot, LockState, SiteId};

    fn composer() -> AlertMessageComposer {
        AlertMessageComposer::new(DEFAULT_TIMEZONE)
    }

    fn transition(state: LockState, epoch: i64) -> LockTransition {
        LockTransition {
            previous: None,
            snapshot: LockSnapshot {
                site_id: SiteId(345),
                lock_id: LockId(234),
                name: "Test name".into(),
                state,
                trigger: 0,
                battery_critical: false,
                updated_at: Utc.timestamp_opt(epoch, 0).unwrap(),
            },
        }
    }

    #[test]
    fn text_alert_for_summer_unlock() {
        let alert = composer().from_transition(&transition(LockState::Unlocked, 1_536_160_393));
        insta::assert_snapshot!(
            alert.body,
            @"SmartLock 345/234 (Test name) updated at 2018-09-05T17:13:13+02:00[Europe/Amsterdam], new state = UNLOCKED"
        );
    }

    #[test]
    fn text_alert_for_winter_lock() {
        let alert = composer().from_transition(&transition(LockState::Locked, 1_541_348_348));
        insta::assert_snapshot!(
            alert.body,
            @"SmartLock 345/234 (Test name) updated at 2018-11-04T17:19:08+01:00[Europe/Amsterdam], new state = LOCKED"
        );
    }

    #[test]
    fn photo_alert_caption_and_payload() {
        let frame = CameraFrame::new("frontdoor-0042.jpg", &b"jpeg-bytes"[..]);
        let result = ClassificationResult {
            frame_key: frame.key.clone(),
            label: "burglar-alert".into(),
            label_index: 0,
            probability: 0.875,
        };

        let alert = composer().from_classification(&result, frame);
        insta::assert_snapshot!(
            alert.caption,
            @"BEST MATCH: for image frontdoor-0042.jpg was burglar-alert (87.50% likely)"
        );
        assert_eq!(alert.filename, "frontdoor-0042.jpg");
        assert_eq!(&alert.image[..], b"jpeg-bytes");
    }
}
