// ── Poll payload to domain conversions ──
//
// Turns raw `doorwatch_api::nuki` records into `LockSnapshot`s. A bad entry
// never fails its batch: unreadable dates fall back to "now" and a missing
// state section decodes as `Undefined`.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use tracing::{debug, error, warn};

use doorwatch_api::nuki::{self, SmartLock};

use crate::model::{LockId, LockSnapshot, LockState, SiteId};

// ── Helpers ────────────────────────────────────────────────────────

/// Parse an update timestamp. Offset-less values are read as wall-clock
/// time in `zone`.
fn parse_update_date(raw: &str, zone: Tz) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .and_then(|naive| zone.from_local_datetime(&naive).earliest())
        .map(|dt| dt.with_timezone(&Utc))
}

// ── Normalizer ─────────────────────────────────────────────────────

/// Converts raw poll bodies into normalized lock snapshots.
#[derive(Debug, Clone, Copy)]
pub struct LockRecordNormalizer {
    zone: Tz,
}

impl LockRecordNormalizer {
    pub fn new(zone: Tz) -> Self {
        Self { zone }
    }

    /// Normalize a raw poll body. Malformed bodies yield an empty batch.
    pub fn normalize(&self, raw: &str) -> Vec<LockSnapshot> {
        match self.try_normalize(raw) {
            Ok(batch) => batch,
            Err(e) => {
                error!(error = %e, "discarding malformed lock poll payload");
                Vec::new()
            }
        }
    }

    /// Like `normalize`, but reports a malformed body instead of hiding it
    /// behind an empty batch.
    pub fn try_normalize(&self, raw: &str) -> Result<Vec<LockSnapshot>, doorwatch_api::Error> {
        let locks = nuki::parse_locks_payload(raw)?;
        Ok(self.normalize_locks(locks))
    }

    pub fn normalize_locks(&self, locks: Vec<SmartLock>) -> Vec<LockSnapshot> {
        locks.into_iter().map(|lock| self.snapshot(lock)).collect()
    }

    fn snapshot(&self, lock: SmartLock) -> LockSnapshot {
        let site_id = SiteId(lock.account_id);
        let lock_id = LockId(lock.smartlock_id);

        let updated_at = match lock.update_date.as_deref() {
            Some(raw) => parse_update_date(raw, self.zone).unwrap_or_else(|| {
                warn!(%site_id, %lock_id, value = raw, "unreadable lock update date, using current time");
                Utc::now()
            }),
            None => {
                warn!(%site_id, %lock_id, "lock has no update date, using current time");
                Utc::now()
            }
        };

        let (state, trigger, battery_critical) = match lock.state {
            Some(s) => (LockState::from_code(s.state), s.trigger, s.battery_critical),
            None => {
                warn!(%site_id, %lock_id, "lock has no state section");
                (LockState::Undefined, 0, false)
            }
        };

        let snapshot = LockSnapshot {
            site_id,
            lock_id,
            name: lock.name,
            state,
            trigger,
            battery_critical,
            updated_at,
        };
        debug!(key = %snapshot.record_key(), state = %snapshot.state, "normalized lock record");
        snapshot
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::config::DEFAULT_TIMEZONE;

    fn normalizer() -> LockRecordNormalizer {
        LockRecordNormalizer::new(DEFAULT_TIMEZONE)
    }

    fn amsterdam(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        DEFAULT_TIMEZONE
            .with_ymd_and_hms(y, mo, d, h, mi, s)
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn unlocked_lock_fixture() {
        let raw = r#"[{"smartlockId":234,"accountId":345,"name":"Test name",
            "state":{"mode":2,"state":3,"trigger":0,"batteryCritical":false},
            "updateDate":"2018-09-05T15:13:13.000Z"}]"#;
        let batch = normalizer().normalize(raw);

        assert_eq!(batch.len(), 1);
        let snapshot = &batch[0];
        assert_eq!(snapshot.record_key(), "345/234:1536160393");
        assert_eq!(snapshot.name, "Test name");
        assert_eq!(snapshot.state, LockState::Unlocked);
        assert_eq!(snapshot.updated_at, amsterdam(2018, 9, 5, 17, 13, 13));
    }

    #[test]
    fn locked_lock_fixture_with_local_time() {
        let raw = r#"{"smartlockId":234,"accountId":345,"name":"Test name",
            "state":{"state":1,"batteryCritical":true},
            "updateDate":"2018-11-04T17:19:08"}"#;
        let batch = normalizer().normalize(raw);

        let snapshot = &batch[0];
        assert_eq!(snapshot.record_key(), "345/234:1541348348");
        assert_eq!(snapshot.state, LockState::Locked);
        assert!(snapshot.battery_critical);
        assert_eq!(snapshot.updated_at, amsterdam(2018, 11, 4, 17, 19, 8));
    }

    #[test]
    fn unreadable_date_falls_back_to_now() {
        let before = Utc::now();
        let raw = r#"[{"smartlockId":1,"state":{"state":3},"updateDate":"yesterday-ish"}]"#;
        let batch = normalizer().normalize(raw);

        assert_eq!(batch.len(), 1);
        assert!(batch[0].updated_at >= before);
        assert_eq!(batch[0].state, LockState::Unlocked);
    }

    #[test]
    fn missing_state_is_undefined() {
        let batch = normalizer().normalize(r#"[{"smartlockId":1}]"#);
        assert_eq!(batch[0].state, LockState::Undefined);
    }

    #[test]
    fn malformed_payload_yields_empty_batch() {
        assert!(normalizer().normalize("<html>502 Bad Gateway</html>").is_empty());
        assert!(normalizer().try_normalize("<html>502 Bad Gateway</html>").is_err());
    }
}
