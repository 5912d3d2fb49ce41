// ── Lock-change deduplication ──
//
// Remembers the last state emitted per lock and lets a snapshot through
// only when its state differs. The first snapshot ever seen for a lock is
// always emitted. Emissions are written to a changelog before the in-memory
// map changes, so a restart neither repeats nor loses a transition.

use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::CoreError;
use crate::log::DurableLog;
use crate::model::{LockId, LockSnapshot, LockState, LockTransition};

/// One changelog record: the last state emitted for a lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DedupRecord {
    pub lock_id: LockId,
    pub state: LockState,
}

pub struct LockChangeDeduplicator {
    last_emitted: DashMap<LockId, LockState>,
    changelog: Arc<DurableLog<DedupRecord>>,
}

impl LockChangeDeduplicator {
    pub fn new(changelog: Arc<DurableLog<DedupRecord>>) -> Self {
        Self {
            last_emitted: DashMap::new(),
            changelog,
        }
    }

    /// Rebuild the last-emitted map from the changelog. Returns the number
    /// of records replayed.
    pub fn restore(&self) -> usize {
        let records = self.changelog.replay();
        self.last_emitted.clear();
        for record in &records {
            self.last_emitted.insert(record.lock_id, record.state);
        }
        info!(
            log = self.changelog.name(),
            records = records.len(),
            locks = self.last_emitted.len(),
            "restored lock dedup state"
        );
        if records.len() > self.last_emitted.len() {
            if let Err(e) = self.changelog.compact(|record| record.lock_id) {
                warn!(error = %e, "dedup changelog compaction failed, keeping full log");
            }
        }
        records.len()
    }

    /// Pass `snapshot` through iff its state differs from the last one
    /// emitted for its lock.
    ///
    /// Snapshots of one lock must be processed in poll order; the pipeline
    /// guarantees this by partitioning on lock id.
    pub fn process(&self, snapshot: LockSnapshot) -> Result<Option<LockTransition>, CoreError> {
        let previous = self.last_emitted(snapshot.lock_id);
        if previous == Some(snapshot.state) {
            debug!(key = %snapshot.record_key(), state = %snapshot.state, "lock state unchanged");
            return Ok(None);
        }

        self.changelog.append(DedupRecord {
            lock_id: snapshot.lock_id,
            state: snapshot.state,
        })?;
        self.last_emitted.insert(snapshot.lock_id, snapshot.state);

        debug!(
            key = %snapshot.record_key(),
            from = ?previous,
            to = %snapshot.state,
            "lock state transition"
        );
        Ok(Some(LockTransition { previous, snapshot }))
    }

    pub fn last_emitted(&self, lock: LockId) -> Option<LockState> {
        self.last_emitted.get(&lock).map(|r| *r.value())
    }

    pub fn tracked_locks(&self) -> usize {
        self.last_emitted.len()
    }
}
