// ── Gate table with changelog-backed recovery ──
//
// Readers load an immutable `Arc<GateTable>` through `ArcSwap`, so a poll
// batch is visible all at once or not at all. Every state change goes to
// the changelog first; a gate that keeps its state writes nothing.
// `restore` rebuilds the table from the changelog on startup and compacts
// it to one record per gate.

use std::collections::BTreeMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::GateScope;
use crate::error::CoreError;
use crate::log::DurableLog;
use crate::model::{GateKey, GateState, LockSnapshot};
use crate::stream::GateWatch;

pub type GateTable = BTreeMap<GateKey, GateState>;

/// One changelog record: the latest state of one gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateUpdate {
    pub key: GateKey,
    pub state: GateState,
    pub recorded_at: DateTime<Utc>,
}

pub struct AlertGateStore {
    scope: GateScope,
    table: ArcSwap<GateTable>,
    snapshot: watch::Sender<Arc<GateTable>>,
    bootstrapped: watch::Sender<bool>,
    changelog: Arc<DurableLog<GateUpdate>>,
}

impl AlertGateStore {
    /// Create an empty, not-yet-bootstrapped store. Call `restore` before
    /// serving reads.
    pub fn new(scope: GateScope, changelog: Arc<DurableLog<GateUpdate>>) -> Self {
        let (snapshot, _) = watch::channel(Arc::new(GateTable::new()));
        let (bootstrapped, _) = watch::channel(false);
        Self {
            scope,
            table: ArcSwap::from_pointee(GateTable::new()),
            snapshot,
            bootstrapped,
            changelog,
        }
    }

    pub fn scope(&self) -> GateScope {
        self.scope
    }

    /// Replay the changelog into the table and mark the store bootstrapped.
    /// Returns the number of records applied.
    pub fn restore(&self) -> usize {
        let records = self.changelog.replay();
        let mut table = GateTable::new();
        for record in &records {
            table.insert(record.key.clone(), record.state);
        }

        info!(
            log = self.changelog.name(),
            records = records.len(),
            gates = table.len(),
            "restored gate table"
        );
        if records.len() > table.len() {
            if let Err(e) = self.changelog.compact(|update| update.key.clone()) {
                warn!(error = %e, "gate changelog compaction failed, keeping full log");
            }
        }
        self.publish(table);
        self.bootstrapped.send_replace(true);
        records.len()
    }

    pub fn is_bootstrapped(&self) -> bool {
        *self.bootstrapped.borrow()
    }

    /// Wait until `restore` has completed.
    pub async fn wait_bootstrapped(&self) {
        let mut rx = self.bootstrapped.subscribe();
        // The sender lives in `self`, so this only errors if the store is gone.
        let _ = rx.wait_for(|done| *done).await;
    }

    /// The gate states a batch decides, keyed by gate.
    ///
    /// Global scope always decides the single global gate (an empty batch
    /// arms it). Per-site scope decides one gate per site present in the
    /// batch and leaves absent sites untouched.
    pub fn decide(&self, batch: &[LockSnapshot]) -> GateTable {
        match self.scope {
            GateScope::Global => {
                BTreeMap::from([(GateKey::global(), GateState::from_batch(batch))])
            }
            GateScope::PerSite => {
                let mut by_site: BTreeMap<GateKey, Vec<&LockSnapshot>> = BTreeMap::new();
                for snapshot in batch {
                    by_site
                        .entry(GateKey::for_site(snapshot.site_id))
                        .or_default()
                        .push(snapshot);
                }
                by_site
                    .into_iter()
                    .map(|(key, snapshots)| (key, GateState::from_batch(snapshots)))
                    .collect()
            }
        }
    }

    /// Apply one poll batch and return the states it decided.
    ///
    /// Only gates whose state changes are written. The changelog is written
    /// before the table changes; on a changelog failure the table is left
    /// as it was.
    pub fn update(&self, batch: &[LockSnapshot]) -> Result<GateTable, CoreError> {
        if !self.is_bootstrapped() {
            return Err(CoreError::NotBootstrapped);
        }

        let decided = self.decide(batch);
        let current = self.table.load_full();
        let changed: Vec<(&GateKey, GateState)> = decided
            .iter()
            .filter(|&(key, state)| current.get(key) != Some(state))
            .map(|(key, state)| (key, *state))
            .collect();

        if changed.is_empty() {
            debug!(gates = decided.len(), "gate states unchanged");
            return Ok(decided);
        }

        let now = Utc::now();
        for &(key, state) in &changed {
            self.changelog.append(GateUpdate {
                key: key.clone(),
                state,
                recorded_at: now,
            })?;
        }

        let mut next = (*current).clone();
        for &(key, state) in &changed {
            info!(gate = %key, from = ?current.get(key), to = %state, "gate state changed");
            next.insert(key.clone(), state);
        }
        self.publish(next);
        Ok(decided)
    }

    pub fn read(&self, key: &GateKey) -> Option<GateState> {
        self.table.load().get(key).copied()
    }

    /// Fail-closed: a gate with no recorded state is not armed.
    pub fn is_armed(&self, key: &GateKey) -> bool {
        self.read(key).is_some_and(GateState::is_armed)
    }

    pub fn snapshot(&self) -> Arc<GateTable> {
        self.table.load_full()
    }

    pub fn subscribe(&self) -> GateWatch {
        GateWatch::new(self.snapshot.subscribe())
    }

    fn publish(&self, table: GateTable) {
        let table = Arc::new(table);
        self.table.store(Arc::clone(&table));
        // `send_replace` updates unconditionally, even with zero receivers.
        self.snapshot.send_replace(table);
    }
}
