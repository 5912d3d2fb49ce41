// ── Pipeline runtime ──
//
// Owns the stage tasks and the queues between them:
//
//   polls  ─▶ poll task ─▶ gate store
//                       └▶ dedup partitions (by lock id) ─▶ alerts
//   frames ─▶ frame task ─▶ image gate ─▶ classifier ─▶ alerts
//
// Startup replays both changelogs before any task runs, so no frame is
// gated against a half-restored table. Shutdown stops intake, lets
// in-flight work finish, releases the classifier and closes the alert
// channel once the last stage exits.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use serde::Serialize;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::classify::{ClassificationStage, Classifier};
use crate::compose::AlertMessageComposer;
use crate::config::PipelineConfig;
use crate::convert::LockRecordNormalizer;
use crate::dedup::{DedupRecord, LockChangeDeduplicator};
use crate::error::CoreError;
use crate::gate::{FrameRouter, ImageGate};
use crate::log::DurableLog;
use crate::model::{AlertMessage, CameraFrame, LockId, LockSnapshot};
use crate::store::{AlertGateStore, GateUpdate};
use crate::stream::GateWatch;

pub const GATE_CHANGELOG_FILE: &str = "gate-changelog.jsonl";
pub const DEDUP_CHANGELOG_FILE: &str = "dedup-changelog.jsonl";

// ── Changelogs ─────────────────────────────────────────────────────

/// The two logs the pipeline recovers from.
pub struct Changelogs {
    pub gate: Arc<DurableLog<GateUpdate>>,
    pub dedup: Arc<DurableLog<DedupRecord>>,
}

impl Changelogs {
    /// Process-lifetime logs; state is lost on exit.
    pub fn in_memory() -> Self {
        Self {
            gate: Arc::new(DurableLog::in_memory("gate")),
            dedup: Arc::new(DurableLog::in_memory("dedup")),
        }
    }

    /// File-backed logs under `state_dir`.
    pub fn open(state_dir: &Path) -> Result<Self, CoreError> {
        Ok(Self {
            gate: Arc::new(DurableLog::open("gate", state_dir.join(GATE_CHANGELOG_FILE))?),
            dedup: Arc::new(DurableLog::open(
                "dedup",
                state_dir.join(DEDUP_CHANGELOG_FILE),
            )?),
        })
    }
}

// ── Stats ──────────────────────────────────────────────────────────

/// Running counters, updated by the stage tasks.
#[derive(Debug, Default)]
pub struct PipelineStats {
    polls_received: AtomicU64,
    polls_malformed: AtomicU64,
    snapshots: AtomicU64,
    transitions: AtomicU64,
    frames_received: AtomicU64,
    frames_dropped: AtomicU64,
    classification_failures: AtomicU64,
    alerts_suppressed: AtomicU64,
    alerts_emitted: AtomicU64,
}

/// Point-in-time copy of `PipelineStats`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub polls_received: u64,
    pub polls_malformed: u64,
    pub snapshots: u64,
    pub transitions: u64,
    pub frames_received: u64,
    pub frames_dropped: u64,
    pub classification_failures: u64,
    pub alerts_suppressed: u64,
    pub alerts_emitted: u64,
}

impl PipelineStats {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let read = |c: &AtomicU64| c.load(Ordering::Relaxed);
        StatsSnapshot {
            polls_received: read(&self.polls_received),
            polls_malformed: read(&self.polls_malformed),
            snapshots: read(&self.snapshots),
            transitions: read(&self.transitions),
            frames_received: read(&self.frames_received),
            frames_dropped: read(&self.frames_dropped),
            classification_failures: read(&self.classification_failures),
            alerts_suppressed: read(&self.alerts_suppressed),
            alerts_emitted: read(&self.alerts_emitted),
        }
    }
}

// ── Pipeline ───────────────────────────────────────────────────────

/// Handle to a running pipeline. Cheaply cloneable.
#[derive(Clone)]
pub struct Pipeline {
    inner: Arc<PipelineInner>,
}

struct PipelineInner {
    config: PipelineConfig,
    gate_store: Arc<AlertGateStore>,
    dedup: Arc<LockChangeDeduplicator>,
    classification: Arc<ClassificationStage>,
    poll_tx: Mutex<Option<mpsc::Sender<String>>>,
    frame_tx: Mutex<Option<mpsc::Sender<CameraFrame>>>,
    cancel: CancellationToken,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
    stats: Arc<PipelineStats>,
    /// Count of poll bodies fully handled by the poll stage.
    polls_processed: watch::Receiver<u64>,
    stopped: AtomicBool,
}

impl Pipeline {
    /// Restore state from `changelogs` and spawn the stage tasks.
    ///
    /// Returns the pipeline handle and the receiving end of the alert
    /// channel. The channel closes after `shutdown` or `drain` completes.
    /// Must be called from within a Tokio runtime.
    pub fn start(
        config: PipelineConfig,
        classifier: Arc<dyn Classifier>,
        changelogs: Changelogs,
    ) -> Result<(Self, mpsc::Receiver<AlertMessage>), CoreError> {
        if config.labels.is_empty() {
            return Err(CoreError::Config {
                message: "at least one classifier label is required".into(),
            });
        }

        let gate_store = Arc::new(AlertGateStore::new(config.gate_scope, changelogs.gate));
        gate_store.restore();
        let dedup = Arc::new(LockChangeDeduplicator::new(changelogs.dedup));
        dedup.restore();

        let capacity = config.queue_capacity.max(1);
        let partitions = config.dedup_partitions.max(1);
        let (poll_tx, poll_rx) = mpsc::channel(capacity);
        let (frame_tx, frame_rx) = mpsc::channel(capacity);
        let (alert_tx, alert_rx) = mpsc::channel(capacity);

        let stats = Arc::new(PipelineStats::default());
        let composer = AlertMessageComposer::new(config.timezone);
        let classification = Arc::new(ClassificationStage::new(
            classifier,
            config.labels.clone(),
            config.classifier_timeout,
        ));
        let cancel = CancellationToken::new();
        let mut handles = Vec::with_capacity(partitions + 2);

        let mut partition_txs = Vec::with_capacity(partitions);
        for partition in 0..partitions {
            let (tx, rx) = mpsc::channel(capacity);
            partition_txs.push(tx);
            let stage = DedupStage {
                dedup: Arc::clone(&dedup),
                composer,
                alert_tx: alert_tx.clone(),
                stats: Arc::clone(&stats),
            };
            handles.push(tokio::spawn(dedup_task(stage, rx, partition)));
        }

        let (processed_tx, polls_processed) = watch::channel(0);
        let poll_stage = PollStage {
            normalizer: LockRecordNormalizer::new(config.timezone),
            gate_store: Arc::clone(&gate_store),
            partitions: partition_txs,
            stats: Arc::clone(&stats),
            processed: processed_tx,
        };
        handles.push(tokio::spawn(poll_task(poll_stage, poll_rx, cancel.clone())));

        let frame_stage = FrameStage {
            gate: ImageGate::new(
                Arc::clone(&gate_store),
                FrameRouter::new(config.gate_scope, config.routes.clone(), config.default_site),
            ),
            classification: Arc::clone(&classification),
            composer,
            suppress_labels: config.suppress_labels.clone(),
            alert_tx,
            stats: Arc::clone(&stats),
        };
        handles.push(tokio::spawn(frame_task(frame_stage, frame_rx, cancel.clone())));

        info!(
            scope = ?config.gate_scope,
            partitions,
            labels = ?config.labels,
            "pipeline started"
        );

        let pipeline = Self {
            inner: Arc::new(PipelineInner {
                config,
                gate_store,
                dedup,
                classification,
                poll_tx: Mutex::new(Some(poll_tx)),
                frame_tx: Mutex::new(Some(frame_tx)),
                cancel,
                task_handles: Mutex::new(handles),
                stats,
                polls_processed,
                stopped: AtomicBool::new(false),
            }),
        };
        Ok((pipeline, alert_rx))
    }

    /// Queue a raw lock poll body.
    pub async fn submit_poll(&self, raw: impl Into<String>) -> Result<(), CoreError> {
        let tx = self.inner.poll_tx.lock().await.clone().ok_or(CoreError::ShutDown)?;
        tx.send(raw.into()).await.map_err(|_| CoreError::ShutDown)
    }

    /// Queue a camera frame.
    pub async fn submit_frame(&self, frame: CameraFrame) -> Result<(), CoreError> {
        let tx = self.inner.frame_tx.lock().await.clone().ok_or(CoreError::ShutDown)?;
        tx.send(frame).await.map_err(|_| CoreError::ShutDown)
    }

    /// Stop pulling new input, let in-flight work finish, then stop.
    /// Inputs still queued are discarded.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        self.close_inputs().await;
        self.join().await;
    }

    /// Stop accepting input, process everything already queued, then stop.
    pub async fn drain(&self) {
        self.close_inputs().await;
        self.join().await;
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.inner.config
    }

    pub fn gate_store(&self) -> &Arc<AlertGateStore> {
        &self.inner.gate_store
    }

    pub fn deduplicator(&self) -> &Arc<LockChangeDeduplicator> {
        &self.inner.dedup
    }

    pub fn subscribe_gate(&self) -> GateWatch {
        self.inner.gate_store.subscribe()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.inner.stats.snapshot()
    }

    /// Number of poll bodies the poll stage has finished with, gate update
    /// and dedup hand-off included.
    pub fn polls_processed(&self) -> u64 {
        *self.inner.polls_processed.borrow()
    }

    /// Wait until at least `count` polls have been processed, or the poll
    /// stage has stopped.
    pub async fn wait_for_polls(&self, count: u64) {
        let mut rx = self.inner.polls_processed.clone();
        let _ = rx.wait_for(|done| *done >= count).await;
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::Acquire)
    }

    // ── Private helpers ──────────────────────────────────────────────

    async fn close_inputs(&self) {
        self.inner.poll_tx.lock().await.take();
        self.inner.frame_tx.lock().await.take();
    }

    async fn join(&self) {
        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            if let Err(e) = handle.await {
                error!(error = %e, "pipeline task failed");
            }
        }
        drop(handles);

        if !self.inner.stopped.swap(true, Ordering::AcqRel) {
            self.inner.classification.close();
            info!(stats = ?self.stats(), "pipeline stopped");
        }
    }
}

fn partition_for(lock: LockId, partitions: usize) -> usize {
    let n = u64::try_from(partitions.max(1)).unwrap_or(1);
    usize::try_from(lock.0 % n).unwrap_or(0)
}

// ── Poll stage ─────────────────────────────────────────────────────

struct PollStage {
    normalizer: LockRecordNormalizer,
    gate_store: Arc<AlertGateStore>,
    partitions: Vec<mpsc::Sender<LockSnapshot>>,
    stats: Arc<PipelineStats>,
    processed: watch::Sender<u64>,
}

impl PollStage {
    async fn handle(&self, raw: String) {
        self.apply(raw).await;
        self.processed.send_modify(|n| *n += 1);
    }

    async fn apply(&self, raw: String) {
        PipelineStats::bump(&self.stats.polls_received);

        // A malformed body carries no information about the locks, so the
        // gate keeps its current state.
        let batch = match self.normalizer.try_normalize(&raw) {
            Ok(batch) => batch,
            Err(e) => {
                PipelineStats::bump(&self.stats.polls_malformed);
                error!(error = %e, "discarding malformed lock poll payload");
                return;
            }
        };

        if let Err(e) = self.gate_store.update(&batch) {
            error!(error = %e, "gate update failed, previous gate state kept");
        }

        for snapshot in batch {
            PipelineStats::bump(&self.stats.snapshots);
            let index = partition_for(snapshot.lock_id, self.partitions.len());
            let Some(partition) = self.partitions.get(index) else {
                continue;
            };
            if partition.send(snapshot).await.is_err() {
                warn!(partition = index, "dedup partition closed, snapshot dropped");
            }
        }
    }
}

async fn poll_task(stage: PollStage, mut rx: mpsc::Receiver<String>, cancel: CancellationToken) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            raw = rx.recv() => {
                let Some(raw) = raw else { break };
                stage.handle(raw).await;
            }
        }
    }
    debug!("poll stage stopped");
}

// ── Dedup stage ────────────────────────────────────────────────────

struct DedupStage {
    dedup: Arc<LockChangeDeduplicator>,
    composer: AlertMessageComposer,
    alert_tx: mpsc::Sender<AlertMessage>,
    stats: Arc<PipelineStats>,
}

impl DedupStage {
    /// Returns `false` once the alert channel is gone.
    async fn handle(&self, snapshot: LockSnapshot) -> bool {
        let transition = match self.dedup.process(snapshot) {
            Ok(Some(transition)) => transition,
            Ok(None) => return true,
            Err(e) => {
                error!(error = %e, "dedup changelog write failed, transition will be retried");
                return true;
            }
        };
        PipelineStats::bump(&self.stats.transitions);

        let alert = AlertMessage::from(self.composer.from_transition(&transition));
        emit(&self.alert_tx, alert, &self.stats).await
    }
}

// Runs until the poll stage drops its partition senders.
async fn dedup_task(stage: DedupStage, mut rx: mpsc::Receiver<LockSnapshot>, partition: usize) {
    while let Some(snapshot) = rx.recv().await {
        if !stage.handle(snapshot).await {
            break;
        }
    }
    debug!(partition, "dedup partition stopped");
}

// ── Frame stage ────────────────────────────────────────────────────

struct FrameStage {
    gate: ImageGate,
    classification: Arc<ClassificationStage>,
    composer: AlertMessageComposer,
    suppress_labels: Vec<String>,
    alert_tx: mpsc::Sender<AlertMessage>,
    stats: Arc<PipelineStats>,
}

impl FrameStage {
    /// Returns `false` once the alert channel is gone.
    async fn handle(&self, frame: CameraFrame) -> bool {
        PipelineStats::bump(&self.stats.frames_received);

        let Some(frame) = self.gate.filter(frame) else {
            PipelineStats::bump(&self.stats.frames_dropped);
            return true;
        };

        let Some(result) = self.classification.classify_or_drop(&frame).await else {
            PipelineStats::bump(&self.stats.classification_failures);
            return true;
        };

        if self.suppress_labels.contains(&result.label) {
            debug!(frame = %frame.key, label = %result.label, "label suppressed, no alert");
            PipelineStats::bump(&self.stats.alerts_suppressed);
            return true;
        }

        let alert = AlertMessage::from(self.composer.from_classification(&result, frame));
        emit(&self.alert_tx, alert, &self.stats).await
    }
}

async fn frame_task(
    stage: FrameStage,
    mut rx: mpsc::Receiver<CameraFrame>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            frame = rx.recv() => {
                let Some(frame) = frame else { break };
                if !stage.handle(frame).await {
                    break;
                }
            }
        }
    }
    debug!("frame stage stopped");
}

async fn emit(tx: &mpsc::Sender<AlertMessage>, alert: AlertMessage, stats: &PipelineStats) -> bool {
    info!(kind = alert.kind(), summary = alert.summary(), "alert");
    if tx.send(alert).await.is_err() {
        warn!("alert channel closed, stopping stage");
        return false;
    }
    PipelineStats::bump(&stats.alerts_emitted);
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partitioning_is_stable_per_lock() {
        for lock in [0, 1, 7, 234, u64::MAX] {
            let first = partition_for(LockId(lock), 4);
            assert!(first < 4);
            assert_eq!(first, partition_for(LockId(lock), 4));
        }
        assert_eq!(partition_for(LockId(99), 0), 0);
    }
}
