// ── Runtime pipeline configuration ──
//
// These types describe how the pipeline behaves once running. They never
// touch disk: the config crate (or a test) builds a `PipelineConfig` and
// hands it to `Pipeline::start`.

use std::time::Duration;

use chrono_tz::Tz;

use crate::model::SiteId;

/// Default candidate labels, in classifier order.
pub const DEFAULT_LABELS: [&str; 2] = ["burglar-alert", "no-burglar-alert"];

/// Reference zone for timestamps in alert text.
pub const DEFAULT_TIMEZONE: Tz = chrono_tz::Europe::Amsterdam;

/// How many alert gates exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GateScope {
    /// One gate for the whole deployment; any unlocked lock disarms it.
    #[default]
    Global,
    /// One gate per site; frames are routed to their site's gate.
    PerSite,
}

/// Maps camera frames to a site by key prefix (per-site scope only).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameRoute {
    pub prefix: String,
    pub site: SiteId,
}

/// Runtime configuration for a `Pipeline`.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub gate_scope: GateScope,
    /// Zone used to render lock timestamps.
    pub timezone: Tz,
    /// Ordered candidate labels sent to the classifier.
    pub labels: Vec<String>,
    /// Labels whose best match produces no photo alert.
    pub suppress_labels: Vec<String>,
    pub routes: Vec<FrameRoute>,
    /// Site used for frames matching no route.
    pub default_site: Option<SiteId>,
    /// Number of lock-change dedup partitions.
    pub dedup_partitions: usize,
    /// Capacity of each inter-stage queue.
    pub queue_capacity: usize,
    /// Upper bound on one classifier call. `None` = wait indefinitely.
    pub classifier_timeout: Option<Duration>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            gate_scope: GateScope::Global,
            timezone: DEFAULT_TIMEZONE,
            labels: DEFAULT_LABELS.iter().map(|l| (*l).to_owned()).collect(),
            suppress_labels: Vec::new(),
            routes: Vec::new(),
            default_site: None,
            dedup_partitions: 4,
            queue_capacity: 256,
            classifier_timeout: None,
        }
    }
}
