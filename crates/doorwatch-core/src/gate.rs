// ── Image gate ──
//
// Decides, per camera frame, whether the frame's gate is armed. Frames
// under a disarmed gate, under a gate with no recorded state, or with no
// resolvable gate are dropped.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::{FrameRoute, GateScope};
use crate::model::{CameraFrame, GateKey, GateState, SiteId};
use crate::store::AlertGateStore;

// ── Routing ────────────────────────────────────────────────────────

/// Resolves which gate a frame belongs to.
#[derive(Debug, Clone)]
pub struct FrameRouter {
    scope: GateScope,
    routes: Vec<FrameRoute>,
    default_site: Option<SiteId>,
}

impl FrameRouter {
    pub fn new(scope: GateScope, routes: Vec<FrameRoute>, default_site: Option<SiteId>) -> Self {
        Self {
            scope,
            routes,
            default_site,
        }
    }

    /// Global scope maps every frame to the global gate. Per-site scope
    /// takes the longest matching key prefix, then the default site.
    pub fn resolve(&self, frame_key: &str) -> Option<GateKey> {
        match self.scope {
            GateScope::Global => Some(GateKey::global()),
            GateScope::PerSite => self
                .routes
                .iter()
                .filter(|route| frame_key.starts_with(&route.prefix))
                .max_by_key(|route| route.prefix.len())
                .map(|route| route.site)
                .or(self.default_site)
                .map(GateKey::for_site),
        }
    }
}

// ── Gate ───────────────────────────────────────────────────────────

/// Outcome of gating one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Pass(GateKey),
    Disarmed(GateKey),
    /// The gate has no recorded state yet.
    Unknown(GateKey),
    /// The store has not replayed its changelog.
    NotReady,
    /// No gate could be resolved for the frame.
    Unrouted,
}

impl GateDecision {
    pub fn passes(&self) -> bool {
        matches!(self, Self::Pass(_))
    }
}

pub struct ImageGate {
    store: Arc<AlertGateStore>,
    router: FrameRouter,
}

impl ImageGate {
    pub fn new(store: Arc<AlertGateStore>, router: FrameRouter) -> Self {
        Self { store, router }
    }

    pub fn decide(&self, frame_key: &str) -> GateDecision {
        if !self.store.is_bootstrapped() {
            return GateDecision::NotReady;
        }
        let Some(key) = self.router.resolve(frame_key) else {
            return GateDecision::Unrouted;
        };
        match self.store.read(&key) {
            Some(GateState::Armed) => GateDecision::Pass(key),
            Some(GateState::Disarmed) => GateDecision::Disarmed(key),
            None => GateDecision::Unknown(key),
        }
    }

    /// Pass `frame` through iff its gate is armed.
    pub fn filter(&self, frame: CameraFrame) -> Option<CameraFrame> {
        match self.decide(&frame.key) {
            GateDecision::Pass(gate) => {
                debug!(frame = %frame.key, %gate, "gate armed, frame passes");
                Some(frame)
            }
            GateDecision::Disarmed(gate) => {
                debug!(frame = %frame.key, %gate, "gate disarmed, dropping frame");
                None
            }
            GateDecision::Unknown(gate) => {
                debug!(frame = %frame.key, %gate, "gate state unknown, dropping frame");
                None
            }
            GateDecision::NotReady => {
                warn!(frame = %frame.key, "gate store not restored yet, dropping frame");
                None
            }
            GateDecision::Unrouted => {
                warn!(frame = %frame.key, "no site route matches frame, dropping frame");
                None
            }
        }
    }
}
