// ── Alert gate types ──
//
// A gate key names one gate (the global one, or one per site). A gate
// state is serialized with its historical wire codes: armed = -1,
// disarmed = 0.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::lock::{LockSnapshot, SiteId};

/// Key of the single gate in global scope.
pub const GLOBAL_GATE_KEY: &str = "state";

// ── GateKey ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GateKey(String);

impl GateKey {
    pub fn global() -> Self {
        Self(GLOBAL_GATE_KEY.to_owned())
    }

    pub fn for_site(site: SiteId) -> Self {
        Self(format!("site:{site}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── GateState ───────────────────────────────────────────────────────

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown gate state code {0}")]
pub struct UnknownGateCode(pub i32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum GateState {
    /// Camera frames pass through to classification.
    Armed,
    /// Camera frames are dropped.
    Disarmed,
}

impl GateState {
    pub const ARMED_CODE: i32 = -1;
    pub const DISARMED_CODE: i32 = 0;

    pub fn code(self) -> i32 {
        match self {
            Self::Armed => Self::ARMED_CODE,
            Self::Disarmed => Self::DISARMED_CODE,
        }
    }

    pub fn is_armed(self) -> bool {
        matches!(self, Self::Armed)
    }

    /// Disarmed iff any snapshot reports `Unlocked`. An empty batch arms.
    pub fn from_batch<'a>(snapshots: impl IntoIterator<Item = &'a LockSnapshot>) -> Self {
        if snapshots.into_iter().any(|s| s.state.is_unlocked()) {
            Self::Disarmed
        } else {
            Self::Armed
        }
    }
}

impl TryFrom<i32> for GateState {
    type Error = UnknownGateCode;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        match code {
            Self::ARMED_CODE => Ok(Self::Armed),
            Self::DISARMED_CODE => Ok(Self::Disarmed),
            other => Err(UnknownGateCode(other)),
        }
    }
}

impl From<GateState> for i32 {
    fn from(state: GateState) -> Self {
        state.code()
    }
}

impl fmt::Display for GateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Armed => f.write_str("armed"),
            Self::Disarmed => f.write_str("disarmed"),
        }
    }
}
