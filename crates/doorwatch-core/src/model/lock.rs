// ── Smart-lock domain types ──
//
// Site and lock identifiers, the decoded lock state, and the normalized
// snapshot every poll is turned into.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;

// ── Identifiers ─────────────────────────────────────────────────────

/// Account (site) a lock belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SiteId(pub u64);

impl fmt::Display for SiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Physical lock identifier, unique across sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LockId(pub u64);

impl fmt::Display for LockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── LockState ───────────────────────────────────────────────────────

/// Reported lock state. Serialized as the web API's integer code;
/// unrecognized codes decode to `Undefined`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(from = "i64", into = "i64")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum LockState {
    Uncalibrated,
    Locked,
    Unlocked,
    Locking,
    Unlatched,
    #[strum(serialize = "UNLOCKED_LOCK_N_GO")]
    UnlockedLockNGo,
    Unlatching,
    MotorBlocked,
    Undefined,
}

impl LockState {
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => Self::Uncalibrated,
            1 => Self::Locked,
            3 => Self::Unlocked,
            4 => Self::Locking,
            5 => Self::Unlatched,
            6 => Self::UnlockedLockNGo,
            7 => Self::Unlatching,
            254 => Self::MotorBlocked,
            _ => Self::Undefined,
        }
    }

    pub fn code(self) -> i64 {
        match self {
            Self::Uncalibrated => 0,
            Self::Locked => 1,
            Self::Unlocked => 3,
            Self::Locking => 4,
            Self::Unlatched => 5,
            Self::UnlockedLockNGo => 6,
            Self::Unlatching => 7,
            Self::MotorBlocked => 254,
            Self::Undefined => 255,
        }
    }

    /// Only a plain `Unlocked` report disarms a gate.
    pub fn is_unlocked(self) -> bool {
        matches!(self, Self::Unlocked)
    }
}

impl From<i64> for LockState {
    fn from(code: i64) -> Self {
        Self::from_code(code)
    }
}

impl From<LockState> for i64 {
    fn from(state: LockState) -> Self {
        state.code()
    }
}

// ── Snapshots ───────────────────────────────────────────────────────

/// One lock's reported state at one poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockSnapshot {
    pub site_id: SiteId,
    pub lock_id: LockId,
    pub name: String,
    pub state: LockState,
    pub trigger: i64,
    pub battery_critical: bool,
    pub updated_at: DateTime<Utc>,
}

impl LockSnapshot {
    /// `{site}/{lock}:{epoch-seconds}`, used to correlate log lines.
    pub fn record_key(&self) -> String {
        format!(
            "{}/{}:{}",
            self.site_id,
            self.lock_id,
            self.updated_at.timestamp()
        )
    }
}

/// A snapshot whose state differs from the last one emitted for its lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockTransition {
    /// `None` for the first state ever emitted for the lock.
    pub previous: Option<LockState>,
    pub snapshot: LockSnapshot,
}
