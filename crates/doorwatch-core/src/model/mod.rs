// ── Pipeline domain model ──
//
// Canonical types flowing between stages. Wire shapes live in
// `doorwatch_api`; everything here is already normalized.

pub mod alert;
pub mod frame;
pub mod gate;
pub mod lock;

// ── Re-exports ──────────────────────────────────────────────────────

pub use alert::{AlertMessage, PhotoAlert, TextAlert};
pub use frame::{CameraFrame, ClassificationResult};
pub use gate::{GLOBAL_GATE_KEY, GateKey, GateState, UnknownGateCode};
pub use lock::{LockId, LockSnapshot, LockState, LockTransition, SiteId};
