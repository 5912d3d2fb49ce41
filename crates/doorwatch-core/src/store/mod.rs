// ── Alert gate store ──
//
// Shared, fail-closed view of which gates are armed. Written only by the
// poll stage; read by the image gate and by subscribers.

mod gate_store;

pub use gate_store::{AlertGateStore, GateTable, GateUpdate};
