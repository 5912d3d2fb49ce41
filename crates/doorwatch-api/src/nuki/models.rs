// Nuki web API smart-lock models
//
// Shapes of the `/smartlock` listing as returned by the Nuki web API. The
// pipeline only reads a handful of fields, but the full record is modelled so
// the payload survives a round-trip. Fields default liberally because the API
// omits sections for locks that were never configured.

use serde::{Deserialize, Serialize};

// ── Smart lock ───────────────────────────────────────────────────────

/// One entry of the smart-lock listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmartLock {
    pub smartlock_id: u64,
    #[serde(default)]
    pub account_id: u64,
    #[serde(default, rename = "type")]
    pub lock_type: i64,
    #[serde(default)]
    pub auth_id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub favorite: bool,
    #[serde(default)]
    pub config: Option<SmartLockConfig>,
    #[serde(default)]
    pub advanced_config: Option<SmartLockAdvancedConfig>,
    #[serde(default)]
    pub state: Option<SmartLockState>,
    #[serde(default)]
    pub firmware_version: i64,
    #[serde(default)]
    pub server_state: i64,
    #[serde(default)]
    pub admin_pin_state: i64,
    #[serde(default)]
    pub creation_date: Option<String>,
    /// ISO-8601 timestamp of the last state report.
    #[serde(default)]
    pub update_date: Option<String>,
}

/// Current lock state nested inside `SmartLock`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SmartLockState {
    pub mode: i64,
    /// 0=uncalibrated, 1=locked, 3=unlocked, 4=locking, 5=unlatched,
    /// 6=unlocked (lock 'n' go), 7=unlatching, 254=motor blocked, 255=undefined
    pub state: i64,
    pub trigger: i64,
    pub battery_critical: bool,
}

// ── Configuration ────────────────────────────────────────────────────

/// User-facing lock configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SmartLockConfig {
    pub name: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub auto_unlatch: bool,
    pub pairing_enabled: bool,
    pub button_enabled: bool,
    pub led_enabled: bool,
    pub led_brightness: i64,
    pub timezone_offset: i64,
    pub daylight_saving_mode: i64,
    pub fob_paired: bool,
    pub fob_action1: i64,
    pub fob_action2: i64,
    pub fob_action3: i64,
    pub single_lock: bool,
    pub advertising_mode: i64,
}

/// Motor calibration and timing configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SmartLockAdvancedConfig {
    pub total_degrees: i64,
    pub unlocked_position_offset_degrees: i64,
    pub locked_position_offset_degrees: i64,
    pub single_locked_position_offset_degrees: i64,
    pub unlocked_to_locked_transition_offset_degrees: i64,
    pub lng_timeout: i64,
    pub single_button_press_action: i64,
    pub double_button_press_action: i64,
    pub detached_cylinder: bool,
    pub battery_type: i64,
    pub automatic_battery_type_detection: bool,
    pub unlatch_duration: i64,
    pub auto_lock_timeout: i64,
}
