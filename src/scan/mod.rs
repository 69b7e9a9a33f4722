//! Scan session orchestration: dedup filtering plus the async session
//! controller that ties capture and decode together.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;

use crate::config::Settings;
use crate::decode::DEFAULT_ROI_FRACTION;

pub mod filter;
pub mod session;

pub use filter::{CooldownFilter, Suppression, DEFAULT_COOLDOWN};
pub use session::{ScanController, ScanUpdate};

/// Codes the caller has already accepted. Shared with the session so
/// the filter can suppress them; the caller inserts after acting on a
/// delivery.
pub type SharedSeen = Arc<RwLock<HashSet<String>>>;

pub fn new_seen() -> SharedSeen {
    Arc::new(RwLock::new(HashSet::new()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanMode {
    /// Deliver one code, then stop.
    #[default]
    SingleShot,
    /// Keep delivering until stopped, pausing for the cooldown after
    /// each accepted code.
    Continuous,
}

impl ScanMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanMode::SingleShot => "single-shot",
            ScanMode::Continuous => "continuous",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Initializing,
    Active,
    Stopped,
    Error,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Initializing => "initializing",
            SessionState::Active => "active",
            SessionState::Stopped => "stopped",
            SessionState::Error => "error",
        }
    }
}

/// Counters reported when a session closes.
#[derive(Debug, Clone, Default)]
pub struct SessionStats {
    pub frames_seen: u64,
    pub hits: u64,
    pub suppressed: u64,
    pub manual_entries: u64,
}

#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub mode: ScanMode,
    pub cooldown: Duration,
    pub roi_fraction: f32,
}

impl ScanConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            mode: if settings.continuous {
                ScanMode::Continuous
            } else {
                ScanMode::SingleShot
            },
            cooldown: settings.cooldown(),
            roi_fraction: settings.roi_fraction,
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            mode: ScanMode::SingleShot,
            cooldown: DEFAULT_COOLDOWN,
            roi_fraction: DEFAULT_ROI_FRACTION,
        }
    }
}
