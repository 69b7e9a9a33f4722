//! Duplicate-read suppression.
//!
//! One physical label held in front of a camera decodes many times per
//! second. The filter drops re-reads of the most recent accepted value
//! inside a fixed window, and anything the caller has already accepted.

use std::collections::HashSet;
use std::time::{Duration, Instant};

pub const DEFAULT_COOLDOWN: Duration = Duration::from_millis(2000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Suppression {
    /// Same value re-read inside the cooldown window.
    Cooldown,
    /// Value is in the caller's seen set.
    AlreadySeen,
}

#[derive(Debug)]
pub struct CooldownFilter {
    window: Duration,
    last_value: Option<String>,
    last_time: Option<Instant>,
}

impl CooldownFilter {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_value: None,
            last_time: None,
        }
    }

    /// Decides whether a read should be suppressed. Fails open: with no
    /// recorded read yet, or a missing timestamp, nothing is suppressed
    /// on cooldown grounds.
    pub fn check(&self, value: &str, now: Instant, seen: &HashSet<String>) -> Option<Suppression> {
        if let (Some(last_value), Some(last_time)) = (self.last_value.as_deref(), self.last_time) {
            if last_value == value && now.duration_since(last_time) < self.window {
                return Some(Suppression::Cooldown);
            }
        }
        if seen.contains(value) {
            return Some(Suppression::AlreadySeen);
        }
        None
    }

    /// Records an accepted read. Suppressed reads are never recorded, so
    /// they do not extend the window.
    pub fn record(&mut self, value: &str, now: Instant) {
        self.last_value = Some(value.to_string());
        self.last_time = Some(now);
    }
}

impl Default for CooldownFilter {
    fn default() -> Self {
        Self::new(DEFAULT_COOLDOWN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_seen() -> HashSet<String> {
        HashSet::new()
    }

    #[test]
    fn test_same_value_within_window_suppressed() {
        let mut filter = CooldownFilter::new(Duration::from_millis(2000));
        let t0 = Instant::now();
        filter.record("B1", t0);
        let verdict = filter.check("B1", t0 + Duration::from_millis(500), &no_seen());
        assert_eq!(verdict, Some(Suppression::Cooldown));
    }

    #[test]
    fn test_window_boundary_delivers() {
        let mut filter = CooldownFilter::new(Duration::from_millis(2000));
        let t0 = Instant::now();
        filter.record("B1", t0);
        let verdict = filter.check("B1", t0 + Duration::from_millis(2000), &no_seen());
        assert_eq!(verdict, None);
    }

    #[test]
    fn test_different_value_passes_immediately() {
        let mut filter = CooldownFilter::new(Duration::from_millis(2000));
        let t0 = Instant::now();
        filter.record("B1", t0);
        let verdict = filter.check("B2", t0 + Duration::from_millis(10), &no_seen());
        assert_eq!(verdict, None);
    }

    #[test]
    fn test_seen_set_suppresses_regardless_of_time() {
        let filter = CooldownFilter::new(Duration::from_millis(2000));
        let mut seen = no_seen();
        seen.insert("B1".to_string());
        let verdict = filter.check("B1", Instant::now(), &seen);
        assert_eq!(verdict, Some(Suppression::AlreadySeen));
    }

    #[test]
    fn test_fresh_filter_fails_open() {
        let filter = CooldownFilter::new(Duration::from_millis(2000));
        assert_eq!(filter.check("B1", Instant::now(), &no_seen()), None);
    }

    #[test]
    fn test_suppressed_read_does_not_extend_window() {
        let mut filter = CooldownFilter::new(Duration::from_millis(2000));
        let t0 = Instant::now();
        filter.record("B1", t0);
        // Re-read at 1500ms is suppressed and not recorded.
        assert_eq!(
            filter.check("B1", t0 + Duration::from_millis(1500), &no_seen()),
            Some(Suppression::Cooldown)
        );
        // The window still measures from t0, so 2100ms delivers.
        assert_eq!(
            filter.check("B1", t0 + Duration::from_millis(2100), &no_seen()),
            None
        );
    }
}
