//! Traveled distance and speed from location fixes.
//!
//! Distance advances by the great-circle delta between consecutive accepted
//! fixes, however far apart in time they are. Fixes implying a speed above
//! the plausibility limit are dropped without moving the anchor, unless the
//! next fix agrees with the dropped one: then the anchor was the outlier and
//! tracking continues from the dropped fix. When the signal is reported lost
//! for longer than the grace period, the anchor is discarded so the gap is
//! not counted; tracking resumes from the first fix after the signal returns.

use tracing::{debug, info};

use super::LocationFix;

const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance between two WGS84 coordinates, in metres.
pub fn haversine_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).max(0.0).sqrt());
    EARTH_RADIUS_M * c
}

/// Location signal transition reported by the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalChange {
    Lost,
    Available,
}

#[derive(Debug, Clone)]
pub struct DistanceTracker {
    signal_grace_ms: u64,
    max_plausible_speed_ms: f64,
    /// Fixes with a worse accuracy radius are ignored. Zero disables.
    max_fix_accuracy_m: f64,

    armed: bool,
    anchor: Option<LocationFix>,
    /// Last fix dropped as implausible against the anchor.
    rejected: Option<LocationFix>,
    distance_m: f64,
    current_speed_ms: f64,
    max_speed_ms: f64,
    signal_available: bool,
    lost_since: Option<u64>,
    suspended: bool,
}

impl Default for DistanceTracker {
    fn default() -> Self {
        Self::new(10_000, 100.0, 100.0)
    }
}

impl DistanceTracker {
    pub fn new(signal_grace_ms: u64, max_plausible_speed_ms: f64, max_fix_accuracy_m: f64) -> Self {
        Self {
            signal_grace_ms,
            max_plausible_speed_ms,
            max_fix_accuracy_m,
            armed: false,
            anchor: None,
            rejected: None,
            distance_m: 0.0,
            current_speed_ms: 0.0,
            max_speed_ms: 0.0,
            signal_available: false,
            lost_since: None,
            suspended: false,
        }
    }

    pub fn configure(
        &mut self,
        signal_grace_ms: u64,
        max_plausible_speed_ms: f64,
        max_fix_accuracy_m: f64,
    ) {
        self.signal_grace_ms = signal_grace_ms;
        self.max_plausible_speed_ms = max_plausible_speed_ms;
        self.max_fix_accuracy_m = max_fix_accuracy_m;
    }

    /// Reset all accumulators and start accepting fixes.
    pub fn arm(&mut self) {
        self.armed = true;
        self.anchor = None;
        self.rejected = None;
        self.distance_m = 0.0;
        self.current_speed_ms = 0.0;
        self.max_speed_ms = 0.0;
        self.signal_available = false;
        self.lost_since = None;
        self.suspended = false;
    }

    /// Stop accepting fixes. Accumulated values stay readable. Idempotent.
    pub fn disarm(&mut self) {
        self.armed = false;
        self.anchor = None;
        self.rejected = None;
        self.lost_since = None;
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn cumulative_distance(&self) -> f64 {
        self.distance_m
    }

    pub fn current_speed(&self) -> f64 {
        self.current_speed_ms
    }

    pub fn max_speed(&self) -> f64 {
        self.max_speed_ms
    }

    pub fn is_signal_available(&self) -> bool {
        self.signal_available
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    pub fn on_signal_lost(&mut self, at_ms: u64) -> Option<SignalChange> {
        if !self.armed || !self.signal_available {
            return None;
        }
        self.signal_available = false;
        self.lost_since = Some(at_ms);
        self.current_speed_ms = 0.0;
        debug!(at_ms, "location signal lost");
        Some(SignalChange::Lost)
    }

    /// `initial` marks the provider's first position of the session.
    pub fn on_signal_available(&mut self, initial: bool, at_ms: u64) -> Option<SignalChange> {
        if !self.armed || self.signal_available {
            return None;
        }
        if let Some(lost) = self.lost_since.take() {
            if at_ms.saturating_sub(lost) > self.signal_grace_ms {
                self.anchor = None;
                self.rejected = None;
            }
        }
        self.suspended = false;
        self.signal_available = true;
        debug!(at_ms, initial, "location signal available");
        Some(SignalChange::Available)
    }

    /// Suspend accumulation once the signal has been gone past the grace period.
    pub fn poll(&mut self, now_ms: u64) {
        if let Some(lost) = self.lost_since {
            if !self.suspended && now_ms.saturating_sub(lost) > self.signal_grace_ms {
                info!(lost_for_ms = now_ms - lost, "distance tracking suspended");
                self.suspended = true;
                self.anchor = None;
                self.rejected = None;
            }
        }
    }

    /// Feed one fix. Returns a signal transition if the fix restored the signal.
    pub fn on_fix(&mut self, fix: LocationFix) -> Option<SignalChange> {
        if !self.armed {
            return None;
        }
        let initial = self.anchor.is_none() && self.distance_m == 0.0;
        let change = self.on_signal_available(initial, fix.at_ms);

        if !fix.latitude.is_finite()
            || !fix.longitude.is_finite()
            || fix.latitude.abs() > 90.0
            || fix.longitude.abs() > 180.0
        {
            debug!(?fix, "discarding malformed fix");
            return change;
        }
        if let Some(acc) = fix.accuracy_m {
            if self.max_fix_accuracy_m > 0.0 && acc > self.max_fix_accuracy_m {
                debug!(accuracy_m = acc, "discarding inaccurate fix");
                return change;
            }
        }

        let reported = fix
            .speed_ms
            .filter(|s| s.is_finite() && *s >= 0.0 && *s <= self.max_plausible_speed_ms);

        match self.anchor {
            Some(anchor) => {
                if fix.at_ms <= anchor.at_ms {
                    return change;
                }
                let leg = self.plausible_leg(&anchor, &fix).or_else(|| {
                    let dropped = self.rejected?;
                    let leg = self.plausible_leg(&dropped, &fix)?;
                    debug!(?anchor, "anchor was an outlier, continuing from dropped fix");
                    Some(leg)
                });
                let Some((delta, implied)) = leg else {
                    debug!(?fix, "discarding implausible jump");
                    self.rejected = Some(fix);
                    return change;
                };
                self.distance_m += delta;
                self.current_speed_ms = reported.unwrap_or(implied);
            }
            None => {
                self.current_speed_ms = reported.unwrap_or(0.0);
            }
        }

        self.max_speed_ms = self.max_speed_ms.max(self.current_speed_ms);
        self.anchor = Some(fix);
        self.rejected = None;
        change
    }

    /// Distance and implied speed from `from` to `to`, or `None` when the
    /// leg is out of order or faster than the plausibility limit.
    fn plausible_leg(&self, from: &LocationFix, to: &LocationFix) -> Option<(f64, f64)> {
        if to.at_ms <= from.at_ms {
            return None;
        }
        let dt_s = (to.at_ms - from.at_ms) as f64 / 1000.0;
        let delta = haversine_m(from.latitude, from.longitude, to.latitude, to.longitude);
        let implied = delta / dt_s;
        (implied <= self.max_plausible_speed_ms).then_some((delta, implied))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // About 111 m per 0.001 degree of latitude.
    fn fix(lat: f64, at_ms: u64) -> LocationFix {
        LocationFix {
            latitude: lat,
            longitude: 13.4,
            accuracy_m: Some(5.0),
            speed_ms: None,
            at_ms,
        }
    }

    fn armed() -> DistanceTracker {
        let mut t = DistanceTracker::new(10_000, 100.0, 50.0);
        t.arm();
        t
    }

    #[test]
    fn haversine_known_distance() {
        // One degree of latitude.
        let d = haversine_m(0.0, 0.0, 1.0, 0.0);
        assert!((d - 111_195.0).abs() < 1.0, "{d}");
        assert_eq!(haversine_m(52.5, 13.4, 52.5, 13.4), 0.0);
    }

    #[test]
    fn accumulates_between_fixes() {
        let mut t = armed();
        assert_eq!(t.on_fix(fix(52.500, 0)), Some(SignalChange::Available));
        assert_eq!(t.on_fix(fix(52.501, 3_000)), None);
        t.on_fix(fix(52.502, 6_000));
        let d = t.cumulative_distance();
        assert!((d - 222.4).abs() < 1.0, "{d}");
        assert!((t.current_speed() - 37.06).abs() < 0.1);
    }

    #[test]
    fn implausible_jump_is_discarded() {
        let mut t = armed();
        t.on_fix(fix(52.500, 0));
        // 11 km in one second.
        t.on_fix(fix(52.600, 1_000));
        assert_eq!(t.cumulative_distance(), 0.0);
        // Anchor did not move: next fix measures from the first one.
        t.on_fix(fix(52.501, 10_000));
        assert!((t.cumulative_distance() - 111.2).abs() < 1.0);
    }

    #[test]
    fn sparse_fixes_still_count() {
        let mut t = armed();
        for i in 0..5u64 {
            t.on_fix(fix(52.500 + i as f64 * 0.001, i * 15_000));
        }
        assert!((t.cumulative_distance() - 444.8).abs() < 2.0);
        assert!(!t.is_suspended());
    }

    #[test]
    fn outlier_first_fix_is_replaced() {
        let mut t = armed();
        t.on_fix(fix(53.0, 0));
        // Eight good fixes about 33 m apart at 1 Hz.
        for i in 1..=8u64 {
            t.on_fix(fix(52.500 + i as f64 * 0.0003, i * 1_000));
        }
        // The first good fix replaces the outlier; the other seven legs count.
        let d = t.cumulative_distance();
        assert!((d - 7.0 * 33.36).abs() < 2.0, "{d}");
        assert!(t.max_speed() < 40.0);
    }

    #[test]
    fn single_outlier_does_not_move_anchor() {
        let mut t = armed();
        t.on_fix(fix(52.500, 0));
        t.on_fix(fix(53.000, 1_000));
        t.on_fix(fix(52.501, 2_000));
        assert!((t.cumulative_distance() - 111.2).abs() < 1.0);
    }

    #[test]
    fn inaccurate_fix_is_ignored() {
        let mut t = armed();
        t.on_fix(fix(52.500, 0));
        let mut bad = fix(52.501, 5_000);
        bad.accuracy_m = Some(500.0);
        t.on_fix(bad);
        assert_eq!(t.cumulative_distance(), 0.0);
    }

    #[test]
    fn max_speed_keeps_maximum() {
        let mut t = armed();
        for (i, speed) in [2.0, 5.5, 3.0, 0.0, 4.9].iter().enumerate() {
            let mut f = fix(52.5 + i as f64 * 0.0001, i as u64 * 2_000);
            f.speed_ms = Some(*speed);
            t.on_fix(f);
        }
        assert_eq!(t.max_speed(), 5.5);
        assert_eq!(t.current_speed(), 4.9);
    }

    #[test]
    fn short_signal_loss_is_bridged() {
        let mut t = armed();
        t.on_fix(fix(52.500, 0));
        assert_eq!(t.on_signal_lost(1_000), Some(SignalChange::Lost));
        assert_eq!(t.on_signal_lost(1_500), None);
        t.poll(5_000);
        assert!(!t.is_suspended());
        assert_eq!(t.on_fix(fix(52.501, 6_000)), Some(SignalChange::Available));
        assert!((t.cumulative_distance() - 111.2).abs() < 1.0);
    }

    #[test]
    fn long_signal_loss_suspends_then_resumes() {
        let mut t = armed();
        t.on_fix(fix(52.500, 0));
        t.on_fix(fix(52.501, 5_000));
        t.on_signal_lost(6_000);
        t.poll(20_000);
        assert!(t.is_suspended());

        // Far away after the gap: not counted.
        t.on_signal_available(false, 40_000);
        assert!(!t.is_suspended());
        t.on_fix(fix(52.510, 41_000));
        let before = t.cumulative_distance();
        assert!((before - 111.2).abs() < 1.0);

        t.on_fix(fix(52.511, 46_000));
        assert!((t.cumulative_distance() - before - 111.2).abs() < 1.0);
    }

    #[test]
    fn disarmed_ignores_fixes() {
        let mut t = DistanceTracker::default();
        assert_eq!(t.on_fix(fix(52.5, 0)), None);
        assert_eq!(t.on_signal_lost(10), None);
        t.arm();
        t.on_fix(fix(52.5, 0));
        t.on_fix(fix(52.501, 5_000));
        t.disarm();
        t.disarm();
        t.on_fix(fix(52.502, 10_000));
        assert!((t.cumulative_distance() - 111.2).abs() < 1.0);
    }
}
