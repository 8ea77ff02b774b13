//! Cover-to-finish detection on the proximity channel.
//!
//! The sensor has to report "near" without interruption for the whole
//! threshold. Any "far" sample throws away the accumulated time.

use tracing::debug;

use super::ProximitySample;

#[derive(Debug, Clone, Default)]
pub struct CoverageDetector {
    /// Required uninterrupted coverage. Zero disables the detector.
    threshold_ms: u64,
    armed: bool,
    covered_since: Option<u64>,
    fired: bool,
}

impl CoverageDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start watching with a fresh accumulation window.
    pub fn arm(&mut self, threshold_ms: u64) {
        self.threshold_ms = threshold_ms;
        self.armed = threshold_ms > 0;
        self.covered_since = None;
        self.fired = false;
    }

    /// Stop watching and forget any partial coverage. Idempotent.
    pub fn disarm(&mut self) {
        self.armed = false;
        self.covered_since = None;
        self.fired = false;
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn threshold_ms(&self) -> u64 {
        self.threshold_ms
    }

    /// How long the sensor has been covered as of `now_ms`.
    pub fn covered_for(&self, now_ms: u64) -> u64 {
        self.covered_since
            .map(|since| now_ms.saturating_sub(since))
            .unwrap_or(0)
    }

    /// Feed one proximity sample. Returns `true` exactly once per unbroken
    /// covering, on the sample that reaches the threshold.
    pub fn on_sample(&mut self, sample: ProximitySample) -> bool {
        if !self.armed {
            return false;
        }
        if !sample.near {
            if self.covered_since.take().is_some() {
                debug!(at_ms = sample.at_ms, "coverage interrupted");
            }
            self.fired = false;
            return false;
        }
        if self.covered_since.is_none() {
            self.covered_since = Some(sample.at_ms);
        }
        self.check(sample.at_ms)
    }

    /// Re-evaluate against a timer tick. Proximity sensors usually report
    /// only on change, so a steady covering is confirmed by the clock.
    pub fn poll(&mut self, now_ms: u64) -> bool {
        if !self.armed {
            return false;
        }
        self.check(now_ms)
    }

    fn check(&mut self, now_ms: u64) -> bool {
        if self.fired {
            return false;
        }
        match self.covered_since {
            Some(since) if now_ms.saturating_sub(since) >= self.threshold_ms => {
                self.fired = true;
                debug!(covered_ms = now_ms - since, "coverage threshold reached");
                true
            }
            _ => false,
        }
    }
}
