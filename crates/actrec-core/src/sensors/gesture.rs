//! Flip-to-finish gesture detection.
//!
//! A flip is the ordered pair "device turned down" followed by "device turned
//! back up" within the grace window. Only one sensor channel is interpreted,
//! chosen by [`GestureSource`]; samples from the other channels are ignored so
//! interleaved channels cannot produce phantom transitions.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{AccelSample, Orientation, OrientationSample, RotationSample};

/// Which sensor channel drives the detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GestureSource {
    #[default]
    Orientation,
    Accelerometer,
    Rotation,
}

/// Which side of the device has to face down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlipAxis {
    /// Screen down, then screen up.
    #[default]
    Face,
    /// Upside down, then upright.
    Top,
}

/// Device posture relative to the configured flip axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Posture {
    Up,
    Down,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// No posture seen since arming.
    Unknown,
    /// Last meaningful posture was not down.
    Ready,
    /// Went down at `since`, waiting for up.
    Down { since: u64 },
    /// Down for longer than the grace window, or already down at arm time.
    Stale,
}

#[derive(Debug, Clone)]
pub struct GestureDetector {
    source: GestureSource,
    axis: FlipAxis,
    grace_window_ms: u64,
    accel_threshold: f64,
    rotation_threshold_deg: f64,
    armed: bool,
    phase: Phase,
}

impl Default for GestureDetector {
    fn default() -> Self {
        Self {
            source: GestureSource::default(),
            axis: FlipAxis::default(),
            grace_window_ms: 3_000,
            accel_threshold: 7.0,
            rotation_threshold_deg: 60.0,
            armed: false,
            phase: Phase::Unknown,
        }
    }
}

impl GestureDetector {
    pub fn new(source: GestureSource, axis: FlipAxis, grace_window_ms: u64) -> Self {
        Self {
            source,
            axis,
            grace_window_ms,
            ..Self::default()
        }
    }

    pub fn set_thresholds(&mut self, accel: f64, rotation_deg: f64) {
        self.accel_threshold = accel;
        self.rotation_threshold_deg = rotation_deg;
    }

    /// Reconfigure between sessions. Also resets timing state.
    pub fn configure(&mut self, source: GestureSource, axis: FlipAxis, grace_window_ms: u64) {
        self.source = source;
        self.axis = axis;
        self.grace_window_ms = grace_window_ms;
        self.phase = Phase::Unknown;
    }

    pub fn arm(&mut self) {
        self.armed = true;
        self.phase = Phase::Unknown;
    }

    /// Idempotent.
    pub fn disarm(&mut self) {
        self.armed = false;
        self.phase = Phase::Unknown;
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn source(&self) -> GestureSource {
        self.source
    }

    pub fn on_orientation(&mut self, sample: OrientationSample) -> bool {
        if self.source != GestureSource::Orientation {
            return false;
        }
        let posture = match (self.axis, sample.orientation) {
            (FlipAxis::Face, Orientation::FaceDown) | (FlipAxis::Top, Orientation::TopDown) => {
                Posture::Down
            }
            (FlipAxis::Face, Orientation::FaceUp) | (FlipAxis::Top, Orientation::TopUp) => {
                Posture::Up
            }
            _ => Posture::Other,
        };
        self.on_posture(posture, sample.at_ms)
    }

    pub fn on_accel(&mut self, sample: AccelSample) -> bool {
        if self.source != GestureSource::Accelerometer {
            return false;
        }
        // Gravity reads positive along the axis pointing away from the ground.
        let g = match self.axis {
            FlipAxis::Face => sample.z,
            FlipAxis::Top => sample.y,
        };
        let posture = if g <= -self.accel_threshold {
            Posture::Down
        } else if g >= self.accel_threshold {
            Posture::Up
        } else {
            Posture::Other
        };
        self.on_posture(posture, sample.at_ms)
    }

    pub fn on_rotation(&mut self, sample: RotationSample) -> bool {
        if self.source != GestureSource::Rotation {
            return false;
        }
        let limit = self.rotation_threshold_deg;
        let posture = match self.axis {
            FlipAxis::Face => {
                let roll = sample.y.abs();
                if roll >= 180.0 - limit {
                    Posture::Down
                } else if roll <= limit && sample.x.abs() <= limit {
                    Posture::Up
                } else {
                    Posture::Other
                }
            }
            FlipAxis::Top => {
                if sample.x <= -limit {
                    Posture::Down
                } else if sample.x >= limit {
                    Posture::Up
                } else {
                    Posture::Other
                }
            }
        };
        self.on_posture(posture, sample.at_ms)
    }

    /// Expire a pending down posture once the grace window has passed.
    pub fn poll(&mut self, now_ms: u64) {
        if let Phase::Down { since } = self.phase {
            if now_ms.saturating_sub(since) > self.grace_window_ms {
                debug!(since, now_ms, "flip grace window expired");
                self.phase = Phase::Stale;
            }
        }
    }

    /// Core transition function. Returns `true` when a flip completes.
    pub fn on_posture(&mut self, posture: Posture, at_ms: u64) -> bool {
        if !self.armed {
            return false;
        }
        self.poll(at_ms);

        let (next, fired) = match (self.phase, posture) {
            (Phase::Unknown, Posture::Down) => (Phase::Stale, false),
            (Phase::Unknown, _) => (Phase::Ready, false),
            (Phase::Ready, Posture::Down) => (Phase::Down { since: at_ms }, false),
            (Phase::Ready, _) => (Phase::Ready, false),
            (Phase::Down { .. }, Posture::Up) => (Phase::Ready, true),
            (Phase::Down { since }, _) => (Phase::Down { since }, false),
            (Phase::Stale, Posture::Up) => (Phase::Ready, false),
            (Phase::Stale, _) => (Phase::Stale, false),
        };
        if fired {
            debug!(at_ms, "flip gesture completed");
        }
        self.phase = next;
        fired
    }
}
