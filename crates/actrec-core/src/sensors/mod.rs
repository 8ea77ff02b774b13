//! Sensor samples and the detectors that interpret them.
//!
//! Samples arrive already decoded from the platform drivers. Each sample
//! carries the millisecond timestamp it was taken at; same-channel samples
//! must arrive in timestamp order.

mod coverage;
mod distance;
mod gesture;

pub use coverage::CoverageDetector;
pub use distance::{haversine_m, DistanceTracker, SignalChange};
pub use gesture::{FlipAxis, GestureDetector, GestureSource, Posture};

use serde::{Deserialize, Serialize};

/// Discrete device orientation as reported by an orientation sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    Undefined,
    TopUp,
    TopDown,
    LeftUp,
    RightUp,
    FaceUp,
    FaceDown,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProximitySample {
    /// Something is close to (covering) the sensor.
    pub near: bool,
    pub at_ms: u64,
}

/// Accelerometer reading in m/s², device coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccelSample {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub at_ms: u64,
}

impl AccelSample {
    pub fn magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

/// Rotation angles in degrees: `x` pitch (-90..90), `y` roll (-180..180),
/// `z` yaw.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RotationSample {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub at_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrientationSample {
    pub orientation: Orientation,
    pub at_ms: u64,
}

/// Position fix from the location provider.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationFix {
    pub latitude: f64,
    pub longitude: f64,
    /// Horizontal accuracy radius in metres, if known.
    #[serde(default)]
    pub accuracy_m: Option<f64>,
    /// Ground speed in m/s as reported by the provider, if known.
    #[serde(default)]
    pub speed_ms: Option<f64>,
    pub at_ms: u64,
}

/// One timestamped input from a sensor or timer source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "sensor", rename_all = "snake_case")]
pub enum SensorEvent {
    Proximity(ProximitySample),
    Accel(AccelSample),
    Rotation(RotationSample),
    Orientation(OrientationSample),
    Location(LocationFix),
    SignalLost { at_ms: u64 },
    SignalAvailable { initial: bool, at_ms: u64 },
    Tick { at_ms: u64 },
}

impl SensorEvent {
    pub fn at_ms(&self) -> u64 {
        match self {
            SensorEvent::Proximity(s) => s.at_ms,
            SensorEvent::Accel(s) => s.at_ms,
            SensorEvent::Rotation(s) => s.at_ms,
            SensorEvent::Orientation(s) => s.at_ms,
            SensorEvent::Location(f) => f.at_ms,
            SensorEvent::SignalLost { at_ms }
            | SensorEvent::SignalAvailable { at_ms, .. }
            | SensorEvent::Tick { at_ms } => *at_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accel_magnitude() {
        let accel = AccelSample {
            x: 3.0,
            y: 4.0,
            z: 0.0,
            at_ms: 0,
        };
        assert_eq!(accel.magnitude(), 5.0);
    }

    #[test]
    fn sensor_event_json_shape() {
        let ev: SensorEvent =
            serde_json::from_str(r#"{"sensor":"proximity","near":true,"at_ms":42}"#).unwrap();
        assert_eq!(
            ev,
            SensorEvent::Proximity(ProximitySample {
                near: true,
                at_ms: 42
            })
        );
        assert_eq!(ev.at_ms(), 42);

        let tick: SensorEvent = serde_json::from_str(r#"{"sensor":"tick","at_ms":7}"#).unwrap();
        assert_eq!(tick.at_ms(), 7);
    }
}
