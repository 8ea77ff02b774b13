//! # Actrec Core Library
//!
//! This library provides the core logic for recording a single physical
//! activity at a time: elapsed time, repetitions, and distance, with
//! hands-free finishing by flipping or covering the device.
//!
//! ## Architecture
//!
//! - **Recording Session**: A state machine owning the single live-session
//!   slot. Commands, sensor samples and timer ticks reach it through one
//!   ordered queue and are handled to completion one at a time
//! - **Sensors**: Detectors for the flip gesture, proximity covering and
//!   GPS distance, each armed only while a session needs it
//! - **Storage**: SQLite-based record storage and TOML-based configuration
//!
//! ## Key Components
//!
//! - [`RecordingSession`]: Session lifecycle and notice outbox
//! - [`Database`]: Finished-record persistence
//! - [`Config`]: Application configuration management
//! - [`Catalog`]: Activities and categories available for recording

pub mod catalog;
pub mod error;
pub mod events;
pub mod recording;
pub mod sensors;
pub mod storage;
pub mod time;

pub use catalog::{Activity, Catalog, Category};
pub use error::{ConfigError, CoreError, CueError, Result, SessionError, StoreError};
pub use events::Event;
pub use recording::{
    Command, Envelope, FinishTrigger, Input, Record, RecordingSession, SessionSnapshot,
    SessionState,
};
pub use sensors::SensorEvent;
pub use storage::{Config, Database, RecordStore};
pub use time::{ManualClock, SystemClock, TimeSource};
