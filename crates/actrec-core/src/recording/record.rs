use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::Activity;
use crate::time::to_datetime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Idle,
    Prepared,
    Active,
    /// Stopped and waiting for the store to confirm the commit.
    Finishing,
    Finished,
    Cancelled,
}

impl SessionState {
    /// States that occupy the single live-session slot.
    pub fn is_live(self) -> bool {
        matches!(
            self,
            SessionState::Prepared | SessionState::Active | SessionState::Finishing
        )
    }
}

/// What ended the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FinishTrigger {
    Manual,
    Flip,
    Cover,
}

/// One activity recording, live or persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Assigned by the store on commit.
    #[serde(default)]
    pub id: Option<i64>,
    pub activity_id: i64,
    pub category_id: i64,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub elapsed_secs: u64,
    #[serde(default)]
    pub repetitions: u32,
    #[serde(default)]
    pub distance_m: f64,
    #[serde(default)]
    pub max_speed_ms: f64,
    #[serde(default)]
    pub note: String,
}

impl Record {
    pub fn start(activity: &Activity, note: impl Into<String>, now_ms: u64) -> Self {
        Self {
            id: None,
            activity_id: activity.id,
            category_id: activity.category_id,
            started_at: to_datetime(now_ms),
            finished_at: None,
            elapsed_secs: 0,
            repetitions: 0,
            distance_m: 0.0,
            max_speed_ms: 0.0,
            note: note.into(),
        }
    }
}

/// Value snapshot of the live session for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub local_id: Option<u32>,
    pub activity: Option<Activity>,
    pub record: Option<Record>,
    pub visible: bool,
    pub signal_available: bool,
    pub finish_on_covering_ms: u64,
}
