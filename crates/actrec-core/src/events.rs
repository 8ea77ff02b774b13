use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::recording::{FinishTrigger, Record, SessionSnapshot};

/// Every notice the recording session produces.
///
/// Hosts drain these after each operation; list models and aggregate
/// counters subscribe to them. Removal notices are only emitted after the
/// store confirmed the deletion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    Prepared {
        at: DateTime<Utc>,
    },
    Started {
        local_id: u32,
        activity_id: i64,
        category_id: i64,
        at: DateTime<Utc>,
    },
    /// Display snapshot after any visible change of the live session.
    CurrentChanged {
        snapshot: SessionSnapshot,
    },
    /// A gesture or covering stopped the session; commit follows.
    FinishTriggered {
        local_id: u32,
        trigger: FinishTrigger,
        at: DateTime<Utc>,
    },
    /// Session committed. Carries the activity and category so aggregate
    /// counts can be bumped without a lookup.
    Finished {
        local_id: u32,
        record: Record,
        activity_id: i64,
        category_id: i64,
        trigger: FinishTrigger,
    },
    /// Commit failed; the session waits in `Finishing` for a retry.
    FinishFailed {
        local_id: u32,
        reason: String,
        at: DateTime<Utc>,
    },
    Cancelled {
        local_id: Option<u32>,
        at: DateTime<Utc>,
    },
    Updated {
        record: Record,
        old_activity_id: i64,
    },
    Removed {
        id: i64,
        activity_id: i64,
        category_id: i64,
    },
    RemovedByActivity {
        activity_id: i64,
        category_id: i64,
    },
    RemovedByCategory {
        category_id: i64,
    },
    RemovedAll,
    /// Presentation hint from the proximity sensor: blank the recording
    /// screen while something is near.
    DisplayHint {
        visible: bool,
    },
    LocationSignal {
        available: bool,
        at: DateTime<Utc>,
    },
    /// A queued command was refused.
    Rejected {
        command: String,
        reason: String,
    },
}

impl Event {
    /// Short machine name, as used in the `type` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Event::Prepared { .. } => "prepared",
            Event::Started { .. } => "started",
            Event::CurrentChanged { .. } => "current_changed",
            Event::FinishTriggered { .. } => "finish_triggered",
            Event::Finished { .. } => "finished",
            Event::FinishFailed { .. } => "finish_failed",
            Event::Cancelled { .. } => "cancelled",
            Event::Updated { .. } => "updated",
            Event::Removed { .. } => "removed",
            Event::RemovedByActivity { .. } => "removed_by_activity",
            Event::RemovedByCategory { .. } => "removed_by_category",
            Event::RemovedAll => "removed_all",
            Event::DisplayHint { .. } => "display_hint",
            Event::LocationSignal { .. } => "location_signal",
            Event::Rejected { .. } => "rejected",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_matches_serde_tag() {
        let events = vec![
            Event::RemovedAll,
            Event::RemovedByCategory { category_id: 4 },
            Event::DisplayHint { visible: false },
            Event::Rejected {
                command: "add".into(),
                reason: "no".into(),
            },
        ];
        for event in events {
            let json = serde_json::to_value(&event).unwrap();
            assert_eq!(json["type"], event.kind());
        }
    }
}
