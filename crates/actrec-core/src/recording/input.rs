use serde::{Deserialize, Serialize};

use super::Record;
use crate::catalog::{Activity, Category};
use crate::sensors::SensorEvent;

/// Caller-issued operation on the recording session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    Prepare,
    Add {
        activity: Activity,
        #[serde(default)]
        note: String,
        #[serde(default)]
        finish_on_covering_ms: u64,
    },
    IncreaseRepetitions,
    DecreaseRepetitions,
    Finish,
    Cancel,
    SetVisible {
        visible: bool,
    },
    Update {
        record: Record,
        old_activity_id: i64,
    },
    Remove {
        record: Record,
    },
    RemoveByActivity {
        activity: Activity,
    },
    RemoveByCategory {
        category: Category,
    },
    RemoveAll,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Prepare => "prepare",
            Command::Add { .. } => "add",
            Command::IncreaseRepetitions => "increase_repetitions",
            Command::DecreaseRepetitions => "decrease_repetitions",
            Command::Finish => "finish",
            Command::Cancel => "cancel",
            Command::SetVisible { .. } => "set_visible",
            Command::Update { .. } => "update",
            Command::Remove { .. } => "remove",
            Command::RemoveByActivity { .. } => "remove_by_activity",
            Command::RemoveByCategory { .. } => "remove_by_category",
            Command::RemoveAll => "remove_all",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Input {
    Command(Command),
    Sensor(SensorEvent),
}

/// One entry on the session's event queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub at_ms: u64,
    pub input: Input,
}

impl Envelope {
    pub fn command(at_ms: u64, command: Command) -> Self {
        Self {
            at_ms,
            input: Input::Command(command),
        }
    }

    pub fn sensor(event: SensorEvent) -> Self {
        Self {
            at_ms: event.at_ms(),
            input: Input::Sensor(event),
        }
    }
}
