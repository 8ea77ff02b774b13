//! Audio cue decisions.
//!
//! The session only decides *that* a cue should play and asks a
//! [`CuePlayer`] for it. Loading and mixing audio belongs to the host.

use serde::{Deserialize, Serialize};

use crate::error::CueError;
use crate::storage::CuesConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CueKind {
    RepetitionUp,
    RepetitionDown,
    Finish,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cue {
    pub kind: CueKind,
    /// Sound name the host maps to an audio resource.
    pub sound: String,
}

impl Cue {
    pub fn name(&self) -> &str {
        &self.sound
    }
}

pub trait CuePlayer: Send {
    fn play(&mut self, cue: &Cue) -> Result<(), CueError>;
}

/// Player for hosts without audio output.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentPlayer;

impl CuePlayer for SilentPlayer {
    fn play(&mut self, _cue: &Cue) -> Result<(), CueError> {
        Ok(())
    }
}

/// Pick the cue to play for `kind`, if that cue is enabled.
pub fn cue_for(config: &CuesConfig, kind: CueKind) -> Option<Cue> {
    let (enabled, sound) = match kind {
        CueKind::RepetitionUp => (config.repetition_enabled, &config.repetition_sound),
        CueKind::RepetitionDown => (config.decrease_enabled, &config.repetition_sound),
        CueKind::Finish => (config.finish_enabled, &config.finish_sound),
    };
    if !enabled || sound.is_empty() {
        return None;
    }
    Some(Cue {
        kind,
        sound: sound.clone(),
    })
}
