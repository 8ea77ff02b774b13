//! Live recording session: lifecycle, queue input, cues and records.

mod clock;
mod cues;
mod driver;
mod input;
mod record;
mod session;

pub use clock::SessionClock;
pub use cues::{cue_for, Cue, CueKind, CuePlayer, SilentPlayer};
pub use driver::run;
pub use input::{Command, Envelope, Input};
pub use record::{FinishTrigger, Record, SessionSnapshot, SessionState};
pub use session::RecordingSession;
