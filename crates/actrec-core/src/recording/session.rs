//! The recording-session state machine.
//!
//! One `RecordingSession` owns the single live-session slot. Commands come
//! from the caller; sensor and timer events come from the queue. Every
//! handler runs to completion and leaves its notices in an outbox that the
//! host drains with [`RecordingSession::drain_events`].
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Prepared -> Active -> Finishing -> Finished
//!            \          \          \
//!             +----------+----------+-> Cancelled
//! ```
//!
//! `Finishing` is left only once the store confirmed the commit, so a failed
//! write can be retried with another `finish()`.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use super::clock::SessionClock;
use super::cues::{cue_for, CueKind, CuePlayer, SilentPlayer};
use super::input::{Command, Input};
use super::record::{FinishTrigger, Record, SessionSnapshot, SessionState};
use crate::catalog::{Activity, Category};
use crate::error::{Result, SessionError};
use crate::events::Event;
use crate::sensors::{
    CoverageDetector, DistanceTracker, GestureDetector, ProximitySample, SensorEvent, SignalChange,
};
use crate::storage::{Config, RecordStore};
use crate::time::{to_datetime, SystemClock, TimeSource};

/// Data bound to the live session slot.
#[derive(Debug, Clone)]
struct Live {
    local_id: Option<u32>,
    activity: Option<Activity>,
    record: Option<Record>,
    finish_on_covering_ms: u64,
    trigger: FinishTrigger,
}

impl Live {
    fn prepared() -> Self {
        Self {
            local_id: None,
            activity: None,
            record: None,
            finish_on_covering_ms: 0,
            trigger: FinishTrigger::Manual,
        }
    }
}

pub struct RecordingSession<S: RecordStore> {
    store: S,
    config: Config,
    time: Arc<dyn TimeSource>,
    cues: Box<dyn CuePlayer>,

    state: SessionState,
    live: Option<Live>,
    visible: bool,
    next_local_id: u32,
    proximity_near: bool,

    clock: SessionClock,
    gesture: GestureDetector,
    coverage: CoverageDetector,
    distance: DistanceTracker,

    outbox: Vec<Event>,
}

impl<S: RecordStore> RecordingSession<S> {
    pub fn new(store: S, config: Config) -> Self {
        Self {
            store,
            config,
            time: Arc::new(SystemClock),
            cues: Box::new(SilentPlayer),
            state: SessionState::Idle,
            live: None,
            visible: true,
            next_local_id: 1,
            proximity_near: false,
            clock: SessionClock::new(),
            gesture: GestureDetector::default(),
            coverage: CoverageDetector::new(),
            distance: DistanceTracker::default(),
            outbox: Vec::new(),
        }
    }

    pub fn with_time(mut self, time: Arc<dyn TimeSource>) -> Self {
        self.time = time;
        self
    }

    pub fn with_cue_player(mut self, player: Box<dyn CuePlayer>) -> Self {
        self.cues = player;
        self
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The live record, if a session is active or finishing.
    pub fn current(&self) -> Option<&Record> {
        self.live.as_ref().and_then(|l| l.record.as_ref())
    }

    pub fn activity(&self) -> Option<&Activity> {
        self.live.as_ref().and_then(|l| l.activity.as_ref())
    }

    pub fn local_id(&self) -> Option<u32> {
        self.live.as_ref().and_then(|l| l.local_id)
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Takes effect with the next `add()`.
    pub fn set_config(&mut self, config: Config) {
        self.config = config;
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Forward an envelope timestamp to the time source.
    pub fn observe_time(&self, at_ms: u64) {
        self.time.observe(at_ms);
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let live = self.live.as_ref();
        SessionSnapshot {
            state: self.state,
            local_id: live.and_then(|l| l.local_id),
            activity: live.and_then(|l| l.activity.clone()),
            record: live.and_then(|l| l.record.clone()),
            visible: self.visible,
            signal_available: self.distance.is_signal_available(),
            finish_on_covering_ms: live.map(|l| l.finish_on_covering_ms).unwrap_or(0),
        }
    }

    /// Notices produced since the last drain, in emission order.
    pub fn drain_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.outbox)
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Claim the live-session slot.
    ///
    /// # Errors
    /// `AlreadyActive` while another session is prepared, active or finishing.
    pub fn prepare(&mut self) -> Result<(), SessionError> {
        if self.state.is_live() {
            warn!(state = ?self.state, "prepare rejected, session already live");
            return Err(SessionError::AlreadyActive);
        }
        self.live = Some(Live::prepared());
        self.state = SessionState::Prepared;
        info!("session prepared");
        let at = to_datetime(self.time.now_ms());
        self.emit(Event::Prepared { at });
        self.emit_current();
        Ok(())
    }

    /// Bind the prepared session to `activity` and start recording.
    ///
    /// Returns the in-session id used to correlate the `Finished` notice.
    /// A `finish_on_covering_ms` of zero disables cover-to-finish.
    pub fn add(
        &mut self,
        activity: Activity,
        note: impl Into<String>,
        finish_on_covering_ms: u64,
    ) -> Result<u32, SessionError> {
        match self.state {
            SessionState::Prepared => {}
            SessionState::Active | SessionState::Finishing => {
                return Err(SessionError::AlreadyActive)
            }
            _ => return Err(SessionError::NotPrepared),
        }

        let now = self.time.now_ms();
        let local_id = self.next_local_id;
        self.next_local_id = self.next_local_id.wrapping_add(1).max(1);

        self.clock.arm(now);

        let gesture = &self.config.gesture;
        if gesture.finish_on_flip {
            self.gesture
                .configure(gesture.source, gesture.axis, gesture.grace_window_ms);
            self.gesture
                .set_thresholds(gesture.accel_threshold, gesture.rotation_threshold_deg);
            self.gesture.arm();
        } else {
            self.gesture.disarm();
        }

        self.coverage.arm(finish_on_covering_ms);

        if activity.use_distance {
            let d = &self.config.distance;
            self.distance
                .configure(d.signal_grace_ms, d.max_plausible_speed_ms, d.max_fix_accuracy_m);
            self.distance.arm();
        } else {
            self.distance.disarm();
        }
        self.proximity_near = false;

        info!(
            local_id,
            activity_id = activity.id,
            flip = self.gesture.is_armed(),
            cover_ms = finish_on_covering_ms,
            distance = self.distance.is_armed(),
            "session started"
        );
        let record = Record::start(&activity, note, now);
        self.emit(Event::Started {
            local_id,
            activity_id: activity.id,
            category_id: activity.category_id,
            at: record.started_at,
        });
        self.live = Some(Live {
            local_id: Some(local_id),
            activity: Some(activity),
            record: Some(record),
            finish_on_covering_ms,
            trigger: FinishTrigger::Manual,
        });
        self.state = SessionState::Active;
        self.emit_current();
        Ok(local_id)
    }

    /// Count one more repetition. Returns the new count.
    pub fn increase_repetitions(&mut self) -> Result<u32, SessionError> {
        let record = self.repeat_record()?;
        record.repetitions = record.repetitions.saturating_add(1);
        let count = record.repetitions;
        self.play(CueKind::RepetitionUp);
        self.emit_current();
        Ok(count)
    }

    /// Take one repetition back, never below zero. Returns the new count.
    pub fn decrease_repetitions(&mut self) -> Result<u32, SessionError> {
        let record = self.repeat_record()?;
        let before = record.repetitions;
        record.repetitions = before.saturating_sub(1);
        let count = record.repetitions;
        if count != before {
            self.play(CueKind::RepetitionDown);
            self.emit_current();
        }
        Ok(count)
    }

    /// Stop recording and commit the record.
    ///
    /// From `Finishing` this retries a commit that failed earlier.
    ///
    /// # Errors
    /// `NotActive` outside `Active`/`Finishing`. Store errors leave the
    /// session in `Finishing`.
    pub fn finish(&mut self) -> Result<Record> {
        match self.state {
            SessionState::Active => self.complete(FinishTrigger::Manual),
            SessionState::Finishing => self.commit(),
            state => Err(SessionError::NotActive { state }.into()),
        }
    }

    /// Drop the live session without persisting it. Idempotent.
    pub fn cancel(&mut self) {
        match self.state {
            SessionState::Finished | SessionState::Cancelled => {}
            SessionState::Idle => self.state = SessionState::Cancelled,
            SessionState::Prepared | SessionState::Active | SessionState::Finishing => {
                let now = self.time.now_ms();
                self.clock.disarm(now);
                self.disarm_sensors();
                let local_id = self.live.take().and_then(|l| l.local_id);
                self.state = SessionState::Cancelled;
                info!(?local_id, "session cancelled");
                self.emit(Event::Cancelled {
                    local_id,
                    at: to_datetime(now),
                });
                self.emit_current();
            }
        }
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    /// Correct an already persisted record.
    pub fn update(&mut self, record: Record, old_activity_id: i64) -> Result<()> {
        if record.id.is_none() {
            return Err(SessionError::MissingRecordId.into());
        }
        self.store.update(&record)?;
        info!(record_id = ?record.id, old_activity_id, "record updated");
        self.emit(Event::Updated {
            record,
            old_activity_id,
        });
        Ok(())
    }

    pub fn remove(&mut self, record: &Record) -> Result<()> {
        let id = record.id.ok_or(SessionError::MissingRecordId)?;
        self.cancel_if_targets(|a| a.id == record.activity_id);
        self.store.remove(id)?;
        info!(record_id = id, "record removed");
        self.emit(Event::Removed {
            id,
            activity_id: record.activity_id,
            category_id: record.category_id,
        });
        Ok(())
    }

    pub fn remove_by_activity(&mut self, activity: &Activity) -> Result<usize> {
        self.cancel_if_targets(|a| a.id == activity.id);
        let removed = self.store.remove_by_activity(activity.id)?;
        info!(activity_id = activity.id, removed, "records removed by activity");
        self.emit(Event::RemovedByActivity {
            activity_id: activity.id,
            category_id: activity.category_id,
        });
        Ok(removed)
    }

    pub fn remove_by_category(&mut self, category: &Category) -> Result<usize> {
        self.cancel_if_targets(|a| a.category_id == category.id);
        let removed = self.store.remove_by_category(category.id)?;
        info!(category_id = category.id, removed, "records removed by category");
        self.emit(Event::RemovedByCategory {
            category_id: category.id,
        });
        Ok(removed)
    }

    pub fn remove_all(&mut self) -> Result<usize> {
        self.cancel_if_targets(|_| true);
        let removed = self.store.remove_all()?;
        info!(removed, "all records removed");
        self.emit(Event::RemovedAll);
        Ok(removed)
    }

    // ── Queue entry points ───────────────────────────────────────────

    /// Run one queued input to completion.
    pub fn dispatch(&mut self, input: Input) -> Result<()> {
        match input {
            Input::Sensor(event) => {
                self.handle_sensor(event);
                Ok(())
            }
            Input::Command(command) => self.execute(command),
        }
    }

    pub fn execute(&mut self, command: Command) -> Result<()> {
        match command {
            Command::Prepare => self.prepare()?,
            Command::Add {
                activity,
                note,
                finish_on_covering_ms,
            } => {
                self.add(activity, note, finish_on_covering_ms)?;
            }
            Command::IncreaseRepetitions => {
                self.increase_repetitions()?;
            }
            Command::DecreaseRepetitions => {
                self.decrease_repetitions()?;
            }
            Command::Finish => {
                self.finish()?;
            }
            Command::Cancel => self.cancel(),
            Command::SetVisible { visible } => self.set_visible(visible),
            Command::Update {
                record,
                old_activity_id,
            } => self.update(record, old_activity_id)?,
            Command::Remove { record } => self.remove(&record)?,
            Command::RemoveByActivity { activity } => {
                self.remove_by_activity(&activity)?;
            }
            Command::RemoveByCategory { category } => {
                self.remove_by_category(&category)?;
            }
            Command::RemoveAll => {
                self.remove_all()?;
            }
        }
        Ok(())
    }

    /// Feed one sensor or timer event. Ignored unless a session is active.
    pub fn handle_sensor(&mut self, event: SensorEvent) {
        if self.state != SessionState::Active {
            return;
        }
        match event {
            SensorEvent::Tick { at_ms } => self.on_tick(at_ms),
            SensorEvent::Proximity(sample) => self.on_proximity(sample),
            SensorEvent::Accel(sample) => {
                if self.gesture.on_accel(sample) {
                    self.auto_finish(FinishTrigger::Flip, sample.at_ms);
                }
            }
            SensorEvent::Rotation(sample) => {
                if self.gesture.on_rotation(sample) {
                    self.auto_finish(FinishTrigger::Flip, sample.at_ms);
                }
            }
            SensorEvent::Orientation(sample) => {
                if self.gesture.on_orientation(sample) {
                    self.auto_finish(FinishTrigger::Flip, sample.at_ms);
                }
            }
            SensorEvent::Location(fix) => {
                let change = self.distance.on_fix(fix);
                self.report_signal(change, fix.at_ms);
                self.sync_distance();
            }
            SensorEvent::SignalLost { at_ms } => {
                let change = self.distance.on_signal_lost(at_ms);
                self.report_signal(change, at_ms);
            }
            SensorEvent::SignalAvailable { initial, at_ms } => {
                let change = self.distance.on_signal_available(initial, at_ms);
                self.report_signal(change, at_ms);
            }
        }
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn emit(&mut self, event: Event) {
        self.outbox.push(event);
    }

    fn emit_current(&mut self) {
        let snapshot = self.snapshot();
        self.emit(Event::CurrentChanged { snapshot });
    }

    fn play(&mut self, kind: CueKind) {
        if let Some(cue) = cue_for(&self.config.cues, kind) {
            if let Err(e) = self.cues.play(&cue) {
                warn!(cue = cue.name(), error = %e, "cue playback failed");
            }
        }
    }

    fn repeat_record(&mut self) -> Result<&mut Record, SessionError> {
        let state = self.state;
        if state != SessionState::Active {
            return Err(SessionError::NotActive { state });
        }
        let live = self
            .live
            .as_mut()
            .ok_or(SessionError::NotActive { state })?;
        match &live.activity {
            Some(activity) if !activity.use_repeats => {
                return Err(SessionError::RepeatsNotTracked {
                    activity_id: activity.id,
                })
            }
            _ => {}
        }
        live.record.as_mut().ok_or(SessionError::NotActive { state })
    }

    fn disarm_sensors(&mut self) {
        self.gesture.disarm();
        self.coverage.disarm();
        self.distance.disarm();
        self.proximity_near = false;
    }

    fn cancel_if_targets(&mut self, targets: impl Fn(&Activity) -> bool) {
        if !matches!(self.state, SessionState::Active | SessionState::Finishing) {
            return;
        }
        if self.activity().is_some_and(|a| targets(a)) {
            warn!(local_id = ?self.local_id(), "cancelling live session before deletion");
            self.cancel();
        }
    }

    fn complete(&mut self, trigger: FinishTrigger) -> Result<Record> {
        self.stop(trigger);
        self.commit()
    }

    /// Freeze the record and release every sensor. Active -> Finishing.
    fn stop(&mut self, trigger: FinishTrigger) {
        let now = self.time.now_ms();
        self.clock.disarm(now);
        let elapsed_secs = self.clock.elapsed_secs();
        let tracked = self.distance.is_armed();
        let distance_m = self.distance.cumulative_distance();
        let max_speed_ms = self.distance.max_speed();

        if let Some(live) = self.live.as_mut() {
            live.trigger = trigger;
            if let Some(record) = live.record.as_mut() {
                record.elapsed_secs = elapsed_secs;
                record.finished_at = Some(to_datetime(now));
                if tracked {
                    record.distance_m = distance_m;
                    record.max_speed_ms = max_speed_ms;
                }
            }
        }
        self.disarm_sensors();
        self.state = SessionState::Finishing;
        info!(?trigger, elapsed_secs, "session stopped");
    }

    /// Hand the frozen record to the store. Finishing -> Finished on success.
    fn commit(&mut self) -> Result<Record> {
        let state = self.state;
        let Some((local_id, trigger, record)) = self.live.as_ref().and_then(|l| {
            l.record
                .clone()
                .map(|r| (l.local_id.unwrap_or_default(), l.trigger, r))
        }) else {
            return Err(SessionError::NotActive { state }.into());
        };

        match self.store.insert(&record) {
            Ok(id) => {
                let mut record = record;
                record.id = Some(id);
                self.live = None;
                self.state = SessionState::Finished;
                info!(local_id, record_id = id, ?trigger, "session finished");
                self.play(CueKind::Finish);
                self.emit(Event::Finished {
                    local_id,
                    record: record.clone(),
                    activity_id: record.activity_id,
                    category_id: record.category_id,
                    trigger,
                });
                self.emit_current();
                Ok(record)
            }
            Err(e) => {
                error!(local_id, error = %e, "failed to persist finished session");
                Err(e.into())
            }
        }
    }

    fn auto_finish(&mut self, trigger: FinishTrigger, at_ms: u64) {
        let local_id = self.local_id().unwrap_or_default();
        info!(local_id, ?trigger, "automatic finish triggered");
        self.emit(Event::FinishTriggered {
            local_id,
            trigger,
            at: to_datetime(at_ms),
        });
        if let Err(e) = self.complete(trigger) {
            self.emit(Event::FinishFailed {
                local_id,
                reason: e.to_string(),
                at: to_datetime(at_ms),
            });
        }
    }

    fn on_tick(&mut self, at_ms: u64) {
        let changed = self.clock.tick(at_ms);
        self.distance.poll(at_ms);
        self.gesture.poll(at_ms);

        if changed {
            let elapsed = self.clock.elapsed_secs();
            if let Some(record) = self.live.as_mut().and_then(|l| l.record.as_mut()) {
                record.elapsed_secs = elapsed;
            }
            self.emit_current();
        }
        if self.coverage.poll(at_ms) {
            self.auto_finish(FinishTrigger::Cover, at_ms);
        }
    }

    fn on_proximity(&mut self, sample: ProximitySample) {
        if sample.near != self.proximity_near {
            self.proximity_near = sample.near;
            if self.visible && self.config.session.hide_on_proximity {
                debug!(near = sample.near, "proximity display hint");
                self.emit(Event::DisplayHint {
                    visible: !sample.near,
                });
            }
        }
        if self.coverage.on_sample(sample) {
            self.auto_finish(FinishTrigger::Cover, sample.at_ms);
        }
    }

    fn report_signal(&mut self, change: Option<SignalChange>, at_ms: u64) {
        if let Some(change) = change {
            let available = change == SignalChange::Available;
            info!(available, "location signal changed");
            self.emit(Event::LocationSignal {
                available,
                at: to_datetime(at_ms),
            });
        }
    }

    fn sync_distance(&mut self) {
        if !self.distance.is_armed() {
            return;
        }
        let distance_m = self.distance.cumulative_distance();
        let max_speed_ms = self.distance.max_speed();
        let Some(record) = self.live.as_mut().and_then(|l| l.record.as_mut()) else {
            return;
        };
        if record.distance_m != distance_m || record.max_speed_ms != max_speed_ms {
            record.distance_m = distance_m;
            record.max_speed_ms = max_speed_ms;
            self.emit_current();
        }
    }
}
