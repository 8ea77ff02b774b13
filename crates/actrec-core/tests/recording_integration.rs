//! Integration tests for the recording-session lifecycle.
//!
//! These tests drive a session through whole recordings against both the
//! SQLite store and an in-memory store that can be told to fail.

use std::sync::Arc;

use actrec_core::error::{CoreError, SessionError, StoreError};
use actrec_core::recording::{FinishTrigger, Record, RecordingSession, SessionState};
use actrec_core::sensors::{LocationFix, ProximitySample, SensorEvent};
use actrec_core::storage::{Config, Database, RecordStore};
use actrec_core::{Activity, Category, Event, ManualClock};

/// In-memory store whose writes can be switched off.
#[derive(Default)]
struct FlakyStore {
    records: Vec<Record>,
    next_id: i64,
    failing: bool,
    failing_removals: bool,
}

impl FlakyStore {
    fn check_removals(&self) -> Result<(), StoreError> {
        if self.failing_removals {
            return Err(StoreError::Unavailable("storage offline".into()));
        }
        Ok(())
    }
}

impl RecordStore for FlakyStore {
    fn insert(&mut self, record: &Record) -> Result<i64, StoreError> {
        if self.failing {
            return Err(StoreError::Locked);
        }
        self.next_id += 1;
        let mut stored = record.clone();
        stored.id = Some(self.next_id);
        self.records.push(stored);
        Ok(self.next_id)
    }

    fn update(&mut self, record: &Record) -> Result<(), StoreError> {
        let id = record.id.unwrap_or_default();
        let slot = self
            .records
            .iter_mut()
            .find(|r| r.id == record.id)
            .ok_or(StoreError::NotFound(id))?;
        *slot = record.clone();
        Ok(())
    }

    fn remove(&mut self, id: i64) -> Result<(), StoreError> {
        self.check_removals()?;
        let before = self.records.len();
        self.records.retain(|r| r.id != Some(id));
        if self.records.len() == before {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    fn remove_by_activity(&mut self, activity_id: i64) -> Result<usize, StoreError> {
        self.check_removals()?;
        let before = self.records.len();
        self.records.retain(|r| r.activity_id != activity_id);
        Ok(before - self.records.len())
    }

    fn remove_by_category(&mut self, category_id: i64) -> Result<usize, StoreError> {
        self.check_removals()?;
        let before = self.records.len();
        self.records.retain(|r| r.category_id != category_id);
        Ok(before - self.records.len())
    }

    fn remove_all(&mut self) -> Result<usize, StoreError> {
        self.check_removals()?;
        let removed = self.records.len();
        self.records.clear();
        Ok(removed)
    }

    fn list(&self) -> Result<Vec<Record>, StoreError> {
        Ok(self.records.iter().rev().cloned().collect())
    }
}

fn squats() -> Activity {
    Activity::new(3, "Squats", 1).with_repeats(5, 30)
}

fn running() -> Activity {
    Activity::new(7, "Running", 2).with_distance()
}

fn db_session(clock: &ManualClock) -> RecordingSession<Database> {
    RecordingSession::new(Database::open_memory().unwrap(), Config::default())
        .with_time(Arc::new(clock.clone()))
}

fn fix(lat: f64, at_ms: u64) -> SensorEvent {
    SensorEvent::Location(LocationFix {
        latitude: lat,
        longitude: 13.4,
        accuracy_m: Some(8.0),
        speed_ms: None,
        at_ms,
    })
}

#[test]
fn test_repetition_session_persists_record() {
    let clock = ManualClock::new(10_000);
    let mut session = db_session(&clock);

    session.prepare().unwrap();
    session.add(squats(), "legs", 0).unwrap();
    for _ in 0..3 {
        session.increase_repetitions().unwrap();
    }
    session.decrease_repetitions().unwrap();
    clock.advance(45_000);
    let record = session.finish().unwrap();

    assert_eq!(record.repetitions, 2);
    assert_eq!(record.note, "legs");
    assert_eq!(record.elapsed_secs, 45);

    let stored = session.store().get(record.id.unwrap()).unwrap().unwrap();
    assert_eq!(stored.repetitions, 2);
    assert_eq!(stored.note, "legs");
    assert_eq!(stored.activity_id, 3);
    assert_eq!(stored.category_id, 1);
}

#[test]
fn test_distance_session_needs_explicit_finish_when_coverage_disabled() {
    let clock = ManualClock::new(0);
    let mut session = db_session(&clock);

    session.prepare().unwrap();
    session.add(running(), "", 0).unwrap();

    session.handle_sensor(fix(52.500, 1_000));
    session.handle_sensor(fix(52.501, 6_000));
    session.handle_sensor(fix(52.503, 11_000));

    // Long covering with the feature disabled.
    for at_ms in (12_000..30_000).step_by(1_000) {
        session.handle_sensor(SensorEvent::Proximity(ProximitySample { near: true, at_ms }));
        session.handle_sensor(SensorEvent::Tick { at_ms });
    }
    assert_eq!(session.state(), SessionState::Active);

    clock.set(30_000);
    let record = session.finish().unwrap();
    assert!((record.distance_m - 333.6).abs() < 1.5);
    assert!(record.max_speed_ms > 40.0);

    let events = session.drain_events();
    assert!(!events
        .iter()
        .any(|e| matches!(e, Event::FinishTriggered { .. })));
    assert!(events.iter().any(|e| matches!(
        e,
        Event::Finished {
            trigger: FinishTrigger::Manual,
            ..
        }
    )));
}

#[test]
fn test_second_prepare_leaves_live_session_untouched() {
    let clock = ManualClock::new(0);
    let mut session = db_session(&clock);
    session.prepare().unwrap();
    session.add(squats(), "", 0).unwrap();
    session.increase_repetitions().unwrap();
    let before = session.snapshot();
    session.drain_events();

    assert_eq!(session.prepare(), Err(SessionError::AlreadyActive));
    assert_eq!(session.snapshot(), before);
    assert!(session.drain_events().is_empty());
}

#[test]
fn test_persistence_failure_keeps_session_finishing() {
    let clock = ManualClock::new(0);
    let store = FlakyStore {
        failing: true,
        ..Default::default()
    };
    let mut session =
        RecordingSession::new(store, Config::default()).with_time(Arc::new(clock.clone()));

    session.prepare().unwrap();
    session.add(squats(), "retry", 0).unwrap();
    session.increase_repetitions().unwrap();
    clock.set(20_000);

    let err = session.finish().unwrap_err();
    assert!(matches!(err, CoreError::Store(StoreError::Locked)));
    assert_eq!(session.state(), SessionState::Finishing);
    assert_eq!(session.current().unwrap().repetitions, 1);

    // Frozen: ticks and repetitions no longer change the record.
    session.handle_sensor(SensorEvent::Tick { at_ms: 40_000 });
    assert!(session.increase_repetitions().is_err());
    assert_eq!(session.current().unwrap().elapsed_secs, 20);

    // A new session cannot claim the slot while the commit is pending.
    assert_eq!(session.prepare(), Err(SessionError::AlreadyActive));

    session.store_mut().failing = false;
    clock.set(60_000);
    let record = session.finish().unwrap();
    assert_eq!(record.elapsed_secs, 20);
    assert_eq!(record.repetitions, 1);
    assert_eq!(session.state(), SessionState::Finished);
    assert_eq!(session.store().list().unwrap().len(), 1);
}

#[test]
fn test_automatic_finish_failure_is_reported() {
    let clock = ManualClock::new(0);
    let store = FlakyStore {
        failing: true,
        ..Default::default()
    };
    let mut session =
        RecordingSession::new(store, Config::default()).with_time(Arc::new(clock.clone()));
    session.prepare().unwrap();
    let local_id = session.add(squats(), "", 1_000).unwrap();

    session.handle_sensor(SensorEvent::Proximity(ProximitySample {
        near: true,
        at_ms: 100,
    }));
    clock.set(1_100);
    session.handle_sensor(SensorEvent::Tick { at_ms: 1_100 });
    assert_eq!(session.state(), SessionState::Finishing);

    let events = session.drain_events();
    assert!(events.iter().any(|e| matches!(
        e,
        Event::FinishFailed { local_id: id, .. } if *id == local_id
    )));

    session.store_mut().failing = false;
    let record = session.finish().unwrap();
    assert!(record.id.is_some());
    assert!(session.drain_events().iter().any(|e| matches!(
        e,
        Event::Finished {
            trigger: FinishTrigger::Cover,
            ..
        }
    )));
}

#[test]
fn test_update_emits_correction_with_old_activity() {
    let clock = ManualClock::new(0);
    let mut session = db_session(&clock);
    session.prepare().unwrap();
    session.add(squats(), "", 0).unwrap();
    let mut record = session.finish().unwrap();
    session.drain_events();

    record.activity_id = 7;
    record.category_id = 2;
    record.note = "was running".into();
    session.update(record.clone(), 3).unwrap();

    let events = session.drain_events();
    assert_eq!(events.len(), 1);
    match &events[0] {
        Event::Updated {
            record: updated,
            old_activity_id,
        } => {
            assert_eq!(*old_activity_id, 3);
            assert_eq!(updated.activity_id, 7);
        }
        other => panic!("unexpected event {other:?}"),
    }
    let stored = session.store().get(record.id.unwrap()).unwrap().unwrap();
    assert_eq!(stored.note, "was running");
}

#[test]
fn test_update_of_unknown_record_emits_nothing() {
    let clock = ManualClock::new(0);
    let mut session = db_session(&clock);
    let mut record = Record::start(&squats(), "", 0);
    record.id = Some(42);
    let err = session.update(record, 3).unwrap_err();
    assert!(matches!(err, CoreError::Store(StoreError::NotFound(42))));
    assert!(session.drain_events().is_empty());
}

#[test]
fn test_remove_record_of_live_activity_cancels_session() {
    let clock = ManualClock::new(0);
    let mut session = db_session(&clock);
    session.prepare().unwrap();
    session.add(squats(), "", 0).unwrap();
    let record = session.finish().unwrap();

    session.prepare().unwrap();
    session.add(squats(), "", 0).unwrap();
    session.drain_events();

    session.remove(&record).unwrap();
    assert_eq!(session.state(), SessionState::Cancelled);
    let kinds: Vec<&str> = session.drain_events().iter().map(|e| e.kind()).collect();
    assert_eq!(kinds, vec!["cancelled", "current_changed", "removed"]);
    assert!(session.store().list().unwrap().is_empty());
}

#[test]
fn test_remove_all_and_by_category() {
    let clock = ManualClock::new(0);
    let mut session = db_session(&clock);
    for activity in [squats(), squats(), running()] {
        session.prepare().unwrap();
        session.add(activity, "", 0).unwrap();
        session.finish().unwrap();
    }
    session.drain_events();

    let legs = Category {
        id: 1,
        name: "Legs".into(),
        color: "#ff0000".into(),
    };
    assert_eq!(session.remove_by_category(&legs).unwrap(), 2);
    assert_eq!(session.remove_all().unwrap(), 1);

    let kinds: Vec<&str> = session.drain_events().iter().map(|e| e.kind()).collect();
    assert_eq!(kinds, vec!["removed_by_category", "removed_all"]);
}

#[test]
fn test_cancelled_session_never_finishes() {
    let clock = ManualClock::new(0);
    let mut config = Config::default();
    config.gesture.finish_on_flip = true;
    let mut session = RecordingSession::new(Database::open_memory().unwrap(), config)
        .with_time(Arc::new(clock.clone()));
    session.prepare().unwrap();
    session.add(squats(), "", 500).unwrap();
    session.cancel();

    session.handle_sensor(SensorEvent::Proximity(ProximitySample {
        near: true,
        at_ms: 0,
    }));
    session.handle_sensor(SensorEvent::Tick { at_ms: 5_000 });
    assert!(session.finish().is_err());
    assert!(!session
        .drain_events()
        .iter()
        .any(|e| matches!(e, Event::Finished { .. })));
    assert!(session.store().list().unwrap().is_empty());
}

#[test]
fn test_failed_removals_emit_no_notices() {
    let clock = ManualClock::new(0);
    let mut session = RecordingSession::new(FlakyStore::default(), Config::default())
        .with_time(Arc::new(clock.clone()));
    session.prepare().unwrap();
    session.add(squats(), "", 0).unwrap();
    let record = session.finish().unwrap();
    session.drain_events();

    session.store_mut().failing_removals = true;
    let legs = Category {
        id: 1,
        name: "Legs".into(),
        color: String::new(),
    };
    assert!(matches!(
        session.remove(&record),
        Err(CoreError::Store(StoreError::Unavailable(_)))
    ));
    assert!(session.remove_by_activity(&squats()).is_err());
    assert!(session.remove_by_category(&legs).is_err());
    assert!(session.remove_all().is_err());

    assert!(session.drain_events().is_empty());
    assert_eq!(session.store().list().unwrap().len(), 1);
    assert_eq!(session.state(), SessionState::Finished);
}
