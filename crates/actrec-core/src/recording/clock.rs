//! Duration accumulation for the live session.
//!
//! No internal thread: the host delivers `Tick` events and the clock folds
//! the wall-clock delta since the previous tick into the elapsed total.

#[derive(Debug, Clone, Default)]
pub struct SessionClock {
    /// Tick time of the last flush, `None` while disarmed.
    last_ms: Option<u64>,
    elapsed_ms: u64,
}

impl SessionClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new accumulation from zero at `now_ms`.
    pub fn arm(&mut self, now_ms: u64) {
        self.last_ms = Some(now_ms);
        self.elapsed_ms = 0;
    }

    /// Flush up to `now_ms` and stop. The elapsed total is frozen afterwards.
    pub fn disarm(&mut self, now_ms: u64) {
        self.flush(now_ms);
        self.last_ms = None;
    }

    pub fn is_running(&self) -> bool {
        self.last_ms.is_some()
    }

    /// Returns `true` when the whole-second count changed.
    pub fn tick(&mut self, now_ms: u64) -> bool {
        let before = self.elapsed_secs();
        self.flush(now_ms);
        self.elapsed_secs() != before
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ms
    }

    pub fn elapsed_secs(&self) -> u64 {
        self.elapsed_ms / 1000
    }

    fn flush(&mut self, now_ms: u64) {
        if let Some(last) = self.last_ms {
            // Late or duplicated ticks never move the clock backwards.
            if now_ms > last {
                self.elapsed_ms = self.elapsed_ms.saturating_add(now_ms - last);
                self.last_ms = Some(now_ms);
            }
        }
    }
}
