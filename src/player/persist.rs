use std::time::{Duration, Instant};

use thiserror::Error;

/// Same shape the widget script keeps in `localStorage`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SavedPlayback {
    pub playing: bool,
    pub elapsed: f64,
}

#[derive(Debug, Error)]
#[error("playback slot unavailable: {0}")]
pub struct PersistError(pub String);

/// Durable key-value slot holding the last playback position.
pub trait ResumeSlot {
    fn load(&mut self) -> Result<Option<SavedPlayback>, PersistError>;
    fn save(&mut self, saved: &SavedPlayback) -> Result<(), PersistError>;
}

#[derive(Debug, Default)]
pub struct MemorySlot {
    saved: Option<SavedPlayback>,
    writes: usize,
}

impl MemorySlot {
    pub fn with(saved: SavedPlayback) -> Self {
        MemorySlot {
            saved: Some(saved),
            writes: 0,
        }
    }

    pub fn saved(&self) -> Option<SavedPlayback> {
        self.saved
    }

    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl ResumeSlot for MemorySlot {
    fn load(&mut self) -> Result<Option<SavedPlayback>, PersistError> {
        Ok(self.saved)
    }

    fn save(&mut self, saved: &SavedPlayback) -> Result<(), PersistError> {
        self.saved = Some(*saved);
        self.writes += 1;
        Ok(())
    }
}

/// Rate limits writes to a slot: at most one per `interval`, with explicit
/// flushes always written. Write failures are dropped.
#[derive(Debug)]
pub struct Debounced<P> {
    slot: P,
    interval: Duration,
    last_write: Option<Instant>,
}

impl<P: ResumeSlot> Debounced<P> {
    pub fn new(slot: P, interval: Duration) -> Self {
        Debounced {
            slot,
            interval,
            last_write: None,
        }
    }

    pub fn slot(&self) -> &P {
        &self.slot
    }

    pub fn record(&mut self, saved: SavedPlayback, now: Instant) {
        let due = match self.last_write {
            Some(last) => now.saturating_duration_since(last) >= self.interval,
            None => true,
        };
        if due {
            self.write(&saved);
            self.last_write = Some(now);
        }
    }

    pub fn flush(&mut self, saved: SavedPlayback) {
        self.write(&saved);
    }

    fn write(&mut self, saved: &SavedPlayback) {
        if let Err(e) = self.slot.save(saved) {
            tracing::debug!("Dropping playback save: {e}");
        }
    }
}
