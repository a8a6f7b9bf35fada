//! Playback quality counters.

use std::sync::atomic::{AtomicU32, Ordering};

/// Snapshot of a source's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlaybackStats {
    /// Frames produced by the decoder (silence while paused is not counted).
    pub frames: u32,
    /// Times the input buffer was physically compacted.
    pub shifts: u32,
    /// Times a frame was due before enough input bytes were available.
    pub underflows: u32,
    /// Decode errors and rejected headers.
    pub errors: u32,
    /// Times the whole input buffer was discarded for lack of a sync point.
    pub dumps: u32,
}

/// Counters shared between the pump and the producer.
///
/// Every counter only grows until [`Stats::reset`] is called explicitly.
/// Reads are lock-free so stat getters never contend with the pump.
#[derive(Debug, Default)]
pub struct Stats {
    frames: AtomicU32,
    shifts: AtomicU32,
    underflows: AtomicU32,
    errors: AtomicU32,
    dumps: AtomicU32,
}

impl Stats {
    /// Creates zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts one decoded frame.
    pub fn record_frame(&self) {
        self.frames.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts one buffer compaction.
    pub fn record_shift(&self) {
        self.shifts.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts one underflow.
    pub fn record_underflow(&self) {
        self.underflows.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts one decode or header error.
    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts one full-buffer discard.
    pub fn record_dump(&self) {
        self.dumps.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the current values of all counters.
    pub fn snapshot(&self) -> PlaybackStats {
        PlaybackStats {
            frames: self.frames.load(Ordering::Relaxed),
            shifts: self.shifts.load(Ordering::Relaxed),
            underflows: self.underflows.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            dumps: self.dumps.load(Ordering::Relaxed),
        }
    }

    /// Zeroes all counters.
    pub fn reset(&self) {
        self.frames.store(0, Ordering::Relaxed);
        self.shifts.store(0, Ordering::Relaxed);
        self.underflows.store(0, Ordering::Relaxed);
        self.errors.store(0, Ordering::Relaxed);
        self.dumps.store(0, Ordering::Relaxed);
    }
}
