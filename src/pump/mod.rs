//! The frame pump shared by every codec adapter.
//!
//! A [`Source`] owns a byte buffer, a [`FrameGenerator`] and an
//! [`OutputDevice`](crate::OutputDevice). Whenever the device reports room for
//! a frame, the pump asks the generator for one frame, applies gain and writes
//! it out, repeating until the device is full. The generator sees the buffered
//! bytes through a [`PumpInput`], which defers compaction of consumed bytes
//! until more than half the buffer is dead.

mod source;

pub use source::Source;

use tracing::{trace, warn};

use crate::buffer::DataBuffer;
use crate::frame::AudioFrame;
use crate::stats::Stats;

/// Produces one frame of stereo PCM per pump cycle from buffered bytes.
///
/// # Implementation Notes
///
/// - Called from the device's ready callback, so it must never block waiting
///   for input. When bytes run short, emit what is available (the pump pads
///   an empty frame with silence) and record an underflow
/// - Leave partially-filled frames for the pump only when variable-length
///   output is intended; fixed-rate decoders fill the rest with silence
/// - Report the stream's sample rate by returning `Some(rate)`; the pump
///   forwards changes to the device
pub trait FrameGenerator: Send + 'static {
    /// Fills `frame` with the next block of audio.
    fn generate_one_frame<B: DataBuffer>(
        &mut self,
        input: &mut PumpInput<'_, B>,
        frame: &mut AudioFrame,
    ) -> Option<u32>;

    /// Returns the parser to its initial state. Called by `flush()`.
    fn reset(&mut self);

    /// Returns `true` once nothing more will be produced from `available`
    /// unconsumed bytes.
    fn done(&self, available: usize) -> bool;
}

/// Consumed-but-not-yet-compacted byte count for one buffer.
///
/// Bytes before `pending` have been decoded but are still physically present
/// in the buffer; moving the tail down is deferred until it pays off.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DecoderCursor {
    pending: usize,
}

impl DecoderCursor {
    /// Creates a cursor at the start of the buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes consumed but not yet discarded from the buffer.
    pub fn pending(&self) -> usize {
        self.pending
    }

    /// Forgets all pending bytes.
    pub fn reset(&mut self) {
        self.pending = 0;
    }
}

/// A generator's view of the source buffer during one pump cycle.
///
/// # Example
///
/// ```
/// use background_audio::{DataBuffer, DecoderCursor, PumpInput, RingBuffer, Stats};
///
/// let buffer = RingBuffer::new(16);
/// buffer.write(b"RIFFxxxx");
///
/// let stats = Stats::new();
/// let mut cursor = DecoderCursor::new();
/// let mut input = PumpInput::new(&buffer, &mut cursor, &stats);
///
/// assert!(input.with_window(|w| w.starts_with(b"RIFF")));
/// input.advance(4);
/// assert_eq!(input.available(), 4);
/// assert_eq!(buffer.available(), 8); // not compacted yet
/// ```
pub struct PumpInput<'a, B: DataBuffer> {
    buffer: &'a B,
    cursor: &'a mut DecoderCursor,
    stats: &'a Stats,
}

impl<'a, B: DataBuffer> PumpInput<'a, B> {
    /// Wraps a buffer and its cursor for one pump cycle.
    pub fn new(buffer: &'a B, cursor: &'a mut DecoderCursor, stats: &'a Stats) -> Self {
        Self {
            buffer,
            cursor,
            stats,
        }
    }

    /// Unconsumed bytes.
    pub fn available(&self) -> usize {
        self.buffer.available().saturating_sub(self.cursor.pending)
    }

    /// Capacity of the underlying buffer.
    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    /// Runs `f` over the unconsumed bytes.
    pub fn with_window<T>(&self, f: impl FnOnce(&[u8]) -> T) -> T {
        let pending = self.cursor.pending;
        self.buffer
            .with_data(|data| f(&data[pending.min(data.len())..]))
    }

    /// Marks `count` bytes as consumed without moving any memory.
    pub fn advance(&mut self, count: usize) {
        let stored = self.buffer.available();
        self.cursor.pending = (self.cursor.pending + count).min(stored);
    }

    /// Compacts once more than half the buffer is consumed-but-present.
    ///
    /// Returns `true` if memory was moved.
    pub fn compact_if_needed(&mut self) -> bool {
        if self.cursor.pending > self.buffer.capacity() / 2 {
            self.compact()
        } else {
            false
        }
    }

    /// Discards every consumed byte now.
    pub fn compact(&mut self) -> bool {
        let pending = self.cursor.pending;
        if pending == 0 {
            return false;
        }
        self.buffer.shift_up(pending);
        self.cursor.pending = 0;
        self.stats.record_shift();
        trace!(bytes = pending, "compacted input buffer");
        true
    }

    /// Discards everything in the buffer, consumed or not.
    pub fn dump(&mut self) {
        let stored = self.buffer.available();
        self.buffer.shift_up(stored);
        self.cursor.pending = 0;
        self.stats.record_dump();
        warn!(bytes = stored, "no sync point found, discarded input buffer");
    }

    /// Appends up to `count` zero bytes after the producer's data.
    pub fn pad_zeros(&mut self, count: usize) -> usize {
        self.buffer.write_zero(count)
    }

    /// Counters for the owning source.
    pub fn stats(&self) -> &Stats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::RingBuffer;

    #[test]
    fn test_advance_defers_shift() {
        let buffer = RingBuffer::new(16);
        buffer.write(&[1, 2, 3, 4, 5, 6]);
        let stats = Stats::new();
        let mut cursor = DecoderCursor::new();

        let mut input = PumpInput::new(&buffer, &mut cursor, &stats);
        input.advance(4);
        assert!(!input.compact_if_needed());
        assert_eq!(input.with_window(|w| w.to_vec()), vec![5, 6]);
        assert_eq!(buffer.available(), 6);
        assert_eq!(stats.snapshot().shifts, 0);
    }

    #[test]
    fn test_compacts_past_half_capacity() {
        let buffer = RingBuffer::new(8);
        buffer.write(&[0, 1, 2, 3, 4, 5, 6, 7]);
        let stats = Stats::new();
        let mut cursor = DecoderCursor::new();

        let mut input = PumpInput::new(&buffer, &mut cursor, &stats);
        input.advance(5);
        assert!(input.compact_if_needed());
        assert_eq!(input.available(), 3);
        assert_eq!(buffer.with_data(|d| d.to_vec()), vec![5, 6, 7]);
        assert_eq!(stats.snapshot().shifts, 1);
        assert_eq!(cursor.pending(), 0);
    }

    #[test]
    fn test_advance_clamps_to_stored() {
        let buffer = RingBuffer::new(8);
        buffer.write(&[1, 2]);
        let stats = Stats::new();
        let mut cursor = DecoderCursor::new();

        let mut input = PumpInput::new(&buffer, &mut cursor, &stats);
        input.advance(10);
        assert_eq!(input.available(), 0);
        assert!(input.with_window(|w| w.is_empty()));
    }

    #[test]
    fn test_dump_discards_everything() {
        let buffer = RingBuffer::new(8);
        buffer.write(&[9; 8]);
        let stats = Stats::new();
        let mut cursor = DecoderCursor::new();

        let mut input = PumpInput::new(&buffer, &mut cursor, &stats);
        input.advance(2);
        input.dump();
        assert_eq!(buffer.available(), 0);
        assert_eq!(stats.snapshot().dumps, 1);
        assert_eq!(cursor.pending(), 0);
    }

    #[test]
    fn test_pad_zeros_after_data() {
        let buffer = RingBuffer::new(8);
        buffer.write(&[7, 7]);
        let stats = Stats::new();
        let mut cursor = DecoderCursor::new();

        let mut input = PumpInput::new(&buffer, &mut cursor, &stats);
        assert_eq!(input.pad_zeros(3), 3);
        assert_eq!(input.with_window(|w| w.to_vec()), vec![7, 7, 0, 0, 0]);
    }
}
