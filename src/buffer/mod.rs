//! Producer-to-decoder byte buffers.
//!
//! Two backends share the [`DataBuffer`] contract:
//!
//! - [`RingBuffer`]: owns its storage, appends at the tail and reclaims space by
//!   compaction (moving the unread bytes to the front) rather than wraparound,
//!   so decoders always see one contiguous window
//! - [`ZeroCopyBuffer`]: holds a view into externally-owned memory such as a
//!   flash-resident asset; writing replaces the view
//!
//! Every mutation runs under the buffer's lock. The lock is a
//! [`lock_api::RawMutex`] chosen by type parameter so firmware can plug in an
//! interrupt-masking primitive; hosted builds default to `parking_lot`.

mod ring;
mod zero_copy;

pub use ring::RingBuffer;
pub use zero_copy::ZeroCopyBuffer;

pub use parking_lot::lock_api;

/// Raw mutex used when no critical-section primitive is injected.
pub type DefaultRawMutex = parking_lot::RawMutex;

/// A bounded byte store shared by one producer and one interrupt-driven consumer.
///
/// Implementations never block beyond their own short critical section and
/// never overflow: writes are truncated to the free space.
pub trait DataBuffer: Send + Sync + 'static {
    /// Critical-section primitive protecting this buffer. Sources reuse it for
    /// their own pump state so a single primitive guards the whole pipeline.
    type Lock: lock_api::RawMutex + Send + Sync + 'static;

    /// Total capacity in bytes.
    fn capacity(&self) -> usize;

    /// Bytes currently stored.
    fn available(&self) -> usize;

    /// Bytes that can still be written.
    fn available_for_write(&self) -> usize;

    /// Appends up to `count` zero bytes, returning how many were added.
    fn write_zero(&self, count: usize) -> usize;

    /// Discards the first `count` bytes, keeping the remainder in order.
    fn shift_up(&self, count: usize);

    /// Empties the buffer.
    fn flush(&self);

    /// Runs `f` over the stored bytes while holding the buffer lock.
    fn with_data<T>(&self, f: impl FnOnce(&[u8]) -> T) -> T;
}
