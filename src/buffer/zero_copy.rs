//! Zero-copy view over caller-owned audio data.

use bytes::{Buf, Bytes};
use parking_lot::lock_api::{Mutex, RawMutex};

use super::{DataBuffer, DefaultRawMutex};

/// A buffer that plays directly from memory it does not own.
///
/// Meant for assets already resident in flash or RAM: `write` stores a view
/// of the data instead of copying it, so there is never room to append and
/// [`available_for_write`](DataBuffer::available_for_write) is always 0.
/// Each write wholly replaces the previous view; concatenating files requires
/// a single contiguous asset.
///
/// # Example
///
/// ```
/// use background_audio::{DataBuffer, ZeroCopyBuffer};
///
/// static ASSET: &[u8] = b"RIFF....WAVE";
///
/// let buffer = ZeroCopyBuffer::new();
/// buffer.write(ASSET);
/// buffer.shift_up(4);
/// assert_eq!(buffer.available(), 8);
/// assert_eq!(buffer.available_for_write(), 0);
/// ```
pub struct ZeroCopyBuffer<R: RawMutex = DefaultRawMutex> {
    inner: Mutex<R, ViewInner>,
}

struct ViewInner {
    view: Bytes,
    capacity: usize,
}

impl ZeroCopyBuffer {
    /// Creates an empty view guarded by the default lock.
    pub fn new() -> Self {
        Self::with_raw_mutex()
    }
}

impl Default for ZeroCopyBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: RawMutex> ZeroCopyBuffer<R> {
    /// Creates an empty view guarded by `R`.
    pub fn with_raw_mutex() -> Self {
        Self {
            inner: Mutex::new(ViewInner {
                view: Bytes::new(),
                capacity: 0,
            }),
        }
    }

    /// Replaces the current view with `data`, returning its length.
    ///
    /// `&'static [u8]` assets are referenced in place; owned data is moved in
    /// without copying.
    pub fn write(&self, data: impl Into<Bytes>) -> usize {
        let view = data.into();
        let len = view.len();
        let mut inner = self.inner.lock();
        inner.view = view;
        inner.capacity = len;
        len
    }
}

impl<R> DataBuffer for ZeroCopyBuffer<R>
where
    R: RawMutex + Send + Sync + 'static,
{
    type Lock = R;

    fn capacity(&self) -> usize {
        self.inner.lock().capacity
    }

    fn available(&self) -> usize {
        self.inner.lock().view.len()
    }

    fn available_for_write(&self) -> usize {
        0
    }

    fn write_zero(&self, _count: usize) -> usize {
        0
    }

    fn shift_up(&self, count: usize) {
        let mut inner = self.inner.lock();
        if count <= inner.view.len() {
            inner.view.advance(count);
        } else {
            inner.view.clear();
        }
    }

    fn flush(&self) {
        self.inner.lock().view.clear();
    }

    fn with_data<T>(&self, f: impl FnOnce(&[u8]) -> T) -> T {
        let inner = self.inner.lock();
        f(&inner.view[..])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static ASSET: &[u8] = &[1, 2, 3, 4, 5, 6, 7, 8];

    #[test]
    fn test_write_replaces_view() {
        let buffer = ZeroCopyBuffer::new();
        assert_eq!(buffer.write(ASSET), 8);
        assert_eq!(buffer.write(&ASSET[..3]), 3);
        assert_eq!(buffer.with_data(|d| d.to_vec()), vec![1, 2, 3]);
        assert_eq!(buffer.capacity(), 3);
    }

    #[test]
    fn test_shift_advances_view() {
        let buffer = ZeroCopyBuffer::new();
        buffer.write(ASSET);
        buffer.shift_up(5);
        assert_eq!(buffer.with_data(|d| d.to_vec()), vec![6, 7, 8]);
        assert_eq!(buffer.capacity(), 8);
        buffer.shift_up(10);
        assert_eq!(buffer.available(), 0);
    }

    #[test]
    fn test_never_writable() {
        let buffer = ZeroCopyBuffer::new();
        buffer.write(ASSET);
        assert_eq!(buffer.available_for_write(), 0);
        assert_eq!(buffer.write_zero(16), 0);
        assert_eq!(buffer.available(), 8);
    }

    #[test]
    fn test_flush_drops_view() {
        let buffer = ZeroCopyBuffer::new();
        buffer.write(vec![9u8; 32]);
        buffer.flush();
        assert_eq!(buffer.available(), 0);
    }
}
