//! Compacting byte buffer for codec input.

use parking_lot::lock_api::{Mutex, RawMutex};

use super::{DataBuffer, DefaultRawMutex};

/// A bounded byte buffer with compaction-based reclamation.
///
/// The producer appends at the tail; the consumer discards from the front with
/// [`shift_up`](DataBuffer::shift_up), which moves the remaining bytes down in
/// O(remaining). Decoders normally defer the shift through a pending offset so
/// the move happens rarely (see [`PumpInput`](crate::PumpInput)).
///
/// `available() + available_for_write() == capacity()` at all times.
///
/// # Example
///
/// ```
/// use background_audio::{DataBuffer, RingBuffer};
///
/// let buffer = RingBuffer::new(8);
/// assert_eq!(buffer.write(b"abcdefghij"), 8);
/// buffer.shift_up(3);
/// assert_eq!(buffer.with_data(|d| d.to_vec()), b"defgh");
/// assert_eq!(buffer.available_for_write(), 3);
/// ```
pub struct RingBuffer<R: RawMutex = DefaultRawMutex> {
    inner: Mutex<R, RingInner>,
    capacity: usize,
}

struct RingInner {
    data: Box<[u8]>,
    len: usize,
}

impl RingBuffer {
    /// Creates an empty buffer of `capacity` bytes guarded by the default lock.
    pub fn new(capacity: usize) -> Self {
        Self::with_raw_mutex(capacity)
    }
}

impl<R: RawMutex> RingBuffer<R> {
    /// Creates an empty buffer of `capacity` bytes guarded by `R`.
    pub fn with_raw_mutex(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(RingInner {
                data: vec![0u8; capacity].into_boxed_slice(),
                len: 0,
            }),
            capacity,
        }
    }

    /// Appends as many bytes of `data` as fit, returning the count accepted.
    pub fn write(&self, data: &[u8]) -> usize {
        let mut inner = self.inner.lock();
        let start = inner.len;
        let count = data.len().min(self.capacity - start);
        inner.data[start..start + count].copy_from_slice(&data[..count]);
        inner.len += count;
        count
    }
}

impl<R> DataBuffer for RingBuffer<R>
where
    R: RawMutex + Send + Sync + 'static,
{
    type Lock = R;

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn available(&self) -> usize {
        self.inner.lock().len
    }

    fn available_for_write(&self) -> usize {
        self.capacity - self.inner.lock().len
    }

    fn write_zero(&self, count: usize) -> usize {
        let mut inner = self.inner.lock();
        let start = inner.len;
        let count = count.min(self.capacity - start);
        inner.data[start..start + count].fill(0);
        inner.len += count;
        count
    }

    fn shift_up(&self, count: usize) {
        let mut inner = self.inner.lock();
        if count <= inner.len {
            let len = inner.len;
            inner.data.copy_within(count..len, 0);
            inner.len -= count;
        } else {
            inner.len = 0;
        }
    }

    fn flush(&self) {
        self.inner.lock().len = 0;
    }

    fn with_data<T>(&self, f: impl FnOnce(&[u8]) -> T) -> T {
        let inner = self.inner.lock();
        f(&inner.data[..inner.len])
    }
}
