//! One mixer leg: buffers a source's output and resamples it for the mixer.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::lock_api::{Mutex, RawMutex};
use tracing::trace;

use crate::buffer::DefaultRawMutex;
use crate::config::MixerConfig;
use crate::device::{DeviceConfig, OutputDevice, ReadyCallback};
use crate::format::ZeroOrderHold;
use crate::frame::StereoSample;
use crate::DeviceError;

/// A mixer input that looks like an output device to the source feeding it.
///
/// Samples written by the source fill fixed-size buffers drawn from a pool
/// allocated at `start()`. Full buffers queue for the mixer; when no empty
/// buffer is left, writes are truncated. The mixer pulls blocks at its own
/// rate through a zero-order-hold cursor and returns drained buffers to the
/// pool, firing the source's ready callback each time one frees up.
///
/// The handle is cheap to clone; the [`Mixer`](crate::Mixer) keeps one clone
/// and the feeding source owns another as its device.
pub struct MixerInput<R: RawMutex = DefaultRawMutex> {
    shared: Arc<InputShared<R>>,
}

impl<R: RawMutex> Clone for MixerInput<R> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

struct InputShared<R: RawMutex> {
    state: Mutex<R, InputState>,
    in_callback: AtomicBool,
}

struct InputState {
    pool: Vec<Box<[StereoSample]>>,
    filled: VecDeque<usize>,
    empty: VecDeque<usize>,
    buffer_count: usize,
    buffer_len: usize,
    user_off: usize,
    hold: ZeroOrderHold,
    input_rate: u32,
    output_rate: u32,
    silence: StereoSample,
    running: bool,
    underflow: bool,
    callback: Option<ReadyCallback>,
}

impl<R: RawMutex> MixerInput<R> {
    /// Creates a stopped input with the mixer's default pool geometry.
    pub(crate) fn new(config: &MixerConfig) -> Self {
        Self {
            shared: Arc::new(InputShared {
                state: Mutex::new(InputState {
                    pool: Vec::new(),
                    filled: VecDeque::new(),
                    empty: VecDeque::new(),
                    buffer_count: config.input_buffers,
                    buffer_len: config.input_buffer_len,
                    user_off: 0,
                    hold: ZeroOrderHold::new(config.output_rate, config.output_rate),
                    input_rate: config.output_rate,
                    output_rate: config.output_rate,
                    silence: config.silence,
                    running: false,
                    underflow: false,
                    callback: None,
                }),
                in_callback: AtomicBool::new(false),
            }),
        }
    }

    /// Sample rate the feeding source last reported.
    pub fn input_rate(&self) -> u32 {
        self.shared.state.lock().input_rate
    }

    /// Returns `true` between `start()` and `stop()`.
    pub fn is_running(&self) -> bool {
        self.shared.state.lock().running
    }

    /// Fills `out` with the next block at the mixer's rate.
    ///
    /// Primes the source first if nothing is queued. Each buffer drained along
    /// the way goes back to the pool and fires the ready callback, with the
    /// input unlocked. If the queue runs dry, the rest of `out` is silence and
    /// the underflow flag is set.
    pub fn pull(&self, out: &mut [StereoSample]) {
        let starving = self.shared.state.lock().filled.is_empty();
        if starving {
            self.fire_ready();
        }

        let mut written = 0;
        while written < out.len() {
            let recycled = {
                let mut guard = self.shared.state.lock();
                let state = &mut *guard;
                let Some(&index) = state.filled.front() else {
                    out[written..].fill(state.silence);
                    state.underflow = true;
                    trace!(missing = out.len() - written, "mixer input underflow");
                    return;
                };

                let buffer = &state.pool[index];
                let mut recycled = false;
                while written < out.len() {
                    let position = state.hold.index();
                    if position >= state.buffer_len {
                        state.filled.pop_front();
                        state.empty.push_back(index);
                        state.hold.rebase(state.buffer_len);
                        recycled = true;
                        break;
                    }
                    out[written] = buffer[position];
                    written += 1;
                    state.hold.advance();
                }
                recycled
            };

            if recycled {
                self.fire_ready();
            }
        }
    }

    /// Invokes the ready callback unless one is already running on this input.
    fn fire_ready(&self) {
        let Some(callback) = self.shared.state.lock().callback.clone() else {
            return;
        };
        if self.shared.in_callback.swap(true, Ordering::Acquire) {
            return;
        }
        callback();
        self.shared.in_callback.store(false, Ordering::Release);
    }
}

impl<R> OutputDevice for MixerInput<R>
where
    R: RawMutex + Send + Sync + 'static,
{
    fn configure(&mut self, config: &DeviceConfig) -> Result<(), DeviceError> {
        config.check_format()?;
        let mut state = self.shared.state.lock();
        if state.running {
            return Err(DeviceError::AlreadyRunning);
        }
        if config.buffer_count == 0 || config.buffer_len == 0 {
            return Err(DeviceError::Backend("empty mixer input pool".into()));
        }
        state.buffer_count = config.buffer_count;
        state.buffer_len = config.buffer_len;
        state.silence = config.silence;
        state.input_rate = config.sample_rate;
        let output_rate = state.output_rate;
        state.hold.set_rates(config.sample_rate, output_rate);
        Ok(())
    }

    fn set_sample_rate(&mut self, rate: u32) {
        let mut state = self.shared.state.lock();
        if state.input_rate != rate {
            state.input_rate = rate;
            let output_rate = state.output_rate;
            state.hold.set_rates(rate, output_rate);
        }
    }

    fn start(&mut self) -> Result<(), DeviceError> {
        let mut state = self.shared.state.lock();
        if state.running {
            return Err(DeviceError::AlreadyRunning);
        }
        let (count, len, silence) = (state.buffer_count, state.buffer_len, state.silence);
        state.pool = (0..count)
            .map(|_| vec![silence; len].into_boxed_slice())
            .collect();
        state.empty = (0..count).collect();
        state.filled = VecDeque::with_capacity(count);
        state.user_off = 0;
        state.hold.reset();
        state.underflow = false;
        state.running = true;
        Ok(())
    }

    fn stop(&mut self) {
        self.shared.state.lock().running = false;
    }

    fn available_for_write(&self) -> usize {
        let state = self.shared.state.lock();
        if !state.running || state.empty.is_empty() {
            return 0;
        }
        state.empty.len() * state.buffer_len - state.user_off
    }

    fn write(&mut self, samples: &[StereoSample]) -> usize {
        let mut guard = self.shared.state.lock();
        let state = &mut *guard;
        if !state.running {
            return 0;
        }
        let mut written = 0;
        while written < samples.len() {
            let Some(&index) = state.empty.front() else {
                break;
            };
            let count = (state.buffer_len - state.user_off).min(samples.len() - written);
            let start = state.user_off;
            state.pool[index][start..start + count]
                .copy_from_slice(&samples[written..written + count]);
            written += count;
            state.user_off += count;
            if state.user_off == state.buffer_len {
                state.empty.pop_front();
                state.filled.push_back(index);
                state.user_off = 0;
            }
        }
        written
    }

    fn on_ready(&mut self, callback: ReadyCallback) {
        self.shared.state.lock().callback = Some(callback);
    }

    fn take_underflow(&mut self) -> bool {
        std::mem::take(&mut self.shared.state.lock().underflow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::ready_callback;
    use std::sync::atomic::AtomicUsize;

    fn started(input_rate: u32, buffers: usize, len: usize) -> MixerInput {
        let mut input = MixerInput::new(&MixerConfig::default());
        input
            .configure(&DeviceConfig::stereo16(input_rate, buffers, len))
            .unwrap();
        input.start().unwrap();
        input
    }

    fn ramp(len: i16) -> Vec<StereoSample> {
        (1..=len).map(|i| [i, -i]).collect()
    }

    #[test]
    fn test_write_fills_buffers_then_truncates() {
        let mut input = started(44100, 2, 4);
        assert_eq!(input.available_for_write(), 8);
        assert_eq!(input.write(&ramp(3)), 3);
        assert_eq!(input.available_for_write(), 5);
        assert_eq!(input.write(&ramp(10)), 5);
        assert_eq!(input.available_for_write(), 0);
    }

    #[test]
    fn test_not_writable_before_start() {
        let mut input: MixerInput = MixerInput::new(&MixerConfig::default());
        assert_eq!(input.available_for_write(), 0);
        assert_eq!(input.write(&ramp(4)), 0);
    }

    #[test]
    fn test_same_rate_passthrough() {
        let mut input = started(44100, 4, 4);
        input.write(&ramp(12));

        let mut out = vec![[0, 0]; 6];
        input.pull(&mut out);
        assert_eq!(out, ramp(6));
        input.pull(&mut out);
        assert_eq!(out, ramp(12)[6..].to_vec());
        assert!(!input.take_underflow());
    }

    #[test]
    fn test_half_rate_holds_each_sample_twice() {
        let mut input = started(22050, 4, 32);
        input.write(&ramp(128));

        let mut output = Vec::new();
        let mut block = vec![[0, 0]; 64];
        for _ in 0..4 {
            input.pull(&mut block);
            output.extend_from_slice(&block);
        }

        let expected: Vec<StereoSample> = ramp(128).into_iter().flat_map(|s| [s, s]).collect();
        assert_eq!(output, expected);
        assert!(!input.take_underflow());
    }

    #[test]
    fn test_underflow_substitutes_silence() {
        let mut input = started(44100, 2, 4);
        input.write(&ramp(4));

        let mut out = vec![[9, 9]; 6];
        input.pull(&mut out);
        assert_eq!(&out[..4], &ramp(4)[..]);
        assert_eq!(&out[4..], &[[0, 0], [0, 0]]);
        assert!(input.take_underflow());
        assert!(!input.take_underflow());
    }

    #[test]
    fn test_drained_buffer_returns_to_pool() {
        let mut input = started(44100, 2, 4);
        input.write(&ramp(8));
        assert_eq!(input.available_for_write(), 0);

        let mut out = vec![[0, 0]; 5];
        input.pull(&mut out);
        assert_eq!(input.available_for_write(), 4);
    }

    #[test]
    fn test_prime_on_pull_calls_source() {
        let mut input = started(44100, 2, 4);
        let calls = Arc::new(AtomicUsize::new(0));
        let feeder = input.clone();
        let calls_clone = calls.clone();
        input.on_ready(ready_callback(move || {
            let mut feeder = feeder.clone();
            let n = calls_clone.fetch_add(1, Ordering::SeqCst) as i16;
            feeder.write(&[[n, n]; 4]);
        }));

        let mut out = vec![[9, 9]; 4];
        input.pull(&mut out);
        assert_eq!(out, vec![[0, 0]; 4]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // Draining the first buffer asks for another
        input.pull(&mut out);
        assert_eq!(out, vec![[1, 1]; 4]);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_nested_pull_does_not_recurse() {
        let mut input = started(44100, 2, 4);
        let calls = Arc::new(AtomicUsize::new(0));
        let inner = input.clone();
        let calls_clone = calls.clone();
        input.on_ready(ready_callback(move || {
            calls_clone.fetch_add(1, Ordering::SeqCst);
            let mut scratch = [[0, 0]; 4];
            inner.pull(&mut scratch);
        }));

        let mut out = [[0, 0]; 4];
        input.pull(&mut out);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_configure_rejected_while_running() {
        let mut input = started(44100, 2, 4);
        assert_eq!(
            input.configure(&DeviceConfig::stereo16(8000, 2, 4)),
            Err(DeviceError::AlreadyRunning)
        );
        input.stop();
        assert!(input.configure(&DeviceConfig::stereo16(8000, 2, 4)).is_ok());
        assert_eq!(input.input_rate(), 8000);
    }
}
