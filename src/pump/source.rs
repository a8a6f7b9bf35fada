//! Producer-facing source handle and the interrupt-side pump loop.

use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::lock_api::{Mutex, RawMutex};
use tracing::{debug, warn};

use super::{DecoderCursor, FrameGenerator, PumpInput};
use crate::buffer::{DataBuffer, RingBuffer, ZeroCopyBuffer};
use crate::config::SourceConfig;
use crate::device::{ready_callback, DeviceConfig, OutputDevice};
use crate::format::{apply_gain, gain_from_scale, UNITY_GAIN};
use crate::frame::AudioFrame;
use crate::stats::{PlaybackStats, Stats};
use crate::BackgroundAudioError;

/// A background-playing audio source.
///
/// The application writes codec-native bytes; the output device's ready
/// callback drives decoding. Every producer call is non-blocking and returns
/// whatever partial progress was possible.
///
/// `Source` is a cheap handle: clones share the same buffer, decoder and
/// device.
///
/// # Lifecycle
///
/// 1. Create with a generator, buffer and device (or a per-codec constructor
///    such as [`WavPlayer::wav`](crate::WavPlayer))
/// 2. [`begin()`](Self::begin) configures and starts the device
/// 3. Feed bytes with `write()` as space allows
/// 4. [`end()`](Self::end) stops the device
///
/// # Example
///
/// ```
/// use background_audio::{SimulatedOutput, WavPlayer};
///
/// let device = SimulatedOutput::new();
/// let player = WavPlayer::wav(device.clone());
/// player.begin().unwrap();
///
/// let accepted = player.write(b"RIFF");
/// assert_eq!(accepted, 4);
///
/// device.tick(512); // one frame transmitted, the pump refills it
/// assert_eq!(device.transmitted().len(), 512);
/// ```
pub struct Source<G, B, D>
where
    G: FrameGenerator,
    B: DataBuffer,
    D: OutputDevice,
{
    shared: Arc<SourceShared<G, B, D>>,
}

impl<G, B, D> Clone for Source<G, B, D>
where
    G: FrameGenerator,
    B: DataBuffer,
    D: OutputDevice,
{
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

/// State shared between the producer handle and the ready callback.
struct SourceShared<G: FrameGenerator, B: DataBuffer, D: OutputDevice> {
    buffer: B,
    core: Mutex<B::Lock, PumpCore<G, D>>,
    stats: Stats,
    paused: AtomicBool,
    gain: AtomicI32,
    playing: AtomicBool,
    sample_rate: AtomicU32,
    config: SourceConfig,
}

/// Everything only the pump mutates.
struct PumpCore<G, D> {
    generator: G,
    device: D,
    cursor: DecoderCursor,
    frame: AudioFrame,
    sample_rate: u32,
}

impl<G, B, D> Source<G, B, D>
where
    G: FrameGenerator,
    B: DataBuffer,
    D: OutputDevice,
{
    /// Creates a stopped source.
    pub fn new(generator: G, buffer: B, device: D, config: SourceConfig) -> Self {
        let core = PumpCore {
            generator,
            device,
            cursor: DecoderCursor::new(),
            frame: AudioFrame::new(config.frame_len),
            sample_rate: config.initial_sample_rate,
        };
        Self {
            shared: Arc::new(SourceShared {
                buffer,
                core: Mutex::new(core),
                stats: Stats::new(),
                paused: AtomicBool::new(false),
                gain: AtomicI32::new(UNITY_GAIN),
                playing: AtomicBool::new(false),
                sample_rate: AtomicU32::new(config.initial_sample_rate),
                config,
            }),
        }
    }

    /// Configures and starts the output device.
    ///
    /// The device is set up for 16-bit stereo at the initial sample rate with
    /// `buffer_count` frame-sized buffers, the pump is registered as its ready
    /// callback, and the device is pre-filled with silence.
    ///
    /// # Errors
    ///
    /// - [`BackgroundAudioError::AlreadyPlaying`] if already started
    /// - [`BackgroundAudioError::InvalidConfig`] for a zero-sized config
    /// - [`BackgroundAudioError::Device`] if the device rejects the setup
    pub fn begin(&self) -> Result<(), BackgroundAudioError> {
        let shared = &self.shared;
        shared.config.validate()?;

        let mut core = shared.core.lock();
        if shared.playing.load(Ordering::Acquire) {
            return Err(BackgroundAudioError::AlreadyPlaying);
        }

        let device_config = DeviceConfig::stereo16(
            shared.config.initial_sample_rate,
            shared.config.buffer_count,
            shared.config.frame_len,
        );
        core.device.configure(&device_config)?;
        core.sample_rate = shared.config.initial_sample_rate;
        shared
            .sample_rate
            .store(shared.config.initial_sample_rate, Ordering::Relaxed);

        let weak = Arc::downgrade(shared);
        core.device.on_ready(ready_callback(move || {
            if let Some(shared) = weak.upgrade() {
                shared.pump();
            }
        }));
        core.device.start()?;

        let PumpCore { device, frame, .. } = &mut *core;
        frame.silence();
        let threshold = shared.config.prefill_threshold;
        loop {
            let free = device.available_for_write();
            if free <= threshold {
                break;
            }
            let chunk = (free - threshold).min(frame.len());
            if device.write(&frame.as_slice()[..chunk]) == 0 {
                break;
            }
        }

        shared.playing.store(true, Ordering::Release);
        debug!(
            frame_len = shared.config.frame_len,
            buffers = shared.config.buffer_count,
            sample_rate = shared.config.initial_sample_rate,
            "source started"
        );
        Ok(())
    }

    /// Stops the output device. Buffered bytes are kept.
    pub fn end(&self) {
        let mut core = self.shared.core.lock();
        if self.shared.playing.swap(false, Ordering::AcqRel) {
            core.device.stop();
            debug!("source stopped");
        }
    }

    /// Returns `true` between `begin()` and `end()`.
    pub fn playing(&self) -> bool {
        self.shared.playing.load(Ordering::Acquire)
    }

    /// Replaces the output device.
    ///
    /// # Errors
    ///
    /// Returns [`BackgroundAudioError::AlreadyPlaying`] while the source is
    /// playing; call [`end()`](Self::end) first.
    pub fn set_device(&self, device: D) -> Result<(), BackgroundAudioError> {
        let mut core = self.shared.core.lock();
        if self.shared.playing.load(Ordering::Acquire) {
            return Err(BackgroundAudioError::AlreadyPlaying);
        }
        core.device = device;
        Ok(())
    }

    /// Runs one pump burst, exactly as the device's ready callback does.
    ///
    /// Useful with devices that are polled rather than interrupt-driven.
    pub fn pump(&self) {
        self.shared.pump();
    }

    /// Bytes that can be written without truncation.
    pub fn available_for_write(&self) -> usize {
        self.shared.buffer.available_for_write()
    }

    /// Bytes written but not yet consumed by the decoder.
    pub fn available(&self) -> usize {
        let core = self.shared.core.lock();
        self.shared
            .buffer
            .available()
            .saturating_sub(core.cursor.pending())
    }

    /// Discards all buffered input and restarts the decoder.
    ///
    /// Runs under the pump lock: a concurrent pump either finishes first or
    /// sees the fully reset state. Counters are not touched.
    pub fn flush(&self) {
        let mut core = self.shared.core.lock();
        self.shared.buffer.flush();
        core.cursor.reset();
        core.generator.reset();
        debug!("source flushed");
    }

    /// Emits silence instead of decoding. Buffered bytes are kept.
    pub fn pause(&self) {
        self.shared.paused.store(true, Ordering::Relaxed);
    }

    /// Resumes decoding after [`pause()`](Self::pause).
    pub fn unpause(&self) {
        self.shared.paused.store(false, Ordering::Relaxed);
    }

    /// Returns `true` while paused.
    pub fn paused(&self) -> bool {
        self.shared.paused.load(Ordering::Relaxed)
    }

    /// Sets the output scale (1.0 = unchanged).
    ///
    /// Scales above 16.0 may overflow; samples are not saturated.
    pub fn set_gain(&self, scale: f32) {
        self.shared
            .gain
            .store(gain_from_scale(scale), Ordering::Relaxed);
    }

    /// Returns `true` once the decoder has nothing left to play.
    pub fn done(&self) -> bool {
        let core = self.shared.core.lock();
        let available = self
            .shared
            .buffer
            .available()
            .saturating_sub(core.cursor.pending());
        core.generator.done(available)
    }

    /// Last sample rate reported by the stream.
    pub fn sample_rate(&self) -> u32 {
        self.shared.sample_rate.load(Ordering::Relaxed)
    }

    /// Returns a snapshot of all counters.
    pub fn stats(&self) -> PlaybackStats {
        self.shared.stats.snapshot()
    }

    /// Frames produced by the decoder.
    pub fn frames(&self) -> u32 {
        self.stats().frames
    }

    /// Input buffer compactions.
    pub fn shifts(&self) -> u32 {
        self.stats().shifts
    }

    /// Frames due before enough input was available.
    pub fn underflows(&self) -> u32 {
        self.stats().underflows
    }

    /// Decode errors and rejected headers.
    pub fn errors(&self) -> u32 {
        self.stats().errors
    }

    /// Full input discards after failing to find a sync point.
    pub fn dumps(&self) -> u32 {
        self.stats().dumps
    }

    /// Zeroes all counters.
    pub fn reset_stats(&self) {
        self.shared.stats.reset();
    }

    /// Runs `f` with the generator while holding the pump lock.
    pub(crate) fn with_generator<T>(&self, f: impl FnOnce(&G) -> T) -> T {
        let core = self.shared.core.lock();
        f(&core.generator)
    }
}

impl<G, R, D> Source<G, RingBuffer<R>, D>
where
    G: FrameGenerator,
    R: RawMutex + Send + Sync + 'static,
    D: OutputDevice,
{
    /// Appends codec bytes, returning how many fit.
    ///
    /// Files may be concatenated; each decoder resynchronizes at the next
    /// header.
    pub fn write(&self, data: &[u8]) -> usize {
        self.shared.buffer.write(data)
    }
}

impl<G, R, D> Source<G, ZeroCopyBuffer<R>, D>
where
    G: FrameGenerator,
    R: RawMutex + Send + Sync + 'static,
    D: OutputDevice,
{
    /// Plays `data` in place, replacing whatever was playing.
    ///
    /// Returns the length of the new view.
    pub fn write(&self, data: impl Into<Bytes>) -> usize {
        let mut core = self.shared.core.lock();
        core.cursor.reset();
        core.generator.reset();
        let len = self.shared.buffer.write(data);
        debug!(bytes = len, "zero-copy view replaced");
        len
    }
}

impl<G, B, D> SourceShared<G, B, D>
where
    G: FrameGenerator,
    B: DataBuffer,
    D: OutputDevice,
{
    /// Produces frames until the device has no room for another one.
    fn pump(&self) {
        if !self.playing.load(Ordering::Acquire) {
            return;
        }
        let mut core = self.core.lock();
        let PumpCore {
            generator,
            device,
            cursor,
            frame,
            sample_rate,
        } = &mut *core;
        let frame_len = self.config.frame_len;

        while device.available_for_write() >= frame_len {
            frame.clear();
            if self.paused.load(Ordering::Relaxed) {
                frame.silence();
            } else {
                let mut input = PumpInput::new(&self.buffer, cursor, &self.stats);
                if let Some(rate) = generator.generate_one_frame(&mut input, frame) {
                    if rate != *sample_rate {
                        *sample_rate = rate;
                        device.set_sample_rate(rate);
                        self.sample_rate.store(rate, Ordering::Relaxed);
                        debug!(sample_rate = rate, "stream sample rate changed");
                    }
                }
                if frame.is_empty() {
                    frame.silence();
                }
                apply_gain(frame.as_mut_slice(), self.gain.load(Ordering::Relaxed));
            }

            let samples = frame.as_slice();
            let mut offset = 0;
            while offset < samples.len() {
                let written = device.write(&samples[offset..]);
                if written == 0 {
                    warn!(
                        remaining = samples.len() - offset,
                        "output device stopped accepting samples mid-frame"
                    );
                    return;
                }
                offset += written;
            }
        }
    }
}

impl<G, B, D> Drop for SourceShared<G, B, D>
where
    G: FrameGenerator,
    B: DataBuffer,
    D: OutputDevice,
{
    fn drop(&mut self) {
        if *self.playing.get_mut() {
            self.core.get_mut().device.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::SimulatedOutput;
    use crate::frame::StereoSample;

    /// Emits frames of a constant value, one frame per byte consumed.
    struct ByteTone;

    impl FrameGenerator for ByteTone {
        fn generate_one_frame<B: DataBuffer>(
            &mut self,
            input: &mut PumpInput<'_, B>,
            frame: &mut AudioFrame,
        ) -> Option<u32> {
            if let Some(value) = input.with_window(|w| w.first().copied()) {
                input.advance(1);
                input.compact();
                input.stats().record_frame();
                while !frame.is_full() {
                    frame.push_mono(i16::from(value) * 100);
                }
            }
            Some(8000)
        }

        fn reset(&mut self) {}

        fn done(&self, available: usize) -> bool {
            available == 0
        }
    }

    fn config() -> SourceConfig {
        SourceConfig {
            frame_len: 4,
            buffer_count: 2,
            initial_sample_rate: 8000,
            prefill_threshold: 0,
        }
    }

    fn tone_source() -> (Source<ByteTone, RingBuffer, SimulatedOutput>, SimulatedOutput) {
        let device = SimulatedOutput::new();
        let source = Source::new(ByteTone, RingBuffer::new(16), device.clone(), config());
        (source, device)
    }

    fn values(samples: &[StereoSample]) -> Vec<i16> {
        samples.iter().map(|s| s[0]).collect()
    }

    #[test]
    fn test_begin_prefills_silence() {
        let (source, device) = tone_source();
        source.begin().unwrap();
        assert!(source.playing());
        assert_eq!(device.queued(), 8);
        assert_eq!(device.drain(), vec![[0, 0]; 8]);
    }

    #[test]
    fn test_begin_twice_fails() {
        let (source, _device) = tone_source();
        source.begin().unwrap();
        assert!(matches!(
            source.begin(),
            Err(BackgroundAudioError::AlreadyPlaying)
        ));
    }

    #[test]
    fn test_tick_pumps_decoded_frames() {
        let (source, device) = tone_source();
        source.begin().unwrap();
        source.write(&[1, 2]);

        device.tick(4);
        device.tick(4);
        device.tick(4);
        device.tick(4);

        let sent = values(&device.transmitted());
        assert_eq!(&sent[8..], &[100, 100, 100, 100, 200, 200, 200, 200]);
        assert_eq!(source.frames(), 2);
        assert!(source.done());
    }

    #[test]
    fn test_pause_emits_silence_and_keeps_bytes() {
        let (source, device) = tone_source();
        source.begin().unwrap();
        source.write(&[5]);
        source.pause();
        assert!(source.paused());

        device.tick(8);
        device.tick(8);
        assert_eq!(source.available(), 1);
        assert!(values(&device.transmitted()).iter().all(|&v| v == 0));

        source.unpause();
        device.tick(8);
        device.tick(8);
        assert!(values(&device.transmitted()).contains(&500));
        assert_eq!(source.available(), 0);
    }

    #[test]
    fn test_gain_scales_output() {
        let (source, device) = tone_source();
        source.begin().unwrap();
        source.set_gain(0.5);
        source.write(&[4]);

        device.tick(8);
        device.tick(8);
        assert!(values(&device.transmitted()).contains(&200));
    }

    #[test]
    fn test_flush_keeps_counters() {
        let (source, device) = tone_source();
        source.begin().unwrap();
        source.write(&[1, 2, 3]);
        device.tick(4);
        let frames = source.frames();
        assert!(frames > 0);

        source.write(&[9; 8]);
        source.flush();
        assert_eq!(source.available(), 0);
        assert_eq!(source.frames(), frames);

        source.reset_stats();
        assert_eq!(source.stats(), PlaybackStats::default());
    }

    #[test]
    fn test_sample_rate_reported_to_device() {
        let (source, device) = tone_source();
        source.begin().unwrap();
        assert_eq!(source.sample_rate(), 8000);
        assert!(device.rate_changes().is_empty());
    }

    #[test]
    fn test_end_stops_device() {
        let (source, device) = tone_source();
        source.begin().unwrap();
        source.end();
        assert!(!source.playing());
        assert!(!device.is_running());
        assert_eq!(device.tick(4), 0);
    }

    #[test]
    fn test_set_device_only_when_stopped() {
        let (source, _device) = tone_source();
        source.begin().unwrap();
        assert!(source.set_device(SimulatedOutput::new()).is_err());
        source.end();
        assert!(source.set_device(SimulatedOutput::new()).is_ok());
    }

    #[test]
    fn test_drop_stops_device() {
        let (source, device) = tone_source();
        source.begin().unwrap();
        let handle = source.clone();
        drop(source);
        assert!(device.is_running());

        drop(handle);
        assert!(!device.is_running());
        // The callback held only a weak reference
        device.fire_ready();
    }

    #[test]
    fn test_zero_copy_write_replaces_stream() {
        let device = SimulatedOutput::new();
        let source = Source::new(ByteTone, ZeroCopyBuffer::new(), device.clone(), config());
        source.begin().unwrap();

        static FIRST: &[u8] = &[1, 1, 1];
        static SECOND: &[u8] = &[7];
        source.write(FIRST);
        device.tick(4);
        assert_eq!(source.available(), 2);

        assert_eq!(source.write(SECOND), 1);
        assert_eq!(source.available(), 1);
        assert_eq!(source.available_for_write(), 0);
        device.tick(4);
        device.tick(4);
        device.tick(4);
        assert!(values(&device.transmitted()).contains(&700));
    }
}
