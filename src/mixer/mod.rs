//! Sums several sources into one output device.
//!
//! Each [`MixerInput`] poses as an output device to the source feeding it.
//! When the real output wants data, the mixer pulls one block from every
//! input, resampled to the output rate, and writes the saturated sum.
//!
//! ```text
//! Source A ──► MixerInput ─┐
//!                          ├─► Mixer::pump ──► OutputDevice
//! Source B ──► MixerInput ─┘
//! ```

mod input;

pub use input::MixerInput;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::lock_api::{Mutex, RawMutex};
use tracing::{debug, warn};

use crate::buffer::DefaultRawMutex;
use crate::config::MixerConfig;
use crate::device::{ready_callback, DeviceConfig, OutputDevice};
use crate::frame::StereoSample;
use crate::BackgroundAudioError;

/// Largest magnitude a mixed sample is clamped to.
const MIX_LIMIT: i32 = i16::MAX as i32;

/// Mixes any number of sources into one output device.
///
/// Inputs are fixed once the mixer starts. The handle is cheap to clone.
///
/// # Example
///
/// ```
/// use background_audio::{Mixer, MixerConfig, SimulatedOutput, WavPlayer};
///
/// let output = SimulatedOutput::new();
/// let mixer = Mixer::new(output.clone(), MixerConfig::default());
/// let music = WavPlayer::wav(mixer.add_input().unwrap());
/// let effects = WavPlayer::wav(mixer.add_input().unwrap());
///
/// mixer.begin().unwrap();
/// music.begin().unwrap();
/// effects.begin().unwrap();
///
/// output.tick(512);
/// assert_eq!(output.transmitted().len(), 512);
/// ```
pub struct Mixer<D: OutputDevice, R: RawMutex = DefaultRawMutex> {
    shared: Arc<MixerShared<D, R>>,
}

impl<D: OutputDevice, R: RawMutex> Clone for Mixer<D, R> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

struct MixerShared<D: OutputDevice, R: RawMutex> {
    core: Mutex<R, MixerCore<D, R>>,
    running: AtomicBool,
    config: MixerConfig,
}

struct MixerCore<D, R: RawMutex> {
    device: D,
    inputs: Vec<MixerInput<R>>,
    scratch: Vec<StereoSample>,
    sum: Vec<[i32; 2]>,
    block: Vec<StereoSample>,
}

impl<D: OutputDevice> Mixer<D> {
    /// Creates a stopped mixer writing to `device`.
    pub fn new(device: D, config: MixerConfig) -> Self {
        Self::with_raw_mutex(device, config)
    }
}

impl<D, R> Mixer<D, R>
where
    D: OutputDevice,
    R: RawMutex + Send + Sync + 'static,
{
    /// Creates a stopped mixer whose state is guarded by `R`.
    pub fn with_raw_mutex(device: D, config: MixerConfig) -> Self {
        let core = MixerCore {
            device,
            inputs: Vec::new(),
            scratch: vec![config.silence; config.block_len],
            sum: vec![[0, 0]; config.block_len],
            block: vec![config.silence; config.block_len],
        };
        Self {
            shared: Arc::new(MixerShared {
                core: Mutex::new(core),
                running: AtomicBool::new(false),
                config,
            }),
        }
    }

    /// Adds an input and returns the device handle a source should play into.
    ///
    /// # Errors
    ///
    /// Returns [`BackgroundAudioError::MixerRunning`] once `begin()` has been
    /// called.
    pub fn add_input(&self) -> Result<MixerInput<R>, BackgroundAudioError> {
        let mut core = self.shared.core.lock();
        if self.shared.running.load(Ordering::Acquire) {
            return Err(BackgroundAudioError::MixerRunning);
        }
        let input = MixerInput::new(&self.shared.config);
        core.inputs.push(input.clone());
        Ok(input)
    }

    /// Number of inputs.
    pub fn inputs(&self) -> usize {
        self.shared.core.lock().inputs.len()
    }

    /// Configures and starts the output device, then pre-fills it with
    /// silence.
    ///
    /// # Errors
    ///
    /// - [`BackgroundAudioError::AlreadyPlaying`] if already started
    /// - [`BackgroundAudioError::InvalidConfig`] for a zero-sized config
    /// - [`BackgroundAudioError::Device`] if the output rejects the setup
    pub fn begin(&self) -> Result<(), BackgroundAudioError> {
        let shared = &self.shared;
        shared.config.validate()?;

        let mut core = shared.core.lock();
        if shared.running.load(Ordering::Acquire) {
            return Err(BackgroundAudioError::AlreadyPlaying);
        }

        let config = &shared.config;
        let device_config = DeviceConfig {
            silence: config.silence,
            ..DeviceConfig::stereo16(config.output_rate, config.output_buffers, config.block_len)
        };
        core.device.configure(&device_config)?;

        let weak = Arc::downgrade(shared);
        core.device.on_ready(ready_callback(move || {
            if let Some(shared) = weak.upgrade() {
                shared.pump();
            }
        }));
        core.device.start()?;

        let MixerCore { device, block, .. } = &mut *core;
        block.fill(config.silence);
        loop {
            let free = device.available_for_write();
            if free <= config.prefill_threshold {
                break;
            }
            let chunk = (free - config.prefill_threshold).min(block.len());
            if device.write(&block[..chunk]) == 0 {
                break;
            }
        }

        shared.running.store(true, Ordering::Release);
        debug!(
            inputs = core.inputs.len(),
            output_rate = config.output_rate,
            block_len = config.block_len,
            "mixer started"
        );
        Ok(())
    }

    /// Stops the output device. Inputs stay attached.
    pub fn end(&self) {
        let mut core = self.shared.core.lock();
        if self.shared.running.swap(false, Ordering::AcqRel) {
            core.device.stop();
            debug!("mixer stopped");
        }
    }

    /// Returns `true` between `begin()` and `end()`.
    pub fn running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    /// Runs one mix burst, exactly as the output's ready callback does.
    pub fn pump(&self) {
        self.shared.pump();
    }
}

impl<D, R> MixerShared<D, R>
where
    D: OutputDevice,
    R: RawMutex,
{
    /// Mixes blocks until the output has no room for another one.
    fn pump(&self) {
        if !self.running.load(Ordering::Acquire) {
            return;
        }
        let mut core = self.core.lock();
        let MixerCore {
            device,
            inputs,
            scratch,
            sum,
            block,
        } = &mut *core;
        let block_len = self.config.block_len;

        while device.available_for_write() >= block_len {
            sum.fill([0, 0]);
            for input in inputs.iter() {
                input.pull(scratch);
                for (acc, sample) in sum.iter_mut().zip(scratch.iter()) {
                    acc[0] += i32::from(sample[0]);
                    acc[1] += i32::from(sample[1]);
                }
            }
            for (out, acc) in block.iter_mut().zip(sum.iter()) {
                *out = [clamp(acc[0]), clamp(acc[1])];
            }

            let mut offset = 0;
            while offset < block.len() {
                let written = device.write(&block[offset..]);
                if written == 0 {
                    warn!(
                        remaining = block.len() - offset,
                        "mixer output stopped accepting samples mid-block"
                    );
                    return;
                }
                offset += written;
            }
        }
    }
}

impl<D: OutputDevice, R: RawMutex> Drop for MixerShared<D, R> {
    fn drop(&mut self) {
        if *self.running.get_mut() {
            self.core.get_mut().device.stop();
        }
    }
}

/// Saturates a mixed sample to the symmetric 16-bit range.
fn clamp(sample: i32) -> i16 {
    sample.clamp(-MIX_LIMIT, MIX_LIMIT) as i16
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::SimulatedOutput;

    fn small_config() -> MixerConfig {
        MixerConfig {
            block_len: 4,
            output_buffers: 2,
            input_buffers: 2,
            input_buffer_len: 4,
            prefill_threshold: 0,
            ..MixerConfig::default()
        }
    }

    fn started_input(mixer: &Mixer<SimulatedOutput>, len: usize) -> MixerInput {
        let mut input = mixer.add_input().unwrap();
        input
            .configure(&DeviceConfig::stereo16(44100, 4, len))
            .unwrap();
        input.start().unwrap();
        input
    }

    #[test]
    fn test_clamp_is_symmetric() {
        assert_eq!(clamp(40000), 32767);
        assert_eq!(clamp(-40000), -32767);
        assert_eq!(clamp(-32768), -32767);
        assert_eq!(clamp(1234), 1234);
    }

    #[test]
    fn test_sums_inputs() {
        let output = SimulatedOutput::new();
        let mixer = Mixer::new(output.clone(), small_config());
        let mut a = started_input(&mixer, 4);
        let mut b = started_input(&mixer, 4);
        a.write(&[[5000, 5000]; 8]);
        b.write(&[[-4000, -4000]; 8]);
        mixer.begin().unwrap();

        // Prefill first, then two mixed blocks
        for _ in 0..4 {
            output.tick(4);
        }
        let transmitted = output.transmitted();
        assert_eq!(&transmitted[..8], &[[0, 0]; 8]);
        assert_eq!(&transmitted[8..16], &[[1000, 1000]; 8]);
    }

    #[test]
    fn test_sum_saturates() {
        let output = SimulatedOutput::new();
        let mixer = Mixer::new(output.clone(), small_config());
        let mut a = started_input(&mixer, 4);
        let mut b = started_input(&mixer, 4);
        a.write(&[[30000, -30000]; 4]);
        b.write(&[[30000, -30000]; 4]);
        mixer.begin().unwrap();

        output.tick(8);
        output.tick(4);
        assert_eq!(&output.transmitted()[8..12], &[[32767, -32767]; 4]);
    }

    #[test]
    fn test_missing_input_is_silence() {
        let output = SimulatedOutput::new();
        let mixer = Mixer::new(output.clone(), small_config());
        let mut a = started_input(&mixer, 4);
        let b = started_input(&mixer, 4);
        a.write(&[[700, 700]; 8]);
        mixer.begin().unwrap();

        output.tick(8);
        output.tick(4);
        assert_eq!(&output.transmitted()[8..12], &[[700, 700]; 4]);

        let mut b = b;
        assert!(b.take_underflow());
        assert!(!a.take_underflow());
    }

    #[test]
    fn test_inputs_frozen_after_begin() {
        let output = SimulatedOutput::new();
        let mixer = Mixer::new(output, small_config());
        mixer.add_input().unwrap();
        mixer.begin().unwrap();
        assert!(matches!(
            mixer.add_input(),
            Err(BackgroundAudioError::MixerRunning)
        ));
        assert_eq!(mixer.inputs(), 1);
    }

    #[test]
    fn test_begin_prefills_output() {
        let output = SimulatedOutput::new();
        let mixer = Mixer::new(
            output.clone(),
            MixerConfig {
                block_len: 64,
                output_buffers: 2,
                ..MixerConfig::default()
            },
        );
        mixer.begin().unwrap();
        assert!(mixer.running());
        assert_eq!(output.queued(), 128 - 32);
        assert!(matches!(
            mixer.begin(),
            Err(BackgroundAudioError::AlreadyPlaying)
        ));
    }

    #[test]
    fn test_end_stops_output() {
        let output = SimulatedOutput::new();
        let mixer = Mixer::new(output.clone(), small_config());
        mixer.begin().unwrap();
        mixer.end();
        assert!(!mixer.running());
        assert!(!output.is_running());
    }
}
