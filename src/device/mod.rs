//! Output device abstraction.
//!
//! An [`OutputDevice`] is whatever transmits PCM on a fixed schedule: an I2S,
//! PDM or PWM peripheral, a host audio callback, or a [`MixerInput`] feeding a
//! [`Mixer`]. The device tells its owner when room frees up by invoking the
//! registered [`ReadyCallback`], typically from interrupt context; the owner
//! then pumps frames until the device reports no more space.
//!
//! [`MixerInput`]: crate::MixerInput
//! [`Mixer`]: crate::Mixer

mod simulated;

pub use simulated::SimulatedOutput;

use std::sync::Arc;

use crate::frame::{StereoSample, SILENCE};
use crate::DeviceError;

/// Callback invoked by a device whenever it has room for more samples.
///
/// # Example
///
/// ```
/// use background_audio::ready_callback;
///
/// let callback = ready_callback(|| {
///     // pump the source here
/// });
/// callback();
/// ```
pub type ReadyCallback = Arc<dyn Fn() + Send + Sync>;

/// Creates a [`ReadyCallback`] from a closure.
pub fn ready_callback<F>(f: F) -> ReadyCallback
where
    F: Fn() + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Transmit parameters requested by a source or mixer before `start()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceConfig {
    /// Initial sample rate in Hz.
    pub sample_rate: u32,
    /// Bits per sample; only 16 is produced by this crate.
    pub bits_per_sample: u8,
    /// Channel count; only stereo is produced by this crate.
    pub channels: u16,
    /// Number of transmit buffers.
    pub buffer_count: usize,
    /// Stereo samples per transmit buffer.
    pub buffer_len: usize,
    /// Sample the device emits when it runs dry.
    pub silence: StereoSample,
}

impl DeviceConfig {
    /// Creates a 16-bit stereo configuration.
    pub fn stereo16(sample_rate: u32, buffer_count: usize, buffer_len: usize) -> Self {
        Self {
            sample_rate,
            bits_per_sample: 16,
            channels: 2,
            buffer_count,
            buffer_len,
            silence: SILENCE,
        }
    }

    /// Total stereo samples the device can hold.
    pub fn total_len(&self) -> usize {
        self.buffer_count * self.buffer_len
    }

    /// Rejects formats other than 16-bit stereo.
    pub fn check_format(&self) -> Result<(), DeviceError> {
        if self.bits_per_sample != 16 {
            return Err(DeviceError::UnsupportedBitDepth(self.bits_per_sample));
        }
        if self.channels != 2 {
            return Err(DeviceError::UnsupportedChannels(self.channels));
        }
        Ok(())
    }
}

/// A destination for interleaved 16-bit stereo PCM.
///
/// All methods are non-blocking. `write` may accept fewer samples than
/// offered; callers retry with the rest once the device reports room.
///
/// # Implementation Notes
///
/// - `configure` is called once before `start`; `set_sample_rate` may follow
///   at any time, including from the ready callback
/// - Never invoke the ready callback from inside `write` or
///   `available_for_write`: the caller holds its pump lock there
pub trait OutputDevice: Send + 'static {
    /// Applies buffer geometry and format. Called before [`start`](Self::start).
    fn configure(&mut self, config: &DeviceConfig) -> Result<(), DeviceError>;

    /// Changes the transmit sample rate.
    fn set_sample_rate(&mut self, rate: u32);

    /// Starts transmission.
    fn start(&mut self) -> Result<(), DeviceError>;

    /// Stops transmission.
    fn stop(&mut self);

    /// Stereo samples that can be written without being truncated.
    fn available_for_write(&self) -> usize;

    /// Queues samples, returning how many were accepted.
    fn write(&mut self, samples: &[StereoSample]) -> usize;

    /// Registers the callback fired when room becomes available.
    fn on_ready(&mut self, callback: ReadyCallback);

    /// Returns and clears the device's underflow flag.
    fn take_underflow(&mut self) -> bool {
        false
    }
}
