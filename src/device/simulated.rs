//! Simulated output device for testing without hardware.

use std::sync::Arc;

use parking_lot::Mutex;
use ringbuf::traits::{Consumer, Observer, Producer};
use ringbuf::HeapRb;

use super::{DeviceConfig, OutputDevice, ReadyCallback};
use crate::frame::StereoSample;
use crate::DeviceError;

/// An output device that records what it "transmits".
///
/// Samples written to it queue in a FIFO sized from the configured buffer
/// geometry. [`tick`](Self::tick) plays the role of the DMA-complete
/// interrupt: it moves samples from the FIFO to the transmitted log and then
/// fires the ready callback, exactly as a hardware driver would.
///
/// The handle is cheap to clone; clones share the same device, so a test can
/// keep one while a source owns another.
///
/// # Example
///
/// ```
/// use background_audio::{DeviceConfig, OutputDevice, SimulatedOutput};
///
/// let mut device = SimulatedOutput::new();
/// device.configure(&DeviceConfig::stereo16(44100, 2, 4)).unwrap();
/// device.start().unwrap();
///
/// assert_eq!(device.write(&[[1, 1], [2, 2], [3, 3]]), 3);
/// device.tick(2);
/// assert_eq!(device.transmitted(), vec![[1, 1], [2, 2]]);
/// ```
#[derive(Clone, Default)]
pub struct SimulatedOutput {
    state: Arc<Mutex<SimState>>,
}

#[derive(Default)]
struct SimState {
    fifo: Option<HeapRb<StereoSample>>,
    transmitted: Vec<StereoSample>,
    config: Option<DeviceConfig>,
    sample_rate: u32,
    rate_changes: Vec<u32>,
    running: bool,
    underflow: bool,
    callback: Option<ReadyCallback>,
}

impl SimulatedOutput {
    /// Creates an unconfigured device.
    pub fn new() -> Self {
        Self::default()
    }

    /// Transmits up to `count` queued samples, then fires the ready callback.
    ///
    /// Running short of queued samples sets the underflow flag, as a real
    /// peripheral would when its DMA ring drains. Returns the number sent.
    pub fn tick(&self, count: usize) -> usize {
        let (sent, callback) = {
            let mut state = self.state.lock();
            if !state.running {
                return 0;
            }
            let SimState {
                fifo, transmitted, ..
            } = &mut *state;
            let mut sent = 0;
            if let Some(fifo) = fifo.as_mut() {
                while sent < count {
                    let Some(sample) = fifo.try_pop() else {
                        break;
                    };
                    transmitted.push(sample);
                    sent += 1;
                }
            }
            if sent < count {
                state.underflow = true;
            }
            (sent, state.callback.clone())
        };

        if let Some(callback) = callback {
            callback();
        }
        sent
    }

    /// Fires the ready callback without transmitting anything.
    pub fn fire_ready(&self) {
        let callback = self.state.lock().callback.clone();
        if let Some(callback) = callback {
            callback();
        }
    }

    /// Removes and returns everything still queued, without firing callbacks.
    pub fn drain(&self) -> Vec<StereoSample> {
        let mut state = self.state.lock();
        match state.fifo.as_mut() {
            Some(fifo) => fifo.pop_iter().collect(),
            None => Vec::new(),
        }
    }

    /// Returns a copy of every sample transmitted so far.
    pub fn transmitted(&self) -> Vec<StereoSample> {
        self.state.lock().transmitted.clone()
    }

    /// Takes the transmitted log, leaving it empty.
    pub fn take_transmitted(&self) -> Vec<StereoSample> {
        std::mem::take(&mut self.state.lock().transmitted)
    }

    /// Number of samples queued but not yet transmitted.
    pub fn queued(&self) -> usize {
        self.state
            .lock()
            .fifo
            .as_ref()
            .map_or(0, |fifo| fifo.occupied_len())
    }

    /// Current transmit sample rate.
    pub fn sample_rate(&self) -> u32 {
        self.state.lock().sample_rate
    }

    /// Every rate passed to `set_sample_rate`, in order.
    pub fn rate_changes(&self) -> Vec<u32> {
        self.state.lock().rate_changes.clone()
    }

    /// Configuration applied by the owner, if any.
    pub fn config(&self) -> Option<DeviceConfig> {
        self.state.lock().config
    }

    /// Returns `true` between `start()` and `stop()`.
    pub fn is_running(&self) -> bool {
        self.state.lock().running
    }
}

impl OutputDevice for SimulatedOutput {
    fn configure(&mut self, config: &DeviceConfig) -> Result<(), DeviceError> {
        config.check_format()?;
        let mut state = self.state.lock();
        if state.running {
            return Err(DeviceError::AlreadyRunning);
        }
        state.fifo = Some(HeapRb::new(config.total_len().max(1)));
        state.sample_rate = config.sample_rate;
        state.config = Some(*config);
        Ok(())
    }

    fn set_sample_rate(&mut self, rate: u32) {
        let mut state = self.state.lock();
        if state.sample_rate != rate {
            state.sample_rate = rate;
            state.rate_changes.push(rate);
        }
    }

    fn start(&mut self) -> Result<(), DeviceError> {
        let mut state = self.state.lock();
        if state.running {
            return Err(DeviceError::AlreadyRunning);
        }
        if state.fifo.is_none() {
            return Err(DeviceError::Backend("start before configure".into()));
        }
        state.running = true;
        Ok(())
    }

    fn stop(&mut self) {
        self.state.lock().running = false;
    }

    fn available_for_write(&self) -> usize {
        self.state
            .lock()
            .fifo
            .as_ref()
            .map_or(0, |fifo| fifo.vacant_len())
    }

    fn write(&mut self, samples: &[StereoSample]) -> usize {
        match self.state.lock().fifo.as_mut() {
            Some(fifo) => fifo.push_slice(samples),
            None => 0,
        }
    }

    fn on_ready(&mut self, callback: ReadyCallback) {
        self.state.lock().callback = Some(callback);
    }

    fn take_underflow(&mut self) -> bool {
        std::mem::take(&mut self.state.lock().underflow)
    }
}
