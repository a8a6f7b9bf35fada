//! Fixed-capacity frame of interleaved stereo PCM.

/// One interleaved stereo sample: `[left, right]`.
///
/// The output device and mixer queues move audio in units of this "word".
pub type StereoSample = [i16; 2];

/// Stereo silence.
pub const SILENCE: StereoSample = [0, 0];

/// A block of 16-bit stereo samples produced by one pump cycle.
///
/// Storage is allocated once at construction. Pushing beyond the capacity is
/// ignored, so filling a frame never allocates in the pump.
///
/// # Example
///
/// ```
/// use background_audio::AudioFrame;
///
/// let mut frame = AudioFrame::new(4);
/// frame.push_mono(100);
/// frame.fill_silence();
/// assert_eq!(frame.as_slice(), &[[100, 100], [0, 0], [0, 0], [0, 0]]);
/// ```
#[derive(Debug, Clone)]
pub struct AudioFrame {
    samples: Vec<StereoSample>,
    capacity: usize,
}

impl AudioFrame {
    /// Creates an empty frame able to hold `capacity` stereo samples.
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Maximum number of stereo samples.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of stereo samples currently in the frame.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Returns `true` if the frame holds no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Returns `true` once the frame holds `capacity` samples.
    pub fn is_full(&self) -> bool {
        self.samples.len() >= self.capacity
    }

    /// Room left before the frame is full.
    pub fn remaining(&self) -> usize {
        self.capacity - self.samples.len()
    }

    /// Empties the frame, keeping its storage.
    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Appends one stereo sample.
    pub fn push(&mut self, sample: StereoSample) {
        if !self.is_full() {
            self.samples.push(sample);
        }
    }

    /// Appends a mono sample, duplicated to both channels.
    pub fn push_mono(&mut self, sample: i16) {
        self.push([sample, sample]);
    }

    /// Appends interleaved samples with `channels` channels.
    ///
    /// Mono input is stereo-ized by duplication. Anything wider than stereo
    /// keeps the first two channels. Returns the number of stereo samples added.
    pub fn extend_interleaved(&mut self, samples: &[i16], channels: u16) -> usize {
        let before = self.len();
        match channels {
            0 => {}
            1 => {
                for &s in samples.iter().take(self.remaining()) {
                    self.push_mono(s);
                }
            }
            n => {
                for pair in samples.chunks_exact(n as usize).take(self.remaining()) {
                    self.push([pair[0], pair[1]]);
                }
            }
        }
        self.len() - before
    }

    /// Zero-fills the rest of the frame.
    pub fn fill_silence(&mut self) {
        self.samples.resize(self.capacity, SILENCE);
    }

    /// Replaces the contents with a full frame of silence.
    pub fn silence(&mut self) {
        self.samples.clear();
        self.fill_silence();
    }

    /// Returns the samples in the frame.
    pub fn as_slice(&self) -> &[StereoSample] {
        &self.samples
    }

    /// Returns the samples in the frame, mutably.
    pub fn as_mut_slice(&mut self) -> &mut [StereoSample] {
        &mut self.samples
    }
}
