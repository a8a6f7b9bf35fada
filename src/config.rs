//! Configuration types for sources and mixers.

use crate::frame::StereoSample;
use crate::BackgroundAudioError;

/// Capacity of the default producer ring buffer, in bytes.
pub const DEFAULT_RING_CAPACITY: usize = 8 * 1024;

/// Preset frame geometry for the built-in adapters.
///
/// Each codec produces frames of its natural length so the output device can
/// be sized to match and no re-blocking is needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CodecPreset {
    /// RIFF/WAVE PCM, 512 samples per frame.
    #[default]
    Wav,

    /// MPEG audio layer III, 1152 samples per frame.
    Mp3,

    /// ADTS AAC, up to 2048 samples per frame (SBR doubles the 1024 core).
    Aac,

    /// Speech synthesis, up to 1324 samples per step.
    Speech,
}

impl CodecPreset {
    /// Returns the maximum number of stereo samples in one frame.
    #[must_use]
    pub fn frame_len(&self) -> usize {
        match self {
            Self::Wav => 512,
            Self::Mp3 => 1152,
            Self::Aac => 2048,
            Self::Speech => 1324,
        }
    }

    /// Returns the source configuration for this preset.
    #[must_use]
    pub fn config(&self) -> SourceConfig {
        SourceConfig {
            frame_len: self.frame_len(),
            ..Default::default()
        }
    }
}

/// Configuration for a decoding source.
///
/// # Example
///
/// ```
/// use background_audio::SourceConfig;
///
/// let config = SourceConfig {
///     frame_len: 256,
///     ..Default::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct SourceConfig {
    /// Stereo samples per frame handed to the output device.
    ///
    /// The pump only runs while the device reports at least this much room.
    /// Default: 512
    pub frame_len: usize,

    /// Number of frame-sized buffers requested from the output device.
    ///
    /// Default: 5
    pub buffer_count: usize,

    /// Sample rate the device is started at, before the stream reports one.
    ///
    /// Default: 44100
    pub initial_sample_rate: u32,

    /// The device is pre-filled with silence while it reports more than this
    /// many free samples.
    ///
    /// Default: 32
    pub prefill_threshold: usize,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            frame_len: CodecPreset::Wav.frame_len(),
            buffer_count: 5,
            initial_sample_rate: 44100,
            prefill_threshold: 32,
        }
    }
}

impl SourceConfig {
    /// Checks the configuration for values the pump cannot run with.
    pub fn validate(&self) -> Result<(), BackgroundAudioError> {
        if self.frame_len == 0 {
            return Err(BackgroundAudioError::invalid_config("frame_len must be > 0"));
        }
        if self.buffer_count == 0 {
            return Err(BackgroundAudioError::invalid_config(
                "buffer_count must be > 0",
            ));
        }
        if self.initial_sample_rate == 0 {
            return Err(BackgroundAudioError::invalid_config(
                "initial_sample_rate must be > 0",
            ));
        }
        Ok(())
    }
}

/// Configuration for a [`Mixer`](crate::Mixer).
#[derive(Debug, Clone)]
pub struct MixerConfig {
    /// Output sample rate every input is resampled to.
    ///
    /// Default: 44100
    pub output_rate: u32,

    /// Stereo samples summed per mixer cycle.
    ///
    /// Default: 512
    pub block_len: usize,

    /// Number of block-sized buffers requested from the output device.
    ///
    /// Default: 4
    pub output_buffers: usize,

    /// Buffers in each input's pool until the feeding source reconfigures it.
    ///
    /// Default: 5
    pub input_buffers: usize,

    /// Stereo samples per input pool buffer until reconfigured.
    ///
    /// Default: 2048
    pub input_buffer_len: usize,

    /// Sample substituted when an input has nothing queued.
    ///
    /// Default: silence
    pub silence: StereoSample,

    /// The output is pre-filled with silence while it reports more than this
    /// many free samples.
    ///
    /// Default: 32
    pub prefill_threshold: usize,
}

impl Default for MixerConfig {
    fn default() -> Self {
        Self {
            output_rate: 44100,
            block_len: 512,
            output_buffers: 4,
            input_buffers: 5,
            input_buffer_len: 2048,
            silence: [0, 0],
            prefill_threshold: 32,
        }
    }
}

impl MixerConfig {
    /// Checks the configuration for values the mixer cannot run with.
    pub fn validate(&self) -> Result<(), BackgroundAudioError> {
        if self.output_rate == 0 {
            return Err(BackgroundAudioError::invalid_config("output_rate must be > 0"));
        }
        if self.block_len == 0 || self.output_buffers == 0 {
            return Err(BackgroundAudioError::invalid_config(
                "block_len and output_buffers must be > 0",
            ));
        }
        if self.input_buffers == 0 || self.input_buffer_len == 0 {
            return Err(BackgroundAudioError::invalid_config(
                "input pool must hold at least one sample",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codec_preset_frame_lengths() {
        assert_eq!(CodecPreset::Wav.frame_len(), 512);
        assert_eq!(CodecPreset::Mp3.frame_len(), 1152);
        assert_eq!(CodecPreset::Aac.frame_len(), 2048);
        assert_eq!(CodecPreset::Speech.frame_len(), 1324);
    }

    #[test]
    fn test_codec_preset_default() {
        assert_eq!(CodecPreset::default(), CodecPreset::Wav);
    }

    #[test]
    fn test_preset_config_keeps_defaults() {
        let config = CodecPreset::Mp3.config();
        assert_eq!(config.frame_len, 1152);
        assert_eq!(config.buffer_count, 5);
        assert_eq!(config.initial_sample_rate, 44100);
    }

    #[test]
    fn test_source_config_rejects_zero_frame() {
        let config = SourceConfig {
            frame_len: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_mixer_config_defaults() {
        let config = MixerConfig::default();
        assert_eq!(config.output_rate, 44100);
        assert_eq!(config.block_len, 512);
        assert_eq!(config.output_buffers, 4);
        assert_eq!(config.input_buffers, 5);
        assert_eq!(config.input_buffer_len, 2048);
        assert_eq!(config.silence, [0, 0]);
        assert!(config.validate().is_ok());
    }
}
