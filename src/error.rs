//! Error types for background-audio.
//!
//! Errors are split into two categories:
//! - **Setup errors** ([`BackgroundAudioError`], [`DeviceError`]): returned when a
//!   source, mixer or device cannot be configured or started
//! - **Stream conditions** ([`FormatError`], [`DecodeError`]): produced while
//!   decoding, never returned to the producer. The pump turns them into silence
//!   and bumps a counter in [`PlaybackStats`](crate::PlaybackStats)

/// Fatal errors that prevent a source or mixer from starting.
#[derive(Debug, thiserror::Error)]
pub enum BackgroundAudioError {
    /// `begin()` was called on a source that is already playing.
    #[error("source is already playing")]
    AlreadyPlaying,

    /// The mixer topology is frozen once the mixer has started.
    #[error("mixer is running - inputs must be added before begin()")]
    MixerRunning,

    /// A configuration value is out of range.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// What was wrong with the configuration.
        reason: String,
    },

    /// The output device refused the configuration or failed to start.
    #[error("output device error: {0}")]
    Device(#[from] DeviceError),
}

impl BackgroundAudioError {
    /// Creates an invalid configuration error with the given reason.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }
}

/// Errors reported by an [`OutputDevice`](crate::OutputDevice).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeviceError {
    /// Only 16-bit samples are supported.
    #[error("unsupported bit depth: {0}")]
    UnsupportedBitDepth(u8),

    /// Only stereo output is supported.
    #[error("unsupported channel count: {0}")]
    UnsupportedChannels(u16),

    /// The device was already started.
    #[error("device already running")]
    AlreadyRunning,

    /// Error from the underlying transmit driver.
    #[error("backend error: {0}")]
    Backend(String),
}

/// Reasons a WAV `fmt ` chunk is rejected.
///
/// A rejected header restarts the RIFF search one byte further on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    /// The chunk is shorter than a PCM format block.
    #[error("fmt chunk too short: {0} bytes")]
    ChunkTooShort(u32),

    /// Compressed or extensible formats are not played.
    #[error("not PCM (format tag {0})")]
    NotPcm(u16),

    /// Mono or stereo only.
    #[error("unsupported channel count: {0}")]
    Channels(u16),

    /// Outside 4000..=48000 Hz.
    #[error("unsupported sample rate: {0}Hz")]
    SampleRate(u32),

    /// 8 or 16 bits only.
    #[error("unsupported bits per sample: {0}")]
    BitsPerSample(u16),
}

/// A codec rejected the bytes at the current sync point.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The frame header at the sync point is invalid.
    #[error("bad frame header")]
    BadHeader,

    /// The frame body failed to decode.
    #[error("corrupt frame: {0}")]
    Corrupt(String),

    /// The decoder needs more bytes than the window holds.
    #[error("truncated frame")]
    Truncated,
}
