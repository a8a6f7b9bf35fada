//! # background-audio
//!
//! **Note:** This crate is under active development. The API may change before 1.0.
//!
//! Interrupt-driven audio playback for devices without an audio thread.
//!
//! `background-audio` lets an application hand codec-native bytes (WAV, MP3,
//! AAC, text for speech) to a source with non-blocking writes while decoding
//! runs entirely from the output device's "ready for more" callback. Several
//! sources can be summed through a resampling [`Mixer`].
//!
//! ## Quick Start
//!
//! ```rust
//! use background_audio::{SimulatedOutput, WavPlayer};
//!
//! let device = SimulatedOutput::new();
//! let player = WavPlayer::wav(device.clone());
//! player.begin()?;
//!
//! let file: &[u8] = b"RIFF....WAVEfmt ";
//! let mut offset = 0;
//! while offset < file.len() {
//!     // Never blocks; writes as much as fits
//!     offset += player.write(&file[offset..]);
//!     device.tick(512);
//! }
//!
//! println!("{:?}", player.stats());
//! # Ok::<(), background_audio::BackgroundAudioError>(())
//! ```
//!
//! ## Architecture
//!
//! The crate keeps a strict split between two contexts:
//!
//! - **Producer**: application code calling `write()`, `flush()` and the
//!   getters; every call returns immediately with partial progress
//! - **Pump**: the device's ready callback, which decodes frames from the
//!   [`DataBuffer`] until the device is full
//!
//! Both sides meet at one critical-section primitive per source (a
//! [`lock_api::RawMutex`] supplied by the buffer type). The pump never
//! allocates after `begin()`.

#![warn(missing_docs)]
// Audio code requires intentional numeric casts between sample formats
#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap,
    clippy::cast_lossless
)]
// unwrap/expect allowed in tests only
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]
#![allow(clippy::missing_panics_doc, clippy::missing_errors_doc)]

pub mod buffer;
pub mod codec;
mod config;
pub mod demux;
pub mod device;
mod error;
pub mod format;
mod frame;
pub mod mixer;
pub mod pump;
mod stats;

pub use buffer::{lock_api, DataBuffer, DefaultRawMutex, RingBuffer, ZeroCopyBuffer};
pub use codec::{
    adts_sync, mpeg_audio_sync, AacPlayer, CodecAdapter, CodecDecoder, CodecPlayer, DecodedFrame,
    Mp3Player, RomAacPlayer, RomCodecPlayer, RomMp3Player, SpeechAdapter, SpeechPlayer,
    SpeechSynthesizer, SynthStep,
};
pub use config::{CodecPreset, MixerConfig, SourceConfig, DEFAULT_RING_CAPACITY};
pub use demux::{RomWavPlayer, WavDecoder, WavFormat, WavPlayer};
pub use device::{ready_callback, DeviceConfig, OutputDevice, ReadyCallback, SimulatedOutput};
pub use error::{BackgroundAudioError, DecodeError, DeviceError, FormatError};
pub use format::{
    apply_gain, decode_pcm_sample, gain_from_scale, u8_to_i16, ZeroOrderHold, UNITY_GAIN,
};
pub use frame::{AudioFrame, StereoSample, SILENCE};
pub use mixer::{Mixer, MixerInput};
pub use pump::{DecoderCursor, FrameGenerator, PumpInput, Source};
pub use stats::{PlaybackStats, Stats};
