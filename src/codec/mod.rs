//! Adapters around opaque compressed-audio decoders.
//!
//! The crate never decodes MP3 or AAC itself. A [`CodecDecoder`] wraps
//! whatever decoder the target provides; [`CodecAdapter`] owns the buffering
//! policy around it (sync search, deferred compaction, zero-padding near the
//! end of the stream, silence on errors).

mod adapter;
mod speech;

pub use adapter::{
    AacPlayer, CodecAdapter, CodecPlayer, Mp3Player, RomAacPlayer, RomCodecPlayer, RomMp3Player,
};
pub use speech::{SpeechAdapter, SpeechPlayer, SpeechSynthesizer, SynthStep};

use crate::DecodeError;

/// One frame of PCM produced by a decoder.
#[derive(Debug, Clone, Copy)]
pub struct DecodedFrame<'a> {
    /// Interleaved samples, `channels` per sample frame.
    pub samples: &'a [i16],
    /// 1 (duplicated to stereo) or 2.
    pub channels: u16,
    /// Sample rate of this frame in Hz.
    pub sample_rate: u32,
}

/// A frame-oriented decoder for a compressed elementary stream.
///
/// # Implementation Notes
///
/// - `feed` sees the bytes starting at a sync point and returns how many it
///   consumed; it must not keep references into the window
/// - The window is zero-padded to at least [`min_lookahead`](Self::min_lookahead)
///   bytes near the end of the stream, so the decoder may read that far
///   without checking
/// - Everything runs in interrupt context: no allocation, no blocking
pub trait CodecDecoder: Send + 'static {
    /// Bytes the decoder may read past the start of a frame.
    fn min_lookahead(&self) -> usize;

    /// Offset of the first frame sync point in `window`, if any.
    fn find_sync(&self, window: &[u8]) -> Option<usize>;

    /// Decodes the frame at the start of `window`, returning bytes consumed.
    fn feed(&mut self, window: &[u8]) -> Result<usize, DecodeError>;

    /// PCM of the frame decoded by the last successful [`feed`](Self::feed).
    fn produce_frame(&mut self) -> DecodedFrame<'_>;

    /// Drops any inter-frame state. Called by `flush()`.
    fn reset(&mut self);
}

/// Finds an MPEG audio frame sync: `0xFF` followed by a byte with its top
/// three bits set.
///
/// # Example
///
/// ```
/// use background_audio::mpeg_audio_sync;
///
/// assert_eq!(mpeg_audio_sync(&[0x00, 0xFF, 0xFB, 0x90]), Some(1));
/// assert_eq!(mpeg_audio_sync(&[0xFF, 0x00]), None);
/// ```
pub fn mpeg_audio_sync(window: &[u8]) -> Option<usize> {
    window
        .windows(2)
        .position(|pair| pair[0] == 0xFF && pair[1] & 0xE0 == 0xE0)
}

/// Finds an ADTS header: the 12-bit `0xFFF` syncword with layer 0.
pub fn adts_sync(window: &[u8]) -> Option<usize> {
    window
        .windows(2)
        .position(|pair| pair[0] == 0xFF && pair[1] & 0xF6 == 0xF0)
}
