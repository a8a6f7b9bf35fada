//! Buffering policy shared by compressed-stream decoders.

use tracing::trace;

use super::CodecDecoder;
use crate::buffer::{DataBuffer, RingBuffer, ZeroCopyBuffer};
use crate::config::{CodecPreset, DEFAULT_RING_CAPACITY};
use crate::device::OutputDevice;
use crate::frame::AudioFrame;
use crate::pump::{FrameGenerator, PumpInput, Source};

/// Ring-buffered player around any [`CodecDecoder`].
pub type CodecPlayer<K, D> = Source<CodecAdapter<K>, RingBuffer, D>;

/// Zero-copy player around any [`CodecDecoder`].
pub type RomCodecPlayer<K, D> = Source<CodecAdapter<K>, ZeroCopyBuffer, D>;

/// MP3 elementary stream player; see [`Source::mp3`].
pub type Mp3Player<K, D> = CodecPlayer<K, D>;

/// ADTS AAC stream player; see [`Source::aac`].
pub type AacPlayer<K, D> = CodecPlayer<K, D>;

/// MP3 player over a zero-copy asset.
pub type RomMp3Player<K, D> = RomCodecPlayer<K, D>;

/// AAC player over a zero-copy asset.
pub type RomAacPlayer<K, D> = RomCodecPlayer<K, D>;

impl<K: CodecDecoder, D: OutputDevice> Source<CodecAdapter<K>, RingBuffer, D> {
    /// Creates a player with an 8 KiB ring and the preset's frame length.
    pub fn codec(decoder: K, preset: CodecPreset, device: D) -> Self {
        Source::new(
            CodecAdapter::new(decoder),
            RingBuffer::new(DEFAULT_RING_CAPACITY),
            device,
            preset.config(),
        )
    }

    /// Creates an MP3 player (1152-sample frames).
    pub fn mp3(decoder: K, device: D) -> Self {
        Self::codec(decoder, CodecPreset::Mp3, device)
    }

    /// Creates an AAC player (frames of up to 2048 samples).
    pub fn aac(decoder: K, device: D) -> Self {
        Self::codec(decoder, CodecPreset::Aac, device)
    }
}

impl<K: CodecDecoder, D: OutputDevice> Source<CodecAdapter<K>, ZeroCopyBuffer, D> {
    /// Creates a zero-copy player with the preset's frame length.
    pub fn rom_codec(decoder: K, preset: CodecPreset, device: D) -> Self {
        Source::new(
            CodecAdapter::new(decoder),
            ZeroCopyBuffer::new(),
            device,
            preset.config(),
        )
    }
}

/// Drives a [`CodecDecoder`] from the source buffer.
///
/// Per frame:
///
/// 1. Find the next sync point; with none in the buffer, discard everything
///    (a dump) and play silence
/// 2. Compact once more than half the buffer is consumed
/// 3. Zero-pad to the decoder's lookahead if the stream is running dry
///    (an underflow) so the tail of the stream still decodes
/// 4. Decode one frame; on error skip a single byte, play silence and retry
///    on the next frame
#[derive(Debug)]
pub struct CodecAdapter<K> {
    decoder: K,
    sample_rate: Option<u32>,
}

impl<K: CodecDecoder> CodecAdapter<K> {
    /// Wraps a decoder.
    pub fn new(decoder: K) -> Self {
        Self {
            decoder,
            sample_rate: None,
        }
    }

    /// The wrapped decoder.
    pub fn decoder(&self) -> &K {
        &self.decoder
    }
}

impl<K: CodecDecoder> FrameGenerator for CodecAdapter<K> {
    fn generate_one_frame<B: DataBuffer>(
        &mut self,
        input: &mut PumpInput<'_, B>,
        frame: &mut AudioFrame,
    ) -> Option<u32> {
        if input.available() == 0 {
            input.stats().record_underflow();
            return self.sample_rate;
        }

        let decoder = &mut self.decoder;
        match input.with_window(|w| decoder.find_sync(w)) {
            Some(offset) => input.advance(offset),
            None => {
                input.dump();
                return self.sample_rate;
            }
        }
        input.compact_if_needed();

        let lookahead = decoder.min_lookahead();
        if input.available() < lookahead {
            input.pad_zeros(lookahead);
            input.stats().record_underflow();
            trace!(lookahead, "codec input padded");
        }

        match input.with_window(|w| decoder.feed(w)) {
            Ok(consumed) => {
                // Always make progress
                input.advance(consumed.max(1));
                let decoded = decoder.produce_frame();
                frame.extend_interleaved(decoded.samples, decoded.channels);
                if decoded.sample_rate > 0 {
                    self.sample_rate = Some(decoded.sample_rate);
                }
                input.stats().record_frame();
            }
            Err(err) => {
                input.advance(1);
                input.stats().record_error();
                trace!(error = %err, "codec frame rejected");
            }
        }
        input.compact_if_needed();

        self.sample_rate
    }

    fn reset(&mut self) {
        self.decoder.reset();
    }

    fn done(&self, available: usize) -> bool {
        available <= 2 * self.decoder.min_lookahead()
    }
}
