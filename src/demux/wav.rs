//! RIFF/WAVE demultiplexer.

use byteorder::{ByteOrder, LittleEndian};
use tracing::{debug, trace, warn};

use crate::buffer::{DataBuffer, RingBuffer, ZeroCopyBuffer};
use crate::config::{CodecPreset, DEFAULT_RING_CAPACITY};
use crate::device::OutputDevice;
use crate::format::decode_pcm_sample;
use crate::frame::{AudioFrame, StereoSample};
use crate::pump::{FrameGenerator, PumpInput, Source};
use crate::FormatError;

const RIFF_HEADER_LEN: usize = 12;
const CHUNK_HEADER_LEN: usize = 8;
const FMT_HEADER_LEN: usize = 24;
const PCM_FMT_LEN: u32 = 16;
const FORMAT_PCM: u16 = 1;

/// Ring-buffered WAV player.
pub type WavPlayer<D> = Source<WavDecoder, RingBuffer, D>;

/// WAV player reading an in-memory asset in place.
pub type RomWavPlayer<D> = Source<WavDecoder, ZeroCopyBuffer, D>;

impl<D: OutputDevice> Source<WavDecoder, RingBuffer, D> {
    /// Creates a WAV player with an 8 KiB ring and 512-sample frames.
    pub fn wav(device: D) -> Self {
        Source::new(
            WavDecoder::new(),
            RingBuffer::new(DEFAULT_RING_CAPACITY),
            device,
            CodecPreset::Wav.config(),
        )
    }
}

impl<D: OutputDevice> Source<WavDecoder, ZeroCopyBuffer, D> {
    /// Creates a WAV player over a zero-copy view with 512-sample frames.
    pub fn rom_wav(device: D) -> Self {
        Source::new(
            WavDecoder::new(),
            ZeroCopyBuffer::new(),
            device,
            CodecPreset::Wav.config(),
        )
    }
}

/// PCM layout declared by a `fmt ` chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavFormat {
    /// 1 or 2.
    pub channels: u16,
    /// 4000..=48000 Hz.
    pub sample_rate: u32,
    /// 8 (unsigned) or 16 (signed little-endian).
    pub bits_per_sample: u16,
}

impl WavFormat {
    /// Parses and validates a `fmt ` chunk header, returning the format and
    /// the chunk's declared length.
    ///
    /// `header` starts at the `fmt ` tag and holds at least 24 bytes. Chunks
    /// longer than the 16-byte PCM layout are accepted; the caller skips the
    /// extra bytes.
    pub fn parse(header: &[u8]) -> Result<(Self, u32), FormatError> {
        if header.len() < FMT_HEADER_LEN {
            return Err(FormatError::ChunkTooShort(header.len() as u32));
        }
        let chunk_len = LittleEndian::read_u32(&header[4..8]);
        if chunk_len < PCM_FMT_LEN {
            return Err(FormatError::ChunkTooShort(chunk_len));
        }
        let format_tag = LittleEndian::read_u16(&header[8..10]);
        if format_tag != FORMAT_PCM {
            return Err(FormatError::NotPcm(format_tag));
        }
        let channels = LittleEndian::read_u16(&header[10..12]);
        if !(1..=2).contains(&channels) {
            return Err(FormatError::Channels(channels));
        }
        let sample_rate = LittleEndian::read_u32(&header[12..16]);
        if !(4000..=48000).contains(&sample_rate) {
            return Err(FormatError::SampleRate(sample_rate));
        }
        let bits_per_sample = LittleEndian::read_u16(&header[22..24]);
        if bits_per_sample != 8 && bits_per_sample != 16 {
            return Err(FormatError::BitsPerSample(bits_per_sample));
        }
        Ok((
            Self {
                channels,
                sample_rate,
                bits_per_sample,
            },
            chunk_len,
        ))
    }

    /// Bytes in one sample across all channels.
    pub fn block_align(&self) -> usize {
        usize::from(self.bits_per_sample / 8) * usize::from(self.channels)
    }
}

/// Where a chunk skip returns to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resume {
    Fmt,
    Data,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WavState {
    SeekRiff,
    SeekFmt,
    SeekData,
    Skip { remaining: usize, resume: Resume },
    Streaming { remaining: u32 },
}

impl WavState {
    /// Skips `remaining` bytes, or resumes straight away for an empty chunk.
    fn skip(remaining: usize, resume: Resume) -> Self {
        match (remaining, resume) {
            (0, Resume::Fmt) => WavState::SeekFmt,
            (0, Resume::Data) => WavState::SeekData,
            (remaining, resume) => WavState::Skip { remaining, resume },
        }
    }
}

enum Step {
    Continue,
    NeedMore,
}

/// Streaming WAV parser and PCM decoder.
///
/// Finds `RIFF`/`WAVE`, validates `fmt `, skips unrelated chunks and decodes
/// the `data` chunk one sample at a time into 16-bit stereo. After the data
/// chunk it goes back to searching for `RIFF`, so files can be concatenated.
/// Any unrecognised byte is skipped individually, which makes the parser
/// resynchronize on arbitrary garbage without ever discarding the buffer.
#[derive(Debug, Clone)]
pub struct WavDecoder {
    state: WavState,
    format: Option<WavFormat>,
}

impl Default for WavDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl WavDecoder {
    /// Creates a decoder searching for a RIFF header.
    pub fn new() -> Self {
        Self {
            state: WavState::SeekRiff,
            format: None,
        }
    }

    /// Format of the file being played, once a `fmt ` chunk was accepted.
    pub fn format(&self) -> Option<WavFormat> {
        self.format
    }

    /// Returns `true` while decoding a `data` chunk.
    pub fn streaming(&self) -> bool {
        matches!(self.state, WavState::Streaming { .. })
    }

    fn step<B: DataBuffer>(
        &mut self,
        input: &mut PumpInput<'_, B>,
        frame: &mut AudioFrame,
    ) -> Step {
        let available = input.available();
        match self.state {
            WavState::SeekRiff => {
                if available < 4 {
                    return Step::NeedMore;
                }
                if !input.with_window(|w| &w[..4] == b"RIFF") {
                    input.advance(1);
                    return Step::Continue;
                }
                if available < RIFF_HEADER_LEN {
                    return Step::NeedMore;
                }
                if input.with_window(|w| &w[8..12] == b"WAVE") {
                    input.advance(RIFF_HEADER_LEN);
                    self.state = WavState::SeekFmt;
                } else {
                    input.advance(1);
                }
                Step::Continue
            }
            WavState::SeekFmt => {
                if available < CHUNK_HEADER_LEN {
                    return Step::NeedMore;
                }
                let (tag, len) = input.with_window(chunk_header);
                match &tag {
                    b"RIFF" => self.state = WavState::SeekRiff,
                    b"fmt " => {
                        if available < FMT_HEADER_LEN {
                            return Step::NeedMore;
                        }
                        match input.with_window(|w| WavFormat::parse(&w[..FMT_HEADER_LEN])) {
                            Ok((format, chunk_len)) => {
                                debug!(
                                    channels = format.channels,
                                    sample_rate = format.sample_rate,
                                    bits = format.bits_per_sample,
                                    "wav format"
                                );
                                self.format = Some(format);
                                input.advance(FMT_HEADER_LEN);
                                let extra = (chunk_len - PCM_FMT_LEN) as usize;
                                self.state = WavState::skip(extra, Resume::Data);
                            }
                            Err(err) => {
                                input.stats().record_error();
                                warn!(error = %err, "rejected wav fmt chunk");
                                self.state = WavState::SeekRiff;
                                input.advance(1);
                            }
                        }
                    }
                    _ => {
                        input.advance(CHUNK_HEADER_LEN);
                        self.state = WavState::skip(len as usize, Resume::Fmt);
                    }
                }
                Step::Continue
            }
            WavState::SeekData => {
                if available < CHUNK_HEADER_LEN {
                    return Step::NeedMore;
                }
                let (tag, len) = input.with_window(chunk_header);
                match &tag {
                    b"RIFF" => self.state = WavState::SeekRiff,
                    b"data" => {
                        input.advance(CHUNK_HEADER_LEN);
                        let block = self.format.map_or(0, |f| f.block_align());
                        let samples = if block == 0 { 0 } else { len / block as u32 };
                        self.state = if samples == 0 {
                            WavState::SeekRiff
                        } else {
                            WavState::Streaming { remaining: samples }
                        };
                        debug!(samples, "wav data chunk");
                    }
                    _ => {
                        input.advance(CHUNK_HEADER_LEN);
                        self.state = WavState::skip(len as usize, Resume::Data);
                    }
                }
                Step::Continue
            }
            WavState::Skip { remaining, resume } => {
                let count = remaining.min(available);
                if count == 0 && remaining > 0 {
                    return Step::NeedMore;
                }
                input.advance(count);
                self.state = WavState::skip(remaining - count, resume);
                Step::Continue
            }
            WavState::Streaming { remaining } => {
                let Some(format) = self.format else {
                    self.state = WavState::SeekRiff;
                    return Step::Continue;
                };
                let block = format.block_align();
                if available < block {
                    return Step::NeedMore;
                }
                let Some(sample) = input.with_window(|w| decode_block(&w[..block], format)) else {
                    return Step::NeedMore;
                };
                frame.push(sample);
                input.advance(block);
                self.state = if remaining > 1 {
                    WavState::Streaming {
                        remaining: remaining - 1,
                    }
                } else {
                    debug!("wav data chunk finished");
                    WavState::SeekRiff
                };
                Step::Continue
            }
        }
    }
}

/// Splits a chunk header into its tag and little-endian length.
fn chunk_header(window: &[u8]) -> ([u8; 4], u32) {
    let mut tag = [0u8; 4];
    tag.copy_from_slice(&window[..4]);
    (tag, LittleEndian::read_u32(&window[4..8]))
}

fn decode_block(block: &[u8], format: WavFormat) -> Option<StereoSample> {
    let left = decode_pcm_sample(block, format.bits_per_sample)?;
    if format.channels == 1 {
        return Some([left, left]);
    }
    let width = usize::from(format.bits_per_sample / 8);
    let right = decode_pcm_sample(&block[width..], format.bits_per_sample)?;
    Some([left, right])
}

impl FrameGenerator for WavDecoder {
    fn generate_one_frame<B: DataBuffer>(
        &mut self,
        input: &mut PumpInput<'_, B>,
        frame: &mut AudioFrame,
    ) -> Option<u32> {
        while !frame.is_full() {
            match self.step(input, frame) {
                Step::Continue => {
                    input.compact_if_needed();
                }
                Step::NeedMore => {
                    input.stats().record_underflow();
                    trace!(decoded = frame.len(), "wav input underflow");
                    input.compact();
                    break;
                }
            }
        }
        if !frame.is_empty() {
            input.stats().record_frame();
        }
        frame.fill_silence();
        self.format.map(|f| f.sample_rate)
    }

    fn reset(&mut self) {
        self.state = WavState::SeekRiff;
        self.format = None;
    }

    fn done(&self, available: usize) -> bool {
        available == 0
    }
}
