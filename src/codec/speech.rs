//! Text-to-speech source over NUL-terminated strings.

use parking_lot::lock_api::RawMutex;
use tracing::{debug, warn};

use crate::buffer::{DataBuffer, RingBuffer};
use crate::config::{CodecPreset, SourceConfig, DEFAULT_RING_CAPACITY};
use crate::device::OutputDevice;
use crate::frame::AudioFrame;
use crate::pump::{FrameGenerator, PumpInput, Source};

/// Ring-buffered speech player.
pub type SpeechPlayer<S, D> = Source<SpeechAdapter<S>, RingBuffer, D>;

/// Result of one synthesis step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SynthStep {
    /// Mono samples written to the output slice.
    pub samples: usize,
    /// `true` once the current text has been fully spoken.
    pub finished: bool,
}

/// A step-wise speech synthesizer.
///
/// The adapter calls [`begin`](Self::begin) with one complete string, then
/// [`step`](Self::step) once per frame until it reports `finished`.
pub trait SpeechSynthesizer: Send + 'static {
    /// Output sample rate in Hz.
    fn sample_rate(&self) -> u32;

    /// Starts synthesizing `text`.
    fn begin(&mut self, text: &str);

    /// Writes the next block of mono samples into `out`.
    fn step(&mut self, out: &mut [i16]) -> SynthStep;

    /// Abandons the current text.
    fn abort(&mut self);
}

impl<S: SpeechSynthesizer, D: OutputDevice> Source<SpeechAdapter<S>, RingBuffer, D> {
    /// Creates a speech player with an 8 KiB ring and 1324-sample frames.
    pub fn speech(synthesizer: S, device: D) -> Self {
        let config = SourceConfig {
            initial_sample_rate: synthesizer.sample_rate(),
            ..CodecPreset::Speech.config()
        };
        Source::new(
            SpeechAdapter::new(synthesizer, config.frame_len),
            RingBuffer::new(DEFAULT_RING_CAPACITY),
            device,
            config,
        )
    }
}

impl<S, R, D> Source<SpeechAdapter<S>, RingBuffer<R>, D>
where
    S: SpeechSynthesizer,
    R: RawMutex + Send + Sync + 'static,
    D: OutputDevice,
{
    /// Queues `text` for speaking, all or nothing.
    ///
    /// Returns the bytes written (text plus terminator), or 0 if the whole
    /// string does not fit or contains a NUL.
    pub fn speak(&self, text: &str) -> usize {
        if text.as_bytes().contains(&0) || self.available_for_write() < text.len() + 1 {
            return 0;
        }
        self.write(text.as_bytes()) + self.write(&[0])
    }

    /// Returns `true` while a string is being synthesized.
    pub fn speaking(&self) -> bool {
        self.with_generator(|adapter| adapter.speaking)
    }
}

/// Feeds complete strings from the buffer to a [`SpeechSynthesizer`].
///
/// A string is left in the buffer until it has been spoken in full and is then
/// removed in one compaction. Frames vary in length with the synthesizer's
/// step size; mono output is duplicated to stereo.
pub struct SpeechAdapter<S> {
    synthesizer: S,
    speaking: bool,
    text_len: usize,
    scratch: Vec<i16>,
}

impl<S: SpeechSynthesizer> SpeechAdapter<S> {
    /// Wraps a synthesizer producing at most `max_frame` samples per step.
    pub fn new(synthesizer: S, max_frame: usize) -> Self {
        Self {
            synthesizer,
            speaking: false,
            text_len: 0,
            scratch: vec![0; max_frame],
        }
    }

    /// The wrapped synthesizer.
    pub fn synthesizer(&self) -> &S {
        &self.synthesizer
    }
}

impl<S: SpeechSynthesizer> FrameGenerator for SpeechAdapter<S> {
    fn generate_one_frame<B: DataBuffer>(
        &mut self,
        input: &mut PumpInput<'_, B>,
        frame: &mut AudioFrame,
    ) -> Option<u32> {
        if !self.speaking {
            let synthesizer = &mut self.synthesizer;
            let started = input.with_window(|w| {
                let nul = w.iter().position(|&b| b == 0)?;
                Some((nul, std::str::from_utf8(&w[..nul]).map(|text| synthesizer.begin(text))))
            });
            match started {
                Some((len, Ok(()))) => {
                    debug!(bytes = len, "speaking");
                    self.speaking = true;
                    self.text_len = len;
                }
                Some((len, Err(err))) => {
                    warn!(error = %err, "dropped non-UTF-8 speech text");
                    input.stats().record_error();
                    input.advance(len + 1);
                    input.compact();
                }
                None => {}
            }
        }

        if self.speaking {
            let max = frame.remaining().min(self.scratch.len());
            let step = self.synthesizer.step(&mut self.scratch[..max]);
            let count = step.samples.min(max);
            frame.extend_interleaved(&self.scratch[..count], 1);
            if count > 0 {
                input.stats().record_frame();
            }
            if step.finished {
                self.speaking = false;
                input.advance(self.text_len + 1);
                input.compact();
            }
        }

        Some(self.synthesizer.sample_rate())
    }

    fn reset(&mut self) {
        if self.speaking {
            self.synthesizer.abort();
            self.speaking = false;
        }
        self.text_len = 0;
    }

    fn done(&self, available: usize) -> bool {
        available == 0 && !self.speaking
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::SimulatedOutput;
    use crate::pump::DecoderCursor;
    use crate::stats::Stats;

    /// Speaks each byte as one sample of its value, two samples per step.
    struct ByteVoice {
        pending: Vec<i16>,
        spoken: Vec<String>,
        aborted: usize,
    }

    impl ByteVoice {
        fn new() -> Self {
            Self {
                pending: Vec::new(),
                spoken: Vec::new(),
                aborted: 0,
            }
        }
    }

    impl SpeechSynthesizer for ByteVoice {
        fn sample_rate(&self) -> u32 {
            16000
        }

        fn begin(&mut self, text: &str) {
            self.spoken.push(text.to_string());
            self.pending = text.bytes().rev().map(i16::from).collect();
        }

        fn step(&mut self, out: &mut [i16]) -> SynthStep {
            let mut samples = 0;
            while samples < out.len().min(2) {
                match self.pending.pop() {
                    Some(s) => {
                        out[samples] = s;
                        samples += 1;
                    }
                    None => break,
                }
            }
            SynthStep {
                samples,
                finished: self.pending.is_empty(),
            }
        }

        fn abort(&mut self) {
            self.pending.clear();
            self.aborted += 1;
        }
    }

    fn generate(
        adapter: &mut SpeechAdapter<ByteVoice>,
        buffer: &RingBuffer,
        cursor: &mut DecoderCursor,
        stats: &Stats,
    ) -> Vec<i16> {
        let mut frame = AudioFrame::new(8);
        let mut input = PumpInput::new(buffer, cursor, stats);
        adapter.generate_one_frame(&mut input, &mut frame);
        frame.as_slice().iter().map(|s| s[0]).collect()
    }

    #[test]
    fn test_waits_for_terminator() {
        let buffer = RingBuffer::new(32);
        let stats = Stats::new();
        let mut cursor = DecoderCursor::new();
        let mut adapter = SpeechAdapter::new(ByteVoice::new(), 8);

        buffer.write(b"abc");
        assert!(generate(&mut adapter, &buffer, &mut cursor, &stats).is_empty());
        assert!(adapter.synthesizer().spoken.is_empty());

        buffer.write(&[0]);
        assert_eq!(generate(&mut adapter, &buffer, &mut cursor, &stats), vec![97, 98]);
        assert_eq!(generate(&mut adapter, &buffer, &mut cursor, &stats), vec![99]);
        assert_eq!(buffer.available(), 0);
        assert!(adapter.done(0));
        assert_eq!(stats.snapshot().shifts, 1);
    }

    #[test]
    fn test_strings_spoken_in_order() {
        let buffer = RingBuffer::new(32);
        let stats = Stats::new();
        let mut cursor = DecoderCursor::new();
        let mut adapter = SpeechAdapter::new(ByteVoice::new(), 8);

        buffer.write(b"hi\0yo\0");
        for _ in 0..4 {
            generate(&mut adapter, &buffer, &mut cursor, &stats);
        }
        assert_eq!(adapter.synthesizer().spoken, vec!["hi", "yo"]);
        assert_eq!(stats.snapshot().frames, 2);
    }

    #[test]
    fn test_reset_aborts_synthesis() {
        let buffer = RingBuffer::new(32);
        let stats = Stats::new();
        let mut cursor = DecoderCursor::new();
        let mut adapter = SpeechAdapter::new(ByteVoice::new(), 8);

        buffer.write(b"long text\0");
        generate(&mut adapter, &buffer, &mut cursor, &stats);
        assert!(!adapter.done(buffer.available()));

        adapter.reset();
        assert_eq!(adapter.synthesizer().aborted, 1);
    }

    #[test]
    fn test_invalid_utf8_dropped() {
        let buffer = RingBuffer::new(32);
        let stats = Stats::new();
        let mut cursor = DecoderCursor::new();
        let mut adapter = SpeechAdapter::new(ByteVoice::new(), 8);

        buffer.write(&[0xC3, 0x28, 0]);
        buffer.write(b"ok\0");
        assert_eq!(generate(&mut adapter, &buffer, &mut cursor, &stats), Vec::<i16>::new());
        assert_eq!(stats.snapshot().errors, 1);
        assert_eq!(generate(&mut adapter, &buffer, &mut cursor, &stats), vec![111, 107]);
    }

    #[test]
    fn test_speak_is_all_or_nothing() {
        let device = SimulatedOutput::new();
        let player = Source::new(
            SpeechAdapter::new(ByteVoice::new(), 16),
            RingBuffer::new(8),
            device,
            SourceConfig {
                frame_len: 16,
                buffer_count: 2,
                initial_sample_rate: 16000,
                prefill_threshold: 0,
            },
        );

        assert_eq!(player.speak("hello"), 6);
        assert_eq!(player.speak("abc"), 0);
        assert_eq!(player.speak("a"), 2);
        assert_eq!(player.available_for_write(), 0);
        assert_eq!(player.speak("nul\0inside"), 0);
    }

    #[test]
    fn test_flush_stops_speaking() {
        let device = SimulatedOutput::new();
        let player = Source::new(
            SpeechAdapter::new(ByteVoice::new(), 16),
            RingBuffer::new(64),
            device.clone(),
            SourceConfig {
                frame_len: 16,
                buffer_count: 2,
                initial_sample_rate: 16000,
                prefill_threshold: 0,
            },
        );
        player.begin().unwrap();
        player.speak("a long sentence");
        device.tick(16);
        assert!(player.speaking());
        assert!(!player.done());

        player.flush();
        assert!(!player.speaking());
        assert!(player.done());
    }
}
