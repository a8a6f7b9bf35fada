//! Container demultiplexers that locate PCM inside a byte stream.
//!
//! Each demuxer is a [`FrameGenerator`](crate::FrameGenerator) that tolerates
//! arbitrary garbage, concatenated files and restarts from `flush()`.

mod wav;

pub use wav::{RomWavPlayer, WavDecoder, WavFormat, WavPlayer};
