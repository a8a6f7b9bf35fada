//! Sample format conversion.

use byteorder::{ByteOrder, LittleEndian};

/// Widens an unsigned 8-bit PCM sample to signed 16-bit.
///
/// The sample is recentered around 128 and shifted up, so the output spans
/// -32768..=32512. Full-scale positive 8-bit audio never reaches `i16::MAX`.
#[inline]
pub fn u8_to_i16(sample: u8) -> i16 {
    (i16::from(sample) - 128) << 8
}

/// Decodes one PCM sample of `bits_per_sample` bits from the front of `bytes`.
///
/// 16-bit samples are little-endian. Returns `None` if `bytes` is too short or
/// the width is not 8 or 16.
#[inline]
pub fn decode_pcm_sample(bytes: &[u8], bits_per_sample: u16) -> Option<i16> {
    match bits_per_sample {
        8 => bytes.first().map(|&b| u8_to_i16(b)),
        16 if bytes.len() >= 2 => Some(LittleEndian::read_i16(bytes)),
        _ => None,
    }
}
