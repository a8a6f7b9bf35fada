//! Sample-level PCM helpers.
//!
//! - Sample format conversion (8-bit unsigned and little-endian 16-bit to i16)
//! - Fixed-point gain
//! - Zero-order-hold rate conversion

mod convert;
mod gain;
mod resample;

pub use convert::{decode_pcm_sample, u8_to_i16};
pub use gain::{apply_gain, gain_from_scale, UNITY_GAIN};
pub use resample::ZeroOrderHold;
