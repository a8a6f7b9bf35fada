//! 16.16 fixed-point gain.

use crate::frame::StereoSample;

/// Gain of 1.0 in 16.16 fixed point.
pub const UNITY_GAIN: i32 = 1 << 16;

/// Converts a floating-point scale to 16.16 fixed point.
///
/// Negative scales invert the signal. Scales above 16.0 can overflow the
/// 16-bit output; the result is not saturated.
#[inline]
pub fn gain_from_scale(scale: f32) -> i32 {
    (scale * UNITY_GAIN as f32) as i32
}

/// Scales every sample by a 16.16 gain, in place.
///
/// Unity gain leaves the samples untouched.
pub fn apply_gain(samples: &mut [StereoSample], gain: i32) {
    if gain == UNITY_GAIN {
        return;
    }
    let gain = i64::from(gain);
    for sample in samples.iter_mut() {
        for channel in sample.iter_mut() {
            *channel = ((i64::from(*channel) * gain) >> 16) as i16;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gain_from_scale() {
        assert_eq!(gain_from_scale(1.0), UNITY_GAIN);
        assert_eq!(gain_from_scale(0.5), 1 << 15);
        assert_eq!(gain_from_scale(0.0), 0);
    }

    #[test]
    fn test_half_gain() {
        let mut samples = [[1000, -1000], [32767, 2]];
        apply_gain(&mut samples, gain_from_scale(0.5));
        assert_eq!(samples, [[500, -500], [16383, 1]]);
    }

    #[test]
    fn test_unity_gain_untouched() {
        let mut samples = [[-32768, 32767]];
        apply_gain(&mut samples, UNITY_GAIN);
        assert_eq!(samples, [[-32768, 32767]]);
    }

    #[test]
    fn test_zero_gain_mutes() {
        let mut samples = [[1234, -4321]; 4];
        apply_gain(&mut samples, 0);
        assert!(samples.iter().all(|s| *s == [0, 0]));
    }
}
