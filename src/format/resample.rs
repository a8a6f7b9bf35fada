//! Sample rate conversion.
//!
//! Zero-order hold: each output sample repeats the nearest input sample at or
//! before its position. No interpolation, no filtering; cheap enough to run
//! inside a transmit interrupt.

/// Fixed-point (16.16) read cursor mapping output positions to input indices.
///
/// # Example
///
/// ```
/// use background_audio::ZeroOrderHold;
///
/// // 22050 Hz input played at 44100 Hz: every input sample is held twice
/// let mut hold = ZeroOrderHold::new(22050, 44100);
/// let input = [10, 20, 30];
/// let mut output = Vec::new();
/// while hold.index() < input.len() {
///     output.push(input[hold.index()]);
///     hold.advance();
/// }
/// assert_eq!(output, vec![10, 10, 20, 20, 30, 30]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZeroOrderHold {
    step: u64,
    position: u64,
}

impl ZeroOrderHold {
    /// Creates a cursor converting `input_rate` to `output_rate`.
    pub fn new(input_rate: u32, output_rate: u32) -> Self {
        Self {
            step: Self::step_for(input_rate, output_rate),
            position: 0,
        }
    }

    fn step_for(input_rate: u32, output_rate: u32) -> u64 {
        if output_rate == 0 {
            return 1 << 16;
        }
        (u64::from(input_rate) << 16) / u64::from(output_rate)
    }

    /// Changes the conversion ratio. A new ratio keeps the current input
    /// sample and drops the fractional phase.
    pub fn set_rates(&mut self, input_rate: u32, output_rate: u32) {
        let step = Self::step_for(input_rate, output_rate);
        if step != self.step {
            self.step = step;
            self.position &= !0xFFFF;
        }
    }

    /// Index of the input sample for the current output position.
    pub fn index(&self) -> usize {
        (self.position >> 16) as usize
    }

    /// Moves to the next output sample.
    pub fn advance(&mut self) {
        self.position += self.step;
    }

    /// Re-bases the cursor after the first `consumed` input samples were
    /// retired, keeping the fractional phase.
    pub fn rebase(&mut self, consumed: usize) {
        self.position = self.position.saturating_sub((consumed as u64) << 16);
    }

    /// Returns to the first input sample.
    pub fn reset(&mut self) {
        self.position = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(hold: &mut ZeroOrderHold, input: &[i16]) -> Vec<i16> {
        let mut output = Vec::new();
        while hold.index() < input.len() {
            output.push(input[hold.index()]);
            hold.advance();
        }
        output
    }

    #[test]
    fn test_same_rate_passthrough() {
        let mut hold = ZeroOrderHold::new(44100, 44100);
        assert_eq!(run(&mut hold, &[1, 2, 3]), vec![1, 2, 3]);
    }

    #[test]
    fn test_downsample_skips() {
        let mut hold = ZeroOrderHold::new(48000, 24000);
        assert_eq!(run(&mut hold, &[0, 1, 2, 3, 4, 5]), vec![0, 2, 4]);
    }

    #[test]
    fn test_rebase_keeps_phase_across_buffers() {
        // 3:4 ratio; step = 0.75
        let mut hold = ZeroOrderHold::new(33075, 44100);
        let first = run(&mut hold, &[1, 2, 3]);
        hold.rebase(3);
        let second = run(&mut hold, &[4, 5, 6]);

        let mut joined = first;
        joined.extend(second);
        let mut whole = ZeroOrderHold::new(33075, 44100);
        assert_eq!(joined, run(&mut whole, &[1, 2, 3, 4, 5, 6]));
    }

    #[test]
    fn test_rate_change_drops_fraction() {
        let mut hold = ZeroOrderHold::new(22050, 44100);
        hold.advance();
        hold.advance();
        hold.advance();
        assert_eq!(hold.index(), 1);
        hold.set_rates(44100, 44100);
        assert_eq!(hold.index(), 1);
        hold.advance();
        assert_eq!(hold.index(), 2);
    }

    #[test]
    fn test_zero_output_rate_is_passthrough() {
        let mut hold = ZeroOrderHold::new(8000, 0);
        assert_eq!(run(&mut hold, &[4, 5, 6]), vec![4, 5, 6]);
    }
}
