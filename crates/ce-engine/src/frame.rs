//! Interleaved 16-bit output frames.

use ce_ir::{AudioBlock, BLOCK_SIZE};

/// A stereo audio frame (16-bit integer).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Frame {
    pub left: i16,
    pub right: i16,
}

impl Frame {
    pub const fn silence() -> Self {
        Self { left: 0, right: 0 }
    }

    /// Quantize a pair of float samples, clipping to [-1, 1].
    pub fn from_f32(left: f32, right: f32) -> Self {
        Self {
            left: quantize(left),
            right: quantize(right),
        }
    }

    /// Scale back to [-1, 1).
    pub fn to_f32(self) -> (f32, f32) {
        (self.left as f32 / 32768.0, self.right as f32 / 32768.0)
    }
}

fn quantize(sample: f32) -> i16 {
    if !sample.is_finite() {
        return 0;
    }
    (sample.clamp(-1.0, 1.0) * 32767.0) as i16
}

/// Frames of a rendered block, scaled by `gain`.
pub fn block_frames(block: &AudioBlock, gain: f32) -> impl Iterator<Item = Frame> + '_ {
    let (left, right) = (block.channel(0), block.channel(1));
    (0..BLOCK_SIZE).map(move |i| Frame::from_f32(left[i] * gain, right[i] * gain))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantize_clips_and_zeroes_nan() {
        assert_eq!(Frame::from_f32(2.0, -2.0), Frame { left: 32767, right: -32767 });
        assert_eq!(Frame::from_f32(f32::NAN, 0.0), Frame::silence());
    }

    #[test]
    fn block_frames_applies_gain() {
        let mut block = AudioBlock::new();
        block.channel_mut(0)[3] = 0.5;
        block.channel_mut(1)[3] = -0.5;
        let frames: Vec<Frame> = block_frames(&block, 0.5).collect();
        assert_eq!(frames.len(), BLOCK_SIZE);
        assert_eq!(frames[3], Frame::from_f32(0.25, -0.25));
        assert_eq!(frames[0], Frame::silence());
    }
}
