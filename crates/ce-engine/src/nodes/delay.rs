//! Delay lines indexed by absolute frame.

use ce_ir::{AudioBlock, BLOCK_SIZE};

use super::{param_block, Modulation, ProcessContext};
use crate::param::{Param, ParamId};

/// Power-of-two ring buffer addressed by absolute frame number.
#[derive(Clone, Debug)]
pub struct DelayLine {
    buf: Vec<f32>,
    mask: usize,
}

impl DelayLine {
    /// A line able to look back at least `max_frames`.
    pub fn new(max_frames: usize) -> Self {
        let len = (max_frames + 2 * BLOCK_SIZE + 2).next_power_of_two();
        Self {
            buf: vec![0.0; len],
            mask: len - 1,
        }
    }

    /// Longest delay this line can serve.
    pub fn capacity(&self) -> usize {
        self.buf.len() - 2 * BLOCK_SIZE - 2
    }

    pub fn write(&mut self, frame: u64, sample: f32) {
        self.buf[frame as usize & self.mask] = sample;
    }

    /// Linearly interpolated read at a fractional absolute position.
    pub fn read(&self, position: f64) -> f32 {
        if position < 0.0 {
            return 0.0;
        }
        let i0 = position.floor();
        let frac = (position - i0) as f32;
        let i0 = i0 as u64;
        let a = self.buf[i0 as usize & self.mask];
        let b = self.buf[(i0 + 1) as usize & self.mask];
        a + (b - a) * frac
    }
}

/// Automatable delay that may sit inside a feedback loop.
///
/// Reads happen during the normal render pass; the block's input is only
/// written afterwards in [`Delay::commit`]. The delay time is therefore
/// clamped to at least one render quantum.
#[derive(Debug)]
pub struct Delay {
    pub time: Param,
    lines: [DelayLine; 2],
    values: [f32; BLOCK_SIZE],
}

impl Delay {
    pub fn new(max_seconds: f32, seconds: f32, sample_rate: f32) -> Self {
        let max_frames = (max_seconds.max(0.0) * sample_rate).ceil() as usize + BLOCK_SIZE;
        Self {
            time: Param::new(seconds),
            lines: [DelayLine::new(max_frames), DelayLine::new(max_frames)],
            values: [0.0; BLOCK_SIZE],
        }
    }

    pub(super) fn process(&mut self, cx: &ProcessContext, mods: &Modulation, out: &mut AudioBlock) {
        param_block(&mut self.time, ParamId::DelayTime, cx, mods, &mut self.values);
        let min = BLOCK_SIZE as f64;
        let max = self.lines[0].capacity() as f64;
        for ch in 0..2 {
            let line = &self.lines[ch];
            let dst = out.channel_mut(ch);
            for (i, o) in dst.iter_mut().enumerate() {
                let delay = (self.values[i] as f64 * cx.sample_rate as f64).clamp(min, max);
                let pos = (cx.frame + i as u64) as f64 - delay;
                *o = line.read(pos);
            }
        }
    }

    pub(super) fn commit(&mut self, cx: &ProcessContext, input: &AudioBlock) {
        for (ch, line) in self.lines.iter_mut().enumerate() {
            for (i, s) in input.channel(ch).iter().enumerate() {
                line.write(cx.frame + i as u64, *s);
            }
        }
    }
}

/// Haas-style widener: each channel gets its own fixed micro-delay.
#[derive(Debug)]
pub struct Widener {
    delays: [f64; 2],
    lines: [DelayLine; 2],
}

impl Widener {
    pub fn new(left_seconds: f32, right_seconds: f32, sample_rate: f32) -> Self {
        let l = (left_seconds.max(0.0) * sample_rate) as f64;
        let r = (right_seconds.max(0.0) * sample_rate) as f64;
        let max = l.max(r).ceil() as usize + 1;
        Self {
            delays: [l, r],
            lines: [DelayLine::new(max), DelayLine::new(max)],
        }
    }

    pub(super) fn process(&mut self, cx: &ProcessContext, input: &AudioBlock, out: &mut AudioBlock) {
        for ch in 0..2 {
            let delay = self.delays[ch];
            let line = &mut self.lines[ch];
            let src = input.channel(ch);
            let dst = out.channel_mut(ch);
            for i in 0..BLOCK_SIZE {
                let frame = cx.frame + i as u64;
                line.write(frame, src[i]);
                dst[i] = line.read(frame as f64 - delay);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f32 = 12_800.0;

    fn impulse() -> AudioBlock {
        let mut b = AudioBlock::new();
        b.channel_mut(0)[0] = 1.0;
        b.channel_mut(1)[0] = 1.0;
        b
    }

    #[test]
    fn line_reads_back_written_frames() {
        let mut line = DelayLine::new(100);
        line.write(1000, 0.5);
        line.write(1001, 1.0);
        assert_eq!(line.read(1000.0), 0.5);
        assert!((line.read(1000.5) - 0.75).abs() < 1e-6);
        assert_eq!(line.read(-3.0), 0.0);
    }

    #[test]
    fn delay_echoes_after_commit() {
        // 0.02 s at 12.8 kHz = 256 frames, two blocks
        let mut delay = Delay::new(1.0, 0.02, SR);
        let mut out = AudioBlock::new();
        let mut heard_at = None;
        for b in 0..4u64 {
            let cx = ProcessContext { frame: b * BLOCK_SIZE as u64, sample_rate: SR };
            delay.process(&cx, &Modulation::new(), &mut out);
            if let Some(i) = out.channel(0).iter().position(|&s| s > 0.5) {
                heard_at.get_or_insert(cx.frame + i as u64);
            }
            let input = if b == 0 { impulse() } else { AudioBlock::new() };
            delay.commit(&cx, &input);
        }
        assert_eq!(heard_at, Some(256));
    }

    #[test]
    fn delay_time_is_at_least_one_block() {
        let mut delay = Delay::new(1.0, 0.0, SR);
        let mut out = AudioBlock::new();
        let cx0 = ProcessContext { frame: 0, sample_rate: SR };
        delay.process(&cx0, &Modulation::new(), &mut out);
        delay.commit(&cx0, &impulse());
        let cx1 = ProcessContext { frame: BLOCK_SIZE as u64, sample_rate: SR };
        delay.process(&cx1, &Modulation::new(), &mut out);
        assert_eq!(out.channel(0)[0], 1.0);
    }

    #[test]
    fn widener_offsets_channels() {
        // 10 and 20 frames
        let mut w = Widener::new(10.0 / SR, 20.0 / SR, SR);
        let mut out = AudioBlock::new();
        w.process(&ProcessContext { frame: 0, sample_rate: SR }, &impulse(), &mut out);
        assert!((out.channel(0)[10] - 1.0).abs() < 1e-6);
        assert!((out.channel(1)[20] - 1.0).abs() < 1e-6);
        assert_eq!(out.channel(0)[0], 0.0);
    }
}
