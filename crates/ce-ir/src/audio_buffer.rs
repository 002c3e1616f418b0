//! Fixed-size stereo render block with planar layout.

/// Number of output channels. Every node renders stereo.
pub const CHANNELS: usize = 2;

/// Frames per render quantum. Timers fire and graphs render on this grid.
pub const BLOCK_SIZE: usize = 128;

/// One render quantum of stereo f32 audio.
///
/// Planes are stored inline so a block never touches the allocator once
/// it has been created.
#[derive(Clone, Debug, PartialEq)]
pub struct AudioBlock {
    planes: [[f32; BLOCK_SIZE]; CHANNELS],
}

impl Default for AudioBlock {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioBlock {
    /// A silent block.
    pub const fn new() -> Self {
        Self {
            planes: [[0.0; BLOCK_SIZE]; CHANNELS],
        }
    }

    /// Fill all samples with zero.
    pub fn silence(&mut self) {
        for plane in &mut self.planes {
            plane.fill(0.0);
        }
    }

    /// Read-only access to one channel.
    pub fn channel(&self, ch: usize) -> &[f32; BLOCK_SIZE] {
        &self.planes[ch]
    }

    /// Mutable access to one channel.
    pub fn channel_mut(&mut self, ch: usize) -> &mut [f32; BLOCK_SIZE] {
        &mut self.planes[ch]
    }

    /// Both channels at once, for processors that write L and R together.
    pub fn split_mut(&mut self) -> (&mut [f32; BLOCK_SIZE], &mut [f32; BLOCK_SIZE]) {
        let [left, right] = &mut self.planes;
        (left, right)
    }

    /// Write the same mono signal to both channels.
    pub fn fill_mono(&mut self, mono: &[f32; BLOCK_SIZE]) {
        for plane in &mut self.planes {
            plane.copy_from_slice(mono);
        }
    }

    /// Average of the two channels at frame `i`.
    pub fn mono_at(&self, i: usize) -> f32 {
        (self.planes[0][i] + self.planes[1][i]) * 0.5
    }

    /// Sum `source` into this block.
    pub fn mix_from(&mut self, source: &AudioBlock) {
        for (dst, src) in self.planes.iter_mut().zip(source.planes.iter()) {
            for (d, s) in dst.iter_mut().zip(src.iter()) {
                *d += *s;
            }
        }
    }

    /// Sum `source` into this block with gain.
    pub fn mix_from_scaled(&mut self, source: &AudioBlock, gain: f32) {
        for (dst, src) in self.planes.iter_mut().zip(source.planes.iter()) {
            for (d, s) in dst.iter_mut().zip(src.iter()) {
                *d += *s * gain;
            }
        }
    }

    /// Multiply every frame by the matching per-frame gain.
    pub fn apply_gain_curve(&mut self, gains: &[f32; BLOCK_SIZE]) {
        for plane in &mut self.planes {
            for (s, g) in plane.iter_mut().zip(gains.iter()) {
                *s *= *g;
            }
        }
    }

    /// Largest absolute sample value in the block.
    pub fn peak(&self) -> f32 {
        self.planes
            .iter()
            .flat_map(|p| p.iter())
            .fold(0.0f32, |acc, s| acc.max(libm::fabsf(*s)))
    }

    /// Whether every sample is exactly zero.
    pub fn is_silent(&self) -> bool {
        self.planes.iter().all(|p| p.iter().all(|&s| s == 0.0))
    }
}
