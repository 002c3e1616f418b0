//! Feed-forward compressor with soft knee and automatic makeup gain.

use ce_ir::{AudioBlock, BLOCK_SIZE};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CompressorSettings {
    pub threshold_db: f32,
    pub knee_db: f32,
    pub ratio: f32,
    /// Seconds.
    pub attack: f32,
    /// Seconds.
    pub release: f32,
}

impl Default for CompressorSettings {
    fn default() -> Self {
        Self {
            threshold_db: -24.0,
            knee_db: 30.0,
            ratio: 12.0,
            attack: 0.003,
            release: 0.25,
        }
    }
}

impl CompressorSettings {
    /// Gain change in dB (zero or negative) for a detector level.
    pub fn gain_reduction_db(&self, input_db: f32) -> f32 {
        let threshold = self.threshold_db;
        let ratio = self.ratio.max(1.0);
        let knee = self.knee_db.max(0.0);

        if knee > 0.0 {
            let knee_start = threshold - knee / 2.0;
            let knee_end = threshold + knee / 2.0;
            if input_db <= knee_start {
                0.0
            } else if input_db >= knee_end {
                (threshold + (input_db - threshold) / ratio) - input_db
            } else {
                // ratio eases in quadratically across the knee
                let t = (input_db - knee_start) / knee;
                let effective = 1.0 + (ratio - 1.0) * t * t;
                (knee_start + (input_db - knee_start) / effective) - input_db
            }
        } else if input_db <= threshold {
            0.0
        } else {
            (threshold + (input_db - threshold) / ratio) - input_db
        }
    }
}

#[derive(Debug)]
pub struct Compressor {
    settings: CompressorSettings,
    attack_coeff: f32,
    release_coeff: f32,
    /// Smoothed gain reduction in dB.
    reduction_db: f32,
    makeup: f32,
}

impl Compressor {
    pub fn new(settings: CompressorSettings, sample_rate: f32) -> Self {
        let coeff = |seconds: f32| {
            let samples = seconds * sample_rate;
            if samples > 0.0 {
                (-1.0 / samples).exp()
            } else {
                0.0
            }
        };
        // Full-scale input should come out near full scale again.
        let makeup_db = -0.6 * settings.gain_reduction_db(0.0);
        Self {
            settings,
            attack_coeff: coeff(settings.attack),
            release_coeff: coeff(settings.release),
            reduction_db: 0.0,
            makeup: db_to_linear(makeup_db),
        }
    }

    pub fn settings(&self) -> &CompressorSettings {
        &self.settings
    }

    /// Current smoothed gain reduction, for metering.
    pub fn reduction_db(&self) -> f32 {
        self.reduction_db
    }

    pub(super) fn process(&mut self, input: &AudioBlock, out: &mut AudioBlock) {
        let (left, right) = out.split_mut();
        for i in 0..BLOCK_SIZE {
            let l = input.channel(0)[i];
            let r = input.channel(1)[i];
            let level = l.abs().max(r.abs());
            let target = self.settings.gain_reduction_db(linear_to_db(level));
            let coeff = if target < self.reduction_db {
                self.attack_coeff
            } else {
                self.release_coeff
            };
            self.reduction_db = target + coeff * (self.reduction_db - target);
            let gain = db_to_linear(self.reduction_db) * self.makeup;
            left[i] = l * gain;
            right[i] = r * gain;
        }
    }
}

fn linear_to_db(linear: f32) -> f32 {
    if linear > 1e-6 {
        20.0 * linear.log10()
    } else {
        -120.0
    }
}

fn db_to_linear(db: f32) -> f32 {
    10f32.powf(db / 20.0)
}
