//! Declarative layer descriptions used by the track catalogue.

/// Gain used when a spec does not set one.
pub const DEFAULT_LAYER_GAIN: f32 = 0.1;

/// Tunable parameters a layer variant may read. Everything is optional;
/// each variant documents its own fallback for missing values.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LayerParams {
    pub frequency: Option<f32>,
    /// Detune in cents.
    pub detune: Option<f32>,
    pub gain: Option<f32>,
    pub frequencies: &'static [f32],
    pub base_freq: Option<f32>,
    pub harmonics: &'static [f32],
    pub pattern: Option<&'static str>,
    pub spread: Option<f32>,
}

/// A layer type tag plus its parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LayerSpec {
    pub kind: &'static str,
    pub params: LayerParams,
}

impl LayerSpec {
    pub const fn new(kind: &'static str) -> Self {
        Self {
            kind,
            params: LayerParams {
                frequency: None,
                detune: None,
                gain: None,
                frequencies: &[],
                base_freq: None,
                harmonics: &[],
                pattern: None,
                spread: None,
            },
        }
    }

    pub const fn frequency(mut self, hz: f32) -> Self {
        self.params.frequency = Some(hz);
        self
    }

    pub const fn detune(mut self, cents: f32) -> Self {
        self.params.detune = Some(cents);
        self
    }

    pub const fn gain(mut self, gain: f32) -> Self {
        self.params.gain = Some(gain);
        self
    }

    pub const fn frequencies(mut self, hz: &'static [f32]) -> Self {
        self.params.frequencies = hz;
        self
    }

    pub const fn base_freq(mut self, hz: f32) -> Self {
        self.params.base_freq = Some(hz);
        self
    }

    pub const fn harmonics(mut self, ratios: &'static [f32]) -> Self {
        self.params.harmonics = ratios;
        self
    }

    pub const fn pattern(mut self, name: &'static str) -> Self {
        self.params.pattern = Some(name);
        self
    }

    pub const fn spread(mut self, hz: f32) -> Self {
        self.params.spread = Some(hz);
        self
    }

    /// Configured gain, or [`DEFAULT_LAYER_GAIN`]. Zero, negative and
    /// non-finite values count as missing.
    pub fn gain_or_default(&self) -> f32 {
        self.gain_or(DEFAULT_LAYER_GAIN)
    }

    pub fn gain_or(&self, default: f32) -> f32 {
        positive_or(self.params.gain, default)
    }

    pub fn frequency_or(&self, default: f32) -> f32 {
        positive_or(self.params.frequency, default)
    }

    pub fn base_freq_or(&self, default: f32) -> f32 {
        positive_or(self.params.base_freq, default)
    }

    pub fn detune_or(&self, default: f32) -> f32 {
        match self.params.detune {
            Some(d) if d.is_finite() => d,
            _ => default,
        }
    }

    pub fn spread_or(&self, default: f32) -> f32 {
        positive_or(self.params.spread, default)
    }

    /// Configured frequency list, or `default` when empty.
    pub fn frequencies_or(&self, default: &'static [f32]) -> &'static [f32] {
        if self.params.frequencies.is_empty() {
            default
        } else {
            self.params.frequencies
        }
    }

    pub fn harmonics_or(&self, default: &'static [f32]) -> &'static [f32] {
        if self.params.harmonics.is_empty() {
            default
        } else {
            self.params.harmonics
        }
    }

    pub fn pattern_or(&self, default: &'static str) -> &'static str {
        self.params.pattern.unwrap_or(default)
    }
}

fn positive_or(value: Option<f32>, default: f32) -> f32 {
    match value {
        Some(v) if v.is_finite() && v > 0.0 => v,
        _ => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_fields() {
        let spec = LayerSpec::new("drone").frequency(55.0).detune(-5.0).gain(0.12);
        assert_eq!(spec.kind, "drone");
        assert_eq!(spec.params.frequency, Some(55.0));
        assert_eq!(spec.detune_or(0.0), -5.0);
        assert_eq!(spec.gain_or_default(), 0.12);
    }

    #[test]
    fn missing_gain_defaults() {
        assert_eq!(LayerSpec::new("breath").gain_or_default(), DEFAULT_LAYER_GAIN);
        assert_eq!(
            LayerSpec::new("breath").gain(f32::NAN).gain_or_default(),
            DEFAULT_LAYER_GAIN
        );
    }

    #[test]
    fn invalid_frequency_uses_default() {
        assert_eq!(LayerSpec::new("sub").frequency(-3.0).frequency_or(27.5), 27.5);
        assert_eq!(LayerSpec::new("sub").frequency_or(27.5), 27.5);
    }

    #[test]
    fn empty_lists_use_defaults() {
        static DEFAULT: [f32; 2] = [1.0, 2.0];
        let spec = LayerSpec::new("pad");
        assert_eq!(spec.frequencies_or(&DEFAULT), &DEFAULT);
        assert_eq!(spec.harmonics_or(&DEFAULT), &DEFAULT);
        assert_eq!(spec.pattern_or("peaceful"), "peaceful");
    }

    #[test]
    fn gain_or_rejects_non_finite_and_negative() {
        assert_eq!(LayerSpec::new("air_flow").gain(f32::NAN).gain_or(0.02), 0.02);
        assert_eq!(LayerSpec::new("air_flow").gain(-1.0).gain_or(0.02), 0.02);
        assert_eq!(LayerSpec::new("air_flow").gain(0.05).gain_or(0.02), 0.05);
    }

    #[test]
    fn zero_gain_falls_back() {
        assert_eq!(LayerSpec::new("pulse").gain(0.0).gain_or_default(), DEFAULT_LAYER_GAIN);
    }
}
