//! The shared post-processing chain every layer is heard through.
//!
//! ```text
//! input -> lowpass -> compressor -> widener -+-> dry ------------------+-> output
//!                                            +-> delay -> delay wet --+ wet
//!                                            |    ^-- feedback <- lp  |
//!                                            +-> reverb -> reverb wet +
//! ```

use crate::context::AudioContext;
use crate::graph::NodeKey;
use crate::nodes::{CompressorSettings, FilterKind};
use crate::param::ParamId;
use crate::synth;

/// Cutoff of the space filter at zero intensity.
pub const FILTER_BASE_HZ: f32 = 8000.0;
/// How far full intensity pulls the cutoff down.
pub const FILTER_RANGE_HZ: f32 = 6000.0;

const FILTER_Q: f32 = 0.5;
const FILTER_RAMP_SECONDS: f64 = 1.0;
const WIDENER_LEFT: f32 = 0.01;
const WIDENER_RIGHT: f32 = 0.015;
const DELAY_MAX_SECONDS: f32 = 5.0;
const DELAY_SECONDS: f32 = 0.3;
const DELAY_FEEDBACK: f32 = 0.4;
const DELAY_LOOP_CUTOFF: f32 = 4000.0;
const DELAY_WET: f32 = 0.25;
const REVERB_WET: f32 = 0.35;
const DRY_MIX: f32 = 0.7;
const WET_MIX: f32 = 0.3;
const MIX_RAMP_SECONDS: f64 = 0.1;

#[derive(Clone, Copy, Debug)]
pub struct EffectsChain {
    input: NodeKey,
    filter: NodeKey,
    compressor: NodeKey,
    dry: NodeKey,
    wet: NodeKey,
    output: NodeKey,
}

impl EffectsChain {
    /// Build the chain in `ctx`. Nothing is connected to its input or
    /// output yet.
    pub fn new(ctx: &mut AudioContext, reverb_seconds: f32) -> Self {
        let filter = ctx.biquad(FilterKind::Lowpass, FILTER_BASE_HZ, FILTER_Q);
        let compressor = ctx.compressor(CompressorSettings::default());
        let widener = ctx.widener(WIDENER_LEFT, WIDENER_RIGHT);
        ctx.connect(filter, compressor);
        ctx.connect(compressor, widener);

        let delay = ctx.delay(DELAY_MAX_SECONDS, DELAY_SECONDS);
        let delay_filter = ctx.biquad(FilterKind::Lowpass, DELAY_LOOP_CUTOFF, 1.0);
        let feedback = ctx.gain(DELAY_FEEDBACK);
        let delay_wet = ctx.gain(DELAY_WET);
        ctx.connect(delay, delay_filter);
        ctx.connect(delay_filter, feedback);
        ctx.connect(feedback, delay);
        ctx.connect(delay, delay_wet);

        let sample_rate = ctx.sample_rate();
        let [left, right] =
            synth::reverb_impulse(ctx.rng(), sample_rate, reverb_seconds, synth::REVERB_DECAY);
        let reverb = ctx.convolver(&left, &right, true);
        let reverb_wet = ctx.gain(REVERB_WET);
        ctx.connect(reverb, reverb_wet);

        let dry = ctx.gain(DRY_MIX);
        let wet = ctx.gain(WET_MIX);
        let output = ctx.gain(1.0);
        ctx.connect(widener, dry);
        ctx.connect(widener, delay);
        ctx.connect(widener, reverb);
        ctx.connect(delay_wet, wet);
        ctx.connect(reverb_wet, wet);
        ctx.connect(dry, output);
        ctx.connect(wet, output);

        log::debug!(
            "effects chain ready ({:.1}s reverb, {} nodes in graph)",
            reverb_seconds,
            ctx.graph().len()
        );
        Self {
            input: filter,
            filter,
            compressor,
            dry,
            wet,
            output,
        }
    }

    pub fn input(&self) -> NodeKey {
        self.input
    }

    pub fn output(&self) -> NodeKey {
        self.output
    }

    pub fn compressor(&self) -> NodeKey {
        self.compressor
    }

    /// Pull the space filter down as intensity rises, over one second.
    pub fn update_filter_intensity(&self, ctx: &mut AudioContext, intensity: f32) {
        let intensity = if intensity.is_finite() { intensity.clamp(0.0, 1.0) } else { 0.0 };
        let target = FILTER_BASE_HZ - intensity * FILTER_RANGE_HZ;
        let now = ctx.now();
        ctx.exp_ramp(self.filter, ParamId::Frequency, target, now + FILTER_RAMP_SECONDS);
    }

    /// Crossfade dry against wet: dry `1 - wet`, wet `wet`.
    pub fn set_wet_mix(&self, ctx: &mut AudioContext, wet: f32) {
        let wet = if wet.is_finite() { wet.clamp(0.0, 1.0) } else { WET_MIX };
        let now = ctx.now();
        ctx.linear_ramp(self.dry, ParamId::Gain, 1.0 - wet, now + MIX_RAMP_SECONDS);
        ctx.linear_ramp(self.wet, ParamId::Gain, wet, now + MIX_RAMP_SECONDS);
    }

    pub fn filter_cutoff(&self, ctx: &AudioContext) -> Option<f32> {
        ctx.param_value(self.filter, ParamId::Frequency)
    }

    /// Current (dry, wet) levels.
    pub fn mix(&self, ctx: &AudioContext) -> (f32, f32) {
        let dry = ctx.param_value(self.dry, ParamId::Gain).unwrap_or(0.0);
        let wet = ctx.param_value(self.wet, ParamId::Gain).unwrap_or(0.0);
        (dry, wet)
    }
}
