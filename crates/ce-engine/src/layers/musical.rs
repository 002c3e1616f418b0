//! Musical layers: melodic, harmonic and rhythmic parts.
//!
//! The harmonically aware variants (`arpeggio`, `bass_line`, `lead`) read
//! the chord index stored by the last update when they schedule a note, so
//! a chord change is heard from the next note on.

use ce_ir::{
    arpeggio_pattern, bass_pattern, chord_offset, percussion_pattern, scale, transpose, LayerSpec,
    Mood,
};

use super::{end_event, strike, swell, tone};
use crate::context::AudioContext;
use crate::graph::NodeKey;
use crate::layer::{layer_basics, Layer, LayerCore, LayerCx, FADE_FLOOR, MAX_LAYER_TIMERS};
use crate::nodes::{FilterKind, Waveform};
use crate::param::ParamId;
use crate::synth;

const TICK: u16 = 0;

/// Root of chord `index`, folded into -5..=6 semitones so transposed
/// parts stay near their written register.
pub fn chord_root(mood: Mood, index: usize) -> i32 {
    (chord_offset(mood, index, 0) + 5).rem_euclid(12) - 5
}

static HARMONIC_SERIES: [f32; 4] = [1.0, 2.0, 3.0, 4.0];

/// A fundamental plus a fixed set of overtones at 0.3/h.
pub struct Harmonic {
    core: LayerCore,
}

impl Harmonic {
    pub fn new(_ctx: &mut AudioContext, spec: LayerSpec, mood: Mood) -> Self {
        Self { core: LayerCore::new(spec, mood) }
    }
}

impl Layer for Harmonic {
    layer_basics!("harmonic");

    fn build(&mut self, cx: &mut LayerCx<'_>) {
        let base = self.core.spec.base_freq_or(110.0);
        let fundamental = tone(cx, Waveform::Sine, base);
        let level = cx.voice_gain(0.5);
        cx.connect(fundamental, level);

        // the first entry is the fundamental itself
        for &h in self.core.spec.harmonics_or(&HARMONIC_SERIES).iter().skip(1) {
            if h <= 0.0 {
                continue;
            }
            let osc = tone(cx, Waveform::Sine, base * h);
            let level = cx.voice_gain(0.3 / h);
            cx.connect(osc, level);
        }
        self.core.note_event();
    }
}

/// Plucked pattern notes every 250-350 ms, climbing an octave each time
/// the pattern wraps.
pub struct Arpeggio {
    core: LayerCore,
    pattern: &'static [i8],
    note: usize,
    octave: i32,
}

impl Arpeggio {
    pub fn new(_ctx: &mut AudioContext, spec: LayerSpec, mood: Mood) -> Self {
        let pattern = arpeggio_pattern(spec.pattern_or(mood.name()));
        Self {
            core: LayerCore::new(spec, mood),
            pattern,
            note: 0,
            octave: 0,
        }
    }

    fn pluck(&mut self, cx: &mut LayerCx<'_>) {
        let root = chord_root(self.core.mood, self.core.chord_index());
        let semitones = self.pattern[self.note] as i32 + self.octave * 12 + root;
        let f = transpose(self.core.spec.base_freq_or(440.0), semitones as f32);

        let now = cx.now();
        let osc = tone(cx, Waveform::Sine, f);
        let lowpass = cx.biquad(FilterKind::Lowpass, 2000.0, 1.0);
        cx.exp_ramp(lowpass, ParamId::Frequency, 500.0, now + 0.3);
        let env = cx.voice_gain(0.0);
        cx.connect(osc, lowpass);
        cx.connect(lowpass, env);
        swell(cx, env, 0.3, now, 0.02, 0.3);
        end_event(cx, &[osc], &[lowpass, env], now + 0.3);
        self.core.note_event();

        self.note += 1;
        if self.note >= self.pattern.len() {
            self.note = 0;
            self.octave = (self.octave + 1) % 2;
        }
        let next = cx.random_range(0.25, 0.35);
        self.core.schedule(cx, next, TICK);
    }
}

impl Layer for Arpeggio {
    layer_basics!("arpeggio");

    fn build(&mut self, cx: &mut LayerCx<'_>) {
        let first = cx.random_range(0.0, 1.0);
        self.core.schedule(cx, first, TICK);
    }

    fn on_timer(&mut self, _tag: u16, cx: &mut LayerCx<'_>) {
        self.pluck(cx);
    }
}

/// One bass note per second from the mood's bass pattern.
pub struct BassLine {
    core: LayerCore,
    pattern: &'static [i8],
    step: usize,
}

impl BassLine {
    pub fn new(_ctx: &mut AudioContext, spec: LayerSpec, mood: Mood) -> Self {
        let pattern = bass_pattern(Mood::from_name(spec.pattern_or(mood.name())));
        Self {
            core: LayerCore::new(spec, mood),
            pattern,
            step: 0,
        }
    }

    /// Frequency of the next note under the current chord.
    pub fn next_frequency(&self) -> f32 {
        let root = chord_root(self.core.mood, self.core.chord_index());
        let semitones = self.pattern[self.step % self.pattern.len()] as i32 + root;
        transpose(self.core.spec.base_freq_or(55.0), semitones as f32)
    }

    fn play(&mut self, cx: &mut LayerCx<'_>) {
        let f = self.next_frequency();
        self.step += 1;

        let now = cx.now();
        let saw = tone(cx, Waveform::Sawtooth, f);
        let sub = tone(cx, Waveform::Sine, f * 0.5);
        let lowpass = cx.biquad(FilterKind::Lowpass, 200.0, 5.0);
        let env = cx.voice_gain(0.0);
        cx.connect(saw, lowpass);
        cx.connect(sub, lowpass);
        cx.connect(lowpass, env);
        swell(cx, env, 0.4, now, 0.05, 0.8);
        end_event(cx, &[saw, sub], &[lowpass, env], now + 0.8);
        self.core.note_event();
        self.core.schedule(cx, 1.0, TICK);
    }
}

impl Layer for BassLine {
    layer_basics!("bass_line");

    fn build(&mut self, cx: &mut LayerCx<'_>) {
        self.play(cx);
    }

    fn on_timer(&mut self, _tag: u16, cx: &mut LayerCx<'_>) {
        self.play(cx);
    }
}

static CHIME_FREQUENCIES: [f32; 3] = [523.25, 659.25, 783.99];

/// Partials of a struck chime: (ratio, peak, decay).
const CHIME_PARTIALS: [(f32, f32, f64); 3] = [(1.0, 0.3, 3.0), (2.4, 0.1, 1.5), (5.2, 0.05, 0.8)];

/// Bell-like strikes with inharmonic overtones, one voice per frequency.
pub struct Chime {
    core: LayerCore,
}

impl Chime {
    pub fn new(_ctx: &mut AudioContext, spec: LayerSpec, mood: Mood) -> Self {
        Self { core: LayerCore::new(spec, mood) }
    }
}

impl Layer for Chime {
    layer_basics!("chime");

    fn build(&mut self, cx: &mut LayerCx<'_>) {
        let voices = self.core.spec.frequencies_or(&CHIME_FREQUENCIES).len();
        if voices > MAX_LAYER_TIMERS {
            log::warn!("chime: {} frequencies, only the first {} ring", voices, MAX_LAYER_TIMERS);
        }
        for i in 0..voices.min(MAX_LAYER_TIMERS) {
            let delay = i as f64 * 3.0 + cx.random() * 5.0;
            self.core.schedule(cx, delay, i as u16);
        }
    }

    fn on_timer(&mut self, tag: u16, cx: &mut LayerCx<'_>) {
        let Some(&f) = self.core.spec.frequencies_or(&CHIME_FREQUENCIES).get(tag as usize) else {
            return;
        };
        let now = cx.now();
        for (ratio, peak, decay) in CHIME_PARTIALS {
            let osc = tone(cx, Waveform::Sine, f * ratio);
            let env = cx.voice_gain(0.0);
            cx.connect(osc, env);
            swell(cx, env, peak, now, 0.01, decay);
            end_event(cx, &[osc], &[env], now + decay);
        }
        self.core.note_event();
        let next = cx.random_range(10.0, 30.0);
        self.core.schedule(cx, next, tag);
    }
}

static LEAD_FREQUENCIES: [f32; 1] = [440.0];

/// A wandering scale melody, one long note every 2-4 s.
pub struct Lead {
    core: LayerCore,
    scale: &'static [i8],
    index: usize,
}

impl Lead {
    pub fn new(_ctx: &mut AudioContext, spec: LayerSpec, mood: Mood) -> Self {
        Self {
            core: LayerCore::new(spec, mood),
            scale: scale(mood),
            index: 0,
        }
    }

    fn sing(&mut self, cx: &mut LayerCx<'_>) {
        let len = self.scale.len();
        let root = chord_root(self.core.mood, self.core.chord_index());
        let semitones = self.scale[self.index % len] as i32 + (self.index / len) as i32 * 12 + root;
        let base = self.core.spec.frequencies_or(&LEAD_FREQUENCIES)[0];
        let f = transpose(base, semitones as f32);

        let now = cx.now();
        let osc = tone(cx, Waveform::Sine, f);
        let vibrato = synth::lfo(cx, 5.0, f * 0.01, osc, ParamId::Frequency);
        let lowpass = cx.biquad(FilterKind::Lowpass, 2000.0, 1.0);
        let env = cx.voice_gain(0.0);
        cx.connect(osc, lowpass);
        cx.connect(lowpass, env);
        swell(cx, env, 0.2, now, 0.1, 1.0);
        end_event(cx, &[osc, vibrato.osc], &[vibrato.depth, lowpass, env], now + 1.0);
        self.core.note_event();

        let skip = (cx.random() * 3.0) as usize;
        self.index = (self.index + 1 + skip) % (len * 2);
        let next = cx.random_range(2.0, 4.0);
        self.core.schedule(cx, next, TICK);
    }
}

impl Layer for Lead {
    layer_basics!("lead");

    fn build(&mut self, cx: &mut LayerCx<'_>) {
        let first = cx.random_range(0.0, 4.0);
        self.core.schedule(cx, first, TICK);
    }

    fn on_timer(&mut self, _tag: u16, cx: &mut LayerCx<'_>) {
        self.sing(cx);
    }
}

/// A pitched thump and a click on every beat.
pub struct Rhythm {
    core: LayerCore,
}

impl Rhythm {
    pub fn new(_ctx: &mut AudioContext, spec: LayerSpec, mood: Mood) -> Self {
        Self { core: LayerCore::new(spec, mood) }
    }

    fn beat(&mut self, cx: &mut LayerCx<'_>) {
        let f = self.core.spec.frequency_or(220.0);
        let now = cx.now();
        let thump = tone(cx, Waveform::Sine, f);
        cx.exp_ramp(thump, ParamId::Frequency, f * 0.5, now + 0.1);
        let thump_env = cx.voice_gain(0.0);
        cx.connect(thump, thump_env);
        strike(cx, thump_env, 0.5, now, 0.5);
        end_event(cx, &[thump], &[thump_env], now + 0.5);

        let click = tone(cx, Waveform::Square, 1000.0);
        let click_env = cx.voice_gain(0.0);
        cx.connect(click, click_env);
        strike(cx, click_env, 0.1, now, 0.005);
        end_event(cx, &[click], &[click_env], now + 0.005);

        self.core.note_event();
        self.core.schedule(cx, 1.0, TICK);
    }
}

impl Layer for Rhythm {
    layer_basics!("rhythm");

    fn build(&mut self, cx: &mut LayerCx<'_>) {
        self.beat(cx);
    }

    fn on_timer(&mut self, _tag: u16, cx: &mut LayerCx<'_>) {
        self.beat(cx);
    }
}

const PERCUSSION_STEP: f64 = 0.25;

/// Kick and hi-hat on the hits of an eight-step pattern.
pub struct Percussion {
    core: LayerCore,
    pattern: &'static [bool],
    step: usize,
}

impl Percussion {
    pub fn new(_ctx: &mut AudioContext, spec: LayerSpec, mood: Mood) -> Self {
        Self {
            core: LayerCore::new(spec, mood),
            pattern: percussion_pattern(spec.pattern_or("combat")),
            step: 0,
        }
    }

    fn tick(&mut self, cx: &mut LayerCx<'_>) {
        if self.pattern[self.step % self.pattern.len()] {
            let now = cx.now();
            let kick = tone(cx, Waveform::Sine, 150.0);
            cx.exp_ramp(kick, ParamId::Frequency, 50.0, now + 0.1);
            let kick_env = cx.voice_gain(0.0);
            cx.connect(kick, kick_env);
            strike(cx, kick_env, 0.5, now, 0.2);
            end_event(cx, &[kick], &[kick_env], now + 0.2);

            let hat = synth::filtered_noise(cx, FilterKind::Highpass, 8000.0, 5.0);
            let hat_env = cx.voice_gain(0.0);
            cx.connect(hat.filter, hat_env);
            strike(cx, hat_env, 0.1, now, 0.05);
            end_event(cx, &[hat.source], &[hat.filter, hat_env], now + 0.05);
            self.core.note_event();
        }
        self.step += 1;
        self.core.schedule(cx, PERCUSSION_STEP, TICK);
    }
}

impl Layer for Percussion {
    layer_basics!("percussion");

    fn build(&mut self, cx: &mut LayerCx<'_>) {
        self.tick(cx);
    }

    fn on_timer(&mut self, _tag: u16, cx: &mut LayerCx<'_>) {
        self.tick(cx);
    }
}

static POWER_CHORD_FREQUENCIES: [f32; 3] = [110.0, 165.0, 220.0];

/// Sustained distorted sawtooths, slightly spread in tuning.
pub struct PowerChord {
    core: LayerCore,
}

impl PowerChord {
    pub fn new(_ctx: &mut AudioContext, spec: LayerSpec, mood: Mood) -> Self {
        Self { core: LayerCore::new(spec, mood) }
    }
}

impl Layer for PowerChord {
    layer_basics!("power_chord");

    fn build(&mut self, cx: &mut LayerCx<'_>) {
        let frequencies = self.core.spec.frequencies_or(&POWER_CHORD_FREQUENCIES);
        let level = 0.3 / frequencies.len() as f32;
        let curve = synth::distortion_curve(20.0);
        for (i, &f) in frequencies.iter().enumerate() {
            let osc = tone(cx, Waveform::Sawtooth, f);
            cx.set_value(osc, ParamId::Detune, (i as f32 - 1.0) * 3.0);
            let shaper = cx.shaper(curve.clone());
            let lowpass = cx.biquad(FilterKind::Lowpass, 2000.0, 1.0);
            let gain = cx.voice_gain(level);
            cx.connect(osc, shaper);
            cx.connect(shaper, lowpass);
            cx.connect(lowpass, gain);
        }
        self.core.note_event();
    }
}

static BRASS_FREQUENCIES: [f32; 3] = [220.0, 330.0, 440.0];

/// Short filtered brass hits on every frequency at once.
pub struct BrassStab {
    core: LayerCore,
}

impl BrassStab {
    pub fn new(_ctx: &mut AudioContext, spec: LayerSpec, mood: Mood) -> Self {
        Self { core: LayerCore::new(spec, mood) }
    }

    fn stab(&mut self, cx: &mut LayerCx<'_>) {
        let now = cx.now();
        for &f in self.core.spec.frequencies_or(&BRASS_FREQUENCIES) {
            let osc = tone(cx, Waveform::Sawtooth, f);
            let vibrato = synth::lfo(cx, 5.0, f * 0.01, osc, ParamId::Frequency);
            let lowpass = cx.biquad(FilterKind::Lowpass, 100.0, 5.0);
            cx.linear_ramp(lowpass, ParamId::Frequency, 2000.0, now + 0.05);
            cx.exp_ramp(lowpass, ParamId::Frequency, 500.0, now + 0.3);
            let env = cx.voice_gain(0.0);
            cx.connect(osc, lowpass);
            cx.connect(lowpass, env);
            stab_envelope(cx, env, now);
            end_event(cx, &[osc, vibrato.osc], &[vibrato.depth, lowpass, env], now + 0.3);
        }
        self.core.note_event();
        let next = cx.random_range(2.0, 4.0);
        self.core.schedule(cx, next, TICK);
    }
}

fn stab_envelope(cx: &mut LayerCx<'_>, env: NodeKey, now: f64) {
    cx.set_value_at(env, ParamId::Gain, 0.0, now);
    cx.linear_ramp(env, ParamId::Gain, 0.3, now + 0.02);
    cx.linear_ramp(env, ParamId::Gain, 0.2, now + 0.1);
    cx.exp_ramp(env, ParamId::Gain, FADE_FLOOR, now + 0.3);
}

impl Layer for BrassStab {
    layer_basics!("brass_stab");

    fn build(&mut self, cx: &mut LayerCx<'_>) {
        self.stab(cx);
    }

    fn on_timer(&mut self, _tag: u16, cx: &mut LayerCx<'_>) {
        self.stab(cx);
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{lifecycle, Harness};
    use super::*;
    use crate::layer::LayerUpdate;

    #[test]
    fn chord_root_folds_into_range() {
        assert_eq!(chord_root(Mood::Peaceful, 0), 0);
        assert_eq!(chord_root(Mood::Peaceful, 1), 5);
        // a fifth up folds down a fourth
        assert_eq!(chord_root(Mood::Peaceful, 2), -5);
        assert_eq!(chord_root(Mood::Epic, 1), -2);
        for mood in Mood::ALL {
            for i in 0..8 {
                assert!((-5..=6).contains(&chord_root(mood, i)));
            }
        }
    }

    #[test]
    fn harmonic_skips_fundamental_entry() {
        let spec = LayerSpec::new("harmonic").base_freq(110.0).harmonics(&[1.0, 2.0, 3.0, 5.0, 7.0]);
        let h = Harness::start(spec, Mood::Peaceful);
        // amp + fundamental pair + 4 overtone pairs
        assert_eq!(h.nodes(), 1 + 2 + 4 * 2);
        lifecycle(spec, Mood::Peaceful, 1.0);
    }

    #[test]
    fn arpeggio_plays_three_to_four_notes_per_second() {
        let spec = LayerSpec::new("arpeggio").base_freq(440.0).pattern("peaceful").gain(0.02);
        let mut h = Harness::start(spec, Mood::Peaceful);
        h.run(1.0);
        h.run(3.0);
        assert!((5..=17).contains(&h.events()), "{}", h.events());
        lifecycle(spec, Mood::Peaceful, 2.0);
    }

    #[test]
    fn bass_line_follows_chord_updates() {
        let spec = LayerSpec::new("bass_line").base_freq(55.0).pattern("peaceful");
        let mut ctx = AudioContext::new(8_000, Some(1));
        let mut bass = BassLine::new(&mut ctx, spec, Mood::Peaceful);
        assert!((bass.next_frequency() - 55.0).abs() < 1e-3);
        bass.update(&LayerUpdate { chord_index: 1 });
        assert!((bass.next_frequency() - transpose(55.0, 5.0)).abs() < 1e-3);
    }

    #[test]
    fn bass_line_pattern_name_selects_mood_table() {
        let mut ctx = AudioContext::new(8_000, Some(1));
        let bass = BassLine::new(&mut ctx, LayerSpec::new("bass_line").pattern("tense"), Mood::Epic);
        assert_eq!(bass.pattern, bass_pattern(Mood::Tense));
    }

    #[test]
    fn bass_line_steps_every_second() {
        let spec = LayerSpec::new("bass_line").gain(0.08);
        let mut h = Harness::start(spec, Mood::Peaceful);
        h.run(3.5);
        assert_eq!(h.events(), 4);
        lifecycle(spec, Mood::Peaceful, 1.0);
    }

    #[test]
    fn chime_voices_arm_staggered_timers() {
        let spec = LayerSpec::new("chime").frequencies(&[523.25, 659.25, 783.99, 1046.5]);
        let mut h = Harness::start(spec, Mood::Peaceful);
        assert_eq!(h.layer.core().pending_timers(), 4);
        // last voice is due by 3 * 3 + 5 s
        h.run(14.5);
        assert!(h.events() >= 4);
        lifecycle(spec, Mood::Peaceful, 6.0);
    }

    #[test]
    fn chime_rings_every_listed_frequency() {
        static BELLS: [f32; 10] =
            [261.63, 293.66, 329.63, 349.23, 392.0, 440.0, 493.88, 523.25, 587.33, 659.25];
        let spec = LayerSpec::new("chime").frequencies(&BELLS).gain(0.02);
        let mut h = Harness::start(spec, Mood::Peaceful);
        assert_eq!(h.layer.core().pending_timers(), BELLS.len());
        // voice i is due by 3i + 5 s
        h.run(32.5);
        assert!(h.events() >= BELLS.len() as u64, "{}", h.events());
    }

    #[test]
    fn lead_note_within_four_seconds() {
        let spec = LayerSpec::new("lead").frequencies(&[440.0, 550.0, 660.0]).gain(0.04);
        let mut h = Harness::start(spec, Mood::Epic);
        h.run(4.1);
        assert!(h.events() >= 1);
        lifecycle(spec, Mood::Epic, 5.0);
    }

    #[test]
    fn rhythm_beats_every_second() {
        let mut h = Harness::start(LayerSpec::new("rhythm").frequency(220.0), Mood::Epic);
        h.run(2.5);
        assert_eq!(h.events(), 3);
        lifecycle(LayerSpec::new("rhythm"), Mood::Epic, 1.0);
    }

    #[test]
    fn percussion_hits_follow_pattern() {
        let mut h = Harness::start(LayerSpec::new("percussion").pattern("combat"), Mood::Epic);
        // eight steps: hits on 0, 3 and 5
        h.run(1.9);
        assert_eq!(h.events(), 3);
        let mut h = Harness::start(LayerSpec::new("percussion").pattern("epic"), Mood::Epic);
        h.run(1.9);
        assert_eq!(h.events(), 4);
    }

    #[test]
    fn percussion_releases() {
        lifecycle(LayerSpec::new("percussion").gain(0.1), Mood::Epic, 1.0);
    }

    #[test]
    fn power_chord_releases() {
        let spec = LayerSpec::new("power_chord").frequencies(&[110.0, 165.0, 220.0]).gain(0.08);
        lifecycle(spec, Mood::Epic, 1.0);
    }

    #[test]
    fn brass_stab_releases() {
        let spec = LayerSpec::new("brass_stab").frequencies(&[220.0, 330.0, 440.0]).gain(0.05);
        let h = lifecycle(spec, Mood::Epic, 1.0);
        assert!(h.events() >= 1);
    }
}
