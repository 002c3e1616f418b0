//! Automatable node parameters.
//!
//! A `Param` is a timeline of scheduled values. Each event says "reach
//! `value` at `frame` using `curve`"; the curve describes the path from the
//! previous event (or the anchor, for the first one). Events are consumed
//! as the render clock passes them, so the realtime path never allocates.

use ce_ir::{interpolate, CurveKind, BLOCK_SIZE};

/// Which parameter of a node an automation call or modulation edge targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ParamId {
    Gain,
    Frequency,
    Detune,
    Q,
    DelayTime,
    Pan,
}

impl ParamId {
    pub const COUNT: usize = 6;

    pub fn index(self) -> usize {
        self as usize
    }
}

/// One scheduled automation point.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ParamEvent {
    pub frame: u64,
    pub value: f32,
    pub curve: CurveKind,
}

#[derive(Clone, Debug)]
pub struct Param {
    anchor_frame: u64,
    anchor_value: f32,
    events: Vec<ParamEvent>,
}

impl Param {
    pub fn new(value: f32) -> Self {
        Self {
            anchor_frame: 0,
            anchor_value: value,
            events: Vec::new(),
        }
    }

    /// Value reached at the most recently rendered frame.
    pub fn value(&self) -> f32 {
        self.anchor_value
    }

    pub fn has_events(&self) -> bool {
        !self.events.is_empty()
    }

    pub fn pending(&self) -> &[ParamEvent] {
        &self.events
    }

    /// Set the value immediately. Pending automation is discarded.
    pub fn set_value(&mut self, value: f32, now: u64) {
        self.events.clear();
        self.anchor_frame = now;
        self.anchor_value = value;
    }

    /// Jump to `value` at `frame`.
    pub fn set_value_at(&mut self, value: f32, frame: u64, now: u64) {
        self.push(ParamEvent { frame, value, curve: CurveKind::Step }, now);
    }

    /// Ramp linearly from the previous event to `value`, arriving at `frame`.
    pub fn linear_ramp_to(&mut self, value: f32, frame: u64, now: u64) {
        self.push(ParamEvent { frame, value, curve: CurveKind::Linear }, now);
    }

    /// Ramp exponentially from the previous event to `value`, arriving at `frame`.
    pub fn exponential_ramp_to(&mut self, value: f32, frame: u64, now: u64) {
        self.push(ParamEvent { frame, value, curve: CurveKind::Exponential }, now);
    }

    /// Drop every event at or after `frame`.
    pub fn cancel_from(&mut self, frame: u64) {
        self.events.retain(|e| e.frame < frame);
    }

    /// Freeze the current trajectory at `now`: later events are dropped and
    /// the value at `now` becomes the new starting point.
    pub fn hold_at(&mut self, now: u64) {
        let held = self.value_at(now);
        self.cancel_from(now);
        if self.events.is_empty() {
            self.anchor_frame = now;
            self.anchor_value = held;
        } else {
            self.push(ParamEvent { frame: now, value: held, curve: CurveKind::Step }, now);
        }
    }

    /// Evaluate the timeline at an absolute frame.
    pub fn value_at(&self, frame: u64) -> f32 {
        let events = &self.events;
        let idx = events.partition_point(|e| e.frame <= frame);
        if idx == events.len() {
            return events.last().map_or(self.anchor_value, |e| e.value);
        }
        let next = events[idx];
        let (from_frame, from_value) = if idx == 0 {
            (self.anchor_frame, self.anchor_value)
        } else {
            (events[idx - 1].frame, events[idx - 1].value)
        };
        if next.curve == CurveKind::Step {
            return from_value;
        }
        let span = next.frame.saturating_sub(from_frame);
        if span == 0 {
            return next.value;
        }
        let pos = frame.saturating_sub(from_frame) as f32 / span as f32;
        interpolate(next.curve, from_value, next.value, pos)
    }

    /// Render one block of values starting at `start`, then retire every
    /// event the block has passed.
    pub fn fill(&mut self, start: u64, out: &mut [f32; BLOCK_SIZE]) {
        if self.events.is_empty() {
            out.fill(self.anchor_value);
            return;
        }
        for (i, v) in out.iter_mut().enumerate() {
            *v = self.value_at(start + i as u64);
        }
        let end = start + BLOCK_SIZE as u64;
        let passed = self.events.partition_point(|e| e.frame < end);
        if passed > 0 {
            let last = self.events[passed - 1];
            self.anchor_frame = last.frame;
            self.anchor_value = last.value;
            // drain keeps capacity, so this stays allocation-free
            self.events.drain(..passed);
        }
    }

    fn push(&mut self, event: ParamEvent, now: u64) {
        if self.events.is_empty() && self.anchor_frame < now {
            self.anchor_value = self.value_at(now);
            self.anchor_frame = now;
        }
        let pos = self.events.partition_point(|e| e.frame <= event.frame);
        self.events.insert(pos, event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(param: &mut Param, start: u64) -> [f32; BLOCK_SIZE] {
        let mut out = [0.0; BLOCK_SIZE];
        param.fill(start, &mut out);
        out
    }

    #[test]
    fn constant_without_events() {
        let mut p = Param::new(0.25);
        let out = block(&mut p, 0);
        assert!(out.iter().all(|&v| v == 0.25));
    }

    #[test]
    fn linear_ramp_from_now() {
        let mut p = Param::new(0.0);
        p.linear_ramp_to(1.0, 100, 0);
        assert!((p.value_at(50) - 0.5).abs() < 1e-6);
        assert_eq!(p.value_at(100), 1.0);
        assert_eq!(p.value_at(500), 1.0);
    }

    #[test]
    fn ramp_starts_at_current_time_not_creation() {
        let mut p = Param::new(0.2);
        p.linear_ramp_to(1.0, 1100, 1000);
        assert!((p.value_at(1000) - 0.2).abs() < 1e-6);
        assert!((p.value_at(1050) - 0.6).abs() < 1e-6);
    }

    #[test]
    fn step_takes_effect_at_its_frame() {
        let mut p = Param::new(0.0);
        p.set_value_at(0.3, 10, 0);
        assert_eq!(p.value_at(9), 0.0);
        assert_eq!(p.value_at(10), 0.3);
    }

    #[test]
    fn chained_events_follow_previous_point() {
        // 0 -> lin 0.3 at 100 -> exp 0.001 at 200
        let mut p = Param::new(0.0);
        p.linear_ramp_to(0.3, 100, 0);
        p.exponential_ramp_to(0.001, 200, 0);
        assert!((p.value_at(100) - 0.3).abs() < 1e-6);
        let mid = p.value_at(150);
        assert!(mid < 0.3 && mid > 0.001, "got {}", mid);
        assert!((p.value_at(200) - 0.001).abs() < 1e-6);
    }

    #[test]
    fn fill_retires_passed_events() {
        let mut p = Param::new(0.0);
        p.linear_ramp_to(1.0, 64, 0);
        let out = block(&mut p, 0);
        assert!((out[32] - 0.5).abs() < 1e-6);
        assert_eq!(out[127], 1.0);
        assert!(!p.has_events());
        assert_eq!(p.value(), 1.0);
    }

    #[test]
    fn ramp_spanning_blocks_keeps_anchor() {
        let mut p = Param::new(0.0);
        p.linear_ramp_to(1.0, 256, 0);
        let first = block(&mut p, 0);
        let second = block(&mut p, 128);
        assert!((first[64] - 0.25).abs() < 1e-6);
        assert!((second[0] - 0.5).abs() < 1e-6);
        assert!(p.has_events());
    }

    #[test]
    fn cancel_from_drops_later_events() {
        let mut p = Param::new(0.0);
        p.set_value_at(0.5, 10, 0);
        p.set_value_at(0.9, 20, 0);
        p.cancel_from(15);
        assert_eq!(p.pending().len(), 1);
        assert_eq!(p.value_at(30), 0.5);
    }

    #[test]
    fn hold_freezes_mid_ramp() {
        let mut p = Param::new(0.0);
        p.linear_ramp_to(1.0, 200, 0);
        p.hold_at(100);
        assert!((p.value_at(100) - 0.5).abs() < 1e-6);
        assert!((p.value_at(180) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn set_value_discards_automation() {
        let mut p = Param::new(0.0);
        p.linear_ramp_to(1.0, 200, 0);
        p.set_value(0.7, 50);
        assert!(!p.has_events());
        assert_eq!(p.value_at(100), 0.7);
    }
}
