//! Interpolation curves for scheduled parameter ramps.

/// Smallest magnitude an exponential ramp may start or end at.
///
/// Exponential interpolation is undefined through zero, so ramp endpoints
/// are floored here instead of being rejected.
pub const MIN_EXPONENTIAL_VALUE: f32 = 1e-4;

/// How a parameter moves from one scheduled value to the next.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CurveKind {
    /// Jump to the new value at the event time.
    Step,
    /// Straight line between the two values.
    Linear,
    /// Constant ratio per unit time: `from * (to / from)^t`.
    Exponential,
}

/// Interpolate between two values using the given curve at position `t` (0.0..=1.0).
pub fn interpolate(curve: CurveKind, from: f32, to: f32, t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    match curve {
        CurveKind::Step => {
            if t >= 1.0 {
                to
            } else {
                from
            }
        }
        CurveKind::Linear => from + (to - from) * t,
        CurveKind::Exponential => {
            let (from, to) = (floor_magnitude(from), floor_magnitude(to));
            if (from < 0.0) != (to < 0.0) {
                // No exponential path crosses zero; hold like a step.
                return if t >= 1.0 { to } else { from };
            }
            from * libm::powf(to / from, t)
        }
    }
}

fn floor_magnitude(v: f32) -> f32 {
    if libm::fabsf(v) >= MIN_EXPONENTIAL_VALUE {
        v
    } else if v < 0.0 {
        -MIN_EXPONENTIAL_VALUE
    } else {
        MIN_EXPONENTIAL_VALUE
    }
}
