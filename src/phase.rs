use std::f64::consts::TAU;

/// Advance `phase` by one sample of a tone at `frequency` Hz.
///
/// The result is wrapped with a floor-based modulo, so it stays in `[0, 1)` for
/// negative frequencies too. No validation happens here: a zero frequency
/// leaves the phase unchanged and frequencies above Nyquist simply alias.
#[inline]
pub fn advance(phase: f64, frequency: f64, sample_rate: u32) -> f64 {
    wrap(phase + frequency / sample_rate as f64)
}

/// Instantaneous amplitude of a sine wave at `phase`.
#[inline]
pub fn sine(phase: f64) -> f64 {
    (phase * TAU).sin()
}

#[inline]
fn wrap(phase: f64) -> f64 {
    let wrapped = phase.rem_euclid(1.0);
    // rem_euclid of a tiny negative value rounds up to exactly 1.0, and a
    // non-finite phase has no position in the cycle.
    if !wrapped.is_finite() || wrapped >= 1.0 {
        0.0
    } else {
        wrapped
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PhaseAccumulator {
    phase: f64,
}

impl PhaseAccumulator {
    pub fn new() -> Self {
        Self { phase: 0.0 }
    }

    pub fn with_phase(phase: f64) -> Self {
        Self { phase: wrap(phase) }
    }

    #[inline]
    pub fn phase(&self) -> f64 {
        self.phase
    }

    /// Emit the sample for the current phase, then move to the next one.
    #[inline]
    pub fn tick(&mut self, frequency: f64, sample_rate: u32) -> f64 {
        let sample = sine(self.phase);
        self.phase = advance(self.phase, frequency, sample_rate);
        sample
    }
}
