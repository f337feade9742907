use parking_lot::Mutex;

use crate::phase::PhaseAccumulator;

struct State {
    frequency: f64,
    accumulator: PhaseAccumulator,
}

/// Sine oscillator shared between the control server and the streaming thread.
///
/// Frequency and phase live behind one lock, so a sample is always computed
/// from a consistent `{frequency, phase}` pair. The lock is held for a single
/// sample or a single frequency write, never across sink I/O.
pub struct Oscillator {
    state: Mutex<State>,
    sample_rate: u32,
}

impl Oscillator {
    pub fn new(frequency: f64, sample_rate: u32) -> Self {
        Self {
            state: Mutex::new(State {
                frequency,
                accumulator: PhaseAccumulator::new(),
            }),
            sample_rate,
        }
    }

    /// Replace the current frequency.
    ///
    /// Any value is accepted: zero freezes the output, negative values run the
    /// phase backwards.
    pub fn set_frequency(&self, frequency: f64) {
        self.state.lock().frequency = frequency;
    }

    pub fn frequency(&self) -> f64 {
        self.state.lock().frequency
    }

    pub fn phase(&self) -> f64 {
        self.state.lock().accumulator.phase()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn next_sample(&self) -> f64 {
        let mut state = self.state.lock();
        let frequency = state.frequency;
        state.accumulator.tick(frequency, self.sample_rate)
    }
}
