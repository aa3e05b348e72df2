//! # Sample Source Module
//!
//! The acquisition seam: one 12-bit-equivalent reading per channel per
//! cycle, assumed fast and non-blocking. Hardware ADC backends implement
//! `SampleSource`; the crate ships a synthetic waveform for running a node
//! without sensors and a scripted source for deterministic playback.

use crate::engine::SAMPLE_PERIOD_MS;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Trait representing something that can yield one raw sample per channel
/// on demand. Readings are expected to stay within [0, 4095].
pub trait SampleSource {
    fn read_sample(&mut self, channel: usize) -> i32;
}

const SIM_BASELINE: i32 = 1400;
const SIM_PEAK: i32 = 2300;
/// Upstroke and decay lengths of the synthetic pulse shape.
const SIM_RISE_MS: u64 = 100;
const SIM_FALL_MS: u64 = 300;
/// Per-channel phase stagger so channels don't beat in unison.
const SIM_STAGGER_MS: u64 = 170;

/// Pulse-shaped synthetic waveform: sharp upstroke, slower decay, quiet
/// rest, with sub-threshold jitter.
///
/// BPM is clamped to 50..=180: below that the rest phase outlasts the
/// flatline limit and the channel would read as disconnected.
pub struct SyntheticPulse {
    period_ms: u64,
    ticks: Vec<u64>,
    // StdRng rather than ThreadRng: the engine owns the source on its own
    // thread, so the source has to be Send.
    rng: StdRng,
}

impl SyntheticPulse {
    pub fn new(channel_count: usize, bpm: u32) -> Self {
        let bpm = bpm.clamp(50, 180);
        Self {
            period_ms: 60_000 / u64::from(bpm),
            ticks: vec![0; channel_count],
            rng: StdRng::from_entropy(),
        }
    }

    fn shape(&self, phase_ms: u64) -> i32 {
        if phase_ms < SIM_RISE_MS {
            SIM_BASELINE + (phase_ms as i32) * (SIM_PEAK - SIM_BASELINE) / SIM_RISE_MS as i32
        } else if phase_ms < SIM_RISE_MS + SIM_FALL_MS {
            let fallen = (phase_ms - SIM_RISE_MS) as i32;
            SIM_PEAK - fallen * (SIM_PEAK - SIM_BASELINE) / SIM_FALL_MS as i32
        } else {
            SIM_BASELINE
        }
    }
}

impl SampleSource for SyntheticPulse {
    fn read_sample(&mut self, channel: usize) -> i32 {
        let tick = self.ticks[channel];
        self.ticks[channel] += 1;

        let offset = channel as u64 * SIM_STAGGER_MS;
        let phase = (tick * SAMPLE_PERIOD_MS + offset) % self.period_ms;
        let jitter = self.rng.gen_range(-4..=4);
        (self.shape(phase) + jitter).clamp(0, 4095)
    }
}

/// Replays pre-recorded per-channel sample vectors; deterministic playback
/// for tests. Holds the last value once a script runs out.
#[cfg(test)]
pub struct ScriptedSource {
    scripts: Vec<Vec<i32>>,
    positions: Vec<usize>,
}

#[cfg(test)]
impl ScriptedSource {
    pub fn new(scripts: Vec<Vec<i32>>) -> Self {
        let positions = vec![0; scripts.len()];
        Self { scripts, positions }
    }
}

#[cfg(test)]
impl SampleSource for ScriptedSource {
    fn read_sample(&mut self, channel: usize) -> i32 {
        let script = &self.scripts[channel];
        let position = self.positions[channel];
        if position < script.len() {
            self.positions[channel] += 1;
            script[position]
        } else {
            *script.last().unwrap_or(&0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthetic_stays_in_the_adc_range() {
        let mut source = SyntheticPulse::new(2, 65);
        for _ in 0..2000 {
            for channel in 0..2 {
                let sample = source.read_sample(channel);
                assert!((0..=4095).contains(&sample), "sample {}", sample);
            }
        }
    }

    #[test]
    fn synthetic_swings_through_a_beat_every_period() {
        let mut source = SyntheticPulse::new(1, 60);
        // One full second at 50 Hz covers one beat at 60 bpm.
        let samples: Vec<i32> = (0..50).map(|_| source.read_sample(0)).collect();
        let max = samples.iter().max().copied().unwrap();
        let min = samples.iter().min().copied().unwrap();
        assert!(max > SIM_PEAK - 100);
        assert!(min < SIM_BASELINE + 100);
    }

    #[test]
    fn synthetic_channels_run_independent_phases() {
        let mut source = SyntheticPulse::new(2, 60);
        let mut equal = 0;
        for _ in 0..50 {
            let a = source.read_sample(0);
            let b = source.read_sample(1);
            if a == b {
                equal += 1;
            }
        }
        assert!(equal < 50, "staggered channels should not track each other");
    }

    #[test]
    fn scripted_replays_then_holds_the_last_value() {
        let mut source = ScriptedSource::new(vec![vec![10, 20, 30], vec![7]]);
        assert_eq!(source.read_sample(0), 10);
        assert_eq!(source.read_sample(0), 20);
        assert_eq!(source.read_sample(1), 7);
        assert_eq!(source.read_sample(0), 30);
        assert_eq!(source.read_sample(0), 30);
        assert_eq!(source.read_sample(1), 7);
    }
}
