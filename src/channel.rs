//! # Channel Pipeline Module
//!
//! One `Channel` per physiological sensor, owned exclusively by the engine.
//! Composes the per-cycle pipeline (smoothing, flatline monitoring,
//! baseline envelope, beat detection) around the single `connected` flag.
//!
//! ## The connected flag
//! Two writers share the one flag, in pipeline order:
//! 1. The flatline monitor: a raw delta at or above the movement threshold
//!    sets it true, a flat run of 50 cycles sets it false.
//! 2. The envelope range check: a span under `MIN_RANGE` forces it false.
//! The range check runs second, so movement alone never completes a
//! reconnection while the envelope is still collapsed. Splitting this into
//! two flags would change observable behavior at the boundary.
//!
//! While disconnected the detector is not invoked, which freezes its edge
//! latch; detection resumes from real state instead of firing on a stale
//! crossing.

use crate::contact::{Contact, FlatlineMonitor};
use crate::detector::{BeatDetector, BeatEvent};
use crate::envelope::{Envelope, MIN_RANGE};
use crate::filter::MovingAverage;

/// Point-in-time view of one channel, for diagnostics and status output.
#[derive(Debug, Clone, Copy)]
pub struct ChannelSnapshot {
    pub smoothed: i32,
    pub envelope_min: i32,
    pub envelope_max: i32,
    pub last_ibi_ms: u32,
    pub connected: bool,
}

/// Per-sensor pipeline state. No cross-channel references anywhere.
pub struct Channel {
    id: usize,
    filter: MovingAverage,
    monitor: FlatlineMonitor,
    envelope: Envelope,
    detector: BeatDetector,
    smoothed: i32,
    connected: bool,
}

impl Channel {
    /// Create a channel from its first real reading. The seed pre-fills
    /// the smoothing window and collapses the envelope onto itself; the
    /// channel reports disconnected until live signal opens the range.
    pub fn new(id: usize, seed: i32) -> Self {
        Self {
            id,
            filter: MovingAverage::new(seed),
            monitor: FlatlineMonitor::new(seed),
            envelope: Envelope::new(seed),
            detector: BeatDetector::new(),
            smoothed: seed,
            connected: true,
        }
    }

    /// Run one 20 ms cycle: raw sample in, at most one beat event out.
    pub fn process(&mut self, raw: i32, now_ms: u64) -> Option<BeatEvent> {
        self.smoothed = self.filter.update(raw);

        match self.monitor.update(raw) {
            Contact::Moving => self.connected = true,
            Contact::Flatlined => self.connected = false,
            Contact::Settling => {}
        }

        let range = self.envelope.update(self.smoothed);
        if range < MIN_RANGE {
            self.connected = false;
        }

        if !self.connected {
            return None;
        }

        self.detector.update(
            self.id,
            self.smoothed,
            self.envelope.min(),
            self.envelope.max(),
            now_ms,
        )
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn snapshot(&self) -> ChannelSnapshot {
        ChannelSnapshot {
            smoothed: self.smoothed,
            envelope_min: self.envelope.min(),
            envelope_max: self.envelope.max(),
            last_ibi_ms: self.detector.last_ibi_ms(),
            connected: self.connected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contact::FLAT_LIMIT;
    use crate::detector::REFRACTORY_MS;

    const PERIOD_MS: u64 = 20;

    /// 1000/2000 square wave with the given period, sampled at 50 Hz.
    fn square_wave(cycle: u64, wave_period_ms: u64) -> i32 {
        let t = cycle * PERIOD_MS;
        if t % wave_period_ms < wave_period_ms / 2 {
            2000
        } else {
            1000
        }
    }

    fn drive(channel: &mut Channel, first_cycle: u64, cycles: u64, wave_period_ms: u64) -> Vec<BeatEvent> {
        let mut events = Vec::new();
        for cycle in first_cycle..first_cycle + cycles {
            let raw = square_wave(cycle, wave_period_ms);
            if let Some(event) = channel.process(raw, cycle * PERIOD_MS) {
                events.push(event);
            }
        }
        events
    }

    #[test]
    fn square_wave_yields_ibis_equal_to_the_wave_period() {
        let mut channel = Channel::new(0, square_wave(0, 800));
        // 2000 cycles = 40 s = 50 full wave periods.
        let events = drive(&mut channel, 0, 2000, 800);

        assert!(events.len() >= 45, "expected a beat per period, got {}", events.len());
        // First accepted beat is suppressed; everything emitted after the
        // envelope settles measures exactly one period.
        for event in &events[1..] {
            assert_eq!(event.ibi_ms, 800);
        }
    }

    #[test]
    fn refractory_holds_across_the_whole_run() {
        let mut channel = Channel::new(0, square_wave(0, 800));
        let events = drive(&mut channel, 0, 2000, 800);
        for event in &events {
            assert!(u64::from(event.ibi_ms) >= REFRACTORY_MS);
        }
    }

    #[test]
    fn constant_input_from_seed_stays_disconnected() {
        let mut channel = Channel::new(1, 1000);
        for cycle in 0..200u64 {
            assert_eq!(channel.process(1000, cycle * PERIOD_MS), None);
        }
        assert!(!channel.is_connected());
        let snapshot = channel.snapshot();
        assert!(snapshot.envelope_max - snapshot.envelope_min < MIN_RANGE);
    }

    #[test]
    fn forty_nine_flat_cycles_keep_contact_fifty_drop_it() {
        // Establish a wide envelope and live contact first.
        let mut channel = Channel::new(0, square_wave(0, 800));
        drive(&mut channel, 0, 500, 800);
        assert!(channel.is_connected());

        // The drop from the wave to 1500 is one last big delta that resets
        // the flat run; the near-flat drift starts after it.
        channel.process(1500, 500 * PERIOD_MS);
        assert!(channel.is_connected());

        // +4 per cycle stays under the movement threshold while the
        // envelope span stays wide: 49 flat cycles keep contact.
        let mut raw = 1500;
        for cycle in 501..501 + u64::from(FLAT_LIMIT) - 1 {
            raw += 4;
            channel.process(raw, cycle * PERIOD_MS);
            assert!(channel.is_connected(), "cycle {}", cycle);
        }
        // The 50th flat cycle trips the flatline monitor.
        channel.process(raw + 4, (501 + u64::from(FLAT_LIMIT)) * PERIOD_MS);
        assert!(!channel.is_connected());
    }

    #[test]
    fn reconnection_reports_the_full_gap_as_one_interval() {
        let mut channel = Channel::new(0, square_wave(0, 800));
        let before = drive(&mut channel, 0, 500, 800);
        assert!(!before.is_empty());

        // 10 s of flat signal inside the envelope: flatline disconnect.
        for cycle in 500..1000u64 {
            assert_eq!(channel.process(1500, cycle * PERIOD_MS), None);
        }
        assert!(!channel.is_connected());

        // Signal returns. The beat clock kept its pre-disconnection value,
        // so the first accepted beat spans the whole gap.
        let after = drive(&mut channel, 1000, 500, 800);
        assert!(channel.is_connected());
        assert!(!after.is_empty());
        assert!(
            u64::from(after[0].ibi_ms) > 9_000,
            "gap interval was {} ms",
            after[0].ibi_ms
        );
        // The gap beat fires the moment contact returns, off the wave's
        // phase, so one shorter-or-longer interval re-syncs the rhythm and
        // everything after it measures exactly one period again.
        for event in &after[2..] {
            assert_eq!(event.ibi_ms, 800);
        }
    }

    #[test]
    fn snapshot_tracks_the_envelope() {
        let mut channel = Channel::new(2, 1500);
        channel.process(2000, 0);
        channel.process(1000, PERIOD_MS);
        let snapshot = channel.snapshot();
        assert!(snapshot.envelope_max > snapshot.envelope_min);
        assert!(snapshot.smoothed <= snapshot.envelope_max);
        assert!(snapshot.smoothed >= snapshot.envelope_min);
    }
}
