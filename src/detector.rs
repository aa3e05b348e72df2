//! # Beat Detection Module
//!
//! Rising-edge threshold detection over the smoothed signal, producing one
//! `BeatEvent` per accepted heartbeat with its inter-beat interval (IBI).
//!
//! ## Detection rule
//! The threshold sits at 6/10 of the current envelope span above the floor
//! (integer arithmetic, truncating). A beat is the cycle where the smoothed
//! value crosses from below to at-or-above that threshold. The edge latch
//! updates on every cycle the detector runs, so one crossing cannot fire
//! twice.
//!
//! ## Policies, not errors
//! - A crossing inside the 300 ms refractory window is discarded without
//!   touching the beat clock (double-trigger noise, hard cap 200 bpm).
//! - The first beat ever seen on a channel only starts the beat clock; with
//!   no reference interval there is nothing to report.
//! - The beat clock survives disconnections. The first beat after a
//!   reconnection therefore reports the whole disconnected gap as its IBI.
//!   Downstream consumers bound the IBIs they accept; changing this here
//!   would silently change what they observe.

/// Numerator/denominator of the threshold position within the envelope.
const THRESHOLD_NUM: i32 = 6;
const THRESHOLD_DEN: i32 = 10;
/// Minimum accepted spacing between beats (hard cap of 200 bpm).
pub const REFRACTORY_MS: u64 = 300;

/// One detected heartbeat on one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BeatEvent {
    pub channel: usize,
    pub ibi_ms: u32,
}

/// Per-channel rising-edge detector with refractory period.
///
/// The caller must not invoke `update` while its channel is disconnected;
/// skipping the call freezes the edge latch so detection resumes cleanly
/// instead of firing on stale state.
pub struct BeatDetector {
    above_threshold: bool,
    last_beat_ms: u64,
    last_ibi_ms: u32,
    first_beat_seen: bool,
}

impl BeatDetector {
    pub fn new() -> Self {
        Self {
            above_threshold: false,
            last_beat_ms: 0,
            last_ibi_ms: 0,
            first_beat_seen: false,
        }
    }

    /// Evaluate one smoothed sample against the current envelope.
    ///
    /// `now_ms` is the engine's monotonic cycle timestamp; it never moves
    /// backwards.
    pub fn update(
        &mut self,
        channel: usize,
        smoothed: i32,
        envelope_min: i32,
        envelope_max: i32,
        now_ms: u64,
    ) -> Option<BeatEvent> {
        let threshold = envelope_min + (envelope_max - envelope_min) * THRESHOLD_NUM / THRESHOLD_DEN;

        let above = smoothed >= threshold;
        let rising = above && !self.above_threshold;
        self.above_threshold = above;

        if !rising {
            return None;
        }

        let elapsed = now_ms - self.last_beat_ms;
        if elapsed < REFRACTORY_MS {
            return None;
        }

        if !self.first_beat_seen {
            self.first_beat_seen = true;
            self.last_beat_ms = now_ms;
            return None;
        }

        self.last_beat_ms = now_ms;
        self.last_ibi_ms = elapsed as u32;
        Some(BeatEvent {
            channel,
            ibi_ms: self.last_ibi_ms,
        })
    }

    pub fn last_ibi_ms(&self) -> u32 {
        self.last_ibi_ms
    }
}
