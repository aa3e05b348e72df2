//! # Channel Orchestrator Module
//!
//! The fixed-period scheduler that drives every channel through the
//! pipeline in lock-step: one raw sample per channel per 20 ms cycle,
//! smoothing → contact monitoring → baseline tracking → beat detection →
//! transmission. Single-threaded and cooperative; the only blocking-shaped
//! step is sample acquisition, which the source contract requires to be
//! fast.
//!
//! ## Timing
//! The loop reads the monotonic clock once per iteration and sleeps to the
//! next 20 ms deadline. All per-channel work is O(1), which is how the
//! cycle deadline is met; an overrun is not recovered at runtime, only
//! noted at debug level while the deadline re-anchors.
//!
//! ## Decoupling
//! Link readiness is polled at most once per 5 s so a slow probe cannot
//! desynchronize beat timing, and status updates go over an unbounded
//! channel so a slow observer cannot stall a cycle.

use crate::channel::Channel;
use crate::gateway::{BeatGateway, EventLink};
use crate::source::SampleSource;
use crate::status::EngineUpdate;
use crossbeam_channel::Sender;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Sampling period of the whole pipeline (50 Hz).
pub const SAMPLE_PERIOD_MS: u64 = 20;
/// Minimum spacing between link readiness probes.
const LINK_POLL_INTERVAL_MS: u64 = 5_000;
/// Cycles between per-channel diagnostic log lines (10 s at 50 Hz).
const DIAG_INTERVAL_CYCLES: u64 = 500;

/// Owns every channel and all process-wide scheduler state. Channels are
/// value structs in a plain vector; nothing here is shared across threads.
pub struct Engine<S: SampleSource, L: EventLink> {
    source: S,
    gateway: BeatGateway<L>,
    updates: Sender<EngineUpdate>,
    channel_count: usize,
    channels: Vec<Channel>,
    cycle: u64,
    link_up: Option<bool>,
    last_link_poll_ms: Option<u64>,
}

impl<S: SampleSource, L: EventLink> Engine<S, L> {
    pub fn new(
        channel_count: usize,
        source: S,
        gateway: BeatGateway<L>,
        updates: Sender<EngineUpdate>,
    ) -> Self {
        Self {
            source,
            gateway,
            updates,
            channel_count,
            channels: Vec::new(),
            cycle: 0,
            link_up: None,
            last_link_poll_ms: None,
        }
    }

    /// Take the first real reading per channel and seed the pipelines.
    pub fn start(&mut self) {
        let mut channels = Vec::with_capacity(self.channel_count);
        for id in 0..self.channel_count {
            let seed = self.source.read_sample(id);
            log::info!("channel {} seeded at {}", id, seed);
            channels.push(Channel::new(id, seed));
        }
        self.channels = channels;
    }

    /// Run one full cycle across all channels.
    ///
    /// No step touches more than one channel's state; a disconnected
    /// channel changes nothing for its neighbors.
    pub fn tick(&mut self, now_ms: u64) {
        self.cycle += 1;
        self.poll_link(now_ms);

        for id in 0..self.channels.len() {
            let raw = self.source.read_sample(id);
            let channel = &mut self.channels[id];

            let was_connected = channel.is_connected();
            let event = channel.process(raw, now_ms);

            if channel.is_connected() != was_connected {
                let _ = self.updates.send(EngineUpdate::Contact {
                    channel: id,
                    connected: channel.is_connected(),
                });
            }

            if let Some(beat) = event {
                self.gateway.send(beat.channel, beat.ibi_ms);
                let _ = self.updates.send(EngineUpdate::Beat {
                    channel: beat.channel,
                    ibi_ms: beat.ibi_ms,
                });
            }
        }

        if self.cycle % DIAG_INTERVAL_CYCLES == 0 {
            self.log_diagnostics(now_ms);
        }
    }

    /// Fixed-period loop; returns when the stop flag is set. Normally the
    /// node runs until power-down and the flag is never raised.
    pub fn run(mut self, stop: Arc<AtomicBool>) {
        self.start();

        let started = Instant::now();
        let period = Duration::from_millis(SAMPLE_PERIOD_MS);
        let mut deadline = started + period;

        while !stop.load(Ordering::Relaxed) {
            let now_ms = started.elapsed().as_millis() as u64;
            self.tick(now_ms);

            match deadline.checked_duration_since(Instant::now()) {
                Some(remaining) => thread::sleep(remaining),
                None => {
                    log::debug!("cycle {} overran the sampling period", self.cycle);
                    deadline = Instant::now();
                }
            }
            deadline += period;
        }

        log::info!("engine stopped after {} cycles", self.cycle);
    }

    fn poll_link(&mut self, now_ms: u64) {
        let due = match self.last_link_poll_ms {
            None => true,
            Some(last) => now_ms - last >= LINK_POLL_INTERVAL_MS,
        };
        if !due {
            return;
        }

        self.last_link_poll_ms = Some(now_ms);
        let up = self.gateway.poll_link();
        if self.link_up != Some(up) {
            self.link_up = Some(up);
            let _ = self.updates.send(EngineUpdate::Link { up });
        }
    }

    fn log_diagnostics(&self, now_ms: u64) {
        for channel in &self.channels {
            let snapshot = channel.snapshot();
            log::debug!(
                "t={} ms channel {}: smoothed={} envelope=[{}, {}] last_ibi={} connected={}",
                now_ms,
                channel.id(),
                snapshot.smoothed,
                snapshot.envelope_min,
                snapshot.envelope_max,
                snapshot.last_ibi_ms,
                snapshot.connected
            );
        }
    }
}
