//! Status surface of the node: the engine publishes updates over an
//! unbounded channel and the main thread logs them. The LED indicator and
//! any richer monitoring hang off this same stream.

use crossbeam_channel::Receiver;

/// One observable state change inside the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineUpdate {
    Beat { channel: usize, ibi_ms: u32 },
    Contact { channel: usize, connected: bool },
    Link { up: bool },
}

/// Consume engine updates until the engine goes away.
///
/// Runs on the main thread; blocks on the channel, never on the engine.
pub fn run_observer(updates: Receiver<EngineUpdate>, channel_count: usize) {
    let mut beat_counts = vec![0u64; channel_count];

    for update in updates.iter() {
        match update {
            EngineUpdate::Beat { channel, ibi_ms } => {
                if let Some(count) = beat_counts.get_mut(channel) {
                    *count += 1;
                }
                log::info!(
                    "channel {}: beat #{} ibi={} ms (~{} bpm)",
                    channel,
                    beat_counts.get(channel).copied().unwrap_or(0),
                    ibi_ms,
                    bpm_from_ibi(ibi_ms)
                );
            }
            EngineUpdate::Contact { channel, connected } => {
                if connected {
                    log::info!("channel {}: contact restored", channel);
                } else {
                    log::warn!("channel {}: no contact", channel);
                }
            }
            EngineUpdate::Link { up } => {
                if up {
                    log::info!("event link up");
                } else {
                    log::warn!("event link down, events will be dropped");
                }
            }
        }
    }

    log::info!("engine update channel closed, observer exiting");
}

/// Rounded beats-per-minute for one interval; 0 for a degenerate IBI.
fn bpm_from_ibi(ibi_ms: u32) -> u32 {
    if ibi_ms == 0 {
        return 0;
    }
    (60_000 + ibi_ms / 2) / ibi_ms
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bpm_rounds_to_the_nearest_beat() {
        assert_eq!(bpm_from_ibi(1000), 60);
        assert_eq!(bpm_from_ibi(800), 75);
        assert_eq!(bpm_from_ibi(799), 75);
        assert_eq!(bpm_from_ibi(0), 0);
    }
}
