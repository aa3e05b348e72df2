mod channel;
mod config;
mod contact;
mod detector;
mod engine;
mod envelope;
mod error;
mod filter;
mod gateway;
mod source;
mod status;

use config::Config;
use engine::Engine;
use gateway::{BeatGateway, UdpLink};
use source::SyntheticPulse;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

fn main() {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            log::warn!("{}; running with defaults", e);
            Config::default()
        }
    };
    log::info!(
        "pulsegrid node: {} channel(s), events to {}:{} under {}",
        config.channel_count,
        config.target_host,
        config.target_port,
        config.path_prefix
    );

    let link = match UdpLink::new(&config.target_host, config.target_port) {
        Ok(link) => link,
        Err(e) => {
            log::error!("{}", e);
            std::process::exit(1);
        }
    };
    let gateway = BeatGateway::new(link, &config.path_prefix, config.channel_count);

    // The shipped build samples the synthetic source; a hardware ADC
    // backend plugs in through the same SampleSource seam.
    let source = SyntheticPulse::new(config.channel_count, config.simulator_bpm);

    // Engine updates flow to the observer on this thread; the engine owns
    // the sampling loop on its own thread and never blocks on us.
    let (sender, receiver) = crossbeam_channel::unbounded();
    let engine = Engine::new(config.channel_count, source, gateway, sender);

    let stop = Arc::new(AtomicBool::new(false));
    let engine_stop = stop.clone();
    std::thread::spawn(move || {
        engine.run(engine_stop);
    });

    status::run_observer(receiver, config.channel_count);
}
