//! Arena Sync Demo
//!
//! Runs a host and a few in-process clients over loopback links with
//! scripted input, then checks every participant converged on the host's
//! replicated state.

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use arena_sync::{
    ArenaConfig, LocalNetwork, VERSION,
    core::hash::short_hex,
    game::movement::InputSample,
    network::Bootstrap,
    presentation::TracingPresenter,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ArenaConfig::from_env();

    info!("Arena Sync v{}", VERSION);
    info!("Tick Rate: {} Hz", config.net.tick_rate);
    info!("Round: {} seconds", config.round.round_seconds);

    let mut bootstrap = Bootstrap::new(config.clone(), TracingPresenter::shared("local"));

    let mut network = match bootstrap.debug_start()? {
        Some(network) => network,
        None => {
            info!("start mode {}, choosing host", config.net.start_mode);
            bootstrap.start_as_host(&config.net.start_scene)?
        }
    };

    for i in 0..config.demo.clients {
        let presenter = TracingPresenter::shared(format!("client-{}", i + 1));
        let id = network.connect_client(config.clone(), presenter)?;
        info!("Demo client {} joined", id);
    }

    info!("=== Running Demo Session ===");
    let report_every = u64::from(config.net.tick_rate) * 3;
    let ran = network
        .run(config.demo.ticks, config.net.tick_rate, |net, t| {
            drive_inputs(net, t);
            if t > 0 && t % report_every == 0 {
                report_scores(net, t);
            }
        })
        .await?;

    // Let in-flight replication land
    network.step()?;

    info!("=== Session Results ({} ticks) ===", ran);
    report_scores(&network, ran);

    for (client, digest) in network.digests() {
        info!("Participant {} digest: {}", client, short_hex(&digest));
    }
    if network.is_converged() {
        info!("CONVERGED: every participant matches the host");
    } else {
        warn!("DIVERGED: replicated state differs from the host");
    }

    if let Some(id) = bootstrap.local_client() {
        if network.client(id).map_or(true, |c| c.is_closed()) {
            bootstrap.on_client_disconnected(id);
        }
    }

    network.shutdown_host();
    Ok(())
}

/// Scripted joystick: each participant weaves, strafes now and then, and
/// fires every half second.
fn drive_inputs(network: &mut LocalNetwork, t: u64) {
    let mut ids = vec![0];
    ids.extend(network.client_ids());

    for (i, id) in ids.into_iter().enumerate() {
        let phase = t as f32 * 0.07 + i as f32 * 1.3;
        let sample = InputSample::new(
            phase.sin(),
            phase.cos(),
            (t / 45 + i as u64) % 2 == 0,
            (t + i as u64 * 5) % 15 == 0,
        );

        let participant = if id == 0 {
            Some(network.host_mut())
        } else {
            network.client_mut(id)
        };
        if let Some(participant) = participant {
            // Clients have no entity until the host's spawn arrives
            let _ = participant.push_input(sample);
        }
    }
}

fn report_scores(network: &LocalNetwork, t: u64) {
    let state = network.host().state();
    for entity in state.entities.values() {
        info!(
            "Tick {}: entity {} (client {}) score {} tier {}",
            t,
            entity.id.0,
            entity.owner,
            entity.score.get(),
            entity.damage_tier.get()
        );
    }
}
