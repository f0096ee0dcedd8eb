//! Priority-mute drill
//!
//! Runs four participants on an in-process loopback net: Command triggers a
//! priority mute, a Scout is locked out, a Pioneer acknowledges, the Scout
//! transmits again.

use anyhow::{Context, Result};
use futures_util::future::try_join_all;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tacnet_voice::{
    config::AppConfig,
    network::{LoopbackHub, LoopbackTransport, StaticDirectory, StaticTokenService},
    protocol::{FlareVariant, Position},
    session::Session,
    speech::TracingSpeechSink,
    tactical::TacticalCoordinator,
};

const ROOM: &str = "OPS-1";

async fn join(
    config: &AppConfig,
    hub: &Arc<LoopbackHub>,
    identity: &str,
    role: &str,
    position: Position,
) -> Result<Arc<TacticalCoordinator>> {
    let session = Arc::new(Session::new(
        config,
        Arc::new(LoopbackTransport::new(hub.clone()).with_sample_rate(config.audio.sample_rate)),
        Arc::new(StaticTokenService::new("loopback://drill")),
        Arc::new(StaticDirectory::new(config.nets.clone())),
    ));
    session.set_position(position).await?;
    let events = session
        .connect(ROOM, identity, role)
        .await
        .with_context(|| format!("{} failed to join {}", identity, ROOM))?;

    let coordinator = Arc::new(TacticalCoordinator::new(
        session,
        Arc::new(TracingSpeechSink),
        config.stage,
    ));
    let runner = coordinator.clone();
    tokio::spawn(async move { runner.run(events).await });
    Ok(coordinator)
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => AppConfig::load(Path::new(&path))?,
        None => AppConfig::load_default()?,
    };
    tracing::info!("Starting priority-mute drill on {}", ROOM);

    let hub = LoopbackHub::new();
    let roster = [
        ("alpha", "Command", Position::new(480.0, 100.0)),
        ("bravo", "Scout", Position::new(100.0, 320.0)),
        ("charlie", "Scout", Position::new(860.0, 320.0)),
        ("delta", "Pioneer", Position::new(480.0, 600.0)),
    ];
    let nodes = try_join_all(
        roster
            .iter()
            .map(|(identity, role, position)| join(&config, &hub, identity, role, *position)),
    )
    .await?;
    let [alpha, bravo, charlie, delta] = [&nodes[0], &nodes[1], &nodes[2], &nodes[3]];
    settle().await;

    tracing::info!(participants = ?hub.participants(), "All participants joined");

    bravo.session().set_microphone_enabled(true).await?;
    charlie.session().set_microphone_enabled(true).await?;
    hub.report_link_quality("charlie", 0.6);
    settle().await;

    alpha.publish_mute_all().await?;
    settle().await;

    let reopened = bravo.session().set_microphone_enabled(true).await?;
    println!("bravo reopen during priority mute: {}", if reopened { "allowed" } else { "blocked" });

    delta.publish_ack().await?;
    settle().await;

    let reopened = bravo.session().set_microphone_enabled(true).await?;
    println!("bravo reopen after acknowledgment: {}", if reopened { "allowed" } else { "blocked" });

    charlie.publish_flare(FlareVariant::Medical, "HUR-L1").await?;
    settle().await;

    println!("\n=== Session States ===");
    for node in &nodes {
        let snapshot = node.session().snapshot();
        println!(
            "  {:8} {:8} {:?}/{:?} override={} channels={}",
            snapshot.identity.unwrap_or_default(),
            snapshot.role,
            snapshot.connection,
            snapshot.audio,
            snapshot.mute_override.active,
            node.session().audio_chain().len(),
        );
    }

    for node in &nodes {
        node.session().disconnect();
    }
    tracing::info!("Drill complete");
    Ok(())
}
