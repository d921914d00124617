//! Run a simulated collection tree and log what reaches the host.
//!
//! Usage: `motesim [mesh.yaml] [seconds]`. Without a file a four-mote demo
//! tree is used. Set `RUST_LOG=moteflow=debug` to follow drops and retries.

use std::time::Duration;

use anyhow::{Context, Result};
use futures::StreamExt;
use moteflow::{MeshBuilder, MeshConfig};
use tracing::info;

const DEMO_MESH: &str = "
nodes:
  - id: 50
  - id: 7
    parent: 50
    link_quality: 40
  - id: 3
    parent: 7
    link_quality: 60
    samples: [[10, -5, 100], [11, -6, 101], ~, [12, -4, 98]]
  - id: 4
    parent: 7
    link_quality: 75
    forwarding: false
    samples: [[-200, 15, 980]]
";

const DEFAULT_RUN_SECONDS: u64 = 20;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    init_tracing();

    let mut args = std::env::args().skip(1);
    let yaml = match args.next() {
        Some(path) => std::fs::read_to_string(&path).with_context(|| format!("reading mesh file {path}"))?,
        None => DEMO_MESH.to_string(),
    };
    let seconds = match args.next() {
        Some(raw) => raw.parse().with_context(|| format!("invalid run time {raw:?}"))?,
        None => DEFAULT_RUN_SECONDS,
    };

    let config = MeshConfig::from_yaml(&yaml).context("invalid mesh configuration")?;
    let mut mesh = MeshBuilder::new(config).launch()?;
    let mut uplink = mesh.uplink().context("uplink already taken")?;

    info!(seconds, "Simulation running");
    let deadline = tokio::time::sleep(Duration::from_secs(seconds));
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = &mut deadline => break,
            packet = uplink.next() => {
                let Some(packet) = packet else { break };
                let sample = packet.sample();
                info!(
                    origin = %packet.origin(),
                    hops = packet.hop_count(),
                    quality = packet.quality(),
                    path = ?packet.message_path(),
                    x = sample.x,
                    y = sample.y,
                    z = sample.z,
                    "Host received packet"
                );
            }
        }
    }

    let stats = mesh.all_stats();
    mesh.shutdown().await;
    println!("{}", serde_yaml_ng::to_string(&stats)?);
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("moteflow=info,motesim=info")),
        )
        .try_init();
}
