//! Shared debug canvas: a relay server for `DebugPoint` frames and a small
//! probe client that draws a few points through it.
//!
//! ```text
//! point-relay serve --bind 0.0.0.0:8080
//! point-relay probe --url ws://127.0.0.1:8080 --count 5
//! ```
//!
//! Log verbosity follows `RUST_LOG` (default `info`).

mod relay;

use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use treadlink::prelude::*;

use crate::relay::PointRelay;

#[derive(Parser)]
#[command(name = "point-relay", version, about = "treadlink debug point relay")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Accept peers and relay every point to all of them.
    Serve {
        #[arg(long, default_value = "0.0.0.0:8080")]
        bind: String,
    },
    /// Connect, draw a diagonal of points, and print what comes back.
    Probe {
        #[arg(long, default_value = LinkConfig::DEFAULT_SERVER_URL)]
        url: String,
        #[arg(long, default_value_t = 5)]
        count: u16,
        /// How long to wait for echoes before exiting, in milliseconds.
        #[arg(long, default_value_t = 500)]
        linger_ms: u64,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match Cli::parse().command {
        Command::Serve { bind } => {
            let relay = PointRelay::bind(&bind).await?;
            relay.run().await?;
        }
        Command::Probe {
            url,
            count,
            linger_ms,
        } => probe(url, count, Duration::from_millis(linger_ms)).await?,
    }
    Ok(())
}

async fn probe(url: String, count: u16, linger: Duration) -> Result<(), LinkError> {
    let link = LinkClient::builder().server_url(url).build();
    let _echo = link
        .register_listener(PacketKind::DebugPoint, |packet| {
            if let Packet::DebugPoint(point) = packet {
                tracing::info!(x = point.x, y = point.y, "point echoed");
            }
        })
        .await?;

    link.force_reconnect().await?;
    for i in 0..count {
        let step = i.saturating_mul(10);
        link.send(Packet::DebugPoint(DebugPoint {
            x: step,
            y: step,
            intensity: 255,
        }))
        .await?;
    }

    tokio::time::sleep(linger).await;
    let stats = link.stats();
    tracing::info!(
        sent = stats.frames_sent,
        received = stats.frames_received,
        dropped = stats.frames_dropped,
        "probe finished"
    );
    link.shutdown().await
}
