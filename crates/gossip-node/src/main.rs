mod events;

use anyhow::Context;
use clap::Parser;
use events::{emit, EventIntervalChange, EventStarted, EventStats, EventStopped};
use gossip_discovery::{broadcast_address, GossipConfig, GossipService, DEFAULT_PORT};
use std::net::Ipv4Addr;
use std::time::{Duration, Instant};

#[derive(Parser)]
#[command(name = "gossip-node", about = "Gossip peer discovery node")]
struct Cli {
    /// Local IPv4 address to bind.
    #[arg(long, env = "GOSSIP_BIND", default_value = "0.0.0.0")]
    bind: Ipv4Addr,

    /// Local UDP port.
    #[arg(short, long, env = "GOSSIP_PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Port peers listen on (default: same as --port).
    #[arg(long, env = "GOSSIP_DEST_PORT")]
    dest_port: Option<u16>,

    /// Base interval between broadcast sweeps in ms.
    #[arg(long, env = "GOSSIP_INTERVAL_MS", default_value = "1000")]
    interval_ms: u64,

    /// Upper bound of the random jitter added to each interval, in ms.
    #[arg(long, env = "GOSSIP_MAX_JITTER_MS", default_value = "100")]
    max_jitter_ms: u64,

    /// Seed peers (IPv4 or host names). Repeat or comma-separate.
    #[arg(long, value_delimiter = ',')]
    seed: Vec<String>,

    /// Seed with the broadcast address of the first multicast-capable interface.
    #[arg(long)]
    broadcast_seed: bool,

    /// Switch to this interval once the warmup period is over.
    #[arg(long)]
    steady_interval_ms: Option<u64>,

    /// Warmup period in seconds before --steady-interval-ms applies.
    #[arg(long, default_value = "30")]
    warmup_secs: u64,

    /// Seconds between JSONL stats lines.
    #[arg(long, default_value = "10")]
    stats_interval: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let start = Instant::now();

    let mut config = GossipConfig::new(cli.bind, cli.port)
        .interval(Duration::from_millis(cli.interval_ms))
        .max_jitter(Duration::from_millis(cli.max_jitter_ms))
        .broadcast(cli.broadcast_seed);
    if let Some(dest) = cli.dest_port {
        config = config.dest_port(dest);
    }

    let service = GossipService::new(config);

    for seed in &cli.seed {
        let peer = service
            .add_known_peer(seed)
            .await
            .with_context(|| format!("invalid seed '{seed}'"))?;
        tracing::info!("Seed peer {seed} -> {peer}");
    }

    if cli.broadcast_seed {
        match broadcast_address() {
            Some(addr) => {
                service.add_peer(addr);
                tracing::info!("Seeded broadcast address {addr}");
            }
            None => tracing::warn!("No multicast-capable interface with a broadcast address"),
        }
    }

    service.start().await.context("failed to start gossip service")?;

    let local = service
        .local_addr()
        .map(|a| a.to_string())
        .unwrap_or_default();
    eprintln!("gossip-node v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("Listening on {local}. Press Ctrl+C to stop.\n");
    emit(&EventStarted::new(
        local,
        service.peers().len(),
        cli.interval_ms,
    ));

    let mut stats_tick = tokio::time::interval(Duration::from_secs(cli.stats_interval.max(1)));
    stats_tick.tick().await;

    let warmup = tokio::time::sleep(Duration::from_secs(cli.warmup_secs));
    tokio::pin!(warmup);
    let mut steady_pending = cli.steady_interval_ms;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                eprintln!("\nCtrl+C received, shutting down...");
                break;
            }
            _ = stats_tick.tick() => {
                emit(&EventStats::new(
                    &service.records(),
                    service.stats(),
                    start.elapsed().as_secs_f64(),
                ));
            }
            _ = &mut warmup, if steady_pending.is_some() => {
                if let Some(ms) = steady_pending.take() {
                    service.set_interval(Duration::from_millis(ms));
                    emit(&EventIntervalChange {
                        event: "interval_change",
                        interval_ms: ms,
                        elapsed_s: start.elapsed().as_secs_f64(),
                    });
                }
            }
        }
    }

    service.stop(true).await;
    emit(&EventStopped::new(service.records(), service.stats()));
    Ok(())
}
