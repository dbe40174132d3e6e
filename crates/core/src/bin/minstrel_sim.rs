//! Runs Minstrel-HT against simulated lossy links on virtual time and prints
//! what it learned.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use minstrel_ht::config::{set_logger, Config};
use minstrel_ht::phy::{
    ChannelWidth, HtPhyModel, MacAddr, StationCapabilities, TxMode, TxVector, WifiPhy,
};
use minstrel_ht::simulation::{LossyChannel, SimulationRng, TimeSource, VirtualTime};
use minstrel_ht::{MinstrelHtManager, StationStats};

#[derive(Parser, Debug)]
#[command(name = "minstrel-sim", about = "Minstrel-HT rate adaptation simulator")]
struct Args {
    /// TOML configuration file.
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Overrides the seed of the configuration.
    #[arg(long, env = "MINSTREL_SEED")]
    seed: Option<u64>,

    /// Frames sent to every peer.
    #[arg(long, default_value_t = 20_000)]
    frames: u32,

    /// Start distance of each peer in metres; one peer per value.
    #[arg(long, value_delimiter = ',', default_value = "10,40")]
    distance: Vec<f64>,

    /// Distance every peer ends at; peers move linearly when set.
    #[arg(long)]
    end_distance: Option<f64>,

    /// Spatial streams the peers can receive.
    #[arg(long, default_value_t = 2)]
    streams: u8,

    /// Peers only understand legacy rates.
    #[arg(long)]
    legacy: bool,

    #[arg(long, env = "LOG_LEVEL")]
    log_level: Option<tracing::level_filters::LevelFilter>,

    /// Also print the sample table of each peer.
    #[arg(long)]
    dump_tables: bool,
}

struct Peer {
    addr: MacAddr,
    channel: LossyChannel,
    start: f64,
    delivered: u64,
    dropped: u64,
}

fn airtime(phy: &dyn WifiPhy, frame_len: u32, vector: &TxVector) -> Duration {
    let data = match vector.mode {
        TxMode::Ht { mcs } => phy.ht_tx_duration(
            frame_len,
            mcs,
            vector.streams,
            vector.short_guard_interval,
            vector.channel_width,
        ),
        TxMode::Legacy { index } => phy.legacy_tx_duration(frame_len, index),
    };
    data + phy.ack_timeout()
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => Config::default(),
    };
    set_logger(args.log_level.or_else(|| config.log_level()));

    if let Some(seed) = args.seed {
        config.minstrel.seed = Some(seed);
    }
    let seed = *config
        .minstrel
        .seed
        .get_or_insert_with(|| SimulationRng::from_entropy().seed());
    let frame_len = config.minstrel.frame_length;

    let time = VirtualTime::new();
    let mut manager = MinstrelHtManager::with_time_source(
        Box::new(HtPhyModel::default()),
        config.minstrel.clone(),
        time.clone(),
    )?;
    let events = std::sync::Arc::new(std::sync::atomic::AtomicU64::new(0));
    let counter = events.clone();
    manager.on_rate_change(move |_| {
        counter.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    });

    let channel_rng = SimulationRng::new(seed).child_with_index(u64::MAX);
    let mut peers: Vec<Peer> = args
        .distance
        .iter()
        .enumerate()
        .map(|(i, &distance)| {
            let addr = MacAddr::from_index(i as u32 + 1);
            let capabilities = if args.legacy {
                StationCapabilities::legacy(8)
            } else {
                StationCapabilities::ht(args.streams, true, ChannelWidth::Mhz40, 8)
            };
            manager.set_station_capabilities(addr, capabilities);
            Peer {
                addr,
                channel: LossyChannel::new(
                    config.channel.clone(),
                    distance,
                    channel_rng.child_with_index(i as u64),
                ),
                start: distance,
                delivered: 0,
                dropped: 0,
            }
        })
        .collect();
    anyhow::ensure!(!peers.is_empty(), "at least one peer distance is required");

    for frame in 0..args.frames {
        for peer in &mut peers {
            if let Some(end) = args.end_distance {
                let progress = f64::from(frame) / f64::from(args.frames.max(1));
                peer.channel.set_distance(peer.start + (end - peer.start) * progress);
            }
            loop {
                let vector = manager.data_tx_vector(peer.addr);
                time.advance(airtime(manager.phy(), frame_len, &vector));
                if peer.channel.deliver(&vector) {
                    manager.report_data_ok(peer.addr);
                    peer.delivered += 1;
                    break;
                }
                manager.report_data_failed(peer.addr);
                if !manager.need_data_retransmission(peer.addr) {
                    manager.report_final_data_failed(peer.addr);
                    peer.dropped += 1;
                    break;
                }
            }
        }
    }

    println!(
        "seed {seed}, {} frames per peer, {:.3}s simulated, {} rate changes",
        args.frames,
        time.now().as_secs_f64(),
        events.load(std::sync::atomic::Ordering::Relaxed)
    );
    for peer in &peers {
        println!();
        println!(
            "peer {} at {:.1}m (snr {:.1} dB): {} delivered, {} dropped",
            peer.addr,
            peer.channel.distance(),
            peer.channel.snr_db(ChannelWidth::Mhz20),
            peer.delivered,
            peer.dropped
        );
        print_stats(manager.station_snapshot(peer.addr));
        if args.dump_tables {
            if let Some(table) = manager.sample_table_dump(peer.addr) {
                println!("sample table:\n{table}");
            }
        }
    }
    Ok(())
}

fn print_stats(stats: Option<StationStats>) {
    match stats {
        Some(StationStats::Ht(s)) => {
            println!(
                "  HT  tx {}  max_tp {}  max_tp2 {}  max_prob {}  err {}",
                s.tx_rate, s.max_tp, s.max_tp2, s.max_prob, s.err
            );
            println!("  rate       prob%   throughput  retries  attempts");
            for (id, rate) in s.rates.iter().filter(|(_, r)| r.attempt_hist > 0) {
                println!(
                    "  {:<9} {:>6.1} {:>12} {:>8} {:>9}",
                    id.to_string(),
                    f64::from(rate.ewma_prob) / 180.0,
                    rate.throughput,
                    rate.adjusted_retry_count,
                    rate.attempt_hist
                );
            }
        }
        Some(StationStats::Legacy(s)) => {
            println!(
                "  legacy  tx {}  max_tp {}  max_tp2 {}  max_prob {}  err {}",
                s.tx_rate, s.max_tp, s.max_tp2, s.max_prob, s.err
            );
            println!("  mode  prob%   throughput  retries  attempts");
            for (mode, rate) in s.rates.iter().enumerate() {
                println!(
                    "  {:<4} {:>6.1} {:>12} {:>8} {:>9}",
                    mode,
                    f64::from(rate.ewma_prob) / 180.0,
                    rate.throughput,
                    rate.adjusted_retry_count,
                    rate.attempt_hist
                );
            }
        }
        None => println!("  never initialized"),
    }
}
