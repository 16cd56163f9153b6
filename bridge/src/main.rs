//! arhand-bridge - replays recorded hand landmarks through the gesture
//! classifier and streams tracking packets over UDP.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use calloop::timer::{TimeoutAction, Timer};
use calloop::EventLoop;
use clap::Parser;
use tracing::{info, warn};

use arhand_bridge::replay::Replay;
use arhand_bridge::{BridgeConfig, BridgeSession};

#[derive(Parser, Debug)]
#[command(name = "arhand-bridge", about = "Hand gesture classifier and UDP tracking bridge")]
struct Cli {
    /// Recorded frames, one s-expression plist per line
    #[arg(long, required_unless_present = "version")]
    replay: Option<PathBuf>,

    /// Config plist overriding the defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// Tracking consumer address (host:port)
    #[arg(long)]
    server: Option<SocketAddr>,

    /// Local UDP port for replies (0 = any)
    #[arg(long)]
    local_port: Option<u16>,

    /// Replay frames per second
    #[arg(long)]
    frame_rate: Option<f64>,

    /// Restart the replay when it ends
    #[arg(long = "loop")]
    looping: bool,

    /// Stop after N frames
    #[arg(long)]
    max_frames: Option<u64>,

    /// Classify only; do not open the UDP link
    #[arg(long)]
    no_send: bool,

    /// Show version and exit
    #[arg(long)]
    version: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.version {
        println!("arhand-bridge {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "arhand_bridge=info".into()),
        )
        .init();

    info!("arhand-bridge v{} starting", env!("CARGO_PKG_VERSION"));

    let mut config = match &cli.config {
        Some(path) => BridgeConfig::load(path)?,
        None => BridgeConfig::default(),
    };
    if let Some(server) = cli.server {
        config.link.server = server;
    }
    if let Some(port) = cli.local_port {
        config.link.local_port = port;
    }
    if let Some(rate) = cli.frame_rate {
        anyhow::ensure!(rate > 0.0, "--frame-rate must be positive");
        config.frame_rate_hz = rate;
    }
    info!(config = %config.config_sexp(), "configuration");

    let replay_path = cli.replay.context("--replay is required")?;
    let replay = Replay::load(&replay_path)?;
    if replay.is_empty() {
        warn!(path = %replay_path.display(), "replay has no frames");
    }

    let mut session = BridgeSession::new(&config, replay)?;
    session.set_looping(cli.looping);
    session.set_max_frames(cli.max_frames);
    if !cli.no_send {
        session.start_sending()?;
    }

    let mut event_loop: EventLoop<BridgeSession> =
        EventLoop::try_new().context("failed to create event loop")?;
    let signal = event_loop.get_signal();
    let interval = session.frame_interval();

    // One replay frame per timer tick.
    event_loop
        .handle()
        .insert_source(Timer::from_duration(interval), move |_, _, session| {
            match session.step() {
                Some(report) => {
                    if !report.events.is_empty() {
                        info!(
                            frame = report.index,
                            gesture = report.gesture.as_str(),
                            "frame events"
                        );
                    }
                    TimeoutAction::ToDuration(interval)
                }
                None => {
                    signal.stop();
                    TimeoutAction::Drop
                }
            }
        })
        .map_err(|e| anyhow::anyhow!("failed to insert frame timer: {:?}", e))?;

    info!(
        interval_ms = interval.as_millis() as u64,
        sending = !cli.no_send,
        "entering frame loop"
    );
    event_loop
        .run(None, &mut session, |_| {})
        .context("event loop failed")?;

    session.finish();
    Ok(())
}
