//! Entry point for `udp-file-transfer`.
//!
//! Parses CLI arguments and dispatches into either **server** or **client** mode.
//! All actual protocol work is delegated to library modules; `main.rs` owns only
//! process setup (logging, argument parsing, socket and file opening).

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};

use udp_file_transfer::simulator::{LossyTransport, SimulatorConfig};
use udp_file_transfer::socket::{Transport, UdpTransport};
use udp_file_transfer::timer::TimerConfig;
use udp_file_transfer::trace::{NullTrace, StdoutTrace, TraceSink};
use udp_file_transfer::{Client, Outcome, SaveDir, Server, TransferError};

/// Reliable file transfer over UDP.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Subcommand)]
enum Mode {
    /// Receive files, writing each connection to `<save-dir>/<id>.file`.
    Server {
        /// UDP port to listen on.
        #[arg(short, long, value_parser = clap::value_parser!(u16).range(1..))]
        port: u16,
        /// Directory for received files; created if missing.
        #[arg(short, long)]
        save_dir: PathBuf,
        #[command(flatten)]
        tuning: Tuning,
    },
    /// Send one file to a server.
    Client {
        /// Server host name or address.
        #[arg(long)]
        host: String,
        /// Server UDP port.
        #[arg(short, long, value_parser = clap::value_parser!(u16).range(1..))]
        port: u16,
        /// File to send.
        #[arg(short, long)]
        file: PathBuf,
        #[command(flatten)]
        tuning: Tuning,
    },
}

/// Timeouts and fault injection shared by both modes.
#[derive(Args)]
struct Tuning {
    /// Retransmission timeout in milliseconds.
    #[arg(long, default_value_t = 500)]
    rto_ms: u64,
    /// Inactivity timeout in seconds.
    #[arg(long, default_value_t = 10)]
    connection_timeout_secs: u64,
    /// Drop every N-th outgoing datagram (testing aid).
    #[arg(long)]
    drop_every: Option<u64>,
    /// Drop outgoing datagrams with this probability (testing aid).
    #[arg(long, default_value_t = 0.0)]
    loss_rate: f64,
    /// Seed for `--loss-rate`.
    #[arg(long, default_value_t = 0)]
    seed: u64,
    /// Do not print per-packet trace lines.
    #[arg(short, long)]
    quiet: bool,
}

impl Tuning {
    fn timers(&self) -> TimerConfig {
        TimerConfig {
            retransmission_timeout: Duration::from_millis(self.rto_ms),
            connection_timeout: Duration::from_secs(self.connection_timeout_secs),
            ..TimerConfig::default()
        }
    }

    fn simulator(&self) -> anyhow::Result<SimulatorConfig> {
        if !(0.0..=1.0).contains(&self.loss_rate) {
            bail!("--loss-rate must be between 0 and 1, got {}", self.loss_rate);
        }
        Ok(SimulatorConfig {
            drop_every: self.drop_every,
            loss_rate: self.loss_rate,
            seed: self.seed,
        })
    }

    fn trace(&self) -> Box<dyn TraceSink> {
        if self.quiet {
            Box::new(NullTrace)
        } else {
            Box::new(StdoutTrace)
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialise env_logger; set RUST_LOG to control verbosity.
    env_logger::init();

    let cli = Cli::parse();

    match cli.mode {
        Mode::Server {
            port,
            save_dir,
            tuning,
        } => {
            let save_dir = SaveDir::new(save_dir);
            save_dir
                .ensure_exists()
                .await
                .context("preparing save directory")?;
            let transport = UdpTransport::bind(SocketAddr::from(([0, 0, 0, 0], port))).await?;
            log::info!(
                "Starting server on port {port}, saving to {}",
                save_dir.path().display()
            );

            let sim = tuning.simulator()?;
            if sim.is_transparent() {
                serve(transport, save_dir, &tuning).await
            } else {
                log::warn!("Fault injection enabled: {sim:?}");
                serve(LossyTransport::new(transport, sim), save_dir, &tuning).await
            }
        }
        Mode::Client {
            host,
            port,
            file,
            tuning,
        } => {
            let peer = resolve(&host, port).await?;
            let source = tokio::fs::File::open(&file)
                .await
                .map_err(TransferError::SourceFile)
                .with_context(|| format!("opening {}", file.display()))?;
            let local = if peer.is_ipv4() {
                SocketAddr::from(([0, 0, 0, 0], 0))
            } else {
                SocketAddr::from(([0u16; 8], 0))
            };
            let transport = UdpTransport::bind(local).await?;
            log::info!("Starting client, sending {} to {peer}", file.display());

            let sim = tuning.simulator()?;
            let outcome = if sim.is_transparent() {
                send(transport, peer, source, &tuning).await?
            } else {
                log::warn!("Fault injection enabled: {sim:?}");
                send(LossyTransport::new(transport, sim), peer, source, &tuning).await?
            };
            finish(outcome, peer)
        }
    }
}

/// Timeouts are reported, not failed: the process still exits 0.
fn finish(outcome: Outcome, peer: SocketAddr) -> anyhow::Result<()> {
    match outcome {
        Outcome::Completed => {}
        Outcome::HandshakeTimedOut => log::warn!("Server {peer} did not answer"),
        Outcome::ConnectionTimedOut => log::warn!("Connection to {peer} timed out"),
    }
    Ok(())
}

async fn resolve(host: &str, port: u16) -> anyhow::Result<SocketAddr> {
    let mut addrs = tokio::net::lookup_host((host, port))
        .await
        .with_context(|| format!("resolving {host}"))?;
    match addrs.next() {
        Some(addr) => Ok(addr),
        None => Err(TransferError::Resolve {
            host: host.to_string(),
        }
        .into()),
    }
}

async fn serve<T: Transport>(transport: T, save_dir: SaveDir, tuning: &Tuning) -> anyhow::Result<()> {
    let mut server = Server::new(transport, save_dir, tuning.timers(), tuning.trace());
    server.run().await.context("server stopped")
}

async fn send<T: Transport>(
    transport: T,
    peer: SocketAddr,
    source: tokio::fs::File,
    tuning: &Tuning,
) -> anyhow::Result<Outcome> {
    let client = Client::new(transport, peer, source, tuning.timers(), tuning.trace()).await?;
    let report = client.run().await.context("transfer failed")?;
    log::info!(
        "Connection {}: {:?}, {} bytes acknowledged, {} window drops",
        report.connection_id,
        report.outcome,
        report.bytes_sent,
        report.retransmit_drops
    );
    Ok(report.outcome)
}
