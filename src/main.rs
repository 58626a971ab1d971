//! Entry point for `rdt`.
//!
//! Parses CLI arguments and dispatches into either **sender** or **receiver**
//! mode.  All actual protocol work is delegated to library modules; `main.rs`
//! owns only process setup (logging, argument parsing) and the plumbing
//! between the engines and the process's stdin/stdout.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use clap::{Args, Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use rdt_over_udp::config::{self, RdtConfig};
use rdt_over_udp::receiver::Receiver;
use rdt_over_udp::sender::Sender;
use rdt_over_udp::socket::UdtSocket;

/// Reliable in-order line delivery over an unreliable datagram channel.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    role: Role,
}

#[derive(Subcommand)]
enum Role {
    /// Read lines from stdin and deliver them reliably to the receiver.
    Sender(PortArgs),
    /// Reassemble the stream and write it to stdout in original order.
    Receiver(PortArgs),
}

#[derive(Args)]
struct PortArgs {
    /// Local port to bind.
    #[arg(short = 's', long = "src-port", value_name = "PORT")]
    src_port: u16,

    /// Peer port to send to.
    #[arg(short = 'd', long = "dst-port", value_name = "PORT")]
    dst_port: u16,

    /// Peer host.
    #[arg(long, default_value_t = config::DEFAULT_HOST)]
    host: IpAddr,

    /// Tolerated and ignored.
    #[arg(hide = true, num_args = 0..)]
    extra: Vec<String>,
}

impl PortArgs {
    fn warn_extra(&self) {
        if !self.extra.is_empty() {
            log::warn!("ignoring {} extra argument(s)", self.extra.len());
        }
    }

    fn local_addr(&self) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), self.src_port)
    }

    fn peer_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.dst_port)
    }
}

#[tokio::main]
async fn main() {
    // RUST_LOG controls verbosity; warnings and errors print by default.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let code = match cli.role {
        Role::Sender(args) => run_sender(args).await,
        Role::Receiver(args) => run_receiver(args).await,
    };
    std::process::exit(code);
}

async fn run_sender(args: PortArgs) -> i32 {
    args.warn_extra();
    let peer = args.peer_addr();
    let socket = match UdtSocket::bind(args.local_addr()).await {
        Ok(s) => s,
        Err(e) => {
            log::error!("[rdt:snd] bind failed: {e}");
            return 1;
        }
    };
    log::info!("[rdt:snd] {} → {}", socket.local_addr, peer);

    let (line_tx, line_rx) = mpsc::channel(1);
    let reader = spawn_stdin_reader(line_tx);
    match Sender::new(socket, peer, RdtConfig::default()).run(line_rx).await {
        Ok(_) => {
            let _ = reader.await;
            0
        }
        Err(e) => {
            log::error!("[rdt:snd] fatal: {e}");
            1
        }
    }
}

async fn run_receiver(args: PortArgs) -> i32 {
    args.warn_extra();
    let peer = args.peer_addr();
    let socket = match UdtSocket::bind(args.local_addr()).await {
        Ok(s) => s,
        Err(e) => {
            log::error!("[rdt:rcv] bind failed: {e}");
            return 1;
        }
    };
    log::info!("[rdt:rcv] {} → {}", socket.local_addr, peer);

    let (sink_tx, sink_rx) = mpsc::channel(config::BUFFER_SIZE);
    let writer = spawn_stdout_writer(sink_rx);
    match Receiver::new(socket, peer, RdtConfig::default()).run(sink_tx).await {
        Ok(_) => {
            let _ = writer.await;
            0
        }
        Err(e) => {
            log::error!("[rdt:rcv] fatal: {e}");
            1
        }
    }
}

/// Feed stdin to the sender engine, one newline-delimited chunk per channel
/// message.  Reads are bounded, so an over-long line arrives as several
/// chunks.  Closing the channel signals end of input.
fn spawn_stdin_reader(tx: mpsc::Sender<Vec<u8>>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut reader = BufReader::new(tokio::io::stdin());
        loop {
            let mut line = Vec::new();
            let mut bounded = (&mut reader).take(config::MAX_LINE as u64);
            match bounded.read_until(b'\n', &mut line).await {
                Ok(0) => break,
                Ok(_) => {
                    if tx.send(line).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    log::error!("[rdt:snd] stdin read failed: {e}");
                    break;
                }
            }
        }
    })
}

/// Write delivered payloads to stdout byte-for-byte, flushing per payload.
fn spawn_stdout_writer(mut rx: mpsc::Receiver<Vec<u8>>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(payload) = rx.recv().await {
            if stdout.write_all(&payload).await.is_err() {
                break;
            }
            let _ = stdout.flush().await;
        }
    })
}
