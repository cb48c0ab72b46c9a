//! Headless auction node.
//!
//! Runs one node per process over the TCP transport with JSON-over-stdio
//! commands. Logging goes to stderr; stdout is reserved for the command
//! protocol.
//!
//! Usage:
//!   auction-node --listen 127.0.0.1:7001 --bootstrap 127.0.0.1:7000
//!
//! Flags override the `AUCTION_*` environment variables. On startup a
//! `Ready` JSON line is written to stdout, then `Command` lines are read from
//! stdin and answered with `Response` lines.

use std::io::Write;
use std::sync::Arc;

use auction::config::NodeConfig;
use auction::{AuctionNode, AuctionResult, FanOut, NodeIdentity, Price, RequestHandler, TcpTransport};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// ── IPC types ────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ReadyEvent {
    event: &'static str,
    peer_key: String,
    listen_addr: String,
    peers: usize,
}

#[derive(Deserialize)]
#[serde(tag = "cmd")]
enum Command {
    CreateAuction {
        id: String,
        item: String,
        starting_price: Price,
    },
    MakeBid {
        auction_id: String,
        price: Price,
        bidder: String,
    },
    CloseAuction {
        auction_id: String,
    },
    GetAuction {
        auction_id: String,
    },
    ListPeers,
    Shutdown,
}

#[derive(Serialize)]
#[serde(tag = "status")]
enum Response {
    Ok { data: Option<serde_json::Value> },
    Err { message: String },
}

impl Response {
    fn from_result<T: Serialize>(result: AuctionResult<T>) -> Self {
        match result.and_then(|value| {
            serde_json::to_value(value)
                .map_err(|e| auction::AuctionError::Serialization(e.to_string()))
        }) {
            Ok(data) => Self::Ok { data: Some(data) },
            Err(e) => Self::Err {
                message: e.to_string(),
            },
        }
    }
}

// ── Helpers ──────────────────────────────────────────────────────────

/// Apply command-line flags on top of the environment-derived config.
fn parse_args(mut config: NodeConfig) -> anyhow::Result<NodeConfig> {
    let mut args = std::env::args().skip(1);
    while let Some(flag) = args.next() {
        let mut value = || {
            args.next()
                .ok_or_else(|| anyhow::anyhow!("{flag} needs a value"))
        };
        match flag.as_str() {
            "--listen" => config.listen_addr = value()?,
            "--bootstrap" => config.bootstrap.push(value()?),
            "--fanout" => config.fan_out = value()?.parse()?,
            "--timeout-ms" => {
                let ms: u64 = value()?.parse()?;
                config.request_timeout_ms = (ms > 0).then_some(ms);
            }
            other => anyhow::bail!(
                "Unknown flag {other}. Usage: auction-node [--listen ADDR] [--bootstrap ADDR]... \
                 [--fanout sequential|concurrent] [--timeout-ms N]"
            ),
        }
    }
    config.validate()?;
    Ok(config)
}

fn init_logging_stderr() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(false),
        )
        .init();
}

fn emit_json(value: &impl Serialize) {
    let line = match serde_json::to_string(value) {
        Ok(line) => line,
        Err(e) => {
            error!("Failed to serialize response: {}", e);
            return;
        }
    };
    let mut stdout = std::io::stdout().lock();
    if let Err(e) = writeln!(stdout, "{line}").and_then(|()| stdout.flush()) {
        error!("stdout write failed: {}", e);
    }
}

async fn execute(node: &AuctionNode<TcpTransport>, cmd: Command) -> Response {
    // Pick up peers that said hello since the last command.
    if let Err(e) = node.refresh_peers().await {
        error!("Failed to refresh peers: {}", e);
    }
    match cmd {
        Command::CreateAuction {
            id,
            item,
            starting_price,
        } => Response::from_result(node.create_auction(id, item, starting_price).await),
        Command::MakeBid {
            auction_id,
            price,
            bidder,
        } => Response::from_result(node.make_bid(auction_id, price, bidder).await),
        Command::CloseAuction { auction_id } => {
            Response::from_result(node.close_auction(auction_id).await)
        }
        Command::GetAuction { auction_id } => match node.store().get(&auction_id) {
            Some(auction) => Response::from_result(Ok(auction)),
            None => Response::Err {
                message: "Auction not found".into(),
            },
        },
        Command::ListPeers => Response::from_result(Ok(node
            .registry()
            .snapshot()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>())),
        Command::Shutdown => Response::Ok { data: None },
    }
}

// ── Main ─────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging_stderr();
    let config = parse_args(NodeConfig::from_env()?)?;
    let fan_out: FanOut = config.fan_out;
    info!(
        "auction-node starting (listen={}, {} bootstrap contact(s), fan-out {})",
        config.listen_addr,
        config.bootstrap.len(),
        fan_out
    );

    let identity = NodeIdentity::generate();
    let peer_key = identity.peer_key();
    let (transport, server) = TcpTransport::bind(peer_key, config.listen_socket_addr()?).await?;
    let listen_addr = transport.local_addr();

    let node = AuctionNode::with_config(identity, transport.clone(), &config);
    let shutdown = CancellationToken::new();
    let handler: Arc<dyn RequestHandler> = Arc::new(node.handlers().clone());
    let server_task = tokio::spawn(server.run(handler, shutdown.clone()));

    transport.bootstrap(&config.bootstrap_addrs()?).await;
    node.refresh_peers().await?;

    emit_json(&ReadyEvent {
        event: "Ready",
        peer_key: peer_key.to_string(),
        listen_addr: listen_addr.to_string(),
        peers: node.registry().len(),
    });
    info!("Ready event emitted");

    // Command loop
    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(l)) => l,
            Ok(None) => {
                info!("stdin closed, shutting down");
                break;
            }
            Err(e) => {
                error!("stdin read error: {}", e);
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let cmd: Command = match serde_json::from_str(&line) {
            Ok(c) => c,
            Err(e) => {
                emit_json(&Response::Err {
                    message: format!("Invalid command JSON: {e}"),
                });
                continue;
            }
        };

        let stop = matches!(cmd, Command::Shutdown);
        if stop {
            info!("Shutdown command received");
        }
        emit_json(&execute(&node, cmd).await);
        if stop {
            break;
        }
    }

    // Graceful shutdown
    shutdown.cancel();
    match server_task.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("Listener failed: {}", e),
        Err(e) => error!("Listener task panicked: {}", e),
    }
    info!("Shutdown complete");
    Ok(())
}
