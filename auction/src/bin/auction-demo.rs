//! Three-node auction walkthrough on the in-process network.
//!
//! Client#1 sells Pic#1 for 75 USDt and Client#2 sells Pic#2 for 60 USDt.
//! Client#2 and Client#3 bid on Pic#1 at the same time, Client#2 raises to
//! 80 and Client#1 closes the auction. Each node's final view is printed.
//!
//! Set `AUCTION_FANOUT=concurrent` to use concurrent fan-out.

use auction::config::NodeConfig;
use auction::{AuctionNode, LocalNetwork, LocalTransport, NodeIdentity, Price};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn usdt(amount: &str) -> anyhow::Result<Price> {
    Ok(amount.parse()?)
}

fn print_view(label: &str, node: &AuctionNode<LocalTransport>) {
    for auction in node.store().snapshot() {
        println!(
            "{label}: {} {} at {} USDt, highest bidder {}",
            auction.id,
            auction.item,
            auction.current_price,
            auction.highest_bidder.as_deref().unwrap_or("none")
        );
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let config = NodeConfig::from_env()?;

    let network = LocalNetwork::new();
    let peer1 = network.add_node(NodeIdentity::generate(), config.fan_out);
    let peer2 = network.add_node(NodeIdentity::generate(), config.fan_out);
    let peer3 = network.add_node(NodeIdentity::generate(), config.fan_out);
    for node in [&peer1, &peer2, &peer3] {
        node.refresh_peers().await?;
    }
    info!("3 nodes joined, fan-out {}", config.fan_out);

    let (pic1, pic2) = (usdt("75")?, usdt("60")?);
    let (a, b) = tokio::join!(
        peer1.create_auction("auction1", "Pic#1", pic1),
        peer2.create_auction("auction2", "Pic#2", pic2),
    );
    a?;
    b?;

    let (bid2, bid3) = (usdt("75")?, usdt("75.5")?);
    let (a, b) = tokio::join!(
        peer2.make_bid("auction1", bid2, "Client#2"),
        peer3.make_bid("auction1", bid3, "Client#3"),
    );
    a?;
    b?;

    peer2.make_bid("auction1", usdt("80")?, "Client#2").await?;

    let report = peer1.close_auction("auction1").await?;
    info!(
        "Client#1 sees winner {} at {} USDt",
        report.local.winner.as_deref().unwrap_or("none"),
        report.local.price.unwrap_or(Price::ZERO)
    );
    for ack in &report.peers.acks {
        match &ack.outcome {
            auction::PeerOutcome::Acked(view) => info!(
                "Peer {} sees winner {} at {} USDt",
                ack.peer.short(),
                view.winner.as_deref().unwrap_or("none"),
                view.price.unwrap_or(Price::ZERO)
            ),
            auction::PeerOutcome::Failed(reason) => {
                warn!("Peer {} did not answer: {}", ack.peer.short(), reason);
            }
        }
    }

    print_view("Client#1", &peer1);
    print_view("Client#2", &peer2);
    print_view("Client#3", &peer3);
    Ok(())
}
