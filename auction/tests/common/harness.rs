//! Multi-node test harness for integration testing.
//!
//! Runs N auction nodes on one in-process network. Besides driving the
//! caller-facing actions, tests can hand a request straight to one node to
//! control the order each replica sees messages in.

use auction::rpc::{Ack, CloseAck, RpcRequest};
use auction::{
    Auction, AuctionNode, Bid, FanOut, LocalNetwork, LocalTransport, NodeIdentity, PeerKey, Price,
};

pub fn price(amount: &str) -> Price {
    amount.parse().unwrap()
}

/// Simulates an N-node auction network.
pub struct NetworkHarness {
    network: LocalNetwork,
    nodes: Vec<AuctionNode<LocalTransport>>,
}

#[allow(dead_code)]
impl NetworkHarness {
    /// Create `num_nodes` nodes that all know each other.
    pub async fn new(num_nodes: usize) -> Self {
        Self::with_fan_out(num_nodes, FanOut::Sequential).await
    }

    pub async fn with_fan_out(num_nodes: usize, fan_out: FanOut) -> Self {
        let network = LocalNetwork::new();
        let nodes: Vec<_> = (0..num_nodes)
            .map(|i| {
                let seed = u8::try_from(i + 1).unwrap();
                network.add_node(NodeIdentity::from_seed([seed; 32]), fan_out)
            })
            .collect();
        for node in &nodes {
            node.refresh_peers().await.unwrap();
        }
        Self { network, nodes }
    }

    pub fn node(&self, index: usize) -> &AuctionNode<LocalTransport> {
        &self.nodes[index]
    }

    pub fn peer_key(&self, index: usize) -> PeerKey {
        self.nodes[index].peer_key()
    }

    pub fn network(&self) -> &LocalNetwork {
        &self.network
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Node `index`'s view of an auction.
    pub fn view(&self, index: usize, auction_id: &str) -> Option<Auction> {
        self.nodes[index].store().get(auction_id)
    }

    /// Every node's view of an auction, in node order.
    pub fn views(&self, auction_id: &str) -> Vec<Option<Auction>> {
        (0..self.nodes.len())
            .map(|i| self.view(i, auction_id))
            .collect()
    }

    /// Hand `request` to node `index` as if it arrived from a peer.
    pub async fn deliver(&self, index: usize, request: &RpcRequest) -> Vec<u8> {
        let payload = request.encode().unwrap();
        self.nodes[index]
            .handle_request(request.method().as_str(), &payload)
            .await
    }

    pub async fn deliver_create(&self, index: usize, id: &str, item: &str, start: &str) -> Ack {
        let request = RpcRequest::CreateAuction(Auction::new(id, item, price(start)));
        Ack::from_bytes(&self.deliver(index, &request).await).unwrap()
    }

    pub async fn deliver_bid(&self, index: usize, auction_id: &str, amount: &str, bidder: &str) -> Ack {
        let request = RpcRequest::MakeBid(Bid::new(auction_id, price(amount), bidder));
        Ack::from_bytes(&self.deliver(index, &request).await).unwrap()
    }

    pub async fn deliver_close(&self, index: usize, auction_id: &str) -> CloseAck {
        let request = RpcRequest::CloseAuction(auction_id.to_string());
        CloseAck::from_bytes(&self.deliver(index, &request).await).unwrap()
    }

    /// Put the same fresh auction on every node without broadcasting.
    pub async fn seed_auction(&self, id: &str, item: &str, start: &str) {
        for index in 0..self.nodes.len() {
            assert!(self.deliver_create(index, id, item, start).await.success);
        }
    }
}
