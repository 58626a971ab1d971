//! Network simulator for deterministic testing.
//!
//! Real channels drop, reorder, duplicate, and corrupt datagrams.  To
//! exercise the reliability mechanisms without depending on actual network
//! conditions, this module provides a [`Simulator`]: a UDP relay that sits
//! between the two engines and applies a scripted fault plan to the data
//! direction:
//!
//! | Fault        | Description                                            |
//! |--------------|--------------------------------------------------------|
//! | Drop         | Swallow one occurrence of a given data sequence.       |
//! | Corruption   | Flip a byte in one occurrence of a given sequence.     |
//! | Hold         | Delay a sequence until the next data packet passes,    |
//! |              | letting a later packet overtake it.                    |
//! | END drop     | Swallow the first N END packets of the teardown burst. |
//!
//! Faults are keyed on decoded sequence numbers rather than probabilities,
//! so test failures are reproducible without a seeded RNG.  Acknowledgement
//! traffic (receiver → sender) is relayed untouched.

use std::io;
use std::net::SocketAddr;

use tokio::net::UdpSocket;

use crate::packet::{flags, Packet, MAX_DATAGRAM};

/// Scripted faults applied to the sender → receiver direction.
///
/// Each listed sequence number consumes one matching packet; later
/// occurrences (retransmissions) pass through clean.
#[derive(Debug, Clone, Default)]
pub struct FaultPlan {
    /// Data sequences to drop, one occurrence each.
    pub drop_data: Vec<u32>,
    /// Data sequences to corrupt (single byte flip), one occurrence each.
    pub corrupt_data: Vec<u32>,
    /// Data sequences to hold back until the next data packet has passed.
    pub hold_data: Vec<u32>,
    /// Number of END packets to swallow before letting one through.
    pub drop_end: usize,
}

/// A fault-injecting UDP relay between a sender and a receiver.
///
/// The engines are pointed at the relay instead of each other: the sender's
/// peer is [`sender_facing_addr`](Self::sender_facing_addr), the receiver's
/// peer is [`receiver_facing_addr`](Self::receiver_facing_addr).
pub struct Simulator {
    /// Leg facing the sender (receives data, returns ACKs).
    ingress: UdpSocket,
    /// Leg facing the receiver (delivers data, receives ACKs).
    egress: UdpSocket,
    sender_addr: SocketAddr,
    receiver_addr: SocketAddr,
    plan: FaultPlan,
    /// Held-back datagrams awaiting release.
    held: Vec<Vec<u8>>,
}

impl Simulator {
    /// Bind both relay legs on ephemeral loopback ports.
    ///
    /// `sender_addr` and `receiver_addr` are the engines' local addresses,
    /// used as forwarding destinations.
    pub async fn bind(
        sender_addr: SocketAddr,
        receiver_addr: SocketAddr,
        plan: FaultPlan,
    ) -> io::Result<Self> {
        let ingress = UdpSocket::bind("127.0.0.1:0").await?;
        let egress = UdpSocket::bind("127.0.0.1:0").await?;
        Ok(Self {
            ingress,
            egress,
            sender_addr,
            receiver_addr,
            plan,
            held: Vec::new(),
        })
    }

    /// Address the sender should use as its peer.
    pub fn sender_facing_addr(&self) -> io::Result<SocketAddr> {
        self.ingress.local_addr()
    }

    /// Address the receiver should use as its peer.
    pub fn receiver_facing_addr(&self) -> io::Result<SocketAddr> {
        self.egress.local_addr()
    }

    /// Relay datagrams until the task is dropped.
    pub async fn run(mut self) {
        let mut data_buf = [0u8; MAX_DATAGRAM];
        let mut ack_buf = [0u8; MAX_DATAGRAM];
        loop {
            tokio::select! {
                res = self.ingress.recv_from(&mut data_buf) => {
                    let Ok((n, _)) = res else { break };
                    let bytes = data_buf[..n].to_vec();
                    if self.forward_data(bytes).await.is_err() {
                        break;
                    }
                }
                res = self.egress.recv_from(&mut ack_buf) => {
                    let Ok((n, _)) = res else { break };
                    if self.ingress.send_to(&ack_buf[..n], self.sender_addr).await.is_err() {
                        break;
                    }
                }
            }
        }
    }

    /// Apply the fault plan to one sender-side datagram and forward the
    /// survivors.
    async fn forward_data(&mut self, mut bytes: Vec<u8>) -> io::Result<()> {
        match Packet::decode(&bytes) {
            Ok(pkt) if pkt.has_flags(flags::END) => {
                if self.plan.drop_end > 0 {
                    self.plan.drop_end -= 1;
                    log::debug!("[sim] dropped END ({} more to drop)", self.plan.drop_end);
                    return Ok(());
                }
            }
            Ok(pkt) if pkt.flags == 0 => {
                if take_one(&mut self.plan.drop_data, pkt.seq) {
                    log::debug!("[sim] dropped DATA seq={}", pkt.seq);
                    return Ok(());
                }
                if take_one(&mut self.plan.hold_data, pkt.seq) {
                    log::debug!("[sim] holding DATA seq={}", pkt.seq);
                    self.held.push(bytes);
                    return Ok(());
                }
                if take_one(&mut self.plan.corrupt_data, pkt.seq) {
                    let last = bytes.len() - 1;
                    bytes[last] ^= 0xFF;
                    log::debug!("[sim] corrupted DATA seq={}", pkt.seq);
                }
            }
            // Control packets and undecodable datagrams pass through.
            _ => {}
        }

        self.egress.send_to(&bytes, self.receiver_addr).await?;
        // A forwarded data packet releases anything held back, which is now
        // guaranteed to arrive after it.
        for held in std::mem::take(&mut self.held) {
            self.egress.send_to(&held, self.receiver_addr).await?;
        }
        Ok(())
    }
}

/// Remove one occurrence of `seq` from `list`, reporting whether it was
/// present.
fn take_one(list: &mut Vec<u32>, seq: u32) -> bool {
    match list.iter().position(|&s| s == seq) {
        Some(i) => {
            list.remove(i);
            true
        }
        None => false,
    }
}
