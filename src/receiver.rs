//! Receive-side engine: validation, reordering, acknowledgement.
//!
//! [`Receiver`] accepts datagrams from the socket, validates them, and files
//! payloads into the [`RecvBuffer`](crate::recv_buffer::RecvBuffer) so the
//! output sink sees the stream in original order.  For every packet it
//! reacts on the spot:
//!
//! - **Malformed datagram** (truncated or failed checksum) → transmit a NACK
//!   carrying the first missing sequence, asking the sender to go back to it.
//! - **Valid data** → buffer the payload unless it was already seen, then
//!   acknowledge the received sequence either way (duplicate ACKs are
//!   harmless; a lost ACK would otherwise stall the sender).
//! - **END** → drain whatever is ready and terminate.
//!
//! Drained payloads are forwarded byte-for-byte over an `mpsc` channel; the
//! binary bridges that channel to stdout.

use std::net::SocketAddr;

use tokio::sync::mpsc;

use crate::config::RdtConfig;
use crate::error::EngineError;
use crate::packet::{flags, Packet};
use crate::recv_buffer::RecvBuffer;
use crate::socket::{SocketError, UdtSocket};

/// Counters accumulated by a [`Receiver`] run, returned on completion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReceiverStats {
    /// Valid packets accepted from the socket (including duplicates and END).
    pub packets_received: u64,
    /// Payloads emitted to the sink, in order.
    pub payloads_delivered: u64,
    /// Valid data packets that were already buffered or emitted.
    pub duplicates: u64,
    /// ACK packets transmitted.
    pub acks_sent: u64,
    /// NACK packets transmitted.
    pub nacks_sent: u64,
}

/// Receive-side engine state for one transfer.
pub struct Receiver {
    socket: UdtSocket,
    peer: SocketAddr,
    buffer: RecvBuffer,
    stats: ReceiverStats,
}

impl Receiver {
    /// Create a receiver that acknowledges toward `peer` through `socket`.
    pub fn new(socket: UdtSocket, peer: SocketAddr, config: RdtConfig) -> Self {
        Self {
            socket,
            peer,
            buffer: RecvBuffer::new(config.buffer_size),
            stats: ReceiverStats::default(),
        }
    }

    /// Run the receive loop until a validated END arrives.
    ///
    /// In-order payloads are forwarded through `sink` as they become
    /// contiguous.  Returns the accumulated counters.
    pub async fn run(mut self, sink: mpsc::Sender<Vec<u8>>) -> Result<ReceiverStats, EngineError> {
        loop {
            match self.socket.recv_from().await {
                Ok((pkt, addr)) => {
                    if addr != self.peer {
                        continue;
                    }
                    self.stats.packets_received += 1;
                    if pkt.has_flags(flags::END) {
                        log::debug!("[rdt:rcv] ← END");
                        break;
                    }
                    self.on_data(pkt, &sink).await?;
                }
                Err(SocketError::Packet(e)) => {
                    // Corrupted in transit; ask for the first gap again.
                    let blank = self.buffer.first_blank();
                    log::warn!("[rdt:rcv] ← malformed packet ({e:?}); → NACK seq={blank}");
                    self.socket.send_to(&Packet::nack(blank), self.peer).await?;
                    self.stats.nacks_sent += 1;
                }
                Err(e @ SocketError::Io(_)) => return Err(e.into()),
            }
        }

        self.flush(&sink).await?;
        log::info!(
            "[rdt:rcv] done: {} payload(s) delivered, {} duplicate(s)",
            self.stats.payloads_delivered,
            self.stats.duplicates
        );
        Ok(self.stats)
    }

    /// Buffer one validated data packet, acknowledge it, and forward
    /// whatever became contiguous.
    async fn on_data(&mut self, pkt: Packet, sink: &mpsc::Sender<Vec<u8>>) -> Result<(), EngineError> {
        let seq = pkt.seq;
        if self.buffer.is_buffered(seq) {
            self.stats.duplicates += 1;
            log::debug!("[rdt:rcv] ← DATA seq={seq} (duplicate)");
        } else {
            let accepted = self.buffer.insert(seq, pkt.payload);
            log::debug!(
                "[rdt:rcv] ← DATA seq={seq} accepted={accepted} first_blank={}",
                self.buffer.first_blank()
            );
        }
        self.socket.send_to(&Packet::ack(seq), self.peer).await?;
        self.stats.acks_sent += 1;
        self.flush(sink).await
    }

    /// Forward every ready payload to the sink.
    async fn flush(&mut self, sink: &mpsc::Sender<Vec<u8>>) -> Result<(), EngineError> {
        while let Some(payload) = self.buffer.pop_ready() {
            self.stats.payloads_delivered += 1;
            sink.send(payload).await.map_err(|_| EngineError::SinkClosed)?;
        }
        Ok(())
    }
}
